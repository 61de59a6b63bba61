use async_trait::async_trait;
use http::{header::HeaderName, HeaderMap, HeaderValue, Method, StatusCode};
use tracing::debug;
use url::Url;

use crate::{
    config::Endpoint,
    error::{Error, Result},
};

/// An outgoing HTTP request, independent of the client library that sends it.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// Form parameters, sent as an `application/x-www-form-urlencoded` body
    pub form: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            form: Vec::new(),
        }
    }

    /// Append a form parameter.
    pub fn add_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.form.push((name.into(), value.into()));
    }

    /// Replace every form parameter with the given name, or append it.
    pub fn set_param(&mut self, name: &str, value: impl Into<String>) {
        self.form.retain(|(key, _)| key != name);
        self.add_param(name, value);
    }

    /// First value of a form parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Insert a header, replacing any previous value.
    pub fn set_header(&mut self, name: HeaderName, value: &str) -> Result<()> {
        let value = HeaderValue::from_str(value).map_err(|e| {
            Error::InvalidConfiguration(format!("Invalid value for header {name}: {e}"))
        })?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A received HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// The HTTP client collaborator used for every outbound call.
///
/// The transport value stands in for a configured HTTP client; requests are
/// built against an [`Endpoint`] and executed through it. Timeouts, TLS and
/// connection reuse are the implementation's business.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Build an empty request for the endpoint.
    fn create_request(&self, endpoint: &Endpoint, method: Method) -> Result<HttpRequest> {
        Ok(HttpRequest::new(method, endpoint.url()?))
    }

    /// Send the request. Only network failures are errors; any HTTP status
    /// is a successful execution.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`HttpTransport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client, e.g. one with a request timeout.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!("Sending {} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        debug!("HTTP response status: {}", status);
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::AUTHORIZATION;

    #[test]
    fn test_request_params() {
        let mut request = HttpRequest::new(
            Method::POST,
            Url::parse("https://auth.example.com/token").unwrap(),
        );
        request.add_param("grant_type", "password");
        request.add_param("scope", "a");
        request.add_param("scope", "b");
        assert_eq!(request.param("grant_type"), Some("password"));
        assert_eq!(request.param("scope"), Some("a"));

        request.set_param("scope", "c");
        assert_eq!(request.param("scope"), Some("c"));
        assert_eq!(request.form.len(), 2);
        assert_eq!(request.param("missing"), None);
    }

    #[test]
    fn test_request_headers() {
        let mut request = HttpRequest::new(
            Method::GET,
            Url::parse("https://api.example.com/me").unwrap(),
        );
        assert_eq!(request.header(&AUTHORIZATION), None);

        request.set_header(AUTHORIZATION, "Bearer abc").unwrap();
        request.set_header(AUTHORIZATION, "Bearer def").unwrap();
        assert_eq!(request.header(&AUTHORIZATION), Some("Bearer def"));

        assert!(request.set_header(AUTHORIZATION, "bad\nvalue").is_err());
    }

    #[test]
    fn test_create_request_uses_endpoint() {
        let transport = ReqwestTransport::new();
        let request = transport
            .create_request(
                &Endpoint::new("https://auth.example.com", "oauth/token"),
                Method::POST,
            )
            .unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url.as_str(), "https://auth.example.com/oauth/token");
        assert!(request.form.is_empty());
    }
}
