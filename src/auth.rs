use std::sync::Arc;

use async_trait::async_trait;
use http::{header::AUTHORIZATION, Method, StatusCode};
use tracing::{debug, warn};

use crate::{
    client::{RefreshOptions, TokenClient},
    config::Endpoint,
    error::Result,
    transport::{HttpRequest, HttpResponse, HttpTransport},
};

/// Where a request is in the authenticate / retry cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No authentication failure seen for this request
    Armed,
    /// A 401 was handled and the token refreshed; the next decoration must
    /// replace any existing `Authorization` header
    Retrying,
}

/// Transport wrapper that authenticates requests with the bearer token of a
/// [`TokenClient`].
///
/// A `401 Unauthorized` answer triggers one forced token refresh followed by
/// a single retry, provided a refresh token is known. Without one, or when
/// the retry is rejected too, the 401 response is returned to the caller
/// unchanged.
pub struct AuthenticationDecorator {
    client: Arc<TokenClient>,
    inner: Arc<dyn HttpTransport>,
    token_type: Option<String>,
}

impl AuthenticationDecorator {
    pub fn new(client: Arc<TokenClient>, inner: impl HttpTransport + 'static) -> Self {
        Self::with_transport(client, Arc::new(inner))
    }

    pub fn with_transport(client: Arc<TokenClient>, inner: Arc<dyn HttpTransport>) -> Self {
        Self {
            client,
            inner,
            token_type: None,
        }
    }

    /// Always present this token type instead of the one reported by the
    /// provider.
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    pub fn client(&self) -> &Arc<TokenClient> {
        &self.client
    }

    /// Attach the `Authorization` header for the given state.
    ///
    /// While [`AuthState::Armed`], a header already set by the caller is kept.
    /// While [`AuthState::Retrying`], it is always replaced. Either way the
    /// request leaves in the `Armed` state.
    pub async fn decorate(&self, request: &mut HttpRequest, state: AuthState) -> Result<AuthState> {
        if state == AuthState::Armed && request.headers.contains_key(AUTHORIZATION) {
            return Ok(AuthState::Armed);
        }

        let access_token = self.client.current_token().await?;
        let token_type = match &self.token_type {
            Some(token_type) => token_type.clone(),
            None => self.client.token_type().await,
        };
        request.set_header(AUTHORIZATION, &format!("{token_type} {access_token}"))?;
        Ok(AuthState::Armed)
    }

    /// React to a `401 Unauthorized`.
    ///
    /// Returns `Some(AuthState::Retrying)` once the token has been force
    /// refreshed, or `None` when no refresh token is known and the failure
    /// must be surfaced as is. A failed refresh is an error.
    pub async fn handle_unauthorized(&self) -> Result<Option<AuthState>> {
        if !self.client.has_refresh_token().await {
            debug!("Unauthorized response and no refresh token, not retrying");
            return Ok(None);
        }
        self.client
            .current_token_with(RefreshOptions::new().force())
            .await?;
        Ok(Some(AuthState::Retrying))
    }
}

#[async_trait]
impl HttpTransport for AuthenticationDecorator {
    fn create_request(&self, endpoint: &Endpoint, method: Method) -> Result<HttpRequest> {
        self.inner.create_request(endpoint, method)
    }

    async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        self.decorate(&mut request, AuthState::Armed).await?;
        let retry = request.clone();

        let response = self.inner.execute(request).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("Request to {} was unauthorized", retry.url);
        match self.handle_unauthorized().await? {
            Some(state) => {
                let mut retry = retry;
                self.decorate(&mut retry, state).await?;
                debug!("Retrying {} with a refreshed token", retry.url);
                self.inner.execute(retry).await
            }
            None => Ok(response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ClientConfig, testutils::MockTransport, token::TokenState};
    use url::Url;

    async fn decorator(refresh_token: Option<&str>) -> (AuthenticationDecorator, MockTransport) {
        let transport = MockTransport::new();
        let config = ClientConfig::new("example", "https://auth.example.com/token");
        let client = TokenClient::new(config, transport.clone()).unwrap();
        client
            .set_token_state(TokenState {
                access_token: "current".to_string(),
                refresh_token: refresh_token.map(str::to_string),
                token_type: "Bearer".to_string(),
                expires_at: None,
                generation: 0,
            })
            .await;
        (
            AuthenticationDecorator::new(Arc::new(client), transport.clone()),
            transport,
        )
    }

    fn api_request() -> HttpRequest {
        HttpRequest::new(
            Method::GET,
            Url::parse("https://api.example.com/items").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_armed_attaches_missing_header() {
        let (decorator, _) = decorator(None).await;
        let mut request = api_request();

        let state = decorator
            .decorate(&mut request, AuthState::Armed)
            .await
            .unwrap();
        assert_eq!(state, AuthState::Armed);
        assert_eq!(request.header(&AUTHORIZATION), Some("Bearer current"));
    }

    #[tokio::test]
    async fn test_armed_keeps_existing_header() {
        let (decorator, _) = decorator(None).await;
        let mut request = api_request();
        request.set_header(AUTHORIZATION, "Basic dXNlcjpwdw==").unwrap();

        decorator
            .decorate(&mut request, AuthState::Armed)
            .await
            .unwrap();
        assert_eq!(request.header(&AUTHORIZATION), Some("Basic dXNlcjpwdw=="));
    }

    #[tokio::test]
    async fn test_retrying_replaces_existing_header() {
        let (decorator, _) = decorator(None).await;
        let mut request = api_request();
        request.set_header(AUTHORIZATION, "Bearer stale").unwrap();

        let state = decorator
            .decorate(&mut request, AuthState::Retrying)
            .await
            .unwrap();
        assert_eq!(state, AuthState::Armed);
        assert_eq!(request.header(&AUTHORIZATION), Some("Bearer current"));
    }

    #[tokio::test]
    async fn test_pinned_token_type() {
        let (decorator, _) = decorator(None).await;
        let decorator = decorator.with_token_type("OAuth");
        let mut request = api_request();

        decorator
            .decorate(&mut request, AuthState::Armed)
            .await
            .unwrap();
        assert_eq!(request.header(&AUTHORIZATION), Some("OAuth current"));
    }

    #[tokio::test]
    async fn test_unauthorized_without_refresh_token() {
        let (decorator, transport) = decorator(None).await;
        assert_eq!(decorator.handle_unauthorized().await.unwrap(), None);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_with_refresh_token() {
        let (decorator, transport) = decorator(Some("rt")).await;
        transport.push_json(serde_json::json!({ "access_token": "fresh" }));

        assert_eq!(
            decorator.handle_unauthorized().await.unwrap(),
            Some(AuthState::Retrying)
        );
        assert_eq!(transport.request(0).param("refresh_token"), Some("rt"));
        assert_eq!(decorator.client().current_token().await.unwrap(), "fresh");
    }
}
