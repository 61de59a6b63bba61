//! Token endpoint response parsing.
//!
//! Providers answer either with a JSON object or with a query-string encoded
//! body (`access_token=...&token_type=...`). Parsing is done in two explicit
//! stages: the body is first read as a JSON object, and only when it is not
//! one is it read as a query string. A missing key never triggers the
//! fallback.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

const ACCESS_TOKEN_KEY: &str = "access_token";
const REFRESH_TOKEN_KEY: &str = "refresh_token";
const TOKEN_TYPE_KEY: &str = "token_type";
const EXPIRES_KEY: &str = "expires_in";
const ERROR_KEY: &str = "error";
const ERROR_DESCRIPTION_KEY: &str = "error_description";

/// Encoding a response body was read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Query,
}

/// Flat multi-valued view of a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFields {
    format: BodyFormat,
    entries: Vec<(String, String)>,
}

impl ResponseFields {
    pub fn parse(content: &str) -> Self {
        match serde_json::from_str::<Map<String, Value>>(content) {
            Ok(object) => Self::from_json(object),
            Err(_) => Self::from_query(content),
        }
    }

    fn from_json(object: Map<String, Value>) -> Self {
        let mut entries = Vec::new();
        for (key, value) in object {
            let mut values = Vec::new();
            flatten(&value, &mut values);
            entries.extend(values.into_iter().map(|v| (key.clone(), v)));
        }
        Self {
            format: BodyFormat::Json,
            entries,
        }
    }

    fn from_query(content: &str) -> Self {
        let content = content.trim().trim_start_matches('?');
        let entries = url::form_urlencoded::parse(content.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self {
            format: BodyFormat::Query,
            entries,
        }
    }

    pub fn format(&self) -> BodyFormat {
        self.format
    }

    /// Every value recorded under `key`, in body order.
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The provider error carried by the body, if any non-empty one is present.
    pub fn error(&self) -> Option<Error> {
        let errors: Vec<&str> = self.values(ERROR_KEY).filter(|e| !e.is_empty()).collect();
        if errors.is_empty() {
            return None;
        }
        Some(Error::provider(
            &errors.join("\n"),
            self.first(ERROR_DESCRIPTION_KEY),
        ))
    }
}

// Scalars contribute themselves, containers contribute each of their values.
fn flatten(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push(s.clone()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Array(items) => items.iter().for_each(|v| flatten(v, out)),
        Value::Object(map) => map.values().for_each(|v| flatten(v, out)),
    }
}

/// The fields of a successful token response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    /// Lifetime in seconds; `None` when absent or not positive
    pub expires_in: Option<u64>,
}

impl TokenResponse {
    pub fn parse(content: &str) -> Result<Self> {
        Self::from_fields(&ResponseFields::parse(content))
    }

    pub fn from_fields(fields: &ResponseFields) -> Result<Self> {
        let access_token = fields
            .first(ACCESS_TOKEN_KEY)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::MalformedResponse(format!("missing {ACCESS_TOKEN_KEY}")))?
            .to_string();

        let expires_in = match fields.first(EXPIRES_KEY).map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let secs: i64 = raw.parse().map_err(|_| {
                    Error::MalformedResponse(format!("{EXPIRES_KEY} is not an integer: {raw}"))
                })?;
                u64::try_from(secs).ok().filter(|s| *s > 0)
            }
        };

        Ok(Self {
            access_token,
            refresh_token: non_empty(fields.first(REFRESH_TOKEN_KEY)),
            token_type: non_empty(fields.first(TOKEN_TYPE_KEY)),
            expires_in,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_response() {
        let response = TokenResponse::parse(
            r#"{"access_token":"abc","refresh_token":"rt","token_type":"Bearer","expires_in":3600,"scope":"read"}"#,
        )
        .unwrap();
        assert_eq!(response.access_token, "abc");
        assert_eq!(response.refresh_token.as_deref(), Some("rt"));
        assert_eq!(response.token_type.as_deref(), Some("Bearer"));
        assert_eq!(response.expires_in, Some(3600));
    }

    #[test]
    fn test_query_response_matches_json() {
        let query = TokenResponse::parse("access_token=xyz&token_type=Bearer").unwrap();
        let json = TokenResponse::parse(r#"{"access_token":"xyz","token_type":"Bearer"}"#).unwrap();
        assert_eq!(query, json);
        assert_eq!(query.expires_in, None);
        assert_eq!(query.refresh_token, None);
    }

    #[test]
    fn test_query_values_are_decoded() {
        let fields = ResponseFields::parse("access_token=a%2Bb%3D&token_type=mac+token");
        assert_eq!(fields.format(), BodyFormat::Query);
        assert_eq!(fields.first("access_token"), Some("a+b="));
        assert_eq!(fields.first("token_type"), Some("mac token"));
    }

    #[test]
    fn test_missing_key_does_not_fall_back() {
        let fields = ResponseFields::parse(r#"{"token_type":"Bearer"}"#);
        assert_eq!(fields.format(), BodyFormat::Json);
        assert!(matches!(
            TokenResponse::from_fields(&fields),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_non_object_json_falls_back_to_query() {
        let fields = ResponseFields::parse(r#"["access_token"]"#);
        assert_eq!(fields.format(), BodyFormat::Query);
        assert_eq!(fields.first("access_token"), None);
    }

    #[test]
    fn test_nested_arrays_contribute_each_value() {
        let fields = ResponseFields::parse(r#"{"error":["invalid_grant","expired"],"other":null}"#);
        assert_eq!(
            fields.values("error").collect::<Vec<_>>(),
            vec!["invalid_grant", "expired"]
        );
        assert_eq!(fields.first("other"), None);
        assert_eq!(
            fields.error(),
            Some(Error::Provider("invalid_grant\nexpired".to_string()))
        );
    }

    #[test]
    fn test_error_field() {
        let fields = ResponseFields::parse(
            r#"{"error":"invalid_grant","error_description":"Bad credentials"}"#,
        );
        assert_eq!(
            fields.error(),
            Some(Error::Provider("invalid_grant: Bad credentials".to_string()))
        );

        let fields = ResponseFields::parse("error=invalid_client");
        assert_eq!(
            fields.error(),
            Some(Error::Provider("invalid_client".to_string()))
        );

        assert_eq!(ResponseFields::parse(r#"{"error":""}"#).error(), None);
    }

    #[test]
    fn test_expires_in_variants() {
        let response = TokenResponse::parse(r#"{"access_token":"a","expires_in":"120"}"#).unwrap();
        assert_eq!(response.expires_in, Some(120));

        let response = TokenResponse::parse(r#"{"access_token":"a","expires_in":0}"#).unwrap();
        assert_eq!(response.expires_in, None);

        let response = TokenResponse::parse("access_token=a&expires_in=-5").unwrap();
        assert_eq!(response.expires_in, None);

        assert!(matches!(
            TokenResponse::parse(r#"{"access_token":"a","expires_in":"soon"}"#),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_empty_access_token_is_malformed() {
        assert!(matches!(
            TokenResponse::parse(r#"{"access_token":""}"#),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            TokenResponse::parse(""),
            Err(Error::MalformedResponse(_))
        ));
    }
}
