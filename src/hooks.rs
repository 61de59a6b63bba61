use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::{Error, Result},
    token::{GrantType, TokenState},
    transport::{HttpRequest, HttpResponse},
};

/// Information about the authenticated user, as returned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Name of the provider that issued the token
    pub provider_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_uri: Option<String>,

    /// Every field of the provider's payload
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl UserInfo {
    /// Read the common identity fields from a JSON object, using the
    /// usual OpenID Connect names and their common alternatives.
    pub fn from_json_object(fields: Map<String, Value>) -> Self {
        let pick = |keys: &[&str]| {
            keys.iter().find_map(|key| match fields.get(*key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
        };

        Self {
            provider_name: String::new(),
            id: pick(&["sub", "id", "user_id"]),
            email: pick(&["email"]),
            first_name: pick(&["given_name", "first_name"]),
            last_name: pick(&["family_name", "last_name"]),
            avatar_uri: pick(&["picture", "avatar_url"]),
            fields,
        }
    }
}

/// Per-provider customisation points around the token exchange.
///
/// Every method has a default, so implementors only override the quirks of
/// their provider. The exchange algorithm itself is not overridable.
pub trait TokenExchangeHooks: Send + Sync {
    /// Called with the fully built token request, just before it is sent.
    fn before_token_request(&self, _grant: GrantType, _request: &mut HttpRequest) -> Result<()> {
        Ok(())
    }

    /// Called after a successful exchange with the raw response and the new state.
    fn after_token_response(&self, _response: &HttpResponse, _state: &TokenState) {}

    /// Called with the authorized user-info request, just before it is sent.
    fn before_user_info_request(&self, _request: &mut HttpRequest) -> Result<()> {
        Ok(())
    }

    /// Turn a user-info response body into a [`UserInfo`]. The default reads a
    /// JSON object.
    fn parse_user_info(&self, content: &str) -> Result<UserInfo> {
        let fields: Map<String, Value> = serde_json::from_str(content)
            .map_err(|e| Error::MalformedResponse(format!("Invalid user info payload: {e}")))?;
        Ok(UserInfo::from_json_object(fields))
    }
}

/// Hooks that change nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl TokenExchangeHooks for DefaultHooks {}
