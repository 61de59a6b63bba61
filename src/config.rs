use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Default safety margin subtracted from a token's expiry before it is
/// considered stale.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(5);

/// Token type used when the provider does not return one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// A provider endpoint, expressed as a base URI and a resource path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub base_uri: String,
    #[serde(default)]
    pub resource: String,
}

impl Endpoint {
    pub fn new(base_uri: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            resource: resource.into(),
        }
    }

    /// The absolute URL of this endpoint.
    pub fn url(&self) -> Result<Url> {
        let base = self.base_uri.trim_end_matches('/');
        let resource = self.resource.trim_start_matches('/');
        let joined = if resource.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{resource}")
        };
        Url::parse(&joined)
            .map_err(|e| Error::InvalidConfiguration(format!("Invalid endpoint {joined}: {e}")))
    }
}

impl From<&str> for Endpoint {
    fn from(url: &str) -> Self {
        Self::new(url, "")
    }
}

/// Configuration for a [`TokenClient`](crate::TokenClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Friendly name of the provider, stamped on [`UserInfo`](crate::UserInfo)
    pub provider_name: String,

    /// Endpoint issuing access tokens
    pub token_endpoint: Endpoint,

    /// Endpoint returning information about the logged-in user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info_endpoint: Option<Endpoint>,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// Token type used when the token response carries none
    #[serde(default = "default_token_type")]
    pub default_token_type: String,

    /// Time subtracted from the expiry instant when checking staleness
    #[serde(default = "default_safety_margin", with = "duration_secs")]
    pub expiration_safety_margin: Duration,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

fn default_safety_margin() -> Duration {
    DEFAULT_SAFETY_MARGIN
}

impl ClientConfig {
    pub fn new(provider_name: impl Into<String>, token_endpoint: impl Into<Endpoint>) -> Self {
        Self {
            provider_name: provider_name.into(),
            token_endpoint: token_endpoint.into(),
            user_info_endpoint: None,
            client_id: String::new(),
            client_secret: String::new(),
            default_token_type: default_token_type(),
            expiration_safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }

    /// Set the user-info endpoint
    pub fn with_user_info_endpoint(mut self, endpoint: impl Into<Endpoint>) -> Self {
        self.user_info_endpoint = Some(endpoint.into());
        self
    }

    /// Set the client credentials sent with every token request
    pub fn with_client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    /// Set the fallback token type
    pub fn with_default_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.default_token_type = token_type.into();
        self
    }

    /// Set the expiration safety margin
    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.expiration_safety_margin = margin;
        self
    }

    /// Check that the configured endpoints are usable.
    pub fn validate(&self) -> Result<()> {
        self.token_endpoint.url()?;
        if let Some(endpoint) = &self.user_info_endpoint {
            endpoint.url()?;
        }
        if self.default_token_type.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "Default token type must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
