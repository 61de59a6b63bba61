use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::response::TokenResponse;

/// OAuth2 grant used for a token exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    Password,
    RefreshToken,
}

impl GrantType {
    /// Value of the `grant_type` form parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::Password => "password",
            GrantType::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-owned credentials for a single exchange.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Password { username: String, password: String },
    RefreshToken(String),
}

impl Credentials {
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Password {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn refresh_token(token: impl Into<String>) -> Self {
        Credentials::RefreshToken(token.into())
    }

    pub fn grant_type(&self) -> GrantType {
        match self {
            Credentials::Password { .. } => GrantType::Password,
            Credentials::RefreshToken(_) => GrantType::RefreshToken,
        }
    }

    /// The grant-specific form parameters. Fails if a required value is blank.
    pub(crate) fn form_params(&self) -> Result<Vec<(&'static str, String)>> {
        match self {
            Credentials::Password { username, password } => Ok(vec![
                ("username", required("username", username)?),
                ("password", required("password", password)?),
            ]),
            Credentials::RefreshToken(token) => {
                Ok(vec![("refresh_token", required("refresh_token", token)?)])
            }
        }
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(Error::MissingField(field.to_string()));
    }
    Ok(value.to_string())
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::RefreshToken(_) => {
                f.debug_tuple("RefreshToken").field(&"<redacted>").finish()
            }
        }
    }
}

/// Token state held by a [`TokenClient`](crate::TokenClient).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenState {
    /// Empty until the first successful exchange
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    /// `None` means the token never expires on its own
    pub expires_at: Option<Instant>,
    /// Number of successful exchanges that produced this state
    pub generation: u64,
}

impl TokenState {
    /// Build the state following a successful exchange.
    ///
    /// A response without a refresh token keeps `fallback_refresh`, which is
    /// the refresh token just used or the previously stored one.
    pub(crate) fn from_response(
        response: TokenResponse,
        fallback_refresh: Option<String>,
        default_token_type: &str,
        now: Instant,
        generation: u64,
    ) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(fallback_refresh),
            token_type: response
                .token_type
                .unwrap_or_else(|| default_token_type.to_string()),
            // A lifetime too large to represent is treated as never expiring.
            expires_at: response
                .expires_in
                .and_then(|secs| now.checked_add(Duration::from_secs(secs))),
            generation,
        }
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Stored refresh token, ignoring blank values.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Whether the access token must be refreshed before use at `now`.
    pub fn needs_refresh(&self, now: Instant, margin: Duration) -> bool {
        if !self.has_access_token() {
            return true;
        }
        match self.expires_at {
            Some(expires_at) => match expires_at.checked_sub(margin) {
                Some(deadline) => now >= deadline,
                None => true,
            },
            None => false,
        }
    }

    /// Time left before the token expires, if it expires at all.
    pub fn expires_in(&self, now: Instant) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| expires_at.saturating_duration_since(now))
    }
}
