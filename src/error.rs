use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    #[error("Token never fetched and no refresh token provided")]
    NoRefreshTokenAvailable,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    /// Whether the failure came from the network layer rather than the
    /// provider or the caller.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Build a [`Error::Provider`] from an OAuth error payload.
    pub(crate) fn provider(error: &str, description: Option<&str>) -> Self {
        match description {
            Some(description) if !description.is_empty() => {
                Error::Provider(format!("{error}: {description}"))
            }
            _ => Error::Provider(error.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_message() {
        assert_eq!(
            Error::provider("invalid_grant", None),
            Error::Provider("invalid_grant".to_string())
        );
        assert_eq!(
            Error::provider("invalid_grant", Some("bad password")).to_string(),
            "Provider error: invalid_grant: bad password"
        );
        assert_eq!(
            Error::provider("invalid_grant", Some("")),
            Error::Provider("invalid_grant".to_string())
        );
    }

    #[test]
    fn test_is_transport() {
        assert!(Error::Transport("connection refused".into()).is_transport());
        assert!(!Error::NoRefreshTokenAvailable.is_transport());
    }
}
