use std::sync::Arc;
use std::time::Duration;

use http::{
    header::{ACCEPT, AUTHORIZATION},
    Method,
};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    config::ClientConfig,
    error::{Error, Result},
    hooks::{DefaultHooks, TokenExchangeHooks, UserInfo},
    response::{ResponseFields, TokenResponse},
    token::{Credentials, TokenState},
    transport::{HttpTransport, ReqwestTransport},
};

/// Options for [`TokenClient::current_token_with`].
#[derive(Debug, Clone, Default)]
pub struct RefreshOptions {
    /// Refresh token to use instead of the stored one
    pub refresh_token: Option<String>,
    /// Refresh even if the current token is still valid
    pub force_update: bool,
    /// Overrides the configured expiration safety margin
    pub safety_margin: Option<Duration>,
}

impl RefreshOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn force(mut self) -> Self {
        self.force_update = true;
        self
    }

    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = Some(margin);
        self
    }
}

/// OAuth2 password-grant client.
///
/// Holds the token state for one user session. Token exchanges are
/// serialized: callers that find the token stale while another exchange is
/// in flight wait for it and reuse its result.
pub struct TokenClient {
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    hooks: Arc<dyn TokenExchangeHooks>,
    state: RwLock<TokenState>,
    exchange_lock: Mutex<()>,
}

impl TokenClient {
    pub fn new(config: ClientConfig, transport: impl HttpTransport + 'static) -> Result<Self> {
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client sharing an existing transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            hooks: Arc::new(DefaultHooks),
            state: RwLock::new(TokenState::default()),
            exchange_lock: Mutex::new(()),
        })
    }

    /// Create a client using a default `reqwest` transport.
    pub fn with_reqwest(config: ClientConfig) -> Result<Self> {
        Self::new(config, ReqwestTransport::new())
    }

    pub fn with_hooks(mut self, hooks: impl TokenExchangeHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        &self.config.provider_name
    }

    /// Snapshot of the current token state.
    pub async fn token_state(&self) -> TokenState {
        self.state.read().await.clone()
    }

    /// Seed the client with a previously obtained token state.
    pub async fn set_token_state(&self, token: TokenState) {
        let _guard = self.exchange_lock.lock().await;
        let mut state = self.state.write().await;
        let generation = state.generation + 1;
        *state = TokenState {
            generation,
            ..token
        };
    }

    /// Store a refresh token obtained elsewhere, e.g. from a previous session.
    pub async fn set_refresh_token(&self, refresh_token: impl Into<String>) {
        let _guard = self.exchange_lock.lock().await;
        self.state.write().await.refresh_token = Some(refresh_token.into());
    }

    pub async fn has_refresh_token(&self) -> bool {
        self.state.read().await.refresh_token().is_some()
    }

    /// Token type to present in `Authorization` headers.
    pub async fn token_type(&self) -> String {
        let state = self.state.read().await;
        if state.token_type.is_empty() {
            self.config.default_token_type.clone()
        } else {
            state.token_type.clone()
        }
    }

    /// Exchange credentials for a new token and store it.
    ///
    /// On failure the previously stored state is left untouched.
    pub async fn exchange(&self, credentials: Credentials) -> Result<TokenState> {
        let _guard = self.exchange_lock.lock().await;
        self.exchange_locked(&credentials).await
    }

    // Must be called with `exchange_lock` held.
    async fn exchange_locked(&self, credentials: &Credentials) -> Result<TokenState> {
        let grant = credentials.grant_type();
        let grant_params = credentials.form_params()?;

        let mut request = self
            .transport
            .create_request(&self.config.token_endpoint, Method::POST)?;
        request.add_param("grant_type", grant.as_str());
        if !self.config.client_id.trim().is_empty() {
            request.add_param("client_id", self.config.client_id.as_str());
        }
        if !self.config.client_secret.trim().is_empty() {
            request.add_param("client_secret", self.config.client_secret.as_str());
        }
        for (name, value) in grant_params {
            request.add_param(name, value);
        }
        request.set_header(ACCEPT, "application/json")?;

        self.hooks.before_token_request(grant, &mut request)?;

        debug!(
            "Requesting {} token from {}",
            grant,
            self.config.provider_name
        );
        let response = self.transport.execute(request).await?;

        let fields = ResponseFields::parse(&response.body);
        if let Some(error) = fields.error() {
            warn!("Token request rejected by {}: {}", self.config.provider_name, error);
            return Err(error);
        }
        if !response.is_success() {
            warn!(
                "Token request to {} failed with status {}",
                self.config.provider_name, response.status
            );
            return Err(Error::Provider(format!(
                "Token request failed with status: {}",
                response.status
            )));
        }
        let parsed = TokenResponse::from_fields(&fields)?;

        let new_state = {
            let mut state = self.state.write().await;
            let fallback_refresh = match credentials {
                Credentials::RefreshToken(token) => Some(token.clone()),
                Credentials::Password { .. } => state.refresh_token.clone(),
            };
            let new_state = TokenState::from_response(
                parsed,
                fallback_refresh,
                &self.config.default_token_type,
                Instant::now(),
                state.generation + 1,
            );
            *state = new_state.clone();
            new_state
        };

        info!(
            "Obtained {} token from {} ({} grant, expires in {:?})",
            new_state.token_type,
            self.config.provider_name,
            grant,
            new_state.expires_in(Instant::now())
        );
        self.hooks.after_token_response(&response, &new_state);
        Ok(new_state)
    }

    /// Log in with a username and password, returning the access token.
    pub async fn token(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<String> {
        let state = self
            .exchange(Credentials::password(username, password))
            .await?;
        Ok(state.access_token)
    }

    /// Exchange a refresh token, returning the new access token.
    pub async fn token_from_refresh(&self, refresh_token: impl Into<String>) -> Result<String> {
        let state = self
            .exchange(Credentials::refresh_token(refresh_token))
            .await?;
        Ok(state.access_token)
    }

    /// The current access token, refreshed first if it is missing or stale.
    pub async fn current_token(&self) -> Result<String> {
        self.current_token_with(RefreshOptions::default()).await
    }

    /// The current access token, refreshed according to `options`.
    ///
    /// A refresh is required when it is forced, when no access token has been
    /// fetched yet, or when the token expires within the safety margin. The
    /// refresh token is taken from `options`, else from the stored state.
    pub async fn current_token_with(&self, options: RefreshOptions) -> Result<String> {
        let margin = options
            .safety_margin
            .unwrap_or(self.config.expiration_safety_margin);

        let observed_generation = {
            let state = self.state.read().await;
            if !options.force_update && !state.needs_refresh(Instant::now(), margin) {
                return Ok(state.access_token.clone());
            }
            state.generation
        };

        let _guard = self.exchange_lock.lock().await;

        let refresh_token = {
            let state = self.state.read().await;
            // Another caller completed an exchange while we waited for the lock.
            if state.generation != observed_generation
                && !state.needs_refresh(Instant::now(), margin)
            {
                debug!("Reusing token refreshed by a concurrent caller");
                return Ok(state.access_token.clone());
            }
            options
                .refresh_token
                .filter(|t| !t.trim().is_empty())
                .or_else(|| state.refresh_token().map(str::to_string))
                .ok_or(Error::NoRefreshTokenAvailable)?
        };

        debug!(
            "Refreshing access token for {} (forced: {})",
            self.config.provider_name, options.force_update
        );
        let state = self
            .exchange_locked(&Credentials::RefreshToken(refresh_token))
            .await?;
        Ok(state.access_token)
    }

    /// `Authorization` header value for the current token, refreshing it first
    /// if needed.
    pub async fn authorization_header(&self) -> Result<String> {
        let access_token = self.current_token().await?;
        let token_type = self.token_type().await;
        Ok(format!("{token_type} {access_token}"))
    }

    /// Fetch information about the user.
    ///
    /// The credentials are only exchanged when no access token is held yet;
    /// otherwise the current token is used, refreshed if stale.
    pub async fn fetch_user_info(&self, credentials: Credentials) -> Result<UserInfo> {
        let endpoint = self.config.user_info_endpoint.as_ref().ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "No user info endpoint configured for {}",
                self.config.provider_name
            ))
        })?;

        if !self.state.read().await.has_access_token() {
            self.exchange(credentials).await?;
        }

        let mut request = self.transport.create_request(endpoint, Method::GET)?;
        request.set_header(AUTHORIZATION, &self.authorization_header().await?)?;
        self.hooks.before_user_info_request(&mut request)?;

        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            warn!(
                "User info request to {} failed with status {}",
                self.config.provider_name, response.status
            );
            return Err(Error::Provider(format!(
                "User info request failed with status: {}",
                response.status
            )));
        }

        let mut info = self.hooks.parse_user_info(&response.body)?;
        info.provider_name = self.config.provider_name.clone();
        Ok(info)
    }

    /// Fetch user information after exchanging a refresh token.
    pub async fn user_info_from_refresh(
        &self,
        refresh_token: impl Into<String>,
    ) -> Result<UserInfo> {
        let refresh_token = refresh_token.into();
        self.set_refresh_token(refresh_token.clone()).await;
        self.fetch_user_info(Credentials::RefreshToken(refresh_token))
            .await
    }
}
