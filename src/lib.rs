//! # oauth2-password
//!
//! An OAuth2 client for the resource-owner password credentials grant, with
//! transparent token refresh.
//!
//! ## Overview
//!
//! [`TokenClient`] exchanges a username and password (or a refresh token) for
//! an access token at a provider's token endpoint, tracks when that token
//! expires, and refreshes it on demand. [`AuthenticationDecorator`] wraps any
//! [`HttpTransport`] so that outgoing requests carry the current bearer token
//! and recover from a single `401 Unauthorized` by refreshing and retrying
//! once.
//!
//! Networking is delegated to an [`HttpTransport`] implementation;
//! [`ReqwestTransport`] is provided.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use http::Method;
//! use oauth2_password::{
//!     AuthenticationDecorator, ClientConfig, Endpoint, HttpTransport, ReqwestTransport,
//!     Result, TokenClient,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ClientConfig::new("example", "https://auth.example.com/oauth/token")
//!         .with_client_credentials("my-app", "")
//!         .with_user_info_endpoint("https://api.example.com/me");
//!
//!     let client = Arc::new(TokenClient::with_reqwest(config)?);
//!     client.token("alice", "correct horse battery staple").await?;
//!
//!     let api = AuthenticationDecorator::new(client.clone(), ReqwestTransport::new());
//!     let request = api.create_request(&Endpoint::from("https://api.example.com/items"), Method::GET)?;
//!     let response = api.execute(request).await?;
//!     println!("{}: {}", response.status, response.body);
//!     Ok(())
//! }
//! ```
//!
//! ## Provider quirks
//!
//! Implement [`TokenExchangeHooks`] to add parameters to token requests,
//! inspect token responses, or parse a provider's user-info payload, and
//! install it with [`TokenClient::with_hooks`].

mod auth;
mod client;
mod config;
mod error;
mod hooks;
mod response;
mod token;
mod transport;

pub mod testutils;

pub use auth::{AuthState, AuthenticationDecorator};
pub use client::{RefreshOptions, TokenClient};
pub use config::{ClientConfig, Endpoint, DEFAULT_SAFETY_MARGIN, DEFAULT_TOKEN_TYPE};
pub use error::{Error, Result};
pub use hooks::{DefaultHooks, TokenExchangeHooks, UserInfo};
pub use response::{BodyFormat, ResponseFields, TokenResponse};
pub use token::{Credentials, GrantType, TokenState};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
