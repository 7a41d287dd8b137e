//! REST client used to check the token before connecting.

use bridge_core::{GatewayError, GatewayResult};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// The account the token belongs to
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl CurrentUser {
    /// `username#discriminator`, or just the username for accounts without one
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if !d.is_empty() && d != "0" => format!("{}#{d}", self.username),
            _ => self.username.clone(),
        }
    }
}

/// Minimal REST client
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl RestClient {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// `GET /users/@me`
    ///
    /// A 401 means the token is invalid; any other failure is reported as an
    /// HTTP error.
    pub async fn current_user(&self) -> GatewayResult<CurrentUser> {
        let url = format!("{}/users/@me", self.api_base);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                return Err(GatewayError::InvalidToken(
                    "GET /users/@me returned 401".to_string(),
                ))
            }
            status if !status.is_success() => {
                return Err(GatewayError::Http(format!("GET /users/@me returned {status}")))
            }
            _ => {}
        }

        let user: CurrentUser = response
            .json()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        debug!(user_id = %user.id, persona = %user.tag(), "fetched /users/@me");
        Ok(user)
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("api_base", &self.api_base)
            .field("token", &"***")
            .finish()
    }
}
