//! ROPC Exchange - OAuth Password Grant Against Azure AD B2C
//!
//! Trades a username and password for a bearer token with a single
//! form POST. The B2C policy answers with `access_token` for some
//! tenants and only `id_token` for others; either is accepted.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::AuthError;
use crate::ports::CredentialExchange;

/// Public client id registered for the ERCOT public API.
pub const ERCOT_CLIENT_ID: &str = "fec253ea-0d06-4272-a5e6-b478baeecd70";

/// Default bound on the token POST.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token: Option<String>,
  id_token: Option<String>,
}

/// Resource-owner password credentials exchange.
pub struct RopcExchange {
  http: reqwest::Client,
  token_url: String,
  client_id: String,
  username: String,
  password: String,
  timeout: Duration,
}

impl RopcExchange {
  pub fn new(
    http: reqwest::Client,
    token_url: impl Into<String>,
    username: impl Into<String>,
    password: impl Into<String>,
  ) -> Self {
    Self {
      http,
      token_url: token_url.into(),
      client_id: ERCOT_CLIENT_ID.to_string(),
      username: username.into(),
      password: password.into(),
      timeout: DEFAULT_EXCHANGE_TIMEOUT,
    }
  }

  /// Bound the token POST by `timeout`.
  #[must_use]
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }
}

#[async_trait]
impl CredentialExchange for RopcExchange {
  #[instrument(skip(self), fields(token_url = %self.token_url))]
  async fn exchange(&self) -> Result<String, AuthError> {
    let scope = format!("openid {} offline_access", self.client_id);
    let form = [
      ("grant_type", "password"),
      ("username", self.username.as_str()),
      ("password", self.password.as_str()),
      ("client_id", self.client_id.as_str()),
      ("scope", scope.as_str()),
      ("response_type", "id_token"),
    ];

    let response = self
      .http
      .post(&self.token_url)
      .timeout(self.timeout)
      .form(&form)
      .send()
      .await
      .map_err(|e| {
        if e.is_timeout() {
          AuthError::TimedOut(self.timeout)
        } else {
          AuthError::Transport(e.to_string())
        }
      })?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(AuthError::Rejected {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
      });
    }

    let token: TokenResponse = response
      .json()
      .await
      .map_err(|e| AuthError::Transport(e.to_string()))?;

    let token = token
      .access_token
      .or(token.id_token)
      .filter(|t| !t.is_empty())
      .ok_or(AuthError::MissingToken)?;

    debug!("Password grant succeeded");
    Ok(token)
  }
}
