//! Upstream HTTP Helpers - Client, Auth Headers, JSON Fetch
//!
//! Shared plumbing for every provider adapter: builds the pooled
//! reqwest client, applies a provider's credentials to a request, and
//! turns a GET into parsed JSON or a typed [`FetchError`].

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use crate::config::HttpConfig;
use crate::config::credentials::SUBSCRIPTION_KEY_HEADER;
use crate::config::Credentials;
use crate::error::FetchError;
use crate::ports::FetchContext;

/// Build the shared outbound client.
///
/// The client-wide timeout is a backstop. Data requests are bounded
/// tighter by their provider's deadline in [`fetch_json`], since a
/// timed-out provider task keeps running after it is abandoned.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
  Client::builder()
    .user_agent(config.user_agent.as_str())
    .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
    .timeout(Duration::from_millis(config.request_timeout_ms))
    .pool_max_idle_per_host(config.pool_max_idle_per_host)
    .build()
    .context("Failed to build HTTP client")
}

/// Join a base URL and a path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
  if path.is_empty() || path.starts_with('?') {
    return format!("{base}{path}");
  }
  format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Apply the credentials that never change between requests.
///
/// Password-grant providers get their subscription key here; the
/// bearer token is added by [`apply_auth`].
pub fn apply_static_auth(request: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
  match credentials {
    Credentials::Anonymous => request,
    Credentials::ApiKey { header, key } => request.header(*header, key),
    Credentials::Basic { username, password } => request.basic_auth(username, Some(password)),
    Credentials::PasswordGrant {
      subscription_key, ..
    } => request.header(SUBSCRIPTION_KEY_HEADER, subscription_key),
  }
}

/// Apply static credentials plus the bearer token when one is required.
pub fn apply_auth(
  request: RequestBuilder,
  credentials: &Credentials,
  bearer: Option<&str>,
) -> Result<RequestBuilder, FetchError> {
  let request = apply_static_auth(request, credentials);
  if credentials.requires_token() {
    let token = bearer.ok_or(FetchError::MissingToken)?;
    return Ok(request.bearer_auth(token));
  }
  Ok(request)
}

/// GET `path` relative to the provider's base URL and parse the body.
pub async fn fetch_json(
  ctx: &FetchContext,
  path: &str,
  query: &[(&str, String)],
) -> Result<Value, FetchError> {
  let url = join_url(&ctx.settings.base_url, path);
  let request = ctx
    .http
    .get(&url)
    .timeout(ctx.settings.timeout)
    .query(query)
    .header(ACCEPT, "application/json");
  let request = apply_auth(request, &ctx.credentials, ctx.bearer.as_deref())?;

  let response = request.send().await.map_err(|source| FetchError::Transport {
    url: url.clone(),
    source,
  })?;

  let status = response.status();
  if !status.is_success() {
    return Err(FetchError::Status {
      url,
      status: status.as_u16(),
    });
  }

  let bytes = response
    .bytes()
    .await
    .map_err(|source| FetchError::Transport {
      url: url.clone(),
      source,
    })?;
  debug!(url = %url, bytes = bytes.len(), "Upstream payload received");

  Ok(serde_json::from_slice(&bytes)?)
}

/// Read a JSON number or a numeric string (`"1,234.5"` included).
pub fn number(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().replace(',', "").parse().ok(),
    _ => None,
  }
}

/// Descend `path` through nested objects.
pub fn pointer<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
  path.iter().try_fold(value, |node, key| node.get(*key))
}

/// Treat a single object the same as a one-element array.
///
/// XML-derived payloads collapse one-element lists into a bare object.
pub fn as_list(value: &Value) -> Vec<&Value> {
  match value {
    Value::Array(items) => items.iter().collect(),
    Value::Null => Vec::new(),
    other => vec![other],
  }
}
