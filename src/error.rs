//! Error taxonomy.
//!
//! Provider-level errors (`FetchError`, `AuthError`) never escape a
//! provider task: the orchestrator converts them into absent metrics
//! plus a log line. Only `OrchestrationError` reaches the HTTP layer,
//! where it becomes a 503.

use std::time::Duration;

use thiserror::Error;

use crate::domain::ProviderId;

/// Failure while fetching or parsing one metric from one provider.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Payload did not have the shape this provider's parser expects.
    #[error("unexpected payload shape: {0}")]
    Malformed(String),

    /// The provider needs a bearer token and none was supplied.
    #[error("provider requires a bearer token but none was issued")]
    MissingToken,
}

impl FetchError {
    /// Shorthand for [`FetchError::Malformed`].
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed(detail.into())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Failure of the OAuth resource-owner-password-credentials exchange.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Token endpoint rejected the credentials.
    #[error("token endpoint rejected credentials with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Token endpoint could not be reached.
    #[error("token endpoint unreachable: {0}")]
    Transport(String),

    /// Exchange did not finish within its timeout.
    #[error("token exchange timed out after {0:?}")]
    TimedOut(Duration),

    /// Token endpoint answered 2xx without a usable token.
    #[error("token response carried no usable token")]
    MissingToken,
}

/// Failure that prevents an aggregation from starting at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestrationError {
    #[error("no providers registered")]
    NoProviders,

    #[error("provider {0} registered more than once")]
    DuplicateProvider(ProviderId),
}
