//! Credential Exchange Port - OAuth Token Acquisition Interface
//!
//! Defines the trait for trading long-lived credentials for a
//! short-lived bearer token. The token cache depends only on this
//! trait, so exchanges can be counted and faked in tests.

use async_trait::async_trait;

use crate::error::AuthError;

/// Trait for bearer-token issuers.
#[async_trait]
pub trait CredentialExchange: Send + Sync + 'static {
  /// Perform one exchange and return the issued token.
  ///
  /// # Errors
  /// Returns [`AuthError`] if the issuer rejects the credentials,
  /// is unreachable, or answers without a token.
  async fn exchange(&self) -> Result<String, AuthError>;
}
