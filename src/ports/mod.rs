//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `ProviderAdapter`: Grid-operator telemetry fetch and normalization
//! - `CredentialExchange`: OAuth bearer-token acquisition

pub mod credential_exchange;
pub mod provider;

pub use credential_exchange::CredentialExchange;
pub use provider::{Capabilities, FetchContext, ProbeEndpoint, ProviderAdapter, settle_metric};
