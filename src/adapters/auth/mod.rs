//! Authentication Adapters
//!
//! Implementations of the `CredentialExchange` port.

pub mod ropc;

pub use ropc::RopcExchange;
