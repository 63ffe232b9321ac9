//! Use Cases Layer - Aggregation Workflows
//!
//! Orchestrates port interfaces into the service's operations.
//!
//! Use cases:
//! - `FetchOrchestrator`: Concurrent settle-all provider fan-out
//! - `TokenCache`: Process-lifetime bearer token reuse
//! - `RetryPolicy`: Predicate-driven re-fetch with backoff
//! - `ResponseAssembler`: Aggregate serialization with degradation
//! - `diagnostics`: Per-endpoint upstream connectivity probe

pub mod assembler;
pub mod diagnostics;
pub mod orchestrator;
pub mod retry;
pub mod token_cache;

pub use assembler::{AssembledResponse, ResponseAssembler};
pub use orchestrator::{FetchOrchestrator, ProviderRegistration, TaskOutcome};
pub use retry::RetryPolicy;
pub use token_cache::{TOKEN_EXCHANGE_TIMEOUT, TOKEN_TTL, TokenCache, TokenCacheEntry};
