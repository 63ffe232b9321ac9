//! Domain layer - Canonical telemetry schema and normalization rules.
//!
//! Pure types and functions: no I/O, no async. Provider adapters
//! build these types; the orchestrator and assembler move them around.
//! Every invariant of the canonical schema is enforced by a constructor
//! in this module rather than by individual adapters.

pub mod aggregate;
pub mod bounds;
pub mod pricing;
pub mod provider;
pub mod snapshot;

// Re-export core types for convenience
pub use aggregate::{AggregateResult, ProviderResult};
pub use bounds::PlausibleRange;
pub use pricing::select_system_price;
pub use provider::ProviderId;
pub use snapshot::{
    FuelType, GenerationMix, LoadObservation, LoadSnapshot, MarketConditions, PricingSnapshot,
    Provenance, source_tag,
};
