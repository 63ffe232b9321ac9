//! Per-provider and per-invocation result containers.
//!
//! Absence is a first-class outcome: a provider result with every
//! metric `None` is valid output, not an error.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::provider::ProviderId;
use super::snapshot::{GenerationMix, LoadSnapshot, PricingSnapshot};

/// Whatever one provider task produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProviderResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingSnapshot>,
    #[serde(rename = "loadData", skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadSnapshot>,
    #[serde(rename = "generationMix", skip_serializing_if = "Option::is_none")]
    pub generation_mix: Option<GenerationMix>,
    /// Provider-specific fields (settlement point used, upstream ref ids, ...).
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl ProviderResult {
    /// Number of canonical metrics present.
    pub fn metric_count(&self) -> usize {
        usize::from(self.pricing.is_some())
            + usize::from(self.load.is_some())
            + usize::from(self.generation_mix.is_some())
    }

    /// True when no canonical metric is present.
    pub fn is_empty(&self) -> bool {
        self.metric_count() == 0
    }

    /// Attach a provider-specific field.
    pub fn insert_extra(&mut self, key: &str, value: impl Into<Value>) {
        self.extras.insert(key.to_string(), value.into());
    }
}

/// Result of one aggregation invocation, keyed by provider.
///
/// Serializes flat: `{"success": true, "ercot": {...}, "pjm": {...}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateResult {
    pub success: bool,
    pub error: Option<String>,
    pub providers: BTreeMap<ProviderId, ProviderResult>,
}

impl AggregateResult {
    /// Successful aggregate over the given provider results.
    pub const fn succeeded(providers: BTreeMap<ProviderId, ProviderResult>) -> Self {
        Self {
            success: true,
            error: None,
            providers,
        }
    }

    /// Catastrophic failure before orchestration could begin.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            providers: BTreeMap::new(),
        }
    }
}

impl Serialize for AggregateResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 1 + usize::from(self.error.is_some()) + self.providers.len();
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("success", &self.success)?;
        if let Some(error) = &self.error {
            map.serialize_entry("error", error)?;
        }
        for (id, result) in &self.providers {
            map.serialize_entry(id.as_str(), result)?;
        }
        map.end()
    }
}
