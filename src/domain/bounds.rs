//! Plausibility bounds.
//!
//! Upstream APIs occasionally publish placeholder or unit-confused
//! values (a zero load, a 9,999 $/MWh sentinel). A value outside its
//! provider-scoped range is treated as absent, never clamped.

use serde::Deserialize;

/// Inclusive numeric range a value must fall within to be published.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PlausibleRange {
    /// Lowest acceptable value.
    pub min: f64,
    /// Highest acceptable value.
    pub max: f64,
}

impl PlausibleRange {
    /// Create a range. Callers validate `min < max` at config load.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `value` is finite and within the range.
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    /// Pass `value` through if plausible, otherwise report it absent.
    pub fn admit(&self, value: f64) -> Option<f64> {
        self.contains(value).then_some(value)
    }
}
