//! Canonical telemetry schema.
//!
//! Every provider adapter normalizes its upstream payload into these
//! three snapshot types. Constructors enforce the schema invariants:
//!
//! - `market_conditions` is always computed from `current_price`
//! - `peak_forecast_mw >= current_demand_mw`, and demand is never synthesized
//! - `total_generation_mw` is the sum of the fuel mapping and
//!   `renewable_percentage` is derived from that same mapping
//!
//! Serialization refuses non-finite floats instead of emitting `null`,
//! so the response assembler can detect and degrade around them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::Error as _;
use serde::{Serialize, Serializer};

use super::bounds::PlausibleRange;
use super::provider::ProviderId;

/// Below `baseline × LOW_RATIO` the market is reported as `low`.
pub const LOW_PRICE_RATIO: f64 = 0.8;
/// Above `baseline × HIGH_RATIO` the market is reported as `high`.
pub const HIGH_PRICE_RATIO: f64 = 1.5;

/// Average price multiple used when no price history is available.
pub const ESTIMATED_AVERAGE_MULTIPLE: f64 = 1.0;
/// Peak price multiple used when no price history is available.
pub const ESTIMATED_PEAK_MULTIPLE: f64 = 1.25;
/// Off-peak price multiple used when no price history is available.
pub const ESTIMATED_OFF_PEAK_MULTIPLE: f64 = 0.75;
/// Peak-demand multiple used when neither a forecast nor a window maximum exists.
pub const SYNTHETIC_PEAK_MULTIPLE: f64 = 1.15;

// ────────────────────────────────────────────
// Provenance
// ────────────────────────────────────────────

/// How a snapshot's values were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Every field parsed from upstream data.
    Api,
    /// Measured values parsed from upstream; a companion field synthesized.
    ApiDerived,
    /// Statistics estimated from a single observation.
    Estimated,
}

impl Provenance {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::ApiDerived => "api_derived",
            Self::Estimated => "estimated",
        }
    }
}

/// Build the `source` tag, e.g. `ercot_api_lmp` or `isone_api_derived_load`.
pub fn source_tag(provider: ProviderId, provenance: Provenance, metric: &str) -> String {
    format!("{provider}_{}_{metric}", provenance.as_str())
}

// ────────────────────────────────────────────
// Pricing
// ────────────────────────────────────────────

/// Price level relative to a provider's baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketConditions {
    Low,
    Normal,
    High,
}

impl MarketConditions {
    /// Classify `price` against `baseline` ($/MWh, must be positive).
    pub fn classify(price: f64, baseline: f64) -> Self {
        let ratio = price / baseline;
        if ratio < LOW_PRICE_RATIO {
            Self::Low
        } else if ratio > HIGH_PRICE_RATIO {
            Self::High
        } else {
            Self::Normal
        }
    }
}

/// Normalized price snapshot in currency/MWh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingSnapshot {
    #[serde(serialize_with = "finite")]
    pub current_price: f64,
    #[serde(serialize_with = "finite")]
    pub average_price: f64,
    #[serde(serialize_with = "finite")]
    pub peak_price: f64,
    #[serde(serialize_with = "finite")]
    pub off_peak_price: f64,
    pub market_conditions: MarketConditions,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl PricingSnapshot {
    /// Build a snapshot from the current price and the plausible prices
    /// seen across the fetched window (which should include `current`).
    ///
    /// With two or more window points the statistics come from the
    /// window; otherwise they are estimated as fixed multiples of the
    /// current price and the source is tagged `estimated`.
    pub fn from_window(
        provider: ProviderId,
        current: f64,
        window: &[f64],
        baseline: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let (average, peak, off_peak, provenance) = if window.len() >= 2 {
            let mean = window.iter().sum::<f64>() / window.len() as f64;
            let peak = window.iter().copied().fold(current, f64::max);
            let off_peak = window.iter().copied().fold(current, f64::min);
            (mean, peak, off_peak, Provenance::Api)
        } else {
            // Negative prices flip the multiples.
            let high = current * ESTIMATED_PEAK_MULTIPLE;
            let low = current * ESTIMATED_OFF_PEAK_MULTIPLE;
            (
                current * ESTIMATED_AVERAGE_MULTIPLE,
                high.max(low),
                high.min(low),
                Provenance::Estimated,
            )
        };

        Self {
            current_price: current,
            average_price: average,
            peak_price: peak,
            off_peak_price: off_peak,
            market_conditions: MarketConditions::classify(current, baseline),
            timestamp,
            source: source_tag(provider, provenance, "lmp"),
        }
    }
}

// ────────────────────────────────────────────
// Load
// ────────────────────────────────────────────

/// Raw demand observations extracted by an adapter before validation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadObservation {
    /// Most recent system demand (MW).
    pub current_mw: f64,
    /// Maximum demand across the fetched window, when the window has
    /// more than one observation.
    pub window_max_mw: Option<f64>,
    /// Upstream peak forecast for the operating day.
    pub forecast_peak_mw: Option<f64>,
    /// Upstream available generating capacity.
    pub capacity_mw: Option<f64>,
}

/// Normalized demand snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSnapshot {
    #[serde(serialize_with = "finite")]
    pub current_demand_mw: f64,
    #[serde(serialize_with = "finite")]
    pub peak_forecast_mw: f64,
    #[serde(serialize_with = "finite")]
    pub reserve_margin_pct: f64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl LoadSnapshot {
    /// Validate observations against `bounds` and derive the snapshot.
    ///
    /// Returns `None` when current demand or the window maximum falls
    /// outside `bounds`. The peak forecast prefers the upstream forecast,
    /// then the window maximum, then `current × SYNTHETIC_PEAK_MULTIPLE`.
    pub fn from_observation(
        provider: ProviderId,
        observation: LoadObservation,
        bounds: PlausibleRange,
        planning_reserve_margin_pct: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        let current = bounds.admit(observation.current_mw)?;
        if current <= 0.0 {
            return None;
        }
        if let Some(window_max) = observation.window_max_mw {
            bounds.admit(window_max)?;
        }

        let forecast = observation
            .forecast_peak_mw
            .filter(|f| bounds.contains(*f) && *f >= current);
        let observed = observation.window_max_mw.filter(|m| *m >= current);

        let (peak, provenance) = match forecast.or(observed) {
            Some(peak) => (peak, Provenance::Api),
            None => (current * SYNTHETIC_PEAK_MULTIPLE, Provenance::ApiDerived),
        };

        let reserve_margin_pct = observation
            .capacity_mw
            .filter(|c| c.is_finite() && *c > 0.0)
            .map_or(planning_reserve_margin_pct, |capacity| {
                (capacity - peak) / peak * 100.0
            });

        Some(Self {
            current_demand_mw: current,
            peak_forecast_mw: peak,
            reserve_margin_pct,
            timestamp,
            source: source_tag(provider, provenance, "load"),
        })
    }
}

// ────────────────────────────────────────────
// Generation mix
// ────────────────────────────────────────────

/// Canonical fuel categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    Gas,
    Wind,
    Solar,
    Hydro,
    Nuclear,
    Coal,
    Biomass,
    Other,
}

impl FuelType {
    /// Whether this fuel counts toward `renewable_percentage`.
    pub const fn is_renewable(self) -> bool {
        matches!(self, Self::Wind | Self::Solar | Self::Hydro | Self::Biomass)
    }

    /// Map an upstream fuel label onto a canonical category.
    ///
    /// Biomass terms are checked before `gas` so "Landfill Gas" lands in
    /// biomass. Unrecognized labels (geothermal, oil, storage, dual fuel)
    /// fall into `Other`.
    pub fn classify(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        let has = |needle: &str| label.contains(needle);

        if ["biomass", "biogas", "wood", "refuse", "landfill", "waste"]
            .iter()
            .any(|n| has(n))
        {
            Self::Biomass
        } else if has("nuclear") {
            Self::Nuclear
        } else if has("coal") {
            Self::Coal
        } else if has("wind") {
            Self::Wind
        } else if has("solar") {
            Self::Solar
        } else if has("hydro") || has("water") {
            Self::Hydro
        } else if has("gas") {
            Self::Gas
        } else {
            Self::Other
        }
    }
}

/// Normalized generation-by-fuel snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationMix {
    #[serde(serialize_with = "finite")]
    pub total_generation_mw: f64,
    #[serde(serialize_with = "finite_fuels")]
    pub fuels: BTreeMap<FuelType, f64>,
    #[serde(serialize_with = "finite")]
    pub renewable_percentage: f64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl GenerationMix {
    /// Accumulate per-fuel MW and derive the totals.
    ///
    /// Negative and non-finite entries are skipped. Returns `None` when
    /// nothing usable remains or the total falls outside `bounds`.
    pub fn from_fuels<I>(
        provider: ProviderId,
        entries: I,
        bounds: PlausibleRange,
        timestamp: DateTime<Utc>,
    ) -> Option<Self>
    where
        I: IntoIterator<Item = (FuelType, f64)>,
    {
        let mut fuels: BTreeMap<FuelType, f64> = BTreeMap::new();
        for (fuel, mw) in entries {
            if mw.is_finite() && mw >= 0.0 {
                *fuels.entry(fuel).or_insert(0.0) += mw;
            }
        }

        let total: f64 = fuels.values().sum();
        if total <= 0.0 || !bounds.contains(total) {
            return None;
        }

        let renewable: f64 = fuels
            .iter()
            .filter(|(fuel, _)| fuel.is_renewable())
            .map(|(_, mw)| mw)
            .sum();

        Some(Self {
            total_generation_mw: total,
            fuels,
            renewable_percentage: renewable / total * 100.0,
            timestamp,
            source: source_tag(provider, Provenance::Api, "fuel_mix"),
        })
    }

    /// MW attributed to `fuel`, zero when absent.
    pub fn mw(&self, fuel: FuelType) -> f64 {
        self.fuels.get(&fuel).copied().unwrap_or(0.0)
    }
}

// ────────────────────────────────────────────
// Finite-only serialization
// ────────────────────────────────────────────

#[allow(clippy::trivially_copy_pass_by_ref)]
fn finite<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        Err(S::Error::custom(format!("non-finite value {value}")))
    }
}

fn finite_fuels<S: Serializer>(
    fuels: &BTreeMap<FuelType, f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    if let Some((fuel, mw)) = fuels.iter().find(|(_, mw)| !mw.is_finite()) {
        return Err(S::Error::custom(format!(
            "non-finite MW {mw} for fuel {fuel:?}"
        )));
    }
    fuels.serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_market_conditions_follow_baseline() {
        assert_eq!(MarketConditions::classify(20.0, 40.0), MarketConditions::Low);
        assert_eq!(MarketConditions::classify(40.0, 40.0), MarketConditions::Normal);
        assert_eq!(MarketConditions::classify(61.0, 40.0), MarketConditions::High);
    }

    #[test]
    fn test_pricing_from_window_uses_statistics() {
        let p = PricingSnapshot::from_window(
            ProviderId::Pjm,
            30.0,
            &[10.0, 20.0, 30.0, 60.0],
            40.0,
            now(),
        );
        assert!((p.average_price - 30.0).abs() < 1e-9);
        assert!((p.peak_price - 60.0).abs() < 1e-9);
        assert!((p.off_peak_price - 10.0).abs() < 1e-9);
        assert_eq!(p.source, "pjm_api_lmp");
    }

    #[test]
    fn test_pricing_single_point_is_estimated() {
        let p = PricingSnapshot::from_window(ProviderId::Miso, 40.0, &[40.0], 35.0, now());
        assert!((p.peak_price - 50.0).abs() < 1e-9);
        assert!((p.off_peak_price - 30.0).abs() < 1e-9);
        assert_eq!(p.source, "miso_estimated_lmp");
    }

    #[test]
    fn test_negative_estimate_keeps_peak_above_off_peak() {
        let p = PricingSnapshot::from_window(ProviderId::Spp, -20.0, &[], 30.0, now());
        assert!((p.peak_price - -15.0).abs() < 1e-9);
        assert!((p.off_peak_price - -25.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_synthesizes_peak_but_keeps_api_demand() {
        let obs = LoadObservation {
            current_mw: 20_000.0,
            ..LoadObservation::default()
        };
        let load = LoadSnapshot::from_observation(
            ProviderId::IsoNe,
            obs,
            PlausibleRange::new(8_000.0, 30_000.0),
            15.0,
            now(),
        )
        .unwrap();
        assert!((load.current_demand_mw - 20_000.0).abs() < 1e-9);
        assert!((load.peak_forecast_mw - 23_000.0).abs() < 1e-6);
        assert!((load.reserve_margin_pct - 15.0).abs() < 1e-9);
        assert_eq!(load.source, "isone_api_derived_load");
    }

    #[test]
    fn test_load_rejects_window_below_floor() {
        let obs = LoadObservation {
            current_mw: 8_500.0,
            window_max_mw: Some(9_000.0),
            ..LoadObservation::default()
        };
        let load = LoadSnapshot::from_observation(
            ProviderId::Nyiso,
            obs,
            PlausibleRange::new(10_000.0, 35_000.0),
            15.0,
            now(),
        );
        assert!(load.is_none());
    }

    #[test]
    fn test_load_reserve_margin_from_capacity() {
        let obs = LoadObservation {
            current_mw: 10_000.0,
            forecast_peak_mw: Some(12_000.0),
            capacity_mw: Some(15_000.0),
            ..LoadObservation::default()
        };
        let load = LoadSnapshot::from_observation(
            ProviderId::Aeso,
            obs,
            PlausibleRange::new(5_000.0, 15_000.0),
            15.0,
            now(),
        )
        .unwrap();
        assert!((load.peak_forecast_mw - 12_000.0).abs() < 1e-9);
        assert!((load.reserve_margin_pct - 25.0).abs() < 1e-9);
        assert_eq!(load.source, "aeso_api_load");
    }

    #[test]
    fn test_landfill_gas_is_biomass() {
        assert_eq!(FuelType::classify("Landfill Gas"), FuelType::Biomass);
        assert_eq!(FuelType::classify("Natural Gas"), FuelType::Gas);
        assert_eq!(FuelType::classify("Large Hydro"), FuelType::Hydro);
        assert_eq!(FuelType::classify("Geothermal"), FuelType::Other);
    }

    #[test]
    fn test_generation_mix_totals_and_renewables() {
        let mix = GenerationMix::from_fuels(
            ProviderId::Caiso,
            [
                (FuelType::Gas, 10_000.0),
                (FuelType::Solar, 8_000.0),
                (FuelType::Wind, 2_000.0),
                (FuelType::Other, -500.0),
            ],
            PlausibleRange::new(5_000.0, 60_000.0),
            now(),
        )
        .unwrap();
        assert!((mix.total_generation_mw - 20_000.0).abs() < 1e-9);
        assert!((mix.renewable_percentage - 50.0).abs() < 1e-9);
        assert!(!mix.fuels.contains_key(&FuelType::Other));
    }

    #[test]
    fn test_generation_mix_rejects_implausible_total() {
        let mix = GenerationMix::from_fuels(
            ProviderId::Pjm,
            [(FuelType::Gas, 30_000.0)],
            PlausibleRange::new(50_000.0, 180_000.0),
            now(),
        );
        assert!(mix.is_none());
    }

    #[test]
    fn test_non_finite_value_fails_serialization() {
        let mut p = PricingSnapshot::from_window(ProviderId::Spp, 20.0, &[], 30.0, now());
        assert!(serde_json::to_value(&p).is_ok());
        p.average_price = f64::NAN;
        assert!(serde_json::to_value(&p).is_err());
    }
}
