//! Per-provider settings and their built-in defaults.
//!
//! Deadlines, rate-limit delays, baselines, and plausibility bounds
//! are empirically tuned per operator. They live here as named
//! defaults and can be overridden field by field from a
//! `[providers.<id>]` table in `config.toml`.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::{PlausibleRange, ProviderId};

/// Price bounds shared by most operators ($/MWh).
pub const DEFAULT_PRICE_BOUNDS: PlausibleRange = PlausibleRange::new(-500.0, 3000.0);
/// AESO pool price is floored at 0 and capped at 999.99 CAD/MWh.
pub const AESO_PRICE_BOUNDS: PlausibleRange = PlausibleRange::new(0.0, 1000.0);

pub const ERCOT_TOKEN_URL: &str =
    "https://ercotb2c.b2clogin.com/ercotb2c.onmicrosoft.com/B2C_1_PUBAPI-ROPC-FLOW/oauth2/v2.0/token";

/// Default number of attempts for providers wrapped in a retry policy.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Default base delay; attempt `n` waits `base × 2^n`.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Fully resolved settings for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub id: ProviderId,
    /// Disabled providers are not registered with the orchestrator.
    pub enabled: bool,
    /// Deadline for the whole provider task.
    pub timeout: Duration,
    /// Pause between sequential sub-requests to the same provider.
    pub inter_request_delay: Duration,
    pub base_url: String,
    /// OAuth token endpoint, for providers using the password grant.
    pub token_url: Option<String>,
    /// Reference price for `market_conditions` classification.
    pub baseline_price: f64,
    pub price_bounds: PlausibleRange,
    pub load_bounds: PlausibleRange,
    pub generation_bounds: PlausibleRange,
    /// Reserve margin reported when upstream publishes no capacity.
    pub planning_reserve_margin_pct: f64,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
}

impl ProviderSettings {
    /// Built-in defaults for `id`.
    pub fn defaults(id: ProviderId) -> Self {
        let base = |timeout_secs: u64,
                    delay_ms: u64,
                    base_url: &str,
                    baseline_price: f64,
                    load: (f64, f64),
                    generation: (f64, f64),
                    reserve: f64| Self {
            id,
            enabled: true,
            timeout: Duration::from_secs(timeout_secs),
            inter_request_delay: Duration::from_millis(delay_ms),
            base_url: base_url.to_string(),
            token_url: None,
            baseline_price,
            price_bounds: DEFAULT_PRICE_BOUNDS,
            load_bounds: PlausibleRange::new(load.0, load.1),
            generation_bounds: PlausibleRange::new(generation.0, generation.1),
            planning_reserve_margin_pct: reserve,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        };

        match id {
            ProviderId::Ercot => Self {
                token_url: Some(ERCOT_TOKEN_URL.to_string()),
                ..base(
                    25,
                    2_000,
                    "https://api.ercot.com/api/public-reports",
                    35.0,
                    (10_000.0, 90_000.0),
                    (10_000.0, 100_000.0),
                    13.75,
                )
            },
            ProviderId::Pjm => base(
                30,
                3_000,
                "https://api.pjm.com/api/v1",
                40.0,
                (20_000.0, 170_000.0),
                (50_000.0, 180_000.0),
                14.7,
            ),
            ProviderId::Caiso => base(
                10,
                500,
                "https://www.caiso.com/outlook/current",
                45.0,
                (10_000.0, 55_000.0),
                (5_000.0, 60_000.0),
                15.0,
            ),
            ProviderId::Miso => base(
                15,
                1_000,
                "https://api.misoenergy.org/MISORTWDDataBroker/DataBrokerServices.asmx",
                35.0,
                (40_000.0, 140_000.0),
                (30_000.0, 150_000.0),
                17.9,
            ),
            ProviderId::Nyiso => base(
                12,
                1_000,
                "https://mis.nyiso.com/public/api",
                45.0,
                (10_000.0, 35_000.0),
                (5_000.0, 40_000.0),
                15.0,
            ),
            ProviderId::IsoNe => base(
                10,
                500,
                "https://webservices.iso-ne.com/api/v1.1",
                50.0,
                (8_000.0, 30_000.0),
                (5_000.0, 30_000.0),
                15.0,
            ),
            ProviderId::Spp => base(
                15,
                1_000,
                "https://portal.spp.org/chart-api",
                30.0,
                (15_000.0, 60_000.0),
                (10_000.0, 70_000.0),
                16.0,
            ),
            ProviderId::Aeso => Self {
                price_bounds: AESO_PRICE_BOUNDS,
                ..base(
                    20,
                    1_000,
                    "https://apimgw.aeso.ca/public",
                    70.0,
                    (5_000.0, 15_000.0),
                    (3_000.0, 20_000.0),
                    15.0,
                )
            },
        }
    }

    /// Defaults for `id` with any overridden fields applied.
    pub fn resolve(id: ProviderId, overrides: Option<&ProviderOverrides>) -> Self {
        let mut settings = Self::defaults(id);
        let Some(o) = overrides else {
            return settings;
        };

        if let Some(enabled) = o.enabled {
            settings.enabled = enabled;
        }
        if let Some(secs) = o.timeout_secs {
            settings.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = o.inter_request_delay_ms {
            settings.inter_request_delay = Duration::from_millis(ms);
        }
        if let Some(url) = &o.base_url {
            settings.base_url.clone_from(url);
        }
        if let Some(url) = &o.token_url {
            settings.token_url = Some(url.clone());
        }
        if let Some(price) = o.baseline_price {
            settings.baseline_price = price;
        }
        if let Some(bounds) = o.price_bounds {
            settings.price_bounds = bounds;
        }
        if let Some(bounds) = o.load_bounds {
            settings.load_bounds = bounds;
        }
        if let Some(bounds) = o.generation_bounds {
            settings.generation_bounds = bounds;
        }
        if let Some(pct) = o.planning_reserve_margin_pct {
            settings.planning_reserve_margin_pct = pct;
        }
        if let Some(attempts) = o.retry_attempts {
            settings.retry_attempts = attempts;
        }
        if let Some(ms) = o.retry_base_delay_ms {
            settings.retry_base_delay = Duration::from_millis(ms);
        }
        settings
    }
}

/// Optional per-field overrides from `[providers.<id>]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderOverrides {
    pub enabled: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub inter_request_delay_ms: Option<u64>,
    pub base_url: Option<String>,
    pub token_url: Option<String>,
    pub baseline_price: Option<f64>,
    pub price_bounds: Option<PlausibleRange>,
    pub load_bounds: Option<PlausibleRange>,
    pub generation_bounds: Option<PlausibleRange>,
    pub planning_reserve_margin_pct: Option<f64>,
    pub retry_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_ercot_has_token_url() {
        for id in ProviderId::ALL {
            let settings = ProviderSettings::defaults(id);
            assert_eq!(settings.token_url.is_some(), id == ProviderId::Ercot);
        }
    }

    #[test]
    fn test_deadlines_are_within_observed_range() {
        for id in ProviderId::ALL {
            let timeout = ProviderSettings::defaults(id).timeout;
            assert!(timeout >= Duration::from_secs(8) && timeout <= Duration::from_secs(30));
        }
    }

    #[test]
    fn test_overrides_replace_only_given_fields() {
        let overrides = ProviderOverrides {
            timeout_secs: Some(3),
            load_bounds: Some(PlausibleRange::new(1.0, 2.0)),
            ..ProviderOverrides::default()
        };
        let settings = ProviderSettings::resolve(ProviderId::Pjm, Some(&overrides));
        let defaults = ProviderSettings::defaults(ProviderId::Pjm);

        assert_eq!(settings.timeout, Duration::from_secs(3));
        assert_eq!(settings.load_bounds, PlausibleRange::new(1.0, 2.0));
        assert_eq!(settings.base_url, defaults.base_url);
        assert_eq!(settings.generation_bounds, defaults.generation_bounds);
    }
}
