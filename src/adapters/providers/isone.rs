//! ISO-NE - Web Services v1.1
//!
//! HTTP basic authentication. Payloads are XML-derived JSON: element
//! text appears under `$` and attributes under `@Name`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::adapters::http::{as_list, fetch_json, number, pointer};
use crate::config::ProviderSettings;
use crate::domain::{GenerationMix, LoadSnapshot, PricingSnapshot, ProviderId, select_system_price};
use crate::error::FetchError;
use crate::ports::{Capabilities, FetchContext, ProbeEndpoint, ProviderAdapter};

use super::{load_from_series, mix_from_labels, pricing_from_series};

pub const LMP_PATH: &str = "/fiveminutelmp/current.json";
pub const LOAD_PATH: &str = "/fiveminutesystemload/current.json";
pub const FUEL_PATH: &str = "/genfuelmix/current.json";
/// The New England internal hub location.
pub const INTERNAL_HUB: &str = ".H.INTERNAL_HUB";

pub struct IsoNeAdapter;

#[async_trait]
impl ProviderAdapter for IsoNeAdapter {
  fn id(&self) -> ProviderId {
    ProviderId::IsoNe
  }

  fn capabilities(&self) -> Capabilities {
    Capabilities::ALL
  }

  async fn fetch_pricing(&self, ctx: &FetchContext) -> Result<Option<PricingSnapshot>, FetchError> {
    let body = fetch_json(ctx, LMP_PATH, &[]).await?;
    parse_pricing(&body, &ctx.settings, ctx.now)
  }

  async fn fetch_load(&self, ctx: &FetchContext) -> Result<Option<LoadSnapshot>, FetchError> {
    let body = fetch_json(ctx, LOAD_PATH, &[]).await?;
    parse_load(&body, &ctx.settings, ctx.now)
  }

  async fn fetch_generation_mix(
    &self,
    ctx: &FetchContext,
  ) -> Result<Option<GenerationMix>, FetchError> {
    let body = fetch_json(ctx, FUEL_PATH, &[]).await?;
    parse_generation_mix(&body, &ctx.settings, ctx.now)
  }

  fn probe_endpoints(&self, _now: DateTime<Utc>) -> Vec<ProbeEndpoint> {
    vec![
      ProbeEndpoint {
        name: "five_minute_lmp",
        path: LMP_PATH.to_string(),
      },
      ProbeEndpoint {
        name: "five_minute_system_load",
        path: LOAD_PATH.to_string(),
      },
      ProbeEndpoint {
        name: "gen_fuel_mix",
        path: FUEL_PATH.to_string(),
      },
    ]
  }
}

/// Location name from either `{"$": name}` or a bare string.
fn location(entry: &Value) -> Option<&str> {
  let node = entry.get("Location")?;
  node.get("$").and_then(Value::as_str).or_else(|| node.as_str())
}

/// Internal hub price, else the average of plausible locations.
pub fn parse_pricing(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<PricingSnapshot>, FetchError> {
  let lmps = pointer(body, &["FiveMinLmps", "FiveMinLmp"])
    .ok_or_else(|| FetchError::malformed("isone lmp without FiveMinLmps.FiveMinLmp"))?;

  let nodes = as_list(lmps)
    .into_iter()
    .filter_map(|entry| Some((location(entry)?, entry.get("LmpTotal").and_then(number)?)));

  let series: Vec<f64> = select_system_price(nodes, Some(INTERNAL_HUB), settings.price_bounds)
    .into_iter()
    .collect();

  Ok(pricing_from_series(settings, &series, now))
}

/// Current five-minute system load.
pub fn parse_load(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<LoadSnapshot>, FetchError> {
  let loads = body
    .get("FiveMinSystemLoad")
    .ok_or_else(|| FetchError::malformed("isone load without FiveMinSystemLoad"))?;

  let series: Vec<f64> = as_list(loads)
    .into_iter()
    .filter_map(|entry| entry.get("LoadMw").and_then(number))
    .collect();

  Ok(load_from_series(settings, &series, None, None, now))
}

/// Current generation by fuel category.
pub fn parse_generation_mix(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<GenerationMix>, FetchError> {
  let mixes = pointer(body, &["GenFuelMixes", "GenFuelMix"])
    .ok_or_else(|| FetchError::malformed("isone fuel mix without GenFuelMixes.GenFuelMix"))?;

  let entries = as_list(mixes).into_iter().filter_map(|entry| {
    Some((
      entry.get("FuelCategory").and_then(Value::as_str)?,
      entry.get("GenMw").and_then(number)?,
    ))
  });

  Ok(mix_from_labels(settings, entries, now))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::domain::FuelType;

  fn settings() -> ProviderSettings {
    ProviderSettings::defaults(ProviderId::IsoNe)
  }

  #[test]
  fn test_internal_hub_wins() {
    let body = json!({
      "FiveMinLmps": {"FiveMinLmp": [
        {"BeginDate": "2026-10-18T14:00:00.000-04:00", "Location": {"$": ".Z.MAINE", "@LocId": "4001"}, "LmpTotal": 28.0},
        {"BeginDate": "2026-10-18T14:00:00.000-04:00", "Location": {"$": ".H.INTERNAL_HUB", "@LocId": "4000"}, "LmpTotal": 33.75},
        {"BeginDate": "2026-10-18T14:00:00.000-04:00", "Location": {"$": ".Z.CONNECTICUT", "@LocId": "4004"}, "LmpTotal": 41.0}
      ]}
    });
    let pricing = parse_pricing(&body, &settings(), Utc::now()).unwrap().unwrap();
    assert!((pricing.current_price - 33.75).abs() < 1e-9);
    assert_eq!(pricing.source, "isone_estimated_lmp");
  }

  #[test]
  fn test_single_load_object() {
    let body = json!({ "FiveMinSystemLoad": {"BeginDate": "2026-10-18T14:00:00.000-04:00", "LoadMw": 14_250.5} });
    let load = parse_load(&body, &settings(), Utc::now()).unwrap().unwrap();
    assert!((load.current_demand_mw - 14_250.5).abs() < 1e-9);
    assert_eq!(load.source, "isone_api_derived_load");
  }

  #[test]
  fn test_wood_refuse_and_landfill_count_as_biomass() {
    let body = json!({
      "GenFuelMixes": {"GenFuelMix": [
        {"FuelCategory": "Natural Gas", "GenMw": 5_500},
        {"FuelCategory": "Nuclear", "GenMw": 3_300},
        {"FuelCategory": "Wood", "GenMw": 200},
        {"FuelCategory": "Refuse", "GenMw": 250},
        {"FuelCategory": "Landfill Gas", "GenMw": 50},
        {"FuelCategory": "Hydro", "GenMw": 700}
      ]}
    });
    let mix = parse_generation_mix(&body, &settings(), Utc::now()).unwrap().unwrap();
    assert!((mix.mw(FuelType::Biomass) - 500.0).abs() < 1e-9);
    assert!((mix.mw(FuelType::Gas) - 5_500.0).abs() < 1e-9);
    assert!((mix.renewable_percentage - 12.0).abs() < 1e-9);
  }
}
