//! AESO - Alberta API Gateway
//!
//! Static `API-KEY` header. The pool price report sometimes answers
//! 200 with an empty report or blank `pool_price` strings while the
//! settlement run catches up, so pricing goes through a
//! [`RetryPolicy`] that accepts only a parsed price. Load and fuel mix
//! come from one current supply/demand summary.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::adapters::http::{fetch_json, number, pointer};
use crate::config::ProviderSettings;
use crate::domain::{GenerationMix, LoadSnapshot, PricingSnapshot, ProviderId, ProviderResult};
use crate::error::FetchError;
use crate::ports::{Capabilities, FetchContext, ProbeEndpoint, ProviderAdapter, settle_metric};
use crate::usecases::RetryPolicy;

use super::{load_from_series, mix_from_labels, pricing_from_series};

pub const POOL_PRICE_PATH: &str = "/poolprice-api/v1.1/price/poolPrice";
pub const SUPPLY_DEMAND_PATH: &str = "/currentsupplydemand-api/v1/csd/summary/current";
pub const POOL_PRICE_REPORT: &str = "Pool Price Report";

pub struct AesoAdapter;

/// Pool price with the report's companion figures.
#[derive(Debug, Clone, PartialEq)]
pub struct AesoPoolPrice {
  pub snapshot: PricingSnapshot,
  pub rolling_30day_avg: Option<f64>,
  pub forecast_pool_price: Option<f64>,
}

/// Load and fuel mix from one supply/demand summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AesoSupplyDemand {
  pub load: Option<LoadSnapshot>,
  pub generation_mix: Option<GenerationMix>,
}

fn report_window(now: DateTime<Utc>) -> [(&'static str, String); 2] {
  [
    ("startDate", (now - Duration::days(1)).format("%Y-%m-%d").to_string()),
    ("endDate", now.format("%Y-%m-%d").to_string()),
  ]
}

impl AesoAdapter {
  async fn fetch_pool_price(&self, ctx: &FetchContext) -> Result<Option<AesoPoolPrice>, FetchError> {
    let body = fetch_json(ctx, POOL_PRICE_PATH, &report_window(ctx.now)).await?;
    parse_pool_price(&body, &ctx.settings, ctx.now)
  }

  async fn fetch_pool_price_with_retry(
    &self,
    ctx: &FetchContext,
  ) -> Result<Option<AesoPoolPrice>, FetchError> {
    let policy = RetryPolicy::new(ctx.settings.retry_attempts, ctx.settings.retry_base_delay);
    policy
      .execute(|| self.fetch_pool_price(ctx), |r| matches!(r, Ok(Some(_))))
      .await
  }

  async fn fetch_supply_demand(&self, ctx: &FetchContext) -> Result<AesoSupplyDemand, FetchError> {
    let body = fetch_json(ctx, SUPPLY_DEMAND_PATH, &[]).await?;
    parse_supply_demand(&body, &ctx.settings, ctx.now)
  }
}

#[async_trait]
impl ProviderAdapter for AesoAdapter {
  fn id(&self) -> ProviderId {
    ProviderId::Aeso
  }

  fn capabilities(&self) -> Capabilities {
    Capabilities::ALL
  }

  async fn fetch_pricing(&self, ctx: &FetchContext) -> Result<Option<PricingSnapshot>, FetchError> {
    Ok(self.fetch_pool_price_with_retry(ctx).await?.map(|p| p.snapshot))
  }

  async fn fetch_load(&self, ctx: &FetchContext) -> Result<Option<LoadSnapshot>, FetchError> {
    Ok(self.fetch_supply_demand(ctx).await?.load)
  }

  async fn fetch_generation_mix(
    &self,
    ctx: &FetchContext,
  ) -> Result<Option<GenerationMix>, FetchError> {
    Ok(self.fetch_supply_demand(ctx).await?.generation_mix)
  }

  /// Two requests: pool price (with retry), then the summary that
  /// carries both load and fuel mix.
  async fn fetch(&self, ctx: &FetchContext) -> ProviderResult {
    let mut result = ProviderResult::default();

    let pool = settle_metric(self.id(), "pricing", self.fetch_pool_price_with_retry(ctx).await);
    if let Some(pool) = pool {
      if let Some(avg) = pool.rolling_30day_avg {
        result.insert_extra("rolling30DayAvg", avg);
      }
      if let Some(forecast) = pool.forecast_pool_price {
        result.insert_extra("forecastPoolPrice", forecast);
      }
      result.pricing = Some(pool.snapshot);
    }

    ctx.pace().await;

    if let Some(summary) =
      settle_metric(self.id(), "supply_demand", self.fetch_supply_demand(ctx).await.map(Some))
    {
      result.load = summary.load;
      result.generation_mix = summary.generation_mix;
    }

    result
  }

  fn probe_endpoints(&self, now: DateTime<Utc>) -> Vec<ProbeEndpoint> {
    let [(_, start), (_, end)] = report_window(now);
    vec![
      ProbeEndpoint {
        name: "pool_price",
        path: format!("{POOL_PRICE_PATH}?startDate={start}&endDate={end}"),
      },
      ProbeEndpoint {
        name: "current_supply_demand",
        path: SUPPLY_DEMAND_PATH.to_string(),
      },
    ]
  }
}

/// Latest settled pool price over the report window.
///
/// Returns `Ok(None)` for an empty report or one where no hour has a
/// settled price yet; the retry policy treats both as unacceptable.
pub fn parse_pool_price(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<AesoPoolPrice>, FetchError> {
  let rows = pointer(body, &["return", POOL_PRICE_REPORT])
    .and_then(Value::as_array)
    .ok_or_else(|| FetchError::malformed("aeso response without a pool price report"))?;

  let mut settled: Vec<(&Value, f64)> = rows
    .iter()
    .filter_map(|row| {
      let price = row.get("pool_price").and_then(number)?;
      settings.price_bounds.admit(price).map(|p| (row, p))
    })
    .collect();
  settled.sort_by(|(a, _), (b, _)| {
    let stamp = |row: &Value| row.get("begin_datetime_utc").and_then(Value::as_str).map(str::to_string);
    stamp(a).cmp(&stamp(b))
  });

  let series: Vec<f64> = settled.iter().map(|(_, price)| *price).collect();
  let Some(snapshot) = pricing_from_series(settings, &series, now) else {
    return Ok(None);
  };
  let latest = settled.last().map(|(row, _)| *row);

  let rolling_30day_avg = latest.and_then(|row| row.get("rolling_30day_avg").and_then(number));
  let forecast_pool_price = rows
    .iter()
    .rev()
    .find_map(|row| row.get("forecast_pool_price").and_then(number));

  Ok(Some(AesoPoolPrice {
    snapshot,
    rolling_30day_avg,
    forecast_pool_price,
  }))
}

/// Alberta internal load and net generation by fuel type.
pub fn parse_supply_demand(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<AesoSupplyDemand, FetchError> {
  let summary = body
    .get("return")
    .ok_or_else(|| FetchError::malformed("aeso summary without a return object"))?;

  let load = summary
    .get("alberta_internal_load")
    .and_then(number)
    .and_then(|current| {
      let capacity = summary.get("total_max_generation_capability").and_then(number);
      load_from_series(settings, &[current], None, capacity, now)
    });

  let generation_mix = summary
    .get("generation_data_list")
    .and_then(Value::as_array)
    .and_then(|list| {
      let entries = list.iter().filter_map(|entry| {
        Some((
          entry.get("fuel_type").and_then(Value::as_str)?,
          entry.get("aggregated_net_generation").and_then(number)?,
        ))
      });
      mix_from_labels(settings, entries, now)
    });

  Ok(AesoSupplyDemand {
    load,
    generation_mix,
  })
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::domain::FuelType;

  fn settings() -> ProviderSettings {
    ProviderSettings::defaults(ProviderId::Aeso)
  }

  #[test]
  fn test_pool_price_skips_unsettled_hours() {
    let body = json!({
      "return": {"Pool Price Report": [
        {"begin_datetime_utc": "2026-10-18 12:00", "pool_price": "55.10", "forecast_pool_price": "54.00", "rolling_30day_avg": "61.20"},
        {"begin_datetime_utc": "2026-10-18 13:00", "pool_price": "72.40", "forecast_pool_price": "70.00", "rolling_30day_avg": "61.35"},
        {"begin_datetime_utc": "2026-10-18 14:00", "pool_price": "", "forecast_pool_price": "80.25", "rolling_30day_avg": ""}
      ]}
    });
    let pool = parse_pool_price(&body, &settings(), Utc::now()).unwrap().unwrap();
    assert!((pool.snapshot.current_price - 72.4).abs() < 1e-9);
    assert_eq!(pool.rolling_30day_avg, Some(61.35));
    assert_eq!(pool.forecast_pool_price, Some(80.25));
    assert_eq!(pool.snapshot.source, "aeso_api_lmp");
  }

  #[test]
  fn test_empty_report_is_not_acceptable() {
    let body = json!({ "return": {"Pool Price Report": []} });
    assert!(parse_pool_price(&body, &settings(), Utc::now()).unwrap().is_none());
  }

  #[test]
  fn test_supply_demand_derives_reserve_from_capability() {
    let body = json!({
      "return": {
        "alberta_internal_load": 10_000,
        "total_max_generation_capability": 13_000,
        "generation_data_list": [
          {"fuel_type": "GAS", "aggregated_net_generation": 7_000, "aggregated_maximum_capability": 9_000},
          {"fuel_type": "WIND", "aggregated_net_generation": 2_000, "aggregated_maximum_capability": 4_000},
          {"fuel_type": "HYDRO", "aggregated_net_generation": 400, "aggregated_maximum_capability": 900},
          {"fuel_type": "ENERGY STORAGE", "aggregated_net_generation": -50, "aggregated_maximum_capability": 200}
        ]
      }
    });
    let summary = parse_supply_demand(&body, &settings(), Utc::now()).unwrap();

    let load = summary.load.unwrap();
    assert!((load.peak_forecast_mw - 11_500.0).abs() < 1e-9);
    assert!((load.reserve_margin_pct - (1_500.0 / 11_500.0 * 100.0)).abs() < 1e-9);

    let mix = summary.generation_mix.unwrap();
    assert!((mix.total_generation_mw - 9_400.0).abs() < 1e-9);
    assert!((mix.mw(FuelType::Wind) - 2_000.0).abs() < 1e-9);
  }
}
