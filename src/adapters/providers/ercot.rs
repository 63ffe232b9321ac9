//! ERCOT - Texas Public Reports API
//!
//! Bearer token (password grant) plus subscription key on every
//! request. Report rows arrive as positional arrays under `data`, so
//! fields are read by index.
//!
//! Settlement point prices (NP6-905-CD):
//! `[deliveryDate, deliveryHour, deliveryInterval, settlementPoint, settlementPointType, price, dstFlag]`
//!
//! Actual system load by weather zone (NP6-345-CD):
//! `[operatingDay, hourEnding, coast, east, farWest, north, northCentral, southCentral, southern, west, total, dstFlag]`

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::adapters::http::{fetch_json, number};
use crate::config::ProviderSettings;
use crate::domain::{LoadSnapshot, PricingSnapshot, ProviderId, select_system_price};
use crate::error::FetchError;
use crate::ports::{Capabilities, FetchContext, ProbeEndpoint, ProviderAdapter};

use super::{load_from_series, pricing_from_series};

pub const PRICE_PATH: &str = "/np6-905-cd/spp_node_zone_hub";
pub const LOAD_PATH: &str = "/np6-345-cd/act_sys_load_by_wzn";
/// Hub-average settlement point; wins over any node average.
pub const HUB_AVERAGE: &str = "HB_HUBAVG";

const PRICE_POINT: usize = 3;
const PRICE_VALUE: usize = 5;
const LOAD_HOUR: usize = 1;
const LOAD_TOTAL: usize = 10;

pub struct ErcotAdapter;

fn window(now: DateTime<Utc>) -> (String, String) {
  let from = (now - Duration::days(1)).format("%Y-%m-%d").to_string();
  let to = now.format("%Y-%m-%d").to_string();
  (from, to)
}

#[async_trait]
impl ProviderAdapter for ErcotAdapter {
  fn id(&self) -> ProviderId {
    ProviderId::Ercot
  }

  fn capabilities(&self) -> Capabilities {
    Capabilities {
      pricing: true,
      load: true,
      generation_mix: false,
    }
  }

  async fn fetch_pricing(&self, ctx: &FetchContext) -> Result<Option<PricingSnapshot>, FetchError> {
    let (from, to) = window(ctx.now);
    // Hub rows only, newest first.
    let query = [
      ("deliveryDateFrom", from),
      ("deliveryDateTo", to),
      ("settlementPoint", HUB_AVERAGE.to_string()),
      ("sort", "deliveryDate".to_string()),
      ("dir", "desc".to_string()),
      ("size", "1000".to_string()),
    ];
    let body = fetch_json(ctx, PRICE_PATH, &query).await?;
    parse_pricing(&body, &ctx.settings, ctx.now)
  }

  async fn fetch_load(&self, ctx: &FetchContext) -> Result<Option<LoadSnapshot>, FetchError> {
    let (from, to) = window(ctx.now);
    let query = [("operatingDayFrom", from), ("operatingDayTo", to)];
    let body = fetch_json(ctx, LOAD_PATH, &query).await?;
    parse_load(&body, &ctx.settings, ctx.now)
  }

  fn probe_endpoints(&self, now: DateTime<Utc>) -> Vec<ProbeEndpoint> {
    let (from, to) = window(now);
    vec![
      ProbeEndpoint {
        name: "settlement_point_prices",
        path: format!("{PRICE_PATH}?deliveryDateFrom={from}&deliveryDateTo={to}&size=10"),
      },
      ProbeEndpoint {
        name: "actual_system_load",
        path: format!("{LOAD_PATH}?operatingDayFrom={from}&operatingDayTo={to}"),
      },
    ]
  }
}

fn rows(body: &Value) -> Result<&Vec<Value>, FetchError> {
  body
    .get("data")
    .and_then(Value::as_array)
    .ok_or_else(|| FetchError::malformed("ercot report without a data array"))
}

/// Leading integer of an hour field (`13`, `"13"`, `"13:00"`).
fn hour(value: &Value) -> Option<u32> {
  match value {
    Value::Number(n) => n.as_u64().and_then(|h| u32::try_from(h).ok()),
    Value::String(s) => s.split(':').next()?.trim().parse().ok(),
    _ => None,
  }
}

/// Hub price per settlement interval, oldest first.
pub fn parse_pricing(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<PricingSnapshot>, FetchError> {
  let mut intervals: BTreeMap<(String, u32, u32), Vec<(String, f64)>> = BTreeMap::new();

  for row in rows(body)? {
    let Some(fields) = row.as_array() else {
      continue;
    };
    let (Some(date), Some(hr), Some(point), Some(price)) = (
      fields.first().and_then(Value::as_str),
      fields.get(1).and_then(hour),
      fields.get(PRICE_POINT).and_then(Value::as_str),
      fields.get(PRICE_VALUE).and_then(number),
    ) else {
      continue;
    };
    let interval = fields.get(2).and_then(hour).unwrap_or(0);
    intervals
      .entry((date.to_string(), hr, interval))
      .or_default()
      .push((point.to_string(), price));
  }

  let series: Vec<f64> = intervals
    .values()
    .filter_map(|nodes| {
      select_system_price(
        nodes.iter().map(|(name, price)| (name.as_str(), *price)),
        Some(HUB_AVERAGE),
        settings.price_bounds,
      )
    })
    .collect();

  Ok(pricing_from_series(settings, &series, now))
}

/// ERCOT-wide total demand per hour ending, oldest first.
pub fn parse_load(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<LoadSnapshot>, FetchError> {
  let mut hours: BTreeMap<(String, u32), f64> = BTreeMap::new();

  for row in rows(body)? {
    let Some(fields) = row.as_array() else {
      continue;
    };
    let (Some(day), Some(hr), Some(total)) = (
      fields.first().and_then(Value::as_str),
      fields.get(LOAD_HOUR).and_then(hour),
      fields.get(LOAD_TOTAL).and_then(number),
    ) else {
      continue;
    };
    hours.insert((day.to_string(), hr), total);
  }

  let series: Vec<f64> = hours.into_values().collect();
  Ok(load_from_series(settings, &series, None, None, now))
}
