//! NYISO - Real-Time Zonal LBMP and Load
//!
//! Public, unauthenticated. Rows are positional arrays whose first
//! field is a local `MM/DD/YYYY HH:MM:SS` timestamp; that format does
//! not sort lexically, so timestamps are parsed before grouping.
//!
//! LBMP rows: `[timestamp, zone, ptid, lbmp, losses, congestion]`
//! Load rows: `[timestamp, zone, ptid, load]`

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::adapters::http::{fetch_json, number};
use crate::config::ProviderSettings;
use crate::domain::{LoadSnapshot, PricingSnapshot, ProviderId, select_system_price};
use crate::error::FetchError;
use crate::ports::{Capabilities, FetchContext, ProbeEndpoint, ProviderAdapter};

use super::{load_from_series, pricing_from_series};

pub const LBMP_PATH: &str = "/realtime/lbmp";
pub const LOAD_PATH: &str = "/realtime/load";
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

pub struct NyisoAdapter;

fn day(now: DateTime<Utc>) -> [(&'static str, String); 1] {
  [("date", now.format("%Y%m%d").to_string())]
}

#[async_trait]
impl ProviderAdapter for NyisoAdapter {
  fn id(&self) -> ProviderId {
    ProviderId::Nyiso
  }

  fn capabilities(&self) -> Capabilities {
    Capabilities {
      pricing: true,
      load: true,
      generation_mix: false,
    }
  }

  async fn fetch_pricing(&self, ctx: &FetchContext) -> Result<Option<PricingSnapshot>, FetchError> {
    let body = fetch_json(ctx, LBMP_PATH, &day(ctx.now)).await?;
    parse_pricing(&body, &ctx.settings, ctx.now)
  }

  async fn fetch_load(&self, ctx: &FetchContext) -> Result<Option<LoadSnapshot>, FetchError> {
    let body = fetch_json(ctx, LOAD_PATH, &day(ctx.now)).await?;
    parse_load(&body, &ctx.settings, ctx.now)
  }

  fn probe_endpoints(&self, now: DateTime<Utc>) -> Vec<ProbeEndpoint> {
    let date = now.format("%Y%m%d");
    vec![
      ProbeEndpoint {
        name: "realtime_lbmp",
        path: format!("{LBMP_PATH}?date={date}"),
      },
      ProbeEndpoint {
        name: "realtime_load",
        path: format!("{LOAD_PATH}?date={date}"),
      },
    ]
  }
}

/// Rows grouped by parsed timestamp as `(zone, value)` pairs.
fn group_rows(
  body: &Value,
  value_index: usize,
) -> Result<BTreeMap<NaiveDateTime, Vec<(&str, f64)>>, FetchError> {
  let rows = body
    .get("data")
    .and_then(Value::as_array)
    .ok_or_else(|| FetchError::malformed("nyiso feed without a data array"))?;

  let mut grouped: BTreeMap<NaiveDateTime, Vec<(&str, f64)>> = BTreeMap::new();
  for row in rows.iter().filter_map(Value::as_array) {
    let (Some(stamp), Some(zone), Some(value)) = (
      row
        .first()
        .and_then(Value::as_str)
        .and_then(|s| NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()),
      row.get(1).and_then(Value::as_str),
      row.get(value_index).and_then(number),
    ) else {
      continue;
    };
    grouped.entry(stamp).or_default().push((zone, value));
  }
  Ok(grouped)
}

/// Zonal average per interval; NYISO publishes no system hub.
pub fn parse_pricing(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<PricingSnapshot>, FetchError> {
  let series: Vec<f64> = group_rows(body, 3)?
    .into_values()
    .filter_map(|zones| select_system_price(zones, None, settings.price_bounds))
    .collect();

  Ok(pricing_from_series(settings, &series, now))
}

/// System load as the sum of zonal loads per interval.
///
/// Only intervals in which every zone seen in the window has reported
/// are summed; a missing zone would understate demand.
pub fn parse_load(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<LoadSnapshot>, FetchError> {
  let grouped = group_rows(body, 3)?;
  let zones: BTreeSet<&str> = grouped
    .values()
    .flat_map(|interval| interval.iter().map(|(zone, _)| *zone))
    .collect();

  let series: Vec<f64> = grouped
    .into_values()
    .filter(|interval| {
      let reported: BTreeSet<&str> = interval.iter().map(|(zone, _)| *zone).collect();
      reported.len() == zones.len()
    })
    .map(|interval| interval.iter().map(|(_, mw)| mw).sum())
    .collect();

  Ok(load_from_series(settings, &series, None, None, now))
}
