//! PJM - Data Miner 2 API
//!
//! Static subscription key. Feeds return `{"items": [{...}]}` with
//! named fields; every feed is filtered by a UTC datetime range.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::adapters::http::{fetch_json, number};
use crate::config::ProviderSettings;
use crate::domain::{GenerationMix, LoadSnapshot, PricingSnapshot, ProviderId, select_system_price};
use crate::error::FetchError;
use crate::ports::{Capabilities, FetchContext, ProbeEndpoint, ProviderAdapter};

use super::{load_from_series, mix_from_labels, pricing_from_series};

pub const LMP_PATH: &str = "/rt_fivemin_hrl_lmps";
pub const LOAD_PATH: &str = "/inst_load";
pub const FUEL_PATH: &str = "/gen_by_fuel";
/// RTO-wide aggregate pricing node.
pub const RTO_NODE: &str = "PJM-RTO";
/// Area name of the RTO-wide instantaneous load.
pub const RTO_AREA: &str = "PJM RTO";

pub struct PjmAdapter;

fn range(now: DateTime<Utc>, hours: i64) -> String {
  let fmt = "%m/%d/%Y %H:%M";
  format!(
    "{} to {}",
    (now - Duration::hours(hours)).format(fmt),
    now.format(fmt)
  )
}

fn query(now: DateTime<Utc>, hours: i64) -> [(&'static str, String); 3] {
  [
    ("datetime_beginning_utc", range(now, hours)),
    ("rowCount", "50000".to_string()),
    ("startRow", "1".to_string()),
  ]
}

#[async_trait]
impl ProviderAdapter for PjmAdapter {
  fn id(&self) -> ProviderId {
    ProviderId::Pjm
  }

  fn capabilities(&self) -> Capabilities {
    Capabilities::ALL
  }

  async fn fetch_pricing(&self, ctx: &FetchContext) -> Result<Option<PricingSnapshot>, FetchError> {
    let body = fetch_json(ctx, LMP_PATH, &query(ctx.now, 24)).await?;
    parse_pricing(&body, &ctx.settings, ctx.now)
  }

  async fn fetch_load(&self, ctx: &FetchContext) -> Result<Option<LoadSnapshot>, FetchError> {
    let body = fetch_json(ctx, LOAD_PATH, &query(ctx.now, 24)).await?;
    parse_load(&body, &ctx.settings, ctx.now)
  }

  async fn fetch_generation_mix(
    &self,
    ctx: &FetchContext,
  ) -> Result<Option<GenerationMix>, FetchError> {
    let body = fetch_json(ctx, FUEL_PATH, &query(ctx.now, 3)).await?;
    parse_generation_mix(&body, &ctx.settings, ctx.now)
  }

  fn probe_endpoints(&self, _now: DateTime<Utc>) -> Vec<ProbeEndpoint> {
    [LMP_PATH, LOAD_PATH, FUEL_PATH]
      .into_iter()
      .zip(["five_minute_lmps", "instantaneous_load", "generation_by_fuel"])
      .map(|(path, name)| ProbeEndpoint {
        name,
        path: format!("{path}?rowCount=5&startRow=1"),
      })
      .collect()
  }
}

fn items(body: &Value) -> Result<&Vec<Value>, FetchError> {
  body
    .get("items")
    .and_then(Value::as_array)
    .ok_or_else(|| FetchError::malformed("pjm feed without an items array"))
}

fn text<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
  item.get(key).and_then(Value::as_str)
}

/// RTO price per five-minute interval, oldest first.
pub fn parse_pricing(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<PricingSnapshot>, FetchError> {
  let mut intervals: BTreeMap<&str, Vec<(&str, f64)>> = BTreeMap::new();
  for item in items(body)? {
    let (Some(begin), Some(node), Some(lmp)) = (
      text(item, "datetime_beginning_utc"),
      text(item, "pnode_name"),
      item.get("total_lmp_rt").and_then(number),
    ) else {
      continue;
    };
    intervals.entry(begin).or_default().push((node, lmp));
  }

  let series: Vec<f64> = intervals
    .into_values()
    .filter_map(|nodes| select_system_price(nodes, Some(RTO_NODE), settings.price_bounds))
    .collect();

  Ok(pricing_from_series(settings, &series, now))
}

/// RTO instantaneous load, oldest first.
pub fn parse_load(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<LoadSnapshot>, FetchError> {
  let readings: BTreeMap<&str, f64> = items(body)?
    .iter()
    .filter(|item| text(item, "area").is_some_and(|a| a.eq_ignore_ascii_case(RTO_AREA)))
    .filter_map(|item| {
      Some((
        text(item, "datetime_beginning_utc")?,
        item.get("instantaneous_load").and_then(number)?,
      ))
    })
    .collect();

  let series: Vec<f64> = readings.into_values().collect();
  Ok(load_from_series(settings, &series, None, None, now))
}

/// Fuel mix at the most recent hour in the feed.
pub fn parse_generation_mix(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<GenerationMix>, FetchError> {
  let items = items(body)?;
  let Some(latest) = items
    .iter()
    .filter_map(|item| text(item, "datetime_beginning_utc"))
    .max()
  else {
    return Ok(None);
  };

  let entries = items
    .iter()
    .filter(|item| text(item, "datetime_beginning_utc") == Some(latest))
    .filter_map(|item| Some((text(item, "fuel_type")?, item.get("mw").and_then(number)?)));

  Ok(mix_from_labels(settings, entries, now))
}
