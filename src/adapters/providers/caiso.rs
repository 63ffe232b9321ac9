//! CAISO - Today's Outlook
//!
//! Public, unauthenticated. Each feed is a table: `columns` names the
//! series and `rows` holds positional values in five-minute steps,
//! with `null` for intervals not yet reported.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::adapters::http::{fetch_json, number};
use crate::config::ProviderSettings;
use crate::domain::{GenerationMix, LoadSnapshot, ProviderId};
use crate::error::FetchError;
use crate::ports::{Capabilities, FetchContext, ProbeEndpoint, ProviderAdapter};

use super::{load_from_series, max_finite, mix_from_labels};

pub const DEMAND_PATH: &str = "/demand.json";
pub const FUEL_PATH: &str = "/fuelsource.json";

/// Columns that are not in-area generation.
const NON_GENERATION: [&str; 3] = ["time", "imports", "batteries"];

pub struct CaisoAdapter;

#[async_trait]
impl ProviderAdapter for CaisoAdapter {
  fn id(&self) -> ProviderId {
    ProviderId::Caiso
  }

  fn capabilities(&self) -> Capabilities {
    Capabilities {
      pricing: false,
      load: true,
      generation_mix: true,
    }
  }

  async fn fetch_load(&self, ctx: &FetchContext) -> Result<Option<LoadSnapshot>, FetchError> {
    let body = fetch_json(ctx, DEMAND_PATH, &[]).await?;
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
        name: "demand",
        path: DEMAND_PATH.to_string(),
      },
      ProbeEndpoint {
        name: "fuel_source",
        path: FUEL_PATH.to_string(),
      },
    ]
  }
}

struct Table<'a> {
  columns: Vec<&'a str>,
  rows: Vec<&'a Vec<Value>>,
}

impl<'a> Table<'a> {
  fn parse(body: &'a Value) -> Result<Self, FetchError> {
    let columns = body
      .get("columns")
      .and_then(Value::as_array)
      .ok_or_else(|| FetchError::malformed("caiso table without columns"))?
      .iter()
      .map(|c| c.as_str().unwrap_or_default())
      .collect();
    let rows = body
      .get("rows")
      .and_then(Value::as_array)
      .ok_or_else(|| FetchError::malformed("caiso table without rows"))?
      .iter()
      .filter_map(Value::as_array)
      .collect();
    Ok(Self { columns, rows })
  }

  fn index(&self, name: &str) -> Option<usize> {
    self
      .columns
      .iter()
      .position(|c| c.trim().eq_ignore_ascii_case(name))
  }

  /// Non-null values of one column, in row order.
  fn series(&self, column: usize) -> Vec<f64> {
    self
      .rows
      .iter()
      .filter_map(|row| row.get(column).and_then(number))
      .collect()
  }
}

/// Current demand with the day-ahead forecast peak.
pub fn parse_load(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<LoadSnapshot>, FetchError> {
  let table = Table::parse(body)?;
  let demand = table
    .index("Current demand")
    .ok_or_else(|| FetchError::malformed("caiso demand without a Current demand column"))?;

  let series = table.series(demand);
  let forecast = table
    .index("Day ahead forecast")
    .and_then(|col| max_finite(table.series(col)));

  Ok(load_from_series(settings, &series, forecast, None, now))
}

/// Fuel mix at the last fully reported row.
pub fn parse_generation_mix(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<GenerationMix>, FetchError> {
  let table = Table::parse(body)?;
  let fuel_columns: Vec<(usize, &str)> = table
    .columns
    .iter()
    .enumerate()
    .filter(|(_, name)| !NON_GENERATION.iter().any(|skip| name.trim().eq_ignore_ascii_case(skip)))
    .map(|(i, name)| (i, *name))
    .collect();

  let Some(latest) = table.rows.iter().rev().find(|row| {
    fuel_columns
      .iter()
      .all(|(i, _)| row.get(*i).and_then(number).is_some())
  }) else {
    return Ok(None);
  };

  let entries = fuel_columns
    .iter()
    .filter_map(|(i, name)| Some((*name, latest.get(*i).and_then(number)?)));

  Ok(mix_from_labels(settings, entries, now))
}
