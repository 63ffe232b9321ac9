//! SPP - Marketplace Chart API
//!
//! Public, unauthenticated. Every feed is chart data: a shared
//! `labels` axis and `datasets` whose `data` arrays are aligned to it.
//! Future points are `null`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::adapters::http::{fetch_json, number, pointer};
use crate::config::ProviderSettings;
use crate::domain::{GenerationMix, LoadSnapshot, PricingSnapshot, ProviderId, select_system_price};
use crate::error::FetchError;
use crate::ports::{Capabilities, FetchContext, ProbeEndpoint, ProviderAdapter};

use super::{load_from_series, max_finite, mix_from_labels, pricing_from_series};

pub const LMP_PATH: &str = "/rtbm-lmp-by-location/asChart";
pub const LOAD_PATH: &str = "/load-forecast/asChart";
pub const FUEL_PATH: &str = "/gen-mix/asChart";
pub const ACTUAL_LOAD_SERIES: &str = "Actual Load";
pub const FORECAST_LOAD_SERIES: &str = "Mid-Term Load Forecast";

pub struct SppAdapter;

#[async_trait]
impl ProviderAdapter for SppAdapter {
  fn id(&self) -> ProviderId {
    ProviderId::Spp
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
    [
      ("lmp_by_location", LMP_PATH),
      ("load_forecast", LOAD_PATH),
      ("generation_mix", FUEL_PATH),
    ]
    .into_iter()
    .map(|(name, path)| ProbeEndpoint {
      name,
      path: path.to_string(),
    })
    .collect()
  }
}

/// One named chart series.
struct Series<'a> {
  label: &'a str,
  data: &'a [Value],
}

impl Series<'_> {
  fn at(&self, index: usize) -> Option<f64> {
    self.data.get(index).and_then(number)
  }

  fn values(&self) -> impl Iterator<Item = f64> + '_ {
    self.data.iter().filter_map(number)
  }
}

struct Chart<'a> {
  points: usize,
  series: Vec<Series<'a>>,
}

impl<'a> Chart<'a> {
  fn parse(body: &'a Value) -> Result<Self, FetchError> {
    let labels = pointer(body, &["response", "labels"])
      .and_then(Value::as_array)
      .ok_or_else(|| FetchError::malformed("spp chart without response.labels"))?;
    let datasets = pointer(body, &["response", "datasets"])
      .and_then(Value::as_array)
      .ok_or_else(|| FetchError::malformed("spp chart without response.datasets"))?;

    let series = datasets
      .iter()
      .filter_map(|set| {
        Some(Series {
          label: set.get("label")?.as_str()?,
          data: set.get("data")?.as_array()?.as_slice(),
        })
      })
      .collect();

    Ok(Self {
      points: labels.len(),
      series,
    })
  }

  fn named(&self, label: &str) -> Option<&Series<'a>> {
    self
      .series
      .iter()
      .find(|s| s.label.trim().eq_ignore_ascii_case(label))
  }
}

/// Average of plausible settlement locations at each chart point.
pub fn parse_pricing(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<PricingSnapshot>, FetchError> {
  let chart = Chart::parse(body)?;
  let series: Vec<f64> = (0..chart.points)
    .filter_map(|i| {
      let nodes = chart
        .series
        .iter()
        .filter_map(|s| Some((s.label, s.at(i)?)));
      select_system_price(nodes, None, settings.price_bounds)
    })
    .collect();

  Ok(pricing_from_series(settings, &series, now))
}

/// Actual load with the mid-term forecast peak.
pub fn parse_load(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<LoadSnapshot>, FetchError> {
  let chart = Chart::parse(body)?;
  let Some(actual) = chart.named(ACTUAL_LOAD_SERIES) else {
    return Ok(None);
  };

  let series: Vec<f64> = actual.values().collect();
  let forecast = chart
    .named(FORECAST_LOAD_SERIES)
    .and_then(|s| max_finite(s.values()));

  Ok(load_from_series(settings, &series, forecast, None, now))
}

/// Fuel mix at the last chart point every reporting series covers.
pub fn parse_generation_mix(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<GenerationMix>, FetchError> {
  let chart = Chart::parse(body)?;
  // Fuels that never report in the window do not hold back a point.
  let reporting: Vec<&Series<'_>> = chart
    .series
    .iter()
    .filter(|s| s.values().next().is_some())
    .collect();
  let Some(latest) = (0..chart.points)
    .rev()
    .find(|i| !reporting.is_empty() && reporting.iter().all(|s| s.at(*i).is_some()))
  else {
    return Ok(None);
  };

  let entries = reporting
    .iter()
    .filter_map(|s| Some((s.label, s.at(latest)?)));

  Ok(mix_from_labels(settings, entries, now))
}
