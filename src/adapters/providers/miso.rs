//! MISO - Real-Time Data Broker
//!
//! Public, unauthenticated. One endpoint selected by `messageType`;
//! payloads are XML-derived JSON, so numbers arrive as strings and
//! one-element lists may collapse into a bare object.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::adapters::http::{as_list, fetch_json, number, pointer};
use crate::config::ProviderSettings;
use crate::domain::{
  GenerationMix, LoadSnapshot, PricingSnapshot, ProviderId, ProviderResult, select_system_price,
};
use crate::error::FetchError;
use crate::ports::{Capabilities, FetchContext, ProbeEndpoint, ProviderAdapter, settle_metric};

use super::{load_from_series, max_finite, mix_from_labels, pricing_from_series};

pub const LMP_MESSAGE: &str = "getlmpconsolidatedtable";
pub const LOAD_MESSAGE: &str = "gettotalload";
pub const FUEL_MESSAGE: &str = "getfuelmix";
/// Trading hubs carry this suffix (`ILLINOIS.HUB`, `MINN.HUB`, ...).
pub const HUB_SUFFIX: &str = ".HUB";

pub struct MisoAdapter;

fn query(message: &str) -> [(&'static str, String); 2] {
  [
    ("messageType", message.to_string()),
    ("returnType", "json".to_string()),
  ]
}

/// Hub pricing plus the upstream reference interval.
#[derive(Debug, Clone, PartialEq)]
pub struct MisoPricing {
  pub snapshot: PricingSnapshot,
  pub ref_id: Option<String>,
}

impl MisoAdapter {
  async fn fetch_hub_pricing(&self, ctx: &FetchContext) -> Result<Option<MisoPricing>, FetchError> {
    let body = fetch_json(ctx, "", &query(LMP_MESSAGE)).await?;
    parse_pricing(&body, &ctx.settings, ctx.now)
  }
}

#[async_trait]
impl ProviderAdapter for MisoAdapter {
  fn id(&self) -> ProviderId {
    ProviderId::Miso
  }

  fn capabilities(&self) -> Capabilities {
    Capabilities::ALL
  }

  async fn fetch_pricing(&self, ctx: &FetchContext) -> Result<Option<PricingSnapshot>, FetchError> {
    Ok(self.fetch_hub_pricing(ctx).await?.map(|p| p.snapshot))
  }

  async fn fetch_load(&self, ctx: &FetchContext) -> Result<Option<LoadSnapshot>, FetchError> {
    let body = fetch_json(ctx, "", &query(LOAD_MESSAGE)).await?;
    parse_load(&body, &ctx.settings, ctx.now)
  }

  async fn fetch_generation_mix(
    &self,
    ctx: &FetchContext,
  ) -> Result<Option<GenerationMix>, FetchError> {
    let body = fetch_json(ctx, "", &query(FUEL_MESSAGE)).await?;
    parse_generation_mix(&body, &ctx.settings, ctx.now)
  }

  async fn fetch(&self, ctx: &FetchContext) -> ProviderResult {
    let mut result = ProviderResult::default();

    if let Some(pricing) = settle_metric(self.id(), "pricing", self.fetch_hub_pricing(ctx).await) {
      if let Some(ref_id) = pricing.ref_id {
        result.insert_extra("refId", ref_id);
      }
      result.pricing = Some(pricing.snapshot);
    }
    ctx.pace().await;
    result.load = settle_metric(self.id(), "load", self.fetch_load(ctx).await);
    ctx.pace().await;
    result.generation_mix =
      settle_metric(self.id(), "generation_mix", self.fetch_generation_mix(ctx).await);

    result
  }

  fn probe_endpoints(&self, _now: DateTime<Utc>) -> Vec<ProbeEndpoint> {
    [
      ("lmp_consolidated", LMP_MESSAGE),
      ("total_load", LOAD_MESSAGE),
      ("fuel_mix", FUEL_MESSAGE),
    ]
    .into_iter()
    .map(|(name, message)| ProbeEndpoint {
      name,
      path: format!("?messageType={message}&returnType=json"),
    })
    .collect()
  }
}

/// Mean of the plausible trading-hub prices in the current interval.
pub fn parse_pricing(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<MisoPricing>, FetchError> {
  let nodes = pointer(body, &["LMPData", "FiveMinLMP", "PricingNode"])
    .ok_or_else(|| FetchError::malformed("miso lmp table without FiveMinLMP.PricingNode"))?;

  let hubs = as_list(nodes).into_iter().filter_map(|node| {
    let name = node.get("name").and_then(Value::as_str)?;
    if !name.ends_with(HUB_SUFFIX) {
      return None;
    }
    Some((name, node.get("LMP").and_then(number)?))
  });

  let Some(price) = select_system_price(hubs, None, settings.price_bounds) else {
    return Ok(None);
  };

  let ref_id = pointer(body, &["LMPData", "RefId"])
    .and_then(Value::as_str)
    .map(str::to_string);

  Ok(
    pricing_from_series(settings, &[price], now)
      .map(|snapshot| MisoPricing { snapshot, ref_id }),
  )
}

/// Five-minute actual load with the medium-term forecast peak.
pub fn parse_load(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<LoadSnapshot>, FetchError> {
  let actual = pointer(body, &["LoadInfo", "FiveMinTotalLoad"])
    .ok_or_else(|| FetchError::malformed("miso load without LoadInfo.FiveMinTotalLoad"))?;

  let series: Vec<f64> = as_list(actual)
    .into_iter()
    .filter_map(|entry| pointer(entry, &["Load", "Value"]).and_then(number))
    .collect();

  let forecast = pointer(body, &["LoadInfo", "MediumTermLoadForecast"]).and_then(|f| {
    max_finite(
      as_list(f)
        .into_iter()
        .filter_map(|entry| pointer(entry, &["Forecast", "LoadForecast"]).and_then(number)),
    )
  });

  Ok(load_from_series(settings, &series, forecast, None, now))
}

/// Actual generation by fuel category.
pub fn parse_generation_mix(
  body: &Value,
  settings: &ProviderSettings,
  now: DateTime<Utc>,
) -> Result<Option<GenerationMix>, FetchError> {
  let types = pointer(body, &["Fuel", "Type"])
    .ok_or_else(|| FetchError::malformed("miso fuel mix without Fuel.Type"))?;

  let entries = as_list(types).into_iter().filter_map(|entry| {
    Some((
      entry.get("CATEGORY").and_then(Value::as_str)?,
      entry.get("ACT").and_then(number)?,
    ))
  });

  Ok(mix_from_labels(settings, entries, now))
}
