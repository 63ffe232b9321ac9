//! Grid Operator Adapters
//!
//! One module per operator. Each owns its request shapes and a set of
//! pure `parse_*` functions that turn the raw JSON into canonical
//! snapshots; the async trait methods only fetch and delegate.

pub mod aeso;
pub mod caiso;
pub mod ercot;
pub mod isone;
pub mod miso;
pub mod nyiso;
pub mod pjm;
pub mod spp;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::ProviderSettings;
use crate::domain::{
  FuelType, GenerationMix, LoadObservation, LoadSnapshot, PricingSnapshot, ProviderId,
};
use crate::ports::ProviderAdapter;

pub use aeso::AesoAdapter;
pub use caiso::CaisoAdapter;
pub use ercot::ErcotAdapter;
pub use isone::IsoNeAdapter;
pub use miso::MisoAdapter;
pub use nyiso::NyisoAdapter;
pub use pjm::PjmAdapter;
pub use spp::SppAdapter;

/// The adapter for `id`.
pub fn adapter_for(id: ProviderId) -> Arc<dyn ProviderAdapter> {
  match id {
    ProviderId::Ercot => Arc::new(ErcotAdapter),
    ProviderId::Pjm => Arc::new(PjmAdapter),
    ProviderId::Caiso => Arc::new(CaisoAdapter),
    ProviderId::Miso => Arc::new(MisoAdapter),
    ProviderId::Nyiso => Arc::new(NyisoAdapter),
    ProviderId::IsoNe => Arc::new(IsoNeAdapter),
    ProviderId::Spp => Arc::new(SppAdapter),
    ProviderId::Aeso => Arc::new(AesoAdapter),
  }
}

/// Pricing from a chronological series of plausible system prices.
/// The last point is the current price.
pub(crate) fn pricing_from_series(
  settings: &ProviderSettings,
  series: &[f64],
  now: DateTime<Utc>,
) -> Option<PricingSnapshot> {
  let current = *series.last()?;
  Some(PricingSnapshot::from_window(
    settings.id,
    current,
    series,
    settings.baseline_price,
    now,
  ))
}

/// Load from a chronological demand series. The last point is current
/// demand; the maximum is only reported for multi-point windows.
pub(crate) fn load_from_series(
  settings: &ProviderSettings,
  series: &[f64],
  forecast_peak_mw: Option<f64>,
  capacity_mw: Option<f64>,
  now: DateTime<Utc>,
) -> Option<LoadSnapshot> {
  let current_mw = *series.last()?;
  let window_max_mw = (series.len() > 1).then(|| series.iter().copied().fold(f64::MIN, f64::max));
  LoadSnapshot::from_observation(
    settings.id,
    LoadObservation {
      current_mw,
      window_max_mw,
      forecast_peak_mw,
      capacity_mw,
    },
    settings.load_bounds,
    settings.planning_reserve_margin_pct,
    now,
  )
}

/// Generation mix from labelled MW entries; labels go through
/// [`FuelType::classify`].
pub(crate) fn mix_from_labels<'a, I>(
  settings: &ProviderSettings,
  entries: I,
  now: DateTime<Utc>,
) -> Option<GenerationMix>
where
  I: IntoIterator<Item = (&'a str, f64)>,
{
  GenerationMix::from_fuels(
    settings.id,
    entries
      .into_iter()
      .map(|(label, mw)| (FuelType::classify(label), mw)),
    settings.generation_bounds,
    now,
  )
}

/// Largest finite value, if any.
pub(crate) fn max_finite<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
  values
    .into_iter()
    .filter(|v| v.is_finite())
    .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}
