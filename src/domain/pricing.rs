//! System price selection across settlement points.
//!
//! Most operators publish one price per node, zone, or hub. The
//! system-wide reference price is taken from the operator's canonical
//! hub-average node when it carries a plausible value; only when no
//! such node exists do we fall back to averaging the other nodes.

use super::bounds::PlausibleRange;

/// Minimum plausible node prices required before averaging.
pub const MIN_NODES_FOR_AVERAGE: usize = 3;

/// Choose the system price from `(node_name, price)` pairs.
///
/// If `hub` names a node present with a plausible price, that price
/// wins outright. Otherwise the mean of plausible node prices is used,
/// provided at least [`MIN_NODES_FOR_AVERAGE`] exist.
pub fn select_system_price<'a, I>(
    nodes: I,
    hub: Option<&str>,
    bounds: PlausibleRange,
) -> Option<f64>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut plausible = Vec::new();
    for (name, price) in nodes {
        if !bounds.contains(price) {
            continue;
        }
        if hub.is_some_and(|h| h.eq_ignore_ascii_case(name.trim())) {
            return Some(price);
        }
        plausible.push(price);
    }

    (plausible.len() >= MIN_NODES_FOR_AVERAGE)
        .then(|| plausible.iter().sum::<f64>() / plausible.len() as f64)
}
