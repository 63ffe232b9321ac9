//! Provider identity.
//!
//! The eight grid operators this service aggregates. The lowercase
//! identifier doubles as the JSON key in the aggregate response and as
//! the `[providers.<id>]` table name in `config.toml`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Grid operator (ISO/RTO) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Electric Reliability Council of Texas.
    Ercot,
    /// PJM Interconnection.
    Pjm,
    /// California ISO.
    Caiso,
    /// Midcontinent ISO.
    Miso,
    /// New York ISO.
    Nyiso,
    /// ISO New England.
    IsoNe,
    /// Southwest Power Pool.
    Spp,
    /// Alberta Electric System Operator.
    Aeso,
}

impl ProviderId {
    /// Every provider, in response-key order.
    pub const ALL: [Self; 8] = [
        Self::Aeso,
        Self::Caiso,
        Self::Ercot,
        Self::IsoNe,
        Self::Miso,
        Self::Nyiso,
        Self::Pjm,
        Self::Spp,
    ];

    /// Wire identifier (`"ercot"`, `"isone"`, ...).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ercot => "ercot",
            Self::Pjm => "pjm",
            Self::Caiso => "caiso",
            Self::Miso => "miso",
            Self::Nyiso => "nyiso",
            Self::IsoNe => "isone",
            Self::Spp => "spp",
            Self::Aeso => "aeso",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider `{0}`")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == needle)
            .ok_or(UnknownProvider(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_through_wire_name() {
        for id in ProviderId::ALL {
            assert_eq!(id.as_str().parse::<ProviderId>().unwrap(), id);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("ISONE".parse::<ProviderId>().unwrap(), ProviderId::IsoNe);
        assert!("bpa".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_serde_name_matches_display() {
        let json = serde_json::to_string(&ProviderId::IsoNe).unwrap();
        assert_eq!(json, "\"isone\"");
    }
}
