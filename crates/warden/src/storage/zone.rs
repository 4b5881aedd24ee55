//! Provider regions and their upload hostnames.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Region that owns a bucket and receives its uploads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    /// East China
    #[default]
    #[serde(rename = "z0")]
    Z0,
    /// North China
    #[serde(rename = "z1")]
    Z1,
    /// South China
    #[serde(rename = "z2")]
    Z2,
    /// North America
    #[serde(rename = "na0")]
    Na0,
    /// Southeast Asia
    #[serde(rename = "as0")]
    As0,
}

impl Zone {
    pub const ALL: [Zone; 5] = [Zone::Z0, Zone::Z1, Zone::Z2, Zone::Na0, Zone::As0];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Z0 => "z0",
            Self::Z1 => "z1",
            Self::Z2 => "z2",
            Self::Na0 => "na0",
            Self::As0 => "as0",
        }
    }

    /// Hostname uploads for this zone are addressed to
    pub fn upload_host(&self) -> &'static str {
        match self {
            Self::Z0 => "up.qiniup.com",
            Self::Z1 => "up-z1.qiniup.com",
            Self::Z2 => "up-z2.qiniup.com",
            Self::Na0 => "up-na0.qiniup.com",
            Self::As0 => "up-as0.qiniup.com",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|zone| zone.id() == s)
            .ok_or_else(|| format!("unknown zone '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_round_trips_through_id() {
        for zone in Zone::ALL {
            assert_eq!(zone.id().parse::<Zone>().unwrap(), zone);
            assert!(zone.upload_host().ends_with(".qiniup.com"));
        }
        assert!("z9".parse::<Zone>().is_err());
    }

    #[test]
    fn test_zone_deserializes_from_config_value() {
        let zone: Zone = serde_json::from_str("\"na0\"").unwrap();
        assert_eq!(zone, Zone::Na0);
        assert_eq!(Zone::default().upload_host(), "up.qiniup.com");
    }
}
