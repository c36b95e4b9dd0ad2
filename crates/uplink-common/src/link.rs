//! Link descriptors — one per monitored uplink.
//!
//! A `Link` is created once by the caller and stays immutable for the
//! lifetime of its collector. The class tag decides which collector the
//! factory hands out.

use serde::{Deserialize, Serialize};

/// A monitored uplink interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    /// Stable name, unique among monitored links (e.g. `starlink`, `mob1s1a1`).
    pub name: String,
    /// OS-level interface identifier (e.g. `eth1`, `wwan0`, `wlan0`).
    pub iface: String,
    #[serde(rename = "class")]
    pub class: LinkClass,
    /// Whether the failover layer may route traffic over this link.
    #[serde(default = "default_true")]
    pub eligible: bool,
    /// Scheduling weight for the failover layer.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> u32 {
    100
}

impl Link {
    pub fn new(name: impl Into<String>, iface: impl Into<String>, class: LinkClass) -> Self {
        Link {
            name: name.into(),
            iface: iface.into(),
            class,
            eligible: true,
            weight: default_weight(),
        }
    }
}

/// The link's category; determines which collector is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkClass {
    SatelliteDish,
    Cellular,
    Wifi,
    Lan,
    Other,
}

impl std::fmt::Display for LinkClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkClass::SatelliteDish => write!(f, "satellite-dish"),
            LinkClass::Cellular => write!(f, "cellular"),
            LinkClass::Wifi => write!(f, "wifi"),
            LinkClass::Lan => write!(f, "lan"),
            LinkClass::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for LinkClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "satellite-dish" => Ok(LinkClass::SatelliteDish),
            "cellular" => Ok(LinkClass::Cellular),
            "wifi" => Ok(LinkClass::Wifi),
            "lan" => Ok(LinkClass::Lan),
            "other" => Ok(LinkClass::Other),
            other => Err(format!("unknown link class: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_roundtrips_through_display() {
        for class in [
            LinkClass::SatelliteDish,
            LinkClass::Cellular,
            LinkClass::Wifi,
            LinkClass::Lan,
            LinkClass::Other,
        ] {
            let parsed: LinkClass = class.to_string().parse().unwrap();
            assert_eq!(parsed, class);
        }
    }

    #[test]
    fn class_serializes_kebab_case() {
        let json = serde_json::to_string(&LinkClass::SatelliteDish).unwrap();
        assert_eq!(json, "\"satellite-dish\"");
    }

    #[test]
    fn link_defaults_from_partial_toml_shape() {
        let link: Link =
            serde_json::from_str(r#"{"name":"wan","iface":"eth0","class":"lan"}"#).unwrap();
        assert!(link.eligible);
        assert_eq!(link.weight, 100);
    }
}
