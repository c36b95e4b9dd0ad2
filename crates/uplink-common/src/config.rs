//! Collector configuration.
//!
//! Everything is optional in the TOML surface; `Default` impls carry the
//! per-class defaults (probe targets, timeouts, dish endpoint, transport
//! ordering preferences).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::link::LinkClass;

/// Configuration consumed by the collection core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Probe destinations for the baseline reachability check.
    pub targets: Vec<String>,
    /// TCP port probed on each target.
    pub probe_port: u16,
    /// Per-target connect timeout, seconds.
    pub probe_timeout_secs: f64,
    /// Bound of the per-link jitter history window.
    pub jitter_window: usize,
    pub dish: DishConfig,
    pub cellular: CellularConfig,
    pub wifi: WifiConfig,
    pub lan: LanConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            targets: vec!["8.8.8.8".into(), "1.1.1.1".into()],
            probe_port: 80,
            probe_timeout_secs: 2.0,
            jitter_window: 10,
            dish: DishConfig::default(),
            cellular: CellularConfig::default(),
            wifi: WifiConfig::default(),
            lan: LanConfig::default(),
        }
    }
}

impl CollectorConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.probe_timeout_secs)
    }

    /// Outer per-`collect` deadline for a link of the given class.
    pub fn timeout_for(&self, class: LinkClass) -> Duration {
        let secs = match class {
            LinkClass::SatelliteDish => self.dish.timeout_secs,
            LinkClass::Cellular => self.cellular.timeout_secs,
            LinkClass::Wifi => self.wifi.timeout_secs,
            LinkClass::Lan | LinkClass::Other => self.lan.timeout_secs,
        };
        Duration::from_secs_f64(secs)
    }
}

/// Satellite-dish collector options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DishConfig {
    pub api_host: String,
    pub api_port: u16,
    /// Try gRPC before HTTP (default).
    pub grpc_first: bool,
    /// Try HTTP before gRPC; wins over `grpc_first` when both set.
    pub http_first: bool,
    pub timeout_secs: f64,
}

impl Default for DishConfig {
    fn default() -> Self {
        DishConfig {
            api_host: "192.168.100.1".into(),
            api_port: 9200,
            grpc_first: true,
            http_first: false,
            timeout_secs: 10.0,
        }
    }
}

impl DishConfig {
    pub fn grpc_target(&self) -> String {
        format!("http://{}:{}", self.api_host, self.api_port)
    }

    /// HTTP fallback runs against port 80 of the dish, not the gRPC port.
    pub fn http_base(&self) -> String {
        format!("http://{}", self.api_host)
    }
}

/// Cellular collector options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CellularConfig {
    /// Force a specific on-device RPC provider instead of the probe order.
    pub provider: Option<String>,
    /// Path of the on-device RPC CLI tool.
    pub ubus_path: String,
    pub timeout_secs: f64,
}

impl Default for CellularConfig {
    fn default() -> Self {
        CellularConfig {
            provider: None,
            ubus_path: "ubus".into(),
            timeout_secs: 8.0,
        }
    }
}

/// WiFi collector options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiConfig {
    pub ubus_path: String,
    pub timeout_secs: f64,
}

impl Default for WifiConfig {
    fn default() -> Self {
        WifiConfig {
            ubus_path: "ubus".into(),
            timeout_secs: 5.0,
        }
    }
}

/// Generic/LAN collector options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanConfig {
    pub timeout_secs: f64,
}

impl Default for LanConfig {
    fn default() -> Self {
        LanConfig { timeout_secs: 3.0 }
    }
}
