//! The normalized metrics record — one per link per sampling cycle.
//!
//! A single flat structure with a large set of optional fields. Optionality
//! is semantically significant: `None` means the collector could not obtain
//! the value this cycle, not zero. No field carries a sentinel that would
//! conflate "zero" with "missing", and none of the `None`s serialize.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::link::{Link, LinkClass};

/// Where a GPS fix came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpsSource {
    Dish,
    Router,
    External,
    None,
}

/// Whether the modem is roaming inside or outside the home network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoamingType {
    National,
    International,
    Unknown,
}

/// Normalized output of one collection cycle. Immutable once returned;
/// owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    /// Collection start time, monotonically non-decreasing per link.
    pub timestamp: DateTime<Utc>,
    pub link: String,
    pub class: LinkClass,

    // ── Baseline (all classes) ──────────────────────────────────────
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_ms: Option<f64>,

    // ── Signal quality (cellular) ───────────────────────────────────
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsrp_dbm: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsrq_db: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sinr_db: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi_dbm: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_operator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roaming: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roaming_type: Option<RoamingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sim_slot: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sim_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sim_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earfcn: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pci: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub band: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modem_family: Option<String>,

    // ── Signal quality (wifi; `snr_db` shared with the dish) ────────
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_dbm: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_dbm: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snr_db: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_bps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_mhz: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_max: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_power_dbm: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tethering_mode: Option<bool>,

    // ── Dish-specific ───────────────────────────────────────────────
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obstruction_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obstruction_time_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obstruction_valid_s: Option<i64>,
    /// Mean duration of prolonged obstructions, seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obstruction_avg_prolonged_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obstruction_patches_valid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currently_obstructed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outages: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snr_above_noise_floor: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snr_persistently_low: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_s: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_self_test: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thermal_throttle: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thermal_shutdown: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_v: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downlink_restricted_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uplink_restricted_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_update_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swupdate_reboot_ready: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_reboot_utc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roaming_alert: Option<bool>,

    // ── GPS (dish or external) ──────────────────────────────────────
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_satellites: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_uncertainty_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_source: Option<GpsSource>,

    /// Which transport produced this record, whether fallback was used,
    /// whether any value was synthesized or heuristically recovered.
    #[serde(default, skip_serializing_if = "Provenance::is_empty")]
    pub provenance: Provenance,
}

impl Metrics {
    /// A fresh record for `link`, timestamped now. Every optional field
    /// starts absent.
    pub fn new(link: &Link) -> Self {
        Self::at(link, Utc::now())
    }

    /// A fresh record with an explicit timestamp (callers that enforce
    /// per-link monotonicity supply the clamped value).
    pub fn at(link: &Link, timestamp: DateTime<Utc>) -> Self {
        Metrics {
            timestamp,
            link: link.name.clone(),
            class: link.class,
            latency_ms: None,
            loss_pct: None,
            jitter_ms: None,
            rsrp_dbm: None,
            rsrq_db: None,
            sinr_db: None,
            rssi_dbm: None,
            network_type: None,
            operator: None,
            home_operator: None,
            roaming: None,
            roaming_type: None,
            sim_slot: None,
            sim_count: None,
            sim_status: None,
            tac: None,
            earfcn: None,
            pci: None,
            band: None,
            modem_family: None,
            signal_dbm: None,
            noise_dbm: None,
            snr_db: None,
            bitrate_bps: None,
            ssid: None,
            channel: None,
            frequency_mhz: None,
            mode: None,
            quality: None,
            quality_max: None,
            tx_power_dbm: None,
            encryption: None,
            country: None,
            tethering_mode: None,
            obstruction_pct: None,
            obstruction_time_pct: None,
            obstruction_valid_s: None,
            obstruction_avg_prolonged_s: None,
            obstruction_patches_valid: None,
            currently_obstructed: None,
            outages: None,
            snr_above_noise_floor: None,
            snr_persistently_low: None,
            uptime_s: None,
            boot_count: None,
            hardware_self_test: None,
            thermal_throttle: None,
            thermal_shutdown: None,
            temperature_c: None,
            voltage_v: None,
            downlink_restricted_reason: None,
            uplink_restricted_reason: None,
            software_update_state: None,
            swupdate_reboot_ready: None,
            scheduled_reboot_utc: None,
            roaming_alert: None,
            gps_valid: None,
            latitude: None,
            longitude: None,
            altitude_m: None,
            gps_satellites: None,
            gps_uncertainty_m: None,
            gps_source: None,
            provenance: Provenance::default(),
        }
    }

    /// Whether any of the three baseline fields is populated.
    pub fn has_baseline(&self) -> bool {
        self.latency_ms.is_some() || self.loss_pct.is_some() || self.jitter_ms.is_some()
    }
}

/// Opaque provenance map carried on every record.
///
/// Well-known keys get typed accessors; anything else goes through
/// [`Provenance::insert`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Provenance(BTreeMap<String, String>);

impl Provenance {
    pub const TRANSPORT: &'static str = "transport";
    pub const FALLBACK: &'static str = "fallback";
    pub const SYNTHESIZED: &'static str = "synthesized";
    pub const HEURISTIC: &'static str = "heuristic";
    pub const API_MS: &'static str = "api_ms";
    pub const ERROR: &'static str = "error";

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Which transport produced the class-specific fields.
    pub fn set_transport(&mut self, transport: &str) {
        self.insert(Self::TRANSPORT, transport);
    }

    pub fn transport(&self) -> Option<&str> {
        self.get(Self::TRANSPORT)
    }

    /// API round-trip time for the transport that succeeded.
    pub fn set_api_ms(&mut self, ms: f64) {
        self.insert(Self::API_MS, format!("{ms:.1}"));
    }

    pub fn mark_fallback(&mut self) {
        self.insert(Self::FALLBACK, "true");
    }

    pub fn fallback_used(&self) -> bool {
        self.get(Self::FALLBACK) == Some("true")
    }

    /// Mandatory marker for placeholder records. Real and synthesized
    /// records are never indistinguishable.
    pub fn mark_synthesized(&mut self) {
        self.insert(Self::SYNTHESIZED, "true");
    }

    pub fn is_synthesized(&self) -> bool {
        self.get(Self::SYNTHESIZED) == Some("true")
    }

    /// Marker for values recovered by the byte-pattern scan; downstream
    /// trend analysis discounts these samples.
    pub fn mark_heuristic(&mut self) {
        self.insert(Self::HEURISTIC, "true");
    }

    pub fn is_heuristic(&self) -> bool {
        self.get(Self::HEURISTIC) == Some("true")
    }

    /// Non-fatal degradation note (augmentation failed, baseline kept).
    pub fn set_error(&mut self, err: &str) {
        self.insert(Self::ERROR, err);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
