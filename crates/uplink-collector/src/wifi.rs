//! WiFi collector.
//!
//! Primary path is the on-device `iwinfo.info` RPC; when that fails the
//! collector falls back to the kernel's `/proc/net/wireless` statistics.
//! Interface matching in the fallback is by exact `"<iface>:"` token —
//! `wlan0` must never match a `wlan01:` record.

use async_trait::async_trait;
use serde_json::Value;
use uplink_common::{
    CollectorConfig, CollectorError, Ctx, Link, LinkClass, Metrics, Result, WifiConfig,
};

use crate::base::BaseCollector;
use crate::factory::{validate_link, Collection, Collector};
use crate::json;
use crate::runner::{CommandRunner, RetryPolicy};

const PROC_NET_WIRELESS: &str = "/proc/net/wireless";

const CLASSES: &[LinkClass] = &[LinkClass::Wifi];

pub struct WifiCollector {
    base: BaseCollector,
    runner: CommandRunner,
    cfg: WifiConfig,
}

impl WifiCollector {
    pub fn new(config: &CollectorConfig) -> Self {
        WifiCollector {
            base: BaseCollector::new(config),
            runner: CommandRunner::new(RetryPolicy::ubus()),
            cfg: config.wifi.clone(),
        }
    }

    async fn iwinfo(&self, ctx: &Ctx, iface: &str) -> Result<Value> {
        let args = serde_json::json!({ "device": iface }).to_string();
        let stdout = self
            .runner
            .run(ctx, &self.cfg.ubus_path, &["call", "iwinfo", "info", &args])
            .await?;
        let value: Value = serde_json::from_slice(&stdout)
            .map_err(|e| CollectorError::Protocol(format!("iwinfo output: {e}")))?;
        if !value.is_object() {
            return Err(CollectorError::Protocol(
                "iwinfo output is not a JSON object".into(),
            ));
        }
        Ok(value)
    }
}

#[async_trait]
impl Collector for WifiCollector {
    fn classes(&self) -> &'static [LinkClass] {
        CLASSES
    }

    async fn collect(&self, ctx: &Ctx, link: &Link) -> Result<Collection> {
        validate_link(link, CLASSES)?;
        let mut metrics = self.base.collect_common(ctx, link).await?;
        let mut annotation = None;

        match self.iwinfo(ctx, &link.iface).await {
            Ok(info) => {
                apply_iwinfo(&mut metrics, &info);
                metrics.provenance.set_transport("iwinfo");
            }
            Err(CollectorError::Cancelled) => return Err(CollectorError::Cancelled),
            Err(rpc_err) => {
                tracing::debug!(link = %link.name, error = %rpc_err, "iwinfo failed, trying /proc/net/wireless");
                match std::fs::read_to_string(PROC_NET_WIRELESS)
                    .ok()
                    .and_then(|contents| parse_wireless(&contents, &link.iface))
                {
                    Some(reading) => {
                        metrics.signal_dbm = Some(reading.level_dbm);
                        metrics.noise_dbm = reading.noise_dbm;
                        if let Some(noise) = reading.noise_dbm {
                            metrics.snr_db = Some(reading.level_dbm - noise);
                        }
                        metrics.provenance.set_transport("proc-wireless");
                        metrics.provenance.mark_fallback();
                    }
                    None => {
                        tracing::warn!(link = %link.name, error = %rpc_err, "no wireless info available");
                        metrics.provenance.set_error(&rpc_err.to_string());
                        annotation = Some(rpc_err);
                    }
                }
            }
        }

        Ok(Collection {
            metrics,
            annotation,
        })
    }
}

/// Fill wifi fields from an `iwinfo.info` response.
fn apply_iwinfo(metrics: &mut Metrics, info: &Value) {
    metrics.signal_dbm = json::int_field(info, &["signal"]).map(|v| v as i32);
    metrics.noise_dbm = json::int_field(info, &["noise"]).map(|v| v as i32);
    metrics.bitrate_bps = json::int_field(info, &["bitrate"]);
    metrics.ssid = json::str_field(info, &["ssid"]);
    metrics.channel = json::int_field(info, &["channel"]).map(|v| v as i32);
    metrics.frequency_mhz = json::int_field(info, &["frequency"]).map(|v| v as i32);
    metrics.mode = json::str_field(info, &["mode"]);
    metrics.quality = json::int_field(info, &["quality"]).map(|v| v as i32);
    metrics.quality_max = json::int_field(info, &["quality_max"]).map(|v| v as i32);
    metrics.tx_power_dbm = json::int_field(info, &["txpower"]).map(|v| v as i32);
    metrics.country = json::str_field(info, &["country"]);

    if let Some(enc) = info.get("encryption") {
        if json::bool_field(enc, &["enabled"]) == Some(false) {
            metrics.encryption = Some("none".to_string());
        } else if let Some(cipher) = enc
            .get("ciphers")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(json::as_str)
        {
            metrics.encryption = Some(cipher);
        }
    }

    if let (Some(signal), Some(noise)) = (metrics.signal_dbm, metrics.noise_dbm) {
        metrics.snr_db = Some(signal - noise);
    }
    if let Some(mode) = metrics.mode.as_deref() {
        metrics.tethering_mode = Some(is_tethering_mode(mode));
    }
}

/// AP and Master modes both mean the radio is serving clients.
fn is_tethering_mode(mode: &str) -> bool {
    matches!(mode, "AP" | "Master")
}

/// One interface's record from `/proc/net/wireless`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WirelessReading {
    pub level_dbm: i32,
    pub noise_dbm: Option<i32>,
}

/// Extract signal level (field 3) and noise (field 4) for `iface`.
/// The first field must equal `"<iface>:"` exactly.
pub(crate) fn parse_wireless(contents: &str, iface: &str) -> Option<WirelessReading> {
    let token = format!("{iface}:");
    for line in contents.lines().skip(2) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.first().copied() != Some(token.as_str()) {
            continue;
        }
        let level_dbm = fields
            .get(3)?
            .trim_end_matches('.')
            .parse::<f64>()
            .ok()? as i32;
        let noise_dbm = fields
            .get(4)
            .and_then(|f| f.trim_end_matches('.').parse::<f64>().ok())
            .map(|v| v as i32);
        return Some(WirelessReading {
            level_dbm,
            noise_dbm,
        });
    }
    None
}

/// WiFi link-quality score in `[0, 100]`, folded the same way as the
/// cellular score but with signal/SNR-specific normalization; bitrate
/// contributes through a step function on Mbps.
pub fn wifi_quality(
    signal_dbm: Option<i32>,
    snr_db: Option<i32>,
    bitrate_bps: Option<i64>,
) -> f64 {
    let mut score = 50.0;
    if let Some(signal) = signal_dbm {
        // -90 dBm → 0, -30 dBm → 100
        let component = ((signal as f64 + 90.0) / 60.0 * 100.0).clamp(0.0, 100.0);
        score = component * 0.6 + score * 0.4;
    }
    if let Some(snr) = snr_db {
        // 0 dB → 0, 40 dB → 100
        let component = (snr as f64 / 40.0 * 100.0).clamp(0.0, 100.0);
        score = component * 0.3 + score * 0.7;
    }
    if let Some(bitrate) = bitrate_bps {
        let mbps = bitrate as f64 / 1_000_000.0;
        let component = if mbps >= 300.0 {
            100.0
        } else if mbps >= 100.0 {
            85.0
        } else if mbps >= 54.0 {
            70.0
        } else if mbps >= 24.0 {
            55.0
        } else if mbps >= 11.0 {
            40.0
        } else {
            25.0
        };
        score = component * 0.2 + score * 0.8;
    }
    score.clamp(0.0, 100.0)
}
