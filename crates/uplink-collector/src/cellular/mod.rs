//! Cellular collector.
//!
//! Works down a ladder of increasingly generic sources: a forced RPC
//! provider, the high-level mobile-data provider, modem-specific provider
//! paths, QMI/MBIM command-line tools, and finally an interface-bound ping
//! probe that at least answers "is this link passing traffic".

mod modem_cli;
mod ubus;

pub use modem_cli::{parse_signal_lines, ModemSignal};

use async_trait::async_trait;
use serde_json::Value;
use uplink_common::{
    CellularConfig, CollectorConfig, CollectorError, Ctx, Link, LinkClass, Metrics, Result,
    RoamingType,
};

use crate::base::BaseCollector;
use crate::factory::{validate_link, Collection, Collector};
use crate::json;
use crate::probe::PingProber;
use crate::runner::{CommandRunner, RetryPolicy};

const CLASSES: &[LinkClass] = &[LinkClass::Cellular];

/// Hosts pinged by the interface-bound fallback.
const FALLBACK_HOSTS: &[&str] = &["8.8.8.8", "1.1.1.1", "9.9.9.9"];

pub struct CellularCollector {
    base: BaseCollector,
    rpc: ubus::RpcClient,
    cmd_runner: CommandRunner,
    cfg: CellularConfig,
}

impl CellularCollector {
    pub fn new(config: &CollectorConfig) -> Self {
        CellularCollector {
            base: BaseCollector::new(config),
            rpc: ubus::RpcClient::new(config.cellular.ubus_path.clone()),
            cmd_runner: CommandRunner::new(RetryPolicy::command()),
            cfg: config.cellular.clone(),
        }
    }

    /// Try every modem information source in order; first hit wins.
    async fn query_modem(&self, ctx: &Ctx) -> Result<(Value, &'static str)> {
        let mut last_err =
            CollectorError::TransportUnavailable("no cellular sources attempted".into());

        if let Some(provider) = self.cfg.provider.as_deref() {
            match self.rpc.provider_info(ctx, provider).await {
                Ok(value) => return Ok((value, "rpc-configured")),
                Err(CollectorError::Cancelled) => return Err(CollectorError::Cancelled),
                Err(err) => {
                    tracing::debug!(provider, error = %err, "configured provider failed");
                    last_err = err;
                }
            }
        }

        match self.rpc.mobiled_interface_info(ctx).await {
            Ok(value) => return Ok((value, "mobiled")),
            Err(CollectorError::Cancelled) => return Err(CollectorError::Cancelled),
            Err(err) => {
                tracing::debug!(error = %err, "mobiled provider failed");
                last_err = err;
            }
        }

        for provider in ["gsm.modem0", "gsm"] {
            match self.rpc.provider_info(ctx, provider).await {
                Ok(value) => return Ok((value, "rpc-gsm")),
                Err(CollectorError::Cancelled) => return Err(CollectorError::Cancelled),
                Err(err) => {
                    tracing::debug!(provider, error = %err, "gsm provider failed");
                    last_err = err;
                }
            }
        }

        match modem_cli::query(ctx, &self.cmd_runner).await {
            Ok((signal, family)) => {
                let mut map = serde_json::Map::new();
                if let Some(v) = signal.rsrp {
                    map.insert("rsrp".into(), v.into());
                }
                if let Some(v) = signal.rsrq {
                    map.insert("rsrq".into(), v.into());
                }
                if let Some(v) = signal.sinr {
                    map.insert("sinr".into(), v.into());
                }
                if let Some(v) = signal.rssi {
                    map.insert("rssi".into(), v.into());
                }
                map.insert("modem_family".into(), family.into());
                return Ok((Value::Object(map), "modem-cli"));
            }
            Err(CollectorError::Cancelled) => return Err(CollectorError::Cancelled),
            Err(err) => {
                tracing::debug!(error = %err, "modem CLI query failed");
                last_err = err;
            }
        }

        Err(last_err)
    }

    /// Last resort: probe through the link's own interface so at least
    /// connectivity and path quality are known.
    async fn iface_probe(&self, ctx: &Ctx, link: &Link, metrics: &mut Metrics) -> Result<()> {
        let hosts = FALLBACK_HOSTS.iter().map(|h| h.to_string()).collect();
        let prober = PingProber::new(self.cmd_runner.clone(), hosts);
        let report = prober.probe(ctx, Some(&link.iface)).await?;

        // Interface-bound readings supersede the default-route baseline.
        metrics.loss_pct = Some(report.loss_pct.clamp(0.0, 100.0));
        if let Some(latency) = report.latency_ms {
            metrics.latency_ms = Some(latency.max(0.0));
        }
        // Same-cycle dispersion across hosts stands in for windowed jitter.
        if report.responded > 1 {
            metrics.jitter_ms = Some(report.latency_spread_ms());
        }
        metrics
            .provenance
            .insert("connected", (report.responded > 0).to_string());
        metrics.provenance.set_transport("iface-ping");
        metrics.provenance.mark_fallback();
        Ok(())
    }
}

#[async_trait]
impl Collector for CellularCollector {
    fn classes(&self) -> &'static [LinkClass] {
        CLASSES
    }

    async fn collect(&self, ctx: &Ctx, link: &Link) -> Result<Collection> {
        validate_link(link, CLASSES)?;
        let mut metrics = self.base.collect_common(ctx, link).await?;
        let mut annotation = None;

        match self.query_modem(ctx).await {
            Ok((value, transport)) => {
                apply_modem_info(&mut metrics, &value);
                metrics.provenance.set_transport(transport);
            }
            Err(CollectorError::Cancelled) => return Err(CollectorError::Cancelled),
            Err(modem_err) => {
                tracing::debug!(link = %link.name, error = %modem_err, "all modem sources failed, probing interface");
                match self.iface_probe(ctx, link, &mut metrics).await {
                    Ok(()) => {}
                    Err(CollectorError::Cancelled) => return Err(CollectorError::Cancelled),
                    Err(probe_err) => {
                        tracing::warn!(link = %link.name, error = %probe_err, "interface probe failed");
                        metrics.provenance.set_error(&modem_err.to_string());
                        annotation = Some(modem_err);
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

/// Fill cellular fields from a provider response, accepting both flat and
/// `cache`-wrapped shapes.
fn apply_modem_info(metrics: &mut Metrics, info: &Value) {
    metrics.rsrp_dbm = json::int_field(info, &["rsrp"]).map(|v| v as i32);
    metrics.rsrq_db = json::int_field(info, &["rsrq"]).map(|v| v as i32);
    metrics.sinr_db = json::int_field(info, &["sinr", "snr"]).map(|v| v as i32);
    metrics.rssi_dbm = json::int_field(info, &["rssi"]).map(|v| v as i32);

    metrics.network_type = json::str_field(info, &["network_type", "network_mode", "act"]);
    metrics.operator = json::str_field(info, &["operator", "operator_name", "provider"]);
    metrics.home_operator = json::str_field(info, &["home_operator", "home_provider", "spn"]);
    metrics.roaming = json::bool_field(info, &["roaming"]);
    metrics.roaming_type = Some(roaming_type(
        metrics.operator.as_deref(),
        metrics.home_operator.as_deref(),
    ));

    metrics.sim_slot = json::int_field(info, &["sim_slot", "slot"]).map(|v| v as i32);
    metrics.sim_count = json::int_field(info, &["sim_count"]).map(|v| v as i32);
    metrics.sim_status = json::str_field(info, &["sim_status", "sim_state"]);

    metrics.tac = json::str_field(info, &["tac"])
        .or_else(|| json::int_field(info, &["tac"]).map(|v| v.to_string()));
    metrics.earfcn = json::int_field(info, &["earfcn"]);
    metrics.pci = json::int_field(info, &["pci"]);
    metrics.band = json::str_field(info, &["band", "active_band"])
        .or_else(|| json::int_field(info, &["band"]).map(|v| v.to_string()));
    metrics.modem_family = json::str_field(info, &["modem_family", "modem", "model"]);
}

/// Derive roaming type by comparing current and home operator names.
pub fn roaming_type(operator: Option<&str>, home_operator: Option<&str>) -> RoamingType {
    match (operator, home_operator) {
        (Some(current), Some(home)) if !current.is_empty() && !home.is_empty() => {
            if current == home {
                RoamingType::National
            } else {
                RoamingType::International
            }
        }
        _ => RoamingType::Unknown,
    }
}

/// Composite signal-quality score in `[0, 100]`.
///
/// Starts from a neutral prior and folds in each available reading with
/// decreasing weight: RSRP 0.6, RSRQ 0.3, SINR 0.2.
pub fn signal_quality(rsrp: Option<i32>, rsrq: Option<i32>, sinr: Option<i32>) -> f64 {
    let mut score = 50.0;
    if let Some(rsrp) = rsrp {
        // -140 dBm → 0, -44 dBm → 100
        let component = ((rsrp as f64 + 140.0) / 96.0 * 100.0).clamp(0.0, 100.0);
        score = component * 0.6 + score * 0.4;
    }
    if let Some(rsrq) = rsrq {
        // -20 dB → 0, -3 dB → 100
        let component = ((rsrq as f64 + 20.0) / 17.0 * 100.0).clamp(0.0, 100.0);
        score = component * 0.3 + score * 0.7;
    }
    if let Some(sinr) = sinr {
        // -20 dB → 0, +30 dB → 100
        let component = ((sinr as f64 + 20.0) / 50.0 * 100.0).clamp(0.0, 100.0);
        score = component * 0.2 + score * 0.8;
    }
    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roaming_type_rules() {
        assert_eq!(
            roaming_type(Some("Foreign"), Some("Home")),
            RoamingType::International
        );
        assert_eq!(
            roaming_type(Some("Same"), Some("Same")),
            RoamingType::National
        );
        assert_eq!(roaming_type(None, Some("Home")), RoamingType::Unknown);
        assert_eq!(roaming_type(Some("Op"), None), RoamingType::Unknown);
        assert_eq!(roaming_type(Some(""), Some("Home")), RoamingType::Unknown);
    }

    #[test]
    fn flat_provider_shape() {
        let info = json!({
            "rsrp": -95.5,
            "rsrq": "-11",
            "sinr": 12,
            "rssi": -63,
            "network_type": "lte",
            "operator": "Telia",
            "home_operator": "Telia",
            "roaming": "0",
            "sim_slot": 1,
            "sim_status": "ready",
            "band": 3,
            "earfcn": 1300,
            "pci": 218
        });
        let link = Link::new("mob", "wwan0", LinkClass::Cellular);
        let mut m = Metrics::new(&link);
        apply_modem_info(&mut m, &info);
        assert_eq!(m.rsrp_dbm, Some(-95));
        assert_eq!(m.rsrq_db, Some(-11));
        assert_eq!(m.sinr_db, Some(12));
        assert_eq!(m.rssi_dbm, Some(-63));
        assert_eq!(m.roaming, Some(false));
        assert_eq!(m.roaming_type, Some(RoamingType::National));
        assert_eq!(m.band.as_deref(), Some("3"));
        assert_eq!(m.earfcn, Some(1300));
        assert_eq!(m.pci, Some(218));
    }

    #[test]
    fn cache_wrapped_provider_shape() {
        let info = json!({
            "cache": {
                "rsrp": "-101",
                "rsrq": -14,
                "snr": "9",
                "network_mode": "nr5g",
                "provider": "Roamer"
            },
            "home_operator": "Home"
        });
        let link = Link::new("mob", "wwan0", LinkClass::Cellular);
        let mut m = Metrics::new(&link);
        apply_modem_info(&mut m, &info);
        assert_eq!(m.rsrp_dbm, Some(-101));
        assert_eq!(m.rsrq_db, Some(-14));
        assert_eq!(m.sinr_db, Some(9));
        assert_eq!(m.network_type.as_deref(), Some("nr5g"));
        assert_eq!(m.roaming_type, Some(RoamingType::International));
    }

    #[test]
    fn signal_quality_monotone_in_rsrp() {
        let strong = signal_quality(Some(-60), None, None);
        let weak = signal_quality(Some(-130), None, None);
        assert!(strong > weak);
        assert!((0.0..=100.0).contains(&strong));
    }

    #[test]
    fn signal_quality_neutral_without_readings() {
        assert_eq!(signal_quality(None, None, None), 50.0);
    }

    #[test]
    fn signal_quality_folds_all_components() {
        // rsrp -92 → 50.0; fold: 0.6*50 + 0.4*50 = 50
        // rsrq -11.5 would be 50, rsrq -20 → 0: 0.3*0 + 0.7*50 = 35
        // sinr -20 → 0: 0.2*0 + 0.8*35 = 28
        let score = signal_quality(Some(-92), Some(-20), Some(-20));
        assert!((score - 28.0).abs() < 1.0, "got {score}");
    }

    #[tokio::test]
    async fn wrong_class_is_rejected() {
        let collector = CellularCollector::new(&CollectorConfig::default());
        let link = Link::new("wifi", "wlan0", LinkClass::Wifi);
        let err = collector
            .collect(&Ctx::background(), &link)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Validation(_)));
    }
}
