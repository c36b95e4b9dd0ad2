//! Base collector — the common-metrics subset every class shares.
//!
//! Runs the reachability prober, feeds the mean latency into the per-link
//! jitter window, and produces a record carrying only timestamp, latency,
//! loss, and jitter. Class-specific collectors layer on top of this.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uplink_common::{CollectorConfig, Ctx, Link, Metrics, Result};

use crate::jitter::JitterEstimator;
use crate::probe::{ProbeReport, Prober};

pub struct BaseCollector {
    prober: Prober,
    state: Mutex<BaseState>,
}

struct BaseState {
    jitter: JitterEstimator,
    /// Clamp for per-link timestamp monotonicity across wall-clock steps.
    last_timestamp: HashMap<String, DateTime<Utc>>,
}

impl BaseCollector {
    pub fn new(config: &CollectorConfig) -> Self {
        BaseCollector {
            prober: Prober::new(
                config.targets.clone(),
                config.probe_port,
                config.probe_timeout(),
            ),
            state: Mutex::new(BaseState {
                jitter: JitterEstimator::new(config.jitter_window),
                last_timestamp: HashMap::new(),
            }),
        }
    }

    /// Collect the baseline metrics for `link`. Fails only when the probe
    /// itself could not run (cancellation, expiry, or no targets).
    pub async fn collect_common(&self, ctx: &Ctx, link: &Link) -> Result<Metrics> {
        let started = Utc::now();
        let report = self.prober.probe(ctx).await?;
        Ok(self.build(link, started, &report))
    }

    fn build(&self, link: &Link, started: DateTime<Utc>, report: &ProbeReport) -> Metrics {
        let mut state = self.state.lock().unwrap();

        let timestamp = match state.last_timestamp.get(&link.name) {
            Some(prev) if *prev > started => *prev,
            _ => started,
        };
        state.last_timestamp.insert(link.name.clone(), timestamp);

        let mut metrics = Metrics::at(link, timestamp);
        metrics.loss_pct = Some(report.loss_pct.clamp(0.0, 100.0));
        if let Some(latency) = report.latency_ms {
            metrics.latency_ms = Some(latency.max(0.0));
            metrics.jitter_ms = Some(state.jitter.record(&link.name, latency));
        }
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use uplink_common::LinkClass;

    fn config_with_target(addr: &str) -> CollectorConfig {
        CollectorConfig {
            targets: vec![addr.to_string()],
            probe_timeout_secs: 0.5,
            ..CollectorConfig::default()
        }
    }

    #[tokio::test]
    async fn baseline_carries_only_common_fields() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let base = BaseCollector::new(&config_with_target(&addr));
        let link = Link::new("wan", "eth0", LinkClass::Lan);

        let m = base.collect_common(&Ctx::background(), &link).await.unwrap();
        assert!(m.latency_ms.is_some());
        assert_eq!(m.loss_pct, Some(0.0));
        assert_eq!(m.jitter_ms, Some(0.0));
        assert!(m.rsrp_dbm.is_none());
        assert!(m.obstruction_pct.is_none());
    }

    #[tokio::test]
    async fn all_loss_yields_loss_only_record() {
        let base = BaseCollector::new(&config_with_target("127.0.0.1:1"));
        let link = Link::new("wan", "eth0", LinkClass::Lan);

        let m = base.collect_common(&Ctx::background(), &link).await.unwrap();
        assert_eq!(m.loss_pct, Some(100.0));
        assert!(m.latency_ms.is_none());
        assert!(m.jitter_ms.is_none());
        assert!(m.has_baseline());
    }

    #[tokio::test]
    async fn timestamps_are_monotonic_per_link() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let base = BaseCollector::new(&config_with_target(&addr));
        let link = Link::new("wan", "eth0", LinkClass::Lan);
        let ctx = Ctx::background();

        let first = base.collect_common(&ctx, &link).await.unwrap();
        let second = base.collect_common(&ctx, &link).await.unwrap();
        assert!(second.timestamp >= first.timestamp);
    }

    #[tokio::test]
    async fn cancelled_ctx_yields_no_metrics() {
        let (tx, rx) = tokio::sync::watch::channel(false);
        tx.send(true).unwrap();
        let base = BaseCollector::new(&config_with_target("127.0.0.1:1"));
        let link = Link::new("wan", "eth0", LinkClass::Lan);
        let ctx = Ctx::with_timeout(Duration::from_secs(5)).with_cancel(rx);
        assert!(base.collect_common(&ctx, &link).await.is_err());
    }
}
