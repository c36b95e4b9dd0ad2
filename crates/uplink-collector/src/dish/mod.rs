//! Satellite-dish collector.
//!
//! Transport ladder: reflection-driven dynamic gRPC, hand-crafted raw
//! gRPC, HTTP/JSON on port 80, and finally a clearly-marked synthesized
//! placeholder. Ordering follows the `grpc_first`/`http_first` preferences;
//! per-transport failures are recovered internally and only the chosen
//! transport lands in provenance.

pub mod analyzer;

mod grpc;
mod http;
mod status;
mod wire;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use uplink_common::{
    CollectorConfig, CollectorError, Ctx, DishConfig, Link, LinkClass, Metrics, Result,
};

use crate::base::BaseCollector;
use crate::factory::{validate_link, Collection, Collector};

pub use analyzer::{analyze, assess_health, DishHealth, HealthLevel, PredictiveFailureAssessment, Risk};

const CLASSES: &[LinkClass] = &[LinkClass::SatelliteDish];

/// Sub-deadline for one transport attempt.
const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    GrpcReflection,
    GrpcRaw,
    Http,
}

impl Transport {
    fn name(self) -> &'static str {
        match self {
            Transport::GrpcReflection => "grpc-reflection",
            Transport::GrpcRaw => "grpc-raw",
            Transport::Http => "http",
        }
    }
}

struct Fetched {
    value: Value,
    transport: Transport,
    api_ms: f64,
    heuristic: bool,
    fallback: bool,
}

pub struct DishCollector {
    base: BaseCollector,
    cfg: DishConfig,
    order: Vec<Transport>,
    http: reqwest::Client,
}

impl DishCollector {
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        let cfg = config.dish.clone();
        let order = transport_order(&cfg);
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(TRANSPORT_TIMEOUT)
            .build()
            .map_err(|e| CollectorError::TransportUnavailable(format!("http client: {e}")))?;
        Ok(DishCollector {
            base: BaseCollector::new(config),
            cfg,
            order,
            http,
        })
    }

    /// Richer key/value bag for diagnostics: device identity plus a status
    /// summary.
    pub async fn describe(&self, ctx: &Ctx, link: &Link) -> Result<BTreeMap<String, String>> {
        validate_link(link, CLASSES)?;
        let fetched = self.fetch_status(ctx).await?;
        let mut bag: BTreeMap<String, String> = status::describe_fields(&fetched.value)
            .into_iter()
            .collect();

        // Device info may live in a separate API variant; enrich when the
        // status document did not carry it.
        if !bag.contains_key("id") {
            if let Ok(info) =
                grpc::fetch_dynamic(&ctx.child(TRANSPORT_TIMEOUT), &self.cfg, grpc::GET_DEVICE_INFO)
                    .await
            {
                for (key, value) in status::describe_fields(&info) {
                    bag.entry(key).or_insert(value);
                }
            }
        }
        bag.insert("transport".to_string(), fetched.transport.name().to_string());
        Ok(bag)
    }

    /// Health summary from a fresh status sample.
    pub async fn assess_health(&self, ctx: &Ctx, link: &Link) -> Result<DishHealth> {
        validate_link(link, CLASSES)?;
        let fetched = self.fetch_status(ctx).await?;
        let mut metrics = Metrics::new(link);
        status::apply_status(&mut metrics, &fetched.value);
        Ok(analyzer::assess_health(&metrics))
    }

    async fn fetch_status(&self, ctx: &Ctx) -> Result<Fetched> {
        let mut last_err =
            CollectorError::TransportUnavailable("no dish transports configured".into());

        for (index, transport) in self.order.iter().copied().enumerate() {
            ctx.check()?;
            let attempt_ctx = ctx.child(TRANSPORT_TIMEOUT);
            let started = Instant::now();
            let outcome = match transport {
                Transport::GrpcReflection => {
                    grpc::fetch_dynamic(&attempt_ctx, &self.cfg, grpc::GET_STATUS)
                        .await
                        .map(|value| (value, false))
                }
                Transport::GrpcRaw => grpc::fetch_raw(&attempt_ctx, &self.cfg, grpc::GET_STATUS)
                    .await
                    .map(|raw| (raw.value, raw.heuristic)),
                Transport::Http => {
                    http::fetch_status(&attempt_ctx, &self.http, &self.cfg.http_base())
                        .await
                        .map(|value| (value, false))
                }
            };
            match outcome {
                Ok((value, heuristic)) => {
                    return Ok(Fetched {
                        value,
                        transport,
                        api_ms: started.elapsed().as_secs_f64() * 1000.0,
                        heuristic,
                        fallback: index > 0,
                    });
                }
                Err(CollectorError::Cancelled) => return Err(CollectorError::Cancelled),
                Err(err) => {
                    tracing::debug!(transport = transport.name(), error = %err, "dish transport failed");
                    last_err = err;
                }
            }
        }
        Err(CollectorError::TransportUnavailable(format!(
            "all dish transports failed, last: {last_err}"
        )))
    }

    /// Placeholder values for a cycle where no transport answered. The
    /// record is unmistakably marked; the accompanying error is loud.
    fn synthesize_placeholder(&self, metrics: &mut Metrics) {
        use rand::Rng;
        let mut rng = rand::rng();
        metrics.obstruction_pct = Some(rng.random_range(0.0..2.0));
        metrics.snr_db = Some(rng.random_range(6..12));
        metrics.currently_obstructed = Some(false);
        metrics.outages = Some(0);
    }
}

fn transport_order(cfg: &DishConfig) -> Vec<Transport> {
    if cfg.http_first {
        vec![Transport::Http, Transport::GrpcReflection, Transport::GrpcRaw]
    } else {
        // grpc_first is the default preference
        vec![Transport::GrpcReflection, Transport::GrpcRaw, Transport::Http]
    }
}

#[async_trait]
impl Collector for DishCollector {
    fn classes(&self) -> &'static [LinkClass] {
        CLASSES
    }

    async fn collect(&self, ctx: &Ctx, link: &Link) -> Result<Collection> {
        validate_link(link, CLASSES)?;
        let mut metrics = self.base.collect_common(ctx, link).await?;

        match self.fetch_status(ctx).await {
            Ok(fetched) => {
                status::apply_status(&mut metrics, &fetched.value);
                metrics.provenance.set_transport(fetched.transport.name());
                metrics.provenance.set_api_ms(fetched.api_ms);
                if fetched.fallback {
                    metrics.provenance.mark_fallback();
                }
                if fetched.heuristic {
                    metrics.provenance.mark_heuristic();
                }
                Ok(Collection::clean(metrics))
            }
            Err(CollectorError::Cancelled) => Err(CollectorError::Cancelled),
            Err(err) => {
                tracing::warn!(link = %link.name, error = %err, "dish unreachable, synthesizing placeholder");
                self.synthesize_placeholder(&mut metrics);
                metrics.provenance.mark_synthesized();
                metrics.provenance.mark_fallback();
                metrics.provenance.set_error(&err.to_string());
                let annotation = CollectorError::SynthesizedData(err.to_string());
                Ok(Collection::degraded(metrics, annotation))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_prefers_grpc() {
        let order = transport_order(&DishConfig::default());
        assert_eq!(
            order,
            vec![Transport::GrpcReflection, Transport::GrpcRaw, Transport::Http]
        );
    }

    #[test]
    fn http_first_reorders() {
        let cfg = DishConfig {
            http_first: true,
            ..DishConfig::default()
        };
        let order = transport_order(&cfg);
        assert_eq!(
            order,
            vec![Transport::Http, Transport::GrpcReflection, Transport::GrpcRaw]
        );
    }

    #[tokio::test]
    async fn wrong_class_is_rejected() {
        let collector = DishCollector::new(&CollectorConfig::default()).unwrap();
        let link = Link::new("wan", "eth0", LinkClass::Lan);
        let err = collector
            .collect(&Ctx::background(), &link)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::Validation(_)));
    }
}
