//! Per-link sampling loop.
//!
//! One task per eligible link: tick, collect with a class-appropriate
//! deadline, emit the record as one JSON line on stdout, log degradation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use uplink_common::{CollectorConfig, Ctx, Link};
use uplink_collector::{Collector, CollectorFactory};

use crate::simulate;

pub struct Sampler {
    pub config: CollectorConfig,
    pub interval: Duration,
    pub simulate: bool,
    pub once: bool,
    pub shutdown: watch::Receiver<bool>,
}

impl Sampler {
    /// Drive sampling for one link until shutdown (or after a single pass
    /// with `once`).
    pub async fn run_link(self: Arc<Self>, link: Link) -> anyhow::Result<()> {
        let collector: Option<Box<dyn Collector>> = if self.simulate {
            None
        } else {
            Some(CollectorFactory::create(&link, &self.config)?)
        };

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {}
            }
            if *shutdown.borrow() {
                tracing::debug!(link = %link.name, "sampler stopping");
                return Ok(());
            }

            self.sample_once(&link, collector.as_deref()).await;
            if self.once {
                return Ok(());
            }
        }
    }

    async fn sample_once(&self, link: &Link, collector: Option<&dyn Collector>) {
        let Some(collector) = collector else {
            emit(&simulate::sample(link));
            return;
        };

        let timeout = self.config.timeout_for(link.class);
        let ctx = Ctx::with_timeout(timeout).with_cancel(self.shutdown.clone());
        match collector.collect(&ctx, link).await {
            Ok(collection) => {
                if let Some(annotation) = &collection.annotation {
                    tracing::warn!(
                        link = %link.name,
                        class = %link.class,
                        annotation = %annotation,
                        "collection degraded"
                    );
                }
                emit(&collection.metrics);
            }
            Err(err) => {
                tracing::warn!(link = %link.name, class = %link.class, error = %err, "collection failed");
            }
        }
    }
}

fn emit(metrics: &uplink_common::Metrics) {
    match serde_json::to_string(metrics) {
        Ok(line) => println!("{line}"),
        Err(err) => tracing::error!(error = %err, "metrics serialization failed"),
    }
}
