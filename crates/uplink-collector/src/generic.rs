//! Generic collector for LAN and uncategorized links — baseline only.

use async_trait::async_trait;
use uplink_common::{CollectorConfig, Ctx, Link, LinkClass, Result};

use crate::base::BaseCollector;
use crate::factory::{validate_link, Collection, Collector};

pub struct GenericCollector {
    base: BaseCollector,
}

impl GenericCollector {
    pub fn new(config: &CollectorConfig) -> Self {
        GenericCollector {
            base: BaseCollector::new(config),
        }
    }
}

const CLASSES: &[LinkClass] = &[LinkClass::Lan, LinkClass::Other];

#[async_trait]
impl Collector for GenericCollector {
    fn classes(&self) -> &'static [LinkClass] {
        CLASSES
    }

    async fn collect(&self, ctx: &Ctx, link: &Link) -> Result<Collection> {
        validate_link(link, CLASSES)?;
        let metrics = self.base.collect_common(ctx, link).await?;
        Ok(Collection::clean(metrics))
    }
}
