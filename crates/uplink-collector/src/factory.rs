//! Collector contract and factory.
//!
//! The factory is stateless: it hands out one collector per link, each
//! owning its own jitter history and transport clients. Callers drive
//! sampling on whatever schedule they choose; a collector instance must
//! not be shared across links.

use async_trait::async_trait;
use uplink_common::{CollectorConfig, CollectorError, Ctx, Link, LinkClass, Metrics, Result};

use crate::cellular::CellularCollector;
use crate::dish::DishCollector;
use crate::generic::GenericCollector;
use crate::wifi::WifiCollector;

/// Result of one successful collection cycle.
///
/// A degraded cycle (class-specific transports failed, baseline intact)
/// carries the failure as a non-fatal annotation next to the metrics —
/// the record is usable, the error is not silent.
#[derive(Debug)]
pub struct Collection {
    pub metrics: Metrics,
    pub annotation: Option<CollectorError>,
}

impl Collection {
    pub fn clean(metrics: Metrics) -> Self {
        Collection {
            metrics,
            annotation: None,
        }
    }

    pub fn degraded(metrics: Metrics, annotation: CollectorError) -> Self {
        Collection {
            metrics,
            annotation: Some(annotation),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.annotation.is_some()
    }
}

/// A per-link metric collector. Implementations are safe to invoke from
/// multiple tasks provided each task operates on a distinct link.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Link classes this collector accepts.
    fn classes(&self) -> &'static [LinkClass];

    /// Produce the normalized metrics record for one sampling cycle.
    async fn collect(&self, ctx: &Ctx, link: &Link) -> Result<Collection>;
}

/// Validate the preconditions every collector enforces before doing work.
pub(crate) fn validate_link(link: &Link, accepted: &'static [LinkClass]) -> Result<()> {
    if link.name.trim().is_empty() {
        return Err(CollectorError::Validation("link name is empty".into()));
    }
    if link.iface.trim().is_empty() {
        return Err(CollectorError::Validation(format!(
            "link {} has no interface",
            link.name
        )));
    }
    if !accepted.contains(&link.class) {
        return Err(CollectorError::Validation(format!(
            "link {} has class {}, collector handles {:?}",
            link.name, link.class, accepted
        )));
    }
    Ok(())
}

/// Creates the right collector for a link's class.
pub struct CollectorFactory;

impl CollectorFactory {
    pub fn create(link: &Link, config: &CollectorConfig) -> Result<Box<dyn Collector>> {
        if link.name.trim().is_empty() || link.iface.trim().is_empty() {
            return Err(CollectorError::Validation(format!(
                "link descriptor incomplete: name={:?} iface={:?}",
                link.name, link.iface
            )));
        }
        match link.class {
            LinkClass::SatelliteDish => Ok(Box::new(DishCollector::new(config)?)),
            LinkClass::Cellular => Ok(Box::new(CellularCollector::new(config))),
            LinkClass::Wifi => Ok(Box::new(WifiCollector::new(config))),
            LinkClass::Lan | LinkClass::Other => Ok(Box::new(GenericCollector::new(config))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_dispatches_on_class() {
        let config = CollectorConfig::default();
        for (class, expect) in [
            (LinkClass::SatelliteDish, &[LinkClass::SatelliteDish][..]),
            (LinkClass::Cellular, &[LinkClass::Cellular][..]),
            (LinkClass::Wifi, &[LinkClass::Wifi][..]),
            (LinkClass::Lan, &[LinkClass::Lan, LinkClass::Other][..]),
            (LinkClass::Other, &[LinkClass::Lan, LinkClass::Other][..]),
        ] {
            let link = Link::new("l", "eth0", class);
            let collector = CollectorFactory::create(&link, &config).unwrap();
            assert_eq!(collector.classes(), expect, "class {class}");
        }
    }

    #[test]
    fn factory_rejects_incomplete_links() {
        let config = CollectorConfig::default();
        let nameless = Link::new("", "eth0", LinkClass::Lan);
        assert!(matches!(
            CollectorFactory::create(&nameless, &config),
            Err(CollectorError::Validation(_))
        ));
        let ifaceless = Link::new("wan", "", LinkClass::Lan);
        assert!(matches!(
            CollectorFactory::create(&ifaceless, &config),
            Err(CollectorError::Validation(_))
        ));
    }

    #[test]
    fn validate_rejects_class_mismatch() {
        let link = Link::new("modem", "wwan0", LinkClass::Cellular);
        let err = validate_link(&link, &[LinkClass::Wifi]).unwrap_err();
        assert!(matches!(err, CollectorError::Validation(_)));
    }
}
