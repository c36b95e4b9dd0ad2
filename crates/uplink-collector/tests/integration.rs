//! End-to-end collector behavior against local sockets: factory dispatch,
//! graceful degradation, synthesized-data discipline, and cancellation.

use std::time::Duration;

use tokio::net::TcpListener;
use uplink_common::{
    CellularConfig, CollectorConfig, CollectorError, Ctx, DishConfig, Link, LinkClass, WifiConfig,
};
use uplink_collector::CollectorFactory;

/// Config whose probe target is a local listener and whose device
/// endpoints are all unreachable.
async fn offline_device_config() -> (CollectorConfig, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let config = CollectorConfig {
        targets: vec![addr],
        probe_timeout_secs: 1.0,
        dish: DishConfig {
            api_host: "127.0.0.1".into(),
            api_port: 1,
            timeout_secs: 5.0,
            ..DishConfig::default()
        },
        cellular: CellularConfig {
            ubus_path: "/nonexistent/uplink-ubus".into(),
            ..CellularConfig::default()
        },
        wifi: WifiConfig {
            ubus_path: "/nonexistent/uplink-ubus".into(),
            ..WifiConfig::default()
        },
        ..CollectorConfig::default()
    };
    (config, listener)
}

#[tokio::test]
async fn generic_collector_produces_baseline() {
    let (config, _listener) = offline_device_config().await;
    let link = Link::new("wan", "eth0", LinkClass::Lan);
    let collector = CollectorFactory::create(&link, &config).unwrap();

    let collection = collector.collect(&Ctx::background(), &link).await.unwrap();
    assert!(!collection.is_degraded());
    let m = &collection.metrics;
    assert!(m.latency_ms.is_some());
    assert_eq!(m.loss_pct, Some(0.0));
    assert_eq!(m.jitter_ms, Some(0.0));
    assert_eq!(m.class, LinkClass::Lan);
    assert!(!m.provenance.is_synthesized());
}

#[tokio::test]
async fn every_collector_enforces_class_discipline() {
    let (config, _listener) = offline_device_config().await;
    for class in [
        LinkClass::SatelliteDish,
        LinkClass::Cellular,
        LinkClass::Wifi,
        LinkClass::Lan,
    ] {
        let link = Link::new("l", "iface0", class);
        let collector = CollectorFactory::create(&link, &config).unwrap();
        let wrong = Link::new(
            "l",
            "iface0",
            if class == LinkClass::Cellular {
                LinkClass::Wifi
            } else {
                LinkClass::Cellular
            },
        );
        let err = collector
            .collect(&Ctx::background(), &wrong)
            .await
            .unwrap_err();
        assert!(
            matches!(err, CollectorError::Validation(_)),
            "class {class} accepted a mismatched link"
        );
    }
}

#[tokio::test]
async fn unreachable_dish_degrades_to_marked_placeholder() {
    let (config, _listener) = offline_device_config().await;
    let link = Link::new("starlink", "eth1", LinkClass::SatelliteDish);
    let collector = CollectorFactory::create(&link, &config).unwrap();

    let ctx = Ctx::with_timeout(Duration::from_secs(30));
    let collection = collector.collect(&ctx, &link).await.unwrap();

    // baseline survived the dish outage
    assert!(collection.metrics.has_baseline());
    assert!(collection.metrics.latency_ms.is_some());
    // placeholder is loud: annotation + provenance marker
    assert!(matches!(
        collection.annotation,
        Some(CollectorError::SynthesizedData(_))
    ));
    assert!(collection.metrics.provenance.is_synthesized());
    assert!(collection.metrics.provenance.fallback_used());
}

#[tokio::test]
async fn unreachable_wifi_rpc_keeps_baseline() {
    let (config, _listener) = offline_device_config().await;
    let link = Link::new("wifi", "uplinktest0", LinkClass::Wifi);
    let collector = CollectorFactory::create(&link, &config).unwrap();

    let collection = collector
        .collect(&Ctx::with_timeout(Duration::from_secs(10)), &link)
        .await
        .unwrap();
    assert!(collection.metrics.has_baseline());
    // the interface does not exist, so class-specific fields stay absent
    assert!(collection.metrics.signal_dbm.is_none());
    assert!(!collection.metrics.provenance.is_synthesized());
}

#[tokio::test]
async fn cancelled_context_yields_no_metrics() {
    let (config, _listener) = offline_device_config().await;
    let (tx, rx) = tokio::sync::watch::channel(false);
    tx.send(true).unwrap();

    for class in [LinkClass::SatelliteDish, LinkClass::Lan] {
        let link = Link::new("l", "iface0", class);
        let collector = CollectorFactory::create(&link, &config).unwrap();
        let ctx = Ctx::with_timeout(Duration::from_secs(30)).with_cancel(rx.clone());
        let err = collector.collect(&ctx, &link).await.unwrap_err();
        assert!(
            matches!(err, CollectorError::Cancelled),
            "class {class} did not honor cancellation"
        );
    }
}

#[tokio::test]
async fn successive_collects_grow_the_jitter_window() {
    let (config, _listener) = offline_device_config().await;
    let link = Link::new("wan", "eth0", LinkClass::Lan);
    let collector = CollectorFactory::create(&link, &config).unwrap();
    let ctx = Ctx::background();

    let first = collector.collect(&ctx, &link).await.unwrap();
    let second = collector.collect(&ctx, &link).await.unwrap();
    assert_eq!(first.metrics.jitter_ms, Some(0.0));
    // with two samples the window holds both; jitter is their half-spread
    assert!(second.metrics.jitter_ms.unwrap() >= 0.0);
    assert!(second.metrics.timestamp >= first.metrics.timestamp);
}
