//! Simulation mode — plausible per-class metric records without touching
//! hardware. Every simulated record is provenance-marked synthesized so it
//! can never be mistaken for a real reading downstream.

use rand::Rng;
use uplink_common::{Link, LinkClass, Metrics, RoamingType};

pub fn sample(link: &Link) -> Metrics {
    let mut rng = rand::rng();
    let mut m = Metrics::new(link);

    m.latency_ms = Some(25.0 + rng.random_range(0.0..40.0_f64));
    m.loss_pct = Some(rng.random_range(0.0..0.5_f64));
    m.jitter_ms = Some(rng.random_range(0.5..6.0_f64));

    match link.class {
        LinkClass::SatelliteDish => {
            m.obstruction_pct = Some(rng.random_range(0.0..3.0_f64));
            m.snr_db = Some(rng.random_range(7..13));
            m.currently_obstructed = Some(false);
            m.outages = Some(0);
            m.uptime_s = Some(rng.random_range(3_600..604_800));
            m.gps_valid = Some(true);
            m.latitude = Some(63.0 + rng.random_range(0.0..0.5_f64));
            m.longitude = Some(21.0 + rng.random_range(0.0..0.5_f64));
            m.gps_satellites = Some(rng.random_range(8..14));
            m.gps_source = Some(uplink_common::GpsSource::Dish);
        }
        LinkClass::Cellular => {
            m.rsrp_dbm = Some(-65 - rng.random_range(0..30));
            m.rsrq_db = Some(-8 - rng.random_range(0..8));
            m.sinr_db = Some(rng.random_range(2..20));
            m.rssi_dbm = Some(-55 - rng.random_range(0..25));
            m.network_type = Some("lte".into());
            m.operator = Some("SimNet".into());
            m.home_operator = Some("SimNet".into());
            m.roaming = Some(false);
            m.roaming_type = Some(RoamingType::National);
        }
        LinkClass::Wifi => {
            let signal = -45 - rng.random_range(0..30);
            let noise = -95;
            m.signal_dbm = Some(signal);
            m.noise_dbm = Some(noise);
            m.snr_db = Some(signal - noise);
            m.ssid = Some("sim-ap".into());
            m.mode = Some("Client".into());
            m.tethering_mode = Some(false);
            m.bitrate_bps = Some(rng.random_range(50..800) * 1_000_000);
        }
        LinkClass::Lan | LinkClass::Other => {}
    }

    m.provenance.set_transport("simulated");
    m.provenance.mark_synthesized();
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_records_are_always_marked() {
        for class in [
            LinkClass::SatelliteDish,
            LinkClass::Cellular,
            LinkClass::Wifi,
            LinkClass::Lan,
        ] {
            let link = Link::new("sim", "sim0", class);
            let m = sample(&link);
            assert!(m.provenance.is_synthesized(), "class {class}");
            assert!(m.has_baseline());
        }
    }

    #[test]
    fn gps_validity_discipline_holds_in_simulation() {
        let link = Link::new("sim", "sim0", LinkClass::SatelliteDish);
        let m = sample(&link);
        assert_eq!(m.gps_valid, Some(true));
        assert!(m.latitude.is_some() && m.longitude.is_some());
    }
}
