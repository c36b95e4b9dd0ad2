//! Dish status extraction.
//!
//! All three transports funnel into the same JSON-shaped value: the
//! reflection path serializes the dynamic response message, the raw wire
//! walker emits a flat map, and the HTTP fallback returns the body as-is.
//! This module applies the one field-mapping contract to all of them.

use serde_json::Value;
use uplink_common::{GpsSource, Metrics};

use crate::json::{self, as_bool, as_f64, as_i64, as_str, first_path};

/// A recent outage within this many seconds bumps the outage counter once.
const RECENT_OUTAGE_WINDOW_S: f64 = 300.0;

/// Populate every metrics field the response carries a meaningful value for.
pub(crate) fn apply_status(metrics: &mut Metrics, value: &Value) {
    let status = locate_status(value);

    // Obstruction
    if let Some(fraction) = float(status, &[
        "obstructionStats.fractionObstructed",
        "fractionObstructed",
    ]) {
        metrics.obstruction_pct = Some((fraction * 100.0).clamp(0.0, 100.0));
    }
    if let Some(fraction) = float(status, &[
        "obstructionStats.fractionObstructedTime",
        "fractionObstructedTime",
    ]) {
        metrics.obstruction_time_pct = Some((fraction * 100.0).clamp(0.0, 100.0));
    }
    metrics.obstruction_valid_s = int(status, &["obstructionStats.validS", "validS"])
        .or(metrics.obstruction_valid_s);
    metrics.obstruction_avg_prolonged_s = float(status, &[
        "obstructionStats.avgProlongedObstructionIntervalS",
        "avgProlongedObstructionIntervalS",
    ])
    .or(metrics.obstruction_avg_prolonged_s);
    metrics.obstruction_patches_valid = int(status, &[
        "obstructionStats.patchesValid",
        "patchesValid",
    ])
    .or(metrics.obstruction_patches_valid);
    metrics.currently_obstructed = boolean(status, &[
        "obstructionStats.currentlyObstructed",
        "currentlyObstructed",
    ])
    .or(metrics.currently_obstructed);

    // PoP ping quality — the dish's own latency/loss view supersedes the
    // generic probe readings when present.
    if let Some(latency) = float(status, &["popPingLatencyMs"]) {
        metrics.latency_ms = Some(latency.max(0.0));
    }
    if let Some(drop_rate) = float(status, &["popPingDropRate"]) {
        metrics.loss_pct = Some((drop_rate * 100.0).clamp(0.0, 100.0));
    }

    // SNR: first non-zero of `snr` and `snrDb`, truncated to integer.
    let snr = float(status, &["snr"]).filter(|v| *v != 0.0);
    let snr_db = float(status, &["snrDb"]).filter(|v| *v != 0.0);
    match snr.or(snr_db) {
        Some(v) => metrics.snr_db = Some(v as i32),
        None => {
            if float(status, &["snr"]).is_some() || float(status, &["snrDb"]).is_some() {
                metrics.snr_db = Some(0);
            }
        }
    }
    metrics.snr_above_noise_floor = boolean(status, &[
        "isSnrAboveNoiseFloor",
        "readyStates.snrAboveNoiseFloor",
    ])
    .or(metrics.snr_above_noise_floor);
    metrics.snr_persistently_low = boolean(status, &[
        "isSnrPersistentlyLow",
        "snrPersistentlyLow",
    ])
    .or(metrics.snr_persistently_low);

    // Outages
    metrics.outages = outage_count(status).or(metrics.outages);

    // Device state / info
    metrics.uptime_s = int(status, &["deviceState.uptimeS", "uptimeS"]).or(metrics.uptime_s);
    metrics.boot_count = int(status, &[
        "deviceInfo.bootcount",
        "deviceInfo.bootCount",
        "bootcount",
    ])
    .or(metrics.boot_count);

    // Hardware self test: string form preferred, boolean tolerated.
    metrics.hardware_self_test = first_path(status, &["hardwareSelfTest"])
        .and_then(|v| {
            as_str(v).or_else(|| as_bool(v).map(|ok| if ok { "PASSED" } else { "FAILED" }.into()))
        })
        .or(metrics.hardware_self_test.take());

    // Thermal and power
    metrics.thermal_throttle = boolean(status, &[
        "thermalThrottle",
        "thermal.throttle",
        "alerts.thermalThrottle",
    ])
    .or(metrics.thermal_throttle);
    metrics.thermal_shutdown = boolean(status, &[
        "thermalShutdown",
        "thermal.shutdown",
        "alerts.thermalShutdown",
    ])
    .or(metrics.thermal_shutdown);
    metrics.temperature_c = float(status, &["thermal.temperatureC", "temperatureC"])
        .or(metrics.temperature_c);
    metrics.voltage_v = float(status, &["power.voltageV", "voltageV"]).or(metrics.voltage_v);

    // Bandwidth restrictions
    metrics.downlink_restricted_reason = string(status, &[
        "bandwidthRestrictions.downlink",
        "downlinkBandwidthRestrictedReason",
    ])
    .or(metrics.downlink_restricted_reason.take());
    metrics.uplink_restricted_reason = string(status, &[
        "bandwidthRestrictions.uplink",
        "uplinkBandwidthRestrictedReason",
    ])
    .or(metrics.uplink_restricted_reason.take());

    // Software update / reboot signals
    metrics.software_update_state = string(status, &[
        "softwareUpdateState",
        "softwareUpdateStats.softwareUpdateState",
        "system.softwareUpdateState",
    ])
    .or(metrics.software_update_state.take());
    metrics.swupdate_reboot_ready = boolean(status, &[
        "swupdateRebootReady",
        "system.swupdateRebootReady",
        "alerts.swupdateRebootReady",
    ])
    .or(metrics.swupdate_reboot_ready);
    metrics.scheduled_reboot_utc = string(status, &[
        "scheduledRebootUtc",
        "system.scheduledRebootUtc",
        "rebootScheduledUtcTime",
    ])
    .or(metrics.scheduled_reboot_utc.take());

    metrics.roaming_alert =
        boolean(status, &["alerts.roaming", "roamingAlert"]).or(metrics.roaming_alert);

    apply_gps(metrics, status);
}

/// GPS coordinates are only trustworthy — and only populated — when the
/// fix is marked valid.
fn apply_gps(metrics: &mut Metrics, status: &Value) {
    let valid = boolean(status, &["gps.gpsValid", "gpsStats.gpsValid", "gpsValid"]);
    let Some(valid) = valid else { return };
    metrics.gps_valid = Some(valid);
    if !valid {
        metrics.gps_source = Some(GpsSource::None);
        return;
    }

    metrics.latitude = float(status, &["gps.latitude", "getLocation.lla.lat", "latitude"]);
    metrics.longitude = float(status, &["gps.longitude", "getLocation.lla.lon", "longitude"]);
    metrics.altitude_m = float(status, &["gps.altitudeM", "getLocation.lla.alt", "altitudeM"]);
    metrics.gps_satellites = int(status, &["gps.gpsSats", "gpsStats.gpsSats", "gpsSats"])
        .map(|v| v as i32);
    metrics.gps_uncertainty_m = float(status, &[
        "gps.uncertaintyMeters",
        "gpsStats.uncertaintyMeters",
        "uncertaintyMeters",
    ]);
    metrics.gps_source = Some(GpsSource::Dish);
}

/// Outage counting: the HTTP shape carries `outageCount`; the leaner gRPC
/// shape only reports `lastOutageS`, reducing the rule to 0 or 1 on the
/// five-minute recency test.
fn outage_count(status: &Value) -> Option<i64> {
    let count = int(status, &["outage.outageCount", "outageCount"]);
    let last_outage_s = float(status, &["outage.lastOutageS", "lastOutageS"]);
    if count.is_none() && last_outage_s.is_none() {
        return None;
    }
    let recent_bump = match last_outage_s {
        Some(s) if s > 0.0 && s <= RECENT_OUTAGE_WINDOW_S => 1,
        _ => 0,
    };
    Some(count.unwrap_or(0) + recent_bump)
}

/// The status object may arrive bare, under `status` (HTTP), or under
/// `dishGetStatus` (serialized gRPC response).
pub(crate) fn locate_status(value: &Value) -> &Value {
    for key in ["status", "dishGetStatus"] {
        if let Some(inner) = value.get(key) {
            if inner.is_object() {
                return inner;
            }
        }
    }
    value
}

/// Whether a decoded body plausibly is a dish status document.
pub(crate) fn looks_like_status(value: &Value) -> bool {
    let status = locate_status(value);
    if !status.is_object() {
        return false;
    }
    [
        "obstructionStats",
        "popPingLatencyMs",
        "popPingDropRate",
        "snr",
        "snrDb",
        "deviceInfo",
        "deviceState",
        "outage",
    ]
    .iter()
    .any(|key| status.get(*key).is_some())
}

/// Device description bag for diagnostics.
pub(crate) fn describe_fields(value: &Value) -> Vec<(String, String)> {
    let status = locate_status(value);
    let mut bag = Vec::new();
    let mut push = |key: &str, v: Option<String>| {
        if let Some(v) = v {
            bag.push((key.to_string(), v));
        }
    };

    push("id", string(status, &["deviceInfo.id", "id"]));
    push(
        "hardware_version",
        string(status, &["deviceInfo.hardwareVersion", "hardwareVersion"]),
    );
    push(
        "software_version",
        string(status, &["deviceInfo.softwareVersion", "softwareVersion"]),
    );
    push(
        "country_code",
        string(status, &["deviceInfo.countryCode", "countryCode"]),
    );
    push(
        "uptime_s",
        int(status, &["deviceState.uptimeS", "uptimeS"]).map(|v| v.to_string()),
    );
    push(
        "obstruction_fraction",
        float(status, &[
            "obstructionStats.fractionObstructed",
            "fractionObstructed",
        ])
        .map(|v| format!("{v:.4}")),
    );
    push(
        "software_update_state",
        string(status, &[
            "softwareUpdateState",
            "softwareUpdateStats.softwareUpdateState",
        ]),
    );
    push(
        "gps_valid",
        boolean(status, &["gps.gpsValid", "gpsStats.gpsValid", "gpsValid"])
            .map(|v| v.to_string()),
    );
    bag
}

fn float(v: &Value, paths: &[&str]) -> Option<f64> {
    first_path(v, paths).and_then(as_f64)
}

fn int(v: &Value, paths: &[&str]) -> Option<i64> {
    first_path(v, paths).and_then(as_i64)
}

fn boolean(v: &Value, paths: &[&str]) -> Option<bool> {
    first_path(v, paths).and_then(as_bool)
}

fn string(v: &Value, paths: &[&str]) -> Option<String> {
    first_path(v, paths).and_then(json::as_str)
}
