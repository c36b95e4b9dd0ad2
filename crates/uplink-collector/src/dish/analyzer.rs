//! Dish signal analysis — trend detection over a short metrics history
//! and a single-sample health summary.
//!
//! Heuristically recovered samples are excluded from trend computation;
//! their confidence is too low to contribute to a failure prediction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uplink_common::Metrics;

/// Obstruction growth (percentage points per sample) that signals trouble.
const OBSTRUCTION_ACCEL_THRESHOLD: f64 = 0.02;
/// SNR slope (dB per sample) below which the link is degrading.
const SNR_SLOPE_THRESHOLD: f64 = -1.0;
/// Minimum usable samples for any trend statement.
const MIN_SAMPLES: usize = 3;

/// Severity ladder for predictive assessments.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Risk {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

/// Short-horizon failure estimate for one dish link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictiveFailureAssessment {
    pub risk: Risk,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_failure_s: Option<i64>,
    pub triggers: Vec<String>,
}

impl PredictiveFailureAssessment {
    fn insufficient_data() -> Self {
        PredictiveFailureAssessment {
            risk: Risk::Unknown,
            confidence: 0.0,
            time_to_failure_s: None,
            triggers: vec!["insufficient_data".to_string()],
        }
    }
}

/// Analyze a window of recent metrics for one dish link.
pub fn analyze(samples: &[Metrics]) -> PredictiveFailureAssessment {
    let usable: Vec<&Metrics> = samples
        .iter()
        .filter(|m| !m.provenance.is_heuristic())
        .collect();
    if usable.len() < MIN_SAMPLES {
        return PredictiveFailureAssessment::insufficient_data();
    }

    // (name, risk, confidence, time-to-failure)
    let mut triggers: Vec<(&'static str, Risk, f64, i64)> = Vec::new();

    if let Some(slope) = mean_first_difference(&usable, |m| m.obstruction_pct) {
        if slope > OBSTRUCTION_ACCEL_THRESHOLD {
            triggers.push(("obstruction_acceleration", Risk::High, 0.8, 300));
        }
    }
    if let Some(slope) = mean_first_difference(&usable, |m| m.snr_db.map(f64::from)) {
        if slope < SNR_SLOPE_THRESHOLD {
            triggers.push(("snr_degradation", Risk::Medium, 0.7, 600));
        }
    }
    if usable.iter().any(|m| {
        m.thermal_throttle == Some(true) || m.thermal_shutdown == Some(true)
    }) {
        triggers.push(("thermal_degradation", Risk::High, 0.9, 180));
    }

    if triggers.is_empty() {
        return PredictiveFailureAssessment {
            risk: Risk::Low,
            confidence: 0.5,
            time_to_failure_s: None,
            triggers: Vec::new(),
        };
    }

    // Overall risk is the worst trigger; its confidence and horizon follow
    // the most severe (then most confident) entry.
    let worst = triggers
        .iter()
        .max_by(|a, b| {
            a.1.cmp(&b.1)
                .then(a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
        })
        .copied()
        .expect("triggers is non-empty");

    PredictiveFailureAssessment {
        risk: worst.1,
        confidence: worst.2,
        time_to_failure_s: Some(worst.3),
        triggers: triggers.iter().map(|t| t.0.to_string()).collect(),
    }
}

/// Mean of consecutive differences of `field` over the window; `None`
/// when fewer than two samples carry the field.
fn mean_first_difference<F>(samples: &[&Metrics], field: F) -> Option<f64>
where
    F: Fn(&Metrics) -> Option<f64>,
{
    let values: Vec<f64> = samples.iter().filter_map(|m| field(m)).collect();
    if values.len() < 2 {
        return None;
    }
    let sum: f64 = values.windows(2).map(|w| w[1] - w[0]).sum();
    Some(sum / (values.len() - 1) as f64)
}

// ── Single-sample health assessment ─────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Critical,
}

/// Health summary derived from the latest dish metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishHealth {
    pub overall: HealthLevel,
    pub hardware_test: String,
    pub thermal: String,
    pub power: String,
    pub signal_quality: String,
    pub alerts: Vec<String>,
}

const VOLTAGE_RANGE_V: (f64, f64) = (48.0, 56.0);
const HIGH_TEMPERATURE_C: f64 = 70.0;
const REBOOT_IMMINENT_WINDOW_S: i64 = 300;

/// Inspect one metrics record and emit the health bag.
pub fn assess_health(metrics: &Metrics) -> DishHealth {
    let mut alerts = Vec::new();
    let mut critical = false;

    let hardware_test = match metrics.hardware_self_test.as_deref() {
        Some("FAILED") => {
            alerts.push("hardware_self_test_failed".to_string());
            critical = true;
            "failed".to_string()
        }
        Some(_) => "passed".to_string(),
        None => "unknown".to_string(),
    };

    let thermal = if metrics.thermal_shutdown == Some(true) {
        alerts.push("thermal_shutdown_imminent".to_string());
        critical = true;
        "shutdown".to_string()
    } else if metrics.thermal_throttle == Some(true) {
        alerts.push("thermal_throttling_active".to_string());
        "throttling".to_string()
    } else {
        "nominal".to_string()
    };
    if metrics.temperature_c.is_some_and(|t| t > HIGH_TEMPERATURE_C) {
        alerts.push("high_temperature_detected".to_string());
    }

    let power = match metrics.voltage_v {
        Some(v) if v < VOLTAGE_RANGE_V.0 || v > VOLTAGE_RANGE_V.1 => {
            alerts.push("voltage_out_of_range".to_string());
            "out_of_range".to_string()
        }
        Some(_) => "nominal".to_string(),
        None => "unknown".to_string(),
    };

    let signal_quality = match metrics.snr_db {
        Some(snr) if snr < 5 => {
            alerts.push("low_snr_detected".to_string());
            "poor".to_string()
        }
        Some(snr) if snr < 10 => "fair".to_string(),
        Some(_) => "good".to_string(),
        None => "unknown".to_string(),
    };
    if metrics.snr_above_noise_floor == Some(false) {
        alerts.push("snr_below_noise_floor".to_string());
    }

    if metrics.swupdate_reboot_ready == Some(true) {
        alerts.push("software_update_reboot_ready".to_string());
    }
    if let Some(when) = metrics.scheduled_reboot_utc.as_deref() {
        alerts.push("reboot_scheduled".to_string());
        if reboot_within(when, REBOOT_IMMINENT_WINDOW_S) {
            alerts.push("reboot_imminent_5min".to_string());
        }
    }

    if metrics.currently_obstructed == Some(true) {
        alerts.push("currently_obstructed".to_string());
    }
    let sustained_obstruction = metrics.obstruction_pct.is_some_and(|pct| pct > 5.0)
        && metrics
            .obstruction_avg_prolonged_s
            .is_some_and(|avg| avg > 30.0);
    if sustained_obstruction {
        alerts.push("obstruction_pattern_detected".to_string());
    }

    let overall = if critical || alerts.len() > 3 {
        HealthLevel::Critical
    } else if alerts.len() > 1 {
        HealthLevel::Degraded
    } else {
        HealthLevel::Healthy
    };

    DishHealth {
        overall,
        hardware_test,
        thermal,
        power,
        signal_quality,
        alerts,
    }
}

fn reboot_within(scheduled_utc: &str, window_s: i64) -> bool {
    let Ok(when) = chrono::DateTime::parse_from_rfc3339(scheduled_utc) else {
        return false;
    };
    let delta = when.with_timezone(&Utc) - Utc::now();
    delta.num_seconds() >= 0 && delta.num_seconds() <= window_s
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplink_common::{Link, LinkClass};

    fn sample() -> Metrics {
        Metrics::new(&Link::new("starlink", "eth1", LinkClass::SatelliteDish))
    }

    fn obstruction_window(values: &[f64]) -> Vec<Metrics> {
        values
            .iter()
            .map(|v| {
                let mut m = sample();
                m.obstruction_pct = Some(*v);
                m
            })
            .collect()
    }

    #[test]
    fn obstruction_acceleration_is_high_risk() {
        let window = obstruction_window(&[1.0, 4.0, 7.0]);
        let assessment = analyze(&window);
        assert_eq!(assessment.risk, Risk::High);
        assert!(assessment
            .triggers
            .contains(&"obstruction_acceleration".to_string()));
        assert_eq!(assessment.confidence, 0.8);
        assert_eq!(assessment.time_to_failure_s, Some(300));
    }

    #[test]
    fn snr_degradation_is_at_least_medium() {
        let window: Vec<Metrics> = [15, 12, 9]
            .iter()
            .map(|snr| {
                let mut m = sample();
                m.snr_db = Some(*snr);
                m
            })
            .collect();
        let assessment = analyze(&window);
        assert!(assessment.risk >= Risk::Medium);
        assert!(assessment.triggers.contains(&"snr_degradation".to_string()));
        assert_eq!(assessment.time_to_failure_s, Some(600));
    }

    #[test]
    fn thermal_flag_is_high_risk() {
        let mut window = obstruction_window(&[1.0, 1.0, 1.0]);
        window[1].thermal_throttle = Some(true);
        let assessment = analyze(&window);
        assert_eq!(assessment.risk, Risk::High);
        assert!(assessment
            .triggers
            .contains(&"thermal_degradation".to_string()));
        assert_eq!(assessment.confidence, 0.9);
        assert_eq!(assessment.time_to_failure_s, Some(180));
    }

    #[test]
    fn triggers_coexist_and_risk_is_max() {
        let mut window = obstruction_window(&[1.0, 4.0, 7.0]);
        for (m, snr) in window.iter_mut().zip([15, 12, 9]) {
            m.snr_db = Some(snr);
        }
        window[2].thermal_shutdown = Some(true);
        let assessment = analyze(&window);
        assert_eq!(assessment.risk, Risk::High);
        assert_eq!(assessment.triggers.len(), 3);
        // thermal wins the tie on confidence
        assert_eq!(assessment.confidence, 0.9);
    }

    #[test]
    fn short_window_is_insufficient_data() {
        let window = obstruction_window(&[1.0, 4.0]);
        let assessment = analyze(&window);
        assert_eq!(assessment.risk, Risk::Unknown);
        assert_eq!(assessment.confidence, 0.0);
        assert_eq!(assessment.triggers, vec!["insufficient_data".to_string()]);
    }

    #[test]
    fn heuristic_samples_do_not_contribute() {
        let mut window = obstruction_window(&[1.0, 4.0, 7.0]);
        window[2].provenance.mark_heuristic();
        let assessment = analyze(&window);
        assert_eq!(assessment.risk, Risk::Unknown);
        assert!(assessment.triggers.contains(&"insufficient_data".to_string()));
    }

    #[test]
    fn stable_window_is_low_risk() {
        let mut window = obstruction_window(&[1.0, 1.0, 1.0]);
        for m in &mut window {
            m.snr_db = Some(12);
        }
        let assessment = analyze(&window);
        assert_eq!(assessment.risk, Risk::Low);
        assert!(assessment.triggers.is_empty());
        assert_eq!(assessment.time_to_failure_s, None);
    }

    #[test]
    fn risk_ordering() {
        assert!(Risk::Critical > Risk::High);
        assert!(Risk::High > Risk::Medium);
        assert!(Risk::Medium > Risk::Low);
        assert!(Risk::Low > Risk::Unknown);
    }

    #[test]
    fn failed_self_test_is_critical() {
        let mut m = sample();
        m.hardware_self_test = Some("FAILED".to_string());
        let health = assess_health(&m);
        assert_eq!(health.overall, HealthLevel::Critical);
        assert!(health
            .alerts
            .contains(&"hardware_self_test_failed".to_string()));
        assert_eq!(health.hardware_test, "failed");
    }

    #[test]
    fn thermal_shutdown_is_critical() {
        let mut m = sample();
        m.thermal_shutdown = Some(true);
        let health = assess_health(&m);
        assert_eq!(health.overall, HealthLevel::Critical);
        assert!(health
            .alerts
            .contains(&"thermal_shutdown_imminent".to_string()));
        assert_eq!(health.thermal, "shutdown");
    }

    #[test]
    fn snr_bands() {
        let mut m = sample();
        m.snr_db = Some(3);
        let health = assess_health(&m);
        assert_eq!(health.signal_quality, "poor");
        assert!(health.alerts.contains(&"low_snr_detected".to_string()));

        m.snr_db = Some(7);
        assert_eq!(assess_health(&m).signal_quality, "fair");

        m.snr_db = Some(14);
        assert_eq!(assess_health(&m).signal_quality, "good");
    }

    #[test]
    fn voltage_out_of_range_alerts() {
        let mut m = sample();
        m.voltage_v = Some(44.0);
        let health = assess_health(&m);
        assert!(health.alerts.contains(&"voltage_out_of_range".to_string()));
        assert_eq!(health.power, "out_of_range");

        m.voltage_v = Some(52.0);
        assert_eq!(assess_health(&m).power, "nominal");
    }

    #[test]
    fn obstruction_pattern_detection() {
        let mut m = sample();
        m.obstruction_pct = Some(6.0);
        m.obstruction_avg_prolonged_s = Some(45.0);
        m.currently_obstructed = Some(true);
        let health = assess_health(&m);
        assert!(health
            .alerts
            .contains(&"obstruction_pattern_detected".to_string()));
        assert!(health.alerts.contains(&"currently_obstructed".to_string()));
        assert_eq!(health.overall, HealthLevel::Degraded);
    }

    #[test]
    fn imminent_reboot_within_five_minutes() {
        let mut m = sample();
        let soon = Utc::now() + chrono::Duration::seconds(120);
        m.scheduled_reboot_utc = Some(soon.to_rfc3339());
        let health = assess_health(&m);
        assert!(health.alerts.contains(&"reboot_scheduled".to_string()));
        assert!(health.alerts.contains(&"reboot_imminent_5min".to_string()));

        let mut m = sample();
        let later = Utc::now() + chrono::Duration::seconds(4000);
        m.scheduled_reboot_utc = Some(later.to_rfc3339());
        let health = assess_health(&m);
        assert!(health.alerts.contains(&"reboot_scheduled".to_string()));
        assert!(!health.alerts.contains(&"reboot_imminent_5min".to_string()));
    }

    #[test]
    fn alert_count_thresholds() {
        let clean = assess_health(&sample());
        assert_eq!(clean.overall, HealthLevel::Healthy);

        // four non-critical alerts push overall to critical
        let mut m = sample();
        m.thermal_throttle = Some(true);
        m.snr_db = Some(2);
        m.snr_above_noise_floor = Some(false);
        m.currently_obstructed = Some(true);
        let health = assess_health(&m);
        assert!(health.alerts.len() > 3);
        assert_eq!(health.overall, HealthLevel::Critical);
    }
}
