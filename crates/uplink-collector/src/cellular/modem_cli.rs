//! Modem-family command-line fallbacks.
//!
//! QMI and MBIM CLIs print signal readings as `RSRP: '-95 dBm'`-shaped
//! lines; the parser scans line by line and strips quotes and units.

use uplink_common::{CollectorError, Ctx, Result};

use crate::runner::CommandRunner;

/// Signal readings recovered from a modem CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModemSignal {
    pub rsrp: Option<i32>,
    pub rsrq: Option<i32>,
    pub sinr: Option<i32>,
    pub rssi: Option<i32>,
}

impl ModemSignal {
    pub fn is_empty(&self) -> bool {
        self.rsrp.is_none() && self.rsrq.is_none() && self.sinr.is_none() && self.rssi.is_none()
    }
}

const MODEM_TOOLS: &[(&str, &str, &[&str])] = &[
    (
        "qmi",
        "qmicli",
        &[
            "--device=/dev/cdc-wdm0",
            "--device-open-proxy",
            "--nas-get-signal-info",
        ],
    ),
    (
        "mbim",
        "mbimcli",
        &[
            "--device=/dev/cdc-wdm0",
            "--device-open-proxy",
            "--query-signal-state",
        ],
    ),
];

/// Try each modem-family tool in turn; first one that yields any signal
/// reading wins.
pub(crate) async fn query(
    ctx: &Ctx,
    runner: &CommandRunner,
) -> Result<(ModemSignal, &'static str)> {
    let mut last_err = CollectorError::TransportUnavailable("no modem CLI attempted".into());

    for &(family, program, args) in MODEM_TOOLS {
        match runner.run(ctx, program, args).await {
            Ok(stdout) => {
                let signal = parse_signal_lines(&String::from_utf8_lossy(&stdout));
                if !signal.is_empty() {
                    return Ok((signal, family));
                }
                last_err = CollectorError::Protocol(format!(
                    "{program} output carried no signal readings"
                ));
            }
            Err(CollectorError::Cancelled) => return Err(CollectorError::Cancelled),
            Err(err) => last_err = err,
        }
    }
    Err(last_err)
}

/// Scan CLI output for `KEY: '<value> <unit>'` signal entries.
pub fn parse_signal_lines(output: &str) -> ModemSignal {
    let mut signal = ModemSignal::default();
    for line in output.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let value = rest
            .trim()
            .trim_matches('\'')
            .split_whitespace()
            .next()
            .and_then(|tok| tok.parse::<f64>().ok())
            .map(|v| v as i32);
        let Some(value) = value else { continue };

        match key.trim().to_ascii_uppercase().as_str() {
            "RSRP" => signal.rsrp = signal.rsrp.or(Some(value)),
            "RSRQ" => signal.rsrq = signal.rsrq.or(Some(value)),
            "SINR" | "SNR" => signal.sinr = signal.sinr.or(Some(value)),
            "RSSI" => signal.rssi = signal.rssi.or(Some(value)),
            _ => {}
        }
    }
    signal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_qmi_style_output() {
        let out = "\
[/dev/cdc-wdm0] Successfully got signal info
LTE:
\tRSSI: '-63 dBm'
\tRSRQ: '-11 dB'
\tRSRP: '-95 dBm'
\tSNR: '11.2 dB'
";
        let signal = parse_signal_lines(out);
        assert_eq!(signal.rsrp, Some(-95));
        assert_eq!(signal.rsrq, Some(-11));
        assert_eq!(signal.sinr, Some(11));
        assert_eq!(signal.rssi, Some(-63));
    }

    #[test]
    fn first_reading_wins_on_duplicates() {
        let out = "RSRP: '-90 dBm'\nRSRP: '-120 dBm'\n";
        assert_eq!(parse_signal_lines(out).rsrp, Some(-90));
    }

    #[test]
    fn unparseable_values_are_skipped() {
        let out = "RSRP: 'n/a'\nRSRQ: '-13 dB'\n";
        let signal = parse_signal_lines(out);
        assert_eq!(signal.rsrp, None);
        assert_eq!(signal.rsrq, Some(-13));
    }

    #[test]
    fn empty_output_is_empty() {
        assert!(parse_signal_lines("nothing relevant here").is_empty());
    }
}
