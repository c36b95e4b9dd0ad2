//! Reachability prober.
//!
//! The primary prober performs one TCP connect per target against a
//! well-known port and aggregates mean latency over responders and mean
//! loss across all targets. All-loss is a metric, not an error; the probe
//! only fails when no target could even be attempted.
//!
//! The ping-substitute variant shells out to `ping` (optionally bound to a
//! specific interface) and parses the summary lines; it honors the same
//! aggregate contract and backs the cellular interface-bound fallback.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;
use uplink_common::{CollectorError, Ctx, Result};

use crate::jitter::population_stddev;
use crate::runner::CommandRunner;

/// Aggregated result of one probe cycle.
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    /// Mean latency over responding targets; absent when none responded.
    pub latency_ms: Option<f64>,
    /// Mean loss across all attempted targets, percent.
    pub loss_pct: f64,
    /// Per-responder latencies, for same-cycle dispersion estimates.
    pub latencies: Vec<f64>,
    pub attempted: usize,
    pub responded: usize,
}

impl ProbeReport {
    fn aggregate(latencies: Vec<f64>, attempted: usize) -> Self {
        let responded = latencies.len();
        let latency_ms = if responded > 0 {
            Some(latencies.iter().sum::<f64>() / responded as f64)
        } else {
            None
        };
        let loss_pct = if attempted > 0 {
            (attempted - responded) as f64 * 100.0 / attempted as f64
        } else {
            100.0
        };
        ProbeReport {
            latency_ms,
            loss_pct,
            latencies,
            attempted,
            responded,
        }
    }

    /// Standard deviation of this cycle's per-responder latencies.
    pub fn latency_spread_ms(&self) -> f64 {
        population_stddev(&self.latencies)
    }
}

/// TCP-connect prober over a fixed target list.
#[derive(Debug, Clone)]
pub struct Prober {
    targets: Vec<String>,
    port: u16,
    timeout: Duration,
}

impl Prober {
    pub fn new(targets: Vec<String>, port: u16, timeout: Duration) -> Self {
        Prober {
            targets,
            port,
            timeout,
        }
    }

    pub async fn probe(&self, ctx: &Ctx) -> Result<ProbeReport> {
        if self.targets.is_empty() {
            return Err(CollectorError::TransportUnavailable(
                "no probe targets configured".into(),
            ));
        }
        ctx.check()?;

        let mut latencies = Vec::new();
        let mut attempted = 0usize;
        for target in &self.targets {
            if ctx.is_cancelled() {
                return Err(CollectorError::Cancelled);
            }
            if ctx.deadline_expired() {
                // Aggregate what we have; fail only if nothing was attempted.
                break;
            }
            attempted += 1;
            let addr = if target.contains(':') {
                target.clone()
            } else {
                format!("{}:{}", target, self.port)
            };
            let connect_timeout = match ctx.remaining() {
                Some(remaining) => self.timeout.min(remaining),
                None => self.timeout,
            };
            let started = Instant::now();
            match tokio::time::timeout(connect_timeout, TcpStream::connect(addr.as_str())).await {
                Ok(Ok(_stream)) => {
                    latencies.push(started.elapsed().as_secs_f64() * 1000.0);
                }
                Ok(Err(err)) => {
                    tracing::trace!(target = %addr, error = %err, "probe target unreachable");
                }
                Err(_elapsed) => {
                    tracing::trace!(target = %addr, "probe target timed out");
                }
            }
        }

        if attempted == 0 {
            return Err(CollectorError::Timeout(Duration::ZERO));
        }
        Ok(ProbeReport::aggregate(latencies, attempted))
    }
}

// ── Ping-substitute probing ─────────────────────────────────────────

/// Parsed summary of one `ping` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PingSummary {
    pub transmitted: u32,
    pub received: u32,
    pub loss_pct: f64,
    pub rtt_avg_ms: Option<f64>,
}

/// Parse `ping` output for the `X packets transmitted, Y received,
/// Z% packet loss` and `rtt min/avg/max[/mdev] = a/b/c[/d] ms` lines.
pub fn parse_ping_output(output: &str) -> Option<PingSummary> {
    let mut summary: Option<PingSummary> = None;

    for line in output.lines() {
        let line = line.trim();
        if line.contains("packets transmitted") {
            let mut transmitted = None;
            let mut received = None;
            let mut loss = None;
            for part in line.split(',') {
                let part = part.trim();
                if part.ends_with("packets transmitted") {
                    transmitted = part.split_whitespace().next()?.parse::<u32>().ok();
                } else if part.ends_with("received") {
                    received = part.split_whitespace().next()?.parse::<u32>().ok();
                } else if part.contains("packet loss") {
                    loss = part
                        .split_whitespace()
                        .find(|tok| tok.ends_with('%'))
                        .and_then(|tok| tok.trim_end_matches('%').parse::<f64>().ok());
                }
            }
            summary = Some(PingSummary {
                transmitted: transmitted?,
                received: received?,
                loss_pct: loss?,
                rtt_avg_ms: None,
            });
        } else if line.starts_with("rtt ") || line.starts_with("round-trip ") {
            // rtt min/avg/max/mdev = 12.3/15.6/20.9/2.1 ms
            let values = line.split('=').nth(1)?.trim().trim_end_matches("ms").trim();
            let avg = values.split('/').nth(1)?.trim().parse::<f64>().ok();
            if let Some(s) = summary.as_mut() {
                s.rtt_avg_ms = avg;
            }
        }
    }
    summary
}

/// Prober that shells out to `ping`, optionally bound to an interface.
#[derive(Debug, Clone)]
pub struct PingProber {
    runner: CommandRunner,
    hosts: Vec<String>,
    count: u32,
    per_packet_wait_s: u32,
}

impl PingProber {
    pub fn new(runner: CommandRunner, hosts: Vec<String>) -> Self {
        PingProber {
            runner,
            hosts,
            count: 3,
            per_packet_wait_s: 2,
        }
    }

    /// Ping every host once; aggregate mean latency of responding hosts and
    /// mean loss across all hosts.
    pub async fn probe(&self, ctx: &Ctx, iface: Option<&str>) -> Result<ProbeReport> {
        if self.hosts.is_empty() {
            return Err(CollectorError::TransportUnavailable(
                "no ping hosts configured".into(),
            ));
        }

        let count = self.count.to_string();
        let wait = self.per_packet_wait_s.to_string();
        let mut latencies = Vec::new();
        let mut losses = Vec::new();
        let mut attempted = 0usize;

        for host in &self.hosts {
            if ctx.is_cancelled() {
                return Err(CollectorError::Cancelled);
            }
            if ctx.deadline_expired() {
                break;
            }
            let mut args: Vec<&str> = Vec::new();
            if let Some(iface) = iface {
                args.extend(["-I", iface]);
            }
            args.extend(["-c", &count, "-W", &wait, "-i", "0.2", host]);

            attempted += 1;
            match self.runner.run(ctx, "ping", &args).await {
                Ok(stdout) => {
                    let text = String::from_utf8_lossy(&stdout);
                    match parse_ping_output(&text) {
                        Some(summary) => {
                            losses.push(summary.loss_pct);
                            if let Some(rtt) = summary.rtt_avg_ms {
                                latencies.push(rtt);
                            }
                        }
                        None => losses.push(100.0),
                    }
                }
                Err(CollectorError::Cancelled) => return Err(CollectorError::Cancelled),
                Err(err) => {
                    tracing::trace!(host = %host, error = %err, "ping failed");
                    losses.push(100.0);
                }
            }
        }

        if attempted == 0 {
            return Err(CollectorError::Timeout(Duration::ZERO));
        }
        let responded = latencies.len();
        let latency_ms = if responded > 0 {
            Some(latencies.iter().sum::<f64>() / responded as f64)
        } else {
            None
        };
        let loss_pct = losses.iter().sum::<f64>() / losses.len() as f64;
        Ok(ProbeReport {
            latency_ms,
            loss_pct,
            latencies,
            attempted,
            responded,
        })
    }
}
