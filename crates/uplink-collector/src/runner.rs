//! Retrying command runner.
//!
//! Executes an external program (ubus-style RPC tools, `ping`, modem CLIs)
//! and returns its captured stdout. Transient failures are retried with
//! exponential backoff; cancellation is never retried.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use uplink_common::{CollectorError, Ctx, Result};

/// Retry schedule: up to `max_attempts` tries, the delay after attempt `n`
/// being `initial_delay × factor^(n-1)` clamped to `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl RetryPolicy {
    /// On-device RPC calls are local and cheap; retry fast.
    pub fn ubus() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(500),
            factor: 2.0,
        }
    }

    /// External command fallbacks (`ping`, QMI/MBIM tools).
    pub fn command() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
        }
    }

    /// Backoff delay after the given 1-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .initial_delay
            .mul_f64(self.factor.powi(attempt.saturating_sub(1) as i32));
        exp.min(self.max_delay)
    }
}

/// Runs one external command to completion, retrying per policy.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    policy: RetryPolicy,
}

impl CommandRunner {
    pub fn new(policy: RetryPolicy) -> Self {
        CommandRunner { policy }
    }

    /// Run `program` with `args`, returning captured stdout.
    ///
    /// An attempt is retried iff it returned non-zero or failed to spawn
    /// AND the context still has time for the backoff delay. Cancellation
    /// and deadline expiry abort immediately.
    pub async fn run(&self, ctx: &Ctx, program: &str, args: &[&str]) -> Result<Vec<u8>> {
        let mut last_err = CollectorError::CommandFailed {
            command: program.to_string(),
            code: None,
            stderr: "not attempted".to_string(),
        };

        for attempt in 1..=self.policy.max_attempts {
            ctx.check()?;
            match self.attempt(ctx, program, args).await {
                Ok(stdout) => return Ok(stdout),
                Err(err @ CollectorError::Cancelled) | Err(err @ CollectorError::Timeout(_)) => {
                    return Err(err);
                }
                Err(err) => {
                    tracing::debug!(
                        command = program,
                        attempt,
                        max = self.policy.max_attempts,
                        error = %err,
                        "command attempt failed"
                    );
                    last_err = err;
                    if attempt == self.policy.max_attempts {
                        break;
                    }
                    let delay = self.policy.delay_for(attempt);
                    if let Some(remaining) = ctx.remaining() {
                        if remaining <= delay {
                            break;
                        }
                    }
                    ctx.run(tokio::time::sleep(delay)).await?;
                }
            }
        }
        Err(last_err)
    }

    async fn attempt(&self, ctx: &Ctx, program: &str, args: &[&str]) -> Result<Vec<u8>> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = ctx
            .run(cmd.output())
            .await?
            .map_err(|e| CollectorError::CommandFailed {
                command: program.to_string(),
                code: None,
                stderr: e.to_string(),
            })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(CollectorError::CommandFailed {
                command: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::watch;

    #[test]
    fn ubus_backoff_schedule() {
        let p = RetryPolicy::ubus();
        assert_eq!(p.delay_for(1), Duration::from_millis(50));
        assert_eq!(p.delay_for(2), Duration::from_millis(100));
        assert_eq!(p.delay_for(3), Duration::from_millis(200));
        // clamps at max_delay
        assert_eq!(p.delay_for(5), Duration::from_millis(500));
    }

    #[test]
    fn command_backoff_schedule() {
        let p = RetryPolicy::command();
        assert_eq!(p.delay_for(1), Duration::from_millis(500));
        assert_eq!(p.delay_for(2), Duration::from_secs(1));
        assert_eq!(p.delay_for(3), Duration::from_secs(2));
        assert_eq!(p.delay_for(4), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let runner = CommandRunner::new(RetryPolicy::ubus());
        let out = runner
            .run(&Ctx::background(), "echo", &["hello"])
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out).trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_retried_to_budget() {
        let marker = std::env::temp_dir().join(format!(
            "uplink-runner-test-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&marker);
        let script = format!("echo x >> {} && exit 7", marker.display());

        let runner = CommandRunner::new(RetryPolicy::ubus());
        let err = runner
            .run(&Ctx::background(), "sh", &["-c", &script])
            .await
            .unwrap_err();
        match err {
            CollectorError::CommandFailed { code, .. } => assert_eq!(code, Some(7)),
            other => panic!("expected CommandFailed, got {other:?}"),
        }

        let invocations = std::fs::read_to_string(&marker).unwrap().lines().count();
        assert_eq!(invocations, 3, "runner must stop at max_attempts");
        let _ = std::fs::remove_file(&marker);
    }

    #[tokio::test]
    async fn missing_program_reports_command_failed() {
        let runner = CommandRunner::new(RetryPolicy::ubus());
        let err = runner
            .run(&Ctx::background(), "/nonexistent/uplink-test-tool", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::CommandFailed { code: None, .. }));
    }

    #[tokio::test]
    async fn cancellation_is_not_retried() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let ctx = Ctx::background().with_cancel(rx);
        let runner = CommandRunner::new(RetryPolicy::command());
        let err = runner.run(&ctx, "sleep", &["5"]).await.unwrap_err();
        assert!(matches!(err, CollectorError::Cancelled));
    }

    #[tokio::test]
    async fn deadline_bounds_total_runtime() {
        let ctx = Ctx::with_timeout(Duration::from_millis(100));
        let runner = CommandRunner::new(RetryPolicy::command());
        let started = std::time::Instant::now();
        let err = runner.run(&ctx, "sleep", &["10"]).await.unwrap_err();
        assert!(matches!(err, CollectorError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
