//! Dish HTTP/JSON fallback.
//!
//! Older firmware exposes the status document over plain HTTP on port 80.
//! The path moved around between releases, so a small candidate list is
//! probed and the first `200 OK` that decodes into a status-shaped body
//! wins.

use serde_json::Value;
use uplink_common::{CollectorError, Ctx, Result};

use super::status::looks_like_status;

pub(crate) const CANDIDATE_PATHS: &[&str] = &[
    "/api/v1/status",
    "/status",
    "/api/status",
    "/api/v1/diagnostics",
    "/diagnostics",
];

pub(crate) async fn fetch_status(
    ctx: &Ctx,
    client: &reqwest::Client,
    base: &str,
) -> Result<Value> {
    let mut last_err =
        CollectorError::TransportUnavailable("no HTTP candidate paths".to_string());

    for path in CANDIDATE_PATHS {
        ctx.check()?;
        let url = format!("{base}{path}");
        let response = match ctx.run(client.get(&url).send()).await? {
            Ok(response) => response,
            Err(err) => {
                last_err = CollectorError::TransportUnavailable(format!("{path}: {err}"));
                continue;
            }
        };
        if !response.status().is_success() {
            last_err =
                CollectorError::TransportUnavailable(format!("{path}: HTTP {}", response.status()));
            continue;
        }
        match ctx.run(response.json::<Value>()).await? {
            Ok(body) if looks_like_status(&body) => return Ok(body),
            Ok(_) => {
                last_err = CollectorError::Protocol(format!("{path}: unexpected body shape"));
            }
            Err(err) => {
                last_err = CollectorError::Protocol(format!("{path}: {err}"));
            }
        }
    }
    Err(last_err)
}
