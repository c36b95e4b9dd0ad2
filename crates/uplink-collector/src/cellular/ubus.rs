//! On-device RPC access for modem providers.
//!
//! The RPC tool is invoked as `<tool> call <provider> <method> [<json>]`
//! and prints JSON on stdout. Provider naming varies between firmware
//! generations, so the collector probes several.

use serde_json::Value;
use uplink_common::{CollectorError, Ctx, Result};

use crate::json;
use crate::runner::{CommandRunner, RetryPolicy};

#[derive(Debug, Clone)]
pub(crate) struct RpcClient {
    tool: String,
    runner: CommandRunner,
}

impl RpcClient {
    pub(crate) fn new(tool: String) -> Self {
        RpcClient {
            tool,
            runner: CommandRunner::new(RetryPolicy::ubus()),
        }
    }

    pub(crate) async fn call(
        &self,
        ctx: &Ctx,
        provider: &str,
        method: &str,
        args: Option<&str>,
    ) -> Result<Value> {
        let mut argv = vec!["call", provider, method];
        if let Some(args) = args {
            argv.push(args);
        }
        let stdout = self.runner.run(ctx, &self.tool, &argv).await?;
        let value: Value = serde_json::from_slice(&stdout).map_err(|e| {
            CollectorError::Protocol(format!("{provider}.{method} output: {e}"))
        })?;
        if !value.is_object() {
            return Err(CollectorError::Protocol(format!(
                "{provider}.{method} returned a non-object"
            )));
        }
        Ok(value)
    }

    /// Query an explicitly named provider, trying its common info methods.
    pub(crate) async fn provider_info(&self, ctx: &Ctx, provider: &str) -> Result<Value> {
        let mut last_err = CollectorError::TransportUnavailable(format!(
            "provider {provider} not queried"
        ));
        for method in ["info", "get_status", "get_signal"] {
            match self.call(ctx, provider, method, None).await {
                Ok(value) => return Ok(value),
                Err(CollectorError::Cancelled) => return Err(CollectorError::Cancelled),
                Err(err) => last_err = err,
            }
        }
        Err(last_err)
    }

    /// High-level mobile-data provider: enumerate interfaces, then query
    /// the first entry.
    pub(crate) async fn mobiled_interface_info(&self, ctx: &Ctx) -> Result<Value> {
        let listing = self.call(ctx, "mobiled", "get_interfaces", None).await?;
        let first = listing
            .get("interfaces")
            .and_then(Value::as_array)
            .and_then(|ifaces| ifaces.first())
            .ok_or_else(|| {
                CollectorError::Protocol("mobiled.get_interfaces listed no interfaces".into())
            })?;

        let args = mobiled_selector(first);
        self.call(ctx, "mobiled", "get_interface_info", Some(&args))
            .await
    }
}

/// Build the `get_interface_info` argument from one `get_interfaces` entry.
/// Entries identify themselves by `name` or by numeric `id`/`dev_idx`.
fn mobiled_selector(entry: &Value) -> String {
    if let Some(name) = json::str_field(entry, &["name", "interface"]) {
        serde_json::json!({ "interface": name }).to_string()
    } else if let Some(id) = json::int_field(entry, &["id", "dev_idx"]) {
        serde_json::json!({ "dev_idx": id }).to_string()
    } else {
        serde_json::json!({ "dev_idx": 0 }).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn selector_prefers_interface_name() {
        let entry = json!({"name": "wwan0", "id": 2});
        assert_eq!(mobiled_selector(&entry), r#"{"interface":"wwan0"}"#);
    }

    #[test]
    fn selector_falls_back_to_index() {
        let entry = json!({"dev_idx": 1});
        assert_eq!(mobiled_selector(&entry), r#"{"dev_idx":1}"#);
        assert_eq!(mobiled_selector(&json!({})), r#"{"dev_idx":0}"#);
    }
}
