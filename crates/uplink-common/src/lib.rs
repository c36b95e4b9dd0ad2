//! Shared types for the uplink monitor.
//!
//! This crate contains:
//! - **Link model** — the descriptor for a monitored uplink and its class tag
//! - **Metrics record** — the normalized per-cycle output every collector produces
//! - **Error taxonomy** — `CollectorError` kinds shared across all transports
//! - **Ctx** — deadline + cancellation handle threaded through every external call
//! - **Config** — collector configuration with per-class defaults

pub mod config;
pub mod ctx;
pub mod error;
pub mod link;
pub mod metrics;

pub use config::{CellularConfig, CollectorConfig, DishConfig, LanConfig, WifiConfig};
pub use ctx::Ctx;
pub use error::{CollectorError, Result};
pub use link::{Link, LinkClass};
pub use metrics::{GpsSource, Metrics, Provenance, RoamingType};
