//! Uplink metric collection core.
//!
//! A pluggable, class-aware collector framework. Each monitored link gets
//! one collector from the [`factory`]; on every sampling tick the caller
//! invokes [`Collector::collect`], which gathers baseline reachability
//! metrics (TCP probe + jitter window) and then augments them with
//! class-specific extraction:
//!
//! - **satellite dish** — vendor gRPC (schema discovered via server
//!   reflection), raw-wire and HTTP/JSON fallbacks, synthesized-placeholder
//!   last resort
//! - **cellular** — on-device RPC providers, modem CLI output, and an
//!   interface-bound ping fallback
//! - **wifi** — `iwinfo` RPC or `/proc/net/wireless`
//! - **lan / other** — baseline only
//!
//! Augmentation failures never erase baseline fields; a degraded cycle
//! returns metrics plus a non-fatal annotation.

pub mod base;
pub mod cellular;
pub mod dish;
pub mod factory;
pub mod generic;
pub mod jitter;
pub mod probe;
pub mod runner;
pub mod wifi;

pub(crate) mod json;

pub use factory::{Collection, Collector, CollectorFactory};
