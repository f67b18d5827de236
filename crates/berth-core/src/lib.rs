//! berth-core — shared vocabulary for Berth.
//!
//! Berth registers a container image repository and deploys a workload that
//! pulls from it. This crate holds the pieces both halves agree on:
//!
//! - **`types`** — repository identity, image references, deployment and
//!   service specs
//! - **`validate`** — registry and cluster naming rules, checked before any
//!   network call
//! - **`error`** — the error taxonomy (`ErrorKind`) every step reports in
//! - **`bounded`** — timeout + cancellation guard wrapped around each remote call
//! - **`config`** — `berth.toml` parsing

pub mod bounded;
pub mod config;
pub mod error;
pub mod types;
pub mod validate;

pub use bounded::{Interrupted, bounded};
pub use config::BerthConfig;
pub use error::{Error, ErrorKind, Result, Step};
pub use types::*;
