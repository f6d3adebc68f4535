//! topsnap-core: host resource sampling for `top`-like tools.
//!
//! Provides:
//! - `collector`: CPU topology discovery, system CPU/memory sampling and the
//!   per-task walk over `/proc`, orchestrated by [`SnapshotCollector`]
//! - `model`: the snapshot, CPU slot and task record types
//! - `config`: collector configuration
//! - `fmt`: formatting helpers for presenting snapshot values

pub mod collector;
pub mod config;
pub mod fmt;
pub mod model;
pub mod util;

pub use collector::{CollectError, SnapshotCollector};
pub use config::{CollectorConfig, TaskRetention};
pub use model::{CpuSlot, ProcessRecord, SystemSnapshot};
