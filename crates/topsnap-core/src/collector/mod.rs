//! Host resource collector for Linux.
//!
//! This module reads CPU topology from the CPU device tree and system and
//! per-task counters from `/proc`, with an in-memory filesystem for tests
//! on any platform.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SnapshotCollector                       │
//! │  ┌────────────────────┐  ┌──────────────────────────────┐    │
//! │  │ CpuTopologyTracker │  │        SystemSampler         │    │
//! │  │ - cpu<N>/online    │  │  - /proc/meminfo             │    │
//! │  └─────────┬──────────┘  │  - /proc/stat                │    │
//! │            │             └──────────────┬───────────────┘    │
//! │  ┌─────────┴──────────────────────┐     │                    │
//! │  │ ProcessTreeWalker              │     │                    │
//! │  │  └─ ProcessSampler             │     │                    │
//! │  │     - [pid]/{stat,statm,io}    │     │                    │
//! │  └─────────┬──────────────────────┘     │                    │
//! │            └───────────┬────────────────┘                    │
//! │                 ┌──────▼──────┐   ┌───────┐                  │
//! │                 │  FileSystem │   │ Clock │ (traits)         │
//! │                 └──────┬──────┘   └───────┘                  │
//! └────────────────────────┼─────────────────────────────────────┘
//!                          │
//!              ┌───────────┼───────────────┐
//!              │           │               │
//!       ┌──────▼──────┐ ┌──▼──────────┐ ┌──▼──────────┐
//!       │   RealFs    │ │   MockFs    │ │  Scenarios  │
//!       │ (Linux)     │ │ (Testing)   │ │ (Fixtures)  │
//!       └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! # Usage
//!
//! ## Production (Linux)
//!
//! ```ignore
//! use topsnap_core::collector::{RealFs, SnapshotCollector};
//! use topsnap_core::CollectorConfig;
//!
//! let mut collector = SnapshotCollector::new(RealFs::new(), CollectorConfig::default());
//! collector.initialize()?;
//! let snapshot = collector.collect_once()?;
//! ```
//!
//! ## Testing (with MockFs)
//!
//! ```
//! use topsnap_core::collector::{ManualClock, MockFs, SnapshotCollector};
//! use topsnap_core::CollectorConfig;
//!
//! let config = CollectorConfig::default().with_host_constants(4096, 100);
//! let mut collector =
//!     SnapshotCollector::with_clock(MockFs::typical_system(), ManualClock::default(), config);
//! collector.initialize().unwrap();
//! let snapshot = collector.collect_once().unwrap();
//! assert_eq!(snapshot.existing_cpus, 4);
//! ```

#[allow(clippy::module_inception)]
mod collector;
pub mod mock;
pub mod procfs;
pub mod traits;

pub use collector::{CollectorTiming, SnapshotCollector};
pub use mock::{ManualClock, MockFs};
pub use procfs::CollectError;
#[cfg(target_os = "linux")]
pub use traits::{RealDir, RealFs};
pub use traits::{Clock, DirEntry, EntryKind, FileSystem, SystemClock};
