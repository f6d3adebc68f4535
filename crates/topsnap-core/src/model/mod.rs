//! Data model for collected snapshots.
//!
//! One [`SystemSnapshot`] is kept alive across cycles and updated in place:
//! CPU slots and task records hold the previous cycle's absolute counters so
//! that each new reading can be turned into a per-period value.

mod process;
mod snapshot;
mod system;

pub use process::{ProcessRecord, TaskIoStats};
pub use snapshot::SystemSnapshot;
pub use system::{CpuSlot, CpuTimes, MemoryUsage};
