//! Mock filesystem and clock for testing without Linux.

mod clock;
mod filesystem;
mod scenarios;

pub use clock::ManualClock;
pub use filesystem::MockFs;
pub use scenarios::{PROC, SYSFS_CPU, task_io, task_stat, task_statm};
