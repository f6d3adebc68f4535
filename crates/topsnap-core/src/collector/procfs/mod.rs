//! Samplers for the Linux `/proc` filesystem and the CPU device tree.
//!
//! This module provides the parsers, the topology tracker, the system and
//! per-task samplers, and the walker that drives per-task sampling over the
//! process tree.

pub mod parser;
pub mod process;
pub mod system;
pub mod topology;
pub mod walker;

pub use process::{CollectError, ProcessSampler, SampleContext};
pub use system::SystemSampler;
pub use topology::CpuTopologyTracker;
pub use walker::ProcessTreeWalker;
