//! System-wide CPU and memory figures.
//!
//! CPU counters are in kernel ticks (`USER_HZ`) as read from `/proc/stat`;
//! memory figures are in KiB as read from `/proc/meminfo`.

use serde::{Deserialize, Serialize};

/// One set of CPU time counters.
///
/// Used both for absolute readings and for per-period deltas.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct CpuTimes {
    /// Sum of all categories below (guest time counted once).
    pub total: u64,
    /// User time with guest time removed.
    pub user: u64,
    /// Niced user time with niced guest time removed.
    pub nice: u64,
    pub system: u64,
    /// `system + irq + softirq`.
    pub system_all: u64,
    pub idle: u64,
    /// `idle + iowait`.
    pub idle_all: u64,
    pub io_wait: u64,
    pub irq: u64,
    pub soft_irq: u64,
    pub steal: u64,
    /// `guest + guest_nice`.
    pub guest: u64,
}

impl CpuTimes {
    /// Per-field delta against an earlier reading.
    ///
    /// A counter that went backwards (CPU hot-plug resets it) yields 0.
    pub fn saturating_delta(&self, prev: &CpuTimes) -> CpuTimes {
        CpuTimes {
            total: self.total.saturating_sub(prev.total),
            user: self.user.saturating_sub(prev.user),
            nice: self.nice.saturating_sub(prev.nice),
            system: self.system.saturating_sub(prev.system),
            system_all: self.system_all.saturating_sub(prev.system_all),
            idle: self.idle.saturating_sub(prev.idle),
            idle_all: self.idle_all.saturating_sub(prev.idle_all),
            io_wait: self.io_wait.saturating_sub(prev.io_wait),
            irq: self.irq.saturating_sub(prev.irq),
            soft_irq: self.soft_irq.saturating_sub(prev.soft_irq),
            steal: self.steal.saturating_sub(prev.steal),
            guest: self.guest.saturating_sub(prev.guest),
        }
    }
}

/// Counters for one CPU, or for all of them at slot 0.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CpuSlot {
    /// Absolute counters from the latest reading.
    pub time: CpuTimes,
    /// Delta between the latest two readings.
    pub period: CpuTimes,
    pub online: bool,
}

impl CpuSlot {
    /// Stores a new absolute reading and derives the period from the previous one.
    pub fn update(&mut self, time: CpuTimes) {
        self.period = time.saturating_delta(&self.time);
        self.time = time;
    }

    /// Busy fraction over the last period, in `[0, 1]`.
    ///
    /// Returns 0 when no time elapsed.
    pub fn usage(&self) -> f64 {
        if self.period.total == 0 {
            return 0.0;
        }
        let idle = self.period.idle_all.min(self.period.total);
        1.0 - idle as f64 / self.period.total as f64
    }
}

/// Memory and swap figures derived from `/proc/meminfo` (KiB).
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    pub total_mem: u64,
    pub used_mem: u64,
    pub buffers_mem: u64,
    /// Page cache plus reclaimable slab, minus shared memory.
    pub cached_mem: u64,
    pub shared_mem: u64,
    pub available_mem: u64,
    pub total_swap: u64,
    pub used_swap: u64,
    pub cached_swap: u64,
}
