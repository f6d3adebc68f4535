//! System sampler for global memory and CPU figures from `/proc/`.

use tracing::{debug, error, trace, warn};

use crate::collector::procfs::parser::{MemInfo, parse_cpu_line, parse_meminfo};
use crate::collector::procfs::process::CollectError;
use crate::collector::traits::FileSystem;
use crate::model::{MemoryUsage, SystemSnapshot};

/// Derives the reported memory figures from raw `/proc/meminfo` values.
///
/// `used_mem` never exceeds `total - free` and `available_mem` never exceeds
/// `total_mem`.
pub fn memory_usage(info: &MemInfo) -> MemoryUsage {
    let total = info.mem_total;
    let reclaimable = info
        .buffers
        .saturating_add(info.cached)
        .saturating_add(info.s_reclaimable);
    let used_diff = info.mem_free.saturating_add(reclaimable);
    let used_mem = if total >= used_diff {
        total - used_diff
    } else {
        total.saturating_sub(info.mem_free)
    };
    let available_mem = if info.mem_available != 0 {
        info.mem_available
    } else {
        info.mem_free
    }
    .min(total);

    MemoryUsage {
        total_mem: total,
        used_mem,
        buffers_mem: info.buffers,
        cached_mem: info
            .cached
            .saturating_add(info.s_reclaimable)
            .saturating_sub(info.shmem),
        shared_mem: info.shmem,
        available_mem,
        total_swap: info.swap_total,
        used_swap: info
            .swap_total
            .saturating_sub(info.swap_free)
            .saturating_sub(info.swap_cached),
        cached_swap: info.swap_cached,
    }
}

/// Divides the aggregate total period among the active CPUs.
///
/// This is the denominator that turns a task's tick delta into a CPU
/// percentage. Zero when no CPU is active.
pub fn normalized_period(aggregate_total_period: u64, active_cpus: u32) -> f64 {
    if active_cpus == 0 {
        return 0.0;
    }
    aggregate_total_period as f64 / active_cpus as f64
}

/// Samples system-wide memory and CPU counters.
pub struct SystemSampler {
    meminfo_path: String,
    stat_path: String,
}

impl SystemSampler {
    /// Creates a system sampler.
    ///
    /// # Arguments
    /// * `meminfo_path` - Path of the memory-info file (usually "/proc/meminfo")
    /// * `stat_path` - Path of the system-stat file (usually "/proc/stat")
    pub fn new(meminfo_path: impl Into<String>, stat_path: impl Into<String>) -> Self {
        Self {
            meminfo_path: meminfo_path.into(),
            stat_path: stat_path.into(),
        }
    }

    /// Replaces the snapshot's memory figures with a fresh reading.
    pub fn sample_memory<F: FileSystem>(
        &self,
        fs: &F,
        snapshot: &mut SystemSnapshot,
    ) -> Result<(), CollectError> {
        let content = fs.read_to_string(&self.meminfo_path).map_err(|e| {
            error!(path = %self.meminfo_path, error = %e, "cannot read memory info");
            CollectError::io(&self.meminfo_path, e)
        })?;
        snapshot.memory = memory_usage(&parse_meminfo(&content));
        Ok(())
    }

    /// Updates every CPU slot from the system-stat file.
    ///
    /// Reads the aggregate line plus one line per existing CPU. A line that
    /// does not parse, or names a CPU without a slot, is skipped on its own.
    /// Returns the normalized period for this cycle.
    pub fn sample_cpu<F: FileSystem>(
        &self,
        fs: &F,
        snapshot: &mut SystemSnapshot,
    ) -> Result<f64, CollectError> {
        let content = fs.read_to_string(&self.stat_path).map_err(|e| {
            error!(path = %self.stat_path, error = %e, "cannot read CPU stat");
            CollectError::io(&self.stat_path, e)
        })?;

        let mut lines = content.lines();
        for i in 0..=snapshot.existing_cpus {
            let Some(line) = lines.next() else {
                warn!(expected = snapshot.existing_cpus + 1, read = i, "CPU stat ended early");
                break;
            };
            let Some(parsed) = parse_cpu_line(line, i == 0) else {
                debug!(line, "skipping unexpected CPU stat line");
                continue;
            };
            let slot = parsed.cpu_id.map_or(0, |id| id as usize + 1);
            let Some(cpu) = snapshot.cpus.get_mut(slot) else {
                debug!(slot, "CPU stat line has no slot");
                continue;
            };
            cpu.update(parsed.to_times());
            trace!(
                slot,
                total = cpu.period.total,
                user = cpu.period.user,
                nice = cpu.period.nice,
                system = cpu.period.system,
                idle = cpu.period.idle,
                "CPU period"
            );
        }

        let aggregate_total = snapshot.aggregate().map_or(0, |cpu| cpu.period.total);
        Ok(normalized_period(aggregate_total, snapshot.active_cpus))
    }
}
