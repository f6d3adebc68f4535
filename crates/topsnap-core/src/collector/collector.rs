//! Collector that drives the topology tracker and the samplers.
//!
//! The `SnapshotCollector` owns the filesystem and the single
//! `SystemSnapshot` it refreshes on every cycle.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::collector::procfs::{
    CollectError, CpuTopologyTracker, ProcessSampler, ProcessTreeWalker, SampleContext,
    SystemSampler,
};
use crate::collector::traits::{Clock, FileSystem, SystemClock};
use crate::config::{CollectorConfig, TaskRetention};
use crate::model::{CpuSlot, SystemSnapshot};
use crate::util;

/// Timing information for each collector phase.
///
/// Used for debugging and performance monitoring.
#[derive(Debug, Clone, Default)]
pub struct CollectorTiming {
    /// Total cycle time.
    pub total: Duration,
    /// Time to rescan the CPU device tree.
    pub topology: Duration,
    /// Time to sample system memory.
    pub meminfo: Duration,
    /// Time to sample CPU counters.
    pub cpu: Duration,
    /// Time to walk and sample all tasks.
    pub processes: Duration,
    /// Tasks sampled successfully.
    pub tasks_sampled: usize,
    /// Records dropped because their task exited.
    pub tasks_dropped: usize,
}

/// Values discovered once in `initialize()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HostConstants {
    page_size: u64,
    clock_ticks: u64,
}

/// Main collector producing one [`SystemSnapshot`] per cycle.
///
/// Call [`initialize`](Self::initialize) once, then
/// [`collect_once`](Self::collect_once) at the desired interval. Rates and
/// percentages are computed against the previous cycle, so the first
/// cycle reports lifetime totals as its delta.
pub struct SnapshotCollector<F: FileSystem, C: Clock = SystemClock> {
    fs: F,
    clock: C,
    config: CollectorConfig,
    topology: CpuTopologyTracker,
    system: SystemSampler,
    host: Option<HostConstants>,
    snapshot: SystemSnapshot,
    /// Timing information from the last collect_once call.
    last_timing: Option<CollectorTiming>,
}

impl<F: FileSystem> SnapshotCollector<F> {
    /// Creates a collector reading wall-clock time from the system.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `config` - Paths, limits and host constant overrides
    pub fn new(fs: F, config: CollectorConfig) -> Self {
        Self::with_clock(fs, SystemClock, config)
    }
}

impl<F: FileSystem, C: Clock> SnapshotCollector<F, C> {
    pub fn with_clock(fs: F, clock: C, config: CollectorConfig) -> Self {
        let topology = CpuTopologyTracker::new(config.cpu_sysfs_path.clone());
        let system = SystemSampler::new(config.meminfo_path(), config.stat_path());
        let mut snapshot = SystemSnapshot::default();
        snapshot.cpus.push(CpuSlot {
            online: true,
            ..Default::default()
        });

        Self {
            fs,
            clock,
            config,
            topology,
            system,
            host: None,
            snapshot,
            last_timing: None,
        }
    }

    /// Discovers host constants and the CPU topology.
    ///
    /// Fails only when the page size or clock tick rate cannot be
    /// determined. A missing CPU device tree is logged and leaves a single
    /// aggregate slot.
    pub fn initialize(&mut self) -> Result<(), CollectError> {
        let page_size = match self.config.page_size {
            Some(value) => Some(value),
            None => util::page_size(),
        }
        .filter(|&v| v > 0)
        .ok_or(CollectError::HostConstant { name: "page size" })?;
        let clock_ticks = match self.config.clock_ticks {
            Some(value) => Some(value),
            None => util::clock_ticks(),
        }
        .filter(|&v| v > 0)
        .ok_or(CollectError::HostConstant {
            name: "clock ticks per second",
        })?;

        self.host = Some(HostConstants {
            page_size,
            clock_ticks,
        });

        if let Err(e) = self.topology.update_cpu_count(&self.fs, &mut self.snapshot) {
            warn!(error = %e, "starting without CPU topology");
        }

        info!(
            page_size,
            clock_ticks,
            existing_cpus = self.snapshot.existing_cpus,
            active_cpus = self.snapshot.active_cpus,
            "collector initialized"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.host.is_some()
    }

    /// Runs one collection cycle and returns the refreshed snapshot.
    ///
    /// Order: topology (when configured), memory, CPU, then the task walk.
    /// A failure to read memory or CPU counters aborts the cycle; task
    /// failures only skip the task concerned.
    pub fn collect_once(&mut self) -> Result<&SystemSnapshot, CollectError> {
        let host = self.host.ok_or(CollectError::NotInitialized)?;
        let total_start = Instant::now();
        let mut timing = CollectorTiming::default();

        let now = self.clock.now();
        self.snapshot.timestamp = now;
        self.snapshot.time_ms = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        self.snapshot.cycle += 1;
        let cycle = self.snapshot.cycle;

        if self.config.refresh_topology_each_cycle {
            let start = Instant::now();
            // Failures are logged by the tracker and keep the previous topology.
            let _ = self.topology.update_cpu_count(&self.fs, &mut self.snapshot);
            timing.topology = start.elapsed();
        }

        let start = Instant::now();
        self.system.sample_memory(&self.fs, &mut self.snapshot)?;
        timing.meminfo = start.elapsed();

        let start = Instant::now();
        let period = self.system.sample_cpu(&self.fs, &mut self.snapshot)?;
        timing.cpu = start.elapsed();

        let start = Instant::now();
        let sampler = ProcessSampler::new(SampleContext {
            cycle,
            now_ms: self.snapshot.time_ms,
            period,
            active_cpus: self.snapshot.active_cpus,
            total_mem: self.snapshot.memory.total_mem,
            page_size: host.page_size,
            clock_ticks: host.clock_ticks,
            command_max_len: self.config.command_max_len,
        });
        let walker = ProcessTreeWalker::new(&self.fs, &sampler);
        timing.tasks_sampled = walker.walk(None, &self.config.proc_path, None, &mut self.snapshot);

        if self.config.task_retention == TaskRetention::DropStale {
            timing.tasks_dropped = self
                .snapshot
                .retain_tasks(|task| task.last_seen_cycle == cycle);
        }
        timing.processes = start.elapsed();
        timing.total = total_start.elapsed();

        debug!(
            cycle,
            tasks = self.snapshot.task_count(),
            sampled = timing.tasks_sampled,
            dropped = timing.tasks_dropped,
            elapsed_us = timing.total.as_micros() as u64,
            "cycle complete"
        );
        self.last_timing = Some(timing);
        Ok(&self.snapshot)
    }

    /// The snapshot as of the last cycle.
    pub fn snapshot(&self) -> &SystemSnapshot {
        &self.snapshot
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Returns timing information from the last collect_once call.
    pub fn last_timing(&self) -> Option<&CollectorTiming> {
        self.last_timing.as_ref()
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Mutable access to the filesystem, for tests that evolve a mock tree.
    pub fn fs_mut(&mut self) -> &mut F {
        &mut self.fs
    }
}
