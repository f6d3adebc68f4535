//! Collector configuration.

use serde::{Deserialize, Serialize};

/// Default upper bound for a task's command name, in characters.
pub const DEFAULT_COMMAND_MAX_LEN: usize = 128;

/// What happens to task records whose id is no longer present in `/proc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRetention {
    /// Records are never removed; an exited task keeps its last-known stats.
    #[default]
    KeepAll,
    /// Records not refreshed during the current cycle are removed at the end of it.
    DropStale,
}

/// Settings for [`SnapshotCollector`](crate::SnapshotCollector).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Root of the process pseudo-filesystem.
    pub proc_path: String,
    /// Directory holding the `cpu<N>` device entries.
    pub cpu_sysfs_path: String,
    /// Command names longer than this are truncated.
    pub command_max_len: usize,
    /// Page size in bytes. Discovered from the host when `None`.
    pub page_size: Option<u64>,
    /// Clock ticks per second (`USER_HZ`). Discovered from the host when `None`.
    pub clock_ticks: Option<u64>,
    pub task_retention: TaskRetention,
    /// Rescan CPU topology at the start of every cycle, not only in `initialize()`.
    pub refresh_topology_each_cycle: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            proc_path: "/proc".to_string(),
            cpu_sysfs_path: "/sys/devices/system/cpu".to_string(),
            command_max_len: DEFAULT_COMMAND_MAX_LEN,
            page_size: None,
            clock_ticks: None,
            task_retention: TaskRetention::KeepAll,
            refresh_topology_each_cycle: true,
        }
    }
}

impl CollectorConfig {
    /// Overrides the host page size and clock tick rate.
    ///
    /// Useful when replaying a captured or synthetic `/proc` tree whose
    /// values were produced on another machine.
    pub fn with_host_constants(mut self, page_size: u64, clock_ticks: u64) -> Self {
        self.page_size = Some(page_size);
        self.clock_ticks = Some(clock_ticks);
        self
    }

    pub fn with_task_retention(mut self, retention: TaskRetention) -> Self {
        self.task_retention = retention;
        self
    }

    /// Path of the memory-info pseudo-file.
    pub fn meminfo_path(&self) -> String {
        format!("{}/meminfo", self.proc_path)
    }

    /// Path of the system-stat pseudo-file.
    pub fn stat_path(&self) -> String {
        format!("{}/stat", self.proc_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = CollectorConfig::default();
        assert_eq!(config.meminfo_path(), "/proc/meminfo");
        assert_eq!(config.stat_path(), "/proc/stat");
        assert_eq!(config.task_retention, TaskRetention::KeepAll);
        assert_eq!(config.command_max_len, 128);
    }

    #[test]
    fn test_with_host_constants() {
        let config = CollectorConfig::default().with_host_constants(4096, 100);
        assert_eq!(config.page_size, Some(4096));
        assert_eq!(config.clock_ticks, Some(100));
    }
}
