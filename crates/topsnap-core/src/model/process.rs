//! Per-task (process or thread) records.
//!
//! Source: `/proc/[pid]/{stat,statm,io}` and `/proc/[pid]/task/[tid]/...`

use serde::{Deserialize, Serialize};

/// I/O counters from `/proc/[pid]/io`.
///
/// Rates are `NaN` when they cannot be computed: the file was unreadable
/// (usually a permission problem) or no time elapsed since the last scan.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TaskIoStats {
    /// Bytes read, including page cache hits (`rchar`).
    pub read_char: u64,
    /// Bytes written, including page cache (`wchar`).
    pub write_char: u64,
    /// Read syscalls (`syscr`).
    pub read_syscalls: u64,
    /// Write syscalls (`syscw`).
    pub write_syscalls: u64,
    /// Bytes fetched from storage (`read_bytes`).
    pub read_bytes: u64,
    /// Bytes sent to storage (`write_bytes`).
    pub write_bytes: u64,
    pub cancelled_write_bytes: u64,
    /// Wall-clock time of the last scan, milliseconds since the epoch.
    pub last_scan_ms: u64,
    /// Storage read rate, bytes per second.
    pub read_rate_bps: f64,
    /// Storage write rate, bytes per second.
    pub write_rate_bps: f64,
}

impl Default for TaskIoStats {
    fn default() -> Self {
        Self {
            read_char: 0,
            write_char: 0,
            read_syscalls: 0,
            write_syscalls: 0,
            read_bytes: 0,
            write_bytes: 0,
            cancelled_write_bytes: 0,
            last_scan_ms: 0,
            read_rate_bps: f64::NAN,
            write_rate_bps: f64::NAN,
        }
    }
}

/// Everything known about one task.
///
/// CPU times are in hundredths of a second, memory sizes in KiB.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ProcessRecord {
    pub pid: u32,
    pub ppid: u32,
    /// Command name from `stat`, truncated to the configured bound.
    pub command: String,

    pub user_time: u64,
    pub system_time: u64,
    /// User time of waited-for children.
    pub child_user_time: u64,
    /// System time of waited-for children.
    pub child_system_time: u64,
    /// CPU usage over the last period, `0..=active_cpus * 100`.
    pub percent_cpu: f32,

    pub virtual_mem: u64,
    pub resident_mem: u64,
    pub shared_mem: u64,
    /// Text (code) size.
    pub text_mem: u64,
    /// Data plus stack size.
    pub data_mem: u64,
    /// Resident memory as a percentage of total memory.
    pub percent_mem: f32,

    pub io: TaskIoStats,

    /// Cycle in which this record was last refreshed.
    pub last_seen_cycle: u64,
}

impl ProcessRecord {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            ..Default::default()
        }
    }

    /// User plus system time, hundredths of a second.
    pub fn cpu_time(&self) -> u64 {
        self.user_time.saturating_add(self.system_time)
    }
}
