//! Per-task sampling from `stat`, `statm` and `io` under a task directory.

use std::io;

use tracing::trace;

use crate::collector::procfs::parser::{
    ParseError, Statm, TaskStat, parse_statm, parse_task_io, parse_task_stat,
};
use crate::collector::traits::FileSystem;
use crate::model::{ProcessRecord, TaskIoStats};

/// Error type for collection operations.
#[derive(Debug)]
pub enum CollectError {
    /// `collect_once` was called before a successful `initialize`.
    NotInitialized,
    /// A host constant (page size, clock ticks) could not be determined.
    HostConstant { name: &'static str },
    /// I/O error reading a required file.
    Io {
        path: String,
        source: std::io::Error,
    },
    /// Task disappeared during collection.
    ProcessGone(u32),
    /// Parse error in a procfs file.
    Parse(String),
    /// A task's `stat` names a different pid than its directory.
    PidMismatch { expected: u32, found: u32 },
}

impl CollectError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        CollectError::Io {
            path: path.into(),
            source,
        }
    }
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::NotInitialized => write!(f, "collector is not initialized"),
            CollectError::HostConstant { name } => write!(f, "cannot determine {}", name),
            CollectError::Io { path, source } if path.is_empty() => {
                write!(f, "I/O error: {}", source)
            }
            CollectError::Io { path, source } => write!(f, "I/O error on {}: {}", path, source),
            CollectError::ProcessGone(pid) => write!(f, "process {} disappeared", pid),
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
            CollectError::PidMismatch { expected, found } => {
                write!(f, "stat of task {} reports pid {}", expected, found)
            }
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::io(String::new(), e)
    }
}

impl From<ParseError> for CollectError {
    fn from(e: ParseError) -> Self {
        CollectError::Parse(e.message)
    }
}

/// Per-cycle values every task sample needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleContext {
    /// Cycle being collected.
    pub cycle: u64,
    /// Wall-clock time of the cycle, milliseconds since the epoch.
    pub now_ms: u64,
    /// Aggregate CPU period divided by the active CPU count.
    pub period: f64,
    pub active_cpus: u32,
    /// Total memory in KiB.
    pub total_mem: u64,
    /// Page size in bytes.
    pub page_size: u64,
    /// Clock ticks per second.
    pub clock_ticks: u64,
    /// Upper bound on the stored command length, in characters.
    pub command_max_len: usize,
}

/// Converts raw clock ticks to hundredths of a second.
pub fn ticks_to_centis(ticks: u64, clock_ticks: u64) -> u64 {
    if clock_ticks == 0 {
        return 0;
    }
    ticks.saturating_mul(100) / clock_ticks
}

/// Keeps at most `max_chars` characters of `comm`.
pub fn truncate_command(comm: &str, max_chars: usize) -> String {
    match comm.char_indices().nth(max_chars) {
        Some((end, _)) => comm[..end].to_string(),
        None => comm.to_string(),
    }
}

/// Samples one task directory into a [`ProcessRecord`].
pub struct ProcessSampler {
    context: SampleContext,
}

impl ProcessSampler {
    pub fn new(context: SampleContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &SampleContext {
        &self.context
    }

    /// Refreshes `record` from the task directory `dir`.
    ///
    /// All three files are read and parsed before `record` is touched.
    /// I/O counters are best effort. `statm` and `stat` are required: when
    /// either fails, or `stat` names another pid, the error is returned and
    /// `record` is left exactly as it was.
    pub fn sample_task<F: FileSystem>(
        &self,
        fs: &F,
        dir: &F::Dir,
        record: &mut ProcessRecord,
    ) -> Result<(), CollectError> {
        let pid = record.pid;
        let io = fs.read_to_string_at(dir, "io");
        let statm = parse_statm(&read_required(fs, dir, pid, "statm")?)?;
        let stat = parse_task_stat(&read_required(fs, dir, pid, "stat")?)?;
        if stat.pid != pid {
            return Err(CollectError::PidMismatch {
                expected: pid,
                found: stat.pid,
            });
        }

        self.apply_io(io, record);
        self.apply_statm(&statm, record);
        let last_cpu_time = record.cpu_time();
        self.apply_stat(&stat, record);

        let ctx = &self.context;
        let delta = record.cpu_time().saturating_sub(last_cpu_time) as f64;
        let percent_cpu = if ctx.period < 1e-6 {
            0.0
        } else {
            delta / ctx.period * 100.0
        };
        record.percent_cpu = percent_cpu.clamp(0.0, ctx.active_cpus as f64 * 100.0) as f32;
        record.percent_mem = if ctx.total_mem == 0 {
            0.0
        } else {
            (record.resident_mem as f64 / ctx.total_mem as f64 * 100.0) as f32
        };
        record.last_seen_cycle = ctx.cycle;
        Ok(())
    }

    fn apply_io(&self, content: io::Result<String>, record: &mut ProcessRecord) {
        let now = self.context.now_ms;
        let content = match content {
            Ok(content) => content,
            Err(e) => {
                trace!(pid = record.pid, error = %e, "io not readable");
                record.io = TaskIoStats {
                    last_scan_ms: now,
                    ..TaskIoStats::default()
                };
                return;
            }
        };

        let parsed = parse_task_io(&content);
        let io = &mut record.io;
        let elapsed = now.saturating_sub(io.last_scan_ms);
        let rate = |new: u64, old: u64| {
            if elapsed == 0 {
                f64::NAN
            } else {
                new.saturating_sub(old) as f64 * 1000.0 / elapsed as f64
            }
        };

        if let Some(v) = parsed.rchar {
            io.read_char = v;
        }
        if let Some(v) = parsed.wchar {
            io.write_char = v;
        }
        if let Some(v) = parsed.syscr {
            io.read_syscalls = v;
        }
        if let Some(v) = parsed.syscw {
            io.write_syscalls = v;
        }
        if let Some(v) = parsed.read_bytes {
            io.read_rate_bps = rate(v, io.read_bytes);
            io.read_bytes = v;
        }
        if let Some(v) = parsed.write_bytes {
            io.write_rate_bps = rate(v, io.write_bytes);
            io.write_bytes = v;
        }
        if let Some(v) = parsed.cancelled_write_bytes {
            io.cancelled_write_bytes = v;
        }
        io.last_scan_ms = now;
    }

    fn apply_statm(&self, statm: &Statm, record: &mut ProcessRecord) {
        let page_size = self.context.page_size;
        let to_kb = |pages: u64| pages.saturating_mul(page_size) / 1024;
        record.virtual_mem = to_kb(statm.size);
        record.resident_mem = to_kb(statm.resident);
        record.shared_mem = to_kb(statm.shared);
        record.text_mem = to_kb(statm.text);
        record.data_mem = to_kb(statm.data);
    }

    fn apply_stat(&self, stat: &TaskStat, record: &mut ProcessRecord) {
        let ticks = self.context.clock_ticks;
        record.command = truncate_command(&stat.comm, self.context.command_max_len);
        record.ppid = stat.ppid;
        record.user_time = ticks_to_centis(stat.utime, ticks);
        record.system_time = ticks_to_centis(stat.stime, ticks);
        record.child_user_time = ticks_to_centis(stat.cutime, ticks);
        record.child_system_time = ticks_to_centis(stat.cstime, ticks);
    }
}

/// Reads a file the sample cannot do without.
///
/// A task that exited between the listing and the read shows up as
/// `NotFound` or `ESRCH` and maps to `ProcessGone`. Anything else keeps its
/// `io::Error`.
fn read_required<F: FileSystem>(
    fs: &F,
    dir: &F::Dir,
    pid: u32,
    name: &str,
) -> Result<String, CollectError> {
    fs.read_to_string_at(dir, name).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound || e.raw_os_error() == Some(libc::ESRCH) {
            CollectError::ProcessGone(pid)
        } else {
            CollectError::io(format!("{}/{}", pid, name), e)
        }
    })
}
