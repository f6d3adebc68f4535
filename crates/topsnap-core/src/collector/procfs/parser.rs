//! Parsers for `/proc` and CPU sysfs files.
//!
//! These are pure functions that parse the content of various pseudo-files
//! into structured data. They are designed to be easily testable with string inputs.

use crate::model::CpuTimes;

/// Maximum digits accepted for one `/proc/stat` CPU counter.
pub const CPU_FIELD_MAX_DIGITS: usize = 16;
/// Maximum digits accepted for the id in a `cpu<N>` stat line.
pub const CPU_ID_MAX_DIGITS: usize = 4;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

// ============ Memory ============

/// Parsed data from `/proc/meminfo` (KiB).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub mem_total: u64,
    pub mem_free: u64,
    pub mem_available: u64,
    pub buffers: u64,
    pub cached: u64,
    pub shmem: u64,
    pub swap_total: u64,
    pub swap_cached: u64,
    pub swap_free: u64,
    pub s_reclaimable: u64,
}

/// Parses `/proc/meminfo` content.
///
/// Format: `<Label>: <value> kB`, one per line. Unknown labels and lines
/// whose value does not parse are skipped.
pub fn parse_meminfo(content: &str) -> MemInfo {
    let mut info = MemInfo::default();

    for line in content.lines() {
        let Some((label, rest)) = line.split_once(':') else {
            continue;
        };
        let slot = match label {
            "MemTotal" => &mut info.mem_total,
            "MemFree" => &mut info.mem_free,
            "MemAvailable" => &mut info.mem_available,
            "Buffers" => &mut info.buffers,
            "Cached" => &mut info.cached,
            "Shmem" => &mut info.shmem,
            "SwapTotal" => &mut info.swap_total,
            "SwapCached" => &mut info.swap_cached,
            "SwapFree" => &mut info.swap_free,
            "SReclaimable" => &mut info.s_reclaimable,
            _ => continue,
        };
        if let Some(value) = rest.split_whitespace().next().and_then(|v| v.parse().ok()) {
            *slot = value;
        }
    }

    info
}

// ============ System CPU ============

/// One CPU line from `/proc/stat`, raw kernel ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuStatLine {
    /// `None` for the aggregate `cpu` line.
    pub cpu_id: Option<u32>,
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl CpuStatLine {
    /// Converts raw counters into the derived categories.
    ///
    /// The kernel already accounts guest time inside user/nice, so it is
    /// removed there and reported once under `guest`.
    pub fn to_times(&self) -> CpuTimes {
        let user = self.user.saturating_sub(self.guest);
        let nice = self.nice.saturating_sub(self.guest_nice);
        let idle_all = self.idle.saturating_add(self.iowait);
        let system_all = self
            .system
            .saturating_add(self.irq)
            .saturating_add(self.softirq);
        let guest = self.guest.saturating_add(self.guest_nice);
        let total = [user, nice, system_all, idle_all, self.steal, guest]
            .into_iter()
            .fold(0u64, u64::saturating_add);

        CpuTimes {
            total,
            user,
            nice,
            system: self.system,
            system_all,
            idle: self.idle,
            idle_all,
            io_wait: self.iowait,
            irq: self.irq,
            soft_irq: self.softirq,
            steal: self.steal,
            guest,
        }
    }
}

/// Parses one CPU line of `/proc/stat`.
///
/// With `aggregate` the line must start with `cpu` followed by two spaces;
/// otherwise with `cpu<N>`. Up to ten counters are read; parsing stops at the
/// first token that is not a number of at most [`CPU_FIELD_MAX_DIGITS`]
/// digits and missing counters are 0. Returns `None` when the prefix does not
/// match or no counter could be read.
pub fn parse_cpu_line(line: &str, aggregate: bool) -> Option<CpuStatLine> {
    let (cpu_id, rest) = if aggregate {
        (None, line.strip_prefix("cpu  ")?)
    } else {
        let after = line.strip_prefix("cpu")?;
        let digits_end = after
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after.len());
        if digits_end == 0 || digits_end > CPU_ID_MAX_DIGITS {
            return None;
        }
        let id: u32 = after[..digits_end].parse().ok()?;
        (Some(id), &after[digits_end..])
    };
    if !aggregate && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut values = [0u64; 10];
    let mut count = 0;
    for token in rest.split_whitespace().take(values.len()) {
        if token.len() > CPU_FIELD_MAX_DIGITS || !is_digits(token) {
            break;
        }
        let Ok(value) = token.parse() else {
            break;
        };
        values[count] = value;
        count += 1;
    }
    if count == 0 {
        return None;
    }

    let [user, nice, system, idle, iowait, irq, softirq, steal, guest, guest_nice] = values;
    Some(CpuStatLine {
        cpu_id,
        user,
        nice,
        system,
        idle,
        iowait,
        irq,
        softirq,
        steal,
        guest,
        guest_nice,
    })
}

// ============ CPU topology ============

/// Extracts the id from a `cpu<N>` device directory name.
///
/// `cpufreq`, `cpuidle`, `cpu` and ids that overflow are rejected.
pub fn parse_cpu_dir_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("cpu")?;
    if !is_digits(digits) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|&id| id != u32::MAX)
}

/// Reads the content of a CPU's `online` file. `0` means offline.
pub fn is_online(content: &str) -> bool {
    !content.starts_with('0')
}

// ============ Tasks ============

/// Extracts a task id from a `/proc` or `task/` entry name.
///
/// A single leading dot is ignored, since some kernels hide threads that
/// way. The rest must be all digits and non-zero.
pub fn parse_task_dir_name(name: &str) -> Option<u32> {
    let name = name.strip_prefix('.').unwrap_or(name);
    if !is_digits(name) {
        return None;
    }
    name.parse::<u32>().ok().filter(|&id| id != 0)
}

/// The fields of `/proc/[pid]/stat` consulted by the collector.
///
/// Times are raw clock ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStat {
    /// Field 1.
    pub pid: u32,
    /// Field 2, without the surrounding parentheses.
    pub comm: String,
    /// Field 4.
    pub ppid: u32,
    /// Fields 14 to 17.
    pub utime: u64,
    pub stime: u64,
    pub cutime: u64,
    pub cstime: u64,
}

/// Parses `/proc/[pid]/stat` content.
///
/// The comm field can contain spaces and parentheses, so it is taken
/// between the first `(` and the last `)`. Fields after field 17 are never
/// looked at. A malformed ppid or time field reads as 0.
pub fn parse_task_stat(content: &str) -> Result<TaskStat, ParseError> {
    let open_paren = content
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;
    if close_paren <= open_paren {
        return Err(ParseError::new("invalid parentheses in stat"));
    }

    let pid = content[..open_paren]
        .trim()
        .parse()
        .map_err(|_| ParseError::new("invalid pid"))?;
    let comm = content[open_paren + 1..close_paren].to_string();

    // fields[0] is field 3 (state), fields[14] is field 17 (cstime).
    let mut fields = [""; 15];
    for (slot, token) in fields
        .iter_mut()
        .zip(content[close_paren + 1..].split_whitespace())
    {
        *slot = token;
    }
    let number = |idx: usize| -> u64 { fields[idx].parse().unwrap_or(0) };

    Ok(TaskStat {
        pid,
        comm,
        ppid: fields[1].parse().unwrap_or(0),
        utime: number(11),
        stime: number(12),
        cutime: number(13),
        cstime: number(14),
    })
}

/// Parsed `/proc/[pid]/statm`, in pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statm {
    pub size: u64,
    pub resident: u64,
    pub shared: u64,
    pub text: u64,
    /// Data plus stack.
    pub data: u64,
}

/// Parses `/proc/[pid]/statm` content.
///
/// Format: `size resident shared text lib data dt`. `lib` and `dt` are
/// always 0 since Linux 2.6 but must still be present.
pub fn parse_statm(content: &str) -> Result<Statm, ParseError> {
    let mut values = [0u64; 7];
    let mut tokens = content.split_whitespace();
    for (idx, value) in values.iter_mut().enumerate() {
        let token = tokens
            .next()
            .ok_or_else(|| ParseError::new(format!("statm: expected 7 fields, got {}", idx)))?;
        *value = token.parse().map_err(|_| {
            ParseError::new(format!("statm: invalid field {}: {:?}", idx + 1, token))
        })?;
    }

    let [size, resident, shared, text, _lib, data, _dt] = values;
    Ok(Statm {
        size,
        resident,
        shared,
        text,
        data,
    })
}

/// Parsed `/proc/[pid]/io`. Labels absent from the file are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskIo {
    pub rchar: Option<u64>,
    pub wchar: Option<u64>,
    pub syscr: Option<u64>,
    pub syscw: Option<u64>,
    pub read_bytes: Option<u64>,
    pub write_bytes: Option<u64>,
    pub cancelled_write_bytes: Option<u64>,
}

/// Parses `/proc/[pid]/io` content.
///
/// Format is `key: value` pairs, one per line. A value that does not
/// parse reads as 0.
pub fn parse_task_io(content: &str) -> TaskIo {
    let mut io = TaskIo::default();

    for line in content.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let value = Some(value.trim().parse().unwrap_or(0));
            match key {
                "rchar" => io.rchar = value,
                "wchar" => io.wchar = value,
                "syscr" => io.syscr = value,
                "syscw" => io.syscw = value,
                "read_bytes" => io.read_bytes = value,
                "write_bytes" => io.write_bytes = value,
                "cancelled_write_bytes" => io.cancelled_write_bytes = value,
                _ => {}
            }
        }
    }

    io
}
