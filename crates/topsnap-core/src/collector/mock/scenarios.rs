//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic `/proc` and CPU sysfs states
//! for testing various system conditions.

use super::filesystem::MockFs;

/// Process pseudo-filesystem root used by all scenarios.
pub const PROC: &str = "/proc";
/// CPU device directory used by all scenarios.
pub const SYSFS_CPU: &str = "/sys/devices/system/cpu";

/// Renders a `/proc/[pid]/stat` line.
///
/// Times are raw clock ticks; fields not consulted by the collector carry
/// plausible constants.
pub fn task_stat(pid: u32, comm: &str, ppid: u32, utime: u64, stime: u64) -> String {
    format!(
        "{pid} ({comm}) S {ppid} {pid} {pid} 0 -1 4194560 1200 0 3 0 {utime} {stime} 0 0 \
         20 0 1 0 4321 123456789 2048 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 \
         17 2 0 0 0 0 0\n"
    )
}

/// Renders a `/proc/[pid]/statm` line from page counts.
pub fn task_statm(size: u64, resident: u64, shared: u64, text: u64, data: u64) -> String {
    format!("{size} {resident} {shared} {text} 0 {data} 0\n")
}

/// Renders a `/proc/[pid]/io` file.
pub fn task_io(rchar: u64, wchar: u64, read_bytes: u64, write_bytes: u64) -> String {
    format!(
        "rchar: {rchar}\nwchar: {wchar}\nsyscr: {}\nsyscw: {}\nread_bytes: {read_bytes}\n\
         write_bytes: {write_bytes}\ncancelled_write_bytes: 0\n",
        rchar / 512,
        wchar / 512
    )
}

impl MockFs {
    /// Creates a typical 4-CPU system with a few processes.
    ///
    /// Includes: init (PID 1), kthreadd (PID 2, unreadable `io`), a bash
    /// shell (PID 1000) and a postgres backend (PID 1200) with one extra
    /// thread (TID 1201).
    pub fn typical_system() -> Self {
        let mut fs = Self::new();

        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:         1000 kB
Active:          4096000 kB
Inactive:        2048000 kB
SwapTotal:       4096000 kB
SwapFree:        4000000 kB
Dirty:              1024 kB
Shmem:            128000 kB
Slab:             512000 kB
SReclaimable:     256000 kB
",
        );
        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750 20000 250 50 25 0 0 0
cpu1 2500 125 750 20000 250 50 25 0 0 0
cpu2 2500 125 750 20000 250 50 25 0 0 0
cpu3 2500 125 750 20000 250 50 25 0 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
",
        );
        fs.add_file("/proc/uptime", "12345.67 98765.43\n");
        fs.add_dir("/proc/sys");
        fs.add_dir("/proc/net");

        // cpu0 is not hot-pluggable and has no `online` file.
        fs.add_cpu(SYSFS_CPU, 0, None);
        for id in 1..4 {
            fs.add_cpu(SYSFS_CPU, id, Some("1\n"));
        }
        fs.add_dir(format!("{}/cpufreq", SYSFS_CPU));
        fs.add_dir(format!("{}/cpuidle", SYSFS_CPU));
        fs.add_file(format!("{}/online", SYSFS_CPU), "0-3\n");
        fs.add_file(format!("{}/possible", SYSFS_CPU), "0-3\n");

        fs.add_process(
            1,
            &task_stat(1, "systemd", 0, 1500, 800),
            &task_statm(42000, 3000, 2000, 300, 5000),
            &task_io(9_000_000, 4_000_000, 120_000_000, 80_000_000),
        );
        fs.add_process(
            2,
            &task_stat(2, "kthreadd", 0, 0, 12),
            &task_statm(0, 0, 0, 0, 0),
            "",
        );
        fs.add_process(
            1000,
            &task_stat(1000, "bash", 1, 200, 100),
            &task_statm(5000, 1200, 800, 250, 600),
            &task_io(500_000, 20_000, 4096, 0),
        );
        fs.add_process(
            1200,
            &task_stat(1200, "postgres", 1, 9000, 3000),
            &task_statm(100000, 25000, 20000, 2000, 8000),
            &task_io(50_000_000, 30_000_000, 40_000_000, 25_000_000),
        );
        fs.add_thread(
            1200,
            1201,
            &task_stat(1201, "postgres", 1, 700, 300),
            &task_statm(100000, 25000, 20000, 2000, 8000),
            &task_io(1_000_000, 500_000, 0, 0),
        );

        fs
    }

    /// Two online CPUs with a gap in their ids: `cpu0` and `cpu2`.
    pub fn sparse_cpus() -> Self {
        let mut fs = Self::new();
        fs.add_cpu(SYSFS_CPU, 0, Some("1\n"));
        fs.add_cpu(SYSFS_CPU, 2, Some("1\n"));
        fs.add_file(
            "/proc/stat",
            "\
cpu  2000 0 1000 7000 0 0 0 0 0 0
cpu0 1000 0 500 3500 0 0 0 0 0 0
cpu2 1000 0 500 3500 0 0 0 0 0 0
",
        );
        fs.add_file(
            "/proc/meminfo",
            "MemTotal: 2048000 kB\nMemFree: 1024000 kB\nMemAvailable: 1500000 kB\n",
        );
        fs.add_dir("/proc");
        fs
    }
}
