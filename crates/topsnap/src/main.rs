//! topsnap - prints a top-like view of host resources at a fixed interval.
//!
//! Each cycle prints the aggregate CPU usage, memory and swap figures and
//! every task above the CPU threshold, either as a table or as one JSON
//! object per line.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(not(target_os = "linux"))]
use topsnap_core::collector::MockFs;
#[cfg(target_os = "linux")]
use topsnap_core::collector::RealFs;
use topsnap_core::collector::{FileSystem, SnapshotCollector};
use topsnap_core::fmt::{format_bytes_rate, format_cpu_time, format_kb, format_percent};
use topsnap_core::model::MemoryUsage;
use topsnap_core::{CollectorConfig, ProcessRecord, SystemSnapshot, TaskRetention};

/// Host resource sampler.
#[derive(Parser)]
#[command(name = "topsnap", about = "Top-like host resource sampler", version)]
struct Args {
    /// Sampling interval in seconds.
    #[arg(short, long, default_value = "2")]
    interval: u64,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Directory holding the cpu<N> device entries.
    #[arg(long, default_value = "/sys/devices/system/cpu")]
    cpu_sysfs_path: String,

    /// Only show tasks using more than this CPU percentage.
    #[arg(short, long, default_value = "0.0001")]
    threshold: f32,

    /// Stop after this many cycles. Runs until interrupted by default.
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Print one JSON object per cycle instead of a table.
    #[arg(long)]
    json: bool,

    /// Forget tasks that exited instead of keeping their last figures.
    #[arg(long)]
    drop_stale: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn collector_config(&self) -> CollectorConfig {
        let retention = if self.drop_stale {
            TaskRetention::DropStale
        } else {
            TaskRetention::KeepAll
        };
        CollectorConfig {
            proc_path: self.proc_path.clone(),
            cpu_sysfs_path: self.cpu_sysfs_path.clone(),
            ..CollectorConfig::default()
        }
        .with_task_retention(retention)
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
/// Logs go to stderr so that stdout only carries the report.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["topsnap", "topsnap_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// One cycle as printed in JSON mode.
#[derive(Serialize)]
struct CycleReport<'a> {
    timestamp: DateTime<Utc>,
    cycle: u64,
    cpu_usage: f64,
    active_cpus: u32,
    existing_cpus: u32,
    memory: &'a MemoryUsage,
    task_count: usize,
    tasks: Vec<&'a ProcessRecord>,
}

/// Tasks above `threshold` percent CPU, busiest first.
fn busy_tasks(snapshot: &SystemSnapshot, threshold: f32) -> Vec<&ProcessRecord> {
    let mut tasks: Vec<&ProcessRecord> = snapshot
        .tasks()
        .iter()
        .filter(|t| t.last_seen_cycle == snapshot.cycle && t.percent_cpu > threshold)
        .collect();
    tasks.sort_by(|a, b| b.percent_cpu.total_cmp(&a.percent_cpu));
    tasks
}

fn print_table(snapshot: &SystemSnapshot, tasks: &[&ProcessRecord]) {
    let mem = &snapshot.memory;
    println!(
        "{}  cpu {} ({}/{} online)  mem {}/{} avail {}  swap {}/{}  tasks {}",
        snapshot.timestamp.format("%H:%M:%S"),
        format_percent((snapshot.aggregate_cpu_usage() * 100.0) as f32),
        snapshot.active_cpus,
        snapshot.existing_cpus,
        format_kb(mem.used_mem),
        format_kb(mem.total_mem),
        format_kb(mem.available_mem),
        format_kb(mem.used_swap),
        format_kb(mem.total_swap),
        snapshot.task_count(),
    );
    println!(
        "{:>8} {:>8} {:>7} {:>6} {:>8} {:>9} {:>9} {:>10}  COMMAND",
        "PID", "PPID", "%CPU", "%MEM", "RES", "READ", "WRITE", "TIME"
    );
    for task in tasks {
        println!(
            "{:>8} {:>8} {:>7} {:>6} {:>8} {:>9} {:>9} {:>10}  {}",
            task.pid,
            task.ppid,
            format_percent(task.percent_cpu),
            format_percent(task.percent_mem),
            format_kb(task.resident_mem),
            format_bytes_rate(task.io.read_rate_bps),
            format_bytes_rate(task.io.write_rate_bps),
            format_cpu_time(task.cpu_time()),
            task.command,
        );
    }
    println!();
}

fn report(snapshot: &SystemSnapshot, args: &Args) {
    let tasks = busy_tasks(snapshot, args.threshold);
    if !args.json {
        print_table(snapshot, &tasks);
        return;
    }

    let report = CycleReport {
        timestamp: snapshot.timestamp,
        cycle: snapshot.cycle,
        cpu_usage: snapshot.aggregate_cpu_usage(),
        active_cpus: snapshot.active_cpus,
        existing_cpus: snapshot.existing_cpus,
        memory: &snapshot.memory,
        task_count: snapshot.task_count(),
        tasks,
    };
    match serde_json::to_string(&report) {
        Ok(line) => println!("{}", line),
        Err(e) => error!("Failed to serialize cycle {}: {}", snapshot.cycle, e),
    }
}

fn run<F: FileSystem>(mut collector: SnapshotCollector<F>, args: &Args, running: &AtomicBool) {
    if let Err(e) = collector.initialize() {
        error!("Failed to initialize collector: {}", e);
        std::process::exit(1);
    }

    let interval = Duration::from_secs(args.interval);
    let mut cycles: u64 = 0;

    while running.load(Ordering::SeqCst) {
        match collector.collect_once() {
            Ok(snapshot) => {
                cycles += 1;
                report(snapshot, args);
            }
            Err(e) => {
                error!("Failed to collect snapshot: {}", e);
            }
        }

        if let Some(timing) = collector.last_timing() {
            debug!(
                "Cycle timing: total={:?} topology={:?} meminfo={:?} cpu={:?} processes={:?}",
                timing.total, timing.topology, timing.meminfo, timing.cpu, timing.processes
            );
        }

        if args.count.is_some_and(|count| cycles >= count) {
            break;
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!("Stopped after {} cycles", cycles);
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("topsnap {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={}s, proc={}, cpu={}, threshold={}%",
        args.interval, args.proc_path, args.cpu_sysfs_path, args.threshold
    );

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let config = args.collector_config();

    #[cfg(target_os = "linux")]
    let collector = SnapshotCollector::new(RealFs::new(), config);
    #[cfg(not(target_os = "linux"))]
    let collector = {
        warn!("Not running on Linux: sampling a built-in synthetic system");
        SnapshotCollector::new(MockFs::typical_system(), config.with_host_constants(4096, 100))
    };

    run(collector, &args, &running);
}

#[cfg(test)]
mod tests {
    use super::*;
    use topsnap_core::collector::{ManualClock, MockFs};

    #[test]
    fn test_args_parse_defaults() {
        let args = Args::try_parse_from(["topsnap"]).unwrap();
        assert_eq!(args.interval, 2);
        assert_eq!(args.threshold, 0.0001);
        assert!(args.count.is_none());
        assert!(!args.json);

        let config = args.collector_config();
        assert_eq!(config.proc_path, "/proc");
        assert_eq!(config.task_retention, TaskRetention::KeepAll);
    }

    #[test]
    fn test_args_parse_flags() {
        let args = Args::try_parse_from([
            "topsnap",
            "-i",
            "5",
            "-n",
            "3",
            "--json",
            "--drop-stale",
            "--proc-path",
            "/tmp/proc",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.interval, 5);
        assert_eq!(args.count, Some(3));
        assert!(args.json);
        assert_eq!(args.verbose, 2);

        let config = args.collector_config();
        assert_eq!(config.proc_path, "/tmp/proc");
        assert_eq!(config.task_retention, TaskRetention::DropStale);
    }

    #[test]
    fn test_busy_tasks_filter_and_order() {
        let config = CollectorConfig::default().with_host_constants(4096, 100);
        let mut collector =
            SnapshotCollector::with_clock(MockFs::typical_system(), ManualClock::default(), config);
        collector.initialize().unwrap();
        let snapshot = collector.collect_once().unwrap();

        let tasks = busy_tasks(snapshot, 0.0001);
        assert!(!tasks.is_empty());
        assert!(tasks.windows(2).all(|w| w[0].percent_cpu >= w[1].percent_cpu));
        assert!(tasks.iter().all(|t| t.percent_cpu > 0.0001));

        let none = busy_tasks(snapshot, 1000.0);
        assert!(none.is_empty());
    }
}
