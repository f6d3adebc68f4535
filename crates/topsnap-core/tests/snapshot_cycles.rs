//! Multi-cycle behaviour of the collector over a mock `/proc` tree.

use std::time::Duration;

use topsnap_core::collector::mock::{task_io, task_stat, task_statm};
use topsnap_core::collector::{CollectError, ManualClock, MockFs, SnapshotCollector};
use topsnap_core::{CollectorConfig, TaskRetention};

const STAT_NEXT: &str = "\
cpu  10400 500 3100 80400 1100 200 100 0 0 0
cpu0 2600 125 775 20100 275 50 25 0 0 0
cpu1 2600 125 775 20100 275 50 25 0 0 0
cpu2 2600 125 775 20100 275 50 25 0 0 0
cpu3 2600 125 775 20100 275 50 25 0 0 0
";

type MockCollector = SnapshotCollector<MockFs, ManualClock>;

fn start(fs: MockFs, config: CollectorConfig) -> (MockCollector, ManualClock) {
    let clock = ManualClock::default();
    let mut collector =
        SnapshotCollector::with_clock(fs, clock.clone(), config.with_host_constants(4096, 100));
    collector.initialize().unwrap();
    collector.collect_once().unwrap();
    (collector, clock)
}

fn typical() -> (MockCollector, ManualClock) {
    start(MockFs::typical_system(), CollectorConfig::default())
}

#[test]
fn identical_content_gives_zero_deltas() {
    let (mut collector, clock) = typical();
    let mem_before = collector.snapshot().task(1000).unwrap().percent_mem;

    clock.advance(Duration::from_secs(1));
    let snapshot = collector.collect_once().unwrap();

    assert_eq!(snapshot.cycle, 2);
    let aggregate = snapshot.aggregate().unwrap();
    assert_eq!(aggregate.period.total, 0);
    assert_eq!(snapshot.aggregate_cpu_usage(), 0.0);

    let bash = snapshot.task(1000).unwrap();
    assert_eq!(bash.percent_cpu, 0.0);
    assert_eq!(bash.io.read_rate_bps, 0.0);
    assert_eq!(bash.io.write_rate_bps, 0.0);
    assert_eq!(bash.percent_mem, mem_before);
    assert_eq!(bash.last_seen_cycle, 2);
}

#[test]
fn counter_reset_gives_zero_period() {
    let (mut collector, clock) = typical();

    collector
        .fs_mut()
        .add_file("/proc/stat", "cpu  5000 0 1000 40000 0 0 0 0 0 0\n");
    clock.advance(Duration::from_secs(1));
    let snapshot = collector.collect_once().unwrap();

    let period = &snapshot.aggregate().unwrap().period;
    assert_eq!(period.total, 0);
    assert_eq!(period.user, 0);
    assert_eq!(period.idle_all, 0);
    assert!(snapshot.tasks().iter().all(|t| t.percent_cpu == 0.0));
}

#[test]
fn cpu_and_io_rates_over_one_second() {
    let (mut collector, clock) = typical();

    let fs = collector.fs_mut();
    fs.add_file("/proc/stat", STAT_NEXT);
    fs.add_file("/proc/1000/stat", task_stat(1000, "bash", 1, 300, 150));
    fs.add_file("/proc/1000/io", task_io(500_000, 20_000, 4096 + 2048, 1024));
    clock.advance(Duration::from_secs(2));
    let snapshot = collector.collect_once().unwrap();

    assert!((snapshot.aggregate_cpu_usage() - 0.5).abs() < 1e-9);
    let bash = snapshot.task(1000).unwrap();
    // 150 ticks over a normalized period of 1000 / 4.
    assert_eq!(bash.percent_cpu, 60.0);
    assert_eq!(bash.io.read_rate_bps, 1024.0);
    assert_eq!(bash.io.write_rate_bps, 512.0);
}

#[test]
fn percent_cpu_is_clamped_to_active_cpus() {
    let (mut collector, clock) = typical();

    let fs = collector.fs_mut();
    fs.add_file("/proc/stat", STAT_NEXT);
    fs.add_file(
        "/proc/1200/stat",
        task_stat(1200, "postgres", 1, 9000 + 1_000_000, 3000),
    );
    clock.advance(Duration::from_secs(1));
    let snapshot = collector.collect_once().unwrap();

    let active = snapshot.active_cpus as f32;
    assert_eq!(snapshot.task(1200).unwrap().percent_cpu, active * 100.0);
    for task in snapshot.tasks() {
        assert!(task.percent_cpu >= 0.0);
        assert!(task.percent_cpu <= active * 100.0);
    }
}

#[test]
fn pid_mismatch_never_overwrites_a_record() {
    let (mut collector, clock) = typical();
    let before = collector.snapshot().task(1000).unwrap().clone();

    let fs = collector.fs_mut();
    fs.add_file("/proc/1000/stat", task_stat(4242, "intruder", 7, 90_000, 90_000));
    fs.add_file("/proc/1000/statm", task_statm(900000, 868888, 1, 1, 1));
    fs.add_file("/proc/1000/io", task_io(1, 1, 77_777_777, 1));
    let statm = task_statm(1, 1, 1, 1, 1);
    fs.add_process(1500, &task_stat(1501, "ghost", 1, 1, 1), &statm, "");
    clock.advance(Duration::from_secs(1));
    let snapshot = collector.collect_once().unwrap();

    let bash = snapshot.task(1000).unwrap();
    assert_eq!(bash.command, "bash");
    assert_eq!(bash.ppid, 1);
    assert_eq!(bash.user_time, 200);
    assert_eq!(bash.last_seen_cycle, 1);
    assert_eq!(bash.resident_mem, before.resident_mem);
    assert_eq!(bash.percent_mem, before.percent_mem);
    assert_eq!(bash.io.read_bytes, before.io.read_bytes);
    assert_eq!(bash.io.last_scan_ms, before.io.last_scan_ms);
    assert!(snapshot.task(1500).is_none());
    assert!(snapshot.task(1501).is_none());
}

#[test]
fn failed_statm_keeps_previous_memory_and_skips_new_tasks() {
    let (mut collector, clock) = typical();
    let resident_before = collector.snapshot().task(1000).unwrap().resident_mem;

    let fs = collector.fs_mut();
    fs.deny_read("/proc/1000/statm");
    fs.add_task("/proc/1600", &task_stat(1600, "newcomer", 1, 1, 1), "", "");
    fs.remove("/proc/1600/statm");
    clock.advance(Duration::from_secs(1));
    let snapshot = collector.collect_once().unwrap();

    let bash = snapshot.task(1000).unwrap();
    assert_eq!(bash.resident_mem, resident_before);
    assert_eq!(bash.last_seen_cycle, 1);
    assert!(snapshot.task(1600).is_none());
}

#[test]
fn sparse_cpu_ids_get_a_slot_for_the_gap() {
    let (collector, _clock) = start(MockFs::sparse_cpus(), CollectorConfig::default());
    let snapshot = collector.snapshot();

    assert_eq!(snapshot.existing_cpus, 2);
    assert_eq!(snapshot.active_cpus, 2);
    assert!(snapshot.cpus.len() >= 3);
    assert_eq!(snapshot.task_count(), 0);
    assert!(snapshot.memory.used_mem <= snapshot.memory.total_mem);
    assert!(snapshot.memory.available_mem <= snapshot.memory.total_mem);
}

#[test]
fn threads_are_sampled_once() {
    let (mut collector, clock) = typical();
    assert_eq!(collector.snapshot().task_count(), 5);

    let stat = task_stat(1202, "postgres", 1, 5, 5);
    let statm = task_statm(100000, 25000, 20000, 2000, 8000);
    collector
        .fs_mut()
        .add_task("/proc/1200/task/.1202", &stat, &statm, "");
    clock.advance(Duration::from_secs(1));
    let snapshot = collector.collect_once().unwrap();

    let pids: Vec<u32> = snapshot.tasks().iter().map(|t| t.pid).collect();
    assert_eq!(pids, vec![1, 1000, 1201, 1200, 2, 1202]);
    assert_eq!(pids.iter().filter(|&&p| p == 1200).count(), 1);
}

#[test]
fn exited_tasks_follow_retention_policy() {
    let cases = [
        (TaskRetention::KeepAll, true),
        (TaskRetention::DropStale, false),
    ];
    for (retention, expect_kept) in cases {
        let config = CollectorConfig::default().with_task_retention(retention);
        let (mut collector, clock) = start(MockFs::typical_system(), config);

        collector.fs_mut().remove("/proc/1000");
        clock.advance(Duration::from_secs(1));
        let snapshot = collector.collect_once().unwrap();

        assert_eq!(snapshot.task(1000).is_some(), expect_kept, "{:?}", retention);
        assert!(snapshot.task(1200).is_some());
        let dropped = collector.last_timing().unwrap().tasks_dropped;
        assert_eq!(dropped, usize::from(!expect_kept));
    }
}

#[test]
fn missing_stat_aborts_cycle() {
    let (mut collector, clock) = typical();
    collector.fs_mut().remove("/proc/stat");
    clock.advance(Duration::from_secs(1));

    let err = collector.collect_once().unwrap_err();
    assert!(matches!(err, CollectError::Io { ref path, .. } if path == "/proc/stat"));
    assert_eq!(collector.snapshot().task(1000).unwrap().last_seen_cycle, 1);
}

#[test]
fn snapshot_serializes_to_json() {
    let (collector, _clock) = typical();
    let value = serde_json::to_value(collector.snapshot()).unwrap();

    assert_eq!(value["cycle"], 1);
    assert_eq!(value["existing_cpus"], 4);
    assert_eq!(value["tasks"].as_array().map(Vec::len), Some(5));
    assert!(value.get("index").is_none());
}
