//! The snapshot handed to callers after every collection cycle.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{CpuSlot, MemoryUsage, ProcessRecord};

/// Complete view of the host after one cycle.
///
/// The collector owns a single instance and mutates it on every cycle; a
/// reference obtained from one cycle reflects the next cycle once it runs.
#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    /// Wall-clock time at the start of the cycle.
    pub timestamp: DateTime<Utc>,
    /// Same instant as `timestamp`, in milliseconds since the epoch.
    pub time_ms: u64,
    /// Number of cycles started, starting at 1.
    pub cycle: u64,
    pub memory: MemoryUsage,
    /// CPUs reporting online.
    pub active_cpus: u32,
    /// CPUs present under the CPU device tree.
    pub existing_cpus: u32,
    /// Slot 0 is the aggregate; slot `i` is CPU `i - 1`.
    pub cpus: Vec<CpuSlot>,
    /// Task records in first-seen order.
    tasks: Vec<ProcessRecord>,
    #[serde(skip)]
    index: HashMap<u32, usize>,
}

impl Default for SystemSnapshot {
    fn default() -> Self {
        Self {
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            time_ms: 0,
            cycle: 0,
            memory: MemoryUsage::default(),
            active_cpus: 0,
            existing_cpus: 0,
            cpus: Vec::new(),
            tasks: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl SystemSnapshot {
    /// The aggregate CPU slot, if topology has been discovered.
    pub fn aggregate(&self) -> Option<&CpuSlot> {
        self.cpus.first()
    }

    /// Busy fraction of the whole machine over the last period, in `[0, 1]`.
    pub fn aggregate_cpu_usage(&self) -> f64 {
        self.aggregate().map_or(0.0, CpuSlot::usage)
    }

    /// All known task records in first-seen order.
    pub fn tasks(&self) -> &[ProcessRecord] {
        &self.tasks
    }

    pub fn task(&self, pid: u32) -> Option<&ProcessRecord> {
        self.index.get(&pid).map(|&i| &self.tasks[i])
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn task_mut(&mut self, pid: u32) -> Option<&mut ProcessRecord> {
        self.index.get(&pid).map(|&i| &mut self.tasks[i])
    }

    /// Appends a record seen for the first time.
    pub(crate) fn insert_task(&mut self, record: ProcessRecord) {
        if let Some(&i) = self.index.get(&record.pid) {
            self.tasks[i] = record;
            return;
        }
        self.index.insert(record.pid, self.tasks.len());
        self.tasks.push(record);
    }

    /// Drops records for which `keep` is false, preserving order.
    ///
    /// Returns the number of records removed.
    pub(crate) fn retain_tasks(&mut self, mut keep: impl FnMut(&ProcessRecord) -> bool) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| keep(t));
        let removed = before - self.tasks.len();
        if removed > 0 {
            self.index = self
                .tasks
                .iter()
                .enumerate()
                .map(|(i, t)| (t.pid, i))
                .collect();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut snapshot = SystemSnapshot::default();
        snapshot.insert_task(ProcessRecord::new(10));
        snapshot.insert_task(ProcessRecord::new(3));

        let pids: Vec<u32> = snapshot.tasks().iter().map(|t| t.pid).collect();
        assert_eq!(pids, vec![10, 3]);
        assert_eq!(snapshot.task(3).map(|t| t.pid), Some(3));
        assert!(snapshot.task(4).is_none());
    }

    #[test]
    fn test_retain_rebuilds_index() {
        let mut snapshot = SystemSnapshot::default();
        for pid in [1, 2, 3, 4] {
            snapshot.insert_task(ProcessRecord::new(pid));
        }

        let removed = snapshot.retain_tasks(|t| t.pid % 2 == 0);
        assert_eq!(removed, 2);
        assert_eq!(snapshot.task_count(), 2);
        assert_eq!(snapshot.task(4).map(|t| t.pid), Some(4));
        assert!(snapshot.task(1).is_none());

        snapshot.task_mut(4).unwrap().command = "four".to_string();
        assert_eq!(snapshot.tasks()[1].command, "four");
    }

    #[test]
    fn test_aggregate_usage_without_topology() {
        let snapshot = SystemSnapshot::default();
        assert_eq!(snapshot.aggregate_cpu_usage(), 0.0);
    }
}
