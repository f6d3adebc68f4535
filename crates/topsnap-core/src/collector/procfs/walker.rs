//! Traversal of the process tree: `/proc/[pid]` and `/proc/[pid]/task/[tid]`.
//!
//! The walk is iterative. A frame holds an open directory and the entries
//! still to visit; a process with threads pushes a frame for its `task/`
//! directory and is itself sampled once that frame is exhausted. Threads
//! are therefore recorded before the process that owns them, and the number
//! of open directories is bounded regardless of tree depth: the root, a
//! process, its `task/` directory and the thread being sampled.

use std::vec::IntoIter;

use tracing::{debug, error, trace};

use crate::collector::procfs::parser::parse_task_dir_name;
use crate::collector::procfs::process::ProcessSampler;
use crate::collector::traits::{DirEntry, FileSystem};
use crate::model::{ProcessRecord, SystemSnapshot};

/// A task directory waiting to be sampled.
struct PendingTask<D> {
    dir: D,
    pid: u32,
}

struct Frame<D> {
    dir: D,
    entries: IntoIter<DirEntry>,
    /// Entries of this directory are threads of `parent_pid`.
    lists_threads: bool,
    /// The main thread shows up again under `task/`; it is skipped there.
    parent_pid: Option<u32>,
    /// Process whose `task/` directory this frame lists.
    owner: Option<PendingTask<D>>,
}

/// Walks task directories and refreshes the snapshot's task records.
pub struct ProcessTreeWalker<'a, F: FileSystem> {
    fs: &'a F,
    sampler: &'a ProcessSampler,
}

impl<'a, F: FileSystem> ProcessTreeWalker<'a, F> {
    pub fn new(fs: &'a F, sampler: &'a ProcessSampler) -> Self {
        Self { fs, sampler }
    }

    /// Walks the directory `name` (relative to `parent` when given).
    ///
    /// Every numeric entry is sampled as a task; entries of a directory
    /// named `task` are treated as threads of `parent_pid`. Failures of
    /// single entries are logged and skipped. Returns the number of tasks
    /// sampled successfully.
    pub fn walk(
        &self,
        parent: Option<&F::Dir>,
        name: &str,
        parent_pid: Option<u32>,
        snapshot: &mut SystemSnapshot,
    ) -> usize {
        let root = self
            .fs
            .open_dir(parent, name)
            .and_then(|dir| self.fs.read_dir(&dir).map(|entries| (dir, entries)));
        let (dir, entries) = match root {
            Ok(root) => root,
            Err(e) => {
                error!(path = name, error = %e, "cannot list task directory");
                return 0;
            }
        };

        let mut stack = vec![Frame {
            dir,
            entries: entries.into_iter(),
            lists_threads: name == "task",
            parent_pid,
            owner: None,
        }];
        let mut processed = 0;

        while let Some(frame) = stack.last_mut() {
            let Some(entry) = frame.entries.next() else {
                if let Some(Frame {
                    dir,
                    owner: Some(owner),
                    ..
                }) = stack.pop()
                {
                    drop(dir);
                    processed += self.sample(owner, snapshot);
                }
                continue;
            };

            if !entry.kind.may_be_dir() {
                continue;
            }
            let Some(pid) = parse_task_dir_name(&entry.name) else {
                continue;
            };
            if frame.parent_pid == Some(pid) {
                continue;
            }

            let task_dir = match self.fs.open_dir(Some(&frame.dir), &entry.name) {
                Ok(dir) => dir,
                Err(e) => {
                    debug!(pid, error = %e, "task vanished before it could be opened");
                    continue;
                }
            };

            if !frame.lists_threads {
                match self.open_threads(&task_dir) {
                    Ok((threads_dir, threads)) => {
                        stack.push(Frame {
                            dir: threads_dir,
                            entries: threads.into_iter(),
                            lists_threads: true,
                            parent_pid: Some(pid),
                            owner: Some(PendingTask { dir: task_dir, pid }),
                        });
                        continue;
                    }
                    Err(e) => trace!(pid, error = %e, "no readable task directory"),
                }
            }

            processed += self.sample(PendingTask { dir: task_dir, pid }, snapshot);
        }

        processed
    }

    fn open_threads(&self, task_dir: &F::Dir) -> std::io::Result<(F::Dir, Vec<DirEntry>)> {
        let threads_dir = self.fs.open_dir(Some(task_dir), "task")?;
        let entries = self.fs.read_dir(&threads_dir)?;
        Ok((threads_dir, entries))
    }

    /// Samples a task into its existing record, or into a new record that
    /// is only kept when sampling succeeds. Returns 1 on success.
    fn sample(&self, task: PendingTask<F::Dir>, snapshot: &mut SystemSnapshot) -> usize {
        let PendingTask { dir, pid } = task;
        let result = match snapshot.task_mut(pid) {
            Some(record) => self.sampler.sample_task(self.fs, &dir, record),
            None => {
                let mut record = ProcessRecord::new(pid);
                let result = self.sampler.sample_task(self.fs, &dir, &mut record);
                if result.is_ok() {
                    snapshot.insert_task(record);
                }
                result
            }
        };

        match result {
            Ok(()) => 1,
            Err(e) => {
                debug!(pid, error = %e, "skipping task");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, PROC, task_stat, task_statm};
    use crate::collector::procfs::process::SampleContext;

    fn sampler() -> ProcessSampler {
        ProcessSampler::new(SampleContext {
            cycle: 1,
            now_ms: 1_000,
            period: 100.0,
            active_cpus: 4,
            total_mem: 16384000,
            page_size: 4096,
            clock_ticks: 100,
            command_max_len: 128,
        })
    }

    fn pids(snapshot: &SystemSnapshot) -> Vec<u32> {
        snapshot.tasks().iter().map(|t| t.pid).collect()
    }

    #[test]
    fn test_walk_typical_system() {
        let fs = MockFs::typical_system();
        let sampler = sampler();
        let mut snapshot = SystemSnapshot::default();
        let walker = ProcessTreeWalker::new(&fs, &sampler);
        let processed = walker.walk(None, PROC, None, &mut snapshot);

        assert_eq!(processed, 5);
        // Threads come before their process; the main thread is not repeated.
        assert_eq!(pids(&snapshot), vec![1, 1000, 1201, 1200, 2]);
        assert_eq!(snapshot.task(1201).map(|t| t.command.as_str()), Some("postgres"));
    }

    #[test]
    fn test_walk_refreshes_existing_records() {
        let mut fs = MockFs::typical_system();
        let sampler = sampler();
        let mut snapshot = SystemSnapshot::default();
        let walker = ProcessTreeWalker::new(&fs, &sampler);
        walker.walk(None, PROC, None, &mut snapshot);

        fs.add_file("/proc/1000/stat", task_stat(1000, "zsh", 1, 250, 100));
        let walker = ProcessTreeWalker::new(&fs, &sampler);
        walker.walk(None, PROC, None, &mut snapshot);

        assert_eq!(snapshot.task_count(), 5);
        assert_eq!(snapshot.task(1000).map(|t| t.command.as_str()), Some("zsh"));
        assert_eq!(snapshot.task(1000).map(|t| t.percent_cpu), Some(50.0));
    }

    #[test]
    fn test_walk_skips_non_task_entries() {
        let mut fs = MockFs::new();
        fs.add_dir("/proc/self");
        fs.add_dir("/proc/0");
        fs.add_file("/proc/42", "a file, not a task");
        fs.add_process(7, &task_stat(7, "init", 0, 1, 1), &task_statm(1, 1, 1, 1, 1), "");

        let sampler = sampler();
        let mut snapshot = SystemSnapshot::default();
        let walker = ProcessTreeWalker::new(&fs, &sampler);
        let processed = walker.walk(None, PROC, None, &mut snapshot);

        assert_eq!(processed, 1);
        assert_eq!(pids(&snapshot), vec![7]);
    }

    #[test]
    fn test_walk_accepts_hidden_threads() {
        let mut fs = MockFs::new();
        let stat = task_stat(30, "app", 1, 1, 1);
        let statm = task_statm(1, 1, 1, 1, 1);
        fs.add_process(30, &stat, &statm, "");
        fs.add_task("/proc/30/task/.31", &task_stat(31, "app", 1, 1, 1), &statm, "");

        let sampler = sampler();
        let mut snapshot = SystemSnapshot::default();
        let walker = ProcessTreeWalker::new(&fs, &sampler);
        walker.walk(None, PROC, None, &mut snapshot);

        assert_eq!(pids(&snapshot), vec![31, 30]);
    }

    #[test]
    fn test_walk_unknown_entry_kind_is_opened() {
        let mut fs = MockFs::new();
        fs.add_dir_unknown_kind("/proc/12");
        fs.add_task("/proc/12", &task_stat(12, "svc", 1, 1, 1), &task_statm(1, 1, 1, 1, 1), "");

        let sampler = sampler();
        let mut snapshot = SystemSnapshot::default();
        let walker = ProcessTreeWalker::new(&fs, &sampler);
        let processed = walker.walk(None, PROC, None, &mut snapshot);
        assert_eq!(processed, 1);
    }

    #[test]
    fn test_walk_failed_task_is_not_inserted() {
        let mut fs = MockFs::typical_system();
        fs.remove("/proc/1000/statm");
        fs.remove("/proc/1000/task/1000/statm");

        let sampler = sampler();
        let mut snapshot = SystemSnapshot::default();
        let walker = ProcessTreeWalker::new(&fs, &sampler);
        let processed = walker.walk(None, PROC, None, &mut snapshot);

        assert_eq!(processed, 4);
        assert!(snapshot.task(1000).is_none());
    }

    #[test]
    fn test_walk_missing_root() {
        let fs = MockFs::new();
        let sampler = sampler();
        let mut snapshot = SystemSnapshot::default();
        let walker = ProcessTreeWalker::new(&fs, &sampler);
        let processed = walker.walk(None, PROC, None, &mut snapshot);
        assert_eq!(processed, 0);
    }

    #[test]
    fn test_walk_task_directory_directly() {
        let fs = MockFs::typical_system();
        let sampler = sampler();
        let proc = fs.open_dir(None, "/proc/1200").unwrap();
        let mut snapshot = SystemSnapshot::default();
        let walker = ProcessTreeWalker::new(&fs, &sampler);
        let processed = walker.walk(Some(&proc), "task", Some(1200), &mut snapshot);

        assert_eq!(processed, 1);
        assert_eq!(pids(&snapshot), vec![1201]);
    }
}
