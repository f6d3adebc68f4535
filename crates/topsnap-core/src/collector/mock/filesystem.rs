//! In-memory mock filesystem for testing collectors without real `/proc`.
//!
//! This module provides `MockFs` which simulates a filesystem in memory,
//! allowing tests to run on any platform and to mutate the tree between
//! collection cycles.

use crate::collector::traits::{DirEntry, EntryKind, FileSystem};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};

/// In-memory filesystem for testing.
///
/// Stores files and directories in memory, allowing tests to simulate
/// various `/proc` and `/sys` states without needing actual Linux access.
/// Directory handles are the virtual paths of the opened directories.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: BTreeMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: BTreeSet<PathBuf>,
    /// Directories listed with an unknown entry type.
    unknown_kind: HashSet<PathBuf>,
    /// Paths whose reads fail with a permission error.
    unreadable: HashSet<PathBuf>,
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("file not found: {:?}", path),
    )
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }

    /// Adds a file with the given content, replacing any previous content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    /// Adds a directory that listings report with an unknown entry type.
    pub fn add_dir_unknown_kind(&mut self, path: impl AsRef<Path>) {
        self.add_dir(&path);
        self.unknown_kind.insert(path.as_ref().to_path_buf());
    }

    /// Makes reads of `path` fail with `PermissionDenied`.
    pub fn deny_read(&mut self, path: impl AsRef<Path>) {
        self.unreadable.insert(path.as_ref().to_path_buf());
    }

    /// Removes a file, or a directory together with everything beneath it.
    pub fn remove(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.files.retain(|p, _| !p.starts_with(path));
        self.directories.retain(|p| !p.starts_with(path));
        self.unknown_kind.retain(|p| !p.starts_with(path));
    }

    /// Adds a task directory with its `stat`, `statm` and `io` files.
    ///
    /// An empty `io` leaves the file out, as for tasks owned by other users.
    pub fn add_task(&mut self, dir: impl AsRef<Path>, stat: &str, statm: &str, io: &str) {
        let base = dir.as_ref().to_path_buf();
        self.add_dir(&base);
        self.add_file(base.join("stat"), stat);
        self.add_file(base.join("statm"), statm);
        if !io.is_empty() {
            self.add_file(base.join("io"), io);
        }
    }

    /// Adds `/proc/[pid]` plus its main thread under `/proc/[pid]/task/[pid]`.
    pub fn add_process(&mut self, pid: u32, stat: &str, statm: &str, io: &str) {
        self.add_task(format!("/proc/{}", pid), stat, statm, io);
        self.add_task(format!("/proc/{}/task/{}", pid, pid), stat, statm, io);
    }

    /// Adds a secondary thread `/proc/[pid]/task/[tid]`.
    pub fn add_thread(&mut self, pid: u32, tid: u32, stat: &str, statm: &str, io: &str) {
        self.add_task(format!("/proc/{}/task/{}", pid, tid), stat, statm, io);
    }

    /// Adds a `cpu<id>` device directory, with an `online` file when given.
    pub fn add_cpu(&mut self, sysfs: &str, id: u32, online: Option<&str>) {
        let dir = PathBuf::from(format!("{}/cpu{}", sysfs, id));
        self.add_dir(&dir);
        if let Some(online) = online {
            self.add_file(dir.join("online"), online);
        }
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        if self.unreadable.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {:?}", path),
            ));
        }
        self.files.get(path).cloned().ok_or_else(|| not_found(path))
    }

    fn resolve(&self, parent: Option<&PathBuf>, name: &str) -> io::Result<PathBuf> {
        let path = match parent {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        };
        if self.directories.contains(&path) && !self.unreadable.contains(&path) {
            Ok(path)
        } else {
            Err(not_found(&path))
        }
    }
}

impl FileSystem for MockFs {
    type Dir = PathBuf;

    fn open_dir(&self, parent: Option<&PathBuf>, name: &str) -> io::Result<PathBuf> {
        self.resolve(parent, name)
    }

    fn open_dir_path(&self, parent: Option<&PathBuf>, name: &str) -> io::Result<PathBuf> {
        self.resolve(parent, name)
    }

    fn read_dir(&self, dir: &PathBuf) -> io::Result<Vec<DirEntry>> {
        if !self.directories.contains(dir) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", dir),
            ));
        }

        let child_name = |path: &PathBuf| -> Option<String> {
            if path.parent() != Some(dir.as_path()) {
                return None;
            }
            path.file_name().map(|n| n.to_string_lossy().into_owned())
        };

        let mut entries = Vec::new();
        for dir_path in &self.directories {
            if let Some(name) = child_name(dir_path) {
                let kind = if self.unknown_kind.contains(dir_path) {
                    EntryKind::Unknown
                } else {
                    EntryKind::Dir
                };
                entries.push(DirEntry::new(name, kind));
            }
        }
        for file_path in self.files.keys() {
            if let Some(name) = child_name(file_path) {
                entries.push(DirEntry::new(name, EntryKind::File));
            }
        }

        Ok(entries)
    }

    fn read_to_string_at(&self, dir: &PathBuf, name: &str) -> io::Result<String> {
        self.read_file(&dir.join(name))
    }

    fn read_to_string(&self, path: &str) -> io::Result<String> {
        self.read_file(Path::new(path))
    }
}
