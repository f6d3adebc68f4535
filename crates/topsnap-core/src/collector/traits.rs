//! Abstractions for filesystem and clock access to enable testing and mocking.
//!
//! The `FileSystem` trait works on directory handles rather than full paths:
//! every task directory is opened relative to its parent's handle and every
//! pseudo-file relative to its task directory. On Linux this maps onto
//! `openat(2)`, which keeps the walk consistent while `/proc` mutates underneath
//! it. `MockFs` implements the same trait over an in-memory tree.

use std::io;

use chrono::{DateTime, Utc};

/// Type of a directory entry as reported by the directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
    Other,
    /// The filesystem did not report a type (`DT_UNKNOWN`).
    Unknown,
}

impl EntryKind {
    /// Whether the entry may be a directory. Unknown entries are given the benefit of the doubt.
    pub fn may_be_dir(self) -> bool {
        matches!(self, EntryKind::Dir | EntryKind::Unknown)
    }
}

/// One entry of a directory listing. `.` and `..` are never reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Abstraction for filesystem operations.
///
/// This trait allows collectors to read from the real `/proc` and `/sys` trees
/// or from a mock implementation for testing purposes.
pub trait FileSystem {
    /// Open directory handle. Dropping it releases any underlying resource.
    type Dir;

    /// Opens a directory for listing, relative to `parent` when given.
    ///
    /// Symbolic links are not followed.
    fn open_dir(&self, parent: Option<&Self::Dir>, name: &str) -> io::Result<Self::Dir>;

    /// Opens a directory as a path-only handle, relative to `parent` when given.
    ///
    /// The handle can only be used to open files beneath it, not to list it.
    fn open_dir_path(&self, parent: Option<&Self::Dir>, name: &str) -> io::Result<Self::Dir>;

    /// Lists the entries of a directory opened with [`FileSystem::open_dir`].
    fn read_dir(&self, dir: &Self::Dir) -> io::Result<Vec<DirEntry>>;

    /// Reads a file located directly beneath `dir`.
    fn read_to_string_at(&self, dir: &Self::Dir, name: &str) -> io::Result<String>;

    /// Reads a file by path.
    fn read_to_string(&self, path: &str) -> io::Result<String>;
}

/// Source of wall-clock time for timestamping cycles.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system's real time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(target_os = "linux")]
pub use real::{RealDir, RealFs};

#[cfg(target_os = "linux")]
mod real {
    use std::ffi::{CStr, CString};
    use std::fs::File;
    use std::io::{self, Read};
    use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd};

    use super::{DirEntry, EntryKind, FileSystem};

    /// Real filesystem implementation over `openat(2)`.
    ///
    /// Use this in production to read from the actual `/proc` and `/sys` trees.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct RealFs;

    impl RealFs {
        /// Creates a new `RealFs` instance.
        pub fn new() -> Self {
            Self
        }
    }

    /// Directory handle owning its file descriptor.
    #[derive(Debug)]
    pub struct RealDir {
        fd: OwnedFd,
    }

    fn c_name(name: &str) -> io::Result<CString> {
        CString::new(name).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path contains a NUL byte: {:?}", name),
            )
        })
    }

    fn openat(parent: Option<&RealDir>, name: &str, flags: libc::c_int) -> io::Result<OwnedFd> {
        let name = c_name(name)?;
        let dirfd = parent.map_or(libc::AT_FDCWD, |dir| dir.fd.as_raw_fd());
        loop {
            // SAFETY: `name` is NUL-terminated and `dirfd` is either AT_FDCWD or
            // a descriptor kept open by the borrowed `RealDir`.
            let fd = unsafe { libc::openat(dirfd, name.as_ptr(), flags | libc::O_CLOEXEC) };
            if fd >= 0 {
                // SAFETY: `fd` was just returned by openat and is owned by nobody else.
                return Ok(unsafe { OwnedFd::from_raw_fd(fd) });
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// `DIR*` stream closed on drop.
    struct DirStream(*mut libc::DIR);

    impl Drop for DirStream {
        fn drop(&mut self) {
            // SAFETY: the pointer came from a successful fdopendir and is closed once.
            unsafe {
                libc::closedir(self.0);
            }
        }
    }

    fn entry_kind(d_type: u8) -> EntryKind {
        match d_type {
            libc::DT_DIR => EntryKind::Dir,
            libc::DT_REG => EntryKind::File,
            libc::DT_UNKNOWN => EntryKind::Unknown,
            _ => EntryKind::Other,
        }
    }

    impl FileSystem for RealFs {
        type Dir = RealDir;

        fn open_dir(&self, parent: Option<&RealDir>, name: &str) -> io::Result<RealDir> {
            let flags = libc::O_RDONLY | libc::O_DIRECTORY | libc::O_NOFOLLOW;
            openat(parent, name, flags).map(|fd| RealDir { fd })
        }

        fn open_dir_path(&self, parent: Option<&RealDir>, name: &str) -> io::Result<RealDir> {
            let flags = libc::O_PATH | libc::O_DIRECTORY | libc::O_NOFOLLOW;
            openat(parent, name, flags).map(|fd| RealDir { fd })
        }

        fn read_dir(&self, dir: &RealDir) -> io::Result<Vec<DirEntry>> {
            // fdopendir takes ownership of the descriptor, so hand it a duplicate
            // and keep the caller's handle valid.
            let dup = dir.fd.try_clone()?;
            let raw = dup.into_raw_fd();
            // SAFETY: `raw` is a valid descriptor we own; on success the stream owns it.
            let stream = unsafe { libc::fdopendir(raw) };
            if stream.is_null() {
                let err = io::Error::last_os_error();
                // SAFETY: fdopendir failed, so `raw` is still ours to close.
                drop(unsafe { OwnedFd::from_raw_fd(raw) });
                return Err(err);
            }
            let stream = DirStream(stream);
            // The duplicate shares its offset with the caller's handle, which
            // an earlier listing left at the end.
            // SAFETY: `stream.0` is a live DIR*.
            unsafe { libc::rewinddir(stream.0) };

            let mut entries = Vec::new();
            loop {
                // SAFETY: `stream.0` is a live DIR* for the duration of the loop.
                let entry = unsafe { libc::readdir(stream.0) };
                if entry.is_null() {
                    break;
                }
                // SAFETY: readdir returned a valid dirent whose d_name is NUL-terminated.
                let (name, d_type) = unsafe {
                    let entry = &*entry;
                    (CStr::from_ptr(entry.d_name.as_ptr()), entry.d_type)
                };
                let name = name.to_string_lossy();
                if name == "." || name == ".." {
                    continue;
                }
                entries.push(DirEntry::new(name.into_owned(), entry_kind(d_type)));
            }
            Ok(entries)
        }

        fn read_to_string_at(&self, dir: &RealDir, name: &str) -> io::Result<String> {
            let fd = openat(Some(dir), name, libc::O_RDONLY | libc::O_NOFOLLOW)?;
            let mut content = String::new();
            // read_to_string retries reads interrupted by signals.
            File::from(fd).read_to_string(&mut content)?;
            Ok(content)
        }

        fn read_to_string(&self, path: &str) -> io::Result<String> {
            std::fs::read_to_string(path)
        }
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use std::fs;

    fn names(mut entries: Vec<DirEntry>) -> Vec<String> {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.into_iter().map(|e| e.name).collect()
    }

    #[test]
    fn test_real_fs_relative_reads() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("42/task/43")).unwrap();
        fs::write(tmp.path().join("42/statm"), "1 2 3 4 0 5 0\n").unwrap();
        fs::write(tmp.path().join("42/task/43/statm"), "6 7 8 9 0 10 0\n").unwrap();

        let real = RealFs::new();
        let root = real.open_dir(None, tmp.path().to_str().unwrap()).unwrap();
        let proc_dir = real.open_dir(Some(&root), "42").unwrap();
        assert_eq!(
            real.read_to_string_at(&proc_dir, "statm").unwrap(),
            "1 2 3 4 0 5 0\n"
        );

        let task_dir = real.open_dir(Some(&proc_dir), "task").unwrap();
        let thread_dir = real.open_dir(Some(&task_dir), "43").unwrap();
        assert_eq!(
            real.read_to_string_at(&thread_dir, "statm").unwrap(),
            "6 7 8 9 0 10 0\n"
        );
    }

    #[test]
    fn test_real_fs_read_dir_reports_kinds() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("cpu0")).unwrap();
        fs::write(tmp.path().join("online"), "0-3\n").unwrap();

        let real = RealFs::new();
        let dir = real.open_dir(None, tmp.path().to_str().unwrap()).unwrap();
        let entries = real.read_dir(&dir).unwrap();

        assert_eq!(names(entries.clone()), vec!["cpu0", "online"]);
        let cpu0 = entries.iter().find(|e| e.name == "cpu0").unwrap();
        assert!(cpu0.kind.may_be_dir());
        // The handle stays usable after listing.
        assert_eq!(real.read_to_string_at(&dir, "online").unwrap(), "0-3\n");
    }

    #[test]
    fn test_real_fs_lists_same_handle_twice() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("cpu0")).unwrap();
        fs::create_dir(tmp.path().join("cpu1")).unwrap();

        let real = RealFs::new();
        let dir = real.open_dir(None, tmp.path().to_str().unwrap()).unwrap();
        let first = names(real.read_dir(&dir).unwrap());
        let second = names(real.read_dir(&dir).unwrap());

        assert_eq!(first, vec!["cpu0", "cpu1"]);
        assert_eq!(second, first);
    }

    #[test]
    fn test_real_fs_path_handle_reads_child_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("cpu1")).unwrap();
        fs::write(tmp.path().join("cpu1/online"), "0\n").unwrap();

        let real = RealFs::new();
        let root = real.open_dir(None, tmp.path().to_str().unwrap()).unwrap();
        let cpu = real.open_dir_path(Some(&root), "cpu1").unwrap();
        assert_eq!(real.read_to_string_at(&cpu, "online").unwrap(), "0\n");
    }

    #[test]
    fn test_real_fs_does_not_follow_symlinks() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("target")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("target"), tmp.path().join("link")).unwrap();

        let real = RealFs::new();
        let root = real.open_dir(None, tmp.path().to_str().unwrap()).unwrap();
        assert!(real.open_dir(Some(&root), "link").is_err());
        assert!(real.open_dir(Some(&root), "target").is_ok());
    }

    #[test]
    fn test_real_fs_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let real = RealFs::new();
        let root = real.open_dir(None, tmp.path().to_str().unwrap()).unwrap();
        let err = real.read_to_string_at(&root, "io").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
