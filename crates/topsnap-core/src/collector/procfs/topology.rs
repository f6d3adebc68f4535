//! CPU topology discovery from `/sys/devices/system/cpu`.

use std::io;

use tracing::{debug, error, warn};

use crate::collector::procfs::parser::{is_online, parse_cpu_dir_name};
use crate::collector::procfs::process::CollectError;
use crate::collector::traits::FileSystem;
use crate::model::{CpuSlot, SystemSnapshot};

/// Keeps the snapshot's CPU slots in line with the CPU device tree.
pub struct CpuTopologyTracker {
    sysfs_path: String,
}

impl CpuTopologyTracker {
    /// Creates a tracker reading `cpu<N>` entries from `sysfs_path`.
    pub fn new(sysfs_path: impl Into<String>) -> Self {
        Self {
            sysfs_path: sysfs_path.into(),
        }
    }

    /// Rescans the CPU device directory.
    ///
    /// Sizes `snapshot.cpus` so that every discovered CPU id has a slot
    /// (slot 0 being the aggregate), refreshes each slot's online flag and
    /// updates the existing/active counts. Ids may have gaps; slots for
    /// missing ids stay offline. When the directory cannot be read the
    /// snapshot is left untouched.
    pub fn update_cpu_count<F: FileSystem>(
        &self,
        fs: &F,
        snapshot: &mut SystemSnapshot,
    ) -> Result<(), CollectError> {
        let entries = fs
            .open_dir(None, &self.sysfs_path)
            .and_then(|dir| fs.read_dir(&dir).map(|entries| (dir, entries)));
        let (dir, entries) = match entries {
            Ok(found) => found,
            Err(e) => {
                error!(path = %self.sysfs_path, error = %e, "cannot read CPU device directory");
                return Err(CollectError::io(&self.sysfs_path, e));
            }
        };

        if snapshot.cpus.is_empty() {
            snapshot.cpus.push(CpuSlot {
                online: true,
                ..Default::default()
            });
        }

        let mut existing: u32 = 0;
        let mut active: u32 = 0;
        let mut slots_needed = 1;

        for entry in entries {
            if !entry.kind.may_be_dir() {
                continue;
            }
            let Some(id) = parse_cpu_dir_name(&entry.name) else {
                continue;
            };
            let cpu_dir = match fs.open_dir_path(Some(&dir), &entry.name) {
                Ok(cpu_dir) => cpu_dir,
                Err(e) => {
                    debug!(cpu = id, error = %e, "skipping CPU directory");
                    continue;
                }
            };
            existing += 1;

            let slot = id as usize + 1;
            slots_needed = slots_needed.max(slot + 1).max(existing as usize + 1);
            if snapshot.cpus.len() < slots_needed {
                snapshot.cpus.resize_with(slots_needed, CpuSlot::default);
            }

            // CPUs that cannot be hot-plugged (usually cpu0) have no `online` file.
            let online = match fs.read_to_string_at(&cpu_dir, "online") {
                Ok(content) => is_online(&content),
                Err(e) if e.kind() == io::ErrorKind::NotFound => true,
                Err(e) => {
                    debug!(cpu = id, error = %e, "cannot read online state");
                    false
                }
            };
            snapshot.cpus[slot].online = online;
            if online {
                active += 1;
            }
        }

        if existing == 0 {
            warn!(path = %self.sysfs_path, "no CPU devices found");
            return Ok(());
        }

        snapshot.cpus.truncate(slots_needed);
        snapshot.cpus[0].online = true;
        snapshot.existing_cpus = existing;
        snapshot.active_cpus = active;
        debug!(existing, active, slots = snapshot.cpus.len(), "CPU topology updated");
        Ok(())
    }
}
