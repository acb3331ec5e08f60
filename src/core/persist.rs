/// Whole-document durable writes shared by the memory and lore stores.
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Result of a persisting mutation. Persistence failures never abort the
/// caller; they degrade to in-memory state for that single update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Written and synced to disk before returning.
    Durable,
    /// The store has no backing file.
    Volatile,
    /// Both the write and its retry failed; the change lives in memory only.
    Degraded,
}

impl WriteOutcome {
    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Durable)
    }
}

/// Write `contents` to `path` through a sibling temp file, `sync_all`, then
/// rename over the target, so a crash leaves either the old or new document.
pub fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

/// Write with exactly one retry. A second failure is logged and reported as
/// [`WriteOutcome::Degraded`].
pub fn write_with_retry(path: &Path, contents: &str) -> WriteOutcome {
    match write_atomically(path, contents) {
        Ok(()) => WriteOutcome::Durable,
        Err(first) => {
            debug!("write to {} failed ({}), retrying once", path.display(), first);
            match write_atomically(path, contents) {
                Ok(()) => WriteOutcome::Durable,
                Err(second) => {
                    warn!(
                        "could not persist {}: {}; continuing with in-memory state",
                        path.display(),
                        second
                    );
                    WriteOutcome::Degraded
                }
            }
        }
    }
}

/// Move an unreadable document aside so it can be inspected later.
pub fn quarantine(path: &Path) {
    let mut target = path.as_os_str().to_owned();
    target.push(".corrupt");
    if let Err(e) = fs::rename(path, PathBuf::from(&target)) {
        warn!("could not quarantine {}: {}", path.display(), e);
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
