// Intermediate artifact cleanup
//
// Pipeline stages register every file they create; cleanup removes them all
// and never fails the surrounding task. A walkdir sweep catches anything the
// trackers missed (crashed tasks, leftover yt-dlp fragments).

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::Result;

/// Collects temp file paths created during a task so they can be removed
/// together, whether the task succeeds or fails.
#[derive(Default)]
pub struct TempFileTracker {
    paths: Mutex<Vec<PathBuf>>,
}

impl TempFileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: AsRef<Path>>(&self, path: P) {
        self.paths.lock().unwrap().push(path.as_ref().to_path_buf());
    }

    /// Remove every registered file. Missing files are fine; removal errors
    /// are logged and swallowed. Safe to call more than once.
    pub async fn cleanup(&self) {
        let paths: Vec<PathBuf> = std::mem::take(&mut *self.paths.lock().unwrap());
        for path in paths {
            if !path.exists() {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed temp file {}", path.display()),
                Err(e) => warn!("Failed to remove temp file {}: {}", path.display(), e),
            }
        }
    }
}

/// Remove files in `dir` older than `max_age`. Returns how many were deleted.
pub fn sweep_stale(dir: &Path, max_age: Duration) -> Result<u64> {
    if !dir.exists() {
        return Ok(0);
    }

    // A retention larger than the clock can represent sweeps nothing
    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return Ok(0);
    };
    let mut removed = 0u64;

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
            Some(time) => time,
            None => continue,
        };
        if modified < cutoff {
            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    debug!("Swept stale file {}", entry.path().display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to sweep {}: {}", entry.path().display(), e),
            }
        }
    }

    Ok(removed)
}
