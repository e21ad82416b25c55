//! # Storage Module - State and Farm Persistence
//!
//! Two JSON documents live under the configured data directory:
//!
//! ```text
//! data/
//! ├── state.json   ← schedule state and the restart-recovery queue
//! └── farms.json   ← registered farms (spawn + two corners each)
//! ```
//!
//! Writes go through [`write_file_locked`]: an exclusive `fs2` lock on the
//! destination, a temp file in the same directory, fsync, then an atomic
//! rename. A crash mid-write leaves either the old or the new document on
//! disk, never a torn one.
//!
//! Missing files load as empty defaults so a fresh install needs no seeding.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{FarmResetError, Result};
use crate::farm::{FarmRecord, FarmRegistry};

const STATE_FILE: &str = "state.json";
const FARMS_FILE: &str = "farms.json";

/// Persisted schedule bookkeeping.
///
/// Field names match the keys operators already know from older installs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleState {
    /// Epoch seconds of the last completed automatic reset, 0 if never.
    #[serde(default)]
    pub last_reset: i64,
    /// Epoch seconds at which the last automatic pass finished (debounce key).
    #[serde(default)]
    pub last_reset_today: i64,
    /// Epoch seconds at which the schedule was first bootstrapped.
    #[serde(default)]
    pub initialized_at: i64,
    /// Farms whose spawn still has to be placed after a restart.
    #[serde(default)]
    pub farms_to_set_spawn_after_restart: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FarmsDocument {
    #[serde(default)]
    farms: BTreeMap<String, FarmRecord>,
}

/// File-backed persistence rooted at a data directory.
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    /// Open (and create if needed) the data directory.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|e| {
            FarmResetError::Persistence(format!(
                "failed to create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn load_state(&self) -> Result<ScheduleState> {
        Ok(read_json(&self.data_dir.join(STATE_FILE))?.unwrap_or_default())
    }

    pub fn save_state(&self, state: &ScheduleState) -> Result<()> {
        let content = serde_json::to_string_pretty(state)?;
        write_file_locked(&self.data_dir.join(STATE_FILE), &content)?;
        debug!(
            "Saved schedule state (lastReset={}, pending spawns={})",
            state.last_reset,
            state.farms_to_set_spawn_after_restart.len()
        );
        Ok(())
    }

    pub fn load_farms(&self) -> Result<FarmRegistry> {
        let doc: FarmsDocument = read_json(&self.data_dir.join(FARMS_FILE))?.unwrap_or_default();
        let registry = FarmRegistry::from_records(doc.farms.into_iter().map(|(name, mut farm)| {
            farm.name = name;
            farm
        }));
        info!("Loaded {} farm(s)", registry.len());
        Ok(registry)
    }

    pub fn save_farms(&self, registry: &FarmRegistry) -> Result<()> {
        let doc = FarmsDocument {
            farms: registry
                .all()
                .map(|f| (f.name.clone(), f.clone()))
                .collect(),
        };
        let content = serde_json::to_string_pretty(&doc)?;
        write_file_locked(&self.data_dir.join(FARMS_FILE), &content)?;
        Ok(())
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path) {
        Ok(data) => {
            // Guard against any accidental leading NULs
            let cleaned = data.trim_start_matches('\0');
            if cleaned.trim().is_empty() {
                return Ok(None);
            }
            let value = serde_json::from_str(cleaned).map_err(|e| {
                FarmResetError::Persistence(format!("failed to parse {}: {}", path.display(), e))
            })?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FarmResetError::Persistence(format!(
            "failed reading {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Atomically replace `path` with `content` while holding an exclusive lock on it.
pub(crate) fn write_file_locked(path: &Path, content: &str) -> io::Result<()> {
    let guard = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)?;
    guard.lock_exclusive()?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let (tmp_path, tmp) = create_sibling_temp(dir, path)?;
    let swapped = write_synced(tmp, content).and_then(|()| fs::rename(&tmp_path, path));
    if let Err(e) = swapped {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    // Not every platform can sync a directory handle
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }
    Ok(())
}

fn write_synced(mut file: File, content: &str) -> io::Result<()> {
    file.write_all(content.as_bytes())?;
    file.sync_all()
}

/// Create a fresh hidden file next to `target`, e.g. `.state.json.4211.0.tmp`.
fn create_sibling_temp(dir: &Path, target: &Path) -> io::Result<(PathBuf, File)> {
    let name = target.file_name().and_then(|s| s.to_str()).unwrap_or("data");
    let pid = std::process::id();
    for attempt in 0..u32::MAX {
        let candidate = dir.join(format!(".{}.{}.{}.tmp", name, pid, attempt));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(ErrorKind::AlreadyExists, "no free temp file name"))
}
