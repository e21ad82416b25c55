//! Headless host backed by a directory of world folders.
//!
//! Used when farmreset runs next to a stopped (or restarting) game server:
//! every subdirectory of `worlds_dir` holding a `level.json` marker counts as
//! a loaded world. There are never any live players, so evacuation and
//! messaging are no-ops, and a restart request is only recorded so the binary
//! can exit and let its supervisor relaunch the server.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{HostError, PlayerId, WorldHost};
use crate::farm::Location;
use crate::progress::ProgressView;
use crate::storage::write_file_locked;

const LEVEL_FILE: &str = "level.json";

/// Marker file written into every world folder this host creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn: Option<Location>,
}

pub struct DirectoryHost {
    worlds_dir: PathBuf,
    default_world: String,
    loaded: BTreeSet<String>,
    restart_requested: bool,
}

impl DirectoryHost {
    /// Open `worlds_dir`, creating it if needed, and load every world folder in it.
    pub fn open(worlds_dir: impl Into<PathBuf>, default_world: &str) -> Result<Self, HostError> {
        let worlds_dir = worlds_dir.into();
        fs::create_dir_all(&worlds_dir)?;
        let mut loaded = BTreeSet::new();
        for entry in fs::read_dir(&worlds_dir)? {
            let entry = entry?;
            if entry.path().join(LEVEL_FILE).is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    loaded.insert(name.to_string());
                }
            }
        }
        info!(
            "Directory host opened {} with {} world(s)",
            worlds_dir.display(),
            loaded.len()
        );
        Ok(Self {
            worlds_dir,
            default_world: default_world.to_string(),
            loaded,
            restart_requested: false,
        })
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    pub fn loaded_worlds(&self) -> impl Iterator<Item = &str> {
        self.loaded.iter().map(String::as_str)
    }

    /// Read the marker file of a world folder.
    pub fn level_info(&self, world: &str) -> Result<LevelInfo, HostError> {
        let path = self.level_path(world);
        let data = match fs::read_to_string(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(HostError::WorldNotLoaded(world.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(data.trim_start_matches('\0')).map_err(|e| {
            HostError::Io(std::io::Error::new(
                ErrorKind::InvalidData,
                format!("{}: {}", path.display(), e),
            ))
        })
    }

    fn level_path(&self, world: &str) -> PathBuf {
        self.worlds_dir.join(world).join(LEVEL_FILE)
    }

    fn write_level(&self, info: &LevelInfo) -> Result<(), HostError> {
        let content = serde_json::to_string_pretty(info)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        write_file_locked(&self.level_path(&info.name), &content)?;
        Ok(())
    }
}

fn is_plain_name(world: &str) -> bool {
    !world.is_empty()
        && Path::new(world).components().count() == 1
        && !world.starts_with('.')
        && !world.contains(['/', '\\'])
}

impl WorldHost for DirectoryHost {
    fn is_world_loaded(&self, world: &str) -> bool {
        self.loaded.contains(world)
    }

    fn default_world(&self) -> Option<String> {
        self.loaded
            .contains(&self.default_world)
            .then(|| self.default_world.clone())
    }

    fn online_players(&self) -> Vec<PlayerId> {
        Vec::new()
    }

    fn players_in_world(&self, _world: &str) -> Vec<PlayerId> {
        Vec::new()
    }

    fn player_location(&self, _player: PlayerId) -> Option<Location> {
        None
    }

    fn send_message(&mut self, _player: PlayerId, _message: &str) {}

    fn teleport_to_spawn(&mut self, player: PlayerId, _world: &str) -> Result<(), HostError> {
        Err(HostError::PlayerOffline(player))
    }

    fn kick(&mut self, _player: PlayerId, _reason: &str) {}

    fn unload_world(&mut self, world: &str, _save: bool) -> Result<(), HostError> {
        if !self.loaded.remove(world) {
            return Err(HostError::WorldNotLoaded(world.to_string()));
        }
        debug!("Unloaded world '{}'", world);
        Ok(())
    }

    fn world_folder(&self, world: &str) -> Option<PathBuf> {
        is_plain_name(world).then(|| self.worlds_dir.join(world))
    }

    fn create_world(&mut self, world: &str) -> Result<(), HostError> {
        if !is_plain_name(world) {
            return Err(HostError::CreateFailed {
                world: world.to_string(),
                reason: "world name is not a plain directory name".into(),
            });
        }
        fs::create_dir_all(self.worlds_dir.join(world))?;
        self.write_level(&LevelInfo {
            name: world.to_string(),
            created_at: Utc::now(),
            spawn: None,
        })?;
        self.loaded.insert(world.to_string());
        info!("Created world '{}'", world);
        Ok(())
    }

    fn highest_block_y(&self, _world: &str, _x: f64, _z: f64) -> Option<f64> {
        None
    }

    fn set_spawn(&mut self, world: &str, spawn: &Location) -> Result<(), HostError> {
        if !self.loaded.contains(world) {
            return Err(HostError::WorldNotLoaded(world.to_string()));
        }
        let mut info = self.level_info(world)?;
        info.spawn = Some(spawn.clone());
        self.write_level(&info)
    }

    fn show_progress(&mut self, _player: PlayerId, _view: &ProgressView) {}

    fn hide_progress(&mut self, _player: PlayerId) {}

    fn request_restart(&mut self) {
        info!("Restart requested");
        self.restart_requested = true;
    }
}
