//! Tearing down and recreating a single farm world.
//!
//! Shared by the automatic pass, the manual countdown and restart recovery.
//! Steps run strictly in order for one farm at a time:
//!
//! 1. make sure the world is loaded
//! 2. move every player in it to the fallback world
//! 3. unload it without saving
//! 4. delete its directory
//! 5. create a fresh world under the same name
//! 6. place the saved spawn, or queue that for later if creation failed

use std::io::ErrorKind;

use log::{debug, info, warn};

use crate::error::{FarmResetError, Result};
use crate::farm::{FarmRecord, Location};
use crate::host::WorldHost;
use crate::service::FarmResetService;

pub const EVACUATED_MESSAGE: &str = "You were teleported out of the reset world!";
pub const KICK_REASON: &str = "FarmReset\nTry again in 1 minute";

/// How a world reset ended for one farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldResetOutcome {
    /// New world created and spawn placed.
    Recreated,
    /// Old world is gone; spawn placement is waiting in the recovery queue.
    Deferred,
}

impl<H: WorldHost> FarmResetService<H> {
    /// Reset the world of `farm`.
    ///
    /// Returns an error only when the old world could not be located or
    /// unloaded; nothing has been deleted in that case. A failed re-creation
    /// is not an error: the farm is queued for spawn placement and
    /// [`WorldResetOutcome::Deferred`] is returned.
    pub fn reset_farm_world(&mut self, farm: &FarmRecord) -> Result<WorldResetOutcome> {
        let world = farm.world().to_string();
        if !self.host.is_world_loaded(&world) {
            return Err(FarmResetError::WorldNotFound {
                farm: farm.name.clone(),
                world,
            });
        }

        let moved = self.evacuate_world(&world, None);
        debug!("Evacuated {} player(s) from '{}'", moved, world);

        let folder = self.host.world_folder(&world);
        self.host.unload_world(&world, false)?;

        match folder {
            Some(folder) => match std::fs::remove_dir_all(&folder) {
                Ok(()) => debug!("Deleted world directory {}", folder.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(
                    "Could not delete directory {} of farm '{}': {}",
                    folder.display(),
                    farm.name,
                    e
                ),
            },
            None => warn!(
                "Host reported no directory for world '{}' (farm '{}'); recreating in place",
                world, farm.name
            ),
        }

        if let Err(e) = self.host.create_world(&world) {
            let err = FarmResetError::WorldCreateFailed {
                world: world.clone(),
                reason: e.to_string(),
            };
            warn!("Farm '{}': {}; spawn placement deferred", farm.name, err);
            self.enqueue_spawn_fix(&farm.name);
            return Ok(WorldResetOutcome::Deferred);
        }

        match self.apply_spawn(farm) {
            Ok(spawn) => {
                info!(
                    "Farm '{}' reset, spawn at {} in '{}'",
                    farm.name,
                    spawn.describe(),
                    world
                );
                Ok(WorldResetOutcome::Recreated)
            }
            Err(e) => {
                warn!(
                    "Farm '{}' recreated but spawn could not be set: {}; deferred",
                    farm.name, e
                );
                self.enqueue_spawn_fix(&farm.name);
                Ok(WorldResetOutcome::Deferred)
            }
        }
    }

    /// Move every player out of `world` to the fallback world's spawn.
    ///
    /// With `kick_reason` set, each player is disconnected afterwards.
    /// Returns how many players were handled.
    pub fn evacuate_world(&mut self, world: &str, kick_reason: Option<&str>) -> usize {
        let fallback = self.host.default_world().filter(|w| w != world);
        let players = self.host.players_in_world(world);
        if fallback.is_none() && !players.is_empty() {
            warn!(
                "No fallback world to evacuate {} player(s) from '{}'",
                players.len(),
                world
            );
        }

        for &player in &players {
            if let Some(target) = fallback.as_deref() {
                match self.host.teleport_to_spawn(player, target) {
                    Ok(()) => self.host.send_message(player, EVACUATED_MESSAGE),
                    Err(e) => warn!("Could not move {} out of '{}': {}", player, world, e),
                }
            }
            if let Some(reason) = kick_reason {
                self.host.kick(player, reason);
            }
        }
        players.len()
    }

    /// Set the live spawn of the farm's world to the saved spawn.
    ///
    /// A saved Y below 0 is replaced by one block above the highest solid
    /// block at that column. The farm record itself is left untouched.
    pub fn apply_spawn(&mut self, farm: &FarmRecord) -> Result<Location> {
        let mut spawn = farm.spawn.clone();
        if spawn.y < 0.0 {
            let surface = self
                .host
                .highest_block_y(&spawn.world, spawn.x, spawn.z)
                .map(|y| y + 1.0)
                .unwrap_or(0.0);
            spawn.y = surface.max(0.0);
        }
        self.host.set_spawn(&spawn.world, &spawn)?;
        Ok(spawn)
    }
}
