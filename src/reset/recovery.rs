//! Restart recovery queue.
//!
//! A farm lands here when its old world was deleted but the new one could not
//! be given its spawn yet, usually because creation failed or the process
//! stopped in between. The queue lives in `state.json` under
//! `farmsToSetSpawnAfterRestart` and is written after every change.

use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{FarmResetError, Result};
use crate::host::WorldHost;
use crate::reset::timers::{Scheduler, Task};
use crate::service::FarmResetService;

/// Delay before the single retry of a farm whose world could not be created.
pub const SPAWN_RETRY_DELAY: Duration = Duration::from_secs(5);

impl<H: WorldHost> FarmResetService<H> {
    /// Farms still waiting for spawn placement, in queue order.
    pub fn pending_spawn_fixes(&self) -> &[String] {
        &self.state.farms_to_set_spawn_after_restart
    }

    /// Queue `farm` for spawn placement. Adding a queued name is a no-op.
    pub fn enqueue_spawn_fix(&mut self, farm: &str) {
        let queue = &mut self.state.farms_to_set_spawn_after_restart;
        if queue.iter().any(|name| name == farm) {
            return;
        }
        queue.push(farm.to_string());
        info!("Farm '{}' queued for spawn placement", farm);
        self.persist_state();
    }

    pub(crate) fn complete_spawn_fix(&mut self, farm: &str) {
        let queue = &mut self.state.farms_to_set_spawn_after_restart;
        let before = queue.len();
        queue.retain(|name| name != farm);
        if queue.len() != before {
            self.persist_state();
        }
    }

    /// Try to place the spawn of every queued farm.
    ///
    /// With `arm_retry`, a farm whose world still cannot be created gets one
    /// retry after [`SPAWN_RETRY_DELAY`]. Returns how many farms are still
    /// queued afterwards.
    pub fn recover_pending_spawns(&mut self, arm_retry: bool) -> usize {
        let queued = self.state.farms_to_set_spawn_after_restart.clone();
        for name in queued {
            match self.try_place_spawn(&name) {
                Ok(()) => {}
                Err(FarmResetError::FarmNotFound(_)) => {
                    warn!("Queued farm '{}' is no longer registered; dropping it", name);
                    self.complete_spawn_fix(&name);
                }
                Err(e) => {
                    warn!("Spawn placement for farm '{}' failed: {}", name, e);
                    if arm_retry && self.spawn_retries.insert(name.clone()) {
                        self.timers
                            .schedule_once(SPAWN_RETRY_DELAY, Task::SpawnRetry { farm: name });
                    }
                }
            }
        }
        self.state.farms_to_set_spawn_after_restart.len()
    }

    /// Second attempt for one farm; it stays queued if this fails too.
    pub(crate) fn retry_spawn(&mut self, farm: &str) {
        self.spawn_retries.remove(farm);
        if !self.pending_spawn_fixes().iter().any(|name| name == farm) {
            debug!("Spawn retry for '{}' skipped, no longer queued", farm);
            return;
        }
        if let Err(e) = self.try_place_spawn(farm) {
            warn!(
                "Retry of spawn placement for farm '{}' failed: {} (left queued)",
                farm, e
            );
        }
    }

    /// Create the world if needed, set its spawn, and dequeue the farm.
    fn try_place_spawn(&mut self, name: &str) -> Result<()> {
        let farm = self
            .farms
            .get(name)
            .cloned()
            .ok_or_else(|| FarmResetError::FarmNotFound(name.to_string()))?;
        let world = farm.world().to_string();

        if !self.host.is_world_loaded(&world) {
            self.host
                .create_world(&world)
                .map_err(|e| FarmResetError::WorldCreateFailed {
                    world: world.clone(),
                    reason: e.to_string(),
                })?;
            info!("Recreated world '{}' for farm '{}'", world, name);
        }

        let spawn = self.apply_spawn(&farm)?;
        info!(
            "Spawn of farm '{}' set to {} after restart",
            name,
            spawn.describe()
        );
        self.complete_spawn_fix(name);
        Ok(())
    }
}
