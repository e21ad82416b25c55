//! Operator-triggered reset with a 30 second countdown.
//!
//! Starting a session schedules one timer per countdown mark plus one for the
//! reset itself, all relative to the moment the session starts. Players in
//! the farm world see the remaining seconds; at [`KICK_MARK`] they are moved
//! out and disconnected so nobody is inside when the world is deleted.

use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use log::{debug, info, warn};

use crate::error::{FarmResetError, Result};
use crate::farm::FarmRecord;
use crate::host::WorldHost;
use crate::reset::orchestrator::ResetPhase;
use crate::reset::sequence::{WorldResetOutcome, KICK_REASON};
use crate::reset::timers::{Scheduler, Task, TaskId};
use crate::service::FarmResetService;

pub const COUNTDOWN_SECONDS: u32 = 30;
/// Seconds remaining at which players are told the countdown.
pub const COUNTDOWN_MARKS: [u32; 8] = [30, 20, 10, 5, 4, 3, 2, 1];
/// Remaining seconds at which players are evacuated and kicked.
pub const KICK_MARK: u32 = 3;

pub const RESET_BANNER: &str = "=== FARM RESET ===";
pub const RESETTING_MESSAGE: &str = "The farm world is being reset...";

/// The one manual reset that may be running.
#[derive(Debug, Clone)]
pub struct ManualResetSession {
    pub farm: FarmRecord,
    pub started_at: DateTime<Tz>,
    pub(crate) timers: Vec<TaskId>,
}

impl<H: WorldHost> FarmResetService<H> {
    /// Begin the countdown for `farm_name`.
    ///
    /// Fails without changing anything if a session is already running, the
    /// farm is unknown, or its world is not loaded.
    pub fn start_manual_reset(&mut self, farm_name: &str, now: DateTime<Tz>) -> Result<()> {
        if let Some(active) = &self.session {
            return Err(FarmResetError::AlreadyInProgress(active.farm.name.clone()));
        }
        let farm = self
            .farms
            .get(farm_name)
            .cloned()
            .ok_or_else(|| FarmResetError::FarmNotFound(farm_name.to_string()))?;
        let world = farm.world().to_string();
        if !self.host.is_world_loaded(&world) {
            return Err(FarmResetError::WorldNotFound {
                farm: farm.name,
                world,
            });
        }

        self.broadcast_world(&world, RESET_BANNER);
        self.broadcast_world(&world, &format!("{} seconds until reset", COUNTDOWN_SECONDS));

        let mut timers = Vec::with_capacity(COUNTDOWN_MARKS.len() + 1);
        for remaining in COUNTDOWN_MARKS {
            let delay = Duration::from_secs(u64::from(COUNTDOWN_SECONDS - remaining));
            timers.push(self.timers.schedule_once(
                delay,
                Task::Countdown {
                    farm: farm.name.clone(),
                    remaining,
                },
            ));
        }
        timers.push(self.timers.schedule_once(
            Duration::from_secs(u64::from(COUNTDOWN_SECONDS)),
            Task::ManualReset {
                farm: farm.name.clone(),
            },
        ));

        info!(
            "Manual reset of farm '{}' (world '{}') starts in {} seconds",
            farm.name, world, COUNTDOWN_SECONDS
        );
        self.session = Some(ManualResetSession {
            farm,
            started_at: now,
            timers,
        });
        Ok(())
    }

    pub(crate) fn on_countdown(&mut self, farm_name: &str, remaining: u32) {
        let Some(world) = self.session_world(farm_name) else {
            debug!("Countdown mark {} for '{}' has no session", remaining, farm_name);
            return;
        };
        if !self.host.is_world_loaded(&world) {
            return;
        }
        self.broadcast_world(&world, &remaining.to_string());
        if remaining == KICK_MARK {
            let kicked = self.evacuate_world(&world, Some(KICK_REASON));
            if kicked > 0 {
                info!("Kicked {} player(s) from '{}' before reset", kicked, world);
            }
        }
    }

    pub(crate) fn finish_manual_reset(&mut self, farm_name: &str) {
        if self.session_world(farm_name).is_none() {
            debug!("Manual reset of '{}' fired without a session", farm_name);
            return;
        }
        let Some(session) = self.session.take() else {
            return;
        };
        let farm = session.farm;
        let world = farm.world().to_string();
        info!("Running manual reset of farm '{}'", farm.name);
        if self.host.is_world_loaded(&world) {
            self.broadcast_world(&world, RESET_BANNER);
            self.broadcast_world(&world, RESETTING_MESSAGE);
        }

        self.phase = ResetPhase::Resetting;
        match self.reset_farm_world(&farm) {
            Ok(WorldResetOutcome::Recreated) => {
                info!("Manual reset of farm '{}' finished", farm.name)
            }
            Ok(WorldResetOutcome::Deferred) => info!(
                "Manual reset of farm '{}' finished, spawn placement pending",
                farm.name
            ),
            Err(e) => warn!("Manual reset of farm '{}' failed: {}", farm.name, e),
        }
        self.phase = ResetPhase::Idle;
    }

    fn session_world(&self, farm_name: &str) -> Option<String> {
        self.session
            .as_ref()
            .filter(|s| s.farm.name == farm_name)
            .map(|s| s.farm.world().to_string())
    }

    pub(crate) fn broadcast_world(&mut self, world: &str, message: &str) {
        for player in self.host.players_in_world(world) {
            self.host.send_message(player, message);
        }
    }
}
