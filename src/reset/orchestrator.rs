//! Recurring due-check and the automatic reset pass.
//!
//! Every check interval the service asks [`evaluate_due`] whether the
//! scheduled reset has arrived. A reset fires in the due minute
//! (`reset_hour:00` on the scheduled date), or on the first check after a
//! missed one when catch-up is enabled. A missed slot is the latest one at or
//! before the check that no pass has covered yet. A completed pass is recorded in
//! `lastResetToday`, and nothing fires again within the following hour.

use std::time::Duration;

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use log::{debug, info, warn};

use crate::config::ResetConfig;
use crate::host::WorldHost;
use crate::reset::clock::{
    latest_slot_at_or_before, minute_start, next_reset_instant, SECONDS_PER_DAY,
};
use crate::reset::countdown::{RESETTING_MESSAGE, RESET_BANNER};
use crate::reset::sequence::WorldResetOutcome;
use crate::reset::timers::{Scheduler, Task};
use crate::service::FarmResetService;
use crate::storage::ScheduleState;

/// Seconds after a completed pass during which no new pass may start.
pub const DEBOUNCE_SECONDS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetPhase {
    #[default]
    Idle,
    Resetting,
}

/// Result of one due-check evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueDecision {
    NotDue,
    /// Inside the scheduled minute.
    Due,
    /// The scheduled instant passed unobserved; fire now.
    CatchUp,
    /// Due, but a pass completed less than an hour ago.
    Debounced,
    /// Due, but another reset is running; the next check retries.
    Deferred,
}

/// Per-farm results of an automatic pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub reset: Vec<String>,
    pub deferred: Vec<String>,
    pub failed: Vec<String>,
}

/// Decide whether the automatic reset should run at `now`.
///
/// `busy` is true while a manual session or another pass is active. Expects
/// a bootstrapped state (`last_reset != 0`).
pub fn evaluate_due<Z: TimeZone>(
    now: DateTime<Z>,
    state: &ScheduleState,
    config: &ResetConfig,
    busy: bool,
) -> DueDecision {
    let hour = config.reset_hour;
    let interval = config.reset_interval_days;

    let last_done = state.last_reset.max(state.last_reset_today);

    // Evaluate just before this minute so the scheduled instant itself is still upcoming
    let this_minute = minute_start(now.clone());
    let just_before = this_minute.clone() - chrono::Duration::seconds(1);
    let next = next_reset_instant(just_before, state.last_reset, hour, interval);
    let in_due_minute = next == this_minute;

    // Slots from before the bootstrap, or already covered by a pass, are not missed
    let missed = config.catch_up_missed
        && latest_slot_at_or_before(now.clone(), state.last_reset, hour, interval)
            .map(|slot| slot.timestamp())
            .is_some_and(|slot| slot > state.initialized_at && slot > last_done);

    if !in_due_minute && !missed {
        return DueDecision::NotDue;
    }

    if now.timestamp() - last_done < DEBOUNCE_SECONDS {
        return DueDecision::Debounced;
    }
    if busy {
        return DueDecision::Deferred;
    }
    if in_due_minute {
        DueDecision::Due
    } else {
        DueDecision::CatchUp
    }
}

impl<H: WorldHost> FarmResetService<H> {
    /// One due-check tick. Returns the report if a pass ran.
    pub fn check_and_reset(&mut self, now: DateTime<Tz>) -> Option<ResetReport> {
        if self.state.last_reset == 0 {
            let interval = i64::from(self.config.reset.reset_interval_days) * SECONDS_PER_DAY;
            self.state.last_reset = now.timestamp() - interval;
            self.state.initialized_at = now.timestamp();
            info!(
                "No previous reset recorded; schedule starts {} day(s) before now",
                self.config.reset.reset_interval_days
            );
            self.persist_state();
        }

        let busy = self.session.is_some() || self.phase == ResetPhase::Resetting;
        match evaluate_due(now, &self.state, &self.config.reset, busy) {
            DueDecision::NotDue => None,
            DueDecision::Debounced => {
                debug!("Reset already ran within the last hour, skipping");
                None
            }
            DueDecision::Deferred => {
                info!("Scheduled reset is due but another reset is running; retrying next check");
                None
            }
            DueDecision::Due => Some(self.perform_scheduled_reset(now)),
            DueDecision::CatchUp => {
                warn!("Scheduled reset was missed while offline; running it now");
                Some(self.perform_scheduled_reset(now))
            }
        }
    }

    /// Reset every registered farm, then record the pass.
    ///
    /// Farms are handled one after another; a failure only affects its own farm.
    pub fn perform_scheduled_reset(&mut self, now: DateTime<Tz>) -> ResetReport {
        info!("=== Automatic farm reset started ===");
        self.phase = ResetPhase::Resetting;

        let restart = self.config.reset.restart_after_reset;
        let restart_delay = self.config.reset.restart_delay_seconds;
        for player in self.host.online_players() {
            self.host.send_message(player, RESET_BANNER);
            self.host.send_message(player, RESETTING_MESSAGE);
            if restart {
                self.host.send_message(
                    player,
                    &format!("The server restarts in {} seconds...", restart_delay),
                );
            }
        }

        let farms: Vec<_> = self.farms.all().cloned().collect();
        if farms.is_empty() {
            warn!("No farms registered; nothing to reset");
        }

        let mut report = ResetReport::default();
        for farm in farms {
            match self.reset_farm_world(&farm) {
                Ok(WorldResetOutcome::Recreated) => report.reset.push(farm.name),
                Ok(WorldResetOutcome::Deferred) => report.deferred.push(farm.name),
                Err(e) => {
                    warn!(
                        "Skipping farm '{}' (world '{}'): {}",
                        farm.name,
                        farm.world(),
                        e
                    );
                    report.failed.push(farm.name);
                }
            }
        }

        self.state.last_reset = self.state.last_reset.max(now.timestamp());
        self.state.last_reset_today = now.timestamp();
        self.persist_state();
        self.phase = ResetPhase::Idle;

        info!(
            "=== Automatic farm reset finished: {} reset, {} deferred, {} failed ===",
            report.reset.len(),
            report.deferred.len(),
            report.failed.len()
        );

        if restart {
            self.timers
                .schedule_once(Duration::from_secs(restart_delay), Task::Restart);
        }
        report
    }
}
