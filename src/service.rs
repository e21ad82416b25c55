//! The farm reset service and its event loop.
//!
//! [`FarmResetService`] owns every piece of mutable state: the farm registry,
//! the persisted schedule, the timer queue, the orchestration phase and the
//! optional manual reset session. All work happens on one task, one callback
//! at a time, so none of it needs locking:
//!
//! - timer tasks (due-check, countdown marks, spawn retries, progress, restart)
//!   are popped from the [`TimerQueue`] and passed to [`FarmResetService::handle_task`];
//! - external requests arrive as [`ServiceCommand`]s over an unbounded channel.
//!
//! The reset behaviour itself lives in `crate::reset`; this module only wires
//! it to time and to the outside world.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::commands;
use crate::config::Config;
use crate::error::{FarmResetError, Result};
use crate::farm::{CornerSelection, FarmRecord, FarmRegistry};
use crate::host::{PlayerId, WorldHost};
use crate::progress;
use crate::reset::countdown::ManualResetSession;
use crate::reset::orchestrator::ResetPhase;
use crate::reset::timers::{Scheduler, Task, TaskId, TimerQueue};
use crate::storage::{ScheduleState, Storage};

/// Requests delivered to a running service.
#[derive(Debug)]
pub enum ServiceCommand {
    /// Start the 30 second countdown and reset of a farm.
    StartManualReset { farm: String },
    /// A player connected; show them the progress bar right away.
    PlayerJoined(PlayerId),
    /// A player typed a `/farm` command.
    PlayerCommand { player: PlayerId, line: String },
    /// Stop the event loop.
    Shutdown,
}

/// Why [`FarmResetService::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Shutdown,
    RestartRequested,
}

pub struct FarmResetService<H: WorldHost> {
    pub(crate) config: Config,
    pub(crate) tz: Tz,
    pub(crate) host: H,
    pub(crate) storage: Storage,
    pub(crate) farms: FarmRegistry,
    pub(crate) corners: CornerSelection,
    pub(crate) state: ScheduleState,
    pub(crate) timers: TimerQueue,
    pub(crate) phase: ResetPhase,
    pub(crate) session: Option<ManualResetSession>,
    pub(crate) spawn_retries: HashSet<String>,
    due_check: Option<TaskId>,
    progress_refresh: Option<TaskId>,
    restart_requested: bool,
    origin: Instant,
}

impl<H: WorldHost> FarmResetService<H> {
    /// Open storage under `config.storage.data_dir` and load farms and schedule state.
    ///
    /// An unreadable state file is logged and replaced by a fresh schedule in
    /// memory; an unreadable farm file is an error, since continuing would
    /// overwrite every registered farm on the next save.
    pub fn new(config: Config, host: H) -> Result<Self> {
        let tz = config
            .reset
            .tz()
            .map_err(|e| FarmResetError::InvalidConfig(e.to_string()))?;
        let storage = Storage::new(&config.storage.data_dir)?;
        let farms = storage.load_farms()?;
        let state = match storage.load_state() {
            Ok(state) => state,
            Err(e) => {
                error!("Could not load schedule state, starting fresh in memory: {}", e);
                ScheduleState::default()
            }
        };
        Ok(Self {
            config,
            tz,
            host,
            storage,
            farms,
            corners: CornerSelection::default(),
            state,
            timers: TimerQueue::new(),
            phase: ResetPhase::Idle,
            session: None,
            spawn_retries: HashSet::new(),
            due_check: None,
            progress_refresh: None,
            restart_requested: false,
            origin: Instant::now(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn farms(&self) -> &FarmRegistry {
        &self.farms
    }

    pub fn state(&self) -> &ScheduleState {
        &self.state
    }

    pub fn phase(&self) -> ResetPhase {
        self.phase
    }

    pub fn manual_session(&self) -> Option<&ManualResetSession> {
        self.session.as_ref()
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Current wall-clock time in the schedule timezone.
    pub fn local_now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    /// Next scheduled automatic reset as seen from `now`.
    pub fn next_reset(&self, now: DateTime<Tz>) -> DateTime<Tz> {
        crate::reset::clock::next_reset_instant(
            now,
            self.state.last_reset,
            self.config.reset.reset_hour,
            self.config.reset.reset_interval_days,
        )
    }

    /// Add or replace a farm and write the registry to disk.
    pub fn register_farm(&mut self, farm: FarmRecord) -> Result<()> {
        let name = farm.name.clone();
        let world = farm.world().to_string();
        if self.farms.insert(farm).is_some() {
            info!("Farm '{}' replaced (world '{}')", name, world);
        } else {
            info!("Farm '{}' created (world '{}')", name, world);
        }
        self.storage.save_farms(&self.farms)
    }

    /// Write the schedule state; failures are logged and the in-memory state stays authoritative.
    pub(crate) fn persist_state(&self) {
        if let Err(e) = self.storage.save_state(&self.state) {
            error!(
                "Could not persist schedule state to {}: {} (state kept in memory only)",
                self.storage.data_dir().display(),
                e
            );
        }
    }

    /// Recover interrupted spawns and arm the recurring due-check and progress refresh.
    pub fn startup(&mut self) {
        let pending = self.recover_pending_spawns(true);
        if pending > 0 {
            info!("{} farm(s) still waiting for spawn placement", pending);
        }

        let check = Duration::from_secs(self.config.reset.check_interval_seconds);
        self.due_check = Some(
            self.timers
                .schedule_repeating(Duration::ZERO, check, Task::DueCheck),
        );
        if self.config.progress.enabled {
            let refresh = Duration::from_secs(self.config.progress.refresh_seconds);
            self.progress_refresh = Some(self.timers.schedule_repeating(
                Duration::ZERO,
                refresh,
                Task::RefreshProgress,
            ));
        }
        info!(
            "Farm reset service started: {} farm(s), reset every {} day(s) at {:02}:00 ({})",
            self.farms.len(),
            self.config.reset.reset_interval_days,
            self.config.reset.reset_hour,
            self.tz
        );
    }

    /// Cancel recurring work and any countdown, and hide the progress bar.
    pub fn shutdown(&mut self) {
        if let Some(id) = self.due_check.take() {
            self.timers.cancel(id);
        }
        if let Some(id) = self.progress_refresh.take() {
            self.timers.cancel(id);
            for player in self.host.online_players() {
                self.host.hide_progress(player);
            }
        }
        if let Some(session) = self.session.take() {
            warn!(
                "Manual reset of farm '{}' cancelled by shutdown",
                session.farm.name
            );
            for id in session.timers {
                self.timers.cancel(id);
            }
        }
        info!("Farm reset service stopped");
    }

    /// Dispatch one fired timer task.
    pub fn handle_task(&mut self, task: Task, now: DateTime<Tz>) {
        match task {
            Task::DueCheck => {
                self.recover_pending_spawns(false);
                self.check_and_reset(now);
            }
            Task::RefreshProgress => self.refresh_progress(now, None),
            Task::Countdown { farm, remaining } => self.on_countdown(&farm, remaining),
            Task::ManualReset { farm } => self.finish_manual_reset(&farm),
            Task::SpawnRetry { farm } => self.retry_spawn(&farm),
            Task::Restart => {
                self.host.request_restart();
                self.restart_requested = true;
            }
        }
    }

    /// Fire every timer due at `elapsed` (time since the service was created).
    pub fn run_due_tasks(&mut self, elapsed: Duration, now: DateTime<Tz>) -> usize {
        let mut fired = 0;
        while let Some(task) = self.timers.pop_due(elapsed) {
            self.handle_task(task, now);
            fired += 1;
        }
        fired
    }

    /// Handle one external request.
    pub fn handle_command(&mut self, command: ServiceCommand, now: DateTime<Tz>) {
        match command {
            ServiceCommand::StartManualReset { farm } => {
                if let Err(e) = self.start_manual_reset(&farm, now) {
                    warn!("Manual reset of farm '{}' rejected: {}", farm, e);
                }
            }
            ServiceCommand::PlayerJoined(player) => {
                if self.config.progress.enabled {
                    self.refresh_progress(now, Some(player));
                }
            }
            ServiceCommand::PlayerCommand { player, line } => {
                let Some(cmd) = commands::parse(&line) else {
                    debug!("Ignoring non-farm command from {}: {}", player, line);
                    return;
                };
                for reply in self.handle_farm_command(player, cmd, now) {
                    self.host.send_message(player, &reply);
                }
            }
            ServiceCommand::Shutdown => {}
        }
    }

    fn refresh_progress(&mut self, now: DateTime<Tz>, only: Option<PlayerId>) {
        let view = progress::render(
            now,
            self.state.last_reset,
            self.config.reset.reset_hour,
            self.config.reset.reset_interval_days,
        );
        let players = match only {
            Some(player) => vec![player],
            None => self.host.online_players(),
        };
        for player in players {
            self.host.show_progress(player, &view);
        }
    }

    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    fn pump(&mut self) {
        let elapsed = self.elapsed();
        let now = self.local_now();
        self.run_due_tasks(elapsed, now);
    }

    async fn wait_for_next_timer(&self) {
        match self.timers.next_due() {
            Some(due) => tokio::time::sleep_until(self.origin + due).await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Run the service until shutdown, Ctrl+C or a restart request.
    pub async fn run(
        &mut self,
        mut commands: mpsc::UnboundedReceiver<ServiceCommand>,
    ) -> Result<RunOutcome> {
        self.startup();
        let mut commands_open = true;

        loop {
            self.pump();
            if self.restart_requested {
                self.shutdown();
                return Ok(RunOutcome::RestartRequested);
            }

            tokio::select! {
                _ = self.wait_for_next_timer() => {}

                cmd = commands.recv(), if commands_open => {
                    match cmd {
                        Some(ServiceCommand::Shutdown) => {
                            info!("Shutdown requested");
                            break;
                        }
                        Some(cmd) => {
                            // Delays scheduled by the command count from now, not from the last tick
                            self.timers.advance(self.elapsed());
                            let now = self.local_now();
                            self.handle_command(cmd, now);
                        }
                        None => {
                            debug!("Command channel closed; continuing on timers only");
                            commands_open = false;
                        }
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown();
        Ok(RunOutcome::Shutdown)
    }

    /// Run a manual reset of `farm` to completion without the recurring schedule.
    pub async fn run_manual_reset(&mut self, farm: &str) -> Result<()> {
        self.timers.advance(self.elapsed());
        let now = self.local_now();
        self.start_manual_reset(farm, now)?;
        while self.session.is_some() {
            if self.timers.next_due().is_none() {
                break;
            }
            self.wait_for_next_timer().await;
            self.pump();
        }
        Ok(())
    }
}
