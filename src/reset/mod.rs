//! Farm reset logic.
//!
//! - [`clock`]: when the next scheduled reset is due
//! - [`timers`]: typed one-shot and repeating timers
//! - [`sequence`]: tearing down and recreating one farm world
//! - [`recovery`]: spawn placement left over from an interrupted reset
//! - [`countdown`]: operator-triggered reset with a 30 second countdown
//! - [`orchestrator`]: the recurring due-check and the automatic pass

pub mod clock;
pub mod countdown;
pub mod orchestrator;
pub mod recovery;
pub mod sequence;
pub mod timers;

pub use countdown::{ManualResetSession, COUNTDOWN_MARKS, COUNTDOWN_SECONDS, KICK_MARK};
pub use orchestrator::{evaluate_due, DueDecision, ResetPhase, ResetReport};
pub use recovery::SPAWN_RETRY_DELAY;
pub use sequence::WorldResetOutcome;
pub use timers::{Scheduler, Task, TaskId, TimerQueue};
