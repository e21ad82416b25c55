//! Delayed and repeating work for the reset service.
//!
//! Every timer carries a typed [`Task`] instead of a closure, so firing a
//! timer is just handing the task back to the service that owns all state.
//! Deadlines are measured as elapsed time since the queue was created; the
//! async driver maps them onto `tokio::time::Instant`, tests simply pass
//! elapsed durations in.
//!
//! Design Notes:
//! * Vec + linear scan, the queue never holds more than a dozen entries.
//! * Ties on the same deadline fire in scheduling order (by id).
//! * Repeating entries re-arm at a fixed rate from their previous deadline.

use std::time::Duration;

use log::debug;

/// Work a timer hands back when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Recurring check whether the automatic reset is due.
    DueCheck,
    /// Recurring refresh of the progress display.
    RefreshProgress,
    /// Manual countdown mark with `remaining` seconds left.
    Countdown { farm: String, remaining: u32 },
    /// End of a manual countdown: reset the farm world now.
    ManualReset { farm: String },
    /// Delayed second attempt to place a farm's spawn after a restart.
    SpawnRetry { farm: String },
    /// Ask the host to restart after an automatic reset.
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Scheduling capability used by the reset logic.
pub trait Scheduler {
    /// Run `task` once after `delay`.
    fn schedule_once(&mut self, delay: Duration, task: Task) -> TaskId;

    /// Run `task` after `initial_delay` and then every `interval`.
    fn schedule_repeating(&mut self, initial_delay: Duration, interval: Duration, task: Task)
        -> TaskId;

    /// Cancel a pending timer. Returns false if it already fired or never existed.
    fn cancel(&mut self, id: TaskId) -> bool;
}

#[derive(Debug)]
struct TimerEntry {
    id: TaskId,
    due: Duration,
    period: Option<Duration>,
    task: Task,
}

/// Timer queue keyed on elapsed time since creation.
#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: Vec<TimerEntry>,
    next_id: u64,
    now: Duration,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed time the queue was last advanced to.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Move the clock forward without firing anything; never moves backwards.
    pub fn advance(&mut self, now: Duration) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Deadline of the earliest pending timer.
    pub fn next_due(&self) -> Option<Duration> {
        self.entries.iter().map(|e| e.due).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Advance the clock to `now` and pop the earliest timer that is due.
    ///
    /// Call repeatedly until it returns `None`; timers scheduled while
    /// handling a popped task are relative to `now` and are picked up by the
    /// same loop if they are already due.
    pub fn pop_due(&mut self, now: Duration) -> Option<Task> {
        self.advance(now);
        let pos = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= self.now)
            .min_by(|(_, a), (_, b)| a.due.cmp(&b.due).then(a.id.cmp(&b.id)))
            .map(|(i, _)| i)?;

        let entry = self.entries.remove(pos);
        if let Some(period) = entry.period {
            self.entries.push(TimerEntry {
                id: entry.id,
                due: entry.due + period,
                period: entry.period,
                task: entry.task.clone(),
            });
        }
        debug!("timer {:?} fired at {:?}: {:?}", entry.id, self.now, entry.task);
        Some(entry.task)
    }

    /// Pop every timer due at `now`, in firing order.
    pub fn drain_due(&mut self, now: Duration) -> Vec<Task> {
        let mut fired = Vec::new();
        while let Some(task) = self.pop_due(now) {
            fired.push(task);
        }
        fired
    }

    fn push(&mut self, delay: Duration, period: Option<Duration>, task: Task) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.entries.push(TimerEntry {
            id,
            due: self.now + delay,
            period,
            task,
        });
        id
    }
}

impl Scheduler for TimerQueue {
    fn schedule_once(&mut self, delay: Duration, task: Task) -> TaskId {
        self.push(delay, None, task)
    }

    fn schedule_repeating(
        &mut self,
        initial_delay: Duration,
        interval: Duration,
        task: Task,
    ) -> TaskId {
        // A zero period would re-fire forever inside a single pop loop
        let interval = interval.max(Duration::from_millis(1));
        self.push(initial_delay, Some(interval), task)
    }

    fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn one_shots_fire_in_deadline_order() {
        let mut q = TimerQueue::new();
        q.schedule_once(secs(5), Task::Restart);
        q.schedule_once(secs(1), Task::DueCheck);
        q.schedule_once(secs(1), Task::RefreshProgress);
        assert_eq!(q.next_due(), Some(secs(1)));
        assert!(q.pop_due(Duration::from_millis(999)).is_none());
        assert_eq!(
            q.drain_due(secs(1)),
            vec![Task::DueCheck, Task::RefreshProgress]
        );
        assert_eq!(q.drain_due(secs(10)), vec![Task::Restart]);
        assert!(q.is_empty());
    }

    #[test]
    fn late_pop_keeps_original_order() {
        let mut q = TimerQueue::new();
        q.schedule_once(secs(3), Task::ManualReset { farm: "a".into() });
        q.schedule_once(secs(2), Task::Countdown { farm: "a".into(), remaining: 1 });
        let fired = q.drain_due(secs(30));
        assert_eq!(
            fired,
            vec![
                Task::Countdown { farm: "a".into(), remaining: 1 },
                Task::ManualReset { farm: "a".into() },
            ]
        );
    }

    #[test]
    fn repeating_rearms_at_fixed_rate() {
        let mut q = TimerQueue::new();
        let id = q.schedule_repeating(secs(0), secs(60), Task::DueCheck);
        assert_eq!(q.drain_due(secs(0)), vec![Task::DueCheck]);
        assert_eq!(q.next_due(), Some(secs(60)));
        // A late wake-up fires each missed period once, then catches up
        assert_eq!(q.drain_due(secs(125)).len(), 2);
        assert_eq!(q.next_due(), Some(secs(180)));
        assert!(q.cancel(id));
        assert!(!q.cancel(id));
        assert!(q.drain_due(secs(1000)).is_empty());
    }

    #[test]
    fn delays_are_relative_to_last_advance() {
        let mut q = TimerQueue::new();
        q.drain_due(secs(100));
        let id = q.schedule_once(secs(5), Task::SpawnRetry { farm: "b".into() });
        assert!(q.is_pending(id));
        assert_eq!(q.next_due(), Some(secs(105)));
    }
}
