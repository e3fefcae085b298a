use serde::{Deserialize, Serialize};

/// What a deferred task does when it fires. Tasks re-validate game state at
/// fire time (the queue can outlive the situation that scheduled them), so
/// each kind carries no payload beyond its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// Debounced ungrounding after leaving a platform.
    ClearGrounded,
    /// Unfreeze the player and return to Playing after the respawn grace.
    EndRespawnGrace,
    /// Auto-revert a duck to standing.
    StandUpFromDuck,
    /// Enter LevelComplete once the chest's open sequence has played out.
    CompleteLevel,
    /// Initial resting-ground check shortly after a run starts.
    ConfirmInitialGround,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Simulation-clock time at which the task fires.
    pub due: f32,
    pub kind: TaskKind,
}

/// One-shot deferred task queue, polled once per tick from the main update.
/// Replaces external timer callbacks so that cancellation on level reset is
/// a single `clear` and everything stays on the one simulation thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskQueue {
    tasks: Vec<ScheduledTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: f32, kind: TaskKind) {
        self.tasks.push(ScheduledTask { due, kind });
    }

    /// Cancel and replace any pending task of the same kind. Used where a
    /// new event supersedes an old timer (re-duck, a fresh respawn).
    pub fn reschedule(&mut self, due: f32, kind: TaskKind) {
        self.cancel(kind);
        self.schedule(due, kind);
    }

    /// Remove every pending task of the given kind.
    pub fn cancel(&mut self, kind: TaskKind) {
        self.tasks.retain(|t| t.kind != kind);
    }

    /// Drop everything. Level reset calls this so no timer from a previous
    /// run can fire into the new one.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Remove and return all tasks due at or before `now`, ordered by due
    /// time (ties keep insertion order).
    pub fn poll(&mut self, now: f32) -> Vec<ScheduledTask> {
        let mut due: Vec<ScheduledTask> = Vec::new();
        self.tasks.retain(|t| {
            if t.due <= now {
                due.push(*t);
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.due.total_cmp(&b.due));
        due
    }

    pub fn is_scheduled(&self, kind: TaskKind) -> bool {
        self.tasks.iter().any(|t| t.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
