//! Deferred work for an [`crate::Editable`].
//!
//! Work that must wait for the host (change delivery, selection sync, IME
//! flushes) is queued as a [`Task`] and drained in class order, FIFO within
//! a class. Queuing a task that is already waiting is a no-op.

use std::collections::VecDeque;

use tracing::trace;

/// Drain priority, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskClass {
    UserOperation,
    HostSync,
    /// Runs only on the next host turn.
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    FlushDeferredOps,
    FlushIme,
    FinishComposition,
    FlushChanges,
    SyncSelectionToHost,
    UpdatePendingInsertionMarks,
    ClearUpdatingSelection,
}

impl Task {
    pub fn class(self) -> TaskClass {
        match self {
            Task::FlushDeferredOps => TaskClass::UserOperation,
            Task::FlushChanges | Task::SyncSelectionToHost => TaskClass::HostSync,
            Task::FlushIme
            | Task::FinishComposition
            | Task::UpdatePendingInsertionMarks
            | Task::ClearUpdatingSelection => TaskClass::Idle,
        }
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    user: VecDeque<Task>,
    host: VecDeque<Task>,
    idle: VecDeque<Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when `task` was already queued.
    pub fn schedule(&mut self, task: Task) -> bool {
        let queue = self.queue_mut(task.class());
        if queue.contains(&task) {
            return false;
        }
        trace!(?task, "schedule");
        queue.push_back(task);
        true
    }

    /// The next task by class priority. Idle tasks only when `include_idle`.
    pub fn next(&mut self, include_idle: bool) -> Option<Task> {
        self.user
            .pop_front()
            .or_else(|| self.host.pop_front())
            .or_else(|| include_idle.then(|| self.idle.pop_front()).flatten())
    }

    pub fn is_scheduled(&self, task: Task) -> bool {
        self.queue(task.class()).contains(&task)
    }

    pub fn has_work(&self, include_idle: bool) -> bool {
        !self.user.is_empty() || !self.host.is_empty() || (include_idle && !self.idle.is_empty())
    }

    pub fn len(&self) -> usize {
        self.user.len() + self.host.len() + self.idle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.user.clear();
        self.host.clear();
        self.idle.clear();
    }

    fn queue(&self, class: TaskClass) -> &VecDeque<Task> {
        match class {
            TaskClass::UserOperation => &self.user,
            TaskClass::HostSync => &self.host,
            TaskClass::Idle => &self.idle,
        }
    }

    fn queue_mut(&mut self, class: TaskClass) -> &mut VecDeque<Task> {
        match class {
            TaskClass::UserOperation => &mut self.user,
            TaskClass::HostSync => &mut self.host,
            TaskClass::Idle => &mut self.idle,
        }
    }
}
