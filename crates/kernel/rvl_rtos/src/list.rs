use arrayvec::ArrayVec;
use rvl_params::MAX_TASKS;

use crate::task::TaskHandle;

/// FIFO of tasks sharing one priority.
#[derive(Debug)]
pub(crate) struct TaskQueue {
    tasks: ArrayVec<TaskHandle, MAX_TASKS>,
}

impl TaskQueue {
    pub(crate) const fn new() -> Self {
        Self {
            tasks: ArrayVec::new_const(),
        }
    }

    pub(crate) fn push_back(&mut self, task: TaskHandle) {
        debug_assert!(!self.tasks.contains(&task));
        // every live task fits, a queue can never overflow.
        self.tasks.push(task);
    }

    pub(crate) fn pop_front(&mut self) -> Option<TaskHandle> {
        if self.tasks.is_empty() {
            return None;
        }
        Some(self.tasks.remove(0))
    }

    pub(crate) fn remove(&mut self, task: TaskHandle) -> bool {
        if let Some(pos) = self.tasks.iter().position(|t| *t == task) {
            self.tasks.remove(pos);
            return true;
        }
        false
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Tasks sleeping until an absolute tick, earliest first.
#[derive(Debug)]
pub(crate) struct DelayList {
    entries: ArrayVec<(u64, TaskHandle), MAX_TASKS>,
}

impl DelayList {
    pub(crate) const fn new() -> Self {
        Self {
            entries: ArrayVec::new_const(),
        }
    }

    /// Inserts after every entry waking at or before `wake_at`.
    pub(crate) fn insert(&mut self, wake_at: u64, task: TaskHandle) {
        self.remove(task);
        let pos = self
            .entries
            .iter()
            .position(|(at, _)| *at > wake_at)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, (wake_at, task));
    }

    pub(crate) fn remove(&mut self, task: TaskHandle) {
        self.entries.retain(|(_, t)| *t != task);
    }

    /// Removes and returns the first task due at `now`.
    pub(crate) fn pop_expired(&mut self, now: u64) -> Option<TaskHandle> {
        match self.entries.first() {
            Some((at, _)) if *at <= now => Some(self.entries.remove(0).1),
            _ => None,
        }
    }
}

/// Tasks blocked on one synchronization object, in arrival order.
///
/// The kernel picks the highest priority entry when waking, so priority
/// changes while blocked are honoured. Entries are removed by the waker or,
/// after a timeout, by the waiter itself once it runs again.
#[derive(Debug)]
pub(crate) struct WaitList {
    waiters: ArrayVec<TaskHandle, MAX_TASKS>,
}

impl WaitList {
    pub(crate) const fn new() -> Self {
        Self {
            waiters: ArrayVec::new_const(),
        }
    }

    pub(crate) fn push(&mut self, task: TaskHandle) {
        if !self.waiters.contains(&task) {
            self.waiters.push(task);
        }
    }

    pub(crate) fn remove(&mut self, task: TaskHandle) {
        self.waiters.retain(|t| *t != task);
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(TaskHandle) -> bool) {
        self.waiters.retain(|t| keep(*t));
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = TaskHandle> + '_ {
        self.waiters.iter().copied()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}
