use alloc::{boxed::Box, vec};
use core::{fmt, ptr::NonNull, slice};

use arrayvec::ArrayString;
use rvl_params::{MAX_TASK_NAME_LEN, STACK_FILL_BYTE};

/// Entry point of a task. Receives the argument given at creation.
pub type TaskEntry = extern "C" fn(usize);

pub type TaskName = ArrayString<MAX_TASK_NAME_LEN>;

/// Identifies a task.
///
/// A handle outlives its task; operations on a deleted task fail with
/// [`RtosError::InvalidTask`](crate::RtosError::InvalidTask) because the
/// slot generation no longer matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    index: u8,
    generation: u16,
}

impl TaskHandle {
    pub(crate) const fn new(index: u8, generation: u16) -> Self {
        Self { index, generation }
    }

    pub(crate) const fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) const fn generation(self) -> u16 {
        self.generation
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}.{}", self.index, self.generation)
    }
}

/// What a blocked task is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    /// A semaphore or mutex.
    Object,
    /// A task notification.
    Notification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Ready,
    /// Sleeping in `delay` or `delay_until`.
    Delayed,
    Blocked(WaitKind),
    Suspended,
    /// Deleted itself; the idle task releases its stack.
    Deleted,
}

impl TaskState {
    pub(crate) fn is_waiting(self) -> bool {
        matches!(self, Self::Delayed | Self::Blocked(_))
    }
}

/// Why a blocked task became ready again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    Pending,
    Event,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NotifyState {
    NotWaiting,
    Waiting,
    Received,
}

pub(crate) struct TaskStack {
    base: NonNull<u8>,
    len: usize,
    owned: bool,
}

impl TaskStack {
    pub(crate) fn from_static(stack: &'static mut [u8]) -> Self {
        stack.fill(STACK_FILL_BYTE);
        let len = stack.len();
        Self {
            base: NonNull::from(stack).cast(),
            len,
            owned: false,
        }
    }

    pub(crate) fn allocate(len: usize) -> Self {
        let stack = Box::leak(vec![STACK_FILL_BYTE; len].into_boxed_slice());
        Self {
            base: NonNull::from(stack).cast(),
            len,
            owned: true,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn base(&self) -> usize {
        self.base.as_ptr().addr()
    }

    pub(crate) fn top(&self) -> usize {
        self.base() + self.len
    }

    /// Bytes at the bottom of the stack never written since creation.
    pub(crate) fn high_water_mark(&self) -> usize {
        let bytes = unsafe { slice::from_raw_parts(self.base.as_ptr(), self.len) };
        bytes.iter().take_while(|b| **b == STACK_FILL_BYTE).count()
    }
}

impl Drop for TaskStack {
    fn drop(&mut self) {
        if self.owned {
            let stack = NonNull::slice_from_raw_parts(self.base, self.len);
            drop(unsafe { Box::from_raw(stack.as_ptr()) });
        }
    }
}

/// Task control block.
pub(crate) struct Tcb {
    pub(crate) name: TaskName,
    pub(crate) priority: usize,
    /// Priority before any inheritance.
    pub(crate) base_priority: usize,
    pub(crate) mutexes_held: usize,
    pub(crate) state: TaskState,
    pub(crate) wake: Wake,
    pub(crate) saved_sp: usize,
    pub(crate) stack: TaskStack,
    pub(crate) notify_value: u32,
    pub(crate) notify_state: NotifyState,
}

impl Tcb {
    pub(crate) fn new(name: &str, priority: usize, stack: TaskStack, saved_sp: usize) -> Self {
        Self {
            name: truncate_name(name),
            priority,
            base_priority: priority,
            mutexes_held: 0,
            // not runnable until the kernel queues it
            state: TaskState::Suspended,
            wake: Wake::Pending,
            saved_sp,
            stack,
            notify_value: 0,
            notify_state: NotifyState::NotWaiting,
        }
    }
}

fn truncate_name(name: &str) -> TaskName {
    let mut out = TaskName::new();
    for ch in name.chars() {
        if out.try_push(ch).is_err() {
            break;
        }
    }
    out
}
