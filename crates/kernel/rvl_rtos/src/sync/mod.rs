//! Blocking synchronization objects.
//!
//! Every object borrows the [`Kernel`](crate::Kernel) it schedules on, so
//! it can be a `static` next to a `static` kernel. Task-context operations
//! may block; `*_from_isr` operations never do and report wakeups through
//! a [`Woken`](crate::Woken) flag.

pub use self::{
    mutex::{Mutex, MutexGuard, RawMutex},
    semaphore::Semaphore,
};

mod mutex;
mod semaphore;
