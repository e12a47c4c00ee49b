//! Preemptive priority scheduler for a single core.
//!
//! Tasks have fixed priorities `0..MAX_PRIORITIES`; the highest priority
//! ready task always runs and equal priorities share the CPU round-robin on
//! every tick. Blocking objects, notifications and deferred calls are built
//! on one critical-section discipline: the processor port masks interrupts,
//! and that is the only lock the kernel needs.
//!
//! The kernel never touches hardware itself. Everything processor-specific
//! goes through [`Port`].

#![cfg_attr(not(any(test, feature = "sim")), no_std)]

extern crate alloc;

pub use self::{
    deferred::DeferredFn,
    error::RtosError,
    kernel::{Kernel, MAX_DELAY, SchedulerState},
    notify::NotifyAction,
    port::{InterruptGuard, Port},
    sync::{Mutex, MutexGuard, RawMutex, Semaphore},
    task::{TaskEntry, TaskHandle, TaskName, TaskState, WaitKind},
    woken::Woken,
};

mod deferred;
mod error;
mod kernel;
mod list;
mod notify;
mod port;
pub mod sync;
mod task;
mod woken;

#[cfg(any(test, feature = "sim"))]
pub mod sim;
