//! The processor-specific half of the scheduler.

use crate::task::TaskEntry;

/// Processor hooks the kernel relies on.
///
/// # Safety
///
/// `enter_critical` must mask every interrupt source whose handler can call
/// into the kernel, and `yield_now` must save the running context, call
/// [`Kernel::switch_context`](crate::Kernel::switch_context) and resume the
/// context it returns.
pub unsafe trait Port: 'static {
    /// Masks interrupts and returns whether they were enabled before.
    fn enter_critical() -> bool;

    /// Undoes the matching [`Port::enter_critical`].
    fn exit_critical(was_enabled: bool);

    /// Requests a context switch from task context.
    ///
    /// May be called inside a critical section; the switch then happens
    /// immediately and the critical section is re-entered on resumption.
    fn yield_now();

    /// Builds the first context of a task below `top` and returns the
    /// saved stack pointer.
    ///
    /// # Safety
    ///
    /// `top` must be the exclusive end of a writable stack with room for a
    /// full context record.
    unsafe fn initialize_stack(top: usize, entry: TaskEntry, arg: usize) -> usize;

    /// Resumes the context saved at `sp`, never returning to the caller.
    fn start_first_task(sp: usize) -> !;

    /// Reports a task that ran past the base of its stack.
    fn stack_overflow(name: &str) -> !;

    /// Runs once per idle loop iteration.
    fn idle_hook() {}
}

/// Interrupt-masked section; restores the previous state when dropped.
///
/// Also used by drivers whose state is shared with their interrupt handler.
#[must_use]
pub struct InterruptGuard<P: Port> {
    was_enabled: bool,
    _port: core::marker::PhantomData<fn() -> P>,
}

impl<P: Port> InterruptGuard<P> {
    pub fn new() -> Self {
        Self {
            was_enabled: P::enter_critical(),
            _port: core::marker::PhantomData,
        }
    }
}

impl<P: Port> Drop for InterruptGuard<P> {
    fn drop(&mut self) {
        P::exit_critical(self.was_enabled);
    }
}
