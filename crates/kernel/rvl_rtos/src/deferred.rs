//! Function calls deferred to the timer service task.
//!
//! An interrupt handler that has more work than it should do with
//! interrupts disabled queues a call here; the timer service task runs it
//! at [`TIMER_TASK_PRIORITY`](rvl_params::TIMER_TASK_PRIORITY).

use crate::{
    error::RtosError,
    kernel::{Kernel, KernelState, MAX_DELAY},
    notify::NotifyAction,
    port::Port,
    woken::Woken,
};

/// Deferred function. Receives the two arguments given when it was queued.
pub type DeferredFn = fn(usize, u32);

#[derive(Clone, Copy)]
pub(crate) struct DeferredCall {
    pub(crate) func: DeferredFn,
    pub(crate) arg: usize,
    pub(crate) value: u32,
}

impl KernelState {
    fn pend(&mut self, call: DeferredCall) -> Result<bool, RtosError> {
        self.deferred
            .try_push(call)
            .map_err(|_| RtosError::QueueFull)?;
        match self.timer_task {
            Some(timer) => self.notify(timer, NotifyAction::Increment),
            // runs once the scheduler starts.
            None => Ok(false),
        }
    }

    pub(crate) fn pop_deferred(&mut self) -> Option<DeferredCall> {
        if self.deferred.is_empty() {
            return None;
        }
        Some(self.deferred.remove(0))
    }
}

impl<P: Port> Kernel<P> {
    /// Queues `func(arg, value)` for the timer service task.
    pub fn pend_call(&self, func: DeferredFn, arg: usize, value: u32) -> Result<(), RtosError> {
        let preempt = self.with_state(|st| st.pend(DeferredCall { func, arg, value }))?;
        Self::yield_if(preempt);
        Ok(())
    }

    pub fn pend_call_from_isr(
        &self,
        func: DeferredFn,
        arg: usize,
        value: u32,
        woken: &mut Woken,
    ) -> Result<(), RtosError> {
        woken.merge(self.with_state(|st| st.pend(DeferredCall { func, arg, value }))?);
        Ok(())
    }

    /// Runs every queued call. Returns how many ran.
    pub(crate) fn run_deferred(&self) -> usize {
        let mut count = 0;
        while let Some(call) = self.with_state(KernelState::pop_deferred) {
            (call.func)(call.arg, call.value);
            count += 1;
        }
        count
    }

    pub(crate) fn timer_service(&self) -> ! {
        loop {
            self.run_deferred();
            self.notify_take(true, MAX_DELAY);
        }
    }
}
