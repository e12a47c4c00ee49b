use core::cell::UnsafeCell;

use crate::{
    error::RtosError,
    kernel::{Kernel, KernelState, Waitable},
    list::WaitList,
    port::Port,
    task::TaskHandle,
    woken::Woken,
};

struct SemaphoreState {
    count: u32,
    max: u32,
    waiters: WaitList,
}

/// Counting semaphore. A binary semaphore is one with a maximum of 1.
pub struct Semaphore<'k, P: Port> {
    kernel: &'k Kernel<P>,
    state: UnsafeCell<SemaphoreState>,
}

unsafe impl<P: Port> Sync for Semaphore<'_, P> {}
unsafe impl<P: Port> Send for Semaphore<'_, P> {}

impl<'k, P: Port> Semaphore<'k, P> {
    /// Binary semaphore, initially empty.
    #[must_use]
    pub const fn binary(kernel: &'k Kernel<P>) -> Self {
        Self::counting(kernel, 1, 0)
    }

    #[must_use]
    pub const fn counting(kernel: &'k Kernel<P>, max: u32, initial: u32) -> Self {
        Self {
            kernel,
            state: UnsafeCell::new(SemaphoreState {
                count: if initial > max { max } else { initial },
                max,
                waiters: WaitList::new(),
            }),
        }
    }

    /// Waits up to `timeout` ticks for the count to become non-zero and
    /// decrements it.
    pub fn take(&self, timeout: u64) -> Result<(), RtosError> {
        self.kernel.wait_on(self, timeout)
    }

    /// Decrements the count if it is non-zero.
    pub fn take_from_isr(&self) -> Result<(), RtosError> {
        self.kernel
            .with_state(|st| self.try_acquire(st, None))
            .ok_or(RtosError::Timeout)
    }

    pub fn give(&self) -> Result<(), RtosError> {
        let preempt = self.kernel.with_state(|st| self.release(st))?;
        Kernel::<P>::yield_if(preempt);
        Ok(())
    }

    pub fn give_from_isr(&self, woken: &mut Woken) -> Result<(), RtosError> {
        woken.merge(self.kernel.with_state(|st| self.release(st))?);
        Ok(())
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.kernel
            .with_state(|_| unsafe { (*self.state.get()).count })
    }

    fn release(&self, st: &mut KernelState) -> Result<bool, RtosError> {
        let state = unsafe { &mut *self.state.get() };
        if state.count >= state.max {
            return Err(RtosError::SemaphoreFull);
        }
        state.count += 1;
        Ok(st.wake_one(&mut state.waiters))
    }
}

impl<P: Port> Waitable for Semaphore<'_, P> {
    type Output = ();

    fn try_acquire(&self, _st: &mut KernelState, _me: Option<TaskHandle>) -> Option<()> {
        let state = unsafe { &mut *self.state.get() };
        if state.count == 0 {
            return None;
        }
        state.count -= 1;
        Some(())
    }

    fn enqueue(&self, _st: &mut KernelState, me: TaskHandle) {
        unsafe { (*self.state.get()).waiters.push(me) }
    }

    fn dequeue(&self, _st: &mut KernelState, me: TaskHandle) {
        unsafe { (*self.state.get()).waiters.remove(me) }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{MAX_DELAY, TaskState, sim};

    #[test]
    fn counting_semaphore_respects_bounds() {
        let kernel = sim::new_kernel();
        let sem = Semaphore::counting(kernel, 3, 1);
        assert_eq!(sem.take(0), Ok(()));
        assert_eq!(sem.take(0), Err(RtosError::Timeout));
        for _ in 0..3 {
            sem.give().unwrap();
        }
        assert_eq!(sem.give(), Err(RtosError::SemaphoreFull));
        assert_eq!(sem.count(), 3);
        assert_eq!(sem.take_from_isr(), Ok(()));
        assert_eq!(sem.count(), 2);
    }

    #[test]
    fn blocking_before_start_is_refused() {
        let kernel = sim::new_kernel();
        let sem = Semaphore::binary(kernel);
        assert_eq!(sem.take(10), Err(RtosError::NotRunning));
        assert_eq!(sem.take_from_isr(), Err(RtosError::Timeout));
    }

    #[test]
    fn isr_give_runs_waiter_before_interrupted_task() {
        let kernel = sim::new_kernel();
        let sem: &'static Semaphore<'static, _> = Box::leak(Box::new(Semaphore::binary(kernel)));
        let high = sim::create_task(kernel, "high", 3).unwrap();
        let low = sim::create_task(kernel, "low", 1).unwrap();
        assert_eq!(sim::start(kernel), Some(high));

        let trace = Rc::new(RefCell::new(Vec::new()));
        let hook_trace = Rc::clone(&trace);
        sim::set_yield_hook(move || {
            let interrupted = sim::reschedule(kernel).unwrap();
            hook_trace.borrow_mut().push(interrupted);

            let mut woken = Woken::new();
            sem.give_from_isr(&mut woken).unwrap();
            assert!(woken.is_set());
            let resumed = sim::reschedule(kernel).unwrap();
            hook_trace.borrow_mut().push(resumed);
        });
        sem.take(MAX_DELAY).unwrap();
        sim::clear_yield_hook();

        assert_eq!(*trace.borrow(), [low, high]);
        assert_eq!(kernel.current_task(), Some(high));
        assert_eq!(kernel.task_state(low), Ok(TaskState::Ready));
        assert_eq!(sem.count(), 0);
    }

    #[test]
    fn isr_give_to_lower_priority_waiter_does_not_switch() {
        let kernel = sim::new_kernel();
        let sem: &'static Semaphore<'static, _> = Box::leak(Box::new(Semaphore::binary(kernel)));
        let waiter = sim::create_task(kernel, "waiter", 2).unwrap();
        let busy = sim::create_task(kernel, "busy", 1).unwrap();
        sim::start(kernel);

        sim::set_yield_hook(move || {
            assert_eq!(sim::reschedule(kernel), Some(busy));
            kernel.set_priority(busy, 4).unwrap();
            let mut woken = Woken::new();
            sem.give_from_isr(&mut woken).unwrap();
            assert!(!woken.is_set());
            // busy lowers itself again and the waiter takes over
            kernel.set_priority(busy, 1).unwrap();
            assert_eq!(sim::reschedule(kernel), Some(waiter));
        });
        sem.take(MAX_DELAY).unwrap();
        sim::clear_yield_hook();
    }

    #[test]
    fn take_times_out() {
        let kernel = sim::new_kernel();
        let sem: &'static Semaphore<'static, _> = Box::leak(Box::new(Semaphore::binary(kernel)));
        let waiter = sim::create_task(kernel, "waiter", 2).unwrap();
        sim::start(kernel);

        sim::set_yield_hook(move || {
            sim::reschedule(kernel);
            assert!(!sim::tick(kernel));
            assert!(sim::tick(kernel));
            assert_eq!(kernel.current_task(), Some(waiter));
        });
        assert_eq!(sem.take(2), Err(RtosError::Timeout));
        sim::clear_yield_hook();

        // a late give is kept for the next taker
        sem.give().unwrap();
        assert_eq!(sem.take(0), Ok(()));
    }
}
