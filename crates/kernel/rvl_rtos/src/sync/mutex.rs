use core::{
    cell::UnsafeCell,
    marker::PhantomData,
    ops::{Deref, DerefMut},
};

use crate::{
    error::RtosError,
    kernel::{Kernel, KernelState, MAX_DELAY, Waitable},
    list::WaitList,
    port::Port,
    task::TaskHandle,
};

struct MutexState {
    locked: bool,
    /// `None` while locked before the scheduler started.
    holder: Option<TaskHandle>,
    depth: u32,
    waiters: WaitList,
}

/// Mutex with priority inheritance.
///
/// While a higher priority task waits, the holder runs at the waiter's
/// priority. The holder drops back to its base priority once it releases
/// every mutex it holds, or when the waiter gives up and no other waiter
/// justifies the boost.
pub struct RawMutex<'k, P: Port> {
    kernel: &'k Kernel<P>,
    recursive: bool,
    state: UnsafeCell<MutexState>,
}

unsafe impl<P: Port> Sync for RawMutex<'_, P> {}
unsafe impl<P: Port> Send for RawMutex<'_, P> {}

impl<'k, P: Port> RawMutex<'k, P> {
    #[must_use]
    pub const fn new(kernel: &'k Kernel<P>) -> Self {
        Self::with_recursion(kernel, false)
    }

    /// A mutex its holder may lock again; it must unlock as many times.
    #[must_use]
    pub const fn recursive(kernel: &'k Kernel<P>) -> Self {
        Self::with_recursion(kernel, true)
    }

    const fn with_recursion(kernel: &'k Kernel<P>, recursive: bool) -> Self {
        Self {
            kernel,
            recursive,
            state: UnsafeCell::new(MutexState {
                locked: false,
                holder: None,
                depth: 0,
                waiters: WaitList::new(),
            }),
        }
    }

    /// Waits up to `timeout` ticks for the mutex.
    pub fn lock(&self, timeout: u64) -> Result<(), RtosError> {
        self.kernel.wait_on(self, timeout)
    }

    pub fn unlock(&self) -> Result<(), RtosError> {
        let preempt = self.kernel.with_state(|st| self.release(st))?;
        Kernel::<P>::yield_if(preempt);
        Ok(())
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.kernel
            .with_state(|_| unsafe { (*self.state.get()).locked })
    }

    #[must_use]
    pub fn holder(&self) -> Option<TaskHandle> {
        self.kernel
            .with_state(|_| unsafe { (*self.state.get()).holder })
    }

    fn release(&self, st: &mut KernelState) -> Result<bool, RtosError> {
        let state = unsafe { &mut *self.state.get() };
        let me = st.current().ok();
        if !state.locked || state.holder != me {
            return Err(RtosError::NotOwner);
        }
        if state.depth > 1 {
            state.depth -= 1;
            return Ok(false);
        }
        state.locked = false;
        state.holder = None;
        state.depth = 0;

        if let Some(me) = me
            && let Ok(tcb) = st.tcb_mut(me)
        {
            tcb.mutexes_held -= 1;
            if tcb.mutexes_held == 0 && tcb.priority != tcb.base_priority {
                let base = tcb.base_priority;
                st.reprioritize(me, base);
            }
        }
        let woke = st.wake_one(&mut state.waiters);
        Ok(woke || st.preemption_needed())
    }

    /// Drops an inherited priority the remaining waiters no longer justify.
    fn disinherit(&self, st: &mut KernelState) {
        let state = unsafe { &*self.state.get() };
        let Some(holder) = state.holder else {
            return;
        };
        let waiter_priority = st.top_waiter_priority(&state.waiters);
        let Ok(tcb) = st.tcb(holder) else {
            return;
        };
        // a holder of several mutexes may owe its boost to another one.
        if tcb.mutexes_held != 1 {
            return;
        }
        let target = waiter_priority.map_or(tcb.base_priority, |p| p.max(tcb.base_priority));
        if target < tcb.priority {
            st.reprioritize(holder, target);
        }
    }
}

impl<P: Port> Waitable for RawMutex<'_, P> {
    type Output = ();

    fn try_acquire(&self, st: &mut KernelState, me: Option<TaskHandle>) -> Option<()> {
        let state = unsafe { &mut *self.state.get() };
        if state.locked {
            if self.recursive && me.is_some() && state.holder == me {
                state.depth += 1;
                return Some(());
            }
            return None;
        }
        state.locked = true;
        state.holder = me;
        state.depth = 1;
        if let Some(tcb) = me.and_then(|me| st.tcb_mut(me).ok()) {
            tcb.mutexes_held += 1;
        }
        Some(())
    }

    fn enqueue(&self, st: &mut KernelState, me: TaskHandle) {
        let state = unsafe { &mut *self.state.get() };
        state.waiters.push(me);
        let Some(holder) = state.holder else {
            return;
        };
        let Ok(my_priority) = st.tcb(me).map(|tcb| tcb.priority) else {
            return;
        };
        if st.tcb(holder).is_ok_and(|tcb| tcb.priority < my_priority) {
            st.reprioritize(holder, my_priority);
        }
    }

    fn dequeue(&self, st: &mut KernelState, me: TaskHandle) {
        unsafe { (*self.state.get()).waiters.remove(me) };
        self.disinherit(st);
    }
}

/// Mutual exclusion over `T` built on [`RawMutex`].
pub struct Mutex<'k, P: Port, T: ?Sized> {
    raw: RawMutex<'k, P>,
    value: UnsafeCell<T>,
}

unsafe impl<P: Port, T: ?Sized + Send> Sync for Mutex<'_, P, T> {}
unsafe impl<P: Port, T: ?Sized + Send> Send for Mutex<'_, P, T> {}

impl<'k, P: Port, T> Mutex<'k, P, T> {
    #[must_use]
    pub const fn new(kernel: &'k Kernel<P>, value: T) -> Self {
        Self {
            raw: RawMutex::new(kernel),
            value: UnsafeCell::new(value),
        }
    }
}

impl<'k, P: Port, T: ?Sized> Mutex<'k, P, T> {
    /// Waits as long as it takes to lock the mutex.
    pub fn lock(&self) -> Result<MutexGuard<'_, 'k, P, T>, RtosError> {
        self.lock_timeout(MAX_DELAY)
    }

    pub fn lock_timeout(&self, timeout: u64) -> Result<MutexGuard<'_, 'k, P, T>, RtosError> {
        self.raw.lock(timeout)?;
        Ok(MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        })
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

#[must_use]
pub struct MutexGuard<'a, 'k, P: Port, T: ?Sized> {
    mutex: &'a Mutex<'k, P, T>,
    _not_send: PhantomData<*const ()>,
}

impl<P: Port, T: ?Sized> Deref for MutexGuard<'_, '_, P, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.mutex.value.get() }
    }
}

impl<P: Port, T: ?Sized> DerefMut for MutexGuard<'_, '_, P, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<P: Port, T: ?Sized> Drop for MutexGuard<'_, '_, P, T> {
    fn drop(&mut self) {
        // the guard proves the running task holds the mutex.
        let unlocked = self
            .mutex
            .raw
            .unlock()
            .inspect_err(|err| log::error!("dropping mutex guard: {err}"));
        debug_assert!(
            unlocked.is_ok(),
            "mutex guard dropped by a task that does not hold it"
        );
    }
}
