use alloc::boxed::Box;
use core::{cell::UnsafeCell, convert::Infallible, marker::PhantomData, ptr};

use arrayvec::ArrayVec;
use rvl_params::{
    IDLE_SHOULD_YIELD, IDLE_STACK_SIZE, MAX_PRIORITIES, MAX_TASKS, MINIMAL_STACK_SIZE,
    TIMER_QUEUE_LENGTH, TIMER_TASK_PRIORITY, TIMER_TASK_STACK_SIZE, USE_PREEMPTION,
    USE_TIME_SLICING,
};
use strum::Display;

use crate::{
    deferred::DeferredCall,
    error::RtosError,
    list::{DelayList, TaskQueue, WaitList},
    port::{InterruptGuard, Port},
    task::{
        NotifyState, TaskEntry, TaskHandle, TaskName, TaskStack, TaskState, Tcb, WaitKind, Wake,
    },
    woken::Woken,
};

/// Timeout that never expires.
pub const MAX_DELAY: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SchedulerState {
    NotStarted,
    Running,
}

struct Slot {
    generation: u16,
    tcb: Option<Tcb>,
}

impl Slot {
    const EMPTY: Self = Self {
        generation: 0,
        tcb: None,
    };
}

/// Scheduler bookkeeping, only touched inside a critical section.
pub(crate) struct KernelState {
    slots: [Slot; MAX_TASKS],
    /// Ready tasks per priority. The running task is not queued.
    ready: [TaskQueue; MAX_PRIORITIES],
    delayed: DelayList,
    current: Option<TaskHandle>,
    started: bool,
    tick: u64,
    /// Tasks that deleted themselves and still own their stack.
    graveyard: ArrayVec<TaskHandle, MAX_TASKS>,
    pub(crate) deferred: ArrayVec<DeferredCall, TIMER_QUEUE_LENGTH>,
    pub(crate) timer_task: Option<TaskHandle>,
    idle_task: Option<TaskHandle>,
}

impl KernelState {
    const fn new() -> Self {
        Self {
            slots: [const { Slot::EMPTY }; MAX_TASKS],
            ready: [const { TaskQueue::new() }; MAX_PRIORITIES],
            delayed: DelayList::new(),
            current: None,
            started: false,
            tick: 0,
            graveyard: ArrayVec::new_const(),
            deferred: ArrayVec::new_const(),
            timer_task: None,
            idle_task: None,
        }
    }

    pub(crate) fn tcb(&self, task: TaskHandle) -> Result<&Tcb, RtosError> {
        self.slots
            .get(task.index())
            .filter(|slot| slot.generation == task.generation())
            .and_then(|slot| slot.tcb.as_ref())
            .ok_or(RtosError::InvalidTask)
    }

    pub(crate) fn tcb_mut(&mut self, task: TaskHandle) -> Result<&mut Tcb, RtosError> {
        self.slots
            .get_mut(task.index())
            .filter(|slot| slot.generation == task.generation())
            .and_then(|slot| slot.tcb.as_mut())
            .ok_or(RtosError::InvalidTask)
    }

    fn insert(&mut self, tcb: Tcb) -> Result<TaskHandle, RtosError> {
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.tcb.is_none())
            .ok_or(RtosError::NoFreeSlot)?;
        let index = u8::try_from(index).map_err(|_| RtosError::NoFreeSlot)?;
        slot.tcb = Some(tcb);
        Ok(TaskHandle::new(index, slot.generation))
    }

    /// Frees the slot of `task`, invalidating every outstanding handle.
    fn remove(&mut self, task: TaskHandle) -> Option<Tcb> {
        self.tcb(task).ok()?;
        let slot = &mut self.slots[task.index()];
        slot.generation = slot.generation.wrapping_add(1);
        slot.tcb.take()
    }

    /// The running task, once the scheduler has started.
    pub(crate) fn current(&self) -> Result<TaskHandle, RtosError> {
        self.current
            .filter(|_| self.started)
            .ok_or(RtosError::NotRunning)
    }

    pub(crate) fn is_current(&self, task: TaskHandle) -> bool {
        self.started && self.current == Some(task)
    }

    fn current_priority(&self) -> usize {
        self.current
            .and_then(|task| self.tcb(task).ok())
            .map_or(0, |tcb| tcb.priority)
    }

    /// Absolute tick at which a wait of `timeout` ticks expires.
    pub(crate) fn deadline(&self, timeout: u64) -> Option<u64> {
        (timeout != MAX_DELAY).then(|| self.tick.saturating_add(timeout))
    }

    fn highest_ready_priority(&self) -> Option<usize> {
        (0..MAX_PRIORITIES).rev().find(|p| !self.ready[*p].is_empty())
    }

    fn pop_highest_ready(&mut self) -> Option<TaskHandle> {
        let priority = self.highest_ready_priority()?;
        self.ready[priority].pop_front()
    }

    /// Returns `true` if a ready task outranks the running one.
    pub(crate) fn preemption_needed(&self) -> bool {
        USE_PREEMPTION
            && self.started
            && self
                .highest_ready_priority()
                .is_some_and(|p| p > self.current_priority())
    }

    /// Queues `task` behind its priority peers.
    ///
    /// Returns `true` if it should preempt the running task.
    pub(crate) fn make_ready(&mut self, task: TaskHandle, wake: Wake) -> bool {
        self.delayed.remove(task);
        let Ok(tcb) = self.tcb_mut(task) else {
            return false;
        };
        debug_assert!(!matches!(tcb.state, TaskState::Running | TaskState::Ready));
        tcb.state = TaskState::Ready;
        tcb.wake = wake;
        let priority = tcb.priority;
        self.ready[priority].push_back(task);
        USE_PREEMPTION && self.started && priority > self.current_priority()
    }

    /// Takes the running task off the CPU until it is woken or `deadline`
    /// passes. The caller must yield afterwards.
    pub(crate) fn block_current(
        &mut self,
        state: TaskState,
        deadline: Option<u64>,
    ) -> Result<TaskHandle, RtosError> {
        debug_assert!(state.is_waiting());
        let me = self.current()?;
        let tcb = self.tcb_mut(me)?;
        tcb.state = state;
        tcb.wake = Wake::Pending;
        if let Some(at) = deadline {
            self.delayed.insert(at, me);
        }
        Ok(me)
    }

    /// Puts a blocked task back on the CPU without a switch having happened.
    pub(crate) fn unblock_current(&mut self, me: TaskHandle) {
        self.delayed.remove(me);
        if let Ok(tcb) = self.tcb_mut(me) {
            tcb.state = TaskState::Running;
        }
    }

    /// Moves `task` to `priority`, requeueing it if it is ready.
    pub(crate) fn reprioritize(&mut self, task: TaskHandle, priority: usize) {
        let Ok(tcb) = self.tcb_mut(task) else {
            return;
        };
        let old = tcb.priority;
        if old == priority {
            return;
        }
        tcb.priority = priority;
        if tcb.state == TaskState::Ready && self.ready[old].remove(task) {
            self.ready[priority].push_back(task);
        }
    }

    /// Makes ready the highest priority task still blocked on `waiters`.
    ///
    /// Returns `true` if it should preempt the running task.
    pub(crate) fn wake_one(&mut self, waiters: &mut WaitList) -> bool {
        waiters.retain(|task| {
            self.tcb(task)
                .is_ok_and(|tcb| tcb.state == TaskState::Blocked(WaitKind::Object))
        });
        let mut best: Option<(usize, TaskHandle)> = None;
        for task in waiters.iter() {
            let Ok(tcb) = self.tcb(task) else { continue };
            if best.is_none_or(|(p, _)| tcb.priority > p) {
                best = Some((tcb.priority, task));
            }
        }
        let Some((_, task)) = best else {
            return false;
        };
        waiters.remove(task);
        self.make_ready(task, Wake::Event)
    }

    /// Highest priority among tasks still blocked on `waiters`.
    pub(crate) fn top_waiter_priority(&self, waiters: &WaitList) -> Option<usize> {
        waiters
            .iter()
            .filter_map(|task| self.tcb(task).ok())
            .filter(|tcb| tcb.state == TaskState::Blocked(WaitKind::Object))
            .map(|tcb| tcb.priority)
            .max()
    }

    fn resume(&mut self, task: TaskHandle) -> Result<bool, RtosError> {
        let tcb = self.tcb(task)?;
        if tcb.state != TaskState::Suspended {
            return Ok(false);
        }
        let wake = tcb.wake;
        Ok(self.make_ready(task, wake))
    }
}

/// Critical section over the kernel state.
pub(crate) struct CriticalSection<'a, P: Port> {
    kernel: &'a Kernel<P>,
    _guard: InterruptGuard<P>,
}

impl<P: Port> CriticalSection<'_, P> {
    /// The returned borrow must end before anything that can nest another
    /// critical section, such as [`Port::yield_now`].
    pub(crate) fn state(&mut self) -> &mut KernelState {
        unsafe { &mut *self.kernel.state.get() }
    }
}

/// Something a task can block on.
pub(crate) trait Waitable {
    type Output;

    /// Takes the object if it is available.
    fn try_acquire(&self, st: &mut KernelState, me: Option<TaskHandle>) -> Option<Self::Output>;

    /// Registers `me` as a waiter.
    fn enqueue(&self, st: &mut KernelState, me: TaskHandle);

    /// Withdraws `me` after it timed out or was resumed.
    fn dequeue(&self, st: &mut KernelState, me: TaskHandle);
}

/// Preemptive priority scheduler.
///
/// One instance drives one processor. Interrupt handlers call
/// [`Kernel::tick_from_isr`] and [`Kernel::switch_context`]; everything else
/// is called from tasks.
pub struct Kernel<P: Port> {
    state: UnsafeCell<KernelState>,
    idle_stack: UnsafeCell<[u8; IDLE_STACK_SIZE]>,
    timer_stack: UnsafeCell<[u8; TIMER_TASK_STACK_SIZE]>,
    _port: PhantomData<fn() -> P>,
}

unsafe impl<P: Port> Sync for Kernel<P> {}
unsafe impl<P: Port> Send for Kernel<P> {}

impl<P: Port> Default for Kernel<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Port> Kernel<P> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: UnsafeCell::new(KernelState::new()),
            idle_stack: UnsafeCell::new([0; IDLE_STACK_SIZE]),
            timer_stack: UnsafeCell::new([0; TIMER_TASK_STACK_SIZE]),
            _port: PhantomData,
        }
    }

    pub(crate) fn critical(&self) -> CriticalSection<'_, P> {
        CriticalSection {
            kernel: self,
            _guard: InterruptGuard::new(),
        }
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut KernelState) -> R) -> R {
        let mut cs = self.critical();
        f(cs.state())
    }

    pub(crate) fn yield_if(preempt: bool) {
        if preempt {
            P::yield_now();
        }
    }

    /// Blocks the running task until `object` is acquired or `timeout`
    /// ticks pass.
    pub(crate) fn wait_on<W: Waitable>(
        &self,
        object: &W,
        timeout: u64,
    ) -> Result<W::Output, RtosError> {
        let mut cs = self.critical();
        let deadline = cs.state().deadline(timeout);
        loop {
            let st = cs.state();
            let me = st.current().ok();
            if let Some(out) = object.try_acquire(st, me) {
                return Ok(out);
            }
            if timeout == 0 || deadline.is_some_and(|d| st.tick >= d) {
                return Err(RtosError::Timeout);
            }
            let Some(me) = me else {
                return Err(RtosError::NotRunning);
            };
            object.enqueue(st, me);
            st.block_current(TaskState::Blocked(WaitKind::Object), deadline)?;

            P::yield_now();

            let st = cs.state();
            let wake = st.tcb(me)?.wake;
            match wake {
                Wake::Event => {}
                Wake::Timeout => object.dequeue(st, me),
                Wake::Pending => {
                    // the port returned without switching away.
                    st.unblock_current(me);
                    object.dequeue(st, me);
                    return Err(RtosError::Timeout);
                }
            }
        }
    }

    /// Creates a task on a caller-provided stack.
    pub fn create_static(
        &self,
        name: &str,
        priority: usize,
        stack: &'static mut [u8],
        entry: TaskEntry,
        arg: usize,
    ) -> Result<TaskHandle, RtosError> {
        self.create_task(name, priority, TaskStack::from_static(stack), entry, arg)
    }

    /// Creates a task with a heap-allocated stack of `stack_size` bytes.
    pub fn create(
        &self,
        name: &str,
        priority: usize,
        stack_size: usize,
        entry: TaskEntry,
        arg: usize,
    ) -> Result<TaskHandle, RtosError> {
        if stack_size < MINIMAL_STACK_SIZE {
            return Err(RtosError::StackTooSmall(stack_size));
        }
        self.create_task(name, priority, TaskStack::allocate(stack_size), entry, arg)
    }

    /// Creates a task that runs `f` once.
    pub fn spawn<F>(
        &self,
        name: &str,
        priority: usize,
        stack_size: usize,
        f: F,
    ) -> Result<TaskHandle, RtosError>
    where
        F: FnOnce() + Send + 'static,
    {
        extern "C" fn trampoline(arg: usize) {
            let f = unsafe {
                Box::from_raw(ptr::with_exposed_provenance_mut::<Box<dyn FnOnce() + Send>>(
                    arg,
                ))
            };
            f();
        }

        let f: Box<Box<dyn FnOnce() + Send>> = Box::new(Box::new(f));
        let arg = Box::into_raw(f).expose_provenance();
        self.create(name, priority, stack_size, trampoline, arg)
            .inspect_err(|_| {
                drop(unsafe {
                    Box::from_raw(ptr::with_exposed_provenance_mut::<Box<dyn FnOnce() + Send>>(
                        arg,
                    ))
                });
            })
    }

    fn create_task(
        &self,
        name: &str,
        priority: usize,
        stack: TaskStack,
        entry: TaskEntry,
        arg: usize,
    ) -> Result<TaskHandle, RtosError> {
        if priority >= MAX_PRIORITIES {
            return Err(RtosError::InvalidPriority(priority));
        }
        if stack.len() < MINIMAL_STACK_SIZE {
            return Err(RtosError::StackTooSmall(stack.len()));
        }
        let sp = unsafe { P::initialize_stack(stack.top(), entry, arg) };

        let mut cs = self.critical();
        let st = cs.state();
        let task = st.insert(Tcb::new(name, priority, stack, sp))?;
        let preempt = st.make_ready(task, Wake::Pending);
        drop(cs);

        log::debug!("created {task} '{name}' at priority {priority}");
        Self::yield_if(preempt);
        Ok(task)
    }

    /// Deletes `task`. A task may delete itself; its stack is then released
    /// by the idle task.
    pub fn delete(&self, task: TaskHandle) -> Result<(), RtosError> {
        let mut cs = self.critical();
        let st = cs.state();
        let tcb = st.tcb_mut(task)?;
        if tcb.state == TaskState::Deleted {
            return Err(RtosError::InvalidTask);
        }
        let priority = tcb.priority;
        st.ready[priority].remove(task);
        st.delayed.remove(task);

        if st.is_current(task) {
            st.tcb_mut(task)?.state = TaskState::Deleted;
            st.graveyard.push(task);
            log::debug!("{task} deleted itself");
            P::yield_now();
            return Ok(());
        }

        let tcb = st.remove(task);
        drop(cs);
        log::debug!("deleted {task}");
        drop(tcb);
        Ok(())
    }

    /// Releases the stacks of tasks that deleted themselves.
    fn reap_deleted(&self) {
        loop {
            let tcb = self.with_state(|st| {
                let task = st.graveyard.pop()?;
                st.remove(task)
            });
            let Some(tcb) = tcb else { break };
            drop(tcb);
        }
    }

    pub fn suspend(&self, task: TaskHandle) -> Result<(), RtosError> {
        let mut cs = self.critical();
        let st = cs.state();
        let is_current = st.is_current(task);
        let tcb = st.tcb_mut(task)?;
        match tcb.state {
            TaskState::Suspended => return Ok(()),
            TaskState::Deleted => return Err(RtosError::InvalidTask),
            TaskState::Delayed | TaskState::Blocked(_) => tcb.wake = Wake::Timeout,
            TaskState::Running | TaskState::Ready => {}
        }
        tcb.state = TaskState::Suspended;
        let priority = tcb.priority;
        st.ready[priority].remove(task);
        st.delayed.remove(task);
        if is_current {
            P::yield_now();
        }
        Ok(())
    }

    pub fn resume(&self, task: TaskHandle) -> Result<(), RtosError> {
        let preempt = self.with_state(|st| st.resume(task))?;
        Self::yield_if(preempt);
        Ok(())
    }

    pub fn resume_from_isr(&self, task: TaskHandle, woken: &mut Woken) -> Result<(), RtosError> {
        woken.merge(self.with_state(|st| st.resume(task))?);
        Ok(())
    }

    pub fn priority(&self, task: TaskHandle) -> Result<usize, RtosError> {
        self.with_state(|st| st.tcb(task).map(|tcb| tcb.priority))
    }

    /// Changes the base priority of `task`.
    ///
    /// A task boosted by priority inheritance keeps the boost until it
    /// releases its mutexes unless the new priority is higher.
    pub fn set_priority(&self, task: TaskHandle, priority: usize) -> Result<(), RtosError> {
        if priority >= MAX_PRIORITIES {
            return Err(RtosError::InvalidPriority(priority));
        }
        let preempt = self.with_state(|st| -> Result<bool, RtosError> {
            let tcb = st.tcb_mut(task)?;
            let boosted = tcb.mutexes_held > 0 && tcb.priority > tcb.base_priority;
            let keep_boost = boosted && priority < tcb.priority;
            tcb.base_priority = priority;
            if !keep_boost {
                st.reprioritize(task, priority);
            }
            Ok(st.preemption_needed())
        })?;
        Self::yield_if(preempt);
        Ok(())
    }

    /// Gives up the CPU to ready tasks of the same priority.
    pub fn yield_now(&self) {
        P::yield_now();
    }

    /// Sleeps for `ticks` ticks. [`MAX_DELAY`] sleeps until resumed.
    pub fn delay(&self, ticks: u64) {
        if ticks == 0 {
            P::yield_now();
            return;
        }
        let mut cs = self.critical();
        let st = cs.state();
        let deadline = st.deadline(ticks);
        if st.block_current(TaskState::Delayed, deadline).is_ok() {
            P::yield_now();
        }
    }

    /// Sleeps until `period` ticks after `*previous_wake`, then advances
    /// `*previous_wake` by `period`. Gives a fixed wake frequency.
    pub fn delay_until(&self, previous_wake: &mut u64, period: u64) {
        let mut cs = self.critical();
        let st = cs.state();
        let wake_at = previous_wake.saturating_add(period);
        *previous_wake = wake_at;
        if wake_at > st.tick && st.block_current(TaskState::Delayed, Some(wake_at)).is_ok() {
            P::yield_now();
        }
    }

    /// Landing pad for task entry functions that return.
    pub fn park(&self) -> ! {
        loop {
            self.delay(MAX_DELAY);
        }
    }

    #[must_use]
    pub fn current_task(&self) -> Option<TaskHandle> {
        self.with_state(|st| st.current().ok())
    }

    pub fn task_state(&self, task: TaskHandle) -> Result<TaskState, RtosError> {
        self.with_state(|st| st.tcb(task).map(|tcb| tcb.state))
    }

    pub fn task_name(&self, task: TaskHandle) -> Result<TaskName, RtosError> {
        self.with_state(|st| st.tcb(task).map(|tcb| tcb.name))
    }

    /// Smallest amount of stack, in bytes, that `task` has left unused.
    pub fn stack_high_water_mark(&self, task: TaskHandle) -> Result<usize, RtosError> {
        self.with_state(|st| st.tcb(task).map(|tcb| tcb.stack.high_water_mark()))
    }

    #[must_use]
    pub fn scheduler_state(&self) -> SchedulerState {
        if self.with_state(|st| st.started) {
            SchedulerState::Running
        } else {
            SchedulerState::NotStarted
        }
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.with_state(|st| st.tick)
    }

    /// Advances the tick count and wakes tasks whose delay expired.
    ///
    /// Called from the tick interrupt. Returns `true` if a context switch
    /// is needed on the way out.
    pub fn tick_from_isr(&self) -> bool {
        self.with_state(|st| {
            st.tick += 1;
            let now = st.tick;
            let mut switch = false;
            while let Some(task) = st.delayed.pop_expired(now) {
                let waiting = st.tcb(task).is_ok_and(|tcb| tcb.state.is_waiting());
                if waiting {
                    switch |= st.make_ready(task, Wake::Timeout);
                }
            }
            if USE_TIME_SLICING && st.started {
                let priority = st.current_priority();
                switch |= !st.ready[priority].is_empty();
            }
            switch
        })
    }

    /// Saves `saved_sp` as the stack pointer of the running task and
    /// returns the stack pointer of the task to run next.
    ///
    /// Called by the port with interrupts disabled, from the yield system
    /// call and on the way out of an interrupt that requested a switch.
    pub fn switch_context(&self, saved_sp: usize) -> usize {
        let mut cs = self.critical();
        let st = cs.state();

        let mut overflowed = None;
        if let Some(current) = st.current
            && let Ok(tcb) = st.tcb_mut(current)
        {
            tcb.saved_sp = saved_sp;
            if saved_sp < tcb.stack.base() {
                overflowed = Some(tcb.name);
            } else if tcb.state == TaskState::Running {
                tcb.state = TaskState::Ready;
                let priority = tcb.priority;
                st.ready[priority].push_back(current);
            }
        }
        if let Some(name) = overflowed {
            drop(cs);
            P::stack_overflow(&name);
        }

        while let Some(next) = st.pop_highest_ready() {
            if let Ok(tcb) = st.tcb_mut(next) {
                tcb.state = TaskState::Running;
                let sp = tcb.saved_sp;
                st.current = Some(next);
                return sp;
            }
        }
        saved_sp
    }

    /// Creates the idle and timer service tasks and picks the first task.
    ///
    /// Returns the stack pointer to resume. [`Kernel::start`] hands it to
    /// the port.
    pub fn prepare_start(&'static self) -> Result<usize, RtosError> {
        if self.with_state(|st| st.idle_task.is_some()) {
            return Err(RtosError::AlreadyStarted);
        }
        let arg = ptr::from_ref(self).expose_provenance();

        let idle_stack = unsafe { &mut *self.idle_stack.get() };
        let idle = self.create_static("IDLE", 0, idle_stack, idle_entry::<P>, arg)?;
        self.with_state(|st| st.idle_task = Some(idle));

        let timer_stack = unsafe { &mut *self.timer_stack.get() };
        let timer = self.create_static(
            "Tmr Svc",
            TIMER_TASK_PRIORITY,
            timer_stack,
            timer_entry::<P>,
            arg,
        )?;

        let mut cs = self.critical();
        let st = cs.state();
        st.timer_task = Some(timer);
        if st.deferred.is_empty() {
            // nothing queued yet: park it as if it had run and found
            // the queue empty.
            st.ready[TIMER_TASK_PRIORITY].remove(timer);
            let tcb = st.tcb_mut(timer)?;
            tcb.state = TaskState::Blocked(WaitKind::Notification);
            tcb.notify_state = NotifyState::Waiting;
        }

        let first = st.pop_highest_ready().ok_or(RtosError::NotRunning)?;
        let tcb = st.tcb_mut(first)?;
        tcb.state = TaskState::Running;
        let sp = tcb.saved_sp;
        st.current = Some(first);
        st.started = true;
        Ok(sp)
    }

    /// Starts scheduling. Only returns if the idle or timer task could not
    /// be created.
    pub fn start(&'static self) -> Result<Infallible, RtosError> {
        let sp = self.prepare_start()?;
        log::info!("scheduler started");
        P::start_first_task(sp)
    }

    fn idle_loop(&self) -> ! {
        loop {
            self.reap_deleted();
            if IDLE_SHOULD_YIELD && self.with_state(|st| !st.ready[0].is_empty()) {
                P::yield_now();
            }
            P::idle_hook();
        }
    }

    #[cfg(any(test, feature = "sim"))]
    pub(crate) fn current_saved_sp(&self) -> Option<usize> {
        self.with_state(|st| {
            let current = st.current?;
            st.tcb(current).ok().map(|tcb| tcb.saved_sp)
        })
    }
}

fn kernel_from_arg<P: Port>(arg: usize) -> &'static Kernel<P> {
    unsafe { &*ptr::with_exposed_provenance::<Kernel<P>>(arg) }
}

extern "C" fn idle_entry<P: Port>(arg: usize) {
    kernel_from_arg::<P>(arg).idle_loop()
}

extern "C" fn timer_entry<P: Port>(arg: usize) {
    kernel_from_arg::<P>(arg).timer_service()
}
