//! Direct-to-task notifications.
//!
//! Every task has one 32-bit notification value. Senders update it with a
//! [`NotifyAction`]; the task waits for it with [`Kernel::notify_take`]
//! (counting-semaphore style) or [`Kernel::notify_wait`] (event-bits style).

use crate::{
    error::RtosError,
    kernel::{Kernel, KernelState},
    port::Port,
    task::{NotifyState, TaskHandle, TaskState, WaitKind, Wake},
    woken::Woken,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyAction {
    /// Marks the notification pending without touching the value.
    NoAction,
    SetBits(u32),
    Increment,
    Overwrite(u32),
    /// Writes the value unless a previous notification is still pending.
    NoOverwrite(u32),
}

impl KernelState {
    /// Returns `true` if the notified task should preempt the running one.
    pub(crate) fn notify(
        &mut self,
        task: TaskHandle,
        action: NotifyAction,
    ) -> Result<bool, RtosError> {
        let tcb = self.tcb_mut(task)?;
        let previous = tcb.notify_state;
        match action {
            NotifyAction::NoAction => {}
            NotifyAction::SetBits(bits) => tcb.notify_value |= bits,
            NotifyAction::Increment => tcb.notify_value = tcb.notify_value.wrapping_add(1),
            NotifyAction::Overwrite(value) => tcb.notify_value = value,
            NotifyAction::NoOverwrite(value) => {
                if previous == NotifyState::Received {
                    return Err(RtosError::NotificationPending);
                }
                tcb.notify_value = value;
            }
        }
        tcb.notify_state = NotifyState::Received;
        if previous == NotifyState::Waiting
            && tcb.state == TaskState::Blocked(WaitKind::Notification)
        {
            return Ok(self.make_ready(task, Wake::Event));
        }
        Ok(false)
    }
}

impl<P: Port> Kernel<P> {
    pub fn notify(&self, task: TaskHandle, action: NotifyAction) -> Result<(), RtosError> {
        let preempt = self.with_state(|st| st.notify(task, action))?;
        Self::yield_if(preempt);
        Ok(())
    }

    pub fn notify_from_isr(
        &self,
        task: TaskHandle,
        action: NotifyAction,
        woken: &mut Woken,
    ) -> Result<(), RtosError> {
        woken.merge(self.with_state(|st| st.notify(task, action))?);
        Ok(())
    }

    /// Increments the notification value of `task`.
    pub fn notify_give(&self, task: TaskHandle) -> Result<(), RtosError> {
        self.notify(task, NotifyAction::Increment)
    }

    pub fn notify_give_from_isr(&self, task: TaskHandle, woken: &mut Woken) -> Result<(), RtosError> {
        self.notify_from_isr(task, NotifyAction::Increment, woken)
    }

    /// Waits up to `timeout` ticks for a non-zero notification value.
    ///
    /// Returns the value before it was decremented, or zeroed when
    /// `clear_on_exit` is set. Returns 0 on timeout.
    pub fn notify_take(&self, clear_on_exit: bool, timeout: u64) -> u32 {
        let mut cs = self.critical();
        let st = cs.state();
        let Ok(me) = st.current() else {
            return 0;
        };
        let deadline = st.deadline(timeout);
        let Ok(tcb) = st.tcb_mut(me) else {
            return 0;
        };
        if tcb.notify_value == 0 && timeout > 0 {
            tcb.notify_state = NotifyState::Waiting;
            if st
                .block_current(TaskState::Blocked(WaitKind::Notification), deadline)
                .is_ok()
            {
                P::yield_now();
            }
        }

        let st = cs.state();
        if st.tcb(me).is_ok_and(|tcb| tcb.state != TaskState::Running) {
            st.unblock_current(me);
        }
        let Ok(tcb) = st.tcb_mut(me) else {
            return 0;
        };
        let value = tcb.notify_value;
        if value != 0 {
            tcb.notify_value = if clear_on_exit { 0 } else { value - 1 };
        }
        tcb.notify_state = NotifyState::NotWaiting;
        value
    }

    /// Waits up to `timeout` ticks for a notification.
    ///
    /// Bits in `clear_on_entry` are cleared before waiting if nothing is
    /// pending, and bits in `clear_on_exit` after a notification arrives.
    /// Returns the value as it was before the exit clear.
    pub fn notify_wait(
        &self,
        clear_on_entry: u32,
        clear_on_exit: u32,
        timeout: u64,
    ) -> Result<u32, RtosError> {
        let mut cs = self.critical();
        let st = cs.state();
        let me = st.current()?;
        let deadline = st.deadline(timeout);
        let tcb = st.tcb_mut(me)?;
        if tcb.notify_state != NotifyState::Received {
            tcb.notify_value &= !clear_on_entry;
            tcb.notify_state = NotifyState::Waiting;
            if timeout > 0
                && st
                    .block_current(TaskState::Blocked(WaitKind::Notification), deadline)
                    .is_ok()
            {
                P::yield_now();
            }
        }

        let st = cs.state();
        if st.tcb(me)?.state != TaskState::Running {
            st.unblock_current(me);
        }
        let tcb = st.tcb_mut(me)?;
        if tcb.notify_state != NotifyState::Received {
            tcb.notify_state = NotifyState::NotWaiting;
            return Err(RtosError::Timeout);
        }
        let value = tcb.notify_value;
        tcb.notify_value &= !clear_on_exit;
        tcb.notify_state = NotifyState::NotWaiting;
        Ok(value)
    }

    /// Clears a pending notification of `task` without waiting. Returns
    /// whether one was pending.
    pub fn notify_clear(&self, task: TaskHandle) -> Result<bool, RtosError> {
        self.with_state(|st| -> Result<bool, RtosError> {
            let tcb = st.tcb_mut(task)?;
            let pending = tcb.notify_state == NotifyState::Received;
            if pending {
                tcb.notify_state = NotifyState::NotWaiting;
            }
            Ok(pending)
        })
    }
}
