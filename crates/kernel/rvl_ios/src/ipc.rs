//! The request/reply channel to Starlet.
//!
//! A request is posted as soon as the request doorbell is idle; otherwise
//! it waits in a FIFO drained by the acknowledge interrupt. Starlet may
//! reply in any order, so replies are matched to requests by address and
//! cookie.

use core::{
    cell::UnsafeCell,
    marker::PhantomData,
    ptr::{self, NonNull},
    sync::atomic::{AtomicBool, Ordering},
};

use arrayvec::ArrayVec;
use log::{info, warn};
use rvl_hal::{IpcControl, IpcHardware, PhysAddr};
use rvl_params::IPC_MAX_REQUESTS;
use rvl_rtos::{InterruptGuard, Port, Woken};

use crate::{
    error::{IosError, IosErrorKind},
    message::{Command, Completion, IpcMessage, MESSAGE_MAGIC, WireMessage},
};

#[derive(Debug, Clone, Copy)]
struct InFlight {
    msg: NonNull<IpcMessage>,
    cookie: u32,
}

struct IpcState {
    in_flight: ArrayVec<InFlight, IPC_MAX_REQUESTS>,
    outbox: ArrayVec<PhysAddr, IPC_MAX_REQUESTS>,
    /// A request was posted and Starlet has not acknowledged it yet.
    busy: bool,
    sequence: u32,
}

/// Broadway's end of the IPC channel.
pub struct Ipc<P: Port, H: IpcHardware> {
    hw: H,
    state: UnsafeCell<IpcState>,
    initialized: AtomicBool,
    _port: PhantomData<fn() -> P>,
}

unsafe impl<P: Port, H: IpcHardware + Sync> Sync for Ipc<P, H> {}

impl<P: Port, H: IpcHardware> Ipc<P, H> {
    #[must_use]
    pub const fn new(hw: H) -> Self {
        Self {
            hw,
            state: UnsafeCell::new(IpcState {
                in_flight: ArrayVec::new_const(),
                outbox: ArrayVec::new_const(),
                busy: false,
                sequence: 0,
            }),
            initialized: AtomicBool::new(false),
            _port: PhantomData,
        }
    }

    #[must_use]
    pub fn hardware(&self) -> &H {
        &self.hw
    }

    /// Enables the IPC interrupts. Returns `false` if an earlier call
    /// already did.
    pub fn initialize(&self) -> bool {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.hw.set_control(IpcControl::INTERRUPT_ENABLES);
        self.hw.enable_interrupt();
        info!("IPC initialized");
        true
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Number of requests waiting for a reply.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.with_state(|st| st.in_flight.len())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut IpcState) -> T) -> T {
        let _guard = InterruptGuard::<P>::new();
        f(unsafe { &mut *self.state.get() })
    }

    /// Sends `msg` to Starlet. `completion` runs in the interrupt handler
    /// once the reply arrives.
    ///
    /// Fails without touching the hardware when the channel is saturated.
    ///
    /// # Safety
    ///
    /// `msg` must stay valid and in place until `completion` has run, and
    /// nothing else may access it meanwhile.
    pub unsafe fn submit(
        &self,
        msg: NonNull<IpcMessage>,
        completion: Completion,
    ) -> Result<(), IosError> {
        self.with_state(|st| {
            if st.in_flight.is_full() {
                return Err(IosErrorKind::QueueFull.into());
            }
            if st.in_flight.iter().any(|e| e.msg == msg) {
                return Err(IosErrorKind::InvalidArgument.into());
            }

            st.sequence = st.sequence.wrapping_add(1);
            let cookie = match MESSAGE_MAGIC.wrapping_add(st.sequence) {
                0 => MESSAGE_MAGIC,
                cookie => cookie,
            };
            let message = unsafe { &mut *msg.as_ptr() };
            message.cookie = cookie;
            message.completion = Some(completion);
            self.hw
                .flush(msg.as_ptr().addr(), size_of::<WireMessage>());
            st.in_flight.push(InFlight { msg, cookie });

            let phys = PhysAddr::of(msg.as_ptr());
            if st.busy {
                st.outbox.push(phys);
            } else {
                self.post(st, phys);
            }
            Ok(())
        })
    }

    fn post(&self, st: &mut IpcState, phys: PhysAddr) {
        st.busy = true;
        self.hw.post(phys);
        self.hw
            .set_control(self.hw.control().with_action(IpcControl::X1));
    }

    /// IPC interrupt handler.
    pub fn handle_interrupt(&self, woken: &mut Woken) {
        let ctrl = self.hw.control();

        if ctrl.contains(IpcControl::Y2) {
            self.hw.set_control(ctrl.with_action(IpcControl::Y2));
            self.with_state(|st| {
                st.busy = false;
                if !st.outbox.is_empty() {
                    let next = st.outbox.remove(0);
                    self.post(st, next);
                }
            });
        }

        if ctrl.contains(IpcControl::Y1) {
            let reply = self.hw.reply();
            if let Some((completion, result)) = self.take_reply(reply) {
                completion.run(result, woken);
            }
            // consume the reply and let Starlet send the next one
            self.hw
                .set_control(self.hw.control().with_action(IpcControl::Y1 | IpcControl::X2));
        }

        self.hw.acknowledge_interrupt();
    }

    fn take_reply(&self, reply: PhysAddr) -> Option<(Completion, i32)> {
        let target = reply.to_cached_ptr::<IpcMessage>();
        self.with_state(|st| {
            let Some(pos) = st.in_flight.iter().position(|e| e.msg.as_ptr() == target) else {
                warn!("reply for unknown message at {reply}");
                return None;
            };
            let entry = st.in_flight[pos];
            self.hw
                .invalidate(entry.msg.as_ptr().addr(), size_of::<WireMessage>());
            let message = entry.msg.as_ptr();
            let wire = unsafe { ptr::read_volatile(&raw const (*message).wire) };
            let cookie = unsafe { (*message).cookie };
            if wire.command() != Some(Command::Reply) || cookie != entry.cookie {
                warn!("dropping stale reply at {reply}");
                return None;
            }

            st.in_flight.remove(pos);
            let message = unsafe { &mut *message };
            message.wire = wire;
            message.cookie = 0;
            let completion = message.completion.take()?;
            Some((completion, wire.result))
        })
    }
}
