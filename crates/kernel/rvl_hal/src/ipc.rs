//! Doorbell registers shared with the Starlet coprocessor.

use core::ptr;

use bitflags::bitflags;
use vcell::VolatileCell;

use crate::{addr::PhysAddr, cache::CacheMaintenance};

const IPC_BASE: usize = 0xcd80_0000;

bitflags! {
    /// Broadway's IPC control register.
    ///
    /// `X1`, `Y1`, `Y2` and `X2` are write-one-to-act; the interrupt
    /// enables must be written back unchanged with every access.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct IpcControl: u32 {
        /// Execute: a request address is in the request register.
        const X1 = 1 << 0;
        /// Starlet acknowledged the request.
        const Y2 = 1 << 1;
        /// Starlet placed a reply in the reply register.
        const Y1 = 1 << 2;
        /// Reply consumed, Starlet may send the next one.
        const X2 = 1 << 3;
        /// Interrupt on `Y1`.
        const IY1 = 1 << 4;
        /// Interrupt on `Y2`.
        const IY2 = 1 << 5;
    }
}

impl IpcControl {
    pub const INTERRUPT_ENABLES: Self = Self::IY1.union(Self::IY2);

    /// `self`'s interrupt enables combined with the action bits in `action`.
    #[must_use]
    pub const fn with_action(self, action: Self) -> Self {
        self.intersection(Self::INTERRUPT_ENABLES).union(action)
    }
}

/// Broadway's side of the doorbell pair.
///
/// Implemented by the real registers and by test doubles of the peer.
pub trait IpcHardware: CacheMaintenance {
    fn control(&self) -> IpcControl;
    fn set_control(&self, ctrl: IpcControl);

    /// Places a request address in the request register.
    fn post(&self, msg: PhysAddr);

    /// Reads the reply register.
    fn reply(&self) -> PhysAddr;

    /// Acknowledges the IPC interrupt in the Hollywood flag register.
    fn acknowledge_interrupt(&self);

    /// Unmasks the IPC interrupt in the Hollywood mask register.
    fn enable_interrupt(&self);
}

#[repr(C)]
pub(crate) struct IpcRegisters {
    pub(crate) ppc_msg: VolatileCell<u32>,
    pub(crate) ppc_ctrl: VolatileCell<u32>,
    pub(crate) arm_msg: VolatileCell<u32>,
    pub(crate) arm_ctrl: VolatileCell<u32>,
}

pub(crate) fn registers() -> &'static IpcRegisters {
    unsafe { &*ptr::with_exposed_provenance::<IpcRegisters>(IPC_BASE) }
}
