//! Processor interface and Hollywood interrupt registers.
//!
//! Callers must hold external interrupts disabled around the
//! read-modify-write helpers.

use core::ptr;

use vcell::VolatileCell;

use crate::irq::IrqKind;

const PI_BASE: usize = 0xcc00_3000;
const HOLLYWOOD_IRQ_BASE: usize = 0xcd00_0030;

/// Bit of the IPC interrupt in the Hollywood PPC flag and mask registers.
pub const HOLLYWOOD_IPC_BIT: u32 = 1 << 30;

#[repr(C)]
struct PiRegisters {
    /// Pending interrupt sources.
    cause: VolatileCell<u32>,
    /// Enabled interrupt sources.
    mask: VolatileCell<u32>,
}

#[repr(C)]
struct HollywoodIrqRegisters {
    /// Pending PPC interrupts; write one to acknowledge.
    flag: VolatileCell<u32>,
    /// Enabled PPC interrupts.
    mask: VolatileCell<u32>,
}

fn pi() -> &'static PiRegisters {
    unsafe { &*ptr::with_exposed_provenance::<PiRegisters>(PI_BASE) }
}

fn hollywood() -> &'static HollywoodIrqRegisters {
    unsafe { &*ptr::with_exposed_provenance::<HollywoodIrqRegisters>(HOLLYWOOD_IRQ_BASE) }
}

#[must_use]
pub fn cause() -> u32 {
    pi().cause.get()
}

#[must_use]
pub fn mask() -> u32 {
    pi().mask.get()
}

pub fn set_mask(mask: u32) {
    pi().mask.set(mask);
}

/// Sources that are both pending and enabled.
#[must_use]
pub fn pending() -> u32 {
    cause() & mask()
}

pub fn enable(kind: IrqKind) {
    set_mask(mask() | kind.bit());
}

pub fn disable(kind: IrqKind) {
    set_mask(mask() & !kind.bit());
}

/// Acknowledges PPC-side Hollywood interrupts in `bits`.
pub fn hollywood_acknowledge(bits: u32) {
    let regs = hollywood();
    regs.flag.set(regs.flag.get() | bits);
}

/// Enables PPC-side Hollywood interrupts in `bits`.
pub fn hollywood_enable(bits: u32) {
    let regs = hollywood();
    regs.mask.set(regs.mask.get() | bits);
}
