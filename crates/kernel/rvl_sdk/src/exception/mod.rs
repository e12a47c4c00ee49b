//! Broadway exception vectors.
//!
//! Each architected vector holds a single branch to a trampoline that
//! saves a [`Context`](crate::context::Context) on the interrupted stack
//! and calls [`Dispatcher::handle`]. What the handler returns is the
//! context to resume, which is how interrupts switch tasks.

use strum::{Display, EnumIter, FromRepr};

pub use self::dispatch::Dispatcher;

mod dispatch;
#[cfg(target_arch = "powerpc")]
mod trampoline;

#[cfg(target_arch = "powerpc")]
pub(crate) use self::trampoline::resume_context;

/// The exceptions the SDK installs a vector for. The discriminant is the
/// vector offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, FromRepr, Display)]
#[repr(u32)]
pub enum Exception {
    SystemReset = 0x100,
    MachineCheck = 0x200,
    Dsi = 0x300,
    Isi = 0x400,
    External = 0x500,
    Alignment = 0x600,
    Program = 0x700,
    FpUnavailable = 0x800,
    Decrementer = 0x900,
    SystemCall = 0xc00,
}

impl Exception {
    #[must_use]
    pub const fn vector(self) -> u32 {
        self as u32
    }

    /// Cause reported to the crash handler, or `None` if the exception is
    /// recoverable.
    #[must_use]
    pub const fn fatal_cause(self) -> Option<&'static str> {
        match self {
            Self::SystemReset => Some("SYSTEM RESET"),
            Self::MachineCheck => Some("MACHINE CHECK"),
            Self::Dsi => Some("DSI"),
            Self::Isi => Some("ISI"),
            Self::Alignment => Some("ALIGNMENT"),
            Self::Program => Some("PROGRAM"),
            Self::FpUnavailable => Some("FLOATING POINT UNAVAILABLE"),
            Self::External | Self::Decrementer | Self::SystemCall => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VectorError {
    #[error("branch from {from:#x} to {to:#x} is out of range")]
    OutOfRange { from: u32, to: u32 },
    #[error("branch target {0:#x} is not word aligned")]
    Misaligned(u32),
}

/// Reach of a relative `b` instruction in either direction.
const BRANCH_RANGE: i64 = 1 << 25;

/// Encodes `b to` placed at address `from`.
pub fn branch_instruction(from: u32, to: u32) -> Result<u32, VectorError> {
    if !from.is_multiple_of(4) || !to.is_multiple_of(4) {
        return Err(VectorError::Misaligned(if to.is_multiple_of(4) { from } else { to }));
    }
    let offset = i64::from(to) - i64::from(from);
    if !(-BRANCH_RANGE..BRANCH_RANGE).contains(&offset) {
        return Err(VectorError::OutOfRange { from, to });
    }
    #[expect(clippy::cast_possible_truncation)]
    let field = (offset as u32) & 0x03ff_fffc;
    Ok(0x4800_0000 | field)
}

/// Points every vector at its trampoline and makes the instruction cache
/// see the new code.
///
/// The vectors live in the first page of MEM1, which is mapped cached at
/// `0x8000_0000`.
#[cfg(target_arch = "powerpc")]
pub fn install_vectors() -> Result<(), VectorError> {
    use rvl_hal::{addr, cache};
    use strum::IntoEnumIterator as _;

    for exception in Exception::iter() {
        let at = addr::cached(exception.vector() as usize);
        let stub = trampoline::stub_for(exception);
        #[expect(clippy::cast_possible_truncation)]
        let insn = branch_instruction(at as u32, stub as u32)?;
        unsafe { core::ptr::with_exposed_provenance_mut::<u32>(at).write_volatile(insn) };
    }
    cache::sync_icache(addr::cached(0), 0x1000);
    Ok(())
}
