//! System-call numbers and the register convention of the `sc` gate.
//!
//! The call number travels in `r0`, up to three arguments in `r3..=r5`
//! and the return value comes back in `r3`.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_arch = "powerpc", feature(asm_experimental_arch))]

use strum::{Display, EnumCount, EnumString, FromRepr};

pub use self::{error::SyscallError, register::SyscallFrame};

pub mod error;
mod register;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, EnumString, Display, EnumCount)]
#[repr(u32)]
#[strum(serialize_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum SyscallCode {
    Yield = 0,
    AssertFailed = 1,
    OutOfMemory = 2,
}

impl SyscallCode {
    pub fn decode(raw: u32) -> Result<Self, SyscallError> {
        Self::from_repr(raw).ok_or(SyscallError::InvalidCode(raw))
    }
}

/// A decoded system call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall<'a> {
    /// Gives up the CPU to the scheduler.
    Yield,
    /// Reports a failed assertion. Never returns.
    AssertFailed { file: &'a str, line: u32 },
    /// Reports an allocation failure of `size` bytes. Never returns.
    OutOfMemory { size: usize },
}

impl Syscall<'_> {
    #[must_use]
    pub fn code(&self) -> SyscallCode {
        match self {
            Self::Yield => SyscallCode::Yield,
            Self::AssertFailed { .. } => SyscallCode::AssertFailed,
            Self::OutOfMemory { .. } => SyscallCode::OutOfMemory,
        }
    }

    /// Executes the system call on the current CPU.
    pub fn invoke(self) -> usize {
        register::invoke(self.encode())
    }
}

/// Requests a context switch.
pub fn yield_now() {
    Syscall::Yield.invoke();
}

/// Reports a failed assertion at `file:line` to the crash handler.
pub fn assert_failed(file: &str, line: u32) -> ! {
    Syscall::AssertFailed { file, line }.invoke();
    // the handler does not resume the caller.
    loop {
        core::hint::spin_loop();
    }
}

/// Reports that an allocation of `size` bytes could not be satisfied.
pub fn out_of_memory(size: usize) -> ! {
    Syscall::OutOfMemory { size }.invoke();
    loop {
        core::hint::spin_loop();
    }
}
