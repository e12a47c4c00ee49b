use core::{slice, str};

use crate::{Syscall, SyscallCode, SyscallError};

/// Register image of a system call: `r0` and `r3..=r5`.
#[must_use]
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallFrame {
    pub code: u32,
    pub args: [usize; 3],
}

impl SyscallFrame {
    pub const fn new(code: u32, args: [usize; 3]) -> Self {
        Self { code, args }
    }

    /// Rebuilds the typed call from the registers.
    ///
    /// # Safety
    ///
    /// For [`SyscallCode::AssertFailed`] the first two arguments must
    /// describe a byte slice that is live for `'a`, as produced by
    /// [`Syscall::encode`] in the interrupted task.
    pub unsafe fn decode<'a>(&self) -> Result<Syscall<'a>, SyscallError> {
        let call = match SyscallCode::decode(self.code)? {
            SyscallCode::Yield => Syscall::Yield,
            SyscallCode::AssertFailed => {
                let [ptr, len, line] = self.args;
                let bytes = if ptr == 0 {
                    &[][..]
                } else {
                    unsafe { slice::from_raw_parts(ptr as *const u8, len) }
                };
                let file = str::from_utf8(bytes).unwrap_or("<invalid file name>");
                let line = u32::try_from(line).unwrap_or(u32::MAX);
                Syscall::AssertFailed { file, line }
            }
            SyscallCode::OutOfMemory => Syscall::OutOfMemory {
                size: self.args[0],
            },
        };
        Ok(call)
    }
}

impl Syscall<'_> {
    pub fn encode(&self) -> SyscallFrame {
        let args = match *self {
            Self::Yield => [0; 3],
            Self::AssertFailed { file, line } => [file.as_ptr().addr(), file.len(), line as usize],
            Self::OutOfMemory { size } => [size, 0, 0],
        };
        SyscallFrame::new(self.code() as u32, args)
    }
}

#[cfg(target_arch = "powerpc")]
pub(crate) fn invoke(frame: SyscallFrame) -> usize {
    let [a0, a1, a2] = frame.args;
    let ret: usize;
    // The exception handler restores every register except r3.
    unsafe {
        core::arch::asm!(
            "sc",
            in("r0") frame.code,
            inlateout("r3") a0 => ret,
            in("r4") a1,
            in("r5") a2,
        );
    }
    ret
}

#[cfg(not(target_arch = "powerpc"))]
pub(crate) fn invoke(_frame: SyscallFrame) -> usize {
    unimplemented!("system calls need the Broadway exception vectors")
}
