//! The register image saved on exception entry.
//!
//! The exception trampolines store it on the interrupted stack and the
//! scheduler port builds one for every new task, so its layout is shared
//! with assembly. A task's saved stack pointer is the address of its
//! context.

use core::{fmt, mem::offset_of};

use dataview::Pod;

/// One floating point register as stored by `stfd`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod)]
pub struct FloatRegister {
    pub hi: u32,
    pub lo: u32,
}

impl FloatRegister {
    #[must_use]
    pub fn bits(self) -> u64 {
        (u64::from(self.hi) << 32) | u64::from(self.lo)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod)]
pub struct Context {
    /// Stack frame header so handlers can be called on top of the record.
    pub back_chain: u32,
    pub lr_save: u32,
    /// `gpr[1]` is the interrupted stack pointer.
    pub gpr: [u32; 32],
    pub cr: u32,
    pub lr: u32,
    pub ctr: u32,
    pub xer: u32,
    /// Address execution resumes at.
    pub srr0: u32,
    /// Machine state to resume with.
    pub srr1: u32,
    /// Graphics quantization registers.
    pub gqr: [u32; 8],
    pub fpscr: FloatRegister,
    pub fpr: [FloatRegister; 32],
    _reserved: [u32; 2],
}

/// Bytes the trampolines reserve below the interrupted stack pointer.
pub const CONTEXT_SIZE: usize = size_of::<Context>();

pub const GPR_OFFSET: usize = offset_of!(Context, gpr);
pub const CR_OFFSET: usize = offset_of!(Context, cr);
pub const LR_OFFSET: usize = offset_of!(Context, lr);
pub const CTR_OFFSET: usize = offset_of!(Context, ctr);
pub const XER_OFFSET: usize = offset_of!(Context, xer);
pub const SRR0_OFFSET: usize = offset_of!(Context, srr0);
pub const SRR1_OFFSET: usize = offset_of!(Context, srr1);
pub const GQR_OFFSET: usize = offset_of!(Context, gqr);
pub const FPSCR_OFFSET: usize = offset_of!(Context, fpscr);
pub const FPR_OFFSET: usize = offset_of!(Context, fpr);

const _: () = {
    assert!(CONTEXT_SIZE == 464);
    assert!(CONTEXT_SIZE % 16 == 0);
    assert!(GPR_OFFSET == 8);
    assert!(SRR0_OFFSET == 152);
    assert!(GQR_OFFSET == 160);
    assert!(FPSCR_OFFSET == 192);
    assert!(FPR_OFFSET == 200);
};

impl Default for Context {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Context {
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            back_chain: 0,
            lr_save: 0,
            gpr: [0; 32],
            cr: 0,
            lr: 0,
            ctr: 0,
            xer: 0,
            srr0: 0,
            srr1: 0,
            gqr: [0; 8],
            fpscr: FloatRegister { hi: 0, lo: 0 },
            fpr: [FloatRegister { hi: 0, lo: 0 }; 32],
            _reserved: [0; 2],
        }
    }

    /// Stack pointer of the interrupted code.
    #[must_use]
    pub const fn stack_pointer(&self) -> u32 {
        self.gpr[1]
    }
}

/// Register dump in the layout of the crash screen.
impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "SRR0 {:08x}  SRR1 {:08x}  LR {:08x}  CR {:08x}",
            self.srr0, self.srr1, self.lr, self.cr
        )?;
        for (row, regs) in self.gpr.chunks_exact(4).enumerate() {
            for (col, value) in regs.iter().enumerate() {
                write!(f, "r{:<3}{value:08x}", row * 4 + col)?;
                if col < 3 {
                    f.write_str("  ")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
