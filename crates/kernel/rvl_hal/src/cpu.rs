//! Special-purpose registers and the time base.

use bitflags::bitflags;
use rvl_params::TIMEBASE_HZ;

bitflags! {
    /// Machine state register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Msr: u32 {
        /// External interrupt enable.
        const EE = 0x8000;
        /// Problem state.
        const PR = 0x4000;
        /// Floating point available.
        const FP = 0x2000;
        /// Machine check enable.
        const ME = 0x1000;
        /// Instruction address translation.
        const IR = 0x0020;
        /// Data address translation.
        const DR = 0x0010;
        /// Recoverable interrupt.
        const RI = 0x0002;

        const _ = !0;
    }
}

impl Msr {
    /// Machine state a new task starts with.
    ///
    /// Interrupts, floating point, machine checks and both translations on.
    pub const TASK_INITIAL: Self = Self::from_bits_retain(0x0001_b032);
}

#[cfg(target_arch = "powerpc")]
mod arch {
    use core::arch::asm;

    pub fn read_msr() -> u32 {
        let msr: u32;
        unsafe {
            asm!("mfmsr {}", out(reg) msr, options(nomem, nostack, preserves_flags));
        }
        msr
    }

    pub fn write_msr(msr: u32) {
        unsafe {
            asm!("mtmsr {}", "isync", in(reg) msr, options(nostack, preserves_flags));
        }
    }

    pub fn read_dec() -> u32 {
        let dec: u32;
        unsafe {
            asm!("mfspr {}, 22", out(reg) dec, options(nomem, nostack, preserves_flags));
        }
        dec
    }

    pub fn write_dec(dec: u32) {
        unsafe {
            asm!("mtspr 22, {}", in(reg) dec, options(nomem, nostack, preserves_flags));
        }
    }

    pub fn read_time_base() -> u64 {
        loop {
            let (upper, lower, again): (u32, u32, u32);
            unsafe {
                asm!(
                    "mftbu {0}",
                    "mftb {1}",
                    "mftbu {2}",
                    out(reg) upper,
                    out(reg) lower,
                    out(reg) again,
                    options(nomem, nostack, preserves_flags),
                );
            }
            // the lower half wrapped between the reads, try again.
            if upper == again {
                return (u64::from(upper) << 32) | u64::from(lower);
            }
        }
    }

    pub fn small_data_anchors() -> (u32, u32) {
        let (r2, r13): (u32, u32);
        unsafe {
            asm!(
                "mr {0}, 2",
                "mr {1}, 13",
                out(reg) r2,
                out(reg) r13,
                options(nomem, nostack, preserves_flags),
            );
        }
        (r2, r13)
    }

    pub fn sync() {
        unsafe {
            asm!("sync", options(nostack, preserves_flags));
        }
    }

    pub fn isync() {
        unsafe {
            asm!("isync", options(nostack, preserves_flags));
        }
    }
}

#[cfg(not(target_arch = "powerpc"))]
mod arch {
    use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

    static MSR: AtomicU32 = AtomicU32::new(0);
    static DEC: AtomicU32 = AtomicU32::new(u32::MAX);
    static TIME_BASE: AtomicU64 = AtomicU64::new(0);

    pub fn read_msr() -> u32 {
        MSR.load(Ordering::Relaxed)
    }

    pub fn write_msr(msr: u32) {
        MSR.store(msr, Ordering::Relaxed);
    }

    pub fn read_dec() -> u32 {
        DEC.load(Ordering::Relaxed)
    }

    pub fn write_dec(dec: u32) {
        DEC.store(dec, Ordering::Relaxed);
    }

    // Advances on every read so busy waits terminate.
    pub fn read_time_base() -> u64 {
        TIME_BASE.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn small_data_anchors() -> (u32, u32) {
        (0, 0)
    }

    pub fn sync() {}

    pub fn isync() {}
}

pub mod msr {
    use super::{Msr, arch};

    #[must_use]
    pub fn read() -> Msr {
        Msr::from_bits_retain(arch::read_msr())
    }

    pub fn write(msr: Msr) {
        arch::write_msr(msr.bits());
    }
}

pub mod decrementer {
    use super::arch;

    #[must_use]
    pub fn read() -> u32 {
        arch::read_dec()
    }

    /// Loads the decrementer. An exception is raised when it passes zero.
    pub fn write(value: u32) {
        arch::write_dec(value);
    }
}

/// Reads the 64-bit time base.
#[must_use]
pub fn time_base() -> u64 {
    arch::read_time_base()
}

/// The EABI small-data base registers `r2` and `r13`.
///
/// Every context must carry the values the image was linked with.
#[must_use]
pub fn small_data_anchors() -> (u32, u32) {
    arch::small_data_anchors()
}

/// Waits for all outstanding memory accesses.
pub fn sync() {
    arch::sync();
}

/// Discards prefetched instructions.
pub fn isync() {
    arch::isync();
}

#[must_use]
pub const fn us_to_ticks(us: u64) -> u64 {
    TIMEBASE_HZ as u64 / 1_000_000 * us
}

#[must_use]
pub const fn ms_to_ticks(ms: u64) -> u64 {
    TIMEBASE_HZ as u64 / 1000 * ms
}

#[must_use]
pub const fn secs_to_ticks(secs: u64) -> u64 {
    TIMEBASE_HZ as u64 * secs
}

/// Spins until `ticks` time-base ticks have passed.
///
/// Does not yield; use the scheduler's delay from tasks.
pub fn busy_delay(ticks: u64) {
    let stop = time_base().saturating_add(ticks);
    while time_base() < stop {
        core::hint::spin_loop();
    }
}
