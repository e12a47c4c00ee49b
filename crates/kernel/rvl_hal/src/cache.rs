//! Cache maintenance over virtual address ranges.
//!
//! Ranges are widened to whole cache lines. The peer coprocessor only sees
//! memory after it was flushed, and buffers it writes by DMA must be
//! invalidated before the transfer starts so a speculative line fill cannot
//! race with it.

use rvl_params::CACHE_LINE_SIZE;

/// Data cache operations required around a DMA boundary.
pub trait CacheMaintenance {
    /// Writes back dirty lines covering `[start, start + len)`.
    fn flush(&self, start: usize, len: usize);

    /// Discards lines covering `[start, start + len)` without writing back.
    fn invalidate(&self, start: usize, len: usize);
}

/// First line address and number of lines covering a byte range.
#[must_use]
pub const fn line_span(start: usize, len: usize) -> (usize, usize) {
    if len == 0 {
        return (start & !(CACHE_LINE_SIZE - 1), 0);
    }
    let first = start & !(CACHE_LINE_SIZE - 1);
    let end = start + len;
    (first, (end - first).div_ceil(CACHE_LINE_SIZE))
}

fn for_each_line(start: usize, len: usize, mut f: impl FnMut(usize)) {
    let (first, lines) = line_span(start, len);
    for i in 0..lines {
        f(first + i * CACHE_LINE_SIZE);
    }
}

#[cfg(target_arch = "powerpc")]
mod arch {
    use core::arch::asm;

    pub fn flush_line(addr: usize) {
        unsafe {
            asm!("dcbf 0, {}", in(reg) addr, options(nostack, preserves_flags));
        }
    }

    pub fn invalidate_line(addr: usize) {
        unsafe {
            asm!("dcbi 0, {}", in(reg) addr, options(nostack, preserves_flags));
        }
    }

    pub fn invalidate_instruction_line(addr: usize) {
        unsafe {
            asm!("icbi 0, {}", in(reg) addr, options(nostack, preserves_flags));
        }
    }
}

#[cfg(not(target_arch = "powerpc"))]
mod arch {
    pub fn flush_line(_addr: usize) {}

    pub fn invalidate_line(_addr: usize) {}

    pub fn invalidate_instruction_line(_addr: usize) {}
}

/// Writes back the data cache lines covering the range.
pub fn flush_dcache(start: usize, len: usize) {
    for_each_line(start, len, arch::flush_line);
    crate::cpu::sync();
}

/// Discards the data cache lines covering the range.
pub fn invalidate_dcache(start: usize, len: usize) {
    for_each_line(start, len, arch::invalidate_line);
    crate::cpu::sync();
}

/// Makes freshly stored instructions in the range visible to instruction
/// fetch.
pub fn invalidate_icache(start: usize, len: usize) {
    for_each_line(start, len, arch::invalidate_instruction_line);
    crate::cpu::sync();
    crate::cpu::isync();
}

/// Flushes stored code out of the data cache and drops stale instructions.
pub fn sync_icache(start: usize, len: usize) {
    flush_dcache(start, len);
    invalidate_icache(start, len);
}
