//! Fatal error reporting.
//!
//! Every unrecoverable condition ends in [`bug_check`]: fatal exceptions,
//! failed assertions, exhausted memory, stack overflows and panics. The
//! handler is replaceable; the default one writes a report through the
//! raw console sink and halts.

use core::fmt::{self, Write as _};

use rvl_hal::interrupt;

use crate::{context::Context, logger, slot::IrqSlot};

/// Receives the cause and, for exceptions, the interrupted context.
pub type CrashHandler = fn(&str, Option<&Context>) -> !;

/// Frames printed by the default handler.
pub const MAX_TRACE_DEPTH: usize = 16;

const MEM1: (u32, u32) = (0x8000_0000, 0x8180_0000);
const MEM2: (u32, u32) = (0x9000_0000, 0x9400_0000);

static HANDLER: IrqSlot<CrashHandler> = IrqSlot::new(default_handler);

/// Replaces the crash handler. Returns the previous one.
pub fn set_handler(handler: CrashHandler) -> CrashHandler {
    HANDLER.replace(handler)
}

/// Stops the system with `cause`.
pub fn bug_check(cause: &str, ctx: Option<&Context>) -> ! {
    interrupt::disable();
    let handler = HANDLER.get();
    handler(cause, ctx)
}

fn default_handler(cause: &str, ctx: Option<&Context>) -> ! {
    let _ = write_report(&mut RawWriter, cause, ctx, read_stack_word);
    loop {
        core::hint::spin_loop();
    }
}

/// Reads a word of cached main memory, refusing anything else.
fn read_stack_word(addr: u32) -> Option<u32> {
    let in_ram = [MEM1, MEM2]
        .iter()
        .any(|&(start, end)| (start..end - 3).contains(&addr));
    if !in_ram || !addr.is_multiple_of(4) {
        return None;
    }
    let ptr = core::ptr::with_exposed_provenance::<u32>(addr as usize);
    Some(unsafe { ptr.read_volatile() })
}

struct RawWriter;

impl fmt::Write for RawWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        logger::write_raw(s);
        Ok(())
    }
}

/// Return addresses found by following the stack back chain.
///
/// The word at a frame's stack pointer links to the caller's frame, and
/// the word after that link holds the return address saved by the callee.
pub(crate) struct BackChain<F> {
    sp: u32,
    remaining: usize,
    read: F,
}

impl<F> BackChain<F>
where
    F: Fn(u32) -> Option<u32>,
{
    pub(crate) fn new(sp: u32, read: F) -> Self {
        Self {
            sp,
            remaining: MAX_TRACE_DEPTH,
            read,
        }
    }
}

impl<F> Iterator for BackChain<F>
where
    F: Fn(u32) -> Option<u32>,
{
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        let caller = (self.read)(self.sp)?;
        // frames only grow towards higher addresses
        if caller <= self.sp {
            return None;
        }
        let lr = (self.read)(caller.checked_add(4)?)?;
        self.sp = caller;
        self.remaining -= 1;
        Some(lr)
    }
}

pub(crate) fn write_report<W, F>(
    out: &mut W,
    cause: &str,
    ctx: Option<&Context>,
    read: F,
) -> fmt::Result
where
    W: fmt::Write,
    F: Fn(u32) -> Option<u32>,
{
    writeln!(out, "\n*** {cause} ***")?;
    let Some(ctx) = ctx else {
        return Ok(());
    };
    write!(out, "{ctx}")?;
    writeln!(out, "STACK TRACE")?;
    writeln!(out, "  {:08x}", ctx.lr)?;
    for lr in BackChain::new(ctx.stack_pointer(), read) {
        writeln!(out, "  {lr:08x}")?;
    }
    Ok(())
}

#[cfg(all(target_arch = "powerpc", not(test)))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo<'_>) -> ! {
    let _ = writeln!(RawWriter, "\n{info}");
    bug_check("PANIC", None)
}

#[cfg(test)]
pub(crate) fn panic_on_crash() {
    fn panicking(cause: &str, _: Option<&Context>) -> ! {
        panic!("{cause}");
    }
    set_handler(panicking);
}
