use core::{fmt::Write as _, ptr};

use arrayvec::ArrayString;
use rvl_hal::cpu::decrementer;
use rvl_params::DECREMENTER_INTERVAL;
use rvl_rtos::{Kernel, Port, SchedulerState, Woken};
use rvl_syscall::{Syscall, SyscallFrame};

use super::Exception;
use crate::{
    context::Context,
    crash,
    irq::{InterruptController, IrqTable},
};

/// Routes exceptions to the scheduler, the IRQ table and the crash
/// handler.
pub struct Dispatcher<P: Port, C: InterruptController> {
    kernel: &'static Kernel<P>,
    irqs: IrqTable<P, C>,
}

impl<P: Port, C: InterruptController> Dispatcher<P, C> {
    pub const fn new(kernel: &'static Kernel<P>, controller: C) -> Self {
        Self {
            kernel,
            irqs: IrqTable::new(controller),
        }
    }

    pub fn irqs(&self) -> &IrqTable<P, C> {
        &self.irqs
    }

    /// Handles `exception` taken with `ctx` saved, and returns the context
    /// to resume. That is `ctx` itself unless the scheduler picked another
    /// task.
    pub fn handle(&self, exception: Exception, ctx: &mut Context) -> *mut Context {
        if let Some(cause) = exception.fatal_cause() {
            crash::bug_check(cause, Some(ctx));
        }
        match exception {
            Exception::External => self.external(ctx),
            Exception::Decrementer => self.decrementer(ctx),
            Exception::SystemCall => self.system_call(ctx),
            _ => ptr::from_mut(ctx),
        }
    }

    fn external(&self, ctx: &mut Context) -> *mut Context {
        let mut woken = Woken::new();
        if let Err(kind) = self.irqs.dispatch(&mut woken) {
            log::error!("no handler for pending {kind} interrupt");
            crash::bug_check("UNHANDLED IRQ", Some(ctx));
        }
        if woken.is_set() {
            self.switch_from(ctx)
        } else {
            ptr::from_mut(ctx)
        }
    }

    fn decrementer(&self, ctx: &mut Context) -> *mut Context {
        decrementer::write(DECREMENTER_INTERVAL);
        if self.kernel.tick_from_isr() {
            self.switch_from(ctx)
        } else {
            ptr::from_mut(ctx)
        }
    }

    fn system_call(&self, ctx: &mut Context) -> *mut Context {
        let frame = SyscallFrame::new(
            ctx.gpr[0],
            [
                ctx.gpr[3] as usize,
                ctx.gpr[4] as usize,
                ctx.gpr[5] as usize,
            ],
        );
        // the caller never resumes from a call that borrows its memory.
        match unsafe { frame.decode() } {
            Ok(call) => self.serve(call, ctx),
            Err(err) => {
                log::error!("{err}");
                crash::bug_check("INVALID SYSCALL", Some(ctx))
            }
        }
    }

    fn serve(&self, call: Syscall<'_>, ctx: &mut Context) -> *mut Context {
        let mut cause = ArrayString::<128>::new();
        match call {
            Syscall::Yield => {
                ctx.gpr[3] = 0;
                return self.switch_from(ctx);
            }
            Syscall::AssertFailed { file, line } => {
                let _ = write!(cause, "ASSERT FAILED: {file}:{line}");
            }
            Syscall::OutOfMemory { size } => {
                let _ = write!(cause, "OUT OF MEMORY: {size} bytes");
            }
        }
        crash::bug_check(&cause, Some(ctx))
    }

    fn switch_from(&self, ctx: &mut Context) -> *mut Context {
        if self.kernel.scheduler_state() != SchedulerState::Running {
            return ptr::from_mut(ctx);
        }
        let saved_sp = ptr::from_mut(ctx).expose_provenance();
        ptr::with_exposed_provenance_mut(self.kernel.switch_context(saved_sp))
    }
}
