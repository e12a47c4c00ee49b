//! The scheduler port for the Broadway core.
//!
//! A task's saved stack pointer is the address of its [`Context`]; the
//! exception trampolines and [`BroadwayPort::start_first_task`] resume
//! one by loading it and executing `rfi`.

use core::{fmt::Write as _, ptr};

use arrayvec::ArrayString;
use rvl_hal::{
    cpu::{self, Msr},
    interrupt,
};
use rvl_rtos::{Port, TaskEntry};

use crate::{
    context::{CONTEXT_SIZE, Context},
    crash,
};

/// Bytes above a frame's stack pointer that the ABI lets leaf functions
/// use without moving it.
pub const RED_ZONE: usize = 36;

/// Stack pointers are kept 16-byte aligned.
const STACK_ALIGN: usize = 16;

#[derive(Debug)]
pub struct BroadwayPort;

unsafe impl Port for BroadwayPort {
    fn enter_critical() -> bool {
        interrupt::disable_save()
    }

    fn exit_critical(was_enabled: bool) {
        interrupt::restore(was_enabled);
    }

    fn yield_now() {
        rvl_syscall::yield_now();
    }

    unsafe fn initialize_stack(top: usize, entry: TaskEntry, arg: usize) -> usize {
        let frame = (top - RED_ZONE) & !(STACK_ALIGN - 1);
        let at = frame - CONTEXT_SIZE;
        let ctx = initial_context(at, entry, arg);
        unsafe {
            ptr::write_bytes(ptr::with_exposed_provenance_mut::<u8>(at), 0, top - at);
            ptr::with_exposed_provenance_mut::<Context>(at).write(ctx);
        }
        at
    }

    fn start_first_task(sp: usize) -> ! {
        cpu::decrementer::write(rvl_params::DECREMENTER_INTERVAL);
        resume(sp)
    }

    fn stack_overflow(name: &str) -> ! {
        let mut cause = ArrayString::<64>::new();
        let _ = write!(cause, "STACK OVERFLOW: {name}");
        crash::bug_check(&cause, None)
    }
}

#[cfg(target_arch = "powerpc")]
fn resume(sp: usize) -> ! {
    unsafe { crate::exception::resume_context(ptr::with_exposed_provenance_mut(sp)) }
}

#[cfg(not(target_arch = "powerpc"))]
fn resume(sp: usize) -> ! {
    unimplemented!("no context to resume at {sp:#x} off target")
}

/// The context a task starts from when its record sits at `at`.
fn initial_context(at: usize, entry: TaskEntry, arg: usize) -> Context {
    let (sda2, sda) = cpu::small_data_anchors();
    let mut ctx = Context::zeroed();
    ctx.gpr[1] = word(at + CONTEXT_SIZE);
    ctx.gpr[2] = sda2;
    ctx.gpr[3] = word(arg);
    ctx.gpr[13] = sda;
    ctx.srr0 = word(entry as usize);
    ctx.srr1 = Msr::TASK_INITIAL.bits();
    ctx.lr = word(task_exit_trap as usize);
    ctx
}

#[expect(clippy::cast_possible_truncation)]
const fn word(value: usize) -> u32 {
    value as u32
}

/// Where a task entry function that returns ends up.
extern "C" fn task_exit_trap() {
    log::warn!("task returned from its entry function");
    crate::system::KERNEL.park()
}
