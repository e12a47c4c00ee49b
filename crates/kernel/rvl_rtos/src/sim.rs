//! Host-side port for tests.
//!
//! Interrupt masking is a thread-local flag and context switches are
//! bookkeeping only: the test thread plays whichever task the kernel
//! considers current. A blocking call hands control to the yield hook,
//! which plays the rest of the system (other tasks, interrupt handlers,
//! the I/O peer) and must leave the blocked task current again.

use alloc::boxed::Box;
use core::cell::{Cell, RefCell};

use rvl_params::MINIMAL_STACK_SIZE;

use crate::{Kernel, Port, RtosError, TaskEntry, TaskHandle};

/// Stack consumed by the initial context of a simulated task.
const FRAME_SIZE: usize = 0x200;

type YieldHook = Box<dyn FnMut()>;

std::thread_local! {
    static INTERRUPTS_ENABLED: Cell<bool> = const { Cell::new(true) };
    static YIELD_COUNT: Cell<usize> = const { Cell::new(0) };
    static YIELD_HOOK: RefCell<Option<YieldHook>> = const { RefCell::new(None) };
}

#[derive(Debug)]
pub struct SimPort;

unsafe impl Port for SimPort {
    fn enter_critical() -> bool {
        INTERRUPTS_ENABLED.replace(false)
    }

    fn exit_critical(was_enabled: bool) {
        if was_enabled {
            INTERRUPTS_ENABLED.set(true);
        }
    }

    fn yield_now() {
        YIELD_COUNT.set(YIELD_COUNT.get() + 1);
        // yields from inside the hook only count.
        let hook = YIELD_HOOK.with_borrow_mut(Option::take);
        if let Some(mut hook) = hook {
            hook();
            YIELD_HOOK.with_borrow_mut(|slot| {
                if slot.is_none() {
                    *slot = Some(hook);
                }
            });
        }
    }

    unsafe fn initialize_stack(top: usize, _entry: TaskEntry, _arg: usize) -> usize {
        top - FRAME_SIZE
    }

    fn start_first_task(sp: usize) -> ! {
        panic!("simulated kernel cannot resume context at {sp:#x}");
    }

    fn stack_overflow(name: &str) -> ! {
        panic!("STACK OVERFLOW: {name}");
    }
}

/// A kernel that lives for the rest of the test. Also forgets the yield
/// hook of any earlier test on this thread.
#[must_use]
pub fn new_kernel() -> &'static Kernel<SimPort> {
    clear_yield_hook();
    Box::leak(Box::new(Kernel::new()))
}

/// Creates a task with a minimal stack. Its entry is never run.
pub fn create_task(
    kernel: &Kernel<SimPort>,
    name: &str,
    priority: usize,
) -> Result<TaskHandle, RtosError> {
    extern "C" fn never_runs(_: usize) {}
    kernel.create(name, priority, MINIMAL_STACK_SIZE, never_runs, 0)
}

/// Starts scheduling without resuming any context.
pub fn start(kernel: &'static Kernel<SimPort>) -> Option<TaskHandle> {
    kernel.prepare_start().ok()?;
    kernel.current_task()
}

/// Installs `hook` to run whenever a task yields.
pub fn set_yield_hook(hook: impl FnMut() + 'static) {
    YIELD_HOOK.set(Some(Box::new(hook)));
}

pub fn clear_yield_hook() {
    YIELD_HOOK.set(None);
}

#[must_use]
pub fn yield_count() -> usize {
    YIELD_COUNT.get()
}

#[must_use]
pub fn interrupts_enabled() -> bool {
    INTERRUPTS_ENABLED.get()
}

/// Switches context as the port would on the way out of an interrupt.
/// Returns the task now current.
pub fn reschedule(kernel: &Kernel<SimPort>) -> Option<TaskHandle> {
    let sp = kernel.current_saved_sp()?;
    kernel.switch_context(sp);
    kernel.current_task()
}

/// Saved stack pointer of the current task. The `FRAME_SIZE` bytes above
/// it are real, writable stack.
#[must_use]
pub fn saved_sp(kernel: &Kernel<SimPort>) -> Option<usize> {
    kernel.current_saved_sp()
}

/// One tick interrupt. Returns `true` if it switched context.
pub fn tick(kernel: &Kernel<SimPort>) -> bool {
    let switch = kernel.tick_from_isr();
    if switch {
        reschedule(kernel);
    }
    switch
}

/// Runs the calls queued for the timer service task.
pub fn run_deferred(kernel: &Kernel<SimPort>) -> usize {
    kernel.run_deferred()
}
