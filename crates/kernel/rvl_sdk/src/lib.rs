//! Runtime for applications on the Broadway core.
//!
//! [`system::initialize`] installs the exception vectors, brings up the
//! heap and the logger, and starts the scheduler with the application's
//! `main` as the first task. From then on every exception goes through
//! [`system::DISPATCHER`]: the decrementer drives the scheduler tick,
//! device interrupts run the handlers in its IRQ table, and the `sc`
//! instruction reaches the system-call gate. Anything fatal ends in
//! [`crash::bug_check`].

#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_arch = "powerpc", feature(asm_experimental_arch))]

pub use rvl_hal as hal;
pub use rvl_ios as ios;
pub use rvl_rtos as rtos;
pub use rvl_syscall as syscall;

pub use self::{
    context::Context,
    crash::CrashHandler,
    exception::{Dispatcher, Exception},
    irq::{InterruptController, IrqHandler, IrqTable},
    port::BroadwayPort,
    retrace::{Retrace, RetraceCallback},
};

pub mod context;
pub mod crash;
pub mod exception;
pub mod heap;
pub mod irq;
pub mod logger;
pub mod port;
pub mod retrace;
mod slot;
pub mod system;

/// Stops the system with "ASSERT FAILED: file:line" unless `cond` holds.
///
/// Works from tasks and interrupt handlers alike: the report is raised
/// with a system call.
#[macro_export]
macro_rules! sdk_assert {
    ($cond:expr $(,)?) => {
        if !$cond {
            $crate::syscall::assert_failed(file!(), line!());
        }
    };
}
