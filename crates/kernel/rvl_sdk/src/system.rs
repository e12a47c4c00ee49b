//! The system-wide instances and bring-up.

use rvl_hal::Broadway;
use rvl_ios::{Ios, Ipc, sdio::Sdio};
use rvl_rtos::Kernel;

use crate::{exception::Dispatcher, port::BroadwayPort};

pub type SdkKernel = Kernel<BroadwayPort>;
pub type SdkIos = Ios<'static, BroadwayPort, Broadway>;

pub static KERNEL: SdkKernel = Kernel::new();

pub static IPC: Ipc<BroadwayPort, Broadway> = Ipc::new(Broadway);

pub static DISPATCHER: Dispatcher<BroadwayPort, Broadway> = Dispatcher::new(&KERNEL, Broadway);

/// The SD host controller behind `/dev/sdio/slot0`.
pub static SDIO: Sdio<'static, BroadwayPort, Broadway> = Sdio::new(Ios::new(&KERNEL, &IPC));

/// IOS calls over the system IPC channel.
#[must_use]
pub const fn ios() -> SdkIos {
    Ios::new(&KERNEL, &IPC)
}

/// Brings the system up and runs `main` as the first task.
///
/// Interrupts stay disabled until the scheduler resumes the first task.
/// Never returns; a scheduler that cannot start is a crash.
#[cfg(target_arch = "powerpc")]
pub fn initialize(main: fn()) -> ! {
    use rvl_hal::IrqKind;
    use rvl_params::{MAIN_TASK_PRIORITY, MAIN_TASK_STACK_SIZE};
    use rvl_rtos::Woken;

    use crate::{crash, exception, heap, logger};

    fn ipc_interrupt(_: IrqKind, woken: &mut Woken) {
        IPC.handle_interrupt(woken);
    }

    rvl_hal::interrupt::disable();
    heap::init();
    if logger::init(log::LevelFilter::Info).is_err() {
        logger::write_raw("logger already installed\n");
    }
    if let Err(err) = exception::install_vectors() {
        log::error!("{err}");
        crash::bug_check("VECTOR INSTALL", None);
    }

    let irqs = DISPATCHER.irqs();
    irqs.mask_all();
    irqs.install(IrqKind::Ipc, Some(ipc_interrupt));

    if let Err(err) = KERNEL.spawn("main", MAIN_TASK_PRIORITY, MAIN_TASK_STACK_SIZE, main) {
        log::error!("main task: {err}");
        crash::bug_check("MAIN TASK", None);
    }
    match KERNEL.start() {
        Ok(never) => match never {},
        Err(err) => {
            log::error!("scheduler: {err}");
            crash::bug_check("SCHEDULER START", None)
        }
    }
}
