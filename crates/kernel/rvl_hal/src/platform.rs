use crate::{
    addr::PhysAddr,
    cache::{self, CacheMaintenance},
    ipc::{self, IpcControl, IpcHardware},
    pi,
};

/// The real Broadway caches and Hollywood registers.
#[derive(Debug, Default, Clone, Copy)]
pub struct Broadway;

impl CacheMaintenance for Broadway {
    fn flush(&self, start: usize, len: usize) {
        cache::flush_dcache(start, len);
    }

    fn invalidate(&self, start: usize, len: usize) {
        cache::invalidate_dcache(start, len);
    }
}

impl IpcHardware for Broadway {
    fn control(&self) -> IpcControl {
        IpcControl::from_bits_retain(ipc::registers().ppc_ctrl.get())
    }

    fn set_control(&self, ctrl: IpcControl) {
        ipc::registers().ppc_ctrl.set(ctrl.bits());
    }

    fn post(&self, msg: PhysAddr) {
        ipc::registers().ppc_msg.set(msg.as_u32());
    }

    fn reply(&self) -> PhysAddr {
        PhysAddr::new(ipc::registers().arm_msg.get() as usize)
    }

    fn acknowledge_interrupt(&self) {
        pi::hollywood_acknowledge(pi::HOLLYWOOD_IPC_BIT);
    }

    fn enable_interrupt(&self) {
        pi::hollywood_enable(pi::HOLLYWOOD_IPC_BIT);
    }
}
