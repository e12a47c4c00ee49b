//! Broadway CPU services and the fixed Hollywood register blocks.
//!
//! Everything that touches a special-purpose register or executes a cache
//! instruction is compiled for `target_arch = "powerpc"` only. Host builds
//! get a small simulation so the logic layered on top can be unit tested.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_arch = "powerpc", feature(asm_experimental_arch))]

pub use self::{
    addr::PhysAddr,
    cache::CacheMaintenance,
    ipc::{IpcControl, IpcHardware},
    irq::IrqKind,
    platform::Broadway,
};

pub mod addr;
pub mod cache;
pub mod cpu;
pub mod interrupt;
pub mod ipc;
pub mod irq;
pub mod pi;
mod platform;
