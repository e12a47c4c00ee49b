use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    ffi::CStr,
    ptr,
};

use rvl_hal::{CacheMaintenance, IpcControl, IpcHardware, PhysAddr};
use rvl_ios::{Command, IoVec, Ios, Ipc, WireMessage};
use rvl_rtos::{
    Kernel, TaskHandle, Woken,
    sim::{self, SimPort},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Flush(usize, usize),
    Invalidate(usize, usize),
    Post(PhysAddr),
    Control(IpcControl),
    Acknowledge,
}

/// Starlet's side of the doorbells.
///
/// Accepts a request when Broadway writes `X1` and raises `Y2` for it.
/// Replies are produced by the test through [`FakeStarlet::complete`].
#[derive(Default)]
pub struct FakeStarlet {
    events: RefCell<Vec<Event>>,
    ctrl: Cell<u32>,
    latched: Cell<usize>,
    reply: Cell<usize>,
    accepted: RefCell<VecDeque<PhysAddr>>,
    irq_enables: Cell<usize>,
}

impl CacheMaintenance for FakeStarlet {
    fn flush(&self, start: usize, len: usize) {
        self.events.borrow_mut().push(Event::Flush(start, len));
    }

    fn invalidate(&self, start: usize, len: usize) {
        self.events.borrow_mut().push(Event::Invalidate(start, len));
    }
}

impl IpcHardware for FakeStarlet {
    fn control(&self) -> IpcControl {
        IpcControl::from_bits_retain(self.ctrl.get())
    }

    fn set_control(&self, ctrl: IpcControl) {
        self.events.borrow_mut().push(Event::Control(ctrl));
        let status = IpcControl::Y1 | IpcControl::Y2;
        let mut next = self.control().intersection(status).difference(ctrl)
            | ctrl.intersection(IpcControl::INTERRUPT_ENABLES);
        if ctrl.contains(IpcControl::X1) {
            self.accepted
                .borrow_mut()
                .push_back(PhysAddr::new(self.latched.get()));
            next |= IpcControl::Y2;
        }
        self.ctrl.set(next.bits());
    }

    fn post(&self, msg: PhysAddr) {
        self.events.borrow_mut().push(Event::Post(msg));
        self.latched.set(msg.addr());
    }

    fn reply(&self) -> PhysAddr {
        PhysAddr::new(self.reply.get())
    }

    fn acknowledge_interrupt(&self) {
        self.events.borrow_mut().push(Event::Acknowledge);
    }

    fn enable_interrupt(&self) {
        self.irq_enables.set(self.irq_enables.get() + 1);
    }
}

impl FakeStarlet {
    /// Oldest accepted request not yet taken.
    pub fn next_request(&self) -> Option<PhysAddr> {
        self.accepted.borrow_mut().pop_front()
    }

    /// Finishes the request at `addr` the way Starlet does and raises `Y1`.
    pub fn complete(&self, addr: PhysAddr, result: i32) {
        let msg = unsafe { wire(addr) };
        msg.fd = i32::try_from(msg.command).unwrap();
        msg.command = Command::Reply as u32;
        msg.result = result;
        self.raise_reply(addr);
    }

    /// Raises `Y1` for `addr` without touching memory.
    pub fn raise_reply(&self, addr: PhysAddr) {
        self.reply.set(addr.addr());
        self.ctrl.set(self.ctrl.get() | IpcControl::Y1.bits());
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn irq_enables(&self) -> usize {
        self.irq_enables.get()
    }

    pub fn posted(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Post(_)))
            .count()
    }
}

/// The shared part of the message Starlet was handed.
pub unsafe fn wire<'m>(addr: PhysAddr) -> &'m mut WireMessage {
    unsafe { &mut *addr.to_cached_ptr::<WireMessage>() }
}

/// A buffer Starlet was handed by physical address.
pub unsafe fn buffer<'m>(addr: usize, len: usize) -> &'m mut [u8] {
    if len == 0 {
        return &mut [];
    }
    unsafe { std::slice::from_raw_parts_mut(ptr::with_exposed_provenance_mut(addr), len) }
}

/// The vector table of an ioctlv.
pub unsafe fn vectors<'m>(msg: &WireMessage) -> &'m [IoVec] {
    let count = msg.args[1] + msg.args[2];
    unsafe { std::slice::from_raw_parts(ptr::with_exposed_provenance(msg.args[3]), count) }
}

pub unsafe fn path(msg: &WireMessage) -> String {
    let path = unsafe { CStr::from_ptr(ptr::with_exposed_provenance(msg.args[0])) };
    path.to_str().unwrap().to_owned()
}

pub fn word(bytes: &[u8], index: usize) -> u32 {
    u32::from_ne_bytes(bytes[index * 4..index * 4 + 4].try_into().unwrap())
}

/// A started kernel whose only task is the one the test thread plays, and
/// an IPC channel wired to a [`FakeStarlet`].
pub struct Bench {
    pub kernel: &'static Kernel<SimPort>,
    pub ipc: &'static Ipc<SimPort, FakeStarlet>,
    pub app: TaskHandle,
}

impl Bench {
    pub fn new() -> Self {
        let kernel = sim::new_kernel();
        let app = sim::create_task(kernel, "app", 3).unwrap();
        assert_eq!(sim::start(kernel), Some(app));
        Self {
            kernel,
            ipc: Box::leak(Box::new(Ipc::new(FakeStarlet::default()))),
            app,
        }
    }

    pub fn ios(&self) -> Ios<'static, SimPort, FakeStarlet> {
        Ios::new(self.kernel, self.ipc)
    }

    pub fn starlet(&self) -> &'static FakeStarlet {
        self.ipc.hardware()
    }

    /// One IPC interrupt.
    pub fn interrupt(&self) -> Woken {
        let mut woken = Woken::new();
        self.ipc.handle_interrupt(&mut woken);
        woken
    }

    /// Lets `device` answer every request while the app is blocked.
    pub fn serve(&self, mut device: impl FnMut(&mut WireMessage) -> i32 + 'static) {
        let (kernel, ipc, app) = (self.kernel, self.ipc, self.app);
        sim::set_yield_hook(move || {
            // idle runs while the app waits
            assert_ne!(sim::reschedule(kernel), Some(app));
            let starlet = ipc.hardware();
            let mut woken = Woken::new();
            ipc.handle_interrupt(&mut woken);
            while let Some(addr) = starlet.next_request() {
                let result = device(unsafe { wire(addr) });
                starlet.complete(addr, result);
                ipc.handle_interrupt(&mut woken);
            }
            assert!(woken.is_set());
            assert_eq!(sim::reschedule(kernel), Some(app));
        });
    }
}

/// A single file that remembers what was written to it.
#[derive(Debug, Default)]
pub struct MemFile {
    pub data: Vec<u8>,
    pub pos: usize,
    pub opened: Vec<String>,
}

impl MemFile {
    pub fn handle(&mut self, msg: &mut WireMessage) -> i32 {
        let len = msg.args[1];
        match msg.command() {
            Some(Command::Open) => {
                self.opened.push(unsafe { path(msg) });
                3
            }
            Some(Command::Close) => 0,
            Some(Command::Write) => {
                let src = unsafe { buffer(msg.args[0], len) };
                let end = self.pos + len;
                if self.data.len() < end {
                    self.data.resize(end, 0);
                }
                self.data[self.pos..end].copy_from_slice(src);
                self.pos = end;
                i32::try_from(len).unwrap()
            }
            Some(Command::Read) => {
                let dst = unsafe { buffer(msg.args[0], len) };
                let n = len.min(self.data.len() - self.pos);
                dst[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
                self.pos += n;
                i32::try_from(n).unwrap()
            }
            Some(Command::Seek) => {
                let offset = u32::try_from(msg.args[0]).unwrap().cast_signed();
                let base = match msg.args[1] {
                    0 => 0,
                    1 => self.pos,
                    _ => self.data.len(),
                };
                self.pos = base.checked_add_signed(offset.try_into().unwrap()).unwrap();
                i32::try_from(self.pos).unwrap()
            }
            _ => -4,
        }
    }
}
