//! IOS file-descriptor calls.
//!
//! Every call exists in three shapes:
//!
//! - a blocking one for tasks, e.g. [`Ios::read`], which parks the caller
//!   until Starlet replies;
//! - an owned asynchronous one, e.g. [`Ios::read_request`], returning a
//!   [`PendingRequest`] that owns the buffers until the reply;
//! - a raw asynchronous one, e.g. [`Ios::read_async`], where the caller
//!   provides the [`IosRequest`] storage and a [`Completion`] run by the
//!   IPC interrupt handler.
//!
//! Buffers handed to Starlet should be 32-byte aligned and padded to whole
//! cache lines: invalidating a shared line also discards whatever else the
//! CPU wrote to it.

use core::cell::Cell;

use arrayvec::ArrayVec;
use bitflags::bitflags;
use log::debug;
use rvl_hal::IpcHardware;
use rvl_params::IOCTLV_MAX_VECTORS;
use rvl_rtos::{Kernel, MAX_DELAY, Port, Semaphore, Woken};

pub use self::{
    pending::{MAX_REQUEST_BUFFERS, PendingRequest, RequestBuffers},
    request::{IoVec, IosRequest},
};
use crate::{
    error::{IosError, IosErrorKind},
    ipc::Ipc,
    message::{Complete, Completion},
};

mod pending;
mod request;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenMode: u32 {
        const READ = 1;
        const WRITE = 2;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// A descriptor returned by [`Ios::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[display("fd {_0}")]
pub struct Fd(i32);

impl Fd {
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

/// Reference point of [`Ios::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::FromRepr)]
#[repr(u32)]
pub enum Whence {
    Start = 0,
    Current = 1,
    End = 2,
}

/// Handle to the IOS API over one IPC channel.
pub struct Ios<'a, P: Port, H: IpcHardware> {
    kernel: &'a Kernel<P>,
    ipc: &'a Ipc<P, H>,
}

impl<P: Port, H: IpcHardware> Clone for Ios<'_, P, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: Port, H: IpcHardware> Copy for Ios<'_, P, H> {}

/// Completion target of a blocking call: the reply lands in `result` and
/// releases `done`.
///
/// The semaphore exists before the request is submitted, so a reply that
/// beats the caller to [`Waiter::wait`] is not lost.
pub(crate) struct Waiter<'k, P: Port> {
    done: Semaphore<'k, P>,
    result: Cell<i32>,
    finished: Cell<bool>,
}

impl<'k, P: Port> Waiter<'k, P> {
    pub(crate) const fn new(kernel: &'k Kernel<P>) -> Self {
        Self {
            done: Semaphore::counting(kernel, 1, 0),
            result: Cell::new(0),
            finished: Cell::new(false),
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.get()
    }

    pub(crate) fn wait(&self) -> i32 {
        // the request storage may only be released after the reply
        while self.done.take(MAX_DELAY).is_err() {}
        self.result.get()
    }
}

impl<P: Port> Complete for Waiter<'_, P> {
    fn complete(&self, result: i32, woken: &mut Woken) {
        self.result.set(result);
        self.finished.set(true);
        // one reply per request, so the count never overflows
        let _ = self.done.give_from_isr(woken);
    }
}

fn byte_count(ret: i32) -> usize {
    ret.unsigned_abs() as usize
}

impl<'a, P: Port, H: IpcHardware> Ios<'a, P, H> {
    #[must_use]
    pub const fn new(kernel: &'a Kernel<P>, ipc: &'a Ipc<P, H>) -> Self {
        Self { kernel, ipc }
    }

    #[must_use]
    pub const fn kernel(&self) -> &'a Kernel<P> {
        self.kernel
    }

    #[must_use]
    pub const fn ipc(&self) -> &'a Ipc<P, H> {
        self.ipc
    }

    /// Brings up the IPC channel. Later calls succeed without touching the
    /// hardware.
    pub fn initialize(&self) -> Result<(), IosError> {
        if !self.ipc.initialize() {
            debug!("IOS already initialized");
        }
        Ok(())
    }

    /// Discards cached copies of `buf` so the CPU sees what Starlet wrote.
    pub fn invalidate(&self, buf: &[u8]) {
        self.ipc.hardware().invalidate(buf.as_ptr().addr(), buf.len());
    }

    pub(crate) fn ensure_running(&self) -> Result<(), IosError> {
        if self.kernel.current_task().is_none() {
            return Err(IosErrorKind::NotReady.into());
        }
        Ok(())
    }

    /// Issues a request and blocks until its reply.
    fn call<F>(&self, issue: F) -> Result<i32, IosError>
    where
        F: FnOnce(&mut IosRequest, Completion) -> Result<(), IosError>,
    {
        self.ensure_running()?;
        let mut request = IosRequest::new();
        let waiter = Waiter::new(self.kernel);
        // both live in this frame until `wait` returns
        issue(&mut request, unsafe { Completion::object(&waiter) })?;
        IosError::check(waiter.wait())
    }

    pub fn open(&self, path: &str, mode: OpenMode) -> Result<Fd, IosError> {
        self.call(|req, done| unsafe { self.open_async(path, mode, req, done) })
            .map(Fd)
    }

    pub fn close(&self, fd: Fd) -> Result<(), IosError> {
        self.call(|req, done| unsafe { self.close_async(fd, req, done) })?;
        Ok(())
    }

    /// Returns the number of bytes read.
    pub fn read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize, IosError> {
        self.call(|req, done| unsafe { self.read_async(fd, buf, req, done) })
            .map(byte_count)
    }

    /// Returns the number of bytes written.
    pub fn write(&self, fd: Fd, buf: &[u8]) -> Result<usize, IosError> {
        self.call(|req, done| unsafe { self.write_async(fd, buf, req, done) })
            .map(byte_count)
    }

    /// Returns the new position.
    pub fn seek(&self, fd: Fd, offset: i32, whence: Whence) -> Result<u32, IosError> {
        self.call(|req, done| unsafe { self.seek_async(fd, offset, whence, req, done) })
            .map(i32::unsigned_abs)
    }

    pub fn ioctl(
        &self,
        fd: Fd,
        id: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<i32, IosError> {
        let out = (output.as_ptr().addr(), output.len());
        let ret = self.call(|req, done| unsafe { self.ioctl_async(fd, id, input, output, req, done) });
        self.ipc.hardware().invalidate(out.0, out.1);
        ret
    }

    /// Vectored ioctl. `inputs` are sent to the device and `outputs`
    /// receive its answer.
    pub fn ioctlv(
        &self,
        fd: Fd,
        id: u32,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
    ) -> Result<i32, IosError> {
        let out = outputs
            .iter()
            .take(IOCTLV_MAX_VECTORS)
            .map(|buf| (buf.as_ptr().addr(), buf.len()))
            .collect::<ArrayVec<_, IOCTLV_MAX_VECTORS>>();
        let ret = self.call(|req, done| unsafe { self.ioctlv_async(fd, id, inputs, outputs, req, done) });
        for (start, len) in out {
            self.ipc.hardware().invalidate(start, len);
        }
        ret
    }
}
