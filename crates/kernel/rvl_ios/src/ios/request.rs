//! Raw asynchronous calls over caller-provided storage.

use core::ptr::NonNull;

use rvl_hal::{IpcHardware, PhysAddr};
use rvl_params::{IOCTLV_MAX_VECTORS, IOS_MAX_PATH};
use rvl_rtos::Port;

use super::{Fd, Ios, OpenMode, Whence};
use crate::{
    error::{IosError, IosErrorKind},
    message::{Command, Completion, IpcMessage, WireMessage},
};

/// One entry of the vector table Starlet reads for an ioctlv.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoVec {
    /// Physical address of the buffer.
    pub data: usize,
    pub len: usize,
}

#[repr(C, align(32))]
struct PathBuf([u8; IOS_MAX_PATH]);

#[repr(C, align(32))]
struct VectorTable([IoVec; IOCTLV_MAX_VECTORS]);

/// Storage for one request: the message and whatever else Starlet reads
/// alongside it. The caller's path and vector table are copied here, so
/// the caller's own memory is never rewritten.
#[repr(C, align(32))]
pub struct IosRequest {
    message: IpcMessage,
    path: PathBuf,
    vectors: VectorTable,
}

impl Default for IosRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl IosRequest {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            message: IpcMessage::new(),
            path: PathBuf([0; IOS_MAX_PATH]),
            vectors: VectorTable([IoVec { data: 0, len: 0 }; IOCTLV_MAX_VECTORS]),
        }
    }

    #[must_use]
    pub const fn message(&self) -> &IpcMessage {
        &self.message
    }
}

fn phys(buf: &[u8]) -> usize {
    PhysAddr::of_slice(buf).addr()
}

/// The asynchronous calls.
///
/// Each returns once the request is queued; `done` later runs in the IPC
/// interrupt handler with Starlet's return value. An `Err` means nothing
/// was sent and `done` never runs.
///
/// # Safety
///
/// For every function here, `req` and every buffer passed must stay valid
/// and in place until `done` has run, and the caller must not touch them
/// meanwhile. Outputs must be invalidated (see [`Ios::invalidate`]) before
/// they are read.
impl<P: Port, H: IpcHardware> Ios<'_, P, H> {
    unsafe fn submit(
        &self,
        req: &mut IosRequest,
        wire: WireMessage,
        done: Completion,
    ) -> Result<(), IosError> {
        req.message.prepare(wire);
        unsafe { self.ipc.submit(NonNull::from(&mut req.message), done) }
    }

    fn flush(&self, buf: &[u8]) {
        self.ipc.hardware().flush(buf.as_ptr().addr(), buf.len());
    }

    /// Opens `path`. The path must be non-empty, free of NUL bytes and
    /// shorter than [`IOS_MAX_PATH`]; anything else fails with
    /// [`IosErrorKind::InvalidArgument`] before any request is made.
    ///
    /// # Safety
    ///
    /// See the notes on this `impl` block.
    pub unsafe fn open_async(
        &self,
        path: &str,
        mode: OpenMode,
        req: &mut IosRequest,
        done: Completion,
    ) -> Result<(), IosError> {
        let bytes = path.as_bytes();
        if bytes.is_empty() || bytes.len() >= IOS_MAX_PATH || bytes.contains(&0) {
            return Err(IosErrorKind::InvalidArgument.into());
        }
        req.path.0 = [0; IOS_MAX_PATH];
        req.path.0[..bytes.len()].copy_from_slice(bytes);
        self.flush(&req.path.0);

        let args = [phys(&req.path.0), mode.bits() as usize, 0, 0, 0];
        unsafe { self.submit(req, WireMessage::new(Command::Open, 0, args), done) }
    }

    /// # Safety
    ///
    /// See the notes on this `impl` block.
    pub unsafe fn close_async(
        &self,
        fd: Fd,
        req: &mut IosRequest,
        done: Completion,
    ) -> Result<(), IosError> {
        unsafe { self.submit(req, WireMessage::new(Command::Close, fd.raw(), [0; 5]), done) }
    }

    /// # Safety
    ///
    /// See the notes on this `impl` block.
    pub unsafe fn read_async(
        &self,
        fd: Fd,
        buf: &mut [u8],
        req: &mut IosRequest,
        done: Completion,
    ) -> Result<(), IosError> {
        // before the transfer, so no line fill races with it
        self.invalidate(buf);
        let args = [phys(buf), buf.len(), 0, 0, 0];
        unsafe { self.submit(req, WireMessage::new(Command::Read, fd.raw(), args), done) }
    }

    /// # Safety
    ///
    /// See the notes on this `impl` block.
    pub unsafe fn write_async(
        &self,
        fd: Fd,
        buf: &[u8],
        req: &mut IosRequest,
        done: Completion,
    ) -> Result<(), IosError> {
        self.flush(buf);
        let args = [phys(buf), buf.len(), 0, 0, 0];
        unsafe { self.submit(req, WireMessage::new(Command::Write, fd.raw(), args), done) }
    }

    /// # Safety
    ///
    /// See the notes on this `impl` block.
    pub unsafe fn seek_async(
        &self,
        fd: Fd,
        offset: i32,
        whence: Whence,
        req: &mut IosRequest,
        done: Completion,
    ) -> Result<(), IosError> {
        let args = [offset.cast_unsigned() as usize, whence as usize, 0, 0, 0];
        unsafe { self.submit(req, WireMessage::new(Command::Seek, fd.raw(), args), done) }
    }

    /// # Safety
    ///
    /// See the notes on this `impl` block.
    pub unsafe fn ioctl_async(
        &self,
        fd: Fd,
        id: u32,
        input: &[u8],
        output: &mut [u8],
        req: &mut IosRequest,
        done: Completion,
    ) -> Result<(), IosError> {
        self.flush(input);
        self.flush(output);
        let args = [
            id as usize,
            phys(input),
            input.len(),
            phys(output),
            output.len(),
        ];
        unsafe { self.submit(req, WireMessage::new(Command::Ioctl, fd.raw(), args), done) }
    }

    /// Vectored ioctl. At most [`IOCTLV_MAX_VECTORS`] buffers in total.
    ///
    /// # Safety
    ///
    /// See the notes on this `impl` block.
    pub unsafe fn ioctlv_async(
        &self,
        fd: Fd,
        id: u32,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
        req: &mut IosRequest,
        done: Completion,
    ) -> Result<(), IosError> {
        let total = inputs.len() + outputs.len();
        if total > IOCTLV_MAX_VECTORS {
            return Err(IosErrorKind::InvalidArgument.into());
        }

        let buffers = inputs
            .iter()
            .map(|buf| &**buf)
            .chain(outputs.iter().map(|buf| &**buf));
        for (slot, buf) in req.vectors.0.iter_mut().zip(buffers) {
            self.flush(buf);
            *slot = IoVec {
                data: phys(buf),
                len: buf.len(),
            };
        }
        let table = &req.vectors.0[..total];
        self.ipc
            .hardware()
            .flush(table.as_ptr().addr(), size_of_val(table));

        let args = [
            id as usize,
            inputs.len(),
            outputs.len(),
            PhysAddr::of_slice(table).addr(),
            0,
        ];
        unsafe { self.submit(req, WireMessage::new(Command::Ioctlv, fd.raw(), args), done) }
    }
}
