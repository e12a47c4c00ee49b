use alloc::boxed::Box;
use core::mem;

use arrayvec::ArrayVec;
use rvl_hal::IpcHardware;
use rvl_rtos::Port;

use super::{Fd, Ios, IosRequest, Waiter};
use crate::{error::IosError, message::Completion};

/// Most buffers one owned request carries.
pub const MAX_REQUEST_BUFFERS: usize = 2;

/// The buffers of an owned request, in argument order.
pub type RequestBuffers = ArrayVec<Box<[u8]>, MAX_REQUEST_BUFFERS>;

struct Slot<'k, P: Port> {
    request: IosRequest,
    waiter: Waiter<'k, P>,
}

/// An asynchronous request that owns its message storage and buffers.
///
/// The buffers come back from [`PendingRequest::wait`] once Starlet has
/// replied. Dropping the request before its reply blocks until the reply
/// arrives. A leaked request leaks its buffers along with it, so Starlet
/// never writes to memory that someone else owns.
#[must_use]
pub struct PendingRequest<'a, P: Port, H: IpcHardware> {
    ios: Ios<'a, P, H>,
    slot: Box<Slot<'a, P>>,
    buffers: RequestBuffers,
    /// Indices into `buffers` that Starlet writes.
    outputs: ArrayVec<usize, MAX_REQUEST_BUFFERS>,
    waited: bool,
}

impl<P: Port, H: IpcHardware> PendingRequest<'_, P, H> {
    /// Whether the reply has arrived.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slot.waiter.is_finished()
    }

    /// Blocks until the reply. Returns Starlet's result and the buffers
    /// the request was made with.
    pub fn wait(mut self) -> (Result<i32, IosError>, RequestBuffers) {
        let result = IosError::check(self.finish());
        (result, mem::take(&mut self.buffers))
    }

    fn finish(&mut self) -> i32 {
        if !self.waited {
            let result = self.slot.waiter.wait();
            for index in self.outputs.drain(..) {
                let buf = &self.buffers[index];
                self.ios.ipc.hardware().invalidate(buf.as_ptr().addr(), buf.len());
            }
            self.waited = true;
            return result;
        }
        self.slot.waiter.result.get()
    }
}

impl<P: Port, H: IpcHardware> Drop for PendingRequest<'_, P, H> {
    fn drop(&mut self) {
        self.finish();
    }
}

impl<'a, P: Port, H: IpcHardware> Ios<'a, P, H> {
    fn pending<F>(
        &self,
        mut buffers: RequestBuffers,
        outputs: &[usize],
        issue: F,
    ) -> Result<PendingRequest<'a, P, H>, IosError>
    where
        F: FnOnce(&mut IosRequest, &mut [Box<[u8]>], Completion) -> Result<(), IosError>,
    {
        self.ensure_running()?;
        let mut slot = Box::new(Slot {
            request: IosRequest::new(),
            waiter: Waiter::new(self.kernel),
        });
        // the slot and the buffers belong to the returned request; moving a
        // box does not move its contents.
        let done = unsafe { Completion::object(&slot.waiter) };
        issue(&mut slot.request, &mut buffers, done)?;
        Ok(PendingRequest {
            ios: *self,
            slot,
            buffers,
            outputs: outputs.iter().copied().collect(),
            waited: false,
        })
    }

    /// Reads into `buf` in the background.
    pub fn read_request(
        &self,
        fd: Fd,
        buf: Box<[u8]>,
    ) -> Result<PendingRequest<'a, P, H>, IosError> {
        let buffers = [buf].into_iter().collect();
        self.pending(buffers, &[0], |req, bufs, done| unsafe {
            self.read_async(fd, &mut bufs[0], req, done)
        })
    }

    /// Writes `buf` in the background.
    pub fn write_request(
        &self,
        fd: Fd,
        buf: Box<[u8]>,
    ) -> Result<PendingRequest<'a, P, H>, IosError> {
        let buffers = [buf].into_iter().collect();
        self.pending(buffers, &[], |req, bufs, done| unsafe {
            self.write_async(fd, &bufs[0], req, done)
        })
    }

    /// Issues ioctl `id` in the background. The buffers come back from
    /// [`PendingRequest::wait`] as `[input, output]`.
    pub fn ioctl_request(
        &self,
        fd: Fd,
        id: u32,
        input: Box<[u8]>,
        output: Box<[u8]>,
    ) -> Result<PendingRequest<'a, P, H>, IosError> {
        let buffers = [input, output].into_iter().collect();
        self.pending(buffers, &[1], |req, bufs, done| {
            let (input, output) = bufs.split_at_mut(1);
            unsafe { self.ioctl_async(fd, id, &input[0], &mut output[0], req, done) }
        })
    }
}
