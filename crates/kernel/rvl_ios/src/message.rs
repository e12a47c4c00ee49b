//! IPC message records.

use core::{fmt, ptr::NonNull};

use rvl_rtos::Woken;

/// Base of the per-request cookies.
pub const MESSAGE_MAGIC: u32 = 0x64e0_eaed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::FromRepr)]
#[repr(u32)]
pub enum Command {
    Open = 1,
    Close = 2,
    Read = 3,
    Write = 4,
    Seek = 5,
    Ioctl = 6,
    Ioctlv = 7,
    /// Written by Starlet over the command of a completed request.
    Reply = 8,
}

/// The cache line Starlet reads and writes.
///
/// `args` are command specific:
///
/// | command | args |
/// |---|---|
/// | open | path, mode |
/// | read, write | buffer, length |
/// | seek | offset, whence |
/// | ioctl | id, input, input length, output, output length |
/// | ioctlv | id, input count, output count, vectors |
///
/// On completion Starlet sets `command` to [`Command::Reply`], moves the
/// original command into `fd` and stores the return value in `result`.
#[repr(C, align(32))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WireMessage {
    pub command: u32,
    pub result: i32,
    pub fd: i32,
    pub args: [usize; 5],
}

#[cfg(target_pointer_width = "32")]
const _: () = assert!(size_of::<WireMessage>() == rvl_params::CACHE_LINE_SIZE);

impl WireMessage {
    pub(crate) const fn new(command: Command, fd: i32, args: [usize; 5]) -> Self {
        Self {
            command: command as u32,
            result: 0,
            fd,
            args,
        }
    }

    #[must_use]
    pub fn command(&self) -> Option<Command> {
        Command::from_repr(self.command)
    }
}

/// Completion callback with one word of context. Runs in the IPC interrupt
/// handler, so it must not block.
pub type IosCallback = fn(result: i32, arg: usize, woken: &mut Woken);

/// An object that consumes the result of a request.
///
/// Runs in interrupt context: only ISR-safe kernel calls are allowed.
pub trait Complete {
    fn complete(&self, result: i32, woken: &mut Woken);
}

/// What to run when Starlet replies.
#[derive(Clone, Copy)]
pub enum Completion {
    Callback {
        func: IosCallback,
        arg: usize,
    },
    Object {
        notify: unsafe fn(NonNull<()>, i32, &mut Woken),
        target: NonNull<()>,
    },
}

impl Completion {
    #[must_use]
    pub const fn callback(func: IosCallback, arg: usize) -> Self {
        Self::Callback { func, arg }
    }

    /// Completes through `target`.
    ///
    /// # Safety
    ///
    /// `target` must stay valid until the completion has run.
    #[must_use]
    pub unsafe fn object<T: Complete>(target: &T) -> Self {
        unsafe fn notify<T: Complete>(target: NonNull<()>, result: i32, woken: &mut Woken) {
            unsafe { target.cast::<T>().as_ref() }.complete(result, woken);
        }
        Self::Object {
            notify: notify::<T>,
            target: NonNull::from(target).cast(),
        }
    }

    pub(crate) fn run(self, result: i32, woken: &mut Woken) {
        match self {
            Self::Callback { func, arg } => func(result, arg, woken),
            Self::Object { notify, target } => unsafe { notify(target, result, woken) },
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback { arg, .. } => f.debug_struct("Callback").field("arg", arg).finish(),
            Self::Object { target, .. } => f.debug_struct("Object").field("target", target).finish(),
        }
    }
}

/// One request to Starlet.
///
/// Only [`WireMessage`] is shared with the peer; the cookie and the
/// completion live in the following cache line, so invalidating the shared
/// line never discards them.
#[repr(C, align(32))]
#[derive(Debug)]
pub struct IpcMessage {
    pub(crate) wire: WireMessage,
    pub(crate) cookie: u32,
    pub(crate) completion: Option<Completion>,
}

impl Default for IpcMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl IpcMessage {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            wire: WireMessage {
                command: 0,
                result: 0,
                fd: 0,
                args: [0; 5],
            },
            cookie: 0,
            completion: None,
        }
    }

    #[must_use]
    pub const fn wire(&self) -> &WireMessage {
        &self.wire
    }

    pub(crate) fn prepare(&mut self, wire: WireMessage) {
        self.wire = wire;
    }
}
