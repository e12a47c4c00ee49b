//! Requests to the Starlet coprocessor.
//!
//! [`Ipc`] owns the doorbell pair and matches replies to the requests in
//! flight. [`Ios`] layers the IOS file-descriptor calls on top of it, each
//! in a blocking form for tasks and a raw asynchronous form whose
//! completion runs in the IPC interrupt handler. [`settings`] and
//! [`sdio`] are clients of that API.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub use self::{
    error::{IosError, IosErrorKind},
    ios::{
        Fd, IoVec, Ios, IosRequest, MAX_REQUEST_BUFFERS, OpenMode, PendingRequest, RequestBuffers,
        Whence,
    },
    ipc::Ipc,
    message::{Command, Complete, Completion, IosCallback, IpcMessage, MESSAGE_MAGIC, WireMessage},
};

mod error;
pub mod ios;
mod ipc;
mod message;
pub mod sdio;
pub mod settings;
