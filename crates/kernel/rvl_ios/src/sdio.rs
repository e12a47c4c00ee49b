//! The SD card slot, driven through Starlet's SDIO host-controller device.
//!
//! One [`Sdio`] owns one descriptor. Every operation holds the driver mutex
//! for the whole IOS call, so tasks may share the slot.

use bitflags::bitflags;
use dataview::{Pod, PodMethods as _};
use log::{debug, error};
use rvl_hal::{IpcHardware, PhysAddr};
use rvl_rtos::{Mutex, Port, RtosError};

use crate::{
    error::IosError,
    ios::{Fd, Ios, OpenMode},
};

/// The front SD slot.
pub const SLOT0: &str = "/dev/sdio/slot0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
enum SdioIoctl {
    WriteHcRegister = 0x01,
    ReadHcRegister = 0x02,
    ResetCard = 0x04,
    SetClock = 0x06,
    SendCommand = 0x07,
    Status = 0x0b,
    ReadOcr = 0x0c,
}

bitflags! {
    /// Slot state reported by [`Sdio::status`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SdioStatus: u32 {
        const INSERTED = 0x1;
        const NOT_INSERTED = 0x2;
        const WRITE_PROTECTED = 0x4;
        const INITIALIZED = 0x1_0000;
        const SDHC = 0x10_0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SdioError {
    #[error("SDIO device is not open")]
    NotOpen,
    #[error(transparent)]
    Ios(#[from] IosError),
    #[error("SDIO lock failed: {0}")]
    Lock(#[from] RtosError),
}

#[repr(C, align(32))]
struct Aligned<T>(T);

/// Host-controller register access record.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod)]
struct HcRegisterAccess {
    reg: u32,
    _reserved: [u32; 2],
    size: u32,
    value: u32,
    _pad: u32,
}

/// The record Starlet reads for [`Sdio::send_command`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod)]
pub struct SdioCommand {
    pub command: u32,
    pub command_type: u32,
    pub response_type: u32,
    pub argument: u32,
    pub block_count: u32,
    pub block_size: u32,
    pub dma_addr: u32,
    pub is_dma: u32,
    pub pad: u32,
}

/// An SD command without its data phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdCommand {
    pub index: u32,
    pub command_type: u32,
    pub response_type: u32,
    pub argument: u32,
}

/// Data phase of a command: `block_count` blocks of `block_size` bytes
/// moved through `buf`, in whichever direction the command implies.
#[derive(Debug)]
pub struct DataTransfer<'b> {
    pub buf: &'b mut [u8],
    pub block_count: u32,
    pub block_size: u32,
}

pub struct Sdio<'a, P: Port, H: IpcHardware> {
    ios: Ios<'a, P, H>,
    fd: Mutex<'a, P, Option<Fd>>,
}

impl<'a, P: Port, H: IpcHardware> Sdio<'a, P, H> {
    #[must_use]
    pub const fn new(ios: Ios<'a, P, H>) -> Self {
        Self {
            ios,
            fd: Mutex::new(ios.kernel(), None),
        }
    }

    /// Opens `device`, usually [`SLOT0`]. Does nothing if already open.
    pub fn open(&self, device: &str) -> Result<(), SdioError> {
        let mut fd = self.fd.lock()?;
        if fd.is_some() {
            debug!("{device} already open");
            return Ok(());
        }
        match self.ios.open(device, OpenMode::READ_WRITE) {
            Ok(opened) => {
                *fd = Some(opened);
                Ok(())
            }
            Err(e) => {
                error!("opening {device} failed: {e}");
                Err(e.into())
            }
        }
    }

    pub fn close(&self) -> Result<(), SdioError> {
        let mut fd = self.fd.lock()?;
        if let Some(open) = fd.take() {
            self.ios.close(open)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.fd.lock().is_ok_and(|fd| fd.is_some())
    }

    fn with_fd<T>(&self, f: impl FnOnce(Fd) -> Result<T, IosError>) -> Result<T, SdioError> {
        let fd = self.fd.lock()?;
        let open = (*fd).ok_or(SdioError::NotOpen)?;
        Ok(f(open)?)
    }

    fn ioctl(&self, id: SdioIoctl, input: &[u8], output: &mut [u8]) -> Result<i32, SdioError> {
        self.with_fd(|fd| self.ios.ioctl(fd, id as u32, input, output))
    }

    fn ioctl_word(&self, id: SdioIoctl, input: &[u8]) -> Result<u32, SdioError> {
        let mut word = Aligned(0_u32);
        self.ioctl(id, input, word.0.as_bytes_mut())?;
        Ok(word.0)
    }

    pub fn status(&self) -> Result<SdioStatus, SdioError> {
        self.ioctl_word(SdioIoctl::Status, &[])
            .map(SdioStatus::from_bits_retain)
    }

    /// Resets the card. Returns the CMD3 response: the relative card
    /// address in the upper half, stuff bits in the lower.
    pub fn reset_card(&self) -> Result<u32, SdioError> {
        self.ioctl_word(SdioIoctl::ResetCard, &[])
    }

    /// The card's operating conditions register.
    pub fn read_ocr(&self) -> Result<u32, SdioError> {
        self.ioctl_word(SdioIoctl::ReadOcr, &[])
    }

    /// Reads `size` bytes of host-controller register `reg`.
    pub fn read_hc_register(&self, reg: u32, size: u32) -> Result<u32, SdioError> {
        let access = Aligned(HcRegisterAccess {
            reg,
            size,
            ..Default::default()
        });
        self.ioctl_word(SdioIoctl::ReadHcRegister, access.0.as_bytes())
    }

    pub fn write_hc_register(&self, reg: u32, size: u32, value: u32) -> Result<(), SdioError> {
        let access = Aligned(HcRegisterAccess {
            reg,
            size,
            value,
            ..Default::default()
        });
        self.ioctl(SdioIoctl::WriteHcRegister, access.0.as_bytes(), &mut [])?;
        Ok(())
    }

    pub fn set_clock(&self, divider: u32) -> Result<(), SdioError> {
        let divider = Aligned(divider);
        self.ioctl(SdioIoctl::SetClock, divider.0.as_bytes(), &mut [])?;
        Ok(())
    }

    /// Sends `cmd` and returns the 16-byte response.
    ///
    /// Commands without a data phase go out as a plain ioctl; with one,
    /// as an ioctlv carrying the record and the buffer in, the response
    /// out.
    pub fn send_command(
        &self,
        cmd: SdCommand,
        data: Option<DataTransfer<'_>>,
    ) -> Result<[u32; 4], SdioError> {
        let mut record = Aligned(SdioCommand {
            command: cmd.index,
            command_type: cmd.command_type,
            response_type: cmd.response_type,
            argument: cmd.argument,
            ..Default::default()
        });
        let mut response = Aligned([0_u32; 4]);

        match data {
            None => {
                self.ioctl(
                    SdioIoctl::SendCommand,
                    record.0.as_bytes(),
                    response.0.as_bytes_mut(),
                )?;
            }
            Some(transfer) => {
                record.0.block_count = transfer.block_count;
                record.0.block_size = transfer.block_size;
                record.0.dma_addr = PhysAddr::of_slice(transfer.buf).as_u32();
                record.0.is_dma = 1;
                let ret = self.with_fd(|fd| {
                    self.ios.ioctlv(
                        fd,
                        SdioIoctl::SendCommand as u32,
                        &[record.0.as_bytes(), &*transfer.buf],
                        &mut [response.0.as_bytes_mut()],
                    )
                });
                // a read command filled the buffer behind the cache
                self.ios.invalidate(transfer.buf);
                ret?;
            }
        }
        Ok(response.0)
    }
}
