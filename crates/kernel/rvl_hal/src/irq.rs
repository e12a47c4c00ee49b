use strum::{Display, EnumCount, EnumIter, FromRepr};

/// Interrupt sources multiplexed by the processor interface.
///
/// The discriminant is the bit index in the cause and mask registers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromRepr, EnumIter, EnumCount, Display,
)]
#[repr(u8)]
pub enum IrqKind {
    GraphicsRuntime = 0,
    ResetSwitch,
    Dvd,
    Serial,
    ExternalInterface,
    AudioStreaming,
    Dsp,
    Memory,
    Video,
    PeToken,
    PeFinish,
    CommandFifo,
    Debugger,
    HighSpeedPort,
    Ipc,
}

impl IrqKind {
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit of this source in the cause and mask registers.
    #[must_use]
    pub const fn bit(self) -> u32 {
        1 << self as u32
    }
}
