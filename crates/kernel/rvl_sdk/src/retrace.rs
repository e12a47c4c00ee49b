//! Vertical retrace callback.
//!
//! The video driver calls the registered callback from its interrupt
//! handler once per retrace. The callback only receives the woken flag,
//! so it can use the ISR forms of kernel calls and nothing that blocks.

use rvl_rtos::Woken;

use crate::slot::IrqSlot;

pub type RetraceCallback = fn(&mut Woken);

/// Holds the callback for one retrace interrupt source.
pub struct Retrace {
    callback: IrqSlot<Option<RetraceCallback>>,
}

impl Default for Retrace {
    fn default() -> Self {
        Self::new()
    }
}

impl Retrace {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            callback: IrqSlot::new(None),
        }
    }

    /// Registers `callback`, or removes the current one with `None`.
    /// Returns the previous callback.
    pub fn set(&self, callback: Option<RetraceCallback>) -> Option<RetraceCallback> {
        self.callback.replace(callback)
    }

    /// Runs the callback, if any. Called by the video interrupt handler.
    pub fn fire(&self, woken: &mut Woken) {
        if let Some(callback) = self.callback.get() {
            callback(woken);
        }
    }
}
