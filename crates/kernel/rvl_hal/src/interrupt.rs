//! Utilities for controlling the external interrupt enable bit.
//!
//! Broadway has a single core, so disabling external interrupts is all the
//! mutual exclusion the system needs.

use crate::cpu::{Msr, msr};

/// Enables external interrupts.
pub fn enable() {
    msr::write(msr::read() | Msr::EE);
}

/// Disables external interrupts.
pub fn disable() {
    msr::write(msr::read() - Msr::EE);
}

/// Returns `true` if external interrupts are enabled.
#[must_use]
pub fn is_enabled() -> bool {
    msr::read().contains(Msr::EE)
}

/// Clears the external interrupt enable bit and returns its previous value.
#[must_use]
pub fn disable_save() -> bool {
    let current = msr::read();
    msr::write(current - Msr::EE);
    current.contains(Msr::EE)
}

/// Re-enables external interrupts if `was_enabled`.
pub fn restore(was_enabled: bool) {
    if was_enabled {
        enable();
    }
}

/// Saves the current interrupt enable state and disables interrupts.
pub fn push_disabled() -> Guard {
    Guard {
        was_enabled: disable_save(),
    }
}

/// Guard that restores the interrupt enable state when dropped.
#[must_use]
pub struct Guard {
    was_enabled: bool,
}

impl Drop for Guard {
    fn drop(&mut self) {
        restore(self.was_enabled);
    }
}

pub fn with_push_disabled<T, F>(f: F) -> T
where
    F: FnOnce() -> T,
{
    let _guard = push_disabled();
    f()
}
