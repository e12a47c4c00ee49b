use core::cell::UnsafeCell;

use rvl_hal::interrupt;

/// A replaceable value read by interrupt handlers.
///
/// Accesses mask external interrupts, which is exclusive access on a single
/// core.
pub(crate) struct IrqSlot<T: Copy> {
    value: UnsafeCell<T>,
}

unsafe impl<T: Copy + Send> Sync for IrqSlot<T> {}

impl<T: Copy> IrqSlot<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value),
        }
    }

    pub(crate) fn get(&self) -> T {
        interrupt::with_push_disabled(|| unsafe { *self.value.get() })
    }

    /// Stores `value` and returns the previous one.
    pub(crate) fn replace(&self, value: T) -> T {
        interrupt::with_push_disabled(|| unsafe { self.value.get().replace(value) })
    }
}
