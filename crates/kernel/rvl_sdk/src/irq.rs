//! Device interrupt handlers behind the processor interface.

use core::{cell::UnsafeCell, marker::PhantomData};

use rvl_hal::{Broadway, IrqKind, pi};
use rvl_params::IRQ_COUNT;
use rvl_rtos::{InterruptGuard, Port, Woken};

/// Handles one interrupt source. Must acknowledge the source at the
/// device, and may only use the ISR forms of kernel calls.
pub type IrqHandler = fn(IrqKind, &mut Woken);

/// The cause and mask registers that multiplex device interrupts.
pub trait InterruptController: Sync {
    /// Sources that are both raised and enabled.
    fn pending(&self) -> u32;

    fn set_enabled(&self, kind: IrqKind, enabled: bool);

    fn mask_all(&self);
}

impl InterruptController for Broadway {
    fn pending(&self) -> u32 {
        pi::pending()
    }

    fn set_enabled(&self, kind: IrqKind, enabled: bool) {
        if enabled {
            pi::enable(kind);
        } else {
            pi::disable(kind);
        }
    }

    fn mask_all(&self) {
        pi::set_mask(0);
    }
}

pub struct IrqTable<P: Port, C: InterruptController> {
    controller: C,
    handlers: UnsafeCell<[Option<IrqHandler>; IRQ_COUNT]>,
    _port: PhantomData<fn() -> P>,
}

// Written only with interrupts masked by `P`.
unsafe impl<P: Port, C: InterruptController> Sync for IrqTable<P, C> {}

impl<P: Port, C: InterruptController> IrqTable<P, C> {
    pub const fn new(controller: C) -> Self {
        Self {
            controller,
            handlers: UnsafeCell::new([None; IRQ_COUNT]),
            _port: PhantomData,
        }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Installs `handler` for `kind` and unmasks the source, or masks it
    /// when `handler` is `None`. Returns the previous handler.
    pub fn install(&self, kind: IrqKind, handler: Option<IrqHandler>) -> Option<IrqHandler> {
        let _guard = InterruptGuard::<P>::new();
        let handlers = unsafe { &mut *self.handlers.get() };
        let previous = core::mem::replace(&mut handlers[kind.index()], handler);
        self.controller.set_enabled(kind, handler.is_some());
        previous
    }

    /// Masks every source. Installed handlers are kept.
    pub fn mask_all(&self) {
        let _guard = InterruptGuard::<P>::new();
        self.controller.mask_all();
    }

    /// Runs the handler of every pending source, lowest bit first.
    ///
    /// Called from the external interrupt with interrupts disabled. Stops
    /// at the first pending source without a handler and returns it.
    pub fn dispatch(&self, woken: &mut Woken) -> Result<(), IrqKind> {
        let pending = self.controller.pending();
        let handlers = unsafe { &*self.handlers.get() };
        for (index, slot) in handlers.iter().enumerate() {
            if pending & (1 << index) == 0 {
                continue;
            }
            let Some(kind) = u8::try_from(index).ok().and_then(IrqKind::from_repr) else {
                continue;
            };
            let Some(handler) = slot else {
                return Err(kind);
            };
            handler(kind, woken);
        }
        Ok(())
    }
}
