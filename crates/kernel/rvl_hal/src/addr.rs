//! Address-space aliases.
//!
//! Main memory is visible through two fixed windows: cached at
//! `0x8000_0000` and uncached at `0xC000_0000`. The two differ from the
//! physical address only in the top nibble.

use core::ptr;

/// Bits of a virtual address that survive translation to physical.
pub const PHYSICAL_MASK: usize = 0x0fff_ffff;

/// Base of the cached window.
pub const CACHED_BASE: usize = 0x8000_0000;

/// Base of the uncached window.
pub const UNCACHED_BASE: usize = 0xc000_0000;

/// Cached virtual address of `addr`.
#[must_use]
pub const fn cached(addr: usize) -> usize {
    (addr & PHYSICAL_MASK) | CACHED_BASE
}

/// Uncached virtual address of `addr`.
#[must_use]
pub const fn uncached(addr: usize) -> usize {
    (addr & PHYSICAL_MASK) | UNCACHED_BASE
}

/// Physical address of `addr`.
#[must_use]
pub const fn physical(addr: usize) -> usize {
    addr & PHYSICAL_MASK
}

/// An address as seen by DMA-capable peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("{_0:#010x}")]
#[repr(transparent)]
pub struct PhysAddr(usize);

impl PhysAddr {
    pub const NULL: Self = Self(0);

    #[must_use]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }

    /// The address as the 32-bit word the peer reads. Host builds keep the
    /// low half.
    #[must_use]
    #[cfg_attr(
        target_pointer_width = "64",
        expect(clippy::cast_possible_truncation, reason = "host addresses are wider")
    )]
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Physical address of the memory behind `ptr`.
    ///
    /// Host builds map addresses one to one so the peer can be simulated
    /// in-process.
    #[must_use]
    pub fn of<T>(ptr: *const T) -> Self
    where
        T: ?Sized,
    {
        let addr = ptr.expose_provenance();
        if cfg!(target_arch = "powerpc") {
            Self(physical(addr))
        } else {
            Self(addr)
        }
    }

    /// Physical address of a possibly empty slice.
    ///
    /// Empty slices map to [`PhysAddr::NULL`] so the peer never sees a
    /// dangling address.
    #[must_use]
    pub fn of_slice<T>(slice: &[T]) -> Self {
        if slice.is_empty() {
            Self::NULL
        } else {
            Self::of(slice.as_ptr())
        }
    }

    /// Cached virtual pointer to this physical address.
    #[must_use]
    pub fn to_cached_ptr<T>(self) -> *mut T {
        if cfg!(target_arch = "powerpc") {
            ptr::with_exposed_provenance_mut(cached(self.0))
        } else {
            ptr::with_exposed_provenance_mut(self.0)
        }
    }
}
