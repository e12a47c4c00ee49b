//! Global allocator over the heap region the linker script leaves free.

use core::{
    alloc::{GlobalAlloc, Layout},
    cell::UnsafeCell,
    ptr::NonNull,
    sync::atomic::{AtomicBool, Ordering},
};

use linked_list_allocator::Heap;
use rvl_hal::interrupt;

/// First-fit heap, locked by masking interrupts.
pub struct SdkHeap {
    inner: UnsafeCell<Heap>,
    initialized: AtomicBool,
}

unsafe impl Sync for SdkHeap {}

impl Default for SdkHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl SdkHeap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(Heap::empty()),
            initialized: AtomicBool::new(false),
        }
    }

    fn with_heap<R>(&self, f: impl FnOnce(&mut Heap) -> R) -> R {
        interrupt::with_push_disabled(|| f(unsafe { &mut *self.inner.get() }))
    }

    /// Hands `[start, start + size)` to the allocator. Later calls are
    /// ignored.
    ///
    /// # Safety
    ///
    /// The range must be writable, unused by anything else, and live for
    /// the rest of the program.
    pub unsafe fn init(&self, start: *mut u8, size: usize) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            log::warn!("heap already initialized");
            return;
        }
        self.with_heap(|heap| unsafe { heap.init(start, size) });
        log::debug!("heap: {size:#x} bytes at {start:p}");
    }

    /// Allocates without reporting failure.
    pub fn try_allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        self.with_heap(|heap| heap.allocate_first_fit(layout).ok())
    }

    /// # Safety
    ///
    /// `ptr` must come from [`SdkHeap::try_allocate`] on this heap with the
    /// same `layout`.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.with_heap(|heap| unsafe { heap.deallocate(ptr, layout) });
    }

    /// Bytes handed out and bytes still free.
    #[must_use]
    pub fn usage(&self) -> (usize, usize) {
        self.with_heap(|heap| (heap.used(), heap.free()))
    }
}

unsafe impl GlobalAlloc for SdkHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        match self.try_allocate(layout) {
            Some(ptr) => ptr.as_ptr(),
            None => rvl_syscall::out_of_memory(layout.size()),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            unsafe { self.deallocate(ptr, layout) };
        }
    }
}

#[cfg(all(target_arch = "powerpc", not(test)))]
#[global_allocator]
static HEAP: SdkHeap = SdkHeap::new();

/// Gives the region between `__heap_start` and `__heap_end` to the global
/// allocator.
#[cfg(all(target_arch = "powerpc", not(test)))]
pub(crate) fn init() {
    unsafe extern "C" {
        static mut __heap_start: u8;
        static mut __heap_end: u8;
    }

    let start = &raw mut __heap_start;
    let end = &raw mut __heap_end;
    let size = end.addr() - start.addr();
    unsafe { HEAP.init(start, size) };
}
