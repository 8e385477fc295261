//! The raw allocator the adapter delegates to.

/// Untracked byte allocation underneath the adapter.
pub trait RawAllocator: Sync {
    /// Allocate `size` bytes aligned for any element type; null on failure.
    fn alloc(&self, size: usize) -> *mut u8;

    /// Release memory from [`RawAllocator::alloc`].
    ///
    /// # Safety
    ///
    /// `ptr` must come from `alloc` on this allocator with the same
    /// `size`, and must not be used afterwards.
    #[allow(unsafe_code)]
    unsafe fn dealloc(&self, ptr: *mut u8, size: usize);
}

/// The C allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct LibcAllocator;

impl RawAllocator for LibcAllocator {
    #[allow(unsafe_code)]
    fn alloc(&self, size: usize) -> *mut u8 {
        // SAFETY: malloc accepts any size and reports failure as null.
        unsafe { libc::malloc(size).cast() }
    }

    #[allow(unsafe_code)]
    unsafe fn dealloc(&self, ptr: *mut u8, _size: usize) {
        libc::free(ptr.cast())
    }
}

impl<A: RawAllocator + ?Sized> RawAllocator for &A {
    fn alloc(&self, size: usize) -> *mut u8 {
        (**self).alloc(size)
    }

    #[allow(unsafe_code)]
    unsafe fn dealloc(&self, ptr: *mut u8, size: usize) {
        (**self).dealloc(ptr, size)
    }
}
