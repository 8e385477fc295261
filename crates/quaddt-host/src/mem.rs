//! The pluggable data-memory handler.
//!
//! The host allocates every array data buffer through the current
//! [`MemHandler`]. Each array remembers the handler that allocated it and
//! frees through that same handler, so swapping handlers never pairs an
//! allocation with a foreign deallocation.

use std::ffi::c_void;

/// The four allocator hooks, in the host's C calling convention.
///
/// `ctx` is an opaque context pointer the host passes back unchanged.
/// `free` receives the size originally requested.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct DataMemAllocator {
    /// Opaque context passed to every hook.
    pub ctx: usize,
    /// Allocate `size` uninitialised bytes; null on failure.
    pub malloc: unsafe extern "C" fn(ctx: *mut c_void, size: usize) -> *mut c_void,
    /// Allocate `nelem * elsize` zeroed bytes; null on failure.
    pub calloc: unsafe extern "C" fn(ctx: *mut c_void, nelem: usize, elsize: usize) -> *mut c_void,
    /// Resize an allocation.
    pub realloc: unsafe extern "C" fn(ctx: *mut c_void, ptr: *mut c_void, size: usize) -> *mut c_void,
    /// Release an allocation of `size` bytes.
    pub free: unsafe extern "C" fn(ctx: *mut c_void, ptr: *mut c_void, size: usize),
}

/// A named allocator installed into the host.
#[derive(Debug)]
pub struct MemHandler {
    /// Handler name, unique per implementation.
    pub name: &'static str,
    /// Handler protocol version.
    pub version: u32,
    /// The hooks.
    pub allocator: DataMemAllocator,
}

impl MemHandler {
    /// Allocate `size` bytes through the malloc hook.
    #[allow(unsafe_code)]
    pub fn malloc(&self, size: usize) -> *mut u8 {
        // SAFETY: hooks accept any size and report failure as null.
        unsafe {
            (self.allocator.malloc)(self.ctx(), size).cast()
        }
    }

    /// Allocate `nelem * elsize` zeroed bytes through the calloc hook.
    #[allow(unsafe_code)]
    pub fn calloc(&self, nelem: usize, elsize: usize) -> *mut u8 {
        // SAFETY: hooks overflow-check the product and report failure as null.
        unsafe {
            (self.allocator.calloc)(self.ctx(), nelem, elsize).cast()
        }
    }

    /// Release `ptr`, previously returned by this handler for `size` bytes.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `malloc`/`calloc` on this same handler with
    /// the same `size`, and must not be used afterwards.
    #[allow(unsafe_code)]
    pub unsafe fn free(&self, ptr: *mut u8, size: usize) {
        (self.allocator.free)(self.ctx(), ptr.cast(), size)
    }

    fn ctx(&self) -> *mut c_void {
        self.allocator.ctx as *mut c_void
    }
}

// ── Host default handler ───────────────────────────────────────────

#[allow(unsafe_code)]
unsafe extern "C" fn default_malloc(_ctx: *mut c_void, size: usize) -> *mut c_void {
    libc::malloc(size)
}

#[allow(unsafe_code)]
unsafe extern "C" fn default_calloc(_ctx: *mut c_void, nelem: usize, elsize: usize) -> *mut c_void {
    libc::calloc(nelem, elsize)
}

#[allow(unsafe_code)]
unsafe extern "C" fn default_realloc(_ctx: *mut c_void, ptr: *mut c_void, size: usize) -> *mut c_void {
    libc::realloc(ptr, size)
}

#[allow(unsafe_code)]
unsafe extern "C" fn default_free(_ctx: *mut c_void, ptr: *mut c_void, _size: usize) {
    libc::free(ptr)
}

/// The handler the runtime starts with: the C allocator, untracked.
pub static DEFAULT_HANDLER: MemHandler = MemHandler {
    name: "default_allocator",
    version: 1,
    allocator: DataMemAllocator {
        ctx: 0,
        malloc: default_malloc,
        calloc: default_calloc,
        realloc: default_realloc,
        free: default_free,
    },
};

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    #[test]
    fn default_handler_round_trips_memory() {
        let p = DEFAULT_HANDLER.calloc(4, 8);
        assert!(!p.is_null());
        unsafe {
            assert!(std::slice::from_raw_parts(p, 32).iter().all(|&b| b == 0));
            DEFAULT_HANDLER.free(p, 32);
        }
    }

    #[test]
    fn default_handler_is_named() {
        assert_eq!(DEFAULT_HANDLER.name, "default_allocator");
        assert_eq!(DEFAULT_HANDLER.version, 1);
    }
}
