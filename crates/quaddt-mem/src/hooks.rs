//! The allocator adapter and the host memory handler built on it.
//!
//! The host's allocator contract is non-throwing: every failure, whether
//! size arithmetic overflow or exhaustion, is reported as a null pointer
//! and never retried here.

use std::ffi::c_void;
use std::ptr;

use quaddt_host::{DataMemAllocator, MemHandler, Runtime};

use crate::raw::{LibcAllocator, RawAllocator};
use crate::registry::MemoryRegistry;

/// Allocator hooks over a raw allocator, recording every buffer in a
/// [`MemoryRegistry`].
pub struct Adapter<'r, A> {
    registry: &'r MemoryRegistry,
    raw: A,
}

impl<'r, A: RawAllocator> Adapter<'r, A> {
    /// Adapter recording into `registry`.
    pub const fn new(registry: &'r MemoryRegistry, raw: A) -> Self {
        Self { registry, raw }
    }

    /// The registry buffers are recorded in.
    pub fn registry(&self) -> &'r MemoryRegistry {
        self.registry
    }

    /// Allocate `size` bytes. Null if `size` is zero, exceeds the signed
    /// offset range, or the raw allocator fails.
    pub fn allocate(&self, size: usize) -> *mut u8 {
        if size == 0 || isize::try_from(size).is_err() {
            return ptr::null_mut();
        }
        let p = self.raw.alloc(size);
        if !p.is_null() {
            self.registry.register(p, size);
        }
        p
    }

    /// Allocate `n * elsize` zeroed bytes, overflow-checked.
    pub fn zero_allocate(&self, n: usize, elsize: usize) -> *mut u8 {
        let Some(size) = n.checked_mul(elsize) else {
            return ptr::null_mut();
        };
        if size == 0 || isize::try_from(size).is_err() {
            return ptr::null_mut();
        }
        let p = self.raw.alloc(size);
        if !p.is_null() {
            // SAFETY: `p` spans `size` freshly allocated bytes.
            #[allow(unsafe_code)]
            unsafe {
                ptr::write_bytes(p, 0, size);
            }
            self.registry.register(p, size);
        }
        p
    }

    /// Resizing a buffer is not supported: slots constructed in place
    /// cannot be relocated without their type's move semantics. Logs and
    /// aborts the process.
    pub fn reallocate(&self, ptr: *mut u8, size: usize) -> ! {
        log::error!(
            "reallocate({ptr:p}, {size}) requested on a tracked buffer; \
             resizing is not supported, aborting"
        );
        std::process::abort()
    }

    /// Destroy the buffer's constructed slots, then release its memory.
    /// No-op for a null pointer or zero size.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate`/`zero_allocate` on this adapter,
    /// with `size` the requested size, and must not be freed twice.
    #[allow(unsafe_code)]
    pub unsafe fn free(&self, ptr: *mut u8, size: usize) {
        if ptr.is_null() || size == 0 {
            return;
        }
        debug_assert!(
            self.registry.find_owner(ptr).is_some_and(|b| b.start == ptr as usize),
            "freeing {ptr:p}, which is not a live buffer"
        );
        self.registry.release(ptr);
        self.raw.dealloc(ptr, size);
    }
}

// ── Process-wide handler ───────────────────────────────────────────

static ADAPTER: Adapter<'static, LibcAllocator> =
    Adapter::new(&crate::registry::GLOBAL_REGISTRY, LibcAllocator);

/// The adapter behind [`QUADDT_MEM_HANDLER`], recording into
/// [`MemoryRegistry::global`].
pub fn global_adapter() -> &'static Adapter<'static, LibcAllocator> {
    &ADAPTER
}

#[allow(unsafe_code)]
unsafe extern "C" fn hook_malloc(_ctx: *mut c_void, size: usize) -> *mut c_void {
    ADAPTER.allocate(size).cast()
}

#[allow(unsafe_code)]
unsafe extern "C" fn hook_calloc(_ctx: *mut c_void, nelem: usize, elsize: usize) -> *mut c_void {
    ADAPTER.zero_allocate(nelem, elsize).cast()
}

#[allow(unsafe_code)]
unsafe extern "C" fn hook_realloc(_ctx: *mut c_void, ptr: *mut c_void, size: usize) -> *mut c_void {
    ADAPTER.reallocate(ptr.cast(), size)
}

#[allow(unsafe_code)]
unsafe extern "C" fn hook_free(_ctx: *mut c_void, ptr: *mut c_void, size: usize) {
    ADAPTER.free(ptr.cast(), size)
}

/// Name the handler is installed under.
pub const HANDLER_NAME: &str = "quaddt_allocator";

/// The adapter's hooks as a host memory handler.
pub static QUADDT_MEM_HANDLER: MemHandler = MemHandler {
    name: HANDLER_NAME,
    version: 1,
    allocator: DataMemAllocator {
        ctx: 0,
        malloc: hook_malloc,
        calloc: hook_calloc,
        realloc: hook_realloc,
        free: hook_free,
    },
};

/// Make the adapter the runtime's memory handler.
///
/// Idempotent: returns `false` if it was already installed. There is no
/// uninstall; arrays allocated before the switch keep freeing through
/// their own handler.
pub fn install_mem_handler(rt: &Runtime) -> bool {
    let prev = rt.set_mem_handler(&QUADDT_MEM_HANDLER);
    if ptr::eq(prev, &QUADDT_MEM_HANDLER) {
        return false;
    }
    log::info!("installed memory handler '{HANDLER_NAME}' (replacing '{}')", prev.name);
    true
}
