//! In-place construction into registry-tracked buffers.

use std::ptr;

use crate::element::ElementVTable;
use crate::registry::MemoryRegistry;

/// Construct `value` in the element slot at `dst`.
///
/// If `dst` lies in a live buffer of `registry`, the slot is flagged so
/// the buffer's release destroys it; an already constructed slot has its
/// old element dropped and replaced. Memory the registry does not own
/// receives a plain write and is never destroyed.
///
/// # Safety
///
/// `dst` must be valid for writing a `T`. If the registry reports the
/// slot constructed, it must hold a live `T`.
#[allow(unsafe_code)]
pub unsafe fn construct_at<T: 'static>(registry: &MemoryRegistry, dst: *mut T, value: T) {
    match registry.mark_constructed(dst.cast(), ElementVTable::of::<T>()) {
        Some(true) => {
            let old = ptr::read_unaligned(dst);
            ptr::write_unaligned(dst, value);
            drop(old);
        }
        Some(false) | None => ptr::write_unaligned(dst, value),
    }
}

/// Flag `count` slots of `T`, `stride` bytes apart from `first`, as
/// constructed after a kernel has stored into them with plain writes.
///
/// `T: Copy` has no drop glue, so overwriting a flagged slot leaks
/// nothing. Returns the number of slots newly flagged.
pub fn mark_written<T: Copy + 'static>(
    registry: &MemoryRegistry,
    first: *const T,
    stride: isize,
    count: usize,
) -> usize {
    registry.mark_run_constructed(first.cast(), stride, count, ElementVTable::of::<T>())
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static DROPS: AtomicUsize = AtomicUsize::new(0);

    struct Counted(#[allow(dead_code)] u64);

    impl Drop for Counted {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn untracked_memory_gets_a_plain_write() {
        let reg = MemoryRegistry::new();
        let mut slot = std::mem::MaybeUninit::<u64>::uninit();
        unsafe {
            construct_at(&reg, slot.as_mut_ptr(), 42u64);
            assert_eq!(slot.assume_init(), 42);
        }
        assert_eq!(reg.stats().tracked, 0);
    }

    #[test]
    fn reconstruction_drops_the_previous_element() {
        let reg = MemoryRegistry::new();
        let mut buf = [0u64; 4];
        let base = buf.as_mut_ptr().cast::<Counted>();
        reg.register(base.cast(), 32);
        let before = DROPS.load(Ordering::SeqCst);
        unsafe {
            construct_at(&reg, base.add(1), Counted(1));
            construct_at(&reg, base.add(1), Counted(2));
        }
        assert_eq!(DROPS.load(Ordering::SeqCst) - before, 1);
        assert_eq!(reg.release(base.cast()), 1);
        assert_eq!(DROPS.load(Ordering::SeqCst) - before, 2);
    }

    #[test]
    fn written_runs_count_as_constructed() {
        let reg = MemoryRegistry::new();
        let buf = [0u64; 4];
        let base = buf.as_ptr();
        reg.register(base.cast_mut().cast(), 32);
        assert_eq!(mark_written(&reg, base, 8, 4), 4);
        assert_eq!(mark_written(&reg, base, 8, 4), 0);
        assert_eq!(reg.find_owner(base.cast()).unwrap().constructed, 4);
        assert_eq!(reg.release(base.cast_mut().cast()), 4);
    }
}
