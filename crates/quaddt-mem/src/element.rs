//! Type-erased element behaviour recorded for tracked buffers.

use std::any::TypeId;
use std::fmt;
use std::mem;
use std::ptr;

/// What the registry needs to know about the element type stored in a
/// tracked buffer: its size and how to destroy one slot.
///
/// Selected once, when a buffer's first element is constructed.
#[derive(Clone, Copy)]
pub struct ElementVTable {
    type_id: TypeId,
    type_name: &'static str,
    size: usize,
    drop_slot: unsafe fn(*mut u8),
}

#[allow(unsafe_code)]
unsafe fn drop_erased<T>(slot: *mut u8) {
    drop(ptr::read_unaligned(slot.cast::<T>()));
}

impl ElementVTable {
    /// Vtable of `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            size: mem::size_of::<T>(),
            drop_slot: drop_erased::<T>,
        }
    }

    /// Element size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Element type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Destroy the element at `slot`.
    ///
    /// # Safety
    ///
    /// `slot` must hold a live element of this vtable's type, which is
    /// not used afterwards.
    #[allow(unsafe_code)]
    pub unsafe fn drop_slot(&self, slot: *mut u8) {
        (self.drop_slot)(slot)
    }
}

impl PartialEq for ElementVTable {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ElementVTable {}

impl fmt::Debug for ElementVTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementVTable")
            .field("type_name", &self.type_name)
            .field("size", &self.size)
            .finish()
    }
}
