//! Cast tables between element types.

use std::ffi::c_void;

use indexmap::{IndexMap, IndexSet};
use quaddt_core::{can_cast_safely, TypeTag};

/// Converts `n` contiguous elements from `from` into `to`.
pub type CastFn = unsafe extern "C" fn(from: *const c_void, to: *mut c_void, n: isize);

/// Registered cast functions and the safe-cast relation.
#[derive(Debug, Default)]
pub struct CastTable {
    funcs: IndexMap<(TypeTag, TypeTag), CastFn>,
    safe: IndexSet<(TypeTag, TypeTag)>,
}

impl CastTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the conversion function for `from -> to`.
    pub fn insert_func(&mut self, from: TypeTag, to: TypeTag, func: CastFn) {
        self.funcs.insert((from, to), func);
    }

    /// Mark `from -> to` as safe for automatic promotion.
    pub fn insert_safe(&mut self, from: TypeTag, to: TypeTag) {
        self.safe.insert((from, to));
    }

    /// The conversion function for `from -> to`.
    pub fn func(&self, from: TypeTag, to: TypeTag) -> Option<CastFn> {
        self.funcs.get(&(from, to)).copied()
    }

    /// Whether `from` can be promoted to `to` without loss.
    ///
    /// Builtin pairs follow the host's own lattice; pairs involving a
    /// user type must have been declared safe.
    pub fn can_cast(&self, from: TypeTag, to: TypeTag) -> bool {
        if from == to {
            return true;
        }
        match (from.builtin_kind(), to.builtin_kind()) {
            (Some(a), Some(b)) => can_cast_safely(a, b),
            _ => self.safe.contains(&(from, to)),
        }
    }
}
