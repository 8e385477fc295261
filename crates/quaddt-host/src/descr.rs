//! Element type descriptors and their byte-level function tables.
//!
//! A [`Descr`] is what an extension hands the host to register a new
//! element type: a kind code, element size, alignment and an
//! [`ArrFuncs`] vtable through which the host reads, writes, copies,
//! compares and fills raw element storage. The layout is fixed (`repr(C)`)
//! and the descriptor must outlive the runtime.

use std::ffi::{c_int, c_void};

use quaddt_core::{ConversionError, TypeTag};

use crate::value::Value;

/// Box an element into a host object. `descr` and `tag` describe the
/// array's element type.
pub type GetItemFn = unsafe fn(data: *const u8, descr: &Descr, tag: TypeTag) -> Value;

/// Store a host object into an element slot.
pub type SetItemFn =
    unsafe fn(item: &Value, data: *mut u8, tag: TypeTag) -> Result<(), ConversionError>;

/// Copy one element (`src` may be null) and optionally byte-swap it in place.
pub type CopySwapFn = unsafe extern "C" fn(dst: *mut c_void, src: *const c_void, swap: c_int);

/// Strided bulk copy with optional byte swap; a null `src` only swaps.
pub type CopySwapNFn = unsafe extern "C" fn(
    dst: *mut c_void,
    dstride: isize,
    src: *const c_void,
    sstride: isize,
    n: isize,
    swap: c_int,
);

/// Three-way comparison: negative, zero or positive.
pub type CompareFn = unsafe extern "C" fn(a: *const c_void, b: *const c_void) -> c_int;

/// Index of the extreme element of a contiguous run, written to `out`.
pub type ArgFn = unsafe extern "C" fn(data: *const c_void, n: isize, out: *mut isize) -> c_int;

/// Whether an element is non-zero.
pub type NonzeroFn = unsafe extern "C" fn(data: *const c_void) -> bool;

/// Extend the arithmetic progression seeded by the first two elements.
pub type FillFn = unsafe extern "C" fn(data: *mut c_void, length: isize) -> c_int;

/// Set every element of a buffer to the element at `value`.
pub type FillWithScalarFn =
    unsafe extern "C" fn(buffer: *mut c_void, length: isize, value: *const c_void) -> c_int;

/// Strided inner product written to `op`.
pub type DotFn = unsafe extern "C" fn(
    ip0: *const c_void,
    is0: isize,
    ip1: *const c_void,
    is1: isize,
    op: *mut c_void,
    n: isize,
);

/// Byte-level vtable of an element type.
///
/// `getitem`, `setitem`, `copyswap` and `copyswapn` are mandatory; the
/// host refuses a descriptor without them.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ArrFuncs {
    /// Element to host object.
    pub getitem: Option<GetItemFn>,
    /// Host object to element.
    pub setitem: Option<SetItemFn>,
    /// Single-element copy/swap.
    pub copyswap: Option<CopySwapFn>,
    /// Strided copy/swap.
    pub copyswapn: Option<CopySwapNFn>,
    /// Three-way comparison used for sorting.
    pub compare: Option<CompareFn>,
    /// Index of the maximum.
    pub argmax: Option<ArgFn>,
    /// Index of the minimum.
    pub argmin: Option<ArgFn>,
    /// Non-zero test.
    pub nonzero: Option<NonzeroFn>,
    /// Progression fill.
    pub fill: Option<FillFn>,
    /// Scalar fill.
    pub fillwithscalar: Option<FillWithScalarFn>,
    /// Inner product.
    pub dotfunc: Option<DotFn>,
}

impl ArrFuncs {
    /// A table with every slot empty.
    pub const EMPTY: Self = Self {
        getitem: None,
        setitem: None,
        copyswap: None,
        copyswapn: None,
        compare: None,
        argmax: None,
        argmin: None,
        nonzero: None,
        fill: None,
        fillwithscalar: None,
        dotfunc: None,
    };
}

/// Descriptor flag: boxing elements requires the host object API.
pub const NEEDS_PYAPI: u32 = 0x10;
/// Descriptor flag: element access goes through `getitem`.
pub const USE_GETITEM: u32 = 0x20;
/// Descriptor flag: element stores go through `setitem`.
pub const USE_SETITEM: u32 = 0x40;

/// Fixed-layout type descriptor.
#[repr(C)]
#[derive(Debug)]
pub struct Descr {
    /// Name of the scalar type elements box into.
    pub name: &'static str,
    /// Kind code (`b'f'` for floating point).
    pub kind: u8,
    /// Type character.
    pub type_char: u8,
    /// Byte order (`b'='` for native).
    pub byteorder: u8,
    /// Combination of the `NEEDS_PYAPI`/`USE_*` flags.
    pub flags: u32,
    /// Element size in bytes.
    pub elsize: isize,
    /// Required alignment in bytes.
    pub alignment: isize,
    /// Byte-level vtable.
    pub f: &'static ArrFuncs,
}

impl Descr {
    /// Check the structural requirements the host places on a descriptor.
    pub fn validate(&self) -> Result<(), String> {
        if self.elsize <= 0 {
            return Err(format!("element size must be positive, got {}", self.elsize));
        }
        if self.alignment <= 0 || (self.alignment & (self.alignment - 1)) != 0 {
            return Err(format!(
                "alignment must be a power of two, got {}",
                self.alignment
            ));
        }
        if self.elsize % self.alignment != 0 {
            return Err(format!(
                "element size {} is not a multiple of alignment {}",
                self.elsize, self.alignment
            ));
        }
        let f = self.f;
        let missing = [
            ("getitem", f.getitem.is_none()),
            ("setitem", f.setitem.is_none()),
            ("copyswap", f.copyswap.is_none()),
            ("copyswapn", f.copyswapn.is_none()),
        ];
        if let Some((name, _)) = missing.iter().find(|(_, absent)| *absent) {
            return Err(format!("missing mandatory array function '{name}'"));
        }
        Ok(())
    }
}
