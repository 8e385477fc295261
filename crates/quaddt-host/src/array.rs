//! Contiguous row-major arrays and the operations the host performs on
//! them through element vtables, cast tables and dispatch tables.

use std::ffi::c_void;
use std::ptr::{self, NonNull};

use quaddt_core::TypeTag;
use smallvec::SmallVec;

use crate::builtin;
use crate::descr::{ArrFuncs, Descr};
use crate::error::HostError;
use crate::mem::MemHandler;
use crate::runtime::Runtime;
use crate::scalar::BinaryOp;
use crate::ufunc::LoopFn;
use crate::value::Value;

/// Array shape.
pub type Shape = SmallVec<[usize; 4]>;

/// A contiguous array owning its data buffer.
///
/// The buffer is released through the handler that allocated it.
pub struct Array {
    tag: TypeTag,
    elsize: usize,
    shape: Shape,
    data: NonNull<u8>,
    nbytes: usize,
    handler: &'static MemHandler,
}

// SAFETY: the array exclusively owns its buffer, and handlers are
// process-wide statics callable from any thread.
#[allow(unsafe_code)]
unsafe impl Send for Array {}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Array")
            .field("tag", &self.tag)
            .field("shape", &self.shape)
            .field("handler", &self.handler.name)
            .finish_non_exhaustive()
    }
}

impl Array {
    /// Element type.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// Whether the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element size in bytes.
    pub fn elsize(&self) -> usize {
        self.elsize
    }

    /// Start of the data buffer.
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// The element bytes, `len() * elsize()` of them.
    #[allow(unsafe_code)]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: every buffer is zeroed when allocated and spans at least
        // `len * elsize` bytes; writes need `&mut self` or a fresh array.
        unsafe {
            std::slice::from_raw_parts(self.data.as_ptr(), self.len() * self.elsize)
        }
    }

    /// Name of the handler that allocated the buffer.
    pub fn handler_name(&self) -> &'static str {
        self.handler.name
    }

    #[allow(unsafe_code)]
    fn elem(&self, i: usize) -> *mut u8 {
        // SAFETY: callers bound `i` by `len()`, and the buffer spans
        // `len() * elsize` bytes.
        unsafe {
            self.data.as_ptr().add(i * self.elsize)
        }
    }

    fn check_index(&self, index: usize) -> Result<(), HostError> {
        if index >= self.len() {
            return Err(HostError::IndexOutOfBounds { index, len: self.len() });
        }
        Ok(())
    }
}

impl Drop for Array {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        // SAFETY: `data` came from this handler for `nbytes` bytes and is
        // not used after this point.
        unsafe {
            self.handler.free(self.data.as_ptr(), self.nbytes)
        }
    }
}

enum Elem {
    Builtin(quaddt_core::ScalarKind),
    User(&'static Descr),
}

fn signed(n: usize) -> isize {
    isize::try_from(n).unwrap_or(isize::MAX)
}

fn slot<T>(f: Option<T>, tag: TypeTag, func: &'static str) -> Result<T, HostError> {
    f.ok_or(HostError::MissingArrFunc { tag, func })
}

#[allow(unsafe_code)]
impl Runtime {
    fn elem_kind(&self, tag: TypeTag) -> Result<Elem, HostError> {
        if let Some(kind) = tag.builtin_kind() {
            return Ok(Elem::Builtin(kind));
        }
        self.descr(tag).map(Elem::User).ok_or(HostError::UnknownType { tag })
    }

    fn funcs(&self, tag: TypeTag) -> Result<&'static ArrFuncs, HostError> {
        match self.elem_kind(tag)? {
            Elem::User(d) => Ok(d.f),
            Elem::Builtin(_) => Err(HostError::MissingArrFunc { tag, func: "arrfuncs" }),
        }
    }

    fn allocate(&self, tag: TypeTag, shape: &[usize], zeroed: bool) -> Result<Array, HostError> {
        let elsize = match self.elem_kind(tag)? {
            Elem::Builtin(kind) => kind.size_bytes().unwrap_or(1),
            Elem::User(d) => usize::try_from(d.elsize).map_err(|_| HostError::UnknownType { tag })?,
        };
        let len: usize = shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or(HostError::AllocationFailed { bytes: usize::MAX })?;
        // Empty arrays still own one element.
        let count = len.max(1);
        let nbytes = count
            .checked_mul(elsize)
            .ok_or(HostError::AllocationFailed { bytes: usize::MAX })?;
        let handler = self.mem_handler();
        let raw = if zeroed {
            handler.calloc(count, elsize)
        } else {
            handler.malloc(nbytes)
        };
        let data = NonNull::new(raw).ok_or(HostError::AllocationFailed { bytes: nbytes })?;
        if !zeroed {
            // SAFETY: `data` spans `nbytes` writable bytes.
            unsafe {
                ptr::write_bytes(data.as_ptr(), 0, nbytes)
            };
        }
        Ok(Array { tag, elsize, shape: shape.iter().copied().collect(), data, nbytes, handler })
    }

    // ── Construction ───────────────────────────────────────────────

    /// A new array through the allocate hook. Elements read as zero bits
    /// until written.
    pub fn empty(&self, tag: TypeTag, shape: &[usize]) -> Result<Array, HostError> {
        self.allocate(tag, shape, false)
    }

    /// A new array through the zero-allocate hook.
    pub fn zeros(&self, tag: TypeTag, shape: &[usize]) -> Result<Array, HostError> {
        self.allocate(tag, shape, true)
    }

    /// A new array filled from `values` in row-major order.
    pub fn array(&self, tag: TypeTag, shape: &[usize], values: &[Value]) -> Result<Array, HostError> {
        let mut arr = self.empty(tag, shape)?;
        if values.len() != arr.len() {
            return Err(HostError::ShapeMismatch {
                reason: format!("{} values for {} elements", values.len(), arr.len()),
            });
        }
        for (i, v) in values.iter().enumerate() {
            self.set(&mut arr, i, v)?;
        }
        Ok(arr)
    }

    /// A new array with every element equal to `value`.
    pub fn full(&self, tag: TypeTag, shape: &[usize], value: &Value) -> Result<Array, HostError> {
        let mut arr = self.empty(tag, shape)?;
        if arr.is_empty() {
            return Ok(arr);
        }
        self.set(&mut arr, 0, value)?;
        match self.elem_kind(tag)? {
            Elem::User(d) => {
                let fill = slot(d.f.fillwithscalar, tag, "fillwithscalar")?;
                // The first element is the scalar; copy it out so the
                // broadcast source does not alias the buffer.
                let mut scalar = vec![0u8; arr.elsize];
                // SAFETY: element 0 exists and `scalar` is one element wide;
                // the fill writes `len` elements of the buffer.
                unsafe {
                    ptr::copy_nonoverlapping(arr.elem(0), scalar.as_mut_ptr(), arr.elsize);
                    fill(arr.elem(0).cast(), signed(arr.len()), scalar.as_ptr().cast());
                }
            }
            Elem::Builtin(_) => {
                for i in 1..arr.len() {
                    self.set(&mut arr, i, value)?;
                }
            }
        }
        Ok(arr)
    }

    /// `[start, start + step, start + 2*step, ...]` with `len` elements.
    pub fn arange(&self, tag: TypeTag, start: &Value, step: &Value, len: usize) -> Result<Array, HostError> {
        let f = self.funcs(tag)?;
        let fill = slot(f.fill, tag, "fill")?;
        let mut arr = self.empty(tag, &[len])?;
        if len == 0 {
            return Ok(arr);
        }
        let first = self.construct(tag, Some(start))?;
        self.set(&mut arr, 0, &first)?;
        if len > 1 {
            let second = self.binary_op(BinaryOp::Add, &first, step)?;
            self.set(&mut arr, 1, &second)?;
            // SAFETY: the buffer holds `len` elements, the first two set.
            unsafe {
                fill(arr.elem(0).cast(), signed(len));
            }
        }
        Ok(arr)
    }

    // ── Element access ─────────────────────────────────────────────

    /// Element `index` (row-major) as a host object.
    pub fn get(&self, arr: &Array, index: usize) -> Result<Value, HostError> {
        arr.check_index(index)?;
        match self.elem_kind(arr.tag)? {
            // SAFETY: the index is in bounds.
            Elem::Builtin(kind) => Ok(unsafe { builtin::read(kind, arr.elem(index)) }),
            Elem::User(d) => {
                let getitem = slot(d.f.getitem, arr.tag, "getitem")?;
                // SAFETY: the index is in bounds.
                let v = unsafe { getitem(arr.elem(index), d, arr.tag) };
                Ok(v)
            }
        }
    }

    /// Store `value` into element `index`.
    pub fn set(&self, arr: &mut Array, index: usize, value: &Value) -> Result<(), HostError> {
        arr.check_index(index)?;
        match self.elem_kind(arr.tag)? {
            Elem::Builtin(kind) => {
                let native;
                let value = match value {
                    Value::Foreign(_) => {
                        native = Value::Float(self.value_as_f64(value).ok_or_else(|| {
                            HostError::NoCastPath {
                                from: value.foreign_tag().unwrap_or(arr.tag),
                                to: arr.tag,
                            }
                        })?);
                        &native
                    }
                    other => other,
                };
                // SAFETY: the index is in bounds.
                unsafe {
                    builtin::write(kind, value, arr.elem(index))?
                };
            }
            Elem::User(d) => {
                let setitem = slot(d.f.setitem, arr.tag, "setitem")?;
                // SAFETY: the index is in bounds.
                unsafe {
                    setitem(value, arr.elem(index), arr.tag)?
                };
            }
        }
        Ok(())
    }

    /// Every element in row-major order.
    pub fn to_values(&self, arr: &Array) -> Result<Vec<Value>, HostError> {
        (0..arr.len()).map(|i| self.get(arr, i)).collect()
    }

    // ── Reductions and reordering ──────────────────────────────────

    /// Inner product of two 1-D arrays of the same user type.
    pub fn dot(&self, a: &Array, b: &Array) -> Result<Value, HostError> {
        if a.tag != b.tag || a.shape.len() != 1 || a.shape != b.shape {
            return Err(HostError::ShapeMismatch {
                reason: format!("dot of {:?} and {:?}", a.shape, b.shape),
            });
        }
        let dotfunc = slot(self.funcs(a.tag)?.dotfunc, a.tag, "dotfunc")?;
        let out = self.empty(a.tag, &[1])?;
        let step = signed(a.elsize);
        // SAFETY: both inputs hold `len` contiguous elements, the output one.
        unsafe {
            dotfunc(
                a.elem(0).cast(),
                step,
                b.elem(0).cast(),
                step,
                out.elem(0).cast(),
                signed(a.len()),
            );
        }
        self.get(&out, 0)
    }

    fn arg(&self, arr: &Array, max: bool) -> Result<usize, HostError> {
        let f = self.funcs(arr.tag)?;
        let func = if max {
            slot(f.argmax, arr.tag, "argmax")?
        } else {
            slot(f.argmin, arr.tag, "argmin")?
        };
        if arr.is_empty() {
            return Err(HostError::ShapeMismatch { reason: "arg-reduction of an empty array".into() });
        }
        let mut out: isize = 0;
        // SAFETY: the buffer holds `len` contiguous elements.
        unsafe {
            func(arr.elem(0).cast(), signed(arr.len()), &mut out);
        }
        usize::try_from(out).map_err(|_| HostError::IndexOutOfBounds { index: 0, len: arr.len() })
    }

    /// Flat index of the first maximum.
    pub fn argmax(&self, arr: &Array) -> Result<usize, HostError> {
        self.arg(arr, true)
    }

    /// Flat index of the first minimum.
    pub fn argmin(&self, arr: &Array) -> Result<usize, HostError> {
        self.arg(arr, false)
    }

    /// Number of non-zero elements.
    pub fn count_nonzero(&self, arr: &Array) -> Result<usize, HostError> {
        let nonzero = slot(self.funcs(arr.tag)?.nonzero, arr.tag, "nonzero")?;
        // SAFETY: every index is below `len`.
        let n = (0..arr.len())
            .filter(|&i| unsafe { nonzero(arr.elem(i).cast()) })
            .count();
        Ok(n)
    }

    /// Sort the flattened array in place with the type's comparison.
    pub fn sort(&self, arr: &mut Array) -> Result<(), HostError> {
        let compare = slot(self.funcs(arr.tag)?.compare, arr.tag, "compare")?;
        let mut order: Vec<usize> = (0..arr.len()).collect();
        // SAFETY: every index is below `len`.
        order.sort_by(|&i, &j| unsafe { compare(arr.elem(i).cast(), arr.elem(j).cast()) }.cmp(&0));
        let es = arr.elsize;
        let mut scratch = vec![0u8; arr.len() * es];
        // SAFETY: `scratch` and the buffer both span `len * elsize` bytes.
        unsafe {
            for (dst, &src) in order.iter().enumerate() {
                ptr::copy_nonoverlapping(arr.elem(src), scratch.as_mut_ptr().add(dst * es), es);
            }
            ptr::copy_nonoverlapping(scratch.as_ptr(), arr.elem(0), scratch.len());
        }
        Ok(())
    }

    fn copy_with(&self, arr: &Array, swap: bool) -> Result<Array, HostError> {
        let out = self.empty(arr.tag, &arr.shape)?;
        match self.elem_kind(arr.tag)? {
            Elem::User(d) => {
                let copyswapn = slot(d.f.copyswapn, arr.tag, "copyswapn")?;
                let step = signed(arr.elsize);
                // SAFETY: both buffers hold `len` contiguous elements.
                unsafe {
                    copyswapn(
                        out.elem(0).cast(),
                        step,
                        arr.elem(0).cast::<c_void>(),
                        step,
                        signed(arr.len()),
                        i32::from(swap),
                    );
                }
            }
            Elem::Builtin(_) => {
                // SAFETY: both buffers span `len * elsize` bytes.
                unsafe {
                    ptr::copy_nonoverlapping(arr.elem(0), out.elem(0), arr.len() * arr.elsize);
                    if swap {
                        for i in 0..arr.len() {
                            std::slice::from_raw_parts_mut(out.elem(i), arr.elsize).reverse();
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Element-wise copy.
    pub fn copy(&self, arr: &Array) -> Result<Array, HostError> {
        self.copy_with(arr, false)
    }

    /// Copy with every element byte-swapped.
    pub fn byteswap(&self, arr: &Array) -> Result<Array, HostError> {
        self.copy_with(arr, true)
    }

    // ── Casting ────────────────────────────────────────────────────

    /// Convert to element type `to`.
    pub fn cast(&self, arr: &Array, to: TypeTag) -> Result<Array, HostError> {
        if arr.tag == to {
            return self.copy(arr);
        }
        if let Some(func) = self.cast_func(arr.tag, to) {
            let out = self.empty(to, &arr.shape)?;
            // SAFETY: both buffers hold `len` contiguous elements.
            unsafe {
                func(arr.elem(0).cast(), out.elem(0).cast(), signed(arr.len()));
            }
            return Ok(out);
        }
        match (arr.tag.builtin_kind(), to.builtin_kind()) {
            (Some(_), Some(_)) => {
                let mut out = self.empty(to, &arr.shape)?;
                for i in 0..arr.len() {
                    let v = self.get(arr, i)?;
                    self.set(&mut out, i, &v)?;
                }
                Ok(out)
            }
            _ => Err(HostError::NoCastPath { from: arr.tag, to }),
        }
    }

    // ── Elementwise operations ─────────────────────────────────────

    /// Apply a registered operation. Inputs must share a shape (or, for
    /// `matmul`, be conformable matrices); inputs are safely cast to the
    /// selected loop's types first.
    pub fn call_ufunc(&self, name: &str, inputs: &[&Array]) -> Result<Vec<Array>, HostError> {
        let sig = self
            .ufunc_signature(name)
            .ok_or_else(|| HostError::UnknownUfunc { name: name.to_string() })?;
        if inputs.len() != sig.nin {
            return Err(HostError::ShapeMismatch {
                reason: format!("'{name}' takes {} inputs, got {}", sig.nin, inputs.len()),
            });
        }
        let tags: SmallVec<[TypeTag; 3]> = inputs.iter().map(|a| a.tag).collect();
        let (types, func) = self.resolve_loop(name, &tags)?;
        let mut cast_inputs: SmallVec<[Array; 2]> = SmallVec::new();
        for (a, &want) in inputs.iter().zip(&types[..sig.nin]) {
            if a.tag != want {
                cast_inputs.push(self.cast(a, want)?);
            }
        }
        let mut casted = cast_inputs.iter();
        let operands: SmallVec<[&Array; 3]> = inputs
            .iter()
            .zip(&types[..sig.nin])
            .map(|(a, &want)| if a.tag == want { Some(*a) } else { casted.next() })
            .collect::<Option<_>>()
            .ok_or_else(|| HostError::NoLoop { name: name.to_string(), types: tags.to_vec() })?;
        if sig.core.is_some() {
            return self.call_matmul(func, &operands, types[sig.nin]).map(|a| vec![a]);
        }
        let shape = operands[0].shape.clone();
        if operands.iter().any(|a| a.shape != shape) {
            return Err(HostError::ShapeMismatch {
                reason: format!("'{name}' operands differ in shape"),
            });
        }
        let outputs = types[sig.nin..]
            .iter()
            .map(|&t| self.empty(t, &shape))
            .collect::<Result<Vec<_>, _>>()?;
        let args: SmallVec<[*mut u8; 3]> = operands
            .iter()
            .map(|a| a.data.as_ptr())
            .chain(outputs.iter().map(|a| a.data.as_ptr()))
            .collect();
        let steps: SmallVec<[isize; 3]> = operands
            .iter()
            .map(|a| signed(a.elsize))
            .chain(outputs.iter().map(|a| signed(a.elsize)))
            .collect();
        let dims = [signed(operands[0].len())];
        // SAFETY: every operand buffer holds `dims[0]` contiguous elements
        // of its loop type.
        unsafe {
            func(args.as_ptr(), dims.as_ptr(), steps.as_ptr(), ptr::null_mut());
        }
        Ok(outputs)
    }

    fn call_matmul(
        &self,
        func: LoopFn,
        ops: &[&Array],
        out_tag: TypeTag,
    ) -> Result<Array, HostError> {
        let (a, b) = (ops[0], ops[1]);
        let mismatch = || HostError::ShapeMismatch {
            reason: format!("matmul of {:?} and {:?}", a.shape, b.shape),
        };
        let (batch, m, n, p) = match (a.shape.as_slice(), b.shape.as_slice()) {
            (&[m, n], &[n2, p]) if n == n2 => (1, m, n, p),
            (&[ba, m, n], &[bb, n2, p]) if ba == bb && n == n2 => (ba, m, n, p),
            _ => return Err(mismatch()),
        };
        let out_shape: Shape = if a.shape.len() == 3 {
            SmallVec::from_slice(&[batch, m, p])
        } else {
            SmallVec::from_slice(&[m, p])
        };
        let out = self.empty(out_tag, &out_shape)?;
        let (ea, eb, eo) = (signed(a.elsize), signed(b.elsize), signed(out.elsize));
        let (m_, n_, p_) = (signed(m), signed(n), signed(p));
        let dims = [signed(batch), m_, n_, p_];
        let steps = [
            m_ * n_ * ea,
            n_ * p_ * eb,
            m_ * p_ * eo,
            n_ * ea,
            ea,
            p_ * eb,
            eb,
            p_ * eo,
            eo,
        ];
        let args = [a.data.as_ptr(), b.data.as_ptr(), out.data.as_ptr()];
        // SAFETY: the strides describe contiguous row-major operands of the
        // checked shapes.
        unsafe {
            func(args.as_ptr(), dims.as_ptr(), steps.as_ptr(), ptr::null_mut());
        }
        Ok(out)
    }
}
