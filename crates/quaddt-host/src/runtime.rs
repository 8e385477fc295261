//! The host runtime: type registry, dispatch tables, cast tables and the
//! allocator-hook slot, plus the scalar number protocol.

use std::ptr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::Zero;
use quaddt_core::{RegistrationError, TypeTag};

use crate::cast::{CastFn, CastTable};
use crate::descr::Descr;
use crate::error::HostError;
use crate::mem::{MemHandler, DEFAULT_HANDLER};
use crate::scalar::{BinaryOp, CompareOp, Outcome, ScalarType, UnaryOp};
use crate::ufunc::{LoopFn, LoopTypes, UfuncSignature, UfuncTable};
use crate::value::Value;

struct UserType {
    descr: &'static Descr,
    scalar: Option<Arc<dyn ScalarType>>,
}

#[derive(Default)]
struct TypeRegistry {
    user: IndexMap<TypeTag, UserType>,
}

/// One instance of the host runtime.
///
/// Tests build private runtimes; extension code normally works with
/// [`Runtime::global`].
pub struct Runtime {
    types: RwLock<TypeRegistry>,
    ufuncs: RwLock<UfuncTable>,
    casts: RwLock<CastTable>,
    handler: Mutex<&'static MemHandler>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// A fresh runtime with builtin types, the host operation set and the
    /// default allocator.
    pub fn new() -> Self {
        Self {
            types: RwLock::new(TypeRegistry::default()),
            ufuncs: RwLock::new(UfuncTable::with_host_ufuncs()),
            casts: RwLock::new(CastTable::new()),
            handler: Mutex::new(&DEFAULT_HANDLER),
        }
    }

    /// The process-wide runtime, created on first use.
    pub fn global() -> &'static Runtime {
        static GLOBAL: OnceLock<Runtime> = OnceLock::new();
        GLOBAL.get_or_init(Runtime::new)
    }

    // ── Type registry ──────────────────────────────────────────────

    /// Register a user element type and return its tag.
    ///
    /// Registering the same descriptor again returns the tag it already
    /// has.
    pub fn register_data_type(&self, descr: &'static Descr) -> Result<TypeTag, RegistrationError> {
        descr
            .validate()
            .map_err(|reason| RegistrationError::DescriptorRejected { reason })?;
        let mut types = write(&self.types);
        if let Some((tag, _)) = types.user.iter().find(|(_, t)| ptr::eq(t.descr, descr)) {
            return Ok(*tag);
        }
        let index = i32::try_from(types.user.len()).map_err(|_| {
            RegistrationError::DescriptorRejected { reason: "type table is full".into() }
        })?;
        let tag = TypeTag(TypeTag::USER_BASE + index);
        types.user.insert(tag, UserType { descr, scalar: None });
        log::debug!(
            "registered element type {tag} (kind '{}', {} bytes)",
            descr.kind as char,
            descr.elsize
        );
        Ok(tag)
    }

    /// Bind the scalar number protocol of a registered user type.
    pub fn register_scalar_type(
        &self,
        tag: TypeTag,
        scalar: Arc<dyn ScalarType>,
    ) -> Result<(), RegistrationError> {
        let mut types = write(&self.types);
        let entry = types
            .user
            .get_mut(&tag)
            .ok_or(RegistrationError::UnknownType { tag })?;
        if entry.scalar.is_some() {
            return Err(RegistrationError::ScalarTypeExists { tag });
        }
        log::debug!("bound scalar type '{}' to {tag}", scalar.name());
        entry.scalar = Some(scalar);
        Ok(())
    }

    /// Descriptor of a user type.
    pub fn descr(&self, tag: TypeTag) -> Option<&'static Descr> {
        read(&self.types).user.get(&tag).map(|t| t.descr)
    }

    /// Scalar type bound to a user type.
    pub fn scalar_type(&self, tag: TypeTag) -> Option<Arc<dyn ScalarType>> {
        read(&self.types).user.get(&tag).and_then(|t| t.scalar.clone())
    }

    /// Whether the tag names a builtin or registered type.
    pub fn is_known(&self, tag: TypeTag) -> bool {
        tag.builtin_kind().is_some() || read(&self.types).user.contains_key(&tag)
    }

    /// Element type by name: builtin kind names or a descriptor's name.
    pub fn lookup_type(&self, name: &str) -> Option<TypeTag> {
        if let Some(tag) = TypeTag::BUILTINS
            .iter()
            .copied()
            .find(|t| t.builtin_kind().is_some_and(|k| k.name() == name))
        {
            return Some(tag);
        }
        read(&self.types)
            .user
            .iter()
            .find(|(_, t)| t.descr.name == name)
            .map(|(tag, _)| *tag)
    }

    /// Name of an element type.
    pub fn type_name(&self, tag: TypeTag) -> Option<String> {
        if let Some(kind) = tag.builtin_kind() {
            return Some(kind.name().to_string());
        }
        read(&self.types).user.get(&tag).map(|t| t.descr.name.to_string())
    }

    // ── Dispatch and cast tables ───────────────────────────────────

    /// Declared signature of an operation.
    pub fn ufunc_signature(&self, name: &str) -> Option<UfuncSignature> {
        read(&self.ufuncs).signature(name)
    }

    /// Add a loop for `user_tag` to the dispatch table of `name`.
    pub fn register_loop_for_type(
        &self,
        name: &str,
        user_tag: TypeTag,
        func: LoopFn,
        types: &[TypeTag],
    ) -> Result<(), RegistrationError> {
        if !user_tag.is_user_defined() || !self.is_known(user_tag) {
            return Err(RegistrationError::UnknownType { tag: user_tag });
        }
        if let Some(&tag) = types.iter().find(|&&t| !self.is_known(t)) {
            return Err(RegistrationError::UnknownType { tag });
        }
        write(&self.ufuncs).register_loop(name, func, types)?;
        log::debug!("registered loop {name}{types:?}");
        Ok(())
    }

    /// Number of loops registered for `name`.
    pub fn loop_count(&self, name: &str) -> usize {
        read(&self.ufuncs).loop_count(name)
    }

    pub(crate) fn resolve_loop(
        &self,
        name: &str,
        inputs: &[TypeTag],
    ) -> Result<(LoopTypes, LoopFn), HostError> {
        let casts = read(&self.casts);
        read(&self.ufuncs).resolve(name, inputs, |a, b| casts.can_cast(a, b))
    }

    /// Install the conversion function for `from -> to`.
    pub fn register_cast_func(
        &self,
        from: TypeTag,
        to: TypeTag,
        func: CastFn,
    ) -> Result<(), RegistrationError> {
        self.check_cast_pair(from, to)?;
        write(&self.casts).insert_func(from, to, func);
        Ok(())
    }

    /// Declare `from -> to` safe for automatic promotion.
    ///
    /// A cast function must already be registered for the pair.
    pub fn register_safe_cast(&self, from: TypeTag, to: TypeTag) -> Result<(), RegistrationError> {
        self.check_cast_pair(from, to)?;
        let mut casts = write(&self.casts);
        if casts.func(from, to).is_none() {
            return Err(RegistrationError::CastRejected {
                from,
                to,
                reason: "no cast function registered".into(),
            });
        }
        casts.insert_safe(from, to);
        Ok(())
    }

    fn check_cast_pair(&self, from: TypeTag, to: TypeTag) -> Result<(), RegistrationError> {
        for tag in [from, to] {
            if !self.is_known(tag) {
                return Err(RegistrationError::UnknownType { tag });
            }
        }
        if from == to {
            return Err(RegistrationError::CastRejected {
                from,
                to,
                reason: "identity casts are implicit".into(),
            });
        }
        Ok(())
    }

    /// Whether `from` promotes to `to` without loss.
    pub fn can_cast(&self, from: TypeTag, to: TypeTag) -> bool {
        read(&self.casts).can_cast(from, to)
    }

    pub(crate) fn cast_func(&self, from: TypeTag, to: TypeTag) -> Option<CastFn> {
        read(&self.casts).func(from, to)
    }

    // ── Allocator slot ─────────────────────────────────────────────

    /// The handler new arrays allocate through.
    pub fn mem_handler(&self) -> &'static MemHandler {
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the handler and return the previous one.
    ///
    /// Existing arrays keep freeing through the handler that allocated
    /// them.
    pub fn set_mem_handler(&self, handler: &'static MemHandler) -> &'static MemHandler {
        let mut slot = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, handler)
    }

    // ── Scalar protocol ────────────────────────────────────────────

    fn scalar_of(&self, v: &Value) -> Option<Arc<dyn ScalarType>> {
        v.foreign_tag().and_then(|t| self.scalar_type(t))
    }

    /// Call the user type's constructor.
    pub fn construct(&self, tag: TypeTag, arg: Option<&Value>) -> Result<Value, HostError> {
        let st = self.scalar_type(tag).ok_or(HostError::NoScalarType { tag })?;
        Ok(st.construct(arg)?)
    }

    /// Apply a unary operator.
    pub fn unary_op(&self, op: UnaryOp, a: &Value) -> Result<Value, HostError> {
        let unsupported = || HostError::UnsupportedOperand {
            op: unary_name(op),
            ty: a.type_name().to_string(),
        };
        let st = self.scalar_of(a).ok_or_else(unsupported)?;
        match st.unary(op, a) {
            Outcome::Done(v) => Ok(v),
            Outcome::NotImplemented => Err(unsupported()),
        }
    }

    fn candidates(&self, a: &Value, b: &Value) -> Vec<Arc<dyn ScalarType>> {
        let left = self.scalar_of(a);
        let right = match (a.foreign_tag(), b.foreign_tag()) {
            (Some(x), Some(y)) if x == y => None,
            _ => self.scalar_of(b),
        };
        left.into_iter().chain(right).collect()
    }

    /// Apply a binary operator: the left operand's type first, then the
    /// right operand's.
    pub fn binary_op(&self, op: BinaryOp, a: &Value, b: &Value) -> Result<Value, HostError> {
        if op == BinaryOp::Power {
            return self.power(a, b, None);
        }
        for st in self.candidates(a, b) {
            if let Outcome::Done(v) = st.binary(op, a, b)? {
                return Ok(v);
            }
        }
        Err(unsupported_pair(op.symbol(), a, b))
    }

    /// `pow(base, exp[, modulo])`.
    pub fn power(&self, base: &Value, exp: &Value, modulo: Option<&Value>) -> Result<Value, HostError> {
        for st in self.candidates(base, exp) {
            if let Outcome::Done(v) = st.power(base, exp, modulo)? {
                return Ok(v);
            }
        }
        Err(unsupported_pair("** or pow()", base, exp))
    }

    /// Rich comparison. The right operand's type is asked with the
    /// mirrored operator; equality falls back to identity.
    pub fn compare(&self, op: CompareOp, a: &Value, b: &Value) -> Result<bool, HostError> {
        if let Some(st) = self.scalar_of(a) {
            if let Outcome::Done(r) = st.compare(op, a, b)? {
                return Ok(r);
            }
        }
        let reflected = match (a.foreign_tag(), b.foreign_tag()) {
            (Some(x), Some(y)) if x == y => None,
            _ => self.scalar_of(b),
        };
        if let Some(st) = reflected {
            if let Outcome::Done(r) = st.compare(op.swapped(), b, a)? {
                return Ok(r);
            }
        }
        match op {
            CompareOp::Eq => Ok(a == b),
            CompareOp::Ne => Ok(a != b),
            _ => Err(unsupported_pair(op.symbol(), a, b)),
        }
    }

    /// Truth value.
    pub fn is_truthy(&self, v: &Value) -> bool {
        if let Some(st) = self.scalar_of(v) {
            return st.is_truthy(v);
        }
        match v {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => !i.is_zero(),
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            other => other.as_f64().is_some_and(|f| f != 0.0),
        }
    }

    /// Conversion to a native double.
    pub fn to_float(&self, v: &Value) -> Result<f64, HostError> {
        if let Some(st) = self.scalar_of(v) {
            return Ok(st.to_float(v));
        }
        v.as_f64().ok_or_else(|| HostError::UnsupportedOperand {
            op: "float()",
            ty: v.type_name().to_string(),
        })
    }

    /// Conversion to an arbitrary-precision integer.
    pub fn to_int(&self, v: &Value) -> Result<BigInt, HostError> {
        if let Some(st) = self.scalar_of(v) {
            return Ok(st.to_int(v)?);
        }
        match v {
            Value::Int(i) => Ok(i.clone()),
            Value::Float(f) if f.is_nan() => Err(quaddt_core::ConversionError::NanToInteger.into()),
            Value::Float(f) if f.is_infinite() => {
                Err(quaddt_core::ConversionError::InfinityToInteger.into())
            }
            other => other
                .as_i128()
                .map(BigInt::from)
                .ok_or_else(|| HostError::UnsupportedOperand {
                    op: "int()",
                    ty: other.type_name().to_string(),
                }),
        }
    }

    /// Textual representation.
    pub fn repr(&self, v: &Value) -> String {
        if let Some(st) = self.scalar_of(v) {
            return st.repr(v);
        }
        match v {
            Value::None => "None".into(),
            Value::Bool(true) => "True".into(),
            Value::Bool(false) => "False".into(),
            Value::Int(i) => i.to_string(),
            Value::Fixed(x) => x.to_i128().to_string(),
            Value::Float(f) => format!("{f:?}"),
            Value::Float32(f) => format!("{f:?}"),
            Value::Str(s) => format!("'{s}'"),
            Value::List(l) => {
                let items: Vec<String> = l.iter().map(|x| self.repr(x)).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Foreign(f) => format!("<{} object>", f.type_name()),
        }
    }

    /// The value as an `f64`, through the scalar type for foreign values.
    pub(crate) fn value_as_f64(&self, v: &Value) -> Option<f64> {
        self.to_float(v).ok()
    }
}

fn unary_name(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Positive => "unary +",
        UnaryOp::Negative => "unary -",
        UnaryOp::Absolute => "abs()",
        UnaryOp::Sign => "sign()",
    }
}

fn unsupported_pair(op: &'static str, a: &Value, b: &Value) -> HostError {
    HostError::UnsupportedOperands {
        op,
        lhs: a.type_name().to_string(),
        rhs: b.type_name().to_string(),
    }
}
