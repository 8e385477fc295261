//! The number protocol a user-defined scalar type provides.
//!
//! The host binds one [`ScalarType`] to each user tag. Binary operations
//! and comparisons try the left operand's type first and fall back to the
//! right operand's type when the first answers
//! [`Outcome::NotImplemented`].

use num_bigint::BigInt;
use quaddt_core::ConversionError;

use crate::value::Value;

/// Unary number-protocol slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `+x`.
    Positive,
    /// `-x`.
    Negative,
    /// `abs(x)`.
    Absolute,
    /// `sign(x)`.
    Sign,
}

/// Binary number-protocol slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `a + b`.
    Add,
    /// `a - b`.
    Subtract,
    /// `a * b`.
    Multiply,
    /// `a / b`.
    TrueDivide,
    /// `a // b`.
    FloorDivide,
    /// `a ** b`.
    Power,
}

impl BinaryOp {
    /// Operator symbol, for messages.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::TrueDivide => "/",
            Self::FloorDivide => "//",
            Self::Power => "**",
        }
    }
}

/// Rich comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `<`.
    Lt,
    /// `<=`.
    Le,
    /// `==`.
    Eq,
    /// `!=`.
    Ne,
    /// `>`.
    Gt,
    /// `>=`.
    Ge,
}

impl CompareOp {
    /// The operator that gives the same answer with operands swapped.
    pub fn swapped(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
        }
    }

    /// Operator symbol, for messages.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Result of a number-protocol slot.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T> {
    /// The slot handled the operands.
    Done(T),
    /// The slot does not apply to these operands; the host tries the
    /// reflected operand or reports a type error.
    NotImplemented,
}

/// Behaviour of a user-defined scalar type.
///
/// Selected once, when the type is bound to its tag.
pub trait ScalarType: Send + Sync {
    /// Name of the type.
    fn name(&self) -> &str;

    /// Construct a scalar; `None` means no argument.
    fn construct(&self, arg: Option<&Value>) -> Result<Value, ConversionError>;

    /// Unary slot.
    fn unary(&self, op: UnaryOp, a: &Value) -> Outcome<Value>;

    /// Binary slot. Either operand may be the one of this type.
    fn binary(&self, op: BinaryOp, a: &Value, b: &Value)
        -> Result<Outcome<Value>, ConversionError>;

    /// Power slot; `modulo` is the optional third argument.
    fn power(
        &self,
        base: &Value,
        exp: &Value,
        modulo: Option<&Value>,
    ) -> Result<Outcome<Value>, ConversionError>;

    /// Rich comparison slot. Either operand may be the one of this type.
    fn compare(&self, op: CompareOp, a: &Value, b: &Value)
        -> Result<Outcome<bool>, ConversionError>;

    /// Truth value of a scalar of this type.
    fn is_truthy(&self, a: &Value) -> bool;

    /// Conversion to a native double.
    fn to_float(&self, a: &Value) -> f64;

    /// Conversion to an arbitrary-precision integer.
    fn to_int(&self, a: &Value) -> Result<BigInt, ConversionError>;

    /// Textual representation.
    fn repr(&self, a: &Value) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swapped_comparisons_are_involutive() {
        for op in [
            CompareOp::Lt,
            CompareOp::Le,
            CompareOp::Eq,
            CompareOp::Ne,
            CompareOp::Gt,
            CompareOp::Ge,
        ] {
            assert_eq!(op.swapped().swapped(), op);
        }
        assert_eq!(CompareOp::Lt.swapped(), CompareOp::Gt);
    }

    #[test]
    fn symbols() {
        assert_eq!(BinaryOp::FloorDivide.symbol(), "//");
        assert_eq!(CompareOp::Ne.symbol(), "!=");
    }
}
