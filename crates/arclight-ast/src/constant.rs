//! Compile-time constant values.
//!
//! [`ConstantValue`] backs both literal expressions and resolved option
//! values during preprocessing.

use crate::types::Primitive;

/// A concrete literal value.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantValue {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    /// A composite vector value (2–4 scalar components).
    Vector(Vec<ConstantValue>),
}

impl ConstantValue {
    /// The primitive kind of a scalar constant; `None` for composites.
    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            Self::Bool(_) => Some(Primitive::Bool),
            Self::Int(_) => Some(Primitive::Int),
            Self::UInt(_) => Some(Primitive::UInt),
            Self::Float(_) => Some(Primitive::Float),
            Self::Vector(_) => None,
        }
    }

    /// Extracts a bool, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Extracts an unsigned array length from an `Int` or `UInt`.
    pub fn as_array_length(&self) -> Option<u32> {
        match *self {
            Self::UInt(v) => Some(v),
            Self::Int(v) if v >= 0 => Some(v as u32),
            _ => None,
        }
    }

    /// Returns `true` if the value is the number zero of any numeric kind.
    pub fn is_zero(&self) -> bool {
        match *self {
            Self::Int(v) => v == 0,
            Self::UInt(v) => v == 0,
            Self::Float(v) => v == 0.0,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_kinds() {
        assert_eq!(ConstantValue::Bool(true).primitive(), Some(Primitive::Bool));
        assert_eq!(ConstantValue::Int(-3).primitive(), Some(Primitive::Int));
        assert_eq!(ConstantValue::UInt(3).primitive(), Some(Primitive::UInt));
        assert_eq!(
            ConstantValue::Float(0.5).primitive(),
            Some(Primitive::Float)
        );
        assert_eq!(
            ConstantValue::Vector(vec![ConstantValue::Float(1.0)]).primitive(),
            None
        );
    }

    #[test]
    fn array_length_conversion() {
        assert_eq!(ConstantValue::UInt(8).as_array_length(), Some(8));
        assert_eq!(ConstantValue::Int(4).as_array_length(), Some(4));
        assert_eq!(ConstantValue::Int(-1).as_array_length(), None);
        assert_eq!(ConstantValue::Float(2.0).as_array_length(), None);
    }

    #[test]
    fn zero_check() {
        assert!(ConstantValue::Int(0).is_zero());
        assert!(ConstantValue::Float(0.0).is_zero());
        assert!(!ConstantValue::Float(0.25).is_zero());
        assert!(!ConstantValue::Bool(false).is_zero());
    }
}
