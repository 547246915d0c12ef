//! Types module: defines field types and the tagged values carried by filters.
//!
//! This module provides the FieldType and FieldValue enums, the NativeValue
//! bridge between Rust field types and FieldValue, and value conversion.

use serde::{Serialize, Deserialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Int,
    Float,
    Text,
    Bool,
}

impl FieldType {
    pub fn is_text(&self) -> bool {
        matches!(self, FieldType::Text)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// A filter value. Untagged on the wire, so `3`, `2.5`, `"abc"` and `true`
/// deserialize to Int, Float, Text and Bool respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Raised when a value cannot be represented as the requested field type.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot convert {value} to {target}: {reason}")]
pub struct ConversionError {
    pub value: FieldValue,
    pub target: FieldType,
    pub reason: String,
}

impl ConversionError {
    fn new(value: &FieldValue, target: FieldType, reason: impl Into<String>) -> Self {
        Self {
            value: value.clone(),
            target,
            reason: reason.into(),
        }
    }
}

impl FieldValue {
    pub fn get_type(&self) -> FieldType {
        match self {
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::Int(_) => FieldType::Int,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Text(_) => FieldType::Text,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Converts this value to `target`.
    ///
    /// Floats narrow to ints by rounding half to even; text parses after
    /// trimming, and `true`/`false` are matched case-insensitively.
    pub fn convert(&self, target: FieldType) -> Result<FieldValue, ConversionError> {
        if self.get_type() == target {
            return Ok(self.clone());
        }
        match (self, target) {
            (FieldValue::Int(i), FieldType::Float) => Ok(FieldValue::Float(*i as f64)),
            (FieldValue::Int(i), FieldType::Text) => Ok(FieldValue::Text(i.to_string())),
            (FieldValue::Int(i), FieldType::Bool) => Ok(FieldValue::Bool(*i != 0)),

            (FieldValue::Float(f), FieldType::Int) => float_to_int(*f)
                .map(FieldValue::Int)
                .ok_or_else(|| ConversionError::new(self, target, "value is out of range")),
            (FieldValue::Float(f), FieldType::Text) => Ok(FieldValue::Text(f.to_string())),
            (FieldValue::Float(f), FieldType::Bool) => Ok(FieldValue::Bool(*f != 0.0)),

            (FieldValue::Text(s), FieldType::Int) => s
                .trim()
                .parse::<i64>()
                .map(FieldValue::Int)
                .map_err(|e| ConversionError::new(self, target, e.to_string())),
            (FieldValue::Text(s), FieldType::Float) => s
                .trim()
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|e| ConversionError::new(self, target, e.to_string())),
            (FieldValue::Text(s), FieldType::Bool) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("true") {
                    Ok(FieldValue::Bool(true))
                } else if s.eq_ignore_ascii_case("false") {
                    Ok(FieldValue::Bool(false))
                } else {
                    Err(ConversionError::new(self, target, "expected 'true' or 'false'"))
                }
            }

            (FieldValue::Bool(b), FieldType::Int) => Ok(FieldValue::Int(i64::from(*b))),
            (FieldValue::Bool(b), FieldType::Float) => Ok(FieldValue::Float(if *b { 1.0 } else { 0.0 })),
            (FieldValue::Bool(b), FieldType::Text) => Ok(FieldValue::Text(b.to_string())),

            // Same-kind pairs returned above.
            _ => Ok(self.clone()),
        }
    }

    /// Orders two values of the same kind; mixed kinds and NaN are unordered.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => Some(a.cmp(b)),
            (FieldValue::Float(a), FieldValue::Float(b)) => a.partial_cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

fn float_to_int(f: f64) -> Option<i64> {
    if !f.is_finite() {
        return None;
    }
    let rounded = f.round_ties_even();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    if rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
        return None;
    }
    Some(rounded as i64)
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

/// A Rust type that can back a record field.
pub trait NativeValue: Sized {
    const FIELD_TYPE: FieldType;

    fn to_value(&self) -> FieldValue;

    /// Builds the native value from an already converted FieldValue.
    fn from_value(value: FieldValue) -> Result<Self, ConversionError>;
}

macro_rules! native_ints {
    ($($ty:ty),* $(,)?) => {
        $(
            impl NativeValue for $ty {
                const FIELD_TYPE: FieldType = FieldType::Int;

                fn to_value(&self) -> FieldValue {
                    FieldValue::Int(i64::from(*self))
                }

                fn from_value(value: FieldValue) -> Result<Self, ConversionError> {
                    match value.convert(FieldType::Int)? {
                        FieldValue::Int(i) => <$ty>::try_from(i).map_err(|_| ConversionError::new(
                            &value,
                            FieldType::Int,
                            concat!("does not fit in ", stringify!($ty)),
                        )),
                        other => Err(ConversionError::new(&other, FieldType::Int, "expected an int")),
                    }
                }
            }

            impl From<$ty> for FieldValue {
                fn from(v: $ty) -> Self {
                    FieldValue::Int(i64::from(v))
                }
            }
        )*
    };
}

native_ints!(i8, i16, i32, i64, u8, u16, u32);

impl NativeValue for f64 {
    const FIELD_TYPE: FieldType = FieldType::Float;

    fn to_value(&self) -> FieldValue {
        FieldValue::Float(*self)
    }

    fn from_value(value: FieldValue) -> Result<Self, ConversionError> {
        match value.convert(FieldType::Float)? {
            FieldValue::Float(f) => Ok(f),
            other => Err(ConversionError::new(&other, FieldType::Float, "expected a float")),
        }
    }
}

impl NativeValue for f32 {
    const FIELD_TYPE: FieldType = FieldType::Float;

    fn to_value(&self) -> FieldValue {
        FieldValue::Float(f64::from(*self))
    }

    fn from_value(value: FieldValue) -> Result<Self, ConversionError> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl NativeValue for bool {
    const FIELD_TYPE: FieldType = FieldType::Bool;

    fn to_value(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }

    fn from_value(value: FieldValue) -> Result<Self, ConversionError> {
        match value.convert(FieldType::Bool)? {
            FieldValue::Bool(b) => Ok(b),
            other => Err(ConversionError::new(&other, FieldType::Bool, "expected a bool")),
        }
    }
}

impl NativeValue for String {
    const FIELD_TYPE: FieldType = FieldType::Text;

    fn to_value(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }

    fn from_value(value: FieldValue) -> Result<Self, ConversionError> {
        match value.convert(FieldType::Text)? {
            FieldValue::Text(s) => Ok(s),
            other => Err(ConversionError::new(&other, FieldType::Text, "expected text")),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(f64::from(v))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}
