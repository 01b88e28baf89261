use crate::{GcObject, GcString};

/// A language value.
///
/// Heap-allocated values are represented using handles into the [`Heap`](crate::Heap). Strings are
/// interned, so every variant compares by handle for identity purposes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
  /// The `undefined` value.
  Undefined,
  /// The `null` value.
  Null,
  /// A boolean.
  Bool(bool),
  /// A number (IEEE-754 double).
  Number(f64),
  /// An interned string.
  String(GcString),
  /// An object (plain object, array, arguments object or function).
  Object(GcObject),
}

impl Value {
  /// Strict equality (`===`).
  ///
  /// No coercion is applied: operands of different variants are never equal. Numbers follow
  /// IEEE-754 (`NaN !== NaN`, `+0 === -0`); objects compare by identity.
  pub fn strict_equals(self, other: Self) -> bool {
    match (self, other) {
      (Value::Undefined, Value::Undefined) => true,
      (Value::Null, Value::Null) => true,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::Number(a), Value::Number(b)) => a == b,
      (Value::String(a), Value::String(b)) => a == b,
      (Value::Object(a), Value::Object(b)) => a == b,
      _ => false,
    }
  }

  /// `SameValue(x, y)`.
  ///
  /// This differs from `===` for Numbers:
  /// - `NaN` is the same as `NaN`
  /// - `+0` and `-0` are distinct
  pub fn same_value(self, other: Self) -> bool {
    match (self, other) {
      (Value::Number(a), Value::Number(b)) => {
        if a.is_nan() && b.is_nan() {
          return true;
        }
        if a == 0.0 && b == 0.0 {
          // Distinguish +0 and -0.
          return a.to_bits() == b.to_bits();
        }
        a == b
      }
      (a, b) => a.strict_equals(b),
    }
  }

  pub fn is_nullish(self) -> bool {
    matches!(self, Value::Undefined | Value::Null)
  }

  pub fn is_object(self) -> bool {
    matches!(self, Value::Object(_))
  }

  pub fn as_object(self) -> Option<GcObject> {
    match self {
      Value::Object(obj) => Some(obj),
      _ => None,
    }
  }

  pub fn as_number(self) -> Option<f64> {
    match self {
      Value::Number(n) => Some(n),
      _ => None,
    }
  }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Self::Bool(value)
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Self::Number(value)
  }
}

impl From<GcString> for Value {
  fn from(value: GcString) -> Self {
    Self::String(value)
  }
}

impl From<GcObject> for Value {
  fn from(value: GcObject) -> Self {
    Self::Object(value)
  }
}
