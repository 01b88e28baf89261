use crate::{GcString, Value, VmError};
use derive_more::derive::From;

/// A property key.
///
/// Canonical array-index strings (`"0"`, `"17"`, …) are always represented as
/// [`PropertyKey::Index`] so that `obj[1]` and `obj["1"]` address the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, From)]
pub enum PropertyKey {
  String(GcString),
  Index(u32),
}

impl PropertyKey {
  pub fn as_index(self) -> Option<u32> {
    match self {
      PropertyKey::Index(idx) => Some(idx),
      PropertyKey::String(_) => None,
    }
  }
}

/// A concrete property descriptor.
#[derive(Debug, Clone, Copy)]
pub struct PropertyDescriptor {
  pub enumerable: bool,
  pub configurable: bool,
  /// Marks scope bindings created by hoisting/declaration rather than by property assignment.
  ///
  /// Variable bindings cannot be deleted and are skipped by property enumeration.
  pub is_variable: bool,
  pub kind: PropertyKind,
}

/// The kind of property described by a [`PropertyDescriptor`].
#[derive(Debug, Clone, Copy)]
pub enum PropertyKind {
  Data { value: Value, writable: bool },
  /// Accessor functions; `Value::Undefined` marks an absent getter/setter.
  Accessor { get: Value, set: Value },
}

impl PropertyDescriptor {
  /// A writable, enumerable, configurable data property.
  pub fn data(value: Value) -> Self {
    Self {
      enumerable: true,
      configurable: true,
      is_variable: false,
      kind: PropertyKind::Data {
        value,
        writable: true,
      },
    }
  }

  /// A writable, non-enumerable, configurable data property.
  pub fn hidden(value: Value) -> Self {
    Self {
      enumerable: false,
      ..Self::data(value)
    }
  }

  /// A variable binding: writable, enumerable, non-configurable.
  pub fn variable(value: Value) -> Self {
    Self {
      enumerable: true,
      configurable: false,
      is_variable: true,
      kind: PropertyKind::Data {
        value,
        writable: true,
      },
    }
  }

  /// An enumerable, configurable accessor property.
  pub fn accessor(get: Value, set: Value) -> Self {
    Self {
      enumerable: true,
      configurable: true,
      is_variable: false,
      kind: PropertyKind::Accessor { get, set },
    }
  }

  pub fn readonly(mut self) -> Self {
    if let PropertyKind::Data { writable, .. } = &mut self.kind {
      *writable = false;
    }
    self
  }

  pub fn non_configurable(mut self) -> Self {
    self.configurable = false;
    self
  }

  pub fn non_enumerable(mut self) -> Self {
    self.enumerable = false;
    self
  }

  pub fn is_accessor(&self) -> bool {
    matches!(self.kind, PropertyKind::Accessor { .. })
  }

  /// The stored value of a data property (`None` for accessors).
  pub fn value(&self) -> Option<Value> {
    match self.kind {
      PropertyKind::Data { value, .. } => Some(value),
      PropertyKind::Accessor { .. } => None,
    }
  }

  pub fn is_writable(&self) -> bool {
    matches!(self.kind, PropertyKind::Data { writable: true, .. })
  }
}

/// A "partial" property descriptor patch used by `DefineOwnProperty`-style operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertyDescriptorPatch {
  pub enumerable: Option<bool>,
  pub configurable: Option<bool>,
  pub value: Option<Value>,
  pub writable: Option<bool>,
  pub get: Option<Value>,
  pub set: Option<Value>,
}

impl PropertyDescriptorPatch {
  /// Validates that this patch does not mix data and accessor descriptor fields.
  pub fn validate(&self) -> Result<(), VmError> {
    if self.is_data() && self.is_accessor() {
      return Err(VmError::InvalidPropertyDescriptorPatch);
    }
    Ok(())
  }

  pub fn is_data(&self) -> bool {
    self.value.is_some() || self.writable.is_some()
  }

  pub fn is_accessor(&self) -> bool {
    self.get.is_some() || self.set.is_some()
  }

  /// Builds a full descriptor from this patch, defaulting every absent attribute to `false` /
  /// `undefined`.
  pub fn to_descriptor(&self) -> PropertyDescriptor {
    let kind = if self.is_accessor() {
      PropertyKind::Accessor {
        get: self.get.unwrap_or(Value::Undefined),
        set: self.set.unwrap_or(Value::Undefined),
      }
    } else {
      PropertyKind::Data {
        value: self.value.unwrap_or(Value::Undefined),
        writable: self.writable.unwrap_or(false),
      }
    };
    PropertyDescriptor {
      enumerable: self.enumerable.unwrap_or(false),
      configurable: self.configurable.unwrap_or(false),
      is_variable: false,
      kind,
    }
  }

  /// Merges this patch into an existing descriptor.
  ///
  /// Switching between data and accessor kinds resets the fields of the other kind.
  pub fn apply_to(&self, existing: PropertyDescriptor) -> PropertyDescriptor {
    let kind = match existing.kind {
      PropertyKind::Data { value, writable } if !self.is_accessor() => PropertyKind::Data {
        value: self.value.unwrap_or(value),
        writable: self.writable.unwrap_or(writable),
      },
      PropertyKind::Accessor { get, set } if !self.is_data() => PropertyKind::Accessor {
        get: self.get.unwrap_or(get),
        set: self.set.unwrap_or(set),
      },
      _ => self.to_descriptor().kind,
    };
    PropertyDescriptor {
      enumerable: self.enumerable.unwrap_or(existing.enumerable),
      configurable: self.configurable.unwrap_or(existing.configurable),
      is_variable: existing.is_variable,
      kind,
    }
  }

  /// Whether applying this patch to a non-configurable `existing` property would be rejected.
  pub(crate) fn conflicts_with_frozen(&self, existing: &PropertyDescriptor) -> bool {
    if self.configurable == Some(true) {
      return true;
    }
    if self
      .enumerable
      .is_some_and(|enumerable| enumerable != existing.enumerable)
    {
      return true;
    }
    match existing.kind {
      PropertyKind::Data { value, writable } => {
        if self.is_accessor() {
          return true;
        }
        if !writable {
          if self.writable == Some(true) {
            return true;
          }
          if self.value.is_some_and(|v| !v.same_value(value)) {
            return true;
          }
        }
        false
      }
      PropertyKind::Accessor { get, set } => {
        self.is_data()
          || self.get.is_some_and(|g| !g.same_value(get))
          || self.set.is_some_and(|s| !s.same_value(set))
      }
    }
  }
}

/// Attempts to parse UTF-16 code units as an array index.
///
/// This matches the `ToString(ToUint32(P)) === P` and `ToUint32(P) != 2^32-1` conditions: no sign,
/// no leading zeros (except the single `"0"`), and a value below `2^32 - 1`.
pub(crate) fn array_index_from_units(units: &[u16]) -> Option<u32> {
  if units.is_empty() {
    return None;
  }
  const U0: u16 = b'0' as u16;
  const U9: u16 = b'9' as u16;

  if units.len() > 1 && units[0] == U0 {
    return None;
  }

  let mut value: u64 = 0;
  for &u in units {
    if !(U0..=U9).contains(&u) {
      return None;
    }
    value = value.checked_mul(10)?.checked_add((u - U0) as u64)?;
    if value > u32::MAX as u64 {
      return None;
    }
  }
  if value == u32::MAX as u64 {
    return None;
  }
  Some(value as u32)
}

/// Converts a number to an array index if it is an integral value in range.
pub(crate) fn array_index_from_number(n: f64) -> Option<u32> {
  if n.fract() != 0.0 || n < 0.0 || n >= u32::MAX as f64 {
    return None;
  }
  // `-0` is index 0 as well.
  Some(n as u32)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
  }

  #[test]
  fn canonical_index_strings_parse() {
    assert_eq!(array_index_from_units(&units("0")), Some(0));
    assert_eq!(array_index_from_units(&units("17")), Some(17));
    assert_eq!(array_index_from_units(&units("4294967294")), Some(4294967294));
  }

  #[test]
  fn non_canonical_index_strings_are_rejected() {
    assert_eq!(array_index_from_units(&units("")), None);
    assert_eq!(array_index_from_units(&units("01")), None);
    assert_eq!(array_index_from_units(&units("-1")), None);
    assert_eq!(array_index_from_units(&units("1.5")), None);
    assert_eq!(array_index_from_units(&units("4294967295")), None);
    assert_eq!(array_index_from_units(&units("length")), None);
  }

  #[test]
  fn numbers_convert_to_indices_only_when_integral() {
    assert_eq!(array_index_from_number(3.0), Some(3));
    assert_eq!(array_index_from_number(-0.0), Some(0));
    assert_eq!(array_index_from_number(1.5), None);
    assert_eq!(array_index_from_number(-1.0), None);
    assert_eq!(array_index_from_number(f64::NAN), None);
  }

  #[test]
  fn frozen_data_property_rejects_value_change() {
    let existing = PropertyDescriptor::data(Value::Number(1.0))
      .readonly()
      .non_configurable();
    let same = PropertyDescriptorPatch {
      value: Some(Value::Number(1.0)),
      ..Default::default()
    };
    assert!(!same.conflicts_with_frozen(&existing));
    let changed = PropertyDescriptorPatch {
      value: Some(Value::Number(2.0)),
      ..Default::default()
    };
    assert!(changed.conflicts_with_frozen(&existing));
  }
}
