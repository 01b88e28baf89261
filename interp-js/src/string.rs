use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;

/// The contents of a string value.
///
/// Strings are sequences of UTF-16 code units and may contain unpaired surrogates; indexing a
/// string value selects a single code unit.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct JsString {
  units: Box<[u16]>,
}

impl JsString {
  pub fn from_str(s: &str) -> Self {
    Self::from_u16_vec(s.encode_utf16().collect())
  }

  pub fn from_code_units(units: &[u16]) -> Self {
    Self::from_u16_vec(units.to_vec())
  }

  pub fn from_u16_vec(mut units: Vec<u16>) -> Self {
    units.shrink_to_fit();
    Self {
      units: units.into_boxed_slice(),
    }
  }

  pub fn len_code_units(&self) -> usize {
    self.units.len()
  }

  pub fn is_empty(&self) -> bool {
    self.units.is_empty()
  }

  pub fn as_code_units(&self) -> &[u16] {
    self.units.as_ref()
  }

  /// The code unit at `index`, if in range.
  pub fn code_unit_at(&self, index: usize) -> Option<u16> {
    self.units.get(index).copied()
  }

  pub fn to_utf8_lossy(&self) -> String {
    String::from_utf16_lossy(self.as_code_units())
  }

  /// Concatenates two strings into a new one.
  pub fn concat(&self, other: &JsString) -> JsString {
    let mut units = Vec::with_capacity(self.units.len() + other.units.len());
    units.extend_from_slice(&self.units);
    units.extend_from_slice(&other.units);
    JsString::from_u16_vec(units)
  }
}

impl Hash for JsString {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.units.hash(state);
  }
}

impl Borrow<[u16]> for JsString {
  fn borrow(&self) -> &[u16] {
    self.as_code_units()
  }
}

impl fmt::Debug for JsString {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Rust `String` cannot represent lone surrogates; use a lossy conversion so
    // Debug never panics.
    f.debug_struct("JsString")
      .field("len_code_units", &self.len_code_units())
      .field("utf8_lossy", &self.to_utf8_lossy())
      .finish()
  }
}

impl fmt::Display for JsString {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_utf8_lossy())
  }
}
