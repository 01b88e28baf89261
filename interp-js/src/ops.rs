use crate::ast::BinaryOp;
use crate::property::array_index_from_number;
use crate::property::PropertyKey;
use crate::runtime::Runtime;
use crate::{GcString, Value, VmError};

/// The preferred result type of a primitive conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
  Default,
  Number,
  String,
}

impl Runtime {
  /// Reduces `value` to a primitive.
  ///
  /// Objects try `valueOf` then `toString` (`toString` first for [`Hint::String`]); the first
  /// callable method returning a primitive wins. An object with neither method callable converts
  /// to its debug string. Methods that only return objects are a [`VmError::TypeCoercion`].
  pub fn to_primitive(&mut self, value: Value, hint: Hint) -> Result<Value, VmError> {
    let Value::Object(obj) = value else {
      return Ok(value);
    };
    let names = *self.realm.names();
    let order = match hint {
      Hint::String => [names.to_string, names.value_of],
      Hint::Default | Hint::Number => [names.value_of, names.to_string],
    };

    let mut any_callable = false;
    for key in order {
      let method = self.get(value, key)?;
      if !self.heap.is_callable(method)? {
        continue;
      }
      any_callable = true;
      let result = self.call_function(method, Value::Object(obj), &[])?;
      if !result.is_object() {
        return Ok(result);
      }
    }

    let debug = self.heap.debug_string(value)?;
    if any_callable {
      return Err(VmError::TypeCoercion(debug));
    }
    Ok(Value::String(self.heap.alloc_string(&debug)?))
  }

  pub fn to_number(&mut self, value: Value) -> Result<f64, VmError> {
    Ok(match value {
      Value::Undefined => f64::NAN,
      Value::Null => 0.0,
      Value::Bool(b) => {
        if b {
          1.0
        } else {
          0.0
        }
      }
      Value::Number(n) => n,
      Value::String(s) => string_to_number(&self.heap.get_string(s)?.to_utf8_lossy()),
      Value::Object(_) => {
        let prim = self.to_primitive(value, Hint::Number)?;
        self.to_number(prim)?
      }
    })
  }

  pub fn to_string(&mut self, value: Value) -> Result<GcString, VmError> {
    match value {
      Value::String(s) => Ok(s),
      Value::Object(_) => {
        let prim = self.to_primitive(value, Hint::String)?;
        self.to_string(prim)
      }
      Value::Number(n) => self.heap.alloc_string(&number_to_string(n)),
      Value::Undefined => self.heap.alloc_string("undefined"),
      Value::Null => self.heap.alloc_string("null"),
      Value::Bool(true) => self.heap.alloc_string("true"),
      Value::Bool(false) => self.heap.alloc_string("false"),
    }
  }

  /// `to_string` followed by a lossy conversion to a Rust string.
  pub fn to_rust_string(&mut self, value: Value) -> Result<String, VmError> {
    let s = self.to_string(value)?;
    Ok(self.heap.get_string(s)?.to_utf8_lossy())
  }

  pub fn to_property_key(&mut self, value: Value) -> Result<PropertyKey, VmError> {
    match value {
      Value::Number(n) => match array_index_from_number(n) {
        Some(idx) => Ok(PropertyKey::Index(idx)),
        None => {
          let s = self.heap.alloc_string(&number_to_string(n))?;
          self.heap.key_from_string(s)
        }
      },
      Value::String(s) => self.heap.key_from_string(s),
      other => {
        let s = self.to_string(other)?;
        self.heap.key_from_string(s)
      }
    }
  }

  /// Loose equality (`==`).
  pub fn loose_equals(&mut self, a: Value, b: Value) -> Result<bool, VmError> {
    use Value::*;

    let mut a = a;
    let mut b = b;
    loop {
      match (a, b) {
        (Undefined, Undefined) | (Null, Null) => return Ok(true),
        (Bool(x), Bool(y)) => return Ok(x == y),
        (Number(x), Number(y)) => return Ok(x == y),
        (String(x), String(y)) => return Ok(x == y),
        (Object(x), Object(y)) => return Ok(x == y),

        (Undefined, Null) | (Null, Undefined) => return Ok(true),

        (Number(_), String(_)) => b = Number(self.to_number(b)?),
        (String(_), Number(_)) => a = Number(self.to_number(a)?),

        (Bool(_), _) => a = Number(self.to_number(a)?),
        (_, Bool(_)) => b = Number(self.to_number(b)?),

        // Against a string the object converts with the string hint first.
        (Object(_), String(y)) => match self.to_primitive(a, Hint::String)? {
          String(x) => return Ok(x == y),
          prim => a = prim,
        },
        (String(x), Object(_)) => match self.to_primitive(b, Hint::String)? {
          String(y) => return Ok(x == y),
          prim => b = prim,
        },
        (Object(_), Number(_)) => a = self.to_primitive(a, Hint::Default)?,
        (Number(_), Object(_)) => b = self.to_primitive(b, Hint::Default)?,

        _ => return Ok(false),
      }
    }
  }

  /// The string-specific `+` overload: `s` concatenated with `other` converted to a string.
  pub fn string_add(&mut self, s: GcString, other: Value) -> Result<GcString, VmError> {
    let prim = self.to_primitive(other, Hint::String)?;
    let rhs = self.to_string(prim)?;
    let joined = self.heap.get_string(s)?.concat(self.heap.get_string(rhs)?);
    self.heap.alloc_string_from_u16_vec(joined.as_code_units().to_vec())
  }

  /// Generic `+`: concatenation if either primitive operand is a string, numeric addition
  /// otherwise.
  pub fn add(&mut self, a: Value, b: Value) -> Result<Value, VmError> {
    let a = self.to_primitive(a, Hint::Default)?;
    let b = self.to_primitive(b, Hint::Default)?;
    match (a, b) {
      (Value::String(s), other) => Ok(Value::String(self.string_add(s, other)?)),
      (other, Value::String(s)) => {
        let lhs = self.to_string(other)?;
        let joined = self.heap.get_string(lhs)?.concat(self.heap.get_string(s)?);
        Ok(Value::String(
          self
            .heap
            .alloc_string_from_u16_vec(joined.as_code_units().to_vec())?,
        ))
      }
      (a, b) => Ok(Value::Number(self.to_number(a)? + self.to_number(b)?)),
    }
  }

  /// Evaluates a binary operator over two already-evaluated operands.
  pub fn binary_op(&mut self, op: BinaryOp, a: Value, b: Value) -> Result<Value, VmError> {
    Ok(match op {
      BinaryOp::Add => self.add(a, b)?,
      BinaryOp::Sub => Value::Number(self.to_number(a)? - self.to_number(b)?),
      BinaryOp::Mul => Value::Number(self.to_number(a)? * self.to_number(b)?),
      BinaryOp::Div => Value::Number(self.to_number(a)? / self.to_number(b)?),
      BinaryOp::Rem => Value::Number(self.to_number(a)? % self.to_number(b)?),
      BinaryOp::LooseEq => Value::Bool(self.loose_equals(a, b)?),
      BinaryOp::LooseNotEq => Value::Bool(!self.loose_equals(a, b)?),
      BinaryOp::StrictEq => Value::Bool(a.strict_equals(b)),
      BinaryOp::StrictNotEq => Value::Bool(!a.strict_equals(b)),
      BinaryOp::Lt => Value::Bool(self.less_than(a, b)? == Some(true)),
      BinaryOp::Gt => Value::Bool(self.less_than(b, a)? == Some(true)),
      BinaryOp::LtEq => Value::Bool(self.less_than(b, a)? == Some(false)),
      BinaryOp::GtEq => Value::Bool(self.less_than(a, b)? == Some(false)),
      BinaryOp::In => {
        let key = self.to_property_key(a)?;
        if !b.is_object() {
          return Err(VmError::TypeError(format!(
            "cannot use 'in' to search for a key in {}",
            self.heap.debug_string(b)?
          )));
        }
        Value::Bool(self.has(b, key)?)
      }
    })
  }

  /// Abstract relational comparison; `None` when either side is `NaN`.
  fn less_than(&mut self, a: Value, b: Value) -> Result<Option<bool>, VmError> {
    let a = self.to_primitive(a, Hint::Number)?;
    let b = self.to_primitive(b, Hint::Number)?;
    if let (Value::String(x), Value::String(y)) = (a, b) {
      let x = self.heap.get_string(x)?.as_code_units();
      let y = self.heap.get_string(y)?.as_code_units();
      return Ok(Some(x < y));
    }
    let x = self.to_number(a)?;
    let y = self.to_number(b)?;
    if x.is_nan() || y.is_nan() {
      return Ok(None);
    }
    Ok(Some(x < y))
  }
}

/// Number-to-string conversion: shortest round-tripping digits, laid out without a fraction for
/// integers below `1e21` and with a signed exponent otherwise.
pub fn number_to_string(n: f64) -> String {
  if n.is_nan() {
    return "NaN".to_string();
  }
  if n == 0.0 {
    return "0".to_string();
  }
  if n.is_infinite() {
    return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
  }
  if n < 0.0 {
    return format!("-{}", number_to_string(-n));
  }

  let mut buf = ryu::Buffer::new();
  let formatted = buf.format_finite(n);
  let (mantissa, exp) = match formatted.split_once('e') {
    Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
    None => (formatted, 0),
  };
  let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

  // Normalize to `0.digits × 10^point`.
  let mut digits: String = int_part.chars().chain(frac_part.chars()).collect();
  let mut point = int_part.len() as i32 + exp;
  let leading = digits.len() - digits.trim_start_matches('0').len();
  digits.drain(..leading);
  point -= leading as i32;
  let trimmed_len = digits.trim_end_matches('0').len();
  digits.truncate(trimmed_len);

  let k = digits.len() as i32;
  if k <= point && point <= 21 {
    let mut out = digits;
    out.extend(std::iter::repeat('0').take((point - k) as usize));
    out
  } else if 0 < point && point <= 21 {
    let (head, tail) = digits.split_at(point as usize);
    format!("{head}.{tail}")
  } else if -6 < point && point <= 0 {
    format!("0.{}{digits}", "0".repeat((-point) as usize))
  } else {
    let e = point - 1;
    let sign = if e >= 0 { '+' } else { '-' };
    let (first, rest) = digits.split_at(1);
    if rest.is_empty() {
      format!("{first}e{sign}{}", e.abs())
    } else {
      format!("{first}.{rest}e{sign}{}", e.abs())
    }
  }
}

/// String-to-number conversion: trims whitespace, accepts `0x`/`0o`/`0b` integers and `Infinity`,
/// and yields `NaN` for anything else that does not parse.
pub fn string_to_number(raw: &str) -> f64 {
  let trimmed = raw.trim_matches(is_ecma_whitespace);

  if trimmed.is_empty() {
    return 0.0;
  }

  // Infinity is case-sensitive in string numeric literals.
  match trimmed {
    "Infinity" | "+Infinity" => return f64::INFINITY,
    "-Infinity" => return f64::NEG_INFINITY,
    _ => {}
  }

  // Guard against Rust accepting "inf"/"infinity"/"nan" case-insensitively.
  let rest = trimmed
    .strip_prefix('+')
    .or_else(|| trimmed.strip_prefix('-'))
    .unwrap_or(trimmed);
  if rest.eq_ignore_ascii_case("inf")
    || rest.eq_ignore_ascii_case("infinity")
    || rest.eq_ignore_ascii_case("nan")
  {
    return f64::NAN;
  }

  if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
    return parse_ascii_int_radix(hex, 16).unwrap_or(f64::NAN);
  }
  if let Some(bin) = trimmed.strip_prefix("0b").or_else(|| trimmed.strip_prefix("0B")) {
    return parse_ascii_int_radix(bin, 2).unwrap_or(f64::NAN);
  }
  if let Some(oct) = trimmed.strip_prefix("0o").or_else(|| trimmed.strip_prefix("0O")) {
    return parse_ascii_int_radix(oct, 8).unwrap_or(f64::NAN);
  }

  trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_ascii_int_radix(s: &str, radix: u32) -> Option<f64> {
  if s.is_empty() {
    return None;
  }
  let radix_f = radix as f64;
  let mut value = 0.0f64;
  for b in s.bytes() {
    let digit = match b {
      b'0'..=b'9' => (b - b'0') as u32,
      b'a'..=b'f' => (b - b'a' + 10) as u32,
      b'A'..=b'F' => (b - b'A' + 10) as u32,
      _ => return None,
    };
    if digit >= radix {
      return None;
    }
    value = value * radix_f + digit as f64;
  }
  Some(value)
}

fn is_ecma_whitespace(c: char) -> bool {
  matches!(
    c,
    '\u{0009}'
      | '\u{000A}'
      | '\u{000B}'
      | '\u{000C}'
      | '\u{000D}'
      | '\u{0020}'
      | '\u{00A0}'
      | '\u{1680}'
      | '\u{2000}'..='\u{200A}'
      | '\u{2028}'
      | '\u{2029}'
      | '\u{202F}'
      | '\u{205F}'
      | '\u{3000}'
      | '\u{FEFF}'
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn integers_print_without_fraction() {
    assert_eq!(number_to_string(1.0), "1");
    assert_eq!(number_to_string(-42.0), "-42");
    assert_eq!(number_to_string(-0.0), "0");
    assert_eq!(number_to_string(1e20), "100000000000000000000");
    assert_eq!(number_to_string(123456789012345680000.0), "123456789012345680000");
  }

  #[test]
  fn fractions_and_exponents() {
    assert_eq!(number_to_string(1.5), "1.5");
    assert_eq!(number_to_string(0.001), "0.001");
    assert_eq!(number_to_string(0.000001), "0.000001");
    assert_eq!(number_to_string(1e-7), "1e-7");
    assert_eq!(number_to_string(1e21), "1e+21");
    assert_eq!(number_to_string(1.5e300), "1.5e+300");
    assert_eq!(number_to_string(f64::NAN), "NaN");
    assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
  }

  #[test]
  fn string_to_number_rules() {
    assert_eq!(string_to_number("  42\n"), 42.0);
    assert_eq!(string_to_number(""), 0.0);
    assert_eq!(string_to_number("   "), 0.0);
    assert_eq!(string_to_number("0x1F"), 31.0);
    assert_eq!(string_to_number("0b101"), 5.0);
    assert_eq!(string_to_number("0o17"), 15.0);
    assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
    assert_eq!(string_to_number("1e3"), 1000.0);
    assert!(string_to_number("infinity").is_nan());
    assert!(string_to_number("NaN").is_nan());
    assert!(string_to_number("12px").is_nan());
    assert!(string_to_number("0x").is_nan());
  }
}
