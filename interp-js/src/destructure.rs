//! Assignable references for binding and assignment targets.

use crate::ast::MemberKey;
use crate::ast::Pattern;
use crate::branch::BranchRequest;
use crate::branch::Reference;
use crate::property::PropertyKey;
use crate::runtime::Runtime;
use crate::{GcScope, Value, VmError};
use std::rc::Rc;

/// A name resolved through the scope chain when written.
pub struct BindingRef {
  scope: GcScope,
  name: Rc<str>,
}

impl Reference for BindingRef {
  fn set_value(&self, rt: &mut Runtime, value: Value) -> Result<(), VmError> {
    rt.assign(self.scope, &self.name, value)
  }
}

/// A property of an already evaluated base.
pub struct PropertyRef {
  base: Value,
  key: PropertyKey,
  strict: bool,
}

impl Reference for PropertyRef {
  fn set_value(&self, rt: &mut Runtime, value: Value) -> Result<(), VmError> {
    rt.set_value(self.base, self.key, value, self.strict)?;
    Ok(())
  }
}

/// `{a: x, b: y} = value`
pub struct ObjectPatternRef {
  props: Vec<(PropertyKey, Box<dyn Reference>)>,
}

impl Reference for ObjectPatternRef {
  fn set_value(&self, rt: &mut Runtime, value: Value) -> Result<(), VmError> {
    for (key, target) in &self.props {
      let item = rt.get(value, *key)?;
      target.set_value(rt, item)?;
    }
    Ok(())
  }
}

/// `[x, , y] = value`
pub struct ArrayPatternRef {
  elems: Vec<Option<Box<dyn Reference>>>,
}

impl Reference for ArrayPatternRef {
  fn set_value(&self, rt: &mut Runtime, value: Value) -> Result<(), VmError> {
    if value.is_nullish() {
      return Err(VmError::TypeError(format!(
        "{} is not iterable",
        rt.heap.debug_string(value)?
      )));
    }
    for (idx, target) in self.elems.iter().enumerate() {
      let Some(target) = target else {
        continue;
      };
      let item = rt.get(value, PropertyKey::Index(idx as u32))?;
      target.set_value(rt, item)?;
    }
    Ok(())
  }
}

/// Builds the reference for `pattern`. Member targets evaluate their object and computed key now,
/// so side effects happen in source order before the value is written.
pub fn resolve_pattern(
  rt: &mut Runtime,
  pattern: &Pattern,
  scope: GcScope,
) -> Result<Box<dyn Reference>, VmError> {
  Ok(match pattern {
    Pattern::Identifier(name) => Box::new(BindingRef {
      scope,
      name: name.clone(),
    }),
    Pattern::Member { object, property } => {
      let base = rt
        .evaluate(BranchRequest::expression(object.clone(), scope))?
        .value()
        .unwrap_or(Value::Undefined);
      let key = match property {
        MemberKey::Named(name) => rt.heap.key_from_str(name)?,
        MemberKey::Computed(expr) => {
          let key = rt
            .evaluate(BranchRequest::expression(expr.clone(), scope))?
            .value()
            .unwrap_or(Value::Undefined);
          rt.to_property_key(key)?
        }
      };
      Box::new(PropertyRef {
        base,
        key,
        strict: rt.scope_is_strict(scope)?,
      })
    }
    Pattern::Object(props) => {
      let mut resolved = Vec::with_capacity(props.len());
      for (name, target) in props {
        let key = rt.heap.key_from_str(name)?;
        resolved.push((key, resolve_pattern(rt, target, scope)?));
      }
      Box::new(ObjectPatternRef { props: resolved })
    }
    Pattern::Array(elems) => {
      let mut resolved = Vec::with_capacity(elems.len());
      for elem in elems {
        resolved.push(match elem {
          Some(target) => Some(resolve_pattern(rt, target, scope)?),
          None => None,
        });
      }
      Box::new(ArrayPatternRef { elems: resolved })
    }
  })
}
