use crate::property::PropertyDescriptor;
use crate::property::PropertyKey;
use crate::property::PropertyKind;
use crate::runtime::Runtime;
use crate::{GcObject, GcProperty, GcScope, Value, VmError};
use std::sync::Arc;
use tracing::debug;

/// A lexical environment.
///
/// Bindings are ordinary properties of `object`, so variables share the property cell machinery
/// (including aliasing between parameters and `arguments` slots).
#[derive(Debug, Clone)]
pub struct ScopeRecord {
  pub object: GcObject,
  pub parent: Option<GcScope>,
  pub this: Value,
  /// Declarations land on this object instead of `object` when set.
  pub write_to: Option<GcObject>,
  pub strict: bool,
}

impl ScopeRecord {
  /// The object declarations are written to.
  pub fn target(&self) -> GcObject {
    self.write_to.unwrap_or(self.object)
  }
}

impl Runtime {
  /// Creates a scope whose parent is `parent`, with a fresh prototype-less binding object.
  ///
  /// The receiver and strictness are inherited from the parent.
  pub fn create_child_scope(&mut self, parent: GcScope) -> Result<GcScope, VmError> {
    let (this, strict) = {
      let record = self.heap.get_scope(parent)?;
      (record.this, record.strict)
    };
    let object = self.heap.alloc_object(None)?;
    self.heap.alloc_scope(ScopeRecord {
      object,
      parent: Some(parent),
      this,
      write_to: None,
      strict,
    })
  }

  pub fn scope_this(&self, scope: GcScope) -> Result<Value, VmError> {
    Ok(self.heap.get_scope(scope)?.this)
  }

  pub fn set_scope_this(&mut self, scope: GcScope, this: Value) -> Result<(), VmError> {
    self.heap.get_scope_mut(scope)?.this = this;
    Ok(())
  }

  pub fn scope_is_strict(&self, scope: GcScope) -> Result<bool, VmError> {
    Ok(self.heap.get_scope(scope)?.strict)
  }

  pub fn set_scope_strict(&mut self, scope: GcScope, strict: bool) -> Result<(), VmError> {
    self.heap.get_scope_mut(scope)?.strict = strict;
    Ok(())
  }

  pub fn set_scope_write_to(&mut self, scope: GcScope, write_to: Option<GcObject>) -> Result<(), VmError> {
    if let Some(obj) = write_to {
      self.heap.object_class(obj)?;
    }
    self.heap.get_scope_mut(scope)?.write_to = write_to;
    Ok(())
  }

  /// The binding object of the outermost scope in `scope`'s chain.
  pub fn scope_global_object(&self, scope: GcScope) -> Result<GcObject, VmError> {
    let mut current = self.heap.get_scope(scope)?;
    while let Some(parent) = current.parent {
      current = self.heap.get_scope(parent)?;
    }
    Ok(current.object)
  }

  /// Declares `name` in `scope` with a fresh variable cell holding `value`.
  pub fn scope_add(&mut self, scope: GcScope, name: &str, value: Value) -> Result<GcProperty, VmError> {
    let target = self.heap.get_scope(scope)?.target();
    let key = self.heap.key_from_str(name)?;
    self
      .heap
      .object_define_raw(target, key, PropertyDescriptor::variable(value))
  }

  /// Declares `name` in `scope` backed by an existing cell.
  pub fn scope_install_cell(&mut self, scope: GcScope, name: &str, cell: GcProperty) -> Result<(), VmError> {
    let target = self.heap.get_scope(scope)?.target();
    let key = self.heap.key_from_str(name)?;
    self.heap.object_install_cell(target, key, cell)
  }

  /// Finds the binding object holding `key`, walking outwards from `scope`.
  fn resolve_binding(&self, scope: GcScope, key: &PropertyKey) -> Result<Option<GcObject>, VmError> {
    let mut current = Some(scope);
    while let Some(s) = current {
      let record = self.heap.get_scope(s)?;
      if self.heap.object_own_cell(record.object, key)?.is_some() {
        return Ok(Some(record.object));
      }
      current = record.parent;
    }
    Ok(None)
  }

  /// Reads the binding `name`, honouring accessors.
  pub fn lookup(&mut self, scope: GcScope, name: &str) -> Result<Value, VmError> {
    let key = self.heap.key_from_str(name)?;
    let Some(holder) = self.resolve_binding(scope, &key)? else {
      return Err(VmError::UnresolvedReference(Arc::from(name)));
    };
    let Some(desc) = self.heap.object_get_own_property(holder, &key)? else {
      return Err(VmError::UnresolvedReference(Arc::from(name)));
    };
    match desc.kind {
      PropertyKind::Data { value, .. } => Ok(value),
      PropertyKind::Accessor { get, .. } => {
        if self.heap.is_callable(get)? {
          self.call_function(get, Value::Object(holder), &[])
        } else {
          Ok(Value::Undefined)
        }
      }
    }
  }

  /// Whether any scope in the chain binds `name`. Never errors for missing names and never runs
  /// accessors.
  pub fn has_binding(&mut self, scope: GcScope, name: &str) -> Result<bool, VmError> {
    let key = self.heap.key_from_str(name)?;
    Ok(self.resolve_binding(scope, &key)?.is_some())
  }

  /// Writes `value` to the binding `name`.
  ///
  /// An unresolved name becomes a property of the global object in sloppy scopes and an
  /// [`VmError::UnresolvedReference`] in strict ones.
  pub fn assign(&mut self, scope: GcScope, name: &str, value: Value) -> Result<(), VmError> {
    let key = self.heap.key_from_str(name)?;
    let strict = self.scope_is_strict(scope)?;
    match self.resolve_binding(scope, &key)? {
      Some(holder) => {
        self.set(holder, key, value, strict)?;
        Ok(())
      }
      None if strict => Err(VmError::UnresolvedReference(Arc::from(name))),
      None => {
        let global = self.scope_global_object(scope)?;
        debug!(name, "implicit global created by sloppy assignment");
        self.set(global, key, value, false)?;
        Ok(())
      }
    }
  }
}
