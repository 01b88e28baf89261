use crate::heap::ClassTag;
use crate::heap::Heap;
use crate::heap::ObjectKind;
use crate::property::PropertyDescriptor;
use crate::property::PropertyDescriptorPatch;
use crate::property::PropertyKey;
use crate::property::PropertyKind;
use crate::runtime::Runtime;
use crate::{GcObject, Value, VmError};
use ahash::HashSet;
use ahash::HashSetExt;

impl Runtime {
  /// Allocates an ordinary object inheriting from the realm's Object prototype.
  pub fn alloc_plain_object(&mut self) -> Result<GcObject, VmError> {
    let proto = self.realm.object_prototype();
    self.heap.alloc_object(Some(proto))
  }

  /// Allocates a dense array holding `values`.
  pub fn alloc_array(&mut self, values: &[Value]) -> Result<GcObject, VmError> {
    let proto = self.realm.array_prototype();
    let arr = self
      .heap
      .alloc_object_with_kind(Some(proto), ClassTag::Array, ObjectKind::Array)?;
    let length_key = self.realm.names().length;
    self.heap.object_define_raw(
      arr,
      length_key,
      PropertyDescriptor::hidden(Value::Number(values.len() as f64)).non_configurable(),
    )?;
    for (idx, value) in values.iter().enumerate() {
      self
        .heap
        .object_define_raw(arr, PropertyKey::Index(idx as u32), PropertyDescriptor::data(*value))?;
    }
    Ok(arr)
  }

  /// The current `length` of an array object.
  pub fn array_length(&self, arr: GcObject) -> Result<u32, VmError> {
    let key = self.realm.names().length;
    match self.heap.object_get_own_property(arr, &key)? {
      Some(desc) => match desc.value() {
        Some(Value::Number(n)) => Ok(n as u32),
        _ => Ok(0),
      },
      None => Ok(0),
    }
  }

  fn write_array_length(&mut self, arr: GcObject, len: u32) -> Result<(), VmError> {
    let key = self.realm.names().length;
    match self.heap.object_own_cell(arr, &key)? {
      Some(cell) => self.heap.write_cell_value(cell, Value::Number(len as f64)),
      None => {
        self.heap.object_define_raw(
          arr,
          key,
          PropertyDescriptor::hidden(Value::Number(len as f64)).non_configurable(),
        )?;
        Ok(())
      }
    }
  }

  /// Keeps `length` in step after index `idx` was written.
  fn array_note_index(&mut self, arr: GcObject, idx: u32) -> Result<(), VmError> {
    if idx >= self.array_length(arr)? {
      self.write_array_length(arr, idx + 1)?;
    }
    Ok(())
  }

  /// Sets an array's `length`, deleting every element at or above the new length.
  fn array_set_length(&mut self, arr: GcObject, value: Value) -> Result<(), VmError> {
    let n = self.to_number(value)?;
    if n.fract() != 0.0 || n < 0.0 || n > u32::MAX as f64 {
      return Err(VmError::TypeError(format!(
        "invalid array length {}",
        self.heap.debug_string(value)?
      )));
    }
    let new_len = n as u32;
    let stale: Vec<PropertyKey> = self
      .heap
      .own_property_keys(arr)?
      .into_iter()
      .filter(|key| matches!(key, PropertyKey::Index(idx) if *idx >= new_len))
      .collect();
    for key in stale {
      self.heap.object_remove(arr, &key)?;
    }
    self.write_array_length(arr, new_len)
  }

  /// Reads `key` from `base`, walking the prototype chain and running getters with `this = base`.
  pub fn get(&mut self, base: Value, key: PropertyKey) -> Result<Value, VmError> {
    let start = match base {
      Value::Undefined | Value::Null => {
        return Err(VmError::TypeError(format!(
          "cannot read property '{}' of {}",
          self.heap.key_to_rust_string(key)?,
          self.heap.debug_string(base)?
        )));
      }
      Value::String(s) => match key {
        PropertyKey::Index(idx) => {
          let unit = self.heap.get_string(s)?.code_unit_at(idx as usize);
          return match unit {
            Some(unit) => Ok(Value::String(self.heap.alloc_string_from_code_units(&[unit])?)),
            None => Ok(Value::Undefined),
          };
        }
        k if k == self.realm.names().length => {
          let len = self.heap.get_string(s)?.len_code_units();
          return Ok(Value::Number(len as f64));
        }
        _ => self.realm.string_prototype(),
      },
      Value::Number(_) => self.realm.number_prototype(),
      Value::Bool(_) => self.realm.boolean_prototype(),
      Value::Object(obj) => obj,
    };

    let Some(desc) = self.heap.get_property(start, &key)? else {
      return Ok(Value::Undefined);
    };
    match desc.kind {
      PropertyKind::Data { value, .. } => Ok(value),
      PropertyKind::Accessor { get, .. } => {
        if self.heap.is_callable(get)? {
          self.call_function(get, base, &[])
        } else {
          Ok(Value::Undefined)
        }
      }
    }
  }

  /// `get` with a UTF-8 property name.
  pub fn get_named(&mut self, base: Value, name: &str) -> Result<Value, VmError> {
    let key = self.heap.key_from_str(name)?;
    self.get(base, key)
  }

  /// Whether `key` is visible on `base` (own or inherited). Never runs accessors.
  pub fn has(&mut self, base: Value, key: PropertyKey) -> Result<bool, VmError> {
    let start = match base {
      Value::Undefined | Value::Null => {
        return Err(VmError::TypeError(format!(
          "cannot check property '{}' of {}",
          self.heap.key_to_rust_string(key)?,
          self.heap.debug_string(base)?
        )));
      }
      Value::String(s) => {
        let len = self.heap.get_string(s)?.len_code_units();
        match key {
          PropertyKey::Index(idx) if (idx as usize) < len => return Ok(true),
          k if k == self.realm.names().length => return Ok(true),
          _ => self.realm.string_prototype(),
        }
      }
      Value::Number(_) => self.realm.number_prototype(),
      Value::Bool(_) => self.realm.boolean_prototype(),
      Value::Object(obj) => obj,
    };
    Ok(self.heap.find_property(start, &key)?.is_some())
  }

  /// Writes `key` on `obj`.
  ///
  /// Returns whether the write took effect. A rejected write is `Ok(false)` when `strict` is false
  /// and a [`VmError::PropertyAccess`] when it is true.
  pub fn set(&mut self, obj: GcObject, key: PropertyKey, value: Value, strict: bool) -> Result<bool, VmError> {
    let is_array = self.heap.is_array(obj)?;
    if is_array && key == self.realm.names().length {
      let writable = self
        .heap
        .object_get_own_property(obj, &key)?
        .map_or(true, |desc| desc.is_writable());
      if !writable {
        return self.reject_write(key, strict);
      }
      self.array_set_length(obj, value)?;
      return Ok(true);
    }

    match self.heap.find_property(obj, &key)? {
      Some((holder, cell)) => {
        let desc = *self.heap.property_cell(cell)?;
        match desc.kind {
          PropertyKind::Data { writable: false, .. } => self.reject_write(key, strict),
          PropertyKind::Data { writable: true, .. } if holder == obj => {
            self.heap.write_cell_value(cell, value)?;
            Ok(true)
          }
          PropertyKind::Data { .. } => self.create_own(obj, key, value, strict),
          PropertyKind::Accessor { set, .. } => {
            if self.heap.is_callable(set)? {
              self.call_function(set, Value::Object(obj), &[value])?;
              Ok(true)
            } else {
              self.reject_write(key, strict)
            }
          }
        }
      }
      None => self.create_own(obj, key, value, strict),
    }
  }

  fn create_own(&mut self, obj: GcObject, key: PropertyKey, value: Value, strict: bool) -> Result<bool, VmError> {
    if !self.heap.object_is_extensible(obj)? {
      return self.reject_write(key, strict);
    }
    self
      .heap
      .object_define_raw(obj, key, PropertyDescriptor::data(value))?;
    if let PropertyKey::Index(idx) = key {
      if self.heap.is_array(obj)? {
        self.array_note_index(obj, idx)?;
      }
    }
    Ok(true)
  }

  fn reject_write(&self, key: PropertyKey, strict: bool) -> Result<bool, VmError> {
    if strict {
      return Err(VmError::PropertyAccess(self.heap.key_to_rust_string(key)?));
    }
    Ok(false)
  }

  /// `set` for any base value. Writes to primitives are dropped in sloppy mode.
  pub fn set_value(&mut self, base: Value, key: PropertyKey, value: Value, strict: bool) -> Result<bool, VmError> {
    match base {
      Value::Object(obj) => self.set(obj, key, value, strict),
      Value::Undefined | Value::Null => Err(VmError::TypeError(format!(
        "cannot set property '{}' of {}",
        self.heap.key_to_rust_string(key)?,
        self.heap.debug_string(base)?
      ))),
      Value::Bool(_) | Value::Number(_) | Value::String(_) => self.reject_write(key, strict),
    }
  }

  /// Defines or reconfigures an own property. Returns `false` if a non-configurable property
  /// would change or the object is not extensible.
  pub fn define_own_property(
    &mut self,
    obj: GcObject,
    key: PropertyKey,
    patch: PropertyDescriptorPatch,
  ) -> Result<bool, VmError> {
    patch.validate()?;

    match self.heap.object_own_cell(obj, &key)? {
      Some(cell) => {
        let current = *self.heap.property_cell(cell)?;
        if !current.configurable && patch.conflicts_with_frozen(&current) {
          return Ok(false);
        }
        *self.heap.property_cell_mut(cell)? = patch.apply_to(current);
      }
      None => {
        if !self.heap.object_is_extensible(obj)? {
          return Ok(false);
        }
        self.heap.object_define_raw(obj, key, patch.to_descriptor())?;
      }
    }

    if let PropertyKey::Index(idx) = key {
      if self.heap.is_array(obj)? {
        self.array_note_index(obj, idx)?;
      }
    }
    Ok(true)
  }

  /// Removes an own property. Non-configurable properties and variable bindings are kept; that
  /// failure is silent in sloppy mode and a [`VmError::PropertyAccess`] in strict mode.
  pub fn delete(&mut self, obj: GcObject, key: PropertyKey, strict: bool) -> Result<bool, VmError> {
    let Some(desc) = self.heap.object_get_own_property(obj, &key)? else {
      return Ok(true);
    };
    if !desc.configurable || desc.is_variable {
      return self.reject_write(key, strict);
    }
    self.heap.object_remove(obj, &key)?;
    Ok(true)
  }

  /// A lazy cursor over the enumerable, non-variable keys observable on `base`.
  pub fn observable_properties(&self, base: Value) -> Result<ObservableKeys, VmError> {
    let source = match base {
      Value::Undefined | Value::Null => KeySource::Done,
      Value::String(s) => KeySource::String {
        index: 0,
        len: self.heap.get_string(s)?.len_code_units() as u32,
        proto: self.realm.string_prototype(),
      },
      Value::Number(_) => KeySource::Object {
        obj: self.realm.number_prototype(),
        index: 0,
      },
      Value::Bool(_) => KeySource::Object {
        obj: self.realm.boolean_prototype(),
        index: 0,
      },
      Value::Object(obj) => KeySource::Object { obj, index: 0 },
    };
    // Primitive wrappers have no own keys; only their prototype's keys can be observed, and only
    // when inherited keys are requested.
    let own_is_proto = matches!(base, Value::Number(_) | Value::Bool(_));
    Ok(ObservableKeys {
      source,
      inherited: false,
      own_is_proto,
      seen: HashSet::new(),
    })
  }
}

#[derive(Debug, Clone, Copy)]
enum KeySource {
  String { index: u32, len: u32, proto: GcObject },
  Object { obj: GcObject, index: usize },
  Done,
}

/// A restartable cursor over observable property keys.
///
/// Own keys come first, in insertion order. With [`ObservableKeys::with_inherited`] the cursor
/// continues up the prototype chain, skipping keys already visited on a closer object.
#[derive(Debug)]
pub struct ObservableKeys {
  source: KeySource,
  inherited: bool,
  own_is_proto: bool,
  seen: HashSet<PropertyKey>,
}

impl ObservableKeys {
  pub fn with_inherited(mut self) -> Self {
    self.inherited = true;
    self
  }

  pub fn next(&mut self, heap: &Heap) -> Result<Option<PropertyKey>, VmError> {
    loop {
      match self.source {
        KeySource::Done => return Ok(None),
        KeySource::String { index, len, proto } => {
          if index < len {
            self.source = KeySource::String {
              index: index + 1,
              len,
              proto,
            };
            let key = PropertyKey::Index(index);
            self.seen.insert(key);
            return Ok(Some(key));
          }
          self.source = if self.inherited {
            KeySource::Object { obj: proto, index: 0 }
          } else {
            KeySource::Done
          };
        }
        KeySource::Object { obj, index } => {
          if self.own_is_proto && !self.inherited {
            self.source = KeySource::Done;
            continue;
          }
          match heap.own_property_at(obj, index)? {
            Some((key, cell)) => {
              self.source = KeySource::Object {
                obj,
                index: index + 1,
              };
              let desc = heap.property_cell(cell)?;
              if !self.seen.insert(key) {
                continue;
              }
              if desc.enumerable && !desc.is_variable {
                return Ok(Some(key));
              }
            }
            None => {
              let next = if self.inherited {
                heap.object_prototype(obj)?
              } else {
                None
              };
              self.source = match next {
                Some(proto) => KeySource::Object { obj: proto, index: 0 },
                None => KeySource::Done,
              };
            }
          }
        }
      }
    }
  }

  pub fn collect(mut self, heap: &Heap) -> Result<Vec<PropertyKey>, VmError> {
    let mut keys = Vec::new();
    while let Some(key) = self.next(heap)? {
      keys.push(key);
    }
    Ok(keys)
  }
}
