use crate::heap::ClassTag;
use crate::heap::Trace;
use crate::heap::Tracer;
use crate::property::PropertyDescriptor;
use crate::property::PropertyKey;
use crate::runtime::Runtime;
use crate::scope::ScopeRecord;
use crate::{GcObject, GcScope, Heap, Value, VmError};
use tracing::debug;

/// Realm-level policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct RealmOptions {
  /// Substitute the global object for an `undefined`/`null` receiver in sloppy invocations.
  pub sloppy_this_is_global: bool,
}

impl Default for RealmOptions {
  fn default() -> Self {
    Self {
      sloppy_this_is_global: true,
    }
  }
}

/// Property keys the runtime looks up on hot paths, interned once per realm.
#[derive(Debug, Clone, Copy)]
pub struct CommonNames {
  pub length: PropertyKey,
  pub prototype: PropertyKey,
  pub name: PropertyKey,
  pub message: PropertyKey,
  pub callee: PropertyKey,
  pub arguments: PropertyKey,
  pub value_of: PropertyKey,
  pub to_string: PropertyKey,
}

impl CommonNames {
  fn new(heap: &mut Heap) -> Result<Self, VmError> {
    Ok(Self {
      length: heap.key_from_str("length")?,
      prototype: heap.key_from_str("prototype")?,
      name: heap.key_from_str("name")?,
      message: heap.key_from_str("message")?,
      callee: heap.key_from_str("callee")?,
      arguments: heap.key_from_str("arguments")?,
      value_of: heap.key_from_str("valueOf")?,
      to_string: heap.key_from_str("toString")?,
    })
  }
}

/// A global object, its scope and the prototypes primitives and built-in kinds link to.
#[derive(Debug)]
pub struct Realm {
  options: RealmOptions,
  global_object: GcObject,
  global_scope: GcScope,
  object_prototype: GcObject,
  function_prototype: GcObject,
  array_prototype: GcObject,
  string_prototype: GcObject,
  number_prototype: GcObject,
  boolean_prototype: GcObject,
  error_prototype: GcObject,
  names: CommonNames,
}

fn global_data_desc(value: Value) -> PropertyDescriptor {
  PropertyDescriptor::hidden(value)
}

impl Realm {
  /// Creates a new realm on `heap`.
  pub fn new(heap: &mut Heap, options: RealmOptions) -> Result<Self, VmError> {
    let names = CommonNames::new(heap)?;

    let object_prototype = heap.alloc_object(None)?;
    let function_prototype = heap.alloc_object_with_class(Some(object_prototype), ClassTag::Function)?;
    let array_prototype = heap.alloc_object_with_class(Some(object_prototype), ClassTag::Array)?;
    let string_prototype =
      heap.alloc_object_with_class(Some(object_prototype), ClassTag::Custom("String".into()))?;
    let number_prototype =
      heap.alloc_object_with_class(Some(object_prototype), ClassTag::Custom("Number".into()))?;
    let boolean_prototype =
      heap.alloc_object_with_class(Some(object_prototype), ClassTag::Custom("Boolean".into()))?;
    let error_prototype = heap.alloc_object_with_class(Some(object_prototype), ClassTag::Error)?;

    let array_length = heap.alloc_property(
      PropertyDescriptor::hidden(Value::Number(0.0)).non_configurable(),
    )?;
    heap.object_install_cell(array_prototype, names.length, array_length)?;

    let error_name = heap.alloc_string("Error")?;
    heap.object_define_raw(error_prototype, names.name, global_data_desc(Value::String(error_name)))?;
    let empty = heap.alloc_string("")?;
    heap.object_define_raw(error_prototype, names.message, global_data_desc(Value::String(empty)))?;

    let global_object = heap.alloc_object(Some(object_prototype))?;

    // `globalThis` is a writable, configurable, non-enumerable data property whose value is the
    // global object itself.
    let global_this_key = heap.key_from_str("globalThis")?;
    heap.object_define_raw(
      global_object,
      global_this_key,
      global_data_desc(Value::Object(global_object)),
    )?;

    // `undefined`, `NaN` and `Infinity` are non-writable, non-enumerable, non-configurable.
    for (name, value) in [
      ("undefined", Value::Undefined),
      ("NaN", Value::Number(f64::NAN)),
      ("Infinity", Value::Number(f64::INFINITY)),
    ] {
      let key = heap.key_from_str(name)?;
      heap.object_define_raw(
        global_object,
        key,
        PropertyDescriptor::hidden(value).readonly().non_configurable(),
      )?;
    }

    let global_scope = heap.alloc_scope(ScopeRecord {
      object: global_object,
      parent: None,
      this: Value::Object(global_object),
      write_to: None,
      strict: false,
    })?;

    debug!(
      slots = heap.slot_count(),
      sloppy_this_is_global = options.sloppy_this_is_global,
      "realm created"
    );

    Ok(Self {
      options,
      global_object,
      global_scope,
      object_prototype,
      function_prototype,
      array_prototype,
      string_prototype,
      number_prototype,
      boolean_prototype,
      error_prototype,
      names,
    })
  }

  pub fn options(&self) -> RealmOptions {
    self.options
  }

  /// The realm's global object.
  pub fn global_object(&self) -> GcObject {
    self.global_object
  }

  /// The outermost scope; its binding object is the global object.
  pub fn global_scope(&self) -> GcScope {
    self.global_scope
  }

  pub fn object_prototype(&self) -> GcObject {
    self.object_prototype
  }

  pub fn function_prototype(&self) -> GcObject {
    self.function_prototype
  }

  pub fn array_prototype(&self) -> GcObject {
    self.array_prototype
  }

  pub fn string_prototype(&self) -> GcObject {
    self.string_prototype
  }

  pub fn number_prototype(&self) -> GcObject {
    self.number_prototype
  }

  pub fn boolean_prototype(&self) -> GcObject {
    self.boolean_prototype
  }

  pub fn error_prototype(&self) -> GcObject {
    self.error_prototype
  }

  pub fn names(&self) -> &CommonNames {
    &self.names
  }
}

impl Trace for CommonNames {
  fn trace(&self, tracer: &mut Tracer<'_>) {
    for key in [
      self.length,
      self.prototype,
      self.name,
      self.message,
      self.callee,
      self.arguments,
      self.value_of,
      self.to_string,
    ] {
      tracer.trace_key(key);
    }
  }
}

impl Trace for Realm {
  fn trace(&self, tracer: &mut Tracer<'_>) {
    tracer.trace_object(self.global_object);
    tracer.trace_scope(self.global_scope);
    for proto in [
      self.object_prototype,
      self.function_prototype,
      self.array_prototype,
      self.string_prototype,
      self.number_prototype,
      self.boolean_prototype,
      self.error_prototype,
    ] {
      tracer.trace_object(proto);
    }
    self.names.trace(tracer);
  }
}

impl Runtime {
  /// Converts an error into the value a `catch` clause binds.
  ///
  /// Language-level throws carry their own value; other errors become `Error`-class objects with
  /// `name` and `message` own properties.
  pub fn error_to_value(&mut self, err: &VmError) -> Result<Value, VmError> {
    if let VmError::Throw(value) = err {
      return Ok(*value);
    }
    let proto = self.realm.error_prototype();
    let obj = self.heap.alloc_object_with_class(Some(proto), ClassTag::Error)?;
    let names = *self.realm.names();
    let name = self.heap.alloc_string(err.error_name())?;
    let message = self.heap.alloc_string(&err.to_string())?;
    self
      .heap
      .object_define_raw(obj, names.name, global_data_desc(Value::String(name)))?;
    self
      .heap
      .object_define_raw(obj, names.message, global_data_desc(Value::String(message)))?;
    Ok(Value::Object(obj))
  }
}
