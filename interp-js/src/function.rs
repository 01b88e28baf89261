use crate::ast::FunctionBody;
use crate::ast::FunctionNode;
use crate::heap::ClassTag;
use crate::heap::ObjectKind;
use crate::property::PropertyDescriptor;
use crate::runtime::Runtime;
use crate::{GcObject, GcScope, Value, VmError};
use core::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// A native entrypoint implemented in Rust.
///
/// Natives run synchronously inside the current driver step. They may re-enter script code through
/// [`Runtime::call_function`].
pub type NativeCallFn = fn(rt: &mut Runtime, this: Value, args: &[Value]) -> Result<Value, VmError>;

/// The internal state of a closure object.
#[derive(Debug, Clone)]
pub struct ClosureData {
  pub func: Rc<FunctionNode>,
  /// The scope captured when the closure was created.
  pub scope: GcScope,
  /// Installed by [`Runtime::bind_closure`]: invocations run in a child of this scope instead.
  pub bound_scope: Option<GcScope>,
  /// Receiver override. Arrow functions capture their creator's receiver here.
  pub this: Option<Value>,
  pub return_last_value: bool,
}

/// A host function exposed as a callable object.
#[derive(Clone)]
pub struct NativeFunction {
  pub name: Arc<str>,
  pub length: u32,
  pub call: NativeCallFn,
}

impl fmt::Debug for NativeFunction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NativeFunction")
      .field("name", &self.name)
      .field("length", &self.length)
      .finish_non_exhaustive()
  }
}

impl Runtime {
  /// Creates a closure over `func` capturing `scope`.
  ///
  /// `prototype`, `name` and `length` are installed immediately; `length` is the number of
  /// declared parameters.
  pub fn alloc_closure(&mut self, func: Rc<FunctionNode>, scope: GcScope) -> Result<GcObject, VmError> {
    let this = if func.arrow {
      Some(self.heap.get_scope(scope)?.this)
    } else {
      None
    };
    let data = ClosureData {
      return_last_value: matches!(func.body, FunctionBody::Expression(_)),
      func,
      scope,
      bound_scope: None,
      this,
    };
    self.alloc_closure_object(data)
  }

  /// Creates a new closure sharing `closure`'s function node and captured scope, with a receiver
  /// and/or scope override installed.
  pub fn bind_closure(
    &mut self,
    closure: GcObject,
    this: Option<Value>,
    bound_scope: Option<GcScope>,
  ) -> Result<GcObject, VmError> {
    let mut data = self.heap.closure_data(closure)?.clone();
    if this.is_some() {
      data.this = this;
    }
    if bound_scope.is_some() {
      data.bound_scope = bound_scope;
    }
    self.alloc_closure_object(data)
  }

  fn alloc_closure_object(&mut self, data: ClosureData) -> Result<GcObject, VmError> {
    let name = data.func.id.as_deref().unwrap_or("").to_string();
    let length = data.func.params.len() as u32;
    let proto = self.realm.function_prototype();
    let obj = self.heap.alloc_object_with_kind(
      Some(proto),
      ClassTag::Function,
      ObjectKind::Closure(data),
    )?;

    let prototype = self.alloc_plain_object()?;
    let key = self.realm.names().prototype;
    self.heap.object_define_raw(
      obj,
      key,
      PropertyDescriptor::hidden(Value::Object(prototype)).non_configurable(),
    )?;
    self.set_function_metadata(obj, &name, length)?;
    Ok(obj)
  }

  /// Wraps a host function in a callable object.
  pub fn alloc_native_function(
    &mut self,
    name: &str,
    length: u32,
    call: NativeCallFn,
  ) -> Result<GcObject, VmError> {
    let proto = self.realm.function_prototype();
    let obj = self.heap.alloc_object_with_kind(
      Some(proto),
      ClassTag::Function,
      ObjectKind::Native(NativeFunction {
        name: Arc::from(name),
        length,
        call,
      }),
    )?;
    self.set_function_metadata(obj, name, length)?;
    Ok(obj)
  }

  /// Installs the non-writable, non-enumerable, configurable `name` and `length` properties.
  fn set_function_metadata(&mut self, func: GcObject, name: &str, length: u32) -> Result<(), VmError> {
    let name = self.heap.alloc_string(name)?;
    let names = *self.realm.names();
    self.heap.object_define_raw(
      func,
      names.name,
      PropertyDescriptor::hidden(Value::String(name)).readonly(),
    )?;
    self.heap.object_define_raw(
      func,
      names.length,
      PropertyDescriptor::hidden(Value::Number(length as f64)).readonly(),
    )?;
    Ok(())
  }

  /// The function's own name: the declared identifier of a closure or the name of a native.
  pub fn function_name(&self, func: GcObject) -> Result<Option<Arc<str>>, VmError> {
    Ok(match self.heap.object_kind(func)? {
      ObjectKind::Closure(data) => data.func.id.as_deref().map(Arc::from),
      ObjectKind::Native(native) => Some(native.name.clone()),
      ObjectKind::Ordinary | ObjectKind::Array => None,
    })
  }
}
