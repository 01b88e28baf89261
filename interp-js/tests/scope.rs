mod common;

use common::runtime;
use interp_js::ast::Pattern;
use interp_js::PropertyDescriptorPatch;
use interp_js::Runtime;
use interp_js::Value;
use interp_js::VmError;

fn seven(_rt: &mut Runtime, _this: Value, _args: &[Value]) -> Result<Value, VmError> {
  Ok(Value::Number(7.0))
}

#[test]
fn lookup_walks_outwards_and_inner_bindings_shadow() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let global = rt.global_scope();
  let outer = rt.create_child_scope(global)?;
  let inner = rt.create_child_scope(outer)?;

  rt.scope_add(outer, "x", Value::Number(1.0))?;
  assert_eq!(rt.lookup(inner, "x")?, Value::Number(1.0));

  rt.scope_add(inner, "x", Value::Number(2.0))?;
  assert_eq!(rt.lookup(inner, "x")?, Value::Number(2.0));
  assert_eq!(rt.lookup(outer, "x")?, Value::Number(1.0));
  Ok(())
}

#[test]
fn unresolved_lookup_names_the_identifier() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let scope = rt.global_scope();
  match rt.lookup(scope, "nowhere") {
    Err(VmError::UnresolvedReference(name)) => assert_eq!(&*name, "nowhere"),
    other => panic!("expected UnresolvedReference, got {other:?}"),
  }
  assert!(!rt.has_binding(scope, "nowhere")?);
  assert!(rt.has_binding(scope, "undefined")?);
  assert!(rt.has_binding(scope, "globalThis")?);
  Ok(())
}

#[test]
fn child_scopes_inherit_receiver_and_strictness() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let global = rt.global_scope();
  assert_eq!(rt.scope_this(global)?, Value::Object(rt.global_object()));

  let outer = rt.create_child_scope(global)?;
  rt.set_scope_strict(outer, true)?;
  rt.set_scope_this(outer, Value::Number(3.0))?;
  let inner = rt.create_child_scope(outer)?;
  assert!(rt.scope_is_strict(inner)?);
  assert_eq!(rt.scope_this(inner)?, Value::Number(3.0));

  // Scope objects have no prototype, so inherited object properties never leak in as bindings.
  let object = rt.heap.get_scope(inner)?.object;
  assert_eq!(rt.heap.object_prototype(object)?, None);
  Ok(())
}

#[test]
fn assignment_updates_the_nearest_binding() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let global = rt.global_scope();
  let outer = rt.create_child_scope(global)?;
  let inner = rt.create_child_scope(outer)?;
  rt.scope_add(outer, "count", Value::Number(0.0))?;

  rt.assign(inner, "count", Value::Number(1.0))?;
  assert_eq!(rt.lookup(outer, "count")?, Value::Number(1.0));
  assert!(!rt.has_binding(global, "count")?);
  Ok(())
}

#[test]
fn sloppy_assignment_to_unbound_name_creates_a_global() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let global = rt.global_scope();
  let inner = rt.create_child_scope(global)?;

  rt.assign(inner, "leaked", Value::Bool(true))?;
  let global_object = rt.global_object();
  assert_eq!(rt.get_named(Value::Object(global_object), "leaked")?, Value::Bool(true));

  // The implicit global is an ordinary property: enumerable and deletable.
  let key = rt.heap.key_from_str("leaked")?;
  let keys = rt
    .observable_properties(Value::Object(global_object))?
    .collect(&rt.heap)?;
  assert!(keys.contains(&key));
  assert!(rt.delete(global_object, key, true)?);
  Ok(())
}

#[test]
fn strict_assignment_to_unbound_name_fails() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let global = rt.global_scope();
  let inner = rt.create_child_scope(global)?;
  rt.set_scope_strict(inner, true)?;

  assert!(matches!(
    rt.assign(inner, "leaked", Value::Bool(true)),
    Err(VmError::UnresolvedReference(_))
  ));
  assert!(!rt.has_binding(global, "leaked")?);
  Ok(())
}

#[test]
fn read_only_globals_reject_strict_writes() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let global = rt.global_scope();
  rt.assign(global, "undefined", Value::Number(1.0))?;
  assert_eq!(rt.lookup(global, "undefined")?, Value::Undefined);

  let strict = rt.create_child_scope(global)?;
  rt.set_scope_strict(strict, true)?;
  assert!(matches!(
    rt.assign(strict, "undefined", Value::Number(1.0)),
    Err(VmError::PropertyAccess(_))
  ));
  Ok(())
}

#[test]
fn variable_bindings_are_hidden_and_undeletable() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let global = rt.global_scope();
  let scope = rt.create_child_scope(global)?;
  rt.scope_add(scope, "v", Value::Number(1.0))?;
  let object = rt.heap.get_scope(scope)?.object;
  let key = rt.heap.key_from_str("v")?;

  let desc = rt
    .heap
    .object_get_own_property(object, &key)?
    .ok_or(VmError::InvalidHandle)?;
  assert!(desc.is_variable && desc.enumerable && desc.is_writable() && !desc.configurable);

  assert!(rt.observable_properties(Value::Object(object))?.collect(&rt.heap)?.is_empty());
  assert!(!rt.delete(object, key, false)?);
  assert!(rt.has_binding(scope, "v")?);
  Ok(())
}

#[test]
fn write_to_redirects_declarations() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let global = rt.global_scope();
  let target = rt.alloc_plain_object()?;
  let scope = rt.create_child_scope(global)?;
  rt.set_scope_write_to(scope, Some(target))?;

  rt.scope_add(scope, "declared", Value::Number(4.0))?;
  assert_eq!(rt.get_named(Value::Object(target), "declared")?, Value::Number(4.0));
  let object = rt.heap.get_scope(scope)?.object;
  assert!(rt.heap.own_property_keys(object)?.is_empty());
  Ok(())
}

#[test]
fn installed_cells_alias_other_bindings() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let global = rt.global_scope();
  let a = rt.create_child_scope(global)?;
  let b = rt.create_child_scope(global)?;
  let cell = rt.scope_add(a, "shared", Value::Number(1.0))?;
  rt.scope_install_cell(b, "alias", cell)?;

  rt.assign(b, "alias", Value::Number(2.0))?;
  assert_eq!(rt.lookup(a, "shared")?, Value::Number(2.0));
  Ok(())
}

#[test]
fn accessor_bindings_run_their_getter() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let global = rt.global_scope();
  let scope = rt.create_child_scope(global)?;
  let object = rt.heap.get_scope(scope)?.object;
  let getter = rt.alloc_native_function("get computed", 0, seven)?;
  let key = rt.heap.key_from_str("computed")?;
  rt.define_own_property(
    object,
    key,
    PropertyDescriptorPatch {
      get: Some(Value::Object(getter)),
      ..Default::default()
    },
  )?;
  assert_eq!(rt.lookup(scope, "computed")?, Value::Number(7.0));
  Ok(())
}

#[test]
fn destructuring_targets_resolve_through_the_dispatcher() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let global = rt.global_scope();
  let scope = rt.create_child_scope(global)?;
  rt.scope_add(scope, "first", Value::Undefined)?;
  rt.scope_add(scope, "second", Value::Undefined)?;

  let pattern = Pattern::Array(vec![
    Some(Pattern::Identifier("first".into())),
    Some(Pattern::Identifier("second".into())),
  ]);
  let arr = rt.alloc_array(&[Value::Number(10.0), Value::Number(20.0)])?;
  let reference = rt.dispatcher().resolve_ref(&mut rt, &pattern, scope)?;
  reference.set_value(&mut rt, Value::Object(arr))?;

  assert_eq!(rt.lookup(scope, "first")?, Value::Number(10.0));
  assert_eq!(rt.lookup(scope, "second")?, Value::Number(20.0));
  Ok(())
}
