mod common;

use common::runtime;
use common::str_value;
use interp_js::ClassTag;
use interp_js::Heap;
use interp_js::HeapLimits;
use interp_js::PropertyDescriptor;
use interp_js::PropertyDescriptorPatch;
use interp_js::PropertyKey;
use interp_js::Runtime;
use interp_js::Value;
use interp_js::VmError;

fn return_this(_rt: &mut Runtime, this: Value, _args: &[Value]) -> Result<Value, VmError> {
  Ok(this)
}

/// Records its first argument as `this.seen`.
fn record_seen(rt: &mut Runtime, this: Value, args: &[Value]) -> Result<Value, VmError> {
  let Value::Object(obj) = this else {
    return Err(VmError::TypeError("setter called without an object receiver".to_string()));
  };
  let key = rt.heap.key_from_str("seen")?;
  let value = args.first().copied().unwrap_or(Value::Undefined);
  rt.set(obj, key, value, true)?;
  Ok(Value::Undefined)
}

#[test]
fn get_walks_the_prototype_chain_and_own_properties_shadow() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let proto = rt.alloc_plain_object()?;
  let obj = rt.heap.alloc_object(Some(proto))?;
  let x = rt.heap.key_from_str("x")?;

  rt.set(proto, x, Value::Number(1.0), true)?;
  assert_eq!(rt.get(Value::Object(obj), x)?, Value::Number(1.0));
  assert!(rt.has(Value::Object(obj), x)?);
  assert!(rt.heap.object_get_own_property(obj, &x)?.is_none());

  // Writing through the child creates an own property instead of touching the prototype.
  rt.set(obj, x, Value::Number(2.0), true)?;
  assert_eq!(rt.get(Value::Object(obj), x)?, Value::Number(2.0));
  assert_eq!(rt.get(Value::Object(proto), x)?, Value::Number(1.0));

  let missing = rt.heap.key_from_str("missing")?;
  assert_eq!(rt.get(Value::Object(obj), missing)?, Value::Undefined);
  Ok(())
}

#[test]
fn getters_receive_the_original_base() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let proto = rt.alloc_plain_object()?;
  let obj = rt.heap.alloc_object(Some(proto))?;
  let getter = rt.alloc_native_function("get self", 0, return_this)?;
  let key = rt.heap.key_from_str("self")?;
  let defined = rt.define_own_property(
    proto,
    key,
    PropertyDescriptorPatch {
      get: Some(Value::Object(getter)),
      configurable: Some(true),
      ..Default::default()
    },
  )?;
  assert!(defined);
  assert_eq!(rt.get(Value::Object(obj), key)?, Value::Object(obj));
  Ok(())
}

#[test]
fn inherited_setters_run_with_the_target_as_receiver() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let proto = rt.alloc_plain_object()?;
  let obj = rt.heap.alloc_object(Some(proto))?;
  let setter = rt.alloc_native_function("set value", 1, record_seen)?;
  let key = rt.heap.key_from_str("value")?;
  rt.define_own_property(
    proto,
    key,
    PropertyDescriptorPatch {
      set: Some(Value::Object(setter)),
      ..Default::default()
    },
  )?;

  assert!(rt.set(obj, key, Value::Number(9.0), true)?);
  let seen = rt.heap.key_from_str("seen")?;
  assert_eq!(rt.get(Value::Object(obj), seen)?, Value::Number(9.0));
  assert!(rt.heap.object_get_own_property(obj, &key)?.is_none());

  // An accessor without a setter rejects the write.
  let getter_only = rt.heap.key_from_str("getterOnly")?;
  let getter = rt.alloc_native_function("get getterOnly", 0, return_this)?;
  rt.define_own_property(
    proto,
    getter_only,
    PropertyDescriptorPatch {
      get: Some(Value::Object(getter)),
      ..Default::default()
    },
  )?;
  assert!(!rt.set(obj, getter_only, Value::Null, false)?);
  assert!(matches!(
    rt.set(obj, getter_only, Value::Null, true),
    Err(VmError::PropertyAccess(_))
  ));
  Ok(())
}

#[test]
fn rejected_writes_are_silent_only_in_sloppy_mode() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let obj = rt.alloc_plain_object()?;
  let key = rt.heap.key_from_str("fixed")?;
  rt.heap
    .object_define_raw(obj, key, PropertyDescriptor::data(Value::Number(1.0)).readonly())?;

  assert!(!rt.set(obj, key, Value::Number(2.0), false)?);
  assert_eq!(rt.get(Value::Object(obj), key)?, Value::Number(1.0));
  match rt.set(obj, key, Value::Number(2.0), true) {
    Err(VmError::PropertyAccess(name)) => assert_eq!(name, "fixed"),
    other => panic!("expected PropertyAccess, got {other:?}"),
  }

  // Read-only inherited properties block creation of an own property too.
  let child = rt.heap.alloc_object(Some(obj))?;
  assert!(!rt.set(child, key, Value::Number(3.0), false)?);
  assert!(rt.heap.object_get_own_property(child, &key)?.is_none());
  Ok(())
}

#[test]
fn non_extensible_objects_reject_new_properties() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let obj = rt.alloc_plain_object()?;
  let existing = rt.heap.key_from_str("a")?;
  rt.set(obj, existing, Value::Number(1.0), true)?;
  rt.heap.object_prevent_extensions(obj)?;

  let fresh = rt.heap.key_from_str("b")?;
  assert!(!rt.set(obj, fresh, Value::Number(2.0), false)?);
  assert!(rt.set(obj, fresh, Value::Number(2.0), true).is_err());
  assert!(rt.set(obj, existing, Value::Number(3.0), true)?);
  assert_eq!(rt.get(Value::Object(obj), existing)?, Value::Number(3.0));
  Ok(())
}

#[test]
fn primitive_and_nullish_bases() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let key = rt.heap.key_from_str("x")?;
  let s = str_value(&mut rt, "abc")?;

  assert!(!rt.set_value(s, key, Value::Number(1.0), false)?);
  assert!(matches!(
    rt.set_value(Value::Number(1.0), key, Value::Null, true),
    Err(VmError::PropertyAccess(_))
  ));
  assert!(matches!(
    rt.set_value(Value::Undefined, key, Value::Null, false),
    Err(VmError::TypeError(_))
  ));
  assert!(matches!(rt.get(Value::Null, key), Err(VmError::TypeError(_))));

  // Primitive bases read through their realm prototype.
  let proto = rt.realm().number_prototype();
  rt.set(proto, key, Value::Bool(true), true)?;
  assert_eq!(rt.get(Value::Number(7.0), key)?, Value::Bool(true));
  Ok(())
}

#[test]
fn array_length_tracks_index_writes_and_truncation() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let arr = rt.alloc_array(&[Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)])?;
  assert!(rt.heap.is_array(arr)?);
  assert_eq!(rt.array_length(arr)?, 3);

  rt.set(arr, PropertyKey::Index(5), Value::Number(6.0), true)?;
  assert_eq!(rt.array_length(arr)?, 6);
  assert_eq!(rt.get(Value::Object(arr), PropertyKey::Index(4))?, Value::Undefined);
  assert!(!rt.has(Value::Object(arr), PropertyKey::Index(4))?);

  let length = rt.heap.key_from_str("length")?;
  rt.set(arr, length, Value::Number(2.0), true)?;
  assert_eq!(rt.array_length(arr)?, 2);
  assert!(!rt.has(Value::Object(arr), PropertyKey::Index(2))?);
  assert!(!rt.has(Value::Object(arr), PropertyKey::Index(5))?);
  assert_eq!(rt.get(Value::Object(arr), PropertyKey::Index(1))?, Value::Number(2.0));

  assert!(matches!(
    rt.set(arr, length, Value::Number(1.5), true),
    Err(VmError::TypeError(_))
  ));

  // `length` is not enumerable and cannot be deleted.
  let keys = rt.observable_properties(Value::Object(arr))?.collect(&rt.heap)?;
  assert_eq!(keys, vec![PropertyKey::Index(0), PropertyKey::Index(1)]);
  assert!(!rt.delete(arr, length, false)?);
  Ok(())
}

#[test]
fn index_strings_canonicalize_to_index_keys() -> Result<(), VmError> {
  let mut rt = runtime()?;
  assert_eq!(rt.heap.key_from_str("17")?, PropertyKey::Index(17));
  assert!(matches!(rt.heap.key_from_str("017")?, PropertyKey::String(_)));
  assert!(matches!(rt.heap.key_from_str("4294967295")?, PropertyKey::String(_)));
  assert_eq!(rt.to_property_key(Value::Number(3.0))?, PropertyKey::Index(3));

  let arr = rt.alloc_array(&[])?;
  let two = str_value(&mut rt, "2")?;
  let key = rt.to_property_key(two)?;
  rt.set(arr, key, Value::Null, true)?;
  assert_eq!(rt.array_length(arr)?, 3);
  Ok(())
}

#[test]
fn define_own_property_respects_configurability() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let obj = rt.alloc_plain_object()?;
  let key = rt.heap.key_from_str("k")?;

  assert!(rt.define_own_property(
    obj,
    key,
    PropertyDescriptorPatch {
      value: Some(Value::Number(1.0)),
      ..Default::default()
    },
  )?);
  let desc = rt
    .heap
    .object_get_own_property(obj, &key)?
    .ok_or(VmError::InvalidHandle)?;
  assert!(!desc.enumerable && !desc.configurable && !desc.is_writable());

  // Non-configurable and non-writable: changing the value or attributes is refused.
  assert!(!rt.define_own_property(
    obj,
    key,
    PropertyDescriptorPatch {
      value: Some(Value::Number(2.0)),
      ..Default::default()
    },
  )?);
  assert!(!rt.define_own_property(
    obj,
    key,
    PropertyDescriptorPatch {
      configurable: Some(true),
      ..Default::default()
    },
  )?);
  assert_eq!(rt.get(Value::Object(obj), key)?, Value::Number(1.0));

  assert!(matches!(
    rt.define_own_property(
      obj,
      key,
      PropertyDescriptorPatch {
        value: Some(Value::Null),
        get: Some(Value::Undefined),
        ..Default::default()
      },
    ),
    Err(VmError::InvalidPropertyDescriptorPatch)
  ));
  Ok(())
}

#[test]
fn delete_removes_only_configurable_properties() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let obj = rt.alloc_plain_object()?;
  let plain = rt.heap.key_from_str("plain")?;
  let pinned = rt.heap.key_from_str("pinned")?;
  rt.set(obj, plain, Value::Number(1.0), true)?;
  rt.heap.object_define_raw(
    obj,
    pinned,
    PropertyDescriptor::data(Value::Number(2.0)).non_configurable(),
  )?;

  assert!(rt.delete(obj, plain, true)?);
  assert!(!rt.has(Value::Object(obj), plain)?);
  assert!(rt.delete(obj, plain, true)?);

  assert!(!rt.delete(obj, pinned, false)?);
  assert!(matches!(rt.delete(obj, pinned, true), Err(VmError::PropertyAccess(_))));
  assert!(rt.has(Value::Object(obj), pinned)?);
  Ok(())
}

#[test]
fn observable_keys_follow_insertion_order_and_skip_hidden_keys() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let proto = rt.alloc_plain_object()?;
  let obj = rt.heap.alloc_object(Some(proto))?;
  let b = rt.heap.key_from_str("b")?;
  let a = rt.heap.key_from_str("a")?;
  let hidden = rt.heap.key_from_str("hidden")?;
  let inherited = rt.heap.key_from_str("inherited")?;

  rt.set(obj, b, Value::Null, true)?;
  rt.set(obj, a, Value::Null, true)?;
  rt.heap
    .object_define_raw(obj, hidden, PropertyDescriptor::hidden(Value::Null))?;
  rt.set(proto, inherited, Value::Null, true)?;
  rt.set(proto, a, Value::Null, true)?;

  let own = rt.observable_properties(Value::Object(obj))?.collect(&rt.heap)?;
  assert_eq!(own, vec![b, a]);

  let all = rt
    .observable_properties(Value::Object(obj))?
    .with_inherited()
    .collect(&rt.heap)?;
  assert_eq!(all, vec![b, a, inherited]);

  // A fresh cursor starts over; a partially consumed one resumes where it stopped.
  let mut cursor = rt.observable_properties(Value::Object(obj))?;
  assert_eq!(cursor.next(&rt.heap)?, Some(b));
  assert_eq!(cursor.next(&rt.heap)?, Some(a));
  assert_eq!(cursor.next(&rt.heap)?, None);
  assert_eq!(cursor.next(&rt.heap)?, None);
  Ok(())
}

#[test]
fn non_enumerable_own_keys_shadow_inherited_ones() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let proto = rt.alloc_plain_object()?;
  let obj = rt.heap.alloc_object(Some(proto))?;
  let key = rt.heap.key_from_str("shadowed")?;
  rt.set(proto, key, Value::Null, true)?;
  rt.heap
    .object_define_raw(obj, key, PropertyDescriptor::hidden(Value::Null))?;

  let all = rt
    .observable_properties(Value::Object(obj))?
    .with_inherited()
    .collect(&rt.heap)?;
  assert!(all.is_empty());
  Ok(())
}

#[test]
fn strings_observe_their_indices() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let s = str_value(&mut rt, "hey")?;
  let keys = rt.observable_properties(s)?.collect(&rt.heap)?;
  assert_eq!(
    keys,
    vec![PropertyKey::Index(0), PropertyKey::Index(1), PropertyKey::Index(2)]
  );
  assert!(rt.observable_properties(Value::Null)?.collect(&rt.heap)?.is_empty());
  Ok(())
}

#[test]
fn shared_cells_alias_between_objects() -> Result<(), VmError> {
  let mut rt = runtime()?;
  let left = rt.alloc_plain_object()?;
  let right = rt.alloc_plain_object()?;
  let cell = rt.heap.alloc_property(PropertyDescriptor::data(Value::Number(1.0)))?;
  let x = rt.heap.key_from_str("x")?;
  let y = rt.heap.key_from_str("y")?;
  rt.heap.object_install_cell(left, x, cell)?;
  rt.heap.object_install_cell(right, y, cell)?;

  rt.set(left, x, Value::Number(5.0), true)?;
  assert_eq!(rt.get(Value::Object(right), y)?, Value::Number(5.0));

  // Deleting one binding leaves the other intact.
  rt.delete(right, y, true)?;
  assert_eq!(rt.get(Value::Object(left), x)?, Value::Number(5.0));
  Ok(())
}

#[test]
fn prototype_cycles_are_rejected() -> Result<(), VmError> {
  let mut heap = Heap::new(HeapLimits::default());
  let a = heap.alloc_object(None)?;
  let b = heap.alloc_object(Some(a))?;
  let c = heap.alloc_object(Some(b))?;

  assert!(matches!(heap.object_set_prototype(a, Some(c)), Err(VmError::PrototypeCycle)));
  assert!(matches!(heap.object_set_prototype(a, Some(a)), Err(VmError::PrototypeCycle)));
  heap.object_set_prototype(c, Some(a))?;
  assert_eq!(heap.object_prototype(c)?, Some(a));
  Ok(())
}

#[test]
fn heap_limit_is_enforced() -> Result<(), VmError> {
  let mut heap = Heap::new(HeapLimits::new(2));
  heap.alloc_object(None)?;
  heap.alloc_object_with_class(None, ClassTag::Custom("Thing".into()))?;
  assert!(matches!(heap.alloc_object(None), Err(VmError::OutOfMemory)));
  Ok(())
}
