use crate::function::ClosureData;
use crate::function::NativeFunction;
use crate::property::array_index_from_units;
use crate::property::PropertyDescriptor;
use crate::property::PropertyKey;
use crate::property::PropertyKind;
use crate::scope::ScopeRecord;
use crate::string::JsString;
use crate::{GcObject, GcProperty, GcScope, GcString, HeapId, Value, VmError};
use ahash::HashMap;
use ahash::HashMapExt;
use ahash::HashSet;
use ahash::HashSetExt;
use derive_more::derive::Display;
use std::sync::Arc;
use tracing::debug;

/// Hard upper bound for prototype chain traversals.
///
/// `object_set_prototype` rejects cycles, so this only bounds pathological (very deep) chains.
pub const MAX_PROTOTYPE_CHAIN: usize = 10_000;

/// Heap configuration and memory limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapLimits {
  /// Maximum number of live allocations (strings, objects, scopes and property cells).
  pub max_slots: usize,
  /// Live allocations at which the runtime first collects garbage at a branch boundary.
  pub gc_threshold: usize,
}

impl HeapLimits {
  /// Limits with the collection threshold at half of `max_slots`.
  pub fn new(max_slots: usize) -> Self {
    Self {
      max_slots,
      gc_threshold: max_slots / 2,
    }
  }

  pub fn with_gc_threshold(self, gc_threshold: usize) -> Self {
    Self {
      gc_threshold,
      ..self
    }
  }
}

impl Default for HeapLimits {
  fn default() -> Self {
    Self::new(1 << 24)
  }
}

/// A persistent root registered with [`Heap::add_root`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RootId(u32);

/// The class tag of an object, used for `[object Class]` tagging and dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub enum ClassTag {
  #[display("Object")]
  Object,
  #[display("Array")]
  Array,
  #[display("Function")]
  Function,
  #[display("Arguments")]
  Arguments,
  #[display("Error")]
  Error,
  #[display("{_0}")]
  Custom(Arc<str>),
}

/// A non-moving mark/sweep slot heap holding every allocation.
///
/// Handles carry the slot's generation, so a handle to a collected allocation is detected rather
/// than aliasing whatever reuses its slot. Strings are interned: allocating the same contents twice
/// returns the same [`GcString`] for as long as the first one is live.
///
/// Collection never runs on its own. The [`Runtime`](crate::Runtime) collects at branch boundaries
/// where every handle is owned by a frame, the realm or a persistent root.
pub struct Heap {
  limits: HeapLimits,
  slots: Vec<Slot>,
  marks: Vec<u8>,
  free_list: Vec<u32>,
  live: usize,
  /// Live count at which [`Heap::needs_collection`] turns true.
  next_gc: usize,
  gc_runs: u64,
  strings: HashMap<JsString, GcString>,
  persistent_roots: Vec<Option<Value>>,
  persistent_roots_free: Vec<u32>,
}

#[derive(Debug)]
struct Slot {
  generation: u32,
  value: Option<HeapObject>,
}

#[derive(Debug)]
enum HeapObject {
  String(JsString),
  Object(JsObject),
  Scope(ScopeRecord),
  Property(PropertyDescriptor),
}

#[derive(Debug)]
pub(crate) struct JsObject {
  pub(crate) base: ObjectBase,
  pub(crate) kind: ObjectKind,
}

#[derive(Debug)]
pub(crate) struct ObjectBase {
  prototype: Option<GcObject>,
  class: ClassTag,
  extensible: bool,
  properties: Vec<PropertyEntry>,
}

impl ObjectBase {
  fn new(prototype: Option<GcObject>, class: ClassTag) -> Self {
    Self {
      prototype,
      class,
      extensible: true,
      properties: Vec::new(),
    }
  }

  fn find(&self, key: &PropertyKey) -> Option<usize> {
    self.properties.iter().position(|entry| entry.key == *key)
  }
}

#[derive(Debug, Clone, Copy)]
struct PropertyEntry {
  key: PropertyKey,
  cell: GcProperty,
}

/// What an object is, beyond its property map.
#[derive(Debug)]
pub(crate) enum ObjectKind {
  Ordinary,
  Array,
  Closure(ClosureData),
  Native(NativeFunction),
}

impl Heap {
  pub fn new(limits: HeapLimits) -> Self {
    Self {
      limits,
      slots: Vec::new(),
      marks: Vec::new(),
      free_list: Vec::new(),
      live: 0,
      next_gc: gc_ceiling(limits).min(limits.gc_threshold),
      gc_runs: 0,
      strings: HashMap::new(),
      persistent_roots: Vec::new(),
      persistent_roots_free: Vec::new(),
    }
  }

  pub fn limits(&self) -> HeapLimits {
    self.limits
  }

  /// Number of live allocations.
  pub fn slot_count(&self) -> usize {
    self.live
  }

  /// Number of completed collections.
  pub fn gc_runs(&self) -> u64 {
    self.gc_runs
  }

  /// Whether enough has been allocated since the last collection to warrant another.
  pub fn needs_collection(&self) -> bool {
    self.live >= self.next_gc
  }

  fn alloc(&mut self, obj: HeapObject) -> Result<HeapId, VmError> {
    if self.live >= self.limits.max_slots {
      return Err(VmError::OutOfMemory);
    }
    if let Some(idx) = self.free_list.pop() {
      let slot = self
        .slots
        .get_mut(idx as usize)
        .ok_or(VmError::InvalidHandle)?;
      slot.value = Some(obj);
      self.live += 1;
      return Ok(HeapId::from_parts(idx, slot.generation));
    }
    if self.slots.len() >= u32::MAX as usize {
      return Err(VmError::OutOfMemory);
    }
    self
      .slots
      .try_reserve(1)
      .map_err(|_| VmError::OutOfMemory)?;
    self
      .marks
      .try_reserve(1)
      .map_err(|_| VmError::OutOfMemory)?;
    let idx = self.slots.len() as u32;
    self.slots.push(Slot {
      generation: 0,
      value: Some(obj),
    });
    self.marks.push(0);
    self.live += 1;
    Ok(HeapId::from_parts(idx, 0))
  }

  fn get_heap_object(&self, id: HeapId) -> Result<&HeapObject, VmError> {
    let slot = self
      .slots
      .get(id.index() as usize)
      .ok_or(VmError::InvalidHandle)?;
    if slot.generation != id.generation() {
      return Err(VmError::InvalidHandle);
    }
    slot.value.as_ref().ok_or(VmError::InvalidHandle)
  }

  fn get_heap_object_mut(&mut self, id: HeapId) -> Result<&mut HeapObject, VmError> {
    let slot = self
      .slots
      .get_mut(id.index() as usize)
      .ok_or(VmError::InvalidHandle)?;
    if slot.generation != id.generation() {
      return Err(VmError::InvalidHandle);
    }
    slot.value.as_mut().ok_or(VmError::InvalidHandle)
  }

  // Collection.

  /// Runs a mark/sweep cycle.
  ///
  /// Persistent roots are always traced; `trace_roots` reports every other handle the caller
  /// still needs. Anything else is freed, and interned strings that die leave the intern table.
  pub fn collect_garbage(&mut self, trace_roots: impl FnOnce(&mut Tracer<'_>)) {
    self.gc_runs += 1;
    let before = self.live;

    // Mark.
    {
      let mut tracer = Tracer::new(&self.slots, &mut self.marks);
      for value in self.persistent_roots.iter().flatten() {
        tracer.trace_value(*value);
      }
      trace_roots(&mut tracer);

      let slots = tracer.slots;
      while let Some(id) = tracer.pop_work() {
        let Some(idx) = tracer.validate(id) else {
          continue;
        };
        if tracer.marks[idx] != 0 {
          continue;
        }
        tracer.marks[idx] = 1;
        if let Some(obj) = slots[idx].value.as_ref() {
          obj.trace(&mut tracer);
        }
      }
    }

    // Sweep.
    for (idx, slot) in self.slots.iter_mut().enumerate() {
      let marked = std::mem::take(&mut self.marks[idx]) != 0;
      if marked {
        continue;
      }
      let Some(obj) = slot.value.take() else {
        continue;
      };
      if let HeapObject::String(js) = &obj {
        self.strings.remove(js);
      }
      slot.generation = slot.generation.wrapping_add(1);
      self.free_list.push(idx as u32);
      self.live -= 1;
    }

    let ceiling = gc_ceiling(self.limits);
    self.next_gc = self
      .live
      .saturating_mul(2)
      .clamp(self.limits.gc_threshold.min(ceiling), ceiling);
    debug!(
      run = self.gc_runs,
      freed = before - self.live,
      live = self.live,
      next = self.next_gc,
      "garbage collected"
    );
  }

  /// Keeps `value` alive across collections until [`Heap::remove_root`].
  pub fn add_root(&mut self, value: Value) -> RootId {
    let idx = match self.persistent_roots_free.pop() {
      Some(idx) => idx as usize,
      None => {
        self.persistent_roots.push(None);
        self.persistent_roots.len() - 1
      }
    };
    self.persistent_roots[idx] = Some(value);
    RootId(idx as u32)
  }

  pub fn get_root(&self, id: RootId) -> Option<Value> {
    self
      .persistent_roots
      .get(id.0 as usize)
      .and_then(|slot| *slot)
  }

  pub fn remove_root(&mut self, id: RootId) {
    let Some(slot) = self.persistent_roots.get_mut(id.0 as usize) else {
      return;
    };
    if slot.take().is_some() {
      self.persistent_roots_free.push(id.0);
    }
  }

  // Strings.

  /// Interns a UTF-8 string.
  pub fn alloc_string(&mut self, s: &str) -> Result<GcString, VmError> {
    let units: Vec<u16> = s.encode_utf16().collect();
    self.alloc_string_from_u16_vec(units)
  }

  pub fn alloc_string_from_code_units(&mut self, units: &[u16]) -> Result<GcString, VmError> {
    if let Some(existing) = self.strings.get(units) {
      return Ok(*existing);
    }
    self.alloc_string_from_u16_vec(units.to_vec())
  }

  pub fn alloc_string_from_u16_vec(&mut self, units: Vec<u16>) -> Result<GcString, VmError> {
    if let Some(existing) = self.strings.get(units.as_slice()) {
      return Ok(*existing);
    }
    let js = JsString::from_u16_vec(units);
    let id = self.alloc(HeapObject::String(js.clone()))?;
    let s = GcString(id);
    self.strings.insert(js, s);
    Ok(s)
  }

  pub fn get_string(&self, s: GcString) -> Result<&JsString, VmError> {
    match self.get_heap_object(s.0)? {
      HeapObject::String(js) => Ok(js),
      _ => Err(VmError::InvalidHandle),
    }
  }

  /// Builds a property key from a name, canonicalizing array-index strings.
  pub fn key_from_str(&mut self, name: &str) -> Result<PropertyKey, VmError> {
    let s = self.alloc_string(name)?;
    self.key_from_string(s)
  }

  pub fn key_from_string(&self, s: GcString) -> Result<PropertyKey, VmError> {
    let units = self.get_string(s)?.as_code_units();
    Ok(match array_index_from_units(units) {
      Some(idx) => PropertyKey::Index(idx),
      None => PropertyKey::String(s),
    })
  }

  /// The string form of a property key.
  pub fn key_to_string(&mut self, key: PropertyKey) -> Result<GcString, VmError> {
    match key {
      PropertyKey::String(s) => Ok(s),
      PropertyKey::Index(idx) => self.alloc_string(&idx.to_string()),
    }
  }

  pub(crate) fn key_to_rust_string(&self, key: PropertyKey) -> Result<String, VmError> {
    match key {
      PropertyKey::String(s) => Ok(self.get_string(s)?.to_utf8_lossy()),
      PropertyKey::Index(idx) => Ok(idx.to_string()),
    }
  }

  // Property cells.

  pub fn alloc_property(&mut self, desc: PropertyDescriptor) -> Result<GcProperty, VmError> {
    Ok(GcProperty(self.alloc(HeapObject::Property(desc))?))
  }

  pub fn property_cell(&self, cell: GcProperty) -> Result<&PropertyDescriptor, VmError> {
    match self.get_heap_object(cell.0)? {
      HeapObject::Property(desc) => Ok(desc),
      _ => Err(VmError::InvalidHandle),
    }
  }

  pub fn property_cell_mut(&mut self, cell: GcProperty) -> Result<&mut PropertyDescriptor, VmError> {
    match self.get_heap_object_mut(cell.0)? {
      HeapObject::Property(desc) => Ok(desc),
      _ => Err(VmError::InvalidHandle),
    }
  }

  /// Overwrites the value of a data cell in place. Every map sharing the cell observes the write.
  pub(crate) fn write_cell_value(&mut self, cell: GcProperty, new_value: Value) -> Result<(), VmError> {
    match &mut self.property_cell_mut(cell)?.kind {
      PropertyKind::Data { value, .. } => {
        *value = new_value;
        Ok(())
      }
      PropertyKind::Accessor { .. } => Err(VmError::InvalidHandle),
    }
  }

  // Objects.

  /// Allocates an ordinary object of class `Object`.
  pub fn alloc_object(&mut self, prototype: Option<GcObject>) -> Result<GcObject, VmError> {
    self.alloc_object_with_class(prototype, ClassTag::Object)
  }

  pub fn alloc_object_with_class(
    &mut self,
    prototype: Option<GcObject>,
    class: ClassTag,
  ) -> Result<GcObject, VmError> {
    self.alloc_object_with_kind(prototype, class, ObjectKind::Ordinary)
  }

  pub(crate) fn alloc_object_with_kind(
    &mut self,
    prototype: Option<GcObject>,
    class: ClassTag,
    kind: ObjectKind,
  ) -> Result<GcObject, VmError> {
    if let Some(proto) = prototype {
      self.get_object(proto)?;
    }
    let obj = JsObject {
      base: ObjectBase::new(prototype, class),
      kind,
    };
    Ok(GcObject(self.alloc(HeapObject::Object(obj))?))
  }

  pub(crate) fn get_object(&self, obj: GcObject) -> Result<&JsObject, VmError> {
    match self.get_heap_object(obj.0)? {
      HeapObject::Object(o) => Ok(o),
      _ => Err(VmError::InvalidHandle),
    }
  }

  pub(crate) fn get_object_mut(&mut self, obj: GcObject) -> Result<&mut JsObject, VmError> {
    match self.get_heap_object_mut(obj.0)? {
      HeapObject::Object(o) => Ok(o),
      _ => Err(VmError::InvalidHandle),
    }
  }

  pub fn is_valid_object(&self, obj: GcObject) -> bool {
    self.get_object(obj).is_ok()
  }

  pub fn object_class(&self, obj: GcObject) -> Result<&ClassTag, VmError> {
    Ok(&self.get_object(obj)?.base.class)
  }

  pub fn is_array(&self, obj: GcObject) -> Result<bool, VmError> {
    Ok(matches!(self.get_object(obj)?.kind, ObjectKind::Array))
  }

  pub fn object_prototype(&self, obj: GcObject) -> Result<Option<GcObject>, VmError> {
    Ok(self.get_object(obj)?.base.prototype)
  }

  /// Sets an object's prototype, rejecting cycles.
  pub fn object_set_prototype(
    &mut self,
    obj: GcObject,
    prototype: Option<GcObject>,
  ) -> Result<(), VmError> {
    self.get_object(obj)?;

    if prototype == Some(obj) {
      return Err(VmError::PrototypeCycle);
    }

    let mut current = prototype;
    let mut steps = 0usize;
    let mut visited: HashSet<GcObject> = HashSet::new();
    while let Some(p) = current {
      if steps >= MAX_PROTOTYPE_CHAIN {
        return Err(VmError::PrototypeChainTooDeep);
      }
      steps += 1;

      if !visited.insert(p) || p == obj {
        return Err(VmError::PrototypeCycle);
      }

      current = self.object_prototype(p)?;
    }

    self.get_object_mut(obj)?.base.prototype = prototype;
    Ok(())
  }

  pub fn object_is_extensible(&self, obj: GcObject) -> Result<bool, VmError> {
    Ok(self.get_object(obj)?.base.extensible)
  }

  pub fn object_prevent_extensions(&mut self, obj: GcObject) -> Result<(), VmError> {
    self.get_object_mut(obj)?.base.extensible = false;
    Ok(())
  }

  /// The cell backing an own property, if any.
  pub fn object_own_cell(
    &self,
    obj: GcObject,
    key: &PropertyKey,
  ) -> Result<Option<GcProperty>, VmError> {
    let base = &self.get_object(obj)?.base;
    Ok(base.find(key).map(|idx| base.properties[idx].cell))
  }

  /// Gets an own property descriptor without running accessors.
  pub fn object_get_own_property(
    &self,
    obj: GcObject,
    key: &PropertyKey,
  ) -> Result<Option<PropertyDescriptor>, VmError> {
    match self.object_own_cell(obj, key)? {
      Some(cell) => Ok(Some(*self.property_cell(cell)?)),
      None => Ok(None),
    }
  }

  /// Binds `key` to an existing cell, replacing any previous binding of `key`.
  ///
  /// Insertion order is preserved when an existing key is rebound.
  pub fn object_install_cell(
    &mut self,
    obj: GcObject,
    key: PropertyKey,
    cell: GcProperty,
  ) -> Result<(), VmError> {
    self.property_cell(cell)?;
    let base = &mut self.get_object_mut(obj)?.base;
    match base.find(&key) {
      Some(idx) => base.properties[idx].cell = cell,
      None => {
        base
          .properties
          .try_reserve(1)
          .map_err(|_| VmError::OutOfMemory)?;
        base.properties.push(PropertyEntry { key, cell });
      }
    }
    Ok(())
  }

  /// Defines an own property in a fresh cell, bypassing attribute checks.
  pub fn object_define_raw(
    &mut self,
    obj: GcObject,
    key: PropertyKey,
    desc: PropertyDescriptor,
  ) -> Result<GcProperty, VmError> {
    self.get_object(obj)?;
    let cell = self.alloc_property(desc)?;
    self.object_install_cell(obj, key, cell)?;
    Ok(cell)
  }

  /// Removes an own property binding. The cell itself stays alive for any other map sharing it.
  pub fn object_remove(&mut self, obj: GcObject, key: &PropertyKey) -> Result<bool, VmError> {
    let base = &mut self.get_object_mut(obj)?.base;
    match base.find(key) {
      Some(idx) => {
        base.properties.remove(idx);
        Ok(true)
      }
      None => Ok(false),
    }
  }

  /// Own property keys in insertion order.
  pub fn own_property_keys(&self, obj: GcObject) -> Result<Vec<PropertyKey>, VmError> {
    Ok(
      self
        .get_object(obj)?
        .base
        .properties
        .iter()
        .map(|entry| entry.key)
        .collect(),
    )
  }

  /// The key/cell pair at `index` in insertion order.
  pub(crate) fn own_property_at(
    &self,
    obj: GcObject,
    index: usize,
  ) -> Result<Option<(PropertyKey, GcProperty)>, VmError> {
    Ok(
      self
        .get_object(obj)?
        .base
        .properties
        .get(index)
        .map(|entry| (entry.key, entry.cell)),
    )
  }

  /// Finds a property on `obj` or its prototype chain, returning the holder and the cell.
  pub fn find_property(
    &self,
    obj: GcObject,
    key: &PropertyKey,
  ) -> Result<Option<(GcObject, GcProperty)>, VmError> {
    let mut current = Some(obj);
    let mut steps = 0usize;
    while let Some(o) = current {
      if steps >= MAX_PROTOTYPE_CHAIN {
        return Err(VmError::PrototypeChainTooDeep);
      }
      steps += 1;
      if let Some(cell) = self.object_own_cell(o, key)? {
        return Ok(Some((o, cell)));
      }
      current = self.object_prototype(o)?;
    }
    Ok(None)
  }

  /// Gets a property descriptor from `obj` or its prototype chain without running accessors.
  pub fn get_property(
    &self,
    obj: GcObject,
    key: &PropertyKey,
  ) -> Result<Option<PropertyDescriptor>, VmError> {
    match self.find_property(obj, key)? {
      Some((_, cell)) => Ok(Some(*self.property_cell(cell)?)),
      None => Ok(None),
    }
  }

  // Functions.

  pub(crate) fn object_kind(&self, obj: GcObject) -> Result<&ObjectKind, VmError> {
    Ok(&self.get_object(obj)?.kind)
  }

  pub fn closure_data(&self, obj: GcObject) -> Result<&ClosureData, VmError> {
    match &self.get_object(obj)?.kind {
      ObjectKind::Closure(data) => Ok(data),
      _ => Err(VmError::InvalidHandle),
    }
  }

  pub fn is_callable(&self, value: Value) -> Result<bool, VmError> {
    let Value::Object(obj) = value else {
      return Ok(false);
    };
    Ok(matches!(
      self.get_object(obj)?.kind,
      ObjectKind::Closure(_) | ObjectKind::Native(_)
    ))
  }

  // Scopes.

  pub fn alloc_scope(&mut self, record: ScopeRecord) -> Result<GcScope, VmError> {
    self.get_object(record.object)?;
    Ok(GcScope(self.alloc(HeapObject::Scope(record))?))
  }

  pub fn get_scope(&self, scope: GcScope) -> Result<&ScopeRecord, VmError> {
    match self.get_heap_object(scope.0)? {
      HeapObject::Scope(record) => Ok(record),
      _ => Err(VmError::InvalidHandle),
    }
  }

  pub(crate) fn get_scope_mut(&mut self, scope: GcScope) -> Result<&mut ScopeRecord, VmError> {
    match self.get_heap_object_mut(scope.0)? {
      HeapObject::Scope(record) => Ok(record),
      _ => Err(VmError::InvalidHandle),
    }
  }

  // Value helpers that never run user code.

  /// Truthiness.
  pub fn to_boolean(&self, value: Value) -> Result<bool, VmError> {
    Ok(match value {
      Value::Undefined | Value::Null => false,
      Value::Bool(b) => b,
      Value::Number(n) => n != 0.0 && !n.is_nan(),
      Value::String(s) => !self.get_string(s)?.is_empty(),
      Value::Object(_) => true,
    })
  }

  /// The `typeof` string of a value.
  pub fn type_of(&self, value: Value) -> Result<&'static str, VmError> {
    Ok(match value {
      Value::Undefined => "undefined",
      Value::Null => "object",
      Value::Bool(_) => "boolean",
      Value::Number(_) => "number",
      Value::String(_) => "string",
      Value::Object(_) => {
        if self.is_callable(value)? {
          "function"
        } else {
          "object"
        }
      }
    })
  }

  /// A human-readable rendering of a value. Objects render as `[object Class]`.
  pub fn debug_string(&self, value: Value) -> Result<String, VmError> {
    Ok(match value {
      Value::Undefined => "undefined".to_string(),
      Value::Null => "null".to_string(),
      Value::Bool(b) => b.to_string(),
      Value::Number(n) => crate::ops::number_to_string(n),
      Value::String(s) => self.get_string(s)?.to_utf8_lossy(),
      Value::Object(obj) => format!("[object {}]", self.object_class(obj)?),
    })
  }
}

/// The highest live count a collection is scheduled at, leaving headroom below `max_slots` for the
/// allocations a single boundary makes.
fn gc_ceiling(limits: HeapLimits) -> usize {
  limits.max_slots - limits.max_slots / 4
}

/// Marks allocations reachable from the handles it is given.
///
/// [`Task::trace`](crate::Task::trace) implementations report their handles through this.
pub struct Tracer<'a> {
  slots: &'a [Slot],
  marks: &'a mut [u8],
  worklist: Vec<HeapId>,
}

impl<'a> Tracer<'a> {
  fn new(slots: &'a [Slot], marks: &'a mut [u8]) -> Self {
    Self {
      slots,
      marks,
      worklist: Vec::new(),
    }
  }

  fn pop_work(&mut self) -> Option<HeapId> {
    self.worklist.pop()
  }

  pub fn trace_value(&mut self, value: Value) {
    match value {
      Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) => {}
      Value::String(s) => self.trace_heap_id(s.0),
      Value::Object(o) => self.trace_heap_id(o.0),
    }
  }

  pub fn trace_object(&mut self, obj: GcObject) {
    self.trace_heap_id(obj.0);
  }

  pub fn trace_scope(&mut self, scope: GcScope) {
    self.trace_heap_id(scope.0);
  }

  pub fn trace_cell(&mut self, cell: GcProperty) {
    self.trace_heap_id(cell.0);
  }

  pub fn trace_key(&mut self, key: PropertyKey) {
    if let PropertyKey::String(s) = key {
      self.trace_heap_id(s.0);
    }
  }

  fn trace_heap_id(&mut self, id: HeapId) {
    let Some(idx) = self.validate(id) else {
      return;
    };
    if self.marks[idx] != 0 {
      return;
    }
    self.worklist.push(id);
  }

  /// The slot index of `id`, or `None` for a stale or foreign handle.
  fn validate(&self, id: HeapId) -> Option<usize> {
    let idx = id.index() as usize;
    let slot = self.slots.get(idx)?;
    if slot.generation != id.generation() || slot.value.is_none() {
      return None;
    }
    Some(idx)
  }
}

/// Reports the handles a heap-owned or runtime-owned structure refers to.
pub(crate) trait Trace {
  fn trace(&self, tracer: &mut Tracer<'_>);
}

impl Trace for HeapObject {
  fn trace(&self, tracer: &mut Tracer<'_>) {
    match self {
      // Strings have no outgoing references.
      HeapObject::String(_) => {}
      HeapObject::Object(obj) => obj.trace(tracer),
      HeapObject::Scope(record) => record.trace(tracer),
      HeapObject::Property(desc) => desc.trace(tracer),
    }
  }
}

impl Trace for JsObject {
  fn trace(&self, tracer: &mut Tracer<'_>) {
    if let Some(proto) = self.base.prototype {
      tracer.trace_object(proto);
    }
    for entry in &self.base.properties {
      tracer.trace_key(entry.key);
      tracer.trace_cell(entry.cell);
    }
    if let ObjectKind::Closure(data) = &self.kind {
      data.trace(tracer);
    }
  }
}

impl Trace for ClosureData {
  fn trace(&self, tracer: &mut Tracer<'_>) {
    tracer.trace_scope(self.scope);
    if let Some(bound) = self.bound_scope {
      tracer.trace_scope(bound);
    }
    if let Some(this) = self.this {
      tracer.trace_value(this);
    }
  }
}

impl Trace for ScopeRecord {
  fn trace(&self, tracer: &mut Tracer<'_>) {
    tracer.trace_object(self.object);
    if let Some(parent) = self.parent {
      tracer.trace_scope(parent);
    }
    tracer.trace_value(self.this);
    if let Some(target) = self.write_to {
      tracer.trace_object(target);
    }
  }
}

impl Trace for PropertyDescriptor {
  fn trace(&self, tracer: &mut Tracer<'_>) {
    match self.kind {
      PropertyKind::Data { value, .. } => tracer.trace_value(value),
      PropertyKind::Accessor { get, set } => {
        tracer.trace_value(get);
        tracer.trace_value(set);
      }
    }
  }
}
