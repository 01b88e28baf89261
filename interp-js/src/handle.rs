use core::fmt;

/// A stable identifier for an allocation in the [`Heap`](crate::Heap).
///
/// An id packs the slot index with the slot's generation at allocation time. Collection frees a
/// slot and bumps its generation, so an id that outlived its allocation no longer resolves:
/// dereferencing it returns [`VmError::InvalidHandle`](crate::VmError::InvalidHandle), as does an
/// id of the wrong kind or one issued by a different heap.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct HeapId(pub(crate) u64);

impl HeapId {
  pub(crate) fn from_parts(index: u32, generation: u32) -> Self {
    Self((index as u64) | ((generation as u64) << 32))
  }

  /// The slot index within the heap.
  #[inline]
  pub fn index(self) -> u32 {
    self.0 as u32
  }

  /// The generation of the slot when this id was issued.
  #[inline]
  pub fn generation(self) -> u32 {
    (self.0 >> 32) as u32
  }
}

impl fmt::Debug for HeapId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HeapId")
      .field("index", &self.index())
      .field("generation", &self.generation())
      .finish()
  }
}

/// A heap-managed object (plain object, array, arguments object, closure or native function).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct GcObject(pub(crate) HeapId);

impl GcObject {
  #[inline]
  pub fn id(self) -> HeapId {
    self.0
  }
}

/// A heap-managed, interned string.
///
/// Strings are interned on allocation, so two `GcString`s from the same heap are equal exactly
/// when their contents are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct GcString(pub(crate) HeapId);

impl GcString {
  #[inline]
  pub fn id(self) -> HeapId {
    self.0
  }
}

/// A heap-managed lexical scope record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct GcScope(pub(crate) HeapId);

impl GcScope {
  #[inline]
  pub fn id(self) -> HeapId {
    self.0
  }
}

/// A heap-managed property cell holding one [`PropertyDescriptor`](crate::PropertyDescriptor).
///
/// Property maps reference cells rather than owning descriptors, so one cell can back entries in
/// two maps (a sloppy-mode parameter binding and its `arguments` slot).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct GcProperty(pub(crate) HeapId);

impl GcProperty {
  #[inline]
  pub fn id(self) -> HeapId {
    self.0
  }
}
