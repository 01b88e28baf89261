use crate::source::StackFrame;
use crate::value::Value;
use std::fmt::Display;
use std::sync::Arc;

/// Errors produced by the interpreter core.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VmError {
  /// The heap has exceeded its configured slot limit.
  #[error("out of memory")]
  OutOfMemory,

  /// A handle was used that does not point at an allocation of the expected kind.
  #[error("invalid handle")]
  InvalidHandle,

  /// An attempted prototype mutation would introduce a cycle in the prototype chain.
  #[error("prototype cycle")]
  PrototypeCycle,

  /// A prototype chain traversal exceeded a hard upper bound.
  #[error("prototype chain too deep")]
  PrototypeChainTooDeep,

  /// The provided property descriptor patch is invalid.
  #[error("invalid property descriptor patch: cannot mix data and accessor fields")]
  InvalidPropertyDescriptorPatch,

  /// A value could not be reduced to the primitive a hint requires.
  #[error("cannot convert {0} to a primitive value")]
  TypeCoercion(String),

  /// Read of an identifier that no scope in the chain binds.
  #[error("{0} is not defined")]
  UnresolvedReference(Arc<str>),

  /// A property write or delete was rejected in a strict context.
  #[error("cannot modify property '{0}'")]
  PropertyAccess(String),

  /// Property access on `undefined`/`null`, or another operation on a value of the wrong type.
  #[error("type error: {0}")]
  TypeError(String),

  /// Attempted to call a non-callable value.
  #[error("{0} is not a function")]
  NotCallable(String),

  /// A function invocation could not proceed (malformed parameter pattern, stray `break`, …).
  #[error("invalid invocation: {0}")]
  Invocation(String),

  /// The host or a task drove the frame stack out of order (stepping without a branch, resuming a
  /// frame whose child is still running, …). Never visible to script code.
  #[error("driver misuse: {0}")]
  DriverState(String),

  /// A language-level `throw` value.
  #[error("uncaught exception")]
  Throw(Value),

  /// A non-catchable termination condition (fuel exhausted, deadline exceeded, host interrupt,
  /// etc).
  #[error("{0}")]
  Termination(Termination),
}

impl VmError {
  /// Whether a language-level `try` may intercept this error.
  ///
  /// Terminations, driver misuse and heap-integrity failures always unwind to the driver.
  pub fn is_catchable(&self) -> bool {
    match self {
      VmError::TypeCoercion(_)
      | VmError::UnresolvedReference(_)
      | VmError::PropertyAccess(_)
      | VmError::TypeError(_)
      | VmError::NotCallable(_)
      | VmError::Invocation(_)
      | VmError::Throw(_) => true,
      VmError::OutOfMemory
      | VmError::InvalidHandle
      | VmError::PrototypeCycle
      | VmError::PrototypeChainTooDeep
      | VmError::InvalidPropertyDescriptorPatch
      | VmError::DriverState(_)
      | VmError::Termination(_) => false,
    }
  }

  /// The error constructor name used when this error is surfaced to script code.
  pub fn error_name(&self) -> &'static str {
    match self {
      VmError::UnresolvedReference(_) => "ReferenceError",
      VmError::TypeCoercion(_)
      | VmError::PropertyAccess(_)
      | VmError::TypeError(_)
      | VmError::NotCallable(_) => "TypeError",
      _ => "Error",
    }
  }
}

/// A non-catchable error that terminates execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
  pub reason: TerminationReason,
  pub stack: Vec<StackFrame>,
}

impl Termination {
  pub fn new(reason: TerminationReason, stack: Vec<StackFrame>) -> Self {
    Self { reason, stack }
  }
}

impl Display for Termination {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{reason}", reason = self.reason)
  }
}

/// The reason execution terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
  OutOfFuel,
  DeadlineExceeded,
  Interrupted,
  StackOverflow,
  Cancelled,
}

impl Display for TerminationReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      TerminationReason::OutOfFuel => f.write_str("execution terminated: out of fuel"),
      TerminationReason::DeadlineExceeded => f.write_str("execution terminated: deadline exceeded"),
      TerminationReason::Interrupted => f.write_str("execution terminated: interrupted"),
      TerminationReason::StackOverflow => f.write_str("execution terminated: stack overflow"),
      TerminationReason::Cancelled => f.write_str("execution terminated: cancelled by host"),
    }
  }
}
