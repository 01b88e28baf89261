use std::fmt::Display;
use std::sync::Arc;

/// A single call frame for stack traces and termination errors.
///
/// Frames are named after the call site's profile name when the VM runs in debug mode, otherwise
/// after the callee's own `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
  pub function: Option<Arc<str>>,
  /// Call depth of this frame, counted from the outermost call (1-based).
  pub depth: usize,
}

impl StackFrame {
  pub fn new(function: Option<Arc<str>>, depth: usize) -> Self {
    Self { function, depth }
  }
}

impl Display for StackFrame {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match &self.function {
      Some(function) => write!(f, "at {function}"),
      None => f.write_str("at <anonymous>"),
    }
  }
}

/// Format stack frames into a stable stack trace string, innermost frame first.
pub fn format_stack_trace(frames: &[StackFrame]) -> String {
  frames
    .iter()
    .rev()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("\n")
}
