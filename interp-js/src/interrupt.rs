use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// A token observed by the VM at every branch boundary to detect host interrupts.
#[derive(Debug, Clone)]
pub struct InterruptToken {
  interrupted: Arc<AtomicBool>,
}

impl InterruptToken {
  /// Create a new interrupt token + handle pair.
  pub fn new() -> (Self, InterruptHandle) {
    Self::from_shared_flag(Arc::new(AtomicBool::new(false)))
  }

  /// Create a token + handle pair observing a flag owned by the host.
  pub fn from_shared_flag(interrupted: Arc<AtomicBool>) -> (Self, InterruptHandle) {
    (
      Self {
        interrupted: interrupted.clone(),
      },
      InterruptHandle { interrupted },
    )
  }

  pub fn is_interrupted(&self) -> bool {
    self.interrupted.load(Ordering::Relaxed)
  }
}

/// A host handle used to request that the runtime terminates execution.
///
/// This is the only runtime type that may cross threads.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
  interrupted: Arc<AtomicBool>,
}

impl InterruptHandle {
  /// Request that the runtime cooperatively terminates at the next `Vm::tick()`.
  pub fn interrupt(&self) {
    self.interrupted.store(true, Ordering::Relaxed);
  }

  /// Clears a previous request so the runtime can be reused.
  pub fn reset(&self) {
    self.interrupted.store(false, Ordering::Relaxed);
  }

  pub fn is_interrupted(&self) -> bool {
    self.interrupted.load(Ordering::Relaxed)
  }
}
