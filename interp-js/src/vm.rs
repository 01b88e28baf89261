use crate::error::Termination;
use crate::error::TerminationReason;
use crate::error::VmError;
use crate::interrupt::InterruptHandle;
use crate::interrupt::InterruptToken;
use crate::source::StackFrame;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

/// Limits and debugging switches fixed when a [`Vm`] is created.
#[derive(Debug, Clone)]
pub struct VmOptions {
  /// Invocations (closures and natives) that may be active at once.
  pub max_stack_depth: usize,
  /// Fuel of the initial budget; `None` is unlimited.
  pub default_fuel: Option<u64>,
  /// Wall-clock allowance of the initial budget, measured from [`Vm::new`].
  pub default_deadline: Option<Duration>,
  pub check_time_every: u32,
  /// Host-owned flag observed instead of a private one, so several runtimes can share a single
  /// cancellation switch.
  pub interrupt_flag: Option<Arc<AtomicBool>>,
  /// Name invocation frames after their call site (e.g. `obj.method`).
  pub debug: bool,
}

impl Default for VmOptions {
  fn default() -> Self {
    Self {
      max_stack_depth: 1024,
      default_fuel: None,
      default_deadline: None,
      check_time_every: 100,
      interrupt_flag: None,
      debug: false,
    }
  }
}

/// How much work a run may do before it is terminated.
///
/// One unit of fuel is spent per branch boundary. The deadline is only compared against the clock
/// every `check_time_every` boundaries.
#[derive(Debug, Clone)]
pub struct Budget {
  pub fuel: Option<u64>,
  pub deadline: Option<Instant>,
  pub check_time_every: u32,
}

impl Budget {
  pub fn unlimited(check_time_every: u32) -> Self {
    Self {
      fuel: None,
      deadline: None,
      check_time_every,
    }
  }

  fn from_options(options: &VmOptions) -> Self {
    Self {
      fuel: options.default_fuel,
      deadline: options
        .default_deadline
        .and_then(|allowance| Instant::now().checked_add(allowance)),
      check_time_every: options.check_time_every,
    }
  }

  /// Whether the deadline has passed, consulting the clock only on every `check_time_every`th
  /// boundary.
  fn deadline_passed(&self, boundary: u64) -> bool {
    let Some(deadline) = self.deadline else {
      return false;
    };
    let every = u64::from(self.check_time_every.max(1));
    boundary % every == 0 && Instant::now() >= deadline
  }
}

/// Execution limits and the invocation stack shared by every branch of a runtime.
#[derive(Debug)]
pub struct Vm {
  options: VmOptions,
  interrupt: InterruptToken,
  handle: InterruptHandle,
  budget: Budget,
  /// Boundaries crossed under the current budget.
  boundaries: u64,
  stack: Vec<StackFrame>,
}

impl Vm {
  pub fn new(options: VmOptions) -> Self {
    let (interrupt, handle) = options
      .interrupt_flag
      .clone()
      .map_or_else(InterruptToken::new, InterruptToken::from_shared_flag);
    let budget = Budget::from_options(&options);
    Self {
      options,
      interrupt,
      handle,
      budget,
      boundaries: 0,
      stack: Vec::new(),
    }
  }

  pub fn options(&self) -> &VmOptions {
    &self.options
  }

  pub fn is_debug(&self) -> bool {
    self.options.debug
  }

  /// A `Send + Sync` handle that stops this VM at its next boundary.
  pub fn interrupt_handle(&self) -> InterruptHandle {
    self.handle.clone()
  }

  /// Replaces the budget. The boundary count restarts.
  pub fn set_budget(&mut self, budget: Budget) {
    self.budget = budget;
    self.boundaries = 0;
  }

  pub fn remaining_fuel(&self) -> Option<u64> {
    self.budget.fuel
  }

  /// Records an invocation entry, failing with `StackOverflow` once `max_stack_depth` frames are
  /// active.
  pub fn push_frame(&mut self, frame: StackFrame) -> Result<(), VmError> {
    if self.stack.len() >= self.options.max_stack_depth {
      return Err(self.terminate(TerminationReason::StackOverflow));
    }
    self.stack.push(frame);
    Ok(())
  }

  pub fn pop_frame(&mut self) {
    self.stack.pop();
  }

  pub fn stack_depth(&self) -> usize {
    self.stack.len()
  }

  /// The active invocation frames, outermost first.
  pub fn capture_stack(&self) -> Vec<StackFrame> {
    self.stack.clone()
  }

  pub(crate) fn terminate(&self, reason: TerminationReason) -> VmError {
    VmError::Termination(Termination::new(reason, self.capture_stack()))
  }

  /// Accounts for one branch boundary. Fuel is checked first, then the host interrupt, then the
  /// deadline.
  pub fn tick(&mut self) -> Result<(), VmError> {
    match self.budget.fuel {
      Some(0) => return Err(self.terminate(TerminationReason::OutOfFuel)),
      Some(fuel) => self.budget.fuel = Some(fuel - 1),
      None => {}
    }
    self.boundaries = self.boundaries.wrapping_add(1);

    if self.interrupt.is_interrupted() {
      return Err(self.terminate(TerminationReason::Interrupted));
    }
    if self.budget.deadline_passed(self.boundaries) {
      return Err(self.terminate(TerminationReason::DeadlineExceeded));
    }
    Ok(())
  }
}
