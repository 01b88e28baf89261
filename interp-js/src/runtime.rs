use crate::ast::StmtList;
use crate::branch::BranchInfo;
use crate::branch::BranchKind;
use crate::branch::BranchOptions;
use crate::branch::BranchRequest;
use crate::branch::CallRequest;
use crate::branch::Completion;
use crate::branch::Dispatcher;
use crate::branch::Instrument;
use crate::branch::Step;
use crate::branch::Suspension;
use crate::branch::Task;
use crate::call::call_closure;
use crate::call::CallExtra;
use crate::error::TerminationReason;
use crate::heap::ObjectKind;
use crate::heap::Trace;
use crate::heap::Tracer;
use crate::realm::Realm;
use crate::realm::RealmOptions;
use crate::source::StackFrame;
use crate::{GcObject, GcScope, Heap, Value, Vm, VmError};
use std::mem;
use std::rc::Rc;
use tracing::debug;
use tracing::trace;

/// What a frame consumes the next time the driver reaches it.
enum Input {
  Start,
  Deliver(Result<Completion, VmError>),
  /// The frame was aborted before it started; it closes without running.
  Fail(VmError),
  /// Suspended on a child that has not finished.
  Waiting,
}

struct Frame {
  task: Box<dyn Task>,
  info: BranchInfo,
  depth: usize,
  quiet: bool,
  /// A VM stack frame was pushed for this invocation.
  call: bool,
  input: Input,
}

impl Trace for Frame {
  fn trace(&self, tracer: &mut Tracer<'_>) {
    self.task.trace(tracer);
    self.info.options.trace(tracer);
    match &self.input {
      Input::Deliver(Ok(completion)) => completion.trace(tracer),
      Input::Deliver(Err(VmError::Throw(value))) | Input::Fail(VmError::Throw(value)) => {
        tracer.trace_value(*value)
      }
      Input::Start | Input::Deliver(Err(_)) | Input::Fail(_) | Input::Waiting => {}
    }
  }
}

/// The frame currently executing, detached from the stack while its task runs.
#[derive(Debug, Clone, Copy)]
struct Active {
  depth: usize,
  quiet: bool,
}

enum Advance {
  Continue,
  Finished(Result<Completion, VmError>),
}

enum CallOutcome {
  /// A native call completed synchronously.
  Value(Value),
  /// An invocation frame was pushed.
  Pushed,
}

/// An execution context: heap, realm, budget and the branch frame stack.
///
/// Evaluation is driven one task boundary at a time. Hosts either [`Runtime::start`] a branch and
/// [`Runtime::step`] it, or run it to completion with [`Runtime::run`]. Natives re-enter through
/// [`Runtime::call_function`], which drives a nested section of the same frame stack.
pub struct Runtime {
  pub vm: Vm,
  pub heap: Heap,
  pub(crate) realm: Realm,
  dispatcher: Rc<dyn Dispatcher>,
  frames: Vec<Frame>,
  active: Option<Active>,
  instrument: Option<Box<dyn Instrument>>,
}

impl Runtime {
  pub fn new(vm: Vm, heap: Heap, dispatcher: Rc<dyn Dispatcher>) -> Result<Self, VmError> {
    Self::with_realm_options(vm, heap, dispatcher, RealmOptions::default())
  }

  pub fn with_realm_options(
    vm: Vm,
    mut heap: Heap,
    dispatcher: Rc<dyn Dispatcher>,
    options: RealmOptions,
  ) -> Result<Self, VmError> {
    let realm = Realm::new(&mut heap, options)?;
    Ok(Self {
      vm,
      heap,
      realm,
      dispatcher,
      frames: Vec::new(),
      active: None,
      instrument: None,
    })
  }

  pub fn realm(&self) -> &Realm {
    &self.realm
  }

  pub fn global_scope(&self) -> GcScope {
    self.realm.global_scope()
  }

  pub fn global_object(&self) -> GcObject {
    self.realm.global_object()
  }

  pub fn dispatcher(&self) -> Rc<dyn Dispatcher> {
    self.dispatcher.clone()
  }

  /// Installs (or removes) the branch instrument, returning the previous one.
  pub fn set_instrument(
    &mut self,
    instrument: Option<Box<dyn Instrument>>,
  ) -> Option<Box<dyn Instrument>> {
    mem::replace(&mut self.instrument, instrument)
  }

  pub fn is_running(&self) -> bool {
    !self.frames.is_empty()
  }

  /// Number of branch frames on the stack, including suspended ones.
  pub fn frame_count(&self) -> usize {
    self.frames.len()
  }

  /// The active invocation frames, outermost first.
  pub fn stack_trace(&self) -> Vec<StackFrame> {
    self.vm.capture_stack()
  }

  /// Collects everything the realm, the frame stack and the heap's persistent roots cannot reach.
  ///
  /// Only the host may collect: inside a native the native's own locals are not roots.
  pub fn collect_garbage(&mut self) -> Result<(), VmError> {
    if self.active.is_some() {
      return Err(VmError::DriverState(
        "garbage cannot be collected from inside a task".to_string(),
      ));
    }
    let Self {
      heap,
      realm,
      frames,
      ..
    } = self;
    heap.collect_garbage(|tracer| {
      realm.trace(tracer);
      for frame in frames.iter() {
        frame.trace(tracer);
      }
    });
    Ok(())
  }

  /// Pushes `request` as the root branch. Nothing runs until [`Runtime::step`] or
  /// [`Runtime::run`].
  pub fn start(&mut self, request: BranchRequest) -> Result<(), VmError> {
    if !self.frames.is_empty() || self.active.is_some() {
      return Err(VmError::DriverState("a branch is already running".to_string()));
    }
    let info = request.info();
    let task = self.dispatcher.clone().branch(request)?;
    self.open_frame(task, info, 0, false, false);
    Ok(())
  }

  /// Advances the root branch to the next visible boundary.
  ///
  /// Returns `Ok(None)` while evaluation is still in progress and the root's completion once it
  /// finishes. Quiet frames are run through without returning.
  pub fn step(&mut self) -> Result<Option<Completion>, VmError> {
    self.ensure_host_control()?;
    loop {
      match self.advance(0)? {
        Advance::Finished(outcome) => return outcome.map(Some),
        Advance::Continue => match self.frames.last() {
          Some(frame) if frame.quiet => continue,
          _ => return Ok(None),
        },
      }
    }
  }

  /// Runs the root branch to completion.
  pub fn run(&mut self) -> Result<Completion, VmError> {
    self.ensure_host_control()?;
    self.drive(0)
  }

  /// Aborts the innermost frame with `err`. The error then propagates outwards through every
  /// enclosing frame as they are stepped.
  pub fn abort(&mut self, err: VmError) -> Result<(), VmError> {
    let Some(top) = self.frames.last_mut() else {
      return Err(VmError::DriverState("no branch is running".to_string()));
    };
    debug!(kind = %top.info.kind, depth = top.depth, error = %err, "branch aborted");
    top.input = match mem::replace(&mut top.input, Input::Waiting) {
      Input::Start | Input::Fail(_) => Input::Fail(err),
      Input::Deliver(_) | Input::Waiting => Input::Deliver(Err(err)),
    };
    Ok(())
  }

  /// Aborts with an uncatchable cancellation.
  pub fn cancel(&mut self) -> Result<(), VmError> {
    let err = self.vm.terminate(TerminationReason::Cancelled);
    self.abort(err)
  }

  /// Evaluates `request` to completion on top of the current stack.
  pub fn evaluate(&mut self, request: BranchRequest) -> Result<Completion, VmError> {
    let base = self.frames.len();
    let (depth, quiet) = self.child_context();
    let info = request.info();
    let task = self.dispatcher.clone().branch(request)?;
    self.open_frame(task, info, depth, quiet, false);
    self.drive(base)
  }

  /// Calls `func` with the global scope as the caller scope and returns its result.
  ///
  /// A script-level throw surfaces as [`VmError::Throw`].
  pub fn call_function(&mut self, func: Value, this: Value, args: &[Value]) -> Result<Value, VmError> {
    let base = self.frames.len();
    let (depth, quiet) = self.child_context();
    let request = CallRequest {
      callee: func,
      this,
      args: args.to_vec(),
      scope: self.realm.global_scope(),
      extra: CallExtra::default(),
    };
    match self.open_call(request, depth, quiet)? {
      CallOutcome::Value(value) => Ok(value),
      CallOutcome::Pushed => completion_value(self.drive(base)?),
    }
  }

  /// Runs `body` as a program in the global scope and returns its completion value.
  pub fn exec_program(&mut self, body: StmtList) -> Result<Value, VmError> {
    let scope = self.realm.global_scope();
    let request = BranchRequest::program(body, scope).with_options(BranchOptions {
      return_last_value: true,
      ..BranchOptions::default()
    });
    let completion = if self.active.is_some() {
      self.evaluate(request)?
    } else {
      self.start(request)?;
      self.drive(0)?
    };
    completion_value(completion)
  }

  fn ensure_host_control(&self) -> Result<(), VmError> {
    if self.active.is_some() {
      return Err(VmError::DriverState(
        "the root branch cannot be driven from inside a task".to_string(),
      ));
    }
    if self.frames.is_empty() {
      return Err(VmError::DriverState("no branch is running".to_string()));
    }
    Ok(())
  }

  fn child_context(&self) -> (usize, bool) {
    match self.active {
      Some(active) => (active.depth + 1, active.quiet),
      None => (0, false),
    }
  }

  fn drive(&mut self, base: usize) -> Result<Completion, VmError> {
    loop {
      if let Advance::Finished(outcome) = self.advance(base)? {
        return outcome;
      }
    }
  }

  fn open_frame(&mut self, task: Box<dyn Task>, info: BranchInfo, depth: usize, parent_quiet: bool, call: bool) {
    let quiet = parent_quiet || info.options.is_quiet();
    trace!(kind = %info.kind, depth, quiet, "branch enter");
    if !quiet {
      if let Some(instrument) = self.instrument.as_mut() {
        instrument.enter(depth, &info);
      }
    }
    self.frames.push(Frame {
      task,
      info,
      depth,
      quiet,
      call,
      input: Input::Start,
    });
  }

  /// Runs the top frame's task once and reacts to its step.
  fn advance(&mut self, base: usize) -> Result<Advance, VmError> {
    if self.frames.len() <= base {
      return Err(VmError::DriverState("no frame to advance".to_string()));
    }
    // Natives may hold handles in Rust locals, so only boundaries driven by the host collect.
    if self.active.is_none() && self.heap.needs_collection() {
      self.collect_garbage()?;
    }
    let Some(mut frame) = self.frames.pop() else {
      return Err(VmError::DriverState("no frame to advance".to_string()));
    };

    let result = match mem::replace(&mut frame.input, Input::Waiting) {
      Input::Fail(err) => Err(err),
      Input::Waiting => Err(VmError::DriverState(
        "frame resumed before its child finished".to_string(),
      )),
      Input::Start => self.run_task(&mut frame, None),
      Input::Deliver(outcome) => self.run_task(&mut frame, Some(outcome)),
    };

    match result {
      Ok(Step::Suspend(suspension)) => {
        let parent = Active {
          depth: frame.depth,
          quiet: frame.quiet,
        };
        self.frames.push(frame);
        // Natives run while their child is opened and must see the suspended frame as active.
        let saved = self.active.replace(parent);
        self.open(suspension, parent.depth + 1, parent.quiet);
        self.active = saved;
        Ok(Advance::Continue)
      }
      Ok(Step::Done(completion)) => Ok(self.close(frame, Ok(completion), base)),
      Err(err) => Ok(self.close(frame, Err(err), base)),
    }
  }

  fn run_task(
    &mut self,
    frame: &mut Frame,
    outcome: Option<Result<Completion, VmError>>,
  ) -> Result<Step, VmError> {
    // Failures are handed to the task as-is so a termination keeps the stack it was raised with.
    if !matches!(outcome, Some(Err(_))) {
      self.vm.tick()?;
    }
    let saved = self.active.replace(Active {
      depth: frame.depth,
      quiet: frame.quiet,
    });
    let result = match outcome {
      None => frame.task.start(self),
      Some(outcome) => frame.task.resume(self, outcome),
    };
    self.active = saved;
    result
  }

  /// Opens the child a suspended frame asked for. The suspended frame is on top of the stack.
  fn open(&mut self, suspension: Suspension, depth: usize, quiet: bool) {
    match suspension {
      Suspension::Branch(request) => {
        let info = request.info();
        match self.dispatcher.clone().branch(request) {
          Ok(task) => self.open_frame(task, info, depth, quiet, false),
          Err(err) => self.deliver(Err(err)),
        }
      }
      Suspension::Call(request) => match self.open_call(request, depth, quiet) {
        Ok(CallOutcome::Pushed) => {}
        Ok(CallOutcome::Value(value)) => self.deliver(Ok(Completion::normal(value))),
        Err(err) => self.deliver(Err(err)),
      },
    }
  }

  fn open_call(&mut self, request: CallRequest, depth: usize, quiet: bool) -> Result<CallOutcome, VmError> {
    let CallRequest {
      callee,
      this,
      args,
      scope,
      extra,
    } = request;
    let Value::Object(func) = callee else {
      return Err(VmError::NotCallable(self.heap.debug_string(callee)?));
    };
    let native = match self.heap.object_kind(func)? {
      ObjectKind::Native(native) => Some(native.clone()),
      ObjectKind::Closure(_) => None,
      ObjectKind::Ordinary | ObjectKind::Array => {
        return Err(VmError::NotCallable(self.heap.debug_string(callee)?));
      }
    };

    if let Some(native) = native {
      self
        .vm
        .push_frame(StackFrame::new(Some(native.name.clone()), self.vm.stack_depth() + 1))?;
      let result = (native.call)(self, this, &args);
      self.vm.pop_frame();
      return result.map(CallOutcome::Value);
    }

    let frame_name = match (&extra.profile_name, self.vm.is_debug()) {
      (Some(profile), true) => Some(profile.clone()),
      _ => self.function_name(func)?,
    };
    let info = BranchInfo {
      kind: BranchKind::Call,
      options: BranchOptions {
        profile_name: extra.profile_name.clone().filter(|_| self.vm.is_debug()),
        callee: Some(extra.callee.unwrap_or(callee)),
        ..BranchOptions::default()
      },
    };
    let task = call_closure(self, func, this, &args, scope, extra)?;
    self
      .vm
      .push_frame(StackFrame::new(frame_name, self.vm.stack_depth() + 1))?;
    self.open_frame(task, info, depth, quiet, true);
    Ok(CallOutcome::Pushed)
  }

  /// Hands a child's outcome to the frame on top of the stack.
  fn deliver(&mut self, outcome: Result<Completion, VmError>) {
    if let Some(top) = self.frames.last_mut() {
      top.input = Input::Deliver(outcome);
    }
  }

  fn close(&mut self, frame: Frame, outcome: Result<Completion, VmError>, base: usize) -> Advance {
    if frame.call {
      self.vm.pop_frame();
    }
    trace!(kind = %frame.info.kind, depth = frame.depth, ok = outcome.is_ok(), "branch exit");
    if !frame.quiet {
      if let Some(instrument) = self.instrument.as_mut() {
        instrument.exit(frame.depth, &frame.info, &outcome);
      }
    }
    if self.frames.len() == base {
      return Advance::Finished(outcome);
    }
    self.deliver(outcome);
    Advance::Continue
  }
}

/// The value a finished call or program produces.
fn completion_value(completion: Completion) -> Result<Value, VmError> {
  match completion {
    Completion::Normal(value) => Ok(value.unwrap_or(Value::Undefined)),
    Completion::Return(value) => Ok(value),
    Completion::Throw(value) => Err(VmError::Throw(value)),
    Completion::Break(..) | Completion::Continue(..) => Err(VmError::Invocation(
      "break or continue escaped its enclosing branch".to_string(),
    )),
  }
}
