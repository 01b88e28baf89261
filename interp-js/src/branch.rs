use crate::ast::Expr;
use crate::ast::Pattern;
use crate::ast::Stmt;
use crate::ast::StmtList;
use crate::call::CallExtra;
use crate::heap::Trace;
use crate::heap::Tracer;
use crate::runtime::Runtime;
use crate::{GcObject, GcScope, Value, VmError};
use derive_more::derive::Display;
use derive_more::derive::From;
use std::rc::Rc;
use std::sync::Arc;

/// A completion record.
///
/// The "empty" completion value is modelled explicitly as `None` so statement-list evaluation can
/// implement `UpdateEmpty` (e.g. `1; if (true) {}` evaluates to `1`).
#[derive(Clone, Debug, PartialEq)]
pub enum Completion {
  Normal(Option<Value>),
  Throw(Value),
  Return(Value),
  Break(Option<String>, Option<Value>),
  Continue(Option<String>, Option<Value>),
}

impl Completion {
  pub fn empty() -> Self {
    Completion::Normal(None)
  }

  pub fn normal(value: Value) -> Self {
    Completion::Normal(Some(value))
  }

  pub fn value(&self) -> Option<Value> {
    match self {
      Completion::Normal(v) => *v,
      Completion::Throw(v) => Some(*v),
      Completion::Return(v) => Some(*v),
      Completion::Break(_, v) => *v,
      Completion::Continue(_, v) => *v,
    }
  }

  pub fn is_abrupt(&self) -> bool {
    !matches!(self, Completion::Normal(_))
  }

  /// Implements `UpdateEmpty(completion, value)`.
  pub fn update_empty(self, value: Option<Value>) -> Self {
    match self {
      Completion::Normal(None) => Completion::Normal(value),
      Completion::Break(target, None) => Completion::Break(target, value),
      Completion::Continue(target, None) => Completion::Continue(target, value),
      other => other,
    }
  }
}

impl Trace for Completion {
  fn trace(&self, tracer: &mut Tracer<'_>) {
    if let Some(value) = self.value() {
      tracer.trace_value(value);
    }
  }
}

/// One resumable unit of evaluation.
///
/// A task runs until it either finishes or needs the result of a child branch or call. The driver
/// in [`Runtime`] owns the frame stack; tasks never call into each other directly.
pub trait Task {
  /// Runs the task up to its first suspension.
  fn start(&mut self, rt: &mut Runtime) -> Result<Step, VmError>;

  /// Feeds back the outcome of the child this task suspended on.
  fn resume(
    &mut self,
    rt: &mut Runtime,
    outcome: Result<Completion, VmError>,
  ) -> Result<Step, VmError>;

  /// Reports every heap handle the task keeps between boundaries. Anything not reported may be
  /// collected while the task is suspended.
  fn trace(&self, tracer: &mut Tracer<'_>);
}

/// The result of running a task up to its next boundary.
#[derive(Debug)]
pub enum Step {
  Done(Completion),
  Suspend(Suspension),
}

impl Step {
  pub fn suspend(suspension: impl Into<Suspension>) -> Self {
    Step::Suspend(suspension.into())
  }
}

/// A request from a suspended task to the driver.
#[derive(Debug, From)]
pub enum Suspension {
  /// Evaluate a child node; the dispatcher supplies the task.
  Branch(BranchRequest),
  /// Invoke a callable value.
  Call(CallRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BranchKind {
  #[display("program")]
  Program,
  #[display("function")]
  Function,
  #[display("statement")]
  Statement,
  #[display("expression")]
  Expression,
  #[display("call")]
  Call,
}

/// The syntax a branch evaluates.
#[derive(Debug, Clone)]
pub enum BranchNode {
  Statements(StmtList),
  Statement(Rc<Stmt>),
  Expression(Rc<Expr>),
}

/// Evaluation options carried by a branch.
#[derive(Debug, Clone, Default)]
pub struct BranchOptions {
  /// The completion value of the last statement becomes the branch result.
  pub return_last_value: bool,
  /// The closure whose body this branch evaluates.
  pub creator: Option<GcObject>,
  pub profile_name: Option<Arc<str>>,
  pub callee: Option<Value>,
  /// `Some(-1)` marks a branch (and everything beneath it) as quiet: it never returns control to
  /// the host between steps and is not instrumented.
  pub yield_power: Option<i32>,
}

impl BranchOptions {
  pub fn is_quiet(&self) -> bool {
    self.yield_power == Some(-1)
  }
}

impl Trace for BranchOptions {
  fn trace(&self, tracer: &mut Tracer<'_>) {
    if let Some(creator) = self.creator {
      tracer.trace_object(creator);
    }
    if let Some(callee) = self.callee {
      tracer.trace_value(callee);
    }
  }
}

/// What the driver records about each frame on its stack.
#[derive(Debug, Clone)]
pub struct BranchInfo {
  pub kind: BranchKind,
  pub options: BranchOptions,
}

impl BranchInfo {
  pub fn profile_name(&self) -> Option<&Arc<str>> {
    self.options.profile_name.as_ref()
  }

  pub fn callee(&self) -> Option<Value> {
    self.options.callee
  }
}

#[derive(Debug, Clone)]
pub struct BranchRequest {
  pub kind: BranchKind,
  pub node: BranchNode,
  pub scope: GcScope,
  pub options: BranchOptions,
}

impl BranchRequest {
  pub fn new(kind: BranchKind, node: BranchNode, scope: GcScope) -> Self {
    Self {
      kind,
      node,
      scope,
      options: BranchOptions::default(),
    }
  }

  /// A top-level program over `body`.
  pub fn program(body: StmtList, scope: GcScope) -> Self {
    Self::new(BranchKind::Program, BranchNode::Statements(body), scope)
  }

  pub fn statement(stmt: Rc<Stmt>, scope: GcScope) -> Self {
    Self::new(BranchKind::Statement, BranchNode::Statement(stmt), scope)
  }

  pub fn expression(expr: Rc<Expr>, scope: GcScope) -> Self {
    Self::new(BranchKind::Expression, BranchNode::Expression(expr), scope)
  }

  pub fn with_options(mut self, options: BranchOptions) -> Self {
    self.options = options;
    self
  }

  pub fn info(&self) -> BranchInfo {
    BranchInfo {
      kind: self.kind,
      options: self.options.clone(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct CallRequest {
  pub callee: Value,
  pub this: Value,
  pub args: Vec<Value>,
  /// The scope of the call site.
  pub scope: GcScope,
  pub extra: CallExtra,
}

/// Supplies tasks for syntax nodes and assignable references for patterns.
pub trait Dispatcher {
  fn branch(&self, request: BranchRequest) -> Result<Box<dyn Task>, VmError>;

  fn resolve_ref(
    &self,
    rt: &mut Runtime,
    pattern: &Pattern,
    scope: GcScope,
  ) -> Result<Box<dyn Reference>, VmError>;
}

/// An assignable location.
pub trait Reference {
  fn set_value(&self, rt: &mut Runtime, value: Value) -> Result<(), VmError>;
}

/// Observes every visible branch boundary.
pub trait Instrument {
  fn enter(&mut self, depth: usize, info: &BranchInfo);

  fn exit(&mut self, depth: usize, info: &BranchInfo, outcome: &Result<Completion, VmError>);
}
