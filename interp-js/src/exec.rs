//! A tree-walking [`Dispatcher`].
//!
//! Every statement and expression that has sub-expressions is evaluated by suspending on a child
//! branch, so the host observes (and can abort at) each node boundary.

use crate::ast::Expr;
use crate::ast::LogicalOp;
use crate::ast::MemberKey;
use crate::ast::Pattern;
use crate::ast::Stmt;
use crate::ast::StmtList;
use crate::ast::UnaryOp;
use crate::ast::var_declared_names;
use crate::branch::BranchKind;
use crate::branch::BranchNode;
use crate::branch::BranchOptions;
use crate::branch::BranchRequest;
use crate::branch::CallRequest;
use crate::branch::Completion;
use crate::branch::Dispatcher;
use crate::branch::Reference;
use crate::branch::Step;
use crate::branch::Task;
use crate::call::CallExtra;
use crate::destructure::resolve_pattern;
use crate::heap::Trace;
use crate::heap::Tracer;
use crate::property::PropertyKey;
use crate::runtime::Runtime;
use crate::{GcScope, Value, VmError};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

/// Evaluates syntax trees from [`crate::ast`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeDispatcher;

impl Dispatcher for TreeDispatcher {
  fn branch(&self, request: BranchRequest) -> Result<Box<dyn Task>, VmError> {
    let BranchRequest {
      kind,
      node,
      scope,
      options,
    } = request;
    Ok(match node {
      BranchNode::Statements(stmts) => Box::new(StatementsTask::new(kind, stmts, scope, options)),
      BranchNode::Statement(stmt) => Box::new(StmtTask::new(stmt, scope)),
      BranchNode::Expression(expr) => Box::new(ExprTask::new(expr, scope)),
    })
  }

  fn resolve_ref(
    &self,
    rt: &mut Runtime,
    pattern: &Pattern,
    scope: GcScope,
  ) -> Result<Box<dyn Reference>, VmError> {
    resolve_pattern(rt, pattern, scope)
  }
}

fn child_value(outcome: Result<Completion, VmError>) -> Result<Value, VmError> {
  Ok(outcome?.value().unwrap_or(Value::Undefined))
}

/// A program, function body or block.
struct StatementsTask {
  kind: BranchKind,
  stmts: StmtList,
  scope: GcScope,
  options: BranchOptions,
  next: usize,
  last: Option<Value>,
}

impl StatementsTask {
  fn new(kind: BranchKind, stmts: StmtList, scope: GcScope, options: BranchOptions) -> Self {
    Self {
      kind,
      stmts,
      scope,
      options,
      next: 0,
      last: None,
    }
  }

  fn hoist(&self, rt: &mut Runtime) -> Result<(), VmError> {
    let target = rt.heap.get_scope(self.scope)?.target();
    if self.kind == BranchKind::Program {
      for name in var_declared_names(&self.stmts) {
        let key = rt.heap.key_from_str(&name)?;
        if rt.heap.object_own_cell(target, &key)?.is_none() {
          rt.scope_add(self.scope, &name, Value::Undefined)?;
        }
      }
    }
    for stmt in self.stmts.iter() {
      let Stmt::FunctionDecl(func) = &**stmt else {
        continue;
      };
      let Some(id) = &func.id else {
        continue;
      };
      let closure = Value::Object(rt.alloc_closure(func.clone(), self.scope)?);
      let key = rt.heap.key_from_str(id)?;
      match rt.heap.object_own_cell(target, &key)? {
        Some(cell) => rt.heap.write_cell_value(cell, closure)?,
        None => {
          rt.scope_add(self.scope, id, closure)?;
        }
      }
    }
    Ok(())
  }

  fn advance(&mut self) -> Step {
    match self.stmts.get(self.next) {
      Some(stmt) => {
        self.next += 1;
        Step::suspend(BranchRequest::statement(stmt.clone(), self.scope))
      }
      None => Step::Done(self.finish()),
    }
  }

  fn finish(&self) -> Completion {
    if self.kind == BranchKind::Function && !self.options.return_last_value {
      Completion::empty()
    } else {
      Completion::Normal(self.last)
    }
  }
}

impl Task for StatementsTask {
  fn start(&mut self, rt: &mut Runtime) -> Result<Step, VmError> {
    self.hoist(rt)?;
    Ok(self.advance())
  }

  fn resume(&mut self, _rt: &mut Runtime, outcome: Result<Completion, VmError>) -> Result<Step, VmError> {
    let completion = outcome?.update_empty(self.last);
    if completion.is_abrupt() {
      return Ok(Step::Done(completion));
    }
    self.last = completion.value();
    Ok(self.advance())
  }

  fn trace(&self, tracer: &mut Tracer<'_>) {
    tracer.trace_scope(self.scope);
    self.options.trace(tracer);
    if let Some(last) = self.last {
      tracer.trace_value(last);
    }
  }
}

#[derive(Debug, Clone, Copy)]
enum StmtState {
  Start,
  /// Waiting on the initializer of declaration `index`.
  VarInit { index: usize },
  Operand,
  IfTest,
  Nested,
  WhileTest,
  WhileBody,
  TryBlock,
  TryHandler,
}

struct StmtTask {
  stmt: Rc<Stmt>,
  scope: GcScope,
  state: StmtState,
  last: Option<Value>,
}

impl StmtTask {
  fn new(stmt: Rc<Stmt>, scope: GcScope) -> Self {
    Self {
      stmt,
      scope,
      state: StmtState::Start,
      last: None,
    }
  }

  fn expr(&mut self, state: StmtState, expr: &Rc<Expr>) -> Step {
    self.state = state;
    Step::suspend(BranchRequest::expression(expr.clone(), self.scope))
  }

  fn block(&mut self, state: StmtState, stmts: &StmtList, scope: GcScope) -> Step {
    self.state = state;
    Step::suspend(BranchRequest::new(
      BranchKind::Statement,
      BranchNode::Statements(stmts.clone()),
      scope,
    ))
  }

  fn nested(&mut self, stmt: &Rc<Stmt>) -> Step {
    self.state = StmtState::Nested;
    Step::suspend(BranchRequest::statement(stmt.clone(), self.scope))
  }

  /// Runs the initializers of `var` declarations from `from` onwards.
  fn var_decls(&mut self, from: usize) -> Step {
    let stmt = self.stmt.clone();
    if let Stmt::Var(decls) = &*stmt {
      for (index, (_, init)) in decls.iter().enumerate().skip(from) {
        if let Some(init) = init {
          return self.expr(StmtState::VarInit { index }, init);
        }
      }
    }
    Step::Done(Completion::empty())
  }

  fn catch(&mut self, rt: &mut Runtime, err: VmError) -> Result<Step, VmError> {
    let stmt = self.stmt.clone();
    let Stmt::Try { param, handler, .. } = &*stmt else {
      return Err(err);
    };
    if !err.is_catchable() {
      return Err(err);
    }
    let value = rt.error_to_value(&err)?;
    let scope = rt.create_child_scope(self.scope)?;
    if let Some(param) = param {
      rt.scope_add(scope, param, value)?;
    }
    Ok(self.block(StmtState::TryHandler, handler, scope))
  }
}

impl Task for StmtTask {
  fn start(&mut self, _rt: &mut Runtime) -> Result<Step, VmError> {
    let stmt = self.stmt.clone();
    Ok(match &*stmt {
      Stmt::Expr(expr) | Stmt::Throw(expr) | Stmt::Return(Some(expr)) => {
        self.expr(StmtState::Operand, expr)
      }
      Stmt::Return(None) => Step::Done(Completion::Return(Value::Undefined)),
      Stmt::Var(_) => self.var_decls(0),
      Stmt::FunctionDecl(_) => Step::Done(Completion::empty()),
      Stmt::If { test, .. } => self.expr(StmtState::IfTest, test),
      Stmt::Block(stmts) => self.block(StmtState::Nested, stmts, self.scope),
      Stmt::While { test, .. } => self.expr(StmtState::WhileTest, test),
      Stmt::Break => Step::Done(Completion::Break(None, None)),
      Stmt::Continue => Step::Done(Completion::Continue(None, None)),
      Stmt::Try { block, .. } => self.block(StmtState::TryBlock, block, self.scope),
    })
  }

  fn resume(&mut self, rt: &mut Runtime, outcome: Result<Completion, VmError>) -> Result<Step, VmError> {
    let stmt = self.stmt.clone();
    match (self.state, &*stmt) {
      (StmtState::Operand, Stmt::Expr(_)) => Ok(Step::Done(Completion::normal(child_value(outcome)?))),
      (StmtState::Operand, Stmt::Return(_)) => Ok(Step::Done(Completion::Return(child_value(outcome)?))),
      (StmtState::Operand, Stmt::Throw(_)) => Err(VmError::Throw(child_value(outcome)?)),
      (StmtState::VarInit { index }, Stmt::Var(decls)) => {
        let value = child_value(outcome)?;
        if let Some((target, _)) = decls.get(index) {
          let reference = rt.dispatcher().resolve_ref(rt, target, self.scope)?;
          reference.set_value(rt, value)?;
        }
        Ok(self.var_decls(index + 1))
      }
      (StmtState::IfTest, Stmt::If { consequent, alternate, .. }) => {
        let test = child_value(outcome)?;
        if rt.heap.to_boolean(test)? {
          Ok(self.nested(consequent))
        } else if let Some(alternate) = alternate {
          Ok(self.nested(alternate))
        } else {
          Ok(Step::Done(Completion::normal(Value::Undefined)))
        }
      }
      (StmtState::Nested, Stmt::If { .. }) => {
        Ok(Step::Done(outcome?.update_empty(Some(Value::Undefined))))
      }
      (StmtState::Nested, _) => Ok(Step::Done(outcome?)),
      (StmtState::WhileTest, Stmt::While { body, .. }) => {
        let test = child_value(outcome)?;
        if !rt.heap.to_boolean(test)? {
          return Ok(Step::Done(Completion::Normal(self.last)));
        }
        self.state = StmtState::WhileBody;
        Ok(Step::suspend(BranchRequest::statement(body.clone(), self.scope)))
      }
      (StmtState::WhileBody, Stmt::While { test, .. }) => match outcome? {
        Completion::Break(None, value) => Ok(Step::Done(Completion::Normal(value.or(self.last)))),
        Completion::Normal(value) | Completion::Continue(None, value) => {
          self.last = value.or(self.last);
          Ok(self.expr(StmtState::WhileTest, test))
        }
        other => Ok(Step::Done(other.update_empty(self.last))),
      },
      (StmtState::TryBlock, Stmt::Try { .. }) => match outcome {
        Ok(Completion::Throw(value)) => self.catch(rt, VmError::Throw(value)),
        Ok(completion) => Ok(Step::Done(completion)),
        Err(err) => self.catch(rt, err),
      },
      (StmtState::TryHandler, Stmt::Try { .. }) => Ok(Step::Done(outcome?)),
      (state, _) => Err(VmError::DriverState(format!(
        "statement resumed in state {state:?}"
      ))),
    }
  }

  fn trace(&self, tracer: &mut Tracer<'_>) {
    tracer.trace_scope(self.scope);
    if let Some(last) = self.last {
      tracer.trace_value(last);
    }
  }
}

/// What an expression does once its queued operands are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExprPhase {
  Operands,
  /// Member call: callee looked up, arguments pending.
  CallArgs,
  /// The right-hand side of a logical operator.
  LogicalRight,
  AwaitCall,
}

struct ExprTask {
  expr: Rc<Expr>,
  scope: GcScope,
  pending: VecDeque<Rc<Expr>>,
  values: Vec<Value>,
  phase: ExprPhase,
  callee: Value,
  this: Value,
}

impl ExprTask {
  fn new(expr: Rc<Expr>, scope: GcScope) -> Self {
    Self {
      expr,
      scope,
      pending: VecDeque::new(),
      values: Vec::new(),
      phase: ExprPhase::Operands,
      callee: Value::Undefined,
      this: Value::Undefined,
    }
  }

  fn queue(&mut self, operand: &Rc<Expr>) {
    self.pending.push_back(operand.clone());
  }

  fn queue_member(&mut self, object: &Rc<Expr>, property: &MemberKey) {
    self.queue(object);
    if let MemberKey::Computed(key) = property {
      self.queue(key);
    }
  }

  /// Evaluates the next queued operand, or finishes once none are left.
  fn pump(&mut self, rt: &mut Runtime) -> Result<Step, VmError> {
    match self.pending.pop_front() {
      Some(operand) => Ok(Step::suspend(BranchRequest::expression(operand, self.scope))),
      None => self.finish(rt),
    }
  }

  /// The key of a member expression whose object (and computed key) sit at `values[at..]`.
  fn member_key(&self, rt: &mut Runtime, property: &MemberKey, at: usize) -> Result<PropertyKey, VmError> {
    match property {
      MemberKey::Named(name) => rt.heap.key_from_str(name),
      MemberKey::Computed(_) => {
        let key = self.values.get(at + 1).copied().unwrap_or(Value::Undefined);
        rt.to_property_key(key)
      }
    }
  }

  fn operand(&self, idx: usize) -> Value {
    self.values.get(idx).copied().unwrap_or(Value::Undefined)
  }

  fn done(value: Value) -> Result<Step, VmError> {
    Ok(Step::Done(Completion::normal(value)))
  }

  fn start_expr(&mut self, rt: &mut Runtime) -> Result<Step, VmError> {
    let expr = self.expr.clone();
    if let Expr::Unary {
      op: UnaryOp::TypeOf,
      operand,
    } = &*expr
    {
      if let Expr::Ident(name) = &**operand {
        if !rt.has_binding(self.scope, name)? {
          return Self::done(Value::String(rt.heap.alloc_string("undefined")?));
        }
      }
    }
    match &*expr {
      Expr::Undefined => Self::done(Value::Undefined),
      Expr::Null => Self::done(Value::Null),
      Expr::Bool(b) => Self::done(Value::Bool(*b)),
      Expr::Number(n) => Self::done(Value::Number(*n)),
      Expr::String(s) => Self::done(Value::String(rt.heap.alloc_string(s)?)),
      Expr::Ident(name) => Self::done(rt.lookup(self.scope, name)?),
      Expr::This => Self::done(rt.scope_this(self.scope)?),
      Expr::Function(func) => Self::done(Value::Object(rt.alloc_closure(func.clone(), self.scope)?)),
      Expr::Unary {
        op: UnaryOp::Delete,
        operand,
      } => match &**operand {
        Expr::Member { object, property } => {
          self.queue_member(object, property);
          self.pump(rt)
        }
        // Bindings are never deletable.
        Expr::Ident(_) => Self::done(Value::Bool(false)),
        _ => {
          self.queue(operand);
          self.pump(rt)
        }
      },
      Expr::Array(elems) => {
        for elem in elems {
          self.queue(elem);
        }
        self.pump(rt)
      }
      Expr::Object(props) => {
        for (_, value) in props {
          self.queue(value);
        }
        self.pump(rt)
      }
      Expr::Member { object, property } => {
        self.queue_member(object, property);
        self.pump(rt)
      }
      Expr::Assign { target, value } => {
        if let Pattern::Member { object, property } = target {
          self.queue_member(object, property);
        }
        self.queue(value);
        self.pump(rt)
      }
      Expr::Call { callee, args } => {
        match &**callee {
          Expr::Member { object, property } => self.queue_member(object, property),
          _ => {
            self.queue(callee);
            for arg in args {
              self.queue(arg);
            }
          }
        }
        self.pump(rt)
      }
      Expr::Binary { left, right, .. } => {
        self.queue(left);
        self.queue(right);
        self.pump(rt)
      }
      Expr::Logical { left, .. } => {
        self.queue(left);
        self.pump(rt)
      }
      Expr::Unary { operand, .. } => {
        self.queue(operand);
        self.pump(rt)
      }
    }
  }

  fn finish(&mut self, rt: &mut Runtime) -> Result<Step, VmError> {
    let expr = self.expr.clone();
    match (&*expr, self.phase) {
      (Expr::Array(_), _) => Self::done(Value::Object(rt.alloc_array(&self.values)?)),
      (Expr::Object(props), _) => {
        let obj = rt.alloc_plain_object()?;
        for ((name, _), value) in props.iter().zip(self.values.iter()) {
          let key = rt.heap.key_from_str(name)?;
          rt.set(obj, key, *value, true)?;
        }
        Self::done(Value::Object(obj))
      }
      (Expr::Member { property, .. }, _) => {
        let key = self.member_key(rt, property, 0)?;
        Self::done(rt.get(self.operand(0), key)?)
      }
      (Expr::Assign { target, .. }, _) => {
        let value = self.values.last().copied().unwrap_or(Value::Undefined);
        match target {
          Pattern::Member { property, .. } => {
            let key = self.member_key(rt, property, 0)?;
            let strict = rt.scope_is_strict(self.scope)?;
            rt.set_value(self.operand(0), key, value, strict)?;
          }
          _ => {
            let reference = rt.dispatcher().resolve_ref(rt, target, self.scope)?;
            reference.set_value(rt, value)?;
          }
        }
        Self::done(value)
      }
      (Expr::Call { callee, args }, ExprPhase::Operands) => {
        if let Expr::Member { property, .. } = &**callee {
          let key = self.member_key(rt, property, 0)?;
          self.this = self.operand(0);
          self.callee = rt.get(self.this, key)?;
          self.values.clear();
          self.phase = ExprPhase::CallArgs;
          for arg in args {
            self.queue(arg);
          }
          return self.pump(rt);
        }
        self.callee = self.operand(0);
        self.values.remove(0);
        self.call(rt, callee)
      }
      (Expr::Call { callee, .. }, ExprPhase::CallArgs) => self.call(rt, callee),
      (Expr::Binary { op, .. }, _) => {
        Self::done(rt.binary_op(*op, self.operand(0), self.operand(1))?)
      }
      (Expr::Logical { op, right, .. }, ExprPhase::Operands) => {
        let left = self.operand(0);
        let truthy = rt.heap.to_boolean(left)?;
        let short = match op {
          LogicalOp::And => !truthy,
          LogicalOp::Or => truthy,
        };
        if short {
          return Self::done(left);
        }
        self.phase = ExprPhase::LogicalRight;
        self.queue(right);
        self.pump(rt)
      }
      (Expr::Logical { .. }, ExprPhase::LogicalRight) => Self::done(self.operand(1)),
      (Expr::Unary { op, operand }, _) => self.unary(rt, *op, operand),
      (_, phase) => Err(VmError::DriverState(format!(
        "expression finished in phase {phase:?}"
      ))),
    }
  }

  fn call(&mut self, rt: &mut Runtime, callee: &Expr) -> Result<Step, VmError> {
    if !rt.heap.is_callable(self.callee)? {
      let name = callee
        .src_name()
        .unwrap_or_else(|| "expression".to_string());
      return Err(VmError::NotCallable(name));
    }
    let profile_name = if rt.vm.is_debug() {
      callee.src_name().map(Arc::from)
    } else {
      None
    };
    self.phase = ExprPhase::AwaitCall;
    Ok(Step::suspend(CallRequest {
      callee: self.callee,
      this: self.this,
      args: std::mem::take(&mut self.values),
      scope: self.scope,
      extra: CallExtra {
        profile_name,
        callee: Some(self.callee),
      },
    }))
  }

  fn unary(&mut self, rt: &mut Runtime, op: UnaryOp, operand: &Expr) -> Result<Step, VmError> {
    let value = self.operand(0);
    match op {
      UnaryOp::Not => Self::done(Value::Bool(!rt.heap.to_boolean(value)?)),
      UnaryOp::Neg => Self::done(Value::Number(-rt.to_number(value)?)),
      UnaryOp::Plus => Self::done(Value::Number(rt.to_number(value)?)),
      UnaryOp::Void => Self::done(Value::Undefined),
      UnaryOp::TypeOf => {
        let name = rt.heap.type_of(value)?;
        Self::done(Value::String(rt.heap.alloc_string(name)?))
      }
      UnaryOp::Delete => match operand {
        Expr::Member { property, .. } => {
          let key = self.member_key(rt, property, 0)?;
          match value {
            Value::Object(obj) => {
              let strict = rt.scope_is_strict(self.scope)?;
              Self::done(Value::Bool(rt.delete(obj, key, strict)?))
            }
            Value::Undefined | Value::Null => Err(VmError::TypeError(format!(
              "cannot delete property of {}",
              rt.heap.debug_string(value)?
            ))),
            _ => Self::done(Value::Bool(true)),
          }
        }
        _ => Self::done(Value::Bool(true)),
      },
    }
  }
}

impl Task for ExprTask {
  fn start(&mut self, rt: &mut Runtime) -> Result<Step, VmError> {
    self.start_expr(rt)
  }

  fn resume(&mut self, rt: &mut Runtime, outcome: Result<Completion, VmError>) -> Result<Step, VmError> {
    let value = child_value(outcome)?;
    if self.phase == ExprPhase::AwaitCall {
      return Self::done(value);
    }
    self.values.push(value);
    self.pump(rt)
  }

  fn trace(&self, tracer: &mut Tracer<'_>) {
    tracer.trace_scope(self.scope);
    for value in &self.values {
      tracer.trace_value(*value);
    }
    tracer.trace_value(self.callee);
    tracer.trace_value(self.this);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::BinaryOp;
  use crate::ast::FunctionBody;
  use crate::ast::FunctionNode;
  use crate::{Heap, HeapLimits, Vm, VmOptions};

  fn runtime() -> Result<Runtime, VmError> {
    Runtime::new(
      Vm::new(VmOptions::default()),
      Heap::new(HeapLimits::default()),
      Rc::new(TreeDispatcher),
    )
  }

  fn num(n: f64) -> Rc<Expr> {
    Rc::new(Expr::Number(n))
  }

  fn ident(name: &str) -> Rc<Expr> {
    Rc::new(Expr::Ident(name.into()))
  }

  fn program(stmts: Vec<Stmt>) -> StmtList {
    stmts.into_iter().map(Rc::new).collect()
  }

  #[test]
  fn program_value_is_last_non_empty_completion() -> Result<(), VmError> {
    let mut rt = runtime()?;
    let body = program(vec![
      Stmt::Expr(num(1.0)),
      Stmt::If {
        test: Rc::new(Expr::Bool(false)),
        consequent: Rc::new(Stmt::Expr(num(2.0))),
        alternate: None,
      },
    ]);
    assert_eq!(rt.exec_program(body)?, Value::Undefined);

    let body = program(vec![Stmt::Expr(num(1.0)), Stmt::Var(vec![(Pattern::Identifier("x".into()), None)])]);
    assert_eq!(rt.exec_program(body)?, Value::Number(1.0));
    Ok(())
  }

  #[test]
  fn while_loop_counts_and_breaks() -> Result<(), VmError> {
    let mut rt = runtime()?;
    let inc = Rc::new(Expr::Assign {
      target: Pattern::Identifier("i".into()),
      value: Rc::new(Expr::Binary {
        op: BinaryOp::Add,
        left: ident("i"),
        right: num(1.0),
      }),
    });
    let body = program(vec![
      Stmt::Var(vec![(Pattern::Identifier("i".into()), Some(num(0.0)))]),
      Stmt::While {
        test: Rc::new(Expr::Bool(true)),
        body: Rc::new(Stmt::Block(program(vec![
          Stmt::Expr(inc),
          Stmt::If {
            test: Rc::new(Expr::Binary {
              op: BinaryOp::GtEq,
              left: ident("i"),
              right: num(5.0),
            }),
            consequent: Rc::new(Stmt::Break),
            alternate: None,
          },
        ]))),
      },
      Stmt::Expr(ident("i")),
    ]);
    assert_eq!(rt.exec_program(body)?, Value::Number(5.0));
    Ok(())
  }

  #[test]
  fn try_catches_type_errors_as_error_objects() -> Result<(), VmError> {
    let mut rt = runtime()?;
    let body = program(vec![Stmt::Try {
      block: program(vec![Stmt::Expr(Rc::new(Expr::Member {
        object: Rc::new(Expr::Undefined),
        property: MemberKey::Named("x".into()),
      }))]),
      param: Some("e".into()),
      handler: program(vec![Stmt::Expr(Rc::new(Expr::Member {
        object: ident("e"),
        property: MemberKey::Named("name".into()),
      }))]),
    }]);
    let value = rt.exec_program(body)?;
    assert_eq!(rt.to_rust_string(value)?, "TypeError");
    Ok(())
  }

  #[test]
  fn logical_operators_short_circuit() -> Result<(), VmError> {
    let mut rt = runtime()?;
    // `false && undefinedName` never resolves the right operand.
    let body = program(vec![Stmt::Expr(Rc::new(Expr::Logical {
      op: LogicalOp::And,
      left: Rc::new(Expr::Bool(false)),
      right: ident("missing"),
    }))]);
    assert_eq!(rt.exec_program(body)?, Value::Bool(false));

    let body = program(vec![Stmt::Expr(Rc::new(Expr::Logical {
      op: LogicalOp::Or,
      left: num(0.0),
      right: num(7.0),
    }))]);
    assert_eq!(rt.exec_program(body)?, Value::Number(7.0));
    Ok(())
  }

  #[test]
  fn typeof_unbound_name_is_undefined() -> Result<(), VmError> {
    let mut rt = runtime()?;
    let body = program(vec![Stmt::Expr(Rc::new(Expr::Unary {
      op: UnaryOp::TypeOf,
      operand: ident("nowhere"),
    }))]);
    let value = rt.exec_program(body)?;
    assert_eq!(rt.to_rust_string(value)?, "undefined");
    Ok(())
  }

  #[test]
  fn calling_a_non_function_names_the_callee() -> Result<(), VmError> {
    let mut rt = runtime()?;
    let body = program(vec![
      Stmt::Var(vec![(Pattern::Identifier("f".into()), Some(num(1.0)))]),
      Stmt::Expr(Rc::new(Expr::Call {
        callee: ident("f"),
        args: Vec::new(),
      })),
    ]);
    match rt.exec_program(body) {
      Err(VmError::NotCallable(name)) => assert_eq!(name, "f"),
      other => panic!("expected NotCallable, got {other:?}"),
    }
    Ok(())
  }

  #[test]
  fn function_declarations_are_hoisted_in_programs() -> Result<(), VmError> {
    let mut rt = runtime()?;
    let func = FunctionNode::new(
      Some("seven"),
      Vec::new(),
      FunctionBody::Block(program(vec![Stmt::Return(Some(num(7.0)))])),
    )
    .into_rc();
    let body = program(vec![
      Stmt::Expr(Rc::new(Expr::Call {
        callee: ident("seven"),
        args: Vec::new(),
      })),
      Stmt::FunctionDecl(func),
    ]);
    assert_eq!(rt.exec_program(body)?, Value::Number(7.0));
    Ok(())
  }
}
