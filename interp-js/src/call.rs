use crate::ast::FunctionBody;
use crate::ast::Param;
use crate::ast::Pattern;
use crate::branch::BranchKind;
use crate::branch::BranchNode;
use crate::branch::BranchOptions;
use crate::branch::BranchRequest;
use crate::branch::Completion;
use crate::branch::Step;
use crate::branch::Task;
use crate::function::ClosureData;
use crate::heap::ClassTag;
use crate::heap::Trace;
use crate::heap::Tracer;
use crate::property::PropertyDescriptor;
use crate::property::PropertyKey;
use crate::runtime::Runtime;
use crate::{GcObject, GcProperty, GcScope, Value, VmError};
use std::sync::Arc;
use tracing::debug_span;
use tracing::trace;
use tracing::Span;

/// Caller-supplied metadata for an invocation.
#[derive(Debug, Clone, Default)]
pub struct CallExtra {
  /// The call site's source name (e.g. `obj.method`). Recorded only in debug mode.
  pub profile_name: Option<Arc<str>>,
  pub callee: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
  Created,
  Invoking,
  /// Waiting on the default expression of parameter `index`.
  ParamBinding { index: usize },
  BodyEvaluating,
  Returned,
  Thrown,
}

/// A closure call in progress.
pub struct Invocation {
  closure: GcObject,
  data: ClosureData,
  this: Value,
  args: Vec<Value>,
  caller_scope: GcScope,
  extra: CallExtra,
  state: InvocationState,
  scope: Option<GcScope>,
  strict: bool,
  arg_cells: Vec<GcProperty>,
  span: Span,
}

/// Prepares a call of `closure`. Nothing runs until the driver starts the returned task.
pub fn call_closure(
  rt: &mut Runtime,
  closure: GcObject,
  this: Value,
  args: &[Value],
  caller_scope: GcScope,
  extra: CallExtra,
) -> Result<Box<dyn Task>, VmError> {
  let data = rt.heap.closure_data(closure)?.clone();
  rt.heap.get_scope(caller_scope)?;
  let span = debug_span!(
    "invoke",
    function = data.func.id.as_deref().unwrap_or("<anonymous>"),
    argc = args.len(),
  );
  Ok(Box::new(Invocation {
    closure,
    data,
    this,
    args: args.to_vec(),
    caller_scope,
    extra,
    state: InvocationState::Created,
    scope: None,
    strict: false,
    arg_cells: Vec::new(),
    span,
  }))
}

impl Invocation {
  pub fn state(&self) -> InvocationState {
    self.state
  }

  fn scope(&self) -> Result<GcScope, VmError> {
    self
      .scope
      .ok_or_else(|| VmError::DriverState("invocation scope is not set up".to_string()))
  }

  /// Scope setup, strictness, self reference, hoisting and the arguments object.
  fn invoke(&mut self, rt: &mut Runtime) -> Result<(), VmError> {
    let (scope, this) = match self.data.bound_scope {
      Some(bound) => {
        let scope = rt.create_child_scope(bound)?;
        let bound_object = rt.heap.get_scope(bound)?.object;
        rt.set_scope_write_to(scope, Some(bound_object))?;
        let this = match self.data.this {
          Some(this) => this,
          None => rt.scope_this(bound)?,
        };
        (scope, this)
      }
      None => {
        let scope = rt.create_child_scope(self.data.scope)?;
        (scope, self.data.this.unwrap_or(self.this))
      }
    };
    self.scope = Some(scope);

    if self.data.func.strict {
      rt.set_scope_strict(scope, true)?;
    }
    self.strict = rt.scope_is_strict(scope)?;

    let this = if !self.strict && this.is_nullish() && rt.realm().options().sloppy_this_is_global {
      Value::Object(rt.scope_global_object(self.caller_scope)?)
    } else {
      this
    };
    rt.set_scope_this(scope, this)?;

    let func = self.data.func.clone();
    if let Some(id) = &func.id {
      rt.scope_add(scope, id, Value::Object(self.closure))?;
    }

    for name in &func.vars {
      rt.scope_add(scope, name, Value::Undefined)?;
    }

    // Sloppy code pre-declares nested function names; the body binds the closures on entry.
    if !self.strict {
      for decl in &func.funcs {
        if let Some(id) = &decl.id {
          rt.scope_add(scope, id, Value::Undefined)?;
        }
      }
    }

    let arguments = self.alloc_arguments(rt)?;
    let arguments_key = rt.realm().names().arguments;
    let target = rt.heap.get_scope(scope)?.target();
    rt.heap.object_define_raw(
      target,
      arguments_key,
      PropertyDescriptor::variable(Value::Object(arguments)),
    )?;
    trace!(strict = self.strict, params = func.params.len(), "invocation scope ready");
    Ok(())
  }

  fn alloc_arguments(&mut self, rt: &mut Runtime) -> Result<GcObject, VmError> {
    let argn = self.args.len().max(self.data.func.params.len());
    let proto = rt.realm().object_prototype();
    let arguments = rt
      .heap
      .alloc_object_with_class(Some(proto), ClassTag::Arguments)?;

    self.arg_cells = Vec::with_capacity(argn);
    for i in 0..argn {
      let value = self.args.get(i).copied().unwrap_or(Value::Undefined);
      let cell = rt.heap.alloc_property(PropertyDescriptor::data(value))?;
      self.arg_cells.push(cell);
      let key = PropertyKey::Index(i as u32);
      if self.strict {
        rt.set(arguments, key, value, true)?;
      } else {
        rt.heap.object_install_cell(arguments, key, cell)?;
      }
    }

    let names = *rt.realm().names();
    if !self.strict {
      rt.heap.object_define_raw(
        arguments,
        names.callee,
        PropertyDescriptor::hidden(Value::Object(self.closure)),
      )?;
    }
    rt.heap.object_define_raw(
      arguments,
      names.length,
      PropertyDescriptor::hidden(Value::Number(self.args.len() as f64)),
    )?;
    Ok(arguments)
  }

  /// Binds parameters from `from` onwards, suspending on the first default that must be evaluated.
  fn bind_params(&mut self, rt: &mut Runtime, from: usize) -> Result<Step, VmError> {
    let scope = self.scope()?;
    let func = self.data.func.clone();
    for (index, param) in func.params.iter().enumerate().skip(from) {
      match param {
        Param::Rest(name) => {
          let rest = self.args.get(index..).unwrap_or(&[]);
          let arr = rt.alloc_array(rest)?;
          rt.scope_add(scope, name, Value::Object(arr))?;
          break;
        }
        Param::Simple { name, default } => match (self.args.get(index), default) {
          (Some(value), _) => self.bind_simple(rt, index, name, *value)?,
          (None, Some(default)) => {
            self.state = InvocationState::ParamBinding { index };
            return Ok(Step::suspend(BranchRequest::expression(default.clone(), scope)));
          }
          (None, None) => self.bind_simple(rt, index, name, Value::Undefined)?,
        },
        Param::Pattern { target, default } => {
          for name in target.bound_names() {
            rt.scope_add(scope, &name, Value::Undefined)?;
          }
          match (self.args.get(index), default) {
            (Some(value), _) => bind_pattern(rt, target, scope, *value)?,
            (None, Some(default)) => {
              self.state = InvocationState::ParamBinding { index };
              return Ok(Step::suspend(BranchRequest::expression(default.clone(), scope)));
            }
            (None, None) => bind_pattern(rt, target, scope, Value::Undefined)?,
          }
        }
      }
    }
    self.begin_body(rt)
  }

  fn bind_simple(&mut self, rt: &mut Runtime, index: usize, name: &str, value: Value) -> Result<(), VmError> {
    let scope = self.scope()?;
    if self.strict {
      rt.scope_add(scope, name, value)?;
    } else {
      let cell = self
        .arg_cells
        .get(index)
        .copied()
        .ok_or_else(|| VmError::Invocation(format!("missing argument slot {index}")))?;
      rt.scope_install_cell(scope, name, cell)?;
    }
    Ok(())
  }

  /// Resumes parameter binding with the evaluated default of parameter `index`.
  fn bind_default(&mut self, rt: &mut Runtime, index: usize, value: Value) -> Result<Step, VmError> {
    let scope = self.scope()?;
    let func = self.data.func.clone();
    if let Some(cell) = self.arg_cells.get(index) {
      rt.heap.write_cell_value(*cell, value)?;
    }
    match func.params.get(index) {
      Some(Param::Simple { name, .. }) => self.bind_simple(rt, index, name, value)?,
      Some(Param::Pattern { target, .. }) => bind_pattern(rt, target, scope, value)?,
      Some(Param::Rest(_)) | None => {
        return Err(VmError::Invocation(format!(
          "parameter {index} has no default"
        )));
      }
    }
    self.bind_params(rt, index + 1)
  }

  fn begin_body(&mut self, rt: &mut Runtime) -> Result<Step, VmError> {
    let scope = self.scope()?;
    self.state = InvocationState::BodyEvaluating;
    let func = &self.data.func;
    let node = match &func.body {
      FunctionBody::Block(stmts) => BranchNode::Statements(stmts.clone()),
      FunctionBody::Expression(expr) => BranchNode::Expression(expr.clone()),
    };
    let options = BranchOptions {
      return_last_value: self.data.return_last_value,
      creator: Some(self.closure),
      profile_name: if rt.vm.is_debug() {
        self.extra.profile_name.clone()
      } else {
        None
      },
      callee: self.extra.callee,
      yield_power: func.non_user_code.then_some(-1),
    };
    Ok(Step::suspend(
      BranchRequest::new(BranchKind::Function, node, scope).with_options(options),
    ))
  }

  fn finish_body(&mut self, completion: Completion) -> Result<Step, VmError> {
    let value = match completion {
      Completion::Return(value) => value,
      Completion::Normal(value) => value.unwrap_or(Value::Undefined),
      Completion::Throw(value) => return Err(VmError::Throw(value)),
      Completion::Break(..) => {
        return Err(VmError::Invocation(
          "break escaped a function body".to_string(),
        ))
      }
      Completion::Continue(..) => {
        return Err(VmError::Invocation(
          "continue escaped a function body".to_string(),
        ))
      }
    };
    self.state = InvocationState::Returned;
    Ok(Step::Done(Completion::normal(value)))
  }

  fn settle(&mut self, result: Result<Step, VmError>) -> Result<Step, VmError> {
    match &result {
      Err(_) => self.state = InvocationState::Thrown,
      Ok(Step::Done(_)) => self.state = InvocationState::Returned,
      Ok(Step::Suspend(_)) => {}
    }
    result
  }
}

fn bind_pattern(rt: &mut Runtime, target: &Pattern, scope: GcScope, value: Value) -> Result<(), VmError> {
  let dispatcher = rt.dispatcher();
  let reference = dispatcher.resolve_ref(rt, target, scope)?;
  reference.set_value(rt, value)
}

impl Task for Invocation {
  fn start(&mut self, rt: &mut Runtime) -> Result<Step, VmError> {
    let span = self.span.clone();
    let _enter = span.enter();
    if self.state != InvocationState::Created {
      return Err(VmError::DriverState("invocation started twice".to_string()));
    }
    self.state = InvocationState::Invoking;
    let result = match self.invoke(rt) {
      Ok(()) => self.bind_params(rt, 0),
      Err(err) => Err(err),
    };
    self.settle(result)
  }

  fn resume(
    &mut self,
    rt: &mut Runtime,
    outcome: Result<Completion, VmError>,
  ) -> Result<Step, VmError> {
    let span = self.span.clone();
    let _enter = span.enter();
    let result = match (self.state, outcome) {
      (_, Err(err)) => Err(err),
      (InvocationState::ParamBinding { index }, Ok(completion)) => {
        let value = completion.value().unwrap_or(Value::Undefined);
        self.bind_default(rt, index, value)
      }
      (InvocationState::BodyEvaluating, Ok(completion)) => self.finish_body(completion),
      (state, Ok(_)) => Err(VmError::DriverState(format!(
        "invocation resumed in state {state:?}"
      ))),
    };
    self.settle(result)
  }

  fn trace(&self, tracer: &mut Tracer<'_>) {
    tracer.trace_object(self.closure);
    self.data.trace(tracer);
    tracer.trace_value(self.this);
    for arg in &self.args {
      tracer.trace_value(*arg);
    }
    tracer.trace_scope(self.caller_scope);
    if let Some(callee) = self.extra.callee {
      tracer.trace_value(callee);
    }
    if let Some(scope) = self.scope {
      tracer.trace_scope(scope);
    }
    for cell in &self.arg_cells {
      tracer.trace_cell(*cell);
    }
  }
}
