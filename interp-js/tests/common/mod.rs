#![allow(dead_code)]

use interp_js::ast::BinaryOp;
use interp_js::ast::Expr;
use interp_js::ast::FunctionBody;
use interp_js::ast::FunctionNode;
use interp_js::ast::MemberKey;
use interp_js::ast::Param;
use interp_js::ast::Pattern;
use interp_js::ast::Stmt;
use interp_js::ast::StmtList;
use interp_js::GcObject;
use interp_js::Heap;
use interp_js::HeapLimits;
use interp_js::NativeCallFn;
use interp_js::Runtime;
use interp_js::TreeDispatcher;
use interp_js::Value;
use interp_js::Vm;
use interp_js::VmError;
use interp_js::VmOptions;
use std::rc::Rc;

pub fn runtime() -> Result<Runtime, VmError> {
  runtime_with(VmOptions::default())
}

pub fn runtime_with(options: VmOptions) -> Result<Runtime, VmError> {
  Runtime::new(
    Vm::new(options),
    Heap::new(HeapLimits::default()),
    Rc::new(TreeDispatcher),
  )
}

pub fn runtime_with_heap(limits: HeapLimits) -> Result<Runtime, VmError> {
  Runtime::new(
    Vm::new(VmOptions::default()),
    Heap::new(limits),
    Rc::new(TreeDispatcher),
  )
}

pub fn num(n: f64) -> Rc<Expr> {
  Rc::new(Expr::Number(n))
}

pub fn string(s: &str) -> Rc<Expr> {
  Rc::new(Expr::String(s.into()))
}

pub fn ident(name: &str) -> Rc<Expr> {
  Rc::new(Expr::Ident(name.into()))
}

pub fn this() -> Rc<Expr> {
  Rc::new(Expr::This)
}

pub fn member(object: Rc<Expr>, name: &str) -> Rc<Expr> {
  Rc::new(Expr::Member {
    object,
    property: MemberKey::Named(name.into()),
  })
}

pub fn index(object: Rc<Expr>, key: Rc<Expr>) -> Rc<Expr> {
  Rc::new(Expr::Member {
    object,
    property: MemberKey::Computed(key),
  })
}

pub fn call(callee: Rc<Expr>, args: Vec<Rc<Expr>>) -> Rc<Expr> {
  Rc::new(Expr::Call { callee, args })
}

pub fn bin(op: BinaryOp, left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
  Rc::new(Expr::Binary { op, left, right })
}

pub fn assign(name: &str, value: Rc<Expr>) -> Rc<Expr> {
  Rc::new(Expr::Assign {
    target: Pattern::Identifier(name.into()),
    value,
  })
}

pub fn assign_member(object: Rc<Expr>, name: &str, value: Rc<Expr>) -> Rc<Expr> {
  Rc::new(Expr::Assign {
    target: Pattern::Member {
      object,
      property: MemberKey::Named(name.into()),
    },
    value,
  })
}

pub fn func_expr(func: FunctionNode) -> Rc<Expr> {
  Rc::new(Expr::Function(func.into_rc()))
}

pub fn stmts(list: Vec<Stmt>) -> StmtList {
  list.into_iter().map(Rc::new).collect()
}

pub fn expr(e: Rc<Expr>) -> Stmt {
  Stmt::Expr(e)
}

pub fn ret(e: Rc<Expr>) -> Stmt {
  Stmt::Return(Some(e))
}

pub fn var(name: &str, init: Option<Rc<Expr>>) -> Stmt {
  Stmt::Var(vec![(Pattern::Identifier(name.into()), init)])
}

pub fn param(name: &str) -> Param {
  Param::Simple {
    name: name.into(),
    default: None,
  }
}

pub fn param_default(name: &str, default: Rc<Expr>) -> Param {
  Param::Simple {
    name: name.into(),
    default: Some(default),
  }
}

pub fn rest(name: &str) -> Param {
  Param::Rest(name.into())
}

pub fn function(name: Option<&str>, params: Vec<Param>, body: Vec<Stmt>) -> FunctionNode {
  FunctionNode::new(name, params, FunctionBody::Block(stmts(body)))
}

pub fn decl(func: FunctionNode) -> Stmt {
  Stmt::FunctionDecl(func.into_rc())
}

/// Runs `body` as a program and returns its completion value.
pub fn run(rt: &mut Runtime, body: Vec<Stmt>) -> Result<Value, VmError> {
  rt.exec_program(stmts(body))
}

pub fn js_string(rt: &mut Runtime, value: Value) -> Result<String, VmError> {
  rt.to_rust_string(value)
}

pub fn str_value(rt: &mut Runtime, s: &str) -> Result<Value, VmError> {
  Ok(Value::String(rt.heap.alloc_string(s)?))
}

/// Installs a native function as a global binding.
pub fn define_global_native(
  rt: &mut Runtime,
  name: &str,
  length: u32,
  call: NativeCallFn,
) -> Result<GcObject, VmError> {
  let func = rt.alloc_native_function(name, length, call)?;
  let global = rt.global_object();
  let key = rt.heap.key_from_str(name)?;
  rt.set(global, key, Value::Object(func), true)?;
  Ok(func)
}

pub fn array(elems: Vec<Rc<Expr>>) -> Rc<Expr> {
  Rc::new(Expr::Array(elems))
}

pub fn object(props: Vec<(&str, Rc<Expr>)>) -> Rc<Expr> {
  Rc::new(Expr::Object(
    props
      .into_iter()
      .map(|(name, value)| (Rc::from(name), value))
      .collect(),
  ))
}

pub fn assign_index(object: Rc<Expr>, key: Rc<Expr>, value: Rc<Expr>) -> Rc<Expr> {
  Rc::new(Expr::Assign {
    target: Pattern::Member {
      object,
      property: MemberKey::Computed(key),
    },
    value,
  })
}

pub fn if_then(test: Rc<Expr>, consequent: Stmt) -> Stmt {
  Stmt::If {
    test,
    consequent: Rc::new(consequent),
    alternate: None,
  }
}

/// Reads a global binding.
pub fn global(rt: &mut Runtime, name: &str) -> Result<Value, VmError> {
  let scope = rt.global_scope();
  rt.lookup(scope, name)
}

pub fn element(rt: &mut Runtime, arr: Value, idx: u32) -> Result<Value, VmError> {
  rt.get(arr, interp_js::PropertyKey::Index(idx))
}
