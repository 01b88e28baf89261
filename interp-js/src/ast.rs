//! The syntax tree evaluated by the runtime.
//!
//! Nodes are produced by an external parser (or built directly by embedders and tests) and are
//! shared through `Rc`, so closures can hold on to their function node cheaply.

use std::rc::Rc;

pub type StmtList = Rc<[Rc<Stmt>]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  LooseEq,
  LooseNotEq,
  StrictEq,
  StrictNotEq,
  Lt,
  LtEq,
  Gt,
  GtEq,
  In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
  And,
  Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Not,
  Neg,
  Plus,
  TypeOf,
  Void,
  /// Only meaningful on member expressions; any other operand evaluates to `true`.
  Delete,
}

#[derive(Debug, Clone)]
pub enum MemberKey {
  Named(Rc<str>),
  Computed(Rc<Expr>),
}

#[derive(Debug, Clone)]
pub enum Expr {
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  String(Rc<str>),
  Ident(Rc<str>),
  This,
  Array(Vec<Rc<Expr>>),
  Object(Vec<(Rc<str>, Rc<Expr>)>),
  Function(Rc<FunctionNode>),
  Member {
    object: Rc<Expr>,
    property: MemberKey,
  },
  Assign {
    target: Pattern,
    value: Rc<Expr>,
  },
  Call {
    callee: Rc<Expr>,
    args: Vec<Rc<Expr>>,
  },
  Binary {
    op: BinaryOp,
    left: Rc<Expr>,
    right: Rc<Expr>,
  },
  Logical {
    op: LogicalOp,
    left: Rc<Expr>,
    right: Rc<Expr>,
  },
  Unary {
    op: UnaryOp,
    operand: Rc<Expr>,
  },
}

impl Expr {
  /// The source-level name of a callee, used as a profile name for calls.
  pub fn src_name(&self) -> Option<String> {
    match self {
      Expr::Ident(name) => Some(name.to_string()),
      Expr::This => Some("this".to_string()),
      Expr::Member {
        object,
        property: MemberKey::Named(name),
      } => Some(format!("{}.{name}", object.src_name()?)),
      Expr::Function(func) => func.id.as_ref().map(|id| id.to_string()),
      _ => None,
    }
  }
}

/// An assignment target.
#[derive(Debug, Clone)]
pub enum Pattern {
  Identifier(Rc<str>),
  Member {
    object: Rc<Expr>,
    property: MemberKey,
  },
  /// `{ key: target, … }`.
  Object(Vec<(Rc<str>, Pattern)>),
  /// `[target, , target]`; holes skip an element.
  Array(Vec<Option<Pattern>>),
}

impl Pattern {
  /// Identifier names this pattern binds, in source order.
  pub fn bound_names(&self) -> Vec<Rc<str>> {
    let mut names = Vec::new();
    self.collect_bound_names(&mut names);
    names
  }

  fn collect_bound_names(&self, out: &mut Vec<Rc<str>>) {
    match self {
      Pattern::Identifier(name) => out.push(name.clone()),
      Pattern::Member { .. } => {}
      Pattern::Object(props) => {
        for (_, target) in props {
          target.collect_bound_names(out);
        }
      }
      Pattern::Array(elems) => {
        for target in elems.iter().flatten() {
          target.collect_bound_names(out);
        }
      }
    }
  }
}

#[derive(Debug, Clone)]
pub enum Stmt {
  Expr(Rc<Expr>),
  Var(Vec<(Pattern, Option<Rc<Expr>>)>),
  FunctionDecl(Rc<FunctionNode>),
  Return(Option<Rc<Expr>>),
  If {
    test: Rc<Expr>,
    consequent: Rc<Stmt>,
    alternate: Option<Rc<Stmt>>,
  },
  Block(StmtList),
  While {
    test: Rc<Expr>,
    body: Rc<Stmt>,
  },
  Break,
  Continue,
  Throw(Rc<Expr>),
  Try {
    block: StmtList,
    param: Option<Rc<str>>,
    handler: StmtList,
  },
}

#[derive(Debug, Clone)]
pub enum Param {
  Simple {
    name: Rc<str>,
    default: Option<Rc<Expr>>,
  },
  Pattern {
    target: Pattern,
    default: Option<Rc<Expr>>,
  },
  Rest(Rc<str>),
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
  Block(StmtList),
  /// Arrow-function shorthand: the expression's value is the return value.
  Expression(Rc<Expr>),
}

/// A function literal or declaration.
#[derive(Debug, Clone)]
pub struct FunctionNode {
  pub id: Option<Rc<str>>,
  pub params: Vec<Param>,
  pub body: FunctionBody,
  pub strict: bool,
  pub arrow: bool,
  /// Names declared with `var` anywhere in the body, excluding nested functions.
  pub vars: Vec<Rc<str>>,
  /// Function declarations in the body, excluding nested functions.
  pub funcs: Vec<Rc<FunctionNode>>,
  /// Host-internal code: its body is evaluated quietly.
  pub non_user_code: bool,
}

impl FunctionNode {
  /// Builds a function node, deriving `vars`, `funcs` and `strict` from the body.
  pub fn new(id: Option<&str>, params: Vec<Param>, body: FunctionBody) -> Self {
    let (vars, funcs, strict) = match &body {
      FunctionBody::Block(stmts) => {
        let mut vars = Vec::new();
        let mut funcs = Vec::new();
        collect_declarations(stmts, &mut vars, &mut funcs);
        (vars, funcs, has_use_strict_directive(stmts))
      }
      FunctionBody::Expression(_) => (Vec::new(), Vec::new(), false),
    };
    Self {
      id: id.map(Rc::from),
      params,
      body,
      strict,
      arrow: false,
      vars,
      funcs,
      non_user_code: false,
    }
  }

  pub fn arrow(params: Vec<Param>, body: FunctionBody) -> Self {
    Self {
      arrow: true,
      ..Self::new(None, params, body)
    }
  }

  pub fn strict(mut self) -> Self {
    self.strict = true;
    self
  }

  pub fn non_user_code(mut self) -> Self {
    self.non_user_code = true;
    self
  }

  pub fn into_rc(self) -> Rc<Self> {
    Rc::new(self)
  }
}

/// Names declared with `var` in `stmts`, not descending into functions.
pub fn var_declared_names(stmts: &[Rc<Stmt>]) -> Vec<Rc<str>> {
  let mut vars = Vec::new();
  let mut funcs = Vec::new();
  collect_declarations(stmts, &mut vars, &mut funcs);
  vars
}

fn collect_declarations(
  stmts: &[Rc<Stmt>],
  vars: &mut Vec<Rc<str>>,
  funcs: &mut Vec<Rc<FunctionNode>>,
) {
  for stmt in stmts {
    collect_stmt_declarations(stmt, vars, funcs);
  }
}

fn collect_stmt_declarations(
  stmt: &Stmt,
  vars: &mut Vec<Rc<str>>,
  funcs: &mut Vec<Rc<FunctionNode>>,
) {
  match stmt {
    Stmt::Var(decls) => {
      for (target, _) in decls {
        for name in target.bound_names() {
          if !vars.contains(&name) {
            vars.push(name);
          }
        }
      }
    }
    Stmt::FunctionDecl(func) => funcs.push(func.clone()),
    Stmt::If {
      consequent,
      alternate,
      ..
    } => {
      collect_stmt_declarations(consequent, vars, funcs);
      if let Some(alternate) = alternate {
        collect_stmt_declarations(alternate, vars, funcs);
      }
    }
    Stmt::Block(stmts) => collect_declarations(stmts, vars, funcs),
    Stmt::While { body, .. } => collect_stmt_declarations(body, vars, funcs),
    Stmt::Try { block, handler, .. } => {
      collect_declarations(block, vars, funcs);
      collect_declarations(handler, vars, funcs);
    }
    Stmt::Expr(_)
    | Stmt::Return(_)
    | Stmt::Break
    | Stmt::Continue
    | Stmt::Throw(_) => {}
  }
}

fn has_use_strict_directive(stmts: &[Rc<Stmt>]) -> bool {
  for stmt in stmts {
    match &**stmt {
      Stmt::Expr(expr) => match &**expr {
        Expr::String(s) if &**s == "use strict" => return true,
        Expr::String(_) => continue,
        _ => return false,
      },
      _ => return false,
    }
  }
  false
}
