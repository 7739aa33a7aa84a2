use serde::{Deserialize, Serialize};

pub mod source_map;
pub use source_map::SourceMap;

// ---- Span infrastructure ----

/// Byte range within source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const UNKNOWN: Span = Span { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Storage slot id. 1-based; slot 0 is never assigned to a variable.
pub type Slot = u32;

// ---- Core AST types ----

/// `$name`. The slot is filled in by scope resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Var {
    pub name: String,
    #[serde(skip)]
    pub slot: Option<Slot>,
}

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Var { name: name.into(), slot: None }
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Variable reference: `$x`
    Var(Var),

    /// Parenthesized: `( expr )`
    Paren(Box<Expr>),

    /// Host call used as a value: `name arg arg`
    Call(CallExpr),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(Var::new(name))
    }

    pub fn paren(inner: Expr) -> Self {
        Expr::Paren(Box::new(inner))
    }
}

/// `name arg arg`. The name is resolved against the host table at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub name: String,
    pub args: Vec<Expr>,
    #[serde(skip)]
    pub span: Span,
}

impl CallExpr {
    pub fn new(name: impl Into<String>, args: Vec<Expr>) -> Self {
        CallExpr { name: name.into(), args, span: Span::UNKNOWN }
    }
}

/// `$out = name args;` or `name args;` (result discarded)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStmt {
    pub result: Option<Var>,
    pub call: CallExpr,
}

/// `cond expr {..} else {..}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cond {
    pub condition: Expr,
    pub then_block: Block,
    pub else_block: Option<Block>,
}

/// `loop label {..}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loop {
    pub label: Option<String>,
    pub body: Block,
    #[serde(skip)]
    pub span: Span,
}

/// `break;` or `break label;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Break {
    pub label: Option<String>,
    #[serde(skip)]
    pub span: Span,
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Cond(Cond),
    Loop(Loop),
    Break(Break),
    Call(CallStmt),
    Block(Block),
}

impl Stmt {
    /// `name args;`
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Stmt::Call(CallStmt { result: None, call: CallExpr::new(name, args) })
    }

    /// `$result = name args;`
    pub fn assign(result: impl Into<String>, name: impl Into<String>, args: Vec<Expr>) -> Self {
        Stmt::Call(CallStmt {
            result: Some(Var::new(result)),
            call: CallExpr::new(name, args),
        })
    }

    pub fn cond(condition: Expr, then_block: Block, else_block: Option<Block>) -> Self {
        Stmt::Cond(Cond { condition, then_block, else_block })
    }

    pub fn looped(label: Option<&str>, body: Block) -> Self {
        Stmt::Loop(Loop {
            label: label.map(str::to_string),
            body,
            span: Span::UNKNOWN,
        })
    }

    pub fn brk(label: Option<&str>) -> Self {
        Stmt::Break(Break { label: label.map(str::to_string), span: Span::UNKNOWN })
    }
}

/// `{ stmt* }`. Every block is a scope.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    /// Slots first declared directly in this block (not in nested blocks).
    #[serde(skip)]
    pub local_slots: u32,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Block { stmts, local_slots: 0 }
    }
}
