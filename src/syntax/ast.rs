//! Syntax tree of the host dialect.
//!
//! Every node carries a [`NodeId`] that is unique within its compilation unit
//! and a [`Span`] into the text it was parsed from. Nodes synthesized during
//! expansion get fresh ids and a synthetic span.

use serde::{Deserialize, Serialize};

use crate::syntax::{NodeId, NodeIds, Span};

// ============================================================================
// FILES AND DECLARATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub package: Ident,
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub id: NodeId,
    pub span: Span,
    pub alias: Option<Ident>,
    /// Import path without quotes.
    pub path: String,
}

impl Import {
    /// The name the import is referred to by inside the file.
    pub fn local_name(&self) -> &str {
        match &self.alias {
            Some(alias) => &alias.name,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
}

impl Ident {
    pub fn synthetic(ids: &mut NodeIds, name: impl Into<String>) -> Self {
        Self {
            id: ids.fresh(),
            span: Span::synthetic(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decl {
    Func(FuncDecl),
    Type(Vec<TypeSpec>),
    Var(Vec<ValueSpec>),
    Const(Vec<ValueSpec>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDecl {
    pub id: NodeId,
    pub span: Span,
    pub recv: Option<Field>,
    pub name: Ident,
    pub sig: Signature,
    pub body: Option<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub id: NodeId,
    pub span: Span,
    pub name: Ident,
    /// `type A = B` rather than `type A B`.
    pub alias: bool,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSpec {
    pub id: NodeId,
    pub span: Span,
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<Field>,
    pub results: Vec<Field>,
}

impl Signature {
    /// One entry per declared result value; `(a, b int)` contributes two.
    pub fn result_slots(&self) -> Vec<&TypeExpr> {
        self.results
            .iter()
            .flat_map(|field| std::iter::repeat(&field.ty).take(field.names.len().max(1)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: NodeId,
    pub span: Span,
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
    pub variadic: bool,
    /// Raw struct tag literal, quotes included.
    pub tag: Option<String>,
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeExpr {
    pub id: NodeId,
    pub span: Span,
    pub kind: TypeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeKind {
    Name {
        package: Option<String>,
        name: String,
    },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    /// `len` is `None` for `[...]T` in composite literals.
    Array {
        len: Option<Box<Expr>>,
        elem: Box<TypeExpr>,
    },
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Func(Box<Signature>),
    Struct(Vec<Field>),
    /// Methods are fields with a single name and a func type; embedded
    /// interfaces have no names.
    Interface(Vec<Field>),
}

impl TypeExpr {
    pub fn is_named(&self, wanted: &str) -> bool {
        matches!(&self.kind, TypeKind::Name { package: None, name } if name == wanted)
    }
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Ident(String),
    Lit(LitKind, String),
    Composite {
        ty: Option<Box<TypeExpr>>,
        elts: Vec<Expr>,
    },
    FuncLit(Box<FuncLit>),
    Paren(Box<Expr>),
    Selector {
        x: Box<Expr>,
        sel: Ident,
    },
    Index {
        x: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        x: Box<Expr>,
        lo: Option<Box<Expr>>,
        hi: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
    },
    TypeAssert {
        x: Box<Expr>,
        ty: Box<TypeExpr>,
    },
    Call {
        fun: Box<Expr>,
        args: Vec<Expr>,
        ellipsis: bool,
    },
    Unary {
        op: UnaryOp,
        x: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        x: Box<Expr>,
        y: Box<Expr>,
    },
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    /// A type in operand position, e.g. the callee of `[]byte(s)`.
    Type(Box<TypeExpr>),
    /// Left behind when an expression is moved out of the tree.
    Bad,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncLit {
    pub sig: Signature,
    pub body: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Char,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    BitNot,
    Deref,
    Addr,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "^",
            UnaryOp::Deref => "*",
            UnaryOp::Addr => "&",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    LOr,
    LAnd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Or,
    Xor,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    And,
    AndNot,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::LOr => "||",
            BinaryOp::LAnd => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::And => "&",
            BinaryOp::AndNot => "&^",
        }
    }

    /// Go operator precedence, 1 (lowest) to 5.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::LOr => 1,
            BinaryOp::LAnd => 2,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 3,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Or | BinaryOp::Xor => 4,
            _ => 5,
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == 3
    }

    pub fn from_str(op: &str) -> Option<Self> {
        Some(match op {
            "||" => BinaryOp::LOr,
            "&&" => BinaryOp::LAnd,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "|" => BinaryOp::Or,
            "^" => BinaryOp::Xor,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            "&" => BinaryOp::And,
            "&^" => BinaryOp::AndNot,
            _ => return None,
        })
    }
}

impl Expr {
    pub fn new(ids: &mut NodeIds, kind: ExprKind) -> Self {
        Self {
            id: ids.fresh(),
            span: Span::synthetic(),
            kind,
        }
    }

    pub fn ident(ids: &mut NodeIds, name: impl Into<String>) -> Self {
        Self::new(ids, ExprKind::Ident(name.into()))
    }

    pub fn call(ids: &mut NodeIds, fun: &str, args: Vec<Expr>) -> Self {
        let fun = Box::new(Self::ident(ids, fun));
        Self::new(
            ids,
            ExprKind::Call {
                fun,
                args,
                ellipsis: false,
            },
        )
    }

    /// Moves this expression out, leaving a `Bad` node with the same id.
    pub fn take(&mut self) -> Expr {
        let placeholder = Expr {
            id: self.id,
            span: self.span,
            kind: ExprKind::Bad,
        };
        std::mem::replace(self, placeholder)
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Arguments of a call whose callee is the plain identifier `name`.
    pub fn call_args_of(&self, name: &str) -> Option<&[Expr]> {
        match &self.kind {
            ExprKind::Call { fun, args, .. } if fun.as_ident() == Some(name) => Some(args),
            _ => None,
        }
    }

    pub fn call_args_of_mut(&mut self, name: &str) -> Option<&mut Vec<Expr>> {
        match &mut self.kind {
            ExprKind::Call { fun, args, .. } if fun.as_ident() == Some(name) => Some(args),
            _ => None,
        }
    }
}

// ============================================================================
// STATEMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: NodeId,
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(ids: &mut NodeIds, stmts: Vec<Stmt>) -> Self {
        Self {
            id: ids.fresh(),
            span: Span::synthetic(),
            stmts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Expr(Expr),
    Assign {
        lhs: Vec<Expr>,
        op: AssignOp,
        rhs: Vec<Expr>,
    },
    IncDec {
        x: Expr,
        inc: bool,
    },
    Decl(Decl),
    Return(Vec<Expr>),
    If(IfStmt),
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        x: Expr,
        body: Block,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        clauses: Vec<CaseClause>,
    },
    Block(Block),
    Go(Expr),
    Defer(Expr),
    Branch(BranchKind),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Expr,
    pub then: Block,
    /// Either a `Block` statement or another `If`.
    pub els: Option<Box<Stmt>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseClause {
    pub id: NodeId,
    pub span: Span,
    /// `None` for `default`.
    pub values: Option<Vec<Expr>>,
    pub body: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Define,
    Compound(BinaryOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchKind {
    Break,
    Continue,
    Fallthrough,
}

impl Stmt {
    pub fn new(ids: &mut NodeIds, kind: StmtKind) -> Self {
        Self {
            id: ids.fresh(),
            span: Span::synthetic(),
            kind,
        }
    }
}
