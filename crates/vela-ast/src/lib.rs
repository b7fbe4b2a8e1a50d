//! Vela Program Tree
//!
//! Defines the declaration, expression and type-annotation nodes that the
//! static semantics engine consumes. Trees are produced by the parser; every
//! node carries an opaque source [`Span`] and every expression a [`NodeId`]
//! so that checker output can be keyed back onto the tree.

use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

pub use smol_str::SmolStr;

pub mod build;

/// Byte range into the source text. Opaque to the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// A spanned value - wraps any value with source location info
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn dummy(node: T) -> Self {
        Self {
            node,
            span: Span::dummy(),
        }
    }
}

/// Identifier (variable names, function names, etc.)
pub type Ident = Spanned<SmolStr>;

/// Identity of an expression or `let` node, unique within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(0);

impl NodeId {
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// Program Structure
// ============================================================================

/// A complete Vela program/module
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
    pub span: Span,
}

/// Top-level declarations
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Function(FunctionDecl),
    Struct(StructDecl),
    Effect(EffectDecl),
    Model(ModelDecl),
    Prompt(PromptDecl),
}

impl Item {
    pub fn name(&self) -> &Ident {
        match self {
            Item::Function(f) => &f.name,
            Item::Struct(s) => &s.name,
            Item::Effect(e) => &e.name,
            Item::Model(m) => &m.name,
            Item::Prompt(p) => &p.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Item::Function(f) => f.span,
            Item::Struct(s) => s.span,
            Item::Effect(e) => e.span,
            Item::Model(m) => m.span,
            Item::Prompt(p) => p.span,
        }
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// `[pure] fn name<T>(params) -> Ret ! {Effects} { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub type_params: Vec<Ident>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    /// Declared effect set. `None` means the effects are inferred.
    pub effects: Option<EffectAnnotation>,
    /// A `pure fn` must not perform any effect.
    pub is_pure: bool,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: Option<TypeExpr>,
    pub span: Span,
}

/// `struct Name<T> { field: Type, ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: Ident,
    pub type_params: Vec<Ident>,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

/// `effect Name<T> { fn op(x: T) -> R }`
#[derive(Debug, Clone, PartialEq)]
pub struct EffectDecl {
    pub name: Ident,
    pub type_params: Vec<Ident>,
    pub operations: Vec<OperationDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: TypeExpr,
    pub span: Span,
}

/// `model Name { provider: "...", temperature: 0.2 }`
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDecl {
    pub name: Ident,
    pub fields: Vec<FieldInit>,
    pub span: Span,
}

/// `prompt name(params) -> Output using Model { template }`
#[derive(Debug, Clone, PartialEq)]
pub struct PromptDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub output: Option<TypeExpr>,
    pub model: Option<Ident>,
    pub template: Expr,
    pub span: Span,
}

// ============================================================================
// Type Annotations
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `Int`, `Point`, `AI<String>`, `Pair<Int, Bool>`
    Named {
        name: Ident,
        args: Vec<TypeExpr>,
        span: Span,
    },
    /// `(A, B) -> R ! {IO | e}`
    Function {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
        effects: Option<EffectAnnotation>,
        span: Span,
    },
    Tuple {
        elements: Vec<TypeExpr>,
        span: Span,
    },
    /// `[T]`
    Array {
        element: Box<TypeExpr>,
        span: Span,
    },
    /// `{ x: Int, y: Int }`
    Record {
        fields: Vec<(Ident, TypeExpr)>,
        span: Span,
    },
    /// `&T` / `&mut T`
    Reference {
        mutable: bool,
        inner: Box<TypeExpr>,
        span: Span,
    },
    /// `_`
    Infer(Span),
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Named { span, .. }
            | TypeExpr::Function { span, .. }
            | TypeExpr::Tuple { span, .. }
            | TypeExpr::Array { span, .. }
            | TypeExpr::Record { span, .. }
            | TypeExpr::Reference { span, .. } => *span,
            TypeExpr::Infer(span) => *span,
        }
    }
}

/// `! {IO, State<Int> | e}`
#[derive(Debug, Clone, PartialEq)]
pub struct EffectAnnotation {
    pub effects: Vec<EffectExpr>,
    /// Open tail variable.
    pub tail: Option<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectExpr {
    pub name: Ident,
    pub args: Vec<TypeExpr>,
    pub span: Span,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            id: NodeId::fresh(),
            kind,
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // Literals
    Integer(i64),
    Float(f64),
    String(SmolStr),
    Bool(bool),
    Unit,

    Ident(SmolStr),

    Tuple(Vec<Expr>),
    Array(Vec<Expr>),
    /// Anonymous record: `{ x: 1, y: 2 }`
    Record(Vec<FieldInit>),
    /// `Point { x: 1, y: 2 }`
    StructInit {
        name: Ident,
        fields: Vec<FieldInit>,
    },

    Field {
        object: Box<Expr>,
        field: Ident,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },

    /// `fn(x, y: Int) -> R { body }`
    Lambda {
        params: Vec<Param>,
        return_type: Option<TypeExpr>,
        body: Box<Expr>,
    },

    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },

    Block(Block),

    /// Type ascription: `(expr : Type)`
    Annotated {
        expr: Box<Expr>,
        ty: TypeExpr,
    },

    /// `handle body { clauses }`
    Handle {
        body: Box<Expr>,
        handlers: Vec<HandlerClause>,
        return_clause: Option<Box<ReturnClause>>,
    },

    /// `ai query { prompt: ..., model: ... }`
    Ai {
        kind: AiKind,
        fields: Vec<FieldInit>,
    },
    /// `ai! { "prompt text" }`
    AiInline(Box<Expr>),
    /// Invocation of a declared prompt: `summarize!(text)`
    PromptCall {
        prompt: Ident,
        args: Vec<Expr>,
    },

    /// Placeholder left by parser error recovery.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AiKind {
    Query,
    Verify,
    Generate,
    Embed,
    Classify,
}

impl AiKind {
    /// Name of the primitive operation behind the construct.
    pub fn op_name(self) -> &'static str {
        match self {
            AiKind::Query => "query",
            AiKind::Verify => "verify",
            AiKind::Generate => "generate",
            AiKind::Embed => "embed",
            AiKind::Classify => "classify",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInit {
    pub name: Ident,
    pub value: Expr,
}

/// A block: statements followed by an optional trailing value.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub result: Option<Box<Expr>>,
    pub span: Span,
}

/// Handler clause: `[Effect.]op(params) => body`
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerClause {
    /// Explicit effect qualifier. When absent the operation name selects it.
    pub effect: Option<Ident>,
    pub operation: Ident,
    pub params: Vec<Ident>,
    pub body: Expr,
    pub span: Span,
}

/// `return(x) => body`
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnClause {
    pub param: Ident,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// `++`
    Concat,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Concat => "++",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    /// `&e`
    Ref,
    /// `&mut e`
    RefMut,
    /// `*e`
    Deref,
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression evaluated for its effects; the value is discarded.
    Expr(Expr),

    /// `let [mut] name[: Type] = value`
    Let {
        id: NodeId,
        name: Ident,
        mutable: bool,
        ty: Option<TypeExpr>,
        value: Expr,
    },

    /// `target = value` where target is a variable or `*reference`
    Assign { target: Expr, value: Expr },
}
