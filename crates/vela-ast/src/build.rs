//! Constructor helpers for assembling program trees by hand.
//!
//! Every node gets a dummy span; use [`at`] to place an expression.

use crate::*;

pub fn ident(name: &str) -> Ident {
    Ident::dummy(SmolStr::new(name))
}

fn expr(kind: ExprKind) -> Expr {
    Expr::new(kind, Span::dummy())
}

/// Re-span an expression.
pub fn at(mut e: Expr, start: usize, end: usize) -> Expr {
    e.span = Span::new(start, end);
    e
}

// ----------------------------------------------------------------------------
// Expressions
// ----------------------------------------------------------------------------

pub fn int(value: i64) -> Expr {
    expr(ExprKind::Integer(value))
}

pub fn float(value: f64) -> Expr {
    expr(ExprKind::Float(value))
}

pub fn string(value: &str) -> Expr {
    expr(ExprKind::String(SmolStr::new(value)))
}

pub fn boolean(value: bool) -> Expr {
    expr(ExprKind::Bool(value))
}

pub fn unit() -> Expr {
    expr(ExprKind::Unit)
}

pub fn var(name: &str) -> Expr {
    expr(ExprKind::Ident(SmolStr::new(name)))
}

pub fn call(func: Expr, args: Vec<Expr>) -> Expr {
    expr(ExprKind::Call {
        func: Box::new(func),
        args,
    })
}

/// `name(args)`
pub fn call_named(name: &str, args: Vec<Expr>) -> Expr {
    call(var(name), args)
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    expr(ExprKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    expr(ExprKind::Unary {
        op,
        operand: Box::new(operand),
    })
}

pub fn param(name: &str) -> Param {
    Param {
        name: ident(name),
        ty: None,
        span: Span::dummy(),
    }
}

pub fn typed_param(name: &str, ty: TypeExpr) -> Param {
    Param {
        name: ident(name),
        ty: Some(ty),
        span: Span::dummy(),
    }
}

pub fn lambda(params: Vec<Param>, body: Expr) -> Expr {
    expr(ExprKind::Lambda {
        params,
        return_type: None,
        body: Box::new(body),
    })
}

pub fn if_else(condition: Expr, then_branch: Expr, else_branch: Expr) -> Expr {
    expr(ExprKind::If {
        condition: Box::new(condition),
        then_branch: Box::new(then_branch),
        else_branch: Some(Box::new(else_branch)),
    })
}

pub fn if_then(condition: Expr, then_branch: Expr) -> Expr {
    expr(ExprKind::If {
        condition: Box::new(condition),
        then_branch: Box::new(then_branch),
        else_branch: None,
    })
}

pub fn block(stmts: Vec<Stmt>, result: Option<Expr>) -> Expr {
    expr(ExprKind::Block(Block {
        stmts,
        result: result.map(Box::new),
        span: Span::dummy(),
    }))
}

pub fn field(object: Expr, name: &str) -> Expr {
    expr(ExprKind::Field {
        object: Box::new(object),
        field: ident(name),
    })
}

pub fn index(object: Expr, index: Expr) -> Expr {
    expr(ExprKind::Index {
        object: Box::new(object),
        index: Box::new(index),
    })
}

fn field_inits(fields: Vec<(&str, Expr)>) -> Vec<FieldInit> {
    fields
        .into_iter()
        .map(|(name, value)| FieldInit {
            name: ident(name),
            value,
        })
        .collect()
}

pub fn record(fields: Vec<(&str, Expr)>) -> Expr {
    expr(ExprKind::Record(field_inits(fields)))
}

pub fn struct_init(name: &str, fields: Vec<(&str, Expr)>) -> Expr {
    expr(ExprKind::StructInit {
        name: ident(name),
        fields: field_inits(fields),
    })
}

pub fn tuple(elements: Vec<Expr>) -> Expr {
    expr(ExprKind::Tuple(elements))
}

pub fn array(elements: Vec<Expr>) -> Expr {
    expr(ExprKind::Array(elements))
}

pub fn annotated(e: Expr, ty: TypeExpr) -> Expr {
    expr(ExprKind::Annotated {
        expr: Box::new(e),
        ty,
    })
}

pub fn handle(body: Expr, handlers: Vec<HandlerClause>, return_clause: Option<ReturnClause>) -> Expr {
    expr(ExprKind::Handle {
        body: Box::new(body),
        handlers,
        return_clause: return_clause.map(Box::new),
    })
}

/// `op(params) => body`
pub fn clause(operation: &str, params: &[&str], body: Expr) -> HandlerClause {
    HandlerClause {
        effect: None,
        operation: ident(operation),
        params: params.iter().map(|p| ident(p)).collect(),
        body,
        span: Span::dummy(),
    }
}

/// `Effect.op(params) => body`
pub fn qualified_clause(effect: &str, operation: &str, params: &[&str], body: Expr) -> HandlerClause {
    HandlerClause {
        effect: Some(ident(effect)),
        ..clause(operation, params, body)
    }
}

pub fn return_clause(param: &str, body: Expr) -> ReturnClause {
    ReturnClause {
        param: ident(param),
        body,
        span: Span::dummy(),
    }
}

pub fn ai(kind: AiKind, fields: Vec<(&str, Expr)>) -> Expr {
    expr(ExprKind::Ai {
        kind,
        fields: field_inits(fields),
    })
}

pub fn ai_inline(prompt: Expr) -> Expr {
    expr(ExprKind::AiInline(Box::new(prompt)))
}

pub fn prompt_call(prompt: &str, args: Vec<Expr>) -> Expr {
    expr(ExprKind::PromptCall {
        prompt: ident(prompt),
        args,
    })
}

// ----------------------------------------------------------------------------
// Statements
// ----------------------------------------------------------------------------

fn stmt(kind: StmtKind) -> Stmt {
    Stmt {
        kind,
        span: Span::dummy(),
    }
}

pub fn let_(name: &str, value: Expr) -> Stmt {
    stmt(StmtKind::Let {
        id: NodeId::fresh(),
        name: ident(name),
        mutable: false,
        ty: None,
        value,
    })
}

pub fn let_mut(name: &str, value: Expr) -> Stmt {
    stmt(StmtKind::Let {
        id: NodeId::fresh(),
        name: ident(name),
        mutable: true,
        ty: None,
        value,
    })
}

pub fn let_typed(name: &str, ty: TypeExpr, value: Expr) -> Stmt {
    stmt(StmtKind::Let {
        id: NodeId::fresh(),
        name: ident(name),
        mutable: false,
        ty: Some(ty),
        value,
    })
}

pub fn expr_stmt(e: Expr) -> Stmt {
    stmt(StmtKind::Expr(e))
}

pub fn assign(target: Expr, value: Expr) -> Stmt {
    stmt(StmtKind::Assign { target, value })
}

// ----------------------------------------------------------------------------
// Types
// ----------------------------------------------------------------------------

pub fn ty(name: &str) -> TypeExpr {
    ty_app(name, vec![])
}

pub fn ty_app(name: &str, args: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::Named {
        name: ident(name),
        args,
        span: Span::dummy(),
    }
}

pub fn fn_ty(params: Vec<TypeExpr>, ret: TypeExpr, effects: Option<EffectAnnotation>) -> TypeExpr {
    TypeExpr::Function {
        params,
        ret: Box::new(ret),
        effects,
        span: Span::dummy(),
    }
}

pub fn array_ty(element: TypeExpr) -> TypeExpr {
    TypeExpr::Array {
        element: Box::new(element),
        span: Span::dummy(),
    }
}

pub fn tuple_ty(elements: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::Tuple {
        elements,
        span: Span::dummy(),
    }
}

pub fn record_ty(fields: Vec<(&str, TypeExpr)>) -> TypeExpr {
    TypeExpr::Record {
        fields: fields.into_iter().map(|(n, t)| (ident(n), t)).collect(),
        span: Span::dummy(),
    }
}

pub fn ref_ty(mutable: bool, inner: TypeExpr) -> TypeExpr {
    TypeExpr::Reference {
        mutable,
        inner: Box::new(inner),
        span: Span::dummy(),
    }
}

pub fn effect(name: &str) -> EffectExpr {
    effect_app(name, vec![])
}

pub fn effect_app(name: &str, args: Vec<TypeExpr>) -> EffectExpr {
    EffectExpr {
        name: ident(name),
        args,
        span: Span::dummy(),
    }
}

pub fn effects(effects: Vec<EffectExpr>, tail: Option<&str>) -> EffectAnnotation {
    EffectAnnotation {
        effects,
        tail: tail.map(ident),
        span: Span::dummy(),
    }
}

// ----------------------------------------------------------------------------
// Declarations
// ----------------------------------------------------------------------------

pub fn function(name: &str, params: Vec<Param>, return_type: Option<TypeExpr>, body: Expr) -> FunctionDecl {
    FunctionDecl {
        name: ident(name),
        type_params: vec![],
        params,
        return_type,
        effects: None,
        is_pure: false,
        body,
        span: Span::dummy(),
    }
}

pub fn struct_decl(name: &str, type_params: &[&str], fields: Vec<(&str, TypeExpr)>) -> StructDecl {
    StructDecl {
        name: ident(name),
        type_params: type_params.iter().map(|p| ident(p)).collect(),
        fields: fields
            .into_iter()
            .map(|(n, ty)| FieldDecl {
                name: ident(n),
                ty,
                span: Span::dummy(),
            })
            .collect(),
        span: Span::dummy(),
    }
}

pub fn operation(name: &str, params: Vec<Param>, return_type: TypeExpr) -> OperationDecl {
    OperationDecl {
        name: ident(name),
        params,
        return_type,
        span: Span::dummy(),
    }
}

pub fn effect_decl(name: &str, type_params: &[&str], operations: Vec<OperationDecl>) -> EffectDecl {
    EffectDecl {
        name: ident(name),
        type_params: type_params.iter().map(|p| ident(p)).collect(),
        operations,
        span: Span::dummy(),
    }
}

pub fn model_decl(name: &str, fields: Vec<(&str, Expr)>) -> ModelDecl {
    ModelDecl {
        name: ident(name),
        fields: field_inits(fields),
        span: Span::dummy(),
    }
}

pub fn prompt_decl(
    name: &str,
    params: Vec<Param>,
    output: Option<TypeExpr>,
    model: Option<&str>,
    template: Expr,
) -> PromptDecl {
    PromptDecl {
        name: ident(name),
        params,
        output,
        model: model.map(ident),
        template,
        span: Span::dummy(),
    }
}

pub fn program(items: Vec<Item>) -> Program {
    Program {
        items,
        span: Span::dummy(),
    }
}
