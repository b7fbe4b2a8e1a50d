//! Bidirectional inference for expressions and statements.
//!
//! [`Infer`] carries the per-declaration state: the lexical environment,
//! one substitution, a private fresh-variable supply and the diagnostics
//! found so far. `synth` computes a type and effect row bottom-up; `check`
//! pushes an expected type into lambdas, conditionals and blocks and falls
//! back to synthesis plus subsumption everywhere else.

mod ai;
mod handle;
mod ops;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use vela_ast::{Block, Expr, ExprKind, FieldInit, NodeId, Param, Span, Stmt, StmtKind, TypeExpr, UnaryOp};

use crate::config::CheckerConfig;
use crate::constraint::Constraint;
use crate::defs::Definitions;
use crate::effect::EffectRow;
use crate::env::{similar_names, TypeEnv};
use crate::error::{TypeError, TypeSource};
use crate::resolve::{Resolver, TypeScope};
use crate::scheme::{generalize, instantiate, is_syntactic_value, open_latent_row, Scheme};
use crate::subst::{Substitution, Types, VarSupply};
use crate::ty::{RecordType, Type};

// ============================================================================
// Per-node results
// ============================================================================

/// Type and effect of one expression.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeType {
    pub ty: Type,
    pub effects: EffectRow,
}

/// Side table keyed by [`NodeId`]; together with the tree it forms the
/// annotated program.
#[derive(Debug, Clone, Default)]
pub struct NodeTypes {
    exprs: FxHashMap<NodeId, NodeType>,
    lets: FxHashMap<NodeId, Scheme>,
}

impl NodeTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeType> {
        self.exprs.get(&id)
    }

    /// Scheme given to the `let` statement with this id.
    pub fn let_scheme(&self, id: NodeId) -> Option<&Scheme> {
        self.lets.get(&id)
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn extend(&mut self, other: NodeTypes) {
        self.exprs.extend(other.exprs);
        self.lets.extend(other.lets);
    }
}

/// What one [`Infer`] run produced.
#[derive(Debug, Clone, Default)]
pub(crate) struct InferOutput {
    pub node_types: NodeTypes,
    pub errors: Vec<TypeError>,
}

// ============================================================================
// Inference state
// ============================================================================

pub(crate) struct Infer<'a> {
    pub(crate) defs: &'a Definitions,
    /// Generalized schemes of already-checked top-level functions
    published: &'a IndexMap<SmolStr, Scheme>,
    config: &'a CheckerConfig,
    pub(crate) env: TypeEnv,
    pub(crate) scope: TypeScope,
    pub(crate) subst: Substitution,
    pub(crate) supply: VarSupply,
    pub(crate) errors: Vec<TypeError>,
    node_types: FxHashMap<NodeId, NodeType>,
    let_schemes: FxHashMap<NodeId, Scheme>,
}

impl<'a> Infer<'a> {
    pub(crate) fn new(defs: &'a Definitions, published: &'a IndexMap<SmolStr, Scheme>, config: &'a CheckerConfig) -> Self {
        Self::with_supply(defs, published, config, defs.supply())
    }

    /// Starts from a supply that has already handed out variables, such as
    /// the ones of a freshly resolved signature.
    pub(crate) fn with_supply(
        defs: &'a Definitions,
        published: &'a IndexMap<SmolStr, Scheme>,
        config: &'a CheckerConfig,
        supply: VarSupply,
    ) -> Self {
        Self {
            defs,
            published,
            config,
            env: TypeEnv::new(),
            scope: TypeScope::default(),
            subst: Substitution::new(),
            supply,
            errors: Vec::new(),
            node_types: FxHashMap::default(),
            let_schemes: FxHashMap::default(),
        }
    }

    pub(crate) fn report(&mut self, error: TypeError) {
        self.errors.push(error);
    }

    /// `ty` under the current substitution.
    pub(crate) fn apply(&self, ty: &Type) -> Type {
        ty.apply(&self.subst)
    }

    pub(crate) fn apply_row(&self, row: &EffectRow) -> EffectRow {
        row.apply(&self.subst)
    }

    /// Consumes the state, resolving every recorded node type.
    pub(crate) fn finish(self) -> InferOutput {
        let subst = self.subst;
        let exprs = self
            .node_types
            .into_iter()
            .map(|(id, node)| {
                (
                    id,
                    NodeType {
                        ty: node.ty.apply(&subst),
                        effects: node.effects.apply(&subst),
                    },
                )
            })
            .collect();
        let lets = self
            .let_schemes
            .into_iter()
            .map(|(id, scheme)| (id, scheme.apply(&subst)))
            .collect();
        InferOutput {
            node_types: NodeTypes { exprs, lets },
            errors: self.errors,
        }
    }

    fn record(&mut self, id: NodeId, ty: &Type, effects: &EffectRow) {
        self.node_types.insert(
            id,
            NodeType {
                ty: ty.clone(),
                effects: effects.clone(),
            },
        );
    }

    pub(crate) fn suggestion_distance(&self) -> Option<usize> {
        self.config
            .suggest_similar_names
            .then_some(self.config.max_suggestion_distance)
    }

    pub(crate) fn similar(&self, name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Vec<SmolStr> {
        match self.suggestion_distance() {
            Some(distance) => similar_names(name, candidates, distance),
            None => Vec::new(),
        }
    }

    pub(crate) fn resolve(&mut self, te: &TypeExpr) -> Type {
        let suggestion_distance = self.suggestion_distance();
        Resolver {
            defs: self.defs,
            scope: &mut self.scope,
            supply: &mut self.supply,
            errors: &mut self.errors,
            suggestion_distance,
        }
        .resolve(te)
    }

    /// Sequential composition of two effect rows. Distinct tails are
    /// unified first so neither unknown part is lost.
    pub(crate) fn join(&mut self, a: &EffectRow, b: &EffectRow) -> EffectRow {
        if a.is_pure() {
            return b.clone();
        }
        if b.is_pure() {
            return a.clone();
        }
        let (a, b) = (self.apply_row(a), self.apply_row(b));
        self.unify_tails(&a, &b);
        self.apply_row(&a).union(&self.apply_row(&b))
    }

    /// Common type of two synthesized branches. Synthesis never widens, so
    /// this is unification only. Nothing is reported on failure.
    pub(crate) fn join_types(&mut self, a: &Type, b: &Type) -> Option<Type> {
        let (a, b) = (self.apply(a), self.apply(b));
        if a.is_sentinel() {
            return Some(b);
        }
        if !self.try_unify(&a, &b) {
            return None;
        }
        Some(self.apply(&a))
    }

    /// A fresh instance of `scheme`. Polymorphic functions get an open
    /// latent row so a call site may add effects.
    pub(crate) fn instantiate(&mut self, scheme: &Scheme) -> Type {
        if scheme.is_mono() {
            return scheme.ty.clone();
        }
        let ty = instantiate(scheme, &mut self.supply);
        open_latent_row(ty, &mut self.supply)
    }

    fn instantiate_global(&mut self, scheme: &Scheme) -> Type {
        let ty = instantiate(scheme, &mut self.supply);
        open_latent_row(ty, &mut self.supply)
    }

    /// Generalizes a local `let` against the current environment.
    fn generalize_local(&self, ty: &Type) -> Scheme {
        let (mut env_ftv, env_fev) = self.env.free_vars_under(&self.subst);
        env_ftv.extend(self.scope.types.values().copied());
        generalize(&self.apply(ty), &env_ftv, &env_fev)
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// `synth(e) -> (τ, ε)`
    pub(crate) fn synth(&mut self, expr: &Expr) -> (Type, EffectRow) {
        let (ty, effects) = self.synth_kind(expr);
        self.record(expr.id, &ty, &effects);
        (ty, effects)
    }

    /// `check(e, τ) -> ε`
    pub(crate) fn check(&mut self, expr: &Expr, expected: &Type) -> EffectRow {
        self.check_with(expr, expected, None)
    }

    /// Checking with the reason for the expected type, used in mismatch
    /// diagnostics.
    pub(crate) fn check_with(&mut self, expr: &Expr, expected: &Type, origin: Option<TypeSource>) -> EffectRow {
        let expected = self.apply(expected);
        let effects = match (&expr.kind, &expected) {
            (
                ExprKind::Lambda {
                    params,
                    return_type,
                    body,
                },
                Type::Function { .. },
            ) => self.check_lambda(expr, params, return_type.as_ref(), body, &expected),

            (
                ExprKind::If {
                    condition,
                    then_branch,
                    else_branch,
                },
                _,
            ) => {
                let mut effects = self.check_with(condition, &Type::Bool, Some(TypeSource::Condition));
                let then_effects = self.check_with(then_branch, &expected, origin.clone());
                effects = self.join(&effects, &then_effects);
                match else_branch {
                    Some(else_branch) => {
                        let else_effects = self.check_with(else_branch, &expected, origin);
                        effects = self.join(&effects, &else_effects);
                    }
                    None => {
                        self.solve(Constraint::Subtype(Type::Unit, expected.clone()), expr.span, origin);
                    }
                }
                effects
            }

            (ExprKind::Block(block), _) => self.check_block(block, &expected, origin),

            _ => {
                let (found, effects) = self.synth(expr);
                self.solve(Constraint::Subtype(found, expected), expr.span, origin);
                return effects;
            }
        };
        let ty = self.apply(&expected);
        self.record(expr.id, &ty, &effects);
        effects
    }

    // ========================================================================
    // Synthesis
    // ========================================================================

    fn synth_kind(&mut self, expr: &Expr) -> (Type, EffectRow) {
        let pure = EffectRow::pure;
        match &expr.kind {
            ExprKind::Integer(_) => (Type::Int, pure()),
            ExprKind::Float(_) => (Type::Float, pure()),
            ExprKind::String(_) => (Type::String, pure()),
            ExprKind::Bool(_) => (Type::Bool, pure()),
            ExprKind::Unit => (Type::Unit, pure()),
            ExprKind::Error => (Type::Error, pure()),

            ExprKind::Ident(name) => (self.synth_ident(name, expr.span), pure()),

            ExprKind::Tuple(elements) => {
                let mut effects = pure();
                let mut types = Vec::with_capacity(elements.len());
                for element in elements {
                    let (ty, e) = self.synth(element);
                    effects = self.join(&effects, &e);
                    types.push(ty);
                }
                (Type::Tuple(types), effects)
            }

            ExprKind::Array(elements) => self.synth_array(elements),
            ExprKind::Record(fields) => self.synth_record(fields),
            ExprKind::StructInit { name, fields } => self.synth_struct_init(&name.node, name.span, fields),
            ExprKind::Field { object, field } => self.synth_field(object, &field.node, field.span),
            ExprKind::Index { object, index } => self.synth_index(object, index),

            ExprKind::Binary { op, left, right } => self.synth_binary(*op, left, right),
            ExprKind::Unary { op, operand } => self.synth_unary(*op, operand, expr.span),

            ExprKind::Call { func, args } => self.synth_call(func, args, expr.span),

            ExprKind::Lambda {
                params,
                return_type,
                body,
            } => (self.synth_lambda(params, return_type.as_ref(), body), pure()),

            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.synth_if(condition, then_branch, else_branch.as_deref()),

            ExprKind::Block(block) => self.synth_block(block),

            ExprKind::Annotated { expr: inner, ty } => {
                let annotated = self.resolve(ty);
                let effects = self.check_with(inner, &annotated, Some(TypeSource::Annotation(ty.span())));
                (annotated, effects)
            }

            ExprKind::Handle {
                body,
                handlers,
                return_clause,
            } => self.synth_handle(body, handlers, return_clause.as_deref()),

            ExprKind::Ai { kind, fields } => self.synth_ai(*kind, fields, expr.span),
            ExprKind::AiInline(prompt) => self.synth_ai_inline(prompt),
            ExprKind::PromptCall { prompt, args } => self.synth_prompt_call(&prompt.node, prompt.span, args, expr.span),
        }
    }

    /// Lookup order: local scopes (including the current binding group),
    /// published functions, builtins and effect operations.
    fn synth_ident(&mut self, name: &SmolStr, span: Span) -> Type {
        let defs = self.defs;
        let published = self.published;
        if let Some(binding) = self.env.lookup(name) {
            let scheme = binding.scheme.clone();
            return self.instantiate(&scheme);
        }
        if let Some(scheme) = published.get(name) {
            return self.instantiate_global(scheme);
        }
        if defs.is_failed(name) {
            return Type::Unknown;
        }
        if let Some(global) = defs.globals.get(name) {
            return self.instantiate_global(&global.scheme);
        }
        if let Some(sig) = defs.functions.get(name) {
            // Collected but not yet checked. Only a fully declared signature
            // is usable, and only its own type parameters are quantified.
            let ty = sig.as_type();
            let inferred = ty
                .free_type_vars()
                .iter()
                .any(|v| !sig.type_params.iter().any(|(_, p)| p == v));
            if inferred || !sig.declared_return || !ty.free_effect_vars().is_empty() {
                return Type::Unknown;
            }
            let scheme = generalize(&ty, &IndexSet::new(), &IndexSet::new());
            return self.instantiate_global(&scheme);
        }

        let mut candidates: Vec<&str> = self.env.names().map(SmolStr::as_str).collect();
        candidates.extend(published.keys().map(SmolStr::as_str));
        candidates.extend(defs.globals.keys().map(SmolStr::as_str));
        candidates.extend(defs.functions.keys().map(SmolStr::as_str));
        let similar = match self.suggestion_distance() {
            Some(distance) => similar_names(name, candidates, distance),
            None => Vec::new(),
        };
        self.report(TypeError::UndefinedVariable {
            name: name.clone(),
            similar,
            span,
        });
        Type::Error
    }

    fn bind_params(&mut self, params: &[Param], expected: Option<&[Type]>) -> Vec<Type> {
        let mut types = Vec::with_capacity(params.len());
        for (i, param) in params.iter().enumerate() {
            let from_context = expected.and_then(|e| e.get(i)).cloned();
            let ty = match (&param.ty, from_context) {
                (Some(te), Some(expected)) => {
                    let annotated = self.resolve(te);
                    // Parameters are contravariant.
                    self.solve(
                        Constraint::Subtype(expected, annotated.clone()),
                        param.span,
                        Some(TypeSource::Annotation(te.span())),
                    );
                    annotated
                }
                (Some(te), None) => self.resolve(te),
                (None, Some(expected)) => expected,
                (None, None) => self.supply.fresh(),
            };
            self.env.define(param.name.node.clone(), Scheme::mono(ty.clone()));
            types.push(ty);
        }
        types
    }

    fn synth_lambda(&mut self, params: &[Param], return_type: Option<&TypeExpr>, body: &Expr) -> Type {
        self.env.push_scope();
        let params = self.bind_params(params, None);
        let (ret, effects) = match return_type {
            Some(te) => {
                let ret = self.resolve(te);
                let effects = self.check_with(body, &ret, Some(TypeSource::Return(te.span())));
                (ret, effects)
            }
            None => self.synth(body),
        };
        self.env.pop_scope();

        let effects = self.apply_row(&effects);
        let latent = if effects.is_closed() {
            effects.with_tail(Some(self.supply.fresh_effect_var()))
        } else {
            effects
        };
        Type::function_with(params, ret, latent)
    }

    fn check_lambda(
        &mut self,
        expr: &Expr,
        params: &[Param],
        return_type: Option<&TypeExpr>,
        body: &Expr,
        expected: &Type,
    ) -> EffectRow {
        let Type::Function {
            params: expected_params,
            ret: expected_ret,
            effects: expected_effects,
        } = expected
        else {
            return EffectRow::pure();
        };

        if params.len() != expected_params.len() {
            self.report(TypeError::ArityMismatch {
                expected: expected_params.len(),
                found: params.len(),
                span: expr.span,
            });
            self.synth_lambda(params, return_type, body);
            return EffectRow::pure();
        }

        self.env.push_scope();
        self.bind_params(params, Some(expected_params));
        let body_effects = match return_type {
            Some(te) => {
                let ret = self.resolve(te);
                let effects = self.check_with(body, &ret, Some(TypeSource::Return(te.span())));
                self.solve(
                    Constraint::Subtype(ret, (**expected_ret).clone()),
                    te.span(),
                    Some(TypeSource::Annotation(te.span())),
                );
                effects
            }
            None => self.check(body, expected_ret),
        };
        self.env.pop_scope();

        self.solve(
            Constraint::EffectSubset(body_effects, expected_effects.clone()),
            body.span,
            None,
        );
        EffectRow::pure()
    }

    fn synth_call(&mut self, func: &Expr, args: &[Expr], span: Span) -> (Type, EffectRow) {
        let (callee, mut effects) = self.synth(func);
        let callee = self.apply(&callee);

        let (params, ret, latent) = match callee {
            Type::Function {
                params,
                ret,
                effects: latent,
            } => (params, *ret, latent),
            Type::Var(_) => {
                let params: Vec<Type> = args.iter().map(|_| self.supply.fresh()).collect();
                let ret = self.supply.fresh();
                let latent = EffectRow::var(self.supply.fresh_effect_var());
                let shape = Type::function_with(params.clone(), ret.clone(), latent.clone());
                self.solve(Constraint::Equal(callee, shape), func.span, None);
                (params, ret, latent)
            }
            sentinel if sentinel.is_sentinel() => {
                effects = self.synth_all(args, effects);
                return (sentinel, effects);
            }
            other => {
                self.report(TypeError::StructuralMismatch {
                    detail: format!("`{}` is not a function", other),
                    span: func.span,
                });
                effects = self.synth_all(args, effects);
                return (Type::Error, effects);
            }
        };

        if params.len() != args.len() {
            self.report(TypeError::ArityMismatch {
                expected: params.len(),
                found: args.len(),
                span,
            });
            effects = self.synth_all(args, effects);
            return (Type::Error, effects);
        }

        for (position, (arg, param)) in args.iter().zip(&params).enumerate() {
            let arg_effects = self.check_with(arg, param, Some(TypeSource::Argument { position }));
            effects = self.join(&effects, &arg_effects);
        }
        effects = self.join(&effects, &latent);
        (self.apply(&ret), effects)
    }

    /// Synthesizes expressions for their effects only.
    fn synth_all(&mut self, exprs: &[Expr], mut effects: EffectRow) -> EffectRow {
        for expr in exprs {
            let (_, e) = self.synth(expr);
            effects = self.join(&effects, &e);
        }
        effects
    }

    fn synth_if(
        &mut self,
        condition: &Expr,
        then_branch: &Expr,
        else_branch: Option<&Expr>,
    ) -> (Type, EffectRow) {
        let mut effects = self.check_with(condition, &Type::Bool, Some(TypeSource::Condition));
        let (then_ty, then_effects) = self.synth(then_branch);
        effects = self.join(&effects, &then_effects);

        let Some(else_branch) = else_branch else {
            self.solve(Constraint::Subtype(then_ty, Type::Unit), then_branch.span, None);
            return (Type::Unit, effects);
        };

        let (else_ty, else_effects) = self.synth(else_branch);
        effects = self.join(&effects, &else_effects);
        match self.join_types(&then_ty, &else_ty) {
            Some(ty) => (ty, effects),
            None => {
                let expected = self.apply(&then_ty);
                let found = self.apply(&else_ty);
                self.report(TypeError::TypeMismatch {
                    expected,
                    found,
                    origin: Some(TypeSource::ConditionalBranch(then_branch.span)),
                    span: else_branch.span,
                });
                (Type::Error, effects)
            }
        }
    }

    fn synth_block(&mut self, block: &Block) -> (Type, EffectRow) {
        self.env.push_scope();
        let mut effects = self.stmts(&block.stmts);
        let ty = match &block.result {
            Some(result) => {
                let (ty, e) = self.synth(result);
                effects = self.join(&effects, &e);
                ty
            }
            None => Type::Unit,
        };
        self.env.pop_scope();
        (ty, effects)
    }

    fn check_block(&mut self, block: &Block, expected: &Type, origin: Option<TypeSource>) -> EffectRow {
        self.env.push_scope();
        let mut effects = self.stmts(&block.stmts);
        match &block.result {
            Some(result) => {
                let e = self.check_with(result, expected, origin);
                effects = self.join(&effects, &e);
            }
            None => {
                self.solve(Constraint::Subtype(Type::Unit, expected.clone()), block.span, origin);
            }
        }
        self.env.pop_scope();
        effects
    }

    fn synth_array(&mut self, elements: &[Expr]) -> (Type, EffectRow) {
        let mut effects = EffectRow::pure();
        let mut element_ty: Option<Type> = None;
        for element in elements {
            let (ty, e) = self.synth(element);
            effects = self.join(&effects, &e);
            element_ty = match element_ty {
                None => Some(ty),
                Some(current) => match self.join_types(&current, &ty) {
                    Some(joined) => Some(joined),
                    None => {
                        let expected = self.apply(&current);
                        let found = self.apply(&ty);
                        self.report(TypeError::TypeMismatch {
                            expected,
                            found,
                            origin: None,
                            span: element.span,
                        });
                        Some(current)
                    }
                },
            };
        }
        let element_ty = element_ty.unwrap_or_else(|| self.supply.fresh());
        (Type::array(element_ty), effects)
    }

    /// Checks field initializers for duplicates, reporting each repeat.
    /// Returns the initializers to use, first occurrence wins.
    fn unique_fields<'f>(&mut self, fields: &'f [FieldInit]) -> Vec<&'f FieldInit> {
        let mut seen: IndexMap<&SmolStr, Span> = IndexMap::new();
        let mut unique = Vec::with_capacity(fields.len());
        for field in fields {
            if let Some(previous) = seen.get(&field.name.node) {
                self.report(TypeError::DuplicateDefinition {
                    name: field.name.node.clone(),
                    kind: "field",
                    previous: *previous,
                    span: field.name.span,
                });
                continue;
            }
            seen.insert(&field.name.node, field.name.span);
            unique.push(field);
        }
        unique
    }

    fn synth_record(&mut self, fields: &[FieldInit]) -> (Type, EffectRow) {
        let mut effects = EffectRow::pure();
        let mut record = RecordType::new();
        for field in self.unique_fields(fields) {
            let (ty, e) = self.synth(&field.value);
            effects = self.join(&effects, &e);
            record.insert(field.name.node.clone(), ty);
        }
        (Type::Record(record), effects)
    }

    fn synth_struct_init(&mut self, name: &SmolStr, span: Span, fields: &[FieldInit]) -> (Type, EffectRow) {
        let defs = self.defs;
        let Some(id) = defs.types.lookup(name) else {
            if !defs.is_failed(name) {
                let similar = self.similar(name, defs.types.iter().map(|(_, d)| d.name.as_str()));
                self.report(TypeError::UndefinedType {
                    name: name.clone(),
                    similar,
                    span,
                });
            }
            let effects = fields.iter().map(|f| &f.value).fold(EffectRow::pure(), |acc, value| {
                let (_, e) = self.synth(value);
                self.join(&acc, &e)
            });
            return (Type::Unknown, effects);
        };

        let params = defs.types.get(id).map_or(0, |def| def.params.len());
        let args: Vec<Type> = (0..params).map(|_| self.supply.fresh()).collect();
        let declared = defs.types.unfold(id, &args).unwrap_or_default();
        let named = Type::Named {
            id,
            name: name.clone(),
            args,
        };

        let mut effects = EffectRow::pure();
        let unique = self.unique_fields(fields);
        for field in &unique {
            let e = match declared.get(&field.name.node) {
                Some(expected) => self.check(&field.value, expected),
                None => {
                    self.report(TypeError::UndefinedField {
                        ty: named.clone(),
                        field: field.name.node.clone(),
                        span: field.name.span,
                    });
                    self.synth(&field.value).1
                }
            };
            effects = self.join(&effects, &e);
        }

        let missing: Vec<&str> = declared
            .labels()
            .filter(|label| !unique.iter().any(|f| &f.name.node == *label))
            .map(SmolStr::as_str)
            .collect();
        if !missing.is_empty() {
            self.report(TypeError::StructuralMismatch {
                detail: format!("missing field(s) `{}` in `{}`", missing.join("`, `"), name),
                span,
            });
        }
        (self.apply(&named), effects)
    }

    fn synth_field(&mut self, object: &Expr, field: &SmolStr, span: Span) -> (Type, EffectRow) {
        let (object_ty, effects) = self.synth(object);
        let object_ty = self.apply(&object_ty);
        let ty = match &object_ty {
            sentinel if sentinel.is_sentinel() => sentinel.clone(),
            Type::Var(_) => {
                let field_ty = self.supply.fresh();
                let shape = Type::record([(field.clone(), field_ty.clone())]);
                self.solve(Constraint::Equal(object_ty.clone(), shape), object.span, None);
                field_ty
            }
            Type::Tuple(elements) => match field.parse::<usize>().ok().and_then(|i| elements.get(i)) {
                Some(element) => element.clone(),
                None => self.undefined_field(&object_ty, field, span),
            },
            Type::Record(record) => match record.get(field) {
                Some(ty) => ty.clone(),
                None => self.undefined_field(&object_ty, field, span),
            },
            Type::Named { id, args, .. } => match self.defs.types.unfold(*id, args).and_then(|r| r.get(field).cloned()) {
                Some(ty) => ty,
                None => self.undefined_field(&object_ty, field, span),
            },
            _ => self.undefined_field(&object_ty, field, span),
        };
        (ty, effects)
    }

    fn undefined_field(&mut self, ty: &Type, field: &SmolStr, span: Span) -> Type {
        self.report(TypeError::UndefinedField {
            ty: ty.clone(),
            field: field.clone(),
            span,
        });
        Type::Error
    }

    fn synth_index(&mut self, object: &Expr, index: &Expr) -> (Type, EffectRow) {
        let (object_ty, object_effects) = self.synth(object);
        let index_effects = self.check(index, &Type::Int);
        let effects = self.join(&object_effects, &index_effects);

        let ty = match self.apply(&object_ty) {
            Type::Array(element) => *element,
            sentinel if sentinel.is_sentinel() => sentinel,
            var @ Type::Var(_) => {
                let element = self.supply.fresh();
                self.solve(Constraint::Equal(var, Type::array(element.clone())), object.span, None);
                element
            }
            other => {
                self.report(TypeError::StructuralMismatch {
                    detail: format!("cannot index into a value of type `{}`", other),
                    span: object.span,
                });
                Type::Error
            }
        };
        (ty, effects)
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn stmts(&mut self, stmts: &[Stmt]) -> EffectRow {
        let mut effects = EffectRow::pure();
        for stmt in stmts {
            let e = self.stmt(stmt);
            effects = self.join(&effects, &e);
        }
        effects
    }

    fn stmt(&mut self, stmt: &Stmt) -> EffectRow {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.synth(expr).1,

            StmtKind::Let {
                id,
                name,
                mutable,
                ty,
                value,
            } => {
                let (value_ty, effects) = match ty {
                    Some(te) => {
                        let annotated = self.resolve(te);
                        let effects = self.check_with(value, &annotated, Some(TypeSource::Annotation(te.span())));
                        (annotated, effects)
                    }
                    None => self.synth(value),
                };

                // Value restriction
                let scheme = if !*mutable && is_syntactic_value(value) {
                    self.generalize_local(&value_ty)
                } else {
                    Scheme::mono(self.apply(&value_ty))
                };
                self.let_schemes.insert(*id, scheme.clone());
                if *mutable {
                    self.env.define_mut(name.node.clone(), scheme);
                } else {
                    self.env.define(name.node.clone(), scheme);
                }
                effects
            }

            StmtKind::Assign { target, value } => self.assign(target, value, stmt.span),
        }
    }

    fn assign(&mut self, target: &Expr, value: &Expr, span: Span) -> EffectRow {
        match &target.kind {
            ExprKind::Ident(name) => {
                let assignable = match self.env.lookup(name) {
                    Some(binding) => binding.mutable,
                    None => !(self.published.contains_key(name)
                        || self.defs.globals.contains_key(name)
                        || self.defs.functions.contains_key(name)),
                };
                if !assignable {
                    self.report(TypeError::AssignToImmutable {
                        name: name.clone(),
                        span: target.span,
                    });
                }
                self.assign_to(target, value)
            }

            ExprKind::Unary {
                op: UnaryOp::Deref,
                operand,
            } => {
                let (reference, mut effects) = self.synth(operand);
                let inner = match self.apply(&reference) {
                    Type::Reference { mutable: true, inner } => *inner,
                    Type::Reference { mutable: false, inner } => {
                        self.report(TypeError::AssignToImmutable {
                            name: describe_place(operand),
                            span: target.span,
                        });
                        *inner
                    }
                    var @ Type::Var(_) => {
                        let inner = self.supply.fresh();
                        self.solve(
                            Constraint::Equal(var, Type::reference(true, inner.clone())),
                            operand.span,
                            None,
                        );
                        inner
                    }
                    sentinel if sentinel.is_sentinel() => sentinel,
                    other => {
                        self.report(TypeError::StructuralMismatch {
                            detail: format!("cannot assign through `{}`, which is not a reference", other),
                            span: operand.span,
                        });
                        Type::Error
                    }
                };
                self.record(target.id, &inner, &effects);
                let value_effects = self.check_with(value, &inner, Some(TypeSource::Assignment(target.span)));
                effects = self.join(&effects, &value_effects);
                effects
            }

            ExprKind::Field { .. } | ExprKind::Index { .. } => {
                if let Some((root, root_span)) = place_root(target) {
                    if self.env.lookup(root).is_some_and(|b| !b.mutable) {
                        self.report(TypeError::AssignToImmutable {
                            name: root.clone(),
                            span: root_span,
                        });
                    }
                }
                self.assign_to(target, value)
            }

            _ => {
                self.report(TypeError::StructuralMismatch {
                    detail: "invalid assignment target".to_string(),
                    span,
                });
                let (_, target_effects) = self.synth(target);
                let (_, value_effects) = self.synth(value);
                self.join(&target_effects, &value_effects)
            }
        }
    }

    fn assign_to(&mut self, target: &Expr, value: &Expr) -> EffectRow {
        let (target_ty, target_effects) = self.synth(target);
        let value_effects = self.check_with(value, &target_ty, Some(TypeSource::Assignment(target.span)));
        self.join(&target_effects, &value_effects)
    }
}

/// The variable a field/index place is rooted at.
fn place_root(expr: &Expr) -> Option<(&SmolStr, Span)> {
    match &expr.kind {
        ExprKind::Ident(name) => Some((name, expr.span)),
        ExprKind::Field { object, .. } | ExprKind::Index { object, .. } => place_root(object),
        _ => None,
    }
}

fn describe_place(expr: &Expr) -> SmolStr {
    match place_root(expr) {
        Some((name, _)) => name.clone(),
        None => SmolStr::new("reference"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effect;
    use crate::error::DiagnosticKind;
    use pretty_assertions::assert_eq;
    use vela_ast::build::*;
    use vela_ast::BinaryOp;

    struct Run {
        ty: Type,
        effects: EffectRow,
        errors: Vec<TypeError>,
    }

    fn run(expr: &Expr) -> Run {
        let defs = Definitions::with_builtins();
        let published = IndexMap::new();
        let config = CheckerConfig::default();
        let mut infer = Infer::new(&defs, &published, &config);
        let (ty, effects) = infer.synth(expr);
        let ty = infer.apply(&ty);
        let effects = infer.apply_row(&effects);
        Run {
            ty,
            effects,
            errors: infer.errors,
        }
    }

    fn kinds(errors: &[TypeError]) -> Vec<DiagnosticKind> {
        errors.iter().map(TypeError::kind).collect()
    }

    #[test]
    fn test_literals_are_pure() {
        let r = run(&tuple(vec![int(1), float(2.0), string("s"), boolean(true), unit()]));
        assert_eq!(r.ty.to_string(), "(Int, Float, String, Bool, Unit)");
        assert!(r.effects.is_pure());
    }

    #[test]
    fn test_call_collects_latent_effects() {
        let r = run(&call_named("print", vec![int(1)]));
        assert_eq!(r.ty, Type::Unit);
        assert_eq!(r.effects.closed_part(), EffectRow::single(Effect::Io));
        assert!(r.errors.is_empty());
    }

    #[test]
    fn test_arity_mismatch() {
        let r = run(&call_named("fetch", vec![]));
        assert_eq!(kinds(&r.errors), vec![DiagnosticKind::ArityMismatch]);
        assert_eq!(r.ty, Type::Error);
    }

    #[test]
    fn test_argument_mismatch_names_position() {
        let r = run(&call_named("sleep", vec![string("soon")]));
        match &r.errors[..] {
            [TypeError::TypeMismatch {
                expected,
                found,
                origin,
                ..
            }] => {
                assert_eq!((expected, found), (&Type::Int, &Type::String));
                assert_eq!(origin, &Some(TypeSource::Argument { position: 0 }));
            }
            other => panic!("unexpected errors: {other:?}"),
        }
    }

    #[test]
    fn test_calling_a_non_function() {
        let r = run(&call(int(3), vec![int(1)]));
        assert_eq!(kinds(&r.errors), vec![DiagnosticKind::StructuralMismatch]);
        assert_eq!(r.ty, Type::Error);
    }

    #[test]
    fn test_lambda_checked_against_expected_type() {
        // (fn(x) { x + 1 } : Int -> Int)
        let e = annotated(
            lambda(vec![param("x")], binary(BinaryOp::Add, var("x"), int(1))),
            fn_ty(vec![ty("Int")], ty("Int"), None),
        );
        let r = run(&e);
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        assert_eq!(r.ty.to_string(), "Int -> Int");
    }

    #[test]
    fn test_lambda_effect_must_fit_expected_row() {
        let e = annotated(
            lambda(vec![param("x")], call_named("print", vec![var("x")])),
            fn_ty(vec![ty("Int")], ty("Unit"), None),
        );
        let r = run(&e);
        assert_eq!(kinds(&r.errors), vec![DiagnosticKind::EffectMismatch]);
    }

    #[test]
    fn test_lambda_arity_against_expected() {
        let e = annotated(
            lambda(vec![param("x"), param("y")], var("x")),
            fn_ty(vec![ty("Int")], ty("Int"), None),
        );
        let r = run(&e);
        assert_eq!(kinds(&r.errors), vec![DiagnosticKind::ArityMismatch]);
    }

    #[test]
    fn test_let_generalizes_values_only() {
        let id = lambda(vec![param("x")], var("x"));
        let e = block(
            vec![let_("id", id)],
            Some(tuple(vec![
                call_named("id", vec![int(1)]),
                call_named("id", vec![string("s")]),
            ])),
        );
        let r = run(&e);
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        assert_eq!(r.ty.to_string(), "(Int, String)");
    }

    #[test]
    fn test_mutable_let_is_monomorphic() {
        let e = block(
            vec![let_mut("id", lambda(vec![param("x")], var("x")))],
            Some(tuple(vec![
                call_named("id", vec![int(1)]),
                call_named("id", vec![string("s")]),
            ])),
        );
        let r = run(&e);
        assert_eq!(kinds(&r.errors), vec![DiagnosticKind::TypeMismatch]);
    }

    #[test]
    fn test_assignment_to_immutable() {
        let e = block(vec![let_("x", int(1)), assign(var("x"), int(2))], None);
        let r = run(&e);
        assert_eq!(kinds(&r.errors), vec![DiagnosticKind::AssignToImmutable]);

        let e = block(vec![let_mut("x", int(1)), assign(var("x"), int(2))], Some(var("x")));
        let r = run(&e);
        assert!(r.errors.is_empty());
        assert_eq!(r.ty, Type::Int);
    }

    #[test]
    fn test_assignment_through_references() {
        use vela_ast::UnaryOp;
        let e = block(
            vec![
                let_mut("x", int(1)),
                let_("r", unary(UnaryOp::RefMut, var("x"))),
                assign(unary(UnaryOp::Deref, var("r")), int(5)),
            ],
            Some(var("x")),
        );
        assert!(run(&e).errors.is_empty());

        let e = block(
            vec![
                let_("x", int(1)),
                let_("r", unary(UnaryOp::Ref, var("x"))),
                assign(unary(UnaryOp::Deref, var("r")), int(5)),
            ],
            None,
        );
        assert_eq!(kinds(&run(&e).errors), vec![DiagnosticKind::AssignToImmutable]);
    }

    #[test]
    fn test_if_branches_do_not_widen() {
        let r = run(&if_else(boolean(true), int(1), float(2.0)));
        match &r.errors[..] {
            [TypeError::TypeMismatch { expected, found, .. }] => {
                assert_eq!((expected, found), (&Type::Int, &Type::Float));
            }
            other => panic!("unexpected errors: {other:?}"),
        }
        assert_eq!(r.ty, Type::Error);

        // An expected type still admits the widening.
        let r = run(&annotated(if_else(boolean(true), int(1), float(2.0)), ty("Float")));
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        assert_eq!(r.ty, Type::Float);
    }

    #[test]
    fn test_if_without_else_is_unit() {
        let r = run(&if_then(boolean(true), int(1)));
        assert_eq!(kinds(&r.errors), vec![DiagnosticKind::TypeMismatch]);
        assert_eq!(r.ty, Type::Unit);
    }

    #[test]
    fn test_condition_must_be_bool() {
        let r = run(&if_else(int(1), int(1), int(2)));
        match &r.errors[..] {
            [TypeError::TypeMismatch { origin, .. }] => assert_eq!(origin, &Some(TypeSource::Condition)),
            other => panic!("unexpected errors: {other:?}"),
        }
    }

    #[test]
    fn test_records_and_fields() {
        let e = field(record(vec![("x", int(1)), ("y", string("s"))]), "y");
        let r = run(&e);
        assert_eq!(r.ty, Type::String);

        let r = run(&field(record(vec![("x", int(1))]), "z"));
        assert_eq!(kinds(&r.errors), vec![DiagnosticKind::UndefinedField]);
        assert_eq!(r.ty, Type::Error);

        let r = run(&record(vec![("x", int(1)), ("x", int(2))]));
        assert_eq!(kinds(&r.errors), vec![DiagnosticKind::DuplicateDefinition]);
    }

    #[test]
    fn test_field_of_unknown_object_shapes_a_record() {
        let e = lambda(vec![param("p")], field(var("p"), "name"));
        let r = run(&e);
        assert!(r.errors.is_empty());
        match r.ty {
            Type::Function { params, ret, .. } => {
                assert_eq!(params[0], Type::record([("name", (*ret).clone())]));
            }
            other => panic!("expected a function, got {other}"),
        }
    }

    #[test]
    fn test_arrays() {
        let r = run(&array(vec![int(1), float(2.5)]));
        assert_eq!(kinds(&r.errors), vec![DiagnosticKind::TypeMismatch]);
        assert_eq!(r.ty.to_string(), "[Int]");

        let r = run(&array(vec![int(1), string("x")]));
        assert_eq!(kinds(&r.errors), vec![DiagnosticKind::TypeMismatch]);

        let r = run(&index(array(vec![boolean(true)]), int(0)));
        assert_eq!(r.ty, Type::Bool);

        let r = run(&index(int(4), int(0)));
        assert_eq!(kinds(&r.errors), vec![DiagnosticKind::StructuralMismatch]);
    }

    #[test]
    fn test_undefined_variable_suggests() {
        let e = block(vec![let_("count", int(0))], Some(var("conut")));
        let r = run(&e);
        match &r.errors[..] {
            [TypeError::UndefinedVariable { similar, .. }] => assert_eq!(similar, &vec![SmolStr::new("count")]),
            other => panic!("unexpected errors: {other:?}"),
        }
        assert_eq!(r.ty, Type::Error);
    }

    #[test]
    fn test_effects_accumulate_in_order() {
        let e = block(
            vec![
                expr_stmt(call_named("fetch", vec![string("u")])),
                expr_stmt(call_named("print", vec![int(1)])),
            ],
            None,
        );
        let r = run(&e);
        assert_eq!(r.effects.labels(), vec!["Network", "IO"]);
    }

    #[test]
    fn test_node_types_are_recorded() {
        let literal = int(7);
        let id = literal.id;
        let e = block(vec![let_("x", literal)], Some(var("x")));
        let defs = Definitions::with_builtins();
        let published = IndexMap::new();
        let config = CheckerConfig::default();
        let mut infer = Infer::new(&defs, &published, &config);
        infer.synth(&e);
        let output = infer.finish();
        assert_eq!(output.node_types.get(id).map(|n| &n.ty), Some(&Type::Int));
        assert!(output.node_types.get(e.id).is_some());
    }
}
