//! Pass 1: collection of every top-level declaration into [`Definitions`].
//!
//! Order matters: struct names before struct fields (so fields may refer to
//! any struct), effects before functions, models before prompts. A
//! declaration whose signature cannot be resolved is reported, recorded as
//! failed and left out of Pass 2.

use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;
use tracing::debug;
use vela_ast::{EffectDecl, FunctionDecl, Item, ModelDecl, Program, PromptDecl, Span, StructDecl, TypeExpr};

use crate::config::CheckerConfig;
use crate::defs::{Definitions, EffectSig, FunctionSig, Global, GlobalKind, ModelConfig, OperationSig, PromptSig};
use crate::effect::{EffectRow, EffectVar};
use crate::env::similar_names;
use crate::error::TypeError;
use crate::infer::Infer;
use crate::resolve::{Resolver, TypeScope};
use crate::scheme::generalize;
use crate::subst::VarSupply;
use crate::ty::{RecordType, Type, TypeDefId, TypeVar};

/// Names the user cannot declare a struct under.
const RESERVED_TYPES: [&str; 7] = ["Int", "Float", "String", "Bool", "Unit", "AI", "Effect"];

/// Output of Pass 1.
#[derive(Debug)]
pub(crate) struct Collected {
    pub defs: Definitions,
    /// Diagnostics tagged with the index of the item that caused them
    pub errors: Vec<(usize, TypeError)>,
    /// Indices of the function items that take part in Pass 2
    pub functions: Vec<usize>,
}

pub(crate) fn collect(program: &Program, config: &CheckerConfig) -> Collected {
    let defs = Definitions::with_builtins();
    let supply = defs.supply();
    let mut collector = Collector {
        defs,
        supply,
        config,
        errors: Vec::new(),
    };

    let structs = collector.struct_names(program);
    let effects = collector.effect_names(program);
    collector.struct_fields(&structs);
    collector.effect_operations(&effects);
    collector.models(program);
    collector.prompts(program);
    let functions = collector.functions(program);

    let Collector {
        mut defs,
        supply,
        errors,
        ..
    } = collector;
    defs.advance(&supply);
    debug!(
        types = defs.types.len(),
        effects = defs.effects.len(),
        functions = functions.len(),
        errors = errors.len(),
        "collected definitions"
    );
    Collected {
        defs,
        errors,
        functions,
    }
}

/// Resolves a function's written signature. Type parameters become fresh
/// variables, missing annotations become fresh variables and a missing
/// effect clause becomes an open row. Returns the scope the body is
/// checked in.
pub(crate) fn function_signature(
    defs: &Definitions,
    supply: &mut VarSupply,
    config: &CheckerConfig,
    decl: &FunctionDecl,
    errors: &mut Vec<TypeError>,
) -> (FunctionSig, TypeScope) {
    let mut scope = TypeScope::default();
    let type_params: Vec<(SmolStr, TypeVar)> = decl
        .type_params
        .iter()
        .map(|p| {
            let var = supply.fresh_type_var();
            scope.types.insert(p.node.clone(), var);
            (p.node.clone(), var)
        })
        .collect();

    let mut resolver = Resolver {
        defs,
        scope: &mut scope,
        supply,
        errors,
        suggestion_distance: config.suggest_similar_names.then_some(config.max_suggestion_distance),
    };
    let params = decl
        .params
        .iter()
        .map(|p| {
            let ty = match &p.ty {
                Some(te) => resolver.resolve(te),
                None => resolver.supply.fresh(),
            };
            (p.name.node.clone(), ty)
        })
        .collect();
    let ret = match &decl.return_type {
        Some(te) => resolver.resolve(te),
        None => resolver.supply.fresh(),
    };
    let effects = match (&decl.effects, decl.is_pure) {
        (_, true) => EffectRow::pure(),
        (Some(annotation), false) => resolver.resolve_effects(annotation),
        (None, false) => EffectRow::var(resolver.supply.fresh_effect_var()),
    };

    let sig = FunctionSig {
        name: decl.name.node.clone(),
        type_params,
        params,
        ret,
        effects,
        declared_effects: decl.effects.is_some(),
        declared_return: decl.return_type.is_some(),
        is_pure: decl.is_pure,
        span: decl.span,
    };
    (sig, scope)
}

struct Collector<'c> {
    defs: Definitions,
    supply: VarSupply,
    config: &'c CheckerConfig,
    errors: Vec<(usize, TypeError)>,
}

struct CollectedStruct<'p> {
    item: usize,
    id: TypeDefId,
    decl: &'p StructDecl,
    scope: TypeScope,
}

struct CollectedEffect<'p> {
    item: usize,
    decl: &'p EffectDecl,
    scope: TypeScope,
}

impl Collector<'_> {
    fn report(&mut self, item: usize, error: TypeError) {
        self.errors.push((item, error));
    }

    fn duplicate(&mut self, item: usize, name: &SmolStr, kind: &'static str, previous: Span, span: Span) {
        self.report(
            item,
            TypeError::DuplicateDefinition {
                name: name.clone(),
                kind,
                previous,
                span,
            },
        );
    }

    fn suggestion_distance(&self) -> Option<usize> {
        self.config
            .suggest_similar_names
            .then_some(self.config.max_suggestion_distance)
    }

    /// Resolves `te` in `scope`. Returns the type and whether it resolved
    /// without errors.
    fn resolve(&mut self, item: usize, scope: &mut TypeScope, te: &TypeExpr) -> (Type, bool) {
        let mut errors = Vec::new();
        let suggestion_distance = self.suggestion_distance();
        let ty = Resolver {
            defs: &self.defs,
            scope,
            supply: &mut self.supply,
            errors: &mut errors,
            suggestion_distance,
        }
        .resolve(te);
        let ok = errors.is_empty();
        self.errors.extend(errors.into_iter().map(|e| (item, e)));
        (ty, ok)
    }

    fn fresh_params(&mut self, names: &[vela_ast::Ident]) -> (Vec<TypeVar>, TypeScope) {
        let mut scope = TypeScope::default();
        let vars = names
            .iter()
            .map(|p| {
                let var = self.supply.fresh_type_var();
                scope.types.insert(p.node.clone(), var);
                var
            })
            .collect();
        (vars, scope)
    }

    // ------------------------------------------------------------------------
    // Structs
    // ------------------------------------------------------------------------

    fn struct_names<'p>(&mut self, program: &'p Program) -> Vec<CollectedStruct<'p>> {
        let mut collected = Vec::new();
        for (item, decl) in program.items.iter().enumerate() {
            let Item::Struct(decl) = decl else { continue };
            let name = &decl.name.node;
            if RESERVED_TYPES.contains(&name.as_str()) {
                self.duplicate(item, name, "type", Span::dummy(), decl.name.span);
                continue;
            }
            if let Some(previous) = self.defs.types.lookup(name).and_then(|id| self.defs.types.get(id)) {
                let previous = previous.span;
                self.duplicate(item, name, "struct", previous, decl.name.span);
                continue;
            }
            let (params, scope) = self.fresh_params(&decl.type_params);
            let id = self.defs.types.declare(name.clone(), params, decl.name.span);
            collected.push(CollectedStruct { item, id, decl, scope });
        }
        collected
    }

    fn struct_fields(&mut self, structs: &[CollectedStruct<'_>]) {
        for s in structs {
            let mut scope = s.scope.clone();
            let mut fields = RecordType::new();
            let mut seen: IndexMap<&SmolStr, Span> = IndexMap::new();
            for field in &s.decl.fields {
                let (ty, ok) = self.resolve(s.item, &mut scope, &field.ty);
                if let Some(previous) = seen.get(&field.name.node) {
                    let previous = *previous;
                    self.duplicate(s.item, &field.name.node, "field", previous, field.name.span);
                    continue;
                }
                seen.insert(&field.name.node, field.name.span);
                fields.insert(field.name.node.clone(), if ok { ty } else { Type::Unknown });
            }
            self.defs.types.set_fields(s.id, fields);
        }
    }

    // ------------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------------

    fn effect_names<'p>(&mut self, program: &'p Program) -> Vec<CollectedEffect<'p>> {
        let mut collected = Vec::new();
        let mut spans: IndexMap<SmolStr, Span> = IndexMap::new();
        for (item, decl) in program.items.iter().enumerate() {
            let Item::Effect(decl) = decl else { continue };
            let name = &decl.name.node;
            if self.defs.effects.get(name).is_some_and(|sig| sig.builtin) {
                self.duplicate(item, name, "effect", Span::dummy(), decl.name.span);
                continue;
            }
            if let Some(previous) = spans.get(name) {
                let previous = *previous;
                self.duplicate(item, name, "effect", previous, decl.name.span);
                continue;
            }
            spans.insert(name.clone(), decl.name.span);

            let (params, scope) = self.fresh_params(&decl.type_params);
            self.defs.effects.insert(
                name.clone(),
                EffectSig {
                    name: name.clone(),
                    params,
                    operations: IndexMap::new(),
                    builtin: false,
                },
            );
            collected.push(CollectedEffect { item, decl, scope });
        }
        collected
    }

    fn effect_operations(&mut self, effects: &[CollectedEffect<'_>]) {
        // Operations declared by user effects, with their spans.
        let mut user_ops: IndexMap<SmolStr, Span> = IndexMap::new();

        for e in effects {
            let mut scope = e.scope.clone();
            let mut operations: IndexMap<SmolStr, OperationSig> = IndexMap::new();
            let mut spans: IndexMap<&SmolStr, Span> = IndexMap::new();
            for op in &e.decl.operations {
                let params: Vec<Type> = op
                    .params
                    .iter()
                    .map(|p| match &p.ty {
                        Some(te) => self.resolve(e.item, &mut scope, te).0,
                        None => self.supply.fresh(),
                    })
                    .collect();
                let (ret, _) = self.resolve(e.item, &mut scope, &op.return_type);

                if let Some(previous) = spans.get(&op.name.node) {
                    let previous = *previous;
                    self.duplicate(e.item, &op.name.node, "operation", previous, op.name.span);
                    continue;
                }
                spans.insert(&op.name.node, op.name.span);
                operations.insert(
                    op.name.node.clone(),
                    OperationSig {
                        name: op.name.node.clone(),
                        params,
                        ret,
                    },
                );
            }

            let Some(sig) = self.defs.effects.get_mut(&e.decl.name.node) else {
                continue;
            };
            sig.operations = operations;
            let effect = sig.generic_effect();
            let callable: Vec<(SmolStr, Type)> = sig
                .operations
                .values()
                .map(|op| {
                    let ty = Type::function_with(op.params.clone(), op.ret.clone(), EffectRow::single(effect.clone()));
                    (op.name.clone(), ty)
                })
                .collect();

            for (name, ty) in callable {
                let span = spans.get(&name).copied().unwrap_or_default();
                if let Some(previous) = user_ops.get(&name) {
                    let previous = *previous;
                    self.duplicate(e.item, &name, "operation", previous, span);
                    continue;
                }
                user_ops.insert(name.clone(), span);
                let scheme = generalize(&ty, &IndexSet::new(), &IndexSet::<EffectVar>::new());
                self.defs.globals.insert(
                    name,
                    Global {
                        scheme,
                        kind: GlobalKind::Operation,
                    },
                );
            }
        }
    }

    // ------------------------------------------------------------------------
    // Models and prompts
    // ------------------------------------------------------------------------

    fn models(&mut self, program: &Program) {
        for (item, decl) in program.items.iter().enumerate() {
            let Item::Model(decl) = decl else { continue };
            if let Some(previous) = self.defs.models.get(&decl.name.node) {
                let previous = previous.span;
                self.duplicate(item, &decl.name.node, "model", previous, decl.name.span);
                continue;
            }
            let config = self.model_config(item, decl);
            self.defs.models.insert(decl.name.node.clone(), config);
        }
    }

    /// Model fields are ordinary expressions that must not perform effects.
    fn model_config(&mut self, item: usize, decl: &ModelDecl) -> ModelConfig {
        self.defs.advance(&self.supply);
        let published = IndexMap::new();
        let mut infer = Infer::new(&self.defs, &published, self.config);
        let mut fields = IndexMap::new();
        let mut spans: IndexMap<&SmolStr, Span> = IndexMap::new();

        for field in &decl.fields {
            if let Some(previous) = spans.get(&field.name.node) {
                infer.report(TypeError::DuplicateDefinition {
                    name: field.name.node.clone(),
                    kind: "field",
                    previous: *previous,
                    span: field.name.span,
                });
                continue;
            }
            spans.insert(&field.name.node, field.name.span);

            let (ty, effects) = infer.synth(&field.value);
            let effects = infer.apply_row(&effects);
            for effect in effects.iter() {
                infer.report(TypeError::UnhandledEffect {
                    effect: effect.clone(),
                    context: format!("model `{}`", decl.name.node),
                    span: field.value.span,
                });
            }
            fields.insert(field.name.node.clone(), infer.apply(&ty));
        }

        let supply = infer.supply.clone();
        let errors = std::mem::take(&mut infer.errors);
        drop(infer);
        self.supply = supply;
        self.errors.extend(errors.into_iter().map(|e| (item, e)));

        ModelConfig {
            name: decl.name.node.clone(),
            fields,
            span: decl.name.span,
        }
    }

    fn prompts(&mut self, program: &Program) {
        for (item, decl) in program.items.iter().enumerate() {
            let Item::Prompt(decl) = decl else { continue };
            if let Some(previous) = self.defs.prompts.get(&decl.name.node) {
                let previous = previous.span;
                self.duplicate(item, &decl.name.node, "prompt", previous, decl.name.span);
                continue;
            }
            let sig = self.prompt_signature(item, decl);
            self.defs.prompts.insert(decl.name.node.clone(), sig);
        }
    }

    fn prompt_signature(&mut self, item: usize, decl: &PromptDecl) -> PromptSig {
        let mut scope = TypeScope::default();
        let params = decl
            .params
            .iter()
            .map(|p| {
                let ty = match &p.ty {
                    Some(te) => self.resolve(item, &mut scope, te).0,
                    None => Type::String,
                };
                (p.name.node.clone(), ty)
            })
            .collect();
        let output = match &decl.output {
            Some(te) => self.resolve(item, &mut scope, te).0,
            None => Type::String,
        };

        if let Some(model) = &decl.model {
            if !self.defs.models.contains_key(&model.node) && !self.defs.is_failed(&model.node) {
                let similar = match self.suggestion_distance() {
                    Some(distance) => {
                        similar_names(&model.node, self.defs.models.keys().map(SmolStr::as_str), distance)
                    }
                    None => Vec::new(),
                };
                self.report(
                    item,
                    TypeError::UndefinedModel {
                        name: model.node.clone(),
                        similar,
                        span: model.span,
                    },
                );
            }
        }

        PromptSig {
            name: decl.name.node.clone(),
            params,
            output,
            model: decl.model.as_ref().map(|m| m.node.clone()),
            span: decl.name.span,
        }
    }

    // ------------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------------

    fn functions(&mut self, program: &Program) -> Vec<usize> {
        let mut accepted = Vec::new();
        let mut spans: IndexMap<&SmolStr, Span> = IndexMap::new();
        for (item, decl) in program.items.iter().enumerate() {
            let Item::Function(decl) = decl else { continue };
            let name = &decl.name.node;
            if let Some(previous) = spans.get(name) {
                let previous = *previous;
                self.duplicate(item, name, "function", previous, decl.name.span);
                continue;
            }
            spans.insert(name, decl.name.span);

            let mut errors = Vec::new();
            let (sig, _) = function_signature(&self.defs, &mut self.supply, self.config, decl, &mut errors);
            if errors.is_empty() {
                self.defs.functions.insert(name.clone(), sig);
                accepted.push(item);
            } else {
                debug!(function = %name, "signature failed to resolve");
                self.defs.failed.insert(name.clone());
                self.errors.extend(errors.into_iter().map(|e| (item, e)));
            }
        }
        accepted
    }
}
