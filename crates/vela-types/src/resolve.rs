//! Resolution of written types (`TypeExpr`) and effect annotations.

use indexmap::IndexMap;
use smol_str::SmolStr;
use vela_ast::{EffectAnnotation, TypeExpr};

use crate::defs::Definitions;
use crate::effect::{Effect, EffectRow, EffectVar};
use crate::env::similar_names;
use crate::error::TypeError;
use crate::subst::VarSupply;
use crate::ty::{RecordType, Type, TypeVar};

const PRIMITIVES: [&str; 5] = ["Int", "Float", "String", "Bool", "Unit"];

/// Names of type parameters and effect variables in scope.
#[derive(Debug, Clone, Default)]
pub struct TypeScope {
    pub types: IndexMap<SmolStr, TypeVar>,
    pub effects: IndexMap<SmolStr, EffectVar>,
}

/// Resolves written types against the definitions. Errors are pushed to
/// `errors`; the offending part resolves to `Unknown` (or `Error` for
/// malformed applications).
pub struct Resolver<'a> {
    pub defs: &'a Definitions,
    pub scope: &'a mut TypeScope,
    pub supply: &'a mut VarSupply,
    pub errors: &'a mut Vec<TypeError>,
    pub suggestion_distance: Option<usize>,
}

impl Resolver<'_> {
    pub fn resolve(&mut self, te: &TypeExpr) -> Type {
        match te {
            TypeExpr::Named { name, args, span } => self.resolve_named(&name.node, args, *span),
            TypeExpr::Function {
                params, ret, effects, ..
            } => {
                let params = params.iter().map(|p| self.resolve(p)).collect();
                let ret = self.resolve(ret);
                let effects = match effects {
                    Some(annotation) => self.resolve_effects(annotation),
                    None => EffectRow::pure(),
                };
                Type::function_with(params, ret, effects)
            }
            TypeExpr::Tuple { elements, .. } => Type::Tuple(elements.iter().map(|e| self.resolve(e)).collect()),
            TypeExpr::Array { element, .. } => Type::array(self.resolve(element)),
            TypeExpr::Record { fields, .. } => {
                let mut record = RecordType::new();
                let mut seen: IndexMap<&SmolStr, vela_ast::Span> = IndexMap::new();
                for (label, ty) in fields {
                    let resolved = self.resolve(ty);
                    if let Some(previous) = seen.get(&label.node) {
                        self.errors.push(TypeError::DuplicateDefinition {
                            name: label.node.clone(),
                            kind: "field",
                            previous: *previous,
                            span: label.span,
                        });
                        continue;
                    }
                    seen.insert(&label.node, label.span);
                    record.insert(label.node.clone(), resolved);
                }
                Type::Record(record)
            }
            TypeExpr::Reference { mutable, inner, .. } => Type::reference(*mutable, self.resolve(inner)),
            TypeExpr::Infer(_) => self.supply.fresh(),
        }
    }

    fn arity(&mut self, expected: usize, args: &[TypeExpr], span: vela_ast::Span) -> bool {
        if expected == args.len() {
            return true;
        }
        self.errors.push(TypeError::ArityMismatch {
            expected,
            found: args.len(),
            span,
        });
        false
    }

    fn resolve_named(&mut self, name: &SmolStr, args: &[TypeExpr], span: vela_ast::Span) -> Type {
        match name.as_str() {
            "Int" | "Float" | "String" | "Bool" | "Unit" => {
                if !self.arity(0, args, span) {
                    return Type::Error;
                }
                return match name.as_str() {
                    "Int" => Type::Int,
                    "Float" => Type::Float,
                    "String" => Type::String,
                    "Bool" => Type::Bool,
                    _ => Type::Unit,
                };
            }
            "AI" | "Effect" => {
                if !self.arity(1, args, span) {
                    return Type::Error;
                }
                let inner = Box::new(self.resolve(&args[0]));
                return if name == "AI" { Type::Ai(inner) } else { Type::Effect(inner) };
            }
            _ => {}
        }

        if let Some(var) = self.scope.types.get(name) {
            let var = *var;
            if !self.arity(0, args, span) {
                return Type::Error;
            }
            return Type::Var(var);
        }

        if let Some(id) = self.defs.types.lookup(name) {
            let expected = self.defs.types.get(id).map_or(0, |def| def.params.len());
            if !self.arity(expected, args, span) {
                return Type::Error;
            }
            let args: Vec<Type> = args.iter().map(|a| self.resolve(a)).collect();
            return Type::Named {
                id,
                name: name.clone(),
                args,
            };
        }

        if self.defs.is_failed(name) {
            return Type::Unknown;
        }

        let similar = self.similar(name, |defs, scope| {
            PRIMITIVES
                .iter()
                .copied()
                .chain(scope.types.keys().map(SmolStr::as_str))
                .chain(defs.types.iter().map(|(_, d)| d.name.as_str()))
                .map(SmolStr::new)
                .collect()
        });
        self.errors.push(TypeError::UndefinedType {
            name: name.clone(),
            similar,
            span,
        });
        Type::Unknown
    }

    fn similar(&self, name: &str, candidates: impl FnOnce(&Definitions, &TypeScope) -> Vec<SmolStr>) -> Vec<SmolStr> {
        match self.suggestion_distance {
            Some(distance) => {
                let candidates = candidates(self.defs, &*self.scope);
                similar_names(name, candidates.iter().map(SmolStr::as_str), distance)
            }
            None => Vec::new(),
        }
    }

    /// `! {IO, State<Int> | e}`. Unknown tail names become fresh effect
    /// variables, shared by later occurrences in the same scope.
    pub fn resolve_effects(&mut self, annotation: &EffectAnnotation) -> EffectRow {
        let defs = self.defs;
        let mut row = EffectRow::pure();
        for effect in &annotation.effects {
            let label = &effect.name.node;
            let args: Vec<Type> = effect.args.iter().map(|a| self.resolve(a)).collect();

            if let Some(expected) = Effect::builtin_arity(label) {
                if !self.arity(expected, &effect.args, effect.span) {
                    continue;
                }
                if let Some(builtin) = Effect::builtin(label, args) {
                    row.insert(builtin);
                }
                continue;
            }

            match defs.effects.get(label) {
                Some(sig) => {
                    if self.arity(sig.params.len(), &effect.args, effect.span) {
                        row.insert(Effect::Custom {
                            name: label.clone(),
                            args,
                        });
                    }
                }
                None if defs.is_failed(label) => {}
                None => {
                    let similar = self.similar(label, |defs, _| defs.effects.keys().cloned().collect());
                    self.errors.push(TypeError::UndefinedEffect {
                        name: label.clone(),
                        similar,
                        span: effect.name.span,
                    });
                }
            }
        }

        if let Some(tail) = &annotation.tail {
            let var = match self.scope.effects.get(&tail.node) {
                Some(var) => *var,
                None => {
                    let var = self.supply.fresh_effect_var();
                    self.scope.effects.insert(tail.node.clone(), var);
                    var
                }
            };
            row = row.with_tail(Some(var));
        }
        row
    }
}
