//! Global definitions collected before any body is checked.
//!
//! Holds the named types (Δ), effect signatures (Σ), AI model
//! configurations (Μ), prompt signatures (Π), builtin functions and the
//! collected top-level function signatures. Built once by collection and
//! shared read-only (behind an `Arc`) while bodies are checked.

use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;
use vela_ast::Span;

use crate::effect::{Effect, EffectRow, EffectVar};
use crate::scheme::Scheme;
use crate::subst::{Substitution, Types, VarSupply};
use crate::ty::{Type, TypeDefs, TypeVar};

/// An operation of an effect: `op(params) -> ret`.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSig {
    pub name: SmolStr,
    pub params: Vec<Type>,
    pub ret: Type,
}

/// `effect Name<params> { operations }`
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSig {
    pub name: SmolStr,
    pub params: Vec<TypeVar>,
    pub operations: IndexMap<SmolStr, OperationSig>,
    pub builtin: bool,
}

impl EffectSig {
    /// The effect label with its parameters as variables.
    pub fn generic_effect(&self) -> Effect {
        let args = self.params.iter().map(|v| Type::Var(*v)).collect();
        Effect::builtin(&self.name, args).unwrap_or_else(|| Effect::Custom {
            name: self.name.clone(),
            args: self.params.iter().map(|v| Type::Var(*v)).collect(),
        })
    }

    /// An operation with its types specialized to `effect`'s payload.
    /// Parameters the payload does not fix, and variables local to the
    /// operation (`print`'s argument), are replaced with fresh variables.
    pub fn instantiate_operation(
        &self,
        op: &str,
        effect: Option<&Effect>,
        supply: &mut VarSupply,
    ) -> Option<OperationSig> {
        let sig = self.operations.get(op)?;
        let payload = effect.map(Effect::type_args).unwrap_or_default();

        let mut subst = Substitution::new();
        for (i, param) in self.params.iter().enumerate() {
            let ty = match payload.get(i) {
                Some(arg) => (*arg).clone(),
                None => supply.fresh(),
            };
            subst.bind_type(*param, ty);
        }
        for ty in sig.params.iter().chain(std::iter::once(&sig.ret)) {
            for var in ty.free_type_vars() {
                if subst.lookup_type(var).is_none() {
                    subst.bind_type(var, supply.fresh());
                }
            }
        }

        Some(OperationSig {
            name: sig.name.clone(),
            params: sig.params.iter().map(|t| t.apply(&subst)).collect(),
            ret: sig.ret.apply(&subst),
        })
    }
}

/// `model Name { fields }`
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub name: SmolStr,
    pub fields: IndexMap<SmolStr, Type>,
    pub span: Span,
}

/// `prompt name(params) -> output using model { template }`
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSig {
    pub name: SmolStr,
    pub params: Vec<(SmolStr, Type)>,
    pub output: Type,
    pub model: Option<SmolStr>,
    pub span: Span,
}

/// Signature of a top-level function as written in its declaration.
/// Missing annotations are variables; a missing effect clause is an open
/// row to be inferred.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSig {
    pub name: SmolStr,
    pub type_params: Vec<(SmolStr, TypeVar)>,
    pub params: Vec<(SmolStr, Type)>,
    pub ret: Type,
    pub effects: EffectRow,
    pub declared_effects: bool,
    pub declared_return: bool,
    pub is_pure: bool,
    pub span: Span,
}

impl FunctionSig {
    pub fn as_type(&self) -> Type {
        Type::function_with(
            self.params.iter().map(|(_, t)| t.clone()).collect(),
            self.ret.clone(),
            self.effects.clone(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalKind {
    Builtin,
    /// Operation of the named effect, callable as a function.
    Operation,
}

/// A name visible everywhere: builtins and effect operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub scheme: Scheme,
    pub kind: GlobalKind,
}

#[derive(Debug, Clone, Default)]
pub struct Definitions {
    pub types: TypeDefs,
    pub effects: IndexMap<SmolStr, EffectSig>,
    pub models: IndexMap<SmolStr, ModelConfig>,
    pub prompts: IndexMap<SmolStr, PromptSig>,
    pub functions: IndexMap<SmolStr, FunctionSig>,
    pub globals: IndexMap<SmolStr, Global>,
    /// Declarations that failed collection; references to them are `Unknown`.
    pub failed: IndexSet<SmolStr>,
    next_type_var: u32,
    next_effect_var: u32,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Definitions preloaded with the builtin effects and functions.
    pub fn with_builtins() -> Self {
        let mut defs = Self::new();
        crate::builtins::install(&mut defs);
        defs
    }

    pub fn fresh_type_var(&mut self) -> TypeVar {
        let var = TypeVar(self.next_type_var);
        self.next_type_var += 1;
        var
    }

    pub fn fresh_effect_var(&mut self) -> EffectVar {
        let var = EffectVar(self.next_effect_var);
        self.next_effect_var += 1;
        var
    }

    /// Moves the counters past everything `supply` has handed out.
    pub(crate) fn advance(&mut self, supply: &VarSupply) {
        let (types, effects) = supply.counters();
        self.next_type_var = self.next_type_var.max(types);
        self.next_effect_var = self.next_effect_var.max(effects);
    }

    /// A supply that cannot clash with any variable allocated here.
    pub fn supply(&self) -> VarSupply {
        VarSupply::starting_at(self.next_type_var, self.next_effect_var)
    }

    /// Effect signature owning an operation name. User effects take
    /// precedence over builtins.
    pub fn effect_of_operation(&self, op: &str) -> Option<&EffectSig> {
        let mut owners = self.effects.values().filter(|e| e.operations.contains_key(op));
        let first = owners.next()?;
        if first.builtin {
            Some(owners.find(|e| !e.builtin).unwrap_or(first))
        } else {
            Some(first)
        }
    }

    pub fn is_failed(&self, name: &str) -> bool {
        self.failed.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_operation_specialized_to_payload() {
        let defs = Definitions::with_builtins();
        let mut supply = defs.supply();
        let exception = &defs.effects["Exception"];
        let op = exception
            .instantiate_operation("throw", Some(&Effect::exception(Type::String)), &mut supply)
            .unwrap();
        assert_eq!(op.params, vec![Type::String]);

        // Without a payload the parameter is fresh.
        let op = exception.instantiate_operation("throw", None, &mut supply).unwrap();
        assert!(op.params[0].is_var());
        assert!(exception.instantiate_operation("catch", None, &mut supply).is_none());
    }

    #[test]
    fn test_operation_locals_are_fresh() {
        let defs = Definitions::with_builtins();
        let mut supply = defs.supply();
        let io = &defs.effects["IO"];
        let first = io.instantiate_operation("print", Some(&Effect::Io), &mut supply).unwrap();
        let second = io.instantiate_operation("print", Some(&Effect::Io), &mut supply).unwrap();
        assert_ne!(first.params, second.params);
    }

    #[test]
    fn test_user_operation_shadows_builtin_owner() {
        let mut defs = Definitions::with_builtins();
        let mut operations = IndexMap::new();
        operations.insert(
            SmolStr::new("print"),
            OperationSig {
                name: "print".into(),
                params: vec![Type::String],
                ret: Type::Unit,
            },
        );
        defs.effects.insert(
            "Console".into(),
            EffectSig {
                name: "Console".into(),
                params: vec![],
                operations,
                builtin: false,
            },
        );
        assert_eq!(defs.effect_of_operation("print").unwrap().name, "Console");
        assert_eq!(defs.effect_of_operation("fetch").unwrap().name, "Network");
        assert!(defs.effect_of_operation("nope").is_none());
    }

    #[test]
    fn test_supply_starts_after_collected_vars() {
        let mut defs = Definitions::new();
        defs.fresh_type_var();
        defs.fresh_effect_var();
        let mut supply = defs.supply();
        assert_eq!(supply.fresh_type_var(), TypeVar(1));
        assert_eq!(supply.fresh_effect_var(), EffectVar(1));
    }
}
