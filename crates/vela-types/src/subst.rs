//! Substitutions, free variables and fresh-variable supplies.

use indexmap::IndexSet;
use rustc_hash::FxHashMap;

use crate::effect::{Effect, EffectRow, EffectVar};
use crate::ty::{Type, TypeVar};

/// Finite map from type variables to types and effect variables to rows.
///
/// Application is single-step: bindings are not chased. Substitutions built
/// by the unifier are idempotent, so one step is a full resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution {
    types: FxHashMap<TypeVar, Type>,
    effects: FxHashMap<EffectVar, EffectRow>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton_type(var: TypeVar, ty: Type) -> Self {
        let mut s = Self::new();
        s.types.insert(var, ty);
        s
    }

    pub fn singleton_effect(var: EffectVar, row: EffectRow) -> Self {
        let mut s = Self::new();
        s.effects.insert(var, row);
        s
    }

    /// Raw insertion, without composing.
    pub fn bind_type(&mut self, var: TypeVar, ty: Type) {
        self.types.insert(var, ty);
    }

    pub fn bind_effect(&mut self, var: EffectVar, row: EffectRow) {
        self.effects.insert(var, row);
    }

    pub fn lookup_type(&self, var: TypeVar) -> Option<&Type> {
        self.types.get(&var)
    }

    pub fn lookup_effect(&self, var: EffectVar) -> Option<&EffectRow> {
        self.effects.get(&var)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.effects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.types.len() + self.effects.len()
    }

    /// `self ∘ other`: applying the result equals applying `other`, then `self`.
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut types: FxHashMap<TypeVar, Type> = other
            .types
            .iter()
            .map(|(v, t)| (*v, t.apply(self)))
            .collect();
        for (v, t) in &self.types {
            types.entry(*v).or_insert_with(|| t.clone());
        }

        let mut effects: FxHashMap<EffectVar, EffectRow> = other
            .effects
            .iter()
            .map(|(v, r)| (*v, r.apply(self)))
            .collect();
        for (v, r) in &self.effects {
            effects.entry(*v).or_insert_with(|| r.clone());
        }

        Substitution { types, effects }
    }

    /// A copy without bindings for the given variables.
    pub fn without(&self, vars: &[TypeVar], effect_vars: &[EffectVar]) -> Substitution {
        let mut s = self.clone();
        for v in vars {
            s.types.remove(v);
        }
        for v in effect_vars {
            s.effects.remove(v);
        }
        s
    }
}

/// Structural operations shared by everything that contains types.
pub trait Types: Sized {
    fn apply(&self, subst: &Substitution) -> Self;
    fn collect_type_vars(&self, out: &mut IndexSet<TypeVar>);
    fn collect_effect_vars(&self, out: &mut IndexSet<EffectVar>);

    /// `ftv`
    fn free_type_vars(&self) -> IndexSet<TypeVar> {
        let mut out = IndexSet::new();
        self.collect_type_vars(&mut out);
        out
    }

    /// `fev`
    fn free_effect_vars(&self) -> IndexSet<EffectVar> {
        let mut out = IndexSet::new();
        self.collect_effect_vars(&mut out);
        out
    }
}

impl Types for Type {
    fn apply(&self, subst: &Substitution) -> Type {
        if subst.is_empty() {
            return self.clone();
        }
        match self {
            Type::Var(v) => subst.lookup_type(*v).cloned().unwrap_or_else(|| self.clone()),
            Type::Function {
                params,
                ret,
                effects,
            } => Type::Function {
                params: params.iter().map(|p| p.apply(subst)).collect(),
                ret: Box::new(ret.apply(subst)),
                effects: effects.apply(subst),
            },
            Type::Tuple(ts) => Type::Tuple(ts.iter().map(|t| t.apply(subst)).collect()),
            Type::Array(t) => Type::Array(Box::new(t.apply(subst))),
            Type::Record(r) => Type::Record(r.map_types(|t| t.apply(subst))),
            Type::Reference { mutable, inner } => Type::Reference {
                mutable: *mutable,
                inner: Box::new(inner.apply(subst)),
            },
            Type::Ai(t) => Type::Ai(Box::new(t.apply(subst))),
            Type::Effect(t) => Type::Effect(Box::new(t.apply(subst))),
            Type::Forall {
                vars,
                effect_vars,
                body,
            } => {
                let inner = subst.without(vars, effect_vars);
                Type::Forall {
                    vars: vars.clone(),
                    effect_vars: effect_vars.clone(),
                    body: Box::new(body.apply(&inner)),
                }
            }
            Type::Named { id, name, args } => Type::Named {
                id: *id,
                name: name.clone(),
                args: args.iter().map(|a| a.apply(subst)).collect(),
            },
            Type::Int | Type::Float | Type::String | Type::Bool | Type::Unit | Type::Error | Type::Unknown => {
                self.clone()
            }
        }
    }

    fn collect_type_vars(&self, out: &mut IndexSet<TypeVar>) {
        match self {
            Type::Var(v) => {
                out.insert(*v);
            }
            Type::Function {
                params,
                ret,
                effects,
            } => {
                params.iter().for_each(|p| p.collect_type_vars(out));
                ret.collect_type_vars(out);
                effects.collect_type_vars(out);
            }
            Type::Tuple(ts) | Type::Named { args: ts, .. } => {
                ts.iter().for_each(|t| t.collect_type_vars(out));
            }
            Type::Array(t) | Type::Ai(t) | Type::Effect(t) | Type::Reference { inner: t, .. } => {
                t.collect_type_vars(out)
            }
            Type::Record(r) => r.iter().for_each(|(_, t)| t.collect_type_vars(out)),
            Type::Forall { vars, body, .. } => {
                let mut inner = IndexSet::new();
                body.collect_type_vars(&mut inner);
                out.extend(inner.into_iter().filter(|v| !vars.contains(v)));
            }
            Type::Int | Type::Float | Type::String | Type::Bool | Type::Unit | Type::Error | Type::Unknown => {}
        }
    }

    fn collect_effect_vars(&self, out: &mut IndexSet<EffectVar>) {
        match self {
            Type::Function {
                params,
                ret,
                effects,
            } => {
                params.iter().for_each(|p| p.collect_effect_vars(out));
                ret.collect_effect_vars(out);
                effects.collect_effect_vars(out);
            }
            Type::Tuple(ts) | Type::Named { args: ts, .. } => {
                ts.iter().for_each(|t| t.collect_effect_vars(out));
            }
            Type::Array(t) | Type::Ai(t) | Type::Effect(t) | Type::Reference { inner: t, .. } => {
                t.collect_effect_vars(out)
            }
            Type::Record(r) => r.iter().for_each(|(_, t)| t.collect_effect_vars(out)),
            Type::Forall {
                effect_vars, body, ..
            } => {
                let mut inner = IndexSet::new();
                body.collect_effect_vars(&mut inner);
                out.extend(inner.into_iter().filter(|v| !effect_vars.contains(v)));
            }
            _ => {}
        }
    }
}

impl Types for Effect {
    fn apply(&self, subst: &Substitution) -> Effect {
        self.map_types(|t| t.apply(subst))
    }

    fn collect_type_vars(&self, out: &mut IndexSet<TypeVar>) {
        self.type_args().into_iter().for_each(|t| t.collect_type_vars(out));
    }

    fn collect_effect_vars(&self, out: &mut IndexSet<EffectVar>) {
        self.type_args().into_iter().for_each(|t| t.collect_effect_vars(out));
    }
}

impl Types for EffectRow {
    fn apply(&self, subst: &Substitution) -> EffectRow {
        let mapped = self.map_effects(|e| e.apply(subst));
        match self.tail().and_then(|t| subst.lookup_effect(t)) {
            Some(bound) => mapped.with_tail(None).union(bound).with_tail(bound.tail()),
            None => mapped,
        }
    }

    fn collect_type_vars(&self, out: &mut IndexSet<TypeVar>) {
        self.iter().for_each(|e| e.collect_type_vars(out));
    }

    fn collect_effect_vars(&self, out: &mut IndexSet<EffectVar>) {
        self.iter().for_each(|e| e.collect_effect_vars(out));
        if let Some(tail) = self.tail() {
            out.insert(tail);
        }
    }
}

// ============================================================================
// Fresh variables
// ============================================================================

/// Counter for fresh type and effect variables.
#[derive(Debug, Clone, Default)]
pub struct VarSupply {
    next_type: u32,
    next_effect: u32,
}

impl VarSupply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next_type: u32, next_effect: u32) -> Self {
        Self {
            next_type,
            next_effect,
        }
    }

    /// A supply whose variables cannot clash with any variable in `types`.
    pub fn above<'a>(types: impl IntoIterator<Item = &'a Type>) -> Self {
        let mut supply = Self::new();
        for ty in types {
            supply.reserve(ty);
        }
        supply
    }

    /// Moves the counters past every variable (free or bound) in `ty`.
    pub fn reserve(&mut self, ty: &Type) {
        let mut stack = vec![ty];
        while let Some(ty) = stack.pop() {
            match ty {
                Type::Var(v) => self.next_type = self.next_type.max(v.0 + 1),
                Type::Forall {
                    vars,
                    effect_vars,
                    body,
                } => {
                    for v in vars {
                        self.next_type = self.next_type.max(v.0 + 1);
                    }
                    for v in effect_vars {
                        self.next_effect = self.next_effect.max(v.0 + 1);
                    }
                    stack.push(body);
                }
                Type::Function {
                    params,
                    ret,
                    effects,
                } => {
                    stack.extend(params.iter());
                    stack.push(ret);
                    if let Some(tail) = effects.tail() {
                        self.next_effect = self.next_effect.max(tail.0 + 1);
                    }
                    for effect in effects.iter() {
                        stack.extend(effect.type_args());
                    }
                }
                Type::Tuple(ts) | Type::Named { args: ts, .. } => stack.extend(ts.iter()),
                Type::Array(t) | Type::Ai(t) | Type::Effect(t) | Type::Reference { inner: t, .. } => {
                    stack.push(t)
                }
                Type::Record(r) => stack.extend(r.iter().map(|(_, t)| t)),
                _ => {}
            }
        }
    }

    pub fn fresh_type_var(&mut self) -> TypeVar {
        let var = TypeVar(self.next_type);
        self.next_type += 1;
        var
    }

    pub fn fresh(&mut self) -> Type {
        Type::Var(self.fresh_type_var())
    }

    pub fn fresh_effect_var(&mut self) -> EffectVar {
        let var = EffectVar(self.next_effect);
        self.next_effect += 1;
        var
    }

    /// Counters as `(next type var, next effect var)`.
    pub fn counters(&self) -> (u32, u32) {
        (self.next_type, self.next_effect)
    }
}

// ============================================================================
// Alpha equivalence
// ============================================================================

/// Structural equality up to renaming of `∀`-bound variables.
pub fn alpha_eq(a: &Type, b: &Type) -> bool {
    AlphaEq::default().types(a, b)
}

#[derive(Default)]
struct AlphaEq {
    types: Vec<(TypeVar, TypeVar)>,
    effects: Vec<(EffectVar, EffectVar)>,
}

impl AlphaEq {
    fn type_var(&self, a: TypeVar, b: TypeVar) -> bool {
        match self.types.iter().rev().find(|(x, y)| *x == a || *y == b) {
            Some((x, y)) => *x == a && *y == b,
            None => a == b,
        }
    }

    fn effect_var(&self, a: EffectVar, b: EffectVar) -> bool {
        match self.effects.iter().rev().find(|(x, y)| *x == a || *y == b) {
            Some((x, y)) => *x == a && *y == b,
            None => a == b,
        }
    }

    fn all(&mut self, a: &[Type], b: &[Type]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.types(x, y))
    }

    fn rows(&mut self, a: &EffectRow, b: &EffectRow) -> bool {
        let tails = match (a.tail(), b.tail()) {
            (None, None) => true,
            (Some(x), Some(y)) => self.effect_var(x, y),
            _ => false,
        };
        tails
            && a.len() == b.len()
            && a.iter().all(|ea| {
                b.iter().any(|eb| {
                    ea.label() == eb.label() && {
                        let (xa, xb) = (ea.type_args(), eb.type_args());
                        xa.len() == xb.len() && xa.iter().zip(&xb).all(|(x, y)| self.types(x, y))
                    }
                })
            })
    }

    fn types(&mut self, a: &Type, b: &Type) -> bool {
        match (a, b) {
            (Type::Var(x), Type::Var(y)) => self.type_var(*x, *y),
            (
                Type::Function {
                    params: p1,
                    ret: r1,
                    effects: e1,
                },
                Type::Function {
                    params: p2,
                    ret: r2,
                    effects: e2,
                },
            ) => self.all(p1, p2) && self.types(r1, r2) && self.rows(e1, e2),
            (Type::Tuple(x), Type::Tuple(y)) => self.all(x, y),
            (Type::Array(x), Type::Array(y))
            | (Type::Ai(x), Type::Ai(y))
            | (Type::Effect(x), Type::Effect(y)) => self.types(x, y),
            (
                Type::Reference {
                    mutable: m1,
                    inner: i1,
                },
                Type::Reference {
                    mutable: m2,
                    inner: i2,
                },
            ) => m1 == m2 && self.types(i1, i2),
            (Type::Record(x), Type::Record(y)) => {
                x.len() == y.len()
                    && x
                        .iter()
                        .zip(y.iter())
                        .all(|((l1, t1), (l2, t2))| l1 == l2 && self.types(t1, t2))
            }
            (
                Type::Named { id: i1, args: a1, .. },
                Type::Named { id: i2, args: a2, .. },
            ) => i1 == i2 && self.all(a1, a2),
            (
                Type::Forall {
                    vars: v1,
                    effect_vars: ev1,
                    body: b1,
                },
                Type::Forall {
                    vars: v2,
                    effect_vars: ev2,
                    body: b2,
                },
            ) => {
                if v1.len() != v2.len() || ev1.len() != ev2.len() {
                    return false;
                }
                let (saved_t, saved_e) = (self.types.len(), self.effects.len());
                self.types.extend(v1.iter().copied().zip(v2.iter().copied()));
                self.effects.extend(ev1.iter().copied().zip(ev2.iter().copied()));
                let result = self.types(b1, b2);
                self.types.truncate(saved_t);
                self.effects.truncate(saved_e);
                result
            }
            _ => a == b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn var(n: u32) -> Type {
        Type::Var(TypeVar(n))
    }

    #[test]
    fn test_apply_is_single_step() {
        let mut s = Substitution::new();
        s.bind_type(TypeVar(0), var(1));
        s.bind_type(TypeVar(1), Type::Int);
        assert_eq!(var(0).apply(&s), var(1));
    }

    #[test]
    fn test_compose_applies_left_to_right_bindings() {
        let s2 = Substitution::singleton_type(TypeVar(0), Type::array(var(1)));
        let s1 = Substitution::singleton_type(TypeVar(1), Type::Int);
        let composed = s1.compose(&s2);
        assert_eq!(var(0).apply(&composed), Type::array(Type::Int));
        assert_eq!(var(1).apply(&composed), Type::Int);
    }

    #[test]
    fn test_apply_expands_bound_tail() {
        let row = EffectRow::open([Effect::Io], EffectVar(0));
        let s = Substitution::singleton_effect(EffectVar(0), EffectRow::open([Effect::Ai], EffectVar(3)));
        assert_eq!(row.apply(&s), EffectRow::open([Effect::Io, Effect::Ai], EffectVar(3)));
    }

    #[test]
    fn test_forall_shields_bound_vars() {
        let poly = Type::Forall {
            vars: vec![TypeVar(0)],
            effect_vars: vec![],
            body: Box::new(Type::function(vec![var(0)], var(1))),
        };
        let mut s = Substitution::new();
        s.bind_type(TypeVar(0), Type::Int);
        s.bind_type(TypeVar(1), Type::Bool);
        let applied = poly.apply(&s);
        assert_eq!(
            applied,
            Type::Forall {
                vars: vec![TypeVar(0)],
                effect_vars: vec![],
                body: Box::new(Type::function(vec![var(0)], Type::Bool)),
            }
        );
        assert_eq!(poly.free_type_vars().into_iter().collect::<Vec<_>>(), vec![TypeVar(1)]);
    }

    #[test]
    fn test_free_effect_vars_include_tails() {
        let f = Type::function_with(vec![], Type::Unit, EffectRow::var(EffectVar(4)));
        assert!(f.free_effect_vars().contains(&EffectVar(4)));
    }

    #[test]
    fn test_supply_above() {
        let t = Type::function_with(vec![var(7)], var(2), EffectRow::var(EffectVar(5)));
        let mut supply = VarSupply::above([&t]);
        assert_eq!(supply.fresh_type_var(), TypeVar(8));
        assert_eq!(supply.fresh_effect_var(), EffectVar(6));
    }

    #[test]
    fn test_alpha_eq() {
        let a = Type::Forall {
            vars: vec![TypeVar(0)],
            effect_vars: vec![],
            body: Box::new(Type::function(vec![var(0)], var(0))),
        };
        let b = Type::Forall {
            vars: vec![TypeVar(9)],
            effect_vars: vec![],
            body: Box::new(Type::function(vec![var(9)], var(9))),
        };
        let c = Type::Forall {
            vars: vec![TypeVar(9)],
            effect_vars: vec![],
            body: Box::new(Type::function(vec![var(9)], Type::Int)),
        };
        assert!(alpha_eq(&a, &b));
        assert!(!alpha_eq(&a, &c));
        assert!(!alpha_eq(&var(0), &var(1)));
    }
}
