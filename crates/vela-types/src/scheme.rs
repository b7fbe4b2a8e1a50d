//! Type schemes, generalization and instantiation.

use std::fmt;

use indexmap::IndexSet;
use vela_ast::{Expr, ExprKind};

use crate::effect::{EffectRow, EffectVar};
use crate::subst::{alpha_eq, Substitution, Types, VarSupply};
use crate::ty::{fmt_type, Type, TypeVar, VarNames};

/// `∀ vars effect_vars. ty`
#[derive(Debug, Clone, PartialEq)]
pub struct Scheme {
    pub vars: Vec<TypeVar>,
    pub effect_vars: Vec<EffectVar>,
    pub ty: Type,
}

impl Scheme {
    pub fn mono(ty: Type) -> Self {
        Self {
            vars: Vec::new(),
            effect_vars: Vec::new(),
            ty,
        }
    }

    pub fn poly(vars: Vec<TypeVar>, effect_vars: Vec<EffectVar>, ty: Type) -> Self {
        Self {
            vars,
            effect_vars,
            ty,
        }
    }

    pub fn is_mono(&self) -> bool {
        self.vars.is_empty() && self.effect_vars.is_empty()
    }

    /// The scheme as a `Forall` type (or the bare type when monomorphic).
    pub fn to_type(&self) -> Type {
        if self.is_mono() {
            return self.ty.clone();
        }
        Type::Forall {
            vars: self.vars.clone(),
            effect_vars: self.effect_vars.clone(),
            body: Box::new(self.ty.clone()),
        }
    }

    /// Equality up to renaming of the quantified variables.
    pub fn alpha_eq(&self, other: &Scheme) -> bool {
        alpha_eq(&self.to_type(), &other.to_type())
    }
}

impl Types for Scheme {
    fn apply(&self, subst: &Substitution) -> Scheme {
        let inner = subst.without(&self.vars, &self.effect_vars);
        Scheme {
            vars: self.vars.clone(),
            effect_vars: self.effect_vars.clone(),
            ty: self.ty.apply(&inner),
        }
    }

    fn collect_type_vars(&self, out: &mut IndexSet<TypeVar>) {
        out.extend(
            self.ty
                .free_type_vars()
                .into_iter()
                .filter(|v| !self.vars.contains(v)),
        );
    }

    fn collect_effect_vars(&self, out: &mut IndexSet<EffectVar>) {
        out.extend(
            self.ty
                .free_effect_vars()
                .into_iter()
                .filter(|v| !self.effect_vars.contains(v)),
        );
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = VarNames::default().bind(&self.vars, &self.effect_vars);
        if !self.is_mono() {
            write!(f, "∀{}. ", names.binders(&self.vars, &self.effect_vars))?;
        }
        fmt_type(&self.ty, &names, f)
    }
}

/// Quantifies the variables of `ty` that are not free in the environment.
/// Variables are listed in order of first occurrence.
///
/// A tail on the outermost latent row that nothing else mentions is dropped
/// first: no caller can observe it, and [`open_latent_row`] restores one at
/// every use site.
pub fn generalize(ty: &Type, env_ftv: &IndexSet<TypeVar>, env_fev: &IndexSet<EffectVar>) -> Scheme {
    let ty = close_latent_row(ty, env_fev);
    let vars = ty
        .free_type_vars()
        .into_iter()
        .filter(|v| !env_ftv.contains(v))
        .collect();
    let effect_vars = ty
        .free_effect_vars()
        .into_iter()
        .filter(|v| !env_fev.contains(v))
        .collect();
    Scheme::poly(vars, effect_vars, ty)
}

fn close_latent_row(ty: &Type, env_fev: &IndexSet<EffectVar>) -> Type {
    if let Type::Function {
        params,
        ret,
        effects,
    } = ty
    {
        if let Some(tail) = effects.tail() {
            if !env_fev.contains(&tail) && effect_var_occurrences(ty, tail) == 1 {
                return Type::Function {
                    params: params.clone(),
                    ret: ret.clone(),
                    effects: effects.closed_part(),
                };
            }
        }
    }
    ty.clone()
}

/// Gives a closed outermost latent row a fresh tail, so the function can be
/// used where more effects are allowed.
pub fn open_latent_row(ty: Type, supply: &mut VarSupply) -> Type {
    match ty {
        Type::Function {
            params,
            ret,
            effects,
        } if effects.is_closed() => Type::Function {
            params,
            ret,
            effects: effects.with_tail(Some(supply.fresh_effect_var())),
        },
        other => other,
    }
}

/// Free occurrences of `var` in `ty`, counted with multiplicity.
fn effect_var_occurrences(ty: &Type, var: EffectVar) -> usize {
    fn row(r: &EffectRow, var: EffectVar) -> usize {
        let own = usize::from(r.tail() == Some(var));
        own + r
            .iter()
            .flat_map(|e| e.type_args())
            .map(|t| effect_var_occurrences(t, var))
            .sum::<usize>()
    }

    match ty {
        Type::Function {
            params,
            ret,
            effects,
        } => {
            params.iter().map(|p| effect_var_occurrences(p, var)).sum::<usize>()
                + effect_var_occurrences(ret, var)
                + row(effects, var)
        }
        Type::Tuple(ts) | Type::Named { args: ts, .. } => ts.iter().map(|t| effect_var_occurrences(t, var)).sum(),
        Type::Array(t) | Type::Ai(t) | Type::Effect(t) | Type::Reference { inner: t, .. } => {
            effect_var_occurrences(t, var)
        }
        Type::Record(r) => r.iter().map(|(_, t)| effect_var_occurrences(t, var)).sum(),
        Type::Forall {
            effect_vars, body, ..
        } if !effect_vars.contains(&var) => effect_var_occurrences(body, var),
        _ => 0,
    }
}

/// Replaces the quantified variables with fresh ones.
pub fn instantiate(scheme: &Scheme, supply: &mut VarSupply) -> Type {
    if scheme.is_mono() {
        return scheme.ty.clone();
    }
    let mut subst = Substitution::new();
    for var in &scheme.vars {
        subst.bind_type(*var, supply.fresh());
    }
    for var in &scheme.effect_vars {
        subst.bind_effect(*var, EffectRow::var(supply.fresh_effect_var()));
    }
    scheme.ty.apply(&subst)
}

/// Syntactic values: the only right-hand sides whose `let` is generalized.
pub fn is_syntactic_value(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Integer(_)
        | ExprKind::Float(_)
        | ExprKind::String(_)
        | ExprKind::Bool(_)
        | ExprKind::Unit
        | ExprKind::Ident(_)
        | ExprKind::Lambda { .. } => true,
        ExprKind::Tuple(elements) | ExprKind::Array(elements) => elements.iter().all(is_syntactic_value),
        ExprKind::Record(fields) | ExprKind::StructInit { fields, .. } => {
            fields.iter().all(|f| is_syntactic_value(&f.value))
        }
        ExprKind::Annotated { expr, .. } => is_syntactic_value(expr),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effect;
    use vela_ast::build;

    fn var(n: u32) -> Type {
        Type::Var(TypeVar(n))
    }

    #[test]
    fn test_generalize_skips_environment_vars() {
        let ty = Type::function(vec![var(0)], var(1));
        let env: IndexSet<TypeVar> = [TypeVar(1)].into_iter().collect();
        let scheme = generalize(&ty, &env, &IndexSet::new());
        assert_eq!(scheme.vars, vec![TypeVar(0)]);
    }

    #[test]
    fn test_generalize_closes_unobservable_tail() {
        let tail = EffectVar(0);
        let id = Type::function_with(vec![var(0)], var(0), EffectRow::var(tail));
        let scheme = generalize(&id, &IndexSet::new(), &IndexSet::new());
        insta::assert_snapshot!(scheme.to_string(), @"∀a. a -> a");

        // The tail is shared with the parameter, so it stays.
        let apply = Type::function_with(
            vec![Type::function_with(vec![], var(1), EffectRow::var(tail))],
            var(1),
            EffectRow::open([Effect::Io], tail),
        );
        let scheme = generalize(&apply, &IndexSet::new(), &IndexSet::new());
        insta::assert_snapshot!(scheme.to_string(), @"∀a e. (() -> a ! {e}) -> a ! {IO | e}");

        // A tail the environment mentions is neither closed nor quantified.
        let env_fev: IndexSet<EffectVar> = [tail].into_iter().collect();
        let scheme = generalize(&id, &IndexSet::new(), &env_fev);
        assert_eq!(scheme.effect_vars, vec![]);
        assert_eq!(scheme.ty, id);
    }

    #[test]
    fn test_open_latent_row() {
        let mut supply = VarSupply::starting_at(0, 7);
        let io = Type::function_with(vec![], Type::Unit, EffectRow::single(Effect::Io));
        let opened = open_latent_row(io, &mut supply);
        assert_eq!(opened.to_string(), "() -> Unit ! {IO | ?e7}");
        assert_eq!(open_latent_row(Type::Int, &mut supply), Type::Int);
    }

    #[test]
    fn test_instantiate_is_fresh() {
        let scheme = Scheme::poly(vec![TypeVar(0)], vec![], Type::function(vec![var(0)], var(0)));
        let mut supply = VarSupply::starting_at(10, 0);
        let a = instantiate(&scheme, &mut supply);
        let b = instantiate(&scheme, &mut supply);
        assert_eq!(a, Type::function(vec![var(10)], var(10)));
        assert_eq!(b, Type::function(vec![var(11)], var(11)));
    }

    #[test]
    fn test_display() {
        let id = Scheme::poly(vec![TypeVar(4)], vec![], Type::function(vec![var(4)], var(4)));
        insta::assert_snapshot!(id.to_string(), @"∀a. a -> a");

        let apply = Scheme::poly(
            vec![TypeVar(0), TypeVar(1)],
            vec![EffectVar(3)],
            Type::function(
                vec![
                    Type::function_with(vec![var(0)], var(1), EffectRow::var(EffectVar(3))),
                    var(0),
                ],
                var(1),
            ),
        );
        insta::assert_snapshot!(apply.to_string(), @"∀a b e. (a -> b ! {e}, a) -> b");

        let io = Scheme::mono(Type::function_with(vec![Type::Int], Type::Unit, EffectRow::single(Effect::Io)));
        insta::assert_snapshot!(io.to_string(), @"Int -> Unit ! {IO}");
    }

    #[test]
    fn test_syntactic_values() {
        assert!(is_syntactic_value(&build::int(1)));
        assert!(is_syntactic_value(&build::lambda(vec![build::param("x")], build::var("x"))));
        assert!(is_syntactic_value(&build::tuple(vec![build::var("x"), build::string("s")])));
        assert!(!is_syntactic_value(&build::call_named("g", vec![build::var("x")])));
        assert!(!is_syntactic_value(&build::array(vec![build::call_named("g", vec![])])));
    }
}
