//! Structural subtyping with variance.
//!
//! Function parameters are contravariant, results and containers covariant,
//! mutable references invariant. Named types unfold through the arena at
//! most once per name per query, which keeps recursive structs finite.

use rustc_hash::FxHashSet;

use crate::effect::EffectRow;
use crate::subst::{alpha_eq, Substitution, Types};
use crate::ty::{Type, TypeDefId, TypeDefs};

/// `sub ≤ sup`
pub fn is_subtype(defs: &TypeDefs, sub: &Type, sup: &Type) -> bool {
    Subtyping {
        defs,
        unfolded: FxHashSet::default(),
    }
    .check(sub, sup)
}

struct Subtyping<'d> {
    defs: &'d TypeDefs,
    unfolded: FxHashSet<TypeDefId>,
}

impl Subtyping<'_> {
    fn check(&mut self, sub: &Type, sup: &Type) -> bool {
        if sub == sup || sub.is_sentinel() || sup.is_sentinel() {
            return true;
        }

        match (sub, sup) {
            // Numeric widening
            (Type::Int, Type::Float) => true,

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
            ) => {
                p1.len() == p2.len()
                    && p1.iter().zip(p2).all(|(a, b)| self.check(b, a))
                    && self.check(r1, r2)
                    && e1.is_subset_of(e2)
            }

            (Type::Tuple(a), Type::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.check(x, y))
            }

            (Type::Array(a), Type::Array(b))
            | (Type::Ai(a), Type::Ai(b))
            | (Type::Effect(a), Type::Effect(b)) => self.check(a, b),

            // Width and depth
            (Type::Record(a), Type::Record(b)) => b
                .iter()
                .all(|(label, ty)| a.get(label).map_or(false, |found| self.check(found, ty))),

            (
                Type::Reference {
                    mutable: m1,
                    inner: i1,
                },
                Type::Reference {
                    mutable: m2,
                    inner: i2,
                },
            ) => m1 == m2 && self.check(i1, i2) && self.check(i2, i1),

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
                let mut renaming = Substitution::new();
                for (a, b) in v2.iter().zip(v1) {
                    renaming.bind_type(*a, Type::Var(*b));
                }
                for (a, b) in ev2.iter().zip(ev1) {
                    renaming.bind_effect(*a, EffectRow::var(*b));
                }
                alpha_eq(sub, sup) || self.check(b1, &b2.apply(&renaming))
            }

            (
                Type::Named { id: i1, args: a1, .. },
                Type::Named { id: i2, args: a2, .. },
            ) if i1 == i2 => {
                // Arguments are invariant.
                a1.len() == a2.len() && a1.iter().zip(a2).all(|(x, y)| self.check(x, y) && self.check(y, x))
            }

            (Type::Named { id, args, .. }, _) => match self.unfold(*id, args) {
                Some(record) => self.check(&record, sup),
                None => false,
            },
            (_, Type::Named { id, args, .. }) => match self.unfold(*id, args) {
                Some(record) => self.check(sub, &record),
                None => false,
            },

            _ => false,
        }
    }

    fn unfold(&mut self, id: TypeDefId, args: &[Type]) -> Option<Type> {
        if !self.unfolded.insert(id) {
            return None;
        }
        self.defs.unfold(id, args).map(Type::Record)
    }
}
