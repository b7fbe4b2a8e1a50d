//! First-order unification over types and effect rows.
//!
//! [`unify`] is the pure entry point: it returns the most general unifier of
//! two types. [`Unifier`] is the incremental form used by the checker; it
//! threads one idempotent substitution and a shared variable supply through
//! a sequence of constraints.

use thiserror::Error;
use tracing::trace;

use crate::effect::{Effect, EffectRow, EffectVar};
use crate::subst::{alpha_eq, Substitution, Types, VarSupply};
use crate::ty::{RecordType, Type, TypeVar};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnifyError {
    #[error("infinite type: `{var}` occurs in `{ty}`")]
    OccursCheck { var: TypeVar, ty: Type },

    #[error("infinite effect row: `{var}` occurs in `{row}`")]
    RowOccursCheck { var: EffectVar, row: EffectRow },

    #[error("cannot unify `{left}` with `{right}`")]
    Mismatch { left: Type, right: Type },

    #[error("incompatible shapes `{left}` and `{right}`: {detail}")]
    Structural { left: Type, right: Type, detail: String },

    #[error("effect rows `{left}` and `{right}` do not match")]
    EffectMismatch { left: EffectRow, right: EffectRow },
}

pub type UnifyResult<T> = Result<T, UnifyError>;

/// Most general unifier of two types.
pub fn unify(t1: &Type, t2: &Type) -> UnifyResult<Substitution> {
    let mut supply = VarSupply::above([t1, t2]);
    let mut unifier = Unifier::new(&mut supply);
    unifier.unify(t1, t2)?;
    Ok(unifier.into_substitution())
}

/// Most general unifier of two effect rows.
pub fn unify_rows(r1: &EffectRow, r2: &EffectRow) -> UnifyResult<Substitution> {
    let wrap = |r: &EffectRow| Type::function_with(vec![], Type::Unit, r.clone());
    let (w1, w2) = (wrap(r1), wrap(r2));
    let mut supply = VarSupply::above([&w1, &w2]);
    let mut unifier = Unifier::new(&mut supply);
    unifier.unify_rows(r1, r2)?;
    Ok(unifier.into_substitution())
}

/// Incremental unifier.
pub struct Unifier<'s> {
    subst: Substitution,
    supply: &'s mut VarSupply,
}

impl<'s> Unifier<'s> {
    pub fn new(supply: &'s mut VarSupply) -> Self {
        Self::with_substitution(Substitution::new(), supply)
    }

    /// Continues from an existing (idempotent) substitution.
    pub fn with_substitution(subst: Substitution, supply: &'s mut VarSupply) -> Self {
        Self { subst, supply }
    }

    pub fn substitution(&self) -> &Substitution {
        &self.subst
    }

    pub fn into_substitution(self) -> Substitution {
        self.subst
    }

    fn bind_type(&mut self, var: TypeVar, ty: &Type) -> UnifyResult<()> {
        if *ty == Type::Var(var) {
            return Ok(());
        }
        if ty.free_type_vars().contains(&var) {
            return Err(UnifyError::OccursCheck {
                var,
                ty: ty.clone(),
            });
        }
        trace!(%var, %ty, "bind type variable");
        self.subst = Substitution::singleton_type(var, ty.clone()).compose(&self.subst);
        Ok(())
    }

    fn bind_effect(&mut self, var: EffectVar, row: EffectRow) -> UnifyResult<()> {
        if row == EffectRow::var(var) {
            return Ok(());
        }
        if row.free_effect_vars().contains(&var) {
            return Err(UnifyError::RowOccursCheck { var, row });
        }
        trace!(%var, %row, "bind effect variable");
        self.subst = Substitution::singleton_effect(var, row).compose(&self.subst);
        Ok(())
    }

    pub fn unify(&mut self, t1: &Type, t2: &Type) -> UnifyResult<()> {
        let t1 = t1.apply(&self.subst);
        let t2 = t2.apply(&self.subst);

        match (&t1, &t2) {
            // Same type
            _ if t1 == t2 => Ok(()),

            // Sentinels unify with anything, binding nothing
            (Type::Error | Type::Unknown, _) | (_, Type::Error | Type::Unknown) => Ok(()),

            (Type::Var(var), _) => self.bind_type(*var, &t2),
            (_, Type::Var(var)) => self.bind_type(*var, &t1),

            (Type::Array(a), Type::Array(b))
            | (Type::Ai(a), Type::Ai(b))
            | (Type::Effect(a), Type::Effect(b)) => self.unify(a, b),

            (
                Type::Reference {
                    mutable: m1,
                    inner: i1,
                },
                Type::Reference {
                    mutable: m2,
                    inner: i2,
                },
            ) if m1 == m2 => self.unify(i1, i2),

            (Type::Tuple(ts1), Type::Tuple(ts2)) => {
                if ts1.len() != ts2.len() {
                    return Err(UnifyError::Structural {
                        left: t1.clone(),
                        right: t2.clone(),
                        detail: format!("tuples of {} and {} elements", ts1.len(), ts2.len()),
                    });
                }
                for (a, b) in ts1.iter().zip(ts2) {
                    self.unify(a, b)?;
                }
                Ok(())
            }

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
                if p1.len() != p2.len() {
                    return Err(UnifyError::Structural {
                        left: t1.clone(),
                        right: t2.clone(),
                        detail: format!("functions of {} and {} parameters", p1.len(), p2.len()),
                    });
                }
                for (a, b) in p1.iter().zip(p2) {
                    self.unify(a, b)?;
                }
                self.unify(r1, r2)?;
                self.unify_rows(e1, e2)
            }

            (Type::Record(a), Type::Record(b)) => self.unify_records(a, b, &t1, &t2),

            (
                Type::Named {
                    id: id1, args: a1, ..
                },
                Type::Named {
                    id: id2, args: a2, ..
                },
            ) if id1 == id2 && a1.len() == a2.len() => {
                for (a, b) in a1.iter().zip(a2) {
                    self.unify(a, b)?;
                }
                Ok(())
            }

            (Type::Forall { .. }, Type::Forall { .. }) if alpha_eq(&t1, &t2) => Ok(()),

            // No match
            _ => Err(UnifyError::Mismatch {
                left: t1.clone(),
                right: t2.clone(),
            }),
        }
    }

    /// Every field of the smaller record must exist in the larger one.
    fn unify_records(&mut self, a: &RecordType, b: &RecordType, t1: &Type, t2: &Type) -> UnifyResult<()> {
        let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
        for (label, ty) in small.iter() {
            match large.get(label) {
                Some(other) => self.unify(ty, other)?,
                None => {
                    return Err(UnifyError::Structural {
                        left: t1.clone(),
                        right: t2.clone(),
                        detail: format!("field `{}` is missing", label),
                    })
                }
            }
        }
        Ok(())
    }

    /// Pairs effects of two rows by label, unifying their type arguments.
    /// Identical effects are paired first, so a repeated label only binds
    /// variables against the partners nothing else can take.
    /// Returns the effects of each side that found no partner.
    fn match_labels(&mut self, r1: &EffectRow, r2: &EffectRow) -> UnifyResult<(Vec<Effect>, Vec<Effect>)> {
        let left: Vec<&Effect> = r1.iter().collect();
        let right: Vec<&Effect> = r2.iter().collect();
        let mut partner: Vec<Option<usize>> = vec![None; left.len()];
        let mut used = vec![false; right.len()];

        for (i, e1) in left.iter().enumerate() {
            if let Some(j) = (0..right.len()).find(|&j| !used[j] && right[j] == *e1) {
                used[j] = true;
                partner[i] = Some(j);
            }
        }
        for (i, e1) in left.iter().enumerate() {
            if partner[i].is_some() {
                continue;
            }
            let Some(j) = (0..right.len()).find(|&j| !used[j] && right[j].label() == e1.label()) else {
                continue;
            };
            used[j] = true;
            partner[i] = Some(j);
            let (a1, a2) = (e1.type_args(), right[j].type_args());
            if a1.len() != a2.len() {
                return Err(UnifyError::EffectMismatch {
                    left: r1.clone(),
                    right: r2.clone(),
                });
            }
            for (x, y) in a1.into_iter().zip(a2) {
                self.unify(x, y)?;
            }
        }

        let only_left = left
            .iter()
            .zip(&partner)
            .filter(|(_, p)| p.is_none())
            .map(|(e, _)| (*e).clone())
            .collect();
        let only_right = right
            .iter()
            .zip(&used)
            .filter(|(_, u)| !**u)
            .map(|(e, _)| (*e).clone())
            .collect();
        Ok((only_left, only_right))
    }

    /// Row unification: labels are matched pairwise, leftover labels are
    /// absorbed by the other side's tail.
    pub fn unify_rows(&mut self, r1: &EffectRow, r2: &EffectRow) -> UnifyResult<()> {
        let r1 = r1.apply(&self.subst);
        let r2 = r2.apply(&self.subst);
        if r1 == r2 {
            return Ok(());
        }

        let (only1, only2) = self.match_labels(&r1, &r2)?;
        let mismatch = || UnifyError::EffectMismatch {
            left: r1.clone(),
            right: r2.clone(),
        };

        match (r1.tail(), r2.tail()) {
            (None, None) if only1.is_empty() && only2.is_empty() => Ok(()),
            (None, None) => Err(mismatch()),
            (Some(t1), None) => {
                if !only1.is_empty() {
                    return Err(mismatch());
                }
                self.bind_effect(t1, EffectRow::closed(only2))
            }
            (None, Some(t2)) => {
                if !only2.is_empty() {
                    return Err(mismatch());
                }
                self.bind_effect(t2, EffectRow::closed(only1))
            }
            (Some(t1), Some(t2)) if t1 == t2 => {
                if only1.is_empty() && only2.is_empty() {
                    Ok(())
                } else {
                    Err(UnifyError::RowOccursCheck { var: t1, row: r1.clone() })
                }
            }
            (Some(t1), Some(t2)) => {
                if only1.is_empty() {
                    self.bind_effect(t1, EffectRow::open(only2, t2))
                } else if only2.is_empty() {
                    self.bind_effect(t2, EffectRow::open(only1, t1))
                } else {
                    let rest = self.supply.fresh_effect_var();
                    self.bind_effect(t1, EffectRow::open(only2, rest))?;
                    self.bind_effect(t2, EffectRow::open(only1, rest))
                }
            }
        }
    }

    /// Solves `sub ⊆ sup`, extending `sup`'s tail (or closing `sub`'s) as
    /// needed. Effects are matched by label and their arguments unified.
    pub fn subsume_rows(&mut self, sub: &EffectRow, sup: &EffectRow) -> UnifyResult<()> {
        let sub = sub.apply(&self.subst);
        let sup = sup.apply(&self.subst);
        if sub.is_subset_of(&sup) {
            return Ok(());
        }

        let mut extra = Vec::new();
        for effect in sub.iter() {
            if sup.contains(effect) {
                continue;
            }
            match sup.find_label(effect.label()) {
                Some(found) => {
                    let (a1, a2) = (effect.type_args(), found.type_args());
                    if a1.len() != a2.len() {
                        return Err(UnifyError::EffectMismatch {
                            left: sub.clone(),
                            right: sup.clone(),
                        });
                    }
                    for (x, y) in a1.into_iter().zip(a2) {
                        self.unify(x, y)?;
                    }
                }
                None => extra.push(effect.clone()),
            }
        }

        let sub_tail = sub.tail().filter(|t| Some(*t) != sup.tail());
        if extra.is_empty() && sub_tail.is_none() {
            return Ok(());
        }

        match sup.tail() {
            Some(rho) => {
                let rest = match sub_tail {
                    Some(sigma) => sigma,
                    None => self.supply.fresh_effect_var(),
                };
                self.bind_effect(rho, EffectRow::open(extra, rest))
            }
            None if extra.is_empty() => {
                // Only the tail of `sub` is unknown: it may use what `sup` allows.
                match sub_tail {
                    Some(sigma) => self.bind_effect(sigma, sup.clone()),
                    None => Ok(()),
                }
            }
            None => Err(UnifyError::EffectMismatch {
                left: sub.clone(),
                right: sup.clone(),
            }),
        }
    }
}
