//! Constraints and their incremental solution.
//!
//! Constraints are solved as soon as they are generated. A failed
//! constraint leaves the substitution untouched and becomes one diagnostic
//! at the site that produced it.

use tracing::trace;
use vela_ast::Span;

use crate::effect::EffectRow;
use crate::error::{TypeError, TypeSource};
use crate::infer::Infer;
use crate::subst::Types;
use crate::subtype::is_subtype;
use crate::ty::Type;
use crate::unify::{UnifyError, Unifier};

/// `found` comes first in every variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// `τ₁ = τ₂`
    Equal(Type, Type),
    /// `τ₁ ≤ τ₂`; solved by subtyping when both sides are known, by
    /// unification otherwise
    Subtype(Type, Type),
    /// `ε₁ ⊆ ε₂`
    EffectSubset(EffectRow, EffectRow),
}

impl Infer<'_> {
    /// Solves `constraint` against the current substitution. Returns false
    /// (after reporting the failure) when it cannot be satisfied.
    pub(crate) fn solve(&mut self, constraint: Constraint, span: Span, origin: Option<TypeSource>) -> bool {
        let mut unifier = Unifier::with_substitution(self.subst.clone(), &mut self.supply);
        let result = match &constraint {
            Constraint::Equal(found, expected) => unifier.unify(found, expected),
            Constraint::Subtype(found, expected) => {
                let found = found.apply(unifier.substitution());
                let expected = expected.apply(unifier.substitution());
                if is_subtype(&self.defs.types, &found, &expected) {
                    Ok(())
                } else {
                    unifier.unify(&found, &expected)
                }
            }
            Constraint::EffectSubset(found, allowed) => unifier.subsume_rows(found, allowed),
        };

        match result {
            Ok(()) => {
                self.subst = unifier.into_substitution();
                trace!(?constraint, "solved");
                true
            }
            Err(err) => {
                drop(unifier);
                let error = self.constraint_error(err, &constraint, span, origin);
                self.report(error);
                false
            }
        }
    }

    /// Solves silently; used where a failure has a better diagnostic than
    /// the constraint would give.
    pub(crate) fn try_unify(&mut self, a: &Type, b: &Type) -> bool {
        let mut unifier = Unifier::with_substitution(self.subst.clone(), &mut self.supply);
        if unifier.unify(a, b).is_ok() {
            self.subst = unifier.into_substitution();
            true
        } else {
            false
        }
    }

    /// Makes two rows share one tail before they are joined.
    pub(crate) fn unify_tails(&mut self, a: &EffectRow, b: &EffectRow) {
        if let (Some(x), Some(y)) = (a.tail(), b.tail()) {
            if x != y {
                let mut unifier = Unifier::with_substitution(self.subst.clone(), &mut self.supply);
                if unifier.unify_rows(&EffectRow::var(x), &EffectRow::var(y)).is_ok() {
                    self.subst = unifier.into_substitution();
                }
            }
        }
    }

    fn constraint_error(
        &self,
        err: UnifyError,
        constraint: &Constraint,
        span: Span,
        origin: Option<TypeSource>,
    ) -> TypeError {
        match err {
            UnifyError::OccursCheck { var, ty } => TypeError::OccursCheckFailure {
                var: var.to_string(),
                ty: ty.apply(&self.subst).to_string(),
                span,
            },
            UnifyError::RowOccursCheck { var, row } => TypeError::OccursCheckFailure {
                var: var.to_string(),
                ty: row.apply(&self.subst).to_string(),
                span,
            },
            _ => match constraint {
                Constraint::EffectSubset(found, allowed) => TypeError::EffectMismatch {
                    declared: allowed.apply(&self.subst),
                    inferred: found.apply(&self.subst),
                    span,
                },
                Constraint::Equal(found, expected) | Constraint::Subtype(found, expected) => {
                    let found = found.apply(&self.subst);
                    let expected = expected.apply(&self.subst);
                    match err {
                        UnifyError::Structural { detail, .. } => TypeError::StructuralMismatch {
                            detail: format!("expected `{}`, found `{}`: {}", expected, found, detail),
                            span,
                        },
                        _ => TypeError::TypeMismatch {
                            expected,
                            found,
                            origin,
                            span,
                        },
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckerConfig;
    use crate::defs::Definitions;
    use crate::effect::Effect;
    use crate::error::DiagnosticKind;
    use crate::ty::TypeVar;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn with_infer(f: impl FnOnce(&mut Infer<'_>)) {
        let defs = Definitions::with_builtins();
        let published = IndexMap::new();
        let config = CheckerConfig::default();
        let mut infer = Infer::new(&defs, &published, &config);
        f(&mut infer);
    }

    #[test]
    fn test_subtype_uses_widening_before_unification() {
        with_infer(|infer| {
            assert!(infer.solve(Constraint::Subtype(Type::Int, Type::Float), Span::dummy(), None));
            assert!(infer.errors.is_empty());
        });
    }

    #[test]
    fn test_failed_constraint_leaves_substitution_alone() {
        with_infer(|infer| {
            let a = infer.supply.fresh();
            let pair = Type::Tuple(vec![a.clone(), Type::Int]);
            let other = Type::Tuple(vec![Type::Bool, Type::String]);
            assert!(!infer.solve(Constraint::Equal(pair, other), Span::new(3, 4), None));
            assert_eq!(infer.apply(&a), a);
            match &infer.errors[..] {
                [TypeError::TypeMismatch {
                    expected, found, span, ..
                }] => {
                    assert_eq!(expected.to_string(), "(Bool, String)");
                    assert_eq!(found.to_string(), format!("({}, Int)", a));
                    assert_eq!(*span, Span::new(3, 4));
                }
                other => panic!("unexpected errors: {other:?}"),
            }
        });
    }

    #[test]
    fn test_occurs_check_is_reported() {
        with_infer(|infer| {
            let a = Type::Var(TypeVar(1000));
            let f = Type::function(vec![a.clone()], Type::Int);
            assert!(!infer.solve(Constraint::Equal(a, f), Span::dummy(), None));
            assert_eq!(infer.errors[0].kind(), DiagnosticKind::OccursCheckFailure);
        });
    }

    #[test]
    fn test_effect_subset_failure_is_effect_mismatch() {
        with_infer(|infer| {
            let inferred = EffectRow::closed([Effect::Io, Effect::Network]);
            let declared = EffectRow::single(Effect::Io);
            assert!(!infer.solve(
                Constraint::EffectSubset(inferred.clone(), declared.clone()),
                Span::dummy(),
                None
            ));
            assert_eq!(
                infer.errors,
                vec![TypeError::EffectMismatch {
                    declared,
                    inferred,
                    span: Span::dummy(),
                }]
            );
        });
    }
}
