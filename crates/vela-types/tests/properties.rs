//! Algebraic laws of unification, substitution and effect rows.

use proptest::prelude::*;
use vela_types::{
    is_subtype, unify, Effect, EffectRow, EffectVar, Substitution, Type, TypeDefs, TypeVar, Types, UnifyError,
};

const VARS: u32 = 4;

fn arb_effect() -> impl Strategy<Value = Effect> {
    prop_oneof![
        Just(Effect::Io),
        Just(Effect::Ai),
        Just(Effect::Network),
        Just(Effect::Async),
        Just(Effect::state(Type::Int)),
        Just(Effect::exception(Type::String)),
    ]
}

fn arb_row() -> impl Strategy<Value = EffectRow> {
    prop::collection::vec(arb_effect(), 0..4).prop_map(EffectRow::closed)
}

/// Closed rows, plus rows ending in one of a few shared tails.
fn arb_open_row() -> impl Strategy<Value = EffectRow> {
    prop_oneof![
        arb_row(),
        (prop::collection::vec(arb_effect(), 0..3), 0..VARS)
            .prop_map(|(effects, tail)| EffectRow::open(effects, EffectVar(tail))),
    ]
}

fn arb_type() -> impl Strategy<Value = Type> {
    let leaf = prop_oneof![
        Just(Type::Int),
        Just(Type::Float),
        Just(Type::String),
        Just(Type::Bool),
        Just(Type::Unit),
        (0..VARS).prop_map(|v| Type::Var(TypeVar(v))),
    ];
    leaf.prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(Type::array),
            inner.clone().prop_map(Type::ai),
            prop::collection::vec(inner.clone(), 2..4).prop_map(Type::Tuple),
            (prop::collection::vec(inner.clone(), 0..3), inner, arb_open_row())
                .prop_map(|(params, ret, effects)| Type::function_with(params, ret, effects)),
        ]
    })
}

fn arb_ground_type() -> impl Strategy<Value = Type> {
    arb_type().prop_filter("ground", |t| !t.has_vars())
}

fn arb_substitution() -> impl Strategy<Value = Substitution> {
    (
        prop::collection::vec((0..VARS, arb_type()), 0..3),
        prop::collection::vec((0..VARS, arb_open_row()), 0..3),
    )
        .prop_map(|(types, rows)| {
            let mut subst = Substitution::new();
            for (v, ty) in types {
                subst.bind_type(TypeVar(v), ty);
            }
            for (v, row) in rows {
                subst.bind_effect(EffectVar(v), row);
            }
            subst
        })
}

/// A compound type with `hole` somewhere inside it.
fn arb_containing(hole: Type) -> impl Strategy<Value = Type> {
    (arb_type(), arb_open_row()).prop_flat_map(move |(other, row)| {
        let hole = hole.clone();
        prop_oneof![
            Just(Type::array(hole.clone())),
            Just(Type::ai(hole.clone())),
            Just(Type::Tuple(vec![other.clone(), hole.clone()])),
            Just(Type::Tuple(vec![hole.clone(), other.clone()])),
            Just(Type::function(vec![other.clone()], hole.clone())),
            Just(Type::function_with(vec![hole.clone()], other.clone(), row)),
            Just(Type::array(Type::Tuple(vec![hole.clone(), other]))),
        ]
    })
}

proptest! {
    #[test]
    fn test_unify_is_reflexive(t in arb_type()) {
        let subst = unify(&t, &t).expect("a type unifies with itself");
        prop_assert!(subst.is_empty());
    }

    #[test]
    fn test_unifier_equates_both_sides(a in arb_type(), b in arb_type()) {
        if let Ok(subst) = unify(&a, &b) {
            prop_assert_eq!(a.apply(&subst), b.apply(&subst));
        }
    }

    #[test]
    fn test_unify_is_symmetric_in_success(a in arb_type(), b in arb_type()) {
        prop_assert_eq!(unify(&a, &b).is_ok(), unify(&b, &a).is_ok());
    }

    #[test]
    fn test_occurs_check_rejects_cyclic_bindings(cyclic in arb_containing(Type::Var(TypeVar(VARS)))) {
        let v = Type::Var(TypeVar(VARS));
        let left = matches!(unify(&v, &cyclic), Err(UnifyError::OccursCheck { .. }));
        let right = matches!(unify(&cyclic, &v), Err(UnifyError::OccursCheck { .. }));
        prop_assert!(left && right);
    }

    #[test]
    fn test_row_occurs_check_rejects_cyclic_tails(effects in prop::collection::vec(arb_effect(), 1..3)) {
        let tail = EffectVar(VARS);
        let f = |row: EffectRow| Type::function_with(vec![], Type::Unit, row);
        let result = unify(&f(EffectRow::var(tail)), &f(EffectRow::open(effects, tail)));
        let is_row_occurs_failure = matches!(result, Err(UnifyError::RowOccursCheck { .. }));
        prop_assert!(is_row_occurs_failure);
    }

    #[test]
    fn test_composition_applies_right_then_left(
        s1 in arb_substitution(),
        s2 in arb_substitution(),
        t in arb_type(),
    ) {
        prop_assert_eq!(t.apply(&s1.compose(&s2)), t.apply(&s2).apply(&s1));
    }

    #[test]
    fn test_subtyping_is_reflexive(t in arb_ground_type()) {
        prop_assert!(is_subtype(&TypeDefs::new(), &t, &t));
    }

    #[test]
    fn test_pure_is_the_identity_of_union(r in arb_row()) {
        prop_assert_eq!(r.union(&EffectRow::pure()), r.clone());
        prop_assert_eq!(EffectRow::pure().union(&r), r);
    }

    #[test]
    fn test_union_is_idempotent_and_commutative(a in arb_row(), b in arb_row()) {
        prop_assert_eq!(a.union(&a), a.clone());
        prop_assert_eq!(a.union(&b), b.union(&a));
    }

    #[test]
    fn test_union_is_an_upper_bound(a in arb_row(), b in arb_row()) {
        let joined = a.union(&b);
        prop_assert!(a.is_subset_of(&joined));
        prop_assert!(b.is_subset_of(&joined));
    }

    #[test]
    fn test_row_order_is_reflexive_and_transitive(a in arb_row(), x in arb_row(), y in arb_row()) {
        let b = a.union(&x);
        let c = b.union(&y);
        prop_assert!(a.is_subset_of(&a));
        prop_assert!(a.is_subset_of(&b) && b.is_subset_of(&c));
        prop_assert!(a.is_subset_of(&c));
    }

    #[test]
    fn test_masking_removes_exactly_one_label(r in arb_row(), e in arb_effect()) {
        let masked = r.clone().with_effect(e.clone()).mask(e.label());
        prop_assert!(!masked.contains_label(e.label()));
        prop_assert!(masked.is_subset_of(&r));
        prop_assert_eq!(masked.len(), r.iter().filter(|x| x.label() != e.label()).count());
    }
}
