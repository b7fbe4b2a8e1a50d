//! Let-polymorphism, recursion and the occurs check.

use pretty_assertions::assert_eq;
use vela_ast::build::*;
use vela_ast::{BinaryOp, Item};
use vela_types::{CheckResult, CheckerConfig, DiagnosticKind, Type, TypeChecker, TypeError, TypeSource};

fn checker() -> TypeChecker {
    TypeChecker::new(CheckerConfig::sequential())
}

fn check(items: Vec<Item>) -> CheckResult {
    checker().check_program(&program(items))
}

fn scheme(result: &CheckResult, name: &str) -> String {
    result
        .scheme_of(name)
        .unwrap_or_else(|| panic!("`{name}` was not checked"))
        .to_string()
}

#[test]
fn test_compose_is_fully_generic() {
    let compose = function(
        "compose",
        vec![param("f"), param("g")],
        None,
        lambda(
            vec![param("x")],
            call_named("f", vec![call_named("g", vec![var("x")])]),
        ),
    );
    let result = check(vec![Item::Function(compose)]);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    insta::assert_snapshot!(
        scheme(&result, "compose"),
        @"∀a b c e. (a -> b ! {e}, c -> a ! {e}) -> c -> b ! {e}"
    );
}

#[test]
fn test_local_polymorphism_inside_a_body() {
    let body = block(
        vec![let_("pair", lambda(vec![param("x")], tuple(vec![var("x"), var("x")])))],
        Some(tuple(vec![
            call_named("pair", vec![int(1)]),
            call_named("pair", vec![boolean(true)]),
        ])),
    );
    let result = check(vec![Item::Function(function("main", vec![], None, body))]);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    insta::assert_snapshot!(scheme(&result, "main"), @"() -> ((Int, Int), (Bool, Bool))");
}

#[test]
fn test_recursive_function_is_monomorphic_in_its_body() {
    let fact = function(
        "fact",
        vec![param("n")],
        None,
        if_else(
            binary(BinaryOp::Eq, var("n"), int(0)),
            int(1),
            binary(
                BinaryOp::Mul,
                var("n"),
                call_named("fact", vec![binary(BinaryOp::Sub, var("n"), int(1))]),
            ),
        ),
    );
    let result = check(vec![Item::Function(fact)]);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    insta::assert_snapshot!(scheme(&result, "fact"), @"Int -> Int");
}

#[test]
fn test_self_application_fails_the_occurs_check() {
    let omega = function("omega", vec![param("x")], None, call_named("x", vec![var("x")]));
    let result = check(vec![Item::Function(omega)]);
    let kinds: Vec<DiagnosticKind> = result.diagnostics.iter().map(TypeError::kind).collect();
    assert_eq!(kinds, vec![DiagnosticKind::OccursCheckFailure]);
}

#[test]
fn test_captured_parameters_stay_monomorphic() {
    // fn konst(x) { let f = |y| x; f }
    let konst = function(
        "konst",
        vec![param("x")],
        None,
        block(vec![let_("f", lambda(vec![param("y")], var("x")))], Some(var("f"))),
    );
    let result = check(vec![Item::Function(konst)]);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.scheme_of("konst").map(|s| s.vars.len()), Some(2));

    let applied = checker().infer_expr(
        &result,
        &call(call_named("konst", vec![int(1)]), vec![string("ignored")]),
    );
    assert!(applied.diagnostics.is_empty(), "{:?}", applied.diagnostics);
    assert_eq!(applied.ty, Type::Int);
    assert!(applied.effects.is_pure());
}

#[test]
fn test_expected_function_type_flows_into_lambda() {
    let apply = function(
        "apply",
        vec![
            typed_param("f", fn_ty(vec![ty("Int")], ty("Int"), None)),
            typed_param("x", ty("Int")),
        ],
        Some(ty("Int")),
        call_named("f", vec![var("x")]),
    );
    let main = function(
        "main",
        vec![],
        None,
        call_named(
            "apply",
            vec![lambda(vec![param("y")], binary(BinaryOp::Add, var("y"), int(1))), int(2)],
        ),
    );
    let result = check(vec![Item::Function(apply), Item::Function(main)]);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    insta::assert_snapshot!(scheme(&result, "main"), @"() -> Int");
}

#[test]
fn test_annotated_let_reports_its_annotation() {
    let expr = block(vec![let_typed("x", ty("Int"), string("no"))], Some(var("x")));
    let inferred = checker().infer_standalone(&expr);
    match &inferred.diagnostics[..] {
        [TypeError::TypeMismatch {
            expected,
            found,
            origin: Some(TypeSource::Annotation(_)),
            ..
        }] => assert_eq!((expected, found), (&Type::Int, &Type::String)),
        other => panic!("expected an annotation mismatch, got {other:?}"),
    }
    assert_eq!(inferred.ty, Type::Int);
}

#[test]
fn test_polymorphic_function_used_at_two_types() {
    let first = function(
        "first",
        vec![param("a"), param("b")],
        None,
        var("a"),
    );
    let main = function(
        "main",
        vec![],
        None,
        tuple(vec![
            call_named("first", vec![int(1), string("x")]),
            call_named("first", vec![string("y"), boolean(false)]),
        ]),
    );
    let result = check(vec![Item::Function(first), Item::Function(main)]);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    insta::assert_snapshot!(scheme(&result, "first"), @"∀a b. (a, b) -> a");
    insta::assert_snapshot!(scheme(&result, "main"), @"() -> (Int, String)");
}
