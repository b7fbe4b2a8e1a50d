//! End-to-end checks of small programs.

use pretty_assertions::assert_eq;
use vela_ast::build::*;
use vela_ast::{AiKind, BinaryOp, Item};
use vela_types::{CheckResult, CheckerConfig, DiagnosticKind, Effect, EffectRow, Type, TypeChecker, TypeError};

fn check(items: Vec<Item>) -> CheckResult {
    TypeChecker::new(CheckerConfig::sequential()).check_program(&program(items))
}

fn kinds(diagnostics: &[TypeError]) -> Vec<DiagnosticKind> {
    diagnostics.iter().map(TypeError::kind).collect()
}

#[test]
fn test_identity_is_polymorphic_and_pure() {
    let result = check(vec![Item::Function(function("id", vec![param("x")], None, var("x")))]);
    assert!(result.diagnostics.is_empty());
    insta::assert_snapshot!(result.scheme_of("id").unwrap().to_string(), @"∀a. a -> a");
    assert!(result.bindings["id"].effects.is_pure());
}

#[test]
fn test_printing_performs_io() {
    let f = function(
        "f",
        vec![typed_param("x", ty("Int"))],
        None,
        call_named("print", vec![var("x")]),
    );
    let result = check(vec![Item::Function(f)]);
    assert!(result.diagnostics.is_empty());
    insta::assert_snapshot!(result.scheme_of("f").unwrap().to_string(), @"Int -> Unit ! {IO}");
    assert_eq!(result.bindings["f"].effects, EffectRow::single(Effect::Io));
}

#[test]
fn test_ai_query_has_ai_type_and_effect() {
    let checker = TypeChecker::new(CheckerConfig::sequential());
    let inferred = checker.infer_standalone(&ai(AiKind::Query, vec![("prompt", string("hi"))]));
    assert!(inferred.diagnostics.is_empty());
    assert_eq!(inferred.ty, Type::ai(Type::String));
    assert_eq!(inferred.effects, EffectRow::single(Effect::Ai));
}

#[test]
fn test_mismatched_branches_report_once() {
    let checker = TypeChecker::new(CheckerConfig::sequential());
    let inferred = checker.infer_standalone(&if_else(boolean(true), int(1), string("a")));
    match &inferred.diagnostics[..] {
        [TypeError::TypeMismatch { expected, found, .. }] => {
            assert_eq!((expected, found), (&Type::Int, &Type::String));
        }
        other => panic!("expected one type mismatch, got {other:?}"),
    }
}

#[test]
fn test_handler_removes_the_handled_effect() {
    let mut risky = function("risky", vec![], Some(ty("Int")), int(0));
    risky.effects = Some(effects(
        vec![effect_app("Exception", vec![ty("String")]), effect("IO")],
        None,
    ));
    let caller = function(
        "caller",
        vec![],
        None,
        handle(
            call_named("risky", vec![]),
            vec![clause("throw", &["e"], int(0))],
            None,
        ),
    );
    let result = check(vec![Item::Function(risky), Item::Function(caller)]);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    assert_eq!(result.bindings["caller"].effects, EffectRow::single(Effect::Io));
    insta::assert_snapshot!(result.scheme_of("caller").unwrap().to_string(), @"() -> Int ! {IO}");
}

#[test]
fn test_undefined_variable_poisons_quietly() {
    let z = block(
        vec![let_("z", binary(BinaryOp::Add, var("y"), int(1)))],
        Some(binary(BinaryOp::Add, var("z"), var("z"))),
    );
    let checker = TypeChecker::new(CheckerConfig::sequential());
    let inferred = checker.infer_standalone(&z);
    assert_eq!(kinds(&inferred.diagnostics), vec![DiagnosticKind::UndefinedVariable]);
    assert_eq!(inferred.ty, Type::Error);
}

#[test]
fn test_value_restriction_keeps_applications_monomorphic() {
    // let f = pick(id); f(1); f("s")  where pick returns its argument
    let body = block(
        vec![
            let_("id", lambda(vec![param("x")], var("x"))),
            let_("f", call_named("pick", vec![var("id")])),
            expr_stmt(call_named("f", vec![int(1)])),
        ],
        Some(call_named("f", vec![string("s")])),
    );
    let pick = function("pick", vec![param("g")], None, var("g"));
    let main = function("main", vec![], None, body);
    let result = check(vec![Item::Function(pick), Item::Function(main)]);
    assert_eq!(kinds(&result.diagnostics), vec![DiagnosticKind::TypeMismatch]);
}

#[test]
fn test_let_bound_lambda_is_generalized() {
    let id = lambda(vec![param("x")], var("x"));
    let let_stmt = let_("id", id);
    let vela_ast::StmtKind::Let { id: let_id, .. } = &let_stmt.kind else {
        unreachable!()
    };
    let let_id = *let_id;
    let main = function(
        "main",
        vec![],
        None,
        block(vec![let_stmt], Some(call_named("id", vec![boolean(true)]))),
    );
    let result = check(vec![Item::Function(main)]);
    assert!(result.diagnostics.is_empty());
    let scheme = result.node_types.let_scheme(let_id).unwrap();
    insta::assert_snapshot!(scheme.to_string(), @"∀a. a -> a");
}

#[test]
fn test_structs_fields_and_subtyping() {
    let point = struct_decl("Point", &[], vec![("x", ty("Float")), ("y", ty("Float"))]);
    let norm = function(
        "norm",
        vec![typed_param("p", ty("Point"))],
        Some(ty("Float")),
        binary(
            BinaryOp::Add,
            binary(BinaryOp::Mul, field(var("p"), "x"), field(var("p"), "x")),
            binary(BinaryOp::Mul, field(var("p"), "y"), field(var("p"), "y")),
        ),
    );
    let main = function(
        "main",
        vec![],
        None,
        call_named("norm", vec![struct_init("Point", vec![("x", int(3)), ("y", float(4.0))])]),
    );
    let result = check(vec![Item::Struct(point), Item::Function(norm), Item::Function(main)]);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    insta::assert_snapshot!(result.scheme_of("main").unwrap().to_string(), @"() -> Float");
}

#[test]
fn test_user_effects_and_handlers() {
    let log = effect_decl(
        "Log",
        &[],
        vec![operation("log", vec![typed_param("msg", ty("String"))], ty("Unit"))],
    );
    let work = function(
        "work",
        vec![],
        None,
        block(vec![expr_stmt(call_named("log", vec![string("start")]))], Some(int(42))),
    );
    let quiet = function(
        "quiet",
        vec![],
        None,
        handle(
            call_named("work", vec![]),
            vec![clause("log", &["m"], call_named("resume", vec![unit()]))],
            None,
        ),
    );
    let result = check(vec![Item::Effect(log), Item::Function(work), Item::Function(quiet)]);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    insta::assert_snapshot!(result.scheme_of("work").unwrap().to_string(), @"() -> Int ! {Log}");
    insta::assert_snapshot!(result.scheme_of("quiet").unwrap().to_string(), @"() -> Int");
}

#[test]
fn test_prompts_and_models() {
    let model = model_decl("Fast", vec![("temperature", float(0.1))]);
    let prompt = prompt_decl(
        "summarize",
        vec![typed_param("text", ty("String"))],
        Some(ty("String")),
        Some("Fast"),
        binary(BinaryOp::Concat, string("Summarize: "), var("text")),
    );
    let main = function("main", vec![], None, prompt_call("summarize", vec![string("doc")]));
    let result = check(vec![Item::Model(model), Item::Prompt(prompt), Item::Function(main)]);
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    insta::assert_snapshot!(result.scheme_of("main").unwrap().to_string(), @"() -> AI<String> ! {AI}");
}
