//! Pass 2 and the public checking API.
//!
//! Collected functions are split into binding groups and checked level by
//! level. Groups of one level only read the immutable definitions and the
//! schemes published by earlier levels, so they run on the rayon pool when
//! [`CheckerConfig::parallel`] is set.

use std::path::Path;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use smol_str::SmolStr;
use tracing::{debug, instrument};
use vela_ast::{Expr, FunctionDecl, Item, Program, PromptDecl};
use vela_diagnostics::Diagnostic;

use crate::binding_graph::{build_graph, BindingGroup};
use crate::collect::{collect, function_signature, Collected};
use crate::config::CheckerConfig;
use crate::constraint::Constraint;
use crate::defs::{Definitions, FunctionSig};
use crate::effect::EffectRow;
use crate::error::{TypeError, TypeSource};
use crate::infer::{Infer, NodeTypes};
use crate::resolve::TypeScope;
use crate::scheme::{generalize, Scheme};
use crate::subst::{Types, VarSupply};
use crate::ty::Type;

/// A checked top-level function.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedBinding {
    pub scheme: Scheme,
    /// Latent effects of the function, as they appear in its scheme
    pub effects: EffectRow,
}

/// Result of checking a whole program.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub definitions: Arc<Definitions>,
    /// Checked functions in declaration order
    pub bindings: IndexMap<SmolStr, CheckedBinding>,
    pub node_types: NodeTypes,
    /// Collection diagnostics first, then checking diagnostics, each in
    /// declaration order
    pub diagnostics: Vec<TypeError>,
    /// The diagnostic budget was exhausted
    pub truncated: bool,
    /// Functions never checked because the budget ran out
    pub unchecked: Vec<SmolStr>,
}

impl CheckResult {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn scheme_of(&self, name: &str) -> Option<&Scheme> {
        self.bindings.get(name).map(|b| &b.scheme)
    }

    pub fn to_diagnostics(&self, file: &Path) -> Vec<Diagnostic> {
        self.diagnostics.iter().map(|e| e.to_diagnostic(file)).collect()
    }

    fn published(&self) -> IndexMap<SmolStr, Scheme> {
        self.bindings
            .iter()
            .map(|(name, b)| (name.clone(), b.scheme.clone()))
            .collect()
    }
}

/// Outcome of re-checking one function against an earlier result.
#[derive(Debug, Clone)]
pub struct RecheckResult {
    /// `None` when the signature itself failed to resolve
    pub binding: Option<CheckedBinding>,
    pub node_types: NodeTypes,
    pub diagnostics: Vec<TypeError>,
}

/// Type and effects of a standalone expression.
#[derive(Debug, Clone)]
pub struct InferredExpr {
    pub ty: Type,
    pub effects: EffectRow,
    pub node_types: NodeTypes,
    pub diagnostics: Vec<TypeError>,
}

#[derive(Debug, Clone, Default)]
pub struct TypeChecker {
    config: CheckerConfig,
}

/// One function taking part in Pass 2.
struct Member<'p> {
    item: usize,
    decl: &'p FunctionDecl,
    sig: FunctionSig,
}

struct GroupResult {
    bindings: Vec<(usize, SmolStr, CheckedBinding)>,
    node_types: NodeTypes,
    errors: Vec<(usize, TypeError)>,
}

impl TypeChecker {
    pub fn new(config: CheckerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    #[instrument(skip_all, fields(items = program.items.len()))]
    pub fn check_program(&self, program: &Program) -> CheckResult {
        let Collected {
            defs,
            errors: mut pass1,
            functions,
        } = collect(program, &self.config);
        debug!(functions = functions.len(), diagnostics = pass1.len(), "pass 1 done");
        let defs = Arc::new(defs);

        let members: Vec<Member<'_>> = functions
            .iter()
            .filter_map(|&item| match &program.items[item] {
                Item::Function(decl) => defs.functions.get(&decl.name.node).map(|sig| Member {
                    item,
                    decl,
                    sig: sig.clone(),
                }),
                _ => None,
            })
            .collect();
        let names: Vec<SmolStr> = members.iter().map(|m| m.decl.name.node.clone()).collect();
        let levels = build_graph(&names, members.iter().enumerate().map(|(k, m)| (k, &m.decl.body))).levels();

        let mut published: IndexMap<SmolStr, Scheme> = IndexMap::new();
        let mut bindings: Vec<(usize, SmolStr, CheckedBinding)> = Vec::new();
        let mut node_types = NodeTypes::new();
        let mut pass2: Vec<(usize, TypeError)> = Vec::new();
        let mut unchecked = Vec::new();

        for (depth, level) in levels.iter().enumerate() {
            if self.over_budget(pass1.len() + pass2.len()) {
                unchecked.extend(levels[depth..].iter().flatten().flatten().map(|&k| names[k].clone()));
                debug!(unchecked = unchecked.len(), "diagnostic budget exhausted");
                break;
            }
            debug!(depth, groups = level.len(), "checking level");

            let run = |group: &BindingGroup| {
                let group: Vec<&Member<'_>> = group.iter().map(|&k| &members[k]).collect();
                check_group(&defs, &published, &self.config, &group, defs.supply())
            };
            let results: Vec<GroupResult> = if self.config.parallel && level.len() > 1 {
                level.par_iter().map(run).collect()
            } else {
                level.iter().map(run).collect()
            };

            for result in results {
                for (_, name, binding) in &result.bindings {
                    published.insert(name.clone(), binding.scheme.clone());
                }
                bindings.extend(result.bindings);
                node_types.extend(result.node_types);
                pass2.extend(result.errors);
            }
        }

        for (item, decl) in program.items.iter().enumerate() {
            if let Item::Prompt(decl) = decl {
                let (types, errors) = check_prompt(&defs, &published, &self.config, decl);
                node_types.extend(types);
                pass2.extend(errors.into_iter().map(|e| (item, e)));
            }
        }

        bindings.sort_by_key(|(item, _, _)| *item);
        pass1.sort_by_key(|(item, _)| *item);
        pass2.sort_by_key(|(item, _)| *item);
        let mut diagnostics: Vec<TypeError> = pass1.into_iter().chain(pass2).map(|(_, e)| e).collect();

        let mut truncated = !unchecked.is_empty();
        if let Some(max) = self.config.max_diagnostics {
            if diagnostics.len() > max {
                diagnostics.truncate(max);
                truncated = true;
            }
        }
        debug!(diagnostics = diagnostics.len(), truncated, "pass 2 done");

        CheckResult {
            definitions: defs,
            bindings: bindings.into_iter().map(|(_, name, b)| (name, b)).collect(),
            node_types,
            diagnostics,
            truncated,
            unchecked,
        }
    }

    fn over_budget(&self, reported: usize) -> bool {
        self.config.max_diagnostics.is_some_and(|max| reported >= max)
    }

    /// Checks one function again against the definitions and schemes of an
    /// earlier run, for example after its body was edited.
    pub fn recheck_function(&self, previous: &CheckResult, decl: &FunctionDecl) -> RecheckResult {
        let defs = &*previous.definitions;
        let mut published = previous.published();
        published.shift_remove(&decl.name.node);

        let mut supply = defs.supply();
        let mut errors = Vec::new();
        let (sig, _) = function_signature(defs, &mut supply, &self.config, decl, &mut errors);
        if !errors.is_empty() {
            return RecheckResult {
                binding: None,
                node_types: NodeTypes::new(),
                diagnostics: errors,
            };
        }

        let member = Member { item: 0, decl, sig };
        let result = check_group(defs, &published, &self.config, &[&member], supply);
        RecheckResult {
            binding: result.bindings.into_iter().next().map(|(_, _, b)| b),
            node_types: result.node_types,
            diagnostics: result.errors.into_iter().map(|(_, e)| e).collect(),
        }
    }

    /// Infers a standalone expression in the context of a checked program.
    pub fn infer_expr(&self, context: &CheckResult, expr: &Expr) -> InferredExpr {
        let published = context.published();
        let mut infer = Infer::new(&context.definitions, &published, &self.config);
        let (ty, effects) = infer.synth(expr);
        let ty = infer.apply(&ty);
        let mut effects = infer.apply_row(&effects);
        if let Some(tail) = effects.tail() {
            if !ty.free_effect_vars().contains(&tail) {
                effects = effects.closed_part();
            }
        }
        let output = infer.finish();
        InferredExpr {
            ty,
            effects,
            node_types: output.node_types,
            diagnostics: output.errors,
        }
    }

    /// Infers an expression with only the builtins in scope.
    pub fn infer_standalone(&self, expr: &Expr) -> InferredExpr {
        let empty = Program {
            items: Vec::new(),
            span: expr.span,
        };
        let context = self.check_program(&empty);
        self.infer_expr(&context, expr)
    }
}

/// Checks a binding group: members are monomorphic in each other's bodies
/// and generalized together afterwards.
#[instrument(level = "debug", skip_all, fields(members = ?group.iter().map(|m| m.decl.name.node.as_str()).collect::<Vec<_>>()))]
fn check_group(
    defs: &Definitions,
    published: &IndexMap<SmolStr, Scheme>,
    config: &CheckerConfig,
    group: &[&Member<'_>],
    supply: VarSupply,
) -> GroupResult {
    let mut infer = Infer::with_supply(defs, published, config, supply);
    for member in group {
        infer
            .env
            .define(member.decl.name.node.clone(), Scheme::mono(member.sig.as_type()));
    }

    let mut errors = Vec::new();
    for member in group {
        check_body(&mut infer, member);
        errors.extend(infer.errors.drain(..).map(|e| (member.item, e)));
    }
    for member in group {
        check_type_params(&mut infer, member);
        errors.extend(infer.errors.drain(..).map(|e| (member.item, e)));
    }

    let bindings = group
        .iter()
        .map(|member| {
            let ty = infer.apply(&member.sig.as_type());
            let scheme = generalize(&ty, &IndexSet::new(), &IndexSet::new());
            let effects = match &scheme.ty {
                Type::Function { effects, .. } => effects.clone(),
                _ => EffectRow::pure(),
            };
            debug!(function = %member.decl.name.node, scheme = %scheme, "generalized");
            (member.item, member.decl.name.node.clone(), CheckedBinding { scheme, effects })
        })
        .collect();

    GroupResult {
        bindings,
        node_types: infer.finish().node_types,
        errors,
    }
}

fn check_body(infer: &mut Infer<'_>, member: &Member<'_>) {
    let (decl, sig) = (member.decl, &member.sig);
    infer.scope = TypeScope {
        types: sig.type_params.iter().cloned().collect(),
        ..TypeScope::default()
    };

    infer.env.push_scope();
    for (name, ty) in &sig.params {
        infer.env.define(name.clone(), Scheme::mono(ty.clone()));
    }
    let body_effects = match &decl.return_type {
        Some(te) => infer.check_with(&decl.body, &sig.ret, Some(TypeSource::Return(te.span()))),
        None => {
            let (ty, effects) = infer.synth(&decl.body);
            infer.solve(Constraint::Equal(ty, sig.ret.clone()), decl.body.span, None);
            effects
        }
    };
    infer.env.pop_scope();

    let body_effects = infer.apply_row(&body_effects);
    if sig.is_pure {
        for effect in body_effects.iter() {
            infer.report(TypeError::UnhandledEffect {
                effect: effect.clone(),
                context: format!("pure function `{}`", sig.name),
                span: decl.body.span,
            });
        }
        if let Some(tail) = body_effects.tail() {
            infer.solve(
                Constraint::EffectSubset(EffectRow::var(tail), EffectRow::pure()),
                decl.body.span,
                None,
            );
        }
    } else {
        let span = decl.effects.as_ref().map_or(decl.body.span, |a| a.span);
        infer.solve(Constraint::EffectSubset(body_effects, sig.effects.clone()), span, None);
    }
}

/// Declared type parameters must stay distinct and generic.
fn check_type_params(infer: &mut Infer<'_>, member: &Member<'_>) {
    let mut seen = IndexSet::new();
    for (name, var) in &member.sig.type_params {
        let image = infer.apply(&Type::Var(*var));
        let generic = matches!(image, Type::Var(v) if seen.insert(v));
        if !generic {
            infer.report(TypeError::TypeMismatch {
                expected: Type::Var(*var),
                found: image,
                origin: Some(TypeSource::TypeParameter(name.clone())),
                span: member.decl.span,
            });
        }
    }
}

/// Prompt templates are strings and must not perform effects.
fn check_prompt(
    defs: &Definitions,
    published: &IndexMap<SmolStr, Scheme>,
    config: &CheckerConfig,
    decl: &PromptDecl,
) -> (NodeTypes, Vec<TypeError>) {
    let mut infer = Infer::new(defs, published, config);
    if let Some(sig) = defs.prompts.get(&decl.name.node) {
        for (name, ty) in &sig.params {
            infer.env.define(name.clone(), Scheme::mono(ty.clone()));
        }
    }
    let effects = infer.check(&decl.template, &Type::String);
    let effects = infer.apply_row(&effects);
    for effect in effects.iter() {
        infer.report(TypeError::UnhandledEffect {
            effect: effect.clone(),
            context: format!("prompt `{}`", decl.name.node),
            span: decl.template.span,
        });
    }
    let output = infer.finish();
    (output.node_types, output.errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;
    use pretty_assertions::assert_eq;
    use vela_ast::build::*;

    fn check(items: Vec<Item>) -> CheckResult {
        TypeChecker::new(CheckerConfig::sequential()).check_program(&program(items))
    }

    fn kinds(result: &CheckResult) -> Vec<DiagnosticKind> {
        result.diagnostics.iter().map(TypeError::kind).collect()
    }

    #[test]
    fn test_functions_checked_in_dependency_order() {
        // `twice` is declared after its use and still generalized first.
        let main = function(
            "main",
            vec![],
            None,
            tuple(vec![
                call_named("twice", vec![lambda(vec![param("n")], var("n")), int(1)]),
                call_named("twice", vec![lambda(vec![param("s")], var("s")), string("a")]),
            ]),
        );
        let twice = function(
            "twice",
            vec![param("f"), param("x")],
            None,
            call(var("f"), vec![call(var("f"), vec![var("x")])]),
        );
        let result = check(vec![Item::Function(main), Item::Function(twice)]);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        assert_eq!(result.bindings.keys().collect::<Vec<_>>(), vec!["main", "twice"]);
        insta::assert_snapshot!(result.scheme_of("twice").unwrap().to_string(), @"∀a e. (a -> a ! {e}, a) -> a ! {e}");
        insta::assert_snapshot!(result.scheme_of("main").unwrap().to_string(), @"() -> (Int, String)");
    }

    #[test]
    fn test_mutual_recursion_shares_effects() {
        let ping = function(
            "ping",
            vec![typed_param("n", ty("Int"))],
            Some(ty("Unit")),
            if_else(
                binary(vela_ast::BinaryOp::Gt, var("n"), int(0)),
                call_named("pong", vec![binary(vela_ast::BinaryOp::Sub, var("n"), int(1))]),
                unit(),
            ),
        );
        let pong = function(
            "pong",
            vec![typed_param("n", ty("Int"))],
            Some(ty("Unit")),
            block(
                vec![expr_stmt(call_named("print", vec![var("n")]))],
                Some(call_named("ping", vec![var("n")])),
            ),
        );
        let result = check(vec![Item::Function(ping), Item::Function(pong)]);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        assert_eq!(result.bindings["ping"].effects, EffectRow::single(crate::effect::Effect::Io));
        assert_eq!(result.bindings["pong"].effects, EffectRow::single(crate::effect::Effect::Io));
    }

    #[test]
    fn test_declared_return_type_mismatch() {
        let f = function("f", vec![], Some(ty("Int")), string("no"));
        let result = check(vec![Item::Function(f)]);
        match &result.diagnostics[..] {
            [TypeError::TypeMismatch { origin, .. }] => assert!(matches!(origin, Some(TypeSource::Return(_)))),
            other => panic!("unexpected diagnostics: {other:?}"),
        }
    }

    #[test]
    fn test_declared_effects_must_cover_body() {
        let mut f = function("f", vec![], None, call_named("fetch", vec![string("u")]));
        f.effects = Some(effects(vec![effect("IO")], None));
        let result = check(vec![Item::Function(f)]);
        assert_eq!(kinds(&result), vec![DiagnosticKind::EffectMismatch]);
    }

    #[test]
    fn test_pure_function_reports_each_effect() {
        let mut f = function(
            "f",
            vec![],
            None,
            block(
                vec![expr_stmt(call_named("print", vec![int(1)]))],
                Some(call_named("fetch", vec![string("u")])),
            ),
        );
        f.is_pure = true;
        let result = check(vec![Item::Function(f)]);
        assert_eq!(
            kinds(&result),
            vec![DiagnosticKind::UnhandledEffect, DiagnosticKind::UnhandledEffect]
        );
        assert!(result.bindings["f"].effects.is_pure());
    }

    #[test]
    fn test_specialized_type_parameter() {
        let mut f = function("f", vec![typed_param("x", ty("T"))], None, binary(vela_ast::BinaryOp::Add, var("x"), int(1)));
        f.type_params = vec![ident("T")];
        let result = check(vec![Item::Function(f)]);
        match &result.diagnostics[..] {
            [TypeError::TypeMismatch { found, origin, .. }] => {
                assert_eq!(found, &Type::Int);
                assert_eq!(origin, &Some(TypeSource::TypeParameter("T".into())));
            }
            other => panic!("unexpected diagnostics: {other:?}"),
        }
    }

    #[test]
    fn test_prompt_templates_are_checked() {
        let prompt = prompt_decl(
            "greet",
            vec![param("name")],
            None,
            None,
            binary(vela_ast::BinaryOp::Concat, string("Hello "), call_named("read_line", vec![])),
        );
        let result = check(vec![Item::Prompt(prompt)]);
        assert_eq!(kinds(&result), vec![DiagnosticKind::UnhandledEffect]);
    }

    #[test]
    fn test_recheck_and_infer_expr() {
        let id = function("id", vec![param("x")], None, var("x"));
        let checker = TypeChecker::new(CheckerConfig::sequential());
        let result = checker.check_program(&program(vec![Item::Function(id)]));

        let edited = function("id", vec![param("x")], Some(ty("Int")), var("x"));
        let recheck = checker.recheck_function(&result, &edited);
        assert!(recheck.diagnostics.is_empty());
        assert_eq!(recheck.binding.map(|b| b.scheme.to_string()), Some("Int -> Int".to_string()));

        let inferred = checker.infer_expr(&result, &call_named("id", vec![string("s")]));
        assert_eq!(inferred.ty, Type::String);
        assert!(inferred.effects.is_pure());
        assert!(inferred.diagnostics.is_empty());
    }
}
