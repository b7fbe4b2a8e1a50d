//! Builtin effects and functions.
//!
//! Builtin functions take their latent effect from the primitive effect
//! table, so `print` is `∀a. a -> Unit ! {IO}` and `throw` is
//! `∀a b. a -> b ! {Exception<a>}`.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::defs::{Definitions, EffectSig, Global, GlobalKind, OperationSig};
use crate::effect::{infer_primitive_effect, EffectRow};
use crate::scheme::Scheme;
use crate::ty::{Type, TypeVar};

pub(crate) fn install(defs: &mut Definitions) {
    install_effects(defs);
    install_functions(defs);
}

fn op(name: &str, params: Vec<Type>, ret: Type) -> OperationSig {
    OperationSig {
        name: name.into(),
        params,
        ret,
    }
}

fn effect(defs: &mut Definitions, name: &str, params: Vec<TypeVar>, ops: Vec<OperationSig>) {
    let operations: IndexMap<SmolStr, OperationSig> = ops.into_iter().map(|o| (o.name.clone(), o)).collect();
    defs.effects.insert(
        name.into(),
        EffectSig {
            name: name.into(),
            params,
            operations,
            builtin: true,
        },
    );
}

fn install_effects(defs: &mut Definitions) {
    let shown = Type::Var(defs.fresh_type_var());
    let shown_ln = Type::Var(defs.fresh_type_var());
    effect(
        defs,
        "IO",
        vec![],
        vec![
            op("print", vec![shown], Type::Unit),
            op("println", vec![shown_ln], Type::Unit),
            op("read_line", vec![], Type::String),
        ],
    );
    effect(defs, "Network", vec![], vec![op("fetch", vec![Type::String], Type::String)]);
    effect(defs, "Async", vec![], vec![op("sleep", vec![Type::Int], Type::Unit)]);

    let s = defs.fresh_type_var();
    effect(
        defs,
        "State",
        vec![s],
        vec![
            op("get", vec![], Type::Var(s)),
            op("put", vec![Type::Var(s)], Type::Unit),
        ],
    );

    let e = defs.fresh_type_var();
    effect(
        defs,
        "Exception",
        vec![e],
        vec![op("throw", vec![Type::Var(e)], Type::Unknown)],
    );

    effect(
        defs,
        "AI",
        vec![],
        vec![
            op("query", vec![Type::String], Type::String),
            op("verify", vec![Type::String], Type::Bool),
            op("generate", vec![Type::String], Type::String),
            op("embed", vec![Type::String], Type::array(Type::Float)),
            op("classify", vec![Type::String], Type::String),
        ],
    );
}

fn builtin(defs: &mut Definitions, name: &str, scheme: Scheme) {
    defs.globals.insert(
        name.into(),
        Global {
            scheme,
            kind: GlobalKind::Builtin,
        },
    );
}

/// Latent effect of a builtin from the primitive table.
fn latent(op: &str, payload: Option<&Type>) -> EffectRow {
    infer_primitive_effect(op, payload).unwrap_or_default()
}

fn install_functions(defs: &mut Definitions) {
    for name in ["print", "println"] {
        let a = defs.fresh_type_var();
        let ty = Type::function_with(vec![Type::Var(a)], Type::Unit, latent(name, None));
        builtin(defs, name, Scheme::poly(vec![a], vec![], ty));
    }

    let read_line = Type::function_with(vec![], Type::String, latent("read_line", None));
    builtin(defs, "read_line", Scheme::mono(read_line));

    let fetch = Type::function_with(vec![Type::String], Type::String, latent("fetch", None));
    builtin(defs, "fetch", Scheme::mono(fetch));

    let sleep = Type::function_with(vec![Type::Int], Type::Unit, latent("sleep", None));
    builtin(defs, "sleep", Scheme::mono(sleep));

    // spawn(task): the task's own effects flow into the caller.
    let a = defs.fresh_type_var();
    let e = defs.fresh_effect_var();
    let task = Type::function_with(vec![], Type::Var(a), EffectRow::var(e));
    let spawn = Type::function_with(vec![task], Type::Unit, latent("spawn", None).with_tail(Some(e)));
    builtin(defs, "spawn", Scheme::poly(vec![a], vec![e], spawn));

    let s = defs.fresh_type_var();
    let state = Type::Var(s);
    let get = Type::function_with(vec![], state.clone(), latent("get", Some(&state)));
    builtin(defs, "get", Scheme::poly(vec![s], vec![], get));

    let s = defs.fresh_type_var();
    let state = Type::Var(s);
    let put = Type::function_with(vec![state.clone()], Type::Unit, latent("put", Some(&state)));
    builtin(defs, "put", Scheme::poly(vec![s], vec![], put));

    let (e, b) = (defs.fresh_type_var(), defs.fresh_type_var());
    let error = Type::Var(e);
    let throw = Type::function_with(vec![error.clone()], Type::Var(b), latent("throw", Some(&error)));
    builtin(defs, "throw", Scheme::poly(vec![e, b], vec![], throw));

    let a = defs.fresh_type_var();
    builtin(
        defs,
        "to_string",
        Scheme::poly(vec![a], vec![], Type::function(vec![Type::Var(a)], Type::String)),
    );

    let a = defs.fresh_type_var();
    builtin(
        defs,
        "len",
        Scheme::poly(vec![a], vec![], Type::function(vec![Type::array(Type::Var(a))], Type::Int)),
    );
}
