//! Vela Static Semantics
//!
//! Type and effect checking for Vela programs.
//!
//! ## Bidirectional Type Checking
//!
//! Expressions are either synthesized (their type is computed from their
//! structure) or checked against an expected type. Checking mode lets an
//! expected function type flow into lambda parameters, and is the only
//! place structural subtyping (numeric widening, record width, variance)
//! is consulted.
//!
//! ## Effects
//!
//! Every expression has an effect row: a set of labels (`IO`, `AI`,
//! `Network`, `Async`, `State<T>`, `Exception<T>` and user effects) with an
//! optional open tail. Function types carry their latent row, `handle`
//! masks the labels it handles, and declared effect sets are checked
//! against what the body performs.
//!
//! ## Checking a Program
//!
//! 1. **Collection**: structs, effects, models, prompts and function
//!    signatures are gathered into an immutable [`Definitions`].
//! 2. **Checking**: functions are split into binding groups, checked in
//!    dependency order (independent groups in parallel) and generalized
//!    with the value restriction applied to local `let`s.
//!
//! ```rust
//! use vela_ast::build::*;
//! use vela_ast::Item;
//! use vela_types::{CheckerConfig, TypeChecker};
//!
//! let id = function("id", vec![param("x")], None, var("x"));
//! let result = TypeChecker::new(CheckerConfig::default()).check_program(&program(vec![Item::Function(id)]));
//!
//! assert!(!result.has_errors());
//! assert_eq!(result.scheme_of("id").unwrap().to_string(), "∀a. a -> a");
//! ```

pub mod binding_graph;
mod builtins;
pub mod checker;
mod collect;
pub mod config;
pub mod constraint;
pub mod defs;
pub mod effect;
pub mod env;
pub mod error;
mod error_diagnostic;
mod infer;
pub mod resolve;
pub mod scheme;
pub mod subst;
pub mod subtype;
pub mod ty;
pub mod unify;

// ============================================================================
// Re-exports
// ============================================================================

pub use checker::{CheckResult, CheckedBinding, InferredExpr, RecheckResult, TypeChecker};
pub use config::{CheckerConfig, ConfigError};
pub use constraint::Constraint;
pub use defs::{Definitions, EffectSig, FunctionSig, Global, GlobalKind, ModelConfig, OperationSig, PromptSig};
pub use effect::{infer_primitive_effect, Effect, EffectRow, EffectVar};
pub use env::{Binding, TypeEnv};
pub use error::{DiagnosticKind, TypeError, TypeSource};
pub use infer::{NodeType, NodeTypes};
pub use scheme::{generalize, instantiate, Scheme};
pub use subst::{Substitution, Types, VarSupply};
pub use subtype::is_subtype;
pub use ty::{RecordType, Type, TypeDef, TypeDefId, TypeDefs, TypeVar};
pub use unify::{unify, unify_rows, UnifyError, Unifier};
