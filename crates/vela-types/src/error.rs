//! Type errors reported by the checker.

use smol_str::SmolStr;
use thiserror::Error;
use vela_ast::Span;

use crate::effect::{Effect, EffectRow};
use crate::ty::Type;

/// Where an expected type came from.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSource {
    /// `let x: T = ...` or `(e : T)`
    Annotation(Span),
    /// Declared return type of a function
    Return(Span),
    /// Parameter of the called function
    Argument { position: usize },
    /// `if` conditions must be `Bool`
    Condition,
    /// The `then` branch fixed the type of the conditional
    ConditionalBranch(Span),
    /// Type of the assigned binding
    Assignment(Span),
    /// Declared type parameter that must stay generic
    TypeParameter(SmolStr),
    /// Operand of a binary or unary operator
    Operand { op: &'static str },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    #[error("undefined variable `{name}`")]
    UndefinedVariable {
        name: SmolStr,
        /// Similar names for typo suggestions
        similar: Vec<SmolStr>,
        span: Span,
    },

    #[error("undefined type `{name}`")]
    UndefinedType {
        name: SmolStr,
        similar: Vec<SmolStr>,
        span: Span,
    },

    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        expected: Type,
        found: Type,
        origin: Option<TypeSource>,
        span: Span,
    },

    #[error("wrong number of arguments: expected {expected}, found {found}")]
    ArityMismatch {
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("effect mismatch: declared `{declared}`, inferred `{inferred}`")]
    EffectMismatch {
        declared: EffectRow,
        inferred: EffectRow,
        span: Span,
    },

    #[error("infinite type: `{var}` occurs in `{ty}`")]
    OccursCheckFailure { var: String, ty: String, span: Span },

    #[error("incompatible shapes: {detail}")]
    StructuralMismatch { detail: String, span: Span },

    #[error("unhandled effect `{effect}` in {context}")]
    UnhandledEffect {
        effect: Effect,
        context: String,
        span: Span,
    },

    #[error("no field `{field}` on type `{ty}`")]
    UndefinedField { ty: Type, field: SmolStr, span: Span },

    #[error("undefined effect `{name}`")]
    UndefinedEffect {
        name: SmolStr,
        similar: Vec<SmolStr>,
        span: Span,
    },

    #[error("undefined operation `{name}`")]
    UndefinedOperation {
        name: SmolStr,
        effect: Option<SmolStr>,
        span: Span,
    },

    #[error("undefined AI model `{name}`")]
    UndefinedModel {
        name: SmolStr,
        similar: Vec<SmolStr>,
        span: Span,
    },

    #[error("the {kind} `{name}` is defined multiple times")]
    DuplicateDefinition {
        name: SmolStr,
        kind: &'static str,
        previous: Span,
        span: Span,
    },

    #[error("cannot assign twice to immutable variable `{name}`")]
    AssignToImmutable { name: SmolStr, span: Span },
}

/// The kind of a [`TypeError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    UndefinedVariable,
    UndefinedType,
    TypeMismatch,
    ArityMismatch,
    EffectMismatch,
    OccursCheckFailure,
    StructuralMismatch,
    UnhandledEffect,
    UndefinedField,
    UndefinedEffect,
    UndefinedOperation,
    UndefinedModel,
    DuplicateDefinition,
    AssignToImmutable,
}

impl DiagnosticKind {
    /// Stable error code: E0xxx for types, E1xxx for names, E5xxx for effects.
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticKind::TypeMismatch => "E0001",
            DiagnosticKind::ArityMismatch => "E0002",
            DiagnosticKind::OccursCheckFailure => "E0003",
            DiagnosticKind::StructuralMismatch => "E0004",
            DiagnosticKind::AssignToImmutable => "E0005",
            DiagnosticKind::UndefinedVariable => "E1001",
            DiagnosticKind::UndefinedType => "E1002",
            DiagnosticKind::UndefinedField => "E1003",
            DiagnosticKind::UndefinedEffect => "E1004",
            DiagnosticKind::UndefinedOperation => "E1005",
            DiagnosticKind::UndefinedModel => "E1006",
            DiagnosticKind::DuplicateDefinition => "E1007",
            DiagnosticKind::UnhandledEffect => "E5001",
            DiagnosticKind::EffectMismatch => "E5002",
        }
    }
}

impl TypeError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            TypeError::UndefinedVariable { .. } => DiagnosticKind::UndefinedVariable,
            TypeError::UndefinedType { .. } => DiagnosticKind::UndefinedType,
            TypeError::TypeMismatch { .. } => DiagnosticKind::TypeMismatch,
            TypeError::ArityMismatch { .. } => DiagnosticKind::ArityMismatch,
            TypeError::EffectMismatch { .. } => DiagnosticKind::EffectMismatch,
            TypeError::OccursCheckFailure { .. } => DiagnosticKind::OccursCheckFailure,
            TypeError::StructuralMismatch { .. } => DiagnosticKind::StructuralMismatch,
            TypeError::UnhandledEffect { .. } => DiagnosticKind::UnhandledEffect,
            TypeError::UndefinedField { .. } => DiagnosticKind::UndefinedField,
            TypeError::UndefinedEffect { .. } => DiagnosticKind::UndefinedEffect,
            TypeError::UndefinedOperation { .. } => DiagnosticKind::UndefinedOperation,
            TypeError::UndefinedModel { .. } => DiagnosticKind::UndefinedModel,
            TypeError::DuplicateDefinition { .. } => DiagnosticKind::DuplicateDefinition,
            TypeError::AssignToImmutable { .. } => DiagnosticKind::AssignToImmutable,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            TypeError::UndefinedVariable { span, .. }
            | TypeError::UndefinedType { span, .. }
            | TypeError::TypeMismatch { span, .. }
            | TypeError::ArityMismatch { span, .. }
            | TypeError::EffectMismatch { span, .. }
            | TypeError::OccursCheckFailure { span, .. }
            | TypeError::StructuralMismatch { span, .. }
            | TypeError::UnhandledEffect { span, .. }
            | TypeError::UndefinedField { span, .. }
            | TypeError::UndefinedEffect { span, .. }
            | TypeError::UndefinedOperation { span, .. }
            | TypeError::UndefinedModel { span, .. }
            | TypeError::DuplicateDefinition { span, .. }
            | TypeError::AssignToImmutable { span, .. } => *span,
        }
    }
}

