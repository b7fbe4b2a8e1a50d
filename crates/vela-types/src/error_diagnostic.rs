//! Conversion from [`TypeError`] to user-facing diagnostics.

use std::path::Path;

use smol_str::SmolStr;
use vela_ast::Span;
use vela_diagnostics::span::SourceSpan;
use vela_diagnostics::Diagnostic;

use crate::error::{TypeError, TypeSource};

impl TypeError {
    /// Converts this error into a [`Diagnostic`] anchored in `file`.
    pub fn to_diagnostic(&self, file: &Path) -> Diagnostic {
        let at = |span: &Span| SourceSpan::new(file, span.start, span.end);
        let code = self.kind().code();

        match self {
            // ============================================================================
            // Core type errors
            // ============================================================================
            TypeError::TypeMismatch {
                expected,
                found,
                origin,
                span,
            } => {
                let mut diag = Diagnostic::error(code, "type mismatch")
                    .with_primary_span(at(span), format!("expected `{}`, found `{}`", expected, found));

                match origin {
                    Some(TypeSource::Annotation(source)) => {
                        diag = diag.with_secondary_span(
                            at(source),
                            format!("expected `{}` due to this type annotation", expected),
                        );
                    }
                    Some(TypeSource::Return(source)) => {
                        diag = diag.with_secondary_span(at(source), format!("function returns `{}`", expected));
                    }
                    Some(TypeSource::ConditionalBranch(source)) => {
                        diag = diag.with_secondary_span(
                            at(source),
                            format!("all branches must have type `{}`", expected),
                        );
                    }
                    Some(TypeSource::Assignment(source)) => {
                        diag = diag.with_secondary_span(
                            at(source),
                            format!("assignment target has type `{}`", expected),
                        );
                    }
                    Some(TypeSource::Argument { position }) => {
                        diag = diag.with_child(Diagnostic::note(format!(
                            "argument {} of the call expects `{}`",
                            position + 1,
                            expected
                        )));
                    }
                    Some(TypeSource::Condition) => {
                        diag = diag.with_child(Diagnostic::note("conditions must be `Bool`"));
                    }
                    Some(TypeSource::TypeParameter(name)) => {
                        diag = diag.with_child(Diagnostic::note(format!(
                            "type parameter `{}` is used as `{}` in the body",
                            name, found
                        )));
                    }
                    Some(TypeSource::Operand { op }) => {
                        diag = diag.with_child(Diagnostic::note(format!("operand of `{}`", op)));
                    }
                    None => {}
                }

                if expected.is_numeric() && *found == crate::ty::Type::String {
                    diag = diag.with_child(Diagnostic::help("parse the string into a number first"));
                } else if *expected == crate::ty::Type::String && found.is_numeric() {
                    diag = diag.with_child(Diagnostic::help("convert the value with `to_string`"));
                }
                diag
            }

            TypeError::ArityMismatch { expected, found, span } => {
                Diagnostic::error(code, "wrong number of arguments").with_primary_span(
                    at(span),
                    format!("expected {} argument(s), found {}", expected, found),
                )
            }

            TypeError::OccursCheckFailure { var, ty, span } => Diagnostic::error(code, "infinite type")
                .with_primary_span(at(span), format!("`{}` would have to contain itself: `{}`", var, ty))
                .with_child(Diagnostic::help("a value cannot be passed to itself; add a type annotation")),

            TypeError::StructuralMismatch { detail, span } => {
                Diagnostic::error(code, "incompatible type shapes").with_primary_span(at(span), detail.clone())
            }

            TypeError::AssignToImmutable { name, span } => {
                Diagnostic::error(code, format!("cannot assign twice to immutable variable `{}`", name))
                    .with_primary_span(at(span), "cannot assign twice to immutable variable")
                    .with_child(Diagnostic::help(format!("declare it with `let mut {}`", name)))
            }

            // ============================================================================
            // Naming errors
            // ============================================================================
            TypeError::UndefinedVariable { name, similar, span } => {
                let diag = Diagnostic::error(code, format!("undefined variable: `{}`", name))
                    .with_primary_span(at(span), "not found in this scope");
                with_similar(diag, similar)
            }

            TypeError::UndefinedType { name, similar, span } => {
                let diag = Diagnostic::error(code, format!("undefined type: `{}`", name))
                    .with_primary_span(at(span), "type not found in this scope");
                with_similar(diag, similar)
            }

            TypeError::UndefinedField { ty, field, span } => {
                Diagnostic::error(code, format!("no field `{}` on type `{}`", field, ty))
                    .with_primary_span(at(span), "unknown field")
            }

            TypeError::UndefinedEffect { name, similar, span } => {
                let diag = Diagnostic::error(code, format!("undefined effect: `{}`", name))
                    .with_primary_span(at(span), "effect not declared");
                with_similar(diag, similar)
            }

            TypeError::UndefinedOperation { name, effect, span } => {
                let message = match effect {
                    Some(effect) => format!("effect `{}` has no operation `{}`", effect, name),
                    None => format!("no effect declares an operation `{}`", name),
                };
                Diagnostic::error(code, message).with_primary_span(at(span), "unknown operation")
            }

            TypeError::UndefinedModel { name, similar, span } => {
                let diag = Diagnostic::error(code, format!("undefined AI model: `{}`", name))
                    .with_primary_span(at(span), "model not declared");
                with_similar(diag, similar)
            }

            TypeError::DuplicateDefinition {
                name,
                kind,
                previous,
                span,
            } => Diagnostic::error(code, format!("the {} `{}` is defined multiple times", kind, name))
                .with_primary_span(at(span), format!("`{}` redefined here", name))
                .with_secondary_span(at(previous), format!("previous definition of `{}` here", name)),

            // ============================================================================
            // Effect errors
            // ============================================================================
            TypeError::UnhandledEffect { effect, context, span } => {
                Diagnostic::error(code, format!("unhandled effect `{}`", effect))
                    .with_primary_span(at(span), format!("performs `{}` in {}", effect, context))
                    .with_child(Diagnostic::help(format!(
                        "handle `{}` with a `handle` expression",
                        effect.label()
                    )))
            }

            TypeError::EffectMismatch {
                declared,
                inferred,
                span,
            } => Diagnostic::error(code, "effect mismatch")
                .with_primary_span(at(span), format!("declared `{}`, inferred `{}`", declared, inferred))
                .with_child(Diagnostic::help(
                    "add the missing effects to the signature or handle them in the body",
                )),
        }
    }
}

fn with_similar(diag: Diagnostic, similar: &[SmolStr]) -> Diagnostic {
    match similar {
        [] => diag,
        [only] => diag.with_child(Diagnostic::help(format!("a similar name exists: `{}`", only))),
        many => {
            let names = many.iter().map(|n| format!("`{}`", n)).collect::<Vec<_>>().join(", ");
            diag.with_child(Diagnostic::help(format!("similar names exist: {}", names)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Type;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mismatch_diagnostic() {
        let error = TypeError::TypeMismatch {
            expected: Type::Int,
            found: Type::String,
            origin: Some(TypeSource::Annotation(Span::new(7, 10))),
            span: Span::new(13, 16),
        };
        let diag = error.to_diagnostic(Path::new("main.vela"));
        assert_eq!(diag.code, Some("E0001"));
        assert_eq!(diag.spans.primary_span().map(|s| (s.start, s.end)), Some((13, 16)));
        assert_eq!(diag.children.len(), 1);
    }

    #[test]
    fn test_similar_names_become_help() {
        let error = TypeError::UndefinedVariable {
            name: "conut".into(),
            similar: vec!["count".into()],
            span: Span::new(0, 5),
        };
        let diag = error.to_diagnostic(Path::new("main.vela"));
        assert_eq!(diag.children[0].message, "a similar name exists: `count`");
    }
}
