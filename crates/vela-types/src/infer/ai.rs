//! AI constructs: `ai <kind> { fields }`, `ai! { prompt }` and prompt
//! invocation. Every one of them performs the `AI` effect.

use smol_str::SmolStr;
use vela_ast::{AiKind, Expr, ExprKind, FieldInit, Span};

use super::Infer;
use crate::effect::{Effect, EffectRow};
use crate::error::{TypeError, TypeSource};
use crate::ty::Type;

/// Expected type of a known field, `None` for `model`.
fn field_type(name: &str) -> Option<Option<Type>> {
    let ty = match name {
        "prompt" | "system" | "context" | "input" | "text" => Type::String,
        "temperature" => Type::Float,
        "max_tokens" => Type::Int,
        "labels" | "categories" => Type::array(Type::String),
        "model" => return Some(None),
        _ => return None,
    };
    Some(Some(ty))
}

fn result_type(kind: AiKind) -> Type {
    let inner = match kind {
        AiKind::Query | AiKind::Generate | AiKind::Classify => Type::String,
        AiKind::Verify => Type::Bool,
        AiKind::Embed => Type::array(Type::Float),
    };
    Type::ai(inner)
}

fn required_field(kind: AiKind) -> &'static str {
    match kind {
        AiKind::Embed => "input",
        _ => "prompt",
    }
}

impl Infer<'_> {
    pub(super) fn synth_ai(&mut self, kind: AiKind, fields: &[FieldInit], span: Span) -> (Type, EffectRow) {
        let result = result_type(kind);
        let mut effects = EffectRow::single(Effect::Ai);

        let unique = self.unique_fields(fields);
        for field in &unique {
            let e = match field_type(&field.name.node) {
                Some(Some(expected)) => self.check(&field.value, &expected),
                Some(None) => self.model_field(&field.value),
                None => {
                    self.report(TypeError::UndefinedField {
                        ty: result.clone(),
                        field: field.name.node.clone(),
                        span: field.name.span,
                    });
                    self.synth(&field.value).1
                }
            };
            effects = self.join(&effects, &e);
        }

        let required = required_field(kind);
        if !unique.iter().any(|f| f.name.node == required) {
            self.report(TypeError::StructuralMismatch {
                detail: format!("`ai {}` requires a `{}` field", kind.op_name(), required),
                span,
            });
        }
        (result, effects)
    }

    /// `model: Name` refers to a declared model; anything else must be a
    /// model name as a string.
    fn model_field(&mut self, value: &Expr) -> EffectRow {
        let ExprKind::Ident(name) = &value.kind else {
            return self.check(value, &Type::String);
        };
        let defs = self.defs;
        if !defs.models.contains_key(name) && !defs.is_failed(name) {
            let similar = self.similar(name, defs.models.keys().map(SmolStr::as_str));
            self.report(TypeError::UndefinedModel {
                name: name.clone(),
                similar,
                span: value.span,
            });
        }
        EffectRow::pure()
    }

    pub(super) fn synth_ai_inline(&mut self, prompt: &Expr) -> (Type, EffectRow) {
        let e = self.check(prompt, &Type::String);
        let effects = self.join(&EffectRow::single(Effect::Ai), &e);
        (Type::ai(Type::String), effects)
    }

    pub(super) fn synth_prompt_call(
        &mut self,
        name: &SmolStr,
        name_span: Span,
        args: &[Expr],
        span: Span,
    ) -> (Type, EffectRow) {
        let defs = self.defs;
        let mut effects = EffectRow::single(Effect::Ai);

        let Some(sig) = defs.prompts.get(name) else {
            if !defs.is_failed(name) {
                let similar = self.similar(name, defs.prompts.keys().map(SmolStr::as_str));
                self.report(TypeError::UndefinedVariable {
                    name: name.clone(),
                    similar,
                    span: name_span,
                });
            }
            effects = self.synth_all(args, effects);
            return (Type::Unknown, effects);
        };

        if sig.params.len() != args.len() {
            self.report(TypeError::ArityMismatch {
                expected: sig.params.len(),
                found: args.len(),
                span,
            });
            effects = self.synth_all(args, effects);
            return (Type::ai(sig.output.clone()), effects);
        }

        for (position, (arg, (_, param))) in args.iter().zip(&sig.params).enumerate() {
            let e = self.check_with(arg, param, Some(TypeSource::Argument { position }));
            effects = self.join(&effects, &e);
        }
        (Type::ai(sig.output.clone()), effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckerConfig;
    use crate::defs::{Definitions, ModelConfig, PromptSig};
    use crate::error::DiagnosticKind;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use vela_ast::build::*;

    fn defs() -> Definitions {
        let mut defs = Definitions::with_builtins();
        defs.models.insert(
            "Fast".into(),
            ModelConfig {
                name: "Fast".into(),
                fields: IndexMap::new(),
                span: Span::dummy(),
            },
        );
        defs.prompts.insert(
            "summarize".into(),
            PromptSig {
                name: "summarize".into(),
                params: vec![("text".into(), Type::String)],
                output: Type::String,
                model: Some("Fast".into()),
                span: Span::dummy(),
            },
        );
        defs
    }

    fn synth(expr: &Expr) -> (Type, EffectRow, Vec<DiagnosticKind>) {
        let defs = defs();
        let published = IndexMap::new();
        let config = CheckerConfig::default();
        let mut infer = Infer::new(&defs, &published, &config);
        let (ty, effects) = infer.synth(expr);
        let (ty, effects) = (infer.apply(&ty), infer.apply_row(&effects));
        (ty, effects, infer.errors.iter().map(TypeError::kind).collect())
    }

    #[test]
    fn test_result_shapes() {
        let cases = [
            (AiKind::Query, "prompt", "AI<String>"),
            (AiKind::Verify, "prompt", "AI<Bool>"),
            (AiKind::Generate, "prompt", "AI<String>"),
            (AiKind::Classify, "prompt", "AI<String>"),
            (AiKind::Embed, "input", "AI<[Float]>"),
        ];
        for (kind, field, expected) in cases {
            let (ty, effects, errors) = synth(&ai(kind, vec![(field, string("x"))]));
            assert_eq!(ty.to_string(), expected);
            assert_eq!(effects, EffectRow::single(Effect::Ai));
            assert!(errors.is_empty(), "{kind:?}: {errors:?}");
        }
    }

    #[test]
    fn test_field_table() {
        let e = ai(
            AiKind::Classify,
            vec![
                ("prompt", string("p")),
                ("model", var("Fast")),
                ("temperature", int(1)),
                ("max_tokens", int(20)),
                ("labels", array(vec![string("a"), string("b")])),
            ],
        );
        assert!(synth(&e).2.is_empty());

        let e = ai(AiKind::Query, vec![("prompt", int(3)), ("color", string("red"))]);
        assert_eq!(
            synth(&e).2,
            vec![DiagnosticKind::TypeMismatch, DiagnosticKind::UndefinedField]
        );
    }

    #[test]
    fn test_required_field_and_unknown_model() {
        let e = ai(AiKind::Query, vec![("model", var("Fats"))]);
        assert_eq!(
            synth(&e).2,
            vec![DiagnosticKind::UndefinedModel, DiagnosticKind::StructuralMismatch]
        );
    }

    #[test]
    fn test_field_effects_are_included() {
        let e = ai(AiKind::Query, vec![("prompt", call_named("read_line", vec![]))]);
        let (_, effects, errors) = synth(&e);
        assert!(errors.is_empty());
        assert!(effects.contains(&Effect::Ai) && effects.contains(&Effect::Io));
    }

    #[test]
    fn test_inline_and_prompt_calls() {
        let (ty, effects, errors) = synth(&ai_inline(string("hello")));
        assert_eq!((ty, errors), (Type::ai(Type::String), vec![]));
        assert_eq!(effects, EffectRow::single(Effect::Ai));

        let (ty, _, errors) = synth(&prompt_call("summarize", vec![string("doc")]));
        assert_eq!((ty, errors), (Type::ai(Type::String), vec![]));

        assert_eq!(synth(&prompt_call("summarize", vec![])).2, vec![DiagnosticKind::ArityMismatch]);
        assert_eq!(
            synth(&prompt_call("sumarize", vec![string("doc")])).2,
            vec![DiagnosticKind::UndefinedVariable]
        );
    }
}
