//! Effect handlers: `handle body { clauses }`.
//!
//! The handled labels are masked out of the body's effect row. Each clause
//! sees the operation's parameters specialized to the payload the body
//! actually performs, plus `resume`, whose own effects are the masked row.

use indexmap::IndexSet;
use vela_ast::{Expr, HandlerClause, ReturnClause};

use super::Infer;
use crate::defs::EffectSig;
use crate::effect::EffectRow;
use crate::error::TypeError;
use crate::scheme::Scheme;
use crate::ty::Type;

impl<'a> Infer<'a> {
    pub(super) fn synth_handle(
        &mut self,
        body: &Expr,
        handlers: &[HandlerClause],
        return_clause: Option<&ReturnClause>,
    ) -> (Type, EffectRow) {
        let (body_ty, body_effects) = self.synth(body);
        let body_effects = self.apply_row(&body_effects);

        let (result, mut effects) = match return_clause {
            Some(clause) => {
                self.env.push_scope();
                self.env.define(clause.param.node.clone(), Scheme::mono(self.apply(&body_ty)));
                let (ty, e) = self.synth(&clause.body);
                self.env.pop_scope();
                (ty, e)
            }
            None => (body_ty, EffectRow::pure()),
        };

        let resolved: Vec<Option<&'a EffectSig>> = handlers.iter().map(|c| self.resolve_clause(c)).collect();
        let handled: IndexSet<&str> = resolved.iter().copied().flatten().map(|sig| sig.name.as_str()).collect();
        let masked = handled.iter().fold(body_effects.clone(), |row, label| row.mask(label));
        effects = self.join(&masked, &effects);

        for (clause, sig) in handlers.iter().zip(resolved) {
            let e = match sig {
                Some(sig) => self.check_clause(clause, sig, &body_effects, &result, &masked),
                None => self.synth_unresolved_clause(clause),
            };
            effects = self.join(&effects, &e);
        }
        (self.apply(&result), effects)
    }

    /// The effect a clause handles, explicit (`Effect.op`) or found by the
    /// operation name.
    fn resolve_clause(&mut self, clause: &HandlerClause) -> Option<&'a EffectSig> {
        let defs = self.defs;
        let op = &clause.operation;
        match &clause.effect {
            Some(effect) => {
                let Some(sig) = defs.effects.get(&effect.node) else {
                    if !defs.is_failed(&effect.node) {
                        let similar = self.similar(&effect.node, defs.effects.keys().map(|k| k.as_str()));
                        self.report(TypeError::UndefinedEffect {
                            name: effect.node.clone(),
                            similar,
                            span: effect.span,
                        });
                    }
                    return None;
                };
                if !sig.operations.contains_key(&op.node) {
                    self.report(TypeError::UndefinedOperation {
                        name: op.node.clone(),
                        effect: Some(sig.name.clone()),
                        span: op.span,
                    });
                    return None;
                }
                Some(sig)
            }
            None => {
                let sig = defs.effect_of_operation(&op.node);
                if sig.is_none() {
                    self.report(TypeError::UndefinedOperation {
                        name: op.node.clone(),
                        effect: None,
                        span: op.span,
                    });
                }
                sig
            }
        }
    }

    fn check_clause(
        &mut self,
        clause: &HandlerClause,
        sig: &EffectSig,
        body_effects: &EffectRow,
        result: &Type,
        masked: &EffectRow,
    ) -> EffectRow {
        let payload = body_effects.find_label(&sig.name).cloned();
        let Some(op) = sig.instantiate_operation(&clause.operation.node, payload.as_ref(), &mut self.supply) else {
            return self.synth_unresolved_clause(clause);
        };

        if op.params.len() != clause.params.len() {
            self.report(TypeError::ArityMismatch {
                expected: op.params.len(),
                found: clause.params.len(),
                span: clause.span,
            });
        }

        self.env.push_scope();
        for (i, param) in clause.params.iter().enumerate() {
            let ty = op.params.get(i).cloned().unwrap_or(Type::Error);
            self.env.define(param.node.clone(), Scheme::mono(ty));
        }
        let resume = Type::function_with(vec![op.ret], result.clone(), masked.clone());
        self.env.define("resume", Scheme::mono(resume));
        let effects = self.check(&clause.body, result);
        self.env.pop_scope();
        effects
    }

    /// A clause whose operation is unknown is still checked, with its
    /// parameters left unconstrained.
    fn synth_unresolved_clause(&mut self, clause: &HandlerClause) -> EffectRow {
        self.env.push_scope();
        for param in &clause.params {
            self.env.define(param.node.clone(), Scheme::mono(Type::Unknown));
        }
        self.env.define("resume", Scheme::mono(Type::Unknown));
        let (_, effects) = self.synth(&clause.body);
        self.env.pop_scope();
        effects
    }
}
