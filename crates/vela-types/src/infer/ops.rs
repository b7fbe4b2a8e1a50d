//! Operator typing.

use vela_ast::{BinaryOp, Expr, Span, UnaryOp};

use super::Infer;
use crate::constraint::Constraint;
use crate::effect::EffectRow;
use crate::error::{TypeError, TypeSource};
use crate::ty::Type;

impl Infer<'_> {
    pub(super) fn synth_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> (Type, EffectRow) {
        let operand = Some(TypeSource::Operand { op: op.symbol() });
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let (l, r, effects) = self.synth_pair(left, right);
                (self.arithmetic(op, &l, left.span, &r, right.span), effects)
            }

            BinaryOp::Concat => {
                let l = self.check_with(left, &Type::String, operand.clone());
                let r = self.check_with(right, &Type::String, operand);
                (Type::String, self.join(&l, &r))
            }

            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let (l, r, effects) = self.synth_pair(left, right);
                let (l, r) = (self.apply(&l), self.apply(&r));
                if l == Type::String || r == Type::String {
                    self.solve(Constraint::Equal(r, l), right.span, operand);
                } else {
                    self.arithmetic(op, &l, left.span, &r, right.span);
                }
                (Type::Bool, effects)
            }

            BinaryOp::Eq | BinaryOp::NotEq => {
                let (l, r, effects) = self.synth_pair(left, right);
                let (l, r) = (self.apply(&l), self.apply(&r));
                // Numeric operands compare like `<` does; anything else must unify.
                let numeric = l.is_numeric() && r.is_numeric();
                if !numeric && self.join_types(&l, &r).is_none() {
                    let expected = self.apply(&l);
                    let found = self.apply(&r);
                    self.report(TypeError::TypeMismatch {
                        expected,
                        found,
                        origin: operand,
                        span: right.span,
                    });
                }
                (Type::Bool, effects)
            }

            BinaryOp::And | BinaryOp::Or => {
                let l = self.check_with(left, &Type::Bool, operand.clone());
                let r = self.check_with(right, &Type::Bool, operand);
                (Type::Bool, self.join(&l, &r))
            }
        }
    }

    fn synth_pair(&mut self, left: &Expr, right: &Expr) -> (Type, Type, EffectRow) {
        let (l, le) = self.synth(left);
        let (r, re) = self.synth(right);
        let effects = self.join(&le, &re);
        (l, r, effects)
    }

    /// Numeric operands. `Int` widens to `Float`; two unknowns default
    /// to `Int`.
    fn arithmetic(&mut self, op: BinaryOp, l: &Type, l_span: Span, r: &Type, r_span: Span) -> Type {
        let (l, r) = (self.apply(l), self.apply(r));
        if l.is_sentinel() || r.is_sentinel() {
            return Type::Error;
        }

        let l = self.numeric_operand(op, l, l_span);
        let r = self.numeric_operand(op, r, r_span);
        match (l, r) {
            (Some(Type::Var(a)), Some(Type::Var(b))) => {
                self.try_unify(&Type::Var(a), &Type::Int);
                self.try_unify(&Type::Var(b), &Type::Int);
                Type::Int
            }
            (Some(var @ Type::Var(_)), Some(known)) | (Some(known), Some(var @ Type::Var(_))) => {
                self.try_unify(&var, &known);
                known
            }
            (Some(Type::Float), Some(_)) | (Some(_), Some(Type::Float)) => Type::Float,
            (Some(_), Some(_)) => Type::Int,
            _ => Type::Error,
        }
    }

    /// `Some` for a numeric type or a variable; reports anything else.
    fn numeric_operand(&mut self, op: BinaryOp, ty: Type, span: Span) -> Option<Type> {
        if ty.is_numeric() || ty.is_var() {
            return Some(ty);
        }
        self.report(TypeError::TypeMismatch {
            expected: Type::Int,
            found: ty,
            origin: Some(TypeSource::Operand { op: op.symbol() }),
            span,
        });
        None
    }

    pub(super) fn synth_unary(&mut self, op: UnaryOp, operand: &Expr, span: Span) -> (Type, EffectRow) {
        match op {
            UnaryOp::Neg => {
                let (ty, effects) = self.synth(operand);
                let ty = match self.apply(&ty) {
                    sentinel if sentinel.is_sentinel() => Type::Error,
                    var @ Type::Var(_) => {
                        self.try_unify(&var, &Type::Int);
                        Type::Int
                    }
                    numeric if numeric.is_numeric() => numeric,
                    other => {
                        self.report(TypeError::TypeMismatch {
                            expected: Type::Int,
                            found: other,
                            origin: Some(TypeSource::Operand { op: "-" }),
                            span: operand.span,
                        });
                        Type::Error
                    }
                };
                (ty, effects)
            }

            UnaryOp::Not => {
                let effects = self.check_with(operand, &Type::Bool, Some(TypeSource::Operand { op: "!" }));
                (Type::Bool, effects)
            }

            UnaryOp::Ref | UnaryOp::RefMut => {
                let (ty, effects) = self.synth(operand);
                (Type::reference(op == UnaryOp::RefMut, ty), effects)
            }

            UnaryOp::Deref => {
                let (ty, effects) = self.synth(operand);
                let ty = match self.apply(&ty) {
                    Type::Reference { inner, .. } => *inner,
                    sentinel if sentinel.is_sentinel() => Type::Error,
                    var @ Type::Var(_) => {
                        let inner = self.supply.fresh();
                        self.solve(
                            Constraint::Equal(var, Type::reference(false, inner.clone())),
                            operand.span,
                            None,
                        );
                        inner
                    }
                    other => {
                        self.report(TypeError::StructuralMismatch {
                            detail: format!("cannot dereference a value of type `{}`", other),
                            span,
                        });
                        Type::Error
                    }
                };
                (ty, effects)
            }
        }
    }
}
