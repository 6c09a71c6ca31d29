//! Constant-expression evaluation.
//!
//! Two walkers over the expression arena: a verifier that decides
//! whether an expression is a constant expression (every leaf a literal
//! or a PARAMETER whose initializer is itself constant), and a 64-bit
//! signed integer evaluator with checked arithmetic. Both are used for
//! array bounds, kind selectors and PARAMETER initialization.

use crate::ast::{BinaryOp, DeclKind, ExprKind, UnaryOp, VarKind};
use crate::context::AstContext;
use crate::ids::ExprId;

/// Returns true iff `expr` is a constant expression.
pub fn is_constant_expr(ctx: &AstContext, expr: ExprId) -> bool {
    verify(ctx, expr, &mut None)
}

/// Collect the non-constant sub-expressions of `expr` for diagnostics.
/// If the walk finds none yet the expression is non-constant as a whole,
/// the expression itself is reported.
pub fn gather_non_constants(ctx: &AstContext, expr: ExprId) -> Vec<ExprId> {
    let mut found = Some(Vec::new());
    verify(ctx, expr, &mut found);
    let mut result = found.unwrap();
    if result.is_empty() && !is_constant_expr(ctx, expr) {
        result.push(expr);
    }
    result
}

fn verify(ctx: &AstContext, expr: ExprId, non_constants: &mut Option<Vec<ExprId>>) -> bool {
    match &ctx.expr(expr).kind {
        ExprKind::IntegerConstant(_)
        | ExprKind::RealConstant(_)
        | ExprKind::CharacterConstant(_)
        | ExprKind::LogicalConstant(_) => true,
        ExprKind::Unary { expr: sub, .. }
        | ExprKind::ImplicitCast { expr: sub }
        | ExprKind::Conversion { expr: sub, .. } => verify(ctx, *sub, non_constants),
        ExprKind::Binary { lhs, rhs, .. } => {
            let lhs_ok = verify(ctx, *lhs, non_constants);
            let rhs_ok = verify(ctx, *rhs, non_constants);
            lhs_ok && rhs_ok
        }
        ExprKind::Var(decl) => match &ctx.decl(*decl).kind {
            DeclKind::Var {
                var_kind: VarKind::Parameter,
                init: Some(init),
                ..
            } => verify(ctx, *init, non_constants),
            _ => {
                if let Some(list) = non_constants {
                    list.push(expr);
                }
                false
            }
        },
        _ => {
            if let Some(list) = non_constants {
                list.push(expr);
            }
            false
        }
    }
}

/// Evaluate `expr` as a 64-bit signed integer constant.
///
/// Returns `None` on overflow, on non-integer operands, or on any
/// sub-expression that cannot be folded. `**` expands to repeated
/// multiplication with a per-step overflow check; a negative exponent
/// fails the fold.
pub fn eval_int(ctx: &AstContext, expr: ExprId) -> Option<i64> {
    if !ctx.types.is_integer(ctx.expr_ty(expr).ty) {
        return None;
    }
    eval(ctx, expr)
}

fn eval(ctx: &AstContext, expr: ExprId) -> Option<i64> {
    match &ctx.expr(expr).kind {
        ExprKind::IntegerConstant(value) => Some(*value),
        ExprKind::Unary { op, expr: sub } => {
            let value = eval(ctx, *sub)?;
            match op {
                UnaryOp::Plus => Some(value),
                UnaryOp::Minus => value.checked_neg(),
                UnaryOp::Not => None,
            }
        }
        ExprKind::ImplicitCast { expr: sub } | ExprKind::Conversion { expr: sub, .. } => {
            eval_int(ctx, *sub)
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let lhs = eval(ctx, *lhs)?;
            let rhs = eval(ctx, *rhs)?;
            match op {
                BinaryOp::Add => lhs.checked_add(rhs),
                BinaryOp::Sub => lhs.checked_sub(rhs),
                BinaryOp::Mul => lhs.checked_mul(rhs),
                BinaryOp::Div => lhs.checked_div(rhs),
                BinaryOp::Pow => {
                    if rhs < 0 {
                        return None;
                    }
                    let mut product: i64 = 1;
                    for _ in 0..rhs {
                        product = product.checked_mul(lhs)?;
                    }
                    Some(product)
                }
                _ => None,
            }
        }
        ExprKind::Var(decl) => match &ctx.decl(*decl).kind {
            DeclKind::Var {
                var_kind: VarKind::Parameter,
                init: Some(init),
                ..
            } => eval(ctx, *init),
            _ => None,
        },
        _ => None,
    }
}

/// Evaluate the bounds of an explicit-shape dimension: a missing lower
/// bound defaults to 1.
pub fn eval_bounds(
    ctx: &AstContext,
    lower: Option<ExprId>,
    upper: ExprId,
) -> Option<(i64, i64)> {
    let lb = match lower {
        Some(lower) => eval_int(ctx, lower)?,
        None => 1,
    };
    let ub = eval_int(ctx, upper)?;
    Some((lb, ub))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Decl, DeclKind, VarKind};
    use crate::source::Span;
    use crate::types::{QualType, Qualifiers, Ty};

    fn int_expr(ctx: &mut AstContext, value: i64) -> ExprId {
        ctx.alloc_expr(
            ExprKind::IntegerConstant(value),
            QualType::new(Ty::INTEGER),
            Span::default(),
        )
    }

    fn binary(ctx: &mut AstContext, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        ctx.alloc_expr(
            ExprKind::Binary { op, lhs, rhs },
            QualType::new(Ty::INTEGER),
            Span::default(),
        )
    }

    #[test]
    fn test_eval_arithmetic() {
        let mut ctx = AstContext::new();
        let two = int_expr(&mut ctx, 2);
        let three = int_expr(&mut ctx, 3);

        let sum = binary(&mut ctx, BinaryOp::Add, two, three);
        assert_eq!(eval_int(&ctx, sum), Some(5));

        let pow = binary(&mut ctx, BinaryOp::Pow, two, three);
        assert_eq!(eval_int(&ctx, pow), Some(8));
    }

    #[test]
    fn test_eval_overflow_fails() {
        let mut ctx = AstContext::new();
        let big = int_expr(&mut ctx, i64::MAX);
        let two = int_expr(&mut ctx, 2);

        let product = binary(&mut ctx, BinaryOp::Mul, big, two);
        assert_eq!(eval_int(&ctx, product), None);

        let pow = binary(&mut ctx, BinaryOp::Pow, two, big);
        // 2 ** huge overflows on an early step rather than looping forever.
        assert_eq!(eval_int(&ctx, pow), None);
    }

    #[test]
    fn test_negative_exponent_fails() {
        let mut ctx = AstContext::new();
        let two = int_expr(&mut ctx, 2);
        let minus_one = int_expr(&mut ctx, -1);
        let pow = binary(&mut ctx, BinaryOp::Pow, two, minus_one);
        assert_eq!(eval_int(&ctx, pow), None);
    }

    #[test]
    fn test_parameter_reference_folds() {
        let mut ctx = AstContext::new();
        let init = int_expr(&mut ctx, 10);
        let name = ctx.intern_ident("N");
        let mut quals = Qualifiers::new();
        quals.add_apv(Qualifiers::PARAMETER);
        let decl = ctx.alloc_decl(Decl::new(
            DeclKind::Var {
                ty: QualType::with_quals(Ty::INTEGER, quals),
                var_kind: VarKind::Parameter,
                init: Some(init),
            },
            Some(name),
            Span::default(),
        ));
        let var = ctx.alloc_expr(
            ExprKind::Var(decl),
            QualType::new(Ty::INTEGER),
            Span::default(),
        );

        assert!(is_constant_expr(&ctx, var));
        assert_eq!(eval_int(&ctx, var), Some(10));
    }

    #[test]
    fn test_non_constant_reported() {
        let mut ctx = AstContext::new();
        let name = ctx.intern_ident("X");
        let decl = ctx.alloc_decl(Decl::new(
            DeclKind::Var {
                ty: QualType::new(Ty::INTEGER),
                var_kind: VarKind::Local,
                init: None,
            },
            Some(name),
            Span::default(),
        ));
        let var = ctx.alloc_expr(
            ExprKind::Var(decl),
            QualType::new(Ty::INTEGER),
            Span::default(),
        );
        let one = int_expr(&mut ctx, 1);
        let sum = binary(&mut ctx, BinaryOp::Add, var, one);

        assert!(!is_constant_expr(&ctx, sum));
        assert_eq!(gather_non_constants(&ctx, sum), vec![var]);
        assert_eq!(eval_int(&ctx, sum), None);
    }

    #[test]
    fn test_eval_bounds_defaults_lower() {
        let mut ctx = AstContext::new();
        let upper = int_expr(&mut ctx, 8);
        assert_eq!(eval_bounds(&ctx, None, upper), Some((1, 8)));

        let lower = int_expr(&mut ctx, 0);
        assert_eq!(eval_bounds(&ctx, Some(lower), upper), Some((0, 8)));
    }
}
