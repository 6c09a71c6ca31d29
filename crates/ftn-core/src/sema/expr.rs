//! Expression typing actions.

use super::Sema;
use crate::ast::{BinaryOp, ConversionKind, DeclKind, ExprKind, UnaryOp};
use crate::ids::{DeclId, ExprId};
use crate::interner::Name;
use crate::keywords::Builtin;
use crate::source::Span;
use crate::types::{DimSpec, QualType, Ty, TypeSpec};

/// Arithmetic promotion order: INTEGER < REAL < DOUBLE PRECISION <
/// COMPLEX.
fn promotion_rank(spec: TypeSpec) -> Option<u8> {
    match spec {
        TypeSpec::Integer => Some(0),
        TypeSpec::Real => Some(1),
        TypeSpec::DoublePrecision => Some(2),
        TypeSpec::Complex => Some(3),
        TypeSpec::Character | TypeSpec::Logical => None,
    }
}

fn spec_ty(spec: TypeSpec) -> Ty {
    match spec {
        TypeSpec::Integer => Ty::INTEGER,
        TypeSpec::Real => Ty::REAL,
        TypeSpec::DoublePrecision => Ty::DOUBLE_PRECISION,
        TypeSpec::Complex => Ty::COMPLEX,
        TypeSpec::Character => Ty::CHARACTER,
        TypeSpec::Logical => Ty::LOGICAL,
    }
}

impl<'a> Sema<'a> {
    // ========================================================================
    // Literals
    // ========================================================================

    pub fn act_on_int_literal(&mut self, spelling: &str, span: Span) -> Option<ExprId> {
        match spelling.parse::<i64>() {
            Ok(value) => Some(self.ctx.alloc_expr(
                ExprKind::IntegerConstant(value),
                QualType::new(Ty::INTEGER),
                span,
            )),
            Err(_) => {
                self.ctx
                    .diagnostics
                    .error(span, "integer constant out of range");
                None
            }
        }
    }

    /// A real literal; a `D` exponent selects DOUBLE PRECISION.
    pub fn act_on_real_literal(&mut self, spelling: &str, span: Span) -> Option<ExprId> {
        let double = spelling.contains(['d', 'D']);
        let normalized = spelling.replace(['d', 'D'], "E");
        match normalized.parse::<f64>() {
            Ok(value) => {
                let ty = if double { Ty::DOUBLE_PRECISION } else { Ty::REAL };
                Some(self.ctx.alloc_expr(
                    ExprKind::RealConstant(value),
                    QualType::new(ty),
                    span,
                ))
            }
            Err(_) => {
                self.ctx.diagnostics.error(span, "invalid real constant");
                None
            }
        }
    }

    pub fn act_on_char_literal(&mut self, value: String, span: Span) -> ExprId {
        self.ctx.alloc_expr(
            ExprKind::CharacterConstant(value),
            QualType::new(Ty::CHARACTER),
            span,
        )
    }

    pub fn act_on_logical_literal(&mut self, value: bool, span: Span) -> ExprId {
        self.ctx.alloc_expr(
            ExprKind::LogicalConstant(value),
            QualType::new(Ty::LOGICAL),
            span,
        )
    }

    // ========================================================================
    // References
    // ========================================================================

    /// A bare identifier in expression position.
    pub fn act_on_var_reference(&mut self, name: Name, span: Span) -> Option<ExprId> {
        let decl = match self.lookup(name) {
            Some(decl) => {
                if self.ctx.decl(decl).ty().map(|t| t.ty) == Some(Ty::ERROR)
                    && self.ctx.decl(decl).implicit
                {
                    self.resolve_implicit_type(decl);
                }
                decl
            }
            None => self.act_on_implicit_entity_decl(name, span)?,
        };
        self.act_on_decl_reference(decl, span)
    }

    pub fn act_on_decl_reference(&mut self, decl: DeclId, span: Span) -> Option<ExprId> {
        let ty = match self.ctx.decl(decl).ty() {
            Some(ty) => ty,
            None => {
                let spelling = self
                    .ctx
                    .decl_name(decl)
                    .map(|n| self.ctx.str(n))
                    .unwrap_or_default();
                self.ctx
                    .diagnostics
                    .error(span, format!("'{}' is not a variable", spelling));
                return None;
            }
        };
        Some(self.ctx.alloc_expr(ExprKind::Var(decl), ty, span))
    }

    /// An undeclared name used as a function: synthesize an external
    /// function declaration with an implicitly typed result.
    pub fn act_on_implicit_external_function(&mut self, name: Name, span: Span) -> Option<DeclId> {
        let result = self.implicit_type_for(name, span);
        if result.ty == Ty::ERROR {
            return None;
        }
        let decl = self.ctx.alloc_decl(crate::ast::Decl::new(
            DeclKind::Function {
                context: crate::ast::DeclContext::new(),
                result,
                args: Vec::new(),
                body: None,
                body_expr: None,
            },
            Some(name),
            span,
        ));
        self.ctx.decl_mut(decl).implicit = true;
        self.ctx.add_to_context(self.current_context(), decl);
        self.payload_insert(name, decl);
        Some(decl)
    }

    pub(crate) fn payload_insert(&mut self, name: Name, decl: DeclId) {
        self.payload.insert(name, decl);
    }

    // ========================================================================
    // Operators
    // ========================================================================

    pub fn act_on_unary_expr(&mut self, op: UnaryOp, expr: ExprId, span: Span) -> Option<ExprId> {
        let ty = self.ctx.expr_ty(expr);
        let elem = self.ctx.types.self_or_element(ty.ty);
        let ok = match op {
            UnaryOp::Plus | UnaryOp::Minus => self.ctx.types.is_arithmetic(elem),
            UnaryOp::Not => self.ctx.types.is_logical(elem),
        };
        if !ok {
            let type_string = self.ctx.type_string(ty);
            self.ctx.diagnostics.error(
                span,
                format!(
                    "invalid operand to a unary '{}' expression ('{}')",
                    op.as_str(),
                    type_string
                ),
            );
            return None;
        }
        Some(self.ctx.alloc_expr(ExprKind::Unary { op, expr }, ty, span))
    }

    pub fn act_on_binary_expr(
        &mut self,
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
        span: Span,
    ) -> Option<ExprId> {
        let lhs_ty = self.ctx.expr_ty(lhs);
        let rhs_ty = self.ctx.expr_ty(rhs);
        if self.ctx.types.is_error(lhs_ty.ty) || self.ctx.types.is_error(rhs_ty.ty) {
            return None;
        }

        if op.is_arithmetic() {
            return self.typecheck_arithmetic_binary(op, lhs, rhs, span);
        }

        let lhs_elem = self.ctx.types.self_or_element(lhs_ty.ty);
        let rhs_elem = self.ctx.types.self_or_element(rhs_ty.ty);

        if op == BinaryOp::Concat {
            if !self.ctx.types.is_character(lhs_elem) || !self.ctx.types.is_character(rhs_elem) {
                self.report_invalid_operands(op, lhs_ty, rhs_ty, span);
                return None;
            }
            let ty = self.elemental_result(Ty::CHARACTER, lhs_ty.ty, rhs_ty.ty, span)?;
            return Some(self.ctx.alloc_expr(
                ExprKind::Binary { op, lhs, rhs },
                QualType::new(ty),
                span,
            ));
        }

        if op.is_relational() {
            let arithmetic =
                self.ctx.types.is_arithmetic(lhs_elem) && self.ctx.types.is_arithmetic(rhs_elem);
            let character =
                self.ctx.types.is_character(lhs_elem) && self.ctx.types.is_character(rhs_elem);
            if !arithmetic && !character {
                self.report_invalid_operands(op, lhs_ty, rhs_ty, span);
                return None;
            }
            let (lhs, rhs) = if arithmetic {
                self.promote_operands(lhs, rhs)?
            } else {
                (lhs, rhs)
            };
            let lhs_full = self.ctx.expr_ty(lhs).ty;
            let rhs_full = self.ctx.expr_ty(rhs).ty;
            let ty = self.elemental_result(Ty::LOGICAL, lhs_full, rhs_full, span)?;
            return Some(self.ctx.alloc_expr(
                ExprKind::Binary { op, lhs, rhs },
                QualType::new(ty),
                span,
            ));
        }

        // Logical operators.
        if !self.ctx.types.is_logical(lhs_elem) || !self.ctx.types.is_logical(rhs_elem) {
            self.report_invalid_operands(op, lhs_ty, rhs_ty, span);
            return None;
        }
        let ty = self.elemental_result(Ty::LOGICAL, lhs_ty.ty, rhs_ty.ty, span)?;
        Some(self.ctx.alloc_expr(
            ExprKind::Binary { op, lhs, rhs },
            QualType::new(ty),
            span,
        ))
    }

    fn typecheck_arithmetic_binary(
        &mut self,
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
        span: Span,
    ) -> Option<ExprId> {
        let lhs_ty = self.ctx.expr_ty(lhs);
        let rhs_ty = self.ctx.expr_ty(rhs);
        let lhs_elem = self.ctx.types.self_or_element(lhs_ty.ty);
        let rhs_elem = self.ctx.types.self_or_element(rhs_ty.ty);
        if !self.ctx.types.is_arithmetic(lhs_elem) || !self.ctx.types.is_arithmetic(rhs_elem) {
            self.report_invalid_operands(op, lhs_ty, rhs_ty, span);
            return None;
        }

        let (lhs, rhs) = self.promote_operands(lhs, rhs)?;
        let elem = self
            .ctx
            .types
            .self_or_element(self.ctx.expr_ty(lhs).ty);
        let lhs_full = self.ctx.expr_ty(lhs).ty;
        let rhs_full = self.ctx.expr_ty(rhs).ty;
        let ty = self.elemental_result(elem, lhs_full, rhs_full, span)?;
        Some(self.ctx.alloc_expr(
            ExprKind::Binary { op, lhs, rhs },
            QualType::new(ty),
            span,
        ))
    }

    /// Apply the usual arithmetic promotions, wrapping the lower-ranked
    /// operand in an ImplicitCast to the common element type.
    fn promote_operands(&mut self, lhs: ExprId, rhs: ExprId) -> Option<(ExprId, ExprId)> {
        let lhs_elem = self
            .ctx
            .types
            .self_or_element(self.ctx.expr_ty(lhs).ty);
        let rhs_elem = self
            .ctx
            .types
            .self_or_element(self.ctx.expr_ty(rhs).ty);
        let lhs_spec = self.ctx.types.spec(lhs_elem)?;
        let rhs_spec = self.ctx.types.spec(rhs_elem)?;
        let lhs_rank = promotion_rank(lhs_spec)?;
        let rhs_rank = promotion_rank(rhs_spec)?;

        if lhs_rank == rhs_rank {
            return Some((lhs, rhs));
        }
        if lhs_rank < rhs_rank {
            let cast = self.implicit_cast(lhs, spec_ty(rhs_spec));
            Some((cast, rhs))
        } else {
            let cast = self.implicit_cast(rhs, spec_ty(lhs_spec));
            Some((lhs, cast))
        }
    }

    /// Wrap `expr` in an ImplicitCast to `target_elem`, preserving
    /// array-ness.
    fn implicit_cast(&mut self, expr: ExprId, target_elem: Ty) -> ExprId {
        let ty = self.ctx.expr_ty(expr).ty;
        let span = self.ctx.expr_span(expr);
        let cast_ty = match self.ctx.types.array_dims(ty) {
            Some(dims) => {
                let dims = dims.to_vec();
                self.ctx.types.intern_array(target_elem, dims)
            }
            None => target_elem,
        };
        self.ctx.alloc_expr(
            ExprKind::ImplicitCast { expr },
            QualType::new(cast_ty),
            span,
        )
    }

    /// Compute the type of an elemental operation: scalar when both
    /// operands are scalar, otherwise an array of `elem` with the array
    /// operand's shape. Both-array operands must agree in rank.
    fn elemental_result(&mut self, elem: Ty, lhs: Ty, rhs: Ty, span: Span) -> Option<Ty> {
        let lhs_dims = self.ctx.types.array_dims(lhs).map(|d| d.to_vec());
        let rhs_dims = self.ctx.types.array_dims(rhs).map(|d| d.to_vec());
        match (lhs_dims, rhs_dims) {
            (None, None) => Some(elem),
            (Some(dims), None) | (None, Some(dims)) => {
                Some(self.ctx.types.intern_array(elem, dims))
            }
            (Some(lhs_dims), Some(rhs_dims)) => {
                if lhs_dims.len() != rhs_dims.len() {
                    self.ctx
                        .diagnostics
                        .error(span, "incompatible array ranks in expression");
                    return None;
                }
                Some(self.ctx.types.intern_array(elem, lhs_dims))
            }
        }
    }

    fn report_invalid_operands(
        &mut self,
        op: BinaryOp,
        lhs: QualType,
        rhs: QualType,
        span: Span,
    ) {
        let lhs_string = self.ctx.type_string(lhs);
        let rhs_string = self.ctx.type_string(rhs);
        self.ctx.diagnostics.error(
            span,
            format!(
                "invalid operands to a binary '{}' expression ('{}' and '{}')",
                op.as_str(),
                lhs_string,
                rhs_string
            ),
        );
    }

    // ========================================================================
    // Subscripts and substrings
    // ========================================================================

    /// `target(sub, sub, ...)` where `target` is an array variable.
    pub fn act_on_array_element(
        &mut self,
        target: ExprId,
        subscripts: Vec<ExprId>,
        span: Span,
    ) -> Option<ExprId> {
        let target_ty = self.ctx.expr_ty(target);
        let Some(dims) = self.ctx.types.array_dims(target_ty.ty).map(|d| d.len()) else {
            let type_string = self.ctx.type_string(target_ty);
            self.ctx.diagnostics.error(
                span,
                format!("subscripted value is not an array ('{}')", type_string),
            );
            return None;
        };

        if subscripts.len() != dims {
            self.ctx.diagnostics.error(
                span,
                format!(
                    "array subscript count mismatch (expected {}, got {})",
                    dims,
                    subscripts.len()
                ),
            );
            return None;
        }

        let mut ok = true;
        for &subscript in &subscripts {
            let sub_ty = self.ctx.expr_ty(subscript).ty;
            if self.ctx.types.is_error(sub_ty) {
                ok = false;
            } else if !self.ctx.types.is_integer(sub_ty) {
                let sub_span = self.ctx.expr_span(subscript);
                self.ctx
                    .diagnostics
                    .error(sub_span, "expected an integer expression");
                ok = false;
            }
        }
        if !ok {
            return None;
        }

        let elem = self.ctx.types.self_or_element(target_ty.ty);
        Some(self.ctx.alloc_expr(
            ExprKind::ArrayElement { target, subscripts },
            QualType::with_quals(elem, target_ty.quals),
            span,
        ))
    }

    /// `base(lower : upper)` on a character base.
    pub fn act_on_substring(
        &mut self,
        base: ExprId,
        lower: Option<ExprId>,
        upper: Option<ExprId>,
        span: Span,
    ) -> Option<ExprId> {
        let base_ty = self.ctx.expr_ty(base);
        if !self.ctx.types.is_character(base_ty.ty) {
            let type_string = self.ctx.type_string(base_ty);
            self.ctx.diagnostics.error(
                span,
                format!("substring of a non-character value ('{}')", type_string),
            );
            return None;
        }

        let mut ok = true;
        for bound in lower.iter().chain(upper.iter()) {
            let bound_ty = self.ctx.expr_ty(*bound).ty;
            if self.ctx.types.is_error(bound_ty) {
                ok = false;
            } else if !self.ctx.types.is_integer(bound_ty) {
                let bound_span = self.ctx.expr_span(*bound);
                self.ctx
                    .diagnostics
                    .error(bound_span, "expected an integer expression");
                ok = false;
            }
        }
        if !ok {
            return None;
        }

        Some(self.ctx.alloc_expr(
            ExprKind::Substring { base, lower, upper },
            QualType::new(Ty::CHARACTER),
            span,
        ))
    }

    // ========================================================================
    // Array constructors
    // ========================================================================

    /// `(/ item, item, ... /)`: all items must share one type; the
    /// result is a rank-1 array of that type.
    pub fn act_on_array_constructor(&mut self, items: Vec<ExprId>, span: Span) -> Option<ExprId> {
        if items.is_empty() {
            self.ctx
                .diagnostics
                .error(span, "array constructor cannot be empty");
            return None;
        }
        let elem = self.ctx.expr_ty(items[0]).ty;
        for &item in &items[1..] {
            let item_ty = self.ctx.expr_ty(item).ty;
            if item_ty != elem {
                let item_span = self.ctx.expr_span(item);
                let lhs_string = self.ctx.types.to_string(elem);
                let rhs_string = self.ctx.types.to_string(item_ty);
                self.ctx.diagnostics.error(
                    item_span,
                    format!(
                        "array constructor items must have the same type ('{}' and '{}')",
                        lhs_string, rhs_string
                    ),
                );
                return None;
            }
        }

        let upper = self.ctx.alloc_expr(
            ExprKind::IntegerConstant(items.len() as i64),
            QualType::new(Ty::INTEGER),
            span,
        );
        let ty = self.ctx.types.intern_array(
            elem,
            vec![DimSpec::Explicit { lower: None, upper }],
        );
        Some(self.ctx.alloc_expr(
            ExprKind::ArrayConstructor { items },
            QualType::new(ty),
            span,
        ))
    }

    // ========================================================================
    // Calls
    // ========================================================================

    pub fn act_on_intrinsic_call(
        &mut self,
        builtin: Builtin,
        args: Vec<ExprId>,
        span: Span,
    ) -> Option<ExprId> {
        let (min_arity, max_arity) = match builtin {
            Builtin::Mod => (2, 2),
            Builtin::Min | Builtin::Max => (2, usize::MAX),
            Builtin::Cmplx => (1, 2),
            _ => (1, 1),
        };
        if args.len() < min_arity || args.len() > max_arity {
            self.ctx.diagnostics.error(
                span,
                format!(
                    "invalid number of arguments to intrinsic '{}'",
                    builtin.name()
                ),
            );
            return None;
        }

        let arg_elems: Vec<Ty> = args
            .iter()
            .map(|&a| {
                let ty = self.ctx.expr_ty(a).ty;
                self.ctx.types.self_or_element(ty)
            })
            .collect();

        let all_arithmetic = arg_elems.iter().all(|&t| self.ctx.types.is_arithmetic(t));
        let invalid_arg = |sema: &mut Self, index: usize| {
            let arg_ty = sema.ctx.expr_ty(args[index]);
            let type_string = sema.ctx.type_string(arg_ty);
            sema.ctx.diagnostics.error(
                span,
                format!(
                    "invalid argument type to intrinsic '{}' ('{}')",
                    builtin.name(),
                    type_string
                ),
            );
        };

        let result_elem = match builtin {
            Builtin::Abs => {
                if !all_arithmetic {
                    invalid_arg(self, 0);
                    return None;
                }
                if self.ctx.types.is_complex(arg_elems[0]) {
                    Ty::REAL
                } else {
                    arg_elems[0]
                }
            }
            Builtin::Mod | Builtin::Min | Builtin::Max => {
                if !all_arithmetic || arg_elems.iter().any(|&t| self.ctx.types.is_complex(t)) {
                    invalid_arg(self, 0);
                    return None;
                }
                let mut best = arg_elems[0];
                for &elem in &arg_elems[1..] {
                    let best_rank = promotion_rank(self.ctx.types.spec(best)?)?;
                    let rank = promotion_rank(self.ctx.types.spec(elem)?)?;
                    if rank > best_rank {
                        best = elem;
                    }
                }
                best
            }
            Builtin::Sqrt
            | Builtin::Sin
            | Builtin::Cos
            | Builtin::Tan
            | Builtin::Exp
            | Builtin::Log
            | Builtin::Log10 => {
                let ok = matches!(
                    self.ctx.types.spec(arg_elems[0]),
                    Some(TypeSpec::Real) | Some(TypeSpec::DoublePrecision) | Some(TypeSpec::Complex)
                );
                if !ok {
                    invalid_arg(self, 0);
                    return None;
                }
                arg_elems[0]
            }
            Builtin::Int | Builtin::Nint => {
                if !all_arithmetic {
                    invalid_arg(self, 0);
                    return None;
                }
                Ty::INTEGER
            }
            Builtin::Real => {
                if !all_arithmetic {
                    invalid_arg(self, 0);
                    return None;
                }
                Ty::REAL
            }
            Builtin::Dble => {
                if !all_arithmetic {
                    invalid_arg(self, 0);
                    return None;
                }
                Ty::DOUBLE_PRECISION
            }
            Builtin::Cmplx => {
                if !all_arithmetic {
                    invalid_arg(self, 0);
                    return None;
                }
                Ty::COMPLEX
            }
            Builtin::Aimag => {
                if !self.ctx.types.is_complex(arg_elems[0]) {
                    invalid_arg(self, 0);
                    return None;
                }
                Ty::REAL
            }
            Builtin::Conjg => {
                if !self.ctx.types.is_complex(arg_elems[0]) {
                    invalid_arg(self, 0);
                    return None;
                }
                Ty::COMPLEX
            }
            Builtin::Char => {
                if !self.ctx.types.is_integer(arg_elems[0]) {
                    invalid_arg(self, 0);
                    return None;
                }
                Ty::CHARACTER
            }
            Builtin::Ichar | Builtin::Len => {
                if !self.ctx.types.is_character(arg_elems[0]) {
                    invalid_arg(self, 0);
                    return None;
                }
                Ty::INTEGER
            }
        };

        // Elemental: an array argument makes the result an array.
        let mut result = result_elem;
        for &arg in &args {
            let arg_ty = self.ctx.expr_ty(arg).ty;
            if let Some(dims) = self.ctx.types.array_dims(arg_ty).map(|d| d.to_vec()) {
                result = self.ctx.types.intern_array(result_elem, dims);
                break;
            }
        }

        Some(self.ctx.alloc_expr(
            ExprKind::IntrinsicCall { builtin, args },
            QualType::new(result),
            span,
        ))
    }

    /// A call to a declared function (external or statement function).
    pub fn act_on_call_expr(
        &mut self,
        function: DeclId,
        args: Vec<ExprId>,
        span: Span,
    ) -> Option<ExprId> {
        let (result, formals) = match &self.ctx.decl(function).kind {
            DeclKind::Function { result, args, .. } => (*result, args.clone()),
            _ => {
                let spelling = self
                    .ctx
                    .decl_name(function)
                    .map(|n| self.ctx.str(n))
                    .unwrap_or_default();
                self.ctx
                    .diagnostics
                    .error(span, format!("'{}' cannot be called", spelling));
                return None;
            }
        };

        let mut result = result;
        if result.ty == Ty::ERROR && self.ctx.decl(function).implicit {
            if let Some(name) = self.ctx.decl_name(function) {
                result = self.implicit_type_for(name, span);
                if let DeclKind::Function { result: slot, .. } =
                    &mut self.ctx.decl_mut(function).kind
                {
                    *slot = result;
                }
            }
        }

        // Statement functions have a known arity; external functions are
        // taken at their word.
        if self.ctx.decl(function).kind.is_statement_function() && formals.len() != args.len() {
            let spelling = self
                .ctx
                .decl_name(function)
                .map(|n| self.ctx.str(n))
                .unwrap_or_default();
            self.ctx.diagnostics.error(
                span,
                format!(
                    "invalid number of arguments to function '{}' (expected {}, got {})",
                    spelling,
                    formals.len(),
                    args.len()
                ),
            );
            return None;
        }

        Some(self.ctx.alloc_expr(
            ExprKind::Call { function, args },
            result,
            span,
        ))
    }

    // ========================================================================
    // Assignment conversions (shared with statement typing)
    // ========================================================================

    /// Apply the assignment conversion table: returns the (possibly
    /// conversion-wrapped) RHS, or `None` for an incompatible pair.
    pub fn convert_for_assignment(&mut self, lhs: QualType, rhs: ExprId) -> Option<ExprId> {
        let lhs_elem = self.ctx.types.self_or_element(lhs.ty);
        let rhs_ty = self.ctx.expr_ty(rhs).ty;
        let rhs_elem = self.ctx.types.self_or_element(rhs_ty);

        let lhs_spec = self.ctx.types.spec(lhs_elem)?;
        let rhs_spec = self.ctx.types.spec(rhs_elem)?;

        let rhs_arithmetic = promotion_rank(rhs_spec).is_some();
        let conversion = match lhs_spec {
            TypeSpec::Integer => {
                if rhs_spec == TypeSpec::Integer {
                    return Some(rhs);
                }
                rhs_arithmetic.then_some(ConversionKind::Int)?
            }
            TypeSpec::Real => {
                if rhs_spec == TypeSpec::Real {
                    return Some(rhs);
                }
                rhs_arithmetic.then_some(ConversionKind::Real)?
            }
            TypeSpec::DoublePrecision => {
                if rhs_spec == TypeSpec::DoublePrecision {
                    return Some(rhs);
                }
                rhs_arithmetic.then_some(ConversionKind::Dble)?
            }
            TypeSpec::Complex => {
                if rhs_spec == TypeSpec::Complex {
                    return Some(rhs);
                }
                rhs_arithmetic.then_some(ConversionKind::Cmplx)?
            }
            TypeSpec::Logical => {
                if rhs_spec == TypeSpec::Logical {
                    return Some(rhs);
                }
                return None;
            }
            TypeSpec::Character => {
                if rhs_spec == TypeSpec::Character {
                    return Some(rhs);
                }
                return None;
            }
        };

        let target_elem = spec_ty(lhs_spec);
        let span = self.ctx.expr_span(rhs);
        let conv_ty = match self.ctx.types.array_dims(rhs_ty).map(|d| d.to_vec()) {
            Some(dims) => self.ctx.types.intern_array(target_elem, dims),
            None => target_elem,
        };
        Some(self.ctx.alloc_expr(
            ExprKind::Conversion {
                kind: conversion,
                expr: rhs,
            },
            QualType::new(conv_ty),
            span,
        ))
    }

    pub fn report_incompatible_assignment(&mut self, loc: Span, lhs: QualType, rhs: QualType) {
        let lhs_string = self.ctx.type_string(lhs);
        let rhs_string = self.ctx.type_string(rhs);
        self.ctx.diagnostics.error(
            loc,
            format!(
                "incompatible types in assignment ('{}' and '{}')",
                lhs_string, rhs_string
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AstContext;
    use crate::sema::DeclSpec;

    fn with_program(ctx: &mut AstContext) -> Sema<'_> {
        let mut sema = Sema::new(ctx);
        sema.act_on_main_program(None, Span::default());
        sema
    }

    #[test]
    fn test_promotion_inserts_cast() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let int_expr = sema.act_on_int_literal("2", Span::default()).unwrap();
        let real_expr = sema.act_on_real_literal("1.5", Span::default()).unwrap();
        let sum = sema
            .act_on_binary_expr(BinaryOp::Add, int_expr, real_expr, Span::default())
            .unwrap();

        assert_eq!(sema.ctx.expr_ty(sum).ty, Ty::REAL);
        match &sema.ctx.expr(sum).kind {
            ExprKind::Binary { lhs, .. } => {
                assert!(matches!(
                    sema.ctx.expr(*lhs).kind,
                    ExprKind::ImplicitCast { .. }
                ));
                assert_eq!(sema.ctx.expr_ty(*lhs).ty, Ty::REAL);
            }
            other => panic!("expected binary expr, got {:?}", other),
        }
    }

    #[test]
    fn test_relational_produces_logical() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let a = sema.act_on_int_literal("1", Span::default()).unwrap();
        let b = sema.act_on_int_literal("2", Span::default()).unwrap();
        let cmp = sema
            .act_on_binary_expr(BinaryOp::Lt, a, b, Span::default())
            .unwrap();
        assert_eq!(sema.ctx.expr_ty(cmp).ty, Ty::LOGICAL);
    }

    #[test]
    fn test_concat_requires_character() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let a = sema.act_on_char_literal("AB".into(), Span::default());
        let b = sema.act_on_int_literal("1", Span::default()).unwrap();
        assert!(sema
            .act_on_binary_expr(BinaryOp::Concat, a, b, Span::default())
            .is_none());
        assert!(sema.ctx.diagnostics.has_errors());
    }

    #[test]
    fn test_assignment_conversion_table() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let table: &[(Ty, Ty, Option<Option<ConversionKind>>)] = &[
            (Ty::INTEGER, Ty::INTEGER, Some(None)),
            (Ty::INTEGER, Ty::REAL, Some(Some(ConversionKind::Int))),
            (Ty::INTEGER, Ty::DOUBLE_PRECISION, Some(Some(ConversionKind::Int))),
            (Ty::INTEGER, Ty::COMPLEX, Some(Some(ConversionKind::Int))),
            (Ty::REAL, Ty::INTEGER, Some(Some(ConversionKind::Real))),
            (Ty::REAL, Ty::REAL, Some(None)),
            (Ty::DOUBLE_PRECISION, Ty::REAL, Some(Some(ConversionKind::Dble))),
            (Ty::COMPLEX, Ty::INTEGER, Some(Some(ConversionKind::Cmplx))),
            (Ty::COMPLEX, Ty::COMPLEX, Some(None)),
            (Ty::LOGICAL, Ty::LOGICAL, Some(None)),
            (Ty::LOGICAL, Ty::INTEGER, None),
            (Ty::CHARACTER, Ty::CHARACTER, Some(None)),
            (Ty::CHARACTER, Ty::REAL, None),
            (Ty::REAL, Ty::CHARACTER, None),
            (Ty::INTEGER, Ty::LOGICAL, None),
        ];

        for &(lhs, rhs, expected) in table {
            let rhs_expr = match rhs {
                Ty::INTEGER => sema.act_on_int_literal("1", Span::default()).unwrap(),
                Ty::REAL => sema.act_on_real_literal("1.0", Span::default()).unwrap(),
                Ty::DOUBLE_PRECISION => {
                    sema.act_on_real_literal("1.0D0", Span::default()).unwrap()
                }
                Ty::LOGICAL => sema.act_on_logical_literal(true, Span::default()),
                Ty::CHARACTER => sema.act_on_char_literal("A".into(), Span::default()),
                Ty::COMPLEX => {
                    // Synthesize via CMPLX(1).
                    let one = sema.act_on_int_literal("1", Span::default()).unwrap();
                    sema.act_on_intrinsic_call(Builtin::Cmplx, vec![one], Span::default())
                        .unwrap()
                }
                _ => unreachable!(),
            };

            let result = sema.convert_for_assignment(QualType::new(lhs), rhs_expr);
            match expected {
                None => assert!(result.is_none(), "{:?} <- {:?}", lhs, rhs),
                Some(None) => {
                    assert_eq!(result, Some(rhs_expr), "{:?} <- {:?}", lhs, rhs);
                }
                Some(Some(kind)) => {
                    let converted = result.expect("conversion expected");
                    match &sema.ctx.expr(converted).kind {
                        ExprKind::Conversion { kind: actual, .. } => {
                            assert_eq!(*actual, kind, "{:?} <- {:?}", lhs, rhs)
                        }
                        other => panic!("expected conversion, got {:?}", other),
                    }
                    assert_eq!(sema.ctx.expr_ty(converted).ty, lhs);
                }
            }
        }
    }

    #[test]
    fn test_array_element_subscript_typing() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let name = sema.ctx.intern_ident("A");
        let upper = sema.act_on_int_literal("10", Span::default()).unwrap();
        let ds = DeclSpec {
            type_spec: Some(TypeSpec::Real),
            dims: vec![DimSpec::Explicit { lower: None, upper }],
            ..DeclSpec::default()
        };
        sema.act_on_entity_decl(&ds, Vec::new(), None, name, Span::default(), None)
            .unwrap();
        let var = sema.act_on_var_reference(name, Span::default()).unwrap();

        let good = sema.act_on_int_literal("3", Span::default()).unwrap();
        let element = sema
            .act_on_array_element(var, vec![good], Span::default())
            .unwrap();
        assert_eq!(sema.ctx.expr_ty(element).ty, Ty::REAL);

        let bad = sema.act_on_real_literal("1.0", Span::default()).unwrap();
        assert!(sema
            .act_on_array_element(var, vec![bad], Span::default())
            .is_none());
        assert!(sema.ctx.diagnostics.has_errors());
    }

    #[test]
    fn test_substring_bounds_must_be_integer() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let base = sema.act_on_char_literal("HELLO".into(), Span::default());
        let lo = sema.act_on_int_literal("1", Span::default()).unwrap();
        let bad_hi = sema.act_on_char_literal("FALSE".into(), Span::default());

        assert!(sema
            .act_on_substring(base, Some(lo), Some(bad_hi), Span::default())
            .is_none());
        assert!(sema.ctx.diagnostics.has_errors());
    }
}
