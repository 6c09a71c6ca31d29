//! Statement actions and control-flow checking.

use super::scope::{ForwardRef, ResolveKind};
use super::Sema;
use crate::ast::{ConstructPart, ConversionKind, DeclKind, ExprKind, LabelRef, Stmt, StmtKind};
use crate::ids::{ExprId, StmtId};
use crate::interner::Name;
use crate::source::Span;
use crate::types::Ty;

impl<'a> Sema<'a> {
    /// Allocate a statement and declare its label, if any.
    fn make_stmt(&mut self, kind: StmtKind, label: Option<ExprId>, span: Span) -> StmtId {
        let stmt = self.ctx.alloc_stmt(Stmt::new(kind, label, span));
        if let Some(label) = label {
            self.declare_statement_label(label, stmt);
        }
        stmt
    }

    /// Resolve a label reference eagerly if the label is already
    /// declared.
    fn label_reference(&mut self, label: ExprId) -> LabelRef {
        let value = self.ctx.label_value(label);
        match self.stmt_labels.resolve(value) {
            Some(target) => LabelRef::resolved(label, target),
            None => LabelRef::unresolved(label),
        }
    }

    // ========================================================================
    // Unit-bracketing statements
    // ========================================================================

    pub fn act_on_program_stmt(
        &mut self,
        name: Option<Name>,
        label: Option<ExprId>,
        span: Span,
    ) -> StmtId {
        self.make_stmt(StmtKind::Program { name }, label, span)
    }

    pub fn act_on_end_program_stmt(
        &mut self,
        name: Option<Name>,
        label: Option<ExprId>,
        span: Span,
    ) -> StmtId {
        self.make_stmt(StmtKind::EndProgram { name }, label, span)
    }

    pub fn act_on_use_stmt(&mut self, module: Name, label: Option<ExprId>, span: Span) -> StmtId {
        self.make_stmt(StmtKind::Use { module }, label, span)
    }

    pub fn act_on_import_stmt(
        &mut self,
        names: Vec<Name>,
        label: Option<ExprId>,
        span: Span,
    ) -> StmtId {
        self.make_stmt(StmtKind::Import { names }, label, span)
    }

    pub fn act_on_implicit_stmt(
        &mut self,
        rules: Option<Vec<(crate::types::QualType, Vec<crate::ast::LetterSpec>)>>,
        label: Option<ExprId>,
        span: Span,
    ) -> StmtId {
        match &rules {
            Some(rules) => {
                for (ty, letters) in rules {
                    self.act_on_implicit_rules(*ty, letters, span);
                }
            }
            None => self.act_on_implicit_none(span),
        }
        self.make_stmt(StmtKind::Implicit { rules }, label, span)
    }

    pub fn act_on_parameter_stmt(
        &mut self,
        pairs: Vec<(crate::ids::DeclId, ExprId)>,
        label: Option<ExprId>,
        span: Span,
    ) -> StmtId {
        self.make_stmt(StmtKind::Parameter { pairs }, label, span)
    }

    pub fn act_on_asynchronous_stmt(
        &mut self,
        names: Vec<Name>,
        label: Option<ExprId>,
        span: Span,
    ) -> StmtId {
        self.make_stmt(StmtKind::Asynchronous { names }, label, span)
    }

    pub fn act_on_dimension_stmt(
        &mut self,
        name: Name,
        label: Option<ExprId>,
        span: Span,
    ) -> StmtId {
        self.make_stmt(StmtKind::Dimension { name }, label, span)
    }

    pub fn act_on_external_stmt(
        &mut self,
        names: Vec<Name>,
        label: Option<ExprId>,
        span: Span,
    ) -> StmtId {
        self.make_stmt(StmtKind::External { names }, label, span)
    }

    pub fn act_on_intrinsic_stmt(
        &mut self,
        names: Vec<Name>,
        label: Option<ExprId>,
        span: Span,
    ) -> StmtId {
        self.make_stmt(StmtKind::Intrinsic { names }, label, span)
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    pub fn act_on_assignment(
        &mut self,
        lhs: ExprId,
        rhs: ExprId,
        label: Option<ExprId>,
        span: Span,
    ) -> Option<StmtId> {
        if !matches!(
            self.ctx.expr(lhs).kind,
            ExprKind::Var(_) | ExprKind::ArrayElement { .. } | ExprKind::Substring { .. }
        ) {
            let lhs_span = self.ctx.expr_span(lhs);
            self.ctx
                .diagnostics
                .error(lhs_span, "expression is not assignable");
            return None;
        }

        let lhs_ty = self.ctx.expr_ty(lhs);
        let rhs_ty = self.ctx.expr_ty(rhs);
        if self.ctx.types.is_error(lhs_ty.ty) || self.ctx.types.is_error(rhs_ty.ty) {
            return None;
        }

        // Elemental conformance: assigning an array to a scalar is an
        // error; array-to-array requires matching rank.
        let lhs_dims = self.ctx.types.array_dims(lhs_ty.ty).map(|d| d.len());
        let rhs_dims = self.ctx.types.array_dims(rhs_ty.ty).map(|d| d.len());
        match (lhs_dims, rhs_dims) {
            (None, Some(_)) => {
                self.ctx
                    .diagnostics
                    .error(span, "cannot assign an array to a scalar");
                return None;
            }
            (Some(l), Some(r)) if l != r => {
                self.ctx
                    .diagnostics
                    .error(span, "incompatible array ranks in assignment");
                return None;
            }
            _ => {}
        }

        match self.convert_for_assignment(lhs_ty, rhs) {
            Some(rhs) => Some(self.make_stmt(StmtKind::Assignment { lhs, rhs }, label, span)),
            None => {
                self.report_incompatible_assignment(span, lhs_ty, rhs_ty);
                None
            }
        }
    }

    // ========================================================================
    // GOTO family
    // ========================================================================

    pub fn act_on_goto(
        &mut self,
        destination: ExprId,
        label: Option<ExprId>,
        span: Span,
    ) -> StmtId {
        let reference = self.label_reference(destination);
        let resolved = reference.target.is_some();
        let stmt = self.make_stmt(
            StmtKind::Goto {
                destination: reference,
            },
            label,
            span,
        );
        if !resolved {
            self.stmt_labels.declare_forward(ForwardRef {
                label: destination,
                stmt,
                kind: ResolveKind::Goto,
            });
        }
        stmt
    }

    pub fn act_on_assign_stmt(
        &mut self,
        address: ExprId,
        var: ExprId,
        label: Option<ExprId>,
        span: Span,
    ) -> Option<StmtId> {
        let var_ty = self.ctx.expr_ty(var).ty;
        if !self.ctx.types.is_integer(var_ty) {
            let var_span = self.ctx.expr_span(var);
            self.ctx
                .diagnostics
                .error(var_span, "expected an integer variable");
            return None;
        }

        let reference = self.label_reference(address);
        let resolved = reference.target.is_some();
        let stmt = self.make_stmt(
            StmtKind::Assign {
                address: reference,
                var,
            },
            label,
            span,
        );
        if !resolved {
            self.stmt_labels.declare_forward(ForwardRef {
                label: address,
                stmt,
                kind: ResolveKind::Assign,
            });
        }
        Some(stmt)
    }

    pub fn act_on_assigned_goto(
        &mut self,
        var: ExprId,
        allowed: Vec<ExprId>,
        label: Option<ExprId>,
        span: Span,
    ) -> Option<StmtId> {
        let var_ty = self.ctx.expr_ty(var).ty;
        if !self.ctx.types.is_integer(var_ty) {
            let var_span = self.ctx.expr_span(var);
            self.ctx
                .diagnostics
                .error(var_span, "expected an integer variable");
            return None;
        }

        let references: Vec<LabelRef> = allowed
            .iter()
            .map(|&value| self.label_reference(value))
            .collect();
        let unresolved: Vec<usize> = references
            .iter()
            .enumerate()
            .filter(|(_, r)| r.target.is_none())
            .map(|(i, _)| i)
            .collect();

        let stmt = self.make_stmt(
            StmtKind::AssignedGoto {
                var,
                allowed: references,
            },
            label,
            span,
        );
        for index in unresolved {
            self.stmt_labels.declare_forward(ForwardRef {
                label: allowed[index],
                stmt,
                kind: ResolveKind::AssignedGoto(index),
            });
        }
        Some(stmt)
    }

    // ========================================================================
    // IF constructs
    // ========================================================================

    /// Require a scalar LOGICAL condition.
    fn check_condition(&mut self, condition: ExprId) -> bool {
        let ty = self.ctx.expr_ty(condition);
        if self.ctx.types.is_error(ty.ty) {
            return false;
        }
        if !self.ctx.types.is_logical(ty.ty) {
            let span = self.ctx.expr_span(condition);
            let type_string = self.ctx.type_string(ty);
            self.ctx.diagnostics.error(
                span,
                format!("expected a logical expression ('{}')", type_string),
            );
            return false;
        }
        true
    }

    /// A logical IF: `IF (cond) statement`.
    pub fn act_on_logical_if(
        &mut self,
        condition: ExprId,
        body: StmtId,
        label: Option<ExprId>,
        span: Span,
    ) -> Option<StmtId> {
        if !self.check_condition(condition) {
            return None;
        }
        Some(self.make_stmt(
            StmtKind::If {
                condition,
                then_stmt: Some(body),
                else_stmt: None,
                else_if: false,
            },
            label,
            span,
        ))
    }

    /// A block IF: `IF (cond) THEN`. Opens a construct on the IF stack.
    pub fn act_on_block_if(
        &mut self,
        condition: ExprId,
        label: Option<ExprId>,
        span: Span,
    ) -> Option<StmtId> {
        if !self.check_condition(condition) {
            return None;
        }
        let stmt = self.make_stmt(
            StmtKind::If {
                condition,
                then_stmt: None,
                else_stmt: None,
                else_if: false,
            },
            label,
            span,
        );
        self.if_stack.push(stmt);
        Some(stmt)
    }

    /// `ELSE IF (cond) THEN`: links the enclosing IF's else arm to a new
    /// IF and replaces it on the stack.
    pub fn act_on_else_if(
        &mut self,
        condition: ExprId,
        label: Option<ExprId>,
        span: Span,
    ) -> Option<StmtId> {
        if !self.check_condition(condition) {
            return None;
        }
        let Some(enclosing) = self.if_stack.pop() else {
            self.ctx
                .diagnostics
                .error(span, "ELSE IF statement not in an IF construct");
            return None;
        };
        let stmt = self.make_stmt(
            StmtKind::If {
                condition,
                then_stmt: None,
                else_stmt: None,
                else_if: true,
            },
            label,
            span,
        );
        if let StmtKind::If { else_stmt, .. } = &mut self.ctx.stmt_mut(enclosing).kind {
            *else_stmt = Some(stmt);
        }
        self.if_stack.push(stmt);
        Some(stmt)
    }

    /// `ELSE`: links the enclosing IF's else arm to the marker. The
    /// construct stays open until END IF.
    pub fn act_on_else(&mut self, label: Option<ExprId>, span: Span) -> Option<StmtId> {
        let Some(&enclosing) = self.if_stack.last() else {
            self.ctx
                .diagnostics
                .error(span, "ELSE statement not in an IF construct");
            return None;
        };
        let stmt = self.make_stmt(StmtKind::Else, label, span);
        if let StmtKind::If { else_stmt, .. } = &mut self.ctx.stmt_mut(enclosing).kind {
            *else_stmt = Some(stmt);
        }
        Some(stmt)
    }

    /// `END IF`: closes the innermost construct.
    pub fn act_on_end_if(&mut self, label: Option<ExprId>, span: Span) -> Option<StmtId> {
        if self.if_stack.pop().is_none() {
            self.ctx
                .diagnostics
                .error(span, "END IF statement not in an IF construct");
            return None;
        }
        Some(self.make_stmt(StmtKind::EndIf, label, span))
    }

    // ========================================================================
    // DO loops
    // ========================================================================

    fn check_do_operand(&mut self, expr: ExprId, what: &str) -> bool {
        let ty = self.ctx.expr_ty(expr);
        if self.ctx.types.is_error(ty.ty) {
            return false;
        }
        let ok = self.ctx.types.is_integer(ty.ty)
            || self.ctx.types.is_real(ty.ty)
            || self.ctx.types.is_double_precision(ty.ty);
        if !ok {
            let span = self.ctx.expr_span(expr);
            let type_string = self.ctx.type_string(ty);
            self.ctx.diagnostics.error(
                span,
                format!(
                    "expected an integer, real or double precision {} ('{}')",
                    what, type_string
                ),
            );
        }
        ok
    }

    /// Wrap a DO control expression in a conversion to the loop
    /// variable's type if it differs.
    fn convert_do_operand(&mut self, expr: ExprId, var_ty: Ty) -> ExprId {
        let expr_ty = self.ctx.expr_ty(expr).ty;
        let kind = if self.ctx.types.is_integer(var_ty) {
            if self.ctx.types.is_integer(expr_ty) {
                return expr;
            }
            ConversionKind::Int
        } else if self.ctx.types.is_real(var_ty) {
            if self.ctx.types.is_real(expr_ty) {
                return expr;
            }
            ConversionKind::Real
        } else {
            if self.ctx.types.is_double_precision(expr_ty) {
                return expr;
            }
            ConversionKind::Dble
        };
        let span = self.ctx.expr_span(expr);
        self.ctx.alloc_expr(
            ExprKind::Conversion { kind, expr },
            crate::types::QualType::new(var_ty),
            span,
        )
    }

    /// `DO [term-label] var = init, last [, step]`.
    pub fn act_on_do(
        &mut self,
        terminator: Option<ExprId>,
        var: ExprId,
        init: ExprId,
        last: ExprId,
        step: Option<ExprId>,
        label: Option<ExprId>,
        span: Span,
    ) -> Option<StmtId> {
        let mut has_errors = !self.check_do_operand(var, "variable");
        has_errors |= !self.check_do_operand(init, "expression");
        has_errors |= !self.check_do_operand(last, "expression");
        if let Some(step) = step {
            has_errors |= !self.check_do_operand(step, "expression");
        }
        if has_errors {
            return None;
        }

        let var_ty = self.ctx.expr_ty(var).ty;
        let init = self.convert_do_operand(init, var_ty);
        let last = self.convert_do_operand(last, var_ty);
        let step = step.map(|s| self.convert_do_operand(s, var_ty));

        let reference = match terminator {
            Some(term) => {
                // The terminating label must come after the DO.
                let value = self.ctx.label_value(term);
                if self.stmt_labels.resolve(value).is_some() {
                    let term_span = self.ctx.expr_span(term);
                    self.ctx.diagnostics.error(
                        term_span,
                        format!(
                            "statement label '{}' must be declared after the DO statement",
                            value
                        ),
                    );
                    return None;
                }
                Some(LabelRef::unresolved(term))
            }
            None => None,
        };

        let stmt = self.make_stmt(
            StmtKind::Do {
                var,
                init,
                last,
                step,
                terminator: reference,
            },
            label,
            span,
        );
        match terminator {
            Some(term) => {
                self.stmt_labels.declare_forward(ForwardRef {
                    label: term,
                    stmt,
                    kind: ResolveKind::Do,
                });
                self.do_list.push(stmt);
            }
            None => self.do_construct_depth += 1,
        }
        Some(stmt)
    }

    pub fn act_on_end_do(&mut self, label: Option<ExprId>, span: Span) -> Option<StmtId> {
        if self.do_construct_depth == 0 {
            self.ctx
                .diagnostics
                .error(span, "END DO statement without a matching DO");
            return None;
        }
        self.do_construct_depth -= 1;
        Some(self.make_stmt(StmtKind::ConstructPart(ConstructPart::EndDo), label, span))
    }

    // ========================================================================
    // Simple executables
    // ========================================================================

    pub fn act_on_continue(&mut self, label: Option<ExprId>, span: Span) -> StmtId {
        self.make_stmt(StmtKind::Continue, label, span)
    }

    pub fn act_on_stop(
        &mut self,
        code: Option<ExprId>,
        label: Option<ExprId>,
        span: Span,
    ) -> StmtId {
        self.make_stmt(StmtKind::Stop { code }, label, span)
    }

    pub fn act_on_return(&mut self, label: Option<ExprId>, span: Span) -> StmtId {
        self.make_stmt(StmtKind::Return, label, span)
    }

    /// `CALL name (args)`. An undeclared name becomes an implicit
    /// external subroutine.
    pub fn act_on_call_stmt(
        &mut self,
        name: Name,
        args: Vec<ExprId>,
        label: Option<ExprId>,
        span: Span,
    ) -> Option<StmtId> {
        let subroutine = match self.lookup(name) {
            Some(decl) => {
                if !matches!(self.ctx.decl(decl).kind, DeclKind::Subroutine { .. }) {
                    let spelling = self.ctx.str(name);
                    self.ctx
                        .diagnostics
                        .error(span, format!("'{}' is not a subroutine", spelling));
                    return None;
                }
                decl
            }
            None => {
                let decl = self.ctx.alloc_decl(crate::ast::Decl::new(
                    DeclKind::Subroutine {
                        context: crate::ast::DeclContext::new(),
                        args: Vec::new(),
                        body: None,
                    },
                    Some(name),
                    span,
                ));
                self.ctx.decl_mut(decl).implicit = true;
                self.ctx
                    .add_to_context(self.ctx.translation_unit(), decl);
                self.payload_insert(name, decl);
                decl
            }
        };
        Some(self.make_stmt(StmtKind::Call { subroutine, args }, label, span))
    }

    pub fn act_on_print(
        &mut self,
        items: Vec<ExprId>,
        label: Option<ExprId>,
        span: Span,
    ) -> StmtId {
        self.make_stmt(StmtKind::Print { items }, label, span)
    }

    // ========================================================================
    // WHERE
    // ========================================================================

    /// `WHERE (mask) ...`: the mask must be a LOGICAL array.
    pub fn act_on_where(
        &mut self,
        mask: ExprId,
        then_block: StmtId,
        else_block: Option<StmtId>,
        label: Option<ExprId>,
        span: Span,
    ) -> Option<StmtId> {
        let mask_ty = self.ctx.expr_ty(mask).ty;
        if self.ctx.types.is_error(mask_ty) {
            return None;
        }
        let elem = self.ctx.types.self_or_element(mask_ty);
        if !self.ctx.types.is_array(mask_ty) || !self.ctx.types.is_logical(elem) {
            let mask_span = self.ctx.expr_span(mask);
            let type_string = self.ctx.types.to_string(mask_ty);
            self.ctx.diagnostics.error(
                mask_span,
                format!("expected a logical array expression ('{}')", type_string),
            );
            return None;
        }
        Some(self.make_stmt(
            StmtKind::Where {
                mask,
                then_block,
                else_block,
            },
            label,
            span,
        ))
    }

    // ========================================================================
    // End-of-unit resolution
    // ========================================================================

    /// Close the executable part of a unit: resolve forward label
    /// references (in insertion order), flag unterminated constructs and
    /// validate DO terminators.
    pub fn pop_executable_unit(&mut self, loc: Span) {
        let forwards = self.stmt_labels.take_forward();
        for forward in forwards {
            let value = self.ctx.label_value(forward.label);
            match self.stmt_labels.resolve(value) {
                Some(target) => self.resolve_forward_ref(&forward, target),
                None => {
                    let span = self.ctx.expr_span(forward.label);
                    self.ctx.diagnostics.error(
                        span,
                        format!("use of undeclared statement label '{}'", value),
                    );
                }
            }
        }
        self.stmt_labels.reset();

        for _ in self.if_stack.drain(..) {
            self.ctx.diagnostics.error(loc, "expected END IF");
        }
        for _ in 0..self.do_construct_depth {
            self.ctx.diagnostics.error(loc, "expected END DO");
        }
        self.do_construct_depth = 0;

        let do_list = std::mem::take(&mut self.do_list);
        for do_stmt in do_list {
            let target = match &self.ctx.stmt(do_stmt).kind {
                StmtKind::Do {
                    terminator: Some(reference),
                    ..
                } => reference.target,
                _ => None,
            };
            // An unresolved terminator was already reported above.
            let Some(target) = target else { continue };
            if !self.is_valid_do_terminator(target) {
                let span = self.ctx.stmt(target).span;
                self.ctx
                    .diagnostics
                    .error(span, "invalid DO terminating statement");
            }
        }
    }

    fn is_valid_do_terminator(&self, stmt: StmtId) -> bool {
        let kind = &self.ctx.stmt(stmt).kind;
        if !kind.valid_do_terminator() {
            return false;
        }
        if let StmtKind::If {
            then_stmt: Some(body),
            ..
        } = kind
        {
            return self
                .ctx
                .stmt(*body)
                .kind
                .valid_do_terminator_logical_if_body();
        }
        true
    }

    fn resolve_forward_ref(&mut self, forward: &ForwardRef, target: StmtId) {
        let stmt = self.ctx.stmt_mut(forward.stmt);
        match forward.kind {
            ResolveKind::Assign => {
                if let StmtKind::Assign { address, .. } = &mut stmt.kind {
                    address.target = Some(target);
                }
            }
            ResolveKind::Goto => {
                if let StmtKind::Goto { destination } = &mut stmt.kind {
                    destination.target = Some(target);
                }
            }
            ResolveKind::AssignedGoto(index) => {
                if let StmtKind::AssignedGoto { allowed, .. } = &mut stmt.kind {
                    if let Some(reference) = allowed.get_mut(index) {
                        reference.target = Some(target);
                    }
                }
            }
            ResolveKind::Do => {
                if let StmtKind::Do { terminator, .. } = &mut stmt.kind {
                    if let Some(reference) = terminator {
                        reference.target = Some(target);
                    }
                }
            }
        }
    }

    /// The statement-label scope still has pending work only while a
    /// unit is open; used by tests and assertions.
    pub fn has_open_constructs(&self) -> bool {
        !self.if_stack.is_empty() || self.do_construct_depth > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AstContext;
    use crate::sema::DeclSpec;
    use crate::types::TypeSpec;

    fn with_program(ctx: &mut AstContext) -> Sema<'_> {
        let mut sema = Sema::new(ctx);
        sema.act_on_main_program(None, Span::default());
        sema
    }

    fn int_var(sema: &mut Sema<'_>, name: &str) -> ExprId {
        let name = sema.ctx.intern_ident(name);
        sema.act_on_var_reference(name, Span::default()).unwrap()
    }

    #[test]
    fn test_goto_forward_reference_resolution() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let dest = sema.act_on_statement_label(100, Span::default());
        let goto = sema.act_on_goto(dest, None, Span::default());
        match &sema.ctx.stmt(goto).kind {
            StmtKind::Goto { destination } => assert!(destination.target.is_none()),
            other => panic!("expected goto, got {:?}", other),
        }

        let label = sema.act_on_statement_label(100, Span::default());
        let target = sema.act_on_continue(Some(label), Span::default());

        sema.pop_executable_unit(Span::default());
        assert!(!sema.ctx.diagnostics.has_errors());
        match &sema.ctx.stmt(goto).kind {
            StmtKind::Goto { destination } => assert_eq!(destination.target, Some(target)),
            other => panic!("expected goto, got {:?}", other),
        }
    }

    #[test]
    fn test_undeclared_label_diagnosed() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let dest = sema.act_on_statement_label(42, Span::default());
        sema.act_on_goto(dest, None, Span::default());
        sema.pop_executable_unit(Span::default());

        assert!(sema.ctx.diagnostics.has_errors());
        let rendered = format!("{}", sema.ctx.diagnostics);
        assert!(rendered.contains("undeclared statement label '42'"));
    }

    #[test]
    fn test_if_construct_fsm() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let cond = sema.act_on_logical_literal(true, Span::default());
        let if_stmt = sema.act_on_block_if(cond, None, Span::default()).unwrap();

        let cond2 = sema.act_on_logical_literal(false, Span::default());
        let elseif = sema.act_on_else_if(cond2, None, Span::default()).unwrap();
        match &sema.ctx.stmt(if_stmt).kind {
            StmtKind::If { else_stmt, .. } => assert_eq!(*else_stmt, Some(elseif)),
            other => panic!("expected if, got {:?}", other),
        }

        let else_marker = sema.act_on_else(None, Span::default()).unwrap();
        match &sema.ctx.stmt(elseif).kind {
            StmtKind::If { else_stmt, .. } => assert_eq!(*else_stmt, Some(else_marker)),
            other => panic!("expected if, got {:?}", other),
        }

        assert!(sema.act_on_end_if(None, Span::default()).is_some());
        assert!(!sema.has_open_constructs());
        assert!(!sema.ctx.diagnostics.has_errors());

        // A stray END IF is diagnosed.
        assert!(sema.act_on_end_if(None, Span::default()).is_none());
        assert!(sema.ctx.diagnostics.has_errors());
    }

    #[test]
    fn test_unterminated_if_reported_at_unit_end() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let cond = sema.act_on_logical_literal(true, Span::default());
        sema.act_on_block_if(cond, None, Span::default()).unwrap();
        sema.pop_executable_unit(Span::default());

        let rendered = format!("{}", sema.ctx.diagnostics);
        assert!(rendered.contains("expected END IF"));
    }

    #[test]
    fn test_non_logical_condition_rejected() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let cond = sema.act_on_int_literal("1", Span::default()).unwrap();
        assert!(sema.act_on_block_if(cond, None, Span::default()).is_none());
        let rendered = format!("{}", sema.ctx.diagnostics);
        assert!(rendered.contains("expected a logical expression"));
    }

    #[test]
    fn test_do_control_conversion() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        // I is INTEGER by the implicit default; REAL bounds convert.
        let var = int_var(&mut sema, "I");
        let init = sema.act_on_real_literal("1.0", Span::default()).unwrap();
        let last = sema.act_on_int_literal("10", Span::default()).unwrap();
        let term = sema.act_on_statement_label(10, Span::default());

        let do_stmt = sema
            .act_on_do(Some(term), var, init, last, None, None, Span::default())
            .unwrap();
        match &sema.ctx.stmt(do_stmt).kind {
            StmtKind::Do { init, last, .. } => {
                match &sema.ctx.expr(*init).kind {
                    ExprKind::Conversion { kind, .. } => {
                        assert_eq!(*kind, ConversionKind::Int)
                    }
                    other => panic!("expected conversion, got {:?}", other),
                }
                assert!(matches!(
                    sema.ctx.expr(*last).kind,
                    ExprKind::IntegerConstant(10)
                ));
            }
            other => panic!("expected do, got {:?}", other),
        }
    }

    #[test]
    fn test_do_terminator_validation() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let var = int_var(&mut sema, "I");
        let init = sema.act_on_int_literal("1", Span::default()).unwrap();
        let last = sema.act_on_int_literal("5", Span::default()).unwrap();
        let term = sema.act_on_statement_label(10, Span::default());
        sema.act_on_do(Some(term), var, init, last, None, None, Span::default())
            .unwrap();

        // Terminate the DO with a STOP, which is invalid.
        let label = sema.act_on_statement_label(10, Span::default());
        sema.act_on_stop(None, Some(label), Span::default());

        sema.pop_executable_unit(Span::default());
        let rendered = format!("{}", sema.ctx.diagnostics);
        assert!(rendered.contains("invalid DO terminating statement"));
    }

    #[test]
    fn test_do_label_must_follow() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let label = sema.act_on_statement_label(10, Span::default());
        sema.act_on_continue(Some(label), Span::default());

        let var = int_var(&mut sema, "I");
        let init = sema.act_on_int_literal("1", Span::default()).unwrap();
        let last = sema.act_on_int_literal("5", Span::default()).unwrap();
        let term = sema.act_on_statement_label(10, Span::default());
        assert!(sema
            .act_on_do(Some(term), var, init, last, None, None, Span::default())
            .is_none());
        let rendered = format!("{}", sema.ctx.diagnostics);
        assert!(rendered.contains("must be declared after the DO statement"));
    }

    #[test]
    fn test_assignment_type_error() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let name = sema.ctx.intern_ident("X");
        let ds = DeclSpec {
            type_spec: Some(TypeSpec::Real),
            ..DeclSpec::default()
        };
        sema.act_on_entity_decl(&ds, Vec::new(), None, name, Span::default(), None)
            .unwrap();
        let lhs = sema.act_on_var_reference(name, Span::default()).unwrap();
        let rhs = sema.act_on_char_literal("OOPS".into(), Span::default());

        assert!(sema
            .act_on_assignment(lhs, rhs, None, Span::default())
            .is_none());
        let rendered = format!("{}", sema.ctx.diagnostics);
        assert!(rendered.contains("incompatible types in assignment ('REAL' and 'CHARACTER')"));
    }

    #[test]
    fn test_where_mask_must_be_logical_array() {
        let mut ctx = AstContext::new();
        let mut sema = with_program(&mut ctx);

        let mask = sema.act_on_logical_literal(true, Span::default());
        let body = sema.act_on_block(Vec::new(), Span::default());
        assert!(sema
            .act_on_where(mask, body, None, None, Span::default())
            .is_none());
        let rendered = format!("{}", sema.ctx.diagnostics);
        assert!(rendered.contains("expected a logical array expression"));
    }

}
