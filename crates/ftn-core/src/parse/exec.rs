//! Executable-statement parsing.

use super::Parser;
use crate::ids::StmtId;
use crate::keywords::Keyword;
use crate::lex::TokenKind;

impl<'a> Parser<'a> {
    /// execution-part := executable-construct*. Leaves the cursor on the
    /// END statement of the unit.
    pub(super) fn parse_execution_part(&mut self, body: &mut Vec<StmtId>) {
        loop {
            self.parse_statement_label();
            if self.at_unit_end() {
                return;
            }
            let start = self.idx;
            match self.parse_executable_construct() {
                Some(stmt) => {
                    body.push(stmt);
                    if !self.at_eof() && !self.tok().start_of_statement {
                        self.error_here("expected the end of the statement");
                        self.recover_to_statement_end(start);
                    }
                }
                None => self.recover_to_statement_end(start),
            }
        }
    }

    fn parse_executable_construct(&mut self) -> Option<StmtId> {
        match self.tok().kind {
            TokenKind::Keyword(Keyword::Goto) => self.parse_goto_stmt(),
            TokenKind::Keyword(Keyword::Assign) => self.parse_assign_stmt(),
            TokenKind::Keyword(Keyword::If) => self.parse_if_stmt(),
            TokenKind::Keyword(Keyword::ElseIf) => self.parse_else_if_stmt(),
            TokenKind::Keyword(Keyword::Else) => {
                let span = self.tok_span();
                let label = self.take_label();
                self.bump();
                self.sema.act_on_else(label, span)
            }
            TokenKind::Keyword(Keyword::EndIf) => {
                let span = self.tok_span();
                let label = self.take_label();
                self.bump();
                self.sema.act_on_end_if(label, span)
            }
            TokenKind::Keyword(Keyword::Do) => self.parse_do_stmt(),
            TokenKind::Keyword(Keyword::EndDo) => {
                let span = self.tok_span();
                let label = self.take_label();
                self.bump();
                self.sema.act_on_end_do(label, span)
            }
            TokenKind::Keyword(Keyword::Continue) => {
                let span = self.tok_span();
                let label = self.take_label();
                self.bump();
                Some(self.sema.act_on_continue(label, span))
            }
            TokenKind::Keyword(Keyword::Stop) => self.parse_stop_stmt(),
            TokenKind::Keyword(Keyword::Return) => {
                let span = self.tok_span();
                let label = self.take_label();
                self.bump();
                Some(self.sema.act_on_return(label, span))
            }
            TokenKind::Keyword(Keyword::Call) => self.parse_call_stmt(),
            TokenKind::Keyword(Keyword::Print) => self.parse_print_stmt(),
            TokenKind::Keyword(Keyword::Where) => self.parse_where_construct(),
            TokenKind::Keyword(Keyword::ElseWhere) => {
                self.error_here("ELSE WHERE statement not in a WHERE construct");
                None
            }
            TokenKind::Keyword(Keyword::EndWhere) => {
                self.error_here("END WHERE statement not in a WHERE construct");
                None
            }
            TokenKind::Keyword(
                Keyword::SelectCase
                | Keyword::SelectType
                | Keyword::Select
                | Keyword::Case
                | Keyword::Forall
                | Keyword::Associate
                | Keyword::Interface
                | Keyword::Enum,
            ) => {
                let spelling = self.spelling(self.tok()).to_ascii_uppercase();
                self.error_here(format!("{} is not supported", spelling));
                None
            }
            _ if self.token_name().is_some() => self.parse_assignment_stmt(),
            _ => {
                self.error_here("expected an executable statement");
                None
            }
        }
    }

    fn parse_assignment_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        let lhs = self.parse_designator()?;
        if !self.expr_is_assignable(lhs) {
            // A call-looking designator on the left of `=` can never be
            // stored into; the action would reject it anyway, but this
            // message is clearer when `=` is missing entirely.
            if !self.at(&TokenKind::Equal) {
                self.error_here("expected '=' in an assignment statement");
                return None;
            }
        }
        self.expect(&TokenKind::Equal, "'=' in an assignment statement")?;
        let rhs = self.parse_expr()?;
        self.sema.act_on_assignment(lhs, rhs, label, span)
    }

    fn parse_goto_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();

        if matches!(
            self.tok().kind,
            TokenKind::IntLiteral | TokenKind::StatementLabel
        ) {
            let destination = self.parse_label_ref()?;
            return Some(self.sema.act_on_goto(destination, label, span));
        }

        // Assigned GOTO: `GOTO var [,] (label-list)`.
        let (name, name_span) = self.expect_ident("a statement label or an integer variable")?;
        let var = self.sema.act_on_var_reference(name, name_span)?;
        self.eat(&TokenKind::Comma);
        self.expect(&TokenKind::LParen, "'(' before the allowed label list")?;
        let mut allowed = Vec::new();
        loop {
            allowed.push(self.parse_label_ref()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')' after the allowed label list")?;
        self.sema.act_on_assigned_goto(var, allowed, label, span)
    }

    fn parse_assign_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();

        let address = self.parse_label_ref()?;
        if !self.eat_keyword(Keyword::To) {
            self.error_here("expected 'TO' in the ASSIGN statement");
            return None;
        }
        let (name, name_span) = self.expect_ident("an integer variable")?;
        let var = self.sema.act_on_var_reference(name, name_span)?;
        self.sema.act_on_assign_stmt(address, var, label, span)
    }

    fn parse_if_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();

        self.expect(&TokenKind::LParen, "'(' after 'IF'")?;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')' after the IF condition")?;

        if self.eat_keyword(Keyword::Then) {
            return self.sema.act_on_block_if(condition, label, span);
        }
        if matches!(self.tok().kind, TokenKind::IntLiteral) {
            self.error_here("arithmetic IF is not supported");
            return None;
        }

        let body = self.parse_executable_construct()?;
        self.sema.act_on_logical_if(condition, body, label, span)
    }

    fn parse_else_if_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();

        self.expect(&TokenKind::LParen, "'(' after 'ELSE IF'")?;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')' after the ELSE IF condition")?;
        self.eat_keyword(Keyword::Then);
        self.sema.act_on_else_if(condition, label, span)
    }

    fn parse_do_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();

        let terminator = if matches!(
            self.tok().kind,
            TokenKind::IntLiteral | TokenKind::StatementLabel
        ) {
            let term = self.parse_label_ref()?;
            self.eat(&TokenKind::Comma);
            Some(term)
        } else {
            None
        };

        let (name, name_span) = self.expect_ident("a DO loop variable")?;
        let var = self.sema.act_on_var_reference(name, name_span)?;
        self.expect(&TokenKind::Equal, "'=' after the DO loop variable")?;
        let init = self.parse_expr()?;
        self.expect(&TokenKind::Comma, "',' after the initial value")?;
        let last = self.parse_expr()?;
        let step = if self.eat(&TokenKind::Comma) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        self.sema
            .act_on_do(terminator, var, init, last, step, label, span)
    }

    fn parse_stop_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();

        let code = if !self.tok().start_of_statement && self.at_expr_start() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Some(self.sema.act_on_stop(code, label, span))
    }

    fn parse_call_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();

        let (name, _) = self.expect_ident("a subroutine name")?;
        let args = if self.at(&TokenKind::LParen) {
            self.parse_call_args()?
        } else {
            Vec::new()
        };
        self.sema.act_on_call_stmt(name, args, label, span)
    }

    fn parse_print_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();

        self.expect(&TokenKind::Star, "'*' as the PRINT format")?;
        let mut items = Vec::new();
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_expr()?);
        }
        Some(self.sema.act_on_print(items, label, span))
    }

    /// `WHERE (mask) assignment` or the construct form closed by
    /// `END WHERE`, with an optional `ELSE WHERE` part. Bodies may hold
    /// only assignment statements.
    fn parse_where_construct(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();

        self.expect(&TokenKind::LParen, "'(' after 'WHERE'")?;
        let mask = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')' after the WHERE mask")?;

        if !self.tok().start_of_statement && !self.at_eof() {
            // Single-statement form.
            let assignment = self.parse_assignment_stmt()?;
            return self.sema.act_on_where(mask, assignment, None, label, span);
        }

        let mut then_stmts = Vec::new();
        let mut else_stmts: Option<Vec<StmtId>> = None;
        loop {
            self.parse_statement_label();
            match self.tok().kind {
                TokenKind::Keyword(Keyword::ElseWhere) => {
                    self.bump();
                    if else_stmts.is_some() {
                        self.error_here("duplicate ELSE WHERE");
                    }
                    else_stmts.get_or_insert_with(Vec::new);
                }
                TokenKind::Keyword(Keyword::EndWhere) => {
                    self.bump();
                    break;
                }
                _ if self.at_unit_end() => {
                    self.error_here("expected END WHERE");
                    break;
                }
                _ => {
                    let start = self.idx;
                    match self.parse_assignment_stmt() {
                        Some(stmt) => match &mut else_stmts {
                            Some(stmts) => stmts.push(stmt),
                            None => then_stmts.push(stmt),
                        },
                        None => self.recover_to_statement_end(start),
                    }
                }
            }
        }

        let then_block = self.sema.act_on_block(then_stmts, span);
        let else_block = else_stmts.map(|stmts| self.sema.act_on_block(stmts, span));
        self.sema.act_on_where(mask, then_block, else_block, label, span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::StmtKind;
    use crate::context::AstContext;
    use crate::source::SourceForm;

    fn parse(text: &str) -> AstContext {
        let mut ctx = AstContext::new();
        let source = ctx.source_map.add_inline(text, SourceForm::Free);
        let mut parser = Parser::new(&mut ctx, source, false);
        parser.parse_program_units();
        ctx
    }

    fn parse_fixed(text: &str) -> AstContext {
        let mut ctx = AstContext::new();
        let source = ctx.source_map.add_inline(text, SourceForm::Fixed);
        let mut parser = Parser::new(&mut ctx, source, false);
        parser.parse_program_units();
        ctx
    }

    #[test]
    fn test_goto_and_labels() {
        let ctx = parse("PROGRAM P\nGOTO 100\n100 CONTINUE\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);

        let goto = ctx
            .stmts
            .iter()
            .find_map(|s| match &s.kind {
                StmtKind::Goto { destination } => Some(destination.clone()),
                _ => None,
            })
            .expect("goto statement");
        assert!(goto.target.is_some());
    }

    #[test]
    fn test_go_to_merges() {
        let ctx = parse("PROGRAM P\nGO TO 100\n100 CONTINUE\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_label_redefinition_scenario() {
        let ctx = parse("PROGRAM P\nGOTO 100\n100 CONTINUE\n100 CONTINUE\nEND\n");
        let rendered = format!("{}", ctx.diagnostics);
        assert!(rendered.contains("redefinition of statement label '100'"));
    }

    #[test]
    fn test_unterminated_if_scenario() {
        let ctx = parse("PROGRAM P\nIF (.TRUE.) THEN\nEND\n");
        let rendered = format!("{}", ctx.diagnostics);
        assert!(rendered.contains("expected END IF"));
    }

    #[test]
    fn test_if_else_chain() {
        let ctx = parse(
            "PROGRAM P\nIF (X .GT. 1.0) THEN\nY = 1.0\nELSE IF (X .GT. 0.0) THEN\nY = 2.0\nELSE\nY = 3.0\nEND IF\nEND\n",
        );
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_logical_if() {
        let ctx = parse("PROGRAM P\nIF (X .GT. 0.0) X = 0.0\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_labeled_do_loop() {
        let ctx = parse("PROGRAM P\nDO 10 I = 1, 5\nX = X + 1.0\n10 CONTINUE\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_do_end_do_loop() {
        let ctx = parse("PROGRAM P\nDO I = 1, 5\nX = X + 1.0\nEND DO\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_invalid_do_terminator() {
        let ctx = parse("PROGRAM P\nDO 10 I = 1, 5\n10 STOP\nEND\n");
        let rendered = format!("{}", ctx.diagnostics);
        assert!(rendered.contains("invalid DO terminating statement"));
    }

    #[test]
    fn test_assignment_conversion() {
        let ctx = parse("PROGRAM P\nINTEGER K\nK = 2.5\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
        // The RHS was wrapped in an INT conversion.
        let has_conversion = ctx.exprs.iter().any(|e| {
            matches!(
                e.kind,
                crate::ast::ExprKind::Conversion {
                    kind: crate::ast::ConversionKind::Int,
                    ..
                }
            )
        });
        assert!(has_conversion);
    }

    #[test]
    fn test_incompatible_assignment_scenario() {
        let ctx = parse("PROGRAM P\nREAL X\nCHARACTER C\nX = C\nEND\n");
        let rendered = format!("{}", ctx.diagnostics);
        assert!(rendered.contains("incompatible types in assignment ('REAL' and 'CHARACTER')"));
    }

    #[test]
    fn test_substring_bound_scenario() {
        let ctx = parse("PROGRAM P\nCHARACTER(LEN=16) :: C\nC = 'HELLO'(1:'FALSE')\nEND\n");
        let rendered = format!("{}", ctx.diagnostics);
        assert!(rendered.contains("expected an integer expression"));
    }

    #[test]
    fn test_star_dimension_scenario() {
        let ctx = parse("SUBROUTINE S(A)\nINTEGER A(*,*)\nEND\n");
        let rendered = format!("{}", ctx.diagnostics);
        assert!(
            rendered.contains("dimension declarator '*' must be used only in the last dimension")
        );
    }

    #[test]
    fn test_array_bound_scenario() {
        let ctx = parse("PROGRAM P\nINTEGER A(.false.:2)\nEND\n");
        let rendered = format!("{}", ctx.diagnostics);
        assert!(rendered.contains("expected an integer constant expression"));
    }

    #[test]
    fn test_where_construct() {
        let ctx = parse(
            "PROGRAM P\nREAL A(10), B(10)\nLOGICAL M(10)\nWHERE (M)\nA = B\nELSE WHERE\nA = 0.0\nEND WHERE\nEND\n",
        );
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_implicit_none_undeclared() {
        let ctx = parse("PROGRAM P\nIMPLICIT NONE\nX = 1.0\nEND\n");
        let rendered = format!("{}", ctx.diagnostics);
        assert!(rendered.contains("no implicit type for variable 'X'"));
    }

    #[test]
    fn test_implicit_rules_apply() {
        let ctx = parse("PROGRAM P\nIMPLICIT LOGICAL (A-B)\nA = .TRUE.\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_statement_function() {
        let ctx = parse("PROGRAM P\nF(X) = X * 2.0\nY = F(1.0)\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_parameter_statement() {
        let ctx = parse("PROGRAM P\nPARAMETER (N = 10)\nINTEGER A(N)\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_parameter_redefinition() {
        let ctx = parse("PROGRAM P\nREAL X\nPARAMETER (X = 1.0)\nEND\n");
        let rendered = format!("{}", ctx.diagnostics);
        assert!(rendered.contains("already defined"));
    }

    #[test]
    fn test_fixed_form_program() {
        let ctx = parse_fixed(
            "      PROGRAM P\n      X = 1.0\n      GO TO 10\n   10 CONTINUE\n      END\n",
        );
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_print_statement() {
        let ctx = parse("PROGRAM P\nPRINT *, 'HELLO', 42\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_call_statement() {
        let ctx = parse("PROGRAM P\nCALL DOIT(1, 2.0)\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_subroutine_with_args() {
        let ctx = parse("SUBROUTINE S(A, B)\nINTEGER A\nREAL B\nA = 1\nB = 2.0\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_typed_function() {
        let ctx = parse("REAL FUNCTION F(X)\nF = X + 1.0\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_intrinsic_call() {
        let ctx = parse("PROGRAM P\nY = SQRT(2.0)\nK = ABS(-3)\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_array_constructor() {
        let ctx = parse("PROGRAM P\nREAL A(3)\nA = (/1.0, 2.0, 3.0/)\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_assigned_goto() {
        let ctx = parse(
            "PROGRAM P\nASSIGN 10 TO K\nGOTO K (10, 20)\n10 CONTINUE\n20 CONTINUE\nEND\n",
        );
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_double_precision_merge() {
        let ctx = parse("PROGRAM P\nDOUBLE PRECISION D\nD = 1.0\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }
}
