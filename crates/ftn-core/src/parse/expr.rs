//! Expression parsing.
//!
//! Precedence, loosest to tightest: `.EQV.`/`.NEQV.`, `.OR.`, `.AND.`,
//! `.NOT.`, relationals, `//`, `+`/`-`, `*`/`/`, unary sign, `**`
//! (right-associative), primary.

use super::Parser;
use crate::ast::{BinaryOp, DeclKind, ExprKind, UnaryOp};
use crate::ids::ExprId;
use crate::lex::{DotOp, TokenKind};

/// One item of a parenthesized designator suffix: a subscript
/// expression or a substring range.
enum SuffixArg {
    Expr(ExprId),
    Range(Option<ExprId>, Option<ExprId>),
}

impl<'a> Parser<'a> {
    pub(super) fn parse_expr(&mut self) -> Option<ExprId> {
        self.parse_equivalence()
    }

    fn parse_equivalence(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_or()?;
        loop {
            let op = match self.tok().kind {
                TokenKind::DotOp(DotOp::Eqv) => BinaryOp::Eqv,
                TokenKind::DotOp(DotOp::Neqv) => BinaryOp::Neqv,
                _ => return Some(lhs),
            };
            let span = self.tok_span();
            self.bump();
            let rhs = self.parse_or()?;
            lhs = self.sema.act_on_binary_expr(op, lhs, rhs, span)?;
        }
    }

    fn parse_or(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_and()?;
        while self.at(&TokenKind::DotOp(DotOp::Or)) {
            let span = self.tok_span();
            self.bump();
            let rhs = self.parse_and()?;
            lhs = self.sema.act_on_binary_expr(BinaryOp::Or, lhs, rhs, span)?;
        }
        Some(lhs)
    }

    fn parse_and(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_not()?;
        while self.at(&TokenKind::DotOp(DotOp::And)) {
            let span = self.tok_span();
            self.bump();
            let rhs = self.parse_not()?;
            lhs = self.sema.act_on_binary_expr(BinaryOp::And, lhs, rhs, span)?;
        }
        Some(lhs)
    }

    fn parse_not(&mut self) -> Option<ExprId> {
        if self.at(&TokenKind::DotOp(DotOp::Not)) {
            let span = self.tok_span();
            self.bump();
            let operand = self.parse_not()?;
            return self.sema.act_on_unary_expr(UnaryOp::Not, operand, span);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Option<ExprId> {
        let lhs = self.parse_concat()?;
        let op = match self.tok().kind {
            TokenKind::DotOp(DotOp::Eq) | TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::DotOp(DotOp::Ne) | TokenKind::SlashEq => BinaryOp::Ne,
            TokenKind::DotOp(DotOp::Lt) | TokenKind::Lt => BinaryOp::Lt,
            TokenKind::DotOp(DotOp::Le) | TokenKind::Le => BinaryOp::Le,
            TokenKind::DotOp(DotOp::Gt) | TokenKind::Gt => BinaryOp::Gt,
            TokenKind::DotOp(DotOp::Ge) | TokenKind::Ge => BinaryOp::Ge,
            _ => return Some(lhs),
        };
        let span = self.tok_span();
        self.bump();
        let rhs = self.parse_concat()?;
        self.sema.act_on_binary_expr(op, lhs, rhs, span)
    }

    fn parse_concat(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_additive()?;
        while self.at(&TokenKind::SlashSlash) {
            let span = self.tok_span();
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = self
                .sema
                .act_on_binary_expr(BinaryOp::Concat, lhs, rhs, span)?;
        }
        Some(lhs)
    }

    fn parse_additive(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.tok().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Some(lhs),
            };
            let span = self.tok_span();
            self.bump();
            let rhs = self.parse_term()?;
            lhs = self.sema.act_on_binary_expr(op, lhs, rhs, span)?;
        }
    }

    fn parse_term(&mut self) -> Option<ExprId> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.tok().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Some(lhs),
            };
            let span = self.tok_span();
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = self.sema.act_on_binary_expr(op, lhs, rhs, span)?;
        }
    }

    fn parse_unary(&mut self) -> Option<ExprId> {
        let op = match self.tok().kind {
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            _ => None,
        };
        if let Some(op) = op {
            let span = self.tok_span();
            self.bump();
            let operand = self.parse_unary()?;
            return self.sema.act_on_unary_expr(op, operand, span);
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Option<ExprId> {
        let base = self.parse_primary()?;
        if self.at(&TokenKind::StarStar) {
            let span = self.tok_span();
            self.bump();
            // Right-associative, and a sign may follow directly.
            let exponent = self.parse_unary()?;
            return self
                .sema
                .act_on_binary_expr(BinaryOp::Pow, base, exponent, span);
        }
        Some(base)
    }

    fn parse_primary(&mut self) -> Option<ExprId> {
        match self.tok().kind.clone() {
            TokenKind::IntLiteral => {
                let spelling = self.spelling(self.tok());
                let span = self.tok_span();
                self.bump();
                self.sema.act_on_int_literal(&spelling, span)
            }
            TokenKind::RealLiteral => {
                let spelling = self.spelling(self.tok());
                let span = self.tok_span();
                self.bump();
                self.sema.act_on_real_literal(&spelling, span)
            }
            TokenKind::CharLiteral => {
                let value = self.lexer.char_value(self.tok());
                let span = self.tok_span();
                self.bump();
                let literal = self.sema.act_on_char_literal(value, span);
                // A character constant accepts a substring suffix:
                // 'HELLO'(1:3).
                if self.at(&TokenKind::LParen) {
                    return self.parse_substring_suffix(literal);
                }
                Some(literal)
            }
            TokenKind::LogicalLiteral(value) => {
                let span = self.tok_span();
                self.bump();
                Some(self.sema.act_on_logical_literal(value, span))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Some(inner)
            }
            TokenKind::LParenSlash => {
                let span = self.tok_span();
                self.bump();
                let mut items = Vec::new();
                if !self.at(&TokenKind::SlashRParen) {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::SlashRParen, "'/)' closing the array constructor")?;
                self.sema.act_on_array_constructor(items, span)
            }
            _ if self.token_name().is_some() => self.parse_designator(),
            _ => {
                self.error_here("expected an expression");
                None
            }
        }
    }

    // ========================================================================
    // Designators: variables, array elements, substrings, calls
    // ========================================================================

    /// A name, optionally followed by a parenthesized suffix. What the
    /// suffix means depends on what the name resolves to.
    pub(super) fn parse_designator(&mut self) -> Option<ExprId> {
        let (name, span) = self.expect_ident("an expression")?;

        if !self.at(&TokenKind::LParen) {
            return self.sema.act_on_var_reference(name, span);
        }

        let decl = self.sema.lookup(name);
        match decl.map(|d| (d, self.sema.ctx.decl(d).kind.clone())) {
            Some((decl, DeclKind::Var { ty, .. })) => {
                if self.sema.ctx.types.is_array(ty.ty) {
                    let target = self.sema.act_on_decl_reference(decl, span)?;
                    self.parse_array_element_suffix(target)
                } else if self.sema.ctx.types.is_character(ty.ty) {
                    let base = self.sema.act_on_decl_reference(decl, span)?;
                    self.parse_substring_suffix(base)
                } else {
                    // Subscripting a scalar; let the action report it.
                    let target = self.sema.act_on_decl_reference(decl, span)?;
                    self.parse_array_element_suffix(target)
                }
            }
            Some((decl, DeclKind::Function { .. })) => {
                let args = self.parse_call_args()?;
                self.sema.act_on_call_expr(decl, args, span)
            }
            Some((_, DeclKind::IntrinsicFunction { builtin })) => {
                let args = self.parse_call_args()?;
                self.sema.act_on_intrinsic_call(builtin, args, span)
            }
            Some((_, _)) => {
                self.error_here("expected a variable or function");
                None
            }
            None => {
                if let Some(builtin) = self.words.builtin(name) {
                    let args = self.parse_call_args()?;
                    return self.sema.act_on_intrinsic_call(builtin, args, span);
                }
                let function = self.sema.act_on_implicit_external_function(name, span)?;
                let args = self.parse_call_args()?;
                self.sema.act_on_call_expr(function, args, span)
            }
        }
    }

    pub(super) fn parse_call_args(&mut self) -> Option<Vec<ExprId>> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')' after the argument list")?;
        Some(args)
    }

    /// `(sub, sub, ...)` after an array designator, followed by an
    /// optional substring suffix when the element is CHARACTER.
    fn parse_array_element_suffix(&mut self, target: ExprId) -> Option<ExprId> {
        let span = self.sema.ctx.expr_span(target);
        let args = self.parse_suffix_args()?;

        let mut subscripts = Vec::new();
        for arg in args {
            match arg {
                SuffixArg::Expr(expr) => subscripts.push(expr),
                SuffixArg::Range(_, _) => {
                    self.error_here("array sections are not supported");
                    return None;
                }
            }
        }

        let element = self.sema.act_on_array_element(target, subscripts, span)?;
        let elem_ty = self.sema.ctx.expr_ty(element).ty;
        if self.at(&TokenKind::LParen) && self.sema.ctx.types.is_character(elem_ty) {
            return self.parse_substring_suffix(element);
        }
        Some(element)
    }

    /// `( [lower] : [upper] )` after a character base.
    fn parse_substring_suffix(&mut self, base: ExprId) -> Option<ExprId> {
        let span = self.sema.ctx.expr_span(base);
        let args = self.parse_suffix_args()?;
        match args.as_slice() {
            [SuffixArg::Range(lower, upper)] => {
                self.sema.act_on_substring(base, *lower, *upper, span)
            }
            _ => {
                self.error_here("expected a substring range");
                None
            }
        }
    }

    /// The shared `( item, item, ... )` suffix with range detection.
    fn parse_suffix_args(&mut self) -> Option<Vec<SuffixArg>> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        loop {
            if self.at(&TokenKind::Colon) {
                self.bump();
                let upper = if self.range_bound_follows() {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                args.push(SuffixArg::Range(None, upper));
            } else {
                let first = self.parse_expr()?;
                if self.eat(&TokenKind::Colon) {
                    let upper = if self.range_bound_follows() {
                        Some(self.parse_expr()?)
                    } else {
                        None
                    };
                    args.push(SuffixArg::Range(Some(first), upper));
                } else {
                    args.push(SuffixArg::Expr(first));
                }
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Some(args)
    }

    fn range_bound_follows(&self) -> bool {
        !matches!(self.tok().kind, TokenKind::RParen | TokenKind::Comma)
    }

    /// Whether the current token can begin an expression.
    pub(super) fn at_expr_start(&self) -> bool {
        matches!(
            self.tok().kind,
            TokenKind::IntLiteral
                | TokenKind::RealLiteral
                | TokenKind::CharLiteral
                | TokenKind::LogicalLiteral(_)
                | TokenKind::LParen
                | TokenKind::LParenSlash
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::DotOp(DotOp::Not)
        ) || self.token_name().is_some()
    }

    /// Whether an expression can appear on the left of `=`.
    pub(super) fn expr_is_assignable(&self, expr: ExprId) -> bool {
        matches!(
            self.sema.ctx.expr(expr).kind,
            ExprKind::Var(_) | ExprKind::ArrayElement { .. } | ExprKind::Substring { .. }
        )
    }
}
