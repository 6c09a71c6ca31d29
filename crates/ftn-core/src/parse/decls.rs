//! Specification-part parsing: type declarations, IMPLICIT, PARAMETER,
//! DIMENSION, EXTERNAL, INTRINSIC, ASYNCHRONOUS, USE/IMPORT and
//! statement functions.

use super::Parser;
use crate::ast::LetterSpec;
use crate::ids::{ExprId, StmtId};
use crate::keywords::Keyword;
use crate::lex::TokenKind;
use crate::sema::DeclSpec;
use crate::types::{DimSpec, ExtAttr, Intent, Qualifiers, TypeSpec};

impl<'a> Parser<'a> {
    /// specification-part := use-stmt* import-stmt* implicit-part*
    /// declaration-construct*. Leaves the cursor on the first executable
    /// statement (or the END of the unit).
    pub(super) fn parse_specification_part(&mut self, body: &mut Vec<StmtId>) {
        loop {
            self.parse_statement_label();
            let start = self.idx;
            let parsed = match self.tok().kind {
                TokenKind::Keyword(Keyword::Use) => self.parse_use_stmt(),
                TokenKind::Keyword(Keyword::Import) => self.parse_import_stmt(),
                TokenKind::Keyword(Keyword::Implicit) => self.parse_implicit_stmt(),
                TokenKind::Keyword(Keyword::Parameter)
                    if self.peek(1).kind == TokenKind::LParen =>
                {
                    self.parse_parameter_stmt()
                }
                TokenKind::Keyword(Keyword::Dimension) => self.parse_dimension_stmt(),
                TokenKind::Keyword(Keyword::External) => self.parse_external_stmt(),
                TokenKind::Keyword(Keyword::Intrinsic) => self.parse_intrinsic_stmt(),
                TokenKind::Keyword(Keyword::Asynchronous) => self.parse_asynchronous_stmt(),
                TokenKind::Keyword(
                    Keyword::Integer
                    | Keyword::Real
                    | Keyword::Double
                    | Keyword::DoublePrecision
                    | Keyword::Complex
                    | Keyword::Character
                    | Keyword::Logical,
                ) => self.parse_type_decl_stmt(),
                TokenKind::Keyword(Keyword::Type) => {
                    self.error_here("derived types are not supported");
                    None
                }
                TokenKind::Identifier if self.at_statement_function() => {
                    self.parse_statement_function()
                }
                _ => return,
            };
            match parsed {
                Some(stmt) => body.push(stmt),
                None => self.recover_to_statement_end(start),
            }
        }
    }

    // ========================================================================
    // DeclSpec
    // ========================================================================

    /// Parse a type specifier with KIND/LEN selectors and (optionally)
    /// an attribute list up to `::`.
    pub(super) fn parse_decl_spec(&mut self) -> Option<DeclSpec> {
        let mut ds = DeclSpec::default();
        self.parse_type_spec(&mut ds, true)?;
        self.parse_attribute_list(&mut ds);
        self.eat(&TokenKind::ColonColon);
        Some(ds)
    }

    /// The type keyword and its selectors. `allow_paren_selector` is
    /// false inside IMPLICIT, where a paren group after the type is the
    /// letter list rather than a KIND/LEN selector.
    fn parse_type_spec(&mut self, ds: &mut DeclSpec, allow_paren_selector: bool) -> Option<()> {
        let spec = match self.tok().kind {
            TokenKind::Keyword(Keyword::Integer) => TypeSpec::Integer,
            TokenKind::Keyword(Keyword::Real) => TypeSpec::Real,
            TokenKind::Keyword(Keyword::DoublePrecision) => TypeSpec::DoublePrecision,
            TokenKind::Keyword(Keyword::Double) => {
                // An unmerged DOUBLE means PRECISION did not follow.
                self.error_here("expected 'PRECISION' after 'DOUBLE'");
                return None;
            }
            TokenKind::Keyword(Keyword::Complex) => TypeSpec::Complex,
            TokenKind::Keyword(Keyword::Character) => TypeSpec::Character,
            TokenKind::Keyword(Keyword::Logical) => TypeSpec::Logical,
            _ => {
                self.error_here("expected a type specifier");
                return None;
            }
        };
        self.bump();
        ds.type_spec = Some(spec);

        if self.at(&TokenKind::LParen) && allow_paren_selector {
            self.bump();
            let is_character = spec == TypeSpec::Character;
            let mut is_len = is_character;
            if is_character && self.at_keyword(Keyword::Len) && self.peek(1).kind == TokenKind::Equal
            {
                self.bump();
                self.bump();
            } else if self.at_keyword(Keyword::Kind) && self.peek(1).kind == TokenKind::Equal {
                self.bump();
                self.bump();
                is_len = false;
            }
            let value = self.parse_expr()?;
            if is_len {
                ds.len_selector = Some(value);
            } else {
                ds.kind_selector = Some(value);
            }
            self.expect(&TokenKind::RParen, "')' after the type selector")?;
        } else if self.eat(&TokenKind::Star) {
            let value = self.parse_star_selector()?;
            if spec == TypeSpec::Character {
                ds.len_selector = Some(value);
            } else {
                ds.kind_selector = Some(value);
            }
        }
        Some(())
    }

    /// `*n` or `*(expr)` after a type keyword.
    fn parse_star_selector(&mut self) -> Option<ExprId> {
        if self.eat(&TokenKind::LParen) {
            let value = self.parse_expr()?;
            self.expect(&TokenKind::RParen, "')' after the length selector")?;
            return Some(value);
        }
        if self.at(&TokenKind::IntLiteral) {
            let spelling = self.spelling(self.tok());
            let span = self.tok_span();
            self.bump();
            return self.sema.act_on_int_literal(&spelling, span);
        }
        self.error_here("expected a length selector");
        None
    }

    fn parse_attribute_list(&mut self, ds: &mut DeclSpec) {
        while self.at(&TokenKind::Comma) && self.peek_attr_keyword() {
            self.bump(); // comma
            match self.tok().kind {
                TokenKind::Keyword(Keyword::Parameter) => {
                    ds.apv |= Qualifiers::PARAMETER;
                    self.bump();
                }
                TokenKind::Keyword(Keyword::Allocatable) => {
                    ds.apv |= Qualifiers::ALLOCATABLE;
                    self.bump();
                }
                TokenKind::Keyword(Keyword::Volatile) => {
                    ds.apv |= Qualifiers::VOLATILE;
                    self.bump();
                }
                TokenKind::Keyword(Keyword::Dimension) => {
                    self.bump();
                    if self.expect(&TokenKind::LParen, "'(' after 'DIMENSION'").is_some() {
                        if let Some(dims) = self.parse_array_spec_dims() {
                            ds.dims = dims;
                        }
                    }
                }
                TokenKind::Keyword(Keyword::Intent) => {
                    self.bump();
                    self.expect(&TokenKind::LParen, "'(' after 'INTENT'");
                    ds.intent = match self.tok().kind {
                        TokenKind::Keyword(Keyword::In) => Some(Intent::In),
                        TokenKind::Keyword(Keyword::Out) => Some(Intent::Out),
                        TokenKind::Keyword(Keyword::InOut) => Some(Intent::InOut),
                        _ => {
                            self.error_here("expected 'IN', 'OUT' or 'INOUT'");
                            None
                        }
                    };
                    if ds.intent.is_some() {
                        self.bump();
                    }
                    self.expect(&TokenKind::RParen, "')' after the intent");
                }
                TokenKind::Keyword(Keyword::Asynchronous) => {
                    ds.ext_attr = Some(ExtAttr::Asynchronous);
                    self.bump();
                }
                TokenKind::Keyword(Keyword::Contiguous) => {
                    ds.ext_attr = Some(ExtAttr::Contiguous);
                    self.bump();
                }
                TokenKind::Keyword(Keyword::Optional) => {
                    ds.ext_attr = Some(ExtAttr::Optional);
                    self.bump();
                }
                TokenKind::Keyword(Keyword::Pointer) => {
                    ds.ext_attr = Some(ExtAttr::Pointer);
                    self.bump();
                }
                TokenKind::Keyword(Keyword::Save) => {
                    ds.ext_attr = Some(ExtAttr::Save);
                    self.bump();
                }
                TokenKind::Keyword(Keyword::Target) => {
                    ds.ext_attr = Some(ExtAttr::Target);
                    self.bump();
                }
                TokenKind::Keyword(Keyword::Value) => {
                    ds.ext_attr = Some(ExtAttr::Value);
                    self.bump();
                }
                _ => unreachable!("peek_attr_keyword lied"),
            }
        }
    }

    fn peek_attr_keyword(&self) -> bool {
        matches!(
            self.peek(1).kind,
            TokenKind::Keyword(
                Keyword::Parameter
                    | Keyword::Allocatable
                    | Keyword::Volatile
                    | Keyword::Dimension
                    | Keyword::Intent
                    | Keyword::Asynchronous
                    | Keyword::Contiguous
                    | Keyword::Optional
                    | Keyword::Pointer
                    | Keyword::Save
                    | Keyword::Target
                    | Keyword::Value
            )
        ) && !self.peek(1).start_of_statement
    }

    // ========================================================================
    // Type declaration statements
    // ========================================================================

    fn parse_type_decl_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        let ds = self.parse_decl_spec()?;

        loop {
            let (name, loc) = self.expect_ident("an entity name")?;

            let mut entity_dims = Vec::new();
            if self.eat(&TokenKind::LParen) {
                entity_dims = self.parse_array_spec_dims()?;
            }
            let mut entity_len = None;
            if self.eat(&TokenKind::Star) {
                entity_len = self.parse_star_selector();
            }
            let init = if self.eat(&TokenKind::Equal) {
                Some(self.parse_expr()?)
            } else {
                None
            };

            self.sema
                .act_on_entity_decl(&ds, entity_dims, entity_len, name, loc, init);

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        // The declarations themselves live in the declaration context;
        // an empty block stands in for the statement so a label on the
        // declaration line still resolves.
        let stmt = self.sema.act_on_block(Vec::new(), span);
        if let Some(label) = label {
            self.sema.declare_statement_label(label, stmt);
        }
        Some(stmt)
    }

    /// array-spec := dim [, dim]* `)` with dim := `*` | [lower:]upper.
    /// The opening paren has been consumed.
    pub(super) fn parse_array_spec_dims(&mut self) -> Option<Vec<DimSpec>> {
        let mut dims = Vec::new();
        loop {
            if self.eat(&TokenKind::Star) {
                dims.push(DimSpec::AssumedSize);
            } else {
                let first = self.parse_expr()?;
                if self.eat(&TokenKind::Colon) {
                    if self.eat(&TokenKind::Star) {
                        dims.push(DimSpec::AssumedSize);
                    } else {
                        let upper = self.parse_expr()?;
                        dims.push(DimSpec::Explicit {
                            lower: Some(first),
                            upper,
                        });
                    }
                } else {
                    dims.push(DimSpec::Explicit {
                        lower: None,
                        upper: first,
                    });
                }
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')' in the array spec")?;
        Some(dims)
    }

    // ========================================================================
    // Other specification statements
    // ========================================================================

    fn parse_use_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        let start = self.idx;
        self.bump();
        self.eat(&TokenKind::ColonColon);
        let (module, _) = self.expect_ident("a module name in the USE statement")?;
        // Rename and ONLY lists belong to cross-unit module resolution,
        // which this front-end does not perform.
        self.recover_to_statement_end(start);
        Some(self.sema.act_on_use_stmt(module, label, span))
    }

    fn parse_import_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();
        self.eat(&TokenKind::ColonColon);
        let mut names = Vec::new();
        while let Some(name) = self.token_name() {
            if self.tok().start_of_statement {
                break;
            }
            names.push(name);
            self.bump();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Some(self.sema.act_on_import_stmt(names, label, span))
    }

    fn parse_implicit_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();

        if self.eat_keyword(Keyword::None) {
            return Some(self.sema.act_on_implicit_stmt(None, label, span));
        }

        let mut rules = Vec::new();
        loop {
            let mut ds = DeclSpec::default();
            self.parse_type_spec(&mut ds, false)?;
            let ty = self.sema.act_on_type_name(&ds);

            self.expect(&TokenKind::LParen, "'(' after the implicit type")?;
            let mut letters = Vec::new();
            loop {
                let low = self.parse_implicit_letter()?;
                let high = if self.eat(&TokenKind::Minus) {
                    Some(self.parse_implicit_letter()?)
                } else {
                    None
                };
                letters.push(LetterSpec { low, high });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen, "')' after the letter list")?;
            rules.push((ty, letters));

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Some(self.sema.act_on_implicit_stmt(Some(rules), label, span))
    }

    fn parse_implicit_letter(&mut self) -> Option<char> {
        let (name, span) = self.expect_ident("a letter")?;
        let spelling = self.sema.ctx.str(name);
        let mut chars = spelling.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) if letter.is_ascii_alphabetic() => Some(letter),
            _ => {
                self.sema.ctx.diagnostics.error(span, "expected a letter");
                None
            }
        }
    }

    fn parse_parameter_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();
        self.expect(&TokenKind::LParen, "'(' in the PARAMETER statement")?;

        let mut pairs = Vec::new();
        loop {
            let (name, loc) = self.expect_ident("a named constant")?;
            self.expect(&TokenKind::Equal, "'=' in the PARAMETER statement")?;
            let value = self.parse_expr()?;
            if let Some(pair) = self.sema.act_on_parameter_pair(name, loc, value) {
                pairs.push(pair);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')' in the PARAMETER statement")?;
        Some(self.sema.act_on_parameter_stmt(pairs, label, span))
    }

    fn parse_dimension_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();
        self.eat(&TokenKind::ColonColon);

        let mut first = None;
        loop {
            let (name, loc) = self.expect_ident("an array name")?;
            self.expect(&TokenKind::LParen, "'(' after the array name")?;
            let dims = self.parse_array_spec_dims()?;
            self.sema.act_on_dimension(name, dims, loc);
            first.get_or_insert(name);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Some(self.sema.act_on_dimension_stmt(first?, label, span))
    }

    fn parse_name_list(&mut self) -> Vec<(crate::interner::Name, crate::source::Span)> {
        self.eat(&TokenKind::ColonColon);
        let mut names = Vec::new();
        loop {
            if self.tok().start_of_statement {
                break;
            }
            match self.token_name() {
                Some(name) => {
                    names.push((name, self.tok_span()));
                    self.bump();
                }
                None => break,
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        names
    }

    fn parse_external_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();
        let names = self.parse_name_list();
        self.sema.act_on_external_names(&names);
        let list = names.iter().map(|&(n, _)| n).collect();
        Some(self.sema.act_on_external_stmt(list, label, span))
    }

    fn parse_intrinsic_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();
        let names = self.parse_name_list();
        let builtins: Vec<_> = names
            .iter()
            .map(|&(name, _)| self.words.builtin(name))
            .collect();
        self.sema.act_on_intrinsic_names(&names, &builtins);
        let list = names.iter().map(|&(n, _)| n).collect();
        Some(self.sema.act_on_intrinsic_stmt(list, label, span))
    }

    fn parse_asynchronous_stmt(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        self.bump();
        let names = self.parse_name_list();
        self.sema.act_on_asynchronous_names(&names);
        let list = names.iter().map(|&(n, _)| n).collect();
        Some(self.sema.act_on_asynchronous_stmt(list, label, span))
    }

    // ========================================================================
    // Statement functions
    // ========================================================================

    /// A statement function is `name(arg, ...) = expr` for an undeclared
    /// `name` in the specification part.
    fn at_statement_function(&self) -> bool {
        let Some(name) = self.token_name() else {
            return false;
        };
        if self.sema.lookup(name).is_some() {
            return false;
        }
        if self.peek(1).kind != TokenKind::LParen || self.peek(1).start_of_statement {
            return false;
        }
        let mut ahead = 2;
        if self.peek(ahead).kind == TokenKind::RParen {
            return self.peek(ahead + 1).kind == TokenKind::Equal;
        }
        loop {
            let token = self.peek(ahead);
            if token.start_of_statement || token.name.is_none() {
                return false;
            }
            ahead += 1;
            match self.peek(ahead).kind {
                TokenKind::Comma => ahead += 1,
                TokenKind::RParen => {
                    return self.peek(ahead + 1).kind == TokenKind::Equal
                        && !self.peek(ahead + 1).start_of_statement
                }
                _ => return false,
            }
        }
    }

    fn parse_statement_function(&mut self) -> Option<StmtId> {
        let span = self.tok_span();
        let label = self.take_label();
        let (name, loc) = self.expect_ident("a statement function name")?;

        let decl = self.sema.act_on_statement_function_start(name, loc);
        self.expect(&TokenKind::LParen, "'(' in the statement function");
        if !self.at(&TokenKind::RParen) {
            loop {
                match self.expect_ident("a statement function argument") {
                    Some((arg, arg_span)) => {
                        self.sema.act_on_dummy_argument(arg, arg_span);
                    }
                    None => break,
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')' in the statement function");
        self.expect(&TokenKind::Equal, "'=' in the statement function");

        let body = self.parse_expr();
        self.sema.act_on_statement_function_body(decl, body);

        let stmt = self.sema.act_on_block(Vec::new(), span);
        if let Some(label) = label {
            self.sema.declare_statement_label(label, stmt);
        }
        Some(stmt)
    }
}
