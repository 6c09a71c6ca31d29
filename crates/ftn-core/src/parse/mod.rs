//! The parser.
//!
//! A recursive-descent parser over the classified, merged token stream.
//! Two passes handle Fortran's keyword/identifier ambiguity: the lexer
//! emits raw identifiers, and the parser promotes them to keywords by
//! table lookup while retaining the identifier payload so a keyword in
//! identifier position can be demoted back. Compound keywords (`GO TO`,
//! `ELSE IF`, `END DO`, ...) are merged from adjacent tokens of the same
//! statement, with a two-token lookahead for `END BLOCK DATA`.
//!
//! The parser allocates no AST nodes: every statement production calls
//! a matching action on [`Sema`]. Statement-scoped errors recover by
//! skipping to the end of the statement.

mod decls;
mod exec;
mod expr;

use crate::context::AstContext;
use crate::ids::{ExprId, StmtId};
use crate::interner::Name;
use crate::keywords::{DialectOptions, Keyword, WordTable};
use crate::lex::{Lexer, Token, TokenKind};
use crate::sema::{DeclSpec, Sema};
use crate::source::{SourceId, Span};

pub struct Parser<'a> {
    lexer: Lexer,
    words: WordTable,
    pub sema: Sema<'a>,
    tokens: Vec<Token>,
    idx: usize,
    stmt_label: Option<ExprId>,
}

/// Which end statement closes the current unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitKind {
    Program,
    Function,
    Subroutine,
}

impl<'a> Parser<'a> {
    pub fn new(ctx: &'a mut AstContext, source: SourceId, return_comments: bool) -> Self {
        let src = ctx
            .source_map
            .get(source)
            .expect("parser over unknown source");
        let text = src.content.clone();
        let form = src.form;

        let lexer = Lexer::new(text.clone(), source, form, return_comments);
        let raw = Lexer::new(text, source, form, false).lex_all();
        let words = WordTable::new(&ctx.interner, DialectOptions::default());

        let mut parser = Self {
            lexer,
            words,
            sema: Sema::new(ctx),
            tokens: Vec::new(),
            idx: 0,
            stmt_label: None,
        };
        parser.tokens = parser.classify_and_merge(raw);
        parser
    }

    // ========================================================================
    // Token classification and merging
    // ========================================================================

    /// Promote a raw identifier token to its keyword kind. Classifying
    /// an already-classified token is a no-op.
    fn classify_token(&self, token: &mut Token) {
        if token.kind != TokenKind::Identifier {
            return;
        }
        let spelling = self.lexer.spelling(token);
        let name = self.sema.ctx.intern_ident(&spelling);
        token.name = Some(name);
        if let Some(keyword) = self.words.keyword(name) {
            token.kind = TokenKind::Keyword(keyword);
        }
    }

    fn classify_and_merge(&mut self, mut raw: Vec<Token>) -> Vec<Token> {
        for token in &mut raw {
            self.classify_token(token);
        }

        let mut out = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            let mut token = raw[i].clone();
            if let TokenKind::Keyword(first) = token.kind {
                let next = raw.get(i + 1).filter(|t| !t.start_of_statement);
                if let Some(TokenKind::Keyword(second)) = next.map(|t| t.kind.clone()) {
                    if let Some(merged) = merge_keywords(first, second) {
                        token.kind = TokenKind::Keyword(merged);
                        token.span = token.span.merge(raw[i + 1].span);
                        token.name = None;
                        i += 1;
                    } else if first == Keyword::End && second == Keyword::Block {
                        // END BLOCK DATA needs a second token of lookahead.
                        let data = raw
                            .get(i + 2)
                            .filter(|t| !t.start_of_statement)
                            .filter(|t| t.kind == TokenKind::Keyword(Keyword::Data));
                        match data {
                            Some(data_tok) => {
                                token.kind = TokenKind::Keyword(Keyword::EndBlockData);
                                token.span = token.span.merge(data_tok.span);
                                token.name = None;
                                i += 2;
                            }
                            None => {
                                let span = raw[i + 1].span;
                                self.sema
                                    .ctx
                                    .diagnostics
                                    .error(span, "expected 'DATA' after 'BLOCK' keyword");
                            }
                        }
                    }
                }
            }
            out.push(token);
            i += 1;
        }
        out
    }

    // ========================================================================
    // Token access
    // ========================================================================

    fn tok(&self) -> &Token {
        &self.tokens[self.idx.min(self.tokens.len() - 1)]
    }

    fn peek(&self, ahead: usize) -> &Token {
        let idx = (self.idx + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn bump(&mut self) {
        if self.idx + 1 < self.tokens.len() {
            self.idx += 1;
        }
    }

    fn at_eof(&self) -> bool {
        self.tok().is_eof()
    }

    fn tok_span(&self) -> Span {
        self.tok().span
    }

    pub(crate) fn spelling(&self, token: &Token) -> String {
        self.lexer.spelling(token)
    }

    /// The identifier payload of the current token, present also on
    /// promoted keyword tokens (for demotion).
    fn token_name(&self) -> Option<Name> {
        self.tok().name
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.tok().kind == *kind
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.tok().is_keyword(keyword)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.at_keyword(keyword) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Eat the expected token or report it missing. The `Option` return
    /// lets statement parsers bail with `?`.
    fn expect(&mut self, kind: &TokenKind, what: &str) -> Option<()> {
        if self.eat(kind) {
            Some(())
        } else {
            let span = self.tok_span();
            self.sema
                .ctx
                .diagnostics
                .error(span, format!("expected {}", what));
            None
        }
    }

    /// Expect an identifier, demoting a promoted keyword if necessary.
    fn expect_ident(&mut self, what: &str) -> Option<(Name, Span)> {
        match self.token_name() {
            Some(name) if !matches!(self.tok().kind, TokenKind::Eof) => {
                let span = self.tok_span();
                self.bump();
                Some((name, span))
            }
            _ => {
                let span = self.tok_span();
                self.sema
                    .ctx
                    .diagnostics
                    .error(span, format!("expected {}", what));
                None
            }
        }
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let span = self.tok_span();
        self.sema.ctx.diagnostics.error(span, message);
    }

    /// Statement-scoped error recovery: skip to the start of the next
    /// statement. `start_idx` is the index where the failed statement
    /// began, so recovery always makes progress.
    fn recover_to_statement_end(&mut self, start_idx: usize) {
        self.stmt_label = None;
        if self.at_eof() {
            return;
        }
        if self.idx == start_idx {
            self.bump();
        }
        while !self.at_eof() && !self.tok().start_of_statement {
            self.bump();
        }
    }

    // ========================================================================
    // Statement labels
    // ========================================================================

    /// Capture the statement label of the statement that begins at the
    /// current token, if any. A label already captured (by the loop that
    /// handed this statement over) is kept.
    fn parse_statement_label(&mut self) {
        if !self.at(&TokenKind::StatementLabel) {
            return;
        }
        let spelling = self.spelling(self.tok());
        let span = self.tok_span();
        self.bump();
        match spelling.parse::<i64>() {
            Ok(value) => {
                self.stmt_label = Some(self.sema.act_on_statement_label(value, span));
            }
            Err(_) => {
                self.sema
                    .ctx
                    .diagnostics
                    .error(span, "invalid statement label");
            }
        }
    }

    fn take_label(&mut self) -> Option<ExprId> {
        self.stmt_label.take()
    }

    /// Parse a statement-label reference (e.g. a GOTO target).
    fn parse_label_ref(&mut self) -> Option<ExprId> {
        if !matches!(
            self.tok().kind,
            TokenKind::IntLiteral | TokenKind::StatementLabel
        ) {
            self.error_here("expected a statement label");
            return None;
        }
        let spelling = self.spelling(self.tok());
        let span = self.tok_span();
        self.bump();
        match spelling.parse::<i64>() {
            Ok(value) => Some(self.sema.act_on_statement_label(value, span)),
            Err(_) => {
                self.sema
                    .ctx
                    .diagnostics
                    .error(span, "invalid statement label");
                None
            }
        }
    }

    // ========================================================================
    // Program units
    // ========================================================================

    /// Main entry point: parse every program unit in the source.
    pub fn parse_program_units(&mut self) {
        while !self.at_eof() {
            self.parse_program_unit();
        }
    }

    fn parse_program_unit(&mut self) {
        self.parse_statement_label();
        if self.at_eof() {
            return;
        }

        match self.tok().kind {
            TokenKind::Keyword(Keyword::Function) => self.parse_subprogram(UnitKind::Function, None),
            TokenKind::Keyword(Keyword::Subroutine) => {
                self.parse_subprogram(UnitKind::Subroutine, None)
            }
            TokenKind::Keyword(Keyword::Module) => {
                self.error_here("MODULE is not supported");
                self.skip_unit(&[Keyword::EndModule, Keyword::End]);
            }
            TokenKind::Keyword(Keyword::BlockData) => {
                self.error_here("BLOCK DATA is not supported");
                self.skip_unit(&[Keyword::EndBlockData, Keyword::End]);
            }
            _ if self.typed_function_ahead() => {
                let start = self.idx;
                match self.parse_decl_spec() {
                    Some(ds) if self.at_keyword(Keyword::Function) => {
                        self.parse_subprogram(UnitKind::Function, Some(ds))
                    }
                    _ => {
                        self.recover_to_statement_end(start);
                    }
                }
            }
            _ => self.parse_main_program(),
        }
    }

    /// A top-level statement starting with a type spec can still open a
    /// function: `REAL FUNCTION F(X)`.
    fn typed_function_ahead(&self) -> bool {
        if !matches!(
            self.tok().kind,
            TokenKind::Keyword(
                Keyword::Integer
                    | Keyword::Real
                    | Keyword::DoublePrecision
                    | Keyword::Complex
                    | Keyword::Character
                    | Keyword::Logical
            )
        ) {
            return false;
        }
        let mut ahead = 1;
        loop {
            let token = self.peek(ahead);
            if token.is_eof() || token.start_of_statement {
                return false;
            }
            match token.kind {
                TokenKind::Keyword(Keyword::Function) => return true,
                TokenKind::Equal | TokenKind::ColonColon => return false,
                _ => ahead += 1,
            }
        }
    }

    fn skip_unit(&mut self, terminators: &[Keyword]) {
        loop {
            if self.at_eof() {
                return;
            }
            if let TokenKind::Keyword(kw) = self.tok().kind {
                if terminators.contains(&kw) {
                    let start = self.idx;
                    self.bump();
                    self.recover_to_statement_end(start);
                    return;
                }
            }
            self.bump();
        }
    }

    fn parse_main_program(&mut self) {
        let mut name = None;
        let mut prog_kw: Option<(Span, Option<ExprId>)> = None;
        let loc = self.tok_span();

        if self.at_keyword(Keyword::Program) {
            let span = self.tok_span();
            let label = self.take_label();
            self.bump();
            match self.expect_ident("an identifier after 'PROGRAM'") {
                Some((prog_name, _)) => {
                    name = Some(prog_name);
                    prog_kw = Some((span, label));
                }
                None => {
                    let start = self.idx;
                    self.recover_to_statement_end(start);
                }
            }
        }

        self.sema.act_on_main_program(name, loc);
        if let Some((span, label)) = prog_kw {
            self.sema.act_on_program_stmt(name, label, span);
        }

        let mut body = Vec::new();
        self.parse_specification_part(&mut body);
        self.parse_execution_part(&mut body);
        self.parse_end_unit(UnitKind::Program, &mut body);
    }

    fn parse_subprogram(&mut self, kind: UnitKind, result: Option<DeclSpec>) {
        let span = self.tok_span();
        let _ = self.take_label();
        self.bump(); // FUNCTION / SUBROUTINE

        let name = self.expect_ident("a subprogram name").map(|(n, _)| n);
        match kind {
            UnitKind::Function => {
                self.sema.act_on_function(result.as_ref(), name, span);
            }
            _ => {
                self.sema.act_on_subroutine(name, span);
            }
        }

        if self.eat(&TokenKind::LParen) {
            if !self.at(&TokenKind::RParen) {
                loop {
                    match self.expect_ident("a dummy argument name") {
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
            self.expect(&TokenKind::RParen, "')' after the dummy argument list");
        }

        let mut body = Vec::new();
        self.parse_specification_part(&mut body);
        self.parse_execution_part(&mut body);
        self.parse_end_unit(kind, &mut body);
    }

    fn at_unit_end(&self) -> bool {
        matches!(
            self.tok().kind,
            TokenKind::Keyword(
                Keyword::End
                    | Keyword::EndProgram
                    | Keyword::EndFunction
                    | Keyword::EndSubroutine
            )
        ) || self.at_eof()
    }

    /// Parse the END statement of a unit and run the matching close
    /// action.
    fn parse_end_unit(&mut self, kind: UnitKind, body: &mut Vec<StmtId>) {
        let label = self.take_label();
        let loc = self.tok_span();
        let mut end_name = None;
        let mut end_name_loc = loc;

        if self.at_eof() {
            self.error_here(match kind {
                UnitKind::Program => "expected END PROGRAM",
                UnitKind::Function => "expected END FUNCTION",
                UnitKind::Subroutine => "expected END SUBROUTINE",
            });
        } else {
            let start = self.idx;
            self.bump(); // END / ENDPROGRAM / ENDFUNCTION / ENDSUBROUTINE

            // `END SUBROUTINE` is not in the merge table; accept the
            // trailing keyword here.
            if !self.tok().start_of_statement {
                if let TokenKind::Keyword(
                    Keyword::Subroutine | Keyword::Function | Keyword::Program,
                ) = self.tok().kind
                {
                    self.bump();
                }
            }
            if !self.tok().start_of_statement {
                if let Some(name) = self.token_name() {
                    end_name = Some(name);
                    end_name_loc = self.tok_span();
                    self.bump();
                }
            }
            if !self.at_eof() && !self.tok().start_of_statement {
                self.error_here("expected the end of the statement");
                self.recover_to_statement_end(start);
            }
        }

        match kind {
            UnitKind::Program => {
                let end_stmt = self.sema.act_on_end_program_stmt(end_name, label, loc);
                body.push(end_stmt);
                self.sema
                    .act_on_end_main_program(end_name, end_name_loc, loc, std::mem::take(body));
            }
            _ => {
                let end_stmt = self.sema.act_on_end_program_stmt(end_name, label, loc);
                body.push(end_stmt);
                self.sema
                    .act_on_end_subprogram(end_name, end_name_loc, loc, std::mem::take(body));
            }
        }
    }
}

/// The compound-keyword merge table.
fn merge_keywords(first: Keyword, second: Keyword) -> Option<Keyword> {
    use Keyword::*;
    Some(match (first, second) {
        (Block, Data) => BlockData,
        (Else, If) => ElseIf,
        (Else, Where) => ElseWhere,
        (End, If) => EndIf,
        (End, Do) => EndDo,
        (End, Function) => EndFunction,
        (End, Forall) => EndForall,
        (End, Where) => EndWhere,
        (End, Enum) => EndEnum,
        (End, Select) => EndSelect,
        (End, Type) => EndType,
        (End, Module) => EndModule,
        (End, Program) => EndProgram,
        (End, Associate) => EndAssociate,
        (End, File) => EndFile,
        (End, Interface) => EndInterface,
        (End, BlockData) => EndBlockData,
        (Go, To) => Goto,
        (Select, Case) => SelectCase,
        (Select, Type) => SelectType,
        (In, Out) => InOut,
        (Double, Precision) => DoublePrecision,
        _ => return Option::None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceForm;

    fn parse(text: &str) -> AstContext {
        let mut ctx = AstContext::new();
        let source = ctx.source_map.add_inline(text, SourceForm::Free);
        let mut parser = Parser::new(&mut ctx, source, false);
        parser.parse_program_units();
        ctx
    }

    #[test]
    fn test_merge_table() {
        assert_eq!(
            merge_keywords(Keyword::Go, Keyword::To),
            Some(Keyword::Goto)
        );
        assert_eq!(
            merge_keywords(Keyword::Double, Keyword::Precision),
            Some(Keyword::DoublePrecision)
        );
        assert_eq!(merge_keywords(Keyword::End, Keyword::Data), None);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let mut ctx = AstContext::new();
        let source = ctx.source_map.add_inline("PROGRAM P\nEND\n", SourceForm::Free);
        let parser = Parser::new(&mut ctx, source, false);

        let mut token = parser.tokens[0].clone();
        assert_eq!(token.kind, TokenKind::Keyword(Keyword::Program));
        let before = token.kind.clone();
        parser.classify_token(&mut token);
        assert_eq!(token.kind, before);
    }

    #[test]
    fn test_merging_respects_statement_boundaries() {
        // END on one line and IF opening the next statement must not
        // merge into ENDIF.
        let mut ctx = AstContext::new();
        let source = ctx
            .source_map
            .add_inline("END\nIF (.TRUE.) X = 1\n", SourceForm::Free);
        let parser = Parser::new(&mut ctx, source, false);
        assert_eq!(parser.tokens[0].kind, TokenKind::Keyword(Keyword::End));
        assert_eq!(parser.tokens[1].kind, TokenKind::Keyword(Keyword::If));
    }

    #[test]
    fn test_minimal_program_parses_clean() {
        let ctx = parse("PROGRAM P\nX = 1.0\nEND\n");
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
    }

    #[test]
    fn test_end_program_name_mismatch() {
        let ctx = parse("PROGRAM P\nEND PROGRAM Q\n");
        let rendered = format!("{}", ctx.diagnostics);
        assert!(rendered.contains("expected label 'P' for END PROGRAM statement"));
    }
}
