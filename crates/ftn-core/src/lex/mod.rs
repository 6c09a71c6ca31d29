//! The lexer.
//!
//! Fortran lexing is statement-oriented: the token stream carries
//! start-of-statement flags and statement-label tokens, and a fixed-form
//! token can be spelled across continuation lines (hence the multi-part
//! spellings on [`Token`]). Identifiers are emitted raw; promoting them
//! to keywords is the parser's job, because keyword-ness is contextual.
//!
//! Fixed form follows the punched-card rules: columns 1-5 are the label
//! field, a non-blank non-zero column 6 continues the previous line,
//! statement text ends at column 72, and `C`, `c`, `*` or `!` in column
//! 1 makes the whole line a comment. Free form uses `!` comments, `;`
//! separators and `&` continuations.

pub mod token;

pub use token::{DotOp, Token, TokenKind};

use crate::source::{SourceForm, SourceId, Span};

const FIXED_STMT_END_COL: usize = 72;

pub struct Lexer {
    text: String,
    source: SourceId,
    form: SourceForm,
    return_comments: bool,
    pos: usize,
    /// 1-based column of `pos`.
    col: usize,
    /// The next token starts a new statement.
    stmt_start: bool,
    /// A token produced during trivia skipping (fixed-form statement
    /// labels, retained comments), delivered before lexing continues.
    pending: Vec<Token>,
}

impl Lexer {
    pub fn new(text: String, source: SourceId, form: SourceForm, return_comments: bool) -> Self {
        Self {
            text,
            source,
            form,
            return_comments,
            pos: 0,
            col: 1,
            stmt_start: true,
            pending: Vec::new(),
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.source
    }

    /// The concatenated spelling of a token's parts.
    pub fn spelling(&self, token: &Token) -> String {
        let mut s = String::new();
        for part in &token.parts {
            s.push_str(&self.text[part.start..part.end]);
        }
        s
    }

    /// The value of a character literal: quotes stripped, doubled quotes
    /// collapsed.
    pub fn char_value(&self, token: &Token) -> String {
        let spelling = self.spelling(token);
        let bytes = spelling.as_bytes();
        if bytes.len() < 2 {
            return String::new();
        }
        let quote = bytes[0] as char;
        let inner = &spelling[1..spelling.len().saturating_sub(1)];
        let doubled: String = [quote, quote].iter().collect();
        inner.replace(&doubled, &quote.to_string())
    }

    pub fn lex_all(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let eof = token.is_eof();
            tokens.push(token);
            if eof {
                break;
            }
        }
        tokens
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            if let Some(token) = self.pending.pop() {
                return token;
            }
            self.skip_trivia();
            if let Some(token) = self.pending.pop() {
                return token;
            }
            if self.at_eof() {
                return Token::eof(Span::point(self.source, self.pos));
            }
            if let Some(token) = self.lex_token() {
                return token;
            }
        }
    }

    // ========================================================================
    // Cursor primitives
    // ========================================================================

    fn at_eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> char {
        self.text.as_bytes().get(self.pos).copied().unwrap_or(0) as char
    }

    fn peek_at(&self, offset: usize) -> char {
        self.text
            .as_bytes()
            .get(self.pos + offset)
            .copied()
            .unwrap_or(0) as char
    }

    fn advance(&mut self) {
        if self.at_eof() {
            return;
        }
        if self.peek() == '\n' {
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
    }

    fn take_stmt_start(&mut self) -> bool {
        std::mem::replace(&mut self.stmt_start, false)
    }

    // ========================================================================
    // Trivia and line structure
    // ========================================================================

    fn skip_trivia(&mut self) {
        match self.form {
            SourceForm::Fixed => self.skip_trivia_fixed(),
            SourceForm::Free => self.skip_trivia_free(),
        }
    }

    fn skip_trivia_free(&mut self) {
        while !self.at_eof() {
            match self.peek() {
                ' ' | '\t' | '\r' => self.advance(),
                '\n' | ';' => {
                    self.stmt_start = true;
                    self.advance();
                }
                '!' => {
                    self.consume_comment_to_eol();
                    if !self.pending.is_empty() {
                        return;
                    }
                }
                '&' => {
                    self.advance();
                    // Rest of the line may hold only blanks or a comment.
                    while !self.at_eof() && self.peek() != '\n' {
                        if self.peek() == '!' {
                            self.consume_comment_to_eol();
                        } else {
                            self.advance();
                        }
                    }
                    self.advance(); // newline
                    while matches!(self.peek(), ' ' | '\t' | '\r') {
                        self.advance();
                    }
                    if self.peek() == '&' {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn skip_trivia_fixed(&mut self) {
        while !self.at_eof() {
            if self.col == 1 {
                self.process_fixed_line_start();
                if !self.pending.is_empty() {
                    return;
                }
                continue;
            }
            match self.peek() {
                ' ' | '\t' | '\r' => self.advance(),
                '\n' => self.advance(),
                '!' => {
                    self.consume_comment_to_eol();
                    if !self.pending.is_empty() {
                        return;
                    }
                }
                _ if self.col > FIXED_STMT_END_COL => self.advance(),
                _ => return,
            }
        }
    }

    /// Handle the start of a fixed-form line: comment lines, the label
    /// field in columns 1-5 and the continuation marker in column 6.
    ///
    /// Lines whose label field holds anything other than blanks and
    /// digits are treated as starting a statement at column 1 (a common
    /// tolerance for hand-written sources).
    fn process_fixed_line_start(&mut self) {
        debug_assert_eq!(self.col, 1);
        if self.at_eof() {
            return;
        }

        match self.peek() {
            'C' | 'c' | '*' | '!' => {
                // Comment lines leave the statement flag alone; one may
                // sit between a line and its continuation.
                self.consume_comment_to_eol();
                if self.peek() == '\n' {
                    self.advance();
                }
                return;
            }
            '\n' => {
                self.advance();
                return;
            }
            _ => {}
        }

        let line_start = self.pos;
        let mut label: Option<(usize, usize)> = None;
        let mut irregular = false;
        for _ in 0..5 {
            match self.peek() {
                ' ' | '\t' => self.advance(),
                '0'..='9' => {
                    let start = self.pos;
                    label = Some(match label {
                        Some((s, _)) => (s, self.pos + 1),
                        None => (start, self.pos + 1),
                    });
                    self.advance();
                }
                '\n' | '\r' => break,
                _ if self.at_eof() => break,
                _ => {
                    irregular = true;
                    break;
                }
            }
        }

        if irregular {
            // Statement text beginning before column 7. Rewind to column
            // 1 but report the column as past the structural fields so
            // the trivia loop hands control to the token reader.
            self.pos = line_start;
            self.col = 7;
            self.stmt_start = true;
            return;
        }

        // Column 6: continuation marker.
        let continuation = !matches!(self.peek(), ' ' | '0' | '\n' | '\r') && !self.at_eof();
        if self.col == 6 {
            self.advance();
        }

        if continuation {
            return;
        }

        self.stmt_start = true;
        if let Some((start, end)) = label {
            let span = Span::new(self.source, start, end);
            let start_of_statement = self.take_stmt_start();
            self.pending.push(Token {
                kind: TokenKind::StatementLabel,
                span,
                parts: vec![span],
                start_of_statement,
                name: None,
            });
        }
    }

    fn consume_comment_to_eol(&mut self) {
        let start = self.pos;
        while !self.at_eof() && self.peek() != '\n' {
            self.advance();
        }
        if self.return_comments {
            let span = Span::new(self.source, start, self.pos);
            self.pending.push(Token {
                kind: TokenKind::Comment,
                span,
                parts: vec![span],
                start_of_statement: false,
                name: None,
            });
        }
    }

    /// At a fixed-form line boundary inside a token: if the following
    /// line (skipping comment lines) is a continuation line, consume up
    /// to its column 7 and return true.
    fn continue_token_over_line(&mut self) -> bool {
        if self.form != SourceForm::Fixed {
            return false;
        }
        let bytes = self.text.as_bytes();
        let mut look = self.pos;
        // Rest of the current line (ignored columns and the newline).
        while look < bytes.len() && bytes[look] != b'\n' {
            look += 1;
        }
        if look >= bytes.len() {
            return false;
        }
        look += 1;
        // Comment lines may interleave continuations.
        loop {
            match bytes.get(look) {
                Some(b'C') | Some(b'c') | Some(b'*') | Some(b'!') => {
                    while look < bytes.len() && bytes[look] != b'\n' {
                        look += 1;
                    }
                    if look >= bytes.len() {
                        return false;
                    }
                    look += 1;
                }
                _ => break,
            }
        }
        // Columns 1-5 must be blank, column 6 a continuation marker.
        for _ in 0..5 {
            match bytes.get(look) {
                Some(b' ') | Some(b'\t') => look += 1,
                _ => return false,
            }
        }
        match bytes.get(look) {
            Some(b' ') | Some(b'0') | Some(b'\n') | None => return false,
            Some(_) => look += 1,
        }
        self.pos = look;
        self.col = 7;
        true
    }

    fn at_token_line_break(&self) -> bool {
        self.form == SourceForm::Fixed
            && (self.peek() == '\n' || self.col > FIXED_STMT_END_COL)
            && !self.at_eof()
    }

    // ========================================================================
    // Token readers
    // ========================================================================

    fn lex_token(&mut self) -> Option<Token> {
        let start = self.pos;
        let start_of_statement = self.take_stmt_start();
        let c = self.peek();

        if c.is_ascii_alphabetic() || c == '_' {
            return Some(self.read_identifier(start, start_of_statement));
        }
        if c.is_ascii_digit() {
            return Some(self.read_number(start, start_of_statement));
        }
        if c == '\'' || c == '"' {
            return Some(self.read_char_literal(start, start_of_statement));
        }
        if c == '.' {
            return Some(self.read_dot(start, start_of_statement));
        }

        let kind = match c {
            '(' => {
                self.advance();
                if self.peek() == '/' && self.peek_at(1) != '=' && self.peek_at(1) != ')' {
                    self.advance();
                    TokenKind::LParenSlash
                } else {
                    TokenKind::LParen
                }
            }
            ')' => {
                self.advance();
                TokenKind::RParen
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            '=' => {
                self.advance();
                if self.peek() == '=' {
                    self.advance();
                    TokenKind::EqEq
                } else {
                    TokenKind::Equal
                }
            }
            '+' => {
                self.advance();
                TokenKind::Plus
            }
            '-' => {
                self.advance();
                TokenKind::Minus
            }
            '*' => {
                self.advance();
                if self.peek() == '*' {
                    self.advance();
                    TokenKind::StarStar
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                self.advance();
                match self.peek() {
                    '/' => {
                        self.advance();
                        TokenKind::SlashSlash
                    }
                    '=' => {
                        self.advance();
                        TokenKind::SlashEq
                    }
                    ')' => {
                        self.advance();
                        TokenKind::SlashRParen
                    }
                    _ => TokenKind::Slash,
                }
            }
            ':' => {
                self.advance();
                if self.peek() == ':' {
                    self.advance();
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            '%' => {
                self.advance();
                TokenKind::Percent
            }
            '<' => {
                self.advance();
                if self.peek() == '=' {
                    self.advance();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                self.advance();
                if self.peek() == '=' {
                    self.advance();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            other => {
                self.advance();
                TokenKind::Unknown(other)
            }
        };

        let span = Span::new(self.source, start, self.pos);
        Some(Token {
            kind,
            span,
            parts: vec![span],
            start_of_statement,
            name: None,
        })
    }

    fn read_identifier(&mut self, start: usize, start_of_statement: bool) -> Token {
        let mut parts = Vec::new();
        let mut part_start = start;
        loop {
            let c = self.peek();
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
                if self.at_token_line_break() {
                    parts.push(Span::new(self.source, part_start, self.pos));
                    if self.continue_token_over_line()
                        && (self.peek().is_ascii_alphanumeric() || self.peek() == '_')
                    {
                        part_start = self.pos;
                        continue;
                    }
                    break;
                }
            } else {
                parts.push(Span::new(self.source, part_start, self.pos));
                break;
            }
        }
        self.finish_multipart(TokenKind::Identifier, parts, start_of_statement)
    }

    fn read_number(&mut self, start: usize, start_of_statement: bool) -> Token {
        let mut is_real = false;
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && !self.dot_starts_operator() {
            is_real = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        if matches!(self.peek(), 'e' | 'E' | 'd' | 'D') {
            let mut look = 1;
            if matches!(self.peek_at(1), '+' | '-') {
                look = 2;
            }
            if self.peek_at(look).is_ascii_digit() {
                is_real = true;
                for _ in 0..=look {
                    self.advance();
                }
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
        }

        let kind = if is_real {
            TokenKind::RealLiteral
        } else if start_of_statement && self.form == SourceForm::Free {
            // A leading integer on a free-form statement is its label.
            TokenKind::StatementLabel
        } else {
            TokenKind::IntLiteral
        };
        let span = Span::new(self.source, start, self.pos);
        Token {
            kind,
            span,
            parts: vec![span],
            start_of_statement,
            name: None,
        }
    }

    /// Whether the `.` at the cursor begins a dot operator or logical
    /// literal (`.EQ.`, `.TRUE.`, ...) rather than a decimal point.
    /// Disambiguates `1.EQ.2`.
    fn dot_starts_operator(&self) -> bool {
        debug_assert_eq!(self.peek(), '.');
        let mut len = 1;
        while self.peek_at(len).is_ascii_alphabetic() {
            len += 1;
        }
        if len == 1 || self.peek_at(len) != '.' {
            return false;
        }
        let word: String = self.text[self.pos + 1..self.pos + len].to_ascii_uppercase();
        matches!(
            word.as_str(),
            "AND" | "OR" | "NOT" | "EQV" | "NEQV" | "EQ" | "NE" | "LT" | "LE" | "GT" | "GE"
                | "TRUE" | "FALSE"
        )
    }

    fn read_dot(&mut self, start: usize, start_of_statement: bool) -> Token {
        if self.peek_at(1).is_ascii_digit() {
            // A real literal like `.5`.
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
            if matches!(self.peek(), 'e' | 'E' | 'd' | 'D') && {
                let off = if matches!(self.peek_at(1), '+' | '-') { 2 } else { 1 };
                self.peek_at(off).is_ascii_digit()
            } {
                self.advance();
                if matches!(self.peek(), '+' | '-') {
                    self.advance();
                }
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
            let span = Span::new(self.source, start, self.pos);
            return Token {
                kind: TokenKind::RealLiteral,
                span,
                parts: vec![span],
                start_of_statement,
                name: None,
            };
        }

        self.advance();
        let word_start = self.pos;
        while self.peek().is_ascii_alphabetic() {
            self.advance();
        }
        let word = self.text[word_start..self.pos].to_ascii_uppercase();
        let kind = if self.peek() == '.' {
            self.advance();
            match word.as_str() {
                "AND" => TokenKind::DotOp(DotOp::And),
                "OR" => TokenKind::DotOp(DotOp::Or),
                "NOT" => TokenKind::DotOp(DotOp::Not),
                "EQV" => TokenKind::DotOp(DotOp::Eqv),
                "NEQV" => TokenKind::DotOp(DotOp::Neqv),
                "EQ" => TokenKind::DotOp(DotOp::Eq),
                "NE" => TokenKind::DotOp(DotOp::Ne),
                "LT" => TokenKind::DotOp(DotOp::Lt),
                "LE" => TokenKind::DotOp(DotOp::Le),
                "GT" => TokenKind::DotOp(DotOp::Gt),
                "GE" => TokenKind::DotOp(DotOp::Ge),
                "TRUE" => TokenKind::LogicalLiteral(true),
                "FALSE" => TokenKind::LogicalLiteral(false),
                _ => TokenKind::Unknown('.'),
            }
        } else {
            TokenKind::Unknown('.')
        };
        let span = Span::new(self.source, start, self.pos);
        Token {
            kind,
            span,
            parts: vec![span],
            start_of_statement,
            name: None,
        }
    }

    fn read_char_literal(&mut self, start: usize, start_of_statement: bool) -> Token {
        let quote = self.peek();
        let mut parts = Vec::new();
        let mut part_start = start;
        self.advance();
        loop {
            if self.at_eof() {
                parts.push(Span::new(self.source, part_start, self.pos));
                break;
            }
            if self.at_token_line_break() {
                parts.push(Span::new(self.source, part_start, self.pos));
                if self.continue_token_over_line() {
                    part_start = self.pos;
                    continue;
                }
                break;
            }
            let c = self.peek();
            if c == '\n' {
                // Unterminated literal; the parser reports it.
                parts.push(Span::new(self.source, part_start, self.pos));
                break;
            }
            self.advance();
            if c == quote {
                if self.peek() == quote {
                    self.advance();
                } else {
                    parts.push(Span::new(self.source, part_start, self.pos));
                    break;
                }
            }
        }
        self.finish_multipart(TokenKind::CharLiteral, parts, start_of_statement)
    }

    fn finish_multipart(
        &self,
        kind: TokenKind,
        parts: Vec<Span>,
        start_of_statement: bool,
    ) -> Token {
        let span = parts
            .iter()
            .copied()
            .reduce(Span::merge)
            .unwrap_or_else(|| Span::point(self.source, self.pos));
        Token {
            kind,
            span,
            parts,
            start_of_statement,
            name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str, form: SourceForm) -> (Vec<Token>, Lexer) {
        let lexer = Lexer::new(text.to_string(), SourceId(0), form, false);
        let checker = Lexer::new(text.to_string(), SourceId(0), form, false);
        (lexer.lex_all(), checker)
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind.clone()).collect()
    }

    #[test]
    fn test_free_form_basics() {
        let (tokens, lexer) = lex("X = Y + 1.5\n", SourceForm::Free);
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Identifier,
                TokenKind::Plus,
                TokenKind::RealLiteral,
                TokenKind::Eof,
            ]
        );
        assert!(tokens[0].start_of_statement);
        assert!(!tokens[1].start_of_statement);
        assert_eq!(lexer.spelling(&tokens[4]), "1.5");
    }

    #[test]
    fn test_free_form_statement_label() {
        let (tokens, _) = lex("10 CONTINUE\n", SourceForm::Free);
        assert_eq!(tokens[0].kind, TokenKind::StatementLabel);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_free_form_continuation() {
        let (tokens, _) = lex("X = Y + &\n    Z\n", SourceForm::Free);
        let ks = kinds(&tokens);
        assert_eq!(
            ks,
            vec![
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Identifier,
                TokenKind::Plus,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
        // Continuation does not start a new statement.
        assert!(!tokens[4].start_of_statement);
    }

    #[test]
    fn test_free_form_comment_and_separator() {
        let (tokens, _) = lex("X = 1 ! trailing\nY = 2; Z = 3\n", SourceForm::Free);
        let stmt_starts: Vec<bool> = tokens.iter().map(|t| t.start_of_statement).collect();
        assert_eq!(
            stmt_starts,
            vec![
                true, false, false, // X = 1
                true, false, false, // Y = 2
                true, false, false, // Z = 3
                true, // eof
            ]
        );
    }

    #[test]
    fn test_fixed_form_label_and_comment() {
        let text = "C comment line\n   10 X = 1\n";
        let (tokens, lexer) = lex(text, SourceForm::Fixed);
        assert_eq!(tokens[0].kind, TokenKind::StatementLabel);
        assert_eq!(lexer.spelling(&tokens[0]), "10");
        assert!(tokens[0].start_of_statement);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(lexer.spelling(&tokens[1]), "X");
    }

    #[test]
    fn test_fixed_form_continuation_splits_token() {
        // The identifier VALUE is spelled VAL in columns 70-72 and UE on
        // the continuation line (column 6 marker `1`).
        let mut line = String::from("      X = ");
        while line.len() < 69 {
            line.push(' ');
        }
        line.push_str("VAL\n");
        let text = format!("{}     1UE\n", line);
        let (tokens, lexer) = lex(&text, SourceForm::Fixed);
        let ident = &tokens[2];
        assert_eq!(ident.kind, TokenKind::Identifier);
        assert_eq!(lexer.spelling(ident), "VALUE");
        assert_eq!(ident.parts.len(), 2);
    }

    #[test]
    fn test_fixed_form_plain_line_continuation() {
        let text = "      X = A +\n     1    B\n";
        let (tokens, lexer) = lex(text, SourceForm::Fixed);
        let ks = kinds(&tokens);
        assert_eq!(
            ks,
            vec![
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Identifier,
                TokenKind::Plus,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
        assert_eq!(lexer.spelling(&tokens[4]), "B");
        assert!(!tokens[4].start_of_statement);
    }

    #[test]
    fn test_fixed_form_ignores_past_column_72() {
        let mut line = String::from("      X = 1");
        while line.len() < 72 {
            line.push(' ');
        }
        line.push_str("IGNORED");
        line.push('\n');
        let (tokens, _) = lex(&line, SourceForm::Fixed);
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::IntLiteral,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_dot_operator_disambiguation() {
        let (tokens, _) = lex("X = 1.EQ.2\n", SourceForm::Free);
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::IntLiteral,
                TokenKind::DotOp(DotOp::Eq),
                TokenKind::IntLiteral,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_logical_literals_and_real() {
        let (tokens, _) = lex("L = .TRUE.\nR = 1.5D0\n", SourceForm::Free);
        assert_eq!(tokens[2].kind, TokenKind::LogicalLiteral(true));
        assert_eq!(tokens[5].kind, TokenKind::RealLiteral);
    }

    #[test]
    fn test_char_literal_with_doubled_quote() {
        let (tokens, lexer) = lex("C = 'IT''S'\n", SourceForm::Free);
        assert_eq!(tokens[2].kind, TokenKind::CharLiteral);
        assert_eq!(lexer.char_value(&tokens[2]), "IT'S");
    }

    #[test]
    fn test_array_constructor_delimiters() {
        let (tokens, _) = lex("A = (/1, 2/)\n", SourceForm::Free);
        assert_eq!(tokens[2].kind, TokenKind::LParenSlash);
        assert_eq!(tokens[6].kind, TokenKind::SlashRParen);
    }

    #[test]
    fn test_multi_char_operators() {
        let (tokens, _) = lex("X = A ** 2 // B == C /= D <= E >= F\n", SourceForm::Free);
        let ks = kinds(&tokens);
        assert!(ks.contains(&TokenKind::StarStar));
        assert!(ks.contains(&TokenKind::SlashSlash));
        assert!(ks.contains(&TokenKind::EqEq));
        assert!(ks.contains(&TokenKind::SlashEq));
        assert!(ks.contains(&TokenKind::Le));
        assert!(ks.contains(&TokenKind::Ge));
    }

    #[test]
    fn test_comment_retention() {
        let lexer = Lexer::new(
            "! leading\nX = 1\n".to_string(),
            SourceId(0),
            SourceForm::Free,
            true,
        );
        let tokens = lexer.lex_all();
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }
}
