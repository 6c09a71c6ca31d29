//! Token definitions.

use crate::interner::Name;
use crate::keywords::Keyword;
use crate::source::Span;

/// Operators written in dot form (`.AND.`, `.EQ.`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DotOp {
    And,
    Or,
    Not,
    Eqv,
    Neqv,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Eof,
    /// A raw identifier. The parser may promote it to `Keyword` by table
    /// lookup and demote it back in identifier position.
    Identifier,
    /// An identifier promoted by classification or keyword merging.
    Keyword(Keyword),
    /// A numeric statement label (fixed-form label field, or leading
    /// digits of a free-form statement).
    StatementLabel,
    IntLiteral,
    /// Real literal; a `D` exponent marks DOUBLE PRECISION (the parser
    /// inspects the spelling).
    RealLiteral,
    CharLiteral,
    LogicalLiteral(bool),
    DotOp(DotOp),
    LParen,
    RParen,
    /// `(/` opening an array constructor.
    LParenSlash,
    /// `/)` closing an array constructor.
    SlashRParen,
    Comma,
    Equal,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Colon,
    ColonColon,
    Percent,
    EqEq,
    SlashEq,
    Lt,
    Le,
    Gt,
    Ge,
    /// Emitted only when comment retention is enabled.
    Comment,
    Unknown(char),
}

/// A lexed token.
///
/// `parts` is a vector because a fixed-form token may be spelled across
/// continuation lines; `span` covers the whole range from the first part
/// to the last.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub parts: Vec<Span>,
    /// True for the first token of each statement.
    pub start_of_statement: bool,
    /// Interned (uppercased) spelling, filled in by classification for
    /// identifier-class tokens. Retained when the kind is promoted to a
    /// keyword so the parser can demote the token back.
    pub name: Option<Name>,
}

impl Token {
    pub fn eof(span: Span) -> Self {
        Self {
            kind: TokenKind::Eof,
            span,
            parts: Vec::new(),
            start_of_statement: true,
            name: None,
        }
    }

    pub fn is(&self, kind: &TokenKind) -> bool {
        self.kind == *kind
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.kind == TokenKind::Keyword(kw)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}
