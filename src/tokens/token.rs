// Token definitions for the normalization passes

use bitflags::bitflags;
use std::fmt;

/// Stable index of a token inside its [`TokenList`](super::TokenList) arena.
pub type TokenId = usize;

/// Source position information for error reporting.
///
/// `file` indexes the owning list's file table; inserted tokens inherit the
/// location of their insertion anchor so diagnostics stay meaningful after
/// rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: u32,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(file: u32, line: usize, column: usize) -> Self {
        Self { file, line, column }
    }
}

/// Syntactic category of a token, assigned by the lexer and preserved
/// through rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier that is not a keyword of the configured dialect.
    Name,
    /// Reserved word of the configured dialect.
    Keyword,
    /// Integer or floating literal, including suffixes.
    Number,
    /// String literal, quotes included in the text.
    String,
    /// Character literal, quotes included in the text.
    Char,
    /// Operator or punctuation, including brackets.
    Op,
}

bitflags! {
    /// Mutable per-token flag set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TokenFlags: u8 {
        /// Token was inserted (or rewritten) while inlining a type alias.
        const ALIAS_EXPANDED = 1 << 0;
        /// Token is part of a cast expression.
        const CAST = 1 << 1;
        /// Token is one half of a `>>` that was split into two `>`.
        const SPLIT_SHIFT = 1 << 2;
        /// Token was synthesized by the normalizer (e.g. a generated name
        /// for an anonymous record).
        const GENERATED = 1 << 3;
    }
}

/// The kind of a paired bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketKind {
    Brace,
    Paren,
    Square,
    /// Heuristically disambiguated template delimiters.  Unlike the other
    /// kinds, an angle bracket may legitimately stay unlinked forever.
    Angle,
}

/// Atomic lexical unit of the token graph.
///
/// Everything here is mutable in place: alias inlining rewrites `text`,
/// bracket linking fills `link`, identity assignment fills `varid`.
#[derive(Debug, Clone)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
    pub loc: SourceLocation,
    pub flags: TokenFlags,
    /// Exclusive mutual pairing with exactly one other bracket token.
    pub link: Option<TokenId>,
    /// Variable identity; 0 means unassigned or not a variable.
    pub varid: u32,
}

impl Token {
    pub fn new(text: impl Into<String>, kind: TokenKind, loc: SourceLocation) -> Self {
        Token {
            text: text.into(),
            kind,
            loc,
            flags: TokenFlags::empty(),
            link: None,
            varid: 0,
        }
    }

    pub fn name(text: impl Into<String>, loc: SourceLocation) -> Self {
        Token::new(text, TokenKind::Name, loc)
    }

    pub fn op(text: impl Into<String>, loc: SourceLocation) -> Self {
        Token::new(text, TokenKind::Op, loc)
    }

    pub fn is_name(&self) -> bool {
        self.kind == TokenKind::Name
    }

    pub fn is_keyword(&self) -> bool {
        self.kind == TokenKind::Keyword
    }

    pub fn is_op(&self, text: &str) -> bool {
        self.kind == TokenKind::Op && self.text == text
    }

    /// Bracket kind if this token opens a pair.  `<` is never reported here;
    /// angle brackets exist only through the heuristic second linking pass.
    pub fn open_bracket(&self) -> Option<BracketKind> {
        if self.kind != TokenKind::Op {
            return None;
        }
        match self.text.as_str() {
            "{" => Some(BracketKind::Brace),
            "(" => Some(BracketKind::Paren),
            "[" => Some(BracketKind::Square),
            _ => None,
        }
    }

    /// Bracket kind if this token closes a pair.
    pub fn close_bracket(&self) -> Option<BracketKind> {
        if self.kind != TokenKind::Op {
            return None;
        }
        match self.text.as_str() {
            "}" => Some(BracketKind::Brace),
            ")" => Some(BracketKind::Paren),
            "]" => Some(BracketKind::Square),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_classification() {
        let loc = SourceLocation::new(0, 1, 1);
        assert_eq!(Token::op("{", loc).open_bracket(), Some(BracketKind::Brace));
        assert_eq!(Token::op(")", loc).close_bracket(), Some(BracketKind::Paren));
        assert_eq!(Token::op("<", loc).open_bracket(), None);
        assert_eq!(Token::name("x", loc).open_bracket(), None);
    }

    #[test]
    fn test_flags() {
        let loc = SourceLocation::new(0, 1, 1);
        let mut tok = Token::op(">", loc);
        assert!(tok.flags.is_empty());
        tok.flags |= TokenFlags::SPLIT_SHIFT;
        assert!(tok.flags.contains(TokenFlags::SPLIT_SHIFT));
        assert!(!tok.flags.contains(TokenFlags::CAST));
    }
}
