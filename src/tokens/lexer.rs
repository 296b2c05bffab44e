//! Lexer (tokenizer) for preprocessed C/C++ source
//!
//! Converts preprocessed source text into the flat [`TokenList`] the
//! normalization passes consume.  Remaining preprocessor directives are
//! silently skipped rather than parsed: macro expansion happens before this
//! crate is involved.
//!
//! The lexer only classifies tokens (name, keyword, number, string, char,
//! operator); it never interprets them.  Bracket pairing and `<`/`>`
//! disambiguation are normalization passes, not lexer concerns.

use super::keywords::{is_keyword, MULTI_CHAR_OPS};
use super::list::TokenList;
use super::token::{SourceLocation, Token, TokenKind};
use crate::config::Dialect;
use std::fmt;

/// Lexer error type
#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub location: SourceLocation,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lexer error at line {}, column {}: {}",
            self.location.line, self.location.column, self.message
        )
    }
}

impl std::error::Error for LexError {}

/// Lexer for preprocessed C/C++ source
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    file: u32,
    dialect: Dialect,
}

impl Lexer {
    pub fn new(input: &str, dialect: Dialect) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            file: 0,
            dialect,
        }
    }

    /// Tokenize the entire input into a fresh [`TokenList`].
    pub fn tokenize(mut self, file_name: &str) -> Result<TokenList, LexError> {
        let mut list = TokenList::new();
        self.file = list.add_file(file_name);

        loop {
            self.skip_whitespace_and_comments()?;

            if self.is_at_end() {
                break;
            }

            // Skip any directive the preprocessor left behind
            if self.peek() == Some('#') {
                self.skip_directive_line();
                continue;
            }

            let token = self.next_token()?;
            list.push_back(token);
        }

        Ok(list)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        let loc = self.current_location();
        let ch = self.peek().ok_or_else(|| LexError {
            message: "Unexpected end of file".to_string(),
            location: loc,
        })?;

        match ch {
            '"' => self.string_literal(),
            '\'' => self.char_literal(),
            '0'..='9' => self.number_literal(),
            'a'..='z' | 'A'..='Z' | '_' | '$' => Ok(self.identifier_or_keyword()),
            '.' if self
                .peek_ahead(1)
                .is_some_and(|c| c.is_ascii_digit()) =>
            {
                self.number_literal()
            }
            _ => self.operator(),
        }
    }

    /// Parse string literal, keeping quotes and escapes verbatim in the
    /// token text so substitution can splice it back out unchanged.
    fn string_literal(&mut self) -> Result<Token, LexError> {
        let loc = self.current_location();
        let mut text = String::new();
        text.push(self.advance().unwrap_or('"'));

        loop {
            match self.advance() {
                Some('\\') => {
                    text.push('\\');
                    if let Some(escaped) = self.advance() {
                        text.push(escaped);
                    }
                }
                Some('"') => {
                    text.push('"');
                    return Ok(Token::new(text, TokenKind::String, loc));
                }
                Some('\n') | None => {
                    return Err(LexError {
                        message: "Unterminated string literal".to_string(),
                        location: loc,
                    });
                }
                Some(ch) => text.push(ch),
            }
        }
    }

    /// Parse character literal, quotes kept in the text.
    fn char_literal(&mut self) -> Result<Token, LexError> {
        let loc = self.current_location();
        let mut text = String::new();
        text.push(self.advance().unwrap_or('\''));

        loop {
            match self.advance() {
                Some('\\') => {
                    text.push('\\');
                    if let Some(escaped) = self.advance() {
                        text.push(escaped);
                    }
                }
                Some('\'') => {
                    text.push('\'');
                    return Ok(Token::new(text, TokenKind::Char, loc));
                }
                Some('\n') | None => {
                    return Err(LexError {
                        message: "Unterminated character literal".to_string(),
                        location: loc,
                    });
                }
                Some(ch) => text.push(ch),
            }
        }
    }

    /// Parse a numeric literal with the C number munch: digits, radix
    /// prefixes, suffixes, and exponent signs all end up in one token.
    fn number_literal(&mut self) -> Result<Token, LexError> {
        let loc = self.current_location();
        let mut text = String::new();

        while let Some(ch) = self.peek() {
            let take = ch.is_ascii_alphanumeric()
                || ch == '.'
                || ch == '_'
                || ((ch == '+' || ch == '-')
                    && matches!(
                        text.chars().last(),
                        Some('e') | Some('E') | Some('p') | Some('P')
                    ));
            if !take {
                break;
            }
            text.push(ch);
            self.advance();
        }

        Ok(Token::new(text, TokenKind::Number, loc))
    }

    /// Parse identifier or keyword
    fn identifier_or_keyword(&mut self) -> Token {
        let loc = self.current_location();
        let mut text = String::new();

        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let kind = if is_keyword(&text, self.dialect == Dialect::Cpp) {
            TokenKind::Keyword
        } else {
            TokenKind::Name
        };
        Token::new(text, kind, loc)
    }

    /// Parse operator or punctuation with maximal munch.
    fn operator(&mut self) -> Result<Token, LexError> {
        let loc = self.current_location();

        for op in MULTI_CHAR_OPS {
            if self.matches_ahead(op) {
                for _ in 0..op.chars().count() {
                    self.advance();
                }
                return Ok(Token::op(*op, loc));
            }
        }

        let ch = self.advance().ok_or_else(|| LexError {
            message: "Unexpected end of file".to_string(),
            location: loc,
        })?;

        if "+-*/%=<>!&|^~?:;,.(){}[]".contains(ch) {
            Ok(Token::op(ch.to_string(), loc))
        } else {
            Err(LexError {
                message: format!("Unexpected character: '{}'", ch),
                location: loc,
            })
        }
    }

    fn matches_ahead(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(i, ch)| self.peek_ahead(i) == Some(ch))
    }

    /// Skip whitespace and comments
    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.advance();
                }
                Some('/') => {
                    if self.peek_ahead(1) == Some('/') {
                        self.skip_line_comment();
                    } else if self.peek_ahead(1) == Some('*') {
                        self.skip_block_comment()?;
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            self.advance();
            if ch == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start_loc = self.current_location();
        self.advance(); // skip '/'
        self.advance(); // skip '*'

        while !self.is_at_end() {
            if self.peek() == Some('*') && self.peek_ahead(1) == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }

        Err(LexError {
            message: "Unterminated block comment".to_string(),
            location: start_loc,
        })
    }

    fn skip_directive_line(&mut self) {
        // Line continuations keep the directive going
        loop {
            match self.advance() {
                Some('\\') => {
                    if self.peek() == Some('\n') {
                        self.advance();
                    }
                }
                Some('\n') | None => break,
                Some(_) => {}
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;

        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(ch)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.file, self.line, self.column)
    }
}
