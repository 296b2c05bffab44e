//! The token graph
//!
//! This module holds the representation every normalization pass works on:
//! - [`token`]: the [`Token`] itself — text, category, flags, source
//!   position, optional bracket link, optional variable identity
//! - [`list`]: the [`TokenList`] arena — stable indices, O(1) neighbor
//!   navigation, in-place insertion/erasure/splicing
//! - [`lexer`]: the ingestion lexer that builds a [`TokenList`] from
//!   preprocessed source text
//! - [`keywords`]: compile-time keyword and operator tables
//!
//! # Arena addressing
//!
//! Tokens are addressed by [`TokenId`], an index into the arena.  Erasing a
//! token splices it out of the neighbor chain without invalidating any other
//! id, so passes can hold ids across edits.  An erased id must not be
//! dereferenced again; `TokenList::get` returns `None` for it.

pub mod keywords;
pub mod lexer;
pub mod list;
pub mod token;

pub use lexer::{LexError, Lexer};
pub use list::TokenList;
pub use token::{BracketKind, SourceLocation, Token, TokenFlags, TokenId, TokenKind};
