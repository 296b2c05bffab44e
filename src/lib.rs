//! # Introduction
//!
//! cnorm turns an already-preprocessed C/C++ source text into a structurally
//! linked, semantically disambiguated token stream.  Later analyses (symbol
//! database, dataflow, individual checks) consume the normalized stream and
//! never have to re-derive bracket pairing, type aliases, or variable
//! identities themselves.
//!
//! ## Normalization pipeline
//!
//! ```text
//! Source → Lexer → Token graph → Bracket links → Alias inlining → Variable identities
//! ```
//!
//! 1. [`tokens`] — the token graph: an arena of tokens addressed by stable
//!    indices, doubly navigable, mutable in place, plus the ingestion lexer
//!    that builds it from preprocessed source text.
//! 2. [`normalize`] — the passes that rewrite the graph: bracket linking
//!    (including heuristic template angle brackets), typedef and `using`
//!    alias inlining, and variable-identity assignment.
//! 3. [`report`] — the diagnostics interface shared by all passes.
//! 4. [`config`] — language dialect, platform widths, and resource budgets,
//!    threaded explicitly through every pass.
//!
//! ## Design constraints
//!
//! The passes use local pattern matching and bracket-matching heuristics, not
//! a grammar-driven parser.  Every consumer of the normalized stream treats
//! "no link", "no identity", and "alias left un-inlined" as ordinary states,
//! so each heuristic prefers recognizing nothing over guessing wrong.

pub mod config;
pub mod normalize;
pub mod report;
pub mod tokens;
