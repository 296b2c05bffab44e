//! Normalization passes
//!
//! This module rewrites the token graph in a fixed order:
//! - [`links`]: bracket linking, then heuristic template angle brackets
//! - [`scopes`]: the lexical scope tree shared by the resolvers
//! - [`declarator`]: alias declarator shapes and the substitution engine
//! - [`typedefs`]: legacy `typedef` inlining
//! - [`usings`]: C++ `using` alias inlining
//! - [`varid`]: variable-identity assignment
//!
//! # Pass ordering
//!
//! Bracket links come first because every later heuristic navigates via
//! matched pairs.  Alias inlining runs before identity assignment because
//! substitution rewrites declarations.  The alias phase and the identity
//! phase each build their own scope tree from scratch: the edits made by an
//! earlier phase invalidate any previously built tree, so nothing is shared
//! or incrementally patched across phases.
//!
//! # Failure classes
//!
//! Structural corruption (mismatched brackets, scope-tree inconsistencies,
//! a half-finished substitution) aborts the whole input with a
//! [`NormalizeError`].  Constructs a heuristic does not recognize are
//! skipped, optionally with a debug-severity report, and the stream keeps
//! its "no link" / "no identity" / "alias kept" state — downstream
//! consumers treat those as ordinary.

pub mod declarator;
pub mod links;
pub mod scopes;
pub mod typedefs;
pub mod usings;
pub mod varid;

use crate::config::Settings;
use crate::report::Reporter;
use crate::tokens::{SourceLocation, TokenList};
use std::fmt;
use std::time::Instant;

/// Fatal normalization errors.  Any of these means the token stream cannot
/// be trusted and the analysis of this input stops with no partial result.
#[derive(Debug, Clone)]
pub enum NormalizeError {
    /// A closing bracket appeared with no matching opener.
    UnmatchedClosing { text: String, location: SourceLocation },

    /// An opening bracket was never closed before end of stream.
    UnclosedBracket { text: String, location: SourceLocation },

    /// A closing bracket did not match the kind of the innermost opener.
    MismatchedBracket {
        open: String,
        close: String,
        location: SourceLocation,
    },

    /// An alias substitution was committed but a use-site could not be
    /// rewritten, leaving the stream inconsistent.
    AliasSubstitution { name: String, location: SourceLocation },

    /// Scope bookkeeping lost track of the stream during identity
    /// assignment.
    InternalError { message: String, location: SourceLocation },

    /// The cooperative stop flag was raised between passes.
    Stopped,
}

impl NormalizeError {
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            NormalizeError::UnmatchedClosing { location, .. }
            | NormalizeError::UnclosedBracket { location, .. }
            | NormalizeError::MismatchedBracket { location, .. }
            | NormalizeError::AliasSubstitution { location, .. }
            | NormalizeError::InternalError { location, .. } => Some(location),
            NormalizeError::Stopped => None,
        }
    }
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::UnmatchedClosing { text, location } => {
                write!(
                    f,
                    "Unmatched '{}' at line {}, column {}",
                    text, location.line, location.column
                )
            }
            NormalizeError::UnclosedBracket { text, location } => {
                write!(
                    f,
                    "'{}' at line {}, column {} is never closed",
                    text, location.line, location.column
                )
            }
            NormalizeError::MismatchedBracket {
                open,
                close,
                location,
            } => {
                write!(
                    f,
                    "'{}' closed by '{}' at line {}, column {}",
                    open, close, location.line, location.column
                )
            }
            NormalizeError::AliasSubstitution { name, location } => {
                write!(
                    f,
                    "Cannot inline type alias '{}' at line {}",
                    name, location.line
                )
            }
            NormalizeError::InternalError { message, location } => {
                write!(f, "Internal error at line {}: {}", location.line, message)
            }
            NormalizeError::Stopped => write!(f, "Analysis stopped on request"),
        }
    }
}

impl std::error::Error for NormalizeError {}

/// Mutable context shared by the alias-simplification passes: the
/// wall-clock deadline and the counter for generated record names.  Built
/// per run, never ambient.
#[derive(Debug)]
pub struct SimplifyContext {
    deadline: Option<Instant>,
    unnamed_count: usize,
}

impl SimplifyContext {
    pub fn new(settings: &Settings) -> Self {
        SimplifyContext {
            deadline: settings.alias_time_budget.map(|budget| Instant::now() + budget),
            unnamed_count: 0,
        }
    }

    /// True once the alias time budget has elapsed.  Checked between
    /// declarations, never mid-substitution.
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fresh name for an anonymous record that must become referencable.
    pub fn next_unnamed(&mut self) -> String {
        let name = format!("Unnamed{}", self.unnamed_count);
        self.unnamed_count += 1;
        name
    }
}

/// Run the full normalization pipeline over `list`.
///
/// On success the stream has mutually linked brackets, inlined aliases, and
/// variable identities.  On error the stream is unusable for later phases
/// and should be discarded.
pub fn normalize(
    list: &mut TokenList,
    settings: &Settings,
    reporter: &mut dyn Reporter,
) -> Result<(), NormalizeError> {
    links::link_brackets(list)?;
    if settings.is_cpp() {
        links::link_angle_brackets(list);
    }

    if settings.stop_requested() {
        return Err(NormalizeError::Stopped);
    }

    let mut ctx = SimplifyContext::new(settings);
    typedefs::simplify_typedefs(list, settings, &mut ctx, reporter)?;
    if settings.is_cpp() {
        usings::simplify_usings(list, settings, &mut ctx, reporter)?;
    }

    if settings.stop_requested() {
        return Err(NormalizeError::Stopped);
    }

    varid::assign_varids(list, settings, reporter)?;
    Ok(())
}
