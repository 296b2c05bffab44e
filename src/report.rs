//! Diagnostics reporting interface
//!
//! Every pass reports through the [`Reporter`] trait: fatal aborts surface as
//! `Err` values in the pass signatures, while best-effort misses (an alias
//! declarator that didn't parse, a declaration heuristic that didn't match)
//! become low-severity [`Diagnostic`] entries.  The formatting and transport
//! of reports is the caller's concern; this crate only produces them.

use crate::tokens::SourceLocation;
use std::fmt;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Internal bookkeeping: a construct was skipped, analysis precision is
    /// reduced, nothing is wrong with the input.
    Debug,
    /// The input is suspicious but processing continued.
    Warning,
    /// The input could not be processed.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => write!(f, "debug"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One report from a normalization pass.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable identifier, e.g. `"simplifyTypedef"` or `"unmatchedBracket"`.
    pub id: &'static str,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    pub fn debug(id: &'static str, message: String, location: Option<SourceLocation>) -> Self {
        Diagnostic {
            severity: Severity::Debug,
            id,
            message,
            location,
        }
    }

    pub fn warning(id: &'static str, message: String, location: Option<SourceLocation>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            id,
            message,
            location,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(
                f,
                "{} at line {}, column {}: {} [{}]",
                self.severity, loc.line, loc.column, self.message, self.id
            ),
            None => write!(f, "{}: {} [{}]", self.severity, self.message, self.id),
        }
    }
}

/// Consumer of diagnostics produced by the passes.
pub trait Reporter {
    fn report(&mut self, diag: Diagnostic);
}

/// Reporter that collects everything in memory.  Used by the CLI and tests.
#[derive(Debug, Default)]
pub struct CollectedReports {
    pub diags: Vec<Diagnostic>,
}

impl CollectedReports {
    pub fn new() -> Self {
        CollectedReports { diags: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.diags.is_empty()
    }
}

impl Reporter for CollectedReports {
    fn report(&mut self, diag: Diagnostic) {
        self.diags.push(diag);
    }
}

/// Reporter that drops everything.  Useful when a caller only cares about
/// the fatal/non-fatal distinction.
#[derive(Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&mut self, _diag: Diagnostic) {}
}
