//! Analysis configuration
//!
//! Settings are built once by the caller and threaded explicitly through
//! every normalization pass.  Nothing in this crate keeps ambient mutable
//! configuration: the alias-simplification time budget, the cooperative stop
//! flag, and the platform widths all travel inside [`Settings`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Target language of the input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    C,
    Cpp,
}

/// Numeric type widths of the analyzed platform, in bytes.
///
/// The linking/alias/identity passes never consult these directly; they are
/// carried so that sibling passes downstream share one configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub sizeof_int: u8,
    pub sizeof_long: u8,
    pub sizeof_pointer: u8,
}

impl Default for Platform {
    fn default() -> Self {
        // LP64 defaults
        Platform {
            sizeof_int: 4,
            sizeof_long: 8,
            sizeof_pointer: 8,
        }
    }
}

/// Configuration for one normalization run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Language of the input.  Angle-bracket linking and `using` aliases are
    /// C++-only; typedef inlining runs for both dialects.
    pub dialect: Dialect,

    /// Standard year: 99/11/17 for C, 03/11/14/17/20 for C++.
    pub standard: u16,

    /// Numeric widths of the analyzed platform.
    pub platform: Platform,

    /// Wall-clock budget for alias simplification.  When it elapses, the
    /// remaining aliases are left un-inlined and the pipeline continues;
    /// this is an availability safeguard, not a correctness feature.
    pub alias_time_budget: Option<Duration>,

    /// Cooperative cancellation flag, polled between whole-file passes.
    /// Setting it aborts the entire analysis of the current input.
    pub stop: Option<Arc<AtomicBool>>,
}

impl Settings {
    /// Settings for C++ input at the default standard year.
    pub fn cpp() -> Self {
        Settings {
            dialect: Dialect::Cpp,
            standard: 17,
            platform: Platform::default(),
            alias_time_budget: None,
            stop: None,
        }
    }

    /// Settings for C input at the default standard year.
    pub fn c() -> Self {
        Settings {
            dialect: Dialect::C,
            standard: 11,
            ..Settings::cpp()
        }
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.alias_time_budget = Some(budget);
        self
    }

    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn is_cpp(&self) -> bool {
        self.dialect == Dialect::Cpp
    }

    /// Check the cooperative stop flag.  Called between passes, never
    /// mid-token.
    pub fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::cpp()
    }
}
