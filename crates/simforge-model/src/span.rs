//! Source location tracking for diagnostics.
//!
//! Every input format handled by simforge is line-oriented (world specs,
//! render-sync specs, rule files, module marker comments), so a location is
//! just a 1-based line number. Line `0` means "no location", used for
//! diagnostics raised by whole-model passes such as the `World` check.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Line-granular source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Span {
    /// 1-based line number, `0` when unknown.
    pub line: u32,
}

impl Span {
    /// A span with no location.
    pub const NONE: Span = Span { line: 0 };

    /// Create a span pointing at a 1-based line.
    pub const fn line(line: u32) -> Self {
        Self { line }
    }

    /// Create a span from a 0-based line index, as produced by `enumerate()`.
    pub fn from_index(index: usize) -> Self {
        Self {
            line: u32::try_from(index + 1).unwrap_or(u32::MAX),
        }
    }

    /// Whether this span carries a location.
    pub fn is_known(&self) -> bool {
        self.line != 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "line {}", self.line)
        } else {
            write!(f, "<unknown>")
        }
    }
}
