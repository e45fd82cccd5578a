//! Compile-time error reporting and diagnostics.
//!
//! The pipeline knows exactly two outcomes for a problem: it is fatal, and the
//! stage returns `Err(CompileError)` immediately, or it is a warning, and the
//! stage records it in a [`Diagnostics`] sink and carries on with a
//! best-effort model.
//!
//! # Design
//!
//! - `CompileError` — single diagnostic with a location, message and notes
//! - `ErrorKind` — categorizes the problem by what went wrong
//! - `Severity` — note, warning or error
//! - `Diagnostics` — ordered collection of non-fatal diagnostics
//!
//! # Examples
//!
//! ```
//! # use simforge_model::error::*;
//! # use simforge_model::Span;
//! let error = CompileError::new(
//!     ErrorKind::UndefinedEntity,
//!     Span::line(3),
//!     format!("entity '{}' is not declared", "Ghost"),
//! );
//! assert_eq!(error.severity, Severity::Error);
//! ```

use crate::span::Span;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Compilation diagnostic with source location and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileError {
    /// Category of this error
    pub kind: ErrorKind,
    /// Severity level
    pub severity: Severity,
    /// Line the problem was found on
    pub span: Span,
    /// File the problem was found in, when it is not the main spec
    pub file: Option<PathBuf>,
    /// Primary error message
    pub message: String,
    /// Additional notes or hints
    pub notes: Vec<String>,
}

/// Category of compilation error.
///
/// # Invariant
///
/// The discriminant values must match the ERROR_KIND_NAMES array indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ErrorKind {
    /// Line that matches no grammar at all
    Syntax = 0,
    /// Directive with the wrong number of arguments
    MalformedDirective = 1,
    /// Section header or phase tag that is not recognized
    UnknownSection = 2,
    /// Reference to an entity that was never declared
    UndefinedEntity = 3,
    /// Second declaration of the same name
    DuplicateName = 4,
    /// Type name that the registry cannot resolve
    UnknownType = 5,
    /// GENERIC entity with a non-positive or non-integer count
    InvalidCapacity = 6,
    /// Variable declared while no entity is open
    VariableOutsideEntity = 7,
    /// The mandatory UNIQUE `World` entity is absent
    MissingWorld = 8,
    /// Execution mode other than SINGLE or PARALLEL
    UnknownMode = 9,
    /// Literal that cannot be parsed for its directive
    InvalidValue = 10,
    /// Declaration of a reserved engine field
    ReservedName = 11,
    /// Referenced module source does not exist
    MissingModule = 12,
    /// Requirement names a property the entity does not have
    UndefinedProperty = 13,
    /// Requirement marker comment that does not match its grammar
    MalformedMarker = 14,
    /// Write through a read-only rule binding
    AccessViolation = 15,
    /// Invalid render-sync specification
    RenderSync = 16,
    /// Construct that is structurally valid but not schedulable
    Structure = 17,
    /// Bug in the compiler
    Internal = 18,
}

/// Human-readable names for error kinds.
///
/// Index matches ErrorKind discriminant.
const ERROR_KIND_NAMES: &[&str] = &[
    "syntax error",            // 0: Syntax
    "malformed directive",     // 1: MalformedDirective
    "unknown section",         // 2: UnknownSection
    "undefined entity",        // 3: UndefinedEntity
    "duplicate name",          // 4: DuplicateName
    "unknown type",            // 5: UnknownType
    "invalid capacity",        // 6: InvalidCapacity
    "variable outside entity", // 7: VariableOutsideEntity
    "missing world",           // 8: MissingWorld
    "unknown mode",            // 9: UnknownMode
    "invalid value",           // 10: InvalidValue
    "reserved name",           // 11: ReservedName
    "missing module",          // 12: MissingModule
    "undefined property",      // 13: UndefinedProperty
    "malformed marker",        // 14: MalformedMarker
    "access violation",        // 15: AccessViolation
    "render sync",             // 16: RenderSync
    "structure",               // 17: Structure
    "internal compiler error", // 18: Internal
];

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    /// Informational note (not an error)
    Note,
    /// Warning (input is accepted with a best-effort default)
    Warning,
    /// Error (compilation cannot proceed)
    Error,
}

impl CompileError {
    /// Creates a new error diagnostic.
    pub fn new(kind: ErrorKind, span: Span, message: String) -> Self {
        Self::with_severity(kind, Severity::Error, span, message)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(kind: ErrorKind, span: Span, message: String) -> Self {
        Self::with_severity(kind, Severity::Warning, span, message)
    }

    fn with_severity(kind: ErrorKind, severity: Severity, span: Span, message: String) -> Self {
        Self {
            kind,
            severity,
            span,
            file: None,
            message,
            notes: Vec::new(),
        }
    }

    /// Attaches the file the diagnostic refers to.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Adds a note or hint.
    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    /// Whether this diagnostic stops compilation.
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl ErrorKind {
    /// Returns a human-readable name for this error kind.
    pub fn name(self) -> &'static str {
        ERROR_KIND_NAMES[self as usize]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.kind.name(), self.message)?;
        match (&self.file, self.span.is_known()) {
            (Some(file), true) => write!(f, " ({}:{})", file.display(), self.span.line)?,
            (Some(file), false) => write!(f, " ({})", file.display())?,
            (None, true) => write!(f, " ({})", self.span)?,
            (None, false) => {}
        }
        for note in &self.notes {
            write!(f, "\n   = help: {}", note)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// Ordered sink for non-fatal diagnostics.
///
/// Owned by the compilation context and threaded through every stage, so a
/// warning raised by the spec parser and one raised by the code generator end
/// up in one list in the order they were found.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    entries: Vec<CompileError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn warn(&mut self, kind: ErrorKind, span: Span, message: String) {
        self.push(CompileError::warning(kind, span, message));
    }

    /// Record an already-built diagnostic.
    pub fn push(&mut self, diagnostic: CompileError) {
        self.entries.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.entries.iter()
    }

    /// Whether any recorded diagnostic has the given kind.
    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.entries.iter().any(|d| d.kind == kind)
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn into_vec(self) -> Vec<CompileError> {
        self.entries
    }
}
