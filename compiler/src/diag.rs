// diag.rs — Unified diagnostics model
//
// Provides the shared diagnostic types used by the front end and the
// legalization pass. Diagnostics are data: passes append them to a sink and
// never change control flow because of what the sink does with them.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::location::Location;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0001`, `W0101`).
///
/// Once assigned, a code must never be reassigned to a different meaning:
/// downstream tooling filters on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // Resolution (E00xx)
    pub const E0001: DiagCode = DiagCode("E0001"); // undefined value
    pub const E0002: DiagCode = DiagCode("E0002"); // value redefinition
    pub const E0003: DiagCode = DiagCode("E0003"); // operand/type count mismatch
    pub const E0004: DiagCode = DiagCode("E0004"); // operand type mismatch
    pub const E0005: DiagCode = DiagCode("E0005"); // result count mismatch
    pub const E0006: DiagCode = DiagCode("E0006"); // bad result index
    pub const E0007: DiagCode = DiagCode("E0007"); // duplicate attribute name

    // Option encoding (W01xx)
    pub const W0101: DiagCode = DiagCode("W0101"); // unsupported attribute shape
    pub const W0102: DiagCode = DiagCode("W0102"); // unsupported elements type
    pub const W0103: DiagCode = DiagCode("W0103"); // unsupported array content
    pub const W0104: DiagCode = DiagCode("W0104"); // duplicate option key

    // Op selection (W02xx)
    pub const W0201: DiagCode = DiagCode("W0201"); // composite without specialization
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A compiler diagnostic emitted by any phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub location: Location,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code or hint.
    pub fn new(level: DiagLevel, location: Location, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            location,
            message: message.into(),
            hint: None,
        }
    }

    pub fn warning(location: Location, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, location, message)
    }

    pub fn error(location: Location, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, location, message)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

// ── Sink ─────────────────────────────────────────────────────────────────

/// Append-only destination for diagnostics.
pub trait DiagSink {
    fn emit(&mut self, diag: Diagnostic);
}

impl DiagSink for Vec<Diagnostic> {
    fn emit(&mut self, diag: Diagnostic) {
        self.push(diag);
    }
}

pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| d.level == DiagLevel::Error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn here() -> Location {
        Location::new(1, 1)
    }

    #[test]
    fn display_without_code() {
        let d = Diagnostic::new(DiagLevel::Error, here(), "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code() {
        let d = Diagnostic::warning(here(), "serialization not supported for attribute 'x'")
            .with_code(codes::W0101);
        assert_eq!(
            format!("{d}"),
            "warning[W0101]: serialization not supported for attribute 'x'"
        );
    }

    #[test]
    fn display_with_hint() {
        let d = Diagnostic::warning(here(), "composite has no specialization: foo.bar")
            .with_code(codes::W0201)
            .with_hint("pass --composite foo.bar to accept it");
        assert_eq!(
            format!("{d}"),
            "warning[W0201]: composite has no specialization: foo.bar\n  hint: pass --composite foo.bar to accept it"
        );
    }

    #[test]
    fn vec_sink_appends_in_order() {
        let mut sink: Vec<Diagnostic> = Vec::new();
        sink.emit(Diagnostic::warning(here(), "a"));
        sink.emit(Diagnostic::error(here(), "b"));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[0].message, "a");
        assert!(has_errors(&sink));
    }

    #[test]
    fn warnings_alone_are_not_errors() {
        let diags = vec![Diagnostic::warning(here(), "w")];
        assert!(!has_errors(&diags));
    }
}
