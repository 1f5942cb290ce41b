//! A single problem reported by the Eiffel toolchain.

use std::fmt;

use serde::Serialize;

/// Name attached to every diagnostic produced from toolchain output.
pub const DIAGNOSTIC_SOURCE: &str = "Eiffel";

/// Severity level for a diagnostic. The compiler protocol only reports errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
}

impl DiagnosticSeverity {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
        }
    }
}

/// Position range of a diagnostic.
///
/// Lines and columns are 1-based. The end column is exclusive, and the range
/// never spans lines: `end_line` always equals `start_line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiagnosticRange {
    start_line: u32,
    start_column: u32,
    end_line: u32,
    end_column: u32,
}

impl DiagnosticRange {
    /// Single-line range `[start_column, end_column)` on `line`.
    ///
    /// An `end_column` at or before `start_column` is widened to one character.
    #[must_use]
    pub fn on_line(line: u32, start_column: u32, end_column: u32) -> Self {
        Self {
            start_line: line,
            start_column,
            end_line: line,
            end_column: end_column.max(start_column.saturating_add(1)),
        }
    }

    #[must_use]
    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    #[must_use]
    pub fn start_column(&self) -> u32 {
        self.start_column
    }

    #[must_use]
    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    /// Exclusive end column.
    #[must_use]
    pub fn end_column(&self) -> u32 {
        self.end_column
    }
}

/// A finalized diagnostic.
///
/// Fields are private; the parser is the only producer and consumers read
/// through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    file: String,
    range: DiagnosticRange,
    message: String,
    severity: DiagnosticSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    source: &'static str,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        file: String,
        range: DiagnosticRange,
        message: String,
        severity: DiagnosticSeverity,
        code: Option<String>,
    ) -> Self {
        Self {
            file,
            range,
            message,
            severity,
            code,
            source: DIAGNOSTIC_SOURCE,
        }
    }

    /// Path as emitted by the toolchain. Relative paths are kept relative.
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[must_use]
    pub fn range(&self) -> DiagnosticRange {
        self.range
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    /// Classification token such as `VEEN` or `GVAFS`; absent for syntax errors.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub fn source(&self) -> &str {
        self.source
    }
}

/// Formats as `file:line:col: severity: [code] message`.
///
/// Continuation lines of a multi-line message are kept as-is.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: ",
            self.file,
            self.range.start_line,
            self.range.start_column,
            self.severity.label()
        )?;
        if let Some(code) = &self.code {
            write!(f, "[{code}] ")?;
        }
        f.write_str(&self.message)
    }
}
