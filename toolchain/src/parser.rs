//! Streaming diagnostic parser.
//!
//! Consumes stdout lines of `gec`/`gelint` one at a time and turns diagnostic
//! blocks into [`Diagnostic`]s. Only one diagnostic is ever in progress; a new
//! header replaces it and a terminator closes it.

use gobo_types::{Diagnostic, DiagnosticRange, DiagnosticSeverity, DiagnosticsByFile};

use crate::protocol::{self, FileAssoc, Line};
use crate::source::{FileSourcePeek, SourcePeek};

/// Fields of the diagnostic currently being accumulated.
///
/// "Pending" is encoded by `message` being set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserState {
    pub message: Option<String>,
    pub line: u32,
    pub column: u32,
    pub code: Option<String>,
    pub file: Option<String>,
}

impl Default for ParserState {
    fn default() -> Self {
        Self {
            message: None,
            line: 1,
            column: 1,
            code: None,
            file: None,
        }
    }
}

impl ParserState {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.message.is_some()
    }
}

/// Effect of feeding one line to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStep {
    /// The line did not touch the parser state.
    Inert,
    /// A diagnostic was started or extended.
    Accumulating,
    /// A diagnostic was finalized and added to the index.
    Emitted,
    /// A terminator closed a diagnostic that had no file; nothing was added.
    Discarded,
}

/// Line-driven state machine producing a [`DiagnosticsByFile`] index.
#[derive(Debug)]
pub struct DiagnosticParser<P = FileSourcePeek> {
    state: ParserState,
    diagnostics: DiagnosticsByFile,
    peek: P,
}

impl DiagnosticParser {
    #[must_use]
    pub fn new() -> Self {
        Self::with_source_peek(FileSourcePeek)
    }
}

impl Default for DiagnosticParser {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: SourcePeek> DiagnosticParser<P> {
    #[must_use]
    pub fn with_source_peek(peek: P) -> Self {
        Self {
            state: ParserState::default(),
            diagnostics: DiagnosticsByFile::new(),
            peek,
        }
    }

    /// Feed one line (without its newline).
    pub fn push_line(&mut self, line: &str) -> ParseStep {
        match protocol::classify(line, self.state.is_pending()) {
            Line::Header(header) => {
                if let protocol::Header::Validity {
                    code, line, column, ..
                } = &header
                {
                    self.state.line = *line;
                    self.state.column = *column;
                    self.state.code = Some((*code).to_string());
                }
                self.state.message = Some(header.message());
                ParseStep::Accumulating
            }
            Line::Terminator => self.terminate(),
            Line::FileAssoc(assoc) => {
                if let FileAssoc::Location { line, column, .. } = assoc {
                    self.state.line = line;
                    self.state.column = column;
                }
                self.state.file = Some(assoc.path().to_string());
                ParseStep::Accumulating
            }
            Line::Continuation(text) => {
                if let Some(message) = self.state.message.as_mut() {
                    message.push('\n');
                    message.push_str(text);
                }
                ParseStep::Accumulating
            }
            Line::Inert => ParseStep::Inert,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ParserState {
        &self.state
    }

    /// Diagnostics finalized so far, in terminator order.
    #[must_use]
    pub fn diagnostics(&self) -> &DiagnosticsByFile {
        &self.diagnostics
    }

    /// Consume the parser, dropping any diagnostic still in progress.
    #[must_use]
    pub fn into_diagnostics(self) -> DiagnosticsByFile {
        if self.state.is_pending() {
            tracing::debug!("dropping unterminated diagnostic");
        }
        self.diagnostics
    }

    fn terminate(&mut self) -> ParseStep {
        let state = std::mem::take(&mut self.state);
        let (Some(message), Some(file)) = (state.message, state.file) else {
            tracing::trace!("diagnostic closed without a file, discarding");
            return ParseStep::Discarded;
        };

        let end_column = self.end_column(&file, state.line, state.column);
        let diagnostic = Diagnostic::new(
            file,
            DiagnosticRange::on_line(state.line, state.column, end_column),
            message,
            DiagnosticSeverity::Error,
            state.code,
        );
        tracing::debug!(
            file = diagnostic.file(),
            line = state.line,
            column = state.column,
            "diagnostic parsed"
        );
        self.diagnostics.push(diagnostic);
        ParseStep::Emitted
    }

    /// Exclusive end column: the identifier or number starting at `column`,
    /// else a single character.
    fn end_column(&self, file: &str, line: u32, column: u32) -> u32 {
        let fallback = column.saturating_add(1);
        let Some(text) = self.peek.line(file, line) else {
            return fallback;
        };
        let skip = usize::try_from(column.saturating_sub(1)).unwrap_or(usize::MAX);
        let run = text
            .chars()
            .skip(skip)
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .count();
        match u32::try_from(run) {
            Ok(0) | Err(_) => fallback,
            Ok(run) => column.saturating_add(run),
        }
    }
}
