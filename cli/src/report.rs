//! Published diagnostics on standard error.

use std::collections::HashMap;
use std::io::Write;

use clap::ValueEnum;
use gobo_toolchain::DiagnosticsSink;
use gobo_types::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DiagnosticFormat {
    /// `file:line:col: error: [code] message`
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// [`DiagnosticsSink`] writing to a stream.
///
/// A stream cannot take lines back, and every publish re-sends the whole
/// index, so `set` only writes the diagnostics of a file not written yet.
pub struct StreamDiagnostics<W: Write> {
    writer: W,
    format: DiagnosticFormat,
    written: HashMap<String, usize>,
}

impl<W: Write> StreamDiagnostics<W> {
    pub fn new(writer: W, format: DiagnosticFormat) -> Self {
        Self {
            writer,
            format,
            written: HashMap::new(),
        }
    }

    /// Diagnostics written so far.
    pub fn written(&self) -> usize {
        self.written.values().sum()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, diagnostic: &Diagnostic) {
        let result = match self.format {
            DiagnosticFormat::Text => writeln!(self.writer, "{diagnostic}"),
            DiagnosticFormat::Json => match serde_json::to_string(diagnostic) {
                Ok(json) => writeln!(self.writer, "{json}"),
                Err(e) => {
                    tracing::warn!("cannot serialize diagnostic: {e}");
                    Ok(())
                }
            },
        };
        if let Err(e) = result {
            tracing::debug!("diagnostic write failed: {e}");
        }
    }
}

impl<W: Write> DiagnosticsSink for StreamDiagnostics<W> {
    fn set(&mut self, file: &str, diagnostics: &[Diagnostic]) {
        let already = self.written.get(file).copied().unwrap_or(0);
        for diagnostic in diagnostics.iter().skip(already) {
            self.write(diagnostic);
        }
        self.written
            .insert(file.to_string(), already.max(diagnostics.len()));
        if let Err(e) = self.writer.flush() {
            tracing::debug!("diagnostic flush failed: {e}");
        }
    }

    fn clear(&mut self) {}
}
