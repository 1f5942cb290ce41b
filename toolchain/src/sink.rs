//! Output surfaces of a toolchain run.
//!
//! A run writes to two sinks: the display (every stdout line and the
//! filtered stderr lines, in arrival order per stream) and the diagnostics
//! publisher (the diagnostics index, replaced wholesale on each publish).
//! Both are cleared when a run starts.

use std::io::Write;

use gobo_types::{Diagnostic, DiagnosticsByFile};

/// Append-only text surface.
pub trait DisplaySink {
    fn append_line(&mut self, text: &str);
    fn clear(&mut self);
    /// Bring the display to the user's attention.
    fn show(&mut self);
}

/// Keyed diagnostics surface.
pub trait DiagnosticsSink {
    /// Replace the diagnostics of `file`.
    fn set(&mut self, file: &str, diagnostics: &[Diagnostic]);
    fn clear(&mut self);

    /// Replace everything with `index`: clear, then set file by file.
    fn publish(&mut self, index: &DiagnosticsByFile) {
        self.clear();
        for (file, diagnostics) in index.iter() {
            self.set(file, diagnostics);
        }
    }
}

impl<T: DisplaySink + ?Sized> DisplaySink for &mut T {
    fn append_line(&mut self, text: &str) {
        (**self).append_line(text);
    }

    fn clear(&mut self) {
        (**self).clear();
    }

    fn show(&mut self) {
        (**self).show();
    }
}

impl<T: DiagnosticsSink + ?Sized> DiagnosticsSink for &mut T {
    fn set(&mut self, file: &str, diagnostics: &[Diagnostic]) {
        (**self).set(file, diagnostics);
    }

    fn clear(&mut self) {
        (**self).clear();
    }
}

/// Display kept in memory. Used by tests and by callers that render later.
#[derive(Debug, Default)]
pub struct MemoryDisplay {
    lines: Vec<String>,
    clear_count: usize,
    show_count: usize,
}

impl MemoryDisplay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Times the display was cleared.
    #[must_use]
    pub fn clear_count(&self) -> usize {
        self.clear_count
    }

    /// Times the display was shown.
    #[must_use]
    pub fn show_count(&self) -> usize {
        self.show_count
    }
}

impl DisplaySink for MemoryDisplay {
    fn append_line(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.clear_count += 1;
    }

    fn show(&mut self) {
        self.show_count += 1;
    }
}

/// Display that streams lines to a writer (typically stdout).
///
/// A stream cannot be cleared; `clear` and `show` only flush.
#[derive(Debug)]
pub struct WriterDisplay<W: Write> {
    writer: W,
}

impl<W: Write> WriterDisplay<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::debug!("display flush failed: {e}");
        }
    }
}

impl<W: Write> DisplaySink for WriterDisplay<W> {
    fn append_line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.writer, "{text}") {
            tracing::debug!("display write failed: {e}");
        }
    }

    fn clear(&mut self) {
        self.flush();
    }

    fn show(&mut self) {
        self.flush();
    }
}

/// Diagnostics kept in memory, keyed by file in first-set order.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    files: Vec<(String, Vec<Diagnostic>)>,
    set_count: usize,
}

impl MemoryDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, file: &str) -> Option<&[Diagnostic]> {
        self.files
            .iter()
            .find(|(name, _)| name == file)
            .map(|(_, diagnostics)| diagnostics.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Diagnostic])> {
        self.files
            .iter()
            .map(|(file, diagnostics)| (file.as_str(), diagnostics.as_slice()))
    }

    #[must_use]
    pub fn total_count(&self) -> usize {
        self.files.iter().map(|(_, diagnostics)| diagnostics.len()).sum()
    }

    /// Number of `set` calls since creation.
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.set_count
    }
}

impl DiagnosticsSink for MemoryDiagnostics {
    fn set(&mut self, file: &str, diagnostics: &[Diagnostic]) {
        self.set_count += 1;
        match self.files.iter_mut().find(|(name, _)| name == file) {
            Some((_, existing)) => *existing = diagnostics.to_vec(),
            None => self.files.push((file.to_string(), diagnostics.to_vec())),
        }
    }

    fn clear(&mut self) {
        self.files.clear();
    }
}
