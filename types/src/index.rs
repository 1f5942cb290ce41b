//! Diagnostics grouped by file, in the order they were reported.

use serde::Serialize;

use crate::Diagnostic;

/// File path → ordered diagnostics.
///
/// Both the files and the diagnostics within a file keep insertion order.
/// An index is built from scratch for each toolchain run and published as a
/// whole; it is never merged with the index of a previous run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticsByFile {
    files: Vec<FileDiagnostics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiagnostics {
    file: String,
    diagnostics: Vec<Diagnostic>,
}

impl FileDiagnostics {
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

impl DiagnosticsByFile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic under its own file key.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match self
            .files
            .iter_mut()
            .find(|entry| entry.file == diagnostic.file())
        {
            Some(entry) => entry.diagnostics.push(diagnostic),
            None => self.files.push(FileDiagnostics {
                file: diagnostic.file().to_string(),
                diagnostics: vec![diagnostic],
            }),
        }
    }

    #[must_use]
    pub fn get(&self, file: &str) -> Option<&[Diagnostic]> {
        self.files
            .iter()
            .find(|entry| entry.file == file)
            .map(|entry| entry.diagnostics.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Diagnostic])> {
        self.files
            .iter()
            .map(|entry| (entry.file.as_str(), entry.diagnostics.as_slice()))
    }

    /// Number of files with at least one diagnostic.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Total diagnostic count across all files.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.files.iter().map(|entry| entry.diagnostics.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}
