//! Core domain types for the Gobo Eiffel toolchain driver.
//!
//! This crate contains pure domain types with no IO and no async.
//! Everything here can be used from any layer of the application.

mod diagnostic;
mod index;

pub use diagnostic::{DIAGNOSTIC_SOURCE, Diagnostic, DiagnosticRange, DiagnosticSeverity};
pub use index::{DiagnosticsByFile, FileDiagnostics};
