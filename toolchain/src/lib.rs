//! Driver for the Gobo Eiffel toolchain with streaming diagnostics.
//!
//! Tool output is consumed as it arrives: stdout through the diagnostic
//! parser, stderr through the noise filter. Both end up on a display sink;
//! finalized diagnostics are indexed by file and optionally published.

pub mod codec;
pub mod protocol;
pub mod sink;
pub mod source;

mod commands;
mod error;
mod gedoc;
mod installation;
mod noise;
mod parser;
mod runner;

pub use commands::{
    CompileJob, LintJob, RunJob, Toolchain, display_command_line, is_class_file,
};
pub use error::{RunError, StreamKind, ToolchainError};
pub use gedoc::Gedoc;
pub use installation::{GOBO_ENV, GoboInstallation, Tool};
pub use noise::{NoiseVerdict, filter_line};
pub use parser::{DiagnosticParser, ParseStep, ParserState};
pub use runner::{
    RunContext, RunOutcome, RunRequest, StopHandle, StopSignal, ZIG_ENV_OVERRIDES, stop_channel,
};
pub use sink::{DiagnosticsSink, DisplaySink, MemoryDiagnostics, MemoryDisplay, WriterDisplay};
pub use source::{FileSourcePeek, SourcePeek};
