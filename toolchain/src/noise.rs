//! Standard-error filter for the C build step driven by `gec`.
//!
//! With `ZIG_VERBOSE_CC=true` zig echoes every clang invocation, plus a few
//! lines of build bookkeeping. The invocations are reduced to the name of the
//! generated C file so the user still sees progress; the bookkeeping is
//! dropped. Everything else (real warnings and errors) passes through.

use std::sync::OnceLock;

use regex::Regex;

/// Line prefixes of zig bookkeeping output.
const SUPPRESSED_PREFIXES: &[&str] = &["output path: ", "include dir: ", "def file: "];

/// Compiler flag echoes, suppressed wherever they occur in a line.
const SUPPRESSED_FRAGMENTS: &[&str] = &["-Xclang", "-target-feature"];

/// What to do with one stderr line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseVerdict<'a> {
    /// Display the line unchanged.
    Emit(&'a str),
    /// Display this replacement instead (the generated file name).
    Rewrite(&'a str),
    /// Do not display the line.
    Suppress,
}

impl<'a> NoiseVerdict<'a> {
    /// Text to display, if any.
    #[must_use]
    pub fn text(self) -> Option<&'a str> {
        match self {
            Self::Emit(text) | Self::Rewrite(text) => Some(text),
            Self::Suppress => None,
        }
    }
}

fn compiler_invocation() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"zig(?:\.exe)? clang (?:.*[\s/\\])?([^\s/\\]+\.[cS])\b")
            .expect("valid compiler invocation regex")
    })
}

/// Classify one stderr line (newline already stripped).
#[must_use]
pub fn filter_line(line: &str) -> NoiseVerdict<'_> {
    if let Some(name) = compiler_invocation()
        .captures(line)
        .and_then(|caps| caps.get(1))
    {
        return NoiseVerdict::Rewrite(name.as_str());
    }
    if SUPPRESSED_PREFIXES
        .iter()
        .any(|prefix| line.starts_with(prefix))
        || SUPPRESSED_FRAGMENTS
            .iter()
            .any(|fragment| line.contains(fragment))
    {
        return NoiseVerdict::Suppress;
    }
    NoiseVerdict::Emit(line)
}
