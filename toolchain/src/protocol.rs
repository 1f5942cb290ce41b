//! Line shapes of the Gobo Eiffel compiler and linter output.
//!
//! A diagnostic block looks like this (validity error):
//!
//! ```text
//! [VEEN] class FOO (12,5): unknown identifier `bar'.
//!     some explanation
//! 	class FOO: /path/to/foo.e
//! ----
//! ```
//!
//! or this (syntax error):
//!
//! ```text
//! Syntax error:
//! line 7 column 3 in /path/to/foo.e
//! ----
//! ```
//!
//! [`classify`] maps one line to a [`Line`] variant. Matchers are tried in a
//! fixed priority order: headers first, then (only while a diagnostic is
//! pending) terminator, file associations, and continuation text.

use std::sync::OnceLock;

use regex::Regex;

/// Sentinel closing a diagnostic block.
pub const TERMINATOR: &str = "----";

/// Exact text of a syntax error header.
pub const SYNTAX_ERROR_HEADER: &str = "Syntax error:";

/// A classified line of toolchain output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    /// Starts a new diagnostic, replacing any pending one.
    Header(Header<'a>),
    /// Closes the pending diagnostic.
    Terminator,
    /// Associates the pending diagnostic with a file.
    FileAssoc(FileAssoc<'a>),
    /// Extra message text for the pending diagnostic.
    Continuation(&'a str),
    /// No diagnostic effect (nothing pending).
    Inert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header<'a> {
    /// `[<code>] class <Class> (<Other>,<line>,<col>): <text>`
    Validity {
        code: &'a str,
        class_name: &'a str,
        other_class: Option<&'a str>,
        line: u32,
        column: u32,
        /// Trailing text including the leading `": "`.
        text: &'a str,
    },
    /// `Syntax error:`
    Syntax,
}

impl Header<'_> {
    /// Message a diagnostic started by this header begins with.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Validity {
                class_name,
                other_class,
                text,
                ..
            } => {
                let mut message = format!("class {class_name}");
                if let Some(other) = other_class {
                    message.push_str(" (");
                    message.push_str(other);
                    message.push(')');
                }
                message.push_str(text);
                message
            }
            Self::Syntax => SYNTAX_ERROR_HEADER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAssoc<'a> {
    /// `\tclass <Identifier>: <path>`
    Class { path: &'a str },
    /// `line <N> column <M> in <path>`
    Location { line: u32, column: u32, path: &'a str },
}

impl<'a> FileAssoc<'a> {
    #[must_use]
    pub fn path(&self) -> &'a str {
        match self {
            Self::Class { path } | Self::Location { path, .. } => path,
        }
    }
}

struct LinePatterns {
    validity_header: Regex,
    class_file: Regex,
    location: Regex,
}

impl LinePatterns {
    fn new() -> Self {
        Self {
            validity_header: Regex::new(
                r"^\[([^\]]+)\] class ([a-zA-Z][a-zA-Z0-9_]*) \((?:([a-zA-Z][a-zA-Z0-9_]*),)?(\d+),(\d+)\)(: .*)$",
            )
            .expect("valid validity header regex"),
            class_file: Regex::new(r"^\tclass [a-zA-Z0-9_]+: (.*)$")
                .expect("valid class file regex"),
            location: Regex::new(r"^line (\d+) column (\d+) in (.*)$")
                .expect("valid location regex"),
        }
    }

    fn get() -> &'static Self {
        static PATTERNS: OnceLock<LinePatterns> = OnceLock::new();
        PATTERNS.get_or_init(Self::new)
    }
}

/// Classify one line (newline already stripped).
///
/// `pending` tells whether a diagnostic is currently being accumulated;
/// terminator, file association and continuation only apply then.
#[must_use]
pub fn classify(line: &str, pending: bool) -> Line<'_> {
    if let Some(header) = parse_header(line) {
        return Line::Header(header);
    }
    if !pending {
        return Line::Inert;
    }
    if line == TERMINATOR {
        return Line::Terminator;
    }
    if let Some(assoc) = parse_file_assoc(line) {
        return Line::FileAssoc(assoc);
    }
    Line::Continuation(line)
}

fn parse_header(line: &str) -> Option<Header<'_>> {
    if line == SYNTAX_ERROR_HEADER {
        return Some(Header::Syntax);
    }
    let caps = LinePatterns::get().validity_header.captures(line)?;
    Some(Header::Validity {
        code: caps.get(1)?.as_str(),
        class_name: caps.get(2)?.as_str(),
        other_class: caps.get(3).map(|m| m.as_str()),
        line: caps.get(4)?.as_str().parse().ok()?,
        column: caps.get(5)?.as_str().parse().ok()?,
        text: caps.get(6)?.as_str(),
    })
}

fn parse_file_assoc(line: &str) -> Option<FileAssoc<'_>> {
    let patterns = LinePatterns::get();
    if let Some(caps) = patterns.class_file.captures(line) {
        return Some(FileAssoc::Class {
            path: caps.get(1)?.as_str(),
        });
    }
    let caps = patterns.location.captures(line)?;
    Some(FileAssoc::Location {
        line: caps.get(1)?.as_str().parse().ok()?,
        column: caps.get(2)?.as_str().parse().ok()?,
        path: caps.get(3)?.as_str(),
    })
}
