//! On-demand access to single lines of source files.
//!
//! Used only to refine the end column of a diagnostic, once per diagnostic.
//! Files can be large, so lines are found by streaming the file in small
//! chunks and stopping as soon as the requested line is complete.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Read size used while scanning for a line.
const CHUNK_BYTES: usize = 1024;

/// Lookup of a single 1-based source line.
pub trait SourcePeek {
    /// Line `line` of `path` without its terminator, or `None` if the file
    /// cannot be read or is too short.
    fn line(&self, path: &str, line: u32) -> Option<String>;
}

/// [`SourcePeek`] over the local file system.
///
/// Paths are opened exactly as given; relative paths resolve against the
/// current directory of this process.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSourcePeek;

impl SourcePeek for FileSourcePeek {
    fn line(&self, path: &str, line: u32) -> Option<String> {
        read_line(Path::new(path), line)
    }
}

/// Read line `n` (1-based) of the file at `path`.
///
/// A trailing `\r` is stripped. The last line is returned even when the file
/// does not end with a newline; an empty trailing "line" after the final
/// newline is not a line.
pub fn read_line(path: &Path, n: u32) -> Option<String> {
    if n == 0 {
        return None;
    }
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!(path = %path.display(), "cannot open source file: {e}");
            return None;
        }
    };

    let mut chunk = [0u8; CHUNK_BYTES];
    let mut current: Vec<u8> = Vec::new();
    let mut seen_newlines: u32 = 0;

    loop {
        let read = match file.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(path = %path.display(), "cannot read source file: {e}");
                return None;
            }
        };
        for &byte in &chunk[..read] {
            if byte != b'\n' {
                if seen_newlines + 1 == n {
                    current.push(byte);
                }
                continue;
            }
            seen_newlines += 1;
            if seen_newlines == n {
                return Some(finish_line(&current));
            }
        }
    }

    // Last line without a trailing newline.
    if seen_newlines + 1 == n && !current.is_empty() {
        return Some(finish_line(&current));
    }
    None
}

fn finish_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
