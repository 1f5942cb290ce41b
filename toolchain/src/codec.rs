//! Line framing for subprocess output.
//!
//! Toolchain output arrives in chunks of arbitrary size, split anywhere
//! (including inside a multi-byte UTF-8 sequence). [`LineReassembler`] buffers
//! the bytes, strips `\r`, and hands back complete `\n`-terminated lines.
//! Decoding happens per complete line, so a character is never cut in half.

use std::borrow::Cow;

/// Maximum number of bytes buffered without seeing a newline (64 KiB).
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// What to do with a buffer that outgrows [`MAX_LINE_BYTES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Drop the partial line. Used for stdout, which feeds the structured
    /// parser: a truncated record is worthless there.
    Discard,
    /// Emit the buffer verbatim as one oversized line. Used for stderr, which
    /// is only displayed.
    Flush,
}

/// Reassembles complete lines from arbitrarily split chunks.
#[derive(Debug)]
pub struct LineReassembler {
    buffer: Vec<u8>,
    /// Start of the first unread line in `buffer`.
    start: usize,
    /// `buffer[start..scanned]` holds no newline.
    scanned: usize,
    policy: OverflowPolicy,
    limit: usize,
}

impl LineReassembler {
    #[must_use]
    pub fn new(policy: OverflowPolicy) -> Self {
        Self::with_limit(policy, MAX_LINE_BYTES)
    }

    #[must_use]
    pub fn with_limit(policy: OverflowPolicy, limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            start: 0,
            scanned: 0,
            policy,
            limit,
        }
    }

    /// Feed a chunk and iterate over the lines it completes.
    ///
    /// Lines are produced lazily. Lines left unread when the iterator is
    /// dropped stay buffered and come out of the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Lines<'_> {
        self.buffer
            .extend(chunk.iter().copied().filter(|&byte| byte != b'\r'));
        Lines {
            reassembler: self,
            overflow_checked: false,
        }
    }

    /// Convenience wrapper over [`push`](Self::push) for text input.
    pub fn push_str(&mut self, chunk: &str) -> Lines<'_> {
        self.push(chunk.as_bytes())
    }

    /// End of input: the unterminated remainder, if any, is the last line.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending_len() == 0 {
            return None;
        }
        let rest = self.take_buffer();
        Some(decode(&rest).into_owned())
    }

    /// Bytes currently buffered without a terminating newline.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len() - self.start
    }

    /// Next complete line. Each byte is scanned once; consumed lines are
    /// dropped from the buffer in one go when no complete line is left.
    fn next_line(&mut self) -> Option<String> {
        let from = self.scanned.max(self.start);
        let Some(offset) = self.buffer[from..].iter().position(|&byte| byte == b'\n') else {
            self.buffer.drain(..self.start);
            self.start = 0;
            self.scanned = self.buffer.len();
            return None;
        };
        let end = from + offset;
        let line = decode(&self.buffer[self.start..end]).into_owned();
        self.start = end + 1;
        self.scanned = self.start;
        Some(line)
    }

    /// Unread bytes, leaving the buffer empty.
    fn take_buffer(&mut self) -> Vec<u8> {
        let mut rest = std::mem::take(&mut self.buffer);
        rest.drain(..self.start);
        self.start = 0;
        self.scanned = 0;
        rest
    }

    fn check_overflow(&mut self) -> Option<String> {
        if self.pending_len() <= self.limit {
            return None;
        }
        let overflow = self.take_buffer();
        match self.policy {
            OverflowPolicy::Discard => {
                tracing::debug!(
                    bytes = overflow.len(),
                    "dropping unterminated line over buffer limit"
                );
                None
            }
            OverflowPolicy::Flush => {
                tracing::debug!(
                    bytes = overflow.len(),
                    "flushing unterminated line over buffer limit"
                );
                Some(decode(&overflow).into_owned())
            }
        }
    }
}

/// Iterator over the lines completed by one [`LineReassembler::push`].
#[derive(Debug)]
pub struct Lines<'a> {
    reassembler: &'a mut LineReassembler,
    overflow_checked: bool,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if let Some(line) = self.reassembler.next_line() {
            return Some(line);
        }
        if self.overflow_checked {
            return None;
        }
        self.overflow_checked = true;
        self.reassembler.check_overflow()
    }
}

fn decode(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}
