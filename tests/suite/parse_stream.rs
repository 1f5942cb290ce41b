//! End-to-end parsing of chunked compiler output, without a process.

use gobo_toolchain::codec::{LineReassembler, OverflowPolicy};
use gobo_toolchain::{DiagnosticParser, SourcePeek};
use gobo_types::DiagnosticsByFile;

use crate::common::GEC_TRANSCRIPT;

/// Sources of the transcript files, enough to infer end columns.
struct TranscriptSources;

impl SourcePeek for TranscriptSources {
    fn line(&self, path: &str, line: u32) -> Option<String> {
        match (path, line) {
            ("/work/app/application.e", 5) => Some("\t\t\tfoo := bar + 1".to_string()),
            ("/work/app/child.e", 7) => Some("\tmake".to_string()),
            _ => None,
        }
    }
}

fn parse_in_chunks(input: &[u8], chunk_size: usize) -> DiagnosticsByFile {
    let mut reassembler = LineReassembler::new(OverflowPolicy::Discard);
    let mut parser = DiagnosticParser::with_source_peek(TranscriptSources);
    for chunk in input.chunks(chunk_size) {
        for line in reassembler.push(chunk) {
            parser.push_line(&line);
        }
    }
    if let Some(line) = reassembler.finish() {
        parser.push_line(&line);
    }
    parser.into_diagnostics()
}

#[test]
fn test_transcript_diagnostics() {
    let index = parse_in_chunks(GEC_TRANSCRIPT.as_bytes(), GEC_TRANSCRIPT.len());
    assert_eq!(index.total_count(), 3);
    let files: Vec<&str> = index.iter().map(|(file, _)| file).collect();
    assert_eq!(
        files,
        vec![
            "/work/app/application.e",
            "/work/app/parser.e",
            "/work/app/child.e"
        ]
    );

    let veen = &index.get("/work/app/application.e").unwrap()[0];
    assert_eq!(veen.code(), Some("VEEN"));
    assert_eq!(veen.message(), "class APPLICATION: unknown identifier `bar'.");
    // Column 11 of "\t\t\tfoo := bar + 1" is `bar`.
    assert_eq!(veen.range().start_column(), 11);
    assert_eq!(veen.range().end_column(), 14);

    let syntax = &index.get("/work/app/parser.e").unwrap()[0];
    assert_eq!(syntax.code(), None);
    assert_eq!(
        syntax.message(),
        "Syntax error:\nunexpected end of file\nin feature `make'"
    );
    assert_eq!(
        (syntax.range().start_line(), syntax.range().start_column()),
        (12, 4)
    );
    // Source not available: one-character range.
    assert_eq!(syntax.range().end_column(), 5);

    let vdrd = &index.get("/work/app/child.e").unwrap()[0];
    assert_eq!(vdrd.message(), "class CHILD (PARENT): redeclaration not allowed.");
    assert_eq!(vdrd.range().end_column(), 6);
}

#[test]
fn test_chunking_does_not_change_diagnostics() {
    let whole = parse_in_chunks(GEC_TRANSCRIPT.as_bytes(), GEC_TRANSCRIPT.len());
    for chunk_size in [1, 2, 3, 5, 8, 13, 64, 1000] {
        assert_eq!(
            parse_in_chunks(GEC_TRANSCRIPT.as_bytes(), chunk_size),
            whole,
            "chunk size {chunk_size}"
        );
    }
}

#[test]
fn test_crlf_output_parses_like_lf() {
    let crlf = GEC_TRANSCRIPT.replace('\n', "\r\n");
    assert_eq!(
        parse_in_chunks(crlf.as_bytes(), 7),
        parse_in_chunks(GEC_TRANSCRIPT.as_bytes(), 7)
    );
}

#[test]
fn test_oversized_line_does_not_disturb_parsing() {
    let mut input = vec![b'x'; 70 * 1024];
    input.extend_from_slice(b"\n");
    input.extend_from_slice(GEC_TRANSCRIPT.as_bytes());
    let index = parse_in_chunks(&input, 4096);
    assert_eq!(index.total_count(), 3);
}

#[test]
fn test_unterminated_diagnostic_at_end_is_dropped() {
    let input = "[VEEN] class A (1,1): oops\n\tclass A: a.e\n";
    assert!(parse_in_chunks(input.as_bytes(), 4).is_empty());
}
