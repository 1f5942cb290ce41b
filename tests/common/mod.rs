//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use gobo_toolchain::{MemoryDiagnostics, MemoryDisplay, RunContext};

/// A compiler session as `gec` prints it: progress, a validity error, a
/// syntax error with a multi-line message, and the closing summary.
pub const GEC_TRANSCRIPT: &str = "\
Degree 6: 0/0/0 0:0:0.012
Degree 5: 0/0/0 0:0:0.104
[VEEN] class APPLICATION (5,11): unknown identifier `bar'.
\tclass APPLICATION: /work/app/application.e
----
Syntax error:
unexpected end of file
in feature `make'
line 12 column 4 in /work/app/parser.e
----
[VDRD-2] class CHILD (PARENT,7,2): redeclaration not allowed.
\tclass CHILD: /work/app/child.e
----
Degree 4: 1/1/2 0:0:0.201
";

pub type MemoryContext = RunContext<MemoryDisplay, MemoryDiagnostics>;

pub fn memory_context() -> MemoryContext {
    RunContext::new(MemoryDisplay::new(), MemoryDiagnostics::new())
}

/// Write an executable `/bin/sh` script.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A fake installation: `<root>/bin/<tool>` scripts.
#[cfg(unix)]
pub fn fake_installation(root: &Path, tools: &[(&str, &str)]) {
    let bin = root.join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    for (name, body) in tools {
        write_script(&bin, name, body);
    }
}
