//! Streaming runs of real child processes.

#![cfg(unix)]

use std::time::Duration;

use gobo_toolchain::{
    MemoryDiagnostics, MemoryDisplay, RunContext, RunError, RunRequest, stop_channel,
};

use crate::common::{GEC_TRANSCRIPT, memory_context};

fn sh(script: &str) -> RunRequest {
    RunRequest::new("/bin/sh").arg("-c").arg(script)
}

#[tokio::test]
async fn stdout_is_displayed_and_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let transcript = dir.path().join("gec.out");
    std::fs::write(&transcript, GEC_TRANSCRIPT).unwrap();

    let mut ctx = memory_context();
    let request = sh(&format!("cat '{}'", transcript.display())).banner("Compiling app.e...");
    let outcome = ctx.run(&request, None).await.unwrap();

    assert!(outcome.success());
    assert_eq!(outcome.diagnostics().total_count(), 3);

    let (display, publisher) = ctx.into_parts();
    assert_eq!(display.lines()[0], "Compiling app.e...");
    assert_eq!(display.lines()[1], "Degree 6: 0/0/0 0:0:0.012");
    assert_eq!(display.lines().len(), 1 + GEC_TRANSCRIPT.lines().count());
    assert_eq!(display.clear_count(), 1);
    assert_eq!(display.show_count(), 1);
    // Publishing is off unless enabled.
    assert_eq!(publisher.set_count(), 0);
}

#[tokio::test]
async fn diagnostics_published_as_they_complete() {
    let mut ctx = memory_context().publish_diagnostics(true);
    let script = "printf '[VEEN] class A (1,1): unknown.\\n\\tclass A: a.e\\n----\\n'; \
                  printf '[VUAR] class B (2,3): bad call.\\n\\tclass B: b.e\\n----\\n'";
    let outcome = ctx.run(&sh(script), None).await.unwrap();

    assert_eq!(outcome.diagnostics().file_count(), 2);
    let publisher = ctx.publisher();
    assert_eq!(publisher.total_count(), 2);
    assert_eq!(publisher.get("b.e").unwrap()[0].code(), Some("VUAR"));
}

#[tokio::test]
async fn unterminated_last_line_is_processed() {
    let mut ctx = memory_context();
    let script = "printf 'Syntax error:\\nline 3 column 7 in x.e\\n----'";
    let outcome = ctx.run(&sh(script), None).await.unwrap();

    assert_eq!(outcome.diagnostics().total_count(), 1);
    assert_eq!(ctx.display().lines().last().unwrap(), "----");
}

#[tokio::test]
async fn stderr_noise_is_filtered() {
    let mut ctx = memory_context();
    let script = "echo 'output path: /tmp/x.o' >&2; \
                  echo 'zig clang -c -O2 /work/app/main.c -o main.o' >&2; \
                  echo 'warning: something real' >&2; \
                  echo 'cc1 -Xclang -target-feature +sse' >&2";
    ctx.run(&sh(script), None).await.unwrap();

    assert_eq!(
        ctx.display().lines(),
        ["main.c", "warning: something real"]
    );
}

#[tokio::test]
async fn zig_overrides_win_over_caller_environment() {
    let mut ctx = memory_context();
    let request = sh("echo \"$ZIG_PROGRESS $ZIG_VERBOSE_CC $APP_MODE\"")
        .env("ZIG_PROGRESS", "1")
        .env("APP_MODE", "debug");
    ctx.run(&request, None).await.unwrap();

    assert_eq!(ctx.display().lines(), ["3 true debug"]);
}

#[tokio::test]
async fn exit_code_is_reported() {
    let mut ctx = memory_context();
    let outcome = ctx.run(&sh("echo failing; exit 3"), None).await.unwrap();

    assert_eq!(outcome.exit_code(), Some(3));
    assert!(!outcome.cancelled());
    assert!(!outcome.success());
}

#[tokio::test]
async fn runs_in_requested_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "here").unwrap();

    let mut ctx = memory_context();
    let request = sh("cat marker.txt").current_dir(dir.path());
    ctx.run(&request, None).await.unwrap();

    assert_eq!(ctx.display().lines(), ["here"]);
}

#[tokio::test]
async fn stop_kills_the_child() {
    let mut ctx = memory_context();
    let (handle, signal) = stop_channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.stop();
    });

    // A diagnostic is pending (header and file, no terminator) when the stop
    // arrives.
    let request = sh("printf '[VEEN] class A (1,1): x\\n\\tclass A: a.e\\n'; exec sleep 30");
    let outcome = tokio::time::timeout(Duration::from_secs(10), ctx.run(&request, Some(signal)))
        .await
        .expect("stop should end the run")
        .unwrap();

    assert!(outcome.cancelled());
    assert!(!outcome.success());
    assert_eq!(outcome.exit_code(), None);
    assert!(outcome.diagnostics().is_empty());
    assert_eq!(ctx.display().lines().len(), 2);
}

#[tokio::test]
async fn stop_applies_after_child_closes_its_output() {
    let mut ctx = memory_context();
    let (handle, signal) = stop_channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.stop();
    });

    let request = sh("echo started; exec >/dev/null 2>&1; exec sleep 30");
    let outcome = tokio::time::timeout(Duration::from_secs(10), ctx.run(&request, Some(signal)))
        .await
        .expect("stop should end the run")
        .unwrap();

    assert!(outcome.cancelled());
    assert_eq!(outcome.exit_code(), None);
    assert_eq!(ctx.display().lines(), ["started"]);
}

#[tokio::test]
async fn dropped_stop_handle_does_not_cancel() {
    let mut ctx = memory_context();
    let (handle, signal) = stop_channel();
    drop(handle);

    let outcome = ctx
        .run(&sh("sleep 0.1; echo done"), Some(signal))
        .await
        .unwrap();

    assert!(!outcome.cancelled());
    assert_eq!(ctx.display().lines(), ["done"]);
}

#[tokio::test]
async fn spawn_failure_is_an_error() {
    let mut ctx = memory_context();
    let err = ctx
        .run(&RunRequest::new("/nonexistent/gec"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Spawn { .. }));
}

#[tokio::test]
async fn each_run_starts_from_clean_sinks() {
    let mut display = MemoryDisplay::new();
    let mut publisher = MemoryDiagnostics::new();
    {
        let mut ctx = RunContext::new(&mut display, &mut publisher).publish_diagnostics(true);
        let first = "printf '[VEEN] class A (1,1): x\\n\\tclass A: a.e\\n----\\n'";
        ctx.run(&sh(first), None).await.unwrap();
        ctx.run(&sh("echo second"), None).await.unwrap();
    }

    assert_eq!(display.lines(), ["second"]);
    assert_eq!(display.clear_count(), 2);
    assert_eq!(publisher.total_count(), 0);
}
