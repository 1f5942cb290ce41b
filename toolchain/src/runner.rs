//! Process orchestration for a single toolchain run.
//!
//! One task owns the run: it multiplexes stdout reads, stderr reads and the
//! stop signal with `tokio::select!`, so the parser and the noise filter never
//! run concurrently. stdout lines are echoed to the display and fed to the
//! diagnostic parser; stderr lines go through the noise filter to the display.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use gobo_types::DiagnosticsByFile;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;

use crate::codec::{LineReassembler, OverflowPolicy};
use crate::error::{RunError, StreamKind};
use crate::noise;
use crate::parser::{DiagnosticParser, ParseStep};
use crate::sink::{DiagnosticsSink, DisplaySink};
use crate::source::{FileSourcePeek, SourcePeek};

/// Read buffer size per output stream.
const READ_BUF_BYTES: usize = 8192;

/// Environment forced on every toolchain child: machine-readable zig progress
/// and echoed C compiler invocations (filtered by [`noise`]).
pub const ZIG_ENV_OVERRIDES: [(&str, &str); 2] =
    [("ZIG_PROGRESS", "3"), ("ZIG_VERBOSE_CC", "true")];

/// What to spawn.
#[derive(Debug, Clone)]
pub struct RunRequest {
    program: PathBuf,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
    banner: Vec<String>,
}

impl RunRequest {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            banner: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Extra environment on top of the inherited one. The zig overrides are
    /// applied last and always win.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Line shown on the display right after it is cleared, before any output.
    pub fn banner(mut self, line: impl Into<String>) -> Self {
        self.banner.push(line.into());
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    #[must_use]
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    #[must_use]
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)));
        cmd.envs(ZIG_ENV_OVERRIDES);
        cmd
    }
}

/// Requests cancellation of a running [`RunContext::run`].
#[derive(Debug)]
pub struct StopHandle {
    tx: oneshot::Sender<()>,
}

impl StopHandle {
    /// Kill the child. Has no effect once the run is over.
    pub fn stop(self) {
        let _ = self.tx.send(());
    }
}

/// Receiving half of a [`StopHandle`]. Dropping the handle without calling
/// `stop` never cancels the run.
#[derive(Debug)]
pub struct StopSignal {
    rx: oneshot::Receiver<()>,
}

#[must_use]
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = oneshot::channel();
    (StopHandle { tx }, StopSignal { rx })
}

/// Stop requests as seen by one run, from spawn until the child is reaped.
struct PendingStop {
    rx: Option<oneshot::Receiver<()>>,
}

impl PendingStop {
    fn new(signal: Option<StopSignal>) -> Self {
        Self {
            rx: signal.map(|signal| signal.rx),
        }
    }

    /// Resolves once a stop is requested. A dropped handle never resolves.
    async fn requested(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            let result = rx.await;
            self.rx = None;
            if result.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}

/// Result of a run that reached process exit.
#[derive(Debug)]
pub struct RunOutcome {
    exit_code: Option<i32>,
    cancelled: bool,
    diagnostics: DiagnosticsByFile,
}

impl RunOutcome {
    /// Exit code of the child; `None` when it was terminated by a signal.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    #[must_use]
    pub fn success(&self) -> bool {
        !self.cancelled && self.exit_code == Some(0)
    }

    /// All diagnostics finalized during the run.
    #[must_use]
    pub fn diagnostics(&self) -> &DiagnosticsByFile {
        &self.diagnostics
    }

    #[must_use]
    pub fn into_diagnostics(self) -> DiagnosticsByFile {
        self.diagnostics
    }
}

/// Per-run consumers: fresh for every child.
struct RunState<S> {
    stdout: LineReassembler,
    stderr: LineReassembler,
    parser: DiagnosticParser<S>,
}

impl<S: SourcePeek> RunState<S> {
    fn new(peek: S) -> Self {
        Self {
            stdout: LineReassembler::new(OverflowPolicy::Discard),
            stderr: LineReassembler::new(OverflowPolicy::Flush),
            parser: DiagnosticParser::with_source_peek(peek),
        }
    }
}

/// Sinks a run writes to, plus the publication gate.
///
/// Sinks may be owned values or `&mut` borrows; a context is used for one run
/// at a time.
#[derive(Debug)]
pub struct RunContext<D, P> {
    display: D,
    publisher: P,
    publish_diagnostics: bool,
}

impl<D: DisplaySink, P: DiagnosticsSink> RunContext<D, P> {
    pub fn new(display: D, publisher: P) -> Self {
        Self {
            display,
            publisher,
            publish_diagnostics: false,
        }
    }

    /// Publish diagnostics while the run is in progress. Off by default.
    pub fn publish_diagnostics(mut self, enabled: bool) -> Self {
        self.publish_diagnostics = enabled;
        self
    }

    #[must_use]
    pub fn publishes_diagnostics(&self) -> bool {
        self.publish_diagnostics
    }

    pub fn display(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn publisher(&mut self) -> &mut P {
        &mut self.publisher
    }

    pub fn into_parts(self) -> (D, P) {
        (self.display, self.publisher)
    }

    /// Clear both sinks, bring the display forward and show the banner.
    pub fn reset(&mut self, banner: &[String]) {
        self.publisher.clear();
        self.display.clear();
        self.display.show();
        for line in banner {
            self.display.append_line(line);
        }
    }

    /// Run `request` to completion, reading source lines from disk.
    pub async fn run(
        &mut self,
        request: &RunRequest,
        stop: Option<StopSignal>,
    ) -> Result<RunOutcome, RunError> {
        self.run_with_source_peek(request, stop, FileSourcePeek)
            .await
    }

    pub async fn run_with_source_peek<S: SourcePeek>(
        &mut self,
        request: &RunRequest,
        stop: Option<StopSignal>,
        peek: S,
    ) -> Result<RunOutcome, RunError> {
        self.reset(&request.banner);

        tracing::debug!(
            program = %request.program.display(),
            args = ?request.args,
            cwd = ?request.cwd,
            "spawning toolchain process"
        );
        let mut child = request
            .command()
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: request.program.clone(),
                source,
            })?;

        let mut state = RunState::new(peek);
        let mut stop = PendingStop::new(stop);
        let mut cancelled = self.pump(&mut child, &mut state, &mut stop).await?;

        // The child may outlive its pipes; a stop still applies until it exits.
        let waited = if cancelled {
            child.wait().await
        } else {
            tokio::select! {
                status = child.wait() => status,
                () = stop.requested() => {
                    cancelled = true;
                    kill(&mut child);
                    child.wait().await
                }
            }
        };
        let status = waited.map_err(RunError::Wait)?;
        let exit_code = status.code();
        tracing::debug!(?exit_code, cancelled, "toolchain process exited");

        Ok(RunOutcome {
            exit_code,
            cancelled,
            diagnostics: state.parser.into_diagnostics(),
        })
    }

    /// Drive both streams until EOF or stop. Returns whether the run was
    /// cancelled.
    async fn pump<S: SourcePeek>(
        &mut self,
        child: &mut Child,
        state: &mut RunState<S>,
        stop: &mut PendingStop,
    ) -> Result<bool, RunError> {
        let mut stdout = child.stdout.take().ok_or_else(|| RunError::Stream {
            stream: StreamKind::Stdout,
            source: std::io::Error::other("stdout not captured"),
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| RunError::Stream {
            stream: StreamKind::Stderr,
            source: std::io::Error::other("stderr not captured"),
        })?;

        let mut out_buf = [0u8; READ_BUF_BYTES];
        let mut err_buf = [0u8; READ_BUF_BYTES];
        let mut out_open = true;
        let mut err_open = true;

        while out_open || err_open {
            tokio::select! {
                read = stdout.read(&mut out_buf), if out_open => {
                    match read {
                        Ok(0) => {
                            out_open = false;
                            self.on_stdout_eof(state);
                        }
                        Ok(n) => self.on_stdout(state, &out_buf[..n]),
                        Err(source) => {
                            return Err(RunError::Stream { stream: StreamKind::Stdout, source });
                        }
                    }
                }
                read = stderr.read(&mut err_buf), if err_open => {
                    match read {
                        Ok(0) => {
                            err_open = false;
                            self.on_stderr_eof(state);
                        }
                        Ok(n) => self.on_stderr(state, &err_buf[..n]),
                        Err(source) => {
                            return Err(RunError::Stream { stream: StreamKind::Stderr, source });
                        }
                    }
                }
                () = stop.requested() => {
                    kill(child);
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Process one stdout chunk.
    fn on_stdout<S: SourcePeek>(&mut self, state: &mut RunState<S>, chunk: &[u8]) {
        let mut emitted = false;
        for line in state.stdout.push(chunk) {
            self.display.append_line(&line);
            emitted |= state.parser.push_line(&line) == ParseStep::Emitted;
        }
        self.publish_if(state, emitted);
    }

    fn on_stderr<S>(&mut self, state: &mut RunState<S>, chunk: &[u8]) {
        for line in state.stderr.push(chunk) {
            self.stderr_line(&line);
        }
    }

    /// The unterminated remainder of stdout is a last line like any other.
    fn on_stdout_eof<S: SourcePeek>(&mut self, state: &mut RunState<S>) {
        let Some(line) = state.stdout.finish() else {
            return;
        };
        self.display.append_line(&line);
        let emitted = state.parser.push_line(&line) == ParseStep::Emitted;
        self.publish_if(state, emitted);
    }

    fn on_stderr_eof<S>(&mut self, state: &mut RunState<S>) {
        if let Some(line) = state.stderr.finish() {
            self.stderr_line(&line);
        }
    }

    fn stderr_line(&mut self, line: &str) {
        if let Some(text) = noise::filter_line(line).text() {
            self.display.append_line(text);
        }
    }

    fn publish_if<S: SourcePeek>(&mut self, state: &RunState<S>, emitted: bool) {
        if emitted && self.publish_diagnostics {
            self.publisher.publish(state.parser.diagnostics());
        }
    }
}

fn kill(child: &mut Child) {
    tracing::debug!("stop requested, killing toolchain process");
    if let Err(e) = child.start_kill() {
        tracing::debug!("kill failed (process already gone?): {e}");
    }
}
