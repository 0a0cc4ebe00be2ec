//! Process Runner
//!
//! Abstraction over spawning the external executables the scanner subsystem
//! depends on (scan tool, device query, popup dismissal, kill-by-name). The
//! orchestration logic only talks to [`ProcessRunner`], so tests can inject a
//! fake that simulates exit codes, delays and written files.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;

/// Bytes kept from each stream in capture mode
const CAPTURE_LIMIT: usize = 1024 * 1024;

/// Time allowed for a terminated child to exit before it is killed outright
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Time allowed for the output readers to drain after the child exited
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// What an invocation is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    /// Scan tool in list mode
    ListDevices,
    /// OS query for connected imaging devices
    DeviceQuery,
    /// Scan tool in scan mode
    Scan,
    /// Popup dismissal helper
    DismissPopup,
    /// Best-effort kill of vendor executables by image name
    KillVendor,
}

/// How the child's output streams are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Keep stdout and stderr
    Capture,
    /// Discard stdout, keep at most `limit` bytes of stderr
    Diagnostics { limit: usize },
}

impl OutputMode {
    fn limit(&self) -> usize {
        match self {
            OutputMode::Capture => CAPTURE_LIMIT,
            OutputMode::Diagnostics { limit } => *limit,
        }
    }
}

/// A fully described external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub kind: InvocationKind,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
    pub output: OutputMode,
}

impl Invocation {
    pub fn new(kind: InvocationKind, program: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            program: program.into(),
            args: Vec::new(),
            timeout: None,
            output: OutputMode::Capture,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Value following `flag` in the argument list, if any
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Program name for log messages
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

/// Result of a finished (or terminated) child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Terminated because the kill signal fired
    pub killed: bool,
    /// Terminated because the invocation timeout elapsed
    pub timed_out: bool,
}

impl ProcessOutput {
    /// Output of a process that exited with `code`
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.killed && !self.timed_out
    }

    /// Combined, trimmed stdout and stderr
    pub fn diagnostics(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => String::new(),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{}\n{}", stdout, stderr),
        }
    }
}

/// Fires when the registry asks a tracked process to terminate
#[derive(Debug)]
pub struct KillSignal {
    rx: Option<oneshot::Receiver<()>>,
}

impl KillSignal {
    pub(crate) fn new(rx: oneshot::Receiver<()>) -> Self {
        Self { rx: Some(rx) }
    }

    /// A signal that never fires, for untracked invocations
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Resolve once termination was requested.
    ///
    /// A dropped sender means the process was deregistered without a kill
    /// request; the signal then never fires.
    pub async fn fired(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if rx.await.is_ok() {
                return;
            }
            self.rx = None;
        }
        std::future::pending::<()>().await
    }
}

/// Spawns external commands and waits for them
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `invocation` to completion, terminating it early when
    /// `kill_signal` fires or its timeout elapses.
    ///
    /// An `Err` means the process could not be started at all.
    async fn run(
        &self,
        invocation: &Invocation,
        kill_signal: KillSignal,
    ) -> std::io::Result<ProcessOutput>;
}

/// Production runner backed by `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

enum Exit {
    Finished(std::io::Result<ExitStatus>),
    Killed,
    TimedOut,
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        mut kill_signal: KillSignal,
    ) -> std::io::Result<ProcessOutput> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        match invocation.output {
            OutputMode::Capture => {
                command.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            OutputMode::Diagnostics { .. } => {
                command.stdout(Stdio::null()).stderr(Stdio::piped());
            }
        }
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        log::trace!("Spawning {:?}: {:?}", invocation.kind, invocation.args);
        let mut child = command.spawn()?;

        let limit = invocation.output.limit();
        let stdout_reader = child
            .stdout
            .take()
            .map(|stream| tokio::spawn(read_bounded(stream, limit)));
        let stderr_reader = child
            .stderr
            .take()
            .map(|stream| tokio::spawn(read_bounded(stream, limit)));

        let deadline = async {
            match invocation.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let exit = tokio::select! {
            status = child.wait() => Exit::Finished(status),
            _ = kill_signal.fired() => Exit::Killed,
            _ = &mut deadline => Exit::TimedOut,
        };

        let mut output = ProcessOutput::default();
        let status = match exit {
            Exit::Finished(status) => status?,
            Exit::Killed => {
                log::debug!("Terminating {} on request", invocation.program_name());
                output.killed = true;
                terminate(&mut child).await?
            }
            Exit::TimedOut => {
                log::warn!(
                    "{} exceeded its {:?} limit, terminating",
                    invocation.program_name(),
                    invocation.timeout.unwrap_or_default()
                );
                output.timed_out = true;
                terminate(&mut child).await?
            }
        };
        output.exit_code = status.code();
        output.stdout = collect(stdout_reader).await;
        output.stderr = collect(stderr_reader).await;
        Ok(output)
    }
}

/// Ask the child to stop (SIGTERM on Unix), escalating to a hard kill
async fn terminate(child: &mut Child) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: pid belongs to our un-reaped child, kill(2) has no memory effects
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            if let Ok(status) = tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
                return status;
            }
        }
    }
    let _ = child.start_kill();
    child.wait().await
}

async fn read_bounded<R>(mut reader: R, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                // Keep draining past the limit so the child never blocks on a full pipe
                let room = limit.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    String::from_utf8_lossy(&kept).into_owned()
}

async fn collect(reader: Option<tokio::task::JoinHandle<String>>) -> String {
    match reader {
        Some(handle) => match tokio::time::timeout(PIPE_DRAIN_GRACE, handle).await {
            Ok(Ok(text)) => text,
            _ => String::new(),
        },
        None => String::new(),
    }
}
