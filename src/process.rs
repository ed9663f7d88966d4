//! Running external tools and interpreting their exit status.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Which of the child's streams end up in the captured buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// stdout and stderr share one buffer, in arrival order.
    Combined,
    /// stdout only; stderr is kept apart in [`ProcessOutput::stderr`].
    Stdout,
}

/// One external command, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub capture: Capture,
    /// Also copy output to our own stdout as it arrives.
    pub mirror: bool,
}

impl Invocation {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            capture: Capture::Combined,
            mirror: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn capture(mut self, capture: Capture) -> Self {
        self.capture = capture;
        self
    }

    pub fn mirrored(mut self) -> Self {
        self.mirror = true;
        self
    }

    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Space-joined command line, for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    pub output: Vec<u8>,
    /// Filled only for [`Capture::Stdout`]; combined runs put stderr in
    /// `output`.
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// What to report when a stdout-only run fails: its stderr, or the exit
    /// status when stderr was empty.
    pub fn failure_text(&self, tool: &str) -> String {
        let stderr = String::from_utf8_lossy(&self.stderr);
        if !stderr.trim().is_empty() {
            return stderr.into_owned();
        }
        match self.exit_code {
            Some(code) => format!("{} exited with code {}", tool, code),
            None => format!("{} was terminated by a signal", tool),
        }
    }
}

/// Runs an [`Invocation`] to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput>;
}

/// Spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        let spawn_err = |source| AppError::Spawn {
            program: invocation.program_name(),
            source,
        };

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        let collected = collect(
            child.stdout.take(),
            child.stderr.take(),
            invocation.capture,
            invocation.mirror,
        )
        .await;
        let (output, stderr) = match collected {
            Ok(buffers) => buffers,
            Err(e) => {
                abort(&mut child, invocation).await;
                return Err(spawn_err(e));
            }
        };

        let status = child.wait().await.map_err(spawn_err)?;

        Ok(ProcessOutput {
            exit_code: status.code(),
            output,
            stderr,
        })
    }
}

/// Kill and reap a child whose output can no longer be read.
async fn abort(child: &mut Child, invocation: &Invocation) {
    if let Err(e) = child.kill().await {
        warn!("Could not kill {}: {}", invocation.program_name(), e);
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Out,
    Err,
}

async fn read_some<R>(stream: &mut Option<R>, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match stream {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Drain both pipes until each reaches EOF. Returns the captured output
/// and, for [`Capture::Stdout`], the separate stderr text.
async fn collect<O, E>(
    mut stdout: Option<O>,
    mut stderr: Option<E>,
    capture: Capture,
    mirror: bool,
) -> std::io::Result<(Vec<u8>, Vec<u8>)>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut combined = Vec::new();
    let mut errors = Vec::new();
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];
    let mut console = tokio::io::stdout();

    while stdout.is_some() || stderr.is_some() {
        let (n, stream) = tokio::select! {
            read = read_some(&mut stdout, &mut out_buf) => (read?, Stream::Out),
            read = read_some(&mut stderr, &mut err_buf) => (read?, Stream::Err),
        };

        if n == 0 {
            match stream {
                Stream::Out => stdout = None,
                Stream::Err => stderr = None,
            }
            continue;
        }

        let chunk = match stream {
            Stream::Out => &out_buf[..n],
            Stream::Err => &err_buf[..n],
        };
        match (stream, capture) {
            (Stream::Err, Capture::Stdout) => errors.extend_from_slice(chunk),
            _ => combined.extend_from_slice(chunk),
        }
        if mirror {
            console.write_all(chunk).await?;
            console.flush().await?;
        }
    }

    Ok((combined, errors))
}

/// Exit code 0 yields the captured text; anything else becomes
/// [`AppError::ToolFailed`] carrying exactly that text.
pub fn map_exit(output: ProcessOutput, verbose: bool, tool: &str) -> Result<String> {
    let text = output.text();
    if output.success() {
        if verbose {
            info!("[{} verbose] {}", tool, text);
        }
        Ok(text)
    } else {
        Err(AppError::ToolFailed(text))
    }
}

/// Like [`map_exit`] for [`Capture::Stdout`] runs: success yields stdout,
/// failure reports stderr (or the exit status) instead of the stdout that
/// would have been parsed.
pub fn map_stdout_exit(output: ProcessOutput, tool: &str) -> Result<String> {
    if output.success() {
        Ok(output.text())
    } else {
        Err(AppError::ToolFailed(output.failure_text(tool)))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records every invocation and answers from a script; once the script
    /// runs out it answers success with empty output.
    #[derive(Default)]
    pub struct FakeRunner {
        pub calls: Mutex<Vec<Invocation>>,
        replies: Mutex<VecDeque<ProcessOutput>>,
    }

    impl FakeRunner {
        pub fn replying(replies: impl IntoIterator<Item = (i32, &'static str)>) -> Self {
            Self::from_outputs(replies.into_iter().map(|(code, text)| ProcessOutput {
                exit_code: Some(code),
                output: text.as_bytes().to_vec(),
                stderr: Vec::new(),
            }))
        }

        pub fn from_outputs(outputs: impl IntoIterator<Item = ProcessOutput>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                replies: Mutex::new(outputs.into_iter().collect()),
            }
        }

        pub fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
            self.calls.lock().unwrap().push(invocation.clone());
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ProcessOutput {
                    exit_code: Some(0),
                    output: Vec::new(),
                    stderr: Vec::new(),
                }))
        }
    }

    pub fn arg_strings(invocation: &Invocation) -> Vec<String> {
        invocation
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}
