//! Bidirectional pipe to an external transcoder.
//!
//! The input buffer is written to the child's stdin while stdout and stderr
//! are drained, all on the same task via `tokio::join!`. Writing first and
//! reading afterwards would deadlock as soon as the child fills its stdout
//! pipe before it has consumed all of its input.

use std::{fmt, future::Future, io, process::Stdio, time::Duration};

use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::{ChildStdin, Command},
};
use tokio_util::sync::CancellationToken;

use crate::error::{PipeError, Result};

/// One transcoder run: command, ordered arguments and the bytes fed to stdin.
#[derive(Debug, Clone)]
pub struct TranscodeInvocation {
    command: String,
    args: Vec<String>,
    input: Bytes,
}

impl TranscodeInvocation {
    pub fn new<I, A>(command: impl Into<String>, args: I, input: Bytes) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            input,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn input(&self) -> &Bytes {
        &self.input
    }
}

impl fmt::Display for TranscodeInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        write!(f, " (stdin: {} bytes)", self.input.len())
    }
}

#[derive(Debug)]
pub struct ProcessResult {
    pub stdout: Bytes,
    pub exit_code: i32,
    pub stderr: String,
}

/// Result of one stream copy between us and the child.
///
/// An interrupted copy is not an error by itself: a child that fails usually
/// closes its pipes early, and the exit code plus stderr captured afterwards
/// is what gets reported.
#[derive(Debug)]
pub enum CopyOutcome {
    Complete(u64),
    Interrupted(io::Error),
}

impl CopyOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, CopyOutcome::Complete(_))
    }
}

impl From<io::Result<u64>> for CopyOutcome {
    fn from(res: io::Result<u64>) -> Self {
        match res {
            Ok(n) => CopyOutcome::Complete(n),
            Err(e) => CopyOutcome::Interrupted(e),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipeOptions {
    /// None = wait for the child indefinitely
    pub timeout: Option<Duration>,
    pub cancel: CancellationToken,
}

/// Anything that can turn a [`TranscodeInvocation`] into a [`ProcessResult`].
pub trait Transcoder: Send + Sync {
    fn run(
        &self,
        invocation: TranscodeInvocation,
    ) -> impl Future<Output = Result<ProcessResult>> + Send;
}

/// [`Transcoder`] backed by a real child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessPipe {
    options: PipeOptions,
}

impl ProcessPipe {
    pub fn new(options: PipeOptions) -> Self {
        Self { options }
    }

    pub async fn invoke(&self, invocation: &TranscodeInvocation) -> Result<ProcessResult> {
        let command = invocation.command().to_string();
        log::debug!("spawning {}", invocation);

        let mut child = Command::new(invocation.command())
            .args(invocation.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PipeError::Startup {
                command: command.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let input = invocation.input().clone();

        let name = command.clone();
        // Dropping this future (timeout / cancel) drops the child, which kills it.
        let run = async move {
            let (written, (out, read), (err, _)) =
                tokio::join!(feed(stdin, input), drain(stdout), drain(stderr));
            if let CopyOutcome::Interrupted(e) = &written {
                log::debug!("{}: stdin closed early: {}", name, e);
            }
            if let CopyOutcome::Interrupted(e) = &read {
                log::debug!("{}: stdout closed early: {}", name, e);
            }
            let status = child.wait().await?;
            Ok::<_, PipeError>((status, out, err))
        };

        let deadline = async {
            match self.options.timeout {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };

        let (status, stdout, stderr) = tokio::select! {
            res = run => res?,
            _ = self.options.cancel.cancelled() => {
                return Err(PipeError::Cancelled { command });
            }
            _ = deadline => {
                let after = self.options.timeout.unwrap_or_default();
                return Err(PipeError::TimedOut { command, after });
            }
        };

        let stderr = String::from_utf8_lossy(&stderr).into_owned();
        let exit_code = status.code().unwrap_or(-1);
        if !status.success() {
            return Err(PipeError::Transcode {
                command,
                exit_code,
                stderr,
            });
        }

        log::debug!("{} finished, {} bytes on stdout", command, stdout.len());
        Ok(ProcessResult {
            stdout: Bytes::from(stdout),
            exit_code,
            stderr,
        })
    }
}

impl Transcoder for ProcessPipe {
    async fn run(&self, invocation: TranscodeInvocation) -> Result<ProcessResult> {
        self.invoke(&invocation).await
    }
}

/// Writes the whole input, then closes stdin so the child sees end-of-input.
async fn feed(stdin: Option<ChildStdin>, input: Bytes) -> CopyOutcome {
    let Some(mut stdin) = stdin else {
        return CopyOutcome::Complete(0);
    };
    let res: io::Result<u64> = async {
        stdin.write_all(&input).await?;
        stdin.shutdown().await?;
        Ok(input.len() as u64)
    }
    .await;
    drop(stdin);
    res.into()
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>) -> (Vec<u8>, CopyOutcome) {
    let mut buf = Vec::new();
    let Some(mut reader) = reader else {
        return (buf, CopyOutcome::Complete(0));
    };
    let res = reader.read_to_end(&mut buf).await.map(|n| n as u64);
    (buf, res.into())
}

#[cfg(all(test, unix))]
#[path = "process_test.rs"]
mod process_test;
