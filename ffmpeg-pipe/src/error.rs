use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipeError>;

#[derive(Error, Debug)]
pub enum PipeError {
    /// The transcoder executable could not be launched.
    #[error("failed to start `{command}`: {source}")]
    Startup {
        command: String,
        source: std::io::Error,
    },

    /// The transcoder ran and exited non-zero. `exit_code` is -1 when the
    /// child was terminated by a signal.
    #[error("`{command}` exited with error code {exit_code}:\n{stderr}")]
    Transcode {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("image stream truncated: record needs {needed} more bytes, only {available} available")]
    StreamTruncated { needed: u64, available: u64 },

    #[error("invalid duration probe output: {0}")]
    Probe(String),

    #[error("`{command}` timed out after {after:?}")]
    TimedOut { command: String, after: Duration },

    #[error("`{command}` cancelled")]
    Cancelled { command: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink error: {0}")]
    Sink(String),
}

impl PipeError {
    /// Exit code of a failed transcode, if this is one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            PipeError::Transcode { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}
