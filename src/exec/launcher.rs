// src/exec/launcher.rs

//! Narrow process capability interface.
//!
//! The job state machine never touches `tokio::process` directly; it talks to
//! a `ProcessLauncher` and the `RunningProcess` handles it returns. Production
//! code uses [`TokioLauncher`](super::TokioLauncher); tests can plug in a fake
//! launcher that doesn't spawn real processes.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::exec::OutputSink;

/// Resolved command line for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Build a shell command appropriate for the platform.
    pub fn shell(cmd: &str) -> Self {
        if cfg!(windows) {
            Self::new("cmd").arg("/C").arg(cmd)
        } else {
            Self::new("sh").arg("-c").arg(cmd)
        }
    }

    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Environment handed to a spawned process.
pub type ProcessEnv = BTreeMap<String, String>;

/// Which termination signal to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSignal {
    /// SIGTERM on Unix.
    Graceful,
    /// SIGKILL on Unix.
    Forced,
}

/// How a process ended.
///
/// `error` is only set when the process never ran (spawn failure) or its exit
/// could not be observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExitInfo {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn signal(signal: i32) -> Self {
        Self {
            signal: Some(signal),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0) && self.error.is_none()
    }
}

impl From<std::process::ExitStatus> for ExitInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
            error: None,
        }
    }
}

/// Spawns processes for jobs.
pub trait ProcessLauncher: Send + Sync {
    /// Start `command` with `env` added to its environment.
    ///
    /// Spawning is synchronous so that a failure can be reported before the
    /// job leaves `execute()`. Output lines should be forwarded to `output`.
    fn spawn(
        &self,
        command: &CommandSpec,
        env: &ProcessEnv,
        output: OutputSink,
    ) -> Result<Box<dyn RunningProcess>>;
}

/// A spawned process, exclusively owned by one job supervisor.
pub trait RunningProcess: Send {
    fn pid(&self) -> Option<u32>;

    /// Deliver a termination signal. Signalling a process that already exited
    /// is not an error.
    fn signal(&mut self, signal: TermSignal) -> std::io::Result<()>;

    /// Non-blocking exit check.
    fn try_wait(&mut self) -> Option<ExitInfo>;

    /// Wait for the process to exit.
    ///
    /// Must be cancel safe: the supervisor re-creates this future on every
    /// loop iteration.
    fn wait(&mut self) -> Pin<Box<dyn Future<Output = ExitInfo> + Send + '_>>;
}
