// src/exec/command.rs

//! Production process launcher built on `tokio::process`.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::errors::{PulsarError, Result};
use crate::exec::launcher::{
    CommandSpec, ExitInfo, ProcessEnv, ProcessLauncher, RunningProcess, TermSignal,
};
use crate::exec::OutputSink;

/// Spawns real OS processes.
///
/// Each child is placed in its own process group (Unix) so termination
/// signals reach everything the task started, not just the shell wrapper.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl TokioLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for TokioLauncher {
    fn spawn(
        &self,
        command: &CommandSpec,
        env: &ProcessEnv,
        output: OutputSink,
    ) -> Result<Box<dyn RunningProcess>> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &command.cwd {
            cmd.current_dir(cwd);
        }

        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| PulsarError::Process(format!("spawning `{command}`: {e}")))?;

        let pid = child.id();
        info!(pid, cmd = %command, "spawned process");

        // Always consume both pipes so buffers don't fill.
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, "stdout", pid, output.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, "stderr", pid, output);
        }

        Ok(Box::new(TokioProcess {
            child,
            pid,
            exit: None,
        }))
    }
}

fn spawn_line_reader<R>(stream: R, name: &'static str, pid: Option<u32>, output: OutputSink)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(pid, stream = name, "{}", line);
            output.push(line);
        }
    });
}

struct TokioProcess {
    child: Child,
    pid: Option<u32>,
    exit: Option<ExitInfo>,
}

impl TokioProcess {
    fn record(&mut self, result: std::io::Result<std::process::ExitStatus>) -> ExitInfo {
        let exit = match result {
            Ok(status) => ExitInfo::from(status),
            Err(e) => {
                warn!(pid = self.pid, error = %e, "failed to observe process exit");
                ExitInfo::failure(format!("waiting for process: {e}"))
            }
        };
        self.exit = Some(exit.clone());
        exit
    }
}

impl RunningProcess for TokioProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    #[cfg(unix)]
    fn signal(&mut self, signal: TermSignal) -> std::io::Result<()> {
        if self.exit.is_some() {
            return Ok(());
        }
        let Some(pid) = self.child.id() else {
            return Ok(());
        };

        let signo = match signal {
            TermSignal::Graceful => libc::SIGTERM,
            TermSignal::Forced => libc::SIGKILL,
        };

        // Negative pid: the whole process group created at spawn.
        let ret = unsafe { libc::kill(-(pid as libc::pid_t), signo) };
        if ret == 0 {
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            debug!(pid, "signal target already gone");
            return Ok(());
        }
        Err(err)
    }

    #[cfg(not(unix))]
    fn signal(&mut self, _signal: TermSignal) -> std::io::Result<()> {
        if self.exit.is_some() {
            return Ok(());
        }
        self.child.start_kill()
    }

    fn try_wait(&mut self) -> Option<ExitInfo> {
        if let Some(exit) = &self.exit {
            return Some(exit.clone());
        }
        match self.child.try_wait() {
            Ok(Some(status)) => Some(self.record(Ok(status))),
            Ok(None) => None,
            Err(e) => Some(self.record(Err(e))),
        }
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = ExitInfo> + Send + '_>> {
        Box::pin(async move {
            if let Some(exit) = &self.exit {
                return exit.clone();
            }
            let result = self.child.wait().await;
            self.record(result)
        })
    }
}
