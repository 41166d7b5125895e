use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use pulsar::errors::{PulsarError, Result};
use pulsar::exec::{
    CommandSpec, ExitInfo, OutputSink, ProcessEnv, ProcessLauncher, RunningProcess, TermSignal,
};

const SIGTERM: i32 = 15;
const SIGKILL: i32 = 9;

/// How a fake process reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehaviour {
    /// Runs until finished by the test or signalled; honours SIGTERM.
    Cooperative,
    /// Exits with the given code after the delay; honours SIGTERM before that.
    ExitAfter(Duration, i32),
    /// Ignores the graceful signal; only the forced signal ends it.
    Unkillable,
    /// `spawn` itself fails.
    FailSpawn,
}

/// Everything the test side can see and do with a spawned fake process.
#[derive(Clone)]
pub struct FakeProcessHandle {
    pub pid: u32,
    pub command: CommandSpec,
    pub env: ProcessEnv,
    exit: Arc<watch::Sender<Option<ExitInfo>>>,
    signals: Arc<Mutex<Vec<TermSignal>>>,
}

impl FakeProcessHandle {
    /// Make the process exit with `code` (no-op if it already exited).
    pub fn finish(&self, code: i32) {
        set_exit(&self.exit, ExitInfo::code(code));
    }

    pub fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }

    /// Signals delivered so far, in order.
    pub fn signals(&self) -> Vec<TermSignal> {
        self.signals.lock().unwrap().clone()
    }
}

fn set_exit(exit: &watch::Sender<Option<ExitInfo>>, info: ExitInfo) {
    exit.send_if_modified(|current| {
        if current.is_some() {
            return false;
        }
        *current = Some(info);
        true
    });
}

/// A launcher that never touches the OS.
///
/// Records every spawn and hands out controllable fake processes.
pub struct FakeLauncher {
    behaviour: Mutex<FakeBehaviour>,
    next_pid: AtomicU32,
    spawned: Mutex<Vec<FakeProcessHandle>>,
}

impl FakeLauncher {
    pub fn new(behaviour: FakeBehaviour) -> Self {
        Self {
            behaviour: Mutex::new(behaviour),
            next_pid: AtomicU32::new(10_000),
            spawned: Mutex::new(Vec::new()),
        }
    }

    /// Behaviour for processes spawned from now on.
    pub fn set_behaviour(&self, behaviour: FakeBehaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    pub fn spawned(&self) -> Vec<FakeProcessHandle> {
        self.spawned.lock().unwrap().clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned.lock().unwrap().len()
    }

    /// The most recently spawned process.
    pub fn last(&self) -> FakeProcessHandle {
        self.spawned
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no fake process spawned yet")
    }
}

impl ProcessLauncher for FakeLauncher {
    fn spawn(
        &self,
        command: &CommandSpec,
        env: &ProcessEnv,
        output: OutputSink,
    ) -> Result<Box<dyn RunningProcess>> {
        let behaviour = *self.behaviour.lock().unwrap();
        if behaviour == FakeBehaviour::FailSpawn {
            info!(cmd = %command, "[fake] refusing to spawn");
            return Err(PulsarError::Process(format!(
                "spawning `{command}`: No such file or directory (fake)"
            )));
        }

        let (exit_tx, exit_rx) = watch::channel(None);
        let handle = FakeProcessHandle {
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            command: command.clone(),
            env: env.clone(),
            exit: Arc::new(exit_tx),
            signals: Arc::new(Mutex::new(Vec::new())),
        };

        if let FakeBehaviour::ExitAfter(delay, code) = behaviour {
            let exit = Arc::clone(&handle.exit);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                set_exit(&exit, ExitInfo::code(code));
            });
        }

        info!(pid = handle.pid, cmd = %command, ?behaviour, "[fake] spawned process");
        output.push(format!("fake process {} started", handle.pid));
        self.spawned.lock().unwrap().push(handle.clone());

        Ok(Box::new(FakeProcess {
            handle,
            behaviour,
            exit_rx,
        }))
    }
}

struct FakeProcess {
    handle: FakeProcessHandle,
    behaviour: FakeBehaviour,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
}

impl RunningProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.handle.pid)
    }

    fn signal(&mut self, signal: TermSignal) -> std::io::Result<()> {
        debug!(pid = self.handle.pid, ?signal, "[fake] signal received");
        self.handle.signals.lock().unwrap().push(signal);
        match (signal, self.behaviour) {
            (TermSignal::Graceful, FakeBehaviour::Unkillable) => {}
            (TermSignal::Graceful, _) => set_exit(&self.handle.exit, ExitInfo::signal(SIGTERM)),
            (TermSignal::Forced, _) => set_exit(&self.handle.exit, ExitInfo::signal(SIGKILL)),
        }
        Ok(())
    }

    fn try_wait(&mut self) -> Option<ExitInfo> {
        self.exit_rx.borrow().clone()
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = ExitInfo> + Send + '_>> {
        Box::pin(async move {
            let result = self
                .exit_rx
                .wait_for(|exit| exit.is_some())
                .await
                .map(|exit| exit.clone());
            match result {
                Ok(exit) => exit.unwrap_or_default(),
                Err(_) => ExitInfo::failure("fake process controller dropped"),
            }
        })
    }
}
