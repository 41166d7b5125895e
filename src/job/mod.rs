// src/job/mod.rs

//! Supervised jobs.
//!
//! A [`Job`] is a cheap, cloneable handle to one execution of a task. The
//! mutable lifecycle lives in the pure [`state::JobState`]; the async
//! [`supervisor`] owns the process once it is spawned.
//!
//! Every transition is published while the job lock is held:
//! - to a `broadcast` channel (`subscribe()`), so any number of listeners get
//!   `Change` / `Close` events in transition order without blocking the job;
//! - to a `watch` channel holding the latest snapshot, which backs
//!   [`Job::closed`].

pub mod model;
pub mod state;
pub(crate) mod supervisor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::{PulsarError, Result};
use crate::exec::{CommandSpec, ExitInfo, OutputSink, ProcessEnv, ProcessLauncher};

pub use model::{JobArgs, JobData, JobEvent, JobEventKind, JobId, JobStatus};
pub use state::JobState;

use supervisor::Control;

const EVENT_CAPACITY: usize = 16;

/// Escalation deadline used when `now + kill_timeout` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Everything that identifies what a job runs. Immutable after creation.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub id: JobId,
    pub app: String,
    pub env: String,
    pub task: String,
    pub args: JobArgs,
    pub command: CommandSpec,
}

/// Per-job policy.
#[derive(Debug, Clone, Copy)]
pub struct JobOptions {
    /// Delay between the graceful and the forced termination signal.
    pub kill_timeout: Duration,
    /// Captured output lines kept per job (0 = unlimited).
    pub output_limit: usize,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            kill_timeout: Duration::from_secs(5),
            output_limit: 1000,
        }
    }
}

struct Inner {
    state: JobState,
    control: Option<mpsc::UnboundedSender<Control>>,
}

struct Shared {
    spec: JobSpec,
    created_at: DateTime<Utc>,
    options: JobOptions,
    launcher: Arc<dyn ProcessLauncher>,
    output: OutputSink,
    /// Set by the owning manager once shutdown begins; `execute` refuses then.
    closing: Arc<AtomicBool>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<JobEvent>,
    snapshot: watch::Sender<JobData>,
}

#[derive(Clone)]
pub struct Job {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.shared.spec.id)
            .field("task", &self.shared.spec.task)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Job {
    pub fn new(spec: JobSpec, launcher: Arc<dyn ProcessLauncher>, options: JobOptions) -> Self {
        Self::with_gate(spec, launcher, options, Arc::new(AtomicBool::new(false)))
    }

    /// Like [`Job::new`], but `execute` fails with `ShuttingDown` once
    /// `closing` is set.
    pub(crate) fn with_gate(
        spec: JobSpec,
        launcher: Arc<dyn ProcessLauncher>,
        options: JobOptions,
        closing: Arc<AtomicBool>,
    ) -> Self {
        let created_at = Utc::now();
        let state = JobState::new();
        let initial = snapshot_of(&spec, created_at, &state);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot, _) = watch::channel(initial);

        Self {
            shared: Arc::new(Shared {
                output: OutputSink::new(options.output_limit),
                spec,
                created_at,
                options,
                launcher,
                closing,
                inner: Mutex::new(Inner {
                    state,
                    control: None,
                }),
                events,
                snapshot,
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.shared.spec.id
    }

    pub fn app(&self) -> &str {
        &self.shared.spec.app
    }

    pub fn env(&self) -> &str {
        &self.shared.spec.env
    }

    pub fn task(&self) -> &str {
        &self.shared.spec.task
    }

    /// The validated variables the job was created with.
    pub fn args(&self) -> &JobArgs {
        &self.shared.spec.args
    }

    pub fn command(&self) -> &CommandSpec {
        &self.shared.spec.command
    }

    pub fn spec(&self) -> &JobSpec {
        &self.shared.spec
    }

    pub fn status(&self) -> JobStatus {
        self.lock().state.status()
    }

    /// Snapshot of the job's identifying and lifecycle data.
    pub fn data(&self) -> JobData {
        let inner = self.lock();
        snapshot_of(&self.shared.spec, self.shared.created_at, &inner.state)
    }

    /// Captured stdout/stderr lines, oldest first.
    pub fn output(&self) -> Vec<String> {
        self.shared.output.lines()
    }

    /// Subscribe to lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.events.subscribe()
    }

    /// Resolves with the terminal snapshot once the job is FINISHED or KILLED.
    pub async fn closed(&self) -> JobData {
        let mut rx = self.shared.snapshot.subscribe();
        match rx.wait_for(|data| data.status.is_terminal()).await {
            Ok(data) => data.clone(),
            Err(_) => self.data(),
        }
    }

    /// Spawn the process: CREATED -> RUNNING.
    ///
    /// Must be called from within a Tokio runtime. Calling it on a job that
    /// is not CREATED is an `InvalidState` error and has no effect. A spawn
    /// failure still walks the job through RUNNING to FINISHED (with
    /// `exit.error` set) so it never stays pending.
    pub fn execute(&self) -> Result<()> {
        let mut inner = self.lock();

        let status = inner.state.status();
        if status != JobStatus::Created {
            return Err(PulsarError::InvalidState {
                id: self.id().to_string(),
                status: status.to_string(),
                action: "execute",
            });
        }
        if self.shared.closing.load(Ordering::SeqCst) {
            debug!(job = %self.id(), "execute refused during shutdown");
            return Err(PulsarError::ShuttingDown("execute"));
        }

        let env = self.process_env();
        let spawned = self.shared.launcher.spawn(
            &self.shared.spec.command,
            &env,
            self.shared.output.clone(),
        );

        let process = match spawned {
            Ok(process) => process,
            Err(err) => {
                warn!(job = %self.id(), task = %self.task(), error = %err, "job failed to spawn");
                let now = Utc::now();
                if inner.state.start(None, now).is_ok() {
                    self.emit(&inner.state, JobEventKind::Change);
                }
                if inner.state.finish(ExitInfo::failure(err.to_string()), now).is_some() {
                    self.emit(&inner.state, JobEventKind::Change);
                    self.emit(&inner.state, JobEventKind::Close);
                }
                return Err(err);
            }
        };

        let pid = process.pid();
        if let Err(status) = inner.state.start(pid, Utc::now()) {
            // Unreachable while the lock is held, but never leak a process.
            return Err(PulsarError::InvalidState {
                id: self.id().to_string(),
                status: status.to_string(),
                action: "execute",
            });
        }

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        inner.control = Some(control_tx);
        self.emit(&inner.state, JobEventKind::Change);
        info!(job = %self.id(), task = %self.task(), pid, "job running");

        tokio::spawn(supervisor::supervise(self.clone(), process, control_rx));
        Ok(())
    }

    /// Request termination: RUNNING -> KILLING.
    ///
    /// Sends the graceful signal and arms the escalation timer. A no-op (and
    /// `false`) unless the job is RUNNING, so repeated calls never re-arm the
    /// timer or re-send the signal.
    pub fn kill(&self) -> bool {
        let now = Instant::now();
        let deadline = now
            .checked_add(self.shared.options.kill_timeout)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);

        let mut inner = self.lock();

        if !inner.state.begin_kill() {
            debug!(job = %self.id(), status = %inner.state.status(), "kill ignored");
            return false;
        }

        if let Some(control) = &inner.control {
            if control.send(Control::Terminate { deadline }).is_err() {
                debug!(job = %self.id(), "supervisor already gone while killing");
            }
        }

        self.emit(&inner.state, JobEventKind::Change);
        info!(
            job = %self.id(),
            kill_timeout_ms = self.shared.options.kill_timeout.as_millis() as u64,
            "job killing"
        );
        true
    }

    pub(crate) fn escalate(&self) -> bool {
        self.lock().state.escalate()
    }

    pub(crate) fn complete(&self, exit: ExitInfo) {
        let mut inner = self.lock();
        let code = exit.code;
        let signal = exit.signal;

        let Some(status) = inner.state.finish(exit, Utc::now()) else {
            warn!(job = %self.id(), status = %inner.state.status(), "exit reported for inactive job");
            return;
        };
        inner.control = None;

        self.emit(&inner.state, JobEventKind::Change);
        self.emit(&inner.state, JobEventKind::Close);
        info!(job = %self.id(), %status, exit_code = code, signal, "job closed");
    }

    fn process_env(&self) -> ProcessEnv {
        let spec = &self.shared.spec;
        let mut env = spec.args.clone();
        env.insert("PULSAR_JOB_ID".to_string(), spec.id.to_string());
        env.insert("PULSAR_APP".to_string(), spec.app.clone());
        env.insert("PULSAR_ENV".to_string(), spec.env.clone());
        env.insert("PULSAR_TASK".to_string(), spec.task.clone());
        env
    }

    fn emit(&self, state: &JobState, kind: JobEventKind) {
        let data = snapshot_of(&self.shared.spec, self.shared.created_at, state);
        self.shared.snapshot.send_replace(data.clone());
        // No receivers is fine.
        let _ = self.shared.events.send(JobEvent { kind, data });
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn snapshot_of(spec: &JobSpec, created_at: DateTime<Utc>, state: &JobState) -> JobData {
    JobData {
        id: spec.id,
        app: spec.app.clone(),
        env: spec.env.clone(),
        task: spec.task.clone(),
        status: state.status(),
        created_at,
        started_at: state.started_at(),
        finished_at: state.finished_at(),
        exit: state.exit().cloned(),
        pid: state.pid(),
    }
}
