// src/manager/mod.rs

//! Job manager: factory, registry and persistence mirror for jobs.
//!
//! - [`validate`] checks caller input before anything is created.
//! - [`shutdown`] coordinates stopping every active job.
//!
//! The manager never signals a process itself; it only calls `Job::kill`.

pub mod shutdown;
pub mod validate;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::errors::{PulsarError, Result};
use crate::exec::ProcessLauncher;
use crate::job::{Job, JobEventKind, JobId, JobOptions, JobSpec};
use crate::store::{JobRecord, JobStore, RecordUpdate};
use crate::tasks::{shell_task, TaskList, TaskResolver, SHELL_TASK};

pub use shutdown::{ShutdownReport, ShutdownSignal};
pub use validate::ILLEGAL_TASKS;

/// Policy applied to every job the manager creates.
#[derive(Debug, Clone, Copy)]
pub struct ManagerOptions {
    pub kill_timeout: Duration,
    pub output_limit: usize,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        let job = JobOptions::default();
        Self {
            kill_timeout: job.kill_timeout,
            output_limit: job.output_limit,
        }
    }
}

impl From<&ConfigFile> for ManagerOptions {
    fn from(cfg: &ConfigFile) -> Self {
        Self {
            kill_timeout: cfg.kill_timeout,
            output_limit: cfg.pulsar.output_limit,
        }
    }
}

struct Tracked {
    job: Job,
    /// Task writing this job's transitions to the store.
    mirror: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Registry {
    order: Vec<JobId>,
    jobs: HashMap<JobId, Tracked>,
}

struct Shared {
    store: Arc<dyn JobStore>,
    resolver: Arc<dyn TaskResolver>,
    launcher: Arc<dyn ProcessLauncher>,
    options: ManagerOptions,
    /// Set when `stop_all` begins; shared with every job as its execute gate.
    closing: Arc<AtomicBool>,
    registry: Mutex<Registry>,
}

#[derive(Clone)]
pub struct Manager {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("options", &self.shared.options)
            .field("jobs", &self.registry().order.len())
            .finish_non_exhaustive()
    }
}

impl Manager {
    pub fn new(
        store: Arc<dyn JobStore>,
        resolver: Arc<dyn TaskResolver>,
        launcher: Arc<dyn ProcessLauncher>,
        options: ManagerOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                resolver,
                launcher,
                options,
                closing: Arc::new(AtomicBool::new(false)),
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    pub fn options(&self) -> ManagerOptions {
        self.shared.options
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.shared.store
    }

    /// True once `stop_all` (or `shutdown`) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shared.closing.load(Ordering::SeqCst)
    }

    fn ensure_open(&self, action: &'static str) -> Result<()> {
        if self.is_shutting_down() {
            return Err(PulsarError::ShuttingDown(action));
        }
        Ok(())
    }

    /// Validate the request, persist a CREATED record and track a new job.
    ///
    /// The job is returned CREATED; call [`Job::execute`] to start it.
    /// Validation errors are raised before any side effect. Fails with
    /// `ShuttingDown` once shutdown has begun, and so does `execute` on any
    /// job this manager created.
    pub async fn create_job(
        &self,
        app: &str,
        env: &str,
        task: &str,
        variables: Option<&Value>,
    ) -> Result<Job> {
        self.ensure_open("create job")?;
        validate::validate_identifier("app", app)?;
        validate::validate_identifier("env", env)?;
        let args = validate::validate_variables(variables)?;
        let command = validate::validate_task(self.shared.resolver.as_ref(), app, env, task)?;

        let spec = JobSpec {
            id: JobId::new(),
            app: app.to_string(),
            env: env.to_string(),
            task: task.to_string(),
            args,
            command,
        };
        self.launch(spec).await
    }

    /// Look up a tracked job.
    pub fn get_job(&self, id: JobId) -> Result<Job> {
        self.registry()
            .jobs
            .get(&id)
            .map(|tracked| tracked.job.clone())
            .ok_or_else(|| PulsarError::NotFound(format!("job {id}")))
    }

    /// All tracked jobs in creation order.
    pub fn job_list(&self) -> Vec<Job> {
        let registry = self.registry();
        registry
            .order
            .iter()
            .filter_map(|id| registry.jobs.get(id))
            .map(|tracked| tracked.job.clone())
            .collect()
    }

    /// Tasks available for `app` in `env`; always contains the shell task.
    pub fn available_tasks(&self, app: &str, env: &str) -> Result<TaskList> {
        let mut tasks = self.shared.resolver.list_tasks(app, env)?;
        tasks
            .entry(SHELL_TASK.to_string())
            .or_insert_with(shell_task);
        Ok(tasks)
    }

    /// Start a fresh copy of a terminal job.
    ///
    /// The new job has a new id, the same app/env/task/variables and command,
    /// and is returned already RUNNING.
    pub async fn restart_job(&self, id: JobId) -> Result<Job> {
        self.ensure_open("restart job")?;
        let previous = self.get_job(id)?;
        let status = previous.status();
        if !status.is_terminal() {
            return Err(PulsarError::InvalidState {
                id: id.to_string(),
                status: status.to_string(),
                action: "restart",
            });
        }

        let spec = JobSpec {
            id: JobId::new(),
            ..previous.spec().clone()
        };
        let job = self.launch(spec).await?;
        info!(previous = %id, job = %job.id(), "restarting job");
        job.execute()?;
        Ok(job)
    }

    /// Persisted record for `id`, independent of the in-memory registry.
    pub async fn find_record(&self, id: JobId) -> Result<Option<JobRecord>> {
        self.shared.store.find_by_id(id).await
    }

    /// Every persisted record, oldest first.
    pub async fn job_history(&self) -> Result<Vec<JobRecord>> {
        self.shared.store.find_all().await
    }

    async fn launch(&self, spec: JobSpec) -> Result<Job> {
        let options = JobOptions {
            kill_timeout: self.shared.options.kill_timeout,
            output_limit: self.shared.options.output_limit,
        };
        let job = Job::with_gate(
            spec,
            Arc::clone(&self.shared.launcher),
            options,
            Arc::clone(&self.shared.closing),
        );

        let record = JobRecord::from_data(&job.data(), job.args());
        self.shared.store.insert(record).await?;

        self.track(job.clone());
        info!(job = %job.id(), app = %job.app(), env = %job.env(), task = %job.task(), "job created");
        Ok(job)
    }

    /// Register the job and start mirroring its transitions into the store.
    fn track(&self, job: Job) {
        let id = job.id();
        let store = Arc::clone(&self.shared.store);
        let mut events = job.subscribe();

        let mirror = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if event.kind == JobEventKind::Change {
                            let update = RecordUpdate::from(&event.data);
                            if let Err(e) = store.update(id, update).await {
                                warn!(job = %id, status = %event.data.status, error = %e, "failed to persist job status");
                            }
                        }
                        if event.kind == JobEventKind::Close {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(job = %id, skipped, "persistence mirror lagged behind job events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(job = %id, "persistence mirror finished");
        });

        let mut registry = self.registry();
        registry.order.push(id);
        registry.jobs.insert(
            id,
            Tracked {
                job,
                mirror: Some(mirror),
            },
        );
    }

    /// Take the mirror handles of every terminal job.
    fn take_finished_mirrors(&self) -> Vec<JoinHandle<()>> {
        let mut registry = self.registry();
        registry
            .jobs
            .values_mut()
            .filter(|tracked| tracked.job.status().is_terminal())
            .filter_map(|tracked| tracked.mirror.take())
            .collect()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.shared.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}
