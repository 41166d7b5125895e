// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod job;
pub mod logging;
pub mod manager;
pub mod store;
pub mod tasks;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{load_and_validate, ConfigFile};
use crate::exec::{ProcessLauncher, TokioLauncher};
use crate::job::{JobEventKind, JobStatus};
use crate::manager::{Manager, ManagerOptions, ShutdownSignal};
use crate::store::{FileJobStore, JobStore, MemoryJobStore};
use crate::tasks::ConfigTaskResolver;

pub use crate::errors::PulsarError;
pub use crate::job::{Job, JobData, JobEvent, JobId};

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading
/// - job store, task resolver and process launcher
/// - the manager
/// - SIGINT / SIGTERM handling (coordinated shutdown)
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading config from {:?}", args.config))?;

    if let Command::Check = args.command {
        print_summary(&cfg);
        return Ok(0);
    }

    let manager = build_manager(&cfg, Arc::new(TokioLauncher::new()));

    match args.command {
        Command::Run {
            app,
            env,
            task,
            vars,
        } => run_job(&manager, &app, &env, &task, vars).await,
        Command::Tasks { app, env } => {
            let tasks = manager.available_tasks(&app, &env)?;
            println!("tasks for {app} ({env}):");
            for (name, info) in tasks.iter() {
                match &info.description {
                    Some(desc) => println!("  - {name}: {desc}"),
                    None => println!("  - {name}"),
                }
                for (var, desc) in info.variables.iter() {
                    println!("      ${var}  {desc}");
                }
            }
            Ok(0)
        }
        Command::History => {
            for record in manager.job_history().await? {
                println!("{}", serde_json::to_string(&record)?);
            }
            Ok(0)
        }
        Command::Check => Ok(0),
    }
}

/// Build a manager from validated config.
///
/// `[store].path` selects the JSON file store; without it jobs are only kept
/// in memory.
pub fn build_manager(cfg: &ConfigFile, launcher: Arc<dyn ProcessLauncher>) -> Manager {
    let store: Arc<dyn JobStore> = match &cfg.store.path {
        Some(path) => Arc::new(FileJobStore::new(path)),
        None => Arc::new(MemoryJobStore::new()),
    };
    let resolver = Arc::new(ConfigTaskResolver::from_config(cfg));
    Manager::new(store, resolver, launcher, ManagerOptions::from(cfg))
}

async fn run_job(
    manager: &Manager,
    app: &str,
    env: &str,
    task: &str,
    vars: Vec<(String, String)>,
) -> Result<i32> {
    let variables = Value::Object(
        vars.into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
    );

    let job = manager.create_job(app, env, task, Some(&variables)).await?;
    let mut events = job.subscribe();

    spawn_signal_handler(manager.clone());

    if let Err(e) = job.execute() {
        warn!(job = %job.id(), error = %e, "job failed to start");
    }

    loop {
        match events.recv().await {
            Ok(event) => {
                eprintln!("job {} {}", event.data.id, event.data.status);
                if event.kind == JobEventKind::Close {
                    break;
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }

    let data = job.closed().await;
    for line in job.output() {
        println!("{line}");
    }

    let success = data.status == JobStatus::Finished
        && data.exit.as_ref().is_some_and(|exit| exit.success());
    debug!(job = %data.id, status = %data.status, success, "job done");
    Ok(if success { 0 } else { 1 })
}

/// SIGINT / SIGTERM -> coordinated shutdown of every active job.
fn spawn_signal_handler(manager: Manager) {
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        manager.shutdown(signal).await;
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> ShutdownSignal {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => tokio::select! {
            _ = tokio::signal::ctrl_c() => ShutdownSignal::Interrupt,
            _ = term.recv() => ShutdownSignal::Terminate,
        },
        Err(e) => {
            warn!(error = %e, "failed to listen for SIGTERM");
            wait_for_ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> ShutdownSignal {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> ShutdownSignal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    ShutdownSignal::Interrupt
}

/// `check` output: global settings and task definitions.
fn print_summary(cfg: &ConfigFile) {
    println!("pulsar config check");
    println!("  pulsar.kill_timeout = {:?}", cfg.kill_timeout);
    println!("  pulsar.output_limit = {}", cfg.pulsar.output_limit);
    match &cfg.store.path {
        Some(path) => println!("  store.path = {}", path.display()),
        None => println!("  store = memory"),
    }
    println!();

    println!("tasks ({} + built-in shell):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        if !task.variables.is_empty() {
            let vars: Vec<_> = task.variables.keys().collect();
            println!("      variables: {:?}", vars);
        }
        if !task.apps.is_empty() {
            println!("      apps: {:?}", task.apps);
        }
        if !task.envs.is_empty() {
            println!("      envs: {:?}", task.envs);
        }
    }

    debug!("config check complete (no execution)");
}
