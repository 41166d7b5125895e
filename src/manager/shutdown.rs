// src/manager/shutdown.rs

//! Coordinated shutdown.
//!
//! [`Manager::stop_all`] is the testable half: it asks every active job to
//! terminate and waits for each one to close. [`Manager::shutdown`] adds the
//! final process exit on top.

use std::fmt;
use std::sync::atomic::Ordering;

use tracing::{debug, info};

use crate::job::{Job, JobData};
use crate::manager::Manager;

/// Signal that triggered the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl ShutdownSignal {
    pub fn number(self) -> i32 {
        match self {
            ShutdownSignal::Interrupt => 2,
            ShutdownSignal::Terminate => 15,
        }
    }

    /// Conventional exit status for a process ended by this signal.
    pub fn exit_code(self) -> i32 {
        128 + self.number()
    }
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => f.write_str("SIGINT"),
            ShutdownSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// What `stop_all` did.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Terminal snapshots of the jobs that were active when shutdown began.
    pub stopped: Vec<JobData>,
}

impl Manager {
    /// Kill every RUNNING or KILLING job and wait until all of them closed.
    ///
    /// From the first call on, the manager refuses to create, restart or
    /// execute jobs. Jobs that are CREATED or already terminal are left
    /// alone. Safe to call while jobs are finishing on their own: `kill` is a
    /// no-op on a job that is no longer RUNNING and `closed` resolves at once
    /// for a terminal job. The active set is re-read until it is empty, so a
    /// job that started just before the gate closed is stopped as well. Once
    /// every job closed, pending store writes for terminal jobs are awaited
    /// so final statuses are persisted.
    pub async fn stop_all(&self, signal: ShutdownSignal) -> ShutdownReport {
        self.shared.closing.store(true, Ordering::SeqCst);
        info!(%signal, "shutting down; no new jobs accepted");

        let mut stopped = Vec::new();
        loop {
            let active: Vec<Job> = self
                .job_list()
                .into_iter()
                .filter(|job| job.status().is_active())
                .collect();
            if active.is_empty() {
                break;
            }

            info!(%signal, jobs = active.len(), "stopping active jobs");
            for job in &active {
                job.kill();
            }
            for job in &active {
                let data = job.closed().await;
                debug!(job = %data.id, status = %data.status, "job closed during shutdown");
                stopped.push(data);
            }
        }

        for mirror in self.take_finished_mirrors() {
            let _ = mirror.await;
        }

        info!(%signal, stopped = stopped.len(), "all active jobs stopped");
        ShutdownReport { stopped }
    }

    /// Stop all jobs, then exit the hosting process. Never returns.
    pub async fn shutdown(&self, signal: ShutdownSignal) {
        self.stop_all(signal).await;
        info!(%signal, code = signal.exit_code(), "exiting");
        std::process::exit(signal.exit_code())
    }
}
