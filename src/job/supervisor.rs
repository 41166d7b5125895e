// src/job/supervisor.rs

//! Async IO shell around a running job.
//!
//! One supervisor task per spawned process. It owns the `RunningProcess`,
//! delivers termination signals requested through [`Control`], runs the
//! escalation timer and reports the exit back to the job. Process exit is
//! always polled first, so an exit that is ready when the timer fires is
//! recorded as FINISHED and no forced signal is sent.

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::exec::{RunningProcess, TermSignal};
use crate::job::Job;

/// Requests sent from the `Job` handle to its supervisor.
#[derive(Debug)]
pub(crate) enum Control {
    /// Send the graceful signal and escalate at `deadline`.
    Terminate { deadline: Instant },
}

pub(crate) async fn supervise(
    job: Job,
    mut process: Box<dyn RunningProcess>,
    mut control: mpsc::UnboundedReceiver<Control>,
) {
    let mut deadline: Option<Instant> = None;

    let exit = loop {
        tokio::select! {
            biased;

            exit = process.wait() => break exit,

            Some(msg) = control.recv() => match msg {
                Control::Terminate { deadline: at } => {
                    debug!(job = %job.id(), pid = process.pid(), "sending graceful termination signal");
                    if let Err(e) = process.signal(TermSignal::Graceful) {
                        warn!(job = %job.id(), error = %e, "failed to send graceful termination signal");
                    }
                    deadline = Some(at);
                }
            },

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;

                if let Some(exit) = process.try_wait() {
                    break exit;
                }

                if job.escalate() {
                    warn!(job = %job.id(), pid = process.pid(), "kill timeout elapsed; sending forced termination signal");
                    if let Err(e) = process.signal(TermSignal::Forced) {
                        warn!(job = %job.id(), error = %e, "failed to send forced termination signal");
                    }
                }
            }
        }
    };

    job.complete(exit);
}
