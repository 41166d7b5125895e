// src/job/state.rs

//! Pure job state machine.
//!
//! `JobState` holds the mutable half of a job and enforces the transition
//! graph. It has no channels, no Tokio types and performs no IO; the async
//! shell in [`supervisor`](super::supervisor) and the `Job` handle call into
//! it while holding the job lock.

use chrono::{DateTime, Utc};

use crate::exec::ExitInfo;
use crate::job::JobStatus;

#[derive(Debug, Clone)]
pub struct JobState {
    status: JobStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    exit: Option<ExitInfo>,
    pid: Option<u32>,
    /// Set once the forced signal has been (or is about to be) sent.
    forced: bool,
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

impl JobState {
    pub fn new() -> Self {
        Self {
            status: JobStatus::Created,
            started_at: None,
            finished_at: None,
            exit: None,
            pid: None,
            forced: false,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn exit(&self) -> Option<&ExitInfo> {
        self.exit.as_ref()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn advance(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }

    /// CREATED -> RUNNING. Returns the current status on refusal.
    pub fn start(&mut self, pid: Option<u32>, now: DateTime<Utc>) -> Result<(), JobStatus> {
        if !self.advance(JobStatus::Running) {
            return Err(self.status);
        }
        self.pid = pid;
        self.started_at = Some(now);
        Ok(())
    }

    /// RUNNING -> KILLING. `false` means nothing changed.
    pub fn begin_kill(&mut self) -> bool {
        self.advance(JobStatus::Killing)
    }

    /// Arm the forced kill. Only the first call while KILLING succeeds.
    pub fn escalate(&mut self) -> bool {
        if self.status != JobStatus::Killing || self.forced {
            return false;
        }
        self.forced = true;
        true
    }

    /// Record process exit and enter the terminal status.
    ///
    /// A KILLING job whose exit was observed before escalation ends FINISHED;
    /// only an escalated job ends KILLED. Returns `None` if the job was not
    /// RUNNING or KILLING.
    pub fn finish(&mut self, exit: ExitInfo, now: DateTime<Utc>) -> Option<JobStatus> {
        let next = if self.forced {
            JobStatus::Killed
        } else {
            JobStatus::Finished
        };
        if !self.advance(next) {
            return None;
        }
        self.exit = Some(exit);
        self.finished_at = Some(now);
        self.pid = None;
        Some(next)
    }
}
