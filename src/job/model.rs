// src/job/model.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::PulsarError;
use crate::exec::ExitInfo;

/// Opaque, globally unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for JobId {
    type Err = PulsarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(JobId)
            .map_err(|e| PulsarError::validation("id", format!("invalid job id '{s}': {e}")))
    }
}

/// Validated job variables: name -> scalar value.
pub type JobArgs = BTreeMap<String, String>;

/// Lifecycle status of a job.
///
/// ```text
/// CREATED -> RUNNING -> FINISHED
///                   \-> KILLING -> KILLED
///                              \-> FINISHED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Created,
    Running,
    Killing,
    Killed,
    Finished,
}

impl JobStatus {
    /// FINISHED or KILLED; no further transitions occur.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Killed)
    }

    /// RUNNING or KILLING, i.e. a process is attached.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Running | JobStatus::Killing)
    }

    /// Edges of the lifecycle graph.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Created, Running)
                | (Running, Finished)
                | (Running, Killing)
                | (Killing, Killed)
                | (Killing, Finished)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Created => "CREATED",
            JobStatus::Running => "RUNNING",
            JobStatus::Killing => "KILLING",
            JobStatus::Killed => "KILLED",
            JobStatus::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable snapshot of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobData {
    pub id: JobId,
    pub app: String,
    pub env: String,
    pub task: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit: Option<ExitInfo>,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEventKind {
    /// Emitted on every status transition.
    Change,
    /// Emitted once, right after the change into a terminal status.
    Close,
}

/// Lifecycle notification carrying the snapshot taken at transition time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    pub kind: JobEventKind,
    pub data: JobData,
}
