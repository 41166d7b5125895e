// src/store/mod.rs

//! Persistence port for job records.
//!
//! The manager mirrors every job transition into a [`JobStore`]. The in-memory
//! job is the source of truth; the store is a best-effort durable projection
//! that can be read back independently of the registry.
//!
//! - [`memory`] keeps records in process memory (tests, ephemeral runs).
//! - [`file`] keeps records in a JSON document on disk.

pub mod file;
pub mod memory;

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::exec::ExitInfo;
use crate::job::{JobArgs, JobData, JobId, JobStatus};

pub use file::FileJobStore;
pub use memory::MemoryJobStore;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Durable projection of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub app: String,
    pub env: String,
    pub task: String,
    #[serde(default)]
    pub variables: JobArgs,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exit: Option<ExitInfo>,
}

impl JobRecord {
    pub fn from_data(data: &JobData, variables: &JobArgs) -> Self {
        Self {
            id: data.id,
            app: data.app.clone(),
            env: data.env.clone(),
            task: data.task.clone(),
            variables: variables.clone(),
            status: data.status,
            created_at: data.created_at,
            started_at: data.started_at,
            finished_at: data.finished_at,
            exit: data.exit.clone(),
        }
    }

    pub fn apply(&mut self, update: &RecordUpdate) {
        self.status = update.status;
        self.started_at = update.started_at;
        self.finished_at = update.finished_at;
        self.exit = update.exit.clone();
    }
}

/// The mutable part of a record, written on every status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit: Option<ExitInfo>,
}

impl From<&JobData> for RecordUpdate {
    fn from(data: &JobData) -> Self {
        Self {
            status: data.status,
            started_at: data.started_at,
            finished_at: data.finished_at,
            exit: data.exit.clone(),
        }
    }
}

/// Create/read/update/list access to job records.
///
/// Implementations must tolerate concurrent updates of different ids without
/// corrupting unrelated records. Inserting an existing id or updating an
/// unknown id is a `Persistence` error.
pub trait JobStore: Send + Sync {
    fn insert(&self, record: JobRecord) -> StoreFuture<'_, ()>;

    fn update(&self, id: JobId, update: RecordUpdate) -> StoreFuture<'_, ()>;

    fn find_by_id(&self, id: JobId) -> StoreFuture<'_, Option<JobRecord>>;

    /// All records in insertion order.
    fn find_all(&self) -> StoreFuture<'_, Vec<JobRecord>>;

    /// Drop every record (bootstrap / test cleanup).
    fn remove_all(&self) -> StoreFuture<'_, ()>;
}
