// src/store/memory.rs

use std::sync::{Mutex, MutexGuard};

use crate::errors::{PulsarError, Result};
use crate::job::JobId;
use crate::store::{JobRecord, JobStore, RecordUpdate, StoreFuture};

/// Insertion-ordered in-memory store.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: Mutex<Vec<JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Vec<JobRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert_now(&self, record: JobRecord) -> Result<()> {
        let mut records = self.records();
        if records.iter().any(|r| r.id == record.id) {
            return Err(PulsarError::Persistence(format!(
                "record {} already exists",
                record.id
            )));
        }
        records.push(record);
        Ok(())
    }

    fn update_now(&self, id: JobId, update: &RecordUpdate) -> Result<()> {
        let mut records = self.records();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PulsarError::Persistence(format!("no record with id {id}")))?;
        record.apply(update);
        Ok(())
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, record: JobRecord) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.insert_now(record) })
    }

    fn update(&self, id: JobId, update: RecordUpdate) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.update_now(id, &update) })
    }

    fn find_by_id(&self, id: JobId) -> StoreFuture<'_, Option<JobRecord>> {
        Box::pin(async move { Ok(self.records().iter().find(|r| r.id == id).cloned()) })
    }

    fn find_all(&self) -> StoreFuture<'_, Vec<JobRecord>> {
        Box::pin(async move { Ok(self.records().clone()) })
    }

    fn remove_all(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.records().clear();
            Ok(())
        })
    }
}
