use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::warn;

use pulsar::errors::PulsarError;
use pulsar::job::JobId;
use pulsar::store::{JobRecord, JobStore, MemoryJobStore, RecordUpdate, StoreFuture};

/// A `MemoryJobStore` whose inserts and/or updates can be made to fail.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryJobStore,
    fail_inserts: AtomicBool,
    fail_updates: AtomicBool,
    update_attempts: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Number of `update` calls so far, failed or not.
    pub fn update_attempts(&self) -> usize {
        self.update_attempts.load(Ordering::SeqCst)
    }

    fn injected(op: &str, id: JobId) -> PulsarError {
        warn!(job = %id, op, "[failing store] injected failure");
        PulsarError::Persistence(format!("{op} {id}: injected failure"))
    }
}

impl JobStore for FailingStore {
    fn insert(&self, record: JobRecord) -> StoreFuture<'_, ()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            let err = Self::injected("insert", record.id);
            return Box::pin(async move { Err::<(), _>(err) });
        }
        self.inner.insert(record)
    }

    fn update(&self, id: JobId, update: RecordUpdate) -> StoreFuture<'_, ()> {
        self.update_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            let err = Self::injected("update", id);
            return Box::pin(async move { Err::<(), _>(err) });
        }
        self.inner.update(id, update)
    }

    fn find_by_id(&self, id: JobId) -> StoreFuture<'_, Option<JobRecord>> {
        self.inner.find_by_id(id)
    }

    fn find_all(&self) -> StoreFuture<'_, Vec<JobRecord>> {
        self.inner.find_all()
    }

    fn remove_all(&self) -> StoreFuture<'_, ()> {
        self.inner.remove_all()
    }
}
