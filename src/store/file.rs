// src/store/file.rs

//! JSON file store.
//!
//! The whole collection is one pretty-printed JSON array. Every operation is a
//! read-modify-write performed under an async mutex and written through a
//! temporary file that is renamed into place, so concurrent updates of
//! different jobs never clobber each other and a crash never leaves a
//! half-written document behind.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::{PulsarError, Result};
use crate::job::JobId;
use crate::store::{JobRecord, JobStore, RecordUpdate, StoreFuture};

#[derive(Debug)]
pub struct FileJobStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileJobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<JobRecord>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(persistence(&self.path, "reading", e)),
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents).map_err(|e| persistence(&self.path, "parsing", e))
    }

    async fn save(&self, records: &[JobRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .await
                    .map_err(|e| persistence(dir, "creating directory", e))?;
            }
        }

        let contents = serde_json::to_string_pretty(records)
            .map_err(|e| persistence(&self.path, "serializing", e))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)
            .await
            .map_err(|e| persistence(&tmp, "writing", e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| persistence(&self.path, "replacing", e))?;

        debug!(path = %self.path.display(), records = records.len(), "job store saved");
        Ok(())
    }
}

fn persistence(path: &Path, action: &str, err: impl std::fmt::Display) -> PulsarError {
    PulsarError::Persistence(format!("{action} {}: {err}", path.display()))
}

impl JobStore for FileJobStore {
    fn insert(&self, record: JobRecord) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut records = self.load().await?;
            if records.iter().any(|r| r.id == record.id) {
                return Err(PulsarError::Persistence(format!(
                    "record {} already exists",
                    record.id
                )));
            }
            records.push(record);
            self.save(&records).await
        })
    }

    fn update(&self, id: JobId, update: RecordUpdate) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut records = self.load().await?;
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| PulsarError::Persistence(format!("no record with id {id}")))?;
            record.apply(&update);
            self.save(&records).await
        })
    }

    fn find_by_id(&self, id: JobId) -> StoreFuture<'_, Option<JobRecord>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let records = self.load().await?;
            Ok(records.into_iter().find(|r| r.id == id))
        })
    }

    fn find_all(&self) -> StoreFuture<'_, Vec<JobRecord>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            self.load().await
        })
    }

    fn remove_all(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            self.save(&[]).await
        })
    }
}
