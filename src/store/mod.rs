//! File-backed storage of saved report definitions.
//!
//! All reports live in one JSON array. Every operation reads the file and
//! write operations rewrite it whole; a missing file is an empty store.
//!
//! Writes from clones of one [`ReportStore`] are serialized by a shared
//! lock, and the file is replaced by rename so readers never see a
//! partially written array.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::report::ReportRequest;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Report not found: {0}")]
    NotFound(String),

    #[error("Failed to access report store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A report definition as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedReport {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub config: ReportRequest,
    /// RFC 3339, UTC
    pub created_at: String,
    pub updated_at: String,
}

/// JSON-file report store. Clones share the same write lock.
#[derive(Debug, Clone)]
pub struct ReportStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl ReportStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All saved reports, oldest first.
    pub fn list(&self) -> StoreResult<Vec<SavedReport>> {
        let _guard = self.acquire();
        self.read()
    }

    pub fn get(&self, id: &str) -> StoreResult<SavedReport> {
        self.list()?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Poisoning is ignored; the lock guards no data.
    fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> StoreResult<Vec<SavedReport>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Save a new report under a fresh id.
    pub fn save(&self, config: ReportRequest) -> StoreResult<SavedReport> {
        let _guard = self.acquire();
        let mut reports = self.read()?;
        let now = timestamp();
        let report = SavedReport {
            id: Uuid::new_v4().to_string(),
            name: config.name.clone(),
            description: config.description.clone(),
            config,
            created_at: now.clone(),
            updated_at: now,
        };
        reports.push(report.clone());
        self.write(&reports)?;
        info!(id = %report.id, name = %report.name, "saved report");
        Ok(report)
    }

    /// Replace the configuration of an existing report.
    pub fn update(&self, id: &str, config: ReportRequest) -> StoreResult<SavedReport> {
        let _guard = self.acquire();
        let mut reports = self.read()?;
        let report = reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        report.name = config.name.clone();
        report.description = config.description.clone();
        report.config = config;
        report.updated_at = timestamp();
        let updated = report.clone();

        self.write(&reports)?;
        debug!(id, "updated report");
        Ok(updated)
    }

    /// Remove a report. Removing an unknown id is not an error.
    pub fn delete(&self, id: &str) -> StoreResult<bool> {
        let _guard = self.acquire();
        let mut reports = self.read()?;
        let before = reports.len();
        reports.retain(|r| r.id != id);
        let removed = reports.len() != before;
        if removed {
            self.write(&reports)?;
            debug!(id, "deleted report");
        }
        Ok(removed)
    }

    /// Replace the file with `reports`. Callers hold the lock.
    fn write(&self, reports: &[SavedReport]) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(reports)?;
        let staging = self.staging_path();
        fs::write(&staging, content)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    /// Sibling of the store file, so the rename stays on one filesystem.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
