//! Persistent update records, one per application id.
//!
//! The orchestrator is the only writer. Every [`StateStore::put`] on a
//! [`JsonStateStore`] rewrites the whole file through a temporary sibling and
//! a rename, so an interrupted run never leaves a half-written file behind.
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What is remembered about an application after a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// When the fetch completed.
    pub last_fetch: DateTime<Utc>,
    /// Release tag, commit/changeset id, or payload hash.
    pub remote_id: String,
    /// SHA-256 of the last downloaded payload, when one was downloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// State persistence failures.
#[derive(Error, Debug)]
pub enum StateError {
    /// The state file exists but could not be read.
    #[error("cannot read state file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: io::Error,
    },

    /// The state file is not valid JSON of the expected shape.
    #[error("corrupt state file {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The state file could not be written.
    #[error("cannot write state file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: io::Error,
    },
}

/// Read/write access to update records.
pub trait StateStore {
    /// The record for `id`, if one was ever written.
    fn get(&self, id: &str) -> Option<&UpdateRecord>;

    /// Insert or replace the record for `id` and persist it.
    ///
    /// # Errors
    ///
    /// Returns a [`StateError`] when the record cannot be persisted; the
    /// in-memory view is left unchanged in that case.
    fn put(&mut self, id: &str, record: UpdateRecord) -> Result<(), StateError>;
}

/// In-memory store, used by tests and dry evaluations.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    records: BTreeMap<String, UpdateRecord>,
}

impl MemoryStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, id: &str) -> Option<&UpdateRecord> {
        self.records.get(id)
    }

    fn put(&mut self, id: &str, record: UpdateRecord) -> Result<(), StateError> {
        self.records.insert(id.to_string(), record);
        Ok(())
    }
}

/// JSON file keyed by application id. Created on first write.
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    records: BTreeMap<String, UpdateRecord>,
}

impl JsonStateStore {
    /// Open the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns a [`StateError`] if the file exists but cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self, StateError> {
        let records = match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StateError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(StateError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, records: &BTreeMap<String, UpdateRecord>) -> Result<(), StateError> {
        let write_err = |source: io::Error| StateError::Write {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_vec_pretty(records)
            .map_err(|e| write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            write_err(e)
        })
    }
}

impl StateStore for JsonStateStore {
    fn get(&self, id: &str) -> Option<&UpdateRecord> {
        self.records.get(id)
    }

    fn put(&mut self, id: &str, record: UpdateRecord) -> Result<(), StateError> {
        let mut next = self.records.clone();
        next.insert(id.to_string(), record);
        self.flush(&next)?;
        self.records = next;
        Ok(())
    }
}
