//! Replay protection store
//!
//! Durable, append-only set of source transaction hashes that have already
//! been relayed. Backed by a single JSON document that is rewritten
//! atomically (temp file, fsync, rename) on every new record.
//!
//! The document layout is compatible with the legacy
//! `processed_events_db.json` format (`{"processed_hashes": [...]}`); the
//! optional `partition` field pins a file to one destination chain so that
//! sharded relayers can never share replay state by accident.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::types::TxHash;

/// On-disk representation
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    partition: Option<String>,
    #[serde(default)]
    processed_hashes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// File-backed set of relayed source transaction hashes
#[derive(Debug)]
pub struct ReplayStore {
    path: PathBuf,
    partition: String,
    /// Insertion order, as persisted
    hashes: Vec<TxHash>,
    index: HashSet<TxHash>,
}

impl ReplayStore {
    /// Open the store at `path` for `partition`.
    ///
    /// A missing file yields an empty store. Any other read or parse failure
    /// is returned as an error: starting with ambiguous replay state could
    /// cause duplicate mints.
    pub fn open(path: impl Into<PathBuf>, partition: impl Into<String>) -> Result<Self, StoreError> {
        let path = path.into();
        let partition = partition.into();

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), %partition, "Replay store not found, starting empty");
                return Ok(Self {
                    path,
                    partition,
                    hashes: Vec::new(),
                    index: HashSet::new(),
                });
            }
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        let document: StoreDocument =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if let Some(found) = document.partition {
            if found != partition {
                return Err(StoreError::PartitionMismatch {
                    path,
                    expected: partition,
                    found,
                });
            }
        }

        let mut hashes = Vec::with_capacity(document.processed_hashes.len());
        let mut index = HashSet::with_capacity(document.processed_hashes.len());
        for raw in &document.processed_hashes {
            let hash = TxHash::from_str(raw).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                reason: format!("invalid hash {:?}: {}", raw, e),
            })?;
            if index.insert(hash) {
                hashes.push(hash);
            }
        }

        info!(
            path = %path.display(),
            %partition,
            entries = hashes.len(),
            "Replay store loaded"
        );

        Ok(Self {
            path,
            partition,
            hashes,
            index,
        })
    }

    /// Whether `tx_hash` has already been relayed
    pub fn contains(&self, tx_hash: &TxHash) -> bool {
        self.index.contains(tx_hash)
    }

    /// Durably record `tx_hash`. Recording a known hash is a no-op.
    ///
    /// In-memory state only changes once the new document is on disk.
    pub fn record(&mut self, tx_hash: TxHash) -> Result<(), StoreError> {
        if self.contains(&tx_hash) {
            debug!(source_tx_hash = %tx_hash, "Hash already recorded");
            return Ok(());
        }

        let mut hashes = self.hashes.clone();
        hashes.push(tx_hash);
        self.persist(&hashes)?;

        self.hashes = hashes;
        self.index.insert(tx_hash);
        info!(source_tx_hash = %tx_hash, entries = self.hashes.len(), "Recorded relayed transaction");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    fn persist(&self, hashes: &[TxHash]) -> Result<(), StoreError> {
        let document = StoreDocument {
            partition: Some(self.partition.clone()),
            processed_hashes: hashes.iter().map(|h| format!("{:#x}", h)).collect(),
            updated_at: Some(Utc::now()),
        };
        let body = serde_json::to_vec_pretty(&document)?;

        let tmp_path = temp_path(&self.path);
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let mut file = File::create(&tmp_path).map_err(write_err)?;
        file.write_all(&body).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(write_err)?;

        // Persist the rename itself; not every platform can open a directory
        #[cfg(unix)]
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }
}

/// Sibling temp file used for atomic replacement
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
