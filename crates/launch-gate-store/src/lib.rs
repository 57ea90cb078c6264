#![warn(missing_docs)]
//! # launch-gate-store
//!
//! ## Purpose
//! Persists the one-time handshake completion across process restarts.
//!
//! ## Responsibilities
//! - Define the key/value seam ([`KeyValueStore`]) the platform provides.
//! - Ship an in-memory store and a JSON-file store.
//! - Map the two persisted keys onto [`LaunchCompletionRecord`] and write it
//!   at most once ([`CompletionStore`]).
//!
//! ## Data flow
//! Orchestrator -> [`CompletionStore::load`] on every launch ->
//! [`CompletionStore::record_completion`] after the first token exchange.
//!
//! ## Ownership and lifetimes
//! Stores are shared as `Arc<dyn KeyValueStore>`; each keeps its own lock so
//! reads never observe a half-written record.
//!
//! ## Error model
//! I/O, decode, and type mismatches surface as [`StoreError`]. The launch
//! flow logs them and degrades instead of failing.
//!
//! ## Security and privacy notes
//! The stored destination embeds device tokens; the file store writes it with
//! the process's default permissions and never logs it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use launch_gate_core::{Destination, LaunchCompletionRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key of the "handshake already completed" flag.
pub const HAS_LAUNCHED_BEFORE_KEY: &str = "hasLaunchedBefore";

/// Key of the destination computed by the completed handshake.
pub const RECEIVED_DESTINATION_KEY: &str = "receivedDestination";

/// Value stored under one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    /// Boolean flag.
    Bool(bool),
    /// String value.
    Text(String),
}

/// Persistent key/value storage provided by the platform.
pub trait KeyValueStore: Send + Sync {
    /// Reads one key.
    fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError>;

    /// Writes one key.
    fn set(&self, key: &str, value: StoredValue) -> Result<(), StoreError>;
}

/// Process-local store, used by tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, StoredValue>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding an already completed record.
    pub fn with_record(record: &LaunchCompletionRecord) -> Self {
        let store = Self::new();
        if let Ok(mut values) = store.values.lock() {
            values.extend(record_entries(record));
        }
        store
    }

    /// Number of `set` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: StoredValue) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Store persisted as one JSON object on disk.
///
/// # Notes
/// Every write rewrites the whole file through a sibling temp file and a
/// rename, so a crash never leaves a truncated document behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, StoredValue>>,
}

impl JsonFileStore {
    /// Opens a store file, starting empty when it does not exist yet.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] when the file cannot be read and
    /// [`StoreError::Decode`] when it is not a JSON object of stored values.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(StoreError::Decode)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        tracing::debug!(
            stage = "store",
            action = "open",
            path = %path.display(),
            keys = values.len(),
            "store file opened"
        );
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, StoredValue>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let encoded = serde_json::to_vec_pretty(values).map_err(StoreError::Decode)?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, encoded).map_err(|source| StoreError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: StoredValue) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        let previous = values.insert(key.to_string(), value);
        if let Err(error) = self.flush(&values) {
            match previous {
                Some(previous) => values.insert(key.to_string(), previous),
                None => values.remove(key),
            };
            return Err(error);
        }
        Ok(())
    }
}

/// Outcome of [`CompletionStore::record_completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The record was written now.
    Recorded,
    /// A completed record already existed; nothing was written.
    AlreadyRecorded,
}

/// Typed view of the completion record over a key/value store.
#[derive(Clone)]
pub struct CompletionStore {
    inner: Arc<dyn KeyValueStore>,
}

impl CompletionStore {
    /// Wraps a key/value store.
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    /// Reads the persisted record. Missing keys read as a fresh install.
    ///
    /// A destination of the wrong kind reads as absent, so a corrupt
    /// destination never hides a recorded completion.
    ///
    /// # Errors
    /// Propagates store failures and returns [`StoreError::TypeMismatch`]
    /// when the completion flag holds the wrong kind of value.
    pub fn load(&self) -> Result<LaunchCompletionRecord, StoreError> {
        let has_launched_before = self.launched_flag()?;

        let stored_destination = match self.inner.get(RECEIVED_DESTINATION_KEY)? {
            None => None,
            Some(StoredValue::Text(raw)) => Some(raw),
            Some(StoredValue::Bool(_)) => {
                tracing::warn!(
                    stage = "store",
                    action = "destination_type_mismatch",
                    key = RECEIVED_DESTINATION_KEY,
                    "stored destination is not a string; treating as absent"
                );
                None
            }
        };

        Ok(LaunchCompletionRecord {
            has_launched_before,
            stored_destination,
        })
    }

    /// Returns `true` once the handshake has completed on this install.
    ///
    /// Only the completion flag is consulted. Unreadable state counts as a
    /// fresh install.
    pub fn has_launched_before(&self) -> bool {
        match self.launched_flag() {
            Ok(flag) => flag,
            Err(error) => {
                tracing::warn!(stage = "store", action = "load_failed", %error, "treating as first launch");
                false
            }
        }
    }

    fn launched_flag(&self) -> Result<bool, StoreError> {
        match self.inner.get(HAS_LAUNCHED_BEFORE_KEY)? {
            None => Ok(false),
            Some(StoredValue::Bool(flag)) => Ok(flag),
            Some(StoredValue::Text(_)) => Err(StoreError::TypeMismatch {
                key: HAS_LAUNCHED_BEFORE_KEY,
                expected: "bool",
            }),
        }
    }

    /// Persists the completed handshake exactly once.
    ///
    /// The destination is written before the flag, so a flag never points at
    /// a missing destination.
    ///
    /// # Errors
    /// Propagates store read/write failures.
    pub fn record_completion(&self, destination: &Destination) -> Result<RecordOutcome, StoreError> {
        if self.launched_flag()? {
            return Ok(RecordOutcome::AlreadyRecorded);
        }

        for (key, value) in record_entries(&LaunchCompletionRecord::completed(destination)) {
            self.inner.set(&key, value)?;
        }
        Ok(RecordOutcome::Recorded)
    }
}

fn record_entries(record: &LaunchCompletionRecord) -> Vec<(String, StoredValue)> {
    let mut entries = Vec::with_capacity(2);
    if let Some(destination) = &record.stored_destination {
        entries.push((
            RECEIVED_DESTINATION_KEY.to_string(),
            StoredValue::Text(destination.clone()),
        ));
    }
    entries.push((
        HAS_LAUNCHED_BEFORE_KEY.to_string(),
        StoredValue::Bool(record.has_launched_before),
    ));
    entries
}

/// Errors produced by persistent stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system failure.
    #[error("store i/o failure at {path}: {source}")]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Store document is not valid JSON of stored values.
    #[error("store decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// A key holds a value of the wrong kind.
    #[error("store key {key} does not hold a {expected}")]
    TypeMismatch {
        /// Offending key.
        key: &'static str,
        /// Expected value kind.
        expected: &'static str,
    },
    /// A store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}
