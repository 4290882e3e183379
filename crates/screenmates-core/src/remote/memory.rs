use std::collections::{BTreeMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Query, Record, RecordStore};
use crate::error::RecordStoreError;

type RecordKey = (String, String);

/// Queued failures returned by the next matching calls, oldest first.
#[derive(Debug, Default)]
struct FaultPlan {
    fetch: VecDeque<RecordStoreError>,
    query: VecDeque<RecordStoreError>,
    save: VecDeque<RecordStoreError>,
    delete: VecDeque<RecordStoreError>,
}

/// Call counters, mostly for assertions.
#[derive(Debug, Default)]
pub struct CallStats {
    pub fetches: AtomicUsize,
    pub queries: AtomicUsize,
    pub saves: AtomicUsize,
    pub deletes: AtomicUsize,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    next_change_tag: u64,
    records: Vec<Record>,
}

/// Server-side contents: the records plus the next change tag to hand out.
#[derive(Debug)]
struct Backend {
    records: BTreeMap<RecordKey, Record>,
    next_change_tag: u64,
}

impl Backend {
    fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_change_tag: 1,
        }
    }

    fn next_tag(&mut self) -> u64 {
        let tag = self.next_change_tag;
        self.next_change_tag += 1;
        tag
    }

    fn load(path: &Path) -> Result<Self, RecordStoreError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(RecordStoreError::Fatal(e.to_string())),
        };
        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| RecordStoreError::Fatal(format!("corrupt backend snapshot: {}", e)))?;

        let mut backend = Self::new();
        backend.next_change_tag = snapshot.next_change_tag.max(1);
        for record in snapshot.records {
            backend
                .records
                .insert((record.record_type.clone(), record.key.clone()), record);
        }
        Ok(backend)
    }

    /// Write to a uniquely named temp file, then rename over the snapshot.
    fn write(&self, path: &Path) -> Result<(), RecordStoreError> {
        let snapshot = Snapshot {
            next_change_tag: self.next_change_tag,
            records: self.records.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| RecordStoreError::Fatal(e.to_string()))?;

        let temp = sibling(path, &format!(".{}.tmp", Uuid::new_v4()));
        let result = std::fs::write(&temp, &bytes).and_then(|()| std::fs::rename(&temp, path));
        if let Err(e) = result {
            let _ = std::fs::remove_file(&temp);
            return Err(RecordStoreError::Fatal(format!(
                "failed to write backend snapshot {}: {}",
                path.display(),
                e
            )));
        }
        Ok(())
    }
}

/// `path` with `suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Take the exclusive lock guarding the snapshot at `path`. The lock is
/// released when the returned handle is dropped.
fn lock_snapshot(path: &Path) -> Result<File, RecordStoreError> {
    let lock_path = sibling(path, ".lock");
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| {
            RecordStoreError::Fatal(format!("failed to open {}: {}", lock_path.display(), e))
        })?;
    file.lock_exclusive().map_err(|e| {
        RecordStoreError::Fatal(format!("failed to lock {}: {}", lock_path.display(), e))
    })?;
    Ok(file)
}

/// In-memory record store with server-side change tags.
///
/// Mirrors the backend contract closely enough to exercise the sync engine:
/// saves are rejected with `Conflict` when the caller's change tag is stale,
/// and a save of a never-saved record (`change_tag == None`) onto an existing
/// key conflicts as well.
///
/// When opened on a path the JSON snapshot is the source of truth. Every call
/// takes an exclusive lock on `<path>.lock`, reloads the snapshot, and writes
/// it back before unlocking if the call changed anything, so several
/// processes can share one file as a local development backend.
#[derive(Debug)]
pub struct MemoryRecordStore {
    backend: Mutex<Backend>,
    faults: Mutex<FaultPlan>,
    stats: CallStats,
    snapshot_path: Option<PathBuf>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            backend: Mutex::new(Backend::new()),
            faults: Mutex::new(FaultPlan::default()),
            stats: CallStats::default(),
            snapshot_path: None,
        }
    }

    /// Open a store persisted at `path`. A corrupt snapshot fails here rather
    /// than on first use.
    pub fn open(path: &Path) -> Result<Self, RecordStoreError> {
        let store = Self {
            snapshot_path: Some(path.to_path_buf()),
            ..Self::new()
        };
        store.with_backend(|_| ((), false))?;
        Ok(store)
    }

    pub fn stats(&self) -> &CallStats {
        &self.stats
    }

    pub fn fail_next_fetch(&self, err: RecordStoreError) {
        self.faults.lock().fetch.push_back(err);
    }

    pub fn fail_next_query(&self, err: RecordStoreError) {
        self.faults.lock().query.push_back(err);
    }

    pub fn fail_next_save(&self, err: RecordStoreError) {
        self.faults.lock().save.push_back(err);
    }

    pub fn fail_next_delete(&self, err: RecordStoreError) {
        self.faults.lock().delete.push_back(err);
    }

    /// Insert a record bypassing concurrency checks, as a legacy client or
    /// another writer would have left it. Returns the stored copy.
    pub fn insert_raw(&self, record: Record) -> Record {
        let fallback = record.clone();
        let result = self.with_backend(move |backend| {
            let mut record = record;
            record.change_tag = Some(backend.next_tag());
            backend.records.insert(
                (record.record_type.clone(), record.key.clone()),
                record.clone(),
            );
            (record, true)
        });
        result.unwrap_or_else(|e| {
            tracing::warn!("memory record store: raw insert of {} failed: {}", fallback.key, e);
            fallback
        })
    }

    /// All records of one type, ordered by key.
    pub fn records_of_type(&self, record_type: &str) -> Vec<Record> {
        let result = self.with_backend(|backend| {
            let matched = backend
                .records
                .values()
                .filter(|r| r.record_type == record_type)
                .cloned()
                .collect();
            (matched, false)
        });
        result.unwrap_or_else(|e| {
            tracing::warn!("memory record store: listing {} failed: {}", record_type, e);
            Vec::new()
        })
    }

    /// Run `op` against the current contents. `op` reports whether it
    /// changed anything. With a snapshot path the whole reload, `op` and
    /// write-back happen under the file lock.
    fn with_backend<R>(
        &self,
        op: impl FnOnce(&mut Backend) -> (R, bool),
    ) -> Result<R, RecordStoreError> {
        let mut backend = self.backend.lock();
        let Some(path) = &self.snapshot_path else {
            return Ok(op(&mut backend).0);
        };

        let _lock = lock_snapshot(path)?;
        *backend = Backend::load(path)?;
        let (result, changed) = op(&mut backend);
        if changed {
            backend.write(path)?;
        }
        Ok(result)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch(&self, record_type: &str, key: &str) -> Result<Record, RecordStoreError> {
        self.stats.fetches.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = self.faults.lock().fetch.pop_front() {
            return Err(err);
        }

        let id = (record_type.to_string(), key.to_string());
        self.with_backend(|backend| (backend.records.get(&id).cloned(), false))?
            .ok_or_else(|| RecordStoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn query(&self, query: &Query) -> Result<Vec<Record>, RecordStoreError> {
        self.stats.queries.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = self.faults.lock().query.pop_front() {
            return Err(err);
        }

        let mut matched: Vec<Record> = self.with_backend(|backend| {
            let matched = backend
                .records
                .values()
                .filter(|r| r.record_type == query.record_type && query.predicate.matches(r))
                .cloned()
                .collect();
            (matched, false)
        })?;

        matched.sort_by(|a, b| query.compare(a, b));
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn save(&self, record: Record) -> Result<Record, RecordStoreError> {
        self.stats.saves.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = self.faults.lock().save.pop_front() {
            return Err(err);
        }

        self.with_backend(move |backend| {
            let mut record = record;
            let id = (record.record_type.clone(), record.key.clone());
            let server_tag = backend.records.get(&id).and_then(|r| r.change_tag);
            if server_tag != record.change_tag {
                return (Err(RecordStoreError::Conflict { retry_after: None }), false);
            }

            record.change_tag = Some(backend.next_tag());
            backend.records.insert(id, record.clone());
            (Ok(record), true)
        })?
    }

    async fn delete(&self, record_type: &str, key: &str) -> Result<(), RecordStoreError> {
        self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = self.faults.lock().delete.pop_front() {
            return Err(err);
        }

        let id = (record_type.to_string(), key.to_string());
        let removed = self.with_backend(|backend| {
            let removed = backend.records.remove(&id).is_some();
            (removed, removed)
        })?;

        if removed {
            Ok(())
        } else {
            Err(RecordStoreError::NotFound {
                key: key.to_string(),
            })
        }
    }
}
