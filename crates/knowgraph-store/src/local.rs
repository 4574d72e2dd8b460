//! Local graph store — the whole collection lives under one key.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use knowgraph_core::{Error, GraphRecord, Result};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::kv::{FileKeyValueStore, KeyValueStore};

/// Key holding the JSON array of every locally saved graph.
pub const GRAPHS_KEY: &str = "knowgraph.graphs";

/// Prefix of ids assigned by the local store.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Graph CRUD over a `KeyValueStore`.
pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
    /// Serializes read-modify-write cycles on the collection.
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    /// Open a file-backed store rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let store = Self::new(Arc::new(FileKeyValueStore::new(dir)?));
        info!(
            "LocalStore opened at {}: {} graphs",
            dir.display(),
            store.load_all().len()
        );
        Ok(store)
    }

    // ---------------------------------------------------------------
    // CRUD
    // ---------------------------------------------------------------

    pub fn list(&self) -> Result<Vec<GraphRecord>> {
        Ok(self.load_all())
    }

    pub fn get(&self, id: &str) -> Result<GraphRecord> {
        self.load_all()
            .into_iter()
            .find(|g| g.id.as_deref() == Some(id))
            .ok_or_else(|| Error::NotFound(format!("graph {}", id)))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.load_all().iter().any(|g| g.id.as_deref() == Some(id))
    }

    /// Create (no id) or replace (id set) a graph.
    ///
    /// A record whose id is not in the collection is inserted under that id.
    pub fn save(&self, record: &GraphRecord) -> Result<GraphRecord> {
        record.validate()?;

        let _guard = self.write_lock.lock();
        let mut graphs = self.try_load_all()?;
        let now = Utc::now();

        let saved = match record.id.as_deref() {
            Some(id) => match graphs.iter_mut().find(|g| g.id.as_deref() == Some(id)) {
                Some(existing) => {
                    let updated = GraphRecord {
                        id: existing.id.clone(),
                        created_at: existing.created_at.or(Some(now)),
                        updated_at: Some(next_update(existing.updated_at, now)),
                        ..record.clone()
                    };
                    *existing = updated.clone();
                    debug!("LocalStore: updated graph {}", id);
                    updated
                }
                None => {
                    let created = stamp_new(record, id.to_string(), now);
                    graphs.push(created.clone());
                    debug!("LocalStore: created graph {} with caller id", id);
                    created
                }
            },
            None => {
                let id = next_local_id(&graphs, now);
                let created = stamp_new(record, id, now);
                graphs.push(created.clone());
                debug!("LocalStore: created graph {:?}", created.id);
                created
            }
        };

        self.store_all(&graphs)?;
        Ok(saved)
    }

    /// Delete a graph. Returns true if found and deleted.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut graphs = self.try_load_all()?;
        let len_before = graphs.len();
        graphs.retain(|g| g.id.as_deref() != Some(id));
        let deleted = graphs.len() < len_before;

        if deleted && graphs.is_empty() {
            self.kv.remove(GRAPHS_KEY)?;
        } else if deleted {
            self.store_all(&graphs)?;
        }
        Ok(deleted)
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Lenient read for listings: an unreadable collection reads as empty.
    fn load_all(&self) -> Vec<GraphRecord> {
        self.try_load_all().unwrap_or_else(|e| {
            warn!("LocalStore: {}, treating as empty", e);
            Vec::new()
        })
    }

    /// Strict read for writers. Rewriting a collection that could not be
    /// parsed would drop every graph in it.
    fn try_load_all(&self) -> Result<Vec<GraphRecord>> {
        let raw = match self.kv.get(GRAPHS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::StorageWriteFailure(format!(
                    "collection unreadable: {}",
                    e
                )))
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| Error::StorageWriteFailure(format!("collection is corrupt: {}", e)))
    }

    fn store_all(&self, graphs: &[GraphRecord]) -> Result<()> {
        let data = serde_json::to_string(graphs)
            .map_err(|e| Error::StorageWriteFailure(format!("serialize graphs: {}", e)))?;
        self.kv.set(GRAPHS_KEY, &data).map_err(|e| match e {
            Error::StorageWriteFailure(_) => e,
            other => Error::StorageWriteFailure(other.to_string()),
        })
    }
}

fn stamp_new(record: &GraphRecord, id: String, now: DateTime<Utc>) -> GraphRecord {
    GraphRecord {
        id: Some(id),
        created_at: Some(now),
        updated_at: Some(now),
        ..record.clone()
    }
}

/// `updatedAt` must move strictly forward even if the clock has not.
fn next_update(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if now <= prev => prev + Duration::milliseconds(1),
        _ => now,
    }
}

fn next_local_id(graphs: &[GraphRecord], now: DateTime<Utc>) -> String {
    let mut millis = now.timestamp_millis();
    loop {
        let candidate = format!("{}{}", LOCAL_ID_PREFIX, millis);
        if !graphs.iter().any(|g| g.id.as_deref() == Some(candidate.as_str())) {
            return candidate;
        }
        millis += 1;
    }
}

/// Whether an id was minted by a local store.
pub fn is_local_id(id: &str) -> bool {
    id.strip_prefix(LOCAL_ID_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}
