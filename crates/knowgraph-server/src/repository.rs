//! Graph repository — server-side CRUD persisted to a JSON collection file.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use knowgraph_core::{Error, GraphRecord, Result};
use parking_lot::RwLock;
use tracing::{info, warn};

/// Holds every graph in memory and rewrites the collection file on change.
pub struct GraphRepository {
    graphs_file: Option<PathBuf>,
    graphs: RwLock<Vec<GraphRecord>>,
}

impl GraphRepository {
    /// Load the collection from `graphs_file` (missing file means empty).
    pub fn open(graphs_file: &Path) -> Self {
        let graphs = load_graphs(graphs_file);
        info!("GraphRepository: {} graphs loaded", graphs.len());

        Self {
            graphs_file: Some(graphs_file.to_path_buf()),
            graphs: RwLock::new(graphs),
        }
    }

    /// Repository that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            graphs_file: None,
            graphs: RwLock::new(Vec::new()),
        }
    }

    // ---------------------------------------------------------------
    // CRUD
    // ---------------------------------------------------------------

    pub fn list(&self) -> Vec<GraphRecord> {
        self.graphs.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<GraphRecord> {
        self.graphs
            .read()
            .iter()
            .find(|g| g.id.as_deref() == Some(id))
            .cloned()
    }

    /// Create a graph under a fresh UUID.
    pub fn create(&self, record: GraphRecord) -> Result<GraphRecord> {
        record.validate()?;
        let now = Utc::now();
        let created = GraphRecord {
            id: Some(uuid::Uuid::new_v4().to_string()),
            created_at: Some(now),
            updated_at: Some(now),
            ..record
        };

        let mut graphs = self.graphs.write();
        let mut next = graphs.clone();
        next.push(created.clone());
        self.persist(&next)?;
        *graphs = next;
        Ok(created)
    }

    /// Replace the graph stored under `id`, or create one with that id.
    pub fn put(&self, id: &str, record: GraphRecord) -> Result<GraphRecord> {
        record.validate()?;
        if id.trim().is_empty() {
            return Err(Error::InvalidInput("graph id must not be blank".into()));
        }
        let now = Utc::now();

        let mut graphs = self.graphs.write();
        let mut next = graphs.clone();
        let stored = match next.iter_mut().find(|g| g.id.as_deref() == Some(id)) {
            Some(existing) => {
                let updated_at = match existing.updated_at {
                    Some(prev) if now <= prev => prev + Duration::milliseconds(1),
                    _ => now,
                };
                *existing = GraphRecord {
                    id: Some(id.to_string()),
                    created_at: existing.created_at.or(Some(now)),
                    updated_at: Some(updated_at),
                    ..record
                };
                existing.clone()
            }
            None => {
                let created = GraphRecord {
                    id: Some(id.to_string()),
                    created_at: Some(now),
                    updated_at: Some(now),
                    ..record
                };
                next.push(created.clone());
                created
            }
        };

        self.persist(&next)?;
        *graphs = next;
        Ok(stored)
    }

    /// Delete a graph. Returns true if found and deleted.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut graphs = self.graphs.write();
        let mut next = graphs.clone();
        next.retain(|g| g.id.as_deref() != Some(id));
        if next.len() == graphs.len() {
            return Ok(false);
        }

        self.persist(&next)?;
        *graphs = next;
        Ok(true)
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Write `graphs` to disk before the in-memory copy is replaced.
    fn persist(&self, graphs: &[GraphRecord]) -> Result<()> {
        let Some(path) = &self.graphs_file else {
            return Ok(());
        };
        let data = serde_json::to_string_pretty(graphs)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)
            .and_then(|_| std::fs::rename(&tmp, path))
            .map_err(|e| {
                let _ = std::fs::remove_file(&tmp);
                warn!("Failed to save graphs: {}", e);
                Error::StorageWriteFailure(format!("{}: {}", path.display(), e))
            })
    }
}

fn load_graphs(path: &Path) -> Vec<GraphRecord> {
    match std::fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
            warn!("Ignoring unreadable graph collection {}: {}", path.display(), e);
            Vec::new()
        }),
        Err(_) => Vec::new(),
    }
}
