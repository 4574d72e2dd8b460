//! Persisted graph records — the unit every store reads and writes.
//!
//! Timestamps are accepted under either `createdAt`/`updatedAt` or
//! `created_at`/`updated_at` and always serialized in camelCase, so records
//! coming back from any backend share one canonical shape.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A named, persisted collection of nodes and edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawGraphRecord")]
pub struct GraphRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Wire shape accepted on input. Both timestamp spellings may be present;
/// camelCase wins.
#[derive(Deserialize)]
struct RawGraphRecord {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    nodes: Vec<NodeRecord>,
    #[serde(default)]
    edges: Vec<EdgeRecord>,
    #[serde(default, rename = "createdAt")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "created_at")]
    created_at_snake: Option<DateTime<Utc>>,
    #[serde(default, rename = "updatedAt")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "updated_at")]
    updated_at_snake: Option<DateTime<Utc>>,
}

impl From<RawGraphRecord> for GraphRecord {
    fn from(raw: RawGraphRecord) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            description: raw.description,
            nodes: raw.nodes,
            edges: raw.edges,
            created_at: raw.created_at.or(raw.created_at_snake),
            updated_at: raw.updated_at.or(raw.updated_at_snake),
        }
    }
}

/// A single node in a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub label: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Scalar properties keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// 2-D canvas coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A connection between two nodes of the same graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dashed: bool,
    #[serde(default = "default_directed")]
    pub directed: bool,
}

fn default_directed() -> bool {
    true
}

impl NodeRecord {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type: None,
            color: None,
            properties: BTreeMap::new(),
            position: None,
        }
    }
}

impl EdgeRecord {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            label: None,
            color: None,
            width: None,
            dashed: false,
            directed: true,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl GraphRecord {
    /// A new, never-persisted record.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_node(mut self, node: NodeRecord) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: EdgeRecord) -> Self {
        self.edges.push(edge);
        self
    }

    /// Whether this record has been assigned an id by a store.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Reject payloads no store should accept.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("graph name must not be empty".into()));
        }
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(Error::InvalidInput("graph id must not be blank".into()));
            }
        }
        Ok(())
    }

    /// Edges whose source or target names no node in this graph.
    pub fn dangling_edges(&self) -> Vec<&EdgeRecord> {
        let node_ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.edges
            .iter()
            .filter(|e| !node_ids.contains(e.source.as_str()) || !node_ids.contains(e.target.as_str()))
            .collect()
    }

    /// Compare graph content, ignoring store-assigned identity and timestamps.
    pub fn same_content(&self, other: &GraphRecord) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.nodes == other.nodes
            && self.edges == other.edges
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            id: self.id.clone().unwrap_or_default(),
            name: self.name.clone(),
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            updated_at: self.updated_at,
        }
    }
}

/// Compact listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "nodeCount")]
    pub node_count: usize,
    #[serde(rename = "edgeCount")]
    pub edge_count: usize,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
