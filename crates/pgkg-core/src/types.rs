//! Core domain types for the pgkg knowledge graph.
//!
//! A [`Record`] becomes one hypertable row and one graph vertex; a
//! [`Triple`] becomes one directed edge between two existing vertices.
//! [`GraphView`] is the read-only projection handed to the visualizer.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224};
use uuid::Uuid;

// ── Identifiers ───────────────────────────────────────────────────

/// Caller-assigned identifier of a record (and of its vertex).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh identifier: SHA-224 hex digest of the current UTC time and a v4 UUID.
    pub fn generate() -> Self {
        let seed = format!("{}|{}", Utc::now(), Uuid::new_v4());
        Self(sha224_hex(&seed))
    }

    /// Stable identifier for an entity mentioned by a document.
    ///
    /// The same entity name asserted by the same document always maps to
    /// the same vertex.
    pub fn derive(entity: &str, document: &RecordId) -> Self {
        Self(sha224_hex(&format!("{entity}{}", document.0)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

fn sha224_hex(input: &str) -> String {
    hex::encode(Sha224::digest(input.as_bytes()))
}

// ── Records ───────────────────────────────────────────────────────

/// A typed, titled payload persisted as a row and a vertex.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Type tag; doubles as the vertex label.
    #[serde(rename = "type")]
    pub record_type: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Free-form structured payload, stored as JSONB.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub id: RecordId,
}

impl Record {
    /// A record stamped now with a generated identifier.
    pub fn new(record_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            title: title.into(),
            summary: None,
            data: serde_json::Map::new(),
            embedding: None,
            time: Utc::now(),
            id: RecordId::generate(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = RecordId::new(id);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Map<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }
}

// ── Triples ───────────────────────────────────────────────────────

/// Edge label used when an extracted relation is blank.
pub const DEFAULT_RELATION: &str = "LINKS_TO";

/// Vertex label for entities extracted from documents.
pub const ENTITY_LABEL: &str = "Entity";

/// A directed `subject -[relation]-> object` fact between two vertices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Triple {
    pub subject: RecordId,
    pub relation: String,
    pub object: RecordId,
    /// The record (e.g. a document) that asserted this fact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<RecordId>,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: RecordId::new(subject),
            relation: relation.into(),
            object: RecordId::new(object),
            provenance: None,
        }
    }

    pub fn with_provenance(mut self, record: impl Into<String>) -> Self {
        self.provenance = Some(RecordId::new(record));
        self
    }
}

// ── Graph View ────────────────────────────────────────────────────

/// A vertex as read back from the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl GraphNode {
    /// Display name: the `entity` property when present, else the id.
    pub fn display_name(&self) -> &str {
        self.properties
            .get("entity")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.id)
    }
}

/// An edge as read back from the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relation: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl GraphEdge {
    /// Display label: the `label` property when present, else the relation.
    pub fn display_label(&self) -> &str {
        self.properties
            .get("label")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.relation)
    }
}

/// Derived, read-only projection of one graph. Never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphView {
    pub graph: String,
    pub nodes: BTreeMap<String, GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphView {
    pub fn empty(graph: impl Into<String>) -> Self {
        Self {
            graph: graph.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
