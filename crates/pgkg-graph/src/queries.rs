//! Read operations for the knowledge graph.

use std::collections::HashMap;

use tokio_postgres::{Client, SimpleQueryMessage};

use pgkg_core::validate::is_label;
use pgkg_core::{GraphEdge, GraphNode, GraphView, KgError, RecordId, Result, ValidationError};

use crate::client::DatabaseHandler;
use crate::cypher::{self, AgEdge, AgVertex};
use crate::mutations::count;

impl DatabaseHandler {
    // ── Lookups ──────────────────────────────────────────────────

    /// Whether a vertex with this identifier exists in the configured graph.
    pub async fn vertex_exists(&self, id: &RecordId) -> Result<bool> {
        const OP: &str = "vertex_exists";
        let open = self.open(OP)?;
        let sql = cypher::count_vertices_by_id(&self.config.schema_name, id.as_str());
        self.trace_statement(&sql);
        Ok(count(&open.client, &sql, &[], OP).await? > 0)
    }

    /// Whether AGE knows a graph by this name.
    pub async fn graph_exists(&self, graph: &str) -> Result<bool> {
        const OP: &str = "graph_exists";
        let open = self.open(OP)?;
        let n = count(
            &open.client,
            "SELECT count(*) FROM ag_catalog.ag_graph WHERE name = $1",
            &[&graph],
            OP,
        )
        .await?;
        Ok(n > 0)
    }

    // ── Whole-graph reads ────────────────────────────────────────

    /// Every vertex and edge of `graph`. A missing graph reads as empty.
    pub async fn graph_data(&self, graph: &str) -> Result<GraphView> {
        const OP: &str = "graph_data";
        let open = self.open(OP)?;
        if !is_label(graph) {
            return Err(
                ValidationError::new("graph", format!("{graph:?} is not a valid graph name"))
                    .into(),
            );
        }
        if !self.graph_exists(graph).await? {
            tracing::debug!(graph, "Graph does not exist");
            return Ok(GraphView::empty(graph));
        }

        let node_sql = cypher::call(graph, "MATCH (n) RETURN n", &["n"]);
        let edge_sql = cypher::call(graph, "MATCH ()-[r]->() RETURN r", &["r"]);
        self.trace_statement(&node_sql);
        self.trace_statement(&edge_sql);

        let vertices = first_column(&open.client, &node_sql, OP)
            .await?
            .iter()
            .map(|text| cypher::decode_vertex(text))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let edges = first_column(&open.client, &edge_sql, OP)
            .await?
            .iter()
            .map(|text| cypher::decode_edge(text))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let view = assemble(graph, vertices, edges);
        tracing::debug!(
            graph,
            nodes = view.node_count(),
            edges = view.edge_count(),
            "Graph loaded"
        );
        Ok(view)
    }
}

/// Text of the first column of every row, via the simple-query protocol.
async fn first_column(client: &Client, sql: &str, operation: &str) -> Result<Vec<String>> {
    let messages = client
        .simple_query(sql)
        .await
        .map_err(|e| KgError::persistence(operation, e))?;
    let mut values = Vec::new();
    for message in messages {
        if let SimpleQueryMessage::Row(row) = message {
            let value = row
                .try_get(0)
                .map_err(|e| KgError::persistence(operation, e))?;
            if let Some(text) = value {
                values.push(text.to_string());
            }
        }
    }
    Ok(values)
}

/// Key nodes by their `id` property (falling back to the AGE id) and
/// rewrite edge endpoints to those keys.
fn assemble(graph: &str, vertices: Vec<AgVertex>, edges: Vec<AgEdge>) -> GraphView {
    let mut view = GraphView::empty(graph);
    let mut keys: HashMap<u64, String> = HashMap::with_capacity(vertices.len());

    for v in vertices {
        let key = v
            .properties
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| v.id.to_string());
        keys.insert(v.id, key.clone());
        view.nodes.insert(
            key.clone(),
            GraphNode {
                id: key,
                label: v.label,
                properties: v.properties,
            },
        );
    }

    let endpoint = |age_id: u64| {
        keys.get(&age_id)
            .cloned()
            .unwrap_or_else(|| age_id.to_string())
    };
    view.edges = edges
        .into_iter()
        .map(|e| GraphEdge {
            source: endpoint(e.start_id),
            target: endpoint(e.end_id),
            relation: e.label,
            properties: e.properties,
        })
        .collect();
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vertex(age_id: u64, label: &str, props: serde_json::Value) -> AgVertex {
        AgVertex {
            id: age_id,
            label: label.to_string(),
            properties: props.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn assemble_keys_by_record_id() {
        let vertices = vec![
            vertex(1, "note", json!({"id": "r1", "entity": "first"})),
            vertex(2, "note", json!({"id": "r2", "entity": "second"})),
            vertex(3, "Entity", json!({})),
        ];
        let edges = vec![
            AgEdge {
                id: 10,
                label: "mentions".into(),
                start_id: 1,
                end_id: 2,
                properties: json!({"label": "mentions"}).as_object().cloned().unwrap(),
            },
            AgEdge {
                id: 11,
                label: "LINKS_TO".into(),
                start_id: 2,
                end_id: 3,
                properties: serde_json::Map::new(),
            },
        ];

        let view = assemble("kg_test", vertices, edges);
        assert_eq!(view.graph, "kg_test");
        assert_eq!(view.node_count(), 3);
        assert_eq!(view.nodes["r1"].display_name(), "first");
        assert!(view.nodes.contains_key("3"));

        assert_eq!(view.edge_count(), 2);
        assert_eq!(view.edges[0].source, "r1");
        assert_eq!(view.edges[0].target, "r2");
        assert_eq!(view.edges[0].relation, "mentions");
        assert_eq!(view.edges[1].target, "3");
    }

    #[test]
    fn assemble_empty() {
        let view = assemble("kg_test", Vec::new(), Vec::new());
        assert!(view.is_empty());
    }

    #[test]
    fn dangling_edge_keeps_age_ids() {
        let edges = vec![AgEdge {
            id: 10,
            label: "mentions".into(),
            start_id: 7,
            end_id: 8,
            properties: serde_json::Map::new(),
        }];
        let view = assemble("kg_test", Vec::new(), edges);
        assert_eq!(view.edges[0].source, "7");
        assert_eq!(view.edges[0].target, "8");
    }
}
