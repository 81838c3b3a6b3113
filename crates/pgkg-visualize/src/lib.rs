//! pgkg-visualize: read-only graph projection and rendering.
//!
//! A [`GraphVisualizer`] borrows an open [`DatabaseHandler`]; it never owns
//! or closes the session.

pub mod render;

use pgkg_core::{GraphView, Result};
use pgkg_graph::DatabaseHandler;

pub use render::to_dot;

/// Loads one AGE graph through a borrowed handler and renders it.
pub struct GraphVisualizer<'a> {
    handler: &'a DatabaseHandler,
    graph: String,
}

impl<'a> GraphVisualizer<'a> {
    /// Visualize the graph named after the configured schema.
    pub fn new(handler: &'a DatabaseHandler) -> Self {
        Self {
            graph: handler.config().schema_name.clone(),
            handler,
        }
    }

    /// Visualize a different graph through the same handler.
    pub fn for_graph(mut self, graph: impl Into<String>) -> Self {
        self.graph = graph.into();
        self
    }

    pub fn graph_name(&self) -> &str {
        &self.graph
    }

    /// Nodes and edges of the graph; empty when the graph does not exist.
    pub async fn get_graph_data(&self) -> Result<GraphView> {
        let view = self.handler.graph_data(&self.graph).await?;
        if view.is_empty() {
            tracing::info!(graph = %self.graph, "No graph data available");
        }
        Ok(view)
    }

    /// Render the graph as a Graphviz DOT document.
    pub async fn plot_graph(&self) -> Result<String> {
        let view = self.get_graph_data().await?;
        tracing::debug!(
            graph = %self.graph,
            nodes = view.node_count(),
            edges = view.edge_count(),
            "Rendering graph"
        );
        Ok(render::to_dot(&view))
    }
}
