//! Graphviz DOT rendering of a [`GraphView`].

use pgkg_core::GraphView;

/// Placeholder text for a graph with nothing to draw.
pub const EMPTY_PLACEHOLDER: &str = "No graph data available";

/// Title drawn above every rendered graph.
pub fn title(graph: &str) -> String {
    format!("Graph from Apache AGE: {graph}")
}

/// Render `view` as a DOT digraph.
///
/// Nodes are labelled with their display name, edges with their `label`
/// property or relation.
/// Output is deterministic: nodes in key order, edges in read order.
pub fn to_dot(view: &GraphView) -> String {
    let mut out = String::new();
    out.push_str(&format!("digraph {} {{\n", quote(&view.graph)));
    out.push_str(&format!("  label={};\n", quote(&title(&view.graph))));
    out.push_str("  labelloc=t;\n");

    if view.is_empty() {
        out.push_str(&format!(
            "  empty [shape=plaintext, label={}];\n",
            quote(EMPTY_PLACEHOLDER)
        ));
        out.push_str("}\n");
        return out;
    }

    out.push_str(
        "  node [shape=ellipse, style=filled, fillcolor=lightblue, fontname=\"Helvetica-Bold\"];\n",
    );
    out.push_str("  edge [color=black, fontcolor=red];\n");

    for (key, node) in &view.nodes {
        out.push_str(&format!(
            "  {} [label={}];\n",
            quote(key),
            quote(node.display_name())
        ));
    }
    for edge in &view.edges {
        out.push_str(&format!(
            "  {} -> {} [label={}];\n",
            quote(&edge.source),
            quote(&edge.target),
            quote(edge.display_label())
        ));
    }
    out.push_str("}\n");
    out
}

/// DOT double-quoted string.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgkg_core::{GraphEdge, GraphNode};

    fn node(id: &str, entity: Option<&str>) -> GraphNode {
        let mut properties = serde_json::Map::new();
        properties.insert("id".into(), id.into());
        if let Some(name) = entity {
            properties.insert("entity".into(), name.into());
        }
        GraphNode {
            id: id.to_string(),
            label: "note".to_string(),
            properties,
        }
    }

    fn sample_view() -> GraphView {
        let mut view = GraphView::empty("kg_test");
        view.nodes.insert("r1".into(), node("r1", Some("Rust")));
        view.nodes.insert("r2".into(), node("r2", None));
        view.edges.push(GraphEdge {
            source: "r1".into(),
            target: "r2".into(),
            relation: "mentions".into(),
            properties: serde_json::Map::new(),
        });
        view
    }

    #[test]
    fn renders_nodes_and_edges() {
        let dot = to_dot(&sample_view());
        assert!(dot.starts_with("digraph \"kg_test\" {\n"));
        assert!(dot.contains("label=\"Graph from Apache AGE: kg_test\";"));
        assert!(dot.contains("  \"r1\" [label=\"Rust\"];\n"));
        assert!(dot.contains("  \"r2\" [label=\"r2\"];\n"));
        assert!(dot.contains("  \"r1\" -> \"r2\" [label=\"mentions\"];\n"));
        assert!(!dot.contains(EMPTY_PLACEHOLDER));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn entity_edges_show_relation_text() {
        let mut view = sample_view();
        let mut properties = serde_json::Map::new();
        properties.insert("label".into(), "works at".into());
        view.edges.push(GraphEdge {
            source: "r2".into(),
            target: "r1".into(),
            relation: "LINKS_TO".into(),
            properties,
        });
        let dot = to_dot(&view);
        assert!(dot.contains("  \"r2\" -> \"r1\" [label=\"works at\"];\n"));
    }

    #[test]
    fn empty_view_renders_placeholder() {
        let dot = to_dot(&GraphView::empty("kg_test"));
        assert!(dot.contains("label=\"No graph data available\""));
        assert!(dot.contains("Graph from Apache AGE: kg_test"));
        assert!(!dot.contains("->"));
    }

    #[test]
    fn labels_are_escaped() {
        let mut view = GraphView::empty("kg_test");
        view.nodes
            .insert("q".into(), node("q", Some("say \"hi\"\\now")));
        let dot = to_dot(&view);
        assert!(dot.contains(r#"[label="say \"hi\"\\now"]"#));
    }

    #[test]
    fn rendering_is_deterministic() {
        assert_eq!(to_dot(&sample_view()), to_dot(&sample_view()));
    }
}
