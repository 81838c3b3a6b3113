//! openCypher statement building and agtype decoding for Apache AGE.
//!
//! AGE only accepts Cypher through `ag_catalog.cypher(graph, $$ ... $$)`, and
//! bound parameters there require prepared agtype maps, so values are written
//! as escaped string literals instead. Labels are never escaped: callers pass
//! only validated identifiers.

use serde::Deserialize;

/// Quote `value` as a Cypher string literal.
///
/// `$` is written as a unicode escape so a value can never terminate the
/// surrounding `$$` quoting.
pub fn literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' => out.push_str("\\u0024"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Render a property map `{key: 'value', ...}` from string pairs.
pub fn properties(pairs: &[(&str, &str)]) -> String {
    let body = pairs
        .iter()
        .map(|(k, v)| format!("{k}: {}", literal(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{body}}}")
}

/// Wrap a Cypher body in the SQL call AGE expects.
pub fn call(graph: &str, body: &str, columns: &[&str]) -> String {
    let cols = columns
        .iter()
        .map(|c| format!("{c} ag_catalog.agtype"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT * FROM ag_catalog.cypher('{graph}', $$ {body} $$) AS ({cols})")
}

/// `SELECT count(*)` over vertices whose `id` property equals `id`.
pub fn count_vertices_by_id(graph: &str, id: &str) -> String {
    let body = format!("MATCH (n {{id: {}}}) RETURN n", literal(id));
    format!(
        "SELECT count(*) FROM ag_catalog.cypher('{graph}', $$ {body} $$) AS (n ag_catalog.agtype)"
    )
}

/// Create a record vertex labelled with its type tag.
pub fn create_vertex(graph: &str, label: &str, props: &[(&str, &str)]) -> String {
    let body = format!("CREATE (v:{label} {}) RETURN v", properties(props));
    call(graph, &body, &["v"])
}

/// Create-or-match a vertex with exactly these properties.
pub fn merge_vertex(graph: &str, label: &str, props: &[(&str, &str)]) -> String {
    let body = format!("MERGE (v:{label} {}) RETURN v", properties(props));
    call(graph, &body, &["v"])
}

/// Create `(source)-[:relation {props}]->(target)` between vertices matched by id.
pub fn create_edge(
    graph: &str,
    source_id: &str,
    relation: &str,
    target_id: &str,
    props: &[(&str, &str)],
) -> String {
    let body = format!(
        "MATCH (a {{id: {}}}), (b {{id: {}}}) CREATE (a)-[r:{relation} {}]->(b) RETURN r",
        literal(source_id),
        literal(target_id),
        properties(props),
    );
    call(graph, &body, &["r"])
}

// ── agtype decoding ──────────────────────────────────────────────

/// A vertex as printed by AGE: `{"id": .., "label": .., "properties": {..}}::vertex`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgVertex {
    pub id: u64,
    pub label: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// An edge as printed by AGE: `{"id": .., "label": .., "start_id": .., "end_id": .., ...}::edge`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgEdge {
    pub id: u64,
    pub label: String,
    pub start_id: u64,
    pub end_id: u64,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Strip a trailing `::vertex` / `::edge` / `::path` annotation.
fn strip_annotation(text: &str) -> &str {
    let trimmed = text.trim();
    for suffix in ["::vertex", "::edge", "::path"] {
        if let Some(body) = trimmed.strip_suffix(suffix) {
            return body;
        }
    }
    trimmed
}

pub fn decode_vertex(text: &str) -> Result<AgVertex, serde_json::Error> {
    serde_json::from_str(strip_annotation(text))
}

pub fn decode_edge(text: &str) -> Result<AgEdge, serde_json::Error> {
    serde_json::from_str(strip_annotation(text))
}
