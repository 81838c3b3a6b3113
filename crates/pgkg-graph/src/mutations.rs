//! Write operations for the knowledge graph.
//!
//! A record is written twice, as a hypertable row and as a vertex, inside one
//! transaction: either both land or neither does. Edges are only created
//! between vertices that already exist.

use tokio_postgres::types::ToSql;
use tokio_postgres::GenericClient;

use pgkg_core::types::{DEFAULT_RELATION, ENTITY_LABEL};
use pgkg_core::{KgError, Record, RecordId, Result, Triple, TripleValidator, ValidationError};

use crate::client::DatabaseHandler;
use crate::cypher;

impl DatabaseHandler {
    // ── Vertices ─────────────────────────────────────────────────

    /// Insert `record` as a hypertable row plus a vertex labelled with its type.
    ///
    /// Fails without writing anything when the record is invalid or when its
    /// identifier is already present in either store.
    pub async fn insert_vertex(&mut self, record: &Record) -> Result<RecordId> {
        const OP: &str = "insert_vertex";
        self.open(OP)?;
        self.records.validate(record)?;

        let graph = self.config.schema_name.clone();
        let table = self.config.qualified_table();
        let id = record.id.as_str();

        let row_exists = format!("SELECT count(*) FROM {table} WHERE tuid = $1");
        let vertex_exists = cypher::count_vertices_by_id(&graph, id);
        let row_sql = row_insert_sql(
            &table,
            record.summary.is_some(),
            record.embedding.is_some(),
        );
        let vertex_sql = cypher::create_vertex(
            &graph,
            &record.record_type,
            &[
                ("id", id),
                ("type", &record.record_type),
                ("entity", &record.title),
            ],
        );
        self.trace_statement(&row_sql);
        self.trace_statement(&vertex_sql);

        let data = serde_json::Value::Object(record.data.clone());
        let embedding = record.embedding.as_deref().map(vector_literal);
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![
            &record.id.0,
            &record.record_type,
            &record.title,
            &data,
            &record.time,
        ];
        if let Some(summary) = &record.summary {
            params.push(summary);
        }
        if let Some(embedding) = &embedding {
            params.push(embedding);
        }

        let client = &mut self.open_mut(OP)?.client;
        let tx = client
            .transaction()
            .await
            .map_err(|e| KgError::persistence(OP, e))?;

        lock_identifier(&tx, &record.id, OP).await?;
        if count(&tx, &row_exists, &[&record.id.0], OP).await? > 0
            || count(&tx, &vertex_exists, &[], OP).await? > 0
        {
            tracing::warn!(id = %record.id, "Duplicate record identifier");
            return Err(KgError::persistence(
                OP,
                format!("identifier {} already exists", record.id),
            ));
        }

        tx.execute(row_sql.as_str(), &params)
            .await
            .map_err(|e| KgError::persistence(OP, e))?;
        tx.execute(vertex_sql.as_str(), &[])
            .await
            .map_err(|e| KgError::persistence(OP, e))?;
        tx.commit().await.map_err(|e| KgError::persistence(OP, e))?;

        tracing::info!(id = %record.id, record_type = %record.record_type, "Record inserted");
        Ok(record.id.clone())
    }

    // ── Edges ────────────────────────────────────────────────────

    /// Create `subject -[relation]-> object` between two existing vertices.
    pub async fn insert_edge(&mut self, triple: &Triple) -> Result<()> {
        const OP: &str = "insert_edge";
        self.open(OP)?;
        self.triples.validate(triple)?;

        let graph = self.config.schema_name.clone();
        let edge_sql = edge_statement(&graph, triple);
        self.trace_statement(&edge_sql);

        let client = &mut self.open_mut(OP)?.client;
        let tx = client
            .transaction()
            .await
            .map_err(|e| KgError::persistence(OP, e))?;

        require_vertex(&tx, &graph, "subject", &triple.subject, OP).await?;
        require_vertex(&tx, &graph, "object", &triple.object, OP).await?;

        tx.execute(edge_sql.as_str(), &[])
            .await
            .map_err(|e| KgError::persistence(OP, e))?;
        tx.commit().await.map_err(|e| KgError::persistence(OP, e))?;

        tracing::info!(
            subject = %triple.subject,
            relation = %triple.relation,
            object = %triple.object,
            "Edge inserted"
        );
        Ok(())
    }

    /// Link two entities mentioned by `document`.
    ///
    /// Entity vertices are keyed by [`RecordId::derive`] and merged, so the
    /// same name from the same document always resolves to one vertex. The
    /// relation is free text kept in the edge's `label` property; the edge
    /// itself is always a [`DEFAULT_RELATION`] edge. A blank relation is
    /// stored as [`DEFAULT_RELATION`]. Returns the (subject, object) ids.
    pub async fn insert_entity_triple(
        &mut self,
        subject_entity: &str,
        relation: &str,
        object_entity: &str,
        document: &RecordId,
    ) -> Result<(RecordId, RecordId)> {
        const OP: &str = "insert_entity_triple";
        self.open(OP)?;

        let subject_entity = subject_entity.trim();
        let object_entity = object_entity.trim();
        let triple = entity_triple(
            &self.triples,
            subject_entity,
            relation,
            object_entity,
            document,
        )?;
        let subject = triple.subject.clone();
        let object = triple.object.clone();

        let graph = self.config.schema_name.clone();
        let merges = [(&subject, subject_entity), (&object, object_entity)].map(|(id, name)| {
            cypher::merge_vertex(
                &graph,
                ENTITY_LABEL,
                &[
                    ("id", id.as_str()),
                    ("entity", name),
                    ("record_id", document.as_str()),
                ],
            )
        });
        let edge_sql = entity_edge_statement(&graph, &triple);
        for sql in merges.iter().chain(std::iter::once(&edge_sql)) {
            self.trace_statement(sql);
        }

        let client = &mut self.open_mut(OP)?.client;
        let tx = client
            .transaction()
            .await
            .map_err(|e| KgError::persistence(OP, e))?;

        require_vertex(&tx, &graph, "provenance", document, OP).await?;
        let mut locks = [&subject, &object];
        locks.sort();
        for id in locks {
            lock_identifier(&tx, id, OP).await?;
        }
        for sql in merges.iter().chain(std::iter::once(&edge_sql)) {
            tx.execute(sql.as_str(), &[])
                .await
                .map_err(|e| KgError::persistence(OP, e))?;
        }
        tx.commit().await.map_err(|e| KgError::persistence(OP, e))?;

        tracing::info!(
            subject = %subject_entity,
            relation = %triple.relation,
            object = %object_entity,
            document = %document,
            "Entity triple inserted"
        );
        Ok((subject, object))
    }
}

// ── Helpers ──────────────────────────────────────────────────────

/// INSERT for one hypertable row.
///
/// Parameter order: tuid, type, title, data, time, then summary and
/// embedding when present.
pub fn row_insert_sql(table: &str, has_summary: bool, has_embedding: bool) -> String {
    let mut columns = vec!["tuid", "\"type\"", "title", "data", "\"time\""];
    let mut values = vec![
        "$1".to_string(),
        "$2".to_string(),
        "$3".to_string(),
        "$4::jsonb".to_string(),
        "$5::timestamptz".to_string(),
    ];
    if has_summary {
        columns.push("summary");
        values.push(format!("${}", values.len() + 1));
    }
    if has_embedding {
        columns.push("embedding");
        values.push(format!("${}::text::vector", values.len() + 1));
    }
    format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        values.join(", ")
    )
}

/// pgvector text form: `[0.1,0.2,0.3]`.
fn vector_literal(values: &[f32]) -> String {
    let body = values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("[{body}]")
}

/// Build and check the triple behind an entity link.
///
/// Entity names must be non-blank; the relation is free text and only the
/// identifier rules of `validator` apply.
fn entity_triple(
    validator: &TripleValidator,
    subject_entity: &str,
    relation: &str,
    object_entity: &str,
    document: &RecordId,
) -> Result<Triple> {
    let subject_entity = subject_entity.trim();
    let object_entity = object_entity.trim();
    if subject_entity.is_empty() {
        return Err(ValidationError::new("subject", "entity name must not be empty").into());
    }
    if object_entity.is_empty() {
        return Err(ValidationError::new("object", "entity name must not be empty").into());
    }
    let relation = match relation.trim() {
        "" => DEFAULT_RELATION,
        r => r,
    };

    let triple = Triple {
        subject: RecordId::derive(subject_entity, document),
        relation: relation.to_string(),
        object: RecordId::derive(object_entity, document),
        provenance: Some(document.clone()),
    };
    validator.validate_endpoints(&triple)?;
    Ok(triple)
}

/// `(s)-[:LINKS_TO {label: <relation text>, record_id}]->(o)`.
fn entity_edge_statement(graph: &str, triple: &Triple) -> String {
    let mut props = vec![("label", triple.relation.as_str())];
    if let Some(record) = &triple.provenance {
        props.push(("record_id", record.as_str()));
    }
    cypher::create_edge(
        graph,
        triple.subject.as_str(),
        DEFAULT_RELATION,
        triple.object.as_str(),
        &props,
    )
}

fn edge_statement(graph: &str, triple: &Triple) -> String {
    let mut props = vec![("label", triple.relation.as_str())];
    if let Some(record) = &triple.provenance {
        props.push(("record_id", record.as_str()));
    }
    cypher::create_edge(
        graph,
        triple.subject.as_str(),
        &triple.relation,
        triple.object.as_str(),
        &props,
    )
}

pub(crate) async fn count<C: GenericClient>(
    client: &C,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
    operation: &str,
) -> Result<i64> {
    let row = client
        .query_one(sql, params)
        .await
        .map_err(|e| KgError::persistence(operation, e))?;
    row.try_get::<_, i64>(0)
        .map_err(|e| KgError::persistence(operation, e))
}

/// Serialize concurrent writers of the same identifier until commit.
async fn lock_identifier<C: GenericClient>(
    client: &C,
    id: &RecordId,
    operation: &str,
) -> Result<()> {
    client
        .execute("SELECT pg_advisory_xact_lock(hashtext($1))", &[&id.0])
        .await
        .map_err(|e| KgError::persistence(operation, e))?;
    Ok(())
}

async fn require_vertex<C: GenericClient>(
    client: &C,
    graph: &str,
    field: &'static str,
    id: &RecordId,
    operation: &str,
) -> Result<()> {
    let sql = cypher::count_vertices_by_id(graph, id.as_str());
    if count(client, &sql, &[], operation).await? == 0 {
        tracing::warn!(field, id = %id, "Referenced vertex missing");
        return Err(KgError::Referential {
            field,
            id: id.to_string(),
        });
    }
    Ok(())
}
