//! Shape rules for records and triples.
//!
//! Validation is pure and runs before anything touches the database. Type
//! tags and relation labels become AGE labels (tables), so they must be plain
//! identifiers; record identifiers are embedded in Cypher literals, so they
//! are restricted to a conservative token alphabet.

use std::collections::BTreeSet;

use chrono::Datelike;
use regex::Regex;

use crate::config::KgConfig;
use crate::error::{KgError, Result, ValidationError};
use crate::types::{Record, RecordId, Triple};

/// Longest identifier accepted.
pub const MAX_ID_LEN: usize = 255;

/// Prefix AGE reserves for its own label tables.
pub const AGE_INTERNAL_PREFIX: &str = "_ag_label_";

/// Range of years PostgreSQL timestamps can represent.
const MIN_PG_YEAR: i32 = -4712;
const MAX_PG_YEAR: i32 = 294_276;

/// `[A-Za-z_][A-Za-z0-9_]*`, capped at the Postgres identifier length.
pub fn is_label(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    s.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Non-empty token over `[A-Za-z0-9_.:-]`.
pub fn is_id_token(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_ID_LEN
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

/// Shared identifier rule used by both validators.
#[derive(Debug, Clone, Default)]
struct IdRule {
    pattern: Option<Regex>,
}

impl IdRule {
    fn check(&self, field: &'static str, id: &RecordId) -> std::result::Result<(), ValidationError> {
        if id.as_str().is_empty() {
            return Err(ValidationError::new(field, "must not be empty"));
        }
        if !is_id_token(id.as_str()) {
            return Err(ValidationError::new(
                field,
                format!(
                    "{:?} must be at most {MAX_ID_LEN} characters of [A-Za-z0-9_.:-]",
                    id.as_str()
                ),
            ));
        }
        if let Some(re) = &self.pattern {
            if !re.is_match(id.as_str()) {
                return Err(ValidationError::new(
                    field,
                    format!("{:?} does not match {}", id.as_str(), re.as_str()),
                ));
            }
        }
        Ok(())
    }
}

/// Names that would collide with tables AGE or the hypertable already own in
/// the graph schema.
#[derive(Debug, Clone, Default)]
struct ReservedLabels {
    names: BTreeSet<String>,
}

impl ReservedLabels {
    fn from_config(config: &KgConfig) -> Self {
        Self {
            names: std::iter::once(config.hypertable_name.clone()).collect(),
        }
    }

    fn check(&self, field: &'static str, label: &str) -> std::result::Result<(), ValidationError> {
        if label.starts_with(AGE_INTERNAL_PREFIX) {
            return Err(ValidationError::new(
                field,
                format!("{label:?} uses the reserved {AGE_INTERNAL_PREFIX} prefix"),
            ));
        }
        if self.names.contains(label) {
            return Err(ValidationError::new(
                field,
                format!("{label:?} collides with an existing table in the graph schema"),
            ));
        }
        Ok(())
    }
}

fn compile_pattern(pattern: Option<&str>) -> Result<Option<Regex>> {
    pattern
        .map(|p| Regex::new(p).map_err(|e| KgError::Config(format!("id_pattern: {e}"))))
        .transpose()
}

// ── Records ───────────────────────────────────────────────────────

/// Validates a candidate record. Reports the first violated field.
#[derive(Debug, Clone, Default)]
pub struct RecordValidator {
    allowed_types: BTreeSet<String>,
    vector_size: Option<usize>,
    reserved: ReservedLabels,
    ids: IdRule,
}

impl RecordValidator {
    /// Unconstrained validator: any label-shaped type, any token id.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &KgConfig) -> Result<Self> {
        Ok(Self {
            allowed_types: config.allowed_types.iter().cloned().collect(),
            vector_size: config.vector_size,
            reserved: ReservedLabels::from_config(config),
            ids: IdRule {
                pattern: compile_pattern(config.id_pattern.as_deref())?,
            },
        })
    }

    pub fn with_allowed_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_vector_size(mut self, size: usize) -> Self {
        self.vector_size = Some(size);
        self
    }

    pub fn with_id_pattern(mut self, pattern: &str) -> Result<Self> {
        self.ids.pattern = compile_pattern(Some(pattern))?;
        Ok(self)
    }

    pub fn validate(&self, record: &Record) -> std::result::Result<(), ValidationError> {
        let tag = record.record_type.as_str();
        if tag.trim().is_empty() {
            return Err(ValidationError::new("type", "must not be empty"));
        }
        if !is_label(tag) {
            return Err(ValidationError::new(
                "type",
                format!("{tag:?} is not a valid graph label"),
            ));
        }
        self.reserved.check("type", tag)?;
        if !self.allowed_types.is_empty() && !self.allowed_types.contains(tag) {
            return Err(ValidationError::new(
                "type",
                format!("{tag:?} is not an allowed record type"),
            ));
        }

        if record.title.trim().is_empty() {
            return Err(ValidationError::new("title", "must not be empty"));
        }

        let year = record.time.year();
        if !(MIN_PG_YEAR..=MAX_PG_YEAR).contains(&year) {
            return Err(ValidationError::new(
                "time",
                format!("year {year} is outside the storable range"),
            ));
        }

        self.ids.check("id", &record.id)?;

        if let Some(embedding) = &record.embedding {
            if let Some(expected) = self.vector_size {
                if embedding.len() != expected {
                    return Err(ValidationError::new(
                        "embedding",
                        format!("expected {expected} dimensions, got {}", embedding.len()),
                    ));
                }
            }
            if embedding.iter().any(|x| !x.is_finite()) {
                return Err(ValidationError::new(
                    "embedding",
                    "components must be finite",
                ));
            }
        }

        Ok(())
    }
}

// ── Triples ───────────────────────────────────────────────────────

/// Validates a subject–relation–object triple before it becomes an edge.
#[derive(Debug, Clone, Default)]
pub struct TripleValidator {
    allowed_relations: BTreeSet<String>,
    forbid_self_loops: bool,
    reserved: ReservedLabels,
    ids: IdRule,
}

impl TripleValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &KgConfig) -> Result<Self> {
        Ok(Self {
            allowed_relations: config.allowed_relations.iter().cloned().collect(),
            forbid_self_loops: config.forbid_self_loops,
            reserved: ReservedLabels::from_config(config),
            ids: IdRule {
                pattern: compile_pattern(config.id_pattern.as_deref())?,
            },
        })
    }

    pub fn with_allowed_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_relations = relations.into_iter().map(Into::into).collect();
        self
    }

    pub fn forbid_self_loops(mut self) -> Self {
        self.forbid_self_loops = true;
        self
    }

    pub fn validate(&self, triple: &Triple) -> std::result::Result<(), ValidationError> {
        let rel = triple.relation.as_str();
        if rel.trim().is_empty() {
            return Err(ValidationError::new("relation", "must not be empty"));
        }
        if !is_label(rel) {
            return Err(ValidationError::new(
                "relation",
                format!("{rel:?} is not a valid edge label"),
            ));
        }
        self.reserved.check("relation", rel)?;
        if !self.allowed_relations.is_empty() && !self.allowed_relations.contains(rel) {
            return Err(ValidationError::new(
                "relation",
                format!("{rel:?} is not in the relation vocabulary"),
            ));
        }

        self.validate_endpoints(triple)
    }

    /// Identifier and self-loop rules only.
    ///
    /// Used for triples whose relation is free text stored as an edge
    /// property rather than used as the edge label.
    pub fn validate_endpoints(&self, triple: &Triple) -> std::result::Result<(), ValidationError> {
        self.ids.check("subject", &triple.subject)?;
        self.ids.check("object", &triple.object)?;
        if let Some(provenance) = &triple.provenance {
            self.ids.check("provenance", provenance)?;
        }

        if self.forbid_self_loops && triple.subject == triple.object {
            return Err(ValidationError::new(
                "object",
                "self-loops are not permitted",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn note(id: &str) -> Record {
        Record::new("note", "hello").with_id(id)
    }

    #[test]
    fn label_rules() {
        assert!(is_label("note"));
        assert!(is_label("_private"));
        assert!(is_label("LINKS_TO"));
        assert!(!is_label(""));
        assert!(!is_label("9lives"));
        assert!(!is_label("has space"));
        assert!(!is_label("x'; DROP"));
        assert!(!is_label(&"a".repeat(64)));
    }

    #[test]
    fn id_token_rules() {
        assert!(is_id_token("r1"));
        assert!(is_id_token("6f1c2a4e-1d2b-4c3d-9e8f-001122334455"));
        assert!(is_id_token("urn:doc:42"));
        assert!(!is_id_token(""));
        assert!(!is_id_token("it's"));
        assert!(!is_id_token("a$$b"));
        assert!(!is_id_token(&"x".repeat(MAX_ID_LEN + 1)));
    }

    #[test]
    fn well_formed_record_passes() {
        assert!(RecordValidator::new().validate(&note("r1")).is_ok());
    }

    #[test]
    fn empty_type_fails_on_type() {
        let mut rec = note("r1");
        rec.record_type = String::new();
        let err = RecordValidator::new().validate(&rec).unwrap_err();
        assert_eq!(err.field, "type");
    }

    #[test]
    fn disallowed_type_fails_on_type() {
        let v = RecordValidator::new().with_allowed_types(["job_offer"]);
        let err = v.validate(&note("r1")).unwrap_err();
        assert_eq!(err.field, "type");
        assert!(v
            .validate(&Record::new("job_offer", "Rust dev").with_id("j1"))
            .is_ok());
    }

    #[test]
    fn blank_title_fails_on_title() {
        let mut rec = note("r1");
        rec.title = "   ".to_string();
        assert_eq!(
            RecordValidator::new().validate(&rec).unwrap_err().field,
            "title"
        );
    }

    #[test]
    fn type_is_checked_before_title() {
        let mut rec = note("r1");
        rec.record_type = String::new();
        rec.title = String::new();
        assert_eq!(
            RecordValidator::new().validate(&rec).unwrap_err().field,
            "type"
        );
    }

    #[test]
    fn ancient_time_fails_on_time() {
        let rec = note("r1").with_time(Utc.with_ymd_and_hms(-5000, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(
            RecordValidator::new().validate(&rec).unwrap_err().field,
            "time"
        );
    }

    #[test]
    fn malformed_id_fails_on_id() {
        let v = RecordValidator::new();
        assert_eq!(v.validate(&note("")).unwrap_err().field, "id");
        assert_eq!(v.validate(&note("r'1")).unwrap_err().field, "id");
    }

    #[test]
    fn id_pattern_enforced() {
        let v = RecordValidator::new().with_id_pattern("^r[0-9]+$").unwrap();
        assert!(v.validate(&note("r12")).is_ok());
        assert_eq!(v.validate(&note("doc-1")).unwrap_err().field, "id");
    }

    #[test]
    fn embedding_dimension_checked() {
        let v = RecordValidator::new().with_vector_size(3);
        assert!(v
            .validate(&note("r1").with_embedding(vec![0.1, 0.2, 0.3]))
            .is_ok());
        assert_eq!(
            v.validate(&note("r1").with_embedding(vec![0.1]))
                .unwrap_err()
                .field,
            "embedding"
        );
        assert_eq!(
            v.validate(&note("r1").with_embedding(vec![0.1, f32::NAN, 0.3]))
                .unwrap_err()
                .field,
            "embedding"
        );
    }

    #[test]
    fn from_config_uses_settings() {
        let mut cfg = crate::config::tests::sample_config();
        cfg.allowed_types = vec!["note".to_string()];
        cfg.allowed_relations = vec!["mentions".to_string()];
        cfg.forbid_self_loops = true;

        let records = RecordValidator::from_config(&cfg).unwrap();
        assert!(records.validate(&note("r1")).is_ok());
        assert!(records
            .validate(&Record::new("other", "x").with_id("r2"))
            .is_err());

        let triples = TripleValidator::from_config(&cfg).unwrap();
        assert!(triples.validate(&Triple::new("r1", "mentions", "r2")).is_ok());
        assert_eq!(
            triples
                .validate(&Triple::new("r1", "mentions", "r1"))
                .unwrap_err()
                .field,
            "object"
        );
    }

    #[test]
    fn triple_passes_and_self_loop_allowed_by_default() {
        let v = TripleValidator::new();
        assert!(v.validate(&Triple::new("r1", "mentions", "r2")).is_ok());
        assert!(v.validate(&Triple::new("r1", "mentions", "r1")).is_ok());
    }

    #[test]
    fn triple_relation_rules() {
        let v = TripleValidator::new().with_allowed_relations(["mentions"]);
        assert_eq!(
            v.validate(&Triple::new("r1", "", "r2")).unwrap_err().field,
            "relation"
        );
        assert_eq!(
            v.validate(&Triple::new("r1", "cites", "r2"))
                .unwrap_err()
                .field,
            "relation"
        );
        assert_eq!(
            v.validate(&Triple::new("r1", "has space", "r2"))
                .unwrap_err()
                .field,
            "relation"
        );
    }

    #[test]
    fn triple_identifiers_checked() {
        let v = TripleValidator::new();
        assert_eq!(
            v.validate(&Triple::new("", "mentions", "r2"))
                .unwrap_err()
                .field,
            "subject"
        );
        assert_eq!(
            v.validate(&Triple::new("r1", "mentions", "r 2"))
                .unwrap_err()
                .field,
            "object"
        );
        assert_eq!(
            v.validate(&Triple::new("r1", "mentions", "r2").with_provenance("d'1"))
                .unwrap_err()
                .field,
            "provenance"
        );
    }

    #[test]
    fn forbidden_self_loop() {
        let v = TripleValidator::new().forbid_self_loops();
        assert_eq!(
            v.validate(&Triple::new("r1", "mentions", "r1"))
                .unwrap_err()
                .field,
            "object"
        );
    }

    #[test]
    fn reserved_labels_rejected() {
        let cfg = crate::config::tests::sample_config();
        let records = RecordValidator::from_config(&cfg).unwrap();
        let err = records
            .validate(&Record::new("_ag_label_vertex", "x").with_id("r1"))
            .unwrap_err();
        assert_eq!(err.field, "type");
        assert!(err.reason.contains("_ag_label_"));
        let err = records
            .validate(&Record::new("nodes", "x").with_id("r1"))
            .unwrap_err();
        assert_eq!(err.field, "type");

        let triples = TripleValidator::from_config(&cfg).unwrap();
        assert_eq!(
            triples
                .validate(&Triple::new("r1", "nodes", "r2"))
                .unwrap_err()
                .field,
            "relation"
        );
        assert!(TripleValidator::new()
            .validate(&Triple::new("r1", "_ag_label_edge", "r2"))
            .is_err());
    }

    #[test]
    fn endpoints_ignore_free_text_relation() {
        let triple = Triple::new("r1", "lavora presso", "r2").with_provenance("doc-1");
        let v = TripleValidator::new();
        assert_eq!(v.validate(&triple).unwrap_err().field, "relation");
        assert!(v.validate_endpoints(&triple).is_ok());
        assert_eq!(
            v.forbid_self_loops()
                .validate_endpoints(&Triple::new("r1", "works at", "r1"))
                .unwrap_err()
                .field,
            "object"
        );
    }
}
