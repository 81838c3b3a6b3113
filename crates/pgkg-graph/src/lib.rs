//! pgkg-graph: PostgreSQL data-access layer for the pgkg knowledge graph.
//!
//! This crate is the single write path into the two stores: records land in
//! a TimescaleDB hypertable and, in the same transaction, as Apache AGE
//! vertices. Triples become AGE edges between existing vertices. Reads used
//! by visualizers go through here too.

pub mod client;
pub mod cypher;
pub mod mutations;
pub mod queries;

pub use client::{DatabaseHandler, AGE_SESSION_PRELUDE};
