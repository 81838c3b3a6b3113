//! pgkg-core: Shared configuration, domain types, validators and errors for
//! the pgkg data-access layer.
//!
//! This crate holds everything that does not talk to the database:
//! - The immutable application configuration
//! - Records, triples and the read-only graph view
//! - Record and triple validators
//! - The error taxonomy surfaced to callers

pub mod config;
pub mod error;
pub mod types;
pub mod validate;

pub use config::{DatabaseConfig, KgConfig};
pub use error::{ErrorKind, KgError, Result, SessionState, ValidationError};
pub use types::{GraphEdge, GraphNode, GraphView, Record, RecordId, Triple};
pub use validate::{RecordValidator, TripleValidator};
