//! PostgreSQL session management and the lifecycle-aware database handler.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};

use pgkg_core::{KgConfig, KgError, RecordValidator, Result, SessionState, TripleValidator};

/// Session setup AGE needs before `cypher()` calls resolve.
pub const AGE_SESSION_PRELUDE: &str = r#"LOAD 'age'; SET search_path = ag_catalog, "$user", public;"#;

/// How long `close` waits for the connection task to say goodbye.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A live session: the client plus the task driving its socket.
pub(crate) struct OpenSession {
    pub(crate) client: Client,
    connection: JoinHandle<()>,
}

impl OpenSession {
    /// Drop the client (which sends Terminate) and wait for the socket task.
    async fn shutdown(self) {
        let Self {
            client,
            mut connection,
        } = self;
        drop(client);
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut connection)
            .await
            .is_err()
        {
            tracing::warn!("PostgreSQL connection did not close in time; aborting");
            connection.abort();
        }
    }
}

pub(crate) enum Session {
    Uninitialized,
    Open(OpenSession),
    Closed,
}

impl Session {
    fn state(&self) -> SessionState {
        match self {
            Self::Uninitialized => SessionState::Uninitialized,
            Self::Open(_) => SessionState::Open,
            Self::Closed => SessionState::Closed,
        }
    }
}

/// Single point of access to the relational, time-series and graph stores.
///
/// Lifecycle: `new` (Uninitialized) → `initialize` (Open) → `close` (Closed).
/// Inserts and reads are only accepted while Open. Mutating operations take
/// `&mut self`; share a handler across tasks only behind a lock.
pub struct DatabaseHandler {
    pub(crate) config: Arc<KgConfig>,
    pub(crate) records: RecordValidator,
    pub(crate) triples: TripleValidator,
    pub(crate) session: Session,
}

impl DatabaseHandler {
    /// Validate the configuration and build an uninitialized handler. No I/O.
    pub fn new(config: impl Into<Arc<KgConfig>>) -> Result<Self> {
        let config = config.into();
        config.validate()?;
        let records = RecordValidator::from_config(&config)?;
        let triples = TripleValidator::from_config(&config)?;
        Ok(Self {
            config,
            records,
            triples,
            session: Session::Uninitialized,
        })
    }

    /// Replace the validators derived from configuration.
    pub fn with_validators(mut self, records: RecordValidator, triples: TripleValidator) -> Self {
        self.records = records;
        self.triples = triples;
        self
    }

    pub fn config(&self) -> &KgConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.session, Session::Open(_))
    }

    /// Connect and run the configured DDL, then prepare the session for AGE.
    ///
    /// Any failure leaves the handler Closed with the connection released.
    pub async fn initialize(&mut self) -> Result<()> {
        if !matches!(self.session, Session::Uninitialized) {
            return Err(KgError::Lifecycle {
                operation: "initialize",
                state: self.state(),
            });
        }

        let db = &self.config.database;
        let mut pg = tokio_postgres::Config::new();
        pg.host(&db.host)
            .port(db.port)
            .user(&db.user)
            .password(&db.password)
            .dbname(&db.dbname)
            .application_name(&self.config.app_name)
            .connect_timeout(Duration::from_secs(db.connect_timeout_secs));

        let (client, connection) = match pg.connect(NoTls).await {
            Ok(pair) => pair,
            Err(e) => {
                self.session = Session::Closed;
                tracing::warn!(host = %db.host, port = db.port, error = %e, "PostgreSQL unreachable");
                return Err(KgError::Connection(e.to_string()));
            }
        };
        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "PostgreSQL connection terminated");
            }
        });
        tracing::info!(host = %db.host, port = db.port, dbname = %db.dbname, "Connected to PostgreSQL");

        let open = OpenSession { client, connection };
        if let Err(e) = self.run_ddl(&open.client).await {
            open.shutdown().await;
            self.session = Session::Closed;
            return Err(e);
        }

        self.session = Session::Open(open);
        tracing::info!(schema = %self.config.schema_name, "Database handler initialized");
        Ok(())
    }

    async fn run_ddl(&self, client: &Client) -> Result<()> {
        let statements = self.config.rendered_ddl();
        for statement in statements
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(AGE_SESSION_PRELUDE))
        {
            self.trace_statement(statement);
            client
                .batch_execute(statement)
                .await
                .map_err(|e| KgError::Schema {
                    statement: statement.trim().to_string(),
                    cause: e.to_string(),
                })?;
        }
        tracing::debug!(count = statements.len(), "DDL applied");
        Ok(())
    }

    /// Release the session. Safe to call any number of times, in any state.
    pub async fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.session, Session::Closed) {
            Session::Open(open) => {
                open.shutdown().await;
                tracing::info!(schema = %self.config.schema_name, "Database handler closed");
            }
            Session::Uninitialized => tracing::debug!("Handler closed before initialization"),
            Session::Closed => tracing::debug!("Handler already closed"),
        }
        Ok(())
    }

    /// Get the underlying client for direct operations.
    pub fn inner(&self) -> Result<&Client> {
        Ok(&self.open("inner")?.client)
    }

    pub(crate) fn open(&self, operation: &'static str) -> Result<&OpenSession> {
        match &self.session {
            Session::Open(open) => Ok(open),
            other => Err(KgError::Lifecycle {
                operation,
                state: other.state(),
            }),
        }
    }

    pub(crate) fn open_mut(&mut self, operation: &'static str) -> Result<&mut OpenSession> {
        match &mut self.session {
            Session::Open(open) => Ok(open),
            other => Err(KgError::Lifecycle {
                operation,
                state: other.state(),
            }),
        }
    }

    /// Statement text is only logged outside production.
    pub(crate) fn trace_statement(&self, sql: &str) {
        if !self.config.production {
            tracing::debug!(sql = %sql.trim(), "Executing statement");
        }
    }
}

impl Drop for DatabaseHandler {
    fn drop(&mut self) {
        if self.is_open() {
            // Dropping the client closes the socket; the task then exits.
            tracing::warn!(
                schema = %self.config.schema_name,
                "Database handler dropped without close()"
            );
        }
    }
}
