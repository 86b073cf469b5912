//! Database connection, pool management and schema setup

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, Schema, SqlErr, TransactionTrait,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::NumberingConfig;
use crate::entity::{assignments, counters};
use crate::error::Result;

/// Database manager for the numbering tables
#[derive(Clone)]
pub struct DatabaseManager {
    pub conn: Arc<DatabaseConnection>,
}

impl DatabaseManager {
    /// Create a new database manager with connection pool
    pub async fn new(config: &NumberingConfig) -> Result<Self> {
        config.validate()?;
        info!("Connecting to database: {}", mask_connection_string(&config.database_url));

        let mut opt = ConnectOptions::new(&config.database_url);
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connection_timeout_secs))
            .sqlx_logging(config.enable_sql_logging)
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);
        if let Some(idle) = config.idle_timeout_secs {
            opt.idle_timeout(Duration::from_secs(idle))
                .max_lifetime(Duration::from_secs(3600));
        }

        let conn = Database::connect(opt).await?;

        // Test the connection
        conn.ping().await?;
        info!("Database connection established successfully");

        let manager = Self {
            conn: Arc::new(conn),
        };
        if config.create_schema {
            manager.ensure_schema().await?;
        }
        Ok(manager)
    }

    /// Wrap an already open connection
    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self {
            conn: Arc::new(conn),
        }
    }

    /// Get a reference to the database connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Begin a new transaction
    pub async fn begin_transaction(&self) -> Result<DatabaseTransaction> {
        Ok(self.conn.begin().await?)
    }

    /// Create the counter and assignment tables (and their indexes) if missing
    pub async fn ensure_schema(&self) -> Result<()> {
        self.create_table(counters::Entity).await?;
        self.create_table(assignments::Entity).await?;
        info!("Numbering schema is in place");
        Ok(())
    }

    async fn create_table<E: EntityTrait>(&self, entity: E) -> Result<()> {
        let backend = self.conn.get_database_backend();
        let schema = Schema::new(backend);

        let mut table = schema.create_table_from_entity(entity);
        table.if_not_exists();
        self.conn.execute(backend.build(&table)).await?;

        for mut index in schema.create_index_from_entity(entity) {
            index.if_not_exists();
            self.conn.execute(backend.build(&index)).await?;
        }

        debug!("Ensured table {}", entity.table_name());
        Ok(())
    }
}

/// Whether a failed transaction is worth running again.
///
/// Covers lock conflicts on MySQL/TiDB, busy SQLite databases and the
/// duplicate-key race when two callers create the same counter row.
pub(crate) fn is_transient(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }

    let message = err.to_string().to_ascii_lowercase();
    [
        "deadlock",
        "lock wait timeout",
        "write conflict",
        "try again later",
        "database is locked",
        "database table is locked",
    ]
    .iter()
    .any(|needle| message.contains(needle))
}

/// Mask sensitive parts of connection string for logging
pub fn mask_connection_string(conn_str: &str) -> String {
    if let Ok(mut parsed) = url::Url::parse(conn_str) {
        if parsed.password().is_none() {
            return conn_str.to_string();
        }
        if parsed.set_password(Some("****")).is_ok() {
            return parsed.to_string();
        }
    }
    // If parsing fails, return a generic masked string
    "****".to_string()
}
