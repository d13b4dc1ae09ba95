//! MySQL / MariaDB store.
//!
//! Schema (additive only, no migrations):
//! - `open_interest_history(id, symbol, timestamp, sum_open_interest,
//!   sum_open_interest_value, created_at)` with unique `idx_symbol_timestamp`
//! - `open_interest_log(id, log_message, log_time)`
//!
//! Decimals are stored as text so no precision is lost.

use crate::error::{PersistenceError, PersistenceResult};
use crate::store::{HistoryStore, SaveSummary};
use async_trait::async_trait;
use oi_core::{HistoricalSample, Symbol};
use sqlx::mysql::{MySqlConnectOptions, MySqlDatabaseError, MySqlPool, MySqlPoolOptions};
use sqlx::{Connection, MySqlConnection};
use tracing::{debug, error, info, warn};

/// MySQL error number for "Duplicate key name".
const ER_DUP_KEYNAME: u16 = 1061;

const CREATE_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS open_interest_history (
    id BIGINT AUTO_INCREMENT PRIMARY KEY,
    symbol VARCHAR(20) NOT NULL,
    `timestamp` BIGINT NOT NULL,
    sum_open_interest VARCHAR(50),
    sum_open_interest_value VARCHAR(50),
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)
"#;

const CREATE_HISTORY_INDEX: &str =
    "CREATE UNIQUE INDEX idx_symbol_timestamp ON open_interest_history (symbol, `timestamp`)";

const CREATE_LOG_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS open_interest_log (
    id BIGINT AUTO_INCREMENT PRIMARY KEY,
    log_message TEXT NOT NULL,
    log_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)
"#;

const INSERT_HISTORY: &str = r#"
INSERT IGNORE INTO open_interest_history
    (symbol, `timestamp`, sum_open_interest, sum_open_interest_value)
VALUES (?, ?, ?, ?)
"#;

/// Connection settings.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

impl StoreSettings {
    /// Server-level options, no database selected.
    fn server_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
    }

    fn database_options(&self) -> MySqlConnectOptions {
        self.server_options().database(&self.database)
    }
}

/// Store backed by a MySQL connection pool.
pub struct MySqlStore {
    settings: StoreSettings,
    pool: MySqlPool,
}

impl MySqlStore {
    /// Check the server is reachable and build the pool.
    ///
    /// The database itself may not exist yet; the pool connects lazily and
    /// `provision_schema` creates it.
    pub async fn connect(settings: StoreSettings) -> PersistenceResult<Self> {
        info!(
            host = %settings.host,
            port = settings.port,
            database = %settings.database,
            "Connecting to MySQL"
        );

        let conn = MySqlConnection::connect_with(&settings.server_options()).await?;
        conn.close().await?;

        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .connect_lazy_with(settings.database_options());

        Ok(Self { settings, pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn create_database(&self) -> PersistenceResult<()> {
        if !is_valid_identifier(&self.settings.database) {
            return Err(PersistenceError::Query(format!(
                "invalid database name: {:?}",
                self.settings.database
            )));
        }

        let mut conn = MySqlConnection::connect_with(&self.settings.server_options()).await?;
        let sql = format!("CREATE DATABASE IF NOT EXISTS `{}`", self.settings.database);
        if let Err(e) = sqlx::query(&sql).execute(&mut conn).await {
            warn!(database = %self.settings.database, error = %e, "CREATE DATABASE failed, continuing");
        }
        conn.close().await?;
        Ok(())
    }

    async fn insert_sample(&self, symbol: &Symbol, sample: &HistoricalSample) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(INSERT_HISTORY)
            .bind(symbol.as_str())
            .bind(sample.timestamp)
            .bind(sample.sum_open_interest.to_string())
            .bind(sample.sum_open_interest_value.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl HistoryStore for MySqlStore {
    async fn provision_schema(&self) -> PersistenceResult<()> {
        self.create_database().await?;

        sqlx::query(CREATE_HISTORY_TABLE).execute(&self.pool).await?;

        match sqlx::query(CREATE_HISTORY_INDEX).execute(&self.pool).await {
            Ok(_) => info!("Created unique index idx_symbol_timestamp"),
            Err(e) => {
                let code = mysql_error_number(&e);
                if index_already_exists(code) {
                    debug!("Unique index idx_symbol_timestamp already exists");
                } else {
                    error!(
                        code = ?code,
                        error = %e,
                        "Could not create unique index idx_symbol_timestamp, duplicate history rows will not be rejected"
                    );
                }
            }
        }

        sqlx::query(CREATE_LOG_TABLE).execute(&self.pool).await?;

        info!(database = %self.settings.database, "Schema provisioned");
        Ok(())
    }

    async fn save_history(
        &self,
        symbol: &Symbol,
        samples: &[HistoricalSample],
    ) -> PersistenceResult<SaveSummary> {
        let mut summary = SaveSummary::default();

        for sample in samples {
            match self.insert_sample(symbol, sample).await {
                Ok(0) => summary.duplicates += 1,
                Ok(_) => summary.inserted += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(%symbol, timestamp = sample.timestamp, error = %e, "Failed to insert history row");
                }
            }
        }

        debug!(
            %symbol,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            failed = summary.failed,
            "Saved history batch"
        );
        Ok(summary)
    }

    async fn save_log(&self, message: &str) -> PersistenceResult<()> {
        sqlx::query("INSERT INTO open_interest_log (log_message) VALUES (?)")
            .bind(message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_last_timestamp(&self, symbol: &Symbol) -> PersistenceResult<Option<i64>> {
        let last: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(`timestamp`) FROM open_interest_history WHERE symbol = ?",
        )
        .bind(symbol.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(last)
    }

    async fn get_recent_timestamps(
        &self,
        symbol: &Symbol,
        limit: usize,
    ) -> PersistenceResult<Vec<i64>> {
        let rows: Vec<i64> = sqlx::query_scalar(
            "SELECT `timestamp` FROM open_interest_history WHERE symbol = ? ORDER BY `timestamp` DESC LIMIT ?",
        )
        .bind(symbol.as_str())
        .bind(limit as u64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("MySQL pool closed");
    }
}

/// Server error number, if `e` came from MySQL itself.
fn mysql_error_number(e: &sqlx::Error) -> Option<u16> {
    match e {
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(MySqlDatabaseError::number),
        _ => None,
    }
}

/// Only "duplicate key name" means the index is in place.
fn index_already_exists(code: Option<u16>) -> bool {
    code == Some(ER_DUP_KEYNAME)
}

fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
