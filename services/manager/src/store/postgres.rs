//! Postgres node store.
//!
//! Records live in the `nodes` table as JSONB. Driver errors are classified
//! into store error kinds here so the gateway can decide what to retry.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Row;
use thiserror::Error;
use tracing::info;

use super::{NodeStore, StoreError};
use crate::model::{NodeIdentity, NodeRecord};

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of idle connections.
    pub min_connections: u32,

    /// Connection acquire timeout.
    pub acquire_timeout: Duration,

    /// Idle connection timeout.
    pub idle_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/e2m".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl DbConfig {
    /// Load configuration from the environment.
    ///
    /// Returns `None` when `DATABASE_URL` is unset, in which case the manager
    /// runs on the in-memory store.
    pub fn from_env() -> Option<Self> {
        let database_url = std::env::var("DATABASE_URL").ok()?;

        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let min_connections = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        Some(Self {
            database_url,
            max_connections,
            min_connections,
            ..Default::default()
        })
    }
}

/// Errors raised while bringing the database up.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    #[error("migration directory not found; tried {tried}. Last error: {last_error}")]
    MigrationDirNotFound { tried: String, last_error: String },
}

/// [`NodeStore`] backed by Postgres.
#[derive(Clone)]
pub struct PgNodeStore {
    pool: PgPool,
}

impl PgNodeStore {
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect(&config.database_url)
            .await
            .map_err(DbError::Connect)?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run pending migrations from the first directory that loads.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        let candidates = vec![
            std::path::PathBuf::from("./migrations"),
            std::path::PathBuf::from("services/manager/migrations"),
            std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        ];
        let mut last_error: Option<sqlx::migrate::MigrateError> = None;

        for dir in &candidates {
            match sqlx::migrate::Migrator::new(dir.clone()).await {
                Ok(migrator) => {
                    info!(migrations_dir = %dir.display(), "Loaded migrations");
                    migrator.run(&self.pool).await.map_err(DbError::Migration)?;
                    return Ok(());
                }
                Err(e) => last_error = Some(e),
            }
        }

        let tried = candidates
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");

        Err(DbError::MigrationDirNotFound {
            tried,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

/// Map a driver error onto a store error kind.
///
/// I/O, pool exhaustion, SQLSTATE class 08 (connection exception) and
/// serialization/deadlock failures are transient. Everything else is permanent.
pub(crate) fn classify(error: sqlx::Error) -> StoreError {
    let transient = match &error {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| code.starts_with("08") || code == "40001" || code == "40P01")
            .unwrap_or(false),
        _ => false,
    };

    if transient {
        StoreError::Transient(error.to_string())
    } else {
        StoreError::Permanent(error.to_string())
    }
}

#[async_trait]
impl NodeStore for PgNodeStore {
    async fn save(&self, identity: &NodeIdentity, record: &NodeRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO nodes (name, node_type, connection_status, identity, record)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE SET
                node_type = EXCLUDED.node_type,
                connection_status = EXCLUDED.connection_status,
                identity = EXCLUDED.identity,
                record = EXCLUDED.record,
                updated_at = now()
            "#,
        )
        .bind(&record.name)
        .bind(identity.node_type.as_str())
        .bind(identity.connection_status.as_str())
        .bind(Json(identity))
        .bind(Json(record))
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<NodeRecord, StoreError> {
        let row = sqlx::query("SELECT record FROM nodes WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        let Json(record): Json<NodeRecord> = row.try_get("record").map_err(classify)?;
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<NodeIdentity>, StoreError> {
        let rows = sqlx::query("SELECT identity FROM nodes ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        rows.iter()
            .map(|row| {
                row.try_get::<Json<NodeIdentity>, _>("identity")
                    .map(|Json(identity)| identity)
                    .map_err(classify)
            })
            .collect()
    }

    async fn remove(&self, name: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM nodes WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }
}
