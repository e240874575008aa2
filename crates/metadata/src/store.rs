//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::lock::{LockGuard, LockProvider};
use crate::repos::{ComponentRepo, ModelRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Schema (embedded).
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Combined metadata store trait.
///
/// Orchestrators depend on this; the SQLite implementation below is the
/// production store and the test double alike (a temp-file database is an
/// adequate in-memory fake).
#[async_trait]
pub trait MetadataStore: ModelRepo + ComponentRepo + LockProvider + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    lock_poll: Duration,
}

impl SqliteStore {
    /// Create a new SQLite store.
    pub async fn new(path: impl AsRef<Path>, lock_poll_ms: Option<u64>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // avoids persistent "database is locked" failures under
            // concurrent sync operations.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            lock_poll: Duration::from_millis(lock_poll_ms.unwrap_or(100)),
        };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // Multi-statement script, so it must not go through a prepared query.
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Repository implementations for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::{ComponentFilter, ComponentMetaRow, ModelRow};
    use modelvault_core::ModelIdentity;
    use time::OffsetDateTime;
    use uuid::Uuid;

    const MODEL_COLUMNS: &str = "role, party_id, model_id, model_version, \
         archive_sha256, archive_from_host, created_at, updated_at";

    const COMPONENT_COLUMNS: &str = "id, model_id, model_version, role, party_id, \
         component_name, component_module_name, model_alias, model_proto_index, \
         run_parameters, archive_sha256, archive_from_host, created_at, updated_at";

    /// Build the WHERE clause for a component filter. Binds are appended in
    /// the same order by `bind_filter`.
    fn filter_clause(filter: &ComponentFilter) -> String {
        let mut clause = String::from(
            "role = ? AND party_id = ? AND model_id = ? AND model_version = ?",
        );
        if filter.component_name().is_some() {
            clause.push_str(" AND component_name = ?");
        }
        if filter.model_alias().is_some() {
            clause.push_str(" AND model_alias = ?");
        }
        clause
    }

    fn bind_filter<'q, O>(
        query: sqlx::query::QueryAs<'q, Sqlite, O, sqlx::sqlite::SqliteArguments<'q>>,
        filter: &'q ComponentFilter,
    ) -> sqlx::query::QueryAs<'q, Sqlite, O, sqlx::sqlite::SqliteArguments<'q>> {
        let identity = filter.identity();
        let mut query = query
            .bind(identity.role())
            .bind(identity.party_id())
            .bind(identity.model_id())
            .bind(identity.model_version());
        if let Some(component_name) = filter.component_name() {
            query = query.bind(component_name);
        }
        if let Some(model_alias) = filter.model_alias() {
            query = query.bind(model_alias);
        }
        query
    }

    #[async_trait]
    impl ModelRepo for SqliteStore {
        async fn get_model(&self, identity: &ModelIdentity) -> MetadataResult<Option<ModelRow>> {
            let row = sqlx::query_as::<_, ModelRow>(&format!(
                "SELECT {MODEL_COLUMNS} FROM model_info \
                 WHERE role = ?1 AND party_id = ?2 AND model_id = ?3 AND model_version = ?4"
            ))
            .bind(identity.role())
            .bind(identity.party_id())
            .bind(identity.model_id())
            .bind(identity.model_version())
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn create_model(&self, row: &ModelRow) -> MetadataResult<()> {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO model_info \
                 (role, party_id, model_id, model_version, archive_sha256, archive_from_host, \
                  created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&row.role)
            .bind(&row.party_id)
            .bind(&row.model_id)
            .bind(&row.model_version)
            .bind(&row.archive_sha256)
            .bind(&row.archive_from_host)
            .bind(row.created_at)
            .bind(row.updated_at)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::AlreadyExists(format!(
                    "model record for {}#{}#{} v{}",
                    row.role, row.party_id, row.model_id, row.model_version
                )));
            }
            Ok(())
        }

        async fn update_model_archive(
            &self,
            identity: &ModelIdentity,
            archive_sha256: &str,
            archive_from_host: &str,
        ) -> MetadataResult<ModelRow> {
            let result = sqlx::query(
                "UPDATE model_info SET archive_sha256 = ?1, archive_from_host = ?2, updated_at = ?3 \
                 WHERE role = ?4 AND party_id = ?5 AND model_id = ?6 AND model_version = ?7",
            )
            .bind(archive_sha256)
            .bind(archive_from_host)
            .bind(OffsetDateTime::now_utc())
            .bind(identity.role())
            .bind(identity.party_id())
            .bind(identity.model_id())
            .bind(identity.model_version())
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("model record for {identity}")));
            }

            self.get_model(identity).await?.ok_or_else(|| {
                MetadataError::Internal(format!("model record for {identity} vanished after update"))
            })
        }
    }

    #[async_trait]
    impl ComponentRepo for SqliteStore {
        async fn find_components(
            &self,
            filter: &ComponentFilter,
        ) -> MetadataResult<Vec<ComponentMetaRow>> {
            let sql = format!(
                "SELECT {COMPONENT_COLUMNS} FROM component_meta WHERE {} \
                 ORDER BY component_name, model_alias",
                filter_clause(filter)
            );
            let rows = bind_filter(sqlx::query_as::<_, ComponentMetaRow>(&sql), filter)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }

        async fn count_components(&self, filter: &ComponentFilter) -> MetadataResult<u64> {
            let sql = format!(
                "SELECT COUNT(*) FROM component_meta WHERE {}",
                filter_clause(filter)
            );
            let count: i64 = bind_filter(sqlx::query_as::<_, (i64,)>(&sql), filter)
                .fetch_one(&self.pool)
                .await?
                .0;
            Ok(count as u64)
        }

        async fn insert_components(&self, rows: &[ComponentMetaRow]) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;
            for row in rows {
                sqlx::query(
                    "INSERT INTO component_meta \
                     (model_id, model_version, role, party_id, component_name, \
                      component_module_name, model_alias, model_proto_index, run_parameters, \
                      archive_sha256, archive_from_host, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                )
                .bind(&row.model_id)
                .bind(&row.model_version)
                .bind(&row.role)
                .bind(&row.party_id)
                .bind(&row.component_name)
                .bind(&row.component_module_name)
                .bind(&row.model_alias)
                .bind(&row.model_proto_index)
                .bind(&row.run_parameters)
                .bind(&row.archive_sha256)
                .bind(&row.archive_from_host)
                .bind(row.created_at)
                .bind(row.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(|err| match &err {
                    sqlx::Error::Database(db) if db.is_unique_violation() => {
                        MetadataError::AlreadyExists(format!(
                            "component meta row for {} alias {}",
                            row.component_name, row.model_alias
                        ))
                    }
                    _ => MetadataError::Database(err),
                })?;
            }
            tx.commit().await?;
            Ok(())
        }

        async fn update_component_archive(
            &self,
            filter: &ComponentFilter,
            archive_sha256: &str,
            archive_from_host: &str,
        ) -> MetadataResult<u64> {
            let sql = format!(
                "UPDATE component_meta SET archive_sha256 = ?, archive_from_host = ?, \
                 updated_at = ? WHERE {}",
                filter_clause(filter)
            );
            let identity = filter.identity();
            let mut query = sqlx::query(&sql)
                .bind(archive_sha256)
                .bind(archive_from_host)
                .bind(OffsetDateTime::now_utc())
                .bind(identity.role())
                .bind(identity.party_id())
                .bind(identity.model_id())
                .bind(identity.model_version());
            if let Some(component_name) = filter.component_name() {
                query = query.bind(component_name);
            }
            if let Some(model_alias) = filter.model_alias() {
                query = query.bind(model_alias);
            }
            let result = query.execute(&self.pool).await?;
            Ok(result.rows_affected())
        }
    }

    #[async_trait]
    impl LockProvider for SqliteStore {
        async fn acquire_lock(&self, key: &str) -> MetadataResult<LockGuard> {
            let owner = Uuid::new_v4().to_string();

            // Unbounded wait: keep trying until the INSERT wins.
            loop {
                let result = sqlx::query(
                    "INSERT OR IGNORE INTO sync_locks (lock_key, owner, acquired_at) \
                     VALUES (?1, ?2, ?3)",
                )
                .bind(key)
                .bind(&owner)
                .bind(OffsetDateTime::now_utc())
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 1 {
                    break;
                }
                tokio::time::sleep(self.lock_poll).await;
            }

            tracing::debug!(key, "acquired sync lock");

            // The guard holds the sender; dropping it (on any exit path,
            // cancellation included) wakes the janitor, which deletes the row.
            let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
            let pool = self.pool.clone();
            let lock_key = key.to_string();
            tokio::spawn(async move {
                let _ = release_rx.await;
                match sqlx::query("DELETE FROM sync_locks WHERE lock_key = ?1 AND owner = ?2")
                    .bind(&lock_key)
                    .bind(&owner)
                    .execute(&pool)
                    .await
                {
                    Ok(_) => tracing::debug!(key = %lock_key, "released sync lock"),
                    Err(err) => {
                        tracing::warn!(key = %lock_key, error = %err, "failed to release sync lock")
                    }
                }
            });

            Ok(LockGuard::new(key.to_string(), release_tx))
        }
    }
}
