//! # Connection Registry
//!
//! One SQLite database per shop, opened on first touch and cached for the
//! life of the process.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ConnectionRegistry                               │
//! │                                                                         │
//! │  tenant("mediplus")                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌───────────────────────────────┐  hit                                 │
//! │  │  namespaces: RwLock<HashMap>  │ ──────► Arc<TenantDb> (cached)       │
//! │  └───────────────────────────────┘                                      │
//! │       │ miss                                                            │
//! │       ▼                                                                 │
//! │  open_lock: Mutex ── serialize first opens, re-check, then:             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqlitePool ──► {data_dir}/mediplus.db   (WAL, NORMAL, FKs on)          │
//! │                                                                         │
//! │  Namespaces:                                                            │
//! │  • one per tenant slug        ("mediplus" → mediplus.db)                │
//! │  • "_directory" for accounts  (underscore is outside the slug           │
//! │    alphabet, so no shop can ever collide with it)                       │
//! │                                                                         │
//! │  Entries live until process exit. A failed open inserts nothing;        │
//! │  the next call retries from scratch.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! Every tenant database runs in WAL mode: readers don't block the cashier
//! writing a sale, and a crash mid-write recovers cleanly.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use pharmapos_core::TenantSlug;

use crate::config::StoreConfig;
use crate::entities::EntityDef;
use crate::error::{DbError, DbResult};

/// Namespace holding user accounts, shared across all shops.
///
/// `TenantSlug` rejects underscores, so this name can never be claimed by a
/// real tenant.
pub const DIRECTORY_NAMESPACE: &str = "_directory";

// =============================================================================
// Tenant Database Handle
// =============================================================================

/// An open per-namespace database: pool plus the entities registered on it.
#[derive(Debug)]
pub struct TenantDb {
    namespace: String,
    pool: SqlitePool,
    entities: RwLock<HashMap<&'static str, &'static EntityDef>>,
}

impl TenantDb {
    /// The namespace this database belongs to (tenant slug or `_directory`).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The underlying connection pool.
    ///
    /// Prefer going through a [`ModelHandle`] so the entity schema is
    /// guaranteed to exist before the first query.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Registers an entity on this database, applying its DDL on first sight.
    ///
    /// Re-registering the same definition is a no-op. Registering a
    /// *different* shape under an already-registered name returns
    /// [`DbError::SchemaMismatch`]: two disagreeing definitions for one
    /// entity is a deploy bug, not something to paper over at runtime.
    pub async fn register_entity(&self, def: &'static EntityDef) -> DbResult<()> {
        {
            let registered = self.entities.read().await;
            if let Some(existing) = registered.get(def.name) {
                return Self::check_same_shape(existing, def, &self.namespace);
            }
        }

        let mut registered = self.entities.write().await;
        // Re-check: another task may have registered while we waited.
        if let Some(existing) = registered.get(def.name) {
            return Self::check_same_shape(existing, def, &self.namespace);
        }

        debug!(
            namespace = %self.namespace,
            entity = def.name,
            "Registering entity schema"
        );

        sqlx::raw_sql(def.ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DbError::QueryFailed(format!("applying schema for entity '{}': {e}", def.name))
            })?;

        registered.insert(def.name, def);
        Ok(())
    }

    fn check_same_shape(
        existing: &'static EntityDef,
        candidate: &'static EntityDef,
        namespace: &str,
    ) -> DbResult<()> {
        if std::ptr::eq(existing, candidate) || existing.ddl == candidate.ddl {
            Ok(())
        } else {
            Err(DbError::SchemaMismatch {
                entity: candidate.name.to_string(),
                tenant: namespace.to_string(),
            })
        }
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Model Handle
// =============================================================================

/// A registered entity bound to one namespace's pool.
///
/// Constructed via [`ConnectionRegistry::model`]; holding one proves the
/// entity's tables exist on that tenant's database.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    db: Arc<TenantDb>,
    def: &'static EntityDef,
}

impl ModelHandle {
    /// Pool of the namespace this model is bound to.
    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    /// Main table name for the entity.
    pub fn table(&self) -> &'static str {
        self.def.table
    }

    /// Namespace this handle is bound to.
    pub fn namespace(&self) -> &str {
        self.db.namespace()
    }
}

// =============================================================================
// Connection Registry
// =============================================================================

/// Process-wide cache of per-tenant databases.
///
/// ## Guarantees
/// * at most one pool is ever opened per namespace, even under racing
///   first requests
/// * a failed open leaves no cache entry, so the next request retries
/// * entries are never evicted; the cache lives as long as the process
///
/// ## Usage
/// ```rust,ignore
/// let registry = Arc::new(ConnectionRegistry::new(StoreConfig::from_env()?));
/// let medicines = registry.model(&slug, &entities::MEDICINES).await?;
/// sqlx::query("SELECT COUNT(*) FROM medicines")
///     .fetch_one(medicines.pool())
///     .await?;
/// ```
#[derive(Debug)]
pub struct ConnectionRegistry {
    config: StoreConfig,
    namespaces: RwLock<HashMap<String, Arc<TenantDb>>>,
    /// Serializes first opens. Losers of an open race find the winner's
    /// entry on the re-check instead of opening a second pool.
    open_lock: Mutex<()>,
}

impl ConnectionRegistry {
    /// Creates an empty registry. No database is opened until a namespace
    /// is first requested.
    pub fn new(config: StoreConfig) -> Self {
        ConnectionRegistry {
            config,
            namespaces: RwLock::new(HashMap::new()),
            open_lock: Mutex::new(()),
        }
    }

    /// The configuration this registry opens databases with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the database for a tenant, opening it on first touch.
    pub async fn tenant(&self, slug: &TenantSlug) -> DbResult<Arc<TenantDb>> {
        self.namespace_db(slug.as_str()).await
    }

    /// Returns the shared directory database (user accounts).
    pub async fn directory(&self) -> DbResult<Arc<TenantDb>> {
        self.namespace_db(DIRECTORY_NAMESPACE).await
    }

    /// Opens the tenant database and registers an entity on it in one step.
    pub async fn model(
        &self,
        slug: &TenantSlug,
        def: &'static EntityDef,
    ) -> DbResult<ModelHandle> {
        let db = self.tenant(slug).await?;
        db.register_entity(def).await?;
        Ok(ModelHandle { db, def })
    }

    /// Like [`model`](Self::model), for the shared directory namespace.
    pub async fn directory_model(&self, def: &'static EntityDef) -> DbResult<ModelHandle> {
        let db = self.directory().await?;
        db.register_entity(def).await?;
        Ok(ModelHandle { db, def })
    }

    /// Number of namespaces currently open.
    pub async fn open_count(&self) -> usize {
        self.namespaces.read().await.len()
    }

    /// Closes every open pool.
    ///
    /// ## When To Call
    /// On process shutdown. After this, all operations on previously
    /// obtained handles fail.
    pub async fn close_all(&self) {
        info!("Closing all tenant database pools");
        let namespaces = self.namespaces.read().await;
        for db in namespaces.values() {
            db.pool.close().await;
        }
    }

    async fn namespace_db(&self, namespace: &str) -> DbResult<Arc<TenantDb>> {
        if let Some(db) = self.namespaces.read().await.get(namespace) {
            return Ok(db.clone());
        }

        let _open_guard = self.open_lock.lock().await;

        // Re-check: the namespace may have been opened while we waited.
        if let Some(db) = self.namespaces.read().await.get(namespace) {
            return Ok(db.clone());
        }

        info!(namespace = %namespace, "Opening namespace database");
        let pool = self.open_pool(namespace).await?;

        let db = Arc::new(TenantDb {
            namespace: namespace.to_string(),
            pool,
            entities: RwLock::new(HashMap::new()),
        });

        self.namespaces
            .write()
            .await
            .insert(namespace.to_string(), db.clone());

        info!(namespace = %namespace, "Namespace database ready");
        Ok(db)
    }

    async fn open_pool(&self, namespace: &str) -> DbResult<SqlitePool> {
        let connect_options = if self.config.ephemeral {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            std::fs::create_dir_all(&self.config.data_dir).map_err(|e| {
                DbError::ConnectionFailed(format!(
                    "cannot create data directory {}: {}",
                    self.config.data_dir.display(),
                    e
                ))
            })?;

            let path = self.config.database_path(namespace);
            // sqlite://path + mode=rwc creates the file if it doesn't exist
            let connect_url = format!("sqlite://{}?mode=rwc", path.display());
            SqliteConnectOptions::from_str(&connect_url)
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        };

        let connect_options = connect_options
            // WAL mode: readers don't block writers, writers don't block readers
            .journal_mode(SqliteJournalMode::Wal)
            // NORMAL synchronous: safe from corruption, may lose last txn on crash
            .synchronous(SqliteSynchronous::Normal)
            // SQLite ships with foreign keys off; we rely on them
            .foreign_keys(true)
            .create_if_missing(true);

        // An in-memory database exists per connection; more than one
        // connection would mean disjoint empty databases.
        let max_connections = if self.config.ephemeral {
            1
        } else {
            self.config.max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(self.config.min_connections.min(max_connections))
            .acquire_timeout(self.config.acquire_timeout)
            .idle_timeout(Some(self.config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(
            namespace = %namespace,
            max_connections,
            "Namespace pool created"
        );

        Ok(pool)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities;

    fn slug(s: &str) -> TenantSlug {
        TenantSlug::new(s).unwrap()
    }

    fn ephemeral_registry() -> ConnectionRegistry {
        ConnectionRegistry::new(StoreConfig::ephemeral())
    }

    #[tokio::test]
    async fn test_open_is_cached_per_tenant() {
        let registry = ephemeral_registry();
        let shop = slug("shop-a");

        let first = registry.tenant(&shop).await.unwrap();
        let second = registry.tenant(&shop).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.open_count().await, 1);
        assert!(first.health_check().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opens_share_one_database() {
        let registry = Arc::new(ephemeral_registry());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.tenant(&slug("race-shop")).await.unwrap()
            }));
        }

        let mut dbs = Vec::new();
        for handle in handles {
            dbs.push(handle.await.unwrap());
        }

        assert_eq!(registry.open_count().await, 1);
        for db in &dbs[1..] {
            assert!(Arc::ptr_eq(&dbs[0], db));
        }
    }

    #[tokio::test]
    async fn test_tenant_databases_are_isolated() {
        let registry = ephemeral_registry();
        let now = chrono::Utc::now();

        let shop_a = registry
            .model(&slug("shop-a"), &entities::MEDICINES)
            .await
            .unwrap();
        let shop_b = registry
            .model(&slug("shop-b"), &entities::MEDICINES)
            .await
            .unwrap();

        sqlx::query(
            "INSERT INTO medicines (id, slug, name, dose_form, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind("med-1")
        .bind("panadol-500mg")
        .bind("Panadol")
        .bind("tablet")
        .bind(now)
        .bind(now)
        .execute(shop_a.pool())
        .await
        .unwrap();

        let in_a: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medicines")
            .fetch_one(shop_a.pool())
            .await
            .unwrap();
        let in_b: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medicines")
            .fetch_one(shop_b.pool())
            .await
            .unwrap();

        assert_eq!(in_a, 1);
        assert_eq!(in_b, 0);
        assert_eq!(registry.open_count().await, 2);
    }

    #[tokio::test]
    async fn test_entity_registration_is_idempotent() {
        let registry = ephemeral_registry();
        let shop = slug("shop-a");

        registry.model(&shop, &entities::MEDICINES).await.unwrap();
        let handle = registry.model(&shop, &entities::MEDICINES).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medicines")
            .fetch_one(handle.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_conflicting_definition_is_rejected() {
        static ALTERED_MEDICINES: EntityDef = EntityDef {
            name: "Medicine",
            table: "medicines",
            ddl: "CREATE TABLE IF NOT EXISTS medicines (id TEXT PRIMARY KEY);",
        };

        let registry = ephemeral_registry();
        let shop = slug("shop-a");

        registry.model(&shop, &entities::MEDICINES).await.unwrap();
        let err = registry
            .model(&shop, &ALTERED_MEDICINES)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn test_failed_open_leaves_no_entry() {
        // /dev/null is not a directory, so the data dir cannot be created.
        let registry = ConnectionRegistry::new(StoreConfig::new("/dev/null/pharmapos"));

        let err = registry.tenant(&slug("shop-a")).await.unwrap_err();
        assert!(matches!(err, DbError::ConnectionFailed(_)));
        assert_eq!(registry.open_count().await, 0);
    }

    #[tokio::test]
    async fn test_directory_namespace_is_reserved() {
        let registry = ephemeral_registry();

        let directory = registry.directory().await.unwrap();
        assert_eq!(directory.namespace(), DIRECTORY_NAMESPACE);

        // No tenant slug can ever collide with the directory namespace.
        assert!(TenantSlug::new(DIRECTORY_NAMESPACE).is_err());
    }
}
