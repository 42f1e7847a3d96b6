//! # Store Facade
//!
//! [`PharmacyStore`] is the single entry point callers hold. It owns the
//! connection registry and hands out repositories; nothing else in the API
//! surface touches pools directly.
//!
//! ## Usage
//! ```rust,ignore
//! use pharmapos_db::{PharmacyStore, StoreConfig};
//! use pharmapos_core::{resolve_tenant, TenantSlug};
//!
//! let store = PharmacyStore::new(StoreConfig::new("./data"));
//!
//! // Resolve the caller's namespace from their identity claims...
//! let tenant = resolve_tenant(&identity)?;
//!
//! // ...and run operations against it.
//! let sale = store.sales().create_sale(&tenant, new_sale).await?;
//! let report = store.reports().dashboard(&tenant, &scope, range).await?;
//! ```
//!
//! The registry is shared: cloning the store, or building repositories from
//! it, never opens a second pool for a tenant. Handing a registry in through
//! [`PharmacyStore::with_registry`] lets tests and embedding applications
//! control pool lifetime themselves.

use std::sync::Arc;

use tracing::info;

use pharmapos_core::TenantSlug;

use crate::config::StoreConfig;
use crate::registry::ConnectionRegistry;
use crate::repository::medicine::MedicineRepository;
use crate::repository::purchase::PurchaseOrderRepository;
use crate::repository::report::ReportRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::stock::StockRepository;
use crate::repository::user::UserRepository;

/// Facade over the tenant registry and every repository.
#[derive(Debug, Clone)]
pub struct PharmacyStore {
    registry: Arc<ConnectionRegistry>,
}

impl PharmacyStore {
    /// Creates a store with its own registry.
    pub fn new(config: StoreConfig) -> Self {
        info!(data_dir = %config.data_dir.display(), "Initializing pharmacy store");
        PharmacyStore {
            registry: Arc::new(ConnectionRegistry::new(config)),
        }
    }

    /// Creates a store over an existing registry.
    pub fn with_registry(registry: Arc<ConnectionRegistry>) -> Self {
        PharmacyStore { registry }
    }

    /// The underlying registry, for callers that need pool-level access.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The medicine catalog.
    pub fn catalog(&self) -> MedicineRepository {
        MedicineRepository::new(self.registry.clone())
    }

    /// Batch intake and the stock ledger.
    pub fn stock(&self) -> StockRepository {
        StockRepository::new(self.registry.clone())
    }

    /// Checkout and sale history.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.registry.clone())
    }

    /// Dashboards, leaderboards and the paginated sales screen.
    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.registry.clone())
    }

    /// Restock requests.
    pub fn purchase_orders(&self) -> PurchaseOrderRepository {
        PurchaseOrderRepository::new(self.registry.clone())
    }

    /// The account directory.
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.registry.clone())
    }

    /// Whether the shared directory database answers queries. This is the
    /// probe a readiness endpoint should hit.
    pub async fn health_check(&self) -> bool {
        match self.registry.directory().await {
            Ok(db) => db.health_check().await,
            Err(_) => false,
        }
    }

    /// Whether one tenant's database answers queries. Opens it if this is
    /// the first contact.
    pub async fn tenant_health(&self, tenant: &TenantSlug) -> bool {
        match self.registry.tenant(tenant).await {
            Ok(db) => db.health_check().await,
            Err(_) => false,
        }
    }

    /// Closes every open pool. Repository calls after this fail.
    pub async fn close(&self) {
        info!("Closing pharmacy store");
        self.registry.close_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::medicine::NewMedicine;

    fn store() -> PharmacyStore {
        PharmacyStore::new(StoreConfig::ephemeral())
    }

    #[tokio::test]
    async fn test_repositories_share_the_registry() {
        let store = store();
        let tenant = TenantSlug::new("test-pharmacy").unwrap();

        store
            .catalog()
            .create(
                &tenant,
                NewMedicine {
                    name: "Panadol".into(),
                    generic_name: None,
                    dose_form: Default::default(),
                    strength: None,
                    manufacturer: None,
                    unit_price_cents: 100,
                    pack_size: None,
                },
            )
            .await
            .unwrap();

        // A second repository sees the same database, and the registry still
        // holds exactly one tenant pool.
        let page = store.catalog().list(&tenant, None, None).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(store.registry().open_count().await, 1);
    }

    #[tokio::test]
    async fn test_health_checks() {
        let store = store();
        let tenant = TenantSlug::new("test-pharmacy").unwrap();
        assert!(store.health_check().await);
        assert!(store.tenant_health(&tenant).await);
    }

    #[tokio::test]
    async fn test_with_registry_shares_pools() {
        let registry = Arc::new(ConnectionRegistry::new(StoreConfig::ephemeral()));
        let a = PharmacyStore::with_registry(registry.clone());
        let b = PharmacyStore::with_registry(registry.clone());
        let tenant = TenantSlug::new("test-pharmacy").unwrap();

        a.registry().tenant(&tenant).await.unwrap();
        b.registry().tenant(&tenant).await.unwrap();
        assert_eq!(registry.open_count().await, 1);
    }
}
