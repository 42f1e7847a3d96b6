//! # pharmapos-db: Tenant Registry + Database Layer for PharmaPOS
//!
//! This crate provides database access for the PharmaPOS backend. Every
//! pharmacy is a tenant with its own SQLite database file; accounts live in
//! a shared directory database alongside them.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       PharmaPOS Data Flow                               │
//! │                                                                         │
//! │  Caller (API handler, job, CLI)                                         │
//! │       │  resolve_tenant(identity) ──► TenantSlug                        │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   pharmapos-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌───────────────┐   │   │
//! │  │   │ PharmacyStore │   │  Repositories  │   │ Connection    │   │   │
//! │  │   │  (store.rs)   │──►│ medicine/stock │──►│ Registry      │   │   │
//! │  │   │               │   │ sale/report    │   │ (registry.rs) │   │   │
//! │  │   │ facade        │   │ purchase/user  │   │ one pool per  │   │   │
//! │  │   └───────────────┘   └────────────────┘   │ tenant slug   │   │   │
//! │  │                                            └───────┬───────┘   │   │
//! │  └────────────────────────────────────────────────────┼───────────┘   │
//! │                                                       ▼               │
//! │   data/                                                               │
//! │   ├── _directory.db          ← accounts, shared                       │
//! │   ├── city-care-pharmacy.db  ← one file per shop                      │
//! │   └── mediplus-karachi.db                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Store configuration (data dir, pool sizing)
//! - [`registry`] - Tenant connection registry and entity registration
//! - [`entities`] - Static entity definitions (tables + DDL)
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (medicine, stock, sale, ...)
//! - [`store`] - The [`PharmacyStore`] facade
//!
//! ## Usage
//! ```rust,ignore
//! use pharmapos_db::{PharmacyStore, StoreConfig};
//! use pharmapos_core::resolve_tenant;
//!
//! let store = PharmacyStore::new(StoreConfig::from_env()?);
//! let tenant = resolve_tenant(&identity)?;
//!
//! let sale = store.sales().create_sale(&tenant, new_sale).await?;
//! store.sales().mark_paid(&tenant, &sale.sale.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod entities;
pub mod error;
pub mod registry;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::StoreConfig;
pub use error::{DbError, DbResult};
pub use registry::{ConnectionRegistry, ModelHandle, TenantDb, DIRECTORY_NAMESPACE};
pub use store::PharmacyStore;

// Repository re-exports for convenience
pub use repository::medicine::MedicineRepository;
pub use repository::purchase::PurchaseOrderRepository;
pub use repository::report::ReportRepository;
pub use repository::sale::SaleRepository;
pub use repository::stock::StockRepository;
pub use repository::user::UserRepository;
pub use repository::Page;
