//! # Repository Module
//!
//! Tenant-aware database repositories.
//!
//! ## Repository Pattern, Multi-Tenant Flavor
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every repository holds an Arc<ConnectionRegistry> and takes the        │
//! │  tenant slug PER CALL. The slug is threaded, never stored:              │
//! │                                                                         │
//! │  store.sales().create_sale(&tenant, new_sale)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SaleRepository                                                         │
//! │       │  registry.model(&tenant, &entities::SALES)                      │
//! │       ▼                                                                 │
//! │  ModelHandle ──► that shop's own SQLite file                            │
//! │                                                                         │
//! │  A repository instance is therefore safe to share across requests       │
//! │  serving different shops; nothing about it is tenant-specific.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`MedicineRepository`](medicine::MedicineRepository) - catalog CRUD, search, bulk import
//! - [`StockRepository`](stock::StockRepository) - batch intake and the stock ledger
//! - [`SaleRepository`](sale::SaleRepository) - atomic sale creation, payment, export
//! - [`ReportRepository`](report::ReportRepository) - sales history, dashboard, leaderboard
//! - [`PurchaseOrderRepository`](purchase::PurchaseOrderRepository) - restock requests
//! - [`UserRepository`](user::UserRepository) - accounts in the shared directory

pub mod medicine;
pub mod purchase;
pub mod report;
pub mod sale;
pub mod stock;
pub mod user;

// =============================================================================
// Pagination
// =============================================================================

/// One page of results plus the metadata a list screen needs.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total matching rows across all pages.
    pub total: i64,
    /// 1-based page number that was served.
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        Page {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}
