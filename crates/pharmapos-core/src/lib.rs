//! # pharmapos-core: Pure Business Logic for PharmaPOS
//!
//! This crate is the **heart** of PharmaPOS. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       PharmaPOS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  API surface (separate service)                 │   │
//! │  │    auth ──► DTO validation ──► calls into pharmapos-db          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ pharmapos-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │   types   │  │   money   │  │  tenant   │  │  invoice  │   │   │
//! │  │   │ Medicine  │  │   Money   │  │  resolve  │  │  totals   │   │   │
//! │  │   │   Sale    │  │ discounts │  │  scoping  │  │  verify   │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 pharmapos-db (Storage Layer)                    │   │
//! │  │      tenant registry, one SQLite file per pharmacy,             │   │
//! │  │      repositories, reports                                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Medicine, StockBatch, Sale, PurchaseOrder, User)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`tenant`] - Slugs, identity claims, tenant resolution, seller scoping
//! - [`invoice`] - Invoice totals recomputation and verification
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//! 5. **Explicit Tenancy**: tenant slugs are parameters, never ambient state
//!
//! ## Example Usage
//!
//! ```rust
//! use pharmapos_core::money::Money;
//! use pharmapos_core::tenant::{resolve_tenant, Identity, Role};
//!
//! // Workers resolve to their employer's shop
//! let identity = Identity {
//!     sub: "u-123".to_string(),
//!     role: Role::User,
//!     slug: "ali-raza".to_string(),
//!     worker_slug: Some("city-pharmacy".to_string()),
//! };
//! let tenant = resolve_tenant(&identity).unwrap();
//! assert_eq!(tenant.as_str(), "city-pharmacy");
//!
//! // Money never touches floats
//! let price = Money::from_cents(1099);
//! assert_eq!(price.percentage_of(1000).cents(), 110); // 10%
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod invoice;
pub mod money;
pub mod tenant;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use pharmapos_core::Money` instead of
// `use pharmapos_core::money::Money`

pub use error::{CoreError, CoreResult, TenantError, ValidationError};
pub use invoice::{order_totals, price_line, verify_declared_total, OrderTotals, PricedLine};
pub use money::Money;
pub use tenant::{resolve_tenant, slugify, Identity, Role, SellerScope, TenantSlug};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed on a single sale
///
/// ## Business Reason
/// Prevents runaway invoices and keeps receipts printable.
pub const MAX_SALE_ITEMS: usize = 100;

/// Maximum quantity of a single line on a sale
///
/// ## Business Reason
/// Prevents accidental over-selling (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Page size applied when a list query does not name one
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Hard ceiling on page size for every paginated query
pub const MAX_PAGE_SIZE: i64 = 100;
