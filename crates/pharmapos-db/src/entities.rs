//! # Entity Definitions
//!
//! Static schema descriptors, one per entity family.
//!
//! ## Why Not a Migrator?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A classic migrator assumes ONE database created at deploy time.        │
//! │                                                                         │
//! │  Here every tenant gets its own SQLite file, created the first time     │
//! │  the shop is touched. Each entity's DDL is idempotent                   │
//! │  (CREATE TABLE IF NOT EXISTS) and is applied on first registration      │
//! │  against that tenant's database.                                        │
//! │                                                                         │
//! │  Registration contract:                                                 │
//! │  • first registration runs the DDL and caches the definition            │
//! │  • re-registering the same definition is a no-op                        │
//! │  • re-registering the same NAME with a different shape fails loudly     │
//! │    (SchemaMismatch) - two disagreeing definitions is a deploy bug       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Timestamps are stored as UTC text, money as integer cents, enums as
//! lowercase text matching the sqlx::Type derives in pharmapos-core.

/// A static entity descriptor: name, main table, idempotent DDL.
///
/// Definitions are `&'static` by design; the registry compares identity by
/// DDL content, so two binaries linking different shapes under one name
/// cannot silently coexist.
#[derive(Debug)]
pub struct EntityDef {
    /// Logical entity name ("Medicine"), the registration key.
    pub name: &'static str,
    /// Main table the entity lives in.
    pub table: &'static str,
    /// Idempotent DDL: tables plus indexes, semicolon-separated.
    pub ddl: &'static str,
}

// =============================================================================
// Catalog
// =============================================================================

/// Medicines: the per-shop catalog.
pub static MEDICINES: EntityDef = EntityDef {
    name: "Medicine",
    table: "medicines",
    ddl: r#"
CREATE TABLE IF NOT EXISTS medicines (
    id               TEXT PRIMARY KEY,
    slug             TEXT NOT NULL UNIQUE,
    name             TEXT NOT NULL,
    generic_name     TEXT,
    dose_form        TEXT NOT NULL DEFAULT 'other',
    strength         TEXT,
    manufacturer     TEXT,
    unit_price_cents INTEGER NOT NULL DEFAULT 0,
    pack_size        INTEGER,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_medicines_name ON medicines(name);
CREATE INDEX IF NOT EXISTS idx_medicines_generic_name ON medicines(generic_name);
"#,
};

// =============================================================================
// Stock
// =============================================================================

/// Stock batches: what is actually on the shelf.
///
/// The CHECK on `total_units` backs up the conditional decrement: even a
/// buggy write path cannot push stock below zero.
pub static STOCK_BATCHES: EntityDef = EntityDef {
    name: "ShopStockBatch",
    table: "stock_batches",
    ddl: r#"
CREATE TABLE IF NOT EXISTS stock_batches (
    id                   TEXT PRIMARY KEY,
    medicine_id          TEXT NOT NULL REFERENCES medicines(id),
    medicine_name        TEXT NOT NULL,
    batch_number         TEXT NOT NULL,
    boxes                INTEGER NOT NULL,
    cartons_per_box      INTEGER NOT NULL,
    strips_per_carton    INTEGER NOT NULL,
    units_per_strip      INTEGER NOT NULL,
    total_units          INTEGER NOT NULL CHECK (total_units >= 0),
    expiry_date          TEXT,
    purchase_price_cents INTEGER NOT NULL DEFAULT 0,
    selling_price_cents  INTEGER NOT NULL DEFAULT 0,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_stock_batches_medicine ON stock_batches(medicine_id);
CREATE INDEX IF NOT EXISTS idx_stock_batches_expiry ON stock_batches(expiry_date);
"#,
};

// =============================================================================
// Sales
// =============================================================================

/// Sales and their line items.
///
/// Items cascade with their sale; they are one aggregate and are always
/// written in the same transaction. Batch ids on items are snapshots, not
/// foreign keys: deleting a depleted batch must never touch sale history.
pub static SALES: EntityDef = EntityDef {
    name: "Sale",
    table: "sales",
    ddl: r#"
CREATE TABLE IF NOT EXISTS sales (
    id                    TEXT PRIMARY KEY,
    invoice_id            TEXT NOT NULL UNIQUE,
    seller_id             TEXT NOT NULL,
    issued_by             TEXT,
    customer_name         TEXT,
    customer_phone        TEXT,
    subtotal_cents        INTEGER NOT NULL DEFAULT 0,
    discount_type         TEXT NOT NULL DEFAULT 'fixed',
    discount_value        INTEGER NOT NULL DEFAULT 0,
    discount_amount_cents INTEGER NOT NULL DEFAULT 0,
    items_discount_cents  INTEGER NOT NULL DEFAULT 0,
    total_discount_cents  INTEGER NOT NULL DEFAULT 0,
    total_cents           INTEGER NOT NULL DEFAULT 0,
    payment_status        TEXT NOT NULL,
    paid_amount_cents     INTEGER NOT NULL DEFAULT 0,
    payment_type          TEXT,
    transaction_id        TEXT,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sales_created_at ON sales(created_at);
CREATE INDEX IF NOT EXISTS idx_sales_seller ON sales(seller_id);
CREATE INDEX IF NOT EXISTS idx_sales_payment_status ON sales(payment_status);
CREATE INDEX IF NOT EXISTS idx_sales_customer_name ON sales(customer_name);
CREATE TABLE IF NOT EXISTS sale_items (
    id                   TEXT PRIMARY KEY,
    sale_id              TEXT NOT NULL REFERENCES sales(id) ON DELETE CASCADE,
    line_no              INTEGER NOT NULL,
    batch_id             TEXT NOT NULL,
    medicine_name        TEXT NOT NULL,
    dose_form            TEXT,
    unit_price_cents     INTEGER NOT NULL DEFAULT 0,
    original_price_cents INTEGER NOT NULL DEFAULT 0,
    discount_type        TEXT,
    discount_value       INTEGER,
    quantity             INTEGER NOT NULL,
    subtotal_cents       INTEGER NOT NULL DEFAULT 0,
    stock_left           INTEGER,
    batch_number         TEXT,
    expiry_date          TEXT,
    created_at           TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sale_items_sale ON sale_items(sale_id);
CREATE INDEX IF NOT EXISTS idx_sale_items_medicine_name ON sale_items(medicine_name);
"#,
};

// =============================================================================
// Purchase Orders
// =============================================================================

pub static PURCHASE_ORDERS: EntityDef = EntityDef {
    name: "PurchaseOrder",
    table: "purchase_orders",
    ddl: r#"
CREATE TABLE IF NOT EXISTS purchase_orders (
    id             TEXT PRIMARY KEY,
    medicine_name  TEXT NOT NULL,
    quantity_boxes INTEGER NOT NULL DEFAULT 0,
    quantity_units INTEGER NOT NULL DEFAULT 0,
    note           TEXT,
    status         TEXT NOT NULL DEFAULT 'pending',
    requested_by   TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_purchase_orders_status ON purchase_orders(status);
"#,
};

// =============================================================================
// Users (Directory Namespace)
// =============================================================================

/// Users live in the shared `_directory` namespace, not in tenant databases.
/// One account row per principal across all shops.
pub static USERS: EntityDef = EntityDef {
    name: "User",
    table: "users",
    ddl: r#"
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    slug          TEXT NOT NULL UNIQUE,
    role          TEXT NOT NULL,
    shop_name     TEXT,
    location      TEXT,
    phone         TEXT,
    password_hash TEXT NOT NULL,
    worker_slug   TEXT,
    is_deleted    INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_worker_slug ON users(worker_slug);
"#,
};

/// Every tenant-side entity, in dependency order (medicines before batches).
///
/// The user directory is not in this list; it belongs to the `_directory`
/// namespace and is registered by the user repository alone.
pub fn tenant_entities() -> [&'static EntityDef; 4] {
    [&MEDICINES, &STOCK_BATCHES, &SALES, &PURCHASE_ORDERS]
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_entity_names_and_tables_are_unique() {
        let mut names = HashSet::new();
        let mut tables = HashSet::new();
        for def in tenant_entities().into_iter().chain([&USERS]) {
            assert!(names.insert(def.name), "duplicate entity name {}", def.name);
            assert!(tables.insert(def.table), "duplicate table {}", def.table);
        }
    }

    #[test]
    fn test_ddl_is_idempotent() {
        for def in tenant_entities().into_iter().chain([&USERS]) {
            assert!(
                def.ddl.contains("CREATE TABLE IF NOT EXISTS"),
                "{} DDL must be re-runnable",
                def.name
            );
            assert!(def.ddl.contains(def.table));
        }
    }

    #[test]
    fn test_stock_ddl_guards_negative_units() {
        assert!(STOCK_BATCHES.ddl.contains("CHECK (total_units >= 0)"));
    }
}
