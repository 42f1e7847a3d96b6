//! # Stock Repository
//!
//! Batch intake and the stock ledger for one shop.
//!
//! ## The Ledger Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Stock never goes negative, and the check is never a read.              │
//! │                                                                         │
//! │  WRONG (read-then-write, racy):                                         │
//! │      let units = SELECT total_units ...        ← another cashier        │
//! │      if units >= qty { UPDATE ... }              sells in between       │
//! │                                                                         │
//! │  RIGHT (single conditional write):                                      │
//! │      UPDATE stock_batches                                               │
//! │      SET    total_units = total_units - ?qty                            │
//! │      WHERE  id = ?id AND total_units >= ?qty                            │
//! │                                                                         │
//! │  rows_affected == 1  → the units were yours                             │
//! │  rows_affected == 0  → missing batch, or not enough stock               │
//! │                                                                         │
//! │  The CHECK constraint on the column is the last line of defence.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unit counts move only through ledger operations (intake, decrement,
//! increment). `update` edits prices and expiry, never `total_units`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use pharmapos_core::validation::{validate_pack_count, validate_pagination, validate_price_cents, validate_quantity};
use pharmapos_core::{CoreError, StockBatch, TenantSlug};

use crate::entities;
use crate::error::{DbError, DbResult};
use crate::registry::{ConnectionRegistry, ModelHandle};
use crate::repository::Page;

const BATCH_COLUMNS: &str = "id, medicine_id, medicine_name, batch_number, boxes, \
     cartons_per_box, strips_per_carton, units_per_strip, total_units, expiry_date, \
     purchase_price_cents, selling_price_cents, created_at, updated_at";

/// Input for taking a delivery into stock.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewStockBatch {
    pub medicine_id: String,
    /// Supplier batch number; generated when absent.
    pub batch_number: Option<String>,
    pub boxes: i64,
    pub cartons_per_box: i64,
    pub strips_per_carton: i64,
    pub units_per_strip: i64,
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub purchase_price_cents: i64,
    #[serde(default)]
    pub selling_price_cents: i64,
}

/// Partial update for a batch's non-ledger fields.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct StockBatchUpdate {
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub purchase_price_cents: Option<i64>,
    pub selling_price_cents: Option<i64>,
}

/// Outcome of a bulk decrement: how many requests found enough stock.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DecrementSummary {
    pub matched: usize,
    pub total: usize,
    /// Batch ids whose decrement did not apply (missing, or short on stock).
    pub failed_ids: Vec<String>,
}

impl DecrementSummary {
    pub fn all_matched(&self) -> bool {
        self.matched == self.total
    }
}

/// Repository for stock batches and the unit ledger.
#[derive(Debug, Clone)]
pub struct StockRepository {
    registry: Arc<ConnectionRegistry>,
}

impl StockRepository {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        StockRepository { registry }
    }

    async fn handle(&self, tenant: &TenantSlug) -> DbResult<ModelHandle> {
        self.registry.model(tenant, &entities::STOCK_BATCHES).await
    }

    /// Takes a delivery into stock.
    ///
    /// Total units are computed server-side from the packing counts
    /// (boxes × cartons × strips × units per strip); the medicine name is
    /// snapshotted onto the batch for receipts and low-stock lists.
    pub async fn intake(&self, tenant: &TenantSlug, new: NewStockBatch) -> DbResult<StockBatch> {
        validate_pack_count("boxes", new.boxes)?;
        validate_pack_count("cartons_per_box", new.cartons_per_box)?;
        validate_pack_count("strips_per_carton", new.strips_per_carton)?;
        validate_pack_count("units_per_strip", new.units_per_strip)?;
        validate_price_cents("purchase_price_cents", new.purchase_price_cents)?;
        validate_price_cents("selling_price_cents", new.selling_price_cents)?;

        let total_units = new
            .boxes
            .checked_mul(new.cartons_per_box)
            .and_then(|units| units.checked_mul(new.strips_per_carton))
            .and_then(|units| units.checked_mul(new.units_per_strip))
            .ok_or(CoreError::AmountOverflow {
                context: "stock intake unit count",
            })?;

        let handle = self.handle(tenant).await?;
        // Entity registration is per-definition; make sure the catalog table
        // exists before the foreign key lookup below.
        self.registry.model(tenant, &entities::MEDICINES).await?;

        let medicine_name: String =
            sqlx::query_scalar("SELECT name FROM medicines WHERE id = ?1")
                .bind(&new.medicine_id)
                .fetch_optional(handle.pool())
                .await?
                .ok_or_else(|| DbError::not_found("Medicine", &new.medicine_id))?;

        let now = Utc::now();
        let batch = StockBatch {
            id: Uuid::new_v4().to_string(),
            medicine_id: new.medicine_id,
            medicine_name,
            batch_number: new.batch_number.unwrap_or_else(generate_batch_number),
            boxes: new.boxes,
            cartons_per_box: new.cartons_per_box,
            strips_per_carton: new.strips_per_carton,
            units_per_strip: new.units_per_strip,
            total_units,
            expiry_date: new.expiry_date,
            purchase_price_cents: new.purchase_price_cents,
            selling_price_cents: new.selling_price_cents,
            created_at: now,
            updated_at: now,
        };

        debug!(
            tenant = %tenant,
            batch_number = %batch.batch_number,
            total_units,
            "Taking stock batch in"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_batches (
                id, medicine_id, medicine_name, batch_number, boxes,
                cartons_per_box, strips_per_carton, units_per_strip, total_units,
                expiry_date, purchase_price_cents, selling_price_cents,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.medicine_id)
        .bind(&batch.medicine_name)
        .bind(&batch.batch_number)
        .bind(batch.boxes)
        .bind(batch.cartons_per_box)
        .bind(batch.strips_per_carton)
        .bind(batch.units_per_strip)
        .bind(batch.total_units)
        .bind(batch.expiry_date)
        .bind(batch.purchase_price_cents)
        .bind(batch.selling_price_cents)
        .bind(batch.created_at)
        .bind(batch.updated_at)
        .execute(handle.pool())
        .await?;

        Ok(batch)
    }

    /// Gets a batch by ID.
    pub async fn get(&self, tenant: &TenantSlug, id: &str) -> DbResult<StockBatch> {
        let handle = self.handle(tenant).await?;

        sqlx::query_as::<_, StockBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM stock_batches WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(handle.pool())
        .await?
        .ok_or_else(|| DbError::not_found("StockBatch", id))
    }

    /// Lists batches, newest intake first.
    pub async fn list(
        &self,
        tenant: &TenantSlug,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> DbResult<Page<StockBatch>> {
        let (page, limit) = validate_pagination(page, limit)?;
        let handle = self.handle(tenant).await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_batches")
            .fetch_one(handle.pool())
            .await?;

        let items = sqlx::query_as::<_, StockBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM stock_batches \
             ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
        ))
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(handle.pool())
        .await?;

        Ok(Page::new(items, total, page, limit))
    }

    /// All batches of one medicine, soonest expiry first (sell those first).
    pub async fn list_for_medicine(
        &self,
        tenant: &TenantSlug,
        medicine_id: &str,
    ) -> DbResult<Vec<StockBatch>> {
        let handle = self.handle(tenant).await?;

        let batches = sqlx::query_as::<_, StockBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM stock_batches \
             WHERE medicine_id = ?1 \
             ORDER BY expiry_date IS NULL, expiry_date ASC, created_at ASC"
        ))
        .bind(medicine_id)
        .fetch_all(handle.pool())
        .await?;

        Ok(batches)
    }

    /// Atomically takes `quantity` units off a batch.
    ///
    /// The decrement only happens if the batch holds at least `quantity`
    /// units; the guard and the write are one statement, so two cashiers
    /// can never oversell the same units. Returns the units left.
    pub async fn decrement(
        &self,
        tenant: &TenantSlug,
        batch_id: &str,
        quantity: i64,
    ) -> DbResult<i64> {
        validate_quantity(quantity)?;
        let handle = self.handle(tenant).await?;

        let result = sqlx::query(
            r#"
            UPDATE stock_batches
            SET total_units = total_units - ?2, updated_at = ?3
            WHERE id = ?1 AND total_units >= ?2
            "#,
        )
        .bind(batch_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(handle.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.decrement_failure(&handle, batch_id, quantity).await);
        }

        let stock_left: i64 = sqlx::query_scalar("SELECT total_units FROM stock_batches WHERE id = ?1")
            .bind(batch_id)
            .fetch_one(handle.pool())
            .await?;

        debug!(tenant = %tenant, batch_id, quantity, stock_left, "Stock decremented");
        Ok(stock_left)
    }

    /// Distinguishes "no such batch" from "not enough stock" after a
    /// conditional decrement matched nothing.
    async fn decrement_failure(
        &self,
        handle: &ModelHandle,
        batch_id: &str,
        requested: i64,
    ) -> DbError {
        let existing: Result<Option<i64>, sqlx::Error> =
            sqlx::query_scalar("SELECT total_units FROM stock_batches WHERE id = ?1")
                .bind(batch_id)
                .fetch_optional(handle.pool())
                .await;

        match existing {
            Ok(Some(_)) => DbError::InsufficientStock {
                batch_id: batch_id.to_string(),
                requested,
            },
            Ok(None) => DbError::not_found("StockBatch", batch_id),
            Err(e) => e.into(),
        }
    }

    /// Applies each decrement independently and reports how many matched.
    ///
    /// This is a bulk ledger tool, not a checkout: requests that find
    /// enough stock commit even when others do not. Sales that need
    /// all-or-nothing go through the sale repository's transaction.
    pub async fn decrement_many(
        &self,
        tenant: &TenantSlug,
        requests: &[(String, i64)],
    ) -> DbResult<DecrementSummary> {
        for (_, quantity) in requests {
            validate_quantity(*quantity)?;
        }
        let handle = self.handle(tenant).await?;
        let now = Utc::now();

        let mut matched = 0usize;
        let mut failed_ids = Vec::new();
        for (batch_id, quantity) in requests {
            let result = sqlx::query(
                r#"
                UPDATE stock_batches
                SET total_units = total_units - ?2, updated_at = ?3
                WHERE id = ?1 AND total_units >= ?2
                "#,
            )
            .bind(batch_id)
            .bind(quantity)
            .bind(now)
            .execute(handle.pool())
            .await?;

            if result.rows_affected() == 1 {
                matched += 1;
            } else {
                failed_ids.push(batch_id.clone());
            }
        }

        let summary = DecrementSummary {
            matched,
            total: requests.len(),
            failed_ids,
        };
        debug!(
            tenant = %tenant,
            matched = summary.matched,
            total = summary.total,
            "Bulk decrement applied"
        );
        Ok(summary)
    }

    /// Puts units back on a batch (returns, corrections). Returns units left.
    pub async fn increment(
        &self,
        tenant: &TenantSlug,
        batch_id: &str,
        quantity: i64,
    ) -> DbResult<i64> {
        validate_quantity(quantity)?;
        let handle = self.handle(tenant).await?;

        let result = sqlx::query(
            r#"
            UPDATE stock_batches
            SET total_units = total_units + ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(batch_id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(handle.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("StockBatch", batch_id));
        }

        let stock_left: i64 = sqlx::query_scalar("SELECT total_units FROM stock_batches WHERE id = ?1")
            .bind(batch_id)
            .fetch_one(handle.pool())
            .await?;

        Ok(stock_left)
    }

    /// Batches that still hold stock and expire within `days` from today.
    pub async fn expiring_within(
        &self,
        tenant: &TenantSlug,
        days: i64,
    ) -> DbResult<Vec<StockBatch>> {
        let handle = self.handle(tenant).await?;
        let cutoff = Utc::now().date_naive() + chrono::Duration::days(days.max(0));

        let batches = sqlx::query_as::<_, StockBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM stock_batches \
             WHERE expiry_date IS NOT NULL AND expiry_date <= ?1 AND total_units > 0 \
             ORDER BY expiry_date ASC"
        ))
        .bind(cutoff)
        .fetch_all(handle.pool())
        .await?;

        Ok(batches)
    }

    /// Batches at or below the unit threshold, emptiest first.
    pub async fn low_stock(
        &self,
        tenant: &TenantSlug,
        threshold_units: i64,
    ) -> DbResult<Vec<StockBatch>> {
        let handle = self.handle(tenant).await?;

        let batches = sqlx::query_as::<_, StockBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM stock_batches \
             WHERE total_units <= ?1 \
             ORDER BY total_units ASC, medicine_name ASC"
        ))
        .bind(threshold_units.max(0))
        .fetch_all(handle.pool())
        .await?;

        Ok(batches)
    }

    /// Edits prices, expiry or batch number. Unit counts are off limits.
    pub async fn update(
        &self,
        tenant: &TenantSlug,
        id: &str,
        update: StockBatchUpdate,
    ) -> DbResult<StockBatch> {
        let mut batch = self.get(tenant, id).await?;

        if let Some(batch_number) = update.batch_number {
            batch.batch_number = batch_number;
        }
        if let Some(expiry_date) = update.expiry_date {
            batch.expiry_date = Some(expiry_date);
        }
        if let Some(price) = update.purchase_price_cents {
            validate_price_cents("purchase_price_cents", price)?;
            batch.purchase_price_cents = price;
        }
        if let Some(price) = update.selling_price_cents {
            validate_price_cents("selling_price_cents", price)?;
            batch.selling_price_cents = price;
        }
        batch.updated_at = Utc::now();

        let handle = self.handle(tenant).await?;
        sqlx::query(
            r#"
            UPDATE stock_batches SET
                batch_number = ?2, expiry_date = ?3,
                purchase_price_cents = ?4, selling_price_cents = ?5, updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.batch_number)
        .bind(batch.expiry_date)
        .bind(batch.purchase_price_cents)
        .bind(batch.selling_price_cents)
        .bind(batch.updated_at)
        .execute(handle.pool())
        .await?;

        Ok(batch)
    }

    /// Deletes a batch. Sale history keeps its snapshots and is unaffected.
    pub async fn delete(&self, tenant: &TenantSlug, id: &str) -> DbResult<()> {
        let handle = self.handle(tenant).await?;

        let result = sqlx::query("DELETE FROM stock_batches WHERE id = ?1")
            .bind(id)
            .execute(handle.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("StockBatch", id));
        }
        Ok(())
    }
}

/// Fallback batch number: B-YYYYMMDD-NNNN with a process-local sequence.
fn generate_batch_number() -> String {
    static BATCH_SEQ: AtomicU32 = AtomicU32::new(0);
    let date_part = Utc::now().format("%Y%m%d");
    let seq = BATCH_SEQ.fetch_add(1, Ordering::Relaxed) % 10_000;
    format!("B-{date_part}-{seq:04}")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::repository::medicine::{MedicineRepository, NewMedicine};

    struct Fixture {
        medicines: MedicineRepository,
        stock: StockRepository,
        tenant: TenantSlug,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new(StoreConfig::ephemeral()));
        Fixture {
            medicines: MedicineRepository::new(registry.clone()),
            stock: StockRepository::new(registry),
            tenant: TenantSlug::new("test-pharmacy").unwrap(),
        }
    }

    async fn seeded_medicine(fx: &Fixture) -> String {
        fx.medicines
            .create(
                &fx.tenant,
                NewMedicine {
                    name: "Panadol".into(),
                    generic_name: Some("Paracetamol".into()),
                    dose_form: Default::default(),
                    strength: Some("500mg".into()),
                    manufacturer: None,
                    unit_price_cents: 250,
                    pack_size: None,
                },
            )
            .await
            .unwrap()
            .id
    }

    /// Batch holding exactly `units` single units.
    fn flat_batch(medicine_id: &str, units: i64) -> NewStockBatch {
        NewStockBatch {
            medicine_id: medicine_id.to_string(),
            batch_number: None,
            boxes: 1,
            cartons_per_box: 1,
            strips_per_carton: 1,
            units_per_strip: units,
            expiry_date: None,
            purchase_price_cents: 100,
            selling_price_cents: 250,
        }
    }

    #[tokio::test]
    async fn test_intake_computes_total_units() {
        let fx = fixture();
        let medicine_id = seeded_medicine(&fx).await;

        let batch = fx
            .stock
            .intake(
                &fx.tenant,
                NewStockBatch {
                    medicine_id,
                    batch_number: None,
                    boxes: 2,
                    cartons_per_box: 10,
                    strips_per_carton: 5,
                    units_per_strip: 10,
                    expiry_date: None,
                    purchase_price_cents: 100,
                    selling_price_cents: 250,
                },
            )
            .await
            .unwrap();

        assert_eq!(batch.total_units, 1000);
        assert_eq!(batch.medicine_name, "Panadol");
        assert!(batch.batch_number.starts_with("B-"));
    }

    #[tokio::test]
    async fn test_intake_unknown_medicine_not_found() {
        let fx = fixture();
        let err = fx
            .stock
            .intake(&fx.tenant, flat_batch("no-such-medicine", 5))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_decrement_reports_stock_left() {
        let fx = fixture();
        let medicine_id = seeded_medicine(&fx).await;
        let batch = fx
            .stock
            .intake(&fx.tenant, flat_batch(&medicine_id, 5))
            .await
            .unwrap();

        let left = fx.stock.decrement(&fx.tenant, &batch.id, 3).await.unwrap();
        assert_eq!(left, 2);

        let left = fx.stock.decrement(&fx.tenant, &batch.id, 2).await.unwrap();
        assert_eq!(left, 0);
    }

    #[tokio::test]
    async fn test_decrement_never_oversells() {
        let fx = fixture();
        let medicine_id = seeded_medicine(&fx).await;
        let batch = fx
            .stock
            .intake(&fx.tenant, flat_batch(&medicine_id, 5))
            .await
            .unwrap();

        let err = fx
            .stock
            .decrement(&fx.tenant, &batch.id, 6)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InsufficientStock { requested: 6, .. }));

        // The failed attempt must not have touched the ledger.
        let batch = fx.stock.get(&fx.tenant, &batch.id).await.unwrap();
        assert_eq!(batch.total_units, 5);
    }

    #[tokio::test]
    async fn test_decrement_missing_batch_is_not_found() {
        let fx = fixture();
        let err = fx
            .stock
            .decrement(&fx.tenant, "no-such-batch", 1)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_decrements_stop_exactly_at_zero() {
        let fx = fixture();
        let medicine_id = seeded_medicine(&fx).await;
        let batch = fx
            .stock
            .intake(&fx.tenant, flat_batch(&medicine_id, 5))
            .await
            .unwrap();

        let stock = Arc::new(fx.stock.clone());
        let mut handles = Vec::new();
        for _ in 0..20 {
            let stock = stock.clone();
            let tenant = fx.tenant.clone();
            let batch_id = batch.id.clone();
            handles.push(tokio::spawn(async move {
                stock.decrement(&tenant, &batch_id, 1).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 5);
        let batch = fx.stock.get(&fx.tenant, &batch.id).await.unwrap();
        assert_eq!(batch.total_units, 0);
    }

    #[tokio::test]
    async fn test_decrement_many_is_partial() {
        let fx = fixture();
        let medicine_id = seeded_medicine(&fx).await;
        let a = fx
            .stock
            .intake(&fx.tenant, flat_batch(&medicine_id, 5))
            .await
            .unwrap();
        let b = fx
            .stock
            .intake(&fx.tenant, flat_batch(&medicine_id, 2))
            .await
            .unwrap();

        let summary = fx
            .stock
            .decrement_many(
                &fx.tenant,
                &[
                    (a.id.clone(), 3),
                    (b.id.clone(), 5),
                    ("no-such-batch".into(), 1),
                ],
            )
            .await
            .unwrap();

        assert_eq!(summary.matched, 1);
        assert_eq!(summary.total, 3);
        assert!(!summary.all_matched());
        assert_eq!(summary.failed_ids, vec![b.id.clone(), "no-such-batch".to_string()]);

        assert_eq!(fx.stock.get(&fx.tenant, &a.id).await.unwrap().total_units, 2);
        assert_eq!(fx.stock.get(&fx.tenant, &b.id).await.unwrap().total_units, 2);
    }

    #[tokio::test]
    async fn test_increment_restocks() {
        let fx = fixture();
        let medicine_id = seeded_medicine(&fx).await;
        let batch = fx
            .stock
            .intake(&fx.tenant, flat_batch(&medicine_id, 5))
            .await
            .unwrap();

        fx.stock.decrement(&fx.tenant, &batch.id, 4).await.unwrap();
        let left = fx.stock.increment(&fx.tenant, &batch.id, 2).await.unwrap();
        assert_eq!(left, 3);
    }

    #[tokio::test]
    async fn test_expiring_within_window() {
        let fx = fixture();
        let medicine_id = seeded_medicine(&fx).await;
        let today = Utc::now().date_naive();

        let mut soon = flat_batch(&medicine_id, 5);
        soon.expiry_date = Some(today + chrono::Duration::days(10));
        let soon = fx.stock.intake(&fx.tenant, soon).await.unwrap();

        let mut far = flat_batch(&medicine_id, 5);
        far.expiry_date = Some(today + chrono::Duration::days(120));
        fx.stock.intake(&fx.tenant, far).await.unwrap();

        // No expiry date means nothing to warn about.
        fx.stock
            .intake(&fx.tenant, flat_batch(&medicine_id, 5))
            .await
            .unwrap();

        let expiring = fx.stock.expiring_within(&fx.tenant, 30).await.unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].id, soon.id);
    }

    #[tokio::test]
    async fn test_low_stock_threshold() {
        let fx = fixture();
        let medicine_id = seeded_medicine(&fx).await;

        let low = fx
            .stock
            .intake(&fx.tenant, flat_batch(&medicine_id, 3))
            .await
            .unwrap();
        fx.stock
            .intake(&fx.tenant, flat_batch(&medicine_id, 500))
            .await
            .unwrap();

        let flagged = fx.stock.low_stock(&fx.tenant, 10).await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].id, low.id);
    }

    #[tokio::test]
    async fn test_update_leaves_ledger_alone() {
        let fx = fixture();
        let medicine_id = seeded_medicine(&fx).await;
        let batch = fx
            .stock
            .intake(&fx.tenant, flat_batch(&medicine_id, 5))
            .await
            .unwrap();

        let updated = fx
            .stock
            .update(
                &fx.tenant,
                &batch.id,
                StockBatchUpdate {
                    selling_price_cents: Some(300),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.selling_price_cents, 300);
        assert_eq!(updated.total_units, 5);
    }

    #[tokio::test]
    async fn test_medicine_delete_blocked_while_stock_references_it() {
        let fx = fixture();
        let medicine_id = seeded_medicine(&fx).await;
        let batch = fx
            .stock
            .intake(&fx.tenant, flat_batch(&medicine_id, 5))
            .await
            .unwrap();

        let err = fx
            .medicines
            .delete(&fx.tenant, &medicine_id)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));

        fx.stock.delete(&fx.tenant, &batch.id).await.unwrap();
        fx.medicines.delete(&fx.tenant, &medicine_id).await.unwrap();
    }
}
