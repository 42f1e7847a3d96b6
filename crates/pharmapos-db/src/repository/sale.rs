//! # Sale Repository
//!
//! Atomic sale creation, payment transitions, and history export.
//!
//! ## One Sale, One Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_sale(lines)                          BEGIN                      │
//! │                                                │                        │
//! │  for each line:                                │                        │
//! │    1. snapshot the batch (name, prices,        │                        │
//! │       batch number, expiry, dose form)         │                        │
//! │    2. conditional decrement:                   │                        │
//! │       UPDATE ... SET total_units -= qty        │                        │
//! │       WHERE id = ? AND total_units >= qty      │                        │
//! │       └── 0 rows → InsufficientStock ──────────┼──► ROLLBACK            │
//! │                                                │     (earlier lines    │
//! │  3. recompute totals server-side               │      are undone too)  │
//! │     reject a mismatched declared total ────────┼──► ROLLBACK            │
//! │                                                │                        │
//! │  4. INSERT sale + items                        ▼                        │
//! │                                              COMMIT                     │
//! │                                                                         │
//! │  Either the customer gets every line and stock drops accordingly,       │
//! │  or nothing happened at all. There is no partially-applied sale.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::StreamExt;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};
use uuid::Uuid;

use pharmapos_core::validation::{
    validate_customer_name, validate_discount, validate_phone, validate_quantity,
    validate_sale_line_count,
};
use pharmapos_core::{
    order_totals, price_line, verify_declared_total, Discount, PaymentStatus, PricedLine, Sale,
    SaleItem, TenantSlug, ValidationError,
};

use crate::entities;
use crate::error::{DbError, DbResult};
use crate::registry::{ConnectionRegistry, ModelHandle};

pub(crate) const SALE_COLUMNS: &str = "id, invoice_id, seller_id, issued_by, customer_name, \
     customer_phone, subtotal_cents, discount_type, discount_value, discount_amount_cents, \
     items_discount_cents, total_discount_cents, total_cents, payment_status, \
     paid_amount_cents, payment_type, transaction_id, created_at, updated_at";

pub(crate) const ITEM_COLUMNS: &str = "id, sale_id, line_no, batch_id, medicine_name, \
     dose_form, unit_price_cents, original_price_cents, discount_type, discount_value, \
     quantity, subtotal_cents, stock_left, batch_number, expiry_date, created_at";

/// Rows buffered between the export query and its consumer.
const EXPORT_CHANNEL_CAPACITY: usize = 64;

/// One line of a checkout request. Prices are looked up server-side from
/// the batch; the client only says what and how many.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewSaleLine {
    pub batch_id: String,
    pub quantity: i64,
    pub discount: Option<Discount>,
}

/// A checkout request.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewSale {
    pub seller_id: String,
    /// Display name of whoever rang the sale up.
    pub issued_by: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    /// Order-level discount, applied after per-item discounts.
    #[serde(default)]
    pub discount: Discount,
    pub payment_status: PaymentStatus,
    /// Partial payment on a due sale. Ignored for paid sales, which always
    /// settle at the computed total.
    pub paid_amount_cents: Option<i64>,
    pub payment_type: Option<String>,
    pub transaction_id: Option<String>,
    /// What the client thinks the total is. Checked against the server-side
    /// recomputation and rejected on mismatch.
    pub declared_total_cents: Option<i64>,
    pub items: Vec<NewSaleLine>,
}

/// A sale with its line items.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SaleWithItems {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

/// Flat row for CSV-style export of sale history.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct SaleExportRow {
    pub invoice_id: String,
    pub created_at: DateTime<Utc>,
    pub customer_name: Option<String>,
    pub seller_id: String,
    pub payment_status: PaymentStatus,
    pub total_cents: i64,
    pub paid_amount_cents: i64,
    pub item_count: i64,
}

/// Narrows an export stream. Dates are inclusive calendar days; all fields
/// default to unfiltered.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
pub struct SaleExportFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<PaymentStatus>,
}

/// Batch fields frozen onto a sale line at checkout.
#[derive(sqlx::FromRow)]
struct BatchSnapshot {
    medicine_name: String,
    batch_number: String,
    expiry_date: Option<NaiveDate>,
    purchase_price_cents: i64,
    selling_price_cents: i64,
    dose_form: String,
}

/// Repository for sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    registry: Arc<ConnectionRegistry>,
}

impl SaleRepository {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        SaleRepository { registry }
    }

    async fn handle(&self, tenant: &TenantSlug) -> DbResult<ModelHandle> {
        self.registry.model(tenant, &entities::SALES).await
    }

    /// Creates a sale, decrementing stock for every line in one transaction.
    ///
    /// If any line cannot be covered, the whole sale is rejected and no
    /// line's stock moves. Totals are recomputed here from batch prices;
    /// a declared total that disagrees is rejected the same way.
    pub async fn create_sale(&self, tenant: &TenantSlug, new: NewSale) -> DbResult<SaleWithItems> {
        if new.seller_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "seller_id".to_string(),
            }
            .into());
        }
        validate_sale_line_count(new.items.len())?;
        validate_customer_name(new.customer_name.as_deref())?;
        validate_phone(new.customer_phone.as_deref())?;
        validate_discount(&new.discount)?;
        for line in &new.items {
            validate_quantity(line.quantity)?;
            if let Some(discount) = &line.discount {
                validate_discount(discount)?;
            }
        }

        // The snapshot query joins the catalog, so all three entities must
        // be registered before the transaction starts.
        self.registry.model(tenant, &entities::MEDICINES).await?;
        self.registry.model(tenant, &entities::STOCK_BATCHES).await?;
        let handle = self.handle(tenant).await?;

        let sale_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = handle.pool().begin().await.map_err(|e| {
            DbError::TransactionFailed(format!("beginning sale transaction: {e}"))
        })?;
        let mut priced_lines: Vec<PricedLine> = Vec::with_capacity(new.items.len());
        let mut items: Vec<SaleItem> = Vec::with_capacity(new.items.len());

        for (line_no, line) in new.items.iter().enumerate() {
            let snapshot = sqlx::query_as::<_, BatchSnapshot>(
                r#"
                SELECT b.medicine_name, b.batch_number, b.expiry_date,
                       b.purchase_price_cents, b.selling_price_cents,
                       m.dose_form
                FROM stock_batches b
                JOIN medicines m ON m.id = b.medicine_id
                WHERE b.id = ?1
                "#,
            )
            .bind(&line.batch_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("StockBatch", &line.batch_id))?;

            // Guard and write in one statement; racing sales cannot both
            // take the last units.
            let decrement = sqlx::query(
                r#"
                UPDATE stock_batches
                SET total_units = total_units - ?2, updated_at = ?3
                WHERE id = ?1 AND total_units >= ?2
                "#,
            )
            .bind(&line.batch_id)
            .bind(line.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if decrement.rows_affected() == 0 {
                return Err(DbError::InsufficientStock {
                    batch_id: line.batch_id.clone(),
                    requested: line.quantity,
                });
            }

            let stock_left: i64 =
                sqlx::query_scalar("SELECT total_units FROM stock_batches WHERE id = ?1")
                    .bind(&line.batch_id)
                    .fetch_one(&mut *tx)
                    .await?;

            let priced = price_line(snapshot.selling_price_cents, line.quantity, line.discount)?;
            priced_lines.push(priced);

            items.push(SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                line_no: line_no as i64,
                batch_id: line.batch_id.clone(),
                medicine_name: snapshot.medicine_name,
                dose_form: Some(snapshot.dose_form),
                unit_price_cents: snapshot.selling_price_cents,
                original_price_cents: snapshot.purchase_price_cents,
                discount_type: line.discount.map(|d| d.kind),
                discount_value: line.discount.map(|d| d.value),
                quantity: line.quantity,
                subtotal_cents: priced.subtotal_cents,
                stock_left: Some(stock_left),
                batch_number: Some(snapshot.batch_number),
                expiry_date: snapshot.expiry_date,
                created_at: now,
            });
        }

        let totals = order_totals(&priced_lines, new.discount)?;
        verify_declared_total(&totals, new.declared_total_cents)?;

        let paid_amount_cents = match new.payment_status {
            PaymentStatus::Paid => totals.total_cents,
            PaymentStatus::Due => {
                let paid = new.paid_amount_cents.unwrap_or(0);
                if paid < 0 || paid > totals.total_cents {
                    return Err(ValidationError::OutOfRange {
                        field: "paid_amount_cents".to_string(),
                        min: 0,
                        max: totals.total_cents,
                    }
                    .into());
                }
                paid
            }
        };

        let sale = Sale {
            id: sale_id,
            invoice_id: generate_invoice_id(),
            seller_id: new.seller_id,
            issued_by: new.issued_by,
            customer_name: new.customer_name,
            customer_phone: new.customer_phone,
            subtotal_cents: totals.subtotal_cents,
            discount_type: new.discount.kind,
            discount_value: new.discount.value,
            discount_amount_cents: totals.order_discount_cents,
            items_discount_cents: totals.items_discount_cents,
            total_discount_cents: totals.total_discount_cents,
            total_cents: totals.total_cents,
            payment_status: new.payment_status,
            paid_amount_cents,
            payment_type: new.payment_type,
            transaction_id: new.transaction_id,
            created_at: now,
            updated_at: now,
        };

        // Stock already moved inside this transaction. A failed write from
        // here on rolls everything back, and is logged with the ids involved
        // so a commit-time failure can be reconciled against the ledger.
        let batch_ids: Vec<&str> = items.iter().map(|item| item.batch_id.as_str()).collect();
        let persistence_failure = |context: &'static str, source: sqlx::Error| {
            error!(
                tenant = %tenant,
                invoice_id = %sale.invoice_id,
                ?batch_ids,
                context,
                "Sale write failed after stock decrement"
            );
            DbError::Persistence {
                context: format!("{context} for invoice {}", sale.invoice_id),
                source,
            }
        };

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, invoice_id, seller_id, issued_by, customer_name, customer_phone,
                subtotal_cents, discount_type, discount_value, discount_amount_cents,
                items_discount_cents, total_discount_cents, total_cents,
                payment_status, paid_amount_cents, payment_type, transaction_id,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.invoice_id)
        .bind(&sale.seller_id)
        .bind(&sale.issued_by)
        .bind(&sale.customer_name)
        .bind(&sale.customer_phone)
        .bind(sale.subtotal_cents)
        .bind(sale.discount_type)
        .bind(sale.discount_value)
        .bind(sale.discount_amount_cents)
        .bind(sale.items_discount_cents)
        .bind(sale.total_discount_cents)
        .bind(sale.total_cents)
        .bind(sale.payment_status)
        .bind(sale.paid_amount_cents)
        .bind(&sale.payment_type)
        .bind(&sale.transaction_id)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| persistence_failure("inserting sale row", e))?;

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, line_no, batch_id, medicine_name, dose_form,
                    unit_price_cents, original_price_cents, discount_type, discount_value,
                    quantity, subtotal_cents, stock_left, batch_number, expiry_date, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(item.line_no)
            .bind(&item.batch_id)
            .bind(&item.medicine_name)
            .bind(&item.dose_form)
            .bind(item.unit_price_cents)
            .bind(item.original_price_cents)
            .bind(item.discount_type)
            .bind(item.discount_value)
            .bind(item.quantity)
            .bind(item.subtotal_cents)
            .bind(item.stock_left)
            .bind(&item.batch_number)
            .bind(item.expiry_date)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| persistence_failure("inserting sale items", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| persistence_failure("committing sale", e))?;

        info!(
            tenant = %tenant,
            invoice_id = %sale.invoice_id,
            total_cents = sale.total_cents,
            lines = items.len(),
            "Sale completed"
        );

        Ok(SaleWithItems { sale, items })
    }

    /// Settles a due sale: status becomes paid and the paid amount snaps to
    /// the sale total. Already-paid sales pass through unchanged.
    pub async fn mark_paid(&self, tenant: &TenantSlug, sale_id: &str) -> DbResult<Sale> {
        let handle = self.handle(tenant).await?;

        let result = sqlx::query(
            r#"
            UPDATE sales
            SET payment_status = 'paid', paid_amount_cents = total_cents, updated_at = ?2
            WHERE id = ?1 AND payment_status = 'due'
            "#,
        )
        .bind(sale_id)
        .bind(Utc::now())
        .execute(handle.pool())
        .await?;

        if result.rows_affected() > 0 {
            debug!(tenant = %tenant, sale_id, "Due sale settled");
        }

        fetch_sale(handle.pool(), sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", sale_id))
    }

    /// Gets a sale with its items in invoice order.
    pub async fn get(&self, tenant: &TenantSlug, sale_id: &str) -> DbResult<SaleWithItems> {
        let handle = self.handle(tenant).await?;

        let sale = fetch_sale(handle.pool(), sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", sale_id))?;

        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY line_no"
        ))
        .bind(sale_id)
        .fetch_all(handle.pool())
        .await?;

        Ok(SaleWithItems { sale, items })
    }

    /// Deletes a sale and its items. Stock is not restocked; a deletion is
    /// a history correction, not a return.
    pub async fn delete(&self, tenant: &TenantSlug, sale_id: &str) -> DbResult<()> {
        let handle = self.handle(tenant).await?;

        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(sale_id)
            .execute(handle.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", sale_id));
        }
        Ok(())
    }

    /// Streams matching sale history as flat export rows, oldest first.
    ///
    /// The query runs in a background task feeding a bounded channel, so a
    /// slow consumer throttles the reads instead of buffering the entire
    /// history in memory. CSV framing is the consumer's business.
    pub async fn export_rows(
        &self,
        tenant: &TenantSlug,
        filter: SaleExportFilter,
    ) -> DbResult<ReceiverStream<DbResult<SaleExportRow>>> {
        let handle = self.handle(tenant).await?;
        let pool = handle.pool().clone();
        let (sender, receiver) = mpsc::channel(EXPORT_CHANNEL_CAPACITY);

        info!(tenant = %tenant, "Starting sale export stream");

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT s.invoice_id, s.created_at, s.customer_name, s.seller_id, \
             s.payment_status, s.total_cents, s.paid_amount_cents, \
             (SELECT COUNT(*) FROM sale_items si WHERE si.sale_id = s.id) AS item_count \
             FROM sales s WHERE 1=1",
        );
        if let Some(from) = filter.from {
            builder
                .push(" AND s.created_at >= ")
                .push_bind(day_floor(from));
        }
        if let Some(to) = filter.to {
            builder
                .push(" AND s.created_at < ")
                .push_bind(day_floor(to) + chrono::Duration::days(1));
        }
        if let Some(status) = filter.status {
            builder.push(" AND s.payment_status = ").push_bind(status);
        }
        builder.push(" ORDER BY s.created_at ASC, s.invoice_id ASC");

        tokio::spawn(async move {
            let mut rows = builder.build_query_as::<SaleExportRow>().fetch(&pool);

            while let Some(row) = rows.next().await {
                if sender.send(row.map_err(DbError::from)).await.is_err() {
                    // Consumer hung up; stop reading.
                    break;
                }
            }
        });

        Ok(ReceiverStream::new(receiver))
    }
}

fn day_floor(date: NaiveDate) -> DateTime<Utc> {
    chrono::NaiveDateTime::new(date, chrono::NaiveTime::MIN).and_utc()
}

/// Fetches one sale row without its items.
pub(crate) async fn fetch_sale(pool: &SqlitePool, sale_id: &str) -> DbResult<Option<Sale>> {
    let sale = sqlx::query_as::<_, Sale>(&format!(
        "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
    ))
    .bind(sale_id)
    .fetch_optional(pool)
    .await?;
    Ok(sale)
}

/// Attaches items to a page of sales with a single IN query.
pub(crate) async fn attach_items(
    pool: &SqlitePool,
    sales: Vec<Sale>,
) -> DbResult<Vec<SaleWithItems>> {
    if sales.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id IN ("
    ));
    let mut ids = builder.separated(", ");
    for sale in &sales {
        ids.push_bind(sale.id.clone());
    }
    ids.push_unseparated(") ");
    builder.push("ORDER BY sale_id, line_no");

    let items: Vec<SaleItem> = builder.build_query_as().fetch_all(pool).await?;

    let mut by_sale: HashMap<String, Vec<SaleItem>> = HashMap::new();
    for item in items {
        by_sale.entry(item.sale_id.clone()).or_default().push(item);
    }

    Ok(sales
        .into_iter()
        .map(|sale| {
            let items = by_sale.remove(&sale.id).unwrap_or_default();
            SaleWithItems { sale, items }
        })
        .collect())
}

/// Invoice number: INV-YYYYMMDD-NNNN with a process-local sequence.
// TODO: back the sequence with a per-tenant counter table so a same-day
// restart cannot hand out a number the UNIQUE constraint then rejects.
fn generate_invoice_id() -> String {
    static INVOICE_SEQ: AtomicU32 = AtomicU32::new(0);
    let date_part = Utc::now().format("%Y%m%d");
    let seq = INVOICE_SEQ.fetch_add(1, Ordering::Relaxed) % 10_000;
    format!("INV-{date_part}-{seq:04}")
}

// =============================================================================
// Unit Tests
// =============================================================================
