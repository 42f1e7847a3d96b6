//! # Report Repository
//!
//! Read-side aggregations over sale history: the paginated sales screen,
//! the customer ledger, the dashboard, and the seller leaderboard.
//!
//! ## Time Windows
//! ```text
//! ┌──────────┬───────────────────────────────┬──────────────────────┐
//! │ range    │ window (UTC, half-open)       │ bucketed by          │
//! ├──────────┼───────────────────────────────┼──────────────────────┤
//! │ today    │ [midnight, +1 day)            │ hour        00..23   │
//! │ week     │ [Monday 00:00, +7 days)       │ ISO weekday 1..7     │
//! │ month    │ [1st 00:00, next 1st)         │ week of year         │
//! │ year     │ [Jan 1, next Jan 1)           │ month       01..12   │
//! │ explicit │ [from 00:00, day after `to`)  │ calendar date        │
//! └──────────┴───────────────────────────────┴──────────────────────┘
//! ```
//! Bounds are compared as `created_at >= start AND created_at < end`;
//! the UTC text encoding of timestamps makes that a plain string compare.
//!
//! Revenue counts every sale in the window, due ones included; what is
//! still outstanding shows separately as `total_due_cents`. Cost comes
//! from the per-unit cost snapshot frozen onto each sale item, so deleting
//! a batch later never changes an old report.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use pharmapos_core::validation::{validate_pagination, validate_search_query};
use pharmapos_core::{PaymentStatus, Sale, SellerScope, TenantSlug, ValidationError};

use crate::entities;
use crate::error::{DbError, DbResult};
use crate::registry::{ConnectionRegistry, ModelHandle};
use crate::repository::sale::{attach_items, SaleWithItems, SALE_COLUMNS};
use crate::repository::Page;

const TOP_PRODUCTS_LIMIT: i64 = 5;

// =============================================================================
// Query Inputs
// =============================================================================

/// Sort order for the sales list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleSort {
    #[default]
    Newest,
    Oldest,
    TotalHighest,
    TotalLowest,
    InvoiceAsc,
    InvoiceDesc,
}

impl SaleSort {
    fn order_clause(self) -> &'static str {
        match self {
            SaleSort::Newest => "created_at DESC",
            SaleSort::Oldest => "created_at ASC",
            SaleSort::TotalHighest => "total_cents DESC",
            SaleSort::TotalLowest => "total_cents ASC",
            SaleSort::InvoiceAsc => "invoice_id ASC",
            SaleSort::InvoiceDesc => "invoice_id DESC",
        }
    }
}

/// Sort order for the customer ledger screen, which adds customer and
/// outstanding-amount keys on top of the date sorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSort {
    #[default]
    Newest,
    Oldest,
    CustomerAsc,
    CustomerDesc,
    DueHighest,
    DueLowest,
}

impl CustomerSort {
    fn order_clause(self) -> &'static str {
        match self {
            CustomerSort::Newest => "created_at DESC",
            CustomerSort::Oldest => "created_at ASC",
            CustomerSort::CustomerAsc => "customer_name ASC",
            CustomerSort::CustomerDesc => "customer_name DESC",
            CustomerSort::DueHighest => "due_cents DESC",
            CustomerSort::DueLowest => "due_cents ASC",
        }
    }
}

/// Filters for the paginated sales screen.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SalesQuery {
    /// Matches customer name, phone or invoice number.
    pub search: Option<String>,
    /// Empty means every status.
    #[serde(default)]
    pub statuses: Vec<PaymentStatus>,
    #[serde(default)]
    pub sort: SaleSort,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Filters for the customer ledger screen.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CustomerQuery {
    /// Matches customer name, phone or invoice number.
    pub search: Option<String>,
    #[serde(default)]
    pub statuses: Vec<PaymentStatus>,
    #[serde(default)]
    pub sort: CustomerSort,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Reporting window selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardRange {
    Today,
    Week,
    Month,
    Year,
    /// Inclusive calendar-date range.
    Explicit { from: NaiveDate, to: NaiveDate },
}

// =============================================================================
// Report Shapes
// =============================================================================

/// One bucket of the dashboard series. The bucket key depends on the
/// range: hour, ISO weekday, week of year, month, or calendar date.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct BucketPoint {
    pub bucket: String,
    pub sales_count: i64,
    pub revenue_cents: i64,
    pub profit_cents: i64,
}

/// A best-selling product within the window.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub medicine_name: String,
    pub units_sold: i64,
    pub revenue_cents: i64,
}

/// The shop dashboard for one window.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DashboardReport {
    pub from: DateTime<Utc>,
    /// Exclusive end of the window.
    pub to: DateTime<Utc>,
    pub revenue_cents: i64,
    pub cost_cents: i64,
    pub profit_cents: i64,
    pub sales_count: i64,
    /// Distinct named customers; anonymous walk-ins don't count.
    pub distinct_customers: i64,
    /// Profit over revenue, percent, two decimals. Zero when there was no
    /// revenue.
    pub margin_percent: f64,
    /// Outstanding amount across due sales in the window.
    pub total_due_cents: i64,
    pub buckets: Vec<BucketPoint>,
    pub top_products: Vec<TopProduct>,
}

/// Reduced sale projection for the customer ledger screen: who owes what,
/// without line items or discount breakdowns.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct CustomerSaleRow {
    pub id: String,
    pub invoice_id: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub total_cents: i64,
    pub paid_amount_cents: i64,
    /// `total - paid`; zero on settled sales.
    pub due_cents: i64,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Revenue cards for one seller: the running today/week/month/year sums.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct SellerCard {
    pub seller_id: String,
    /// Display name resolved from the user directory. `None` when the
    /// seller id no longer maps to a directory row.
    #[sqlx(default)]
    pub seller_name: Option<String>,
    pub today_cents: i64,
    pub week_cents: i64,
    pub month_cents: i64,
    pub year_cents: i64,
    /// Sales rung up this year.
    pub sales_count: i64,
}

/// One point of a leaderboard chart series.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct SellerPoint {
    pub seller_id: String,
    pub bucket: String,
    pub revenue_cents: i64,
}

/// The seller leaderboard: cards plus three chart series.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SellerLeaderboard {
    /// One card per seller, best year first.
    pub cards: Vec<SellerCard>,
    /// Current week by ISO weekday (1..7).
    pub weekly_chart: Vec<SellerPoint>,
    /// Current month by week of year.
    pub monthly_chart: Vec<SellerPoint>,
    /// Current year by month (01..12).
    pub yearly_chart: Vec<SellerPoint>,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    sales_count: i64,
    revenue_cents: i64,
    cost_cents: i64,
    distinct_customers: i64,
    total_due_cents: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Read-side repository over sales.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    registry: Arc<ConnectionRegistry>,
}

impl ReportRepository {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        ReportRepository { registry }
    }

    async fn handle(&self, tenant: &TenantSlug) -> DbResult<ModelHandle> {
        self.registry.model(tenant, &entities::SALES).await
    }

    /// The sales screen: filtered, sorted, paginated, items attached.
    pub async fn paginated_sales(
        &self,
        tenant: &TenantSlug,
        scope: &SellerScope,
        query: SalesQuery,
    ) -> DbResult<Page<SaleWithItems>> {
        let (page, limit) = validate_pagination(query.page, query.limit)?;
        let search = match query.search.as_deref() {
            Some(raw) => {
                let trimmed = validate_search_query(raw)?;
                (!trimmed.is_empty()).then_some(trimmed)
            }
            None => None,
        };
        let handle = self.handle(tenant).await?;

        debug!(
            tenant = %tenant,
            page,
            limit,
            search = search.as_deref().unwrap_or(""),
            "Listing sales"
        );

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM sales");
        push_sales_filters(&mut count_query, search.as_deref(), &query.statuses, scope);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(handle.pool())
            .await?;

        let mut page_query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {SALE_COLUMNS} FROM sales"));
        push_sales_filters(&mut page_query, search.as_deref(), &query.statuses, scope);
        page_query
            .push(" ORDER BY ")
            .push(query.sort.order_clause())
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind((page - 1) * limit);

        let sales: Vec<Sale> = page_query
            .build_query_as()
            .fetch_all(handle.pool())
            .await?;

        let items = attach_items(handle.pool(), sales).await?;
        Ok(Page::new(items, total, page, limit))
    }

    /// The customer ledger: the same filters as the sales screen over a
    /// reduced projection, with customer-name and due-amount sort keys.
    pub async fn customer_sales(
        &self,
        tenant: &TenantSlug,
        scope: &SellerScope,
        query: CustomerQuery,
    ) -> DbResult<Page<CustomerSaleRow>> {
        let (page, limit) = validate_pagination(query.page, query.limit)?;
        let search = match query.search.as_deref() {
            Some(raw) => {
                let trimmed = validate_search_query(raw)?;
                (!trimmed.is_empty()).then_some(trimmed)
            }
            None => None,
        };
        let handle = self.handle(tenant).await?;

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM sales");
        push_sales_filters(&mut count_query, search.as_deref(), &query.statuses, scope);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(handle.pool())
            .await?;

        let mut page_query = QueryBuilder::<Sqlite>::new(
            "SELECT id, invoice_id, customer_name, customer_phone, total_cents, \
             paid_amount_cents, total_cents - paid_amount_cents AS due_cents, \
             payment_status, created_at FROM sales",
        );
        push_sales_filters(&mut page_query, search.as_deref(), &query.statuses, scope);
        page_query
            .push(" ORDER BY ")
            .push(query.sort.order_clause())
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind((page - 1) * limit);

        let rows: Vec<CustomerSaleRow> = page_query
            .build_query_as()
            .fetch_all(handle.pool())
            .await?;

        Ok(Page::new(rows, total, page, limit))
    }

    /// The dashboard for one window: headline numbers, the bucket series,
    /// and the top products. The three aggregations run concurrently.
    pub async fn dashboard(
        &self,
        tenant: &TenantSlug,
        scope: &SellerScope,
        range: DashboardRange,
    ) -> DbResult<DashboardReport> {
        let (from, to, bucket_expr) = resolve_window(range, Utc::now())?;
        let handle = self.handle(tenant).await?;
        let pool = handle.pool();
        let seller_id = scope.seller_id();

        debug!(tenant = %tenant, from = %from, to = %to, "Building dashboard");

        let summary = async {
            let mut query = QueryBuilder::<Sqlite>::new(
                "SELECT COUNT(*) AS sales_count, \
                 COALESCE(SUM(s.total_cents), 0) AS revenue_cents, \
                 COALESCE(SUM(c.cost_cents), 0) AS cost_cents, \
                 COUNT(DISTINCT s.customer_name) AS distinct_customers, \
                 COALESCE(SUM(CASE WHEN s.payment_status = 'due' \
                     THEN s.total_cents - s.paid_amount_cents ELSE 0 END), 0) AS total_due_cents \
                 FROM sales s \
                 LEFT JOIN (SELECT sale_id, SUM(original_price_cents * quantity) AS cost_cents \
                            FROM sale_items GROUP BY sale_id) c ON c.sale_id = s.id",
            );
            push_window_filters(&mut query, from, to, seller_id);
            let row: SummaryRow = query.build_query_as().fetch_one(pool).await?;
            Ok::<_, DbError>(row)
        };

        let buckets = async {
            let mut query = QueryBuilder::<Sqlite>::new(format!(
                "SELECT {bucket_expr} AS bucket, \
                 COUNT(*) AS sales_count, \
                 COALESCE(SUM(s.total_cents), 0) AS revenue_cents, \
                 COALESCE(SUM(s.total_cents - COALESCE(c.cost_cents, 0)), 0) AS profit_cents \
                 FROM sales s \
                 LEFT JOIN (SELECT sale_id, SUM(original_price_cents * quantity) AS cost_cents \
                            FROM sale_items GROUP BY sale_id) c ON c.sale_id = s.id"
            ));
            push_window_filters(&mut query, from, to, seller_id);
            query.push(" GROUP BY bucket ORDER BY bucket");
            let rows: Vec<BucketPoint> = query.build_query_as().fetch_all(pool).await?;
            Ok::<_, DbError>(rows)
        };

        let top_products = async {
            let mut query = QueryBuilder::<Sqlite>::new(
                "SELECT si.medicine_name, \
                 SUM(si.quantity) AS units_sold, \
                 SUM(si.subtotal_cents) AS revenue_cents \
                 FROM sale_items si \
                 JOIN sales s ON s.id = si.sale_id",
            );
            push_window_filters(&mut query, from, to, seller_id);
            query
                .push(" GROUP BY si.medicine_name ORDER BY units_sold DESC, revenue_cents DESC LIMIT ")
                .push_bind(TOP_PRODUCTS_LIMIT);
            let rows: Vec<TopProduct> = query.build_query_as().fetch_all(pool).await?;
            Ok::<_, DbError>(rows)
        };

        let (summary, buckets, top_products) = tokio::try_join!(summary, buckets, top_products)?;

        let profit_cents = summary.revenue_cents - summary.cost_cents;
        let margin_percent = if summary.revenue_cents == 0 {
            0.0
        } else {
            (profit_cents as f64 / summary.revenue_cents as f64 * 10_000.0).round() / 100.0
        };

        Ok(DashboardReport {
            from,
            to,
            revenue_cents: summary.revenue_cents,
            cost_cents: summary.cost_cents,
            profit_cents,
            sales_count: summary.sales_count,
            distinct_customers: summary.distinct_customers,
            margin_percent,
            total_due_cents: summary.total_due_cents,
            buckets,
            top_products,
        })
    }

    /// Seller revenue cards plus the weekly, monthly and yearly chart
    /// series, all scoped to the calendar windows containing `now`.
    pub async fn seller_leaderboard(&self, tenant: &TenantSlug) -> DbResult<SellerLeaderboard> {
        let now = Utc::now();
        let today = day_start(now);
        let tomorrow = today + chrono::Duration::days(1);
        let week = week_start(now);
        let month = month_start(now)?;
        let year = year_start(now)?;
        let next_month = next_month_start(now)?;
        let next_year = next_year_start(now)?;

        let handle = self.handle(tenant).await?;
        let pool = handle.pool();

        let cards = async {
            let rows: Vec<SellerCard> = sqlx::query_as(
                r#"
                SELECT seller_id,
                       COALESCE(SUM(CASE WHEN created_at >= ?2 THEN total_cents ELSE 0 END), 0) AS today_cents,
                       COALESCE(SUM(CASE WHEN created_at >= ?3 THEN total_cents ELSE 0 END), 0) AS week_cents,
                       COALESCE(SUM(CASE WHEN created_at >= ?4 THEN total_cents ELSE 0 END), 0) AS month_cents,
                       COALESCE(SUM(total_cents), 0) AS year_cents,
                       COUNT(*) AS sales_count
                FROM sales
                WHERE created_at >= ?1 AND created_at < ?5
                GROUP BY seller_id
                ORDER BY year_cents DESC
                "#,
            )
            .bind(year)
            .bind(today)
            .bind(week)
            .bind(month)
            .bind(tomorrow)
            .fetch_all(pool)
            .await?;
            Ok::<_, DbError>(rows)
        };

        let weekly = seller_series(pool, WEEKDAY_BUCKET, week, week + chrono::Duration::days(7));
        let monthly = seller_series(pool, WEEK_OF_YEAR_BUCKET, month, next_month);
        let yearly = seller_series(pool, MONTH_BUCKET, year, next_year);

        let (mut cards, weekly_chart, monthly_chart, yearly_chart) =
            tokio::try_join!(cards, weekly, monthly, yearly)?;

        self.resolve_seller_names(&mut cards).await?;

        Ok(SellerLeaderboard {
            cards,
            weekly_chart,
            monthly_chart,
            yearly_chart,
        })
    }

    /// Fills in display names from the user directory. Deleted sellers keep
    /// their historical cards, so the lookup ignores the soft-delete flag.
    async fn resolve_seller_names(&self, cards: &mut [SellerCard]) -> DbResult<()> {
        if cards.is_empty() {
            return Ok(());
        }
        let directory = self.registry.directory_model(&entities::USERS).await?;

        let mut query = QueryBuilder::<Sqlite>::new("SELECT id, name FROM users WHERE id IN (");
        let mut in_list = query.separated(", ");
        for card in cards.iter() {
            in_list.push_bind(card.seller_id.clone());
        }
        in_list.push_unseparated(")");

        let rows: Vec<(String, String)> = query
            .build_query_as()
            .fetch_all(directory.pool())
            .await?;
        let names: HashMap<String, String> = rows.into_iter().collect();

        for card in cards.iter_mut() {
            card.seller_name = names.get(&card.seller_id).cloned();
        }
        Ok(())
    }
}

// =============================================================================
// Query Helpers
// =============================================================================

fn push_sales_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    search: Option<&str>,
    statuses: &[PaymentStatus],
    scope: &SellerScope,
) {
    builder.push(" WHERE 1=1");
    if let Some(search) = search {
        let pattern = format!("%{search}%");
        builder
            .push(" AND (customer_name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR customer_phone LIKE ")
            .push_bind(pattern.clone())
            .push(" OR invoice_id LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if !statuses.is_empty() {
        builder.push(" AND payment_status IN (");
        let mut in_list = builder.separated(", ");
        for status in statuses {
            in_list.push_bind(*status);
        }
        in_list.push_unseparated(")");
    }
    if let Some(seller_id) = scope.seller_id() {
        builder
            .push(" AND seller_id = ")
            .push_bind(seller_id.to_string());
    }
}

fn push_window_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    seller_id: Option<&str>,
) {
    builder
        .push(" WHERE s.created_at >= ")
        .push_bind(from)
        .push(" AND s.created_at < ")
        .push_bind(to);
    if let Some(seller_id) = seller_id {
        builder
            .push(" AND s.seller_id = ")
            .push_bind(seller_id.to_string());
    }
}

async fn seller_series(
    pool: &sqlx::SqlitePool,
    bucket_expr: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> DbResult<Vec<SellerPoint>> {
    let rows: Vec<SellerPoint> = sqlx::query_as(&format!(
        "SELECT s.seller_id, {bucket_expr} AS bucket, \
         COALESCE(SUM(s.total_cents), 0) AS revenue_cents \
         FROM sales s \
         WHERE s.created_at >= ?1 AND s.created_at < ?2 \
         GROUP BY bucket, s.seller_id \
         ORDER BY bucket ASC, revenue_cents DESC"
    ))
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// =============================================================================
// Window Math
// =============================================================================

const HOUR_BUCKET: &str = "strftime('%H', s.created_at)";
const WEEKDAY_BUCKET: &str =
    "CAST(((CAST(strftime('%w', s.created_at) AS INTEGER) + 6) % 7) + 1 AS TEXT)";
const WEEK_OF_YEAR_BUCKET: &str = "strftime('%W', s.created_at)";
const MONTH_BUCKET: &str = "strftime('%m', s.created_at)";
const DATE_BUCKET: &str = "strftime('%Y-%m-%d', s.created_at)";

/// Resolves a range to `[start, end)` bounds and the bucket expression.
fn resolve_window(
    range: DashboardRange,
    now: DateTime<Utc>,
) -> DbResult<(DateTime<Utc>, DateTime<Utc>, &'static str)> {
    match range {
        DashboardRange::Today => {
            let start = day_start(now);
            Ok((start, start + chrono::Duration::days(1), HOUR_BUCKET))
        }
        DashboardRange::Week => {
            let start = week_start(now);
            Ok((start, start + chrono::Duration::days(7), WEEKDAY_BUCKET))
        }
        DashboardRange::Month => Ok((month_start(now)?, next_month_start(now)?, WEEK_OF_YEAR_BUCKET)),
        DashboardRange::Year => Ok((year_start(now)?, next_year_start(now)?, MONTH_BUCKET)),
        DashboardRange::Explicit { from, to } => {
            if from > to {
                return Err(ValidationError::NotAllowed {
                    field: "range".to_string(),
                    reason: format!("from {from} is after to {to}"),
                }
                .into());
            }
            let start = midnight(from);
            let end = midnight(to) + chrono::Duration::days(1);
            Ok((start, end, DATE_BUCKET))
        }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    NaiveDateTime::new(date, NaiveTime::MIN).and_utc()
}

fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    midnight(now.date_naive())
}

fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    midnight(now.date_naive().week(Weekday::Mon).first_day())
}

fn month_start(now: DateTime<Utc>) -> DbResult<DateTime<Utc>> {
    calendar_date(now.year(), now.month(), 1)
}

fn next_month_start(now: DateTime<Utc>) -> DbResult<DateTime<Utc>> {
    if now.month() == 12 {
        calendar_date(now.year() + 1, 1, 1)
    } else {
        calendar_date(now.year(), now.month() + 1, 1)
    }
}

fn year_start(now: DateTime<Utc>) -> DbResult<DateTime<Utc>> {
    calendar_date(now.year(), 1, 1)
}

fn next_year_start(now: DateTime<Utc>) -> DbResult<DateTime<Utc>> {
    calendar_date(now.year() + 1, 1, 1)
}

fn calendar_date(year: i32, month: u32, day: u32) -> DbResult<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(midnight)
        .ok_or_else(|| DbError::Internal(format!("invalid calendar date {year}-{month}-{day}")))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::repository::medicine::{MedicineRepository, NewMedicine};
    use crate::repository::sale::{NewSale, NewSaleLine, SaleRepository};
    use crate::repository::stock::{NewStockBatch, StockRepository};
    use crate::repository::user::{NewOwner, UserRepository};
    use pharmapos_core::Discount;

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        medicines: MedicineRepository,
        stock: StockRepository,
        sales: SaleRepository,
        reports: ReportRepository,
        tenant: TenantSlug,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new(StoreConfig::ephemeral()));
        Fixture {
            medicines: MedicineRepository::new(registry.clone()),
            stock: StockRepository::new(registry.clone()),
            sales: SaleRepository::new(registry.clone()),
            reports: ReportRepository::new(registry.clone()),
            registry,
            tenant: TenantSlug::new("test-pharmacy").unwrap(),
        }
    }

    /// Medicine + batch priced 250 retail / 100 cost per unit.
    async fn seeded_batch(fx: &Fixture, name: &str, units: i64) -> String {
        let medicine = fx
            .medicines
            .create(
                &fx.tenant,
                NewMedicine {
                    name: name.into(),
                    generic_name: None,
                    dose_form: Default::default(),
                    strength: None,
                    manufacturer: None,
                    unit_price_cents: 250,
                    pack_size: None,
                },
            )
            .await
            .unwrap();
        fx.stock
            .intake(
                &fx.tenant,
                NewStockBatch {
                    medicine_id: medicine.id,
                    batch_number: None,
                    boxes: 1,
                    cartons_per_box: 1,
                    strips_per_carton: 1,
                    units_per_strip: units,
                    expiry_date: None,
                    purchase_price_cents: 100,
                    selling_price_cents: 250,
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn sell(
        fx: &Fixture,
        batch_id: &str,
        quantity: i64,
        seller: &str,
        customer: Option<&str>,
        status: PaymentStatus,
    ) -> String {
        fx.sales
            .create_sale(
                &fx.tenant,
                NewSale {
                    seller_id: seller.into(),
                    issued_by: None,
                    customer_name: customer.map(Into::into),
                    customer_phone: None,
                    discount: Discount::none(),
                    payment_status: status,
                    paid_amount_cents: None,
                    payment_type: None,
                    transaction_id: None,
                    declared_total_cents: None,
                    items: vec![NewSaleLine {
                        batch_id: batch_id.into(),
                        quantity,
                        discount: None,
                    }],
                },
            )
            .await
            .unwrap()
            .sale
            .id
    }

    #[tokio::test]
    async fn test_dashboard_today_headline_numbers() {
        let fx = fixture();
        let batch = seeded_batch(&fx, "Panadol", 100).await;

        // 3 paid units for Alice, 2 paid for Bob, 2 due (anonymous).
        sell(&fx, &batch, 3, "seller-1", Some("Alice"), PaymentStatus::Paid).await;
        sell(&fx, &batch, 2, "seller-1", Some("Bob"), PaymentStatus::Paid).await;
        sell(&fx, &batch, 2, "seller-2", None, PaymentStatus::Due).await;

        let report = fx
            .reports
            .dashboard(&fx.tenant, &SellerScope::all(), DashboardRange::Today)
            .await
            .unwrap();

        assert_eq!(report.sales_count, 3);
        assert_eq!(report.revenue_cents, 7 * 250);
        assert_eq!(report.cost_cents, 7 * 100);
        assert_eq!(report.profit_cents, 7 * 150);
        assert_eq!(report.distinct_customers, 2);
        assert_eq!(report.total_due_cents, 2 * 250);
        assert!((report.margin_percent - 60.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_dashboard_buckets_sum_to_headline() {
        let fx = fixture();
        let batch = seeded_batch(&fx, "Panadol", 100).await;
        for _ in 0..4 {
            sell(&fx, &batch, 1, "seller-1", None, PaymentStatus::Paid).await;
        }

        let report = fx
            .reports
            .dashboard(&fx.tenant, &SellerScope::all(), DashboardRange::Today)
            .await
            .unwrap();

        let bucket_revenue: i64 = report.buckets.iter().map(|b| b.revenue_cents).sum();
        let bucket_count: i64 = report.buckets.iter().map(|b| b.sales_count).sum();
        assert_eq!(bucket_revenue, report.revenue_cents);
        assert_eq!(bucket_count, report.sales_count);
    }

    #[tokio::test]
    async fn test_dashboard_empty_window_is_zeroed() {
        let fx = fixture();
        // Register the schema without creating any sales.
        seeded_batch(&fx, "Panadol", 10).await;

        let report = fx
            .reports
            .dashboard(&fx.tenant, &SellerScope::all(), DashboardRange::Year)
            .await
            .unwrap();

        assert_eq!(report.sales_count, 0);
        assert_eq!(report.revenue_cents, 0);
        assert_eq!(report.margin_percent, 0.0);
        assert!(report.buckets.is_empty());
        assert!(report.top_products.is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_explicit_range_bounds() {
        let fx = fixture();
        let batch = seeded_batch(&fx, "Panadol", 100).await;
        let sale_id = sell(&fx, &batch, 1, "seller-1", None, PaymentStatus::Paid).await;
        sell(&fx, &batch, 1, "seller-1", None, PaymentStatus::Paid).await;

        // Move one sale to yesterday.
        let handle = fx.reports.handle(&fx.tenant).await.unwrap();
        let yesterday = Utc::now() - chrono::Duration::days(1);
        sqlx::query("UPDATE sales SET created_at = ?2 WHERE id = ?1")
            .bind(&sale_id)
            .bind(yesterday)
            .execute(handle.pool())
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        let report = fx
            .reports
            .dashboard(
                &fx.tenant,
                &SellerScope::all(),
                DashboardRange::Explicit {
                    from: today,
                    to: today,
                },
            )
            .await
            .unwrap();
        assert_eq!(report.sales_count, 1);

        let both = fx
            .reports
            .dashboard(
                &fx.tenant,
                &SellerScope::all(),
                DashboardRange::Explicit {
                    from: today - chrono::Duration::days(1),
                    to: today,
                },
            )
            .await
            .unwrap();
        assert_eq!(both.sales_count, 2);
        // Calendar-date buckets: one per day.
        assert_eq!(both.buckets.len(), 2);
    }

    #[tokio::test]
    async fn test_dashboard_rejects_inverted_explicit_range() {
        let fx = fixture();
        let today = Utc::now().date_naive();
        let err = fx
            .reports
            .dashboard(
                &fx.tenant,
                &SellerScope::all(),
                DashboardRange::Explicit {
                    from: today,
                    to: today - chrono::Duration::days(1),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(_)));
    }

    #[tokio::test]
    async fn test_dashboard_seller_scope_filters() {
        let fx = fixture();
        let batch = seeded_batch(&fx, "Panadol", 100).await;
        sell(&fx, &batch, 3, "seller-1", None, PaymentStatus::Paid).await;
        sell(&fx, &batch, 1, "seller-2", None, PaymentStatus::Paid).await;

        let scoped = fx
            .reports
            .dashboard(
                &fx.tenant,
                &SellerScope::only("seller-2"),
                DashboardRange::Today,
            )
            .await
            .unwrap();

        assert_eq!(scoped.sales_count, 1);
        assert_eq!(scoped.revenue_cents, 250);
    }

    #[tokio::test]
    async fn test_top_products_capped_at_five() {
        let fx = fixture();

        for i in 0..6 {
            let batch = seeded_batch(&fx, &format!("Product {i}"), 100).await;
            // Product 0 sells 1 unit, product 5 sells 6.
            sell(&fx, &batch, i + 1, "seller-1", None, PaymentStatus::Paid).await;
        }

        let report = fx
            .reports
            .dashboard(&fx.tenant, &SellerScope::all(), DashboardRange::Today)
            .await
            .unwrap();

        assert_eq!(report.top_products.len(), 5);
        assert_eq!(report.top_products[0].medicine_name, "Product 5");
        assert_eq!(report.top_products[0].units_sold, 6);
        // The one-unit seller fell off the list.
        assert!(report
            .top_products
            .iter()
            .all(|p| p.medicine_name != "Product 0"));
    }

    #[tokio::test]
    async fn test_paginated_sales_filters_and_sort() {
        let fx = fixture();
        let batch = seeded_batch(&fx, "Panadol", 100).await;
        sell(&fx, &batch, 1, "seller-1", Some("Alice"), PaymentStatus::Paid).await;
        sell(&fx, &batch, 4, "seller-1", Some("Bob"), PaymentStatus::Due).await;
        sell(&fx, &batch, 2, "seller-2", Some("Alison"), PaymentStatus::Paid).await;

        let all = fx
            .reports
            .paginated_sales(&fx.tenant, &SellerScope::all(), SalesQuery::default())
            .await
            .unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.items.len(), 3);
        assert!(!all.items[0].items.is_empty());

        let ali = fx
            .reports
            .paginated_sales(
                &fx.tenant,
                &SellerScope::all(),
                SalesQuery {
                    search: Some("Ali".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(ali.total, 2);

        let due = fx
            .reports
            .paginated_sales(
                &fx.tenant,
                &SellerScope::all(),
                SalesQuery {
                    statuses: vec![PaymentStatus::Due],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(due.total, 1);
        assert_eq!(due.items[0].sale.customer_name.as_deref(), Some("Bob"));

        let either = fx
            .reports
            .paginated_sales(
                &fx.tenant,
                &SellerScope::all(),
                SalesQuery {
                    statuses: vec![PaymentStatus::Due, PaymentStatus::Paid],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(either.total, 3);

        let by_total = fx
            .reports
            .paginated_sales(
                &fx.tenant,
                &SellerScope::all(),
                SalesQuery {
                    sort: SaleSort::TotalHighest,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_total.items[0].sale.total_cents, 1000);

        let by_invoice = fx
            .reports
            .paginated_sales(
                &fx.tenant,
                &SellerScope::all(),
                SalesQuery {
                    sort: SaleSort::InvoiceAsc,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let invoices: Vec<&str> = by_invoice
            .items
            .iter()
            .map(|s| s.sale.invoice_id.as_str())
            .collect();
        let mut sorted = invoices.clone();
        sorted.sort();
        assert_eq!(invoices, sorted);

        let scoped = fx
            .reports
            .paginated_sales(
                &fx.tenant,
                &SellerScope::only("seller-2"),
                SalesQuery::default(),
            )
            .await
            .unwrap();
        assert_eq!(scoped.total, 1);
    }

    #[tokio::test]
    async fn test_paginated_sales_page_meta() {
        let fx = fixture();
        let batch = seeded_batch(&fx, "Panadol", 100).await;
        for _ in 0..7 {
            sell(&fx, &batch, 1, "seller-1", None, PaymentStatus::Paid).await;
        }

        let page = fx
            .reports
            .paginated_sales(
                &fx.tenant,
                &SellerScope::all(),
                SalesQuery {
                    page: Some(2),
                    limit: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(page.total, 7);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());
        assert!(page.has_prev());
    }

    #[tokio::test]
    async fn test_customer_sales_projection_and_sort() {
        let fx = fixture();
        let batch = seeded_batch(&fx, "Panadol", 100).await;
        sell(&fx, &batch, 2, "seller-1", Some("Alice"), PaymentStatus::Paid).await;
        sell(&fx, &batch, 4, "seller-1", Some("Alice"), PaymentStatus::Due).await;
        sell(&fx, &batch, 1, "seller-1", Some("Bob"), PaymentStatus::Paid).await;

        let ledger = fx
            .reports
            .customer_sales(&fx.tenant, &SellerScope::all(), CustomerQuery::default())
            .await
            .unwrap();
        assert_eq!(ledger.total, 3);

        // Paid sales carry zero due; the due sale carries the full total.
        let paid: Vec<_> = ledger
            .items
            .iter()
            .filter(|r| r.payment_status == PaymentStatus::Paid)
            .collect();
        assert!(paid.iter().all(|r| r.due_cents == 0));
        let due_row = ledger
            .items
            .iter()
            .find(|r| r.payment_status == PaymentStatus::Due)
            .unwrap();
        assert_eq!(due_row.total_cents, 4 * 250);
        assert_eq!(due_row.paid_amount_cents, 0);
        assert_eq!(due_row.due_cents, 4 * 250);

        // Highest outstanding balance first.
        let by_due = fx
            .reports
            .customer_sales(
                &fx.tenant,
                &SellerScope::all(),
                CustomerQuery {
                    sort: CustomerSort::DueHighest,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_due.items[0].due_cents, 4 * 250);
        assert_eq!(by_due.items[0].customer_name.as_deref(), Some("Alice"));

        let by_name = fx
            .reports
            .customer_sales(
                &fx.tenant,
                &SellerScope::all(),
                CustomerQuery {
                    sort: CustomerSort::CustomerAsc,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_name.items[0].customer_name.as_deref(), Some("Alice"));
        assert_eq!(by_name.items[2].customer_name.as_deref(), Some("Bob"));

        let alice_only = fx
            .reports
            .customer_sales(
                &fx.tenant,
                &SellerScope::all(),
                CustomerQuery {
                    search: Some("Alice".into()),
                    statuses: vec![PaymentStatus::Due],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(alice_only.total, 1);
    }

    #[tokio::test]
    async fn test_leaderboard_cards_and_series() {
        let fx = fixture();
        let users = UserRepository::new(fx.registry.clone());
        let owner = users
            .register_owner(NewOwner {
                name: "Hamza Khalid".into(),
                email: "hamza@testpharmacy.pk".into(),
                password_hash: "$argon2id$stub".into(),
                shop_name: "Test Pharmacy".into(),
                location: None,
                phone: None,
            })
            .await
            .unwrap();

        let batch = seeded_batch(&fx, "Panadol", 100).await;
        sell(&fx, &batch, 3, &owner.id, None, PaymentStatus::Paid).await;
        sell(&fx, &batch, 1, &owner.id, None, PaymentStatus::Paid).await;
        sell(&fx, &batch, 2, "ghost-seller", None, PaymentStatus::Paid).await;

        let board = fx.reports.seller_leaderboard(&fx.tenant).await.unwrap();

        assert_eq!(board.cards.len(), 2);
        // Best year revenue first.
        assert_eq!(board.cards[0].seller_id, owner.id);
        assert_eq!(board.cards[0].seller_name.as_deref(), Some("Hamza Khalid"));
        assert_eq!(board.cards[0].today_cents, 1000);
        assert_eq!(board.cards[0].week_cents, 1000);
        assert_eq!(board.cards[0].month_cents, 1000);
        assert_eq!(board.cards[0].year_cents, 1000);
        assert_eq!(board.cards[0].sales_count, 2);
        assert_eq!(board.cards[1].seller_id, "ghost-seller");
        assert_eq!(board.cards[1].year_cents, 500);
        // No directory row behind that id.
        assert!(board.cards[1].seller_name.is_none());

        // All of today's sales land in one month bucket per seller.
        let this_month = format!("{:02}", Utc::now().month());
        assert_eq!(board.yearly_chart.len(), 2);
        assert!(board.yearly_chart.iter().all(|p| p.bucket == this_month));

        let weekday_bucket = &board.weekly_chart[0].bucket;
        let weekday: i64 = weekday_bucket.parse().unwrap();
        assert!((1..=7).contains(&weekday));
    }

    #[test]
    fn test_window_resolution() {
        let now = DateTime::parse_from_rfc3339("2026-08-22T09:15:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let (from, to, bucket) = resolve_window(DashboardRange::Today, now).unwrap();
        assert_eq!(from.to_rfc3339(), "2026-08-22T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2026-08-23T00:00:00+00:00");
        assert_eq!(bucket, HOUR_BUCKET);

        // 2026-08-22 is a Saturday; the week began Monday the 17th.
        let (from, to, _) = resolve_window(DashboardRange::Week, now).unwrap();
        assert_eq!(from.to_rfc3339(), "2026-08-17T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2026-08-24T00:00:00+00:00");

        let (from, to, _) = resolve_window(DashboardRange::Month, now).unwrap();
        assert_eq!(from.to_rfc3339(), "2026-08-01T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2026-09-01T00:00:00+00:00");

        let (from, to, _) = resolve_window(DashboardRange::Year, now).unwrap();
        assert_eq!(from.to_rfc3339(), "2026-01-01T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2027-01-01T00:00:00+00:00");

        // December rolls the month window into the next year.
        let december = DateTime::parse_from_rfc3339("2026-12-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let (_, to, _) = resolve_window(DashboardRange::Month, december).unwrap();
        assert_eq!(to.to_rfc3339(), "2027-01-01T00:00:00+00:00");
    }
}
