//! # Domain Types
//!
//! Core domain types used throughout PharmaPOS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Medicine     │   │   StockBatch    │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  slug (business)│   │  batch_number   │   │  invoice_id     │       │
//! │  │  dose_form      │   │  total_units    │   │  payment_status │       │
//! │  │  unit_price     │   │  expiry_date    │   │  total_cents    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  PurchaseOrder  │   │      User       │   │    Discount     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  status graph   │   │  role / slug    │   │  kind + value   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for relations
//! - Business ID: (slug, invoice_id, batch_number) - human-readable
//!
//! Monetary fields are stored as `*_cents: i64` with `Money` accessors, so
//! rows map straight onto SQL columns while math stays in the `Money` type.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::money::Money;
use crate::tenant::Role;

// =============================================================================
// Dose Form
// =============================================================================

/// Pharmaceutical dose forms carried by the catalog.
///
/// Import files use loose spellings ("tab", "syp"); `FromStr` accepts the
/// common ones and everything unknown lands in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum DoseForm {
    Tablet,
    Capsule,
    Syrup,
    Injection,
    Ointment,
    Other,
}

impl DoseForm {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DoseForm::Tablet => "tablet",
            DoseForm::Capsule => "capsule",
            DoseForm::Syrup => "syrup",
            DoseForm::Injection => "injection",
            DoseForm::Ointment => "ointment",
            DoseForm::Other => "other",
        }
    }
}

impl fmt::Display for DoseForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for DoseForm {
    fn default() -> Self {
        DoseForm::Other
    }
}

impl FromStr for DoseForm {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "tablet" | "tablets" | "tab" | "tabs" => DoseForm::Tablet,
            "capsule" | "capsules" | "cap" | "caps" => DoseForm::Capsule,
            "syrup" | "syp" | "suspension" => DoseForm::Syrup,
            "injection" | "inj" | "vial" => DoseForm::Injection,
            "ointment" | "cream" | "gel" => DoseForm::Ointment,
            _ => DoseForm::Other,
        })
    }
}

// =============================================================================
// Medicine
// =============================================================================

/// A medicine in the shop catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Medicine {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business identifier, derived from name, dose form, generic name,
    /// strength and manufacturer. Unique per shop, immutable after creation.
    pub slug: String,

    /// Display name shown on invoices.
    pub name: String,

    /// Generic/salt name ("paracetamol" for Panadol).
    pub generic_name: Option<String>,

    pub dose_form: DoseForm,

    /// Strength label ("500mg", "125mg/5ml").
    pub strength: Option<String>,

    pub manufacturer: Option<String>,

    /// Default retail price per unit, in cents.
    pub unit_price_cents: i64,

    /// Units per retail pack, when the shop sells whole packs.
    pub pack_size: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    /// Returns the retail price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// "Panadol 500mg" style label for invoices and search results.
    pub fn display_name(&self) -> String {
        match &self.strength {
            Some(strength) => format!("{} {}", self.name, strength),
            None => self.name.clone(),
        }
    }
}

// =============================================================================
// Stock Batch
// =============================================================================

/// A purchased batch of one medicine sitting on the shelf.
///
/// Pack math: a batch arrives as boxes, each box holds cartons, each carton
/// holds strips, each strip holds units. `total_units` is the sellable count
/// and is the ONLY field sales decrement. It never goes below zero; the
/// conditional update in the stock ledger (plus a CHECK constraint) enforces
/// that without a read-check-write cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockBatch {
    pub id: String,
    pub medicine_id: String,
    /// Catalog name captured at intake, kept for display after catalog edits.
    pub medicine_name: String,
    /// Supplier batch/lot number.
    pub batch_number: String,
    pub boxes: i64,
    pub cartons_per_box: i64,
    pub strips_per_carton: i64,
    pub units_per_strip: i64,
    /// Remaining sellable units. Never negative.
    pub total_units: i64,
    pub expiry_date: Option<NaiveDate>,
    /// What the shop paid per unit, in cents (cost basis for profit).
    pub purchase_price_cents: i64,
    /// What the shop charges per unit, in cents.
    pub selling_price_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockBatch {
    /// Total units represented by the pack counts.
    #[inline]
    pub const fn packed_units(
        boxes: i64,
        cartons_per_box: i64,
        strips_per_carton: i64,
        units_per_strip: i64,
    ) -> i64 {
        boxes * cartons_per_box * strips_per_carton * units_per_strip
    }

    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    #[inline]
    pub fn purchase_price(&self) -> Money {
        Money::from_cents(self.purchase_price_cents)
    }

    /// Whether the batch is expired as of the given date.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        matches!(self.expiry_date, Some(expiry) if expiry < today)
    }
}

// =============================================================================
// Discounts
// =============================================================================

/// How a discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// Value is basis points (1000 = 10% off).
    Percentage,
    /// Value is cents off.
    Fixed,
}

impl DiscountKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage => "percentage",
            DiscountKind::Fixed => "fixed",
        }
    }
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discount as entered at the counter, order-level or per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    #[serde(rename = "type")]
    pub kind: DiscountKind,
    /// Basis points for percentage, cents for fixed.
    pub value: i64,
}

impl Discount {
    pub const fn percentage(bps: i64) -> Self {
        Discount {
            kind: DiscountKind::Percentage,
            value: bps,
        }
    }

    pub const fn fixed(cents: i64) -> Self {
        Discount {
            kind: DiscountKind::Fixed,
            value: cents,
        }
    }

    pub const fn none() -> Self {
        Discount {
            kind: DiscountKind::Fixed,
            value: 0,
        }
    }

    /// The discount amount this takes off the given base.
    ///
    /// A fixed discount larger than the base is capped at the base, so a
    /// discounted amount can never go negative.
    pub fn amount_for(&self, base: Money) -> Money {
        match self.kind {
            DiscountKind::Percentage => base.percentage_of(self.value.clamp(0, 10_000) as u32),
            DiscountKind::Fixed => Money::from_cents(self.value.max(0)).min(base),
        }
    }
}

impl Default for Discount {
    fn default() -> Self {
        Discount::none()
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Whether an invoice has been settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Fully settled; paid amount equals the invoice total.
    Paid,
    /// Credit sale; paid amount is whatever was put down so far.
    Due,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Due => "due",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A finalized sale (invoice). Sales are written once, complete with their
/// items; the only later mutation is settling a due invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    /// Human-facing invoice number (`INV-YYYYMMDD-NNNN`).
    pub invoice_id: String,
    /// User id of the seller this sale is attributed to.
    pub seller_id: String,
    /// Display name of whoever rang it up, frozen at sale time.
    pub issued_by: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    /// Sum of line subtotals (after per-item discounts), in cents.
    pub subtotal_cents: i64,
    pub discount_type: DiscountKind,
    /// Order-level discount as entered (bps or cents, per discount_type).
    pub discount_value: i64,
    /// Order-level discount in cents, as applied.
    pub discount_amount_cents: i64,
    /// Cents taken off by per-item discounts.
    pub items_discount_cents: i64,
    /// items_discount + discount_amount.
    pub total_discount_cents: i64,
    /// Final invoice total, in cents.
    pub total_cents: i64,
    pub payment_status: PaymentStatus,
    pub paid_amount_cents: i64,
    /// Free-form tender label ("cash", "jazzcash", "card").
    pub payment_type: Option<String>,
    /// External payment reference, when the tender has one.
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn paid_amount(&self) -> Money {
        Money::from_cents(self.paid_amount_cents)
    }

    /// Outstanding balance on a due invoice (zero once paid).
    pub fn due_amount(&self) -> Money {
        match self.payment_status {
            PaymentStatus::Paid => Money::zero(),
            PaymentStatus::Due => self.total().saturating_discount(self.paid_amount()),
        }
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item on a sale.
///
/// Uses the snapshot pattern: name, dose form, prices, batch number and
/// expiry are frozen copies taken at sale time. They are never re-resolved
/// against the catalog, so later edits and deletions cannot rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    /// Position on the invoice, 0-based.
    pub line_no: i64,
    /// The stock batch this line decremented.
    pub batch_id: String,
    /// Medicine name at time of sale (frozen).
    pub medicine_name: String,
    /// Dose form label at time of sale (frozen).
    pub dose_form: Option<String>,
    /// Retail price per unit at time of sale, in cents (frozen).
    pub unit_price_cents: i64,
    /// Cost per unit at time of sale, in cents (frozen). Drives profit math.
    pub original_price_cents: i64,
    pub discount_type: Option<DiscountKind>,
    pub discount_value: Option<i64>,
    pub quantity: i64,
    /// Line subtotal after the per-item discount, in cents.
    pub subtotal_cents: i64,
    /// Units remaining on the batch right after this sale (receipt detail).
    pub stock_left: Option<i64>,
    /// Supplier batch number at time of sale (frozen).
    pub batch_number: Option<String>,
    /// Batch expiry at time of sale (frozen).
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Purchase Order
// =============================================================================

/// Lifecycle of a restock request.
///
/// ```text
/// pending ──► ordered ──► received
///    │           │
///    └───────────┴──► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Pending,
    Ordered,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Pending => "pending",
            PurchaseOrderStatus::Ordered => "ordered",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the status graph allows moving to `next`.
    pub fn can_transition_to(&self, next: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Pending, Ordered) | (Pending, Cancelled) | (Ordered, Received) | (Ordered, Cancelled)
        )
    }

    /// Terminal states accept no further transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Received | PurchaseOrderStatus::Cancelled)
    }
}

impl fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(PurchaseOrderStatus::Pending),
            "ordered" => Ok(PurchaseOrderStatus::Ordered),
            "received" => Ok(PurchaseOrderStatus::Received),
            "cancelled" | "canceled" => Ok(PurchaseOrderStatus::Cancelled),
            other => Err(format!("unknown purchase order status '{other}'")),
        }
    }
}

/// A restock request for the supplier run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseOrder {
    pub id: String,
    /// Free text; purchase orders are raised before the medicine may even
    /// exist in the catalog.
    pub medicine_name: String,
    pub quantity_boxes: i64,
    pub quantity_units: i64,
    pub note: Option<String>,
    pub status: PurchaseOrderStatus,
    /// User id of whoever raised the request.
    pub requested_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// User
// =============================================================================

/// An account in the shared user directory.
///
/// Owners (admin) and managers (editor) carry the shop slug; counter workers
/// (user) additionally carry `worker_slug` naming the shop they sell into.
/// The hash is opaque here: verification happens upstream of this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub slug: String,
    pub role: Role,
    pub shop_name: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Owner's shop slug, set on workers only.
    pub worker_slug: Option<String>,
    /// Soft delete flag; deleted users are invisible to lookups.
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
