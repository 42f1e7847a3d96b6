//! Purchase order repository.
//!
//! Restock requests raised at the counter when something runs low. These are
//! free-text rows, not catalog references: the medicine may not exist in the
//! shop's catalog yet. Status moves along `pending -> ordered -> received`,
//! with `cancelled` reachable from the two non-terminal states.

use std::sync::Arc;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;
use uuid::Uuid;

use pharmapos_core::validation::validate_pagination;
use pharmapos_core::{PurchaseOrder, PurchaseOrderStatus, TenantSlug, ValidationError};

use crate::entities;
use crate::error::{DbError, DbResult};
use crate::registry::{ConnectionRegistry, ModelHandle};
use crate::repository::Page;

const ORDER_COLUMNS: &str = "id, medicine_name, quantity_boxes, quantity_units, note, \
     status, requested_by, created_at, updated_at";

/// Input for raising a restock request.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewPurchaseOrder {
    pub medicine_name: String,
    #[serde(default)]
    pub quantity_boxes: i64,
    #[serde(default)]
    pub quantity_units: i64,
    pub note: Option<String>,
    pub requested_by: Option<String>,
}

/// Partial update; only applies while the order is still pending.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct PurchaseOrderUpdate {
    pub medicine_name: Option<String>,
    pub quantity_boxes: Option<i64>,
    pub quantity_units: Option<i64>,
    pub note: Option<String>,
}

/// Outcome of a bulk status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BulkStatusReport {
    /// Orders actually moved.
    pub updated: u64,
    /// Orders left alone (missing id, or not in a state that allows the move).
    pub skipped: u64,
}

#[derive(Debug, Clone)]
pub struct PurchaseOrderRepository {
    registry: Arc<ConnectionRegistry>,
}

impl PurchaseOrderRepository {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        PurchaseOrderRepository { registry }
    }

    async fn handle(&self, tenant: &TenantSlug) -> DbResult<ModelHandle> {
        self.registry.model(tenant, &entities::PURCHASE_ORDERS).await
    }

    pub async fn create(
        &self,
        tenant: &TenantSlug,
        input: NewPurchaseOrder,
    ) -> DbResult<PurchaseOrder> {
        let medicine_name = input.medicine_name.trim();
        if medicine_name.is_empty() {
            return Err(ValidationError::Required {
                field: "medicine_name".to_string(),
            }
            .into());
        }
        validate_order_quantity("quantity_boxes", input.quantity_boxes)?;
        validate_order_quantity("quantity_units", input.quantity_units)?;
        if input.quantity_boxes == 0 && input.quantity_units == 0 {
            return Err(ValidationError::NotAllowed {
                field: "quantity".to_string(),
                reason: "order must request at least one box or unit".to_string(),
            }
            .into());
        }

        let handle = self.handle(tenant).await?;
        let now = Utc::now();
        let order = PurchaseOrder {
            id: Uuid::new_v4().to_string(),
            medicine_name: medicine_name.to_string(),
            quantity_boxes: input.quantity_boxes,
            quantity_units: input.quantity_units,
            note: input.note,
            status: PurchaseOrderStatus::Pending,
            requested_by: input.requested_by,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO purchase_orders \
             (id, medicine_name, quantity_boxes, quantity_units, note, status, \
              requested_by, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&order.id)
        .bind(&order.medicine_name)
        .bind(order.quantity_boxes)
        .bind(order.quantity_units)
        .bind(&order.note)
        .bind(order.status)
        .bind(&order.requested_by)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(handle.pool())
        .await?;

        debug!(tenant = %tenant, order_id = %order.id, medicine = %order.medicine_name, "Purchase order raised");
        Ok(order)
    }

    pub async fn get(&self, tenant: &TenantSlug, order_id: &str) -> DbResult<PurchaseOrder> {
        let handle = self.handle(tenant).await?;
        sqlx::query_as::<_, PurchaseOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE id = ?1"
        ))
        .bind(order_id)
        .fetch_optional(handle.pool())
        .await?
        .ok_or_else(|| DbError::not_found("PurchaseOrder", order_id))
    }

    /// Orders newest first, optionally narrowed to one status.
    pub async fn list(
        &self,
        tenant: &TenantSlug,
        status: Option<PurchaseOrderStatus>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> DbResult<Page<PurchaseOrder>> {
        let (page, limit) = validate_pagination(page, limit)?;
        let handle = self.handle(tenant).await?;

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM purchase_orders");
        if let Some(status) = status {
            count_query.push(" WHERE status = ").push_bind(status);
        }
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(handle.pool())
            .await?;

        let mut page_query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {ORDER_COLUMNS} FROM purchase_orders"));
        if let Some(status) = status {
            page_query.push(" WHERE status = ").push_bind(status);
        }
        page_query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind((page - 1) * limit);

        let orders: Vec<PurchaseOrder> = page_query
            .build_query_as()
            .fetch_all(handle.pool())
            .await?;

        Ok(Page::new(orders, total, page, limit))
    }

    /// Edits name, quantities or note. Rejected once the order left `pending`;
    /// an order the supplier already saw should not change under them.
    pub async fn update(
        &self,
        tenant: &TenantSlug,
        order_id: &str,
        update: PurchaseOrderUpdate,
    ) -> DbResult<PurchaseOrder> {
        let mut order = self.get(tenant, order_id).await?;
        if order.status != PurchaseOrderStatus::Pending {
            return Err(DbError::conflict("status", order.status.as_str()));
        }

        if let Some(name) = update.medicine_name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ValidationError::Required {
                    field: "medicine_name".to_string(),
                }
                .into());
            }
            order.medicine_name = name;
        }
        if let Some(boxes) = update.quantity_boxes {
            validate_order_quantity("quantity_boxes", boxes)?;
            order.quantity_boxes = boxes;
        }
        if let Some(units) = update.quantity_units {
            validate_order_quantity("quantity_units", units)?;
            order.quantity_units = units;
        }
        if order.quantity_boxes == 0 && order.quantity_units == 0 {
            return Err(ValidationError::NotAllowed {
                field: "quantity".to_string(),
                reason: "order must request at least one box or unit".to_string(),
            }
            .into());
        }
        if let Some(note) = update.note {
            order.note = Some(note);
        }
        order.updated_at = Utc::now();

        let handle = self.handle(tenant).await?;
        sqlx::query(
            "UPDATE purchase_orders \
             SET medicine_name = ?2, quantity_boxes = ?3, quantity_units = ?4, \
                 note = ?5, updated_at = ?6 \
             WHERE id = ?1",
        )
        .bind(&order.id)
        .bind(&order.medicine_name)
        .bind(order.quantity_boxes)
        .bind(order.quantity_units)
        .bind(&order.note)
        .bind(order.updated_at)
        .execute(handle.pool())
        .await?;

        Ok(order)
    }

    /// Moves the order along the status graph. Invalid moves are a conflict,
    /// not a validation error; the order exists, it is just elsewhere in its
    /// lifecycle.
    pub async fn set_status(
        &self,
        tenant: &TenantSlug,
        order_id: &str,
        next: PurchaseOrderStatus,
    ) -> DbResult<PurchaseOrder> {
        let mut order = self.get(tenant, order_id).await?;
        if !order.status.can_transition_to(next) {
            return Err(DbError::conflict(
                "status",
                format!("{} -> {}", order.status, next),
            ));
        }

        let handle = self.handle(tenant).await?;
        let now = Utc::now();

        // Compare-and-set on the status we read, so two concurrent moves
        // cannot both win.
        let result = sqlx::query(
            "UPDATE purchase_orders SET status = ?2, updated_at = ?3 \
             WHERE id = ?1 AND status = ?4",
        )
        .bind(order_id)
        .bind(next)
        .bind(now)
        .bind(order.status)
        .execute(handle.pool())
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get(tenant, order_id).await?;
            return Err(DbError::conflict(
                "status",
                format!("{} -> {}", current.status, next),
            ));
        }

        debug!(tenant = %tenant, order_id, status = %next, "Purchase order transitioned");
        order.status = next;
        order.updated_at = now;
        Ok(order)
    }

    /// Moves a batch of orders to `next` in one statement, honoring the
    /// status graph row by row. Covers the two supplier-run flows: sending a
    /// selection out (`Ordered`) and booking a delivery in (`Received`).
    /// Orders that are missing or cannot reach `next` from where they are
    /// get counted as skipped, not failed; the batch keeps going.
    pub async fn set_status_bulk(
        &self,
        tenant: &TenantSlug,
        order_ids: &[String],
        next: PurchaseOrderStatus,
    ) -> DbResult<BulkStatusReport> {
        if order_ids.is_empty() {
            return Ok(BulkStatusReport {
                updated: 0,
                skipped: 0,
            });
        }
        let sources: Vec<PurchaseOrderStatus> = [
            PurchaseOrderStatus::Pending,
            PurchaseOrderStatus::Ordered,
            PurchaseOrderStatus::Received,
            PurchaseOrderStatus::Cancelled,
        ]
        .into_iter()
        .filter(|from| from.can_transition_to(next))
        .collect();
        if sources.is_empty() {
            // Nothing transitions into this state (Pending has no inbound edge).
            return Ok(BulkStatusReport {
                updated: 0,
                skipped: order_ids.len() as u64,
            });
        }

        let handle = self.handle(tenant).await?;
        let now = Utc::now();

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE purchase_orders SET status = ");
        query.push_bind(next);
        query.push(", updated_at = ");
        query.push_bind(now);
        query.push(" WHERE status IN (");
        let mut from_list = query.separated(", ");
        for from in &sources {
            from_list.push_bind(*from);
        }
        from_list.push_unseparated(")");
        query.push(" AND id IN (");
        let mut ids = query.separated(", ");
        for order_id in order_ids {
            ids.push_bind(order_id.clone());
        }
        ids.push_unseparated(")");

        let updated = query.build().execute(handle.pool()).await?.rows_affected();
        let skipped = order_ids.len() as u64 - updated;

        debug!(tenant = %tenant, status = %next, updated, skipped, "Bulk status move");
        Ok(BulkStatusReport { updated, skipped })
    }

    /// Removes an order. Allowed for `pending` and `cancelled` only; ordered
    /// and received rows are purchase history.
    pub async fn delete(&self, tenant: &TenantSlug, order_id: &str) -> DbResult<()> {
        let handle = self.handle(tenant).await?;
        let result = sqlx::query(
            "DELETE FROM purchase_orders \
             WHERE id = ?1 AND status IN ('pending', 'cancelled')",
        )
        .bind(order_id)
        .execute(handle.pool())
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get(tenant, order_id).await?;
            return Err(DbError::conflict("status", current.status.as_str()));
        }
        Ok(())
    }
}

fn validate_order_quantity(field: &str, value: i64) -> DbResult<()> {
    if value < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        }
        .into());
    }
    Ok(())
}
