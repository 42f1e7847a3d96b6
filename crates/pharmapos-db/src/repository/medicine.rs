//! # Medicine Repository
//!
//! Catalog CRUD, search and bulk import for one shop's medicine list.
//!
//! ## Bulk Import Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  import_bulk(rows)                                                      │
//! │       │                                                                 │
//! │       ├── 1. validate every row up front (reject the file, not row 814) │
//! │       │                                                                 │
//! │       ├── 2. split into chunks of ≤ 1000 rows                           │
//! │       │                                                                 │
//! │       └── 3. run chunks with buffer_unordered(5)                        │
//! │              each chunk = one transaction                               │
//! │              duplicate slugs: ON CONFLICT DO NOTHING → counted skipped  │
//! │                                                                         │
//! │  Result: ImportReport { inserted, skipped, chunks }                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use futures::stream::StreamExt;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use pharmapos_core::validation::{
    validate_medicine_name, validate_pack_count, validate_pagination, validate_price_cents,
    validate_search_query,
};
use pharmapos_core::{slugify, DoseForm, Medicine, TenantSlug, ValidationError};

use crate::entities;
use crate::error::{DbError, DbResult};
use crate::registry::{ConnectionRegistry, ModelHandle};
use crate::repository::Page;

/// Rows per import chunk. Each chunk commits in its own transaction.
pub const IMPORT_CHUNK_ROWS: usize = 1000;
/// Chunks allowed in flight at once during a bulk import.
pub const IMPORT_CONCURRENCY: usize = 5;

/// Input for creating (or importing) a catalog entry.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewMedicine {
    pub name: String,
    pub generic_name: Option<String>,
    #[serde(default)]
    pub dose_form: DoseForm,
    pub strength: Option<String>,
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub unit_price_cents: i64,
    pub pack_size: Option<i64>,
}

/// Partial update; `None` fields are left untouched.
///
/// The slug is never recomputed on rename: it is a stable identifier that
/// imports and lookups key on.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct MedicineUpdate {
    pub name: Option<String>,
    pub generic_name: Option<String>,
    pub dose_form: Option<DoseForm>,
    pub strength: Option<String>,
    pub manufacturer: Option<String>,
    pub unit_price_cents: Option<i64>,
    pub pack_size: Option<i64>,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ImportReport {
    pub inserted: u64,
    /// Rows dropped because their slug already existed.
    pub skipped: u64,
    pub chunks: usize,
}

/// Repository for the per-shop medicine catalog.
#[derive(Debug, Clone)]
pub struct MedicineRepository {
    registry: Arc<ConnectionRegistry>,
}

impl MedicineRepository {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        MedicineRepository { registry }
    }

    async fn handle(&self, tenant: &TenantSlug) -> DbResult<ModelHandle> {
        self.registry.model(tenant, &entities::MEDICINES).await
    }

    /// Creates a catalog entry.
    ///
    /// The slug concatenates name, dose form, generic, strength and
    /// manufacturer ("Panadol" 500mg tablets by GSK →
    /// `panadol-tablet-paracetamol-500mg-gsk`), so look-alike entries stay
    /// distinct. A second entry with the same slug is a
    /// [`DbError::Conflict`]. The slug never changes after creation.
    pub async fn create(&self, tenant: &TenantSlug, new: NewMedicine) -> DbResult<Medicine> {
        validate_new_medicine(&new)?;
        let slug = catalog_slug(&new)?;
        let handle = self.handle(tenant).await?;

        let now = Utc::now();
        let medicine = Medicine {
            id: Uuid::new_v4().to_string(),
            slug,
            name: new.name,
            generic_name: new.generic_name,
            dose_form: new.dose_form,
            strength: new.strength,
            manufacturer: new.manufacturer,
            unit_price_cents: new.unit_price_cents,
            pack_size: new.pack_size,
            created_at: now,
            updated_at: now,
        };

        debug!(tenant = %tenant, slug = %medicine.slug, "Creating medicine");

        sqlx::query(
            r#"
            INSERT INTO medicines (
                id, slug, name, generic_name, dose_form, strength,
                manufacturer, unit_price_cents, pack_size, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&medicine.id)
        .bind(&medicine.slug)
        .bind(&medicine.name)
        .bind(&medicine.generic_name)
        .bind(medicine.dose_form)
        .bind(&medicine.strength)
        .bind(&medicine.manufacturer)
        .bind(medicine.unit_price_cents)
        .bind(medicine.pack_size)
        .bind(medicine.created_at)
        .bind(medicine.updated_at)
        .execute(handle.pool())
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict { field, .. } => DbError::Conflict {
                field,
                value: medicine.slug.clone(),
            },
            other => other,
        })?;

        Ok(medicine)
    }

    /// Gets a medicine by ID.
    pub async fn get(&self, tenant: &TenantSlug, id: &str) -> DbResult<Medicine> {
        let handle = self.handle(tenant).await?;

        sqlx::query_as::<_, Medicine>(
            r#"
            SELECT id, slug, name, generic_name, dose_form, strength,
                   manufacturer, unit_price_cents, pack_size, created_at, updated_at
            FROM medicines
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(handle.pool())
        .await?
        .ok_or_else(|| DbError::not_found("Medicine", id))
    }

    /// Looks up a medicine by its catalog slug.
    pub async fn find_by_slug(
        &self,
        tenant: &TenantSlug,
        slug: &str,
    ) -> DbResult<Option<Medicine>> {
        let handle = self.handle(tenant).await?;

        let medicine = sqlx::query_as::<_, Medicine>(
            r#"
            SELECT id, slug, name, generic_name, dose_form, strength,
                   manufacturer, unit_price_cents, pack_size, created_at, updated_at
            FROM medicines
            WHERE slug = ?1
            "#,
        )
        .bind(slug)
        .fetch_optional(handle.pool())
        .await?;

        Ok(medicine)
    }

    /// Searches by name, generic name or the catalog slug.
    pub async fn search(
        &self,
        tenant: &TenantSlug,
        query: &str,
        limit: i64,
    ) -> DbResult<Vec<Medicine>> {
        let query = validate_search_query(query)?;
        let handle = self.handle(tenant).await?;
        let pattern = format!("%{}%", query);
        // The slug carries generic, strength and manufacturer, so matching
        // it in slugified form covers "gsk" and "500mg" style queries.
        let slug_term = slugify(&query);
        let slug_pattern = if slug_term.is_empty() {
            pattern.clone()
        } else {
            format!("%{slug_term}%")
        };

        debug!(tenant = %tenant, query = %query, "Searching medicines");

        let medicines = sqlx::query_as::<_, Medicine>(
            r#"
            SELECT id, slug, name, generic_name, dose_form, strength,
                   manufacturer, unit_price_cents, pack_size, created_at, updated_at
            FROM medicines
            WHERE name LIKE ?1 OR generic_name LIKE ?1 OR slug LIKE ?2
            ORDER BY name
            LIMIT ?3
            "#,
        )
        .bind(&pattern)
        .bind(&slug_pattern)
        .bind(limit.clamp(1, 100))
        .fetch_all(handle.pool())
        .await?;

        Ok(medicines)
    }

    /// Lists the catalog alphabetically, paginated.
    pub async fn list(
        &self,
        tenant: &TenantSlug,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> DbResult<Page<Medicine>> {
        let (page, limit) = validate_pagination(page, limit)?;
        let handle = self.handle(tenant).await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medicines")
            .fetch_one(handle.pool())
            .await?;

        let items = sqlx::query_as::<_, Medicine>(
            r#"
            SELECT id, slug, name, generic_name, dose_form, strength,
                   manufacturer, unit_price_cents, pack_size, created_at, updated_at
            FROM medicines
            ORDER BY name
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(handle.pool())
        .await?;

        Ok(Page::new(items, total, page, limit))
    }

    /// Applies a partial update and returns the new row.
    pub async fn update(
        &self,
        tenant: &TenantSlug,
        id: &str,
        update: MedicineUpdate,
    ) -> DbResult<Medicine> {
        let mut medicine = self.get(tenant, id).await?;

        if let Some(name) = update.name {
            validate_medicine_name(&name)?;
            medicine.name = name;
        }
        if let Some(generic_name) = update.generic_name {
            medicine.generic_name = Some(generic_name);
        }
        if let Some(dose_form) = update.dose_form {
            medicine.dose_form = dose_form;
        }
        if let Some(strength) = update.strength {
            medicine.strength = Some(strength);
        }
        if let Some(manufacturer) = update.manufacturer {
            medicine.manufacturer = Some(manufacturer);
        }
        if let Some(price) = update.unit_price_cents {
            validate_price_cents("unit_price_cents", price)?;
            medicine.unit_price_cents = price;
        }
        if let Some(pack_size) = update.pack_size {
            validate_pack_count("pack_size", pack_size)?;
            medicine.pack_size = Some(pack_size);
        }
        medicine.updated_at = Utc::now();

        let handle = self.handle(tenant).await?;
        sqlx::query(
            r#"
            UPDATE medicines SET
                name = ?2, generic_name = ?3, dose_form = ?4, strength = ?5,
                manufacturer = ?6, unit_price_cents = ?7, pack_size = ?8, updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&medicine.id)
        .bind(&medicine.name)
        .bind(&medicine.generic_name)
        .bind(medicine.dose_form)
        .bind(&medicine.strength)
        .bind(&medicine.manufacturer)
        .bind(medicine.unit_price_cents)
        .bind(medicine.pack_size)
        .bind(medicine.updated_at)
        .execute(handle.pool())
        .await?;

        Ok(medicine)
    }

    /// Deletes a catalog entry.
    ///
    /// Fails with [`DbError::ForeignKeyViolation`] while stock batches still
    /// reference the medicine; depleted history must be cleared first.
    pub async fn delete(&self, tenant: &TenantSlug, id: &str) -> DbResult<()> {
        let handle = self.handle(tenant).await?;

        let result = sqlx::query("DELETE FROM medicines WHERE id = ?1")
            .bind(id)
            .execute(handle.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Medicine", id));
        }
        Ok(())
    }

    /// Imports a catalog file.
    ///
    /// Validates every row before any write, then inserts in chunks of
    /// [`IMPORT_CHUNK_ROWS`] with at most [`IMPORT_CONCURRENCY`] chunks in
    /// flight. Rows whose slug already exists are skipped, not overwritten.
    pub async fn import_bulk(
        &self,
        tenant: &TenantSlug,
        rows: Vec<NewMedicine>,
    ) -> DbResult<ImportReport> {
        let mut prepared = Vec::with_capacity(rows.len());
        for row in rows {
            validate_new_medicine(&row)?;
            let slug = catalog_slug(&row)?;
            prepared.push((slug, row));
        }

        let handle = self.handle(tenant).await?;
        let chunks: Vec<Vec<(String, NewMedicine)>> = prepared
            .chunks(IMPORT_CHUNK_ROWS)
            .map(|chunk| chunk.to_vec())
            .collect();
        let chunk_count = chunks.len();

        info!(
            tenant = %tenant,
            rows = chunks.iter().map(Vec::len).sum::<usize>(),
            chunks = chunk_count,
            "Starting catalog import"
        );

        let mut inserted = 0u64;
        let mut skipped = 0u64;

        let mut outcomes = futures::stream::iter(chunks.into_iter().map(|chunk| {
            let pool = handle.pool().clone();
            async move { import_chunk(pool, chunk).await }
        }))
        .buffer_unordered(IMPORT_CONCURRENCY);

        while let Some(outcome) = outcomes.next().await {
            let (chunk_inserted, chunk_skipped) = outcome?;
            inserted += chunk_inserted;
            skipped += chunk_skipped;
        }

        info!(tenant = %tenant, inserted, skipped, "Catalog import complete");

        Ok(ImportReport {
            inserted,
            skipped,
            chunks: chunk_count,
        })
    }
}

/// Inserts one chunk in a single transaction, counting duplicate slugs.
async fn import_chunk(
    pool: SqlitePool,
    chunk: Vec<(String, NewMedicine)>,
) -> DbResult<(u64, u64)> {
    let total = chunk.len() as u64;
    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for (slug, row) in &chunk {
        let result = sqlx::query(
            r#"
            INSERT INTO medicines (
                id, slug, name, generic_name, dose_form, strength,
                manufacturer, unit_price_cents, pack_size, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(slug) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(slug)
        .bind(&row.name)
        .bind(&row.generic_name)
        .bind(row.dose_form)
        .bind(&row.strength)
        .bind(&row.manufacturer)
        .bind(row.unit_price_cents)
        .bind(row.pack_size)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok((inserted, total - inserted))
}

fn validate_new_medicine(new: &NewMedicine) -> DbResult<()> {
    validate_medicine_name(&new.name)?;
    validate_price_cents("unit_price_cents", new.unit_price_cents)?;
    if let Some(pack_size) = new.pack_size {
        validate_pack_count("pack_size", pack_size)?;
    }
    Ok(())
}

/// Slug for a catalog entry: name, dose form, generic, strength and
/// manufacturer joined, absent parts skipped.
fn catalog_slug(new: &NewMedicine) -> Result<String, ValidationError> {
    let mut parts = vec![new.name.as_str(), new.dose_form.as_str()];
    for part in [
        new.generic_name.as_deref(),
        new.strength.as_deref(),
        new.manufacturer.as_deref(),
    ]
    .into_iter()
    .flatten()
    {
        if !part.trim().is_empty() {
            parts.push(part);
        }
    }
    let slug = slugify(&parts.join(" "));
    if slug.is_empty() {
        return Err(ValidationError::InvalidFormat {
            field: "name".to_string(),
            reason: "must contain letters or digits".to_string(),
        });
    }
    Ok(slug)
}

// =============================================================================
// Unit Tests
// =============================================================================
