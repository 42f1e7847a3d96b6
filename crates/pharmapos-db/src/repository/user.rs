//! # User Repository
//!
//! Accounts live in the shared `_directory` namespace, not in any shop's
//! database: login happens before we know which shop the caller belongs to.
//!
//! Two kinds of principal:
//!
//! * **Owners** register a shop. Their slug is derived from the shop name
//!   and doubles as the shop's tenant namespace.
//! * **Workers** are hired into an existing shop. They carry their own slug
//!   plus `worker_slug`, the employer's shop slug. Tenant resolution follows
//!   `worker_slug` so a worker's sales land in the employer's database.
//!
//! Passwords arrive here already hashed; this layer stores and returns the
//! opaque hash and never sees a plaintext credential.
//!
//! Deletion is soft. A deleted account stops resolving through every lookup,
//! but the row stays so old sales can still name their seller.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use pharmapos_core::validation::{validate_email, validate_phone};
use pharmapos_core::{slugify, Identity, Role, TenantSlug, User, ValidationError};

use crate::entities;
use crate::error::{DbError, DbResult};
use crate::registry::{ConnectionRegistry, ModelHandle};

const USER_COLUMNS: &str = "id, name, email, slug, role, shop_name, location, phone, \
     password_hash, worker_slug, is_deleted, created_at, updated_at";

/// Input for registering a shop owner.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewOwner {
    pub name: String,
    pub email: String,
    /// Already-hashed password.
    pub password_hash: String,
    pub shop_name: String,
    pub location: Option<String>,
    pub phone: Option<String>,
}

/// Input for hiring a worker into an owner's shop.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewWorker {
    pub name: String,
    pub email: String,
    /// Already-hashed password.
    pub password_hash: String,
    /// Slug of the employing shop's owner.
    pub owner_slug: String,
    pub phone: Option<String>,
}

/// Partial profile update. Credentials and slugs are not editable here.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UserProfileUpdate {
    pub name: Option<String>,
    pub shop_name: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
}

/// Account directory over the shared `_directory` namespace.
#[derive(Debug, Clone)]
pub struct UserRepository {
    registry: Arc<ConnectionRegistry>,
}

impl UserRepository {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        UserRepository { registry }
    }

    async fn handle(&self) -> DbResult<ModelHandle> {
        self.registry.directory_model(&entities::USERS).await
    }

    /// Registers a shop owner. The shop name becomes the owner's slug, which
    /// in turn names the shop's tenant database.
    pub async fn register_owner(&self, input: NewOwner) -> DbResult<User> {
        let name = required_trimmed("name", &input.name)?;
        validate_email(&input.email)?;
        let email = input.email.trim().to_lowercase();
        required_trimmed("password_hash", &input.password_hash)?;
        let shop_name = required_trimmed("shop_name", &input.shop_name)?;
        validate_phone(input.phone.as_deref())?;

        let slug = slugify(&shop_name);
        if slug.is_empty() {
            return Err(ValidationError::InvalidFormat {
                field: "shop_name".to_string(),
                reason: "must contain letters or digits".to_string(),
            }
            .into());
        }
        // The slug doubles as a tenant namespace, so it has to pass the same
        // rules a namespace does.
        TenantSlug::new(&slug)?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            slug,
            role: Role::Admin,
            shop_name: Some(shop_name),
            location: input.location,
            phone: input.phone,
            password_hash: input.password_hash,
            worker_slug: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.insert(&user).await?;

        info!(user_id = %user.id, slug = %user.slug, "Shop owner registered");
        Ok(user)
    }

    /// Hires a worker into an owner's shop. The worker's own slug is scoped
    /// under the shop so the same first name at two shops never collides.
    pub async fn register_worker(&self, input: NewWorker) -> DbResult<User> {
        let name = required_trimmed("name", &input.name)?;
        validate_email(&input.email)?;
        let email = input.email.trim().to_lowercase();
        required_trimmed("password_hash", &input.password_hash)?;
        validate_phone(input.phone.as_deref())?;

        let owner = self.find_by_slug(&input.owner_slug).await?.ok_or_else(|| {
            DbError::not_found("Owner", &input.owner_slug)
        })?;
        if owner.role != Role::Admin {
            return Err(ValidationError::NotAllowed {
                field: "owner_slug".to_string(),
                reason: format!("'{}' is not a shop owner", input.owner_slug),
            }
            .into());
        }

        let slug = slugify(&format!("{} {}", owner.slug, name));
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            slug,
            role: Role::User,
            shop_name: owner.shop_name.clone(),
            location: None,
            phone: input.phone,
            password_hash: input.password_hash,
            worker_slug: Some(owner.slug.clone()),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.insert(&user).await?;

        info!(user_id = %user.id, shop = %owner.slug, "Worker registered");
        Ok(user)
    }

    async fn insert(&self, user: &User) -> DbResult<()> {
        let handle = self.handle().await?;
        sqlx::query(
            "INSERT INTO users \
             (id, name, email, slug, role, shop_name, location, phone, \
              password_hash, worker_slug, is_deleted, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.slug)
        .bind(user.role)
        .bind(&user.shop_name)
        .bind(&user.location)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.worker_slug)
        .bind(user.is_deleted)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(handle.pool())
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict { field, .. } if field.contains("email") => DbError::Conflict {
                field,
                value: user.email.clone(),
            },
            DbError::Conflict { field, .. } => DbError::Conflict {
                field,
                value: user.slug.clone(),
            },
            other => other,
        })?;
        Ok(())
    }

    pub async fn get(&self, user_id: &str) -> DbResult<User> {
        let handle = self.handle().await?;
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1 AND is_deleted = 0"
        ))
        .bind(user_id)
        .fetch_optional(handle.pool())
        .await?
        .ok_or_else(|| DbError::not_found("User", user_id))
    }

    /// Login lookup. `None` for unknown and deleted accounts alike.
    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let handle = self.handle().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?1 AND is_deleted = 0"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(handle.pool())
        .await?;
        Ok(user)
    }

    pub async fn find_by_slug(&self, slug: &str) -> DbResult<Option<User>> {
        let handle = self.handle().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE slug = ?1 AND is_deleted = 0"
        ))
        .bind(slug)
        .fetch_optional(handle.pool())
        .await?;
        Ok(user)
    }

    /// Everyone employed at the given shop, active accounts only.
    pub async fn list_workers(&self, owner_slug: &str) -> DbResult<Vec<User>> {
        let handle = self.handle().await?;
        let workers = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE worker_slug = ?1 AND is_deleted = 0 ORDER BY name"
        ))
        .bind(owner_slug)
        .fetch_all(handle.pool())
        .await?;
        Ok(workers)
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        update: UserProfileUpdate,
    ) -> DbResult<User> {
        let mut user = self.get(user_id).await?;

        if let Some(name) = update.name {
            user.name = required_trimmed("name", &name)?;
        }
        if let Some(shop_name) = update.shop_name {
            user.shop_name = Some(required_trimmed("shop_name", &shop_name)?);
        }
        if let Some(location) = update.location {
            user.location = Some(location);
        }
        if update.phone.is_some() {
            validate_phone(update.phone.as_deref())?;
            user.phone = update.phone;
        }
        user.updated_at = Utc::now();

        let handle = self.handle().await?;
        sqlx::query(
            "UPDATE users SET name = ?2, shop_name = ?3, location = ?4, phone = ?5, \
             updated_at = ?6 WHERE id = ?1",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.shop_name)
        .bind(&user.location)
        .bind(&user.phone)
        .bind(user.updated_at)
        .execute(handle.pool())
        .await?;

        Ok(user)
    }

    /// Soft-deletes an account. Lookups stop finding it; sales keep their
    /// seller id.
    pub async fn soft_delete(&self, user_id: &str) -> DbResult<()> {
        let handle = self.handle().await?;
        let result = sqlx::query(
            "UPDATE users SET is_deleted = 1, updated_at = ?2 \
             WHERE id = ?1 AND is_deleted = 0",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(handle.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", user_id));
        }
        debug!(user_id, "User soft-deleted");
        Ok(())
    }

    /// The identity claims this account presents to tenant resolution.
    pub fn identity_for(&self, user: &User) -> Identity {
        Identity {
            sub: user.id.clone(),
            role: user.role,
            slug: user.slug.clone(),
            worker_slug: user.worker_slug.clone(),
        }
    }
}

fn required_trimmed(field: &str, value: &str) -> DbResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        }
        .into());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use pharmapos_core::resolve_tenant;

    fn repo() -> UserRepository {
        let registry = Arc::new(ConnectionRegistry::new(StoreConfig::ephemeral()));
        UserRepository::new(registry)
    }

    fn owner_input(shop: &str, email: &str) -> NewOwner {
        NewOwner {
            name: "Imran Khalid".into(),
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
            shop_name: shop.into(),
            location: Some("Lahore".into()),
            phone: Some("+92-300-1234567".into()),
        }
    }

    #[tokio::test]
    async fn test_register_owner_derives_shop_slug() {
        let repo = repo();
        let owner = repo
            .register_owner(owner_input("City Care Pharmacy", "imran@example.com"))
            .await
            .unwrap();

        assert_eq!(owner.slug, "city-care-pharmacy");
        assert_eq!(owner.role, Role::Admin);
        assert!(owner.worker_slug.is_none());

        let identity = repo.identity_for(&owner);
        let tenant = resolve_tenant(&identity).unwrap();
        assert_eq!(tenant.as_str(), "city-care-pharmacy");
    }

    #[tokio::test]
    async fn test_duplicate_email_and_shop_conflict() {
        let repo = repo();
        repo.register_owner(owner_input("City Care Pharmacy", "imran@example.com"))
            .await
            .unwrap();

        let err = repo
            .register_owner(owner_input("Other Shop", "imran@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(&err, DbError::Conflict { field, .. } if field.contains("email")));

        let err = repo
            .register_owner(owner_input("City Care Pharmacy", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(&err, DbError::Conflict { field, .. } if field.contains("slug")));
    }

    #[tokio::test]
    async fn test_register_owner_rejects_unusable_shop_name() {
        let repo = repo();
        let err = repo
            .register_owner(owner_input("!!!", "imran@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(_)));
    }

    #[tokio::test]
    async fn test_worker_resolves_to_employers_tenant() {
        let repo = repo();
        let owner = repo
            .register_owner(owner_input("City Care Pharmacy", "imran@example.com"))
            .await
            .unwrap();

        let worker = repo
            .register_worker(NewWorker {
                name: "Ali Raza".into(),
                email: "ali@example.com".into(),
                password_hash: "$argon2id$stub".into(),
                owner_slug: owner.slug.clone(),
                phone: None,
            })
            .await
            .unwrap();

        assert_eq!(worker.role, Role::User);
        assert_eq!(worker.slug, "city-care-pharmacy-ali-raza");
        assert_eq!(worker.worker_slug.as_deref(), Some("city-care-pharmacy"));

        // The worker's data operations land in the employer's database.
        let identity = repo.identity_for(&worker);
        let tenant = resolve_tenant(&identity).unwrap();
        assert_eq!(tenant.as_str(), "city-care-pharmacy");
    }

    #[tokio::test]
    async fn test_register_worker_requires_live_owner() {
        let repo = repo();

        let err = repo
            .register_worker(NewWorker {
                name: "Ali".into(),
                email: "ali@example.com".into(),
                password_hash: "$argon2id$stub".into(),
                owner_slug: "no-such-shop".into(),
                phone: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        // A worker cannot hire workers.
        let owner = repo
            .register_owner(owner_input("City Care Pharmacy", "imran@example.com"))
            .await
            .unwrap();
        let worker = repo
            .register_worker(NewWorker {
                name: "Ali Raza".into(),
                email: "ali@example.com".into(),
                password_hash: "$argon2id$stub".into(),
                owner_slug: owner.slug.clone(),
                phone: None,
            })
            .await
            .unwrap();
        let err = repo
            .register_worker(NewWorker {
                name: "Sana".into(),
                email: "sana@example.com".into(),
                password_hash: "$argon2id$stub".into(),
                owner_slug: worker.slug.clone(),
                phone: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(_)));
    }

    #[tokio::test]
    async fn test_lookups_exclude_soft_deleted() {
        let repo = repo();
        let owner = repo
            .register_owner(owner_input("City Care Pharmacy", "imran@example.com"))
            .await
            .unwrap();
        let worker = repo
            .register_worker(NewWorker {
                name: "Ali Raza".into(),
                email: "ali@example.com".into(),
                password_hash: "$argon2id$stub".into(),
                owner_slug: owner.slug.clone(),
                phone: None,
            })
            .await
            .unwrap();

        assert_eq!(repo.list_workers(&owner.slug).await.unwrap().len(), 1);

        repo.soft_delete(&worker.id).await.unwrap();

        assert!(repo.find_by_email("ali@example.com").await.unwrap().is_none());
        assert!(repo.find_by_slug(&worker.slug).await.unwrap().is_none());
        assert!(repo.list_workers(&owner.slug).await.unwrap().is_empty());
        let err = repo.get(&worker.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        // Double delete reports the account as already gone.
        let err = repo.soft_delete(&worker.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_find_by_email_is_case_insensitive() {
        let repo = repo();
        repo.register_owner(owner_input("City Care Pharmacy", "Imran@Example.COM"))
            .await
            .unwrap();

        let found = repo.find_by_email("imran@example.com").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().email, "imran@example.com");
    }

    #[tokio::test]
    async fn test_update_profile() {
        let repo = repo();
        let owner = repo
            .register_owner(owner_input("City Care Pharmacy", "imran@example.com"))
            .await
            .unwrap();

        let updated = repo
            .update_profile(
                &owner.id,
                UserProfileUpdate {
                    name: Some("Imran K.".into()),
                    location: Some("Karachi".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Imran K.");
        assert_eq!(updated.location.as_deref(), Some("Karachi"));
        // Slug never moves after registration.
        assert_eq!(updated.slug, "city-care-pharmacy");

        let refetched = repo.get(&owner.id).await.unwrap();
        assert_eq!(refetched.name, "Imran K.");
    }
}
