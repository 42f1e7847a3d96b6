//! # Tenancy Module
//!
//! Slugs, identity claims and tenant resolution.
//!
//! Every pharmacy (shop) owns one namespace, addressed by its slug. All
//! storage operations take the slug as an explicit parameter; nothing in the
//! system infers a tenant from ambient state.
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Identity { role, slug, worker_slug }                                   │
//! │                                                                         │
//! │  Owner (admin/editor):  worker_slug = None  ──► their own slug          │
//! │  Worker (user):         worker_slug = Some  ──► the OWNER's slug        │
//! │                                                                         │
//! │  Workers sell into the owner's shop; they never get a namespace of      │
//! │  their own. No slug at all ──► UnresolvedTenant (never a default).      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TenantError;

/// Maximum slug length accepted anywhere in the system.
pub const MAX_SLUG_LEN: usize = 64;

// =============================================================================
// TenantSlug
// =============================================================================

/// A validated tenant namespace identifier.
///
/// Invariants enforced at construction:
/// - non-empty, at most [`MAX_SLUG_LEN`] bytes
/// - only `a-z`, `0-9` and `-`
/// - does not start or end with `-`
///
/// Underscore is rejected, which keeps internal namespaces like the shared
/// user directory out of reach of any tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantSlug(String);

impl TenantSlug {
    /// Validates and wraps a slug.
    pub fn new(slug: impl Into<String>) -> Result<Self, TenantError> {
        let slug = slug.into();
        if slug.is_empty() {
            return Err(TenantError::InvalidSlug {
                slug,
                reason: "slug is empty",
            });
        }
        if slug.len() > MAX_SLUG_LEN {
            return Err(TenantError::InvalidSlug {
                slug,
                reason: "slug is too long",
            });
        }
        if !slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(TenantError::InvalidSlug {
                slug,
                reason: "only lowercase letters, digits and hyphens are allowed",
            });
        }
        if slug.starts_with('-') || slug.ends_with('-') {
            return Err(TenantError::InvalidSlug {
                slug,
                reason: "slug cannot start or end with a hyphen",
            });
        }
        Ok(TenantSlug(slug))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantSlug {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TenantSlug::new(s)
    }
}

impl TryFrom<String> for TenantSlug {
    type Error = TenantError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TenantSlug::new(value)
    }
}

impl From<TenantSlug> for String {
    fn from(slug: TenantSlug) -> String {
        slug.0
    }
}

// =============================================================================
// Slug Derivation
// =============================================================================

/// Derives a slug from a display name ("Al-Shifa Pharmacy #2" -> "al-shifa-pharmacy-2").
///
/// Lowercases, collapses every run of non-alphanumeric characters into a
/// single hyphen and trims hyphens from both ends. The result may still
/// collide with an existing slug; uniqueness is the directory's job.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    out.truncate(MAX_SLUG_LEN);
    while out.ends_with('-') {
        out.pop();
    }
    out
}

// =============================================================================
// Roles & Identity
// =============================================================================

/// Principal roles.
///
/// `Admin` is a shop owner, `Editor` a trusted manager with owner-level data
/// access, `User` a counter worker selling into the owner's shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Editor,
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::User => "user",
        };
        f.write_str(s)
    }
}

/// The verified claim set of an authenticated principal.
///
/// Token parsing and signature checks happen upstream; by the time an
/// `Identity` exists its fields are trusted. `worker_slug`, when present,
/// names the OWNER's shop slug and is what the worker resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Subject: the user id this identity belongs to.
    pub sub: String,
    pub role: Role,
    /// The principal's own slug (shop slug for owners, personal slug for workers).
    pub slug: String,
    /// Present on workers only: the employing shop's slug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_slug: Option<String>,
}

/// Resolves an identity to the tenant namespace its data operations target.
///
/// Workers resolve to their employer's slug, everyone else to their own.
/// An identity with no usable slug is an error, never a default namespace.
pub fn resolve_tenant(identity: &Identity) -> Result<TenantSlug, TenantError> {
    let raw = identity
        .worker_slug
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(identity.slug.as_str());
    if raw.is_empty() {
        return Err(TenantError::UnresolvedTenant {
            role: identity.role.to_string(),
        });
    }
    TenantSlug::new(raw)
}

// =============================================================================
// Seller Scope
// =============================================================================

/// Capability object deciding which sales a principal may read in reports.
///
/// Carried as a value into every report query instead of re-deriving from
/// role strings at each call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SellerScope {
    /// Owner/manager view: every seller in the shop.
    All,
    /// Worker view: only rows where `seller_id` matches.
    Only(String),
}

impl SellerScope {
    pub fn all() -> Self {
        SellerScope::All
    }

    pub fn only(seller_id: impl Into<String>) -> Self {
        SellerScope::Only(seller_id.into())
    }

    /// Derives the scope an identity is entitled to.
    pub fn from_identity(identity: &Identity) -> Self {
        match identity.role {
            Role::Admin | Role::Editor => SellerScope::All,
            Role::User => SellerScope::Only(identity.sub.clone()),
        }
    }

    /// The seller id this scope restricts to, if any.
    pub fn seller_id(&self) -> Option<&str> {
        match self {
            SellerScope::All => None,
            SellerScope::Only(id) => Some(id.as_str()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
