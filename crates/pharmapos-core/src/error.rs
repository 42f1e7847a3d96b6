//! # Error Types
//!
//! Domain-specific error types for pharmapos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  pharmapos-core errors (this file)                                      │
//! │  ├── CoreError        - General domain errors                           │
//! │  ├── ValidationError  - Input validation failures                       │
//! │  └── TenantError      - Tenant slug / resolution failures               │
//! │                                                                         │
//! │  pharmapos-db errors (separate crate)                                   │
//! │  └── DbError          - Registry and storage failures                   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (slug, batch id, field)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Tenant resolution or slug error (wraps TenantError).
    #[error("Tenant error: {0}")]
    Tenant(#[from] TenantError),

    /// Integer overflow while computing invoice totals.
    ///
    /// Only reachable with absurd inputs (quantity and price both near the
    /// validation ceilings), but money math never silently wraps.
    #[error("Amount overflow while computing {context}")]
    AmountOverflow { context: &'static str },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any storage work runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid email, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set, or contradicts a server-side recomputation.
    #[error("{field} is not allowed: {reason}")]
    NotAllowed { field: String, reason: String },

    /// Duplicate value (e.g., duplicate medicine slug).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Tenant Error
// =============================================================================

/// Tenant slug and resolution errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantError {
    /// Slug is empty or contains characters outside `[a-z0-9-]`.
    #[error("Invalid tenant slug '{slug}': {reason}")]
    InvalidSlug { slug: String, reason: &'static str },

    /// The identity carries no slug that maps to a tenant namespace.
    ///
    /// Resolution never falls back to a default namespace; a principal
    /// without a resolvable slug cannot touch tenant data.
    #[error("Identity cannot be resolved to a tenant (role {role})")]
    UnresolvedTenant { role: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
