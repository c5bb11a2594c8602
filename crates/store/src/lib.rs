//! Data layer for the VulnSentinel pipeline.
//!
//! Three concentric layers live here:
//!
//! - [`models`]: row structs and database enums for the six first-class
//!   entities plus the agent audit log.
//! - [`dao`]: narrow CRUD plus the one or two domain queries each
//!   pipeline stage polls. Every method takes an explicit
//!   `&mut PgConnection`; the caller owns the transaction boundary.
//! - [`service`]: stateless services that enforce invariants (derived
//!   `is_bugfix`, the customer-facing transition table, fork-protected
//!   library upserts) and coordinate multiple DAOs.
//!
//! List endpoints paginate by `(created_at DESC, id DESC)` with
//! HMAC-signed opaque cursors (see [`cursor`]) so pages stay stable under
//! concurrent inserts and tampered cursors are rejected outright.

pub mod cursor;
pub mod dao;
pub mod error;
pub mod models;
pub mod service;

pub use cursor::{CursorSigner, Page};
pub use error::{StoreError, StoreResult};

/// Postgres pool alias used throughout the workspace.
pub type PgPool = sqlx::PgPool;
