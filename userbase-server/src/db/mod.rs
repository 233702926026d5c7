//! Data access layer - user store over the database client
//!
//! # Design Principles
//!
//! - One statement per call, no cross-call transactions
//! - Soft delete only: rows are flagged inactive, never removed
//! - Reads go through whichever client the caller binds (replica for reads,
//!   primary for writes and read-after-write)

pub mod error;
pub mod users;

pub use error::StoreError;
pub use users::UserStore;
