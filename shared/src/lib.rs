//! Shared types and models for the bar point-of-sale system
//!
//! Holds the domain models and the storage-independent stock ledger used by
//! the backend server.

pub mod ledger;
pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
