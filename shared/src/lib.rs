//! Shared types and models for the Bike Shop Inventory Platform
//!
//! This crate contains the raw transaction records, the movement ledger and
//! the pure reconciliation functions shared between the backend and the
//! dashboard (via WASM).

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
