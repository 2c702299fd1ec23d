//! HTTP handlers for the Bike Shop Inventory Platform

pub mod adjustment;
pub mod health;
pub mod inventory;
pub mod reporting;
pub mod returns;

pub use adjustment::*;
pub use health::*;
pub use inventory::*;
pub use reporting::*;
pub use returns::*;
