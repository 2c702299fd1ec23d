//! Domain models for the Bike Shop Inventory Platform

mod adjustment;
mod edit;
mod movement;
mod product;
mod report;
mod returns;
mod sale;
mod stockout;
mod supply;

pub use adjustment::*;
pub use edit::*;
pub use movement::*;
pub use product::*;
pub use report::*;
pub use returns::*;
pub use sale::*;
pub use stockout::*;
pub use supply::*;
