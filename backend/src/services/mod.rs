//! Business logic services for the Bike Shop Inventory Platform

pub mod adjustment;
pub mod history;
pub mod ledger;
pub mod reporting;
pub mod returns;
pub mod stock;

pub use adjustment::AdjustmentService;
pub use history::HistoryService;
pub use ledger::LedgerReader;
pub use reporting::ReportingService;
pub use returns::ReturnService;
pub use stock::StockService;
