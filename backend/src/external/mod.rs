//! External transaction store integrations
//!
//! The engine never owns stock data. It reads raw transaction rows from a
//! store and writes new rows back; every implementation honours the same
//! contract, including rejecting a second submission of an idempotency key.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{
    Adjustment, AdjustmentRequest, NewReturn, Product, ReportWindow, ReturnRecord, Sale, SaleLine,
    Stockout, StockoutLine, Supply, SupplyLine,
};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{AppError, AppResult};

pub mod http;
pub mod memory;
pub mod postgres;

pub use http::HttpStore;
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors raised at the store boundary
#[derive(Error, Debug)]
pub enum StoreError {
    /// The referenced record does not exist; message passed through verbatim
    #[error("{0}")]
    NotFound(String),

    /// The idempotency key was already used
    #[error("{0}")]
    Conflict(String),

    /// The store refused the write; message passed through verbatim
    #[error("{0}")]
    Rejected(String),

    /// The record is not in a state that allows the write
    #[error("{0}")]
    InvalidState(String),

    /// Transport or server failure; message passed through verbatim
    #[error("{0}")]
    Upstream(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Filter for adjustment queries
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AdjustmentFilter {
    pub product_id: Option<i64>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl AdjustmentFilter {
    pub fn for_product(product_id: i64) -> Self {
        Self {
            product_id: Some(product_id),
            ..Default::default()
        }
    }
}

/// Read/write access to the raw transaction streams
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn list_supplies(&self) -> StoreResult<Vec<Supply>>;
    async fn list_supply_lines(&self, supply_id: i64) -> StoreResult<Vec<SupplyLine>>;
    async fn get_supply(&self, supply_id: i64) -> StoreResult<Supply>;

    async fn list_stockouts(&self) -> StoreResult<Vec<Stockout>>;
    /// Lines of a stockout; header-only stockouts return an empty list
    async fn list_stockout_lines(&self, stockout_id: i64) -> StoreResult<Vec<StockoutLine>>;

    async fn list_sales(&self, window: Option<&ReportWindow>) -> StoreResult<Vec<Sale>>;
    async fn list_sale_lines(&self, sale_id: i64) -> StoreResult<Vec<SaleLine>>;
    async fn get_sale_line(&self, sale_detail_id: i64) -> StoreResult<SaleLine>;

    async fn list_adjustments(&self, filter: &AdjustmentFilter) -> StoreResult<Vec<Adjustment>>;
    /// Create one adjustment; a reused `client_request_id` yields `Conflict`
    async fn create_adjustment(&self, request: &AdjustmentRequest) -> StoreResult<Adjustment>;

    async fn list_products(&self) -> StoreResult<Vec<Product>>;
    async fn get_product(&self, product_id: i64) -> StoreResult<Product>;
    /// Precomputed stock figure kept by the store, if it keeps one
    async fn get_quantity_on_hand(&self, product_id: i64) -> StoreResult<Option<i64>>;

    async fn list_returns(&self) -> StoreResult<Vec<ReturnRecord>>;
    async fn get_return(&self, return_id: i64) -> StoreResult<ReturnRecord>;
    async fn create_return(&self, input: &NewReturn) -> StoreResult<ReturnRecord>;
    async fn approve_return(&self, return_id: i64) -> StoreResult<ReturnRecord>;
    /// Post an approved return; replaying the same key yields `Conflict`
    async fn post_return(&self, return_id: i64, idempotency_key: &str) -> StoreResult<ReturnRecord>;
    async fn reject_return(&self, return_id: i64) -> StoreResult<ReturnRecord>;

    /// Reachability check used by the health endpoint
    async fn ping(&self) -> StoreResult<()>;
}

/// Build the configured store; `run_migrations` only applies to postgres
pub async fn connect(
    config: &StoreConfig,
    run_migrations: bool,
) -> AppResult<Arc<dyn TransactionStore>> {
    match config.backend {
        StoreBackend::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                AppError::Configuration(
                    "store.database_url is required for the postgres backend".to_string(),
                )
            })?;

            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(url)
                .await
                .map_err(anyhow::Error::from)?;
            tracing::info!("Database connection established");

            let store = PgStore::new(pool);
            if run_migrations {
                tracing::info!("Running database migrations...");
                store.migrate().await.map_err(anyhow::Error::from)?;
                tracing::info!("Migrations completed");
            }

            Ok(Arc::new(store))
        }
        StoreBackend::Http => {
            let base_url = config.api_base_url.clone().ok_or_else(|| {
                AppError::Configuration(
                    "store.api_base_url is required for the http backend".to_string(),
                )
            })?;

            tracing::info!("Using dashboard API at {}", base_url);
            Ok(Arc::new(HttpStore::new(base_url, config.api_token.clone())))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
