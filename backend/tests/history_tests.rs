//! Movement history tests
//!
//! History merges every stream for a product, newest first, and pages the
//! same way on every query.

mod common;

use bsi_backend::services::HistoryService;
use bsi_backend::AppError;
use common::{local, product, Shop};
use rust_decimal::Decimal;
use shared::MovementKind;

/// All streams merged newest first
#[tokio::test]
async fn test_history_merges_streams_newest_first() {
    let shop = Shop::new().with_product(product(1, "Wheelset", 1)).await;
    shop.supply(1, 6, local(2024, 5, 1, 9), "DT Swiss").await;
    shop.sell(1, 2, Decimal::new(900, 0), local(2024, 5, 3, 9)).await;
    shop.stockout(1, 1, local(2024, 5, 2, 9)).await;

    let page = HistoryService::new(shop.dyn_store())
        .history(1, 1, 20)
        .await
        .unwrap();

    let kinds: Vec<MovementKind> = page.data.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![MovementKind::Sale, MovementKind::Stockout, MovementKind::Supply]
    );
    let quantities: Vec<i64> = page.data.iter().map(|e| e.quantity).collect();
    assert_eq!(quantities, vec![-2, -1, 6]);
    assert_eq!(page.pagination.total_items, 3);
}

/// Entries sharing a timestamp page identically on every query
#[tokio::test]
async fn test_pagination_is_deterministic() {
    let shop = Shop::new().with_product(product(1, "Bottle", 1)).await;
    let same_time = local(2024, 5, 1, 12);
    for _ in 0..5 {
        shop.supply(1, 1, same_time, "Elite").await;
    }

    let service = HistoryService::new(shop.dyn_store());
    let first = service.history(1, 1, 2).await.unwrap();
    let again = service.history(1, 1, 2).await.unwrap();
    let second = service.history(1, 2, 2).await.unwrap();
    let third = service.history(1, 3, 2).await.unwrap();

    assert_eq!(first.data, again.data);
    assert_eq!(first.pagination.total_pages, 3);
    assert_eq!(third.data.len(), 1);

    let mut refs: Vec<String> = first
        .data
        .iter()
        .chain(second.data.iter())
        .chain(third.data.iter())
        .map(|e| e.source_ref.clone())
        .collect();
    refs.dedup();
    assert_eq!(refs.len(), 5);
}

/// A page past the end is empty; a zero page is invalid
#[tokio::test]
async fn test_page_bounds() {
    let shop = Shop::new().with_product(product(1, "Bottle", 1)).await;
    shop.supply(1, 1, local(2024, 5, 1, 12), "Elite").await;

    let service = HistoryService::new(shop.dyn_store());
    assert!(service.history(1, 4, 20).await.unwrap().data.is_empty());
    assert!(matches!(
        service.history(1, 0, 20).await,
        Err(AppError::Validation { .. })
    ));
    assert!(matches!(
        service.history(1, 1, 500).await,
        Err(AppError::Validation { .. })
    ));
}

/// Only the requested product's entries appear
#[tokio::test]
async fn test_history_is_per_product() {
    let shop = Shop::new()
        .with_product(product(1, "Bottle", 1))
        .await
        .with_product(product(2, "Cage", 1))
        .await;
    shop.supply(1, 1, local(2024, 5, 1, 12), "Elite").await;
    shop.supply(2, 4, local(2024, 5, 1, 12), "Elite").await;
    shop.stockout_lines(&[(1, 1), (2, 1)], local(2024, 5, 2, 12)).await;

    let page = HistoryService::new(shop.dyn_store())
        .history(2, 1, 20)
        .await
        .unwrap();
    assert_eq!(page.data.len(), 2);
    assert!(page.data.iter().all(|e| e.product_id == 2));
}
