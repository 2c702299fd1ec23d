//! Return workflow tests
//!
//! Returns only touch stock once posted; every other state leaves the
//! ledger unchanged.

mod common;

use bsi_backend::external::{StoreError, TransactionStore};
use bsi_backend::services::returns::ReturnPostOutcome;
use bsi_backend::services::{HistoryService, ReturnService, StockService};
use bsi_backend::AppError;
use common::{local, product, Shop};
use rust_decimal::Decimal;
use shared::{MovementKind, NewReturn, ReturnStatus};

fn new_return(sale_detail_id: i64, quantity: i64, replacement: Option<i64>) -> NewReturn {
    NewReturn {
        sale_detail_id,
        quantity,
        replacement_product_id: replacement,
        transaction_date: local(2024, 4, 2, 10),
        remarks: Some("wrong size".to_string()),
    }
}

/// Shop with 10 units of product 1 received, 3 sold, and 5 units of
/// product 2 in stock. Returns the sold line id.
async fn shop_with_sale() -> (Shop, i64) {
    let shop = Shop::new()
        .with_product(product(1, "Jersey M", 1))
        .await
        .with_product(product(2, "Jersey L", 1))
        .await;
    shop.supply(1, 10, local(2024, 4, 1, 9), "Rapha").await;
    shop.supply(2, 5, local(2024, 4, 1, 9), "Rapha").await;
    let line = shop.sell(1, 3, Decimal::new(60, 0), local(2024, 4, 1, 15)).await;
    (shop, line)
}

// ============================================================================
// State machine
// ============================================================================

/// Posting a pending return fails and emits no movement
#[tokio::test]
async fn test_post_pending_return_fails() {
    let (shop, line) = shop_with_sale().await;
    let service = ReturnService::new(shop.dyn_store());
    let record = service.create(new_return(line, 1, None)).await.unwrap();
    assert_eq!(record.return_status, ReturnStatus::Pending);

    let err = service.post(record.return_id, "post-key-1").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));

    let history = HistoryService::new(shop.dyn_store())
        .history(1, 1, 50)
        .await
        .unwrap();
    assert!(history.data.iter().all(|e| e.kind != MovementKind::Return));
    assert_eq!(
        StockService::new(shop.dyn_store()).project_stock(1).await.unwrap(),
        7
    );
    assert_eq!(
        service.get(record.return_id).await.unwrap().return_status,
        ReturnStatus::Pending
    );
}

/// Approve then post puts the returned unit back and takes the
/// replacement out
#[tokio::test]
async fn test_posted_return_with_replacement() {
    let (shop, line) = shop_with_sale().await;
    let service = ReturnService::new(shop.dyn_store());
    let stock = StockService::new(shop.dyn_store());

    let record = service.create(new_return(line, 2, Some(2))).await.unwrap();
    service.approve(record.return_id).await.unwrap();

    // Approval alone does not move stock
    assert_eq!(stock.project_stock(1).await.unwrap(), 7);

    let outcome = service.post(record.return_id, "post-key-2").await.unwrap();
    match outcome {
        ReturnPostOutcome::Posted { record } => {
            assert_eq!(record.return_status, ReturnStatus::Posted);
            assert_eq!(record.posting_key.as_deref(), Some("post-key-2"));
        }
        other => panic!("expected posted, got {:?}", other),
    }

    assert_eq!(stock.project_stock(1).await.unwrap(), 9);
    assert_eq!(stock.project_stock(2).await.unwrap(), 3);
}

/// Replaying the posting key is acknowledged without moving stock again
#[tokio::test]
async fn test_post_is_idempotent() {
    let (shop, line) = shop_with_sale().await;
    let service = ReturnService::new(shop.dyn_store());

    let record = service.create(new_return(line, 1, None)).await.unwrap();
    service.approve(record.return_id).await.unwrap();
    service.post(record.return_id, "post-key-3").await.unwrap();

    let replay = service.post(record.return_id, "post-key-3").await.unwrap();
    assert!(matches!(replay, ReturnPostOutcome::DuplicateIgnored { .. }));

    // A different key on a posted return is an illegal transition
    let other_key = service.post(record.return_id, "post-key-4").await;
    assert!(matches!(other_key, Err(AppError::InvalidStateTransition(_))));

    assert_eq!(
        StockService::new(shop.dyn_store()).project_stock(1).await.unwrap(),
        8
    );
}

/// Rejection is terminal from pending or approved
#[tokio::test]
async fn test_reject_transitions() {
    let (shop, line) = shop_with_sale().await;
    let service = ReturnService::new(shop.dyn_store());

    let pending = service.create(new_return(line, 1, None)).await.unwrap();
    let rejected = service.reject(pending.return_id).await.unwrap();
    assert_eq!(rejected.return_status, ReturnStatus::Rejected);
    assert!(service.approve(pending.return_id).await.is_err());

    let approved = service.create(new_return(line, 1, None)).await.unwrap();
    service.approve(approved.return_id).await.unwrap();
    service.reject(approved.return_id).await.unwrap();
    assert!(matches!(
        service.post(approved.return_id, "post-key-5").await,
        Err(AppError::InvalidStateTransition(_))
    ));
}

// ============================================================================
// Creation guards
// ============================================================================

/// Returns cannot exceed what was sold on the line
#[tokio::test]
async fn test_return_quantity_guard() {
    let (shop, line) = shop_with_sale().await;
    let service = ReturnService::new(shop.dyn_store());

    assert!(matches!(
        service.create(new_return(line, 4, None)).await,
        Err(AppError::Validation { .. })
    ));
    assert!(matches!(
        service.create(new_return(line, 0, None)).await,
        Err(AppError::Validation { .. })
    ));

    let first = service.create(new_return(line, 2, None)).await.unwrap();
    assert!(service.create(new_return(line, 2, None)).await.is_err());

    // Rejected returns free up their quantity
    service.reject(first.return_id).await.unwrap();
    assert!(service.create(new_return(line, 2, None)).await.is_ok());
}

/// Concurrent requests against one sold line never return more than was sold
#[tokio::test]
async fn test_concurrent_returns_respect_sold_quantity() {
    let (shop, line) = shop_with_sale().await;
    let service = ReturnService::new(shop.dyn_store());

    let (a, b) = tokio::join!(
        service.create(new_return(line, 2, None)),
        service.create(new_return(line, 2, None)),
    );
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);

    // The store refuses on its own, without the service's check
    let direct = shop.dyn_store().create_return(&new_return(line, 2, None)).await;
    assert!(matches!(direct, Err(StoreError::Rejected(_))));

    let returned: i64 = service.list().await.unwrap().iter().map(|r| r.quantity).sum();
    assert!(returned <= 3);
}

/// Unknown sale lines and replacement products are not found
#[tokio::test]
async fn test_return_references_must_exist() {
    let (shop, line) = shop_with_sale().await;
    let service = ReturnService::new(shop.dyn_store());

    assert!(matches!(
        service.create(new_return(999, 1, None)).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        service.create(new_return(line, 1, Some(77))).await,
        Err(AppError::NotFound(_))
    ));
}
