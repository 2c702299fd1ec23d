//! Dashboard API client tests
//!
//! Runs the client against an in-process axum server standing in for the
//! dashboard API, so status code handling is checked over real HTTP.

mod common;

use std::sync::Arc;

use axum::{
    body::to_bytes,
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bsi_backend::external::{HttpStore, StoreError, TransactionStore};
use bsi_backend::services::AdjustmentService;
use bsi_backend::AppError;
use common::{local, product};
use serde_json::Value;
use shared::{AdjustmentIntent, AdjustmentType, NewReturn, PostOutcome};

/// Start a dashboard stand-in on an ephemeral port; returns its base URL
async fn dashboard() -> String {
    let catalog = serde_json::to_value(product(1, "Chain", 2)).unwrap();

    let app = Router::new()
        .route(
            "/products/:id",
            get(move |Path(id): Path<i64>| {
                let catalog = catalog.clone();
                async move {
                    if id == 1 {
                        Ok(Json(catalog))
                    } else {
                        Err((StatusCode::NOT_FOUND, format!("No product with id {}", id)))
                    }
                }
            }),
        )
        .route(
            "/adjustments",
            post(|headers: HeaderMap| async move {
                let key = headers
                    .get("idempotency-key")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                (StatusCode::CONFLICT, format!("Request {} was already applied", key))
            }),
        )
        .route(
            "/returns",
            post(|| async {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Return quantity exceeds the quantity sold",
                )
            }),
        )
        .route(
            "/supplies",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance window") }),
        )
        .route("/stockouts/:id/lines", get(|| async { StatusCode::NOT_FOUND }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/", addr)
}

// ============================================================================
// Status code mapping
// ============================================================================

/// 404, 409, 422 and 5xx each land on their own store error
#[tokio::test]
async fn test_status_codes_map_to_store_errors() {
    let store = HttpStore::new(dashboard().await, None);

    let product = store.get_product(1).await.unwrap();
    assert_eq!(product.name, "Chain");

    match store.get_product(7).await {
        Err(StoreError::NotFound(message)) => assert_eq!(message, "No product with id 7"),
        other => panic!("expected NotFound, got {:?}", other.map(|p| p.id)),
    }

    let intent = AdjustmentIntent::for_product(1, 3, AdjustmentType::Manual, "recount");
    match store.create_adjustment(intent.request()).await {
        Err(StoreError::Conflict(message)) => {
            assert!(message.contains(intent.client_request_id()));
        }
        other => panic!("expected Conflict, got {:?}", other.map(|a| a.id)),
    }

    let new_return = NewReturn {
        sale_detail_id: 5,
        quantity: 9,
        replacement_product_id: None,
        transaction_date: local(2024, 4, 2, 10),
        remarks: None,
    };
    match store.create_return(&new_return).await {
        Err(StoreError::Rejected(message)) => {
            assert_eq!(message, "Return quantity exceeds the quantity sold");
        }
        other => panic!("expected Rejected, got {:?}", other.map(|r| r.return_id)),
    }

    match store.list_supplies().await {
        Err(StoreError::Upstream(message)) => assert!(message.contains("maintenance window")),
        other => panic!("expected Upstream, got {:?}", other.map(|s| s.len())),
    }
}

/// Header-only stockouts have no lines resource
#[tokio::test]
async fn test_missing_stockout_lines_are_empty() {
    let store = HttpStore::new(dashboard().await, None);
    assert!(store.list_stockout_lines(3).await.unwrap().is_empty());
}

// ============================================================================
// Surfacing upstream messages
// ============================================================================

/// The dashboard's not-found message reaches the caller unchanged
#[tokio::test]
async fn test_not_found_message_passes_through() {
    let store = HttpStore::new(dashboard().await, None);
    let err: AppError = store.get_product(7).await.unwrap_err().into();
    assert_eq!(err.to_string(), "No product with id 7");

    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["message"], "No product with id 7");
}

/// A 409 for a replayed request id is reported as already applied
#[tokio::test]
async fn test_replayed_adjustment_is_duplicate() {
    let store = Arc::new(HttpStore::new(dashboard().await, None));
    let service = AdjustmentService::new(store);

    let outcome = service
        .submit_adjustment(
            1,
            4,
            AdjustmentType::Manual,
            "recount".to_string(),
            Some("req-42".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PostOutcome::DuplicateIgnored {
            client_request_id: "req-42".to_string()
        }
    );
}
