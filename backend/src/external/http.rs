//! Dashboard API client
//!
//! Talks to the shop dashboard's REST API, which owns the raw transaction
//! rows. Error bodies from the API are surfaced verbatim.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    Adjustment, AdjustmentRequest, NewReturn, Product, ReportWindow, ReturnRecord, Sale, SaleLine,
    Stockout, StockoutLine, Supply, SupplyLine,
};

use super::{AdjustmentFilter, StoreError, StoreResult, TransactionStore};

/// HTTP-backed [`TransactionStore`]
#[derive(Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct PostReturnBody<'a> {
    idempotency_key: &'a str,
}

#[derive(serde::Deserialize)]
struct QuantityOnHand {
    quantity_on_hand: Option<i64>,
}

impl HttpStore {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Upstream(format!("Dashboard API request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => StoreError::NotFound(body),
            StatusCode::CONFLICT => StoreError::Conflict(body),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => StoreError::Rejected(body),
            _ => StoreError::Upstream(format!("Dashboard API error {}: {}", status, body)),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> StoreResult<T> {
        response
            .json()
            .await
            .map_err(|e| StoreError::Upstream(format!("Failed to parse dashboard response: {}", e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> StoreResult<T> {
        let response = self.send(self.client.get(self.url(path))).await?;
        Self::decode(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B, idempotency_key: Option<&str>) -> StoreResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        let response = self.send(request).await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl TransactionStore for HttpStore {
    async fn list_supplies(&self) -> StoreResult<Vec<Supply>> {
        self.get_json("/supplies").await
    }

    async fn list_supply_lines(&self, supply_id: i64) -> StoreResult<Vec<SupplyLine>> {
        self.get_json(&format!("/supplies/{}/lines", supply_id)).await
    }

    async fn get_supply(&self, supply_id: i64) -> StoreResult<Supply> {
        self.get_json(&format!("/supplies/{}", supply_id)).await
    }

    async fn list_stockouts(&self) -> StoreResult<Vec<Stockout>> {
        self.get_json("/stockouts").await
    }

    async fn list_stockout_lines(&self, stockout_id: i64) -> StoreResult<Vec<StockoutLine>> {
        // Header-only stockouts have no lines resource
        match self.get_json(&format!("/stockouts/{}/lines", stockout_id)).await {
            Err(StoreError::NotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    async fn list_sales(&self, window: Option<&ReportWindow>) -> StoreResult<Vec<Sale>> {
        let mut request = self.client.get(self.url("/sales"));
        if let Some(window) = window {
            request = request.query(&[
                ("start", window.start.to_rfc3339()),
                ("end", window.end.to_rfc3339()),
            ]);
        }
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn list_sale_lines(&self, sale_id: i64) -> StoreResult<Vec<SaleLine>> {
        self.get_json(&format!("/sales/{}/lines", sale_id)).await
    }

    async fn get_sale_line(&self, sale_detail_id: i64) -> StoreResult<SaleLine> {
        self.get_json(&format!("/sale-lines/{}", sale_detail_id)).await
    }

    async fn list_adjustments(&self, filter: &AdjustmentFilter) -> StoreResult<Vec<Adjustment>> {
        let request = self.client.get(self.url("/adjustments")).query(filter);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn create_adjustment(&self, request: &AdjustmentRequest) -> StoreResult<Adjustment> {
        self.post_json("/adjustments", request, Some(&request.client_request_id))
            .await
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        self.get_json("/products").await
    }

    async fn get_product(&self, product_id: i64) -> StoreResult<Product> {
        self.get_json(&format!("/products/{}", product_id)).await
    }

    async fn get_quantity_on_hand(&self, product_id: i64) -> StoreResult<Option<i64>> {
        let body: QuantityOnHand = self
            .get_json(&format!("/products/{}/quantity-on-hand", product_id))
            .await?;
        Ok(body.quantity_on_hand)
    }

    async fn list_returns(&self) -> StoreResult<Vec<ReturnRecord>> {
        self.get_json("/returns").await
    }

    async fn get_return(&self, return_id: i64) -> StoreResult<ReturnRecord> {
        self.get_json(&format!("/returns/{}", return_id)).await
    }

    async fn create_return(&self, input: &NewReturn) -> StoreResult<ReturnRecord> {
        self.post_json("/returns", input, None).await
    }

    async fn approve_return(&self, return_id: i64) -> StoreResult<ReturnRecord> {
        self.post_json(&format!("/returns/{}/approve", return_id), &(), None)
            .await
    }

    async fn post_return(&self, return_id: i64, idempotency_key: &str) -> StoreResult<ReturnRecord> {
        self.post_json(
            &format!("/returns/{}/post", return_id),
            &PostReturnBody { idempotency_key },
            Some(idempotency_key),
        )
        .await
    }

    async fn reject_return(&self, return_id: i64) -> StoreResult<ReturnRecord> {
        self.post_json(&format!("/returns/{}/reject", return_id), &(), None)
            .await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.send(self.client.get(self.url("/health"))).await?;
        Ok(())
    }
}
