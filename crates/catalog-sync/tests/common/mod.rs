//! Common test utilities for catalog-sync integration tests.

#![allow(dead_code)]

use catalog_sync::{RemoteCatalogClient, RemoteCatalogConfig, RetryConfig, ThrottleConfig};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "test-api-key";
pub const SALES_POINT: i64 = 7;

/// Creates a token exchange response.
pub fn token_response(access_token: &str, expires_in: i64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in
    })
}

/// Test data factory for remote categories.
pub fn category_json(id: &str, description: &str) -> Value {
    json!({
        "id": id,
        "description": description,
        "idSalesPoint": SALES_POINT,
        "enableForRisto": true,
        "enableForSale": true
    })
}

/// Test data factory for remote products priced at the test sales point.
pub fn product_json(id: &str, description: &str, category_id: &str, price: f64) -> Value {
    json!({
        "id": id,
        "description": description,
        "idCategory": category_id,
        "idDepartment": "D1",
        "idSalesPoint": SALES_POINT,
        "prices": [{"idSalesPoint": SALES_POINT, "value": price}]
    })
}

/// Test data factory for remote tables.
pub fn table_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "seats": 4,
        "idSalesPoint": SALES_POINT
    })
}

/// Generates `count` remote products in category `C1`.
pub fn generate_products(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| product_json(&format!("P{i:04}"), &format!("Product {i}"), "C1", 5.0))
        .collect()
}

/// Wraps items in the list response envelope.
pub fn envelope(key: &str, items: &[Value], total_count: usize) -> Value {
    let mut body = serde_json::Map::new();
    body.insert(key.to_string(), Value::Array(items.to_vec()));
    body.insert("totalCount".to_string(), json!(total_count));
    Value::Object(body)
}

/// Client configuration pointed at `base_url`, without throttling.
pub fn test_config(base_url: &str) -> RemoteCatalogConfig {
    RemoteCatalogConfig::builder()
        .base_url(base_url)
        .retry(RetryConfig::for_testing())
        .throttle(ThrottleConfig::Disabled)
        .build()
        .expect("valid test config")
}

/// Mock Remote Catalog Service with common setup helpers.
pub struct MockCatalogServer {
    pub server: MockServer,
}

impl MockCatalogServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    pub fn client(&self) -> RemoteCatalogClient {
        RemoteCatalogClient::new(test_config(&self.url())).expect("client")
    }

    /// Token endpoint issuing `access_token`, expected to be hit `times` times.
    pub async fn mock_token(&self, access_token: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path("/apikey/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_response(access_token, 3600)))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Serves `items` from `collection_path` in pages of `page_size`, one mock
    /// per page, each expected exactly once.
    pub async fn mock_pages(&self, collection_path: &str, key: &str, items: &[Value], page_size: usize) {
        let total = items.len();
        let pages = items.chunks(page_size.max(1)).collect::<Vec<_>>();
        let pages = if pages.is_empty() { vec![&items[..0]] } else { pages };

        for (index, page) in pages.into_iter().enumerate() {
            let start = index * page_size;
            Mock::given(method("GET"))
                .and(path(collection_path))
                .and(query_param("start", start.to_string()))
                .and(query_param("limit", page_size.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(envelope(key, page, total)))
                .expect(1)
                .mount(&self.server)
                .await;
        }
    }

    /// Number of requests received on `request_path`.
    pub async fn request_count(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }
}
