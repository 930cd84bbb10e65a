//! Integration tests for the remote catalog client against a mock service.

mod common;

use common::*;
use catalog_sync::models::{
    ChannelFlags, ProductBatchRequest, RemoteCategory, RemoteCategoryCreate, RemoteProduct,
    RemoteSalesPoint, RemoteTable,
};
use catalog_sync::{ListFilter, RemoteCatalogClient, RetryConfig, SyncError};
use serde_json::json;
use wiremock::matchers::{bearer_token, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

/// Tests that 250 items with a page size of 100 take three page requests.
#[tokio::test]
async fn test_fetch_all_250_items_in_three_pages() {
    let mock = MockCatalogServer::new().await;
    let products = generate_products(250);

    mock.mock_token("tok", 1).await;
    mock.mock_pages("/products", "products", &products, 100).await;

    let fetched: Vec<RemoteProduct> = mock
        .client()
        .fetch_all(API_KEY, &ListFilter::new(), 100)
        .await
        .unwrap();

    assert_eq!(fetched.len(), 250);
    let ids: Vec<_> = fetched.iter().map(|p| p.id.clone()).collect();
    let expected: Vec<_> = (0..250).map(|i| format!("P{i:04}")).collect();
    assert_eq!(ids, expected);
    assert_eq!(mock.request_count("/products").await, 3);
}

/// Tests that a collection fitting in one page takes a single request.
#[tokio::test]
async fn test_fetch_all_single_page() {
    let mock = MockCatalogServer::new().await;
    let tables = vec![table_json("T1", "Terrace 1"), table_json("T2", "Terrace 2")];

    mock.mock_token("tok", 1).await;
    mock.mock_pages("/risto/tables", "tables", &tables, 50).await;

    let fetched: Vec<RemoteTable> = mock
        .client()
        .fetch_all(API_KEY, &ListFilter::new(), 50)
        .await
        .unwrap();

    assert_eq!(fetched.len(), 2);
    assert_eq!(fetched[1].name, "Terrace 2");
}

/// Tests the envelope key of the sales point collection and filter encoding.
#[tokio::test]
async fn test_fetch_page_sends_filters_and_headers() {
    let mock = MockCatalogServer::new().await;
    mock.mock_token("tok", 1).await;

    Mock::given(method("GET"))
        .and(path("/salespoint"))
        .and(query_param("start", "0"))
        .and(query_param("limit", "10"))
        .and(query_param("idsSalesPoint", "[7]"))
        .and(query_param("sorts", "name:ASC"))
        .and(bearer_token("tok"))
        .and(header("X-Version", "1.0.0"))
        .and(header("X-Requested-With", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "salesPoint": [{"id": 7, "name": "Main"}],
            "totalCount": 1
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let filter = ListFilter::new()
        .sales_point(7)
        .sort("name", catalog_sync::SortDirection::Asc);
    let page = mock
        .client()
        .fetch_page::<RemoteSalesPoint>(API_KEY, &filter.page(0, 10))
        .await
        .unwrap();

    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].name, "Main");
}

/// Tests that a page size above the service limit is rejected locally.
#[tokio::test]
async fn test_fetch_rejects_oversized_limit() {
    let mock = MockCatalogServer::new().await;
    let result = mock
        .client()
        .fetch_page::<RemoteTable>(API_KEY, &ListFilter::new().page(0, 101))
        .await;
    assert!(matches!(result, Err(SyncError::Config(_))));
    assert_eq!(mock.request_count("/risto/tables").await, 0);
}

/// Tests that one failing page fails the whole fetch.
#[tokio::test]
async fn test_fetch_all_fails_fast_on_page_error() {
    let mock = MockCatalogServer::new().await;
    let products = generate_products(300);
    mock.mock_token("tok", 1).await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("start", "0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope("products", &products[..100], 300)),
        )
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("start", "100"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("start", "200"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope("products", &products[200..], 300)),
        )
        .mount(&mock.server)
        .await;

    let result = mock
        .client()
        .fetch_all::<RemoteProduct>(API_KEY, &ListFilter::new(), 100)
        .await;

    assert!(matches!(
        result,
        Err(SyncError::RemoteRequest {
            status: Some(500),
            ..
        })
    ));
}

/// Tests that an auth failure aborts the fetch before any page request.
#[tokio::test]
async fn test_auth_failure_aborts_fetch() {
    let mock = MockCatalogServer::new().await;

    Mock::given(method("POST"))
        .and(path("/apikey/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&mock.server)
        .await;

    let result = mock
        .client()
        .fetch_all::<RemoteCategory>(API_KEY, &ListFilter::new(), 100)
        .await;

    assert!(matches!(result, Err(SyncError::Auth(_))));
    assert_eq!(mock.request_count("/categories").await, 0);
}

/// Tests that transient statuses are retried.
#[tokio::test]
async fn test_transient_error_is_retried() {
    let mock = MockCatalogServer::new().await;
    mock.mock_token("tok", 1).await;

    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            "categories",
            &[category_json("C1", "Pizze")],
            1,
        )))
        .mount(&mock.server)
        .await;

    let categories: Vec<RemoteCategory> = mock
        .client()
        .fetch_all(API_KEY, &ListFilter::new(), 100)
        .await
        .unwrap();

    assert_eq!(categories.len(), 1);
    assert_eq!(mock.request_count("/categories").await, 2);
}

/// Tests that retries are bounded.
#[tokio::test]
async fn test_retries_are_bounded() {
    let mock = MockCatalogServer::new().await;
    mock.mock_token("tok", 1).await;

    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock.server)
        .await;

    let result = mock
        .client()
        .fetch_all::<RemoteCategory>(API_KEY, &ListFilter::new(), 100)
        .await;

    let max_retries = RetryConfig::for_testing().max_retries;
    assert!(matches!(
        result,
        Err(SyncError::MaxRetriesExceeded { attempts }) if attempts == max_retries
    ));
    assert_eq!(
        mock.request_count("/categories").await,
        (max_retries + 1) as usize
    );
}

/// Tests that a 401 drops the cached token and retries once with a new one.
#[tokio::test]
async fn test_unauthorized_refreshes_token_once() {
    let mock = MockCatalogServer::new().await;

    Mock::given(method("POST"))
        .and(path("/apikey/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response("stale", 3600)))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/apikey/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response("fresh", 3600)))
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/risto/tables"))
        .and(bearer_token("stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/risto/tables"))
        .and(bearer_token("fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            "tables",
            &[table_json("T1", "One")],
            1,
        )))
        .mount(&mock.server)
        .await;

    let client = mock.client();
    let tables: Vec<RemoteTable> = client
        .fetch_all(API_KEY, &ListFilter::new(), 100)
        .await
        .unwrap();

    assert_eq!(tables.len(), 1);
    assert_eq!(mock.request_count("/apikey/token").await, 2);
    assert_eq!(
        client.credentials().get_token(API_KEY).await.unwrap().access_token,
        "fresh"
    );
}

/// Tests that mutating calls carry the required headers.
#[tokio::test]
async fn test_create_category_headers_and_body() {
    let mock = MockCatalogServer::new().await;
    mock.mock_token("tok", 1).await;

    Mock::given(method("POST"))
        .and(path("/categories"))
        .and(header("Content-Type", "application/json"))
        .and(header("X-Version", "1.0.0"))
        .and(header("X-Requested-With", "*"))
        .and(bearer_token("tok"))
        .and(body_partial_json(json!({
            "idSalesPoint": 7,
            "description": "Pizze",
            "enableForKiosk": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(category_json("C9", "Pizze")))
        .expect(1)
        .mount(&mock.server)
        .await;

    let created = mock
        .client()
        .create_category(
            API_KEY,
            &RemoteCategoryCreate {
                id_sales_point: 7,
                description: "Pizze".into(),
                external_id: None,
                image_url: None,
                channels: ChannelFlags::all_enabled(),
            },
        )
        .await
        .unwrap();

    assert_eq!(created.id, "C9");
}

/// Tests that a 204 on update yields the submitted representation.
#[tokio::test]
async fn test_update_no_content_returns_request() {
    let mock = MockCatalogServer::new().await;
    mock.mock_token("tok", 1).await;

    Mock::given(method("PUT"))
        .and(path("/products/P1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock.server)
        .await;

    let product: RemoteProduct =
        serde_json::from_value(product_json("P1", "Margherita", "C1", 8.5)).unwrap();
    let updated = mock
        .client()
        .update_product(API_KEY, &product)
        .await
        .unwrap();

    assert_eq!(updated, product);
}

/// Tests delete with an empty response.
#[tokio::test]
async fn test_delete_category() {
    let mock = MockCatalogServer::new().await;
    mock.mock_token("tok", 1).await;

    Mock::given(method("DELETE"))
        .and(path("/categories/C1"))
        .and(header("X-Requested-With", "*"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock.server)
        .await;

    mock.client().delete_category(API_KEY, "C1").await.unwrap();
}

/// Tests that a rejected mutation is not retried.
#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock = MockCatalogServer::new().await;
    mock.mock_token("tok", 1).await;

    Mock::given(method("DELETE"))
        .and(path("/products/P1"))
        .respond_with(ResponseTemplate::new(409).set_body_string("in use"))
        .expect(1)
        .mount(&mock.server)
        .await;

    let result = mock.client().delete_product(API_KEY, "P1").await;
    match result {
        Err(SyncError::RemoteRequest { status, message }) => {
            assert_eq!(status, Some(409));
            assert_eq!(message, "in use");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

/// Tests the product batch endpoint.
#[tokio::test]
async fn test_batch_products() {
    let mock = MockCatalogServer::new().await;
    mock.mock_token("tok", 1).await;

    Mock::given(method("POST"))
        .and(path("/products/batch"))
        .and(body_partial_json(json!({"create": [], "update": [{"id": "P1"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "batchResponse": {
                "update": [product_json("P1", "Margherita", "C1", 9.0)]
            }
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let product: RemoteProduct =
        serde_json::from_value(product_json("P1", "Margherita", "C1", 9.0)).unwrap();
    let outcome = mock
        .client()
        .batch_products(
            API_KEY,
            &ProductBatchRequest {
                create: vec![],
                update: vec![product],
            },
        )
        .await
        .unwrap();

    assert!(outcome.create.is_empty());
    assert_eq!(outcome.update[0].id, "P1");
}

/// Tests that clients sharing a credential cache exchange the key once.
#[tokio::test]
async fn test_shared_credentials_across_clients() {
    let mock = MockCatalogServer::new().await;
    mock.mock_token("tok", 1).await;
    mock.mock_pages("/taxes", "taxes", &[json!({"id": "T22", "description": "VAT", "rate": 22.0})], 100)
        .await;
    mock.mock_pages(
        "/departments",
        "departments",
        &[json!({"id": "D1", "description": "Food", "idTax": "T22"})],
        100,
    )
    .await;

    let first = mock.client();
    let second =
        RemoteCatalogClient::with_credentials(test_config(&mock.url()), first.credentials().clone())
            .unwrap();

    let taxes: Vec<catalog_sync::models::RemoteTax> = first
        .fetch_all(API_KEY, &ListFilter::new(), 100)
        .await
        .unwrap();
    let departments: Vec<catalog_sync::models::RemoteDepartment> = second
        .fetch_all(API_KEY, &ListFilter::new(), 100)
        .await
        .unwrap();

    assert_eq!(taxes[0].rate, rust_decimal::Decimal::from(22));
    assert_eq!(departments[0].id_tax.as_deref(), Some("T22"));
}
