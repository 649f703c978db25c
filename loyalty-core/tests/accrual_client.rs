//! The accrual HTTP client against a local stand-in service.

use axum::Router;
use axum::extract::Path;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use loyalty_core::processors::AccrualSource;
use loyalty_sdk::client::{AccrualClient, ClientError};
use loyalty_sdk::objects::{AccrualReply, AccrualStatus};
use rust_decimal_macros::dec;
use std::time::Duration;
use url::Url;

async fn order(Path(number): Path<String>) -> Response {
    match number.as_str() {
        "79927398713" => (
            StatusCode::OK,
            [("content-type", "application/json")],
            r#"{"order":"79927398713","status":"PROCESSED","accrual":500.5}"#,
        )
            .into_response(),
        "12345678903" => (
            StatusCode::OK,
            [("content-type", "application/json")],
            r#"{"order":"12345678903","status":"REGISTERED"}"#,
        )
            .into_response(),
        "4561261212345467" => {
            let mut headers = HeaderMap::new();
            headers.insert(RETRY_AFTER, HeaderValue::from_static("60"));
            (
                StatusCode::TOO_MANY_REQUESTS,
                headers,
                "No more than 5 requests per minute allowed",
            )
                .into_response()
        }
        "18" => (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response(),
        "26" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn serve() -> AccrualClient {
    serve_at("").await
}

/// Mount the stand-in service under `prefix` and point a client at it.
async fn serve_at(prefix: &str) -> AccrualClient {
    let app = Router::new().route(&format!("{prefix}/api/orders/{{number}}"), get(order));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let base = Url::parse(&format!("http://{addr}{prefix}")).unwrap();
    AccrualClient::new(base, Duration::from_secs(5))
}

#[tokio::test]
async fn found_orders_are_parsed() {
    let client = serve().await;

    match client.lookup(79927398713).await.unwrap() {
        AccrualReply::Found(response) => {
            assert_eq!(response.order, "79927398713");
            assert_eq!(response.status, AccrualStatus::Processed);
            assert_eq!(response.accrual, Some(dec!(500.50)));
        }
        other => panic!("unexpected reply {other:?}"),
    }

    match client.lookup(12345678903).await.unwrap() {
        AccrualReply::Found(response) => {
            assert_eq!(response.status, AccrualStatus::Registered);
            assert_eq!(response.accrual, None);
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[tokio::test]
async fn unknown_order_is_not_registered() {
    let client = serve().await;
    assert_eq!(
        client.lookup(79927398721).await.unwrap(),
        AccrualReply::NotRegistered
    );
}

#[tokio::test]
async fn rate_limit_directive_combines_body_and_header() {
    let client = serve().await;
    match client.lookup(4561261212345467).await.unwrap() {
        AccrualReply::RateLimited(directive) => {
            assert_eq!(directive.request_limit, 5);
            assert_eq!(directive.retry_after, Duration::from_secs(60));
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[tokio::test]
async fn protocol_violations_are_errors() {
    let client = serve().await;
    assert!(matches!(
        client.lookup(18).await,
        Err(ClientError::MalformedRateLimit(_))
    ));
    assert!(matches!(
        client.lookup(26).await,
        Err(ClientError::UnexpectedStatus { status, .. }) if status.as_u16() == 500
    ));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = AccrualClient::new(
        Url::parse(&format!("http://{addr}")).unwrap(),
        Duration::from_secs(1),
    );
    assert!(matches!(
        client.lookup(79927398713).await,
        Err(ClientError::Http(_))
    ));
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let client = serve_at("/accrual").await;
    assert_eq!(client.base_url().path(), "/accrual/");
    assert!(matches!(
        client.lookup(79927398713).await.unwrap(),
        AccrualReply::Found(_)
    ));

    // an already terminated prefix is not doubled
    let again = AccrualClient::new(client.base_url().clone(), Duration::from_secs(5));
    assert_eq!(again.base_url().path(), "/accrual/");
    assert_eq!(again.lookup(0).await.unwrap(), AccrualReply::NotRegistered);
}
