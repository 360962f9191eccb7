use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use rewarded_engine::http::{
    AD_TYPE_HEADER, CORRELATION_HEADER, TIMEOUT_HEADER, WARMUP_HEADER,
};
use rewarded_engine::{
    AdRequest, AdTransport, HttpTracker, HttpTransport, TrackingSink, TransportErrorReason,
};
use serde_json::json;
use tokio::net::TcpListener;
use uuid::Uuid;

type Hits = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn serve(hits: Hits) -> SocketAddr {
    let router = Router::new()
        .route(
            "/fill",
            get(|headers: HeaderMap| async move {
                let correlation = headers
                    .get(CORRELATION_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({
                    "adapter_kind": "demo",
                    "failover_url": "https://ads.test/failover",
                    "timeout_millis": 4000,
                    "currency_name": "coins",
                    "currency_amount": "5",
                    "server_extras": { "placement": "main", "correlation": correlation },
                }))
            }),
        )
        .route("/empty", get(|| async { StatusCode::NO_CONTENT }))
        .route("/warming", get(|| async { ([(WARMUP_HEADER, "1")], "") }))
        .route("/clear", get(|| async { ([(AD_TYPE_HEADER, "clear")], "{}") }))
        .route(
            "/bad-timeout",
            get(|| async { ([(TIMEOUT_HEADER, "soon")], r#"{"adapter_kind":"demo"}"#) }),
        )
        .route(
            "/timeout-header",
            get(|| async { ([(TIMEOUT_HEADER, "750")], r#"{"adapter_kind":"demo"}"#) }),
        )
        .route("/garbled", get(|| async { "not json" }))
        .route(
            "/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/beacon",
            get(move |Query(query): Query<HashMap<String, String>>| {
                let hits = hits.clone();
                async move {
                    hits.lock().push(query);
                    StatusCode::OK
                }
            }),
        );
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    addr
}

fn request(addr: SocketAddr, path: &str, correlation: Uuid) -> AdRequest {
    AdRequest {
        unit_id: "u1".into(),
        endpoint: format!("http://{addr}{path}"),
        correlation,
    }
}

#[test_timeout::tokio_timeout_test(20)]
async fn http_transport_decodes_fill() {
    let addr = serve(Hits::default()).await;
    let correlation = Uuid::new_v4();
    let response = HttpTransport::new()
        .send(request(addr, "/fill", correlation))
        .await
        .expect("fill");
    assert_eq!(response.adapter_kind.as_deref(), Some("demo"));
    assert_eq!(response.failover_url.as_deref(), Some("https://ads.test/failover"));
    assert_eq!(response.timeout_millis, Some(4000));
    assert_eq!(response.currency_amount.as_deref(), Some("5"));
    assert_eq!(response.server_extras["placement"], "main");
    assert_eq!(response.server_extras["correlation"], correlation.to_string());
}

#[test_timeout::tokio_timeout_test(20)]
async fn http_transport_classifies_failures() {
    let addr = serve(Hits::default()).await;
    let transport = HttpTransport::new();
    let cases = [
        ("/empty", TransportErrorReason::NoFill),
        ("/warming", TransportErrorReason::WarmingUp),
        ("/clear", TransportErrorReason::NoFill),
        ("/bad-timeout", TransportErrorReason::BadHeaderData),
        ("/garbled", TransportErrorReason::BadBody),
        ("/broken", TransportErrorReason::Other),
    ];
    for (path, expected) in cases {
        let err = transport
            .send(request(addr, path, Uuid::new_v4()))
            .await
            .expect_err(path);
        assert_eq!(err.reason, expected, "{path}");
    }
}

#[test_timeout::tokio_timeout_test(20)]
async fn timeout_header_overrides_body_hint() {
    let addr = serve(Hits::default()).await;
    let response = HttpTransport::new()
        .send(request(addr, "/timeout-header", Uuid::new_v4()))
        .await
        .expect("fill");
    assert_eq!(response.timeout_millis, Some(750));
}

#[test_timeout::tokio_timeout_test(20)]
async fn refused_connection_maps_to_no_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let err = HttpTransport::new()
        .send(request(addr, "/fill", Uuid::new_v4()))
        .await
        .expect_err("nothing listening");
    assert_eq!(err.reason, TransportErrorReason::NoConnection);
}

#[test_timeout::tokio_timeout_test(20)]
async fn tracker_fires_beacons_and_completions() {
    let hits = Hits::default();
    let addr = serve(hits.clone()).await;
    let tracker = HttpTracker::new();

    tracker.fire_and_forget(&format!("http://{addr}/beacon?kind=imp"));
    tracker.confirm_completion(&format!("http://{addr}/beacon?kind=done"), Some("cust-7"));

    while hits.lock().len() < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let mut seen = hits.lock().clone();
    seen.sort_by(|a, b| a["kind"].cmp(&b["kind"]));
    assert_eq!(seen[0].get("customer_id").map(String::as_str), Some("cust-7"));
    assert_eq!(seen[1]["kind"], "imp");
    assert!(!seen[1].contains_key("customer_id"));
}
