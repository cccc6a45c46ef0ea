//! End-to-end request flow through the proxy.

use axum::http::StatusCode;
use serde_json::Value;

mod common;

use common::{ALICE_TOKEN, BOB_TOKEN};

#[tokio::test]
async fn test_missing_token_rejected_before_upstream() {
    let (upstream, connections) = common::start_flaky_backend(0, "unused").await;
    let (proxy, shutdown) = common::start_proxy(common::proxy_config(upstream)).await;

    let res = common::client()
        .get(format!("http://{}/api/tags", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "No token provided");
    assert_eq!(connections.load(std::sync::atomic::Ordering::SeqCst), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unknown_token_rejected() {
    let upstream = common::start_echo_backend().await;
    let (proxy, shutdown) = common::start_proxy(common::proxy_config(upstream)).await;

    let res = common::client()
        .get(format!("http://{}/api/tags", proxy))
        .bearer_auth("not-registered")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Invalid token");

    shutdown.trigger();
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let upstream = common::refused_addr().await;
    let (proxy, shutdown) = common::start_proxy(common::proxy_config(upstream)).await;

    let res = common::client()
        .get(format!("http://{}/health", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    shutdown.trigger();
}

#[tokio::test]
async fn test_path_rewritten_method_and_body_preserved() {
    let upstream = common::start_echo_backend().await;
    let (proxy, shutdown) = common::start_proxy(common::proxy_config(upstream)).await;

    let res = common::client()
        .post(format!("http://{}/api/generate?stream=false", proxy))
        .bearer_auth(ALICE_TOKEN)
        .header("content-type", "application/json")
        .header("x-request-id", "trace-42")
        .body(r#"{"model":"llama3","prompt":"hi"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-request-id"], "trace-42");
    assert_eq!(res.headers()["cache-control"], "no-cache");
    assert_eq!(res.headers()["x-accel-buffering"], "no");

    let echo: Value = res.json().await.unwrap();
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["target"], "/generate?stream=false");
    assert_eq!(echo["body"], r#"{"model":"llama3","prompt":"hi"}"#);
    assert_eq!(echo["content_type"], "application/json");
    assert_eq!(echo["request_id"], "trace-42");
    // The caller's own Authorization is forwarded untouched.
    assert_eq!(echo["authorization"], format!("Bearer {}", ALICE_TOKEN));

    shutdown.trigger();
}

#[tokio::test]
async fn test_prefix_root_maps_to_upstream_root() {
    let upstream = common::start_echo_backend().await;
    let (proxy, shutdown) = common::start_proxy(common::proxy_config(upstream)).await;

    let res = common::client()
        .delete(format!("http://{}/api", proxy))
        .bearer_auth(BOB_TOKEN)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let echo: Value = res.json().await.unwrap();
    assert_eq!(echo["method"], "DELETE");
    assert_eq!(echo["target"], "/");

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_error_status_relayed() {
    let upstream = common::start_mock_backend("404 Not Found", "model not found").await;
    let (proxy, shutdown) = common::start_proxy(common::proxy_config(upstream)).await;

    let res = common::client()
        .get(format!("http://{}/api/show", proxy))
        .bearer_auth(ALICE_TOKEN)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "model not found");

    shutdown.trigger();
}

#[tokio::test]
async fn test_relay_mode_injects_credential() {
    let upstream = common::start_echo_backend().await;
    let mut config = common::proxy_config(upstream);
    config.auth.required = false;
    config.auth.prefix = "/".into();
    config.rewrite = bearer_proxy::config::RewriteConfig::None;
    config.upstream.credential = Some("frontend-secret".into());
    let (proxy, shutdown) = common::start_proxy(config).await;

    let res = common::client()
        .get(format!("http://{}/api/tags", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let echo: Value = res.json().await.unwrap();
    assert_eq!(echo["target"], "/api/tags");
    assert_eq!(echo["authorization"], "Bearer frontend-secret");

    shutdown.trigger();
}

#[tokio::test]
async fn test_streamed_response_arrives_incrementally() {
    let (upstream, gate) = common::start_streaming_backend(
        "{\"response\":\"Hel\"}\n",
        "{\"response\":\"lo\",\"done\":true}\n",
    )
    .await;
    let (proxy, shutdown) = common::start_proxy(common::proxy_config(upstream)).await;

    let mut res = common::client()
        .post(format!("http://{}/api/generate", proxy))
        .bearer_auth(ALICE_TOKEN)
        .body(r#"{"stream":true}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("content-length").is_none());

    // The upstream is still holding back the rest of the body here.
    let first = res.chunk().await.unwrap().unwrap();
    assert_eq!(&first[..], b"{\"response\":\"Hel\"}\n");

    gate.notify_one();

    let mut rest = Vec::new();
    while let Some(chunk) = res.chunk().await.unwrap() {
        rest.extend_from_slice(&chunk);
    }
    assert_eq!(rest, b"{\"response\":\"lo\",\"done\":true}\n");

    shutdown.trigger();
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let upstream = common::start_echo_backend().await;
    let mut config = common::proxy_config(upstream);
    config.security.max_body_size = 16;
    let (proxy, shutdown) = common::start_proxy(config).await;

    let res = common::client()
        .post(format!("http://{}/api/generate", proxy))
        .bearer_auth(ALICE_TOKEN)
        .body("x".repeat(1024))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

    shutdown.trigger();
}

#[tokio::test]
async fn test_large_fixed_length_body_keeps_content_length() {
    let body = "a fixed-length body above the buffering threshold";
    let upstream = common::start_mock_backend("200 OK", body).await;
    let mut config = common::proxy_config(upstream);
    config.streaming.max_buffered_body = 8;
    let (proxy, shutdown) = common::start_proxy(config).await;

    let res = common::client()
        .get(format!("http://{}/api/blobs/model", proxy))
        .bearer_auth(ALICE_TOKEN)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-length"], body.len().to_string());
    assert!(res.headers().get("transfer-encoding").is_none());
    assert_eq!(res.text().await.unwrap(), body);

    shutdown.trigger();
}
