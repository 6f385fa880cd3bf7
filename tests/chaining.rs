//! End-to-end tests for the greeting endpoints.

mod common;

use common::*;
use std::time::Duration;

use aloha::observability::trace::Tracer;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_local_greeting() {
    let backend = start_mock_backend("Bonjour").await;
    let (base, _shutdown) = start_service(test_config(backend.addr), Tracer::Noop).await;

    let res = http_client().get(format!("{base}/api/aloha")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "Aloha mai worker1");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_chaining_passes_downstream_body_through() {
    let backend = start_mock_backend("Bonjour de worker2").await;
    let (base, _shutdown) = start_service(test_config(backend.addr), Tracer::Noop).await;

    let res = http_client()
        .get(format!("{base}/api/aloha-chaining"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("application/json"));

    let body: Vec<String> = res.json().await.unwrap();
    assert_eq!(body, vec!["Aloha mai worker1", "Bonjour de worker2"]);

    let seen = backend.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].request_line.starts_with("GET / "));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unreachable_downstream_yields_fallback() {
    let addr = unused_addr().await;
    let (base, _shutdown) = start_service(test_config(addr), Tracer::Noop).await;

    let res = http_client()
        .get(format!("{base}/api/aloha-chaining"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let body: Vec<String> = res.json().await.unwrap();
    assert_eq!(body, vec!["Aloha mai worker1", "Bonjour response (fallback)"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_server_error_yields_fallback() {
    let backend =
        start_programmable_backend(|| async { (503, "Service Unavailable".to_string()) }).await;
    let (base, _shutdown) = start_service(test_config(backend.addr), Tracer::Noop).await;

    let body: Vec<String> = http_client()
        .get(format!("{base}/api/aloha-chaining"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body[1], "Bonjour response (fallback)");
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_downstream_yields_fallback() {
    let backend = start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_millis(800)).await;
        (200, "Bonjour (late)".to_string())
    })
    .await;
    let mut config = test_config(backend.addr);
    config.circuit_breaker.call_timeout_ms = 100;
    let (base, _shutdown) = start_service(config, Tracer::Noop).await;

    let body: Vec<String> = http_client()
        .get(format!("{base}/api/aloha-chaining"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, vec!["Aloha mai worker1", "Bonjour response (fallback)"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_all_resolve() {
    let backend = start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        (200, "Bonjour".to_string())
    })
    .await;
    let (base, _shutdown) = start_service(test_config(backend.addr), Tracer::Noop).await;
    let client = http_client();

    let requests = (0..25).map(|_| {
        let client = client.clone();
        let url = format!("{base}/api/aloha-chaining");
        async move {
            let res = client.get(url).send().await.unwrap();
            assert_eq!(res.status(), 200);
            res.json::<Vec<String>>().await.unwrap()
        }
    });
    let bodies = futures_util::future::join_all(requests).await;

    assert_eq!(bodies.len(), 25);
    for body in bodies {
        assert_eq!(body, vec!["Aloha mai worker1", "Bonjour"]);
    }
    assert_eq!(backend.calls(), 25);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_health() {
    let addr = unused_addr().await;
    let (base, _shutdown) = start_service(test_config(addr), Tracer::Noop).await;

    let res = http_client().get(format!("{base}/api/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "I'm ok");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_request_id_generated_and_propagated() {
    let addr = unused_addr().await;
    let (base, _shutdown) = start_service(test_config(addr), Tracer::Noop).await;
    let client = http_client();

    let res = client.get(format!("{base}/api/aloha")).send().await.unwrap();
    let generated = res.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());

    let res = client
        .get(format!("{base}/api/aloha"))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "req-42");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cors_preflight() {
    let addr = unused_addr().await;
    let (base, _shutdown) = start_service(test_config(addr), Tracer::Noop).await;

    let res = http_client()
        .request(reqwest::Method::OPTIONS, format!("{base}/api/aloha"))
        .header("origin", "http://example.com")
        .header("access-control-request-method", "GET")
        .header("access-control-request-headers", "x-requested-with")
        .send()
        .await
        .unwrap();

    assert!(res.status().is_success());
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    let allowed = res.headers()["access-control-allow-headers"]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(allowed.contains("x-requested-with"));
    assert!(allowed.contains("authorization"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_graceful_shutdown() {
    let addr = unused_addr().await;
    let (base, shutdown) = start_service(test_config(addr), Tracer::Noop).await;
    let client = http_client();

    assert!(client.get(format!("{base}/api/health")).send().await.is_ok());

    shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let fresh = reqwest::Client::builder().no_proxy().build().unwrap();
    assert!(fresh.get(format!("{base}/api/health")).send().await.is_err());
}
