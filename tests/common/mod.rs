//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use aloha::config::AlohaConfig;
use aloha::dispatch::Dispatcher;
use aloha::observability::trace::{FinishedSpan, Reporter, Tracer};
use aloha::resilience::CircuitBreakerRegistry;
use aloha::{HttpServer, Shutdown};

/// Request line and lowercased headers of one request seen by a mock backend.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Handle to a running mock backend.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

/// Start a mock backend that always answers 200 with `body`.
#[allow(dead_code)]
pub async fn start_mock_backend(body: &'static str) -> MockBackend {
    start_programmable_backend(move || async move { (200, body.to_string()) }).await
}

/// Start a mock backend whose reply is computed per request by `f`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = MockBackend {
        addr: listener.local_addr().unwrap(),
        calls: Arc::new(AtomicUsize::new(0)),
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let f = Arc::new(f);
    let state = backend.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let state = state.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        state.calls.fetch_add(1, Ordering::SeqCst);
                        state.seen.lock().unwrap().push(request);

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    backend
}

async fn read_request(socket: &mut TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?.to_string();
    let headers = lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    Some(SeenRequest {
        request_line,
        headers,
    })
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Config pointing the service at `downstream`, greeting as `worker1`.
pub fn test_config(downstream: SocketAddr) -> AlohaConfig {
    let mut config = AlohaConfig::default();
    config.greeting.hostname = "worker1".into();
    config.downstream.host = downstream.ip().to_string();
    config.downstream.port = downstream.port();
    config.circuit_breaker.call_timeout_ms = 500;
    config
}

/// Start the service on an ephemeral port and return its base URL.
pub async fn start_service(config: AlohaConfig, tracer: Tracer) -> (String, Shutdown) {
    let (base, shutdown, _breakers) = start_service_with_breakers(config, tracer).await;
    (base, shutdown)
}

/// Like [`start_service`], also handing back the service's circuit breakers.
#[allow(dead_code)]
pub async fn start_service_with_breakers(
    config: AlohaConfig,
    tracer: Tracer,
) -> (String, Shutdown, Arc<CircuitBreakerRegistry>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dispatcher = Dispatcher::current(config.dispatcher.max_in_flight)
        .with_queue_timeout(config.dispatcher.queue_timeout());
    let server = HttpServer::new(config, tracer, dispatcher).unwrap();
    let breakers = server.state().breakers.clone();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    (format!("http://{addr}"), shutdown, breakers)
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Reporter that keeps every finished span in memory.
#[derive(Default)]
pub struct RecordingReporter {
    spans: Mutex<Vec<FinishedSpan>>,
}

#[allow(dead_code)]
impl RecordingReporter {
    pub fn spans(&self) -> Vec<FinishedSpan> {
        self.spans.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, span: FinishedSpan) {
        self.spans.lock().unwrap().push(span);
    }
}
