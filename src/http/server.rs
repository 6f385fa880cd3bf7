//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the downstream stack (client, breaker, fallback) once at startup
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, access log, CORS, limits, timeout, server spans)
//! - Serve on a listener until shutdown is signalled

use axum::{
    http::{header, HeaderName},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    map_response_body::MapResponseBodyLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AlohaConfig;
use crate::dispatch::Dispatcher;
use crate::downstream::{DownstreamError, OutboundClient, ResilientDownstream};
use crate::greeting::GreetingService;
use crate::http::handlers;
use crate::http::middleware::server_span;
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::observability::trace::Tracer;
use crate::resilience::CircuitBreakerRegistry;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid downstream endpoint: {0}")]
    Downstream(#[from] DownstreamError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub greeting: GreetingService,
    pub breakers: Arc<CircuitBreakerRegistry>,
}

/// HTTP server for the greeting service.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create the server and its downstream stack.
    ///
    /// `dispatcher` decides where downstream calls run; `tracer` is shared by the server
    /// spans and the outbound client spans.
    pub fn new(config: AlohaConfig, tracer: Tracer, dispatcher: Dispatcher) -> Result<Self, ServerError> {
        let target = &config.downstream;
        let client = OutboundClient::new(target.name.clone(), &target.base_url())?;

        let breakers = Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.clone()));
        let downstream = ResilientDownstream::new(
            client,
            breakers.get(&target.name),
            tracer.clone(),
            target.fallback.clone(),
        );

        tracing::info!(
            downstream = %target.name,
            url = %target.base_url(),
            tracing_enabled = tracer.is_enabled(),
            "Downstream configured"
        );

        let state = AppState {
            greeting: GreetingService::new(
                config.greeting.hostname.clone(),
                dispatcher,
                Arc::new(downstream),
            ),
            breakers,
        };

        let router = Self::build_router(&config, tracer, state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AlohaConfig, tracer: Tracer, state: AppState) -> Router {
        let traced = Router::new()
            .route("/api/aloha", get(handlers::aloha))
            .route("/api/aloha-chaining", get(handlers::aloha_chaining))
            .route_layer(from_fn_with_state(tracer, server_span));

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers([
                header::ORIGIN,
                HeaderName::from_static("x-requested-with"),
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::AUTHORIZATION,
            ]);

        Router::new()
            .merge(traced)
            .route("/api/health", get(handlers::health))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                    .layer(cors)
                    .layer(MapResponseBodyLayer::new(axum::body::Body::new))
                    .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
