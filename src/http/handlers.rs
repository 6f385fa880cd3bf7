//! Route handlers.

use axum::{
    extract::State,
    http::HeaderMap,
    Extension, Json,
};

use crate::greeting::CombinedGreeting;
use crate::http::middleware::ActiveSpan;
use crate::http::request::request_id;
use crate::http::server::AppState;

/// `GET /api/aloha`
pub async fn aloha(State(state): State<AppState>) -> String {
    state.greeting.local()
}

/// `GET /api/aloha-chaining`
///
/// Always 200. A failed downstream call shows up only as the fallback text.
pub async fn aloha_chaining(
    State(state): State<AppState>,
    Extension(ActiveSpan(parent)): Extension<ActiveSpan>,
    headers: HeaderMap,
) -> Json<CombinedGreeting> {
    tracing::debug!(
        request_id = %request_id(&headers),
        trace_id = ?parent.map(|ctx| ctx.trace_id.to_string()),
        "Chaining greeting"
    );
    Json(state.greeting.chain(parent).await)
}

/// `GET /api/health`
pub async fn health() -> &'static str {
    "I'm ok"
}
