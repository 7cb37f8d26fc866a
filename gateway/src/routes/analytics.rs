//! POST /analytics (and /api/analytics)
//!
//! Always answers 204. Malformed bodies are dropped after a debug line.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use player_core::NavigationEvent;
use tracing::debug;

use crate::server::AppState;

pub async fn handle_analytics(state: &AppState, body: &[u8]) -> Response<Full<Bytes>> {
    match serde_json::from_slice::<NavigationEvent>(body) {
        Ok(event) => state.usage.log_navigation(&event).await,
        Err(e) => debug!(error = %e, "Ignoring malformed navigation event"),
    }

    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::new()))
        .unwrap()
}
