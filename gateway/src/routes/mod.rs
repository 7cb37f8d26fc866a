//! HTTP route handlers
//!
//! Handlers take already-collected request parts and return full responses,
//! so they can be exercised without a socket.

pub mod analytics;
pub mod credential;
pub mod health;
pub mod playlist;

pub use analytics::handle_analytics;
pub use credential::{handle_issue, handle_verify, IssueFlavor};
pub use health::{health_check, version_info};
pub use playlist::handle_playlist;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

/// JSON response with permissive CORS
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(body).unwrap_or_else(|_| r#"{"ok":false}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Parse a query string, treating malformed input as empty
pub(crate) fn parse_query<T: serde::de::DeserializeOwned + Default>(query: Option<&str>) -> T {
    query
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default()
}
