//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one task per connection. Routing is a plain
//! match on method and path in [`route`].

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::CredentialIssuer;
use crate::catalog::Catalog;
use crate::config::Args;
use crate::logging::UsageLogger;
use crate::routes::{self, IssueFlavor};
use crate::types::{GatewayError, Result};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub issuer: CredentialIssuer,
    pub catalog: Catalog,
    pub usage: UsageLogger,
}

impl AppState {
    /// Build state from configuration: signing key and catalog
    pub fn new(args: Args) -> Result<Self> {
        let issuer = match (&args.token_secret, args.dev_mode) {
            (Some(secret), _) => CredentialIssuer::new(
                secret.clone(),
                args.token_expiry_seconds,
                args.bind_product,
            )?,
            (None, true) => {
                warn!("No TOKEN_SECRET set, using the dev-mode signing secret");
                CredentialIssuer::new_dev(args.token_expiry_seconds, args.bind_product)
            }
            (None, false) => {
                return Err(GatewayError::Config(
                    "TOKEN_SECRET is required in production mode".into(),
                ))
            }
        };

        let catalog = match &args.catalog_path {
            Some(path) => Catalog::load(path, &args.default_product_id)?,
            None => Catalog::builtin().with_default(&args.default_product_id)?,
        };

        let usage = UsageLogger::new(args.node_id.to_string());

        Ok(Self::with_components(args, issuer, catalog, usage))
    }

    pub fn with_components(
        args: Args,
        issuer: CredentialIssuer,
        catalog: Catalog,
        usage: UsageLogger,
    ) -> Self {
        Self {
            args,
            issuer,
            catalog,
            usage,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Player gateway listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - credentials use a public signing secret");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Collect the body and route
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    info!("[{}] {} {}", addr, method, path);

    let body = if method == Method::POST {
        match req.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("Request body error from {}: {}", addr, e);
                return Ok(to_boxed(bad_request_response("Failed to read request body")));
            }
        }
    } else {
        Bytes::new()
    };

    let response = route(&state, &method, &path, query.as_deref(), &body).await;
    Ok(to_boxed(response))
}

/// Route a request with its body already collected
pub async fn route(
    state: &AppState,
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: &[u8],
) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => routes::health_check(state),
        (&Method::GET, "/version") => routes::version_info(),

        // CORS preflight
        (&Method::OPTIONS, _) => preflight_response(),

        (&Method::GET, "/playlist") | (&Method::GET, "/api/playlist") => {
            routes::handle_playlist(state, query)
        }

        (&Method::POST, "/credential") => {
            routes::handle_issue(state, body, IssueFlavor::Current).await
        }
        (&Method::POST, "/api/token/mint") => {
            routes::handle_issue(state, body, IssueFlavor::Legacy).await
        }
        (_, "/credential") | (_, "/api/token/mint") => method_not_allowed_response(),

        (&Method::GET, "/credential/verify") | (&Method::GET, "/api/token/verify") => {
            routes::handle_verify(state, query)
        }

        (&Method::POST, "/analytics") | (&Method::POST, "/api/analytics") => {
            routes::handle_analytics(state, body).await
        }

        _ => not_found_response(path),
    }
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn method_not_allowed_response() -> Response<Full<Bytes>> {
    routes::json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({ "ok": false, "error": "Method Not Allowed" }),
    )
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    routes::json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": "Not Found", "path": path }),
    )
}

fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    routes::json_response(
        StatusCode::BAD_REQUEST,
        &serde_json::json!({ "error": "Bad Request", "message": message }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn state() -> AppState {
        let args = Args::parse_from([
            "player-gateway",
            "--dev-mode",
            "--token-secret",
            "route-test-secret-that-is-long-enough-01",
        ]);
        AppState::new(args).unwrap()
    }

    async fn json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_playlist_falls_back_to_default() {
        let state = state();
        let response = route(&state, &Method::GET, "/playlist", Some("productId=UNKNOWN"), b"").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["tracks"].as_array().unwrap().len(), 3);
        assert_eq!(body["tracks"][0]["sourceUrl"], "/audio/caliph-polygamy.mp3");

        let legacy = json(route(&state, &Method::GET, "/api/playlist", Some("sku=HOODIE123"), b"").await).await;
        assert_eq!(legacy["tracks"][1]["title"], "Maria Julia");
    }

    #[tokio::test]
    async fn test_issue_then_verify() {
        let state = state();
        let response = route(
            &state,
            &Method::POST,
            "/credential",
            None,
            br#"{"email":"a@b.com","productId":"HOODIE123"}"#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["ok"], true);
        let credential = body["credential"].as_str().unwrap().to_string();

        let query = format!("credential={}&productId=HOODIE123", credential);
        let ok = json(route(&state, &Method::GET, "/credential/verify", Some(&query), b"").await).await;
        assert_eq!(ok["ok"], true);

        let query = format!("tok={}&sku=CAP9", credential);
        let mismatch = json(route(&state, &Method::GET, "/api/token/verify", Some(&query), b"").await).await;
        assert_eq!(mismatch["ok"], false);
    }

    #[tokio::test]
    async fn test_issue_rejects_bad_input() {
        let state = state();
        let bodies: [&[u8]; 4] = [br#"{"email":""}"#, br#"{}"#, b"not json", br#"{"email":"nope"}"#];
        for body in bodies {
            let response = route(&state, &Method::POST, "/credential", None, body).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = json(response).await;
            assert_eq!(body["ok"], false);
            assert!(body.get("credential").is_none());
        }

        let response = route(&state, &Method::GET, "/credential", None, b"").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_legacy_mint_shape() {
        let state = state();
        let body = json(route(&state, &Method::POST, "/api/token/mint", None, br#"{"email":"a@b.com"}"#).await).await;
        assert_eq!(body["ok"], true);
        assert!(body["tok"].is_string());
    }

    #[tokio::test]
    async fn test_verify_degrades_to_false() {
        let state = state();
        for query in [None, Some("credential="), Some("credential=garbage"), Some("%%%")] {
            let response = route(&state, &Method::GET, "/credential/verify", query, b"").await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(json(response).await["ok"], false);
        }
    }

    #[tokio::test]
    async fn test_analytics_always_no_content() {
        let state = state();
        let valid = route(
            &state,
            &Method::POST,
            "/analytics",
            None,
            br#"{"action":"next","index":1,"productId":"HOODIE123"}"#,
        )
        .await;
        assert_eq!(valid.status(), StatusCode::NO_CONTENT);

        let garbage = route(&state, &Method::POST, "/api/analytics", None, b"{").await;
        assert_eq!(garbage.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let state = state();
        let response = route(&state, &Method::GET, "/nope", None, b"").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let preflight = route(&state, &Method::OPTIONS, "/credential", None, b"").await;
        assert_eq!(preflight.status(), StatusCode::OK);
    }
}
