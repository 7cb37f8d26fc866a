//! Credential endpoints
//!
//! - POST /credential `{ email, productId? }` -> `{ ok, credential? }`
//! - GET /credential/verify?credential=&productId= -> `{ ok }`
//! - POST /api/token/mint -> `{ ok, tok? }` and GET /api/token/verify?tok=&sku=
//!
//! Verification never fails with an error status: anything wrong with the
//! credential is `{ ok: false }`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use player_core::{CredentialRequest, CredentialResponse, VerifyResponse};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::{json_response, parse_query};
use crate::auth::{email_fingerprint, normalize_email};
use crate::server::AppState;

/// Response shape of the issue endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueFlavor {
    /// `{ ok, credential }`
    Current,
    /// `{ ok, tok }`
    Legacy,
}

#[derive(Serialize)]
struct LegacyIssueResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tok: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyQuery {
    #[serde(alias = "tok")]
    credential: Option<String>,
    #[serde(alias = "sku")]
    product_id: Option<String>,
}

fn issue_response(
    status: StatusCode,
    credential: Option<String>,
    flavor: IssueFlavor,
) -> Response<Full<Bytes>> {
    let ok = credential.is_some();
    match flavor {
        IssueFlavor::Current => json_response(status, &CredentialResponse { ok, credential }),
        IssueFlavor::Legacy => json_response(status, &LegacyIssueResponse { ok, tok: credential }),
    }
}

/// Exchange an email for a credential
pub async fn handle_issue(state: &AppState, body: &[u8], flavor: IssueFlavor) -> Response<Full<Bytes>> {
    let request: CredentialRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, "Malformed credential request");
            return issue_response(StatusCode::BAD_REQUEST, None, flavor);
        }
    };

    let Some(email) = normalize_email(&request.email) else {
        debug!("Rejected credential request with invalid email");
        return issue_response(StatusCode::BAD_REQUEST, None, flavor);
    };

    let product_id = request
        .product_id
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let credential = match state.issuer.mint(&email, product_id) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to issue credential");
            return issue_response(StatusCode::INTERNAL_SERVER_ERROR, None, flavor);
        }
    };

    state
        .usage
        .log_credential_issued(product_id, email_fingerprint(&email))
        .await;
    info!(product_id = ?product_id, "Credential issued");

    issue_response(StatusCode::OK, Some(credential), flavor)
}

/// Check a credential against a product
pub fn handle_verify(state: &AppState, query: Option<&str>) -> Response<Full<Bytes>> {
    let params: VerifyQuery = parse_query(query);

    let ok = match params.credential.as_deref().filter(|c| !c.is_empty()) {
        None => false,
        Some(token) => {
            let check = state.issuer.verify(token, params.product_id.as_deref());
            if let Some(reason) = &check.error {
                debug!(reason = %reason, "Credential rejected");
            }
            check.valid
        }
    };

    json_response(StatusCode::OK, &VerifyResponse { ok })
}
