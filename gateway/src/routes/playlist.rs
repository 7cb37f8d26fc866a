//! GET /playlist?productId= (and the legacy /api/playlist?sku=)

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use player_core::PlaylistResponse;
use serde::Deserialize;
use tracing::debug;

use super::{json_response, parse_query};
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistQuery {
    #[serde(alias = "sku")]
    product_id: Option<String>,
}

/// Ordered tracks for a product; unknown products get the default catalog
pub fn handle_playlist(state: &AppState, query: Option<&str>) -> Response<Full<Bytes>> {
    let params: PlaylistQuery = parse_query(query);
    let (served, tracks) = state.catalog.resolve(params.product_id.as_deref());

    debug!(
        requested = ?params.product_id,
        served = %served,
        tracks = tracks.len(),
        "Serving playlist"
    );

    json_response(
        StatusCode::OK,
        &PlaylistResponse {
            tracks: tracks.to_vec(),
        },
    )
}
