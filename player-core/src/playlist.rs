//! Tracks, playlists and the playlist service contract
//!
//! A playlist is fetched at most once per page load: an opportunistic
//! prefetch starts with the page, and `start` issues an on-demand fetch only
//! if the prefetch has not populated the shared [`PlaylistCell`] yet.
//! Whichever completes first wins; later completions are no-ops.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

use crate::error::Result;

/// Track descriptor: playable media plus display metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(alias = "url")]
    pub source_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default, alias = "cover")]
    pub cover_url: String,
}

impl Track {
    pub fn new(
        source_url: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        cover_url: impl Into<String>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            title: title.into(),
            artist: artist.into(),
            cover_url: cover_url.into(),
        }
    }
}

/// Body of `GET /playlist`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistResponse {
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// Ordered, immutable list of tracks
///
/// Order is exactly the order returned by the playlist service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    tracks: Rc<[Track]>,
}

impl Default for Playlist {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Playlist {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks: tracks.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// Index reached by stepping `delta` from `index`, wrapping at both ends
    ///
    /// Returns `None` for an empty playlist.
    pub fn wrap_index(&self, index: usize, delta: isize) -> Option<usize> {
        let n = self.tracks.len();
        if n == 0 {
            return None;
        }
        let n = n as isize;
        let next = (index as isize % n + delta % n + n) % n;
        Some(next as usize)
    }
}

impl From<Vec<Track>> for Playlist {
    fn from(tracks: Vec<Track>) -> Self {
        Self::new(tracks)
    }
}

/// Remote playlist service
#[async_trait(?Send)]
pub trait PlaylistSource {
    /// Fetch the ordered track list for a product
    ///
    /// Unknown products resolve to the service's default catalog entry; an
    /// empty list is a valid answer.
    async fn fetch(&self, product_id: &str) -> Result<Vec<Track>>;
}

/// First-completion-wins slot shared by the prefetch and the on-demand fetch
#[derive(Debug, Clone, Default)]
pub struct PlaylistCell {
    inner: Rc<RefCell<Option<Playlist>>>,
}

impl PlaylistCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the cell unless it already holds a playlist
    ///
    /// Returns `true` if this call populated it.
    pub fn fill(&self, playlist: Playlist) -> bool {
        let mut slot = self.inner.borrow_mut();
        if slot.is_some() {
            debug!("Playlist already populated, ignoring late completion");
            return false;
        }
        *slot = Some(playlist);
        true
    }

    pub fn get(&self) -> Option<Playlist> {
        self.inner.borrow().clone()
    }

    /// Populated with at least one track
    pub fn has_tracks(&self) -> bool {
        self.inner
            .borrow()
            .as_ref()
            .map(|p| !p.is_empty())
            .unwrap_or(false)
    }

    /// Replace an empty playlist with a fresh fetch result
    fn refill_if_empty(&self, playlist: Playlist) {
        let mut slot = self.inner.borrow_mut();
        let empty = slot.as_ref().map(|p| p.is_empty()).unwrap_or(true);
        if empty {
            *slot = Some(playlist);
        }
    }
}

/// Fetch and store the playlist, swallowing failures
///
/// Used for the opportunistic prefetch: a failure leaves the cell untouched
/// so the on-demand fetch at start can try again.
pub async fn prefetch(source: Rc<dyn PlaylistSource>, product_id: String, cell: PlaylistCell) {
    match source.fetch(&product_id).await {
        Ok(tracks) => {
            let count = tracks.len();
            if cell.fill(Playlist::new(tracks)) {
                debug!(product_id = %product_id, tracks = count, "Playlist prefetched");
            }
        }
        Err(e) => {
            warn!(product_id = %product_id, error = %e, "Playlist prefetch failed");
        }
    }
}

/// Make sure the cell holds tracks, fetching on demand if it does not
///
/// An empty or missing playlist triggers one fetch. A fetch failure is
/// absorbed and whatever the cell holds (possibly nothing) is returned.
pub async fn ensure_loaded(
    source: &dyn PlaylistSource,
    product_id: &str,
    cell: &PlaylistCell,
) -> Playlist {
    if !cell.has_tracks() {
        match source.fetch(product_id).await {
            Ok(tracks) => cell.refill_if_empty(Playlist::new(tracks)),
            Err(e) => warn!(product_id = %product_id, error = %e, "On-demand playlist fetch failed"),
        }
    }
    cell.get().unwrap_or_default()
}
