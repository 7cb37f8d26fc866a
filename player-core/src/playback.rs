//! Playlist & playback controller
//!
//! [`PlaybackController`] is the only owner of the audio handle and the
//! cursor. Gesture and UI callers go through its operations; none of them
//! touch the audio output or the track list directly.

use async_trait::async_trait;
use serde::Serialize;
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::error::{PlayerError, Result};
use crate::playlist::{Playlist, Track};

/// Transport state of the audio handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    #[default]
    Stopped,
    Loading,
    Playing,
    Paused,
}

/// Position in the playlist plus transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackCursor {
    pub index: usize,
    pub transport: TransportState,
}

/// The single audio handle
#[async_trait(?Send)]
pub trait AudioOutput {
    /// Bind a media source and begin loading it
    fn set_source(&self, url: &str);

    /// Resolves once playback has started; fails if the platform refuses
    async fn play(&self) -> Result<()>;

    fn pause(&self);
}

/// Which now-playing presentation a surface is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Flat overlay over the camera view
    Overlay,
    /// Text and image nodes inside the 3D scene
    ScenePanel,
}

/// A now-playing presentation
pub trait NowPlayingSurface {
    fn kind(&self) -> SurfaceKind;
    fn set_title(&self, title: &str);
    fn set_artist(&self, artist: &str);
    fn set_cover(&self, cover_url: &str);

    /// Make the surface visible. The overlay starts hidden.
    fn reveal(&self) {}
}

/// Mirror a track's metadata into a surface
///
/// The scene panel keeps its previous cover when the track has none.
pub fn mirror(surface: &dyn NowPlayingSurface, track: &Track) {
    surface.set_title(&track.title);
    surface.set_artist(&track.artist);
    match surface.kind() {
        SurfaceKind::Overlay => {
            surface.set_cover(&track.cover_url);
            surface.reveal();
        }
        SurfaceKind::ScenePanel => {
            if !track.cover_url.is_empty() {
                surface.set_cover(&track.cover_url);
            }
        }
    }
}

/// Transport state shared with outstanding play requests
///
/// Every transport command bumps the ticket, which supersedes any
/// [`PendingPlay`] issued before it.
#[derive(Debug, Default)]
struct Transport {
    state: Cell<TransportState>,
    ticket: Cell<u64>,
}

impl Transport {
    fn set(&self, state: TransportState) -> u64 {
        self.state.set(state);
        let ticket = self.ticket.get() + 1;
        self.ticket.set(ticket);
        ticket
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayIntent {
    /// Explicit play control; a rejection pauses the transport
    Play,
    /// Resume after navigation; a rejection keeps the playing intent
    Resume,
    /// Unlock playback inside the start tap, then pause
    Prime,
}

/// A play request waiting on the platform
///
/// Carries no borrow of the controller, so other commands stay available
/// while the media element buffers. A later transport command supersedes it.
#[must_use = "the platform play call is only made when awaited"]
pub struct PendingPlay {
    audio: Rc<dyn AudioOutput>,
    transport: Rc<Transport>,
    ticket: u64,
    intent: PlayIntent,
}

impl PendingPlay {
    /// No transport command has been issued since this request
    pub fn is_current(&self) -> bool {
        self.transport.ticket.get() == self.ticket
    }

    /// Issue the platform play and settle the transport with its outcome
    pub async fn wait(self) -> Result<()> {
        if !self.is_current() {
            debug!(ticket = self.ticket, "Play superseded before it started");
            return Ok(());
        }

        let result = self.audio.play().await;
        let current = self.is_current();
        match (&result, self.intent) {
            (Err(_), PlayIntent::Play) if current => self.transport.state.set(TransportState::Paused),
            (Err(e), PlayIntent::Play) => debug!(error = %e, "Superseded play rejected"),
            (Err(e), PlayIntent::Resume) => debug!(error = %e, "Resume after navigation rejected"),
            (Err(e), PlayIntent::Prime) => warn!(error = %e, "Audio prime rejected"),
            (Ok(()), PlayIntent::Prime) if current => {
                self.audio.pause();
                info!("Audio primed");
            }
            (Ok(()), _) => {}
        }
        result
    }
}

/// Result of a next/previous transition
#[must_use = "the track only resumes once `resume` is awaited"]
pub struct Step {
    pub index: usize,
    pub resume: PendingPlay,
}

/// Owns the playlist, the cursor and the audio handle
pub struct PlaybackController {
    audio: Rc<dyn AudioOutput>,
    surfaces: Vec<Rc<dyn NowPlayingSurface>>,
    playlist: Playlist,
    index: usize,
    transport: Rc<Transport>,
}

impl PlaybackController {
    pub fn new(audio: Rc<dyn AudioOutput>, surfaces: Vec<Rc<dyn NowPlayingSurface>>) -> Self {
        Self {
            audio,
            surfaces,
            playlist: Playlist::default(),
            index: 0,
            transport: Rc::new(Transport::default()),
        }
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn cursor(&self) -> PlaybackCursor {
        PlaybackCursor {
            index: self.index,
            transport: self.transport.state.get(),
        }
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.playlist.get(self.index)
    }

    /// Install the playlist for this session
    ///
    /// The cursor is kept if it still points at a track, otherwise it goes
    /// back to the first one.
    pub fn set_playlist(&mut self, playlist: Playlist) {
        if self.index >= playlist.len() {
            self.index = 0;
        }
        debug!(tracks = playlist.len(), "Playlist installed");
        self.playlist = playlist;
    }

    /// Bind the track at the cursor and mirror it into every surface
    ///
    /// With no track at the cursor nothing changes and `EmptyPlaylist` is
    /// returned.
    pub fn load_current(&mut self) -> Result<()> {
        let track = self
            .playlist
            .get(self.index)
            .ok_or(PlayerError::EmptyPlaylist)?;

        self.audio.set_source(&track.source_url);
        for surface in &self.surfaces {
            mirror(surface.as_ref(), track);
        }
        self.transport.set(TransportState::Loading);
        debug!(index = self.index, title = %track.title, "Track loaded");
        Ok(())
    }

    /// Mark the transport playing and hand back the platform request
    pub fn play(&mut self) -> Result<PendingPlay> {
        if self.playlist.is_empty() {
            return Err(PlayerError::EmptyPlaylist);
        }
        let ticket = self.transport.set(TransportState::Playing);
        Ok(self.pending(ticket, PlayIntent::Play))
    }

    pub fn pause(&mut self) {
        if self.playlist.is_empty() {
            return;
        }
        self.audio.pause();
        self.transport.set(TransportState::Paused);
    }

    /// Advance with wraparound; the returned step resumes playback
    pub fn next(&mut self) -> Option<Step> {
        self.step(1)
    }

    /// Rewind with wraparound; the returned step resumes playback
    pub fn previous(&mut self) -> Option<Step> {
        self.step(-1)
    }

    fn step(&mut self, delta: isize) -> Option<Step> {
        let index = self.playlist.wrap_index(self.index, delta)?;
        self.index = index;
        self.load_current().ok()?;

        // Transport reflects intent even when the platform refuses to play.
        let ticket = self.transport.set(TransportState::Playing);
        Some(Step {
            index,
            resume: self.pending(ticket, PlayIntent::Resume),
        })
    }

    /// Load the current track for the play-then-pause unlock
    ///
    /// Runs inside the start tap so later programmatic playback is allowed.
    pub fn prime(&mut self) -> Result<PendingPlay> {
        self.load_current()?;
        let ticket = self.transport.set(TransportState::Paused);
        Ok(self.pending(ticket, PlayIntent::Prime))
    }

    fn pending(&self, ticket: u64, intent: PlayIntent) -> PendingPlay {
        PendingPlay {
            audio: Rc::clone(&self.audio),
            transport: Rc::clone(&self.transport),
            ticket,
            intent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAudio, RecordingSurface};
    use std::cell::RefCell;

    fn tracks(n: usize) -> Playlist {
        Playlist::new(
            (0..n)
                .map(|i| {
                    let cover = if i == 1 { String::new() } else { format!("/covers/{i}.jpg") };
                    Track::new(format!("/audio/{i}.mp3"), format!("T{i}"), "Caliph", cover)
                })
                .collect(),
        )
    }

    fn controller(audio: &Rc<MockAudio>) -> (PlaybackController, Rc<RecordingSurface>, Rc<RecordingSurface>) {
        let overlay = Rc::new(RecordingSurface::new(SurfaceKind::Overlay));
        let scene = Rc::new(RecordingSurface::new(SurfaceKind::ScenePanel));
        let surfaces = vec![
            overlay.clone() as Rc<dyn NowPlayingSurface>,
            scene.clone() as Rc<dyn NowPlayingSurface>,
        ];
        let audio: Rc<dyn AudioOutput> = audio.clone();
        (PlaybackController::new(audio, surfaces), overlay, scene)
    }

    async fn advance(playback: &mut PlaybackController) -> Option<usize> {
        let step = playback.next()?;
        let _ = step.resume.wait().await;
        Some(step.index)
    }

    async fn rewind(playback: &mut PlaybackController) -> Option<usize> {
        let step = playback.previous()?;
        let _ = step.resume.wait().await;
        Some(step.index)
    }

    #[tokio::test]
    async fn test_empty_playlist_operations_are_noops() {
        let audio = Rc::new(MockAudio::accepting());
        let (mut playback, overlay, _) = controller(&audio);

        assert_eq!(playback.load_current(), Err(PlayerError::EmptyPlaylist));
        assert!(playback.next().is_none());
        assert!(playback.previous().is_none());
        assert!(matches!(playback.play(), Err(PlayerError::EmptyPlaylist)));
        playback.pause();

        assert!(audio.sources().is_empty());
        assert_eq!(audio.play_calls(), 0);
        assert!(overlay.titles().is_empty());
        assert_eq!(playback.cursor(), PlaybackCursor::default());
    }

    #[tokio::test]
    async fn test_next_wraps_and_mirrors() {
        let audio = Rc::new(MockAudio::accepting());
        let (mut playback, overlay, scene) = controller(&audio);
        playback.set_playlist(tracks(3));
        playback.load_current().unwrap();

        assert_eq!(advance(&mut playback).await, Some(1));
        assert_eq!(advance(&mut playback).await, Some(2));
        assert_eq!(advance(&mut playback).await, Some(0));
        assert_eq!(rewind(&mut playback).await, Some(2));

        assert_eq!(audio.sources().last().unwrap(), "/audio/2.mp3");
        assert_eq!(audio.play_calls(), 4);
        assert_eq!(overlay.titles(), vec!["T0", "T1", "T2", "T0", "T2"]);
        // Scene panel keeps its previous cover for the cover-less track.
        assert_eq!(scene.covers(), vec!["/covers/0.jpg", "/covers/2.jpg", "/covers/0.jpg", "/covers/2.jpg"]);
        assert_eq!(overlay.covers().len(), 5);
        assert!(overlay.revealed());
    }

    #[tokio::test]
    async fn test_rejected_resume_keeps_playing_intent() {
        let audio = Rc::new(MockAudio::rejecting());
        let (mut playback, _, _) = controller(&audio);
        playback.set_playlist(tracks(2));

        assert_eq!(advance(&mut playback).await, Some(1));
        assert_eq!(playback.cursor().transport, TransportState::Playing);
    }

    #[tokio::test]
    async fn test_rejected_play_is_reported() {
        let audio = Rc::new(MockAudio::rejecting());
        let (mut playback, _, _) = controller(&audio);
        playback.set_playlist(tracks(2));
        playback.load_current().unwrap();

        let pending = playback.play().unwrap();
        assert_eq!(playback.cursor().transport, TransportState::Playing);
        assert!(matches!(pending.wait().await, Err(PlayerError::PlayRejected(_))));
        assert_eq!(playback.cursor().transport, TransportState::Paused);
    }

    #[tokio::test]
    async fn test_prime_plays_then_pauses() {
        let audio = Rc::new(MockAudio::accepting());
        let (mut playback, _, _) = controller(&audio);
        playback.set_playlist(tracks(3));

        let prime = playback.prime().unwrap();
        assert_eq!(playback.cursor().transport, TransportState::Paused);
        prime.wait().await.unwrap();
        assert_eq!(audio.play_calls(), 1);
        assert_eq!(audio.pause_calls(), 1);
        assert_eq!(playback.cursor().transport, TransportState::Paused);
    }

    #[tokio::test]
    async fn test_superseded_play_never_reaches_platform() {
        let audio = Rc::new(MockAudio::accepting());
        let (mut playback, _, _) = controller(&audio);
        playback.set_playlist(tracks(2));

        let pending = playback.play().unwrap();
        playback.pause();
        assert!(!pending.is_current());
        pending.wait().await.unwrap();
        assert_eq!(audio.play_calls(), 0);
        assert_eq!(playback.cursor().transport, TransportState::Paused);
    }

    #[tokio::test]
    async fn test_pause_while_track_buffers() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let audio = Rc::new(MockAudio::holding());
                let (playback, _, _) = controller(&audio);
                let playback = Rc::new(RefCell::new(playback));
                playback.borrow_mut().set_playlist(tracks(2));

                let pending = playback.borrow_mut().play().unwrap();
                let buffering = tokio::task::spawn_local(pending.wait());
                tokio::task::yield_now().await;
                assert_eq!(audio.play_calls(), 1);

                // The play promise is still open; the controller is free.
                playback.try_borrow_mut().unwrap().pause();
                assert_eq!(playback.borrow().cursor().transport, TransportState::Paused);
                assert_eq!(audio.pause_calls(), 1);

                // A late rejection of the superseded play changes nothing.
                audio.settle_play(0, false);
                assert!(buffering.await.unwrap().is_err());
                assert_eq!(playback.borrow().cursor().transport, TransportState::Paused);
            })
            .await;
    }
}
