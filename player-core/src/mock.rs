//! Mock platform collaborators for testing.
//!
//! Each mock records the calls it receives so tests can assert on ordering
//! and side effects without a browser or a running gateway.

use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::task::{Poll, Waker};
use url::Url;

use crate::access::{AccessService, PageNavigator};
use crate::bootstrap::ScriptLoader;
use crate::error::{PlayerError, Result};
use crate::permissions::{CaptureDevice, CaptureHandle, MotionPermissionApi};
use crate::playback::{AudioOutput, NowPlayingSurface, SurfaceKind};
use crate::playlist::{PlaylistSource, Track};
use crate::telemetry::BeaconSink;

/// One-shot outcome a pending mock call waits on.
#[derive(Default)]
struct Latch {
    outcome: Cell<Option<bool>>,
    waker: RefCell<Option<Waker>>,
}

impl Latch {
    fn settle(&self, succeeded: bool) {
        self.outcome.set(Some(succeeded));
        let waker = self.waker.borrow_mut().take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    async fn wait(&self) -> bool {
        std::future::poll_fn(|cx| match self.outcome.get() {
            Some(succeeded) => Poll::Ready(succeeded),
            None => {
                *self.waker.borrow_mut() = Some(cx.waker().clone());
                Poll::Pending
            }
        })
        .await
    }
}

/// Mock playlist service.
pub struct MockPlaylistSource {
    tracks: Vec<Track>,
    available: bool,
    fetch_count: AtomicU32,
}

impl MockPlaylistSource {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            available: true,
            fetch_count: AtomicU32::new(0),
        }
    }

    /// Every fetch fails with a network error.
    pub fn failing() -> Self {
        Self {
            available: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait(?Send)]
impl PlaylistSource for MockPlaylistSource {
    async fn fetch(&self, _product_id: &str) -> Result<Vec<Track>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(PlayerError::Network("Mock playlist service down".to_string()));
        }
        Ok(self.tracks.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerifyAnswer {
    Accept,
    Reject,
    Unreachable,
}

/// Mock credential service.
///
/// Issues nothing unless configured with [`MockAccessService::with_issued`].
pub struct MockAccessService {
    answer: VerifyAnswer,
    issued: Option<String>,
    verify_calls: AtomicU32,
    verified: Mutex<Vec<(String, String)>>,
    issued_emails: Mutex<Vec<String>>,
}

impl MockAccessService {
    fn with_answer(answer: VerifyAnswer) -> Self {
        Self {
            answer,
            issued: None,
            verify_calls: AtomicU32::new(0),
            verified: Mutex::new(Vec::new()),
            issued_emails: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::with_answer(VerifyAnswer::Accept)
    }

    pub fn rejecting() -> Self {
        Self::with_answer(VerifyAnswer::Reject)
    }

    pub fn unreachable() -> Self {
        Self::with_answer(VerifyAnswer::Unreachable)
    }

    /// Credential returned by `issue`.
    pub fn with_issued(mut self, credential: impl Into<String>) -> Self {
        self.issued = Some(credential.into());
        self
    }

    pub fn verify_calls(&self) -> u32 {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// `(credential, product_id)` pairs passed to `verify`.
    pub fn verified(&self) -> Vec<(String, String)> {
        self.verified.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn issued_emails(&self) -> Vec<String> {
        self.issued_emails.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait(?Send)]
impl AccessService for MockAccessService {
    async fn verify(&self, credential: &str, product_id: &str) -> Result<bool> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut v) = self.verified.lock() {
            v.push((credential.to_string(), product_id.to_string()));
        }
        match self.answer {
            VerifyAnswer::Accept => Ok(true),
            VerifyAnswer::Reject => Ok(false),
            VerifyAnswer::Unreachable => {
                Err(PlayerError::Network("Mock access service down".to_string()))
            }
        }
    }

    async fn issue(&self, email: &str, _product_id: &str) -> Result<Option<String>> {
        if let Ok(mut v) = self.issued_emails.lock() {
            v.push(email.to_string());
        }
        if self.answer == VerifyAnswer::Unreachable {
            return Err(PlayerError::Network("Mock access service down".to_string()));
        }
        Ok(self.issued.clone())
    }
}

/// Navigator that records reloads instead of performing them.
#[derive(Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<Url>>,
}

impl RecordingNavigator {
    pub fn visits(&self) -> Vec<Url> {
        self.visits.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl PageNavigator for RecordingNavigator {
    fn reload(&self, url: &Url) {
        if let Ok(mut v) = self.visits.lock() {
            v.push(url.clone());
        }
    }
}

/// Script loader that succeeds only for listed URLs.
pub struct MockScriptLoader {
    loadable: Vec<String>,
    requested: Mutex<Vec<String>>,
}

impl MockScriptLoader {
    pub fn succeeding(urls: &[&str]) -> Self {
        Self {
            loadable: urls.iter().map(|u| u.to_string()).collect(),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Loads every URL.
    pub fn permissive() -> Self {
        Self::succeeding(&["*"])
    }

    /// URLs in the order they were requested.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait(?Send)]
impl ScriptLoader for MockScriptLoader {
    async fn load(&self, url: &str) -> Result<()> {
        if let Ok(mut v) = self.requested.lock() {
            v.push(url.to_string());
        }
        if self.loadable.iter().any(|u| u == "*" || u == url) {
            Ok(())
        } else {
            Err(PlayerError::Platform(format!("Failed to load {}", url)))
        }
    }
}

/// Script loader whose loads stay pending until settled.
#[derive(Default)]
pub struct HeldScriptLoader {
    held: RefCell<Vec<(String, Rc<Latch>)>>,
}

impl HeldScriptLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// URLs in the order they were requested.
    pub fn requested(&self) -> Vec<String> {
        self.held.borrow().iter().map(|(url, _)| url.clone()).collect()
    }

    /// Complete the `n`th request.
    pub fn settle(&self, n: usize, succeeded: bool) {
        let latch = self.held.borrow().get(n).map(|(_, latch)| Rc::clone(latch));
        if let Some(latch) = latch {
            latch.settle(succeeded);
        }
    }
}

#[async_trait(?Send)]
impl ScriptLoader for HeldScriptLoader {
    async fn load(&self, url: &str) -> Result<()> {
        let latch = Rc::new(Latch::default());
        self.held
            .borrow_mut()
            .push((url.to_string(), Rc::clone(&latch)));
        if latch.wait().await {
            Ok(())
        } else {
            Err(PlayerError::Platform(format!("Failed to load {}", url)))
        }
    }
}

/// Camera that grants or denies the probe.
pub struct MockCaptureDevice {
    supported: bool,
    grant: bool,
    acquired: AtomicU32,
    released: std::sync::Arc<AtomicU32>,
}

impl MockCaptureDevice {
    pub fn granting() -> Self {
        Self {
            supported: true,
            grant: true,
            acquired: AtomicU32::new(0),
            released: std::sync::Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn denying() -> Self {
        Self {
            grant: false,
            ..Self::granting()
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::granting()
        }
    }

    pub fn acquired(&self) -> u32 {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u32 {
        self.released.load(Ordering::SeqCst)
    }
}

struct MockCaptureHandle {
    released: std::sync::Arc<AtomicU32>,
}

impl CaptureHandle for MockCaptureHandle {
    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait(?Send)]
impl CaptureDevice for MockCaptureDevice {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn acquire(&self) -> Result<Box<dyn CaptureHandle>> {
        if !self.grant {
            return Err(PlayerError::Platform("NotAllowedError".to_string()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockCaptureHandle {
            released: std::sync::Arc::clone(&self.released),
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MotionAnswer {
    Grant,
    Deny,
    Throw,
    Unsupported,
}

/// Motion permission API.
pub struct MockMotionApi {
    answer: MotionAnswer,
    requests: AtomicU32,
}

impl MockMotionApi {
    fn with_answer(answer: MotionAnswer) -> Self {
        Self {
            answer,
            requests: AtomicU32::new(0),
        }
    }

    pub fn granting() -> Self {
        Self::with_answer(MotionAnswer::Grant)
    }

    pub fn denying() -> Self {
        Self::with_answer(MotionAnswer::Deny)
    }

    pub fn throwing() -> Self {
        Self::with_answer(MotionAnswer::Throw)
    }

    pub fn unsupported() -> Self {
        Self::with_answer(MotionAnswer::Unsupported)
    }

    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait(?Send)]
impl MotionPermissionApi for MockMotionApi {
    fn is_supported(&self) -> bool {
        self.answer != MotionAnswer::Unsupported
    }

    async fn request(&self) -> Result<bool> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.answer {
            MotionAnswer::Grant | MotionAnswer::Unsupported => Ok(true),
            MotionAnswer::Deny => Ok(false),
            MotionAnswer::Throw => Err(PlayerError::Platform("SecurityError".to_string())),
        }
    }
}

/// Audio element.
pub struct MockAudio {
    accept: AtomicBool,
    hold: bool,
    held: RefCell<Vec<Rc<Latch>>>,
    sources: Mutex<Vec<String>>,
    play_calls: AtomicU32,
    pause_calls: AtomicU32,
}

impl MockAudio {
    pub fn accepting() -> Self {
        Self {
            accept: AtomicBool::new(true),
            hold: false,
            held: RefCell::new(Vec::new()),
            sources: Mutex::new(Vec::new()),
            play_calls: AtomicU32::new(0),
            pause_calls: AtomicU32::new(0),
        }
    }

    /// Every play is refused, as under a strict autoplay policy.
    pub fn rejecting() -> Self {
        let audio = Self::accepting();
        audio.accept.store(false, Ordering::SeqCst);
        audio
    }

    /// Every play stays pending until [`MockAudio::settle_play`], like a
    /// media element that is still buffering.
    pub fn holding() -> Self {
        Self {
            hold: true,
            ..Self::accepting()
        }
    }

    /// Resolve or reject the `n`th held play.
    pub fn settle_play(&self, n: usize, succeeded: bool) {
        let latch = self.held.borrow().get(n).map(Rc::clone);
        if let Some(latch) = latch {
            latch.settle(succeeded);
        }
    }

    pub fn set_accepting(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    pub fn sources(&self) -> Vec<String> {
        self.sources.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn play_calls(&self) -> u32 {
        self.play_calls.load(Ordering::SeqCst)
    }

    pub fn pause_calls(&self) -> u32 {
        self.pause_calls.load(Ordering::SeqCst)
    }
}

#[async_trait(?Send)]
impl AudioOutput for MockAudio {
    fn set_source(&self, url: &str) {
        if let Ok(mut v) = self.sources.lock() {
            v.push(url.to_string());
        }
    }

    async fn play(&self) -> Result<()> {
        self.play_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold {
            let latch = Rc::new(Latch::default());
            self.held.borrow_mut().push(Rc::clone(&latch));
            return if latch.wait().await {
                Ok(())
            } else {
                Err(PlayerError::PlayRejected("AbortError".to_string()))
            };
        }
        if self.accept.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PlayerError::PlayRejected("NotAllowedError".to_string()))
        }
    }

    fn pause(&self) {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Now-playing surface that records every update.
pub struct RecordingSurface {
    kind: SurfaceKind,
    titles: Mutex<Vec<String>>,
    artists: Mutex<Vec<String>>,
    covers: Mutex<Vec<String>>,
    revealed: AtomicBool,
}

impl RecordingSurface {
    pub fn new(kind: SurfaceKind) -> Self {
        Self {
            kind,
            titles: Mutex::new(Vec::new()),
            artists: Mutex::new(Vec::new()),
            covers: Mutex::new(Vec::new()),
            revealed: AtomicBool::new(false),
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn artists(&self) -> Vec<String> {
        self.artists.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn covers(&self) -> Vec<String> {
        self.covers.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn revealed(&self) -> bool {
        self.revealed.load(Ordering::SeqCst)
    }
}

impl NowPlayingSurface for RecordingSurface {
    fn kind(&self) -> SurfaceKind {
        self.kind
    }

    fn set_title(&self, title: &str) {
        if let Ok(mut v) = self.titles.lock() {
            v.push(title.to_string());
        }
    }

    fn set_artist(&self, artist: &str) {
        if let Ok(mut v) = self.artists.lock() {
            v.push(artist.to_string());
        }
    }

    fn set_cover(&self, cover_url: &str) {
        if let Ok(mut v) = self.covers.lock() {
            v.push(cover_url.to_string());
        }
    }

    fn reveal(&self) {
        self.revealed.store(true, Ordering::SeqCst);
    }
}

/// Beacon that records `(endpoint, body)` pairs.
pub struct RecordingBeacon {
    accept: bool,
    attempts: AtomicU32,
    sent: Mutex<Vec<(String, String)>>,
}

impl Default for RecordingBeacon {
    fn default() -> Self {
        Self {
            accept: true,
            attempts: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingBeacon {
    /// Refuses to queue anything.
    pub fn refusing() -> Self {
        Self {
            accept: false,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl BeaconSink for RecordingBeacon {
    fn send(&self, endpoint: &str, body: &str) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.accept {
            return false;
        }
        if let Ok(mut v) = self.sent.lock() {
            v.push((endpoint.to_string(), body.to_string()));
        }
        true
    }
}
