//! Session controller
//!
//! Orders the components for one page load:
//!
//! ```text
//! Initializing -> Gated                      (no or bad credential)
//!              -> Bootstrapping -> Ready     (engine + tracking loaded)
//!                               -> BootstrapFailed -> (retry) Bootstrapping
//! Ready --start--> PermissionBlocked         (camera denied, direct mode)
//!       --start--> Active
//! ```
//!
//! Long waits (access check, script loads, audio buffering) are handed out
//! as `'static` futures so a host holding the controller behind a `RefCell`
//! can release it while they run. Bootstrap progress lives in a shared
//! [`Bootstrapper`], and [`SessionController::phase`] reads it directly.
//!
//! The playlist prefetch runs beside all of this with no ordering
//! constraint; see [`SessionController::prefetch_task`].

use serde::Serialize;
use std::cell::{Ref, RefCell};
use std::future::Future;
use std::rc::Rc;
use tracing::{debug, info, warn};
use url::Url;

use crate::access::{AccessGate, AccessService, PageNavigator};
use crate::bootstrap::{drive, BootstrapPhase, Bootstrapper, ScriptLoader};
use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};
use crate::gesture::{GestureAction, GestureNavigator};
use crate::permissions::{CaptureDevice, MotionPermissionApi, PermissionOrchestrator};
use crate::playback::{
    AudioOutput, NowPlayingSurface, PendingPlay, PlaybackController, PlaybackCursor, Step,
};
use crate::playlist::{ensure_loaded, prefetch, PlaylistCell, PlaylistSource};
use crate::session::{AccessState, Session};
use crate::telemetry::{BeaconSink, NavAction, TelemetryEmitter};

/// Page-level phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Initializing,
    /// Showing the email form
    Gated,
    Bootstrapping,
    /// Every source of a category failed; retry is offered
    BootstrapFailed,
    /// Waiting for the start tap
    Ready,
    /// Camera denied in direct mode; start may be tapped again
    PermissionBlocked,
    Active,
}

impl SessionPhase {
    fn name(&self) -> &'static str {
        match self {
            SessionPhase::Initializing => "initializing",
            SessionPhase::Gated => "gated",
            SessionPhase::Bootstrapping => "bootstrapping",
            SessionPhase::BootstrapFailed => "bootstrap failed",
            SessionPhase::Ready => "ready",
            SessionPhase::PermissionBlocked => "permission blocked",
            SessionPhase::Active => "active",
        }
    }
}

/// Platform capabilities the controller drives
pub struct Platform {
    pub access: Rc<dyn AccessService>,
    pub playlist: Rc<dyn PlaylistSource>,
    pub scripts: Rc<dyn ScriptLoader>,
    pub navigator: Rc<dyn PageNavigator>,
    pub camera: Rc<dyn CaptureDevice>,
    pub motion: Rc<dyn MotionPermissionApi>,
    pub audio: Rc<dyn AudioOutput>,
    pub surfaces: Vec<Rc<dyn NowPlayingSurface>>,
    pub beacon: Rc<dyn BeaconSink>,
}

/// Outcome of the start tap
///
/// `prime` is the muted play/pause that unlocks audio on the first gesture;
/// await it after releasing the controller.
#[must_use]
pub struct Started {
    pub phase: SessionPhase,
    pub prime: Option<PendingPlay>,
}

/// Orders access, bootstrap, permissions, playback and gestures
pub struct SessionController {
    session: Session,
    phase: SessionPhase,
    access: Rc<dyn AccessService>,
    playlist_source: Rc<dyn PlaylistSource>,
    scripts: Rc<dyn ScriptLoader>,
    navigator: Rc<dyn PageNavigator>,
    camera: Rc<dyn CaptureDevice>,
    motion: Rc<dyn MotionPermissionApi>,
    playlist: PlaylistCell,
    prefetch_started: bool,
    bootstrapper: Rc<RefCell<Bootstrapper>>,
    permissions: PermissionOrchestrator,
    playback: PlaybackController,
    gesture: GestureNavigator,
    telemetry: TelemetryEmitter,
    started: bool,
}

impl SessionController {
    pub fn new(config: PlayerConfig, page_url: Url, platform: Platform) -> Self {
        let session = Session::from_page_url(page_url, &config.default_product_id);
        let telemetry = TelemetryEmitter::new(platform.beacon, config.telemetry_endpoint());

        Self {
            session,
            phase: SessionPhase::Initializing,
            access: platform.access,
            playlist_source: platform.playlist,
            scripts: platform.scripts,
            navigator: platform.navigator,
            camera: platform.camera,
            motion: platform.motion,
            playlist: PlaylistCell::new(),
            prefetch_started: false,
            bootstrapper: Rc::new(RefCell::new(Bootstrapper::new(config.bootstrap))),
            permissions: PermissionOrchestrator::new(config.camera_mode),
            playback: PlaybackController::new(platform.audio, platform.surfaces),
            gesture: GestureNavigator::new(config.gesture),
            telemetry,
            started: false,
        }
    }

    /// Current phase; bootstrap phases follow the shared bootstrapper
    pub fn phase(&self) -> SessionPhase {
        match self.phase {
            SessionPhase::Bootstrapping | SessionPhase::BootstrapFailed => {
                match self.bootstrapper.borrow().phase() {
                    BootstrapPhase::Ready => SessionPhase::Ready,
                    BootstrapPhase::Failed => SessionPhase::BootstrapFailed,
                    BootstrapPhase::Idle | BootstrapPhase::Loading => SessionPhase::Bootstrapping,
                }
            }
            phase => phase,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn bootstrapper(&self) -> Ref<'_, Bootstrapper> {
        self.bootstrapper.borrow()
    }

    pub fn permissions(&self) -> &PermissionOrchestrator {
        &self.permissions
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn cursor(&self) -> PlaybackCursor {
        self.playback.cursor()
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Text for the loading/status overlay
    pub fn status_message(&self) -> String {
        match self.phase() {
            SessionPhase::Initializing => "Checking access".to_string(),
            SessionPhase::Gated => "Enter your email to unlock the experience".to_string(),
            SessionPhase::Bootstrapping | SessionPhase::BootstrapFailed => {
                self.bootstrapper.borrow().status_message()
            }
            SessionPhase::Ready => "Tap start".to_string(),
            SessionPhase::PermissionBlocked => {
                "Camera access is needed for AR. Tap start to try again.".to_string()
            }
            SessionPhase::Active => match self.playback.current_track() {
                Some(track) => format!("{} - {}", track.title, track.artist),
                None => "No tracks available".to_string(),
            },
        }
    }

    /// Opportunistic playlist fetch, independent of the controller borrow
    ///
    /// Handed out once per page load; later calls return `None`. The
    /// returned future owns everything it needs, spawn it at page load.
    pub fn prefetch_task(&mut self) -> Option<impl Future<Output = ()> + 'static> {
        if self.prefetch_started {
            debug!("Playlist prefetch already started");
            return None;
        }
        self.prefetch_started = true;
        Some(prefetch(
            Rc::clone(&self.playlist_source),
            self.session.product_id().to_string(),
            self.playlist.clone(),
        ))
    }

    /// Credential check, detached from the controller
    ///
    /// Feed the result to [`SessionController::apply_access`].
    pub fn access_task(&self) -> impl Future<Output = AccessState> + 'static {
        let access = Rc::clone(&self.access);
        let mut session = self.session.clone();
        async move { AccessGate::new(access.as_ref()).resolve(&mut session).await }
    }

    /// Record the access result and, if granted, begin the bootstrap
    ///
    /// Returns the bootstrap run to await, or `None` when gated or when
    /// access was already applied.
    pub fn apply_access(
        &mut self,
        state: AccessState,
    ) -> Option<impl Future<Output = BootstrapPhase> + 'static> {
        if self.phase != SessionPhase::Initializing {
            return None;
        }
        self.session.set_access_state(state);

        if state != AccessState::Granted {
            info!(product_id = %self.session.product_id(), "Access gated");
            self.phase = SessionPhase::Gated;
            return None;
        }

        Some(self.begin_bootstrap())
    }

    /// Resolve access and, if granted, run the bootstrap
    ///
    /// Holds the controller throughout; hosts sharing it should use
    /// [`access_task`](Self::access_task) and
    /// [`apply_access`](Self::apply_access) instead.
    pub async fn initialize(&mut self) -> SessionPhase {
        if self.phase != SessionPhase::Initializing {
            return self.phase();
        }
        let state = self.access_task().await;
        if let Some(run) = self.apply_access(state) {
            run.await;
        }
        self.phase()
    }

    /// Exchange an email for a credential; the page reloads on success
    pub async fn submit_email(&self, email: &str) -> Result<Url> {
        self.require(&[SessionPhase::Gated])?;
        AccessGate::new(self.access.as_ref())
            .request_credential(&self.session, email, self.navigator.as_ref())
            .await
    }

    /// Restart the whole bootstrap
    ///
    /// Allowed while a run is still pending as well as after a failure. The
    /// older run's remaining reports are ignored.
    pub fn retry_bootstrap(&mut self) -> Result<impl Future<Output = BootstrapPhase> + 'static> {
        self.require(&[SessionPhase::Bootstrapping, SessionPhase::BootstrapFailed])?;
        Ok(self.begin_bootstrap())
    }

    fn begin_bootstrap(&mut self) -> impl Future<Output = BootstrapPhase> + 'static {
        self.phase = SessionPhase::Bootstrapping;
        let first = self.bootstrapper.borrow_mut().start();
        let run = drive(Rc::clone(&self.bootstrapper), Rc::clone(&self.scripts), first);
        async move {
            let phase = run.await;
            info!(?phase, "Bootstrap run ended");
            phase
        }
    }

    /// The start tap: permissions, playlist, first track
    ///
    /// Permission prompts and the playlist fetch are awaited here. The
    /// audio prime is returned in [`Started`] for the caller to await.
    pub async fn start(&mut self) -> Result<Started> {
        self.require(&[SessionPhase::Ready, SessionPhase::PermissionBlocked])?;

        self.permissions.reset();
        let camera = Rc::clone(&self.camera);
        self.permissions.request_camera(camera.as_ref()).await;
        if self.permissions.camera_blocks() {
            self.phase = SessionPhase::PermissionBlocked;
            return Ok(Started {
                phase: self.phase,
                prime: None,
            });
        }
        let motion = Rc::clone(&self.motion);
        self.permissions.request_motion(motion.as_ref()).await;

        let source = Rc::clone(&self.playlist_source);
        let playlist = ensure_loaded(source.as_ref(), self.session.product_id(), &self.playlist).await;
        self.playback.set_playlist(playlist);

        let prime = match self.playback.prime() {
            Ok(pending) => Some(pending),
            Err(e) => {
                warn!(error = %e, "Nothing to play");
                None
            }
        };

        self.started = true;
        self.phase = SessionPhase::Active;
        info!(
            tracks = self.playback.playlist().len(),
            gestures = self.permissions.motion_active(),
            "Playback started"
        );
        Ok(Started {
            phase: self.phase,
            prime,
        })
    }

    pub fn play(&mut self) -> Result<PendingPlay> {
        self.require(&[SessionPhase::Active])?;
        self.playback.play()
    }

    pub fn pause(&mut self) -> Result<()> {
        self.require(&[SessionPhase::Active])?;
        self.playback.pause();
        Ok(())
    }

    /// Advance; `None` for an empty playlist
    pub fn next(&mut self) -> Result<Option<Step>> {
        self.require(&[SessionPhase::Active])?;
        Ok(self.navigate(NavAction::Next))
    }

    /// Rewind; `None` for an empty playlist
    pub fn previous(&mut self) -> Result<Option<Step>> {
        self.require(&[SessionPhase::Active])?;
        Ok(self.navigate(NavAction::Prev))
    }

    /// Feed a device-orientation sample
    ///
    /// Ignored until playback has started and while motion is unusable.
    pub fn on_orientation(&mut self, gamma: Option<f64>) -> Option<(GestureAction, Step)> {
        if !self.started || !self.permissions.motion_active() {
            return None;
        }
        let action = self.gesture.on_sample(gamma)?;
        debug!(?action, "Gesture");
        let nav = match action {
            GestureAction::Next => NavAction::Next,
            GestureAction::Previous => NavAction::Prev,
        };
        let step = self.navigate(nav)?;
        Some((action, step))
    }

    fn navigate(&mut self, action: NavAction) -> Option<Step> {
        let step = match action {
            NavAction::Next => self.playback.next(),
            NavAction::Prev => self.playback.previous(),
        }?;
        self.telemetry.emit(action, step.index, self.session.product_id());
        Some(step)
    }

    fn require(&self, allowed: &[SessionPhase]) -> Result<()> {
        let phase = self.phase();
        if allowed.contains(&phase) {
            Ok(())
        } else {
            Err(PlayerError::InvalidPhase(phase.name()))
        }
    }
}
