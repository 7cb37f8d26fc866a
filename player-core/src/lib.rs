//! Player core - session controller for the tag-scanned AR audio player
//!
//! A visitor scans a tag, leaves an email for a short-lived credential, and
//! is taken through an ordered bootstrap before audio plays with a
//! synchronized now-playing overlay and tilt-to-skip navigation.
//!
//! # Components
//!
//! - [`access`]: credential verification and email exchange
//! - [`bootstrap`]: ordered engine/tracking script loading with fallbacks
//! - [`permissions`]: camera and motion permission requests
//! - [`playlist`] and [`playback`]: track list, cursor and audio transport
//! - [`gesture`]: device-orientation to next/previous
//! - [`telemetry`]: fire-and-forget navigation events
//! - [`controller`]: [`SessionController`], which orders all of the above
//!
//! Every platform capability (scripts, audio, camera, beacon, page reload)
//! is a trait, so the controller runs the same under wasm and in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use player_core::{PlayerConfig, SessionController, Platform};
//!
//! let mut controller = SessionController::new(PlayerConfig::default(), page_url, platform);
//! if let Some(prefetch) = controller.prefetch_task() {
//!     spawn_local(prefetch);
//! }
//! controller.initialize().await;
//! // ...on the start tap
//! let started = controller.start().await?;
//! if let Some(prime) = started.prime {
//!     prime.wait().await?;
//! }
//! ```

pub mod access;
pub mod bootstrap;
pub mod config;
pub mod controller;
pub mod error;
pub mod gesture;
pub mod mock;
pub mod permissions;
pub mod playback;
pub mod playlist;
pub mod session;
pub mod telemetry;

#[cfg(feature = "client")]
pub mod client;

pub use access::{AccessGate, AccessService, CredentialRequest, CredentialResponse, PageNavigator, VerifyResponse};
pub use bootstrap::{
    AssetCategory, AssetLoadState, BootstrapPhase, BootstrapPlan, Bootstrapper, LoadReport,
    LoadRequest, LoadStatus, ScriptLoader,
};
pub use config::PlayerConfig;
pub use controller::{Platform, SessionController, SessionPhase, Started};
pub use error::{PlayerError, Result};
pub use gesture::{GestureAction, GestureConfig, GestureNavigator};
pub use permissions::{
    CameraMode, Capability, CaptureDevice, CaptureHandle, MotionPermissionApi, PermissionLedger,
    PermissionOrchestrator, PermissionOutcome,
};
pub use playback::{
    AudioOutput, NowPlayingSurface, PendingPlay, PlaybackController, PlaybackCursor, Step,
    SurfaceKind, TransportState,
};
pub use playlist::{Playlist, PlaylistCell, PlaylistResponse, PlaylistSource, Track};
pub use session::{AccessState, Session, DEFAULT_PRODUCT_ID};
pub use telemetry::{BeaconSink, NavAction, NavigationEvent, TelemetryEmitter};

#[cfg(feature = "client")]
pub use client::GatewayClient;
