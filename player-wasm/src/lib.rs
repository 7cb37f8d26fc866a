//! Player WASM - browser binding for the AR audio player
//!
//! Wires the `player-core` session controller to the page: script tags for
//! the 3D engine and tracking extension, the audio element, the now-playing
//! overlay and scene panel, the iOS motion permission, a camera probe,
//! `sendBeacon` telemetry and `deviceorientation` gestures.
//!
//! ## Usage in JavaScript
//!
//! ```javascript
//! import init, { ArPlayer } from 'player-wasm';
//!
//! await init();
//!
//! const player = new ArPlayer(JSON.stringify({ cameraMode: 'direct' }));
//! const phase = await player.initialize();   // "gated" | "ready" | "bootstrap_failed"
//!
//! emailForm.onsubmit = () => player.submitEmail(emailInput.value);
//! retryButton.onclick = () => player.retryBootstrap();
//! startButton.onclick = () => player.start();  // must run inside the tap
//! ```
//!
//! Only the start tap keeps the session busy while it awaits (permission
//! prompts and the playlist). Calls that arrive then reject with `"busy"`
//! and orientation samples are dropped. Script loads and audio buffering
//! run detached, so pause or retry stay available while they are pending.
//!
//! ## Build
//!
//! ```bash
//! wasm-pack build --target web --out-dir pkg
//! ```

pub mod logging;
pub mod web;

use js_sys::Promise;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::DeviceOrientationEvent;

use player_core::{
    GatewayClient, NowPlayingSurface, PendingPlay, Platform, PlayerConfig, PlayerError,
    SessionController, SessionPhase, Step,
};

use crate::web::{
    AudioElement, DeviceMotionPermission, LocationNavigator, OverlaySurface, ScenePanelSurface,
    ScriptTagLoader, SendBeacon, UserMediaCamera,
};

#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

fn to_js(err: PlayerError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn busy() -> JsValue {
    JsValue::from_str("busy")
}

fn phase_value(phase: SessionPhase) -> JsValue {
    match serde_json::to_value(phase) {
        Ok(serde_json::Value::String(name)) => JsValue::from_str(&name),
        _ => JsValue::UNDEFINED,
    }
}

/// Track index of a step, resuming in the background
fn step_value(step: Option<Step>) -> JsValue {
    match step {
        Some(step) => {
            spawn_local(settle(step.resume));
            JsValue::from(step.index as u32)
        }
        None => JsValue::NULL,
    }
}

async fn settle(pending: PendingPlay) {
    if let Err(e) = pending.wait().await {
        debug!(error = %e, "Playback did not resume");
    }
}

/// Build the controller for the current page
fn build_controller(mut config: PlayerConfig) -> player_core::Result<SessionController> {
    if config.api_base.is_empty() {
        config.api_base = web::page_origin()?;
    }
    let page_url = web::page_url()?;
    let gateway = Rc::new(GatewayClient::new(config.api_base.clone()));

    let platform = Platform {
        access: gateway.clone(),
        playlist: gateway,
        scripts: Rc::new(ScriptTagLoader),
        navigator: Rc::new(LocationNavigator),
        camera: Rc::new(UserMediaCamera),
        motion: Rc::new(DeviceMotionPermission),
        audio: Rc::new(AudioElement::attach()?),
        surfaces: vec![
            Rc::new(OverlaySurface) as Rc<dyn NowPlayingSurface>,
            Rc::new(ScenePanelSurface),
        ],
        beacon: Rc::new(SendBeacon),
    };
    Ok(SessionController::new(config, page_url, platform))
}

/// Handle to one page's player session
#[wasm_bindgen]
pub struct ArPlayer {
    controller: Rc<RefCell<SessionController>>,
    orientation: Option<Closure<dyn FnMut(DeviceOrientationEvent)>>,
}

#[wasm_bindgen]
impl ArPlayer {
    /// Create a player from a JSON config; every field is optional
    ///
    /// Besides the controller fields, `logLevel` sets the console filter.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<ArPlayer, JsValue> {
        #[cfg(feature = "console_error_panic_hook")]
        set_panic_hook();

        let json = config_json.unwrap_or_else(|| "{}".to_string());
        let log_level = serde_json::from_str::<serde_json::Value>(&json)
            .ok()
            .and_then(|v| v.get("logLevel").and_then(|l| l.as_str()).map(str::to_string))
            .unwrap_or_else(|| "info".to_string());
        logging::init(&log_level);

        let config = PlayerConfig::from_json(&json).map_err(to_js)?;
        let controller = build_controller(config).map_err(to_js)?;
        info!(product_id = %controller.session().product_id(), "Player created");

        Ok(ArPlayer {
            controller: Rc::new(RefCell::new(controller)),
            orientation: None,
        })
    }

    /// Start the playlist prefetch, attach gestures and resolve access
    ///
    /// Resolves to the phase reached. Calling it again resolves to the
    /// current phase without repeating any of the work.
    pub fn initialize(&mut self) -> Result<Promise, JsValue> {
        let controller = Rc::clone(&self.controller);
        if self.orientation.is_some() {
            let phase = controller.try_borrow().map_err(|_| busy())?.phase();
            return Ok(Promise::resolve(&phase_value(phase)));
        }

        let access = {
            let mut c = controller.try_borrow_mut().map_err(|_| busy())?;
            if let Some(prefetch) = c.prefetch_task() {
                spawn_local(prefetch);
            }
            c.access_task()
        };

        self.attach_orientation()?;

        Ok(future_to_promise(async move {
            let state = access.await;
            let run = controller
                .try_borrow_mut()
                .map_err(|_| busy())?
                .apply_access(state);
            if let Some(run) = run {
                run.await;
            }
            let phase = controller.try_borrow().map_err(|_| busy())?.phase();
            Ok(phase_value(phase))
        }))
    }

    /// Request a credential; on success the page reloads
    #[wasm_bindgen(js_name = submitEmail)]
    pub fn submit_email(&self, email: String) -> Promise {
        let controller = Rc::clone(&self.controller);
        future_to_promise(async move {
            let c = controller.try_borrow().map_err(|_| busy())?;
            let url = c.submit_email(&email).await.map_err(to_js)?;
            Ok(JsValue::from_str(url.as_str()))
        })
    }

    /// Restart the bootstrap, including while a previous run is pending
    #[wasm_bindgen(js_name = retryBootstrap)]
    pub fn retry_bootstrap(&self) -> Result<Promise, JsValue> {
        let run = self
            .controller
            .try_borrow_mut()
            .map_err(|_| busy())?
            .retry_bootstrap()
            .map_err(to_js)?;
        let controller = Rc::clone(&self.controller);
        Ok(future_to_promise(async move {
            run.await;
            let phase = controller.try_borrow().map_err(|_| busy())?.phase();
            Ok(phase_value(phase))
        }))
    }

    /// The start tap. Call it synchronously from the click handler.
    pub fn start(&self) -> Promise {
        let controller = Rc::clone(&self.controller);
        future_to_promise(async move {
            let started = {
                let mut c = controller.try_borrow_mut().map_err(|_| busy())?;
                c.start().await.map_err(to_js)?
            };
            if let Some(prime) = started.prime {
                settle(prime).await;
            }
            Ok(phase_value(started.phase))
        })
    }

    pub fn play(&self) -> Result<Promise, JsValue> {
        let pending = self
            .controller
            .try_borrow_mut()
            .map_err(|_| busy())?
            .play()
            .map_err(to_js)?;
        Ok(future_to_promise(async move {
            pending.wait().await.map_err(to_js)?;
            Ok(JsValue::UNDEFINED)
        }))
    }

    pub fn pause(&self) -> Result<(), JsValue> {
        let mut c = self.controller.try_borrow_mut().map_err(|_| busy())?;
        c.pause().map_err(to_js)
    }

    /// The new track index, or null for an empty playlist
    pub fn next(&self) -> Result<JsValue, JsValue> {
        let mut c = self.controller.try_borrow_mut().map_err(|_| busy())?;
        Ok(step_value(c.next().map_err(to_js)?))
    }

    pub fn previous(&self) -> Result<JsValue, JsValue> {
        let mut c = self.controller.try_borrow_mut().map_err(|_| busy())?;
        Ok(step_value(c.previous().map_err(to_js)?))
    }

    /// Current phase, or `"busy"` while the start tap is running
    #[wasm_bindgen(getter)]
    pub fn phase(&self) -> JsValue {
        match self.controller.try_borrow() {
            Ok(c) => phase_value(c.phase()),
            Err(_) => busy(),
        }
    }

    #[wasm_bindgen(getter, js_name = statusMessage)]
    pub fn status_message(&self) -> Option<String> {
        self.controller.try_borrow().ok().map(|c| c.status_message())
    }

    /// `{ index, transport }` as JSON
    #[wasm_bindgen(getter)]
    pub fn cursor(&self) -> Option<String> {
        let c = self.controller.try_borrow().ok()?;
        serde_json::to_string(&c.cursor()).ok()
    }
}

impl ArPlayer {
    fn attach_orientation(&mut self) -> Result<(), JsValue> {
        if self.orientation.is_some() {
            return Ok(());
        }
        let controller = Rc::clone(&self.controller);
        let listener = Closure::<dyn FnMut(DeviceOrientationEvent)>::new(
            move |event: DeviceOrientationEvent| {
                let Ok(mut c) = controller.try_borrow_mut() else {
                    debug!("Orientation sample dropped while busy");
                    return;
                };
                if let Some((_, step)) = c.on_orientation(event.gamma()) {
                    spawn_local(settle(step.resume));
                }
            },
        );
        web::window()
            .map_err(to_js)?
            .add_event_listener_with_callback("deviceorientation", listener.as_ref().unchecked_ref())?;
        self.orientation = Some(listener);
        Ok(())
    }
}

impl Drop for ArPlayer {
    fn drop(&mut self) {
        if let (Some(listener), Some(window)) = (self.orientation.take(), web_sys::window()) {
            let _ = window.remove_event_listener_with_callback(
                "deviceorientation",
                listener.as_ref().unchecked_ref(),
            );
        }
    }
}
