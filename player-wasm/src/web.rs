//! web-sys implementations of the player platform traits
//!
//! Missing DOM nodes are tolerated: a surface whose element is absent simply
//! shows nothing.

use async_trait::async_trait;
use js_sys::{Function, Object, Promise, Reflect};
use tracing::{debug, warn};
use url::Url;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Document, Element, HtmlAudioElement, HtmlElement, HtmlScriptElement, MediaDevices, MediaStream,
    MediaStreamTrack, Window,
};

use player_core::{
    AudioOutput, BeaconSink, CaptureDevice, CaptureHandle, MotionPermissionApi, NowPlayingSurface,
    PageNavigator, PlayerError, Result, ScriptLoader, SurfaceKind,
};

/// Element ids used by the page
pub mod ids {
    pub const AUDIO: &str = "player";
    pub const OVERLAY: &str = "np";
    pub const OVERLAY_COVER: &str = "npCover";
    pub const OVERLAY_TITLE: &str = "npTitle";
    pub const OVERLAY_ARTIST: &str = "npArtist";
    pub const SCENE_COVER: &str = "cover3d";
    pub const SCENE_TITLE: &str = "title3d";
    pub const SCENE_ARTIST: &str = "artist3d";
}

pub(crate) fn describe(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

fn platform(value: JsValue) -> PlayerError {
    PlayerError::Platform(describe(&value))
}

pub(crate) fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| PlayerError::Platform("No window".to_string()))
}

fn document() -> Result<Document> {
    window()?
        .document()
        .ok_or_else(|| PlayerError::Platform("No document".to_string()))
}

fn element(id: &str) -> Option<Element> {
    web_sys::window()?.document()?.get_element_by_id(id)
}

/// Current page URL
pub fn page_url() -> Result<Url> {
    let href = window()?.location().href().map_err(platform)?;
    Ok(Url::parse(&href)?)
}

/// Origin of the current page, e.g. `https://ar.example.com`
pub fn page_origin() -> Result<String> {
    window()?.location().origin().map_err(platform)
}

// ============================================================================
// Scripts
// ============================================================================

/// Injects a `<script>` tag and waits for its load or error event
pub struct ScriptTagLoader;

#[async_trait(?Send)]
impl ScriptLoader for ScriptTagLoader {
    async fn load(&self, url: &str) -> Result<()> {
        let document = document()?;
        let script: HtmlScriptElement = document
            .create_element("script")
            .map_err(platform)?
            .dyn_into()
            .map_err(|e| platform(e.into()))?;
        script.set_src(url);

        let settled = Promise::new(&mut |resolve, reject| {
            script.set_onload(Some(&resolve));
            script.set_onerror(Some(&reject));
        });

        let head = document
            .head()
            .ok_or_else(|| PlayerError::Platform("No document head".to_string()))?;
        head.append_child(&script).map_err(platform)?;

        JsFuture::from(settled)
            .await
            .map_err(|_| PlayerError::Platform(format!("Script failed to load: {}", url)))?;
        Ok(())
    }
}

// ============================================================================
// Audio
// ============================================================================

/// The page's audio element
pub struct AudioElement {
    element: HtmlAudioElement,
}

impl AudioElement {
    /// Use `#player` if the page has one, otherwise create a detached element
    pub fn attach() -> Result<Self> {
        let existing = element(ids::AUDIO).and_then(|e| e.dyn_into::<HtmlAudioElement>().ok());
        let element = match existing {
            Some(element) => element,
            None => {
                let element = HtmlAudioElement::new().map_err(platform)?;
                element.set_attribute("playsinline", "").map_err(platform)?;
                element
            }
        };
        Ok(Self { element })
    }
}

#[async_trait(?Send)]
impl AudioOutput for AudioElement {
    fn set_source(&self, url: &str) {
        self.element.set_src(url);
        self.element.load();
    }

    async fn play(&self) -> Result<()> {
        let rejected = |e: JsValue| PlayerError::PlayRejected(describe(&e));
        let promise = self.element.play().map_err(rejected)?;
        JsFuture::from(promise).await.map_err(rejected)?;
        Ok(())
    }

    fn pause(&self) {
        if let Err(e) = self.element.pause() {
            debug!(error = %describe(&e), "Pause failed");
        }
    }
}

// ============================================================================
// Now-playing surfaces
// ============================================================================

/// The flat overlay card, hidden until a track is bound
pub struct OverlaySurface;

impl NowPlayingSurface for OverlaySurface {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Overlay
    }

    fn set_title(&self, title: &str) {
        if let Some(node) = element(ids::OVERLAY_TITLE) {
            node.set_text_content(Some(title));
        }
    }

    fn set_artist(&self, artist: &str) {
        if let Some(node) = element(ids::OVERLAY_ARTIST) {
            node.set_text_content(Some(artist));
        }
    }

    fn set_cover(&self, cover_url: &str) {
        if let Some(node) = element(ids::OVERLAY_COVER) {
            let _ = node.set_attribute("src", cover_url);
        }
    }

    fn reveal(&self) {
        if let Some(card) = element(ids::OVERLAY).and_then(|e| e.dyn_into::<HtmlElement>().ok()) {
            let _ = card.style().set_property("display", "flex");
        }
    }
}

/// Image and text entities inside the scene
pub struct ScenePanelSurface;

impl ScenePanelSurface {
    /// Entity `setAttribute(component, property, value)`, which merges
    /// into the component instead of replacing it
    fn set_text(id: &str, value: &str) {
        let Some(node) = element(id) else {
            return;
        };
        let call = Reflect::get(&node, &JsValue::from_str("setAttribute"))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok());
        if let Some(set_attribute) = call {
            let _ = set_attribute.call3(
                &node,
                &JsValue::from_str("text"),
                &JsValue::from_str("value"),
                &JsValue::from_str(value),
            );
        }
    }
}

impl NowPlayingSurface for ScenePanelSurface {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::ScenePanel
    }

    fn set_title(&self, title: &str) {
        Self::set_text(ids::SCENE_TITLE, title);
    }

    fn set_artist(&self, artist: &str) {
        Self::set_text(ids::SCENE_ARTIST, artist);
    }

    fn set_cover(&self, cover_url: &str) {
        if let Some(node) = element(ids::SCENE_COVER) {
            let _ = node.set_attribute("src", cover_url);
        }
    }
}

// ============================================================================
// Permissions
// ============================================================================

/// `DeviceMotionEvent.requestPermission`, present on iOS Safari only
pub struct DeviceMotionPermission;

impl DeviceMotionPermission {
    fn request_permission() -> Option<(JsValue, Function)> {
        let constructor = Reflect::get(&js_sys::global(), &JsValue::from_str("DeviceMotionEvent")).ok()?;
        if constructor.is_undefined() {
            return None;
        }
        let request = Reflect::get(&constructor, &JsValue::from_str("requestPermission"))
            .ok()?
            .dyn_into::<Function>()
            .ok()?;
        Some((constructor, request))
    }
}

#[async_trait(?Send)]
impl MotionPermissionApi for DeviceMotionPermission {
    fn is_supported(&self) -> bool {
        Self::request_permission().is_some()
    }

    async fn request(&self) -> Result<bool> {
        let (constructor, request) = Self::request_permission()
            .ok_or_else(|| PlayerError::Platform("Motion permission API missing".to_string()))?;
        let promise: Promise = request
            .call0(&constructor)
            .map_err(platform)?
            .dyn_into()
            .map_err(platform)?;
        let answer = JsFuture::from(promise).await.map_err(platform)?;
        Ok(answer.as_string().as_deref() == Some("granted"))
    }
}

/// Rear camera probe through `getUserMedia`
pub struct UserMediaCamera;

impl UserMediaCamera {
    fn media_devices() -> Option<MediaDevices> {
        let devices = web_sys::window()?.navigator().media_devices().ok()?;
        let has_gum = Reflect::has(&devices, &JsValue::from_str("getUserMedia")).unwrap_or(false);
        has_gum.then_some(devices)
    }

    fn constraints() -> Result<Object> {
        let video = Object::new();
        Reflect::set(&video, &"facingMode".into(), &"environment".into()).map_err(platform)?;
        let constraints = Object::new();
        Reflect::set(&constraints, &"video".into(), &video).map_err(platform)?;
        Reflect::set(&constraints, &"audio".into(), &JsValue::FALSE).map_err(platform)?;
        Ok(constraints)
    }
}

#[async_trait(?Send)]
impl CaptureDevice for UserMediaCamera {
    fn is_supported(&self) -> bool {
        Self::media_devices().is_some()
    }

    async fn acquire(&self) -> Result<Box<dyn CaptureHandle>> {
        let devices = Self::media_devices()
            .ok_or_else(|| PlayerError::Platform("getUserMedia missing".to_string()))?;
        let constraints = Self::constraints()?;
        let promise = devices
            .get_user_media_with_constraints(constraints.unchecked_ref())
            .map_err(platform)?;
        let stream: MediaStream = JsFuture::from(promise)
            .await
            .map_err(platform)?
            .dyn_into()
            .map_err(platform)?;
        Ok(Box::new(StreamHandle {
            stream: Some(stream),
        }))
    }
}

/// Stops every track of the probe stream on release
struct StreamHandle {
    stream: Option<MediaStream>,
}

impl CaptureHandle for StreamHandle {
    fn release(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        for track in stream.get_tracks().iter() {
            if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
                track.stop();
            }
        }
    }
}

// ============================================================================
// Telemetry and navigation
// ============================================================================

/// `navigator.sendBeacon`
pub struct SendBeacon;

impl BeaconSink for SendBeacon {
    fn send(&self, endpoint: &str, body: &str) -> bool {
        let Some(window) = web_sys::window() else {
            return false;
        };
        window
            .navigator()
            .send_beacon_with_opt_str(endpoint, Some(body))
            .unwrap_or(false)
    }
}

/// Full page load through `location.href`
pub struct LocationNavigator;

impl PageNavigator for LocationNavigator {
    fn reload(&self, url: &Url) {
        match window() {
            Ok(window) => {
                if let Err(e) = window.location().set_href(url.as_str()) {
                    warn!(error = %describe(&e), "Reload failed");
                }
            }
            Err(e) => warn!(error = %e, "Reload failed"),
        }
    }
}
