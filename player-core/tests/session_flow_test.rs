//! End-to-end controller flows over mock platform collaborators

use std::rc::Rc;
use url::Url;

use player_core::mock::{
    MockAccessService, MockAudio, MockCaptureDevice, MockMotionApi, MockPlaylistSource,
    MockScriptLoader, RecordingBeacon, RecordingNavigator, RecordingSurface,
};
use player_core::{
    AccessState, AssetCategory, BootstrapPlan, GestureAction, NowPlayingSurface, Platform,
    PlayerConfig, SessionController, SessionPhase, SurfaceKind, Track, TransportState,
};

struct Page {
    access: Rc<MockAccessService>,
    scripts: Rc<MockScriptLoader>,
    navigator: Rc<RecordingNavigator>,
    audio: Rc<MockAudio>,
    overlay: Rc<RecordingSurface>,
    scene: Rc<RecordingSurface>,
    beacon: Rc<RecordingBeacon>,
}

impl Page {
    fn new(access: MockAccessService, scripts: MockScriptLoader) -> Self {
        Self {
            access: Rc::new(access),
            scripts: Rc::new(scripts),
            navigator: Rc::new(RecordingNavigator::default()),
            audio: Rc::new(MockAudio::accepting()),
            overlay: Rc::new(RecordingSurface::new(SurfaceKind::Overlay)),
            scene: Rc::new(RecordingSurface::new(SurfaceKind::ScenePanel)),
            beacon: Rc::new(RecordingBeacon::default()),
        }
    }

    fn load(&self, config: PlayerConfig, url: Url) -> SessionController {
        let platform = Platform {
            access: self.access.clone(),
            playlist: Rc::new(MockPlaylistSource::new(catalog())),
            scripts: self.scripts.clone(),
            navigator: self.navigator.clone(),
            camera: Rc::new(MockCaptureDevice::granting()),
            motion: Rc::new(MockMotionApi::granting()),
            audio: self.audio.clone(),
            surfaces: vec![
                self.overlay.clone() as Rc<dyn NowPlayingSurface>,
                self.scene.clone() as Rc<dyn NowPlayingSurface>,
            ],
            beacon: self.beacon.clone(),
        };
        SessionController::new(config, url, platform)
    }
}

async fn start(controller: &mut SessionController) -> SessionPhase {
    let started = controller.start().await.unwrap();
    if let Some(prime) = started.prime {
        prime.wait().await.unwrap();
    }
    started.phase
}

fn catalog() -> Vec<Track> {
    vec![
        Track::new("/audio/caliph-polygamy.mp3", "Polygamy", "Caliph", "/covers/polygamy.jpg"),
        Track::new("/audio/caliph-mariajulia.mp3", "Maria Julia", "Caliph", "/covers/mariajulia.jpg"),
        Track::new(
            "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-3.mp3",
            "Demo Track",
            "Caliph",
            "",
        ),
    ]
}

#[tokio::test]
async fn test_email_to_credential_to_bootstrap() {
    let page = Page::new(
        MockAccessService::accepting().with_issued("minted.jwt"),
        MockScriptLoader::permissive(),
    );

    // First load: tag URL without a credential.
    let tag = Url::parse("https://ar.example.com/ar?productId=HOODIE123").unwrap();
    let mut first = page.load(PlayerConfig::default(), tag);
    assert_eq!(first.initialize().await, SessionPhase::Gated);
    assert_eq!(page.access.verify_calls(), 0);
    assert!(page.scripts.requested().is_empty());

    let reload_url = first.submit_email("a@b.com").await.unwrap();
    assert_eq!(page.navigator.visits(), vec![reload_url.clone()]);
    assert_eq!(page.access.issued_emails(), vec!["a@b.com".to_string()]);

    // Second load: the reloaded page carries the credential.
    let mut second = page.load(PlayerConfig::default(), reload_url);
    assert_eq!(second.initialize().await, SessionPhase::Ready);
    assert_eq!(second.session().access_state(), AccessState::Granted);
    assert_eq!(
        page.access.verified(),
        vec![("minted.jwt".to_string(), "HOODIE123".to_string())]
    );
    assert_eq!(page.scripts.requested().len(), 2);
}

#[tokio::test]
async fn test_bootstrap_tries_sources_in_order() {
    let page = Page::new(
        MockAccessService::accepting(),
        MockScriptLoader::succeeding(&["engine-3", "tracking-1"]),
    );
    let config = PlayerConfig {
        bootstrap: BootstrapPlan {
            engine_sources: vec!["engine-1".into(), "engine-2".into(), "engine-3".into()],
            tracking_sources: vec!["tracking-1".into()],
            attempts_per_source: 1,
        },
        ..PlayerConfig::default()
    };
    let url = Url::parse("https://ar.example.com/ar?credential=good").unwrap();
    let mut controller = page.load(config, url);

    assert_eq!(controller.initialize().await, SessionPhase::Ready);
    assert_eq!(
        page.scripts.requested(),
        vec!["engine-1", "engine-2", "engine-3", "tracking-1"]
    );
    assert_eq!(
        controller
            .bootstrapper()
            .asset_state(AssetCategory::SceneEngine)
            .attempted_sources
            .len(),
        3
    );
}

#[tokio::test]
async fn test_sustained_tilt_advances_once() {
    let page = Page::new(MockAccessService::accepting(), MockScriptLoader::permissive());
    let url = Url::parse("https://ar.example.com/ar?sku=HOODIE123&tok=good").unwrap();
    let mut controller = page.load(PlayerConfig::default(), url);
    controller.initialize().await;
    start(&mut controller).await;

    let mut fired = Vec::new();
    for _ in 0..30 {
        if let Some((action, step)) = controller.on_orientation(Some(45.0)) {
            step.resume.wait().await.unwrap();
            fired.push(action);
        }
    }

    assert_eq!(fired, vec![GestureAction::Next]);
    assert_eq!(controller.cursor().index, 1);
    assert_eq!(controller.cursor().transport, TransportState::Playing);
    assert_eq!(page.beacon.sent().len(), 1);
    assert_eq!(page.overlay.titles(), vec!["Polygamy", "Maria Julia"]);
}

#[tokio::test]
async fn test_controls_cycle_through_playlist() {
    let page = Page::new(MockAccessService::accepting(), MockScriptLoader::permissive());
    let url = Url::parse("https://ar.example.com/ar?credential=good").unwrap();
    let mut controller = page.load(PlayerConfig::default(), url);
    controller.initialize().await;
    assert_eq!(start(&mut controller).await, SessionPhase::Active);

    for _ in 0..3 {
        let step = controller.next().unwrap().unwrap();
        step.resume.wait().await.unwrap();
    }
    assert_eq!(controller.cursor().index, 0);

    controller.pause().unwrap();
    assert_eq!(controller.cursor().transport, TransportState::Paused);
    controller.play().unwrap().wait().await.unwrap();
    assert_eq!(controller.cursor().transport, TransportState::Playing);

    // The demo track has no cover; the scene panel keeps the previous one.
    let step = controller.previous().unwrap().unwrap();
    assert_eq!(step.index, 2);
    step.resume.wait().await.unwrap();
    assert_eq!(page.scene.covers().last().map(String::as_str), Some("/covers/polygamy.jpg"));
    assert_eq!(page.overlay.covers().last().map(String::as_str), Some(""));
}
