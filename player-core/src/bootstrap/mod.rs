//! Asset bootstrapper
//!
//! Loads the scene engine and then the tracking extension, each from an
//! ordered list of candidate sources. [`Bootstrapper`] is a synchronous state
//! machine: it hands out [`LoadRequest`]s and consumes [`LoadReport`]s. The
//! async [`drive`] function runs it against a [`ScriptLoader`] through a
//! shared handle.
//!
//! ## Restart
//!
//! `start` may be called again at any time. It discards every
//! [`AssetLoadState`] and bumps the epoch; reports carrying an older epoch
//! are dropped, so a slow load from a previous attempt cannot advance the
//! new sequence.

mod state;

pub use state::{transition, AssetCategory, AssetLoadState, LoadEvent, LoadStatus};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Engine bundle and its mirror
pub const ENGINE_SOURCES: &[&str] = &[
    "https://cdn.jsdelivr.net/npm/aframe@1.5.0/dist/aframe.min.js",
    "https://unpkg.com/aframe@1.5.0/dist/aframe.min.js",
];

/// Tracking extension bundle and its mirror
pub const TRACKING_SOURCES: &[&str] = &[
    "https://libs.zappar.com/zappar-aframe/2.2.2/zappar-aframe.js",
    "https://cdn.jsdelivr.net/npm/@zappar/zappar-aframe@2.2.2/dist/zappar-aframe.js",
];

/// Candidate sources per category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BootstrapPlan {
    pub engine_sources: Vec<String>,
    pub tracking_sources: Vec<String>,
    /// Attempts per candidate before falling back to the next one
    pub attempts_per_source: u32,
}

impl Default for BootstrapPlan {
    fn default() -> Self {
        Self {
            engine_sources: ENGINE_SOURCES.iter().map(|s| s.to_string()).collect(),
            tracking_sources: TRACKING_SOURCES.iter().map(|s| s.to_string()).collect(),
            attempts_per_source: 1,
        }
    }
}

impl BootstrapPlan {
    pub fn sources(&self, category: AssetCategory) -> &[String] {
        match category {
            AssetCategory::SceneEngine => &self.engine_sources,
            AssetCategory::TrackingExtension => &self.tracking_sources,
        }
    }
}

/// Overall bootstrap phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapPhase {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Instruction to load one script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub epoch: u64,
    pub category: AssetCategory,
    pub source_index: usize,
    pub attempt: u32,
    pub url: String,
}

impl LoadRequest {
    /// Report for this request
    pub fn report(&self, succeeded: bool) -> LoadReport {
        LoadReport {
            epoch: self.epoch,
            category: self.category,
            source_index: self.source_index,
            attempt: self.attempt,
            succeeded,
        }
    }
}

/// Completion of a [`LoadRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub epoch: u64,
    pub category: AssetCategory,
    pub source_index: usize,
    pub attempt: u32,
    pub succeeded: bool,
}

/// Ordered two-category loader
#[derive(Debug, Clone)]
pub struct Bootstrapper {
    plan: BootstrapPlan,
    epoch: u64,
    current: usize,
    assets: Vec<AssetLoadState>,
    phase: BootstrapPhase,
}

impl Bootstrapper {
    pub fn new(plan: BootstrapPlan) -> Self {
        Self {
            plan,
            epoch: 0,
            current: 0,
            assets: fresh_states(),
            phase: BootstrapPhase::Idle,
        }
    }

    pub fn plan(&self) -> &BootstrapPlan {
        &self.plan
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> BootstrapPhase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == BootstrapPhase::Ready
    }

    pub fn asset_state(&self, category: AssetCategory) -> &AssetLoadState {
        &self.assets[category_slot(category)]
    }

    pub fn asset_states(&self) -> &[AssetLoadState] {
        &self.assets
    }

    /// Begin (or restart) the sequence from the first category
    pub fn start(&mut self) -> Option<LoadRequest> {
        self.epoch += 1;
        self.current = 0;
        self.assets = fresh_states();
        self.phase = BootstrapPhase::Loading;
        info!(epoch = self.epoch, "Starting asset bootstrap");
        self.begin_current()
    }

    /// Manual retry after a failure
    pub fn restart(&mut self) -> Option<LoadRequest> {
        self.start()
    }

    /// Consume a load report and return the next request, if any
    pub fn handle(&mut self, report: LoadReport) -> Option<LoadRequest> {
        if report.epoch != self.epoch {
            debug!(
                report_epoch = report.epoch,
                epoch = self.epoch,
                "Ignoring load report from a previous attempt"
            );
            return None;
        }
        if self.phase != BootstrapPhase::Loading {
            return None;
        }

        let category = AssetCategory::ORDER[self.current];
        let expected = LoadStatus::Loading {
            source_index: report.source_index,
            attempt: report.attempt,
        };
        if report.category != category || self.assets[self.current].status != expected {
            debug!(?report, "Ignoring load report that does not match the pending request");
            return None;
        }

        let event = if report.succeeded {
            LoadEvent::SourceLoaded
        } else {
            LoadEvent::SourceFailed
        };
        let status = self.advance(event);

        match status {
            LoadStatus::Loaded { source_index } => {
                info!(category = category.label(), source_index, "Asset loaded");
                self.current += 1;
                if self.current == AssetCategory::ORDER.len() {
                    self.phase = BootstrapPhase::Ready;
                    info!(epoch = self.epoch, "Asset bootstrap ready");
                    None
                } else {
                    self.begin_current()
                }
            }
            LoadStatus::Loading { .. } => {
                warn!(
                    category = category.label(),
                    source_index = report.source_index,
                    "Asset source failed, trying next"
                );
                self.pending_request()
            }
            LoadStatus::Failed => {
                self.phase = BootstrapPhase::Failed;
                warn!(category = category.label(), "All asset sources failed");
                None
            }
            LoadStatus::NotStarted => None,
        }
    }

    /// Human readable status for the loading overlay
    pub fn status_message(&self) -> String {
        match self.phase {
            BootstrapPhase::Idle => "Waiting for access".to_string(),
            BootstrapPhase::Ready => "AR ready. Tap start.".to_string(),
            BootstrapPhase::Loading => {
                let category = AssetCategory::ORDER[self.current.min(AssetCategory::ORDER.len() - 1)];
                let total = self.plan.sources(category).len();
                match self.asset_state(category).status {
                    LoadStatus::Loading {
                        source_index,
                        attempt,
                    } if attempt > 1 => format!(
                        "Loading {} (source {} of {}, attempt {})",
                        category.label(),
                        source_index + 1,
                        total,
                        attempt
                    ),
                    LoadStatus::Loading { source_index, .. } => format!(
                        "Loading {} (source {} of {})",
                        category.label(),
                        source_index + 1,
                        total
                    ),
                    _ => format!("Loading {}", category.label()),
                }
            }
            BootstrapPhase::Failed => {
                let category = self
                    .assets
                    .iter()
                    .find(|a| a.status == LoadStatus::Failed)
                    .map(|a| a.category)
                    .unwrap_or(AssetCategory::SceneEngine);
                format!(
                    "Could not load {} after {} sources. Tap retry.",
                    category.label(),
                    self.plan.sources(category).len()
                )
            }
        }
    }

    fn begin_current(&mut self) -> Option<LoadRequest> {
        match self.advance(LoadEvent::Begin) {
            LoadStatus::Failed => {
                let category = AssetCategory::ORDER[self.current];
                warn!(category = category.label(), "No sources configured");
                self.phase = BootstrapPhase::Failed;
                None
            }
            _ => self.pending_request(),
        }
    }

    fn advance(&mut self, event: LoadEvent) -> LoadStatus {
        let category = AssetCategory::ORDER[self.current];
        let count = self.plan.sources(category).len();
        let asset = &mut self.assets[self.current];
        asset.status = transition(asset.status, event, count, self.plan.attempts_per_source);
        asset.status
    }

    fn pending_request(&mut self) -> Option<LoadRequest> {
        let category = AssetCategory::ORDER[self.current];
        let (source_index, attempt) = match self.assets[self.current].status {
            LoadStatus::Loading {
                source_index,
                attempt,
            } => (source_index, attempt),
            _ => return None,
        };
        let url = self.plan.sources(category).get(source_index)?.clone();

        let asset = &mut self.assets[self.current];
        if attempt == 1 {
            asset.attempted_sources.push(url.clone());
        }

        debug!(category = category.label(), source_index, attempt, url = %url, "Requesting script");
        Some(LoadRequest {
            epoch: self.epoch,
            category,
            source_index,
            attempt,
            url,
        })
    }
}

fn fresh_states() -> Vec<AssetLoadState> {
    AssetCategory::ORDER
        .iter()
        .map(|c| AssetLoadState::new(*c))
        .collect()
}

fn category_slot(category: AssetCategory) -> usize {
    match category {
        AssetCategory::SceneEngine => 0,
        AssetCategory::TrackingExtension => 1,
    }
}

/// Loads one external script
///
/// Resolves on the platform's success signal and fails on its error signal.
/// No timeout is imposed here.
#[async_trait(?Send)]
pub trait ScriptLoader {
    async fn load(&self, url: &str) -> Result<()>;
}

/// Run loads starting from `first` until the bootstrapper stops asking
///
/// The bootstrapper is only borrowed between loads, never across one, so it
/// can be restarted while a load is pending. After a restart this run's
/// next report is stale, it is ignored and the run ends.
pub async fn drive(
    bootstrapper: Rc<RefCell<Bootstrapper>>,
    loader: Rc<dyn ScriptLoader>,
    first: Option<LoadRequest>,
) -> BootstrapPhase {
    let mut next = first;
    while let Some(request) = next {
        let outcome = loader.load(&request.url).await;
        if let Err(e) = &outcome {
            debug!(url = %request.url, error = %e, "Script load failed");
        }
        next = bootstrapper
            .borrow_mut()
            .handle(request.report(outcome.is_ok()));
    }
    let phase = bootstrapper.borrow().phase();
    phase
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockScriptLoader;

    async fn run(boot: &Rc<RefCell<Bootstrapper>>, loader: &Rc<MockScriptLoader>) -> BootstrapPhase {
        let first = boot.borrow_mut().start();
        drive(Rc::clone(boot), loader.clone(), first).await
    }

    fn plan(engine: &[&str], tracking: &[&str]) -> BootstrapPlan {
        BootstrapPlan {
            engine_sources: engine.iter().map(|s| s.to_string()).collect(),
            tracking_sources: tracking.iter().map(|s| s.to_string()).collect(),
            attempts_per_source: 1,
        }
    }

    #[tokio::test]
    async fn test_only_third_source_succeeds() {
        let loader = Rc::new(MockScriptLoader::succeeding(&["e3", "t1"]));
        let boot = Rc::new(RefCell::new(Bootstrapper::new(plan(&["e1", "e2", "e3"], &["t1"]))));

        assert_eq!(run(&boot, &loader).await, BootstrapPhase::Ready);
        assert_eq!(loader.requested(), vec!["e1", "e2", "e3", "t1"]);
        let boot = boot.borrow();
        assert_eq!(
            boot.asset_state(AssetCategory::SceneEngine).status,
            LoadStatus::Loaded { source_index: 2 }
        );
        assert_eq!(
            boot.asset_state(AssetCategory::SceneEngine).attempted_sources,
            vec!["e1", "e2", "e3"]
        );
    }

    #[tokio::test]
    async fn test_engine_failure_never_requests_tracking() {
        let loader = Rc::new(MockScriptLoader::succeeding(&["t1"]));
        let boot = Rc::new(RefCell::new(Bootstrapper::new(plan(&["e1", "e2"], &["t1"]))));

        assert_eq!(run(&boot, &loader).await, BootstrapPhase::Failed);
        assert_eq!(loader.requested(), vec!["e1", "e2"]);
        let boot = boot.borrow();
        assert_eq!(
            boot.asset_state(AssetCategory::TrackingExtension).status,
            LoadStatus::NotStarted
        );
        assert_eq!(
            boot.status_message(),
            "Could not load 3D engine after 2 sources. Tap retry."
        );
    }

    #[test]
    fn test_tracking_waits_for_engine_under_any_report_order() {
        let mut boot = Bootstrapper::new(plan(&["e1", "e2"], &["t1"]));
        let first = boot.start().unwrap();
        assert_eq!(first.category, AssetCategory::SceneEngine);

        // A forged tracking report while the engine is pending is ignored.
        let forged = LoadReport {
            epoch: first.epoch,
            category: AssetCategory::TrackingExtension,
            source_index: 0,
            attempt: 1,
            succeeded: true,
        };
        assert!(boot.handle(forged).is_none());
        assert_eq!(boot.phase(), BootstrapPhase::Loading);

        let second = boot.handle(first.report(false)).unwrap();
        assert_eq!(second.category, AssetCategory::SceneEngine);
        assert_eq!(boot.status_message(), "Loading 3D engine (source 2 of 2)");

        let tracking = boot.handle(second.report(true)).unwrap();
        assert_eq!(tracking.category, AssetCategory::TrackingExtension);
        assert!(boot.asset_state(AssetCategory::SceneEngine).status.is_loaded());

        assert!(boot.handle(tracking.report(true)).is_none());
        assert!(boot.is_ready());
    }

    #[test]
    fn test_restart_discards_state_and_ignores_stale_reports() {
        let mut boot = Bootstrapper::new(plan(&["e1"], &["t1"]));
        let stale = boot.start().unwrap();
        assert!(boot.handle(stale.report(false)).is_none());
        assert_eq!(boot.phase(), BootstrapPhase::Failed);

        let fresh = boot.restart().unwrap();
        assert_eq!(fresh.epoch, stale.epoch + 1);
        assert_eq!(
            boot.asset_state(AssetCategory::SceneEngine).attempted_sources,
            vec!["e1"]
        );

        // The old attempt finally succeeds; nothing moves.
        assert!(boot.handle(stale.report(true)).is_none());
        assert_eq!(
            boot.asset_state(AssetCategory::SceneEngine).status,
            LoadStatus::Loading { source_index: 0, attempt: 1 }
        );

        let tracking = boot.handle(fresh.report(true)).unwrap();
        assert_eq!(tracking.url, "t1");
    }

    #[test]
    fn test_empty_source_list_fails_immediately() {
        let mut boot = Bootstrapper::new(plan(&[], &["t1"]));
        assert!(boot.start().is_none());
        assert_eq!(boot.phase(), BootstrapPhase::Failed);
    }

    #[test]
    fn test_default_plan_has_mirrors() {
        let plan = BootstrapPlan::default();
        assert_eq!(plan.sources(AssetCategory::SceneEngine).len(), 2);
        assert_eq!(plan.sources(AssetCategory::TrackingExtension).len(), 2);
        assert!(plan.engine_sources[0].contains("aframe@1.5.0"));
    }
}
