//! Per-category load state machine
//!
//! `NotStarted -> Loading(source, attempt) -> Loaded | next attempt | next source | Failed`.
//! `Failed` is only reachable once every candidate source has been tried.

use serde::Serialize;

/// Category of external engine asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    /// 3D scene engine
    SceneEngine,
    /// AR tracking extension; needs the engine's globals
    TrackingExtension,
}

impl AssetCategory {
    /// Load order. The tracking extension always follows the engine.
    pub const ORDER: [AssetCategory; 2] =
        [AssetCategory::SceneEngine, AssetCategory::TrackingExtension];

    pub fn label(&self) -> &'static str {
        match self {
            AssetCategory::SceneEngine => "3D engine",
            AssetCategory::TrackingExtension => "AR tracking",
        }
    }
}

/// Load status of one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadStatus {
    NotStarted,
    Loading { source_index: usize, attempt: u32 },
    Loaded { source_index: usize },
    Failed,
}

impl LoadStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadStatus::Loaded { .. })
    }
}

/// Input to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadEvent {
    Begin,
    SourceLoaded,
    SourceFailed,
}

/// Pure transition function
///
/// Events that make no sense in the current status leave it unchanged.
pub fn transition(
    status: LoadStatus,
    event: LoadEvent,
    source_count: usize,
    attempts_per_source: u32,
) -> LoadStatus {
    let attempts_per_source = attempts_per_source.max(1);

    match (status, event) {
        (LoadStatus::NotStarted, LoadEvent::Begin) => {
            if source_count == 0 {
                LoadStatus::Failed
            } else {
                LoadStatus::Loading {
                    source_index: 0,
                    attempt: 1,
                }
            }
        }
        (LoadStatus::Loading { source_index, .. }, LoadEvent::SourceLoaded) => {
            LoadStatus::Loaded { source_index }
        }
        (
            LoadStatus::Loading {
                source_index,
                attempt,
            },
            LoadEvent::SourceFailed,
        ) => {
            if attempt < attempts_per_source {
                LoadStatus::Loading {
                    source_index,
                    attempt: attempt + 1,
                }
            } else if source_index + 1 < source_count {
                LoadStatus::Loading {
                    source_index: source_index + 1,
                    attempt: 1,
                }
            } else {
                LoadStatus::Failed
            }
        }
        (status, _) => status,
    }
}

/// Load state of one category as exposed to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetLoadState {
    pub category: AssetCategory,
    pub attempted_sources: Vec<String>,
    #[serde(flatten)]
    pub status: LoadStatus,
}

impl AssetLoadState {
    pub fn new(category: AssetCategory) -> Self {
        Self {
            category,
            attempted_sources: Vec::new(),
            status: LoadStatus::NotStarted,
        }
    }
}
