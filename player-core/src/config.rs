//! Player configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};

use crate::bootstrap::BootstrapPlan;
use crate::gesture::GestureConfig;
use crate::permissions::CameraMode;
use crate::session::DEFAULT_PRODUCT_ID;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    /// Base URL of the gateway. Empty means same origin as the page.
    pub api_base: String,
    pub default_product_id: String,
    pub camera_mode: CameraMode,
    pub bootstrap: BootstrapPlan,
    pub gesture: GestureConfig,
    /// Path of the telemetry endpoint, relative to `api_base`
    pub telemetry_path: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            default_product_id: DEFAULT_PRODUCT_ID.to_string(),
            camera_mode: CameraMode::Direct,
            bootstrap: BootstrapPlan::default(),
            gesture: GestureConfig::default(),
            telemetry_path: "/analytics".to_string(),
        }
    }
}

impl PlayerConfig {
    /// Parse from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// `api_base` joined with `path`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), path)
    }

    pub fn telemetry_endpoint(&self) -> String {
        self.endpoint(&self.telemetry_path)
    }
}
