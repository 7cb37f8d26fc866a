//! Tilt-to-skip gesture navigation
//!
//! A transition fires only when gamma has moved more than `delta_threshold`
//! degrees since the last reference AND is past `tilt_threshold` in either
//! direction. The reference moves on every large swing, so holding a tilt
//! fires once.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Gesture thresholds in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GestureConfig {
    pub delta_threshold: f64,
    pub tilt_threshold: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            delta_threshold: 50.0,
            tilt_threshold: 40.0,
        }
    }
}

/// Navigation decided by a gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAction {
    Next,
    Previous,
}

/// Turns orientation samples into navigation decisions
#[derive(Debug, Clone, Default)]
pub struct GestureNavigator {
    config: GestureConfig,
    last_tilt: Option<f64>,
}

impl GestureNavigator {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            last_tilt: None,
        }
    }

    pub fn last_tilt(&self) -> Option<f64> {
        self.last_tilt
    }

    /// Feed one sample. `None` or non-finite gamma is ignored.
    pub fn on_sample(&mut self, gamma: Option<f64>) -> Option<GestureAction> {
        let gamma = gamma.filter(|g| g.is_finite())?;

        let swung = match self.last_tilt {
            None => true,
            Some(last) => (gamma - last).abs() > self.config.delta_threshold,
        };
        if !swung {
            return None;
        }

        self.last_tilt = Some(gamma);
        let action = if gamma > self.config.tilt_threshold {
            Some(GestureAction::Next)
        } else if gamma < -self.config.tilt_threshold {
            Some(GestureAction::Previous)
        } else {
            None
        };
        trace!(gamma, ?action, "Tilt reference moved");
        action
    }
}
