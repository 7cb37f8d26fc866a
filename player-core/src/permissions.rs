//! Camera and motion permissions
//!
//! Both requests must run inside the user's start tap. The outcome for each
//! capability is recorded once per start attempt in a [`PermissionLedger`];
//! only a fresh start resets it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Device capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Camera,
    Motion,
}

/// Recorded permission outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOutcome {
    #[default]
    Unrequested,
    Granted,
    Denied,
    /// The platform has no request API; treated as usable
    Unsupported,
}

impl PermissionOutcome {
    pub fn is_usable(&self) -> bool {
        matches!(self, PermissionOutcome::Granted | PermissionOutcome::Unsupported)
    }
}

/// Who owns the camera prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    /// Probe the camera here, then release it
    #[default]
    Direct,
    /// Leave the prompt to the tracking extension
    Delegated,
}

/// Write-once outcome per capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PermissionLedger {
    camera: PermissionOutcome,
    motion: PermissionOutcome,
}

impl PermissionLedger {
    pub fn get(&self, capability: Capability) -> PermissionOutcome {
        match capability {
            Capability::Camera => self.camera,
            Capability::Motion => self.motion,
        }
    }

    /// Record an outcome. Returns `false` if one was already recorded.
    pub fn record(&mut self, capability: Capability, outcome: PermissionOutcome) -> bool {
        let slot = match capability {
            Capability::Camera => &mut self.camera,
            Capability::Motion => &mut self.motion,
        };
        if *slot != PermissionOutcome::Unrequested {
            return false;
        }
        *slot = outcome;
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Platform motion permission (query, then request)
#[async_trait(?Send)]
pub trait MotionPermissionApi {
    /// Whether the platform exposes a permission request at all
    fn is_supported(&self) -> bool;

    /// `Ok(true)` if granted
    async fn request(&self) -> Result<bool>;
}

/// A live camera stream
pub trait CaptureHandle {
    /// Stop every track of the stream
    fn release(&mut self);
}

/// Platform media capture
#[async_trait(?Send)]
pub trait CaptureDevice {
    fn is_supported(&self) -> bool;

    /// Open the rear camera. Fails on denial.
    async fn acquire(&self) -> Result<Box<dyn CaptureHandle>>;
}

/// Scoped camera acquisition
///
/// Holds the handle only for the probe's lifetime and releases it on drop,
/// on every exit path.
pub struct CaptureProbe {
    handle: Option<Box<dyn CaptureHandle>>,
}

impl CaptureProbe {
    /// Trigger the camera prompt and report the outcome
    pub async fn run(device: &dyn CaptureDevice) -> PermissionOutcome {
        if !device.is_supported() {
            return PermissionOutcome::Unsupported;
        }
        match device.acquire().await {
            Ok(handle) => {
                let _probe = CaptureProbe {
                    handle: Some(handle),
                };
                PermissionOutcome::Granted
            }
            Err(e) => {
                warn!(error = %e, "Camera probe failed");
                PermissionOutcome::Denied
            }
        }
    }
}

impl Drop for CaptureProbe {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
            debug!("Camera probe released");
        }
    }
}

/// Requests camera and motion access within a start attempt
#[derive(Debug, Clone, Default)]
pub struct PermissionOrchestrator {
    mode: CameraMode,
    ledger: PermissionLedger,
}

impl PermissionOrchestrator {
    pub fn new(mode: CameraMode) -> Self {
        Self {
            mode,
            ledger: PermissionLedger::default(),
        }
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn ledger(&self) -> &PermissionLedger {
        &self.ledger
    }

    /// Forget outcomes from a previous start attempt
    pub fn reset(&mut self) {
        self.ledger.reset();
    }

    /// Request camera access
    ///
    /// Delegated mode records nothing and returns `Unrequested`.
    pub async fn request_camera(&mut self, device: &dyn CaptureDevice) -> PermissionOutcome {
        if self.mode == CameraMode::Delegated {
            debug!("Camera prompt delegated to tracking extension");
            return PermissionOutcome::Unrequested;
        }
        let recorded = self.ledger.get(Capability::Camera);
        if recorded != PermissionOutcome::Unrequested {
            return recorded;
        }

        let outcome = CaptureProbe::run(device).await;
        self.ledger.record(Capability::Camera, outcome);
        info!(?outcome, "Camera permission");
        outcome
    }

    /// Request motion-sensor access
    pub async fn request_motion(&mut self, api: &dyn MotionPermissionApi) -> PermissionOutcome {
        let recorded = self.ledger.get(Capability::Motion);
        if recorded != PermissionOutcome::Unrequested {
            return recorded;
        }

        let outcome = if !api.is_supported() {
            PermissionOutcome::Unsupported
        } else {
            match api.request().await {
                Ok(true) => PermissionOutcome::Granted,
                Ok(false) => PermissionOutcome::Denied,
                Err(e) => {
                    warn!(error = %e, "Motion permission request failed");
                    PermissionOutcome::Denied
                }
            }
        };
        self.ledger.record(Capability::Motion, outcome);
        info!(?outcome, "Motion permission");
        outcome
    }

    /// Camera denial in direct mode blocks playback
    pub fn camera_blocks(&self) -> bool {
        self.mode == CameraMode::Direct && self.ledger.camera == PermissionOutcome::Denied
    }

    /// Gesture navigation is available
    pub fn motion_active(&self) -> bool {
        self.ledger.motion.is_usable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCaptureDevice, MockMotionApi};

    #[test]
    fn test_ledger_is_write_once() {
        let mut ledger = PermissionLedger::default();
        assert!(ledger.record(Capability::Motion, PermissionOutcome::Denied));
        assert!(!ledger.record(Capability::Motion, PermissionOutcome::Granted));
        assert_eq!(ledger.get(Capability::Motion), PermissionOutcome::Denied);

        ledger.reset();
        assert_eq!(ledger.get(Capability::Motion), PermissionOutcome::Unrequested);
    }

    #[tokio::test]
    async fn test_probe_releases_handle_on_grant() {
        let device = MockCaptureDevice::granting();
        assert_eq!(CaptureProbe::run(&device).await, PermissionOutcome::Granted);
        assert_eq!(device.acquired(), 1);
        assert_eq!(device.released(), 1);
    }

    #[tokio::test]
    async fn test_direct_camera_denial_blocks() {
        let mut orchestrator = PermissionOrchestrator::new(CameraMode::Direct);
        let device = MockCaptureDevice::denying();

        assert_eq!(orchestrator.request_camera(&device).await, PermissionOutcome::Denied);
        assert!(orchestrator.camera_blocks());
        assert_eq!(device.released(), 0);
    }

    #[tokio::test]
    async fn test_delegated_camera_never_probes() {
        let mut orchestrator = PermissionOrchestrator::new(CameraMode::Delegated);
        let device = MockCaptureDevice::denying();

        assert_eq!(
            orchestrator.request_camera(&device).await,
            PermissionOutcome::Unrequested
        );
        assert_eq!(device.acquired(), 0);
        assert!(!orchestrator.camera_blocks());
    }

    #[tokio::test]
    async fn test_missing_motion_api_fails_open() {
        let mut orchestrator = PermissionOrchestrator::default();
        let api = MockMotionApi::unsupported();

        assert_eq!(
            orchestrator.request_motion(&api).await,
            PermissionOutcome::Unsupported
        );
        assert!(orchestrator.motion_active());
        assert_eq!(api.requests(), 0);
    }

    #[tokio::test]
    async fn test_motion_error_records_denied_once() {
        let mut orchestrator = PermissionOrchestrator::default();
        let api = MockMotionApi::throwing();

        assert_eq!(orchestrator.request_motion(&api).await, PermissionOutcome::Denied);
        assert_eq!(orchestrator.request_motion(&api).await, PermissionOutcome::Denied);
        assert_eq!(api.requests(), 1);
        assert!(!orchestrator.motion_active());
        assert!(!orchestrator.camera_blocks());
    }
}
