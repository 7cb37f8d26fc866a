//! Navigation telemetry
//!
//! Fire and forget. Nothing here is awaited, retried, or allowed to fail
//! into the caller.

use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::debug;

/// Navigation direction as sent on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavAction {
    Next,
    Prev,
}

/// Body of `POST /analytics`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEvent {
    pub action: NavAction,
    pub index: usize,
    #[serde(alias = "sku")]
    pub product_id: String,
}

/// Non-blocking, best-effort transport that survives navigation
pub trait BeaconSink {
    /// Queue `body` for delivery. Returns `false` if it was not queued.
    fn send(&self, endpoint: &str, body: &str) -> bool;
}

/// Emits navigation events to a beacon sink
#[derive(Clone)]
pub struct TelemetryEmitter {
    sink: Rc<dyn BeaconSink>,
    endpoint: String,
}

impl TelemetryEmitter {
    pub fn new(sink: Rc<dyn BeaconSink>, endpoint: impl Into<String>) -> Self {
        Self {
            sink,
            endpoint: endpoint.into(),
        }
    }

    pub fn emit(&self, action: NavAction, index: usize, product_id: &str) {
        let event = NavigationEvent {
            action,
            index,
            product_id: product_id.to_string(),
        };
        let body = match serde_json::to_string(&event) {
            Ok(body) => body,
            Err(e) => {
                debug!(error = %e, "Dropping unserializable telemetry event");
                return;
            }
        };
        if !self.sink.send(&self.endpoint, &body) {
            debug!(endpoint = %self.endpoint, "Telemetry beacon not queued");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingBeacon;

    #[test]
    fn test_emits_wire_shape() {
        let beacon = Rc::new(RecordingBeacon::default());
        let emitter = TelemetryEmitter::new(beacon.clone(), "/analytics");

        emitter.emit(NavAction::Prev, 2, "HOODIE123");

        let sent = beacon.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "/analytics");
        let value: serde_json::Value = serde_json::from_str(&sent[0].1).unwrap();
        assert_eq!(value["action"], "prev");
        assert_eq!(value["index"], 2);
        assert_eq!(value["productId"], "HOODIE123");
    }

    #[test]
    fn test_failed_beacon_is_silent() {
        let beacon = Rc::new(RecordingBeacon::refusing());
        let emitter = TelemetryEmitter::new(beacon.clone(), "/analytics");
        emitter.emit(NavAction::Next, 0, "HOODIE123");
        assert_eq!(beacon.attempts(), 1);
    }

    #[test]
    fn test_accepts_legacy_sku_field() {
        let event: NavigationEvent =
            serde_json::from_str(r#"{"action":"next","index":1,"sku":"CAP9"}"#).unwrap();
        assert_eq!(event.product_id, "CAP9");
        assert_eq!(event.action, NavAction::Next);
    }
}
