//! HTTP collaborators backed by `reqwest`
//!
//! - [`GatewayClient`]: credential issuance/verification and playlist reads
//! - [`HttpBeacon`]: detached telemetry POST (native only)

mod http;

pub use http::GatewayClient;

#[cfg(not(target_arch = "wasm32"))]
pub use http::HttpBeacon;
