//! Player gateway - credential, playlist and telemetry service
//!
//! Serves the HTTP side of the AR audio player:
//!
//! - `GET /playlist?productId=` - ordered tracks, default catalog fallback
//! - `POST /credential` - exchange an email for a short-lived credential
//! - `GET /credential/verify` - `{ ok }`, never an error status
//! - `POST /analytics` - navigation events, recorded as usage lines
//! - `GET /health`, `/healthz`, `/version`
//!
//! Legacy aliases `/api/playlist`, `/api/token/mint`, `/api/token/verify`
//! and `/api/analytics` are kept for tags printed before the rename.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use types::{GatewayError, Result};
