//! Logging infrastructure for the gateway
//!
//! Usage records are JSONL lines, one per credential issue or navigation
//! event, alongside the regular `tracing` output.

pub mod usage;

pub use usage::{EventType, UsageEvent, UsageLogger};
