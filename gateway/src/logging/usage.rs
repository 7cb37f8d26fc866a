//! Usage records
//!
//! Written as JSONL when a log path is configured. Every record is also
//! emitted through `tracing`, so nothing is lost when no file is set.

use chrono::{DateTime, Utc};
use player_core::{NavAction, NavigationEvent};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Usage event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Credential issued for an email
    CredentialIssued,
    /// Track navigation reported by a player
    Navigation,
}

/// One usage record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    /// Gateway instance that recorded the event
    pub host_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    /// SHA-256 of the lowercased email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<NavAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl UsageEvent {
    pub fn new(event_type: EventType, host_id: String) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            host_id,
            product_id: None,
            email_fingerprint: None,
            action: None,
            index: None,
        }
    }

    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn with_email_fingerprint(mut self, fingerprint: String) -> Self {
        self.email_fingerprint = Some(fingerprint);
        self
    }

    pub fn with_navigation(mut self, action: NavAction, index: usize) -> Self {
        self.action = Some(action);
        self.index = Some(index);
        self
    }

    /// Convert to JSONL line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Usage logger that writes events to a JSONL file
#[derive(Clone)]
pub struct UsageLogger {
    inner: Arc<Mutex<UsageLoggerInner>>,
    host_id: String,
}

struct UsageLoggerInner {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl UsageLogger {
    pub fn new(host_id: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(UsageLoggerInner {
                writer: None,
                path: None,
            })),
            host_id,
        }
    }

    /// Initialize file logging to the specified path
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut inner = self.inner.lock().await;
        inner.writer = Some(BufWriter::new(file));
        inner.path = Some(path.clone());

        info!("Usage logging initialized to {}", path.display());
        Ok(())
    }

    pub async fn path(&self) -> Option<PathBuf> {
        self.inner.lock().await.path.clone()
    }

    /// Log a usage event
    pub async fn log(&self, event: UsageEvent) {
        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize usage event: {}", e);
                return;
            }
        };

        info!(target: "player_gateway::usage", event = %jsonl, "Usage");

        let mut inner = self.inner.lock().await;
        if let Some(ref mut writer) = inner.writer {
            if let Err(e) = writeln!(writer, "{}", jsonl) {
                error!("Failed to write usage event: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush usage log: {}", e);
            }
        }
    }

    /// Log an issued credential
    pub async fn log_credential_issued(&self, product_id: Option<&str>, email_fingerprint: String) {
        let mut event = UsageEvent::new(EventType::CredentialIssued, self.host_id.clone())
            .with_email_fingerprint(email_fingerprint);
        if let Some(product_id) = product_id {
            event = event.with_product(product_id);
        }
        self.log(event).await;
    }

    /// Log a navigation event reported by a player
    pub async fn log_navigation(&self, nav: &NavigationEvent) {
        let event = UsageEvent::new(EventType::Navigation, self.host_id.clone())
            .with_product(nav.product_id.clone())
            .with_navigation(nav.action, nav.index);
        self.log(event).await;
    }
}
