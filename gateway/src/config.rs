//! Configuration for the gateway
//!
//! CLI arguments with environment variable fallbacks, loaded after `.env`.

use clap::{ArgAction, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;
use uuid::Uuid;

use player_core::DEFAULT_PRODUCT_ID;

/// Minimum credential secret length outside dev mode
pub const MIN_SECRET_LEN: usize = 32;

/// Player gateway - credentials, playlists and navigation telemetry
#[derive(Parser, Debug, Clone)]
#[command(name = "player-gateway")]
#[command(about = "Credential, playlist and telemetry gateway for the AR audio player")]
pub struct Args {
    /// Identifier of this gateway instance, stamped on usage records
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (built-in signing secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Secret for signing credentials (required in production)
    #[arg(long, env = "TOKEN_SECRET")]
    pub token_secret: Option<String>,

    /// Credential lifetime in seconds
    #[arg(long, env = "TOKEN_EXPIRY_SECONDS", default_value = "7200")]
    pub token_expiry_seconds: u64,

    /// Embed the product id in issued credentials and enforce it on verify
    #[arg(long, env = "BIND_PRODUCT", default_value = "true", action = ArgAction::Set)]
    pub bind_product: bool,

    /// TOML catalog replacing the built-in one
    #[arg(long, env = "CATALOG_PATH")]
    pub catalog_path: Option<PathBuf>,

    /// Product served for unknown or missing product ids
    #[arg(long, env = "DEFAULT_PRODUCT_ID", default_value = DEFAULT_PRODUCT_ID)]
    pub default_product_id: String,

    /// JSONL file for usage records (credential issues, navigation events)
    #[arg(long, env = "ANALYTICS_LOG_PATH")]
    pub analytics_log_path: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.token_secret {
                None => return Err("TOKEN_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < MIN_SECRET_LEN => {
                    return Err(format!(
                        "TOKEN_SECRET must be at least {} characters",
                        MIN_SECRET_LEN
                    ))
                }
                Some(_) => {}
            }
        }

        if self.token_expiry_seconds == 0 {
            return Err("TOKEN_EXPIRY_SECONDS must be greater than zero".to_string());
        }

        if self.default_product_id.trim().is_empty() {
            return Err("DEFAULT_PRODUCT_ID must not be empty".to_string());
        }

        Ok(())
    }
}
