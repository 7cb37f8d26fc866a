//! Error types for the player session controller

use thiserror::Error;

/// Result type for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Player error types
///
/// None of these terminate the session. Every variant maps to an existing UI
/// state (gated, retry prompt, or unchanged playback) at the controller level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// Network error talking to a remote collaborator
    #[error("Network error: {0}")]
    Network(String),

    /// Remote collaborator answered with something we could not decode
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Email was empty after trimming
    #[error("An email address is required")]
    EmptyEmail,

    /// Credential service declined to issue a credential
    #[error("Credential request was refused")]
    CredentialRefused,

    /// Operation is not legal in the current session phase
    #[error("Not allowed while {0}")]
    InvalidPhase(&'static str),

    /// Playlist has no track at the cursor
    #[error("Playlist is empty")]
    EmptyPlaylist,

    /// The platform rejected a play request (autoplay policy, media error)
    #[error("Playback rejected: {0}")]
    PlayRejected(String),

    /// Platform capability failure (script load, permission API, DOM)
    #[error("Platform error: {0}")]
    Platform(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PlayerError {
    fn from(err: serde_json::Error) -> Self {
        PlayerError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for PlayerError {
    fn from(err: url::ParseError) -> Self {
        PlayerError::InvalidResponse(format!("URL parse error: {}", err))
    }
}

#[cfg(feature = "client")]
impl From<reqwest::Error> for PlayerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PlayerError::InvalidResponse(err.to_string())
        } else {
            PlayerError::Network(err.to_string())
        }
    }
}
