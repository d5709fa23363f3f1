//! Error types for DashChat.

use thiserror::Error;

/// Core error type for all DashChat operations.
///
/// Tool failures are deliberately absent: they travel back to the model as
/// [`ToolResult`](crate::tool::ToolResult) values.
#[derive(Error, Debug)]
pub enum DashChatError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persist error: {0}")]
    Persist(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Max tool round trips reached ({0})")]
    MaxRoundTrips(usize),
}

impl DashChatError {
    /// Whether the failure came from talking to the model rather than from
    /// our own configuration or storage.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Provider(_) | Self::Network(_) | Self::MaxRoundTrips(_) | Self::Upstream(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DashChatError>;
