use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid conversation binding: {0}")]
    InvalidBinding(String),

    #[error("Failed to connect to {endpoint}: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    #[error("Live channel is not open")]
    ChannelNotOpen,

    #[error("Live channel closed")]
    ChannelClosed,

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChatError {
    /// Text shown to the user in an error notice.
    pub fn notice_text(&self) -> String {
        match self {
            ChatError::Http(err) if err.is_connect() || err.is_timeout() => {
                "Network error".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
