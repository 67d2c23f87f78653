use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Malformed trigger: {0}")]
    MalformedTrigger(String),

    #[error("Failed to resolve secret {name}: {reason}")]
    SecretResolution { name: String, reason: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Upstream error from {context}: {message}")]
    Upstream { context: String, message: String },

    #[error("Failed to decode response from {context}: {message}")]
    Decode { context: String, message: String },

    #[error("Auction {auction_id} of item {item_id} is invalid: {reason}")]
    InvalidAuctionRecord {
        auction_id: i64,
        item_id: i64,
        reason: String,
    },

    #[error("Malformed connected realm reference: {0}")]
    MalformedReference(String),

    #[error("Unknown connected realm: {0}")]
    UnknownRealm(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invocation cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}
