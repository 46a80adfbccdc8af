//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue server address is not configured")]
    NotConfigured,

    #[error("failed to connect to queue server {0}")]
    Connect(String),

    #[error("failed to listen on {0}")]
    Listen(String),

    #[error("failed to publish message: {0}")]
    Publish(String),

    #[error("failed to encode message: {0}")]
    Encode(String),

    #[error("failed to decode message: {0}")]
    Decode(String),
}

pub type QueueResult<T> = Result<T, QueueError>;
