//! Queue messages.

use serde::{Deserialize, Serialize};

use crate::error::{QueueError, QueueResult};

/// Rewrite the environment file on every unit of the app named in `args[0]`.
pub const REGENERATE_APPRC: &str = "regenerate-apprc";

/// A unit of work sent through the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub action: String,
    pub args: Vec<String>,
}

impl Message {
    pub fn new(action: &str, args: Vec<String>) -> Self {
        Self {
            action: action.to_string(),
            args,
        }
    }

    pub fn regenerate_apprc(app: &str) -> Self {
        Self::new(REGENERATE_APPRC, vec![app.to_string()])
    }

    pub fn encode(&self) -> QueueResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| QueueError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> QueueResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| QueueError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regenerate_message_carries_app_name() {
        let msg = Message::regenerate_apprc("myapp");
        assert_eq!(msg.action, "regenerate-apprc");
        assert_eq!(msg.args, vec!["myapp"]);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            Message::decode(b"not json"),
            Err(QueueError::Decode(_))
        ));
    }
}
