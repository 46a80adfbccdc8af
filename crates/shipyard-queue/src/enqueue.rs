//! Write-path adapter: turns app changes into queued work.

use std::sync::Arc;

use tracing::info;

use crate::error::{QueueError, QueueResult};
use crate::message::Message;
use crate::transport::Dialer;

/// Publishes propagation requests to the configured queue server.
#[derive(Clone)]
pub struct Enqueuer {
    dialer: Arc<dyn Dialer>,
    server: Option<String>,
}

impl Enqueuer {
    pub fn new(dialer: Arc<dyn Dialer>, server: Option<String>) -> Self {
        Self { dialer, server }
    }

    /// Ask a worker to rewrite the environment on the app's units.
    ///
    /// Success means the message was handed to the transport, not that it
    /// was applied.
    pub fn enqueue_env_regeneration(&self, app: &str) -> QueueResult<()> {
        let server = self.server.as_deref().ok_or(QueueError::NotConfigured)?;
        let publisher = self.dialer.dial(server)?;
        publisher.publish(&Message::regenerate_apprc(app))?;
        info!(app, server, "env regeneration enqueued");
        Ok(())
    }
}
