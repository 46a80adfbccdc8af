//! Message transport seam and the in-process broker.
//!
//! `MemoryBroker` keeps one unbounded tokio channel per address. A consumer
//! must `subscribe` before producers can `dial` the address, mirroring a
//! server that has to be listening before clients connect.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{QueueError, QueueResult};
use crate::message::Message;

/// A connected producer.
pub trait Publisher: Send + Sync {
    fn publish(&self, msg: &Message) -> QueueResult<()>;
}

/// Opens producer connections to a queue server.
pub trait Dialer: Send + Sync {
    fn dial(&self, address: &str) -> QueueResult<Box<dyn Publisher>>;
}

/// In-process transport keyed by address.
#[derive(Default)]
pub struct MemoryBroker {
    queues: Mutex<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start consuming the queue at `address`, replacing any earlier
    /// subscriber.
    pub fn subscribe(&self, address: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut queues = self.queues.lock().expect("broker lock");
        queues.insert(address.to_string(), tx);
        debug!(address, "queue subscriber registered");
        Subscription::new(rx)
    }
}

impl Dialer for MemoryBroker {
    fn dial(&self, address: &str) -> QueueResult<Box<dyn Publisher>> {
        let queues = self.queues.lock().expect("broker lock");
        let tx = queues
            .get(address)
            .filter(|tx| !tx.is_closed())
            .cloned()
            .ok_or_else(|| QueueError::Connect(address.to_string()))?;
        Ok(Box::new(ChannelPublisher { tx }))
    }
}

struct ChannelPublisher {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Publisher for ChannelPublisher {
    fn publish(&self, msg: &Message) -> QueueResult<()> {
        let bytes = msg.encode()?;
        self.tx
            .send(bytes)
            .map_err(|_| QueueError::Publish("subscriber went away".to_string()))
    }
}

/// Consumer end of a queue, fed by a [`MemoryBroker`] or a TCP listener.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Subscription {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self { rx }
    }

    /// Wait for the next decodable message. Returns `None` once every
    /// producer is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        while let Some(bytes) = self.rx.recv().await {
            match Message::decode(&bytes) {
                Ok(msg) => return Some(msg),
                Err(e) => warn!(error = %e, "dropping undecodable message"),
            }
        }
        None
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<Message> {
        while let Ok(bytes) = self.rx.try_recv() {
            match Message::decode(&bytes) {
                Ok(msg) => return Some(msg),
                Err(e) => warn!(error = %e, "dropping undecodable message"),
            }
        }
        None
    }
}
