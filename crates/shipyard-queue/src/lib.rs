//! shipyard-queue — asynchronous propagation of app changes.
//!
//! Writers publish small [`Message`]s naming an action and its arguments;
//! a worker consumes them and applies the action. Delivery is
//! at-least-once, so consumers must tolerate re-applying a message.
//!
//! # Components
//!
//! - **`message`** — Wire message and well-known action names
//! - **`transport`** — `Dialer`/`Publisher` seam and the in-process `MemoryBroker`
//! - **`tcp`** — Newline-delimited JSON over TCP, for a worker in another process
//! - **`enqueue`** — `Enqueuer`, the write-path adapter used by apps

pub mod enqueue;
pub mod error;
pub mod message;
pub mod tcp;
pub mod transport;

pub use enqueue::Enqueuer;
pub use error::{QueueError, QueueResult};
pub use message::{Message, REGENERATE_APPRC};
pub use tcp::{TcpDialer, listen};
pub use transport::{Dialer, MemoryBroker, Publisher, Subscription};
