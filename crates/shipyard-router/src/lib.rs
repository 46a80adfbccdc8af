//! Shipyard routing registry — maps backend names to the addresses serving them.
//!
//! # Components
//!
//! - **`router`** — The `Router` trait, health payloads and alias validation
//! - **`memory`** — `MemoryRouter`, the lock-protected in-process registry
//! - **`names`** — Name-resolution record (app name → backend name)
//! - **`health`** — Optional health-reporting capability for routers

pub mod error;
pub mod health;
pub mod memory;
pub mod names;
pub mod router;

pub use error::{RouterError, RouterResult};
pub use health::{HealthChecker, HealthReporter};
pub use memory::{MemoryRouter, MemoryRouterConfig};
pub use names::{MemoryNames, NameRegistry};
pub use router::{HealthcheckData, Router, valid_cname};
