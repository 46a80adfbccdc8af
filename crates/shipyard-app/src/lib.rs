//! shipyard-app — the application aggregate.
//!
//! Owns an application's identity, environment, team ACL, units and log,
//! and drives its lifecycle:
//!
//! ```text
//! create_app ──► Pipeline [insert record → bucket → repository → backend]
//!                  │ (any failure rolls back the earlier steps)
//!                  ▼
//! App ──► set_envs / unset_envs ──► store ──► units (direct) or queue
//!     ──► restart ──► pre-restart hooks → restart → pos-restart hooks
//!     ──► destroy ──► bucket → unit → unbind services → backend → record
//! ```
//!
//! Infrastructure is reached through the collaborator traits in
//! [`collaborators`], bundled with the store, router and queue in a
//! [`Platform`].

pub mod app;
pub mod collaborators;
pub mod config;
pub mod create;
pub mod error;
pub mod hooks;
pub mod output;
pub mod platform;
pub mod worker;

pub use app::{App, AppView, User};
pub use collaborators::{
    BucketCredentials, Provisioner, RepositoryManager, ServiceUnbinder, StorageProvisioner,
    UnitExecutor,
};
pub use config::PlatformConfig;
pub use create::{create_app, destroy_app};
pub use error::{AppError, AppResult, UnbindFailures};
pub use hooks::HookConfig;
pub use platform::Platform;
pub use worker::{handle_message, run_worker};
