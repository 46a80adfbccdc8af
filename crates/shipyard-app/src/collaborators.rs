//! External collaborators the aggregate delegates infrastructure work to.
//!
//! None of these are implemented here. Failures are returned as
//! `anyhow::Error` and wrapped into [`crate::AppError::Collaborator`] with
//! context by the caller.

use std::io::Write;

use shipyard_state::{AppRecord, ServiceInstance, Unit};

/// Creates and destroys compute units.
pub trait Provisioner: Send + Sync {
    fn provision(&self, app: &AppRecord) -> anyhow::Result<()>;

    fn destroy(&self, app: &AppRecord) -> anyhow::Result<()>;

    /// Destroy one unit, returning the provisioner's output.
    fn destroy_unit(&self, app: &AppRecord, unit: &Unit) -> anyhow::Result<String>;
}

/// Credentials for an app's object storage bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketCredentials {
    pub bucket: String,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
}

/// Provisions auxiliary storage (bucket plus access credentials).
pub trait StorageProvisioner: Send + Sync {
    fn create_bucket(&self, app: &str) -> anyhow::Result<BucketCredentials>;

    fn destroy_bucket(&self, app: &str) -> anyhow::Result<()>;
}

/// Source repositories for app deploys.
pub trait RepositoryManager: Send + Sync {
    fn create(&self, app: &str, teams: &[String]) -> anyhow::Result<()>;

    fn remove(&self, app: &str) -> anyhow::Result<()>;
}

/// Runs commands on units. Calls block until the unit answers; timeouts
/// surface as ordinary errors.
pub trait UnitExecutor: Send + Sync {
    fn run_command(&self, unit: &Unit, out: &mut dyn Write, command: &str) -> anyhow::Result<()>;

    /// Run a platform-defined hook such as `restart` or `dependencies`.
    fn execute_hook(&self, unit: &Unit, hook: &str, out: &mut dyn Write) -> anyhow::Result<()>;
}

/// Detaches a service instance from an app.
pub trait ServiceUnbinder: Send + Sync {
    fn unbind(&self, instance: &ServiceInstance, app: &AppRecord) -> anyhow::Result<()>;
}
