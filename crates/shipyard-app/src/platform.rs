//! The environment every aggregate operation runs in.

use std::sync::Arc;

use shipyard_queue::Enqueuer;
use shipyard_router::Router;
use shipyard_state::StateStore;

use crate::collaborators::*;
use crate::config::PlatformConfig;

/// Store, router, queue and external collaborators, shared by reference.
///
/// `Platform` is `Send + Sync`; concurrent operations on different apps
/// may share one instance. Serializing writes to the same app is the
/// caller's job.
pub struct Platform {
    pub config: PlatformConfig,
    pub store: StateStore,
    pub router: Arc<dyn Router>,
    pub enqueuer: Enqueuer,
    pub provisioner: Arc<dyn Provisioner>,
    pub storage: Arc<dyn StorageProvisioner>,
    pub repository: Arc<dyn RepositoryManager>,
    pub executor: Arc<dyn UnitExecutor>,
    pub unbinder: Arc<dyn ServiceUnbinder>,
}
