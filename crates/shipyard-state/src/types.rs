//! Domain types for the Shipyard state store.
//!
//! These types are the persisted shape of applications and service
//! instances. All of them serialize to JSON for storage in redb tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unique application name (also the record key).
pub type AppName = String;

// ── Application ───────────────────────────────────────────────────

/// Persisted application record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppRecord {
    pub name: AppName,
    /// Platform the app is built on ("python", "ruby", ...).
    pub platform: String,
    pub state: AppState,
    /// Environment variables keyed by variable name.
    pub env: BTreeMap<String, EnvVar>,
    /// Team names with access to the app, sorted ascending.
    pub teams: Vec<String>,
    /// Running units; the first one is the canonical command target.
    pub units: Vec<Unit>,
    /// Append-only application log.
    pub logs: Vec<AppLog>,
    /// Unix timestamp (seconds) when the record was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last write.
    pub updated_at: u64,
}

/// Lifecycle state of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    #[default]
    Pending,
    Started,
    Stopped,
    Error,
}

/// A single environment variable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
    /// Public variables may be overwritten by lower-trust callers.
    pub public: bool,
    /// Service instance that injected the variable, if any.
    #[serde(default)]
    pub instance_name: Option<String>,
}

impl EnvVar {
    pub fn new(name: &str, value: &str, public: bool) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            public,
            instance_name: None,
        }
    }
}

/// A running instance of an application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    /// Machine number assigned by the provisioner.
    pub machine: u32,
    /// Host address the unit listens on.
    pub ip: String,
    pub status: String,
}

/// One line of application log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppLog {
    /// Unix timestamp (milliseconds).
    pub date: u64,
    pub message: String,
    pub source: String,
}

// ── Service instances ─────────────────────────────────────────────

/// A provisioned service instance and the apps bound to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInstance {
    pub name: String,
    pub service_name: String,
    pub apps: Vec<AppName>,
    pub teams: Vec<String>,
}

impl ServiceInstance {
    pub fn is_bound_to(&self, app: &str) -> bool {
        self.apps.iter().any(|a| a == app)
    }
}
