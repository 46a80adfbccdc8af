//! shipyard.toml configuration parser.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub state: StateConfig,
    pub queue: QueueConfig,
    pub router: RouterConfig,
    pub git: GitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/shipyard/shipyard.redb"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Address of the queue server; env propagation through the queue
    /// fails while it is unset.
    pub server: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub domain: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            domain: "shipyard.local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub host: String,
    /// Path of the app checkout on every unit.
    pub unit_repo: Option<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            host: "git.shipyard.local".to_string(),
            unit_repo: None,
        }
    }
}

impl PlatformConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Clone URL of an app's repository.
    pub fn repository_url(&self, app: &str) -> String {
        format!("git@{}:{app}.git", self.git.host)
    }

    pub fn unit_repo(&self) -> AppResult<&str> {
        self.git
            .unit_repo
            .as_deref()
            .ok_or(AppError::Config("git.unit_repo"))
    }
}
