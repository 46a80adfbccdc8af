//! Application aggregate errors.

use std::fmt;

use thiserror::Error;

use shipyard_queue::QueueError;
use shipyard_router::RouterError;
use shipyard_state::StateError;

/// Errors raised by application operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Input rejected before anything was mutated.
    #[error("{0}")]
    Validation(String),

    #[error("app not found: {0}")]
    NotFound(String),

    #[error("This team already has access to this app")]
    TeamAlreadyGranted,

    #[error("This team does not have access to this app")]
    TeamNotGranted,

    #[error("Environment variable not declared for this app: {0}")]
    EnvNotFound(String),

    #[error("app {0} has no units")]
    NoUnits(String),

    #[error("missing configuration: {0}")]
    Config(&'static str),

    #[error("invalid hook configuration: {0}")]
    HookConfig(String),

    #[error("Failed to destroy unit: {0}")]
    UnitDestroy(String),

    #[error(transparent)]
    Unbind(UnbindFailures),

    #[error("unsupported queue message: {0}")]
    InvalidMessage(String),

    /// A collaborator (provisioner, storage, repository, executor) failed.
    #[error("{context}: {source}")]
    Collaborator {
        context: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Wrap a collaborator failure with what was being attempted.
    pub fn collaborator(context: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| AppError::Collaborator { context, source }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Every service instance that failed to unbind, with the reason.
#[derive(Debug, Default)]
pub struct UnbindFailures {
    pub failures: Vec<(String, String)>,
}

impl UnbindFailures {
    pub fn push(&mut self, instance: &str, reason: impl fmt::Display) {
        self.failures.push((instance.to_string(), reason.to_string()));
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for UnbindFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Failed to unbind the following instances:")?;
        for (i, (instance, reason)) in self.failures.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "- {instance} ({reason})")?;
        }
        Ok(())
    }
}

impl std::error::Error for UnbindFailures {}
