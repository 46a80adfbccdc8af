//! Health reporting capability.
//!
//! Routers are not required to report their own health. Those that do
//! expose a [`HealthChecker`] through [`crate::Router::health_checker`].

use std::sync::Mutex;

use tracing::debug;

use crate::error::{RouterError, RouterResult};

/// Reports whether the routing backend itself is usable.
pub trait HealthChecker: Send + Sync {
    fn health_check(&self) -> RouterResult<()>;
}

/// A health capability whose outcome is set from outside.
///
/// Attach it to a router with [`crate::MemoryRouter::with_health_reporter`].
#[derive(Debug, Default)]
pub struct HealthReporter {
    err: Mutex<Option<String>>,
}

impl HealthReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or clear, with `None`) the error the next check reports.
    pub fn set_err(&self, err: Option<String>) {
        debug!(?err, "router health error set");
        *self.err.lock().expect("health lock") = err;
    }
}

impl HealthChecker for HealthReporter {
    fn health_check(&self) -> RouterResult<()> {
        match self.err.lock().expect("health lock").as_ref() {
            Some(msg) => Err(RouterError::Unhealthy(msg.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_configured_error() {
        let reporter = HealthReporter::new();
        assert!(reporter.health_check().is_ok());

        reporter.set_err(Some("connection refused".into()));
        assert_eq!(
            reporter.health_check(),
            Err(RouterError::Unhealthy("connection refused".into()))
        );

        reporter.set_err(None);
        assert!(reporter.health_check().is_ok());
    }
}
