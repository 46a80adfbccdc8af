//! The routing backend seam.
//!
//! A router owns named backends, each with a set of route addresses, plus
//! CNAME-style aliases and an opaque healthcheck payload per backend. Every
//! operation that takes a `name` resolves it through the name registry
//! first, so callers always address backends by application name.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::RouterResult;
use crate::health::HealthChecker;

/// Healthcheck configuration stored verbatim per backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HealthcheckData {
    pub path: String,
    pub status: u16,
    pub body: String,
}

/// Operations every routing backend provides.
pub trait Router: Send + Sync {
    /// Register an empty backend and record `name → name` for resolution.
    fn add_backend(&self, name: &str) -> RouterResult<()>;

    /// Remove a backend along with its aliases and healthcheck.
    fn remove_backend(&self, name: &str) -> RouterResult<()>;

    fn has_backend(&self, name: &str) -> bool;

    /// Add a batch of routes. All-or-nothing; duplicates are skipped.
    fn add_routes(&self, name: &str, addresses: &[String]) -> RouterResult<()>;

    /// Remove a batch of routes. All-or-nothing; absent ones are skipped.
    fn remove_routes(&self, name: &str, addresses: &[String]) -> RouterResult<()>;

    fn add_route(&self, name: &str, address: &str) -> RouterResult<()>;

    fn remove_route(&self, name: &str, address: &str) -> RouterResult<()>;

    fn has_route(&self, name: &str, address: &str) -> bool;

    fn routes(&self, name: &str) -> RouterResult<Vec<String>>;

    fn set_cname(&self, cname: &str, name: &str) -> RouterResult<()>;

    fn unset_cname(&self, cname: &str, name: &str) -> RouterResult<()>;

    fn has_cname(&self, cname: &str) -> bool;

    /// Externally reachable address of the backend serving `name`.
    fn addr(&self, name: &str) -> RouterResult<String>;

    fn set_healthcheck(&self, name: &str, data: HealthcheckData) -> RouterResult<()>;

    fn get_healthcheck(&self, name: &str) -> Option<HealthcheckData>;

    /// Exchange the traffic served by two backends in one step.
    fn swap(&self, backend1: &str, backend2: &str) -> RouterResult<()>;

    /// Health capability, for routers that can report on themselves.
    fn health_checker(&self) -> Option<&dyn HealthChecker> {
        None
    }
}

static CNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*\.)?[a-zA-Z0-9][\w.-]+$").expect("cname pattern compiles")
});

/// Whether `cname` may be used as an alias on a router serving `domain`.
///
/// Aliases inside the router's own domain would shadow generated backend
/// addresses, so they are refused.
pub fn valid_cname(cname: &str, domain: &str) -> bool {
    CNAME_RE.is_match(cname) && !cname.ends_with(domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cname_validation() {
        assert!(valid_cname("myapp.example.com", "shipyard.test"));
        assert!(valid_cname("*.example.com", "shipyard.test"));
        assert!(valid_cname("a-b_c.io", "shipyard.test"));

        assert!(!valid_cname("myapp.shipyard.test", "shipyard.test"));
        assert!(!valid_cname("-leading.example.com", "shipyard.test"));
        assert!(!valid_cname("has space.com", "shipyard.test"));
        assert!(!valid_cname("", "shipyard.test"));
    }
}
