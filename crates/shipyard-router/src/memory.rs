//! In-process routing registry.
//!
//! All state lives behind one `Mutex` and every operation holds it from
//! name resolution to its last write, so readers never observe a half
//! applied batch or swap.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::error::{RouterError, RouterResult};
use crate::health::{HealthChecker, HealthReporter};
use crate::names::NameRegistry;
use crate::router::{HealthcheckData, Router, valid_cname};

/// Construction options for [`MemoryRouter`].
#[derive(Debug, Clone)]
pub struct MemoryRouterConfig {
    /// Suffix used to build backend addresses; aliases may not end with it.
    pub domain: String,
    /// Addresses for which every route mutation fails.
    pub failing_addresses: HashSet<String>,
}

impl Default for MemoryRouterConfig {
    fn default() -> Self {
        Self {
            domain: "shipyard.local".to_string(),
            failing_addresses: HashSet::new(),
        }
    }
}

#[derive(Default)]
struct Registry {
    backends: HashMap<String, Vec<String>>,
    cnames: HashMap<String, String>,
    healthchecks: HashMap<String, HealthcheckData>,
    failures: HashSet<String>,
}

impl Registry {
    fn check_failures<'a>(&self, addresses: impl IntoIterator<Item = &'a String>) -> RouterResult<()> {
        for addr in addresses {
            if self.failures.contains(addr) {
                return Err(RouterError::ForcedFailure(addr.clone()));
            }
        }
        Ok(())
    }

    fn routes_mut(&mut self, backend: &str) -> RouterResult<&mut Vec<String>> {
        self.backends
            .get_mut(backend)
            .ok_or(RouterError::BackendNotFound)
    }
}

/// Routing registry held in memory, with name resolution delegated to a
/// [`NameRegistry`].
pub struct MemoryRouter {
    names: Arc<dyn NameRegistry>,
    domain: String,
    registry: Mutex<Registry>,
    health: Option<HealthReporter>,
}

impl MemoryRouter {
    pub fn new(names: Arc<dyn NameRegistry>, config: MemoryRouterConfig) -> Self {
        Self {
            names,
            domain: config.domain,
            registry: Mutex::new(Registry {
                failures: config.failing_addresses,
                ..Default::default()
            }),
            health: None,
        }
    }

    /// Attach a health-reporting capability.
    pub fn with_health_reporter(mut self, reporter: HealthReporter) -> Self {
        self.health = Some(reporter);
        self
    }

    /// The attached health reporter, used to drive its outcome.
    pub fn health_reporter(&self) -> Option<&HealthReporter> {
        self.health.as_ref()
    }

    /// Make every route mutation touching `address` fail.
    pub fn fail_for_address(&self, address: &str) {
        self.lock().failures.insert(address.to_string());
    }

    pub fn remove_fail_for_address(&self, address: &str) {
        self.lock().failures.remove(address);
    }

    /// Drop every backend, alias, healthcheck and injected failure.
    pub fn reset(&self) {
        *self.lock() = Registry::default();
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().expect("router lock")
    }

    /// Backend for `name`, or `name` itself when nothing was recorded or
    /// the registry could not answer.
    fn resolve_or_self(&self, name: &str) -> String {
        match self.names.retrieve(name) {
            Ok(backend) => backend,
            Err(RouterError::BackendNotFound) => name.to_string(),
            Err(err) => {
                warn!(name, error = %err, "name lookup failed, using the name as backend");
                name.to_string()
            }
        }
    }
}

impl Router for MemoryRouter {
    fn add_backend(&self, name: &str) -> RouterResult<()> {
        let mut reg = self.lock();
        if reg.backends.contains_key(name) {
            return Err(RouterError::BackendExists);
        }
        self.names.store(name, name)?;
        reg.backends.insert(name.to_string(), Vec::new());
        info!(backend = name, "backend added");
        Ok(())
    }

    fn remove_backend(&self, name: &str) -> RouterResult<()> {
        let mut reg = self.lock();
        let backend = self.names.retrieve(name)?;
        if backend != name {
            return Err(RouterError::BackendSwapped);
        }
        if !reg.backends.contains_key(&backend) {
            return Err(RouterError::BackendNotFound);
        }
        self.names.remove(&backend)?;
        reg.cnames.retain(|_, target| *target != backend);
        reg.healthchecks.remove(&backend);
        reg.backends.remove(&backend);
        info!(backend = %backend, "backend removed");
        Ok(())
    }

    fn has_backend(&self, name: &str) -> bool {
        self.lock().backends.contains_key(name)
    }

    fn add_routes(&self, name: &str, addresses: &[String]) -> RouterResult<()> {
        let mut reg = self.lock();
        let backend = self.names.retrieve(name)?;
        if !reg.backends.contains_key(&backend) {
            return Err(RouterError::BackendNotFound);
        }
        reg.check_failures(addresses)?;
        let routes = reg.routes_mut(&backend)?;
        for addr in addresses {
            if !routes.contains(addr) {
                routes.push(addr.clone());
            }
        }
        debug!(backend = %backend, count = addresses.len(), "routes added");
        Ok(())
    }

    fn remove_routes(&self, name: &str, addresses: &[String]) -> RouterResult<()> {
        let mut reg = self.lock();
        let backend = self.names.retrieve(name)?;
        if !reg.backends.contains_key(&backend) {
            return Err(RouterError::BackendNotFound);
        }
        reg.check_failures(addresses)?;
        let routes = reg.routes_mut(&backend)?;
        routes.retain(|route| !addresses.contains(route));
        debug!(backend = %backend, count = addresses.len(), "routes removed");
        Ok(())
    }

    fn add_route(&self, name: &str, address: &str) -> RouterResult<()> {
        let mut reg = self.lock();
        let backend = self.names.retrieve(name)?;
        let routes = reg
            .backends
            .get(&backend)
            .ok_or(RouterError::BackendNotFound)?;
        if routes.iter().any(|r| r == address) {
            return Err(RouterError::RouteExists);
        }
        if reg.failures.contains(address) {
            return Err(RouterError::ForcedFailure(address.to_string()));
        }
        reg.routes_mut(&backend)?.push(address.to_string());
        debug!(backend = %backend, address, "route added");
        Ok(())
    }

    fn remove_route(&self, name: &str, address: &str) -> RouterResult<()> {
        let mut reg = self.lock();
        let backend = self.names.retrieve(name)?;
        if !reg.backends.contains_key(&backend) {
            return Err(RouterError::BackendNotFound);
        }
        if reg.failures.contains(address) {
            return Err(RouterError::ForcedFailure(address.to_string()));
        }
        let routes = reg.routes_mut(&backend)?;
        let index = routes
            .iter()
            .position(|r| r == address)
            .ok_or(RouterError::RouteNotFound)?;
        routes.swap_remove(index);
        debug!(backend = %backend, address, "route removed");
        Ok(())
    }

    fn has_route(&self, name: &str, address: &str) -> bool {
        let reg = self.lock();
        let backend = self.resolve_or_self(name);
        let routes = reg
            .backends
            .get(&backend)
            .or_else(|| reg.cnames.get(name).and_then(|b| reg.backends.get(b)));
        routes.is_some_and(|routes| routes.iter().any(|r| r == address))
    }

    fn routes(&self, name: &str) -> RouterResult<Vec<String>> {
        let reg = self.lock();
        let backend = self.names.retrieve(name)?;
        reg.backends
            .get(&backend)
            .cloned()
            .ok_or(RouterError::BackendNotFound)
    }

    fn set_cname(&self, cname: &str, name: &str) -> RouterResult<()> {
        let mut reg = self.lock();
        let backend = self.names.retrieve(name)?;
        if !reg.backends.contains_key(&backend) {
            debug!(cname, backend = %backend, "no backend to alias yet");
            return Ok(());
        }
        if !valid_cname(cname, &self.domain) {
            return Err(RouterError::CNameNotAllowed);
        }
        if reg.cnames.contains_key(cname) {
            return Err(RouterError::CNameExists);
        }
        reg.cnames.insert(cname.to_string(), backend.clone());
        info!(cname, backend = %backend, "cname set");
        Ok(())
    }

    fn unset_cname(&self, cname: &str, name: &str) -> RouterResult<()> {
        let mut reg = self.lock();
        let backend = self.names.retrieve(name)?;
        if !reg.backends.contains_key(&backend) {
            return Ok(());
        }
        if reg.cnames.remove(cname).is_none() {
            return Err(RouterError::CNameNotFound);
        }
        info!(cname, backend = %backend, "cname unset");
        Ok(())
    }

    fn has_cname(&self, cname: &str) -> bool {
        self.lock().cnames.contains_key(cname)
    }

    fn addr(&self, name: &str) -> RouterResult<String> {
        let reg = self.lock();
        let backend = self.names.retrieve(name)?;
        if reg.backends.contains_key(&backend) {
            Ok(format!("{backend}.{}", self.domain))
        } else {
            Err(RouterError::BackendNotFound)
        }
    }

    fn set_healthcheck(&self, name: &str, data: HealthcheckData) -> RouterResult<()> {
        let mut reg = self.lock();
        let backend = self.names.retrieve(name)?;
        if !reg.backends.contains_key(&backend) {
            return Err(RouterError::BackendNotFound);
        }
        reg.healthchecks.insert(backend, data);
        Ok(())
    }

    fn get_healthcheck(&self, name: &str) -> Option<HealthcheckData> {
        let reg = self.lock();
        let backend = self.resolve_or_self(name);
        reg.healthchecks.get(&backend).cloned()
    }

    fn swap(&self, backend1: &str, backend2: &str) -> RouterResult<()> {
        let mut reg = self.lock();
        let target1 = self.names.retrieve(backend1)?;
        let target2 = self.names.retrieve(backend2)?;
        if !reg.backends.contains_key(&target1) || !reg.backends.contains_key(&target2) {
            return Err(RouterError::BackendNotFound);
        }
        if target1 == target2 {
            return Ok(());
        }

        self.names.store(backend1, &target2)?;
        if let Err(err) = self.names.store(backend2, &target1) {
            self.names.store(backend1, &target1)?;
            return Err(err);
        }

        let routes1 = reg.backends.remove(&target1).unwrap_or_default();
        let routes2 = reg.backends.insert(target2.clone(), routes1).unwrap_or_default();
        reg.backends.insert(target1.clone(), routes2);

        info!(backend1, backend2, "backends swapped");
        Ok(())
    }

    fn health_checker(&self) -> Option<&dyn HealthChecker> {
        self.health.as_ref().map(|h| h as &dyn HealthChecker)
    }
}
