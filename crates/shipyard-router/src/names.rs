//! Name resolution — which backend currently serves an application name.
//!
//! A backend is registered under the app's own name, so the record starts
//! as an identity mapping. `Swap` rewrites it, which is how an app name and
//! its backend name diverge.

use std::collections::HashMap;
use std::sync::Mutex;

use shipyard_state::StateStore;
use tracing::debug;

use crate::error::{RouterError, RouterResult};

/// Durable `app name → backend name` mapping.
pub trait NameRegistry: Send + Sync {
    fn store(&self, name: &str, backend: &str) -> RouterResult<()>;

    /// Fails with [`RouterError::BackendNotFound`] when no record exists.
    fn retrieve(&self, name: &str) -> RouterResult<String>;

    fn remove(&self, name: &str) -> RouterResult<()>;
}

/// In-process name registry.
#[derive(Default)]
pub struct MemoryNames {
    names: Mutex<HashMap<String, String>>,
}

impl MemoryNames {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NameRegistry for MemoryNames {
    fn store(&self, name: &str, backend: &str) -> RouterResult<()> {
        let mut names = self.names.lock().expect("names lock");
        names.insert(name.to_string(), backend.to_string());
        Ok(())
    }

    fn retrieve(&self, name: &str) -> RouterResult<String> {
        let names = self.names.lock().expect("names lock");
        names.get(name).cloned().ok_or(RouterError::BackendNotFound)
    }

    fn remove(&self, name: &str) -> RouterResult<()> {
        let mut names = self.names.lock().expect("names lock");
        names.remove(name).map(|_| ()).ok_or(RouterError::BackendNotFound)
    }
}

impl NameRegistry for StateStore {
    fn store(&self, name: &str, backend: &str) -> RouterResult<()> {
        self.store_backend_name(name, backend)?;
        Ok(())
    }

    fn retrieve(&self, name: &str) -> RouterResult<String> {
        self.retrieve_backend_name(name)?
            .ok_or(RouterError::BackendNotFound)
    }

    fn remove(&self, name: &str) -> RouterResult<()> {
        if self.remove_backend_name(name)? {
            Ok(())
        } else {
            debug!(name, "no backend name to remove");
            Err(RouterError::BackendNotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(names: &dyn NameRegistry) {
        assert_eq!(names.retrieve("myapp"), Err(RouterError::BackendNotFound));

        names.store("myapp", "myapp").unwrap();
        assert_eq!(names.retrieve("myapp").unwrap(), "myapp");

        names.store("myapp", "other").unwrap();
        assert_eq!(names.retrieve("myapp").unwrap(), "other");

        names.remove("myapp").unwrap();
        assert_eq!(names.remove("myapp"), Err(RouterError::BackendNotFound));
    }

    #[test]
    fn memory_names() {
        exercise(&MemoryNames::new());
    }

    #[test]
    fn state_store_names() {
        exercise(&StateStore::open_in_memory().unwrap());
    }
}
