//! StateStore — redb-backed record persistence for Shipyard.
//!
//! Provides typed operations over application records, service instances
//! and the router name-resolution record. Records are JSON-serialized into
//! redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Tables holding JSON-encoded records.
type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Thread-safe record store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(APPS).map_err(map_err!(Table))?;
        txn.open_table(SERVICE_INSTANCES).map_err(map_err!(Table))?;
        txn.open_table(ROUTER_NAMES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic record helpers ─────────────────────────────────────

    fn write_record<T: Serialize>(
        &self,
        def: RecordTable,
        key: &str,
        record: &T,
        mode: WriteMode,
    ) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            let exists = table.get(key).map_err(map_err!(Read))?.is_some();
            match mode {
                WriteMode::Insert if exists => {
                    return Err(StateError::AlreadyExists(key.to_string()));
                }
                WriteMode::Update if !exists => {
                    return Err(StateError::NotFound(key.to_string()));
                }
                _ => {}
            }
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn read_record<T: DeserializeOwned>(
        &self,
        def: RecordTable,
        key: &str,
    ) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn scan_records<T: DeserializeOwned>(
        &self,
        def: RecordTable,
        mut keep: impl FnMut(&T) -> bool,
    ) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: T =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if keep(&record) {
                results.push(record);
            }
        }
        Ok(results)
    }

    fn delete_record(&self, def: RecordTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Apps ───────────────────────────────────────────────────────

    /// Insert a new application record. Fails if the name is taken.
    pub fn insert_app(&self, app: &AppRecord) -> StateResult<()> {
        self.write_record(APPS, &app.name, app, WriteMode::Insert)?;
        debug!(app = %app.name, "app inserted");
        Ok(())
    }

    /// Overwrite an existing application record. Fails if it is missing.
    pub fn update_app(&self, app: &AppRecord) -> StateResult<()> {
        self.write_record(APPS, &app.name, app, WriteMode::Update)?;
        debug!(app = %app.name, "app updated");
        Ok(())
    }

    /// Get an application by name.
    pub fn get_app(&self, name: &str) -> StateResult<Option<AppRecord>> {
        self.read_record(APPS, name)
    }

    /// List every application.
    pub fn list_apps(&self) -> StateResult<Vec<AppRecord>> {
        self.scan_records(APPS, |_: &AppRecord| true)
    }

    /// List applications accessible to at least one of the given teams.
    pub fn list_apps_for_teams(&self, teams: &[String]) -> StateResult<Vec<AppRecord>> {
        self.scan_records(APPS, |app: &AppRecord| {
            app.teams.iter().any(|t| teams.contains(t))
        })
    }

    /// Delete an application by name. Returns true if it existed.
    pub fn delete_app(&self, name: &str) -> StateResult<bool> {
        let existed = self.delete_record(APPS, name)?;
        debug!(app = name, existed, "app deleted");
        Ok(existed)
    }

    // ── Service instances ──────────────────────────────────────────

    /// Insert or update a service instance.
    pub fn put_service_instance(&self, instance: &ServiceInstance) -> StateResult<()> {
        self.write_record(
            SERVICE_INSTANCES,
            &instance.name,
            instance,
            WriteMode::Upsert,
        )
    }

    /// Get a service instance by name.
    pub fn get_service_instance(&self, name: &str) -> StateResult<Option<ServiceInstance>> {
        self.read_record(SERVICE_INSTANCES, name)
    }

    /// List the service instances an application is bound to.
    pub fn list_service_instances_for_app(&self, app: &str) -> StateResult<Vec<ServiceInstance>> {
        self.scan_records(SERVICE_INSTANCES, |si: &ServiceInstance| si.is_bound_to(app))
    }

    /// Delete a service instance. Returns true if it existed.
    pub fn delete_service_instance(&self, name: &str) -> StateResult<bool> {
        self.delete_record(SERVICE_INSTANCES, name)
    }

    // ── Router names ───────────────────────────────────────────────

    /// Record which routing backend serves an application name.
    pub fn store_backend_name(&self, app: &str, backend: &str) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ROUTER_NAMES).map_err(map_err!(Table))?;
            table.insert(app, backend).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(app, backend, "backend name stored");
        Ok(())
    }

    /// Resolve the routing backend for an application name.
    pub fn retrieve_backend_name(&self, app: &str) -> StateResult<Option<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ROUTER_NAMES).map_err(map_err!(Table))?;
        let backend = table
            .get(app)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_string());
        Ok(backend)
    }

    /// Drop the name-resolution record. Returns true if it existed.
    pub fn remove_backend_name(&self, app: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(ROUTER_NAMES).map_err(map_err!(Table))?;
            existed = table.remove(app).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(app, existed, "backend name removed");
        Ok(existed)
    }
}

#[derive(Clone, Copy)]
enum WriteMode {
    Insert,
    Update,
    Upsert,
}
