//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::bail;
use shipyard_app::*;
use shipyard_queue::{Enqueuer, MemoryBroker};
use shipyard_router::{MemoryRouter, MemoryRouterConfig};
use shipyard_state::{AppRecord, ServiceInstance, StateStore, Unit};

pub const QUEUE_ADDR: &str = "queue.test:11300";
pub const UNIT_REPO: &str = "/home/application/current";

#[derive(Default)]
pub struct FakeProvisioner {
    pub provisioned: Mutex<Vec<String>>,
    pub destroyed: Mutex<Vec<String>>,
    pub destroyed_units: Mutex<Vec<String>>,
    pub fail_provision: Mutex<bool>,
    pub fail_destroy_unit: Mutex<bool>,
    /// Deletes the app record mid-provision, so the step's next save fails.
    pub drop_record_from: Mutex<Option<StateStore>>,
}

impl Provisioner for FakeProvisioner {
    fn provision(&self, app: &AppRecord) -> anyhow::Result<()> {
        if *self.fail_provision.lock().unwrap() {
            bail!("no machines available");
        }
        self.provisioned.lock().unwrap().push(app.name.clone());
        if let Some(store) = self.drop_record_from.lock().unwrap().as_ref() {
            store.delete_app(&app.name)?;
        }
        Ok(())
    }

    fn destroy(&self, app: &AppRecord) -> anyhow::Result<()> {
        self.provisioned.lock().unwrap().retain(|a| a != &app.name);
        self.destroyed.lock().unwrap().push(app.name.clone());
        Ok(())
    }

    fn destroy_unit(&self, _app: &AppRecord, unit: &Unit) -> anyhow::Result<String> {
        if *self.fail_destroy_unit.lock().unwrap() {
            bail!("machine {} unreachable", unit.machine);
        }
        self.destroyed_units.lock().unwrap().push(unit.name.clone());
        Ok(format!("unit {} removed", unit.name))
    }
}

#[derive(Default)]
pub struct FakeStorage {
    pub buckets: Mutex<HashSet<String>>,
    /// Deletes the app record when the bucket is created.
    pub drop_record_from: Mutex<Option<StateStore>>,
}

impl StorageProvisioner for FakeStorage {
    fn create_bucket(&self, app: &str) -> anyhow::Result<BucketCredentials> {
        self.buckets.lock().unwrap().insert(app.to_string());
        if let Some(store) = self.drop_record_from.lock().unwrap().as_ref() {
            store.delete_app(app)?;
        }
        Ok(BucketCredentials {
            bucket: format!("{app}-bucket"),
            endpoint: "https://s3.test".to_string(),
            access_key: format!("{app}-access"),
            secret_key: format!("{app}-secret"),
        })
    }

    fn destroy_bucket(&self, app: &str) -> anyhow::Result<()> {
        self.buckets.lock().unwrap().remove(app);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRepositories {
    pub repos: Mutex<HashMap<String, Vec<String>>>,
}

impl RepositoryManager for FakeRepositories {
    fn create(&self, app: &str, teams: &[String]) -> anyhow::Result<()> {
        self.repos
            .lock()
            .unwrap()
            .insert(app.to_string(), teams.to_vec());
        Ok(())
    }

    fn remove(&self, app: &str) -> anyhow::Result<()> {
        self.repos.lock().unwrap().remove(app);
        Ok(())
    }
}

/// Records every command and hook; commands containing a configured
/// marker fail, `cat .../app.conf` answers with the configured content.
#[derive(Default)]
pub struct FakeExecutor {
    pub commands: Mutex<Vec<(String, String)>>,
    pub hooks: Mutex<Vec<(String, String)>>,
    pub fail_on: Mutex<Vec<String>>,
    pub app_conf: Mutex<Option<String>>,
}

impl FakeExecutor {
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cmd)| cmd.clone())
            .collect()
    }

    pub fn hook_names(&self) -> Vec<String> {
        self.hooks
            .lock()
            .unwrap()
            .iter()
            .map(|(_, hook)| hook.clone())
            .collect()
    }

    pub fn fail_when_contains(&self, marker: &str) {
        self.fail_on.lock().unwrap().push(marker.to_string());
    }

    pub fn serve_app_conf(&self, content: &str) {
        *self.app_conf.lock().unwrap() = Some(content.to_string());
    }
}

impl UnitExecutor for FakeExecutor {
    fn run_command(&self, unit: &Unit, out: &mut dyn Write, command: &str) -> anyhow::Result<()> {
        self.commands
            .lock()
            .unwrap()
            .push((unit.name.clone(), command.to_string()));
        if self
            .fail_on
            .lock()
            .unwrap()
            .iter()
            .any(|marker| command.contains(marker.as_str()))
        {
            bail!("command failed on {}", unit.name);
        }
        if command.ends_with("app.conf") {
            match self.app_conf.lock().unwrap().as_deref() {
                Some(content) => out.write_all(content.as_bytes())?,
                None => bail!("cat: app.conf: No such file or directory"),
            }
        } else {
            writeln!(out, "ran: {command}")?;
        }
        Ok(())
    }

    fn execute_hook(&self, unit: &Unit, hook: &str, out: &mut dyn Write) -> anyhow::Result<()> {
        self.hooks
            .lock()
            .unwrap()
            .push((unit.name.clone(), hook.to_string()));
        writeln!(out, "hook {hook} done")?;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeUnbinder {
    pub failing: Mutex<HashSet<String>>,
    pub unbound: Mutex<Vec<String>>,
}

impl ServiceUnbinder for FakeUnbinder {
    fn unbind(&self, instance: &ServiceInstance, _app: &AppRecord) -> anyhow::Result<()> {
        if self.failing.lock().unwrap().contains(&instance.name) {
            bail!("{} service unavailable", instance.service_name);
        }
        self.unbound.lock().unwrap().push(instance.name.clone());
        Ok(())
    }
}

/// A platform wired to fakes, keeping typed handles to each of them.
pub struct Harness {
    pub platform: Platform,
    pub store: StateStore,
    pub router: Arc<MemoryRouter>,
    pub broker: Arc<MemoryBroker>,
    pub provisioner: Arc<FakeProvisioner>,
    pub storage: Arc<FakeStorage>,
    pub repositories: Arc<FakeRepositories>,
    pub executor: Arc<FakeExecutor>,
    pub unbinder: Arc<FakeUnbinder>,
}

impl Harness {
    pub fn new() -> Self {
        let mut config = PlatformConfig::default();
        config.queue.server = Some(QUEUE_ADDR.to_string());
        config.git.unit_repo = Some(UNIT_REPO.to_string());
        Self::with_config(config)
    }

    pub fn with_config(config: PlatformConfig) -> Self {
        let store = StateStore::open_in_memory().unwrap();
        let router = Arc::new(MemoryRouter::new(
            Arc::new(store.clone()),
            MemoryRouterConfig {
                domain: config.router.domain.clone(),
                ..Default::default()
            },
        ));
        let broker = Arc::new(MemoryBroker::new());
        let provisioner = Arc::new(FakeProvisioner::default());
        let storage = Arc::new(FakeStorage::default());
        let repositories = Arc::new(FakeRepositories::default());
        let executor = Arc::new(FakeExecutor::default());
        let unbinder = Arc::new(FakeUnbinder::default());

        let platform = Platform {
            enqueuer: Enqueuer::new(broker.clone(), config.queue.server.clone()),
            config,
            store: store.clone(),
            router: router.clone(),
            provisioner: provisioner.clone(),
            storage: storage.clone(),
            repository: repositories.clone(),
            executor: executor.clone(),
            unbinder: unbinder.clone(),
        };

        Self {
            platform,
            store,
            router,
            broker,
            provisioner,
            storage,
            repositories,
            executor,
            unbinder,
        }
    }

    /// Create `name` through the pipeline.
    pub fn create(&self, name: &str) -> App {
        create_app(&self.platform, App::new(name, "python")).unwrap()
    }

    /// Create `name` with one unit attached and persisted.
    pub fn create_with_unit(&self, name: &str) -> App {
        let mut app = self.create(name);
        app.add_unit(unit(name, 0, 1));
        app.save(&self.platform).unwrap();
        app
    }

    pub fn reload(&self, name: &str) -> App {
        App::get(&self.platform, name).unwrap()
    }
}

pub fn unit(app: &str, index: u32, machine: u32) -> Unit {
    Unit {
        name: format!("{app}/{index}"),
        machine,
        ip: format!("10.0.0.{machine}"),
        status: "started".to_string(),
    }
}
