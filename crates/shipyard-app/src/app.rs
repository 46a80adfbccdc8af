//! The application aggregate.
//!
//! `App` wraps the persisted [`AppRecord`] with the behavior that mutates
//! it. Mutations that are part of a larger write (team grants, unit
//! changes) only touch memory; callers persist with [`App::save`]. Env
//! changes and log appends persist themselves.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use shipyard_state::{AppLog, AppRecord, AppState, EnvVar, Unit};

use crate::error::{AppError, AppResult};
use crate::hooks::HookConfig;
use crate::output::filter_output;
use crate::platform::Platform;

/// Log source used for messages emitted by the platform itself.
pub(crate) const PLATFORM_SOURCE: &str = "shipyard";

/// Where the rendered environment lives on each unit.
const APPRC_PATH: &str = "/home/application/apprc";

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]{0,62}$").expect("app name pattern compiles"));

static ENV_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("env name pattern compiles")
});

/// A platform user, as far as app visibility is concerned.
#[derive(Debug, Clone, Default)]
pub struct User {
    pub email: String,
    pub admin: bool,
    pub teams: Vec<String>,
}

/// Public view of an app.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppView {
    pub name: String,
    pub state: AppState,
    pub platform: String,
    pub teams: Vec<String>,
    pub units: Vec<Unit>,
    pub repository: String,
}

/// An application and its lazily loaded hook configuration.
#[derive(Debug, Clone)]
pub struct App {
    pub(crate) record: AppRecord,
    /// `Some` once hooks were loaded; loaded at most once per `App`.
    pub(crate) hooks: Option<HookConfig>,
}

impl App {
    /// A not yet created app.
    pub fn new(name: &str, platform: &str) -> Self {
        Self::from_record(AppRecord {
            name: name.to_string(),
            platform: platform.to_string(),
            ..Default::default()
        })
    }

    pub fn from_record(record: AppRecord) -> Self {
        Self {
            record,
            hooks: None,
        }
    }

    /// Load an app from the store.
    pub fn get(platform: &Platform, name: &str) -> AppResult<Self> {
        platform
            .store
            .get_app(name)?
            .map(Self::from_record)
            .ok_or_else(|| AppError::NotFound(name.to_string()))
    }

    /// Apps visible to `user`: all of them for admins, otherwise the ones
    /// shared with any of the user's teams.
    pub fn list(platform: &Platform, user: &User) -> AppResult<Vec<Self>> {
        let records = if user.admin {
            platform.store.list_apps()?
        } else {
            platform.store.list_apps_for_teams(&user.teams)?
        };
        Ok(records.into_iter().map(Self::from_record).collect())
    }

    /// Whether `name` is a valid app name: a lowercase letter followed by
    /// up to 62 lowercase letters or digits.
    pub fn is_valid_name(name: &str) -> bool {
        NAME_RE.is_match(name)
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn record(&self) -> &AppRecord {
        &self.record
    }

    pub fn state(&self) -> AppState {
        self.record.state
    }

    pub fn teams(&self) -> &[String] {
        &self.record.teams
    }

    pub fn units(&self) -> &[Unit] {
        &self.record.units
    }

    pub fn logs(&self) -> &[AppLog] {
        &self.record.logs
    }

    pub fn env(&self) -> &BTreeMap<String, EnvVar> {
        &self.record.env
    }

    /// Persist the current record.
    pub fn save(&mut self, platform: &Platform) -> AppResult<()> {
        self.record.updated_at = now_secs();
        platform.store.update_app(&self.record)?;
        Ok(())
    }

    pub fn view(&self, platform: &Platform) -> AppView {
        AppView {
            name: self.record.name.clone(),
            state: self.record.state,
            platform: self.record.platform.clone(),
            teams: self.record.teams.clone(),
            units: self.record.units.clone(),
            repository: platform.config.repository_url(&self.record.name),
        }
    }

    // ── Log ────────────────────────────────────────────────────────

    /// Append one log entry per non-empty line of `message` and persist.
    pub fn log(&mut self, platform: &Platform, message: &str, source: &str) -> AppResult<()> {
        self.append_log(message, source);
        self.save(platform)
    }

    pub(crate) fn append_log(&mut self, message: &str, source: &str) {
        info!(app = %self.record.name, source, "{message}");
        let date = now_millis();
        for line in message.split('\n') {
            if filter_output(line).trim().is_empty() {
                continue;
            }
            self.record.logs.push(AppLog {
                date,
                message: line.to_string(),
                source: source.to_string(),
            });
        }
    }

    // ── Teams ──────────────────────────────────────────────────────

    /// Position of `team` in the sorted team list, and whether it is there.
    pub fn find_team(&self, team: &str) -> (usize, bool) {
        match self.record.teams.binary_search_by(|t| t.as_str().cmp(team)) {
            Ok(pos) => (pos, true),
            Err(pos) => (pos, false),
        }
    }

    pub fn grant(&mut self, team: &str) -> AppResult<()> {
        let (pos, found) = self.find_team(team);
        if found {
            return Err(AppError::TeamAlreadyGranted);
        }
        self.record.teams.insert(pos, team.to_string());
        Ok(())
    }

    pub fn revoke(&mut self, team: &str) -> AppResult<()> {
        let (pos, found) = self.find_team(team);
        if !found {
            return Err(AppError::TeamNotGranted);
        }
        self.record.teams.remove(pos);
        Ok(())
    }

    /// Replace the team list.
    pub fn set_teams(&mut self, teams: &[String]) {
        let mut teams = teams.to_vec();
        teams.sort();
        teams.dedup();
        self.record.teams = teams;
    }

    // ── Units ──────────────────────────────────────────────────────

    /// Add a unit, replacing the one already running on the same machine.
    pub fn add_unit(&mut self, unit: Unit) {
        match self
            .record
            .units
            .iter_mut()
            .find(|u| u.machine == unit.machine)
        {
            Some(existing) => *existing = unit,
            None => self.record.units.push(unit),
        }
    }

    /// The canonical unit for single-unit operations.
    pub fn unit(&self) -> AppResult<&Unit> {
        self.record
            .units
            .first()
            .ok_or_else(|| AppError::NoUnits(self.record.name.clone()))
    }

    // ── Environment ────────────────────────────────────────────────

    pub fn get_env(&self, name: &str) -> AppResult<&EnvVar> {
        self.record
            .env
            .get(name)
            .ok_or_else(|| AppError::EnvNotFound(name.to_string()))
    }

    /// Variables injected by the given service instance.
    pub fn instance_env(&self, instance: &str) -> BTreeMap<String, EnvVar> {
        self.record
            .env
            .iter()
            .filter(|(_, env)| env.instance_name.as_deref() == Some(instance))
            .map(|(k, env)| (k.clone(), env.clone()))
            .collect()
    }

    fn set_env(&mut self, env: EnvVar) {
        let shown = if env.public {
            env.value.as_str()
        } else {
            "*** (private variable)"
        };
        let message = format!("setting env {} with value {shown}", env.name);
        self.append_log(&message, PLATFORM_SOURCE);
        self.record.env.insert(env.name.clone(), env);
    }

    /// Add or overwrite environment variables, persist, then propagate them
    /// to the units.
    ///
    /// With `public_only`, an existing private variable is left untouched.
    /// With `use_queue`, propagation is handed to the queue instead of
    /// being written to the units directly.
    pub fn set_envs(
        &mut self,
        platform: &Platform,
        envs: Vec<EnvVar>,
        public_only: bool,
        use_queue: bool,
    ) -> AppResult<()> {
        if envs.is_empty() {
            return Ok(());
        }
        if let Some(bad) = envs.iter().find(|env| !App::is_valid_env_name(&env.name)) {
            return Err(AppError::Validation(format!(
                "Invalid environment variable name: {:?}",
                bad.name
            )));
        }
        for env in envs {
            let protected = public_only
                && self
                    .record
                    .env
                    .get(&env.name)
                    .is_some_and(|existing| !existing.public);
            if protected {
                debug!(app = %self.record.name, env = %env.name, "skipping private variable");
                continue;
            }
            self.set_env(env);
        }
        self.save(platform)?;
        if use_queue {
            platform.enqueuer.enqueue_env_regeneration(&self.record.name)?;
            return Ok(());
        }
        self.serialize_env_vars(platform)
    }

    /// Remove environment variables, persist, then rewrite the units'
    /// environment.
    ///
    /// With `public_only`, private variables are kept. Propagation is
    /// always direct on this path; `use_queue` is accepted for symmetry
    /// with [`App::set_envs`].
    pub fn unset_envs(
        &mut self,
        platform: &Platform,
        names: &[String],
        public_only: bool,
        _use_queue: bool,
    ) -> AppResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        for name in names {
            let removable = !public_only || self.record.env.get(name).is_some_and(|e| e.public);
            if removable {
                self.record.env.remove(name);
            }
        }
        self.save(platform)?;
        self.serialize_env_vars(platform)
    }

    /// Write the full environment to every unit.
    pub fn serialize_env_vars(&self, platform: &Platform) -> AppResult<()> {
        if self.record.units.is_empty() {
            debug!(app = %self.record.name, "no units to write env to");
            return Ok(());
        }
        let command = format!(
            "printf '%s' {} > {APPRC_PATH}",
            shell_quote(&self.render_apprc())
        );
        for unit in &self.record.units {
            platform
                .executor
                .run_command(unit, &mut std::io::sink(), &command)
                .map_err(AppError::collaborator("writing env to unit"))?;
        }
        debug!(
            app = %self.record.name,
            units = self.record.units.len(),
            vars = self.record.env.len(),
            "env written to units"
        );
        Ok(())
    }

    /// Whether `name` can be exported by a POSIX shell.
    pub fn is_valid_env_name(name: &str) -> bool {
        ENV_NAME_RE.is_match(name)
    }

    fn render_apprc(&self) -> String {
        let mut out = String::from("# generated by shipyard\n");
        for env in self.record.env.values() {
            if !App::is_valid_env_name(&env.name) {
                warn!(app = %self.record.name, env = %env.name, "not exporting invalid env name");
                continue;
            }
            out.push_str(&format!("export {}={}\n", env.name, shell_quote(&env.value)));
        }
        out
    }
}

/// Quote `value` as one single-quoted shell word. Nothing inside is
/// expanded, newlines included.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
