//! Restart hooks and unit command execution.
//!
//! Hooks come from an `app.conf` YAML file at the root of the app's
//! checkout on the canonical unit:
//!
//! ```yaml
//! pre-restart:
//!   - scripts/migrate.sh
//! pos-restart:
//!   - scripts/warm-cache.sh --all
//! ```

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app::{App, PLATFORM_SOURCE};
use crate::error::{AppError, AppResult};
use crate::output::filter_output;
use crate::platform::Platform;

const HOOK_FILE: &str = "app.conf";

/// Commands run around a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    #[serde(rename = "pre-restart", default)]
    pub pre_restart: Vec<String>,
    #[serde(rename = "pos-restart", default)]
    pub pos_restart: Vec<String>,
}

impl HookConfig {
    pub fn from_yaml(content: &str) -> AppResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| AppError::HookConfig(e.to_string()))
    }
}

/// Make the hook's executable absolute when it names a file inside the
/// unit repository.
fn resolve_hook_path(command: &str, unit_repo: &str) -> String {
    let mut words = command.split_whitespace();
    let Some(program) = words.next() else {
        return command.to_string();
    };
    let absolute = Path::new(unit_repo).join(program);
    if !absolute.exists() {
        return command.to_string();
    }
    std::iter::once(absolute.to_string_lossy().into_owned())
        .chain(words.map(str::to_string))
        .collect::<Vec<_>>()
        .join(" ")
}

impl App {
    /// Load hooks from the canonical unit, once.
    ///
    /// The cache is filled before the fetch, so a failed load is not
    /// retried until [`App::invalidate_hooks`]. Failing to read the file
    /// degrades to no hooks; a missing repository path or malformed YAML
    /// is returned.
    pub fn load_hooks(&mut self, platform: &Platform) -> AppResult<()> {
        if self.hooks.is_some() {
            return Ok(());
        }
        self.hooks = Some(HookConfig::default());

        let unit_repo = match platform.config.unit_repo() {
            Ok(path) => path.to_string(),
            Err(err) => {
                self.log(
                    platform,
                    &format!("Got error while getting repository path: {err}"),
                    PLATFORM_SOURCE,
                )?;
                return Err(err);
            }
        };

        let command = format!("cat {}", Path::new(&unit_repo).join(HOOK_FILE).display());
        let mut buf = Vec::new();
        let fetched = self.unit().and_then(|unit| {
            platform
                .executor
                .run_command(unit, &mut buf, &command)
                .map_err(AppError::collaborator("reading hook file"))
        });
        if let Err(err) = fetched {
            warn!(app = %self.name(), error = %err, "could not read hooks");
            self.log(
                platform,
                &format!("Got error while executing command: {err}... Skipping hooks execution"),
                PLATFORM_SOURCE,
            )?;
            return Ok(());
        }

        let content = filter_output(&String::from_utf8_lossy(&buf));
        match HookConfig::from_yaml(&content) {
            Ok(hooks) => {
                debug!(
                    app = %self.name(),
                    pre = hooks.pre_restart.len(),
                    pos = hooks.pos_restart.len(),
                    "hooks loaded"
                );
                self.hooks = Some(hooks);
                Ok(())
            }
            Err(err) => {
                self.log(
                    platform,
                    &format!("Got error while parsing yaml: {err}"),
                    PLATFORM_SOURCE,
                )?;
                Err(err)
            }
        }
    }

    /// Drop cached hooks so the next restart reloads them.
    pub fn invalidate_hooks(&mut self) {
        self.hooks = None;
    }

    pub fn hooks(&self) -> Option<&HookConfig> {
        self.hooks.as_ref()
    }

    fn run_hook(
        &mut self,
        platform: &Platform,
        out: &mut dyn Write,
        commands: &[String],
        kind: &str,
    ) -> AppResult<()> {
        if commands.is_empty() {
            return self.log(platform, &format!("Skipping {kind} hooks..."), PLATFORM_SOURCE);
        }
        self.log(platform, &format!("Executing {kind} hook..."), PLATFORM_SOURCE)?;
        out.write_all(format!("\n ---> Running {kind}\n").as_bytes())?;
        let unit_repo = platform.config.git.unit_repo.clone();
        for command in commands {
            let command = match &unit_repo {
                Some(repo) => resolve_hook_path(command, repo),
                None => command.clone(),
            };
            self.run(platform, &command, out)?;
        }
        Ok(())
    }

    pub fn pre_restart(&mut self, platform: &Platform, out: &mut dyn Write) -> AppResult<()> {
        self.load_hooks(platform)?;
        let commands = self.hooks.as_ref().map(|h| h.pre_restart.clone()).unwrap_or_default();
        self.run_hook(platform, out, &commands, "pre-restart")
    }

    pub fn pos_restart(&mut self, platform: &Platform, out: &mut dyn Write) -> AppResult<()> {
        self.load_hooks(platform)?;
        let commands = self.hooks.as_ref().map(|h| h.pos_restart.clone()).unwrap_or_default();
        self.run_hook(platform, out, &commands, "pos-restart")
    }

    /// Pre-restart hooks, restart marker, pos-restart hooks, then the
    /// unit's own `restart` hook. Stops at the first failing stage.
    pub fn restart(&mut self, platform: &Platform, out: &mut dyn Write) -> AppResult<()> {
        self.unit()?;
        self.log(platform, "executing hook to restart", PLATFORM_SOURCE)?;
        self.pre_restart(platform, out)?;
        out.write_all(b"\n ---> Restarting your app\n")?;
        self.pos_restart(platform, out)?;
        let unit = self.unit()?;
        platform
            .executor
            .execute_hook(unit, "restart", out)
            .map_err(AppError::collaborator("restarting unit"))
    }

    /// Run `command` on the canonical unit inside the app's environment.
    pub fn run(&mut self, platform: &Platform, command: &str, out: &mut dyn Write) -> AppResult<()> {
        self.log(platform, &format!("running '{command}'"), PLATFORM_SOURCE)?;
        let command = format!(
            "[ -f /home/application/apprc ] && source /home/application/apprc; \
             [ -d /home/application/current ] && cd /home/application/current; {command}"
        );
        let unit = self.unit()?;
        platform
            .executor
            .run_command(unit, out, &command)
            .map_err(AppError::collaborator("running command on unit"))
    }

    pub fn install_deps(&mut self, platform: &Platform, out: &mut dyn Write) -> AppResult<()> {
        self.log(platform, "executing hook dependencies", PLATFORM_SOURCE)?;
        let unit = self.unit()?;
        platform
            .executor
            .execute_hook(unit, "dependencies", out)
            .map_err(AppError::collaborator("installing dependencies"))
    }
}
