//! Collaborators available to the daemon process itself.
//!
//! The daemon only rewrites unit environments, so it carries a command
//! executor and refuses everything that provisions infrastructure.

use std::io::Write;
use std::process::Command;

use anyhow::{Context, bail};
use tracing::debug;

use shipyard_app::{
    BucketCredentials, Provisioner, RepositoryManager, ServiceUnbinder, StorageProvisioner,
    UnitExecutor,
};
use shipyard_state::{AppRecord, ServiceInstance, Unit};

/// Runs unit commands through `ssh` to the unit's address, or through the
/// local shell when no ssh user is configured.
pub struct ShellExecutor {
    ssh_user: Option<String>,
}

impl ShellExecutor {
    pub fn new(ssh_user: Option<String>) -> Self {
        Self { ssh_user }
    }

    fn command(&self, unit: &Unit, script: &str) -> Command {
        match &self.ssh_user {
            Some(user) => {
                let mut cmd = Command::new("ssh");
                cmd.arg("-o")
                    .arg("StrictHostKeyChecking=no")
                    .arg(format!("{user}@{}", unit.ip))
                    .arg(script);
                cmd
            }
            None => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(script);
                cmd
            }
        }
    }
}

impl UnitExecutor for ShellExecutor {
    fn run_command(&self, unit: &Unit, out: &mut dyn Write, command: &str) -> anyhow::Result<()> {
        debug!(unit = %unit.name, "running unit command");
        let output = self
            .command(unit, command)
            .output()
            .with_context(|| format!("spawning command for unit {}", unit.name))?;
        out.write_all(&output.stdout)?;
        out.write_all(&output.stderr)?;
        if !output.status.success() {
            bail!("command exited with {} on unit {}", output.status, unit.name);
        }
        Ok(())
    }

    fn execute_hook(&self, unit: &Unit, hook: &str, out: &mut dyn Write) -> anyhow::Result<()> {
        self.run_command(unit, out, &format!("/var/lib/shipyard/hooks/{hook}"))
    }
}

/// Stand-in for the provisioning collaborators the daemon never drives.
pub struct Unmanaged;

impl Provisioner for Unmanaged {
    fn provision(&self, app: &AppRecord) -> anyhow::Result<()> {
        bail!("shipyardd does not provision units (app {})", app.name)
    }

    fn destroy(&self, app: &AppRecord) -> anyhow::Result<()> {
        bail!("shipyardd does not destroy units (app {})", app.name)
    }

    fn destroy_unit(&self, _app: &AppRecord, unit: &Unit) -> anyhow::Result<String> {
        bail!("shipyardd does not destroy units (unit {})", unit.name)
    }
}

impl StorageProvisioner for Unmanaged {
    fn create_bucket(&self, app: &str) -> anyhow::Result<BucketCredentials> {
        bail!("shipyardd does not manage buckets (app {app})")
    }

    fn destroy_bucket(&self, app: &str) -> anyhow::Result<()> {
        bail!("shipyardd does not manage buckets (app {app})")
    }
}

impl RepositoryManager for Unmanaged {
    fn create(&self, app: &str, _teams: &[String]) -> anyhow::Result<()> {
        bail!("shipyardd does not manage repositories (app {app})")
    }

    fn remove(&self, app: &str) -> anyhow::Result<()> {
        bail!("shipyardd does not manage repositories (app {app})")
    }
}

impl ServiceUnbinder for Unmanaged {
    fn unbind(&self, instance: &ServiceInstance, _app: &AppRecord) -> anyhow::Result<()> {
        bail!("shipyardd does not unbind services (instance {})", instance.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_unit() -> Unit {
        Unit {
            name: "myapp/0".into(),
            machine: 1,
            ip: "127.0.0.1".into(),
            status: "started".into(),
        }
    }

    #[test]
    fn local_shell_captures_output() {
        let executor = ShellExecutor::new(None);
        let mut out = Vec::new();
        executor
            .run_command(&local_unit(), &mut out, "echo hello")
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hello\n");
    }

    #[test]
    fn nonzero_exit_is_an_error() {
        let executor = ShellExecutor::new(None);
        let err = executor
            .run_command(&local_unit(), &mut Vec::new(), "exit 3")
            .unwrap_err();
        assert!(err.to_string().contains("myapp/0"));
    }

    #[test]
    fn unmanaged_refuses_provisioning() {
        let app = AppRecord {
            name: "myapp".into(),
            ..Default::default()
        };
        assert!(Provisioner::provision(&Unmanaged, &app).is_err());
        assert!(Unmanaged.create_bucket("myapp").is_err());
    }
}
