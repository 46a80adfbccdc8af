//! Environment variable writes, protection of private values, and
//! propagation to units.

mod common;

use std::process::Command;

use common::{Harness, QUEUE_ADDR};
use shipyard_app::AppError;
use shipyard_queue::{QueueError, REGENERATE_APPRC};
use shipyard_state::EnvVar;

fn env(name: &str, value: &str, public: bool) -> EnvVar {
    EnvVar::new(name, value, public)
}

#[test]
fn public_only_never_overwrites_private_values() {
    let h = Harness::new();
    let mut app = h.create_with_unit("myapp");
    app.set_envs(
        &h.platform,
        vec![env("DATABASE_PASSWORD", "s3cret", false), env("DEBUG", "0", true)],
        false,
        false,
    )
    .unwrap();

    app.set_envs(
        &h.platform,
        vec![env("DATABASE_PASSWORD", "hijacked", true), env("DEBUG", "1", true)],
        true,
        false,
    )
    .unwrap();

    let stored = h.reload("myapp");
    let password = stored.get_env("DATABASE_PASSWORD").unwrap();
    assert_eq!(password.value, "s3cret");
    assert!(!password.public);
    assert_eq!(stored.get_env("DEBUG").unwrap().value, "1");
}

#[test]
fn without_public_only_private_values_can_change() {
    let h = Harness::new();
    let mut app = h.create_with_unit("myapp");
    app.set_envs(&h.platform, vec![env("TOKEN", "a", false)], false, false)
        .unwrap();
    app.set_envs(&h.platform, vec![env("TOKEN", "b", false)], false, false)
        .unwrap();

    assert_eq!(h.reload("myapp").get_env("TOKEN").unwrap().value, "b");
}

#[test]
fn private_values_are_masked_in_the_log() {
    let h = Harness::new();
    let mut app = h.create_with_unit("myapp");
    app.set_envs(
        &h.platform,
        vec![env("TOKEN", "hunter2", false), env("REGION", "eu", true)],
        false,
        false,
    )
    .unwrap();

    let logs: Vec<_> = h
        .reload("myapp")
        .logs()
        .iter()
        .map(|l| l.message.clone())
        .collect();
    assert!(logs.contains(&"setting env TOKEN with value *** (private variable)".to_string()));
    assert!(logs.contains(&"setting env REGION with value eu".to_string()));
    assert!(logs.iter().all(|l| !l.contains("hunter2")));
}

#[test]
fn direct_propagation_writes_apprc_to_every_unit() {
    let h = Harness::new();
    let mut app = h.create_with_unit("myapp");
    app.add_unit(common::unit("myapp", 1, 2));
    app.save(&h.platform).unwrap();

    app.set_envs(&h.platform, vec![env("PORT", "8080", true)], false, false)
        .unwrap();

    let commands = h.executor.commands.lock().unwrap().clone();
    let targets: Vec<_> = commands.iter().map(|(unit, _)| unit.as_str()).collect();
    assert_eq!(targets, ["myapp/0", "myapp/1"]);
    for (_, cmd) in &commands {
        assert!(cmd.starts_with("printf '%s' '"));
        assert!(cmd.ends_with("' > /home/application/apprc"));
        assert!(cmd.contains("export PORT='\\''8080'\\''\n"));
        assert!(cmd.contains("export SHIPYARD_S3_BUCKET="));
    }
}

#[test]
fn queued_propagation_publishes_instead_of_writing() {
    let h = Harness::new();
    let mut sub = h.broker.subscribe(QUEUE_ADDR);
    let mut app = h.create_with_unit("myapp");

    app.set_envs(&h.platform, vec![env("PORT", "8080", true)], false, true)
        .unwrap();

    let msg = sub.try_recv().unwrap();
    assert_eq!(msg.action, REGENERATE_APPRC);
    assert_eq!(msg.args, ["myapp"]);
    assert!(h.executor.commands().is_empty());
    assert_eq!(h.reload("myapp").get_env("PORT").unwrap().value, "8080");
}

#[test]
fn queue_failure_is_returned_after_persisting() {
    let h = Harness::new();
    let mut app = h.create_with_unit("myapp");

    let err = app
        .set_envs(&h.platform, vec![env("PORT", "8080", true)], false, true)
        .unwrap_err();
    assert!(matches!(err, AppError::Queue(QueueError::Connect(_))));
    assert!(h.reload("myapp").get_env("PORT").is_ok());
}

#[test]
fn empty_set_is_a_no_op() {
    let h = Harness::new();
    let mut app = h.create_with_unit("myapp");
    let logs_before = h.reload("myapp").logs().len();

    app.set_envs(&h.platform, vec![], false, false).unwrap();

    assert!(h.executor.commands().is_empty());
    assert_eq!(h.reload("myapp").logs().len(), logs_before);
}

#[test]
fn unset_public_only_keeps_private_values() {
    let h = Harness::new();
    let mut app = h.create_with_unit("myapp");
    app.set_envs(
        &h.platform,
        vec![env("TOKEN", "x", false), env("DEBUG", "1", true)],
        false,
        false,
    )
    .unwrap();

    app.unset_envs(&h.platform, &["TOKEN".to_string(), "DEBUG".to_string()], true, false)
        .unwrap();

    let stored = h.reload("myapp");
    assert!(stored.get_env("TOKEN").is_ok());
    assert!(matches!(stored.get_env("DEBUG"), Err(AppError::EnvNotFound(_))));
}

#[test]
fn unset_propagates_directly_even_when_queue_requested() {
    let h = Harness::new();
    let mut app = h.create_with_unit("myapp");
    app.set_envs(&h.platform, vec![env("DEBUG", "1", true)], false, false)
        .unwrap();
    h.executor.commands.lock().unwrap().clear();

    app.unset_envs(&h.platform, &["DEBUG".to_string()], false, true)
        .unwrap();

    let commands = h.executor.commands();
    assert_eq!(commands.len(), 1);
    assert!(!commands[0].contains("DEBUG"));
}

#[test]
fn unit_write_failure_is_surfaced() {
    let h = Harness::new();
    let mut app = h.create_with_unit("myapp");
    h.executor.fail_when_contains("apprc");

    let err = app
        .set_envs(&h.platform, vec![env("PORT", "80", true)], false, false)
        .unwrap_err();
    assert!(matches!(err, AppError::Collaborator { .. }));
}

#[test]
fn invalid_env_name_is_rejected_before_any_write() {
    let h = Harness::new();
    let mut app = h.create_with_unit("myapp");

    let err = app
        .set_envs(
            &h.platform,
            vec![env("GOOD", "1", true), env("BAD;reboot", "1", true)],
            false,
            false,
        )
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert!(h.reload("myapp").get_env("GOOD").is_err());
    assert!(h.executor.commands().is_empty());
}

/// Run the recorded apprc write through a real shell, then source the
/// result and read `name` back.
#[cfg(unix)]
fn write_and_source(command: &str, dir: &std::path::Path, name: &str) -> String {
    let apprc = dir.join("apprc");
    let command = command.replace(
        "> /home/application/apprc",
        &format!("> '{}'", apprc.display()),
    );
    let status = Command::new("sh").arg("-c").arg(&command).status().unwrap();
    assert!(status.success());

    let output = Command::new("sh")
        .arg("-c")
        .arg(format!(". '{}'; printf '%s' \"${name}\"", apprc.display()))
        .output()
        .unwrap();
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap()
}

#[cfg(unix)]
#[test]
fn shell_metacharacters_in_values_survive_the_unit_write() {
    let h = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("touched");
    let value = format!(
        "price$5 $(touch '{}') `touch '{}'` it's\nEND\nnext line",
        marker.display(),
        marker.display()
    );
    let mut app = h.create_with_unit("myapp");

    app.set_envs(&h.platform, vec![env("PRICE", &value, true)], false, false)
        .unwrap();

    let commands = h.executor.commands();
    assert_eq!(commands.len(), 1);
    let sourced = write_and_source(&commands[0], dir.path(), "PRICE");
    assert_eq!(sourced, value);
    assert!(!marker.exists(), "a value ran as a command");
}
