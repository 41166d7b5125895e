// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use pulsar::config::{load_and_validate, parse_and_validate, parse_duration, MAX_KILL_TIMEOUT};
use pulsar::errors::PulsarError;
use pulsar::tasks::{ConfigTaskResolver, TaskResolver, SHELL_TASK};

fn expect_config_error(contents: &str, needle: &str) {
    match parse_and_validate(contents) {
        Err(PulsarError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "'{msg}' does not mention '{needle}'")
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn full_config_loads_from_disk() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[pulsar]
kill_timeout = "250ms"
output_limit = 50

[store]
path = ".pulsar/jobs.json"

[task.deploy]
cmd = "cap $PULSAR_ENV deploy"
description = "Deploy the application"
variables = {{ revision = "git revision to deploy" }}
apps = ["example"]
envs = ["production", "staging"]
"#
    )
    .unwrap();

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.kill_timeout, Duration::from_millis(250));
    assert_eq!(cfg.pulsar.output_limit, 50);
    assert!(cfg.store.path.is_some());

    let deploy = &cfg.task["deploy"];
    assert_eq!(deploy.description.as_deref(), Some("Deploy the application"));
    assert!(deploy.variables.contains_key("revision"));
    assert!(deploy.applies_to("example", "staging"));
    assert!(!deploy.applies_to("example", "development"));
    assert!(!deploy.applies_to("other", "production"));
}

#[test]
fn empty_config_uses_defaults() {
    let cfg = parse_and_validate("").unwrap();
    assert_eq!(cfg.kill_timeout, Duration::from_secs(5));
    assert_eq!(cfg.pulsar.output_limit, 1000);
    assert!(cfg.store.path.is_none());
    assert!(cfg.task.is_empty());

    // Only the built-in shell task is offered.
    let tasks = ConfigTaskResolver::from_config(&cfg)
        .list_tasks("example", "production")
        .unwrap();
    assert_eq!(tasks.keys().collect::<Vec<_>>(), vec![SHELL_TASK]);
}

#[test]
fn missing_file_is_an_io_error() {
    match load_and_validate("/definitely/not/here/Pulsar.toml") {
        Err(PulsarError::IoError(_)) => {}
        other => panic!("Expected IoError, got: {:?}", other.map(|_| ())),
    }
}

#[test]
fn malformed_toml_is_a_toml_error() {
    match parse_and_validate("[task.deploy\ncmd = ") {
        Err(PulsarError::TomlError(_)) => {}
        other => panic!("Expected TomlError, got: {:?}", other.map(|_| ())),
    }
}

#[test]
fn task_without_cmd_is_rejected_by_serde() {
    assert!(matches!(
        parse_and_validate("[task.deploy]\ndescription = \"no command\"\n"),
        Err(PulsarError::TomlError(_))
    ));
}

#[test]
fn bad_kill_timeout_is_rejected() {
    expect_config_error("[pulsar]\nkill_timeout = \"soon\"\n", "kill_timeout");
    expect_config_error("[pulsar]\nkill_timeout = \"5d\"\n", "kill_timeout");
    expect_config_error("[pulsar]\nkill_timeout = \"0s\"\n", "greater than zero");
}

#[test]
fn oversized_kill_timeout_is_rejected() {
    expect_config_error(
        "[pulsar]\nkill_timeout = \"18446744073709551615s\"\n",
        "at most",
    );
    expect_config_error(
        "[pulsar]\nkill_timeout = \"9999999999999999h\"\n",
        "too large",
    );
    expect_config_error("[pulsar]\nkill_timeout = \"25h\"\n", "at most");

    let cfg = parse_and_validate("[pulsar]\nkill_timeout = \"24h\"\n").unwrap();
    assert_eq!(cfg.kill_timeout, MAX_KILL_TIMEOUT);
}

#[test]
fn shell_task_cannot_be_redefined() {
    expect_config_error("[task.shell]\ncmd = \"bash\"\n", "built in");
}

#[test]
fn reserved_and_malformed_task_names_are_rejected() {
    expect_config_error("[task.console]\ncmd = \"irb\"\n", "reserved");
    expect_config_error("[task.\"deploy:cleanup\"]\ncmd = \"true\"\n", "reserved");
    expect_config_error("[task.\"-T\"]\ncmd = \"true\"\n", "illegal characters");
    expect_config_error("[task.\"two words\"]\ncmd = \"true\"\n", "illegal characters");
}

#[test]
fn empty_cmd_and_bad_variable_names_are_rejected() {
    expect_config_error("[task.deploy]\ncmd = \"  \"\n", "empty `cmd`");
    expect_config_error(
        "[task.deploy]\ncmd = \"true\"\nvariables = { \"bad name\" = \"x\" }\n",
        "bad name",
    );
    expect_config_error(
        "[task.deploy]\ncmd = \"true\"\nvariables = { PULSAR_APP = \"x\" }\n",
        "reserved variable",
    );
}

#[test]
fn durations_accept_known_units() {
    assert_eq!(parse_duration("200ms").unwrap(), Duration::from_millis(200));
    assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
    assert_eq!(parse_duration(" 2m ").unwrap(), Duration::from_secs(120));
    assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("ms").is_err());
    assert!(parse_duration("18446744073709551615m").is_err());
    assert!(parse_duration("18446744073709551615h").is_err());
}
