// tests/cli_args.rs

use clap::Parser;

use pulsar::cli::{CliArgs, Command};

#[test]
fn run_collects_repeated_vars() {
    let args = CliArgs::try_parse_from([
        "pulsar", "run", "--app", "example", "--env", "production", "--task", "deploy", "--var",
        "revision=abc123", "--var", "note=a=b",
    ])
    .unwrap();

    assert_eq!(args.config, "Pulsar.toml");
    match args.command {
        Command::Run {
            app,
            env,
            task,
            vars,
        } => {
            assert_eq!(app, "example");
            assert_eq!(env, "production");
            assert_eq!(task, "deploy");
            assert_eq!(
                vars,
                vec![
                    ("revision".to_string(), "abc123".to_string()),
                    ("note".to_string(), "a=b".to_string()),
                ]
            );
        }
        other => panic!("expected run, got {other:?}"),
    }
}

#[test]
fn var_without_equals_is_rejected() {
    let result = CliArgs::try_parse_from([
        "pulsar", "run", "--app", "a", "--env", "e", "--task", "t", "--var", "oops",
    ]);
    assert!(result.is_err());
}

#[test]
fn global_flags_work_after_the_subcommand() {
    let args =
        CliArgs::try_parse_from(["pulsar", "--config", "other.toml", "check", "--log-level", "debug"])
            .unwrap();
    assert_eq!(args.config, "other.toml");
    assert!(args.log_level.is_some());
    assert!(matches!(args.command, Command::Check));
}
