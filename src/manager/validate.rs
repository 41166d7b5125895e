// src/manager/validate.rs

//! Input validation for `Manager::create_job`.
//!
//! Everything here is synchronous and side-effect free: a failure is reported
//! before any record is written or process spawned.

use serde_json::Value;

use crate::errors::{PulsarError, Result};
use crate::exec::CommandSpec;
use crate::job::JobArgs;
use crate::tasks::TaskResolver;

/// Task names that are never accepted, whatever the resolver knows.
pub const ILLEGAL_TASKS: &[&str] = &["invoke", "console", "deploy:cleanup", "-T", "--tasks"];

/// Prefix of the variables every job process gets from the job itself
/// (`PULSAR_JOB_ID`, `PULSAR_APP`, `PULSAR_ENV`, `PULSAR_TASK`).
pub const RESERVED_VARIABLE_PREFIX: &str = "PULSAR_";

/// Letters, digits, `_` and `-`.
pub fn is_valid_variable_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Like a variable name, plus `:` and `.` for namespaced tasks
/// (`deploy:rollback`). Must not start with `-`.
pub fn is_valid_task_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))
}

pub fn is_reserved_variable(name: &str) -> bool {
    name.starts_with(RESERVED_VARIABLE_PREFIX)
}

pub fn is_illegal_task(name: &str) -> bool {
    ILLEGAL_TASKS.contains(&name)
}

/// Check an app or environment identifier.
pub fn validate_identifier(field: &'static str, value: &str) -> Result<()> {
    if !is_valid_variable_name(value) {
        return Err(PulsarError::validation(
            field,
            format!("'{value}' must be non-empty and contain only letters, digits, '_' or '-'"),
        ));
    }
    Ok(())
}

/// Turn caller-supplied variables into `JobArgs`.
///
/// `None` and `null` mean no variables. Anything else must be a flat mapping
/// whose keys pass [`is_valid_variable_name`] and whose values are scalars;
/// numbers and booleans are stringified, `null` becomes an empty string.
pub fn validate_variables(variables: Option<&Value>) -> Result<JobArgs> {
    let map = match variables {
        None | Some(Value::Null) => return Ok(JobArgs::new()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(PulsarError::validation(
                "variables",
                format!("must be a mapping, got {}", kind_of(other)),
            ));
        }
    };

    let mut args = JobArgs::new();
    for (key, value) in map {
        if !is_valid_variable_name(key) {
            return Err(PulsarError::validation(
                format!("variables.{key}"),
                "key may contain only letters, digits, '_' or '-'",
            ));
        }
        if is_reserved_variable(key) {
            return Err(PulsarError::validation(
                format!("variables.{key}"),
                format!("names starting with '{RESERVED_VARIABLE_PREFIX}' are reserved"),
            ));
        }

        let value = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            Value::Array(_) | Value::Object(_) => {
                return Err(PulsarError::validation(
                    format!("variables.{key}"),
                    format!("value must be a scalar, got {}", kind_of(value)),
                ));
            }
        };
        args.insert(key.clone(), value);
    }

    Ok(args)
}

/// Check the task name and resolve its command.
///
/// Reserved and malformed names are rejected before the resolver is asked;
/// a resolver `NotFound` becomes a validation error on `task`.
pub fn validate_task(
    resolver: &dyn TaskResolver,
    app: &str,
    env: &str,
    task: &str,
) -> Result<CommandSpec> {
    if is_illegal_task(task) {
        return Err(PulsarError::validation(
            "task",
            format!("'{task}' is a reserved task name"),
        ));
    }
    if !is_valid_task_name(task) {
        return Err(PulsarError::validation(
            "task",
            format!("'{task}' contains illegal characters"),
        ));
    }

    match resolver.resolve_command(app, env, task) {
        Ok(command) => Ok(command),
        Err(PulsarError::NotFound(what)) => Err(PulsarError::validation(
            "task",
            format!("unknown {what}"),
        )),
        Err(other) => Err(other),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}
