// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PulsarError, Result};
use crate::manager::validate::{
    is_illegal_task, is_reserved_variable, is_valid_task_name, is_valid_variable_name,
};
use crate::tasks::SHELL_TASK;

/// Upper bound for `[pulsar].kill_timeout`.
pub const MAX_KILL_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PulsarError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let kill_timeout = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, kill_timeout))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<Duration> {
    let kill_timeout = validate_global_config(cfg)?;
    validate_tasks(cfg)?;
    Ok(kill_timeout)
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<Duration> {
    let kill_timeout = parse_duration(&cfg.pulsar.kill_timeout).map_err(|e| {
        PulsarError::ConfigError(format!("[pulsar].kill_timeout: {e}"))
    })?;

    if kill_timeout.is_zero() {
        return Err(PulsarError::ConfigError(
            "[pulsar].kill_timeout must be greater than zero".to_string(),
        ));
    }
    if kill_timeout > MAX_KILL_TIMEOUT {
        return Err(PulsarError::ConfigError(format!(
            "[pulsar].kill_timeout must be at most {}h",
            MAX_KILL_TIMEOUT.as_secs() / 3600
        )));
    }

    Ok(kill_timeout)
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if name == SHELL_TASK {
            return Err(PulsarError::ConfigError(format!(
                "task '{SHELL_TASK}' is built in and cannot be redefined"
            )));
        }
        if !is_valid_task_name(name) {
            return Err(PulsarError::ConfigError(format!(
                "task name '{name}' contains illegal characters"
            )));
        }
        if is_illegal_task(name) {
            return Err(PulsarError::ConfigError(format!(
                "task name '{name}' is reserved"
            )));
        }
        if task.cmd.trim().is_empty() {
            return Err(PulsarError::ConfigError(format!(
                "task '{name}' has an empty `cmd`"
            )));
        }
        for var in task.variables.keys() {
            if !is_valid_variable_name(var) {
                return Err(PulsarError::ConfigError(format!(
                    "task '{name}' declares invalid variable name '{var}'"
                )));
            }
            if is_reserved_variable(var) {
                return Err(PulsarError::ConfigError(format!(
                    "task '{name}' declares reserved variable name '{var}'"
                )));
            }
        }
    }
    Ok(())
}

/// Parse a duration like `"200ms"`, `"5s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
