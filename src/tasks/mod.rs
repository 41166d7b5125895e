// src/tasks/mod.rs

//! Task resolution port.
//!
//! A task resolver maps `(app, env, task)` to the command to run and lists the
//! tasks (with their declared variables) available in an app/environment. The
//! built-in [`SHELL_TASK`] is available everywhere.

pub mod config_resolver;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::exec::CommandSpec;

pub use config_resolver::ConfigTaskResolver;

/// Name of the general-purpose task every app/environment offers.
pub const SHELL_TASK: &str = "shell";

/// Variable the shell task executes.
pub const SHELL_COMMAND_VAR: &str = "command";

/// What a task declares about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared variables: name -> description.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

/// Available tasks keyed by name.
pub type TaskList = BTreeMap<String, TaskInfo>;

pub trait TaskResolver: Send + Sync {
    /// Tasks available for `app` in `env`. Implementations must include the
    /// shell task.
    fn list_tasks(&self, app: &str, env: &str) -> Result<TaskList>;

    /// Command line for `task`, or `NotFound`.
    fn resolve_command(&self, app: &str, env: &str, task: &str) -> Result<CommandSpec>;
}

pub fn shell_task() -> TaskInfo {
    let mut variables = BTreeMap::new();
    variables.insert(
        SHELL_COMMAND_VAR.to_string(),
        "shell command line to execute".to_string(),
    );
    TaskInfo {
        description: Some("Run an arbitrary shell command".to_string()),
        variables,
    }
}

/// The shell task evaluates the `command` variable from its environment.
pub fn shell_command() -> CommandSpec {
    if cfg!(windows) {
        CommandSpec::shell("%command%")
    } else {
        CommandSpec::shell("eval \"$command\"")
    }
}
