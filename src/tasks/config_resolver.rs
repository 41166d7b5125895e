// src/tasks/config_resolver.rs

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{ConfigFile, TaskConfig};
use crate::errors::{PulsarError, Result};
use crate::exec::CommandSpec;
use crate::tasks::{shell_command, shell_task, TaskInfo, TaskList, TaskResolver, SHELL_TASK};

/// Resolves tasks from the `[task.<name>]` sections of the config file.
///
/// A task with empty `apps` / `envs` lists is offered to every app /
/// environment; otherwise only to the listed ones.
#[derive(Debug, Clone, Default)]
pub struct ConfigTaskResolver {
    tasks: BTreeMap<String, TaskConfig>,
}

impl ConfigTaskResolver {
    pub fn new(tasks: BTreeMap<String, TaskConfig>) -> Self {
        Self { tasks }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(cfg.task.clone())
    }

    fn lookup(&self, app: &str, env: &str, task: &str) -> Option<&TaskConfig> {
        self.tasks
            .get(task)
            .filter(|cfg| cfg.applies_to(app, env))
    }
}

impl TaskResolver for ConfigTaskResolver {
    fn list_tasks(&self, app: &str, env: &str) -> Result<TaskList> {
        let mut list: TaskList = self
            .tasks
            .iter()
            .filter(|(_, cfg)| cfg.applies_to(app, env))
            .map(|(name, cfg)| {
                let info = TaskInfo {
                    description: cfg.description.clone(),
                    variables: cfg.variables.clone(),
                };
                (name.clone(), info)
            })
            .collect();

        list.insert(SHELL_TASK.to_string(), shell_task());
        debug!(app, env, tasks = list.len(), "listed tasks");
        Ok(list)
    }

    fn resolve_command(&self, app: &str, env: &str, task: &str) -> Result<CommandSpec> {
        if task == SHELL_TASK {
            return Ok(shell_command());
        }

        let cfg = self.lookup(app, env, task).ok_or_else(|| {
            PulsarError::NotFound(format!("task '{task}' for app '{app}' in env '{env}'"))
        })?;

        Ok(CommandSpec::shell(&cfg.cmd).with_cwd(cfg.cwd.clone()))
    }
}
