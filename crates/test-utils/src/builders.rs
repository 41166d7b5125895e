#![allow(dead_code)]

use std::path::PathBuf;

use pulsar::config::{ConfigFile, RawConfigFile, TaskConfig};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn kill_timeout(mut self, value: &str) -> Self {
        self.config.pulsar.kill_timeout = value.to_string();
        self
    }

    pub fn output_limit(mut self, limit: usize) -> Self {
        self.config.pulsar.output_limit = limit;
        self
    }

    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store.path = Some(path.into());
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                description: None,
                variables: Default::default(),
                apps: vec![],
                envs: vec![],
                cwd: None,
            },
        }
    }

    pub fn description(mut self, text: &str) -> Self {
        self.task.description = Some(text.to_string());
        self
    }

    pub fn variable(mut self, name: &str, description: &str) -> Self {
        self.task
            .variables
            .insert(name.to_string(), description.to_string());
        self
    }

    pub fn app(mut self, app: &str) -> Self {
        self.task.apps.push(app.to_string());
        self
    }

    pub fn env(mut self, env: &str) -> Self {
        self.task.envs.push(env.to_string());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.task.cwd = Some(dir.into());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
