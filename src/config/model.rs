// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [pulsar]
/// kill_timeout = "5s"
/// output_limit = 1000
///
/// [store]
/// path = ".pulsar/jobs.json"
///
/// [task.deploy]
/// cmd = "cap $PULSAR_ENV deploy"
/// description = "Deploy the application"
/// variables = { revision = "git revision to deploy" }
/// apps = ["example"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub pulsar: PulsarSection,

    #[serde(default)]
    pub store: StoreSection,

    /// Task templates keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub pulsar: PulsarSection,
    pub store: StoreSection,
    pub task: BTreeMap<String, TaskConfig>,
    /// `pulsar.kill_timeout`, parsed.
    pub kill_timeout: Duration,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, kill_timeout: Duration) -> Self {
        Self {
            pulsar: raw.pulsar,
            store: raw.store,
            task: raw.task,
            kill_timeout,
        }
    }
}

/// `[pulsar]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PulsarSection {
    /// Delay before a graceful kill escalates to a forced kill, e.g. `"5s"`,
    /// `"200ms"`.
    #[serde(default = "default_kill_timeout")]
    pub kill_timeout: String,

    /// Captured output lines kept per job; 0 keeps everything.
    #[serde(default = "default_output_limit")]
    pub output_limit: usize,
}

fn default_kill_timeout() -> String {
    "5s".to_string()
}

fn default_output_limit() -> usize {
    1000
}

impl Default for PulsarSection {
    fn default() -> Self {
        Self {
            kill_timeout: default_kill_timeout(),
            output_limit: default_output_limit(),
        }
    }
}

/// `[store]` section. Without a `path`, jobs are kept in memory only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Shell command line to execute. Job variables are exported to its
    /// environment.
    pub cmd: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Declared variables: name -> description.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Apps this task is offered to; empty means all.
    #[serde(default)]
    pub apps: Vec<String>,

    /// Environments this task is offered in; empty means all.
    #[serde(default)]
    pub envs: Vec<String>,

    /// Working directory for the process.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl TaskConfig {
    pub fn applies_to(&self, app: &str, env: &str) -> bool {
        let app_ok = self.apps.is_empty() || self.apps.iter().any(|a| a == app);
        let env_ok = self.envs.is_empty() || self.envs.iter().any(|e| e == env);
        app_ok && env_ok
    }
}
