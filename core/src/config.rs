//! Configuration
//!
//! Responsible for setting default config, reading configs and setting.
//!
//! The following config items can be set:
//!  - Responsiveness: Milliseconds between checks for a command having finished when no
//!    output has arrived to wake us. Defaults to 20.
//!  - BackPressure: How many requests can queue up for the debugger before
//!    more are refused. Defaults to 20.
//!  - PipeRetry: Milliseconds between checks for the debugger's terminal pipe
//!    existing. Defaults to 100.
//!
//! Alongside these are the `LaunchArguments` a client sends when launching.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use crate::Result;

#[derive(Clone, Debug)]
pub struct Config {
    config: HashMap<String, i64>,
}

impl Config {
    pub fn new() -> Self {
        let mut config = HashMap::new();
        config.insert("Responsiveness".to_string(), 20);
        config.insert("BackPressure".to_string(), 20);
        config.insert("PipeRetry".to_string(), 100);
        Config { config }
    }

    /// Get a config items value
    pub fn get_config(&self, key: &str) -> Option<i64> {
        self.config.get(key).copied()
    }

    /// Set a config items value, returns false if it's not a config item
    pub fn set_config(&mut self, key: &str, value: i64) -> bool {
        match self.config.get_mut(key) {
            Some(v) => {
                *v = value;
                true
            }
            None => false,
        }
    }

    pub fn responsiveness(&self) -> Duration {
        self.get_millis("Responsiveness")
    }

    pub fn pipe_retry(&self) -> Duration {
        self.get_millis("PipeRetry")
    }

    pub fn back_pressure(&self) -> usize {
        self.get_config("BackPressure").unwrap_or(1).max(1) as usize
    }

    fn get_millis(&self, key: &str) -> Duration {
        Duration::from_millis(self.get_config(key).unwrap_or(0).max(1) as u64)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

/// The `launch` request arguments for debugging a bash script.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchArguments {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default = "default_bash")]
    pub path_bash: String,
    #[serde(default = "default_bashdb")]
    pub path_bashdb: String,
    #[serde(default = "default_mkfifo")]
    pub path_mkfifo: String,
    #[serde(default)]
    pub show_debug_output: bool,
    #[serde(default)]
    pub stop_on_entry: bool,
    #[serde(default = "default_fifo_path")]
    pub fifo_path: PathBuf,
    /// Overrides for `Config` items
    #[serde(default)]
    pub config: HashMap<String, i64>,
}

impl LaunchArguments {
    /// Read the launch arguments from the free form data in a launch request
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Apply any config overrides, returning the names of those that don't exist
    pub fn apply_config(&self, config: &mut Config) -> Vec<String> {
        let mut unknown = vec![];
        for (key, value) in &self.config {
            if !config.set_config(key, *value) {
                unknown.push(key.clone());
            }
        }
        unknown
    }
}

fn default_bash() -> String {
    "bash".to_string()
}

fn default_bashdb() -> String {
    "bashdb".to_string()
}

fn default_mkfifo() -> String {
    "mkfifo".to_string()
}

fn default_fifo_path() -> PathBuf {
    env::temp_dir().join(format!("bashdap-fifo-{}", process::id()))
}
