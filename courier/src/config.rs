//! Configuration file discovery and loading

use std::path::{Path, PathBuf};

use anyhow::Context;
use courier_dispatch::{DispatchConfig, Message};
use serde::Deserialize;

pub const CONFIG_ENV: &str = "COURIER_CONFIG";

const DEFAULT_PATHS: [&str; 2] = ["./courier.config.ron", "/etc/courier/courier.config.ron"];

const fn default_failure_rate() -> f64 {
    0.0
}

/// A provider that fails at random, standing in for an external service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulatedProviderConfig {
    pub name: String,
    /// Probability in `[0, 1]` that a delivery attempt fails
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,
    /// Delay before each attempt resolves
    #[serde(default)]
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CourierConfig {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(alias = "provider")]
    pub providers: Vec<SimulatedProviderConfig>,
}

impl CourierConfig {
    /// Read and parse a configuration file
    ///
    /// # Errors
    /// If the file cannot be read or is not a valid configuration
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        ron::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Check the simulated providers make sense.
    ///
    /// # Errors
    /// If a provider has an empty or repeated name, or a failure rate outside
    /// `[0, 1]`
    pub fn validate(&self) -> anyhow::Result<()> {
        for (index, provider) in self.providers.iter().enumerate() {
            anyhow::ensure!(
                !provider.name.trim().is_empty(),
                "Provider #{index} has an empty name"
            );
            anyhow::ensure!(
                (0.0..=1.0).contains(&provider.failure_rate),
                "Provider {} has failure_rate {} outside [0, 1]",
                provider.name,
                provider.failure_rate
            );
            anyhow::ensure!(
                !self.providers[..index]
                    .iter()
                    .any(|other| other.name == provider.name),
                "Provider {} is configured more than once",
                provider.name
            );
        }

        Ok(())
    }
}

/// Find the configuration file using the following precedence:
/// 1. An explicitly given path (`--config`)
/// 2. `COURIER_CONFIG` environment variable
/// 3. ./courier.config.ron (current working directory)
/// 4. /etc/courier/courier.config.ron (system-wide config)
///
/// # Errors
/// If an explicit or environment path does not exist, or none of the default
/// paths do
pub fn find_config_file(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let defaults = DEFAULT_PATHS.map(PathBuf::from);
    locate(explicit, std::env::var(CONFIG_ENV).ok(), &defaults)
}

fn locate(
    explicit: Option<PathBuf>,
    env_path: Option<String>,
    defaults: &[PathBuf],
) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        anyhow::ensure!(
            path.exists(),
            "Config file does not exist: {}",
            path.display()
        );
        return Ok(path);
    }

    if let Some(env_path) = env_path {
        let path = PathBuf::from(env_path);
        anyhow::ensure!(
            path.exists(),
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
        return Ok(path);
    }

    if let Some(path) = defaults.iter().find(|path| path.exists()) {
        return Ok(path.clone());
    }

    let paths_tried = defaults
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - --config argument\n  \
         - {CONFIG_ENV} environment variable\n{paths_tried}"
    )
}

/// Load the batch of messages to dispatch from a RON list
///
/// # Errors
/// If the file cannot be read or parsed
pub fn load_messages(path: &Path) -> anyhow::Result<Vec<Message>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read messages from {}", path.display()))?;

    ron::from_str(&content)
        .with_context(|| format!("Failed to parse messages from {}", path.display()))
}
