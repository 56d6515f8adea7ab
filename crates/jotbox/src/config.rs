use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub triage: TriageConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Pool size. The CLI only ever needs one connection; `jot serve`
    /// benefits from a few.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct TriageConfig {
    /// Maximum pending items classified per triage invocation.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum recently-done items sent along as classifier context.
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            context_limit: default_context_limit(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}
fn default_context_limit() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    /// `"openai"` or `"disabled"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

impl ClassifierConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    /// Owner scope stamped on items captured via the CLI.
    #[serde(default = "default_owner")]
    pub owner: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
        }
    }
}

fn default_owner() -> String {
    "local".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7400".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.triage.batch_size == 0 {
        anyhow::bail!("triage.batch_size must be > 0");
    }

    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be > 0");
    }

    match config.classifier.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown classifier provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.classifier.provider == "openai" && config.classifier.model.is_none() {
        anyhow::bail!("classifier.model must be specified when provider is 'openai'");
    }

    Ok(config)
}
