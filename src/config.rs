use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub recommend: RecommendConfig,
    #[serde(default)]
    pub explain: ExplainConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_path")]
    pub path: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
        }
    }
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("anime.csv")
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Number of catalog pages to request per run.
    #[serde(default = "default_pages")]
    pub pages: u32,
    /// Items per page; the Jikan API caps this at 25.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Pause between successful page requests.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Wait before retrying a page that came back 429.
    #[serde(default = "default_rate_limit_wait_secs")]
    pub rate_limit_wait_secs: u64,
    /// Attempts per page before it is skipped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            pages: default_pages(),
            page_limit: default_page_limit(),
            delay_ms: default_delay_ms(),
            rate_limit_wait_secs: default_rate_limit_wait_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.jikan.moe/v4".to_string()
}
fn default_pages() -> u32 {
    10
}
fn default_page_limit() -> u32 {
    25
}
fn default_delay_ms() -> u64 {
    1000
}
fn default_rate_limit_wait_secs() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecommendConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

fn default_top_n() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExplainConfig {
    /// `disabled` or `gemini`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_explain_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_explain_base_url(),
            model: default_model(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_explain_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}

impl ExplainConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Load and validate configuration.
///
/// A missing file is not an error: every section has usable defaults, so the
/// CLI works out of the box with `anime.csv` in the working directory.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate fetch
    if config.fetch.pages == 0 {
        anyhow::bail!("fetch.pages must be >= 1");
    }
    if !(1..=25).contains(&config.fetch.page_limit) {
        anyhow::bail!("fetch.page_limit must be in 1..=25");
    }
    if config.fetch.max_attempts == 0 {
        anyhow::bail!("fetch.max_attempts must be >= 1");
    }

    // Validate recommend
    if config.recommend.top_n == 0 {
        anyhow::bail!("recommend.top_n must be >= 1");
    }

    // Validate explain
    match config.explain.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown explain provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }

    Ok(config)
}
