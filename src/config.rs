use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// How long a successful refresh is served from memory, in minutes
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_minutes: u64,
    /// Per-request timeout for feed fetches, in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// When set, feed requests are routed through `{proxy_base}/api/proxy`
    /// instead of hitting the source directly.
    #[serde(default)]
    pub proxy_base: Option<String>,
    pub sources: Vec<NewsSource>,
}

fn default_cache_ttl() -> u64 {
    15
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Api,
}

fn default_source_kind() -> SourceKind {
    SourceKind::Rss
}

fn default_enabled() -> bool {
    true
}

fn default_priority() -> u8 {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewsSource {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default = "default_source_kind")]
    pub kind: SourceKind,
    pub category: String,
    #[serde(default)]
    pub region: Option<String>,
    pub language: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 0-100, higher fetches first
    #[serde(default = "default_priority")]
    pub priority: u8,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        for source in &config.sources {
            if source.priority > 100 {
                anyhow::bail!(
                    "source '{}' has priority {} (must be 0-100)",
                    source.id,
                    source.priority
                );
            }
        }
        Ok(config)
    }

    /// Enabled sources, highest priority first.
    pub fn active_sources(&self) -> Vec<NewsSource> {
        let mut sources: Vec<NewsSource> =
            self.sources.iter().filter(|s| s.enabled).cloned().collect();
        sources.sort_by(|a, b| b.priority.cmp(&a.priority));
        sources
    }
}
