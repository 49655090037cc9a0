use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub sources: Vec<SourceConfig>,
}

/// One curated news source. The set of sources is fixed configuration
/// data; nothing mutates it at runtime.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// Display name, e.g. "BBC World"
    pub name: String,
    /// Stable identifier, e.g. "bbc". Unique across the config.
    pub slug: String,
    /// Homepage URL
    pub url: String,
    /// RSS/Atom feed URL
    pub feed_url: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.slug.as_str()) {
                anyhow::bail!("duplicate source slug '{}'", source.slug);
            }
        }
        Ok(())
    }
}
