use crate::paths::AppPaths;
use crate::site::SiteRule;
use crate::{Result, ScrapeError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const DEFAULT_MAX_GENERIC_RESULTS: usize = 20;
const MAX_MAX_GENERIC_RESULTS: usize = 200;
const MAX_DELAY_MS: u64 = 10_000;
const MIN_TIMEOUT_MS: u64 = 500;
const MAX_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub user_agent: String,
    pub page_timeout_ms: u64,
    pub photo_page_timeout_ms: u64,
    pub image_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    /// Pause before each photo page fetch in the site-specific pass.
    pub photo_page_delay_ms: u64,
    /// Pause before each image download.
    pub download_delay_ms: u64,
    pub max_generic_results: usize,
    pub site_rules: Vec<SiteRule>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_timeout_ms: 15_000,
            photo_page_timeout_ms: 10_000,
            image_timeout_ms: 10_000,
            probe_timeout_ms: 5_000,
            photo_page_delay_ms: 200,
            download_delay_ms: 100,
            max_generic_results: DEFAULT_MAX_GENERIC_RESULTS,
            site_rules: vec![SiteRule::oricon_news()],
        }
    }
}

impl ScraperConfig {
    /// Clamps limits into their supported ranges and drops unusable rules.
    pub fn normalized(mut self) -> Self {
        let user_agent = self.user_agent.trim();
        self.user_agent = if user_agent.is_empty() {
            DEFAULT_USER_AGENT.to_string()
        } else {
            user_agent.to_string()
        };
        for timeout in [
            &mut self.page_timeout_ms,
            &mut self.photo_page_timeout_ms,
            &mut self.image_timeout_ms,
            &mut self.probe_timeout_ms,
        ] {
            *timeout = (*timeout).clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);
        }
        self.photo_page_delay_ms = self.photo_page_delay_ms.min(MAX_DELAY_MS);
        self.download_delay_ms = self.download_delay_ms.min(MAX_DELAY_MS);
        self.max_generic_results = self
            .max_generic_results
            .clamp(1, MAX_MAX_GENERIC_RESULTS);
        self.site_rules
            .retain(|rule| !rule.url_pattern.trim().is_empty() && !rule.link_selectors.is_empty());
        self
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn photo_page_timeout(&self) -> Duration {
        Duration::from_millis(self.photo_page_timeout_ms)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn photo_page_delay(&self) -> Duration {
        Duration::from_millis(self.photo_page_delay_ms)
    }

    pub fn download_delay(&self) -> Duration {
        Duration::from_millis(self.download_delay_ms)
    }

    /// First rule whose pattern occurs in `url`.
    pub fn rule_for(&self, url: &str) -> Option<&SiteRule> {
        self.site_rules.iter().find(|rule| rule.matches(url))
    }
}

pub fn load_config(paths: &AppPaths) -> Result<ScraperConfig> {
    load_config_from(&paths.scraper_config_path())
}

pub fn load_config_from(path: &Path) -> Result<ScraperConfig> {
    if !path.exists() {
        return Ok(ScraperConfig::default());
    }
    let bytes = std::fs::read(path)?;
    let parsed: ScraperConfig = serde_json::from_slice(&bytes).map_err(|e| {
        ScrapeError::Config(format!(
            "failed to parse scraper config at {}: {e}",
            path.to_string_lossy()
        ))
    })?;
    Ok(parsed.normalized())
}

pub fn save_config(paths: &AppPaths, config: &ScraperConfig) -> Result<()> {
    let path = paths.scraper_config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(())
}
