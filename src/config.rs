//! Configuration loading for the `cinescrape` binary.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.cinescrape/config.toml` (user)
//! 3. `/etc/cinescrape/config.toml` (system)
//!
//! `CINESCRAPE_SEARCH_URL` in the environment overrides `upstream.search_url`.
//!
//! ```toml
//! [upstream]
//! search_url = "https://movies.example/search?q={query}"
//!
//! [rate_limit]
//! requests_per_second = 0.5
//!
//! [cache]
//! snapshot_path = "/var/lib/cinescrape/cache.json"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::conversation::SessionConfig;
use crate::extract::{Extractor, SelectorConfig};
use crate::source::http::DEFAULT_USER_AGENT;
use crate::source::{HttpConfig, RateLimitConfig, RetryConfig, SearchUrlTemplate};
use crate::{CinescrapeError, Result};

/// Environment variable that overrides `upstream.search_url`.
pub const SEARCH_URL_ENV: &str = "CINESCRAPE_SEARCH_URL";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub rate_limit: RateLimitSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub sessions: SessionsSection,
    #[serde(default)]
    pub extractor: ExtractorSection,
}

/// Upstream site settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Search URL template with a `{query}` placeholder.
    #[serde(default)]
    pub search_url: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Whole-request timeout in seconds (default: 10).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            search_url: None,
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_request_timeout() -> u64 {
    10
}

/// Retry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: true,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

/// Outbound rate limit.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSection {
    #[serde(default = "default_rps")]
    pub requests_per_second: f64,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            requests_per_second: default_rps(),
            burst: default_burst(),
        }
    }
}

fn default_rps() -> f64 {
    1.0
}

fn default_burst() -> u32 {
    1
}

/// Result cache and snapshot settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    #[serde(default = "default_fresh_ttl")]
    pub fresh_ttl_secs: u64,
    #[serde(default = "default_hour")]
    pub stale_grace_secs: u64,
    #[serde(default = "default_hour")]
    pub negative_ttl_secs: u64,
    /// Snapshot file. Snapshots are disabled when unset.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            fresh_ttl_secs: default_fresh_ttl(),
            stale_grace_secs: default_hour(),
            negative_ttl_secs: default_hour(),
            snapshot_path: None,
            snapshot_interval_secs: default_snapshot_interval(),
        }
    }
}

fn default_max_entries() -> u64 {
    1_000
}

fn default_fresh_ttl() -> u64 {
    24 * 3600
}

fn default_hour() -> u64 {
    3600
}

fn default_snapshot_interval() -> u64 {
    300
}

/// Chat session settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionsSection {
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_idle_timeout() -> u64 {
    15 * 60
}

fn default_sweep_interval() -> u64 {
    60
}

/// Selector overrides for the primary extraction strategy.
///
/// Unset fields keep the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractorSection {
    pub container: Option<String>,
    pub item: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub year: Option<String>,
    pub rating: Option<String>,
    pub description: Option<String>,
    pub poster: Option<String>,
    pub no_results: Option<String>,
}

impl ExtractorSection {
    fn selectors(&self) -> SelectorConfig {
        let mut config = SelectorConfig::default();
        let overrides = [
            (&mut config.container, &self.container),
            (&mut config.item, &self.item),
            (&mut config.title, &self.title),
            (&mut config.link, &self.link),
            (&mut config.year, &self.year),
            (&mut config.rating, &self.rating),
            (&mut config.description, &self.description),
            (&mut config.poster, &self.poster),
            (&mut config.no_results, &self.no_results),
        ];
        for (field, value) in overrides {
            if let Some(value) = value {
                *field = value.clone();
            }
        }
        config
    }
}

/// Validated, typed form of [`Config`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub search_url: String,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub selectors: SelectorConfig,
    pub sessions: SessionConfig,
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_interval: Duration,
    pub sweep_interval: Duration,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.cinescrape/config.toml`
    /// 3. `/etc/cinescrape/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            CinescrapeError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content).map_err(|e| match e {
            CinescrapeError::Configuration(msg) => {
                CinescrapeError::Configuration(format!("{path:?}: {msg}"))
            }
            other => other,
        })
    }

    /// Parse TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            CinescrapeError::Configuration(format!("Failed to parse config: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(CinescrapeError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".cinescrape").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/cinescrape/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(CinescrapeError::Configuration(
            "No config file found. Create ~/.cinescrape/config.toml or /etc/cinescrape/config.toml"
                .to_string(),
        ))
    }

    /// Validate against the process environment.
    pub fn validate(&self) -> Result<Settings> {
        self.validate_with_env(std::env::var(SEARCH_URL_ENV).ok())
    }

    /// Validate, with `env_search_url` taking precedence over the file.
    pub fn validate_with_env(&self, env_search_url: Option<String>) -> Result<Settings> {
        let search_url = env_search_url
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.upstream.search_url.clone())
            .ok_or_else(|| {
                CinescrapeError::Configuration(format!(
                    "upstream.search_url is required (or set {SEARCH_URL_ENV})"
                ))
            })?;
        SearchUrlTemplate::new(search_url.as_str())?;

        require(
            self.upstream.request_timeout_secs > 0,
            "upstream.request_timeout_secs must be > 0",
        )?;
        require(self.retry.max_attempts > 0, "retry.max_attempts must be > 0")?;
        require(
            self.rate_limit.requests_per_second.is_finite()
                && self.rate_limit.requests_per_second > 0.0,
            "rate_limit.requests_per_second must be > 0",
        )?;
        require(self.rate_limit.burst > 0, "rate_limit.burst must be > 0")?;
        require(self.cache.max_entries > 0, "cache.max_entries must be > 0")?;
        require(self.cache.fresh_ttl_secs > 0, "cache.fresh_ttl_secs must be > 0")?;
        require(self.cache.negative_ttl_secs > 0, "cache.negative_ttl_secs must be > 0")?;
        require(
            self.cache.snapshot_interval_secs > 0,
            "cache.snapshot_interval_secs must be > 0",
        )?;
        require(self.sessions.idle_timeout_secs > 0, "sessions.idle_timeout_secs must be > 0")?;
        require(
            self.sessions.sweep_interval_secs > 0,
            "sessions.sweep_interval_secs must be > 0",
        )?;

        let selectors = self.extractor.selectors();
        Extractor::new(&selectors)?;

        Ok(Settings {
            search_url,
            http: HttpConfig::new()
                .user_agent(self.upstream.user_agent.clone())
                .request_timeout(Duration::from_secs(self.upstream.request_timeout_secs)),
            retry: RetryConfig::new()
                .max_attempts(self.retry.max_attempts)
                .initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
                .max_delay(Duration::from_millis(self.retry.max_delay_ms))
                .jitter(self.retry.jitter),
            rate_limit: RateLimitConfig::new()
                .requests_per_second(self.rate_limit.requests_per_second)
                .burst(self.rate_limit.burst),
            cache: CacheConfig::new()
                .max_entries(self.cache.max_entries)
                .fresh_ttl(Duration::from_secs(self.cache.fresh_ttl_secs))
                .stale_grace(Duration::from_secs(self.cache.stale_grace_secs))
                .negative_ttl(Duration::from_secs(self.cache.negative_ttl_secs)),
            selectors,
            sessions: SessionConfig::new()
                .idle_timeout(Duration::from_secs(self.sessions.idle_timeout_secs)),
            snapshot_path: self.cache.snapshot_path.clone(),
            snapshot_interval: Duration::from_secs(self.cache.snapshot_interval_secs),
            sweep_interval: Duration::from_secs(self.sessions.sweep_interval_secs),
        })
    }
}

fn require(ok: bool, message: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(CinescrapeError::Configuration(message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://movies.example/search?q={query}";

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.rate_limit.requests_per_second, 1.0);
        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.cache.fresh_ttl_secs, 86_400);
        assert_eq!(config.sessions.idle_timeout_secs, 900);
        assert!(config.cache.snapshot_path.is_none());
    }

    #[test]
    fn parse_minimal_config() {
        let config = Config::parse(
            r#"
            [upstream]
            search_url = "https://movies.example/search?q={query}"
        "#,
        )
        .unwrap();
        let settings = config.validate_with_env(None).unwrap();
        assert_eq!(settings.search_url, URL);
        // Defaults preserved
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.cache.negative_ttl, Duration::from_secs(3600));
        assert_eq!(settings.selectors, SelectorConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let config = Config::parse(
            r#"
            [upstream]
            search_url = "https://movies.example/search?q={query}"
            user_agent = "moviebot/1.0"
            request_timeout_secs = 4

            [retry]
            max_attempts = 5
            initial_delay_ms = 100
            max_delay_ms = 2000
            jitter = false

            [rate_limit]
            requests_per_second = 0.5
            burst = 2

            [cache]
            max_entries = 50
            fresh_ttl_secs = 600
            stale_grace_secs = 60
            negative_ttl_secs = 120
            snapshot_path = "/tmp/cinescrape.json"

            [sessions]
            idle_timeout_secs = 30

            [extractor]
            item = ".film"
        "#,
        )
        .unwrap();
        let settings = config.validate_with_env(None).unwrap();
        assert_eq!(settings.http.user_agent, "moviebot/1.0");
        assert_eq!(settings.http.request_timeout, Duration::from_secs(4));
        assert_eq!(settings.retry.max_attempts, 5);
        assert!(!settings.retry.jitter);
        assert_eq!(settings.rate_limit.burst, 2);
        assert_eq!(settings.cache.max_entries, 50);
        assert_eq!(settings.cache.stale_grace, Duration::from_secs(60));
        assert_eq!(settings.sessions.idle_timeout, Duration::from_secs(30));
        assert_eq!(settings.selectors.item, ".film");
        assert_eq!(settings.selectors.title, SelectorConfig::default().title);
        assert_eq!(
            settings.snapshot_path.as_deref(),
            Some(Path::new("/tmp/cinescrape.json"))
        );
    }

    #[test]
    fn env_overrides_file() {
        let config = Config::parse(
            r#"
            [upstream]
            search_url = "https://movies.example/search?q={query}"
        "#,
        )
        .unwrap();
        let settings = config
            .validate_with_env(Some("https://other.example/find/{query}".into()))
            .unwrap();
        assert_eq!(settings.search_url, "https://other.example/find/{query}");
    }

    #[test]
    fn missing_search_url_is_rejected() {
        let err = Config::default().validate_with_env(None).unwrap_err();
        assert!(err.to_string().contains("search_url"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            "[upstream]\nsearch_url = \"https://movies.example/search\"",
            "[upstream]\nsearch_url = \"ftp://movies.example/{query}\"",
            "[retry]\nmax_attempts = 0",
            "[rate_limit]\nrequests_per_second = 0.0",
            "[cache]\nfresh_ttl_secs = 0",
            "[cache]\nmax_entries = 0",
            "[extractor]\nitem = \"[[\"",
        ];
        for case in cases {
            let config = Config::parse(case).unwrap();
            let env = (!case.starts_with("[upstream]")).then(|| URL.to_string());
            assert!(
                matches!(
                    config.validate_with_env(env),
                    Err(CinescrapeError::Configuration(_))
                ),
                "{case}"
            );
        }
    }

    #[test]
    fn unreadable_toml_is_configuration_error() {
        assert!(matches!(
            Config::parse("[upstream"),
            Err(CinescrapeError::Configuration(_))
        ));
    }

    #[test]
    fn explicit_missing_path_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/cinescrape.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
