//! Application configuration structures.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variables consulted by [`Config::apply_env_overrides`].
pub const ENV_ORGANIZATION: &str = "ROSTER_ORGANIZATION";
pub const ENV_BUCKET: &str = "ROSTER_BUCKET";
pub const ENV_REGION: &str = "ROSTER_REGION";
pub const ENV_BACKEND: &str = "ROSTER_BACKEND";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listing source and HTTP behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// CSS selectors for the member listing markup
    #[serde(default)]
    pub selectors: MemberSelectors,

    /// Snapshot storage location and key naming
    #[serde(default)]
    pub storage: StorageConfig,

    /// Driver behavior
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from process environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(org) = lookup(ENV_ORGANIZATION) {
            self.crawler.organization = org;
        }
        if let Some(bucket) = lookup(ENV_BUCKET) {
            self.storage.bucket = bucket;
        }
        if let Some(region) = lookup(ENV_REGION) {
            self.storage.region = region;
        }
        if let Some(backend) = lookup(ENV_BACKEND) {
            self.storage.backend = backend.parse()?;
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.organization.trim().is_empty() {
            return Err(AppError::validation("crawler.organization is empty"));
        }
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_pages == 0 {
            return Err(AppError::validation("crawler.max_pages must be > 0"));
        }
        url::Url::parse(&self.crawler.base_url)?;

        for (field, selector) in [
            ("selectors.member", &self.selectors.member),
            ("selectors.name", &self.selectors.name),
            ("selectors.stats", &self.selectors.stats),
            ("selectors.likes", &self.selectors.likes),
        ] {
            if selector.trim().is_empty() {
                return Err(AppError::validation(format!("{field} is empty")));
            }
        }

        self.storage.validate()?;

        if self.pipeline.staging_file.as_os_str().is_empty() {
            return Err(AppError::validation("pipeline.staging_file is empty"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            selectors: MemberSelectors::default(),
            storage: StorageConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Listing source and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Organization whose members are listed
    #[serde(default = "defaults::organization")]
    pub organization: String,

    /// Base URL of the listing site
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Upper bound on pages fetched in one crawl
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            organization: defaults::organization(),
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_pages: defaults::max_pages(),
        }
    }
}

/// CSS selectors used to extract members from one listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSelectors {
    /// One element per member
    #[serde(default = "defaults::member_selector")]
    pub member: String,

    /// Member name, relative to the member element
    #[serde(default = "defaults::name_selector")]
    pub name: String,

    /// Counter elements; the first holds posts, the last contributions
    #[serde(default = "defaults::stats_selector")]
    pub stats: String,

    /// Like counter on a single item page
    #[serde(default = "defaults::likes_selector")]
    pub likes: String,
}

impl Default for MemberSelectors {
    fn default() -> Self {
        Self {
            member: defaults::member_selector(),
            name: defaults::name_selector(),
            stats: defaults::stats_selector(),
            likes: defaults::likes_selector(),
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Local,
    S3,
}

impl FromStr for Backend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            other => Err(AppError::config(format!("unknown storage backend '{other}'"))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::S3 => f.write_str("s3"),
        }
    }
}

/// Snapshot storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::backend")]
    pub backend: Backend,

    /// S3 bucket name
    #[serde(default = "defaults::bucket")]
    pub bucket: String,

    /// S3 region
    #[serde(default = "defaults::region")]
    pub region: String,

    /// Optional key prefix shared by all snapshot keys
    #[serde(default)]
    pub prefix: String,

    /// Root directory for the local backend
    #[serde(default = "defaults::local_dir")]
    pub local_dir: PathBuf,

    /// Alias key overwritten on every run
    #[serde(default = "defaults::latest_key")]
    pub latest_key: String,

    /// strftime pattern for the dated key
    #[serde(default = "defaults::dated_key_format")]
    pub dated_key_format: String,
}

impl StorageConfig {
    /// Key of the "latest" alias.
    pub fn latest_key(&self) -> String {
        self.prefixed(&self.latest_key)
    }

    /// Key of the snapshot for a given day.
    pub fn dated_key(&self, date: NaiveDate) -> String {
        let name = date.format(&self.dated_key_format).to_string();
        self.prefixed(&name)
    }

    fn prefixed(&self, name: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}/{name}")
        }
    }

    fn validate(&self) -> Result<()> {
        if self.latest_key.trim().is_empty() {
            return Err(AppError::validation("storage.latest_key is empty"));
        }
        if StrftimeItems::new(&self.dated_key_format).any(|item| matches!(item, Item::Error)) {
            return Err(AppError::validation(format!(
                "storage.dated_key_format '{}' is not a valid date format",
                self.dated_key_format
            )));
        }

        // Consecutive days must map to distinct keys, neither equal to the alias.
        let day = NaiveDate::from_ymd_opt(2000, 1, 1)
            .ok_or_else(|| AppError::validation("invalid reference date"))?;
        let next = NaiveDate::from_ymd_opt(2000, 1, 2)
            .ok_or_else(|| AppError::validation("invalid reference date"))?;
        let (first, second) = (self.dated_key(day), self.dated_key(next));
        if first == second {
            return Err(AppError::validation(
                "storage.dated_key_format must include the day",
            ));
        }
        if first == self.latest_key() || second == self.latest_key() {
            return Err(AppError::validation(
                "storage.dated_key_format collides with storage.latest_key",
            ));
        }

        if self.backend == Backend::S3 {
            if self.bucket.trim().is_empty() {
                return Err(AppError::validation("storage.bucket is empty"));
            }
            if self.region.trim().is_empty() {
                return Err(AppError::validation("storage.region is empty"));
            }
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: defaults::backend(),
            bucket: defaults::bucket(),
            region: defaults::region(),
            prefix: String::new(),
            local_dir: defaults::local_dir(),
            latest_key: defaults::latest_key(),
            dated_key_format: defaults::dated_key_format(),
        }
    }
}

/// Pipeline driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Local file the encoded diff is staged to before upload
    #[serde(default = "defaults::staging_file")]
    pub staging_file: PathBuf,

    /// Abort when the prior snapshot cannot be read for reasons other than
    /// a missing key. When false the run continues with an empty history.
    #[serde(default = "defaults::abort_on_store_outage")]
    pub abort_on_store_outage: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            staging_file: defaults::staging_file(),
            abort_on_store_outage: defaults::abort_on_store_outage(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::Backend;

    // Crawler defaults
    pub fn organization() -> String {
        "gumi".into()
    }
    pub fn base_url() -> String {
        "https://qiita.com".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; roster/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_pages() -> u32 {
        1000
    }

    // Selector defaults
    pub fn member_selector() -> String {
        ".organizationMemberList_memberProfile".into()
    }
    pub fn name_selector() -> String {
        ".organizationMemberList_userName".into()
    }
    pub fn stats_selector() -> String {
        ".organizationMemberList_memberStats".into()
    }
    pub fn likes_selector() -> String {
        ".js-likecount".into()
    }

    // Storage defaults
    pub fn backend() -> Backend {
        Backend::S3
    }
    pub fn bucket() -> String {
        "gumi-qiita".into()
    }
    pub fn region() -> String {
        "ap-northeast-1".into()
    }
    pub fn local_dir() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn latest_key() -> String {
        "qiita.csv".into()
    }
    pub fn dated_key_format() -> String {
        "qiita-%Y-%m-%d.csv".into()
    }

    // Pipeline defaults
    pub fn staging_file() -> PathBuf {
        std::env::temp_dir().join("qiita.csv")
    }
    pub fn abort_on_store_outage() -> bool {
        true
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
