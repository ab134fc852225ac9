//! Configuration management
//!
//! Configuration is read from a TOML file or from environment variables, then
//! checked with [`Config::validate`]. Every section has defaults, so a file
//! only needs the values it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::LlmConfig;
use crate::models::{SiteProfile, Topic};
use crate::scheduler::trigger::TriggerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Text generation service
    #[serde(default)]
    pub generator: LlmConfig,

    /// Nightly, recovery and weekly trigger times
    #[serde(default)]
    pub scheduler: TriggerConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Sites in publishing priority order
    #[serde(default = "default_sites")]
    pub sites: Vec<SiteConfig>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/dailypress.db"),
        }
    }
}

/// Orchestration run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Pause between sites, to respect third-party rate limits
    pub site_delay_secs: u64,

    /// How many of a site's focus keywords must appear in every post
    pub keyword_insertions: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            site_delay_secs: 3,
            keyword_insertions: 3,
        }
    }
}

/// File output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Markdown export of every generated artifact
    pub artifact_dir: PathBuf,

    /// Default directory for export-only publishers
    pub outbox_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("data/artifacts"),
            outbox_dir: PathBuf::from("data/outbox"),
        }
    }
}

/// Operational HTTP surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: String::from("127.0.0.1:8080"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

/// One site: profile, topic pool and publishing target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(flatten)]
    pub profile: SiteProfile,

    /// Fixed hash offset for topic selection
    #[serde(default)]
    pub seed_offset: Option<u64>,

    /// Topic pool; empty means the built-in pool for this site name
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,

    #[serde(default)]
    pub publisher: PublisherConfig,
}

impl SiteConfig {
    pub fn new(profile: SiteProfile) -> Self {
        Self {
            profile,
            seed_offset: None,
            categories: Vec::new(),
            publisher: PublisherConfig::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }
}

/// Candidate topics of one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

/// Publishing target of a site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublisherConfig {
    /// WordPress REST API with an application password
    Wordpress {
        base_url: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        app_password: Option<String>,
    },
    /// Write HTML files for manual upload
    Export {
        #[serde(default)]
        dir: Option<PathBuf>,
    },
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self::Export { dir: None }
    }
}

fn wordpress(base_url: &str) -> PublisherConfig {
    PublisherConfig::Wordpress {
        base_url: base_url.to_string(),
        username: None,
        app_password: None,
    }
}

fn site(
    name: &str,
    display_name: &str,
    audience: &str,
    style: &str,
    keywords_focus: &[&str],
    publisher: PublisherConfig,
) -> SiteConfig {
    SiteConfig {
        profile: SiteProfile {
            name: name.to_string(),
            display_name: display_name.to_string(),
            language: String::from("en"),
            audience: audience.to_string(),
            style: style.to_string(),
            keywords_focus: keywords_focus.iter().map(|k| k.to_string()).collect(),
        },
        seed_offset: None,
        categories: Vec::new(),
        publisher,
    }
}

/// The four default sites
pub fn default_sites() -> Vec<SiteConfig> {
    vec![
        site(
            "unpre",
            "unpre.co.kr",
            "junior developers, IT job seekers and language learners",
            "technical and practical, with code examples",
            &["developer salary", "coding bootcamp", "developer roadmap", "it certification"],
            wordpress("https://unpre.co.kr"),
        ),
        site(
            "untab",
            "untab.co.kr",
            "property investors and auction beginners",
            "professional and trustworthy, data driven",
            &["property auction", "rental yield", "property tax"],
            wordpress("https://untab.co.kr"),
        ),
        site(
            "skewese",
            "skewese.com",
            "history enthusiasts, students and teachers",
            "storytelling, engaging and educational",
            &["history books", "museum exhibitions", "history travel"],
            wordpress("https://skewese.com"),
        ),
        site(
            "tistory",
            "tistory blog",
            "general readers following current trends",
            "friendly and concise",
            &["trend", "lifestyle tips"],
            PublisherConfig::Export { dir: None },
        ),
    ]
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let sqlite_path = std::env::var("DAILYPRESS_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database.sqlite_path);

        let artifact_dir = std::env::var("DAILYPRESS_ARTIFACT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output.artifact_dir);

        let outbox_dir = std::env::var("DAILYPRESS_OUTBOX_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output.outbox_dir);

        let bind = std::env::var("DAILYPRESS_BIND").unwrap_or(defaults.server.bind);

        let log_level =
            std::env::var("DAILYPRESS_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));
        let log_format =
            std::env::var("DAILYPRESS_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        let mut config = Self {
            database: DatabaseConfig { sqlite_path },
            generator: LlmConfig::from_env(),
            scheduler: TriggerConfig::from_env(),
            orchestrator: OrchestratorConfig {
                site_delay_secs: env_or(
                    "DAILYPRESS_SITE_DELAY_SECS",
                    defaults.orchestrator.site_delay_secs,
                ),
                keyword_insertions: env_or(
                    "DAILYPRESS_KEYWORD_INSERTIONS",
                    defaults.orchestrator.keyword_insertions,
                ),
            },
            output: OutputConfig {
                artifact_dir,
                outbox_dir,
            },
            server: ServerConfig { bind },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
            sites: defaults.sites,
        };
        config.apply_env_credentials();

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;
        config.apply_env_credentials();

        Ok(config)
    }

    /// File when given, environment otherwise; always validated
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Fill WordPress credentials from `WP_<SITE>_USER` / `WP_<SITE>_PASSWORD`
    /// when the configuration leaves them empty.
    fn apply_env_credentials(&mut self) {
        for site in &mut self.sites {
            let prefix = format!("WP_{}", site.profile.name.to_uppercase());
            if let PublisherConfig::Wordpress {
                base_url,
                username,
                app_password,
            } = &mut site.publisher
            {
                if let Ok(url) = std::env::var(format!("{prefix}_URL")) {
                    *base_url = url;
                }
                if username.is_none() {
                    *username = std::env::var(format!("{prefix}_USER")).ok();
                }
                if app_password.is_none() {
                    *app_password = std::env::var(format!("{prefix}_PASSWORD")).ok();
                }
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.sites.is_empty() {
            anyhow::bail!("at least one site must be configured");
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            let name = site.name();
            if name.trim().is_empty() {
                anyhow::bail!("site name must not be empty");
            }
            if !seen.insert(name) {
                anyhow::bail!("duplicate site '{name}'");
            }
            for category in &site.categories {
                if category.name.trim().is_empty() {
                    anyhow::bail!("site '{name}' has a category without a name");
                }
            }
            if let PublisherConfig::Wordpress { base_url, .. } = &site.publisher {
                crate::utils::extract_domain(base_url)
                    .with_context(|| format!("site '{name}' has an invalid base_url"))?;
            }
        }

        if self.orchestrator.keyword_insertions > 10 {
            anyhow::bail!("keyword_insertions must be 10 or less");
        }

        self.generator
            .validate()
            .context("invalid [generator] section")?;
        self.scheduler
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid [scheduler] section: {e}"))?;

        self.server
            .bind
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("invalid server bind address '{}'", self.server.bind))?;

        Ok(())
    }

    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.name() == name)
    }

    /// Site names in priority order
    pub fn site_order(&self) -> Vec<String> {
        self.sites.iter().map(|s| s.name().to_string()).collect()
    }

    #[must_use]
    pub fn site_delay(&self) -> Duration {
        Duration::from_secs(self.orchestrator.site_delay_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            generator: LlmConfig::default(),
            scheduler: TriggerConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            output: OutputConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            sites: default_sites(),
        }
    }
}
