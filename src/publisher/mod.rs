//! Publish adapters
//!
//! One adapter per target platform. The orchestrator only sees
//! [`PublishAdapter::publish`], which never errors: every failure comes back
//! as [`PublishOutcome::Rejected`] with the message stored on the slot.
//!
//! - [`WordPressAdapter`]: WordPress REST API with an application password
//! - [`ExportAdapter`]: HTML files in an outbox directory for platforms
//!   without an API

pub mod export;
pub mod wordpress;

pub use export::ExportAdapter;
pub use wordpress::WordPressAdapter;

use anyhow::Context;
use async_trait::async_trait;
use handlebars::Handlebars;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, PublisherConfig};
use crate::models::ContentArtifact;

const POST_TEMPLATE: &str = include_str!("../../templates/post.html.hbs");

// ============================================================================
// Errors and outcome
// ============================================================================

#[derive(Debug, Error)]
pub enum PublishError {
    /// Timeout, connection failure, 429 or 5xx
    #[error("transient platform failure: {0}")]
    Transient(String),

    #[error("platform rejected the post: {0}")]
    Rejected(String),

    #[error("no credentials configured for {0}")]
    MissingCredentials(String),

    #[error("failed to render post body: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PublishError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<handlebars::RenderError> for PublishError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::Render(err.to_string())
    }
}

/// `(success, url_or_error)` of one publish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { url: String },
    Rejected { error: String },
}

impl PublishOutcome {
    pub fn success(&self) -> bool {
        matches!(self, Self::Published { .. })
    }

    pub fn url_or_error(&self) -> &str {
        match self {
            Self::Published { url } => url,
            Self::Rejected { error } => error,
        }
    }
}

impl From<Result<String, PublishError>> for PublishOutcome {
    fn from(result: Result<String, PublishError>) -> Self {
        match result {
            Ok(url) => Self::Published { url },
            Err(e) => Self::Rejected {
                error: e.to_string(),
            },
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// What a platform receives: rendered HTML plus labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
}

impl PublishRequest {
    /// Render `artifact` for the category it was scheduled under
    pub fn from_artifact(artifact: &ContentArtifact, category: &str) -> Result<Self, PublishError> {
        Ok(Self {
            title: artifact.title.clone(),
            body: render_html(artifact)?,
            tags: artifact.tags.clone(),
            categories: vec![category.replace('_', " ")],
        })
    }
}

#[derive(Serialize)]
struct HtmlSection<'a> {
    heading: &'a str,
    paragraphs: Vec<&'a str>,
}

#[derive(Serialize)]
struct HtmlPost<'a> {
    introduction: &'a str,
    sections: Vec<HtmlSection<'a>>,
    conclusion: &'a str,
    conclusion_heading: &'a str,
    tags: &'a [String],
}

fn paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// HTML body of a post; text is escaped
pub fn render_html(artifact: &ContentArtifact) -> Result<String, PublishError> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(false);
    registry
        .register_template_string("post", POST_TEMPLATE)
        .map_err(|e| PublishError::Render(e.to_string()))?;

    let data = HtmlPost {
        introduction: &artifact.introduction,
        sections: artifact
            .sections
            .iter()
            .map(|s| HtmlSection {
                heading: &s.heading,
                paragraphs: paragraphs(&s.content),
            })
            .collect(),
        conclusion: &artifact.conclusion,
        conclusion_heading: "Conclusion",
        tags: &artifact.tags,
    };

    Ok(registry.render("post", &data)?)
}

// ============================================================================
// Adapter boundary
// ============================================================================

#[async_trait]
pub trait PublishAdapter: Send + Sync {
    /// Platform name for logs and attempt records
    fn platform(&self) -> &str;

    async fn publish(&self, request: &PublishRequest) -> PublishOutcome;
}

pub type SharedAdapter = Arc<dyn PublishAdapter>;

/// Site name to adapter
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, SharedAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, site: impl Into<String>, adapter: SharedAdapter) {
        self.adapters.insert(site.into(), adapter);
    }

    pub fn with(mut self, site: impl Into<String>, adapter: SharedAdapter) -> Self {
        self.register(site, adapter);
        self
    }

    pub fn get(&self, site: &str) -> Option<SharedAdapter> {
        self.adapters.get(site).cloned()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// One adapter per configured site
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut registry = Self::new();
        for site in &config.sites {
            let adapter: SharedAdapter = match &site.publisher {
                PublisherConfig::Wordpress {
                    base_url,
                    username,
                    app_password,
                } => Arc::new(
                    WordPressAdapter::new(base_url, username.clone(), app_password.clone())
                        .with_context(|| format!("Failed to create WordPress client for {}", site.name()))?,
                ),
                PublisherConfig::Export { dir } => {
                    let dir = dir
                        .clone()
                        .unwrap_or_else(|| config.output.outbox_dir.join(site.name()));
                    Arc::new(ExportAdapter::new(dir, site.name()))
                }
            };
            tracing::debug!(site = %site.name(), platform = adapter.platform(), "Registered publish adapter");
            registry.register(site.name(), adapter);
        }
        Ok(registry)
    }
}
