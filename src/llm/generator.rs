//! Artifact generation with the parse fallback ladder
//!
//! Service errors are retried once when transient and otherwise surface as
//! [`GenerationError`]. Anything the service *does* return ends as an
//! artifact: structured parse, one strict re-prompt for prose or code
//! answers, then heuristic synthesis.

use chrono::Datelike;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::models::{ContentArtifact, SiteProfile, TargetLength, Topic};
use crate::utils::retry::{with_retry_if, RetryConfig};

use super::parse::{self, ParseContext, ParseResult, STRUCTURED_STEPS};
use super::postprocess;
use super::prompt;
use super::{GenerationError, GenerationRequest, SharedGenerator};

/// Default number of focus keywords to splice into each artifact
pub const DEFAULT_KEYWORD_INSERTIONS: usize = 3;

/// Which ladder rung produced an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Structured,
    StrictRetry,
    Synthesized,
}

impl GenerationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::StrictRetry => "strict_retry",
            Self::Synthesized => "synthesized",
        }
    }
}

/// Generates finished artifacts from a raw [`TextGenerator`](super::TextGenerator)
#[derive(Clone)]
pub struct ContentGenerator {
    backend: SharedGenerator,
    retry: RetryConfig,
    keyword_insertions: usize,
    current_year: Option<i32>,
}

impl ContentGenerator {
    pub fn new(backend: SharedGenerator) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
            keyword_insertions: DEFAULT_KEYWORD_INSERTIONS,
            current_year: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_keyword_insertions(mut self, n: usize) -> Self {
        self.keyword_insertions = n;
        self
    }

    /// Pin the year used by prompts and stale-year patching
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = Some(year);
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn year(&self) -> i32 {
        self.current_year
            .unwrap_or_else(|| chrono::Utc::now().year())
    }

    async fn call(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        with_retry_if(
            &self.retry,
            || self.backend.complete(request),
            GenerationError::is_transient,
        )
        .await
    }

    /// Produce a finished artifact for `topic`
    pub async fn generate(
        &self,
        topic: &Topic,
        category: &str,
        target_length: TargetLength,
        profile: &SiteProfile,
    ) -> Result<ContentArtifact, GenerationError> {
        let _timer = metrics::start_generation_timer(&profile.name);
        let year = self.year();
        let ctx = ParseContext {
            site: &profile.name,
            topic,
            category,
            target_length,
        };

        let request = prompt::build_request(topic, category, target_length, profile, year);
        let raw = self.call(&request).await?;
        debug!(site = %profile.name, chars = raw.chars().count(), "Received generator output");

        let (mut artifact, stage) = match parse::run_ladder(&raw, &ctx, STRUCTURED_STEPS) {
            ParseResult::Parsed(artifact) => (artifact, GenerationStage::Structured),
            ParseResult::Malformed(_) if parse::looks_like_non_schema(&raw) => {
                self.escalate(topic, category, target_length, profile, year, &raw, &ctx)
                    .await
            }
            ParseResult::Malformed(_) => {
                warn!(site = %profile.name, topic = %topic.title, "Unparseable output, synthesizing");
                (parse::synthesize(&raw, &ctx), GenerationStage::Synthesized)
            }
        };

        postprocess::finalize(&mut artifact, profile, self.keyword_insertions, year);
        metrics::record_generation_stage(stage.as_str());
        info!(
            site = %profile.name,
            title = %artifact.title,
            sections = artifact.sections.len(),
            stage = stage.as_str(),
            "Generated artifact"
        );

        Ok(artifact)
    }

    /// One strict re-prompt; synthesis from the first answer if that fails too
    #[allow(clippy::too_many_arguments)]
    async fn escalate(
        &self,
        topic: &Topic,
        category: &str,
        target_length: TargetLength,
        profile: &SiteProfile,
        year: i32,
        original: &str,
        ctx: &ParseContext<'_>,
    ) -> (ContentArtifact, GenerationStage) {
        info!(site = %profile.name, topic = %topic.title, "Output ignored the schema, retrying with strict prompt");
        let strict = prompt::build_strict_request(topic, category, target_length, profile, year);

        match self.call(&strict).await {
            Ok(raw) => {
                if let ParseResult::Parsed(artifact) = parse::run_ladder(&raw, ctx, STRUCTURED_STEPS) {
                    return (artifact, GenerationStage::StrictRetry);
                }
                warn!(site = %profile.name, "Strict retry still malformed, synthesizing");
            }
            Err(e) => {
                warn!(site = %profile.name, error = %e, "Strict retry failed, synthesizing");
            }
        }

        (parse::synthesize(original, ctx), GenerationStage::Synthesized)
    }
}
