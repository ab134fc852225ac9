//! Markdown export of generated artifacts
//!
//! Every artifact is rendered through a Handlebars template and written under
//! `{output_dir}/{site}/`. The returned path is stored as the artifact's
//! `file_reference`.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use handlebars::Handlebars;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{ContentArtifact, Section};
use crate::utils::slugify;

/// Default artifact template
const DEFAULT_TEMPLATE: &str = include_str!("../../templates/artifact.md.hbs");

#[derive(Debug, Serialize)]
struct ArtifactTemplateData<'a> {
    title: String,
    site: &'a str,
    date: String,
    status: &'static str,
    meta_description: String,
    introduction: &'a str,
    sections: &'a [Section],
    conclusion: &'a str,
    tags: &'a [String],
    keywords: &'a [String],
}

impl<'a> ArtifactTemplateData<'a> {
    fn new(artifact: &'a ContentArtifact, date: NaiveDate) -> Self {
        Self {
            title: artifact.title.replace('"', "\\\""),
            site: &artifact.site,
            date: date.to_string(),
            status: artifact.status.as_str(),
            meta_description: artifact.meta_description.replace('"', "\\\""),
            introduction: &artifact.introduction,
            sections: &artifact.sections,
            conclusion: &artifact.conclusion,
            tags: &artifact.tags,
            keywords: &artifact.keywords,
        }
    }
}

/// Writes artifacts to Markdown files
pub struct ArtifactWriter<'a> {
    handlebars: Handlebars<'a>,
    output_dir: PathBuf,
}

impl<'a> ArtifactWriter<'a> {
    /// Create a writer with the built-in template
    pub fn new(output_dir: &Path) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string("artifact", DEFAULT_TEMPLATE)
            .context("Failed to register default artifact template")?;

        fs::create_dir_all(output_dir).context("Failed to create output directory")?;

        Ok(Self {
            handlebars,
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Create a writer with a custom template file
    pub fn with_template(output_dir: &Path, template_path: &Path) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_file("artifact", template_path)
            .with_context(|| {
                format!("Failed to register template {}", template_path.display())
            })?;

        fs::create_dir_all(output_dir).context("Failed to create output directory")?;

        Ok(Self {
            handlebars,
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn render(&self, artifact: &ContentArtifact, date: NaiveDate) -> Result<String> {
        let data = ArtifactTemplateData::new(artifact, date);
        self.handlebars
            .render("artifact", &data)
            .context("Failed to render artifact template")
    }

    /// Render and write an artifact, returning the file path
    pub fn save(&self, artifact: &ContentArtifact, date: NaiveDate) -> Result<PathBuf> {
        let markdown = self.render(artifact, date)?;

        let site_dir = self.output_dir.join(slugify(&artifact.site, 40));
        fs::create_dir_all(&site_dir)
            .with_context(|| format!("Failed to create {}", site_dir.display()))?;

        let filepath = site_dir.join(Self::filename(artifact, date));
        fs::write(&filepath, markdown)
            .with_context(|| format!("Failed to write {}", filepath.display()))?;

        tracing::debug!(path = %filepath.display(), "Saved artifact to markdown");
        Ok(filepath)
    }

    /// `{date}_{id}_{slug}.md`
    fn filename(artifact: &ContentArtifact, date: NaiveDate) -> String {
        let slug = slugify(&artifact.title, 60);
        let id = artifact
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "draft".to_string());
        if slug.is_empty() {
            format!("{date}_{id}.md")
        } else {
            format!("{date}_{id}_{slug}.md")
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
