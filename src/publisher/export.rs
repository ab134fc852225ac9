//! Export-only adapter for platforms without a publishing API
//!
//! Each post becomes a standalone HTML document in the outbox directory and
//! the returned URL is the file's `file://` URL.

use async_trait::async_trait;
use handlebars::Handlebars;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;
use url::Url;

use crate::utils::slugify;

use super::{PublishAdapter, PublishError, PublishOutcome, PublishRequest};

const DOCUMENT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{title}}</title>
{{#if categories}}<meta name="categories" content="{{#each categories}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}">{{/if}}
</head>
<body>
<h1>{{title}}</h1>
{{{body}}}
</body>
</html>
"#;

pub struct ExportAdapter {
    dir: PathBuf,
    platform: String,
}

impl ExportAdapter {
    pub fn new(dir: impl Into<PathBuf>, platform: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            platform: platform.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn render(&self, request: &PublishRequest) -> Result<String, PublishError> {
        let registry = Handlebars::new();
        Ok(registry.render_template(
            DOCUMENT_TEMPLATE,
            &json!({
                "title": request.title,
                "body": request.body,
                "categories": request.categories,
            }),
        )?)
    }

    async fn write(&self, request: &PublishRequest) -> Result<String, PublishError> {
        let document = self.render(request)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
        let slug = slugify(&request.title, 60);
        let path = self.dir.join(format!("{stamp}_{slug}.html"));
        tokio::fs::write(&path, document).await?;

        let absolute = tokio::fs::canonicalize(&path).await?;
        let url = Url::from_file_path(&absolute)
            .map_err(|_| PublishError::Rejected(format!("not a file URL: {}", absolute.display())))?;

        info!(platform = %self.platform, path = %absolute.display(), "Exported post");
        Ok(url.to_string())
    }
}

#[async_trait]
impl PublishAdapter for ExportAdapter {
    fn platform(&self) -> &str {
        "export"
    }

    async fn publish(&self, request: &PublishRequest) -> PublishOutcome {
        self.write(request).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request() -> PublishRequest {
        PublishRequest {
            title: "Trends & <Lifestyle> notes".into(),
            body: "<p>Hello</p>".into(),
            tags: vec![],
            categories: vec!["lifestyle".into()],
        }
    }

    #[tokio::test]
    async fn test_export_writes_html_file() {
        let tmp = TempDir::new().unwrap();
        let adapter = ExportAdapter::new(tmp.path().join("tistory"), "tistory");

        let outcome = adapter.publish(&request()).await;

        assert!(outcome.success());
        let url = Url::parse(outcome.url_or_error()).unwrap();
        assert_eq!(url.scheme(), "file");

        let path = url.to_file_path().unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().ends_with("_trends-lifestyle-notes.html"));

        let html = std::fs::read_to_string(path).unwrap();
        assert!(html.contains("<title>Trends &amp; &lt;Lifestyle&gt; notes</title>"));
        assert!(html.contains("<p>Hello</p>"));
        assert!(html.contains(r#"content="lifestyle""#));
    }

    #[tokio::test]
    async fn test_unwritable_dir_is_rejection() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let adapter = ExportAdapter::new(blocker.join("sub"), "tistory");
        let outcome = adapter.publish(&request()).await;

        assert!(!outcome.success());
        assert!(outcome.url_or_error().starts_with("I/O error"));
    }
}
