//! WordPress REST adapter
//!
//! Posts go to `{base_url}/wp-json/wp/v2/posts` with application-password
//! basic auth. Tag and category names are resolved to term ids first,
//! creating missing terms. A term that cannot be resolved is skipped; only
//! the post creation itself decides the outcome. Term lookups are retried
//! on transient failures; the post itself is sent once, since a timed-out
//! create may still have landed. Retrying it is left to the recovery pass.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::utils::retry::{with_retry_if, RetryConfig};

use super::{PublishAdapter, PublishError, PublishOutcome, PublishRequest};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Term {
    id: u64,
    name: String,
}

#[derive(Debug, Serialize)]
struct NewTerm<'a> {
    name: &'a str,
}

/// WordPress error envelope; `term_exists` carries the existing id
#[derive(Debug, Deserialize)]
struct WpError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    data: Option<WpErrorData>,
}

#[derive(Debug, Deserialize)]
struct WpErrorData {
    #[serde(default)]
    term_id: Option<u64>,
}

#[derive(Debug, Serialize)]
struct NewPost<'a> {
    title: &'a str,
    content: &'a str,
    status: &'a str,
    tags: Vec<u64>,
    categories: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: u64,
    link: String,
}

fn transport_error(err: reqwest::Error) -> PublishError {
    if err.is_decode() {
        PublishError::Rejected(format!("invalid response: {err}"))
    } else {
        PublishError::Transient(err.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> PublishError {
    let message = format!("status {}: {}", status.as_u16(), body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        PublishError::Transient(message)
    } else {
        PublishError::Rejected(message)
    }
}

pub struct WordPressAdapter {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
    retry: RetryConfig,
}

impl WordPressAdapter {
    /// Credentials are optional at construction; publishing without them is
    /// a rejection rather than a startup failure.
    pub fn new(
        base_url: &str,
        username: Option<String>,
        app_password: Option<String>,
    ) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .gzip(true)
            .build()
            .map_err(|e| PublishError::Transient(e.to_string()))?;

        let credentials = match (username, app_password) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some((user, password))
            }
            _ => None,
        };

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/wp-json/wp/v2/{resource}", self.base_url)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    async fn find_term(&self, taxonomy: &str, name: &str) -> Result<Option<u64>, PublishError> {
        let response = self
            .authed(self.client.get(self.endpoint(taxonomy)))
            .query(&[("search", name), ("per_page", "100")])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let terms: Vec<Term> = response.json().await.map_err(transport_error)?;
        Ok(terms
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .map(|t| t.id))
    }

    async fn create_term(&self, taxonomy: &str, name: &str) -> Result<u64, PublishError> {
        let response = self
            .authed(self.client.post(self.endpoint(taxonomy)))
            .json(&NewTerm { name })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            let term: Term = response.json().await.map_err(transport_error)?;
            return Ok(term.id);
        }

        let body = response.text().await.unwrap_or_default();
        if let Ok(WpError {
            code,
            data: Some(WpErrorData { term_id: Some(id) }),
        }) = serde_json::from_str::<WpError>(&body)
        {
            if code == "term_exists" {
                return Ok(id);
            }
        }
        Err(status_error(status, &body))
    }

    /// Term ids for `names`; unresolvable names are logged and dropped
    async fn resolve_terms(&self, taxonomy: &str, names: &[String]) -> Vec<u64> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let found = with_retry_if(
                &self.retry,
                || self.find_term(taxonomy, name),
                PublishError::is_transient,
            )
            .await;
            let resolved = match found {
                Ok(Some(id)) => Ok(id),
                Ok(None) => self.create_term(taxonomy, name).await,
                Err(e) => Err(e),
            };
            match resolved {
                Ok(id) if !ids.contains(&id) => ids.push(id),
                Ok(_) => {}
                Err(e) => warn!(taxonomy, term = name, error = %e, "Skipping unresolved term"),
            }
        }
        ids
    }

    async fn create_post(&self, request: &PublishRequest) -> Result<String, PublishError> {
        let tags = self.resolve_terms("tags", &request.tags).await;
        let categories = self.resolve_terms("categories", &request.categories).await;
        debug!(tags = tags.len(), categories = categories.len(), "Resolved terms");

        let response = self
            .authed(self.client.post(self.endpoint("posts")))
            .json(&NewPost {
                title: &request.title,
                content: &request.body,
                status: "publish",
                tags,
                categories,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let post: CreatedPost = response.json().await.map_err(transport_error)?;
        info!(post_id = post.id, url = %post.link, "WordPress post created");
        Ok(post.link)
    }
}

#[async_trait]
impl PublishAdapter for WordPressAdapter {
    fn platform(&self) -> &str {
        "wordpress"
    }

    async fn publish(&self, request: &PublishRequest) -> PublishOutcome {
        if self.credentials.is_none() {
            return Err::<String, _>(PublishError::MissingCredentials(self.base_url.clone())).into();
        }

        self.create_post(request).await.into()
    }
}
