//! Topic pools and deterministic topic selection
//!
//! A [`TopicPool`] holds candidate topics per site and category. Pools come
//! from the `[[sites]]` configuration; sites that configure no categories fall
//! back to the built-in pool of the same name.

pub mod selector;

pub use selector::{fallback_topic, is_duplicate, keyword_overlap, seed_index, TopicSelector};

use std::collections::BTreeMap;

use crate::config::SiteConfig;
use crate::models::{TargetLength, Topic};

/// Candidate topics keyed by site, then category
#[derive(Debug, Clone, Default)]
pub struct TopicPool {
    pools: BTreeMap<String, BTreeMap<String, Vec<Topic>>>,
}

impl TopicPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the candidates of one site/category
    pub fn insert(&mut self, site: &str, category: &str, topics: Vec<Topic>) {
        self.pools
            .entry(site.to_string())
            .or_default()
            .insert(category.to_string(), topics);
    }

    /// Candidates for a site/category, empty when unknown
    pub fn candidates(&self, site: &str, category: &str) -> &[Topic] {
        self.pools
            .get(site)
            .and_then(|categories| categories.get(category))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Categories of a site, sorted
    pub fn categories(&self, site: &str) -> Vec<String> {
        self.pools
            .get(site)
            .map(|categories| categories.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn sites(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }

    /// Pools for configured sites
    pub fn from_sites(sites: &[SiteConfig]) -> Self {
        let builtin = Self::builtin();
        let mut pool = Self::new();

        for site in sites {
            if site.categories.is_empty() {
                for category in builtin.categories(&site.profile.name) {
                    pool.insert(
                        &site.profile.name,
                        &category,
                        builtin.candidates(&site.profile.name, &category).to_vec(),
                    );
                }
            } else {
                for category in &site.categories {
                    pool.insert(&site.profile.name, &category.name, category.topics.clone());
                }
            }
        }

        pool
    }

    /// Built-in pools for the default sites
    pub fn builtin() -> Self {
        let mut pool = Self::new();

        pool.insert(
            "unpre",
            "development",
            vec![
                Topic::new("Async Rust in production", &["rust", "async", "tokio"]),
                Topic::new("Designing REST APIs that age well", &["api", "rest", "design"]),
                Topic::new("Database indexing for backend developers", &["database", "index", "sql"]),
                Topic::new("CI/CD pipelines with GitHub Actions", &["ci", "devops", "automation"])
                    .with_length(TargetLength::Long),
                Topic::new("Profiling and performance tuning", &["performance", "profiling"]),
                Topic::new("Choosing a frontend framework", &["react", "vue", "frontend"]),
                Topic::new("Secure coding checklist", &["security", "owasp", "checklist"]),
            ],
        );
        pool.insert(
            "unpre",
            "language",
            vec![
                Topic::new("TOEIC reading strategies", &["toeic", "reading", "exam"]),
                Topic::new("Business email phrases", &["english", "email", "business"]),
                Topic::new("JLPT N2 grammar review", &["jlpt", "japanese", "grammar"]),
                Topic::new("Travel English survival kit", &["english", "travel", "phrases"])
                    .with_length(TargetLength::Short),
                Topic::new("Memorising kanji efficiently", &["kanji", "japanese", "memory"]),
            ],
        );

        pool.insert(
            "untab",
            "real_estate",
            vec![
                Topic::new("Auction basics for first-time buyers", &["auction", "beginner", "property"]),
                Topic::new("Calculating rental yield", &["rental", "yield", "investment"]),
                Topic::new("Reading a title report", &["title", "rights", "analysis"]),
                Topic::new("Redevelopment and reconstruction explained", &["redevelopment", "reconstruction"])
                    .with_length(TargetLength::Long),
                Topic::new("Comparing mortgage products", &["mortgage", "loan", "interest"]),
            ],
        );
        pool.insert(
            "untab",
            "policy",
            vec![
                Topic::new("Property tax changes this year", &["tax", "property", "policy"]),
                Topic::new("Housing supply policy review", &["housing", "supply", "policy"]),
                Topic::new("Public sale versus court auction", &["public sale", "auction", "comparison"]),
                Topic::new("Lease protection law basics", &["lease", "tenant", "law"]),
            ],
        );

        pool.insert(
            "skewese",
            "world_history",
            vec![
                Topic::new("The fall of Constantinople", &["byzantium", "ottoman", "1453"]),
                Topic::new("The printing press revolution", &["gutenberg", "printing", "invention"]),
                Topic::new("Silk Road trade networks", &["silk road", "trade", "asia"]),
                Topic::new("Causes of the First World War", &["ww1", "europe", "alliances"])
                    .with_length(TargetLength::VeryLong),
                Topic::new("Ancient Mesopotamian cities", &["mesopotamia", "sumer", "ancient"]),
            ],
        );
        pool.insert(
            "skewese",
            "korean_history",
            vec![
                Topic::new("King Sejong and the creation of Hangul", &["sejong", "hangul", "joseon"]),
                Topic::new("The Three Kingdoms period", &["goguryeo", "baekje", "silla"]),
                Topic::new("Goryeo celadon and its makers", &["goryeo", "celadon", "craft"]),
                Topic::new("The Imjin War at sea", &["imjin", "yi sun-sin", "navy"]),
            ],
        );

        pool.insert(
            "tistory",
            "trends",
            vec![
                Topic::new("This week's consumer tech launches", &["gadgets", "launch", "review"]),
                Topic::new("Subscription fatigue and how to audit yours", &["subscription", "budget"]),
                Topic::new("Remote work tools worth paying for", &["remote", "tools", "productivity"]),
                Topic::new("Side income ideas that actually work", &["side income", "finance"]),
            ],
        );
        pool.insert(
            "tistory",
            "lifestyle",
            vec![
                Topic::new("Meal prep for busy weeks", &["meal prep", "cooking", "health"]),
                Topic::new("Small apartment storage ideas", &["storage", "interior", "apartment"]),
                Topic::new("Building a reading habit", &["reading", "habit", "books"]),
                Topic::new("Weekend day trips by train", &["travel", "train", "weekend"]),
            ],
        );

        pool
    }
}
