//! Prompt construction
//!
//! The system text pins the output format; the user prompt carries the topic,
//! audience and length. The strict variant is used for the single escalated
//! retry after the model ignored the schema.

use crate::models::{SiteProfile, TargetLength, Topic};

use super::GenerationRequest;

/// JSON shape the generator must return
pub const SCHEMA_EXAMPLE: &str = r#"{
  "title": "SEO friendly title, 30-60 characters",
  "meta_description": "Search snippet, 120-160 characters",
  "introduction": "Opening paragraph",
  "sections": [
    {"heading": "Section heading", "content": "Section body"}
  ],
  "additional_content": "Closing paragraph",
  "tags": ["tag1", "tag2", "tag3", "tag4", "tag5"],
  "keywords": ["keyword1", "keyword2", "keyword3"]
}"#;

/// System text: persona plus a hard output contract
pub fn system_prompt(profile: &SiteProfile) -> String {
    let mut text = format!(
        "You are a professional blog writer for {}.",
        profile.display_name
    );
    if !profile.audience.is_empty() {
        text.push_str(&format!(" Your readers are {}.", profile.audience));
    }
    if !profile.style.is_empty() {
        text.push_str(&format!(" Write in this style: {}.", profile.style));
    }
    text.push_str(
        " You always answer with exactly one JSON object that follows the requested \
         schema. Never output code, markdown fences or commentary outside the object.",
    );
    text
}

/// Normal generation prompt
pub fn build_request(
    topic: &Topic,
    category: &str,
    target_length: TargetLength,
    profile: &SiteProfile,
    current_year: i32,
) -> GenerationRequest {
    let (min_words, max_words) = target_length.words_per_section();
    let sections = target_length.section_count();
    let keywords = if topic.keywords.is_empty() {
        topic.title.clone()
    } else {
        topic.keywords.join(", ")
    };

    let prompt = format!(
        "Write a blog post about \"{title}\" for the {category} category.\n\
         \n\
         Requirements:\n\
         - Language: {language}\n\
         - Exactly {sections} sections, each {min_words}-{max_words} words\n\
         - Work these keywords in naturally: {keywords}\n\
         - Facts and figures must be current as of {current_year}\n\
         - Explain any code you include in prose\n\
         - 5 tags and 3 keywords\n\
         \n\
         Respond with JSON only, in this shape:\n\
         {SCHEMA_EXAMPLE}",
        title = topic.title,
        language = profile.language,
    );

    GenerationRequest {
        system: system_prompt(profile),
        prompt,
    }
}

/// Escalated prompt after a prose or code answer
pub fn build_strict_request(
    topic: &Topic,
    category: &str,
    target_length: TargetLength,
    profile: &SiteProfile,
    current_year: i32,
) -> GenerationRequest {
    let base = build_request(topic, category, target_length, profile, current_year);
    GenerationRequest {
        system: format!(
            "{} Your previous answer was rejected because it was not a JSON object.",
            base.system
        ),
        prompt: format!(
            "IMPORTANT: reply with a single JSON object. The first character of your \
             answer must be '{{' and the last character must be '}}'. Do not write \
             code samples as the answer.\n\n{}",
            base.prompt
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> SiteProfile {
        SiteProfile {
            audience: "junior developers".into(),
            style: "practical".into(),
            ..SiteProfile::new("unpre")
        }
    }

    #[test]
    fn test_request_mentions_length_and_keywords() {
        let topic = Topic::new("Async Rust", &["tokio", "futures"]);
        let req = build_request(&topic, "development", TargetLength::Long, &profile(), 2025);

        assert!(req.prompt.contains("Exactly 4 sections"));
        assert!(req.prompt.contains("tokio, futures"));
        assert!(req.prompt.contains("as of 2025"));
        assert!(req.prompt.contains("\"additional_content\""));
        assert!(req.system.contains("junior developers"));
        assert!(req.system.contains("exactly one JSON object"));
    }

    #[test]
    fn test_strict_request_is_stricter() {
        let topic = Topic::new("Async Rust", &[]);
        let normal = build_request(&topic, "dev", TargetLength::Short, &profile(), 2025);
        let strict = build_strict_request(&topic, "dev", TargetLength::Short, &profile(), 2025);

        assert!(strict.prompt.starts_with("IMPORTANT"));
        assert!(strict.prompt.ends_with(&normal.prompt));
        assert!(strict.system.len() > normal.system.len());
        assert!(normal.prompt.contains("keywords in naturally: Async Rust"));
    }
}
