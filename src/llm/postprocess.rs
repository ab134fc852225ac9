//! Post-processing passes applied to every parsed artifact
//!
//! These are plain string transforms with no generator involvement:
//! stale "current year" phrasing, unexplained code bodies, focus keyword
//! splicing, title suffixes and a derived meta description.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::models::{ContentArtifact, SiteProfile};
use crate::utils::truncate_text;

use super::parse::{looks_like_code, split_sentences};

/// Titles shorter than this get the site name appended
pub const MIN_TITLE_CHARS: usize = 30;

const META_DESCRIPTION_CHARS: usize = 155;

fn stale_year_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\bas of (20\d{2})\b",
            r"(?i)\bthis year \((20\d{2})\)",
            r"(?i)\bcurrently \(?(20\d{2})\)?",
            r"(?i)\b(20\d{2})(?:'s)? (?:latest|edition|update|trends)\b",
            r"(?i)\blatest (20\d{2})\b",
            r"(20\d{2})년 (?:최신|기준)",
            r"올해\s*\((20\d{2})\)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("Invalid regex pattern"))
        .collect()
    })
}

/// Rewrite years in "current" phrasings that are older than `current_year`.
/// Historical references ("in 1453", "since 2019") are left alone.
pub fn patch_stale_years(text: &str, current_year: i32) -> String {
    let mut out = text.to_string();
    for re in stale_year_patterns() {
        out = re
            .replace_all(&out, |caps: &Captures<'_>| {
                let whole = &caps[0];
                let year = &caps[1];
                match year.parse::<i32>() {
                    Ok(y) if y < current_year => {
                        whole.replacen(year, &current_year.to_string(), 1)
                    }
                    _ => whole.to_string(),
                }
            })
            .into_owned();
    }
    out
}

/// Section bodies that are bare code without any explanation
fn is_unexplained_code(content: &str) -> bool {
    let trimmed = content.trim_start();
    if trimmed.starts_with("```") {
        return true;
    }
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return false;
    }
    let code_lines = lines.iter().filter(|l| looks_like_code(l)).count();
    looks_like_code(trimmed) && code_lines * 2 >= lines.len()
}

/// Give bare code sections a lead sentence and a fenced block
pub fn explain_code_sections(artifact: &mut ContentArtifact) {
    for section in &mut artifact.sections {
        if !is_unexplained_code(&section.content) {
            continue;
        }
        let lead = format!(
            "The following example illustrates {}.",
            section.heading.trim_end_matches(['.', ':'])
        );
        section.content = if section.content.trim_start().starts_with("```") {
            format!("{lead}\n\n{}", section.content.trim())
        } else {
            format!("{lead}\n\n```\n{}\n```", section.content.trim())
        };
    }
}

/// Byte offset of the sentence boundary closest to the middle of `text`
fn middle_boundary(text: &str) -> usize {
    let mut boundaries = Vec::new();
    let mut offset = 0;
    for sentence in split_sentences(text) {
        match text[offset..].find(&sentence) {
            Some(pos) => {
                offset += pos + sentence.len();
                boundaries.push(offset);
            }
            // whitespace was normalized inside the sentence; stop here
            None => break,
        }
    }
    boundaries.retain(|b| *b < text.len());

    let middle = text.len() / 2;
    boundaries
        .into_iter()
        .min_by_key(|b| b.abs_diff(middle))
        .unwrap_or(text.len())
}

/// Splice a sentence into `text` at the middle sentence boundary
pub fn splice_sentence(text: &str, sentence: &str) -> String {
    let at = middle_boundary(text);
    let (head, tail) = text.split_at(at);
    let head = head.trim_end();
    let tail = tail.trim_start();
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => format!("{sentence} {tail}").trim_end().to_string(),
        (false, true) => format!("{head} {sentence}"),
        (false, false) => format!("{head} {sentence} {tail}"),
    }
}

/// Ensure the first `limit` focus keywords each appear at least once.
/// Returns the keywords that were inserted.
pub fn insert_keywords(
    artifact: &mut ContentArtifact,
    keywords_focus: &[String],
    limit: usize,
) -> Vec<String> {
    let mut inserted = Vec::new();

    for keyword in keywords_focus.iter().take(limit) {
        let keyword = keyword.trim();
        if keyword.is_empty() || artifact.searchable_text().contains(&keyword.to_lowercase()) {
            continue;
        }

        let Some(section) = artifact
            .sections
            .iter_mut()
            .max_by_key(|s| s.content.chars().count())
        else {
            break;
        };

        let sentence = format!("This also ties into {keyword}.");
        section.content = splice_sentence(&section.content, &sentence);

        if !artifact
            .keywords
            .iter()
            .any(|k| k.eq_ignore_ascii_case(keyword))
        {
            artifact.keywords.push(keyword.to_string());
        }
        inserted.push(keyword.to_string());
    }

    inserted
}

/// Append the site name to short titles
pub fn apply_title_suffix(artifact: &mut ContentArtifact, profile: &SiteProfile) {
    if artifact.title.chars().count() < MIN_TITLE_CHARS && !profile.display_name.is_empty() {
        artifact.title = format!("{} - {}", artifact.title, profile.display_name);
    }
}

/// Full pass in a fixed order
pub fn finalize(
    artifact: &mut ContentArtifact,
    profile: &SiteProfile,
    keyword_limit: usize,
    current_year: i32,
) {
    artifact.title = patch_stale_years(&artifact.title, current_year);
    artifact.introduction = patch_stale_years(&artifact.introduction, current_year);
    artifact.conclusion = patch_stale_years(&artifact.conclusion, current_year);
    for section in &mut artifact.sections {
        section.heading = patch_stale_years(&section.heading, current_year);
        section.content = patch_stale_years(&section.content, current_year);
    }

    explain_code_sections(artifact);

    let inserted = insert_keywords(artifact, &profile.keywords_focus, keyword_limit);
    if !inserted.is_empty() {
        tracing::debug!(site = %artifact.site, keywords = ?inserted, "Inserted focus keywords");
    }

    apply_title_suffix(artifact, profile);

    if artifact.meta_description.is_empty() {
        let source = if artifact.introduction.is_empty() {
            artifact
                .sections
                .first()
                .map(|s| s.content.clone())
                .unwrap_or_default()
        } else {
            artifact.introduction.clone()
        };
        artifact.meta_description = truncate_text(&source, META_DESCRIPTION_CHARS);
    }
}
