//! Parse fallback ladder
//!
//! Each step is a pure function from raw generator text to [`ParseResult`].
//! [`run_ladder`] tries them in order and stops at the first `Parsed`.
//! [`synthesize`] is the terminal step: it cannot fail and always yields a
//! non-empty title and at least one non-empty section.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::models::{ContentArtifact, Section, TargetLength, Topic};
use crate::utils::normalize_whitespace;

/// Outcome of one ladder step
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    Parsed(ContentArtifact),
    Malformed(String),
}

impl ParseResult {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }
}

/// Inputs that shape repairs: the requested topic and site
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub site: &'a str,
    pub topic: &'a Topic,
    pub category: &'a str,
    pub target_length: TargetLength,
}

impl ParseContext<'_> {
    /// Title used when the generated one is missing or unusable
    fn fallback_title(&self) -> String {
        let title = self.topic.title.trim();
        if title.is_empty() {
            format!("Notes on {}", self.category.replace('_', " "))
        } else {
            title.to_string()
        }
    }
}

pub type ParseStep = fn(&str, &ParseContext<'_>) -> ParseResult;

/// Steps tried before any retry
pub const STRUCTURED_STEPS: &[ParseStep] = &[parse_clean, parse_stripped];

/// Run `steps` in order, returning the first parsed artifact
pub fn run_ladder(raw: &str, ctx: &ParseContext<'_>, steps: &[ParseStep]) -> ParseResult {
    for step in steps {
        if let ParseResult::Parsed(artifact) = step(raw, ctx) {
            return ParseResult::Parsed(artifact);
        }
    }
    ParseResult::Malformed(raw.to_string())
}

// ============================================================================
// Step 1: clean parse
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawArtifact {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    meta_description: Option<String>,
    #[serde(default)]
    introduction: Option<String>,
    #[serde(default)]
    sections: Vec<RawSection>,
    #[serde(default, alias = "conclusion")]
    additional_content: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    #[serde(default, alias = "title")]
    heading: Option<String>,
    #[serde(default, alias = "body")]
    content: Option<String>,
}

/// Strict JSON parse followed by field validation
pub fn parse_clean(raw: &str, ctx: &ParseContext<'_>) -> ParseResult {
    match serde_json::from_str::<RawArtifact>(raw.trim()) {
        Ok(parsed) => validate(parsed, raw, ctx),
        Err(_) => ParseResult::Malformed(raw.to_string()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_list(values: Vec<String>, limit: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim().trim_start_matches('#').trim().to_string();
        if !value.is_empty() && !out.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
            out.push(value);
        }
        if out.len() == limit {
            break;
        }
    }
    out
}

/// Titles that should be replaced with the topic title
fn is_unusable_title(title: &str) -> bool {
    title.chars().count() < 10 || title.contains('\n') || looks_like_code(title)
}

fn validate(parsed: RawArtifact, raw: &str, ctx: &ParseContext<'_>) -> ParseResult {
    let sections: Vec<Section> = parsed
        .sections
        .into_iter()
        .filter_map(|s| {
            Some(Section {
                heading: non_empty(s.heading)?,
                content: non_empty(s.content)?,
            })
        })
        .collect();

    if sections.is_empty() {
        return ParseResult::Malformed(raw.to_string());
    }

    let title = match non_empty(parsed.title) {
        Some(title) if !is_unusable_title(&title) => title,
        _ => ctx.fallback_title(),
    };

    let mut artifact = ContentArtifact::draft(ctx.site, title);
    artifact.meta_description = non_empty(parsed.meta_description).unwrap_or_default();
    artifact.introduction = non_empty(parsed.introduction).unwrap_or_default();
    artifact.sections = sections;
    artifact.conclusion = non_empty(parsed.additional_content).unwrap_or_default();
    artifact.tags = clean_list(parsed.tags, 10);
    artifact.keywords = clean_list(parsed.keywords, 10);
    fill_labels(&mut artifact, ctx);

    ParseResult::Parsed(artifact)
}

fn fill_labels(artifact: &mut ContentArtifact, ctx: &ParseContext<'_>) {
    if artifact.keywords.is_empty() {
        artifact.keywords = clean_list(ctx.topic.keywords.clone(), 10);
    }
    if artifact.tags.is_empty() {
        let mut tags = artifact.keywords.clone();
        tags.push(ctx.category.replace('_', " "));
        artifact.tags = clean_list(tags, 10);
    }
}

// ============================================================================
// Step 2: delimiter stripping
// ============================================================================

/// Content of the first fenced block, preferring ```json
fn strip_fences(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let body = &text[start + 7..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let content_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        if let Some(end) = after[content_start..].find("```") {
            return after[content_start..content_start + end].trim();
        }
    }

    text
}

/// Substring from the first `{` to the last `}`
fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn remove_trailing_commas(json: &str) -> String {
    static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();
    let re = TRAILING_COMMA.get_or_init(|| Regex::new(r",\s*([}\]])").expect("Invalid regex pattern"));
    re.replace_all(json, "$1").to_string()
}

/// Escape raw newlines and tabs that appear inside string literals
fn escape_control_chars(json: &str) -> String {
    let mut fixed = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escape_next = false;

    for c in json.chars() {
        if escape_next {
            fixed.push(c);
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => {
                escape_next = true;
                fixed.push(c);
            }
            '"' => {
                in_string = !in_string;
                fixed.push(c);
            }
            '\n' if in_string => fixed.push_str("\\n"),
            '\r' if in_string => {}
            '\t' if in_string => fixed.push_str("\\t"),
            _ => fixed.push(c),
        }
    }

    fixed
}

/// Parse the object found between the outermost braces, after light repair
pub fn parse_stripped(raw: &str, ctx: &ParseContext<'_>) -> ParseResult {
    let unfenced = strip_fences(raw);
    let Some(span) = object_span(unfenced).or_else(|| object_span(raw)) else {
        return ParseResult::Malformed(raw.to_string());
    };

    if let ParseResult::Parsed(artifact) = parse_clean(span, ctx) {
        return ParseResult::Parsed(artifact);
    }

    let repaired = escape_control_chars(&remove_trailing_commas(span));
    match parse_clean(&repaired, ctx) {
        ParseResult::Parsed(artifact) => ParseResult::Parsed(artifact),
        ParseResult::Malformed(_) => ParseResult::Malformed(raw.to_string()),
    }
}

// ============================================================================
// Escalation check
// ============================================================================

const CODE_PREFIXES: &[&str] = &[
    "const ", "let ", "var ", "function", "import ", "export ", "def ", "class ", "async ",
    "fn ", "pub ", "public ", "#include", "package ", "<?php", "<script", "jsx", "python",
];

/// Heuristic: the line reads like source code rather than prose
pub fn looks_like_code(text: &str) -> bool {
    let trimmed = text.trim_start();
    if CODE_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return true;
    }
    let line = trimmed.lines().next().unwrap_or("").trim_end();
    line.ends_with(';') || line.ends_with("=> {") || line.ends_with(") {")
}

/// True when the model ignored the schema: no object at all, or a code answer
pub fn looks_like_non_schema(raw: &str) -> bool {
    let text = strip_fences(raw).trim();
    !text.is_empty() && (!text.contains('{') || looks_like_code(text))
}

// ============================================================================
// Step 4: heuristic synthesis
// ============================================================================

/// Split text into sentences ending in `.`, `!`, `?` or `。`
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let terminal = matches!(c, '.' | '!' | '?' | '。');
        let boundary = match chars.peek() {
            None => true,
            Some(next) => next.is_whitespace() || c == '。',
        };
        if terminal && boundary {
            let sentence = normalize_whitespace(&current);
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            current.clear();
        }
    }

    let rest = normalize_whitespace(&current);
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

fn title_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let title = if let Some(rest) = trimmed.strip_prefix("# ") {
        rest
    } else if trimmed
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("title:"))
    {
        &trimmed[6..]
    } else if let Some(rest) = trimmed.strip_prefix("제목:") {
        rest
    } else {
        return None;
    };
    let title = title.trim().trim_matches('"').trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Short heading from the opening words of a sentence
fn heading_from(sentence: &str) -> String {
    let words: Vec<&str> = sentence
        .trim_end_matches(['.', '!', '?', '。'])
        .split_whitespace()
        .take(6)
        .collect();
    let heading = words.join(" ");
    if heading.is_empty() {
        "Overview".to_string()
    } else {
        heading
    }
}

/// Markdown `## heading` blocks, if the text has any
fn markdown_sections(lines: &[&str]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut heading: Option<String> = None;
    let mut body = String::new();

    let mut flush = |heading: &mut Option<String>, body: &mut String| {
        if let Some(h) = heading.take() {
            let content = body.trim().to_string();
            if !content.is_empty() {
                sections.push(Section {
                    heading: h,
                    content,
                });
            }
        }
        body.clear();
    };

    for line in lines {
        let trimmed = line.trim();
        if let Some(h) = trimmed
            .strip_prefix("### ")
            .or_else(|| trimmed.strip_prefix("## "))
        {
            flush(&mut heading, &mut body);
            heading = Some(h.trim().to_string());
        } else if heading.is_some() {
            body.push_str(line);
            body.push('\n');
        }
    }
    flush(&mut heading, &mut body);
    sections
}

/// Build an artifact from arbitrary text. Never fails.
pub fn synthesize(raw: &str, ctx: &ParseContext<'_>) -> ContentArtifact {
    let lines: Vec<&str> = raw
        .lines()
        .filter(|l| !l.trim_start().starts_with("```"))
        .collect();

    let mut title = None;
    let mut body_lines = Vec::new();
    for line in &lines {
        if title.is_none() {
            if let Some(t) = title_line(line) {
                if !is_unusable_title(&t) {
                    title = Some(t);
                }
                continue;
            }
        }
        body_lines.push(*line);
    }
    let title = title.unwrap_or_else(|| ctx.fallback_title());

    let mut artifact = ContentArtifact::draft(ctx.site, title.clone());

    let from_markdown = markdown_sections(&body_lines);
    if !from_markdown.is_empty() {
        let intro: Vec<&str> = body_lines
            .iter()
            .take_while(|l| !l.trim_start().starts_with("##"))
            .copied()
            .collect();
        artifact.introduction = normalize_whitespace(&intro.join(" "));
        artifact.sections = from_markdown;
    } else {
        let body = body_lines.join("\n");
        let sentences = split_sentences(&body);
        distribute(&mut artifact, sentences, ctx.target_length.section_count());
    }

    if artifact.sections.is_empty() {
        artifact.sections.push(Section {
            heading: "Overview".to_string(),
            content: format!("{title}."),
        });
    }

    fill_labels(&mut artifact, ctx);
    artifact
}

/// Spread sentences over introduction, sections and conclusion
fn distribute(artifact: &mut ContentArtifact, sentences: Vec<String>, wanted_sections: usize) {
    if sentences.is_empty() {
        return;
    }

    let middle: Vec<String> = if sentences.len() >= 3 {
        artifact.introduction = sentences[0].clone();
        artifact.conclusion = sentences[sentences.len() - 1].clone();
        sentences[1..sentences.len() - 1].to_vec()
    } else {
        sentences
    };

    let groups = wanted_sections.max(1).min(middle.len());
    for i in 0..groups {
        let chunk = &middle[i * middle.len() / groups..(i + 1) * middle.len() / groups];
        artifact.sections.push(Section {
            heading: heading_from(&chunk[0]),
            content: chunk.join(" "),
        });
    }
}
