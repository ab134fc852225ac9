//! Test fixtures for integration tests
//!
//! Generator payloads as they come back from the service

/// A well-formed post object
pub const VALID_POST_JSON: &str = r#"{
  "title": "Async Rust in production: lessons from a year of tokio",
  "meta_description": "What we learned running async Rust services under real load.",
  "introduction": "Async Rust has matured a lot. Here is what held up in production.",
  "sections": [
    {"heading": "Picking a runtime", "content": "Tokio is the default choice. It has the widest ecosystem."},
    {"heading": "Cancellation", "content": "Futures can be dropped at any await point. Plan for it."}
  ],
  "additional_content": "Start with the defaults and measure before tuning.",
  "tags": ["rust", "async", "tokio"],
  "keywords": ["async rust", "tokio"]
}"#;

/// The same object wrapped in a fence with chatter and a trailing comma
pub const FENCED_POST: &str = r#"Sure! Here is the post you asked for:

```json
{
  "title": "Async Rust in production: lessons from a year of tokio",
  "introduction": "Async Rust has matured a lot.",
  "sections": [
    {"heading": "Picking a runtime", "content": "Tokio is the default choice."},
  ],
  "conclusion": "Measure before tuning.",
}
```

Let me know if you want changes."#;

/// No structure at all
pub const PLAIN_PROSE: &str = "the quick brown fox";

/// Anthropic Messages API envelope around `text`
pub fn anthropic_envelope(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn"
    })
}
