use std::sync::LazyLock;

use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};

// Fenced JSON object; a backtick inside the body ends the match early,
// so definitions must be fence-free.
static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\n(\{[^`]+\})\n```").expect("static pattern"));

/// One sound-effect definition, taken from a fenced JSON block in the
/// prompt sheet. Unknown keys in the block are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SfxRequest {
    pub id: String,
    pub filename: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default = "default_prompt_influence")]
    pub prompt_influence: f64,
}

fn default_prompt_influence() -> f64 {
    0.7
}

/// Nearest line above `pos` that starts with a `###` heading marker.
/// A `####` heading also matches; callers rely on that.
fn preceding_heading(content: &str, pos: usize) -> Option<&str> {
    content[..pos]
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with("###"))
}

fn excluded_id(json_str: &str) -> String {
    serde_json::from_str::<serde_json::Value>(json_str)
        .ok()
        .and_then(|v| v.get("id").and_then(|id| id.as_str().map(String::from)))
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// Extracts all SFX definitions from a markdown prompt sheet, in document
/// order. Blocks whose nearest preceding heading is struck through (`~~`)
/// are excluded; blocks that fail to parse are dropped with a warning.
/// Extraction itself never fails.
pub fn extract_sfx_blocks(content: &str) -> Vec<SfxRequest> {
    let mut requests = Vec::new();

    for caps in FENCE.captures_iter(content) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let json_str = body.as_str();

        if let Some(heading) = preceding_heading(content, whole.start()) {
            if heading.contains("~~") {
                println!("⊘ Skipping excluded asset: {}", excluded_id(json_str));
                continue;
            }
        }

        match serde_json::from_str::<SfxRequest>(json_str) {
            Ok(request) => requests.push(request),
            Err(e) => warn!("Failed to parse JSON block: {}", e),
        }
    }

    requests
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(body: &str) -> String {
        format!("```json\n{}\n```\n", body)
    }

    #[test]
    fn test_extracts_in_document_order() {
        let md = format!(
            "### Punch\n{}\n### Jump\n{}",
            block(r#"{"id": "sfx_punch", "filename": "punch.mp3", "prompt": "heavy punch"}"#),
            block(r#"{"id": "sfx_jump", "filename": "jump.mp3", "prompt": "8-bit jump"}"#),
        );

        let requests = extract_sfx_blocks(&md);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].id, "sfx_punch");
        assert_eq!(requests[1].id, "sfx_jump");
    }

    #[test]
    fn test_strikethrough_heading_excludes_block() {
        let md = format!(
            "### Punch\n{}\n### ~~Grunt~~\n{}",
            block(r#"{"id": "sfx_punch", "filename": "punch.mp3", "prompt": "heavy punch"}"#),
            block(r#"{"id": "sfx_grunt", "filename": "grunt.mp3", "prompt": "effort grunt"}"#),
        );

        let requests = extract_sfx_blocks(&md);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, "sfx_punch");
    }

    #[test]
    fn test_deeper_heading_also_counts() {
        // startswith("###") matches #### too; kept intentionally.
        let md = format!(
            "#### ~~Grunt (legacy)~~\n{}",
            block(r#"{"id": "sfx_grunt", "filename": "grunt.mp3", "prompt": "effort grunt"}"#),
        );

        assert!(extract_sfx_blocks(&md).is_empty());
    }

    #[test]
    fn test_block_without_heading_is_never_excluded() {
        let md = format!(
            "Some ~~struck~~ prose, no heading anywhere.\n{}",
            block(r#"{"id": "sfx_click", "filename": "click.mp3", "prompt": "button click"}"#),
        );

        let requests = extract_sfx_blocks(&md);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, "sfx_click");
    }

    #[test]
    fn test_malformed_block_is_dropped_not_fatal() {
        let md = format!(
            "### Broken\n{}\n### Jump\n{}",
            block(r#"{"id": "sfx_broken", "filename": }"#),
            block(r#"{"id": "sfx_jump", "filename": "jump.mp3", "prompt": "8-bit jump"}"#),
        );

        let requests = extract_sfx_blocks(&md);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, "sfx_jump");
    }

    #[test]
    fn test_malformed_block_under_struck_heading_does_not_panic() {
        let md = format!("### ~~Gone~~\n{}", block(r#"{"id": missing-quotes}"#));
        // Body starts with `{` but never parses; exclusion path reports
        // UNKNOWN instead of failing.
        assert!(extract_sfx_blocks(&md).is_empty());
    }

    #[test]
    fn test_defaults_and_optional_fields() {
        let md = block(
            r#"{"id": "sfx_hit", "filename": "combat/hit.mp3", "prompt": "hit", "duration_seconds": 1.2}"#,
        );

        let requests = extract_sfx_blocks(&md);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].duration_seconds, Some(1.2));
        assert_eq!(requests[0].prompt_influence, 0.7);
    }

    #[test]
    fn test_explicit_influence_overrides_default() {
        let md = block(
            r#"{"id": "sfx_hit", "filename": "hit.mp3", "prompt": "hit", "prompt_influence": 0.9}"#,
        );

        let requests = extract_sfx_blocks(&md);
        assert_eq!(requests[0].prompt_influence, 0.9);
        assert_eq!(requests[0].duration_seconds, None);
    }

    #[test]
    fn test_excluded_id_fallback() {
        assert_eq!(excluded_id(r#"{"id": "sfx_x"}"#), "sfx_x");
        assert_eq!(excluded_id(r#"{"id": 42}"#), "UNKNOWN");
        assert_eq!(excluded_id("not json"), "UNKNOWN");
    }
}
