//! Annotation runtime generator.
//!
//! Produces the self-contained script injected into proxied pages. The
//! behaviour lives in `assets/annotator.js`; this module serializes the
//! per-page configuration (mode, session identity, existing annotations,
//! card geometry) into it and wraps the result in a `<script>` element that
//! is safe to splice into HTML.

use serde::Serialize;

use crate::annotation::{Annotation, Author};
use crate::error::CoreError;

const RUNTIME_SOURCE: &str = include_str!("assets/annotator.js");
const CONFIG_PLACEHOLDER: &str = "__PINMARK_CONFIG__";

/// Marker attribute on the injected `<script>` element.
pub const RUNTIME_MARKER: &str = "data-pinmark-runtime";

/// Default endpoint the runtime posts new annotations to.
pub const SAVE_ENDPOINT: &str = "/save-feedback";

/// What the injected runtime is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    /// Capture clicks, create annotations, and replay existing ones.
    Annotate,
    /// Replay existing annotations only.
    Replay,
}

/// Comment card and pin dimensions, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardGeometry {
    pub width: u32,
    pub height: u32,
    /// Gap kept between the click point and a card flipped to the left.
    pub flip_offset: u32,
    pub pin_size: u32,
}

impl Default for CardGeometry {
    fn default() -> Self {
        Self {
            width: 300,
            height: 250,
            flip_offset: 20,
            pin_size: 28,
        }
    }
}

/// Everything the runtime needs to know about the page it runs in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig<'a> {
    pub mode: RuntimeMode,
    /// Original, decoded URL of the proxied page.
    pub target: &'a str,
    pub context: &'a str,
    pub reviewer: &'a Author,
    pub save_endpoint: &'a str,
    pub annotations: &'a [Annotation],
    pub card: CardGeometry,
}

/// Escape serialized JSON so it can sit inside a `<script>` element.
///
/// `<`, `>` and `&` only occur inside JSON strings, where `\uXXXX` escapes
/// are equivalent, so stored text can never close the element early. The
/// two Unicode line terminators are escaped for older JavaScript engines.
pub fn escape_for_script(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            other => out.push(other),
        }
    }
    out
}

/// Render the runtime JavaScript for `config`.
pub fn generate(config: &RuntimeConfig<'_>) -> Result<String, CoreError> {
    let json = serde_json::to_string(config)
        .map_err(|e| CoreError::Internal(format!("failed to serialize runtime config: {e}")))?;
    Ok(RUNTIME_SOURCE.replace(CONFIG_PLACEHOLDER, &escape_for_script(&json)))
}

/// Render the runtime wrapped in its `<script>` element.
pub fn script_tag(config: &RuntimeConfig<'_>) -> Result<String, CoreError> {
    Ok(format!("<script {RUNTIME_MARKER}>{}</script>", generate(config)?))
}

/// Insert `snippet` right before the last `</body>`, or append it when the
/// document has none.
pub fn inject_into_body(html: &str, snippet: &str) -> String {
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + snippet.len());
            out.push_str(&html[..idx]);
            out.push_str(snippet);
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{html}{snippet}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
