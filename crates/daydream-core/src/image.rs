//! Image request detection and generated-image URL handling.

use crate::message::ImageRef;
use regex::Regex;
use std::sync::LazyLock;

/// Acknowledgement appended before a generated image.
pub const IMAGE_ACKNOWLEDGEMENT: &str = "\u{2705} Here's your dream image:";

static IMAGE_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*/image(?:\s+|$)").expect("valid regex"));

static IMAGE_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(generate|create|draw|make|paint|render|show me)\b.{0,40}\b(image|picture|photo|drawing|illustration|portrait)s?\b",
    )
    .expect("valid regex")
});

/// Returns true when the user asks for an image rather than a text reply.
pub fn is_image_request(input: &str) -> bool {
    IMAGE_COMMAND.is_match(input) || IMAGE_PHRASE.is_match(input)
}

/// Prompt sent to the image endpoint: the input without a leading `/image`.
pub fn image_prompt(input: &str) -> String {
    IMAGE_COMMAND.replace(input, "").trim().to_string()
}

/// Normalises a URL returned by the image endpoint.
///
/// Relative paths are resolved against `origin` and plain `http://` is
/// upgraded to `https://`. Empty input yields `None`.
pub fn normalize_image_url(raw: &str, origin: &str) -> Option<ImageRef> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with('/') {
        return Some(ImageRef::new(format!(
            "{}{}",
            origin.trim_end_matches('/'),
            raw
        )));
    }
    if let Some(rest) = raw.strip_prefix("http://") {
        return Some(ImageRef::new(format!("https://{}", rest)));
    }
    Some(ImageRef::new(raw))
}
