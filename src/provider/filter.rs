//! Cheap pre-fetch checks on candidate URLs.

use std::sync::LazyLock;

use regex::Regex;

use super::Provider;
use crate::download::HeadInfo;

/// Announced bodies smaller than this are placeholders, not photos.
pub const MIN_PLAUSIBLE_IMAGE_BYTES: u64 = 1024;

#[allow(clippy::expect_used)]
static BING_BROKEN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^https?://th\.bing\.com/th/id/.*\?cb=iwp2",
        r"^https?://th\.bing\.com/th/id/.*\?rs=1",
        r"^https?://th\.bing\.com/th/id/.*\?pid=ImgDetMain",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("broken-image regex is valid")) // Static patterns, safe to panic
    .collect()
});

#[allow(clippy::expect_used)]
static SIZE_HINT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[?&]w=(\d+)&h=(\d+)").expect("size hint regex is valid") // Static pattern, safe to panic
});

/// Returns `true` for URLs the backend is known to serve as broken placeholders.
///
/// Bing answers some thumbnail variants with a generic "image unavailable"
/// picture that would otherwise pass validation.
#[must_use]
pub fn is_known_broken(provider: Provider, url: &str) -> bool {
    match provider {
        Provider::Bing => BING_BROKEN_PATTERNS.iter().any(|re| re.is_match(url)),
        Provider::Baidu | Provider::Google => false,
    }
}

/// Extracts a `w=<n>&h=<n>` size hint from a URL query, if present.
#[must_use]
pub fn size_hint(url: &str) -> Option<(u32, u32)> {
    let caps = SIZE_HINT_PATTERN.captures(url)?;
    let width = caps.get(1)?.as_str().parse().ok()?;
    let height = caps.get(2)?.as_str().parse().ok()?;
    Some((width, height))
}

/// Whether candidates from `provider` get a HEAD request before the GET.
///
/// Bing links point at arbitrary third-party hosts, many of which answer with
/// HTML error pages or tiny stubs.
#[must_use]
pub fn prescreens_with_head(provider: Provider) -> bool {
    matches!(provider, Provider::Bing)
}

/// Why a HEAD answer rules the candidate out, if it does.
///
/// Missing headers never rule a candidate out; the full decode decides then.
#[must_use]
pub fn head_rejection(head: &HeadInfo) -> Option<&'static str> {
    if let Some(content_type) = &head.content_type
        && !content_type.trim_start().to_ascii_lowercase().starts_with("image/")
    {
        return Some("announced content type is not an image");
    }
    if let Some(length) = head.content_length
        && length < MIN_PLAUSIBLE_IMAGE_BYTES
    {
        return Some("announced size too small for an image");
    }
    None
}
