//! Hallucination filter for transcription results.
//!
//! Whisper-family models emit boilerplate subtitle artifacts on silence and
//! noise ("Thank you.", "Subtitles by..."). The filter is a static
//! set-membership and prefix check; it carries no state and learns nothing.

use std::collections::HashSet;

/// Known hallucinated outputs, matched exactly against trimmed text.
///
/// These are common subtitle-corpus artifacts the model falls back to when
/// the audio contains no speech.
const BLOCKLIST: &[&str] = &[
    "Thank you.",
    "Thanks for watching.",
    "You",
    "MBC",
    "Amara.org",
    "Subtitles by",
    "Subtitles",
    "Copyright",
    "©",
];

/// Text starting with this prefix and shorter than
/// [`SHORT_PREFIX_MAX_LEN`] bytes is rejected as a hallucination.
const SHORT_PREFIX: &str = "Thank you";

/// Length threshold for the short-prefix rule.
const SHORT_PREFIX_MAX_LEN: usize = 15;

/// Rejects known transcription-model hallucinations before a transcript is
/// forwarded.
#[derive(Debug, Clone)]
pub struct HallucinationFilter {
    blocklist: HashSet<String>,
}

impl Default for HallucinationFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl HallucinationFilter {
    /// Create a filter with the built-in blocklist.
    pub fn new() -> Self {
        Self {
            blocklist: BLOCKLIST.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create a filter with the built-in blocklist plus extra phrases.
    pub fn with_phrases<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = Self::new();
        filter
            .blocklist
            .extend(phrases.into_iter().map(|p| p.into()));
        filter
    }

    /// Apply the filter: returns the text unchanged if it passes, `None` if
    /// it is empty, whitespace, or a known hallucination.
    pub fn apply(&self, text: &str) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        if self.blocklist.contains(trimmed) {
            return None;
        }
        // Short "Thank you..." variants with trailing junk
        if trimmed.starts_with(SHORT_PREFIX) && text.len() < SHORT_PREFIX_MAX_LEN {
            return None;
        }
        Some(text.to_string())
    }

    /// Number of phrases in the blocklist.
    pub fn len(&self) -> usize {
        self.blocklist.len()
    }

    /// True when the blocklist is empty (never the case for `new()`).
    pub fn is_empty(&self) -> bool {
        self.blocklist.is_empty()
    }
}
