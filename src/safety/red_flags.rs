//! Keyword-based red-flag detection.
//!
//! Runs before any remote reasoning call. A match short-circuits the
//! conversation straight to an emergency-call response.

/// Built-in critical phrases, in priority order.
pub const DEFAULT_RED_FLAGS: &[&str] = &[
    "unconscious",
    "not breathing",
    "difficulty breathing",
    "heavy bleeding",
    "chest pain",
    "stroke",
    "poison",
    "heart attack",
    "severe burn",
    "anaphylaxis",
    "choking",
    "seizure",
];

/// Case-insensitive substring classifier over an ordered phrase list.
#[derive(Debug, Clone)]
pub struct RedFlagClassifier {
    phrases: Vec<String>,
}

impl Default for RedFlagClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RED_FLAGS.iter().copied())
    }
}

impl RedFlagClassifier {
    /// Build from an ordered phrase list. Blank phrases are ignored.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// First phrase (by list order, not text position) contained in `text`.
    pub fn classify(&self, text: &str) -> Option<&str> {
        if text.trim().is_empty() {
            return None;
        }
        let lower = text.to_lowercase();
        self.phrases
            .iter()
            .find(|p| lower.contains(p.as_str()))
            .map(String::as_str)
    }
}
