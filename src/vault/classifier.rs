//! Privacy tier classification.
//!
//! Pure and total: the tier depends only on a record's title, notes and
//! category.
//!
//! 1. title or notes contain a sensitive keyword (case-insensitive) → `secret`
//! 2. category is one of the private categories (case-insensitive)  → `private`
//! 3. otherwise                                                      → `public`

use super::record::{RecordDraft, Tier};

/// Keywords that mark a record as `secret` when no configuration is given.
pub const DEFAULT_SENSITIVE_KEYWORDS: &[&str] = &[
    "password",
    "bank",
    "ssn",
    "social security",
    "pin code",
    "seed",
    "mnemonic",
    "private key",
    "credit card",
    "cvv",
    "secret",
    "api key",
    "wallet",
    "recovery",
];

/// Categories that mark a record as `private` when no configuration is given.
pub const DEFAULT_PRIVATE_CATEGORIES: &[&str] = &["Banking", "Personal"];

/// Configured classification policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierClassifier {
    keywords: Vec<String>,
    private_categories: Vec<String>,
}

impl Default for TierClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_SENSITIVE_KEYWORDS.iter().map(|s| (*s).to_string()),
            DEFAULT_PRIVATE_CATEGORIES.iter().map(|s| (*s).to_string()),
        )
    }
}

impl TierClassifier {
    /// Build a classifier; keywords and categories are matched case-insensitively.
    /// Blank keywords are dropped so they cannot match everything.
    pub fn new(
        keywords: impl IntoIterator<Item = String>,
        private_categories: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            private_categories: private_categories
                .into_iter()
                .map(|c| c.trim().to_lowercase())
                .collect(),
        }
    }

    /// Classify a record's content.
    pub fn classify(&self, draft: &RecordDraft) -> Tier {
        self.classify_fields(&draft.title, &draft.notes, &draft.category)
    }

    pub fn classify_fields(&self, title: &str, notes: &str, category: &str) -> Tier {
        let title = title.to_lowercase();
        let notes = notes.to_lowercase();

        if self
            .keywords
            .iter()
            .any(|k| title.contains(k.as_str()) || notes.contains(k.as_str()))
        {
            return Tier::Secret;
        }

        let category = category.trim().to_lowercase();
        if self.private_categories.iter().any(|c| *c == category) {
            return Tier::Private;
        }

        Tier::Public
    }
}
