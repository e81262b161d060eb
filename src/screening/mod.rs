/// Terms flagged when no override is configured.
pub const DEFAULT_KEYWORDS: [&str; 5] = ["bomb", "attack", "kill", "jihad", "terror"];

/// Case-insensitive substring screen over a fixed keyword list.
#[derive(Debug, Clone)]
pub struct KeywordScreen {
    keywords: Vec<String>,
}

impl Default for KeywordScreen {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }
}

impl KeywordScreen {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Every keyword contained in `text`, in list order. Matching is plain
    /// substring search, so "skill" flags "kill".
    pub fn scan(&self, text: &str) -> Vec<String> {
        let text = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|keyword| text.contains(keyword.as_str()))
            .cloned()
            .collect()
    }
}
