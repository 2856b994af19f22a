/// Substring filter for decoded log text
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubstringFilter {
    /// Text that must appear in a record for it to be shown
    pattern: String,
}

impl SubstringFilter {
    /// Create a new filter; an empty pattern matches everything
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Check if decoded text passes this filter
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_empty() || text.contains(&self.pattern)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}
