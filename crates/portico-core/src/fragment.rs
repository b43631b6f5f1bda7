//! The extracted `{content, styles}` pair.

/// Markup and stylesheet text that went through the extraction pipeline.
///
/// Only [`crate::extract::Extractor`] can build one, so holding a
/// `TrustedFragment` means the content had its scripts removed and its
/// resource URLs made absolute, and the styles were sanitized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedFragment {
    content: String,
    styles: String,
}

impl TrustedFragment {
    pub(crate) fn new(content: String, styles: String) -> Self {
        Self { content, styles }
    }

    pub(crate) fn empty() -> Self {
        Self::new(String::new(), String::new())
    }

    /// Serialized children of the content container.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// `@import` rules followed by sanitized `<style>` bodies.
    pub fn styles(&self) -> &str {
        &self.styles
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.styles.is_empty()
    }

    pub(crate) fn into_parts(self) -> (String, String) {
        (self.content, self.styles)
    }
}
