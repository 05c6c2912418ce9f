use crate::transform::NormalizerSpec;

/// How a query is matched against text.
#[derive(Clone, Debug, Default)]
pub struct HighlightOptions {
    /// Treat each whitespace-separated word as its own term.
    pub split_words: bool,
    /// Terms only match when bounded by non-word characters.
    pub exact_match: bool,
    pub normalizers: NormalizerSpec,
}

impl HighlightOptions {
    pub fn split_words(mut self, on: bool) -> Self {
        self.split_words = on;
        self
    }

    pub fn exact_match(mut self, on: bool) -> Self {
        self.exact_match = on;
        self
    }

    pub fn normalizers(mut self, spec: impl Into<NormalizerSpec>) -> Self {
        self.normalizers = spec.into();
        self
    }
}
