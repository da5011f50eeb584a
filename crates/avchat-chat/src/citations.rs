//! Streaming removal of `[docN]` citation markers.

use avchat_core::text::{partial_citation_len, strip_citations};

/// Strips citation markers from a fragment sequence, holding back any tail
/// that could still become a marker once the next fragment arrives.
#[derive(Debug, Default)]
pub struct CitationFilter {
    pending: String,
}

impl CitationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter one fragment. May return an empty string while a possible
    /// marker is held back.
    pub fn push(&mut self, fragment: &str) -> String {
        self.pending.push_str(fragment);
        let cleaned = strip_citations(&self.pending);
        let hold = partial_citation_len(&cleaned);
        let (ready, held) = cleaned.split_at(cleaned.len() - hold);
        let ready = ready.to_string();
        self.pending = held.to_string();
        ready
    }

    /// Release whatever is still held back.
    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_all(fragments: &[&str]) -> String {
        let mut filter = CitationFilter::new();
        let mut out: String = fragments.iter().map(|f| filter.push(f)).collect();
        out.push_str(&filter.finish());
        out
    }

    #[test]
    fn test_marker_split_across_fragments() {
        assert_eq!(
            filter_all(&["The sky is blue [d", "oc1", "2] today."]),
            "The sky is blue  today."
        );
    }

    #[test]
    fn test_bracket_that_is_not_a_marker_is_released() {
        let mut filter = CitationFilter::new();
        assert_eq!(filter.push("see [d"), "see ");
        assert_eq!(filter.push("ata]"), "[data]");
        assert_eq!(filter.finish(), "");
    }

    #[test]
    fn test_unfinished_marker_flushed_at_end() {
        assert_eq!(filter_all(&["trailing [doc4"]), "trailing [doc4");
    }

    #[test]
    fn test_matches_complete_stripping() {
        let text = "Alpha [doc1]. Beta[doc2][doc3] gamma.";
        let fragments: Vec<String> = text.chars().map(String::from).collect();
        let refs: Vec<&str> = fragments.iter().map(String::as_str).collect();
        assert_eq!(filter_all(&refs), strip_citations(text));
    }
}
