use crate::error::HighlightError;
use core_types::MatchRange;
use regex::{Regex, RegexBuilder};

/// Case-insensitive matcher for a set of already-normalized query terms.
#[derive(Clone, Debug)]
pub struct MatchLocator {
    patterns: Vec<Regex>,
    exact_match: bool,
}

impl MatchLocator {
    pub fn new(terms: &[String], exact_match: bool) -> Result<Self, HighlightError> {
        let patterns = terms
            .iter()
            .filter(|term| !term.is_empty())
            .map(|term| {
                RegexBuilder::new(&regex::escape(term))
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| HighlightError::InvalidTerm {
                        term: term.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            exact_match,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Sorted, non-overlapping ranges in `text`'s coordinates.
    ///
    /// All term hits are collected, ordered by start (stable, so earlier terms
    /// win ties), then any hit starting before the previously kept hit's end is
    /// dropped.
    pub fn locate(&self, text: &str) -> Vec<MatchRange> {
        let mut hits = Vec::new();
        for pattern in &self.patterns {
            let mut at = 0;
            while at <= text.len() {
                let Some(m) = pattern.find_at(text, at) else {
                    break;
                };
                if m.is_empty() {
                    break;
                }
                if !self.exact_match || is_word_bounded(text, m.start(), m.end()) {
                    hits.push(MatchRange::new(m.start(), m.end()));
                    at = m.end();
                } else {
                    // Retry from the next char so a bounded hit overlapping this
                    // rejected one is still found.
                    at = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
                }
            }
        }
        hits.sort_by_key(|r| r.start);

        let mut kept: Vec<MatchRange> = Vec::with_capacity(hits.len());
        for hit in hits {
            if kept.last().is_some_and(|prev| hit.start < prev.end) {
                continue;
            }
            kept.push(hit);
        }
        kept
    }
}

/// One-shot form of [`MatchLocator::locate`].
pub fn locate(
    text: &str,
    terms: &[String],
    exact_match: bool,
) -> Result<Vec<MatchRange>, HighlightError> {
    Ok(MatchLocator::new(terms, exact_match)?.locate(text))
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn slices<'a>(text: &'a str, ranges: &[MatchRange]) -> Vec<&'a str> {
        ranges.iter().map(|r| &text[r.start..r.end]).collect()
    }

    #[test]
    fn exact_match_respects_word_boundaries() {
        let text = "he is manly and a man.";
        let ranges = locate(text, &terms(&["man"]), true).unwrap();
        assert_eq!(ranges, vec![MatchRange::new(18, 21)]);

        let loose = locate(text, &terms(&["man"]), false).unwrap();
        assert_eq!(slices(text, &loose), ["man", "man"]);
    }

    #[test]
    fn exact_match_retries_after_rejected_hit() {
        // The first candidate "aa" at 0 is followed by 'a'; the bounded one starts at 4.
        let text = "aaa aa";
        let ranges = locate(text, &terms(&["aa"]), true).unwrap();
        assert_eq!(ranges, vec![MatchRange::new(4, 6)]);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let text = "Apple APPLE apple";
        let ranges = locate(text, &terms(&["apple"]), false).unwrap();
        assert_eq!(ranges.len(), 3);
    }

    #[test]
    fn overlaps_keep_the_earliest_hit() {
        let text = "foobar";
        let ranges = locate(text, &terms(&["oba", "foo", "bar"]), false).unwrap();
        assert_eq!(slices(text, &ranges), ["foo", "bar"]);
    }

    #[test]
    fn equal_starts_prefer_the_earlier_term() {
        let text = "foobar";
        let ranges = locate(text, &terms(&["foo", "foobar"]), false).unwrap();
        assert_eq!(slices(text, &ranges), ["foo"]);
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let text = "cost: $5 (approx.)";
        let ranges = locate(text, &terms(&["$5 (approx.)"]), false).unwrap();
        assert_eq!(ranges, vec![MatchRange::new(6, 18)]);
    }

    #[test]
    fn ranges_are_sorted_and_disjoint() {
        let text = "abababab cab abba";
        let ranges = locate(text, &terms(&["ab", "ba", "bab", "b"]), false).unwrap();
        for pair in ranges.windows(2) {
            assert!(pair[0].end <= pair[1].start, "{ranges:?}");
        }
        assert!(!ranges.is_empty());
    }

    #[test]
    fn unicode_words_count_as_word_characters() {
        let text = "café cafe";
        let ranges = locate(text, &terms(&["caf"]), true).unwrap();
        assert!(ranges.is_empty());
    }
}
