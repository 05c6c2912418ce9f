use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Boolean attribute a host page sets on elements whose text may be highlighted.
pub const DEFAULT_MARKER_ATTRIBUTE: &str = "highlightable";
/// Element used to wrap matched fragments.
pub const DEFAULT_MARK_ELEMENT: &str = "mark";

pub const ATTR_HAS_QUERY: &str = "has-query";
pub const ATTR_HAS_LOCAL_MATCH: &str = "has-local-match";
pub const ATTR_HAS_SHADOW_MATCH: &str = "has-shadow-match";
pub const ATTR_HAS_ANY_MATCH: &str = "has-any-match";

/// Name of a query channel. Sources and targets agree on a key to communicate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Arc<str>);

impl QueryKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QueryKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for QueryKey {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

impl Borrow<str> for QueryKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Half-open byte range `[start, end)` inside a single text node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchRange {
    pub start: usize,
    pub end: usize,
}

impl MatchRange {
    pub const fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Match status a target reflects onto its root element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MatchState {
    pub has_query: bool,
    pub has_local_match: bool,
    pub has_shadow_match: bool,
}

impl MatchState {
    pub fn has_any_match(&self) -> bool {
        self.has_local_match || self.has_shadow_match
    }

    /// Attribute name/value pairs in the order they are written to the DOM.
    pub fn attributes(&self) -> [(&'static str, bool); 4] {
        [
            (ATTR_HAS_QUERY, self.has_query),
            (ATTR_HAS_LOCAL_MATCH, self.has_local_match),
            (ATTR_HAS_SHADOW_MATCH, self.has_shadow_match),
            (ATTR_HAS_ANY_MATCH, self.has_any_match()),
        ]
    }
}

/// Identity of a registered highlight target within a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u32);

impl TargetId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_match_is_local_or_shadow() {
        let mut state = MatchState::default();
        assert!(!state.has_any_match());
        state.has_shadow_match = true;
        assert!(state.has_any_match());
        state = MatchState {
            has_query: true,
            has_local_match: true,
            has_shadow_match: false,
        };
        assert!(state.has_any_match());
        assert_eq!(state.attributes()[3], (ATTR_HAS_ANY_MATCH, true));
    }

    #[test]
    fn only_zero_width_ranges_are_empty() {
        let a = MatchRange::new(2, 5);
        assert!(!a.is_empty());
        assert!(MatchRange::new(4, 4).is_empty());
    }
}
