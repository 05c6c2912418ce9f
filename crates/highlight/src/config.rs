use crate::error::ConfigError;
use core_types::{DEFAULT_MARK_ELEMENT, DEFAULT_MARKER_ATTRIBUTE};
use normalize::{HighlightOptions, NormalizerSpec, NormalizerStep};
use serde::{Deserialize, Serialize};

/// Names the highlighter uses when reading and writing the DOM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighlightSettings {
    /// Boolean attribute designating a text container.
    pub marker_attribute: String,
    /// Element wrapped around each match.
    pub mark_element: String,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            marker_attribute: DEFAULT_MARKER_ATTRIBUTE.to_string(),
            mark_element: DEFAULT_MARK_ELEMENT.to_string(),
        }
    }
}

/// Preset names as they appear in config files: one name or a list.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum NormalizerConfig {
    Preset(String),
    List(Vec<String>),
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        NormalizerConfig::Preset(normalize::builtin::DEFAULT.to_string())
    }
}

impl NormalizerConfig {
    pub fn to_spec(&self) -> NormalizerSpec {
        match self {
            NormalizerConfig::Preset(name) => NormalizerSpec::from(name.as_str()),
            NormalizerConfig::List(names) => NormalizerSpec::List(
                names
                    .iter()
                    .map(|name| NormalizerStep::from(name.as_str()))
                    .collect(),
            ),
        }
    }
}

/// File form of highlight options and DOM naming.
///
/// ```toml
/// split_words = true
/// exact_match = false
/// normalizers = ["default", "alnum"]
/// marker_attribute = "highlightable"
/// mark_element = "mark"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HighlightConfig {
    pub split_words: bool,
    pub exact_match: bool,
    pub normalizers: NormalizerConfig,
    pub marker_attribute: String,
    pub mark_element: String,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        let settings = HighlightSettings::default();
        Self {
            split_words: false,
            exact_match: false,
            normalizers: NormalizerConfig::default(),
            marker_attribute: settings.marker_attribute,
            mark_element: settings.mark_element,
        }
    }
}

impl HighlightConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn options(&self) -> HighlightOptions {
        HighlightOptions {
            split_words: self.split_words,
            exact_match: self.exact_match,
            normalizers: self.normalizers.to_spec(),
        }
    }

    pub fn settings(&self) -> HighlightSettings {
        HighlightSettings {
            marker_attribute: self.marker_attribute.to_ascii_lowercase(),
            mark_element: self.mark_element.to_ascii_lowercase(),
        }
    }
}
