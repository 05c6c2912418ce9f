//! Scenario files: a document, the targets bound in it, and an ordered list
//! of `set_query` steps with optional expectations.
//!
//! ```toml
//! name = "split words"
//! html = '<div id="t"><p highlightable>I like apple pie</p></div>'
//!
//! [[targets]]
//! element = "t"
//! key = "k1"
//!
//! [[steps]]
//! key = "k1"
//! query = "apple pie"
//! options = { split_words = true }
//! expect.html = '...'
//! expect.states.t = { has_local_match = true }
//! ```
//!
//! `config` and step `options` are kept as raw tables; the runner decides how
//! to interpret them.

use core_types::MatchState;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid scenario {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    pub html: String,
    /// Highlighter naming (`marker_attribute`, `mark_element`) and default options.
    #[serde(default)]
    pub config: Option<toml::Table>,
    #[serde(default)]
    pub targets: Vec<ScenarioTarget>,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioTarget {
    /// `id` attribute of the target's root element.
    pub element: String,
    pub key: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioStep {
    pub key: String,
    pub query: String,
    #[serde(default)]
    pub options: Option<toml::Table>,
    #[serde(default)]
    pub expect: Option<Expectation>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expectation {
    /// Serialized document after the step.
    #[serde(default)]
    pub html: Option<String>,
    /// Expected states by target element id.
    #[serde(default)]
    pub states: BTreeMap<String, ExpectedState>,
}

/// Partial match state; unset fields are not checked.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExpectedState {
    pub has_query: Option<bool>,
    pub has_local_match: Option<bool>,
    pub has_shadow_match: Option<bool>,
    pub has_any_match: Option<bool>,
}

impl ExpectedState {
    /// Human-readable description of every field that disagrees with `actual`.
    pub fn mismatches(&self, actual: &MatchState) -> Vec<String> {
        let expected = [
            self.has_query,
            self.has_local_match,
            self.has_shadow_match,
            self.has_any_match,
        ];
        actual
            .attributes()
            .into_iter()
            .zip(expected)
            .filter_map(|((name, got), want)| match want {
                Some(want) if want != got => Some(format!("{name}: expected {want}, got {got}")),
                _ => None,
            })
            .collect()
    }
}

impl Scenario {
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn read(path: &Path) -> Result<Self, ScenarioError> {
        let content = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ScenarioError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Test helper: reads a scenario or panics with the reason.
#[track_caller]
pub fn load_scenario(path: &Path) -> Scenario {
    Scenario::read(path).unwrap_or_else(|err| panic!("{err}"))
}

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// All `*.toml` fixtures, sorted by file name.
pub fn fixture_paths() -> Vec<PathBuf> {
    let dir = fixtures_dir();
    let entries = fs::read_dir(&dir)
        .unwrap_or_else(|err| panic!("failed to read fixtures dir {dir:?}: {err}"));
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inline_scenario() {
        let scenario = Scenario::from_toml_str(
            r#"
            html = '<div id="t"><p highlightable>apple</p></div>'

            [[targets]]
            element = "t"
            key = "k1"

            [[steps]]
            key = "k1"
            query = "apple"
            options = { split_words = true }
            expect.states.t = { has_local_match = true }
            "#,
        )
        .unwrap();
        assert_eq!(scenario.targets[0].element, "t");
        let step = &scenario.steps[0];
        let options = step.options.as_ref().unwrap();
        assert_eq!(options.get("split_words").and_then(toml::Value::as_bool), Some(true));
        let expect = step.expect.as_ref().unwrap();
        assert_eq!(expect.states["t"].has_local_match, Some(true));
        assert_eq!(expect.html, None);
    }

    #[test]
    fn partial_state_only_checks_set_fields() {
        let expected = ExpectedState {
            has_any_match: Some(true),
            ..ExpectedState::default()
        };
        let actual = MatchState {
            has_query: true,
            has_local_match: false,
            has_shadow_match: false,
        };
        assert_eq!(
            expected.mismatches(&actual),
            ["has-any-match: expected true, got false"]
        );
    }

    #[test]
    fn every_fixture_parses() {
        let paths = fixture_paths();
        assert!(!paths.is_empty());
        for path in paths {
            let scenario = load_scenario(&path);
            assert!(!scenario.steps.is_empty(), "{path:?} has no steps");
        }
    }
}
