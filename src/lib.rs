//! Scenario runner tying the workspace together: parse a document, bind
//! targets and sources to one [`QueryStore`], replay `set_query` steps and
//! report the highlighted markup and match states after each one.

use binding::{BindingError, HighlightHost, Phase, SyncBindingController};
use bus::QueryStore;
use core_types::MatchState;
use highlight::{ConfigError, HighlightConfig, HighlightSettings};
use html::{Document, DomError};
use html_test_support::{Scenario, diff_lines, html_lines};
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid document: {0}")]
    Dom(#[from] DomError),
    #[error("invalid highlight options: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error("no element with id '{0}'")]
    MissingElement(String),
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TargetReport {
    pub key: String,
    pub phase: String,
    pub has_query: bool,
    pub has_local_match: bool,
    pub has_shadow_match: bool,
    pub has_any_match: bool,
}

impl TargetReport {
    fn of(controller: &SyncBindingController) -> Self {
        let state = controller.match_state().unwrap_or_default();
        Self {
            key: controller.key().to_string(),
            phase: phase_name(controller.phase()).to_string(),
            has_query: state.has_query,
            has_local_match: state.has_local_match,
            has_shadow_match: state.has_shadow_match,
            has_any_match: state.has_any_match(),
        }
    }

    fn state(&self) -> MatchState {
        MatchState {
            has_query: self.has_query,
            has_local_match: self.has_local_match,
            has_shadow_match: self.has_shadow_match,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub key: String,
    pub query: String,
    pub html: String,
    /// Target states by element id.
    pub targets: BTreeMap<String, TargetReport>,
    /// Unmet expectations; empty when the step passed.
    pub failures: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub steps: Vec<StepReport>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|step| step.failures.is_empty())
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &str)> {
        self.steps.iter().enumerate().flat_map(|(idx, step)| {
            step.failures
                .iter()
                .map(move |failure| (idx + 1, failure.as_str()))
        })
    }
}

/// Runs every step of `scenario` against a fresh host and store.
pub fn run_scenario(scenario: &Scenario) -> Result<ScenarioReport, RunError> {
    let settings = match &scenario.config {
        Some(table) => config_from_table(table)?.settings(),
        None => HighlightSettings::default(),
    };
    let host = HighlightHost::with_settings(Document::from_html(&scenario.html)?, settings);
    let store = QueryStore::new();

    let mut targets = Vec::with_capacity(scenario.targets.len());
    for target in &scenario.targets {
        let root = host
            .element_by_id(&target.element)
            .ok_or_else(|| RunError::MissingElement(target.element.clone()))?;
        let mut controller =
            SyncBindingController::target(store.clone(), target.key.as_str(), host.clone(), root);
        controller.attach()?;
        targets.push((target.element.clone(), controller));
    }

    let mut sources: BTreeMap<String, SyncBindingController> = BTreeMap::new();
    let mut steps = Vec::with_capacity(scenario.steps.len());
    for step in &scenario.steps {
        let source = match sources.entry(step.key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut source =
                    SyncBindingController::source(store.clone(), step.key.as_str(), Default::default());
                source.attach()?;
                entry.insert(source)
            }
        };
        if let Some(table) = &step.options {
            source.set_options(config_from_table(table)?.options())?;
        }
        source.update_query(&step.query)?;

        let html = host.with_document(|doc| doc.inner_html(doc.root()));
        let reports: BTreeMap<String, TargetReport> = targets
            .iter()
            .map(|(element, controller)| (element.clone(), TargetReport::of(controller)))
            .collect();
        let mut failures = Vec::new();
        if let Some(expect) = &step.expect {
            if let Some(expected) = &expect.html {
                if *expected != html {
                    failures.push(format!(
                        "markup mismatch\n{}",
                        diff_lines(&html_lines(expected), &html_lines(&html))
                    ));
                }
            }
            for (element, expected) in &expect.states {
                match reports.get(element) {
                    Some(report) => failures.extend(
                        expected
                            .mismatches(&report.state())
                            .into_iter()
                            .map(|m| format!("{element}: {m}")),
                    ),
                    None => failures.push(format!("{element}: not a target")),
                }
            }
        }
        log::debug!(
            "step '{}' = {:?}: {} failures",
            step.key,
            step.query,
            failures.len()
        );
        steps.push(StepReport {
            key: step.key.clone(),
            query: step.query.clone(),
            html,
            targets: reports,
            failures,
        });
    }

    for (_, controller) in &mut targets {
        controller.detach()?;
    }
    store.dispose();
    Ok(ScenarioReport {
        name: scenario.name.clone(),
        steps,
    })
}

fn config_from_table(table: &toml::Table) -> Result<HighlightConfig, ConfigError> {
    HighlightConfig::from_toml_str(&table.to_string())
}

fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Unbound => "unbound",
        Phase::Bound => "bound",
        Phase::Idle => "idle",
        Phase::Matched => "matched",
    }
}
