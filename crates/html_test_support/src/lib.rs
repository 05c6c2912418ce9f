//! Shared helpers for tests and the scenario runner: TOML scenario fixtures
//! and readable line diffs of serialized markup.

use std::fmt::Write;

pub mod scenario;

pub use crate::scenario::{
    ExpectedState, Expectation, Scenario, ScenarioError, ScenarioStep, ScenarioTarget,
    fixture_paths, fixtures_dir, load_scenario,
};

/// Escapes control characters, quotes and backslashes so a string prints on
/// one line.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch < ' ' => {
                let _ = write!(out, "\\u{{{:02X}}}", ch as u32);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Splits serialized markup so every tag starts a new line.
pub fn html_lines(html: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for ch in html.chars() {
        if ch == '<' && !current.is_empty() {
            lines.push(escape_text(&current));
            current.clear();
        }
        current.push(ch);
        if ch == '>' {
            lines.push(escape_text(&current));
            current.clear();
        }
    }
    if !current.is_empty() {
        lines.push(escape_text(&current));
    }
    lines
}

/// Report around the first differing line, or an empty string when equal.
pub fn diff_lines(expected: &[String], actual: &[String]) -> String {
    const MISSING: &str = "<missing>";
    let total = expected.len().max(actual.len());
    let line = |lines: &[String], idx: usize| lines.get(idx).map_or(MISSING, String::as_str).to_owned();
    let first = (0..total).find(|&idx| line(expected, idx) != line(actual, idx));

    let mut out = String::new();
    let Some(first) = first else {
        return out;
    };
    let from = first.saturating_sub(2);
    let to = (first + 3).min(total);
    let _ = writeln!(out, "first difference at line {}:", first + 1);
    for idx in from..to {
        let marker = if idx == first { '>' } else { ' ' };
        let _ = writeln!(out, "{marker} {:>4}  expected: {}", idx + 1, line(expected, idx));
        let _ = writeln!(out, "{marker} {:>4}    actual: {}", idx + 1, line(actual, idx));
    }
    let _ = writeln!(
        out,
        "expected {} lines, actual {} lines",
        expected.len(),
        actual.len()
    );
    out
}

/// Panics with a line diff when the two markup strings differ.
#[track_caller]
pub fn assert_html_eq(expected: &str, actual: &str) {
    if expected == actual {
        return;
    }
    let diff = diff_lines(&html_lines(expected), &html_lines(actual));
    panic!("markup mismatch\n{diff}");
}
