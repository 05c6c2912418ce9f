use html_test_support::{Scenario, fixture_paths, load_scenario};
use querymark::{RunError, run_scenario};

#[test]
fn fixtures_meet_their_expectations() {
    for path in fixture_paths() {
        let scenario = load_scenario(&path);
        let report = run_scenario(&scenario)
            .unwrap_or_else(|err| panic!("{path:?} failed to run: {err}"));
        let failures: Vec<String> = report
            .failures()
            .map(|(step, failure)| format!("step {step}: {failure}"))
            .collect();
        assert!(
            failures.is_empty(),
            "{path:?}\n{}",
            failures.join("\n")
        );
    }
}

#[test]
fn missing_target_element_is_an_error() {
    let scenario = Scenario::from_toml_str(
        r#"
        html = '<p highlightable>apple</p>'
        [[targets]]
        element = "nowhere"
        key = "k"
        [[steps]]
        key = "k"
        query = "apple"
        "#,
    )
    .unwrap();
    assert!(matches!(
        run_scenario(&scenario),
        Err(RunError::MissingElement(id)) if id == "nowhere"
    ));
}

#[test]
fn invalid_step_options_are_reported() {
    let scenario = Scenario::from_toml_str(
        r#"
        html = '<div id="t"><p highlightable>apple</p></div>'
        [[targets]]
        element = "t"
        key = "k"
        [[steps]]
        key = "k"
        query = "apple"
        options = { colour = "red" }
        "#,
    )
    .unwrap();
    assert!(matches!(run_scenario(&scenario), Err(RunError::Config(_))));
}

#[test]
fn report_records_phases_and_failed_expectations() {
    let scenario = Scenario::from_toml_str(
        r#"
        html = '<div id="t"><p highlightable>apple</p></div>'
        [[targets]]
        element = "t"
        key = "k"
        [[steps]]
        key = "k"
        query = "pear"
        expect.states.t = { has_local_match = true }
        "#,
    )
    .unwrap();
    let report = run_scenario(&scenario).unwrap();
    assert!(!report.passed());
    let target = &report.steps[0].targets["t"];
    assert_eq!(target.phase, "idle");
    assert!(target.has_query && !target.has_any_match);
    assert_eq!(
        report.failures().collect::<Vec<_>>(),
        [(1, "t: has-local-match: expected true, got false")]
    );
}
