use clap::Parser;
use html_test_support::Scenario;
use mimalloc::MiMalloc;
use querymark::{ScenarioReport, run_scenario};
use std::path::PathBuf;
use std::process::ExitCode;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Debug, Parser)]
#[command(name = "querymark")]
#[command(about = "Replay a highlight scenario and print markup and match state per step")]
struct Cli {
    /// Scenario file (TOML)
    scenario: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let report = match Scenario::read(&cli.scenario)
        .map_err(|err| err.to_string())
        .and_then(|scenario| run_scenario(&scenario).map_err(|err| err.to_string()))
    {
        Ok(report) => report,
        Err(err) => {
            eprintln!("querymark: {err}");
            return ExitCode::from(2);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("querymark: {err}");
                return ExitCode::from(2);
            }
        }
    } else {
        print_report(&report);
    }

    if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_report(report: &ScenarioReport) {
    if !report.name.is_empty() {
        println!("# {}", report.name);
    }
    for (idx, step) in report.steps.iter().enumerate() {
        println!("step {}: set_query({:?}, {:?})", idx + 1, step.key, step.query);
        println!("  html: {}", step.html);
        for (element, target) in &step.targets {
            println!(
                "  #{element} [{}] {}: query={} local={} shadow={} any={}",
                target.key,
                target.phase,
                target.has_query,
                target.has_local_match,
                target.has_shadow_match,
                target.has_any_match
            );
        }
    }
    for (step, failure) in report.failures() {
        eprintln!("step {step}: {failure}");
    }
}
