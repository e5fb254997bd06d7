// Entry point.
//
// One run, no flags: read the optional `elecciones.json`, rebuild every
// output from the input files and print a short console summary.
use election_report::config::{ReportConfig, CONFIG_FILE};
use election_report::output;
use election_report::pipeline::{self, department_rows};
use election_report::report::RunStatus;
use election_report::util;
use log::error;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = ReportConfig::load_or_default(Path::new(CONFIG_FILE));
    println!("Processing election data...");
    let outcome = pipeline::run(&cfg);

    println!("Department totals:\n");
    output::preview_table_rows(&department_rows(&outcome.department_totals), 10);
    if let Some(summary) = &outcome.locality_summary {
        println!(
            "{}: won in {} localities, lost in {}.",
            summary.target_candidate,
            util::format_int(summary.won.len() as u64),
            util::format_int(summary.lost.len() as u64)
        );
    }

    let written = match pipeline::write_outputs(&cfg, &outcome, chrono::Local::now()) {
        Ok(w) => w,
        Err(e) => {
            error!("{}", e);
            eprintln!("Write error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Report saved to {}", written.report.display());
    if let Some(map) = &written.map {
        println!("Map saved to {}", map.display());
    }
    println!(
        "Summary saved to {} and {}",
        written.summary.display(),
        written.totals_csv.display()
    );
    match &outcome.model.status {
        RunStatus::Complete => println!("Done."),
        RunStatus::Degraded { warnings } => {
            println!("Done with {} warning(s); see the report for details.", warnings)
        }
        RunStatus::Failed { reason } => println!("Report generated without data: {}", reason),
    }
    ExitCode::SUCCESS
}
