// src/main.rs

use clap::Parser;
use rts_savings::cli::Args;
use rts_savings::config::HarnessConfig;
use rts_savings::Harness;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};

fn main() -> ExitCode {
    let args = Args::parse();

    if args.init {
        print!("{}", HarnessConfig::default_toml());
        return ExitCode::SUCCESS;
    }

    let filter = if args.verbose { "rts_savings=debug" } else { "rts_savings=info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every target succeeded
fn run(args: &Args) -> anyhow::Result<bool> {
    let start_time = Instant::now();

    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::discover()?.unwrap_or_default(),
    };
    args.apply(&mut config);

    let targets = args.targets(&config);
    if targets.is_empty() {
        anyhow::bail!("no targets given; pass repository folders or list them in rts.toml");
    }

    let harness = Harness::new(config);
    let results = harness.run_all(&targets);

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    for (name, result) in &results {
        if let Ok(report) = result {
            info!("{}: {} rows, stopped: {:?}", name, report.rows.len(), report.end);
        }
    }

    info!("Finished {} targets ({} failed) in {:.2?}", results.len(), failed, start_time.elapsed());
    Ok(failed == 0)
}
