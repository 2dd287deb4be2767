// src/main.rs

use std::process::ExitCode;

use plandag::report::RunOutcome;
use plandag::{cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    match run_main().await {
        Ok(None | Some(RunOutcome::Completed)) => ExitCode::SUCCESS,
        Ok(Some(_)) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("plandag error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run_main() -> anyhow::Result<Option<RunOutcome>> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
