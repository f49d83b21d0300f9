use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing::{error, info};

use dijet::analysis::{analyse_file, DEFAULT_INPUT, DEFAULT_OUTPUT};
use dijet::logging;

/// Fill histograms of jet and dijet observables from a jet record file
#[derive(Parser, Debug)]
#[command(name = "dijet-analyse", version)]
struct Args {
    /// Jet record file
    #[arg(default_value = DEFAULT_INPUT)]
    input: PathBuf,
    /// Histogram output file
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,
    /// Increase log verbosity
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    logging::init(args.verbose);

    match analyse_file(&args.input, &args.output) {
        Ok(observables) => {
            info!(
                "Histograms of {} events written to {}",
                observables.n_records(),
                args.output.display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::from(1)
        }
    }
}
