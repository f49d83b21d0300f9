use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing::{error, info};

use dijet::cluster::JettyClusterer;
use dijet::config::{
    output_file_name, parse_pt_hat_max, ConfigError, ProducerConfig, PtHatWindow,
    SimulatorConfig,
};
use dijet::producer::EventProducer;
use dijet::simulator::{Simulator, ToyGenerator};
use dijet::{logging, Error, RecordSink};

/// Upper pTHat bound, `None` if unbounded
#[derive(Debug, Copy, Clone)]
struct PtHatMax(Option<f64>);

fn parse_max(s: &str) -> Result<PtHatMax, ConfigError> {
    parse_pt_hat_max(s).map(PtHatMax)
}

/// Simulate dijet events and write the reconstructed jets to a record file
#[derive(Parser, Debug)]
#[command(name = "dijet-produce", version, allow_negative_numbers = true)]
struct Args {
    /// Minimum transverse momentum of the hard process in GeV
    pt_hat_min: f64,
    /// Maximum transverse momentum of the hard process in GeV, 'inf' or negative for no limit
    #[arg(value_parser = parse_max)]
    pt_hat_max: PtHatMax,
    /// Number of event generation attempts
    #[arg(default_value_t = 100)]
    n_events: u64,
    /// Random number seed
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Directory for the record file
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    /// Compress the record file
    #[arg(long)]
    gzip: bool,
    /// Increase log verbosity
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn produce<S: Simulator>(
    args: &Args,
    pt_hat: &PtHatWindow,
    simulator: &mut S,
) -> Result<PathBuf, Error> {
    let config = ProducerConfig::new();
    let mut path = args
        .output_dir
        .join(output_file_name(pt_hat, config.jet_def.radius));
    if args.gzip {
        path.set_extension("jets.gz");
    }
    let mut producer = EventProducer::new(config, JettyClusterer::new());
    let mut sink = RecordSink::create(path)?;
    sink.header(&producer.description());
    producer.run(simulator, args.n_events, |record| sink.push(record))?;
    let summary = producer.summary(simulator, pt_hat);
    sink.finish(&summary)
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

    let pt_hat = match PtHatWindow::new(args.pt_hat_min, args.pt_hat_max.0) {
        Ok(pt_hat) => pt_hat,
        Err(err) => {
            error!("{err}");
            return ExitCode::from(1);
        }
    };
    let mut simulator = ToyGenerator::new(SimulatorConfig {
        pt_hat,
        seed: args.seed,
        ..Default::default()
    });
    if let Err(err) = simulator.init() {
        error!("{err}");
        return ExitCode::from(2);
    }
    match produce(&args, &pt_hat, &mut simulator) {
        Ok(path) => {
            info!("Jet records written to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::from(1)
        }
    }
}
