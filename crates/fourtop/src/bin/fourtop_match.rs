//! Match jets to the truth partons of fully hadronic top-quark pairs.
//!
//!     fourtop-match -i EVENTS.parquet -o MATCHED.parquet
//!
//! The log level is set with `--verbosity` and can be overridden with the `FOURTOP_LOG`
//! environment variable.
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use fourtop::{matching::DEFAULT_MAX_DISTANCE, prelude::*};
use log::{debug, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input Parquet file with one row per event
    #[arg(short, long)]
    input_path: String,

    /// Output Parquet file for the matched events
    #[arg(short, long)]
    output_path: String,

    /// Largest Delta R at which a parton and a jet are matched
    #[arg(long, default_value_t = DEFAULT_MAX_DISTANCE)]
    max_distance: f64,

    /// Number of worker threads (default: one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Stop at the first event with an unexpected decay topology instead of skipping it
    #[arg(long)]
    abort_on_topology_error: bool,

    /// Floating-point precision of the output: 'f32' or 'f64'
    #[arg(long, default_value = "f64")]
    precision: FloatPrecision,

    /// Number of events per written record batch
    #[arg(long, default_value_t = fourtop::data::DEFAULT_WRITE_BATCH_SIZE)]
    batch_size: usize,

    /// Do not draw progress bars
    #[arg(long)]
    no_progress: bool,

    /// Verbosity level: 'off', 'error', 'warn', 'info', 'debug', 'trace'
    #[arg(short, long, default_value = "info")]
    verbosity: String,
}

impl Args {
    fn process_options(&self) -> ProcessOptions {
        let policy = if self.abort_on_topology_error {
            TopologyPolicy::Abort
        } else {
            TopologyPolicy::Skip
        };
        let options = ProcessOptions::new()
            .matching(MatchingOptions::default().max_distance(self.max_distance))
            .topology_policy(policy)
            .progress(!self.no_progress);
        match self.threads {
            Some(threads) => options.threads(threads),
            None => options,
        }
    }

    fn write_options(&self) -> DatasetWriteOptions {
        DatasetWriteOptions::default()
            .batch_size(self.batch_size)
            .precision(self.precision)
    }
}

fn run(args: &Args) -> Result<Cutflow> {
    let start = Instant::now();
    info!("Reading events from {}", args.input_path);
    let dataset = read_parquet(&args.input_path)
        .with_context(|| format!("Failed to read events from {}", args.input_path))?;
    info!("Loaded {} events", dataset.n_events());

    let (matched, cutflow) =
        process(&dataset, &args.process_options()).context("Failed to process events")?;
    for line in cutflow.to_string().lines() {
        info!("{line}");
    }

    info!("Writing {} events to {}", matched.n_events(), args.output_path);
    write_matched_parquet(&matched, &args.output_path, &args.write_options())
        .with_context(|| format!("Failed to write results to {}", args.output_path))?;
    debug!("Finished in {:.2}s", start.elapsed().as_secs_f64());
    Ok(cutflow)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let env = Env::default().filter_or("FOURTOP_LOG", args.verbosity.as_str());
    env_logger::init_from_env(env);

    run(&args).map(|_| ())
}
