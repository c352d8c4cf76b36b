//! Find the most common error reports among a batch of simulated clients.

use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use mastic_heavy_hitters::{
    ClearAggregator, Codec, Error, ErrorReport, HeavyHitterSearch, HeavyHitters, MasticAggregator,
    PrefixAggregator, Report, SearchConfig, Threshold,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CTX: &[u8] = b"error reports";

/// Known error types. The search can start below these instead of at the root of the tree.
const ERROR_TYPES: [u8; 3] = [0x00, 0x01, 0x02];

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Mastic,
    Clear,
}

#[derive(Debug, Parser)]
#[command(about = "Private heavy hitters over simulated error reports")]
struct Args {
    /// Width of the encoded reports in bits.
    #[arg(long, default_value_t = 41)]
    bits: u16,

    /// Minimum number of clients that must send a report for it to be revealed.
    #[arg(long, default_value_t = 2)]
    threshold: u64,

    #[arg(long, value_enum, default_value_t = Backend::Mastic)]
    backend: Backend,

    /// Start the search from the known error types rather than from the root of the tree.
    #[arg(long)]
    by_error_type: bool,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

fn reports(codec: &Codec) -> Result<Vec<Report>, Error> {
    let samples = [
        (0x00, 0x10, 0x20, "A", 2),
        (0x00, 0x10, 0x20, "B", 2),
        (0x02, 0x10, 0x20, "C", 1),
        (0x01, 0x11, 0x21, "D", 3),
    ];

    let mut reports = Vec::new();
    for (error_type, client_version, client_context, origin, clients) in samples {
        let measurement = ErrorReport {
            error_type,
            client_version,
            client_context,
            origin: origin.to_string(),
        }
        .encode(codec)?;
        reports.extend(std::iter::repeat_with(|| Report::new(measurement)).take(clients));
    }
    Ok(reports)
}

fn search<A: PrefixAggregator>(
    args: &Args,
    aggregator: A,
    reports: &[Report],
) -> Result<HeavyHitters, Error> {
    let threshold = Threshold::at_least(args.threshold);
    let config = if args.by_error_type {
        // Level 7 prefixes are the first byte, the error type.
        SearchConfig::from_prefixes(args.bits, 7, ERROR_TYPES.map(u128::from), threshold)?
    } else {
        SearchConfig::bitwise(args.bits, threshold)?
    };
    HeavyHitterSearch::new(config, aggregator, reports).run()
}

fn run(args: &Args) -> Result<(), Error> {
    let codec = Codec::new(args.bits)?;
    let reports = reports(&codec)?;
    info!(num_reports = reports.len(), backend = ?args.backend, "starting search");

    let heavy_hitters = match args.backend {
        Backend::Mastic => search(args, MasticAggregator::new(args.bits, CTX)?, &reports)?,
        Backend::Clear => search(args, ClearAggregator::new(args.bits), &reports)?,
    };

    for (report, count) in heavy_hitters.decode_error_reports(&codec)? {
        println!(
            "{count}\terror_type={:#04x} client_version={:#04x} client_context={:#04x} origin={:?}",
            report.error_type, report.client_version, report.client_context, report.origin
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
