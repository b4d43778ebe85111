//! `tcn` operator binary.
//!
//! # Usage
//!
//! ```bash
//! # Mint an authorization key
//! tcn keygen
//!
//! # List the numbers a key broadcasts at indices 100..110
//! tcn numbers --secret <HEX> --start 100 --count 10
//!
//! # Sign a report for indices 0..=96 and check it
//! tcn report --secret <HEX> --start 0 --end 96 --memo user-42 > report.hex
//! tcn verify --report "$(cat report.hex)" --expand
//!
//! # Five simulated devices exchanging reports in memory
//! tcn simulate --devices 5 --periods 96
//! ```

mod commands;

use std::io::Write;

use clap::{Parser, Subcommand};
use tcn_core::DEFAULT_CHUNK_SIZE;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Temporary contact number toolkit
#[derive(Parser, Debug)]
#[command(name = "tcn")]
#[command(about = "Key, report and exposure tooling for temporary contact numbers")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a report authorization key
    Keygen,

    /// List broadcast numbers derived from a key
    Numbers {
        /// Authorization key (hex)
        #[arg(long)]
        secret: String,

        /// First chain index
        #[arg(long, default_value = "0")]
        start: u16,

        /// How many numbers to list
        #[arg(long, default_value = "10")]
        count: u16,
    },

    /// Sign a report over a range of chain indices
    Report {
        /// Authorization key (hex)
        #[arg(long)]
        secret: String,

        /// First disclosed index
        #[arg(long)]
        start: u16,

        /// Last disclosed index (inclusive)
        #[arg(long)]
        end: u16,

        /// Memo format tag (0 = CoEpi, 1 = Covid Watch)
        #[arg(long, default_value = "1")]
        memo_type: u8,

        /// Memo payload, usually a pseudonymous user id
        #[arg(long, default_value = "")]
        memo: String,
    },

    /// Verify a hex-encoded signed report
    Verify {
        /// Signed report (hex)
        #[arg(long)]
        report: String,

        /// Also list every disclosed number
        #[arg(long)]
        expand: bool,
    },

    /// Run an in-memory exposure simulation
    Simulate {
        /// Number of devices in the ring
        #[arg(long, default_value = "3")]
        devices: usize,

        /// Broadcast periods before the check
        #[arg(long, default_value = "96")]
        periods: usize,

        /// Identifiers per store update
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut out = std::io::stdout().lock();

    match args.command {
        Command::Keygen => commands::keygen(&mut out)?,
        Command::Numbers { secret, start, count } => {
            commands::numbers(&mut out, &secret, start, count)?;
        },
        Command::Report { secret, start, end, memo_type, memo } => {
            commands::report(&mut out, &secret, start, end, memo_type, &memo)?;
        },
        Command::Verify { report, expand } => {
            if !commands::verify(&mut out, &report, expand)? {
                out.flush()?;
                return Err("report signature does not verify".into());
            }
        },
        Command::Simulate { devices, periods, chunk_size } => {
            commands::simulate(&mut out, devices, periods, chunk_size).await?;
        },
    }

    out.flush()?;
    Ok(())
}
