//! Diff and merge node-graph documents on the command line.

use anyhow::Result;
use clap::Parser as _;
use clap_verbosity_flag::VerbosityFilter;
use graft_cli::{CliArgs, CliCommand};
use tracing::metadata::LevelFilter;

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let level = match cli_args.verbose.filter() {
        VerbosityFilter::Off => LevelFilter::OFF,
        VerbosityFilter::Error => LevelFilter::ERROR,
        VerbosityFilter::Warn => LevelFilter::WARN,
        VerbosityFilter::Info => LevelFilter::INFO,
        VerbosityFilter::Debug => LevelFilter::DEBUG,
        VerbosityFilter::Trace => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli_args.command {
        CliCommand::Diff(mut args) => args.run()?,
        CliCommand::Merge(mut args) => args.run()?,
        _ => unreachable!("CliCommand is marked #[non_exhaustive] within this crate only"),
    };

    Ok(())
}
