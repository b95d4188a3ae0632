//! Nube CLI — declarative cloud topology planning.

use clap::Parser;
use log::LevelFilter;

use nube::cli::{dispatch, Cli};

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    if let Err(e) = dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
