use clap::{CommandFactory, FromArgMatches};
use tracing::Level;

mod cli;
mod commands;

fn main() -> anyhow::Result<()> {
    // Filter order is taken from argument positions, so keep the raw matches.
    let matches = cli::Cli::command().get_matches();
    let cli = cli::Cli::from_arg_matches(&matches)?;

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    commands::run_command(cli, &matches)
}
