//! # sonar — Sonar stack synthesizer
//!
//! Builds the Sonar stack and writes its cloud assembly.
//! Running `sonar` with no subcommand synthesizes into `cdk.out/`.

mod commands;
mod output;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::execute(cli)
}
