//! CLI command definitions and dispatch.

pub mod plan;
pub mod synth;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use sonar_common::config::StackConfig;
use sonar_common::constants::{BIN_NAME, STACK_NAME};
use sonar_sdk::stack::SonarStack;

/// Sonar — declarative stack for a containerized code-quality service.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute. Defaults to `synth`.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// YAML file overriding the reference stack configuration.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Synthesize the stack into a cloud assembly.
    Synth(synth::SynthArgs),
    /// Display the deployment order and the dependencies of every resource.
    Plan(plan::PlanArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Some(Command::Synth(args)) => synth::execute(&args, config),
        Some(Command::Plan(args)) => plan::execute(&args, config),
        None => synth::execute(&synth::SynthArgs::default(), config),
    }
}

/// Builds the stack, applying `config` overrides when given.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the stack
/// fails to build.
pub fn build_stack(config: Option<&Path>) -> anyhow::Result<SonarStack> {
    let config = match config {
        Some(path) => StackConfig::load(path)?,
        None => StackConfig::default(),
    };
    Ok(SonarStack::build_with(STACK_NAME, &config)?)
}
