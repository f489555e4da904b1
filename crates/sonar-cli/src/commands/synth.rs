//! `sonar synth` — Synthesize the stack into a cloud assembly.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use sonar_common::constants::{DEFAULT_OUT_DIR, STACK_NAME};
use sonar_sdk::app::App;

use crate::output;

/// Arguments for the `synth` command.
#[derive(Args, Debug)]
pub struct SynthArgs {
    /// Directory receiving the cloud assembly.
    #[arg(long, short, default_value = DEFAULT_OUT_DIR)]
    pub out: PathBuf,

    /// Print the template to stdout instead of writing the assembly.
    #[arg(long)]
    pub stdout: bool,
}

impl Default for SynthArgs {
    fn default() -> Self {
        Self {
            out: PathBuf::from(DEFAULT_OUT_DIR),
            stdout: false,
        }
    }
}

/// Executes the `synth` command.
///
/// Builds the stack, renders its template, and writes the template and
/// manifest under the output directory.
///
/// # Errors
///
/// Returns an error if the stack fails to build or the assembly cannot
/// be written.
pub fn execute(args: &SynthArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let stack = super::build_stack(config)?;
    let mut app = App::new();
    let _ = app.add_stack(stack);
    let assembly = app.synth()?;

    if args.stdout {
        let template = assembly
            .template(STACK_NAME)
            .context("synthesized assembly has no template for the stack")?;
        println!("{template}");
        return Ok(());
    }

    let written = assembly.write_to(&args.out)?;
    tracing::info!(out = %args.out.display(), files = written.len(), "cloud assembly written");
    println!("Synthesized to: {}", args.out.display());
    for path in &written {
        println!("  {}", path.display());
    }
    for (stack, entry) in &assembly.manifest().artifacts {
        println!(
            "  {stack}: {} ({})",
            output::pluralize(entry.resource_count, "resource"),
            output::short_hash(entry.fingerprint.as_hex())
        );
    }
    Ok(())
}
