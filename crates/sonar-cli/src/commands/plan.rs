//! `sonar plan` — Display the deployment order of the stack.

use std::path::Path;

use clap::Args;
use sonar_common::constants::STACK_NAME;
use sonar_sdk::stack::Stack;

use crate::output;

/// Arguments for the `plan` command.
#[derive(Args, Debug, Default)]
pub struct PlanArgs {
    /// Also list the resources that depend on each resource.
    #[arg(long)]
    pub dependents: bool,
}

/// Executes the `plan` command.
///
/// Builds the stack, resolves the topological order, and prints every
/// resource with the edges it depends on.
///
/// # Errors
///
/// Returns an error if the stack fails to build or contains a cycle.
pub fn execute(args: &PlanArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let stack = super::build_stack(config)?;
    let graph = stack.graph();
    let order = graph.deployment_order()?;

    println!("Deployment Plan for: {STACK_NAME}");
    println!("{}", output::rule(35));
    println!();

    for id in &order {
        let Some(node) = graph.node(id) else {
            continue;
        };
        println!("  + {id} ({})", node.kind().label());
        for (dependency, edge) in graph.dependencies(id) {
            println!("      {}", output::format_edge(dependency.as_str(), edge));
        }
        if args.dependents {
            for dependent in graph.dependents(id) {
                println!("      <- {dependent}");
            }
        }
    }

    println!();
    println!(
        "  {} will be deployed.",
        output::pluralize(order.len(), "resource")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_with_reference_configuration_succeeds() {
        assert!(execute(&PlanArgs { dependents: true }, None).is_ok());
    }
}
