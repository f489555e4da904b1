//! # sonar-sdk
//!
//! Public SDK for declaring and synthesizing the Sonar stack.
//!
//! Provides two main entry points:
//! - [`SonarStack`](stack::SonarStack): Builds the fully wired resource graph.
//! - [`App`](app::App): Collects stacks and synthesizes them into a cloud assembly.
//!
//! # Example
//!
//! ```rust,no_run
//! use sonar_sdk::app::App;
//! use sonar_sdk::stack::SonarStack;
//!
//! # fn main() -> sonar_common::error::Result<()> {
//! let mut app = App::new();
//! app.add_stack(SonarStack::build("sonar")?);
//! let assembly = app.synth()?;
//! assembly.write_to(std::path::Path::new("cdk.out"))?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod stack;
