//! Tooling & Integration Layer
//!
//! Command-line front end over snapshot building, reconciliation, sync, and serving.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
