//! Quarry command line
//!
//! Configuration, logging setup and the `quarry` subcommands, exposed as a
//! library so they can be tested without spawning the binary.

pub mod commands;
pub mod config;
pub mod logging;

pub use commands::{Cli, Command};
pub use config::AppConfig;
