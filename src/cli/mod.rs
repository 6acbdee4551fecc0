//! Command line interface.
//!
//! Argument parsing, terminal output and the command workflows built on the
//! library modules.

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command};
pub use commands::execute_command;
pub use output::OutputManager;
