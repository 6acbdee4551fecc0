//! bundle-cli - packaging CLI for multi-component application bundles.
//!
//! Validates bundle descriptors, builds component container images and
//! publishes them to container registries.

use bundle_cli::cli::{self, Args, OutputManager};
use std::process;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();

    // --verbose is a shorthand for RUST_LOG=debug; an explicit RUST_LOG wins
    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose && std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    match cli::execute_command(args).await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Never quiet for fatal errors
            let output = OutputManager::new(false);
            output.error(&format!("{e}"));
            process::exit(1);
        }
    }
}
