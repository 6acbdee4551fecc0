//! Command line argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Packaging CLI for multi-component application bundles
#[derive(Parser, Debug)]
#[command(
    name = "bundle-cli",
    version,
    about = "Validate, build and publish application bundles",
    long_about = "Validate a bundle descriptor, build its components into \
container images and publish the image set to a container registry.

Run from an initialized bundle project directory (one containing a \
bundle.json descriptor), or point at one with --directory."
)]
pub struct Args {
    /// Bundle project directory (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the bundle descriptor against its schema
    Validate,

    /// Build bundle components and their container images
    Pack {
        /// Docker organization to tag images with
        #[arg(long, value_name = "ORGANIZATION")]
        org: Option<String>,
    },

    /// Push the bundle image set to a container registry
    Publish {
        /// Docker organization to publish under
        #[arg(long, value_name = "ORGANIZATION")]
        org: Option<String>,

        /// Target registry host
        #[arg(long, value_name = "REGISTRY")]
        registry: Option<String>,
    },

    /// List remote tags of an image, newest first
    Tags {
        /// Image reference without tag, e.g. registry/org/name
        image: String,

        /// Also resolve the digest of each tag
        #[arg(long)]
        digests: bool,
    },

    /// Extract and validate the descriptor of a published bundle image
    Inspect {
        /// Bundle image reference, e.g. registry/org/name:tag
        image: String,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
