//! # bundle-cli
//!
//! Packaging CLI for multi-component application bundles.
//!
//! A bundle is an application composed of microfrontends and microservices,
//! described by a declarative `bundle.json` descriptor and distributed as
//! container images. This crate validates descriptors against a constraint
//! schema, maps declared components to their on-disk layout, builds container
//! images, and publishes image sets to container registries.
//!
//! The substantive container work is delegated to external binaries (`docker`
//! for the engine, `crane` for registry inspection) invoked as processes;
//! this crate orchestrates them and translates their output into typed
//! results.
//!
//! ## Usage
//!
//! ```bash
//! bundle-cli validate                   # check bundle.json against the schema
//! bundle-cli pack --org myorg           # build components and images
//! bundle-cli publish --org myorg        # push the image set to a registry
//! bundle-cli tags myorg/my-bundle       # list remote tags, newest first
//! bundle-cli inspect myorg/my-bundle:v1 # extract and validate the remote descriptor
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Core modules
pub mod cli;
pub mod component;
pub mod config;
pub mod descriptor;
pub mod docker;
pub mod error;
pub mod process;

// Re-export main types for public API
pub use cli::Args;
pub use component::{Component, ComponentKind, ComponentService, ComponentStack, VersionedComponent};
pub use config::ConfigService;
pub use descriptor::{BundleDescriptor, BundleDescriptorService, ImageBundleDescriptor};
pub use docker::DockerService;
pub use error::{BundleCliError, CliError, DockerError, Result, ValidationError};
pub use process::{CommandRunner, ProcessOutcome, ProcessRequest, TokioRunner};
