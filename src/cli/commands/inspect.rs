//! Inspect command: extract the descriptor of a published bundle image.

use crate::cli::OutputManager;
use crate::docker::DockerService;
use crate::error::Result;
use crate::process::CommandRunner;
use std::path::Path;

/// Download, validate and summarize the descriptor embedded in a bundle
/// image.
pub async fn execute_inspect<R: CommandRunner>(
    runner: &R,
    bundle_dir: &Path,
    image: &str,
    output: &OutputManager,
) -> Result<i32> {
    let docker = DockerService::new(runner, bundle_dir);
    let descriptor = docker.remote_bundle_descriptor(image).await?;

    output.println(&format!("Name:               {}", descriptor.name));
    output.println(&format!(
        "Descriptor version: {}",
        descriptor.descriptor_version
    ));
    if let Some(description) = &descriptor.description {
        output.println(&format!("Description:        {description}"));
    }
    Ok(0)
}
