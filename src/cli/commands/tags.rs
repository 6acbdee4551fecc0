//! Tags command: list remote tags of an image, newest first.

use crate::cli::OutputManager;
use crate::docker::DockerService;
use crate::error::Result;
use crate::process::CommandRunner;
use std::path::Path;

/// List remote tags; with `digests` set, resolve the digest of each tag.
pub async fn execute_tags<R: CommandRunner>(
    runner: &R,
    bundle_dir: &Path,
    image: &str,
    digests: bool,
    output: &OutputManager,
) -> Result<i32> {
    let docker = DockerService::new(runner, bundle_dir);
    let tags = docker.list_tags(image).await?;
    if digests {
        for (tag, digest) in docker.digests_for(image, &tags).await? {
            output.println(&format!("{tag} {digest}"));
        }
    } else {
        for tag in &tags {
            output.println(tag);
        }
    }
    Ok(0)
}
