//! Pack workflow: build components and their container images.

use crate::cli::OutputManager;
use crate::component::{ComponentKind, ComponentService};
use crate::config::{ConfigService, DOCKER_ORGANIZATION_PROPERTY};
use crate::descriptor::BundleDescriptorService;
use crate::docker::{
    DEFAULT_DOCKERFILE_NAME, DockerBuildOptions, DockerService, bundle_docker_images, image_name,
};
use crate::error::{CliError, ComponentError, DockerError, Result};
use crate::process::CommandRunner;
use std::path::Path;

/// Build every component of the bundle, then the bundle image and one image
/// per microservice.
///
/// The organization comes from the `--org` flag or the configured value; a
/// flag value is persisted for later invocations. Component builds run
/// sequentially with streamed output; image builds run as a bounded parallel
/// batch.
pub async fn run_pack<R: CommandRunner>(
    runner: &R,
    bundle_dir: &Path,
    org: Option<&str>,
    output: &OutputManager,
) -> Result<()> {
    let descriptor = BundleDescriptorService::new(bundle_dir).load()?;
    let mut config = ConfigService::new(bundle_dir)?;
    let organization = resolve_organization(&mut config, org)?;

    let components = ComponentService::new(bundle_dir, &descriptor);
    if !components.components().is_empty() {
        output.section("Components");
    }
    for component in components.components() {
        output.progress(&format!("Building component {}", component.name));
        for request in components.build_requests(component)? {
            let outcome = runner.run(request).await?;
            if !outcome.success() {
                return Err(ComponentError::BuildFailed {
                    name: component.name.clone(),
                    code: outcome.code,
                }
                .into());
            }
        }
    }

    let docker = DockerService::new(runner, bundle_dir);
    output.section("Docker images");
    let bundle_image = image_name(&organization, &descriptor.name, &descriptor.version);
    output.progress(&format!("Building bundle image {bundle_image}"));
    docker
        .build_image(&bundle_image, Path::new(DEFAULT_DOCKERFILE_NAME), bundle_dir)
        .await?;

    let microservices = components.versioned_components(ComponentKind::Microservice)?;
    let builds: Vec<DockerBuildOptions> = microservices
        .iter()
        .map(|ms| DockerBuildOptions {
            image: image_name(&organization, &ms.component.name, &ms.version),
            dockerfile: DEFAULT_DOCKERFILE_NAME.into(),
            work_dir: components.component_path(&ms.component),
        })
        .collect();
    if !builds.is_empty() {
        output.progress(&format!(
            "Building {} microservice image(s)",
            builds.len()
        ));
        let codes = docker.parallel_build(builds.clone()).await?;
        let mut first_failure = None;
        for (build, code) in builds.iter().zip(codes) {
            if code != 0 {
                output.error(&format!(
                    "Build of image {} failed with exit code {code}",
                    build.image
                ));
                first_failure.get_or_insert((build.image.clone(), code));
            }
        }
        if let Some((image, code)) = first_failure {
            return Err(DockerError::BuildFailed { image, code }.into());
        }
    }

    let images = bundle_docker_images(&descriptor, &microservices, &organization);
    output.success(&format!("Built {} Docker image(s)", images.len()));
    Ok(())
}

fn resolve_organization(config: &mut ConfigService, flag: Option<&str>) -> Result<String> {
    match flag {
        Some(organization) => {
            config.add_or_update_property(DOCKER_ORGANIZATION_PROPERTY, organization)?;
            Ok(organization.to_string())
        }
        None => config
            .get_property(DOCKER_ORGANIZATION_PROPERTY)
            .map(str::to_string)
            .ok_or_else(|| CliError::NoOrganization.into()),
    }
}
