//! Publish workflow: push the bundle image set to a container registry.
//!
//! The workflow resolves the organization and registry, repairs the local
//! image set if needed (retag after an organization change, or a single
//! automatic pack run when images are missing), authenticates against the
//! registry and pushes every image in order, bundle image first.

use super::pack::run_pack;
use crate::cli::OutputManager;
use crate::component::{ComponentKind, ComponentService};
use crate::config::{
    ConfigService, DOCKER_ORGANIZATION_PROPERTY, DOCKER_REGISTRY_PROPERTY,
};
use crate::descriptor::BundleDescriptorService;
use crate::docker::{DEFAULT_DOCKER_REGISTRY, DockerService, bundle_docker_images};
use crate::error::{CliError, Result};
use crate::process::CommandRunner;
use std::fmt::Write as _;
use std::path::Path;

/// Options of one publish invocation.
#[derive(Debug, Default)]
pub struct PublishOpts {
    /// `--org` flag value
    pub org: Option<String>,
    /// `--registry` flag value
    pub registry: Option<String>,
}

/// An image that was pushed, with the digest reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedImage {
    /// Full image reference
    pub name: String,
    /// Registry digest, empty when the engine reported none
    pub digest: String,
}

/// Outcome of a successful publish.
#[derive(Debug)]
pub struct PublishReport {
    /// The pushed bundle image
    pub bundle: PushedImage,
    /// Pushed microservice images, in declaration order
    pub microservices: Vec<PushedImage>,
}

impl PublishReport {
    /// Human-readable summary of the pushed image set.
    pub fn render(&self) -> String {
        let mut text = String::from("Images pushed successfully\n");
        text.push_str("\nBundle image\n");
        let _ = writeln!(text, "    Name:   {}", self.bundle.name);
        let _ = writeln!(text, "    Digest: {}", self.bundle.digest);
        if !self.microservices.is_empty() {
            text.push_str("\nMicroservices\n");
            for image in &self.microservices {
                let _ = writeln!(text, "    Name:   {}", image.name);
                let _ = writeln!(text, "    Digest: {}", image.digest);
            }
        }
        text
    }
}

/// Run the publish workflow against a bundle project directory.
pub async fn run_publish<R: CommandRunner>(
    runner: &R,
    bundle_dir: &Path,
    opts: &PublishOpts,
    output: &OutputManager,
) -> Result<PublishReport> {
    let descriptor = BundleDescriptorService::new(bundle_dir).load()?;
    let mut config = ConfigService::new(bundle_dir)?;

    let configured_org = config
        .get_property(DOCKER_ORGANIZATION_PROPERTY)
        .map(str::to_string);
    let organization = opts
        .org
        .clone()
        .or_else(|| configured_org.clone())
        .ok_or(CliError::NoOrganization)?;
    if let Some(flag_org) = &opts.org {
        config.add_or_update_property(DOCKER_ORGANIZATION_PROPERTY, flag_org)?;
    }

    let components = ComponentService::new(bundle_dir, &descriptor);
    let microservices = components.versioned_components(ComponentKind::Microservice)?;
    let mut images = bundle_docker_images(&descriptor, &microservices, &organization);

    let docker = DockerService::new(runner, bundle_dir);
    if !docker.bundle_images_exist(&images).await? {
        let mut repaired = false;
        // an organization change leaves the images behind under the old name
        if let Some(old_org) = &configured_org
            && *old_org != organization
        {
            let old_images = bundle_docker_images(&descriptor, &microservices, old_org);
            if docker.bundle_images_exist(&old_images).await? {
                output.warn("Docker organization changed. Updating images names.");
                images = docker
                    .update_images_organization(&old_images, old_org, &organization)
                    .await?;
                repaired = true;
            }
        }
        if !repaired {
            output.warn("One or more Docker images are missing. Running pack command.");
            run_pack(runner, bundle_dir, Some(organization.as_str()), output).await?;
            if !docker.bundle_images_exist(&images).await? {
                return Err(CliError::ImagesStillMissing.into());
            }
        }
    }

    let registry = opts
        .registry
        .clone()
        .or_else(|| {
            config
                .get_property(DOCKER_REGISTRY_PROPERTY)
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_DOCKER_REGISTRY.to_string());
    if let Some(flag_registry) = &opts.registry {
        config.add_or_update_property(DOCKER_REGISTRY_PROPERTY, flag_registry)?;
    }

    let images = docker.set_images_registry(&images, &registry).await?;

    output.info(&format!("Login on Docker registry {registry}"));
    if !docker.check_authentication(&registry).await? {
        docker.login(&registry).await?;
    }

    // the image set always starts with the bundle image; the counter only
    // advances once a push has actually succeeded
    let total = images.len();
    let bundle = PushedImage {
        name: images[0].clone(),
        digest: docker.push_image(&images[0]).await?,
    };
    output.step(&format!("1/{total}"));
    let mut pushed_microservices = Vec::with_capacity(total.saturating_sub(1));
    for (index, image) in images[1..].iter().enumerate() {
        pushed_microservices.push(PushedImage {
            name: image.clone(),
            digest: docker.push_image(image).await?,
        });
        output.step(&format!("{}/{total}", index + 2));
    }

    Ok(PublishReport {
        bundle,
        microservices: pushed_microservices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_bundle_and_microservices() {
        let report = PublishReport {
            bundle: PushedImage {
                name: "registry/org/my-bundle:0.0.1".to_string(),
                digest: "sha256:aaa".to_string(),
            },
            microservices: vec![PushedImage {
                name: "registry/org/my-ms:1.0.0".to_string(),
                digest: "sha256:bbb".to_string(),
            }],
        };

        let text = report.render();
        assert!(text.contains("Images pushed successfully"));
        assert!(text.contains("Bundle image"));
        assert!(text.contains("Name:   registry/org/my-bundle:0.0.1"));
        assert!(text.contains("Digest: sha256:aaa"));
        assert!(text.contains("Microservices"));
        assert!(text.contains("Name:   registry/org/my-ms:1.0.0"));
    }

    #[test]
    fn report_omits_microservices_section_when_empty() {
        let report = PublishReport {
            bundle: PushedImage {
                name: "registry/org/my-bundle:0.0.1".to_string(),
                digest: String::new(),
            },
            microservices: Vec::new(),
        };

        assert!(!report.render().contains("Microservices"));
    }
}
