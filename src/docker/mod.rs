//! Container image operations over the Docker engine.
//!
//! Every operation shells out to the `docker` binary through the
//! [`CommandRunner`] seam. Image references are plain strings of the form
//! `[registry/]organization/name:tag`; helpers on this module construct and
//! rewrite them. Registry-side inspection lives in [`crane`].

pub mod crane;

use crate::config::CONFIG_FOLDER;
use crate::descriptor::BundleDescriptor;
use crate::component::VersionedComponent;
use crate::error::{DockerError, Result};
use crate::process::{CommandRunner, IoMode, ProcessOutcome, ProcessRequest, run_parallel};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Docker engine binary
pub const DOCKER_COMMAND: &str = "docker";

/// Registry used when neither flag nor configuration names one
pub const DEFAULT_DOCKER_REGISTRY: &str = "registry.hub.docker.com";

/// Dockerfile name looked up in bundle and microservice directories
pub const DEFAULT_DOCKERFILE_NAME: &str = "Dockerfile";

/// Label that marks an image as a bundle image
pub const BUNDLE_NAME_LABEL: &str = "org.bundle-cli.bundle-name";

/// Environment variable overriding the docker credential store directory
pub const DOCKER_CONFIG_PATH_ENV: &str = "BUNDLE_CLI_DOCKER_CONFIG_PATH";

/// Concurrency ceiling for bounded image batches
pub const MAX_PARALLEL: usize = 6;

static PUSHED_DIGEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"digest:\s(\S*)").expect("valid pattern"));

/// One entry of a parallel image build batch.
#[derive(Debug, Clone)]
pub struct DockerBuildOptions {
    /// Image reference to tag the result with
    pub image: String,
    /// Dockerfile path, relative to `work_dir`
    pub dockerfile: PathBuf,
    /// Build context directory
    pub work_dir: PathBuf,
}

/// Docker engine operations for a bundle project.
///
/// Credentials are kept in a project-local docker config directory so that
/// `login` never touches the user's global credential store.
#[derive(Debug)]
pub struct DockerService<'a, R: CommandRunner> {
    runner: &'a R,
    docker_config_dir: PathBuf,
    crane_home: PathBuf,
}

impl<'a, R: CommandRunner> DockerService<'a, R> {
    /// Create a service for a bundle project directory.
    ///
    /// The credential store defaults to `.bundle/.docker` inside the project
    /// and can be overridden with the `BUNDLE_CLI_DOCKER_CONFIG_PATH`
    /// environment variable.
    pub fn new(runner: &'a R, bundle_dir: &Path) -> Self {
        let docker_config_dir = match std::env::var(DOCKER_CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => bundle_dir.join(CONFIG_FOLDER).join(".docker"),
        };
        // crane resolves credentials from $HOME/.docker, so its HOME is the
        // directory containing the docker config directory
        let crane_home = docker_config_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| bundle_dir.join(CONFIG_FOLDER));
        Self {
            runner,
            docker_config_dir,
            crane_home,
        }
    }

    fn docker_request(&self) -> ProcessRequest {
        ProcessRequest::new(DOCKER_COMMAND)
            .arg("--config")
            .arg(self.docker_config_dir.display().to_string())
    }

    async fn run(&self, request: ProcessRequest) -> Result<ProcessOutcome> {
        let command = request.command_line();
        let outcome = self
            .runner
            .run(request)
            .await
            .map_err(|e| DockerError::ExecutionFailed {
                command,
                reason: e.to_string(),
            })?;
        if outcome.command_not_found() {
            return Err(DockerError::CommandNotFound {
                binary: DOCKER_COMMAND.to_string(),
            }
            .into());
        }
        Ok(outcome)
    }

    /// Build one image, streaming build output to the terminal.
    pub async fn build_image(
        &self,
        image: &str,
        dockerfile: &Path,
        work_dir: &Path,
    ) -> Result<()> {
        let request = build_request(image, dockerfile, work_dir);
        let outcome = self.run(request).await?;
        if outcome.success() {
            Ok(())
        } else {
            Err(DockerError::BuildFailed {
                image: image.to_string(),
                code: outcome.code,
            }
            .into())
        }
    }

    /// Build a batch of images with bounded concurrency.
    ///
    /// Returns one exit code per entry, in input order, so callers can name
    /// exactly which builds failed.
    pub async fn parallel_build(&self, builds: Vec<DockerBuildOptions>) -> Result<Vec<i32>> {
        let requests: Vec<ProcessRequest> = builds
            .iter()
            .map(|build| build_request(&build.image, &build.dockerfile, &build.work_dir))
            .collect();
        let results = run_parallel(self.runner, requests, MAX_PARALLEL).await;

        let mut codes = Vec::with_capacity(results.len());
        for result in results {
            let outcome = result.map_err(|e| DockerError::ExecutionFailed {
                command: DOCKER_COMMAND.to_string(),
                reason: e.to_string(),
            })?;
            if outcome.command_not_found() {
                return Err(DockerError::CommandNotFound {
                    binary: DOCKER_COMMAND.to_string(),
                }
                .into());
            }
            codes.push(outcome.code);
        }
        Ok(codes)
    }

    /// True if every expected image exists in the local image store.
    ///
    /// A listing failure is an error, never a silent `false`.
    pub async fn bundle_images_exist(&self, images: &[String]) -> Result<bool> {
        let mut request = self.docker_request().args(["image", "ls"]);
        for image in images {
            request = request.arg("--filter").arg(format!("reference={image}"));
        }
        request = request.args(["--format", "{{.Repository}}:{{.Tag}}"]);

        let outcome = self.run(request).await?;
        if !outcome.success() {
            log::debug!("docker image ls failed: {}", outcome.stderr_text());
            return Err(DockerError::ImageListingFailed.into());
        }
        Ok(all_images_listed(&outcome.stdout_text(), images))
    }

    /// Check whether stored credentials are valid for a registry.
    pub async fn check_authentication(&self, registry: &str) -> Result<bool> {
        let request = self.docker_request().arg("login").arg(registry);
        let outcome = self.run(request).await?;
        if !outcome.success() {
            log::debug!("docker login check failed: {}", outcome.stderr_text());
        }
        Ok(outcome.success())
    }

    /// Log in to a registry.
    ///
    /// Stored credentials are tried first; on failure the login is retried
    /// once with the credential prompt wired to the terminal. A second
    /// failure is fatal.
    pub async fn login(&self, registry: &str) -> Result<()> {
        let stored = self.docker_request().arg("login").arg(registry);
        let outcome = self.run(stored).await?;
        if outcome.success() {
            return Ok(());
        }
        log::debug!(
            "non-interactive docker login failed: {}",
            outcome.stderr_text()
        );

        let interactive = self
            .docker_request()
            .arg("login")
            .arg(registry)
            .io(IoMode::Inherit);
        let outcome = self.run(interactive).await?;
        if outcome.success() {
            Ok(())
        } else {
            Err(DockerError::LoginFailed.into())
        }
    }

    /// Retag a set of images, returning the new references in input order.
    pub async fn create_tags<F>(&self, images: &[String], rewrite: F) -> Result<Vec<String>>
    where
        F: Fn(&str) -> String,
    {
        let targets: Vec<String> = images.iter().map(|image| rewrite(image)).collect();
        let requests: Vec<ProcessRequest> = images
            .iter()
            .zip(&targets)
            .map(|(source, target)| {
                self.docker_request()
                    .arg("tag")
                    .arg(source)
                    .arg(target)
            })
            .collect();

        let results = run_parallel(self.runner, requests, MAX_PARALLEL).await;
        for (result, target) in results.into_iter().zip(&targets) {
            let outcome = result.map_err(|e| DockerError::ExecutionFailed {
                command: DOCKER_COMMAND.to_string(),
                reason: e.to_string(),
            })?;
            if outcome.command_not_found() {
                return Err(DockerError::CommandNotFound {
                    binary: DOCKER_COMMAND.to_string(),
                }
                .into());
            }
            if !outcome.success() {
                log::debug!("docker tag {target} failed: {}", outcome.stderr_text());
                return Err(DockerError::TagCreationFailed.into());
            }
        }
        Ok(targets)
    }

    /// Retag images from one organization to another.
    pub async fn update_images_organization(
        &self,
        images: &[String],
        old_org: &str,
        new_org: &str,
    ) -> Result<Vec<String>> {
        self.create_tags(images, |image| {
            rewrite_organization(image, old_org, new_org)
        })
        .await
    }

    /// Prefix images with a registry host.
    pub async fn set_images_registry(
        &self,
        images: &[String],
        registry: &str,
    ) -> Result<Vec<String>> {
        self.create_tags(images, |image| format!("{registry}/{image}"))
            .await
    }

    /// Push one image and return its registry digest, or an empty string
    /// when the engine reported none.
    pub async fn push_image(&self, image: &str) -> Result<String> {
        let request = self.docker_request().arg("push").arg(image);
        let outcome = self.run(request).await?;
        if !outcome.success() {
            log::debug!("docker push {image} failed: {}", outcome.stderr_text());
            return Err(DockerError::PushFailed.into());
        }
        Ok(extract_digest(&outcome.stdout_text()))
    }
}

fn build_request(image: &str, dockerfile: &Path, work_dir: &Path) -> ProcessRequest {
    ProcessRequest::new(DOCKER_COMMAND)
        .args(["build", "--platform", "linux/amd64"])
        .arg("-f")
        .arg(dockerfile.display().to_string())
        .arg("-t")
        .arg(image)
        .arg(".")
        .work_dir(work_dir)
        .io(IoMode::Stream)
}

/// Compose an image reference from its parts.
pub fn image_name(organization: &str, name: &str, tag: &str) -> String {
    format!("{organization}/{name}:{tag}")
}

/// The full image set of a bundle: the bundle image first, then one image
/// per microservice, in declaration order.
pub fn bundle_docker_images(
    descriptor: &BundleDescriptor,
    microservices: &[VersionedComponent],
    organization: &str,
) -> Vec<String> {
    let mut images = vec![image_name(
        organization,
        &descriptor.name,
        &descriptor.version,
    )];
    for ms in microservices {
        images.push(image_name(organization, &ms.component.name, &ms.version));
    }
    images
}

fn rewrite_organization(image: &str, old_org: &str, new_org: &str) -> String {
    match image.strip_prefix(&format!("{old_org}/")) {
        Some(rest) => format!("{new_org}/{rest}"),
        None => image.to_string(),
    }
}

fn all_images_listed(listing: &str, images: &[String]) -> bool {
    let listed: Vec<&str> = listing.lines().map(str::trim).collect();
    images
        .iter()
        .all(|image| listed.contains(&image.as_str()))
}

fn extract_digest(push_output: &str) -> String {
    PUSHED_DIGEST
        .captures(push_output)
        .map(|captures| captures[1].to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_name_composes_reference() {
        assert_eq!(image_name("myorg", "my-bundle", "0.0.1"), "myorg/my-bundle:0.0.1");
    }

    #[test]
    fn digest_extracted_from_push_output() {
        let output = "0.0.1: digest: sha256:52b239f9 size: 2411\n";
        assert_eq!(extract_digest(output), "sha256:52b239f9");
    }

    #[test]
    fn missing_digest_yields_empty_string() {
        assert_eq!(extract_digest("pushed without digest line"), "");
    }

    #[test]
    fn organization_rewrite_replaces_leading_segment() {
        assert_eq!(
            rewrite_organization("old-org/my-bundle:0.0.1", "old-org", "new-org"),
            "new-org/my-bundle:0.0.1"
        );
    }

    #[test]
    fn organization_rewrite_ignores_non_matching_images() {
        assert_eq!(
            rewrite_organization("other/my-bundle:0.0.1", "old-org", "new-org"),
            "other/my-bundle:0.0.1"
        );
    }

    #[test]
    fn listing_check_requires_every_image() {
        let images = vec![
            "myorg/my-bundle:0.0.1".to_string(),
            "myorg/my-ms:1.0.0".to_string(),
        ];
        let complete = "myorg/my-bundle:0.0.1\nmyorg/my-ms:1.0.0\n";
        let partial = "myorg/my-bundle:0.0.1\n";
        assert!(all_images_listed(complete, &images));
        assert!(!all_images_listed(partial, &images));
        assert!(all_images_listed("", &[]));
    }

    #[test]
    fn bundle_image_set_starts_with_the_bundle() {
        use crate::component::{Component, ComponentKind, ComponentStack};
        let descriptor: BundleDescriptor = serde_json::from_str(
            r#"{
                "name": "my-bundle",
                "version": "0.0.1",
                "microfrontends": [],
                "microservices": [{ "name": "my-ms", "stack": "node" }]
            }"#,
        )
        .unwrap();
        let microservices = vec![VersionedComponent {
            component: Component {
                name: "my-ms".to_string(),
                stack: ComponentStack::Node,
                kind: ComponentKind::Microservice,
            },
            version: "1.0.0".to_string(),
        }];

        let images = bundle_docker_images(&descriptor, &microservices, "myorg");
        assert_eq!(images, ["myorg/my-bundle:0.0.1", "myorg/my-ms:1.0.0"]);
    }
}
