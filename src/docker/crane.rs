//! Registry-side image inspection via the `crane` binary.
//!
//! `crane` talks to the registry directly, without pulling images through
//! the engine. It is pointed at the project-local credential store by
//! setting `HOME` to the directory containing `.docker/`.

use super::DockerService;
use crate::descriptor::{self, IMAGE_DESCRIPTOR_FILE, ImageBundleDescriptor};
use crate::error::{BundleCliError, DockerError, Result};
use crate::process::{CommandRunner, ProcessOutcome, ProcessRequest, run_parallel};
use flate2::read::GzDecoder;
use std::io::Read;

/// Registry inspection binary
pub const CRANE_BIN_NAME: &str = "crane";

/// Environment variable overriding the crane binary
pub const CRANE_BIN_ENV: &str = "BUNDLE_CLI_CRANE_BIN";

/// Concurrency ceiling for remote digest lookups
pub const MAX_PARALLEL_DIGESTS: usize = 6;

fn crane_program() -> String {
    match std::env::var(CRANE_BIN_ENV) {
        Ok(program) if !program.is_empty() => program,
        _ => CRANE_BIN_NAME.to_string(),
    }
}

impl<R: CommandRunner> DockerService<'_, R> {
    fn crane_request(&self) -> ProcessRequest {
        ProcessRequest::new(crane_program())
            .env("HOME", self.crane_home.display().to_string())
    }

    async fn run_crane(&self, request: ProcessRequest) -> Result<ProcessOutcome> {
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
                binary: crane_program(),
            }
            .into());
        }
        Ok(outcome)
    }

    /// Remote tags of an image, newest first.
    pub async fn list_tags(&self, image: &str) -> Result<Vec<String>> {
        let request = self.crane_request().arg("ls").arg(image);
        let outcome = self.run_crane(request).await?;
        if !outcome.success() {
            return Err(classify_listing_failure(image, &outcome.stderr_text()).into());
        }

        // crane prints tags oldest first
        let mut tags: Vec<String> = outcome
            .stdout_text()
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        tags.reverse();
        Ok(tags)
    }

    /// Registry digests for a set of tags, in the given tag order.
    ///
    /// The batch fails as a whole if any lookup fails.
    pub async fn digests_for(
        &self,
        image: &str,
        tags: &[String],
    ) -> Result<Vec<(String, String)>> {
        let requests: Vec<ProcessRequest> = tags
            .iter()
            .map(|tag| {
                self.crane_request()
                    .arg("digest")
                    .arg(format!("{image}:{tag}"))
            })
            .collect();
        let results = run_parallel(self.runner, requests, MAX_PARALLEL_DIGESTS).await;

        let mut digests = Vec::with_capacity(tags.len());
        for (result, tag) in results.into_iter().zip(tags) {
            let outcome = result.map_err(|e| DockerError::ExecutionFailed {
                command: crane_program(),
                reason: e.to_string(),
            })?;
            if outcome.command_not_found() {
                return Err(DockerError::CommandNotFound {
                    binary: crane_program(),
                }
                .into());
            }
            if !outcome.success() {
                log::debug!(
                    "crane digest {image}:{tag} failed: {}",
                    outcome.stderr_text()
                );
                return Err(DockerError::DigestsFailed {
                    image: image.to_string(),
                }
                .into());
            }
            digests.push((tag.clone(), outcome.stdout_text().trim().to_string()));
        }
        Ok(digests)
    }

    /// Extract and validate the bundle descriptor embedded in a published
    /// bundle image.
    ///
    /// Reads the image config to verify the bundle label, resolves the first
    /// layer from the manifest, downloads it and pulls `descriptor.yaml` out
    /// of the gzipped tar.
    pub async fn remote_bundle_descriptor(&self, image: &str) -> Result<ImageBundleDescriptor> {
        let config = self
            .crane_json(self.crane_request().arg("config").arg(image), |stderr| {
                log::debug!("crane config {image} failed: {stderr}");
                DockerError::ImageMetadataFailed
            })
            .await?;
        if config
            .pointer(&format!("/config/Labels/{}", super::BUNDLE_NAME_LABEL))
            .and_then(|v| v.as_str())
            .is_none()
        {
            return Err(DockerError::BundleLabelMissing {
                label: super::BUNDLE_NAME_LABEL.to_string(),
            }
            .into());
        }

        let manifest = self
            .crane_json_with(
                self.crane_request().arg("manifest").arg(image),
                |stderr| {
                    log::debug!("crane manifest {image} failed: {stderr}");
                    DockerError::ManifestFailed
                },
                DockerError::ManifestInvalidJson,
            )
            .await?;
        let layer_digest = manifest
            .pointer("/layers/0/digest")
            .and_then(|v| v.as_str())
            .ok_or(DockerError::LayerDigestMissing)?
            .to_string();

        let blob = self
            .run_crane(
                self.crane_request()
                    .arg("blob")
                    .arg(format!("{image}@{layer_digest}")),
            )
            .await?;
        if !blob.success() {
            log::debug!("crane blob {image}@{layer_digest} failed: {}", blob.stderr_text());
            return Err(DockerError::LayerArchiveUnreadable.into());
        }

        let raw = extract_file_from_tar_gz(&blob.stdout, IMAGE_DESCRIPTOR_FILE)?;
        let yaml = String::from_utf8(raw).map_err(|_| DockerError::DescriptorInvalidYaml)?;
        descriptor::parse_image_descriptor(&yaml).map_err(|e| match e {
            BundleCliError::Validation(source) => {
                DockerError::DescriptorInvalidFormat { source }.into()
            }
            _ => DockerError::DescriptorInvalidYaml.into(),
        })
    }

    async fn crane_json<E>(
        &self,
        request: ProcessRequest,
        on_failure: E,
    ) -> Result<serde_json::Value>
    where
        E: FnOnce(&str) -> DockerError,
    {
        self.crane_json_with(request, on_failure, DockerError::ImageMetadataFailed)
            .await
    }

    async fn crane_json_with<E>(
        &self,
        request: ProcessRequest,
        on_failure: E,
        on_invalid_json: DockerError,
    ) -> Result<serde_json::Value>
    where
        E: FnOnce(&str) -> DockerError,
    {
        let outcome = self.run_crane(request).await?;
        if !outcome.success() {
            return Err(on_failure(&outcome.stderr_text()).into());
        }
        serde_json::from_slice(&outcome.stdout).map_err(|e| {
            log::debug!("invalid JSON from crane: {e}");
            on_invalid_json.into()
        })
    }
}

// Classification is coupled to crane's current stderr wording; rules are
// checked in order and the first match wins.
fn classify_listing_failure(image: &str, stderr: &str) -> DockerError {
    if stderr.contains("NAME_UNKNOWN") {
        return DockerError::ImageNotFound {
            image: image.to_string(),
        };
    }
    if stderr.contains("UNAUTHORIZED") {
        return DockerError::RegistryAuthRequired {
            image: image.to_string(),
        };
    }
    log::debug!("crane ls {image} failed: {stderr}");
    DockerError::TagListingFailed {
        image: image.to_string(),
    }
}

/// Read one file out of a gzipped tar archive held in memory.
fn extract_file_from_tar_gz(bytes: &[u8], file_name: &str) -> Result<Vec<u8>> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let entries = archive
        .entries()
        .map_err(|_| DockerError::LayerArchiveUnreadable)?;
    for entry in entries {
        let mut entry = entry.map_err(|_| DockerError::LayerArchiveUnreadable)?;
        let path = entry
            .path()
            .map_err(|_| DockerError::LayerArchiveUnreadable)?;
        // layers may nest the descriptor under a leading directory
        let matches = path
            .file_name()
            .is_some_and(|name| name == file_name);
        if matches {
            let mut contents = Vec::new();
            entry
                .read_to_end(&mut contents)
                .map_err(|_| DockerError::LayerArchiveUnreadable)?;
            return Ok(contents);
        }
    }
    Err(DockerError::DescriptorNotInArchive {
        file: file_name.to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::path::Path;

    /// Runner that answers every command with one fixed outcome.
    struct ScriptedRunner {
        code: i32,
        stdout: &'static str,
        stderr: &'static str,
    }

    impl CommandRunner for ScriptedRunner {
        async fn run(&self, _request: ProcessRequest) -> std::io::Result<ProcessOutcome> {
            Ok(ProcessOutcome {
                code: self.code,
                stdout: self.stdout.as_bytes().to_vec(),
                stderr: self.stderr.as_bytes().to_vec(),
            })
        }
    }

    #[tokio::test]
    async fn tags_are_listed_newest_first() {
        // the tool prints oldest first
        let runner = ScriptedRunner {
            code: 0,
            stdout: "v1\nv2\nv3\n",
            stderr: "",
        };
        let docker = super::super::DockerService::new(&runner, Path::new("/tmp/bundle"));

        let tags = docker.list_tags("org/my-bundle").await.unwrap();
        assert_eq!(tags, ["v3", "v2", "v1"]);
    }

    #[tokio::test]
    async fn unknown_image_listing_is_classified() {
        let runner = ScriptedRunner {
            code: 1,
            stdout: "",
            stderr: "NAME_UNKNOWN: repository name not known to registry",
        };
        let docker = super::super::DockerService::new(&runner, Path::new("/tmp/bundle"));

        let error = docker.list_tags("org/missing").await.unwrap_err();
        assert_eq!(error.to_string(), "Image org/missing not found");
    }

    fn tar_gz(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_cksum();
            builder
                .append_data(&mut header, name, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn extracts_the_descriptor_from_a_layer_archive() {
        let archive = tar_gz(&[
            ("other.txt", "irrelevant"),
            ("app/descriptor.yaml", "name: my-bundle\n"),
        ]);
        let raw = extract_file_from_tar_gz(&archive, IMAGE_DESCRIPTOR_FILE).unwrap();
        assert_eq!(raw, b"name: my-bundle\n");
    }

    #[test]
    fn missing_descriptor_is_a_distinct_error() {
        let archive = tar_gz(&[("other.txt", "irrelevant")]);
        let error = extract_file_from_tar_gz(&archive, IMAGE_DESCRIPTOR_FILE).unwrap_err();
        assert!(error.to_string().contains("descriptor.yaml not found"));
    }

    #[test]
    fn garbage_bytes_are_an_unreadable_archive() {
        let error = extract_file_from_tar_gz(b"not an archive", IMAGE_DESCRIPTOR_FILE).unwrap_err();
        assert!(error.to_string().contains("Unable to read layer archive"));
    }

    #[test]
    fn listing_failures_classify_by_stderr_content() {
        let not_found = classify_listing_failure("org/img", "... NAME_UNKNOWN ...");
        assert!(matches!(not_found, DockerError::ImageNotFound { .. }));

        let auth = classify_listing_failure("org/img", "... UNAUTHORIZED ...");
        assert!(matches!(auth, DockerError::RegistryAuthRequired { .. }));

        let other = classify_listing_failure("org/img", "connection refused");
        assert!(matches!(other, DockerError::TagListingFailed { .. }));
    }
}
