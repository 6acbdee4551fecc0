//! Bundle descriptor model, loading and validation.
//!
//! `bundle.json` at the root of a bundle project declares the bundle's
//! components. It is parsed once per invocation, validated against
//! [`constraints::BUNDLE_DESCRIPTOR_CONSTRAINTS`] immediately after parsing,
//! and treated as immutable afterwards.

pub mod constraints;
pub mod validator;

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// File name of the local bundle descriptor
pub const BUNDLE_DESCRIPTOR_FILE: &str = "bundle.json";

/// File name of the descriptor embedded in a published bundle image layer
pub const IMAGE_DESCRIPTOR_FILE: &str = "descriptor.yaml";

/// Declarative description of a bundle and its components.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundleDescriptor {
    /// Bundle name, also the image repository name
    pub name: String,
    /// Bundle version, also the image tag
    pub version: String,
    /// Optional human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared microfrontends, in declaration order
    pub microfrontends: Vec<MicroFrontend>,
    /// Declared microservices, in declaration order
    pub microservices: Vec<Microservice>,
}

/// A microfrontend declared in the bundle descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MicroFrontend {
    /// Component name, also the directory name under `microfrontends/`
    pub name: String,
    /// Build stack
    pub stack: MicroFrontendStack,
    /// Localized titles, language tag to title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub titles: Option<BTreeMap<String, String>>,
    /// API claims against microservices of this bundle
    #[serde(
        rename = "apiClaims",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub api_claims: Option<Vec<ApiClaim>>,
}

/// A microservice declared in the bundle descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Microservice {
    /// Component name, also the directory name under `microservices/`
    pub name: String,
    /// Build stack
    pub stack: MicroserviceStack,
    /// Optional health check endpoint path
    #[serde(
        rename = "healthCheckPath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub health_check_path: Option<String>,
}

/// Microfrontend build stacks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MicroFrontendStack {
    /// React application built with npm
    React,
    /// Angular application built with npm
    Angular,
}

/// Microservice build stacks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MicroserviceStack {
    /// Spring Boot service built with Maven
    SpringBoot,
    /// Node service built with npm
    Node,
}

/// An API claim of a microfrontend against a bundle microservice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiClaim {
    /// Claim name
    pub name: String,
    /// Claim kind discriminator; `internal` claims target a microservice of
    /// the same bundle
    #[serde(rename = "type")]
    pub claim_type: String,
    /// Name of the claimed microservice
    #[serde(rename = "serviceId")]
    pub service_id: String,
}

/// Descriptor embedded in the first layer of a published bundle image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageBundleDescriptor {
    /// Bundle name
    pub name: String,
    /// Format version of the embedded descriptor
    #[serde(rename = "descriptorVersion")]
    pub descriptor_version: String,
    /// Optional human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Loads and validates the bundle descriptor of a project directory.
#[derive(Debug)]
pub struct BundleDescriptorService {
    bundle_dir: PathBuf,
}

impl BundleDescriptorService {
    /// Create a service rooted at the given bundle project directory.
    pub fn new(bundle_dir: impl Into<PathBuf>) -> Self {
        Self {
            bundle_dir: bundle_dir.into(),
        }
    }

    /// Path of the descriptor file.
    pub fn descriptor_path(&self) -> PathBuf {
        self.bundle_dir.join(BUNDLE_DESCRIPTOR_FILE)
    }

    /// True if the directory contains a bundle descriptor.
    pub fn is_initialized(&self) -> bool {
        self.descriptor_path().is_file()
    }

    /// Fail unless the directory is an initialized bundle project.
    pub fn verify_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(CliError::NotABundleProject {
                dir: self.bundle_dir.display().to_string(),
            }
            .into())
        }
    }

    /// Load, parse and validate the descriptor.
    pub fn load(&self) -> Result<BundleDescriptor> {
        self.verify_initialized()?;
        let raw = std::fs::read_to_string(self.descriptor_path())?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        validate_bundle_descriptor(value)
    }
}

/// Validate a parsed `bundle.json` document and deserialize it.
pub fn validate_bundle_descriptor(value: serde_json::Value) -> Result<BundleDescriptor> {
    validator::validate_object(&value, &constraints::BUNDLE_DESCRIPTOR_CONSTRAINTS, "$")?;
    Ok(serde_json::from_value(value)?)
}

/// Validate a parsed image-embedded descriptor document and deserialize it.
pub fn validate_image_descriptor(value: serde_json::Value) -> Result<ImageBundleDescriptor> {
    validator::validate_object(&value, &constraints::IMAGE_DESCRIPTOR_CONSTRAINTS, "$")?;
    Ok(serde_json::from_value(value)?)
}

/// Parse and validate a descriptor extracted from a published image layer.
pub fn parse_image_descriptor(yaml: &str) -> Result<ImageBundleDescriptor> {
    let value: serde_json::Value = serde_yaml::from_str(yaml)?;
    validate_image_descriptor(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_validates_a_descriptor_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(BUNDLE_DESCRIPTOR_FILE),
            r#"{
                "name": "my-bundle",
                "version": "0.0.1",
                "microfrontends": [],
                "microservices": [{ "name": "my-ms", "stack": "spring-boot" }]
            }"#,
        )
        .unwrap();

        let descriptor = BundleDescriptorService::new(dir.path()).load().unwrap();
        assert_eq!(descriptor.name, "my-bundle");
        assert_eq!(descriptor.microservices[0].stack, MicroserviceStack::SpringBoot);
    }

    #[test]
    fn load_fails_on_schema_violation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(BUNDLE_DESCRIPTOR_FILE),
            r#"{ "name": "my-bundle", "version": "0.0.1", "microfrontends": [] }"#,
        )
        .unwrap();

        let error = BundleDescriptorService::new(dir.path()).load().unwrap_err();
        assert!(error.to_string().contains("Field \"microservices\" is required"));
    }

    #[test]
    fn load_rejects_unknown_stack_before_deserialization() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(BUNDLE_DESCRIPTOR_FILE),
            r#"{
                "name": "my-bundle",
                "version": "0.0.1",
                "microfrontends": [],
                "microservices": [{ "name": "my-ms", "stack": "python" }]
            }"#,
        )
        .unwrap();

        let error = BundleDescriptorService::new(dir.path()).load().unwrap_err();
        let text = error.to_string();
        assert!(text.contains("Field \"stack\" is not valid. Allowed values are: spring-boot, node"));
        assert!(text.contains("Position: $.microservices[0].stack"));
    }

    #[test]
    fn uninitialized_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let error = BundleDescriptorService::new(dir.path())
            .verify_initialized()
            .unwrap_err();
        assert!(error.to_string().contains("not an initialized bundle project"));
    }

    #[test]
    fn parses_image_descriptor_yaml() {
        let descriptor =
            parse_image_descriptor("name: my-bundle\ndescriptorVersion: v1\n").unwrap();
        assert_eq!(descriptor.name, "my-bundle");
        assert_eq!(descriptor.descriptor_version, "v1");
    }

    #[test]
    fn rejects_image_descriptor_missing_version() {
        let error = parse_image_descriptor("name: my-bundle\n").unwrap_err();
        assert!(
            error
                .to_string()
                .contains("Field \"descriptorVersion\" is required")
        );
    }
}
