//! Mapping of declared components to their on-disk layout.
//!
//! Each component declared in the descriptor lives in a directory named
//! after it, under `microfrontends/` or `microservices/`. The service
//! resolves those directories, reads component versions from the build
//! manifest of the component's stack, and produces the build invocations
//! the pack workflow runs.

use crate::descriptor::{BundleDescriptor, MicroFrontendStack, MicroserviceStack};
use crate::error::{ComponentError, Result};
use crate::process::{IoMode, ProcessRequest};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Directory holding microfrontend sources inside a bundle project
pub const MICROFRONTENDS_FOLDER: &str = "microfrontends";

/// Directory holding microservice sources inside a bundle project
pub const MICROSERVICES_FOLDER: &str = "microservices";

static POM_PARENT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<parent>.*?</parent>").expect("valid pattern"));

static POM_VERSION_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<version>([^<]+)</version>").expect("valid pattern"));

/// Whether a component is a microfrontend or a microservice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// Frontend component, not built into its own image
    MicroFrontend,
    /// Backend component, built into its own image
    Microservice,
}

/// Build stack of a component, unified across both kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentStack {
    /// React microfrontend
    React,
    /// Angular microfrontend
    Angular,
    /// Spring Boot microservice
    SpringBoot,
    /// Node microservice
    Node,
}

impl ComponentStack {
    fn is_node_family(self) -> bool {
        matches!(self, Self::React | Self::Angular | Self::Node)
    }
}

impl fmt::Display for ComponentStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::React => "react",
            Self::Angular => "angular",
            Self::SpringBoot => "spring-boot",
            Self::Node => "node",
        };
        f.write_str(name)
    }
}

impl From<MicroFrontendStack> for ComponentStack {
    fn from(stack: MicroFrontendStack) -> Self {
        match stack {
            MicroFrontendStack::React => Self::React,
            MicroFrontendStack::Angular => Self::Angular,
        }
    }
}

impl From<MicroserviceStack> for ComponentStack {
    fn from(stack: MicroserviceStack) -> Self {
        match stack {
            MicroserviceStack::SpringBoot => Self::SpringBoot,
            MicroserviceStack::Node => Self::Node,
        }
    }
}

/// A component resolved from the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Component name, also its directory name
    pub name: String,
    /// Build stack
    pub stack: ComponentStack,
    /// Component kind
    pub kind: ComponentKind,
}

/// A component together with the version read from its build manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedComponent {
    /// The resolved component
    pub component: Component,
    /// Version string from the component's manifest
    pub version: String,
}

/// Resolves descriptor components against the bundle project directory.
#[derive(Debug)]
pub struct ComponentService {
    bundle_dir: PathBuf,
    components: Vec<Component>,
}

impl ComponentService {
    /// Build a service over the components of a loaded descriptor.
    pub fn new(bundle_dir: impl Into<PathBuf>, descriptor: &BundleDescriptor) -> Self {
        let mut components = Vec::new();
        for mfe in &descriptor.microfrontends {
            components.push(Component {
                name: mfe.name.clone(),
                stack: mfe.stack.into(),
                kind: ComponentKind::MicroFrontend,
            });
        }
        for ms in &descriptor.microservices {
            components.push(Component {
                name: ms.name.clone(),
                stack: ms.stack.into(),
                kind: ComponentKind::Microservice,
            });
        }
        Self {
            bundle_dir: bundle_dir.into(),
            components,
        }
    }

    /// All components, microfrontends first, each group in declaration order.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Source directory of a component.
    pub fn component_path(&self, component: &Component) -> PathBuf {
        let folder = match component.kind {
            ComponentKind::MicroFrontend => MICROFRONTENDS_FOLDER,
            ComponentKind::Microservice => MICROSERVICES_FOLDER,
        };
        self.bundle_dir.join(folder).join(&component.name)
    }

    /// Fail unless the component's source directory exists.
    pub fn verify_component_directory(&self, component: &Component) -> Result<()> {
        let path = self.component_path(component);
        if path.is_dir() {
            Ok(())
        } else {
            Err(ComponentError::DirectoryNotFound { path }.into())
        }
    }

    /// Version of a component, read from its stack's build manifest.
    pub fn version_of(&self, component: &Component) -> Result<String> {
        let path = self.component_path(component);
        if component.stack.is_node_family() {
            read_package_json_version(component, &path.join("package.json"))
        } else {
            read_pom_version(component, &path.join("pom.xml"))
        }
    }

    /// Components of one kind with their versions, in declaration order.
    pub fn versioned_components(&self, kind: ComponentKind) -> Result<Vec<VersionedComponent>> {
        self.components
            .iter()
            .filter(|c| c.kind == kind)
            .map(|component| {
                Ok(VersionedComponent {
                    component: component.clone(),
                    version: self.version_of(component)?,
                })
            })
            .collect()
    }

    /// Build invocations for a component, to be run in order.
    ///
    /// Output is streamed to the terminal; component builds are the
    /// long-running part of packing.
    pub fn build_requests(&self, component: &Component) -> Result<Vec<ProcessRequest>> {
        self.verify_component_directory(component)?;
        let work_dir = self.component_path(component);
        let requests = if component.stack.is_node_family() {
            vec![
                ProcessRequest::new("npm")
                    .arg("install")
                    .work_dir(&work_dir)
                    .io(IoMode::Stream),
                ProcessRequest::new("npm")
                    .args(["run", "build"])
                    .work_dir(&work_dir)
                    .io(IoMode::Stream),
            ]
        } else {
            vec![
                ProcessRequest::new("mvn")
                    .args(["clean", "package"])
                    .work_dir(&work_dir)
                    .io(IoMode::Stream),
            ]
        };
        Ok(requests)
    }
}

fn read_package_json_version(component: &Component, manifest: &Path) -> Result<String> {
    let raw =
        std::fs::read_to_string(manifest).map_err(|e| ComponentError::ManifestUnreadable {
            name: component.name.clone(),
            path: manifest.to_path_buf(),
            reason: e.to_string(),
        })?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| ComponentError::ManifestUnreadable {
            name: component.name.clone(),
            path: manifest.to_path_buf(),
            reason: e.to_string(),
        })?;
    value
        .get("version")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ComponentError::VersionMissing {
                name: component.name.clone(),
            }
            .into()
        })
}

fn read_pom_version(component: &Component, manifest: &Path) -> Result<String> {
    let raw =
        std::fs::read_to_string(manifest).map_err(|e| ComponentError::ManifestUnreadable {
            name: component.name.clone(),
            path: manifest.to_path_buf(),
            reason: e.to_string(),
        })?;
    // the <parent> block carries its own <version>; drop it so the first
    // remaining tag is the project version
    let own = POM_PARENT_BLOCK.replace(&raw, "");
    POM_VERSION_TAG
        .captures(&own)
        .map(|captures| captures[1].trim().to_string())
        .ok_or_else(|| {
            ComponentError::VersionMissing {
                name: component.name.clone(),
            }
            .into()
        })
}
