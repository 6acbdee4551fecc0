//! Error types for bundle-cli operations.
//!
//! Every user-facing failure carries a single-line actionable message. Raw
//! output of failed external commands is logged at debug level only.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bundle-cli operations
pub type Result<T> = std::result::Result<T, BundleCliError>;

/// Guidance appended to errors whose root cause is only visible in the raw
/// output of a failed external command.
pub const DEBUG_HINT: &str =
    "Enable debug logging (RUST_LOG=debug) to see the output of the failed command.";

/// Main error type for all bundle-cli operations
#[derive(Error, Debug)]
pub enum BundleCliError {
    /// Descriptor validation errors
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Docker and registry-inspection errors
    #[error("{0}")]
    Docker(#[from] DockerError),

    /// Component resolution errors
    #[error("{0}")]
    Component(#[from] ComponentError),

    /// Configuration store errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// CLI usage errors
    #[error("{0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Structural violation of a descriptor constraint schema.
///
/// Carries the human-readable message and the `$`-rooted JSON path of the
/// offending node. Validation reports the first violation only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}\nPosition: {json_path}")]
pub struct ValidationError {
    /// Human-readable description of the violation
    pub message: String,
    /// JSON path from the document root, e.g. `$.microfrontends[1].name`
    pub json_path: String,
}

impl ValidationError {
    /// Create a validation error at the given path
    pub fn new(message: impl Into<String>, json_path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            json_path: json_path.into(),
        }
    }
}

/// Docker engine and registry-inspection tool errors
#[derive(Error, Debug)]
pub enum DockerError {
    /// External binary is not installed or not on PATH
    #[error("Command {binary} not found")]
    CommandNotFound {
        /// Binary name
        binary: String,
    },

    /// Image build failed
    #[error("Docker build failed for {image} with exit code {code}")]
    BuildFailed {
        /// Image reference being built
        image: String,
        /// Exit code of the build command
        code: i32,
    },

    /// Listing local images failed
    #[error("Unable to check Docker images. {DEBUG_HINT}")]
    ImageListingFailed,

    /// One or more retag commands failed
    #[error("Unable to create Docker image tag. {DEBUG_HINT}")]
    TagCreationFailed,

    /// Push returned a non-zero exit code
    #[error("Unable to push Docker image. {DEBUG_HINT}")]
    PushFailed,

    /// Interactive login attempt failed
    #[error("Docker login failed")]
    LoginFailed,

    /// Remote digest lookup failed for at least one tag
    #[error("Unable to retrieve digests for Docker image {image}. {DEBUG_HINT}")]
    DigestsFailed {
        /// Image name the lookup was issued for
        image: String,
    },

    /// Registry reports the image name as unknown
    #[error("Image {image} not found")]
    ImageNotFound {
        /// Image name
        image: String,
    },

    /// Registry refused the request; may also hide a nonexistent image
    #[error(
        "Registry required authentication. This may also be caused by searching for a non-existing image.\nPlease verify that {image} exists."
    )]
    RegistryAuthRequired {
        /// Image name
        image: String,
    },

    /// Tag listing failed for an unclassified reason
    #[error("Unable to list tags for Docker image {image}. {DEBUG_HINT}")]
    TagListingFailed {
        /// Image name
        image: String,
    },

    /// Image config could not be retrieved
    #[error("Unable to retrieve image metadata. {DEBUG_HINT}")]
    ImageMetadataFailed,

    /// Image config lacks the label marking it as a bundle image
    #[error(
        "Given Docker image doesn't contain required label {label}. Have you specified a valid bundle Docker image?"
    )]
    BundleLabelMissing {
        /// Expected label key
        label: String,
    },

    /// Manifest retrieval failed
    #[error("Unable to retrieve image manifest. {DEBUG_HINT}")]
    ManifestFailed,

    /// Manifest JSON could not be parsed
    #[error("Retrieved manifest contains invalid JSON. {DEBUG_HINT}")]
    ManifestInvalidJson,

    /// Manifest has no layers or the first layer has no digest
    #[error(
        "Unable to extract digest from retrieved manifest. Have you specified a valid bundle Docker image?"
    )]
    LayerDigestMissing,

    /// Layer blob is not a readable gzip/tar archive
    #[error("Unable to read layer archive from bundle Docker image. {DEBUG_HINT}")]
    LayerArchiveUnreadable,

    /// The descriptor file is absent from the layer archive
    #[error("{file} not found. Have you specified a valid bundle Docker image?")]
    DescriptorNotInArchive {
        /// Expected file name inside the layer
        file: String,
    },

    /// The extracted descriptor is not valid YAML
    #[error("Retrieved descriptor contains invalid YAML. {DEBUG_HINT}")]
    DescriptorInvalidYaml,

    /// The extracted descriptor violates the descriptor schema
    #[error("Retrieved descriptor has an invalid format.\n{source}")]
    DescriptorInvalidFormat {
        /// Underlying schema violation
        #[source]
        source: ValidationError,
    },

    /// Process infrastructure failure while invoking an external binary
    #[error("Failed to execute {command}: {reason}")]
    ExecutionFailed {
        /// Command that failed to run
        command: String,
        /// Reason for the error
        reason: String,
    },
}

/// Component resolution errors
#[derive(Error, Debug)]
pub enum ComponentError {
    /// Component declared in the descriptor but missing on disk
    #[error("Directory {path} does not exist")]
    DirectoryNotFound {
        /// Expected component directory
        path: PathBuf,
    },

    /// Component manifest is missing or unreadable
    #[error("Unable to read manifest for component '{name}' at {path}: {reason}")]
    ManifestUnreadable {
        /// Component name
        name: String,
        /// Manifest path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Component manifest has no version entry
    #[error("No version found in manifest for component '{name}'")]
    VersionMissing {
        /// Component name
        name: String,
    },

    /// Component build command returned a non-zero exit code
    #[error("Build of component '{name}' failed with exit code {code}")]
    BuildFailed {
        /// Component name
        name: String,
        /// Exit code of the build command
        code: i32,
    },
}

/// Configuration store errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file exists but is not valid JSON
    #[error("Config file at {path} is corrupted: {reason}")]
    Corrupted {
        /// Config file path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Config file could not be written
    #[error("Failed to save config at {path}: {reason}")]
    SaveFailed {
        /// Config file path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },
}

/// CLI usage errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Working directory is not an initialized bundle project
    #[error("{dir} is not an initialized bundle project")]
    NotABundleProject {
        /// Directory that was checked
        dir: String,
    },

    /// Publish/pack invoked without any organization
    #[error("No configured Docker organization found. Please run the command with --org flag.")]
    NoOrganization,

    /// Images still absent after the automatic pack run
    #[error("One or more Docker images are still missing after running the pack command.")]
    ImagesStillMissing,
}
