//! Validate command: check `bundle.json` against the descriptor schema.

use crate::cli::OutputManager;
use crate::descriptor::BundleDescriptorService;
use crate::error::{BundleCliError, Result};
use std::path::Path;

/// Load and validate the bundle descriptor, reporting the first violation
/// with its JSON path.
pub fn execute_validate(bundle_dir: &Path, output: &OutputManager) -> Result<i32> {
    match BundleDescriptorService::new(bundle_dir).load() {
        Ok(descriptor) => {
            output.success(&format!(
                "Bundle descriptor is valid: {} {}",
                descriptor.name, descriptor.version
            ));
            Ok(0)
        }
        Err(error @ BundleCliError::Validation(_)) => {
            output.error(&error.to_string());
            Ok(1)
        }
        Err(error) => Err(error),
    }
}
