//! Command execution: dispatches parsed arguments to the workflows.

mod inspect;
pub mod pack;
pub mod publish;
mod tags;
mod validate;

pub use pack::run_pack;
pub use publish::{PublishOpts, PublishReport, PushedImage, run_publish};

use crate::cli::{Args, Command, OutputManager};
use crate::error::Result;
use crate::process::TokioRunner;

/// Execute the parsed command.
///
/// Workflow failures are printed and turned into exit code 1; `Err` is
/// reserved for failures that occur before an output manager exists.
pub async fn execute_command(args: Args) -> Result<i32> {
    let output = OutputManager::new(args.quiet);
    let bundle_dir = match &args.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let runner = TokioRunner;

    let result = match &args.command {
        Command::Validate => validate::execute_validate(&bundle_dir, &output),
        Command::Pack { org } => run_pack(&runner, &bundle_dir, org.as_deref(), &output)
            .await
            .map(|()| 0),
        Command::Publish { org, registry } => {
            let opts = PublishOpts {
                org: org.clone(),
                registry: registry.clone(),
            };
            run_publish(&runner, &bundle_dir, &opts, &output)
                .await
                .map(|report| {
                    output.println(&report.render());
                    0
                })
        }
        Command::Tags { image, digests } => {
            tags::execute_tags(&runner, &bundle_dir, image, *digests, &output).await
        }
        Command::Inspect { image } => {
            inspect::execute_inspect(&runner, &bundle_dir, image, &output).await
        }
    };

    match result {
        Ok(code) => Ok(code),
        Err(error) => {
            output.error(&format!("{error}"));
            Ok(1)
        }
    }
}
