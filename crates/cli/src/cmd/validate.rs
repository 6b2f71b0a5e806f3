use std::path::PathBuf;

use anyhow::{Context, Result};
use argp::FromArgs;
use framework_patcher_core::models::{DispatchPayload, DispatchRequest};

use crate::util::{load_config, native_path};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Validate a dispatch request file and print the payload that would be sent.
#[argp(subcommand, name = "validate")]
pub struct Args {
    #[argp(option, short = 'i', from_str_fn(native_path))]
    /// request JSON file, as posted to /api/trigger-workflow
    input: PathBuf,
    #[argp(option, short = 'c', from_str_fn(native_path))]
    /// config file (default: config.yml)
    config: Option<PathBuf>,
}

pub fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let data = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let dispatch = DispatchRequest::parse(&data)
        .and_then(DispatchRequest::validate)
        .with_context(|| format!("Invalid request in {}", args.input.display()))?;
    let payload = DispatchPayload { git_ref: &config.github.git_ref, inputs: &dispatch.inputs };
    println!("workflow: {}", dispatch.variant.workflow_file());
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
