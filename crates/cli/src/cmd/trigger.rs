use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use argp::FromArgs;
use framework_patcher_core::models::DispatchRequest;
use framework_patcher_github::GitHub;
use serde_json::{Map, Value};

use crate::util::{load_config, native_path};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Trigger a patch workflow directly, using GITHUB_TOKEN.
#[argp(subcommand, name = "trigger")]
pub struct Args {
    #[argp(option, short = 'v')]
    /// workflow variant (android15 or android16)
    variant: String,
    #[argp(option)]
    /// Android API level
    api_level: String,
    #[argp(option)]
    /// device codename
    device_name: String,
    #[argp(option)]
    /// ROM version name
    version_name: String,
    #[argp(option)]
    /// download URL for framework.jar
    framework_url: String,
    #[argp(option)]
    /// download URL for services.jar
    services_url: String,
    #[argp(option)]
    /// download URL for miui-services.jar
    miui_services_url: String,
    #[argp(option)]
    /// user to notify when the build finishes
    user_id: Option<String>,
    #[argp(option, short = 'c', from_str_fn(native_path))]
    /// config file (default: config.yml)
    config: Option<PathBuf>,
}

impl Args {
    fn into_request(self) -> DispatchRequest {
        let mut inputs = Map::new();
        for (key, value) in [
            ("api_level", Some(self.api_level)),
            ("device_name", Some(self.device_name)),
            ("version_name", Some(self.version_name)),
            ("framework_url", Some(self.framework_url)),
            ("services_url", Some(self.services_url)),
            ("miui_services_url", Some(self.miui_services_url)),
            ("user_id", self.user_id),
        ] {
            if let Some(value) = value {
                inputs.insert(key.to_string(), Value::String(value));
            }
        }
        DispatchRequest {
            version: Some(Value::String(self.variant)),
            inputs: Some(Value::Object(inputs)),
            ..Default::default()
        }
    }
}

pub fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    if config.github.token().is_none() {
        bail!("GITHUB_TOKEN is not set");
    }
    let dispatch = args.into_request().validate().context("Invalid workflow inputs")?;
    let github = GitHub::new(&config.github)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create runtime")?;
    let workflow_url = runtime
        .block_on(github.dispatch(&dispatch))
        .with_context(|| format!("Failed to trigger {}", dispatch.variant.workflow_file()))?;
    tracing::info!(
        variant = dispatch.variant.as_str(),
        device = %dispatch.inputs.device_name,
        outcome = "triggered",
        "Triggered {} workflow",
        dispatch.variant.workflow_file()
    );
    println!("{workflow_url}");
    Ok(())
}
