use anyhow::Result;
use clap::Args;
use serde_json::{json, Value};
use trafficguard_policy_center::{SettingsSource, SyncOptions};

use super::context::CliContext;
use super::output::OutputFormat;

#[derive(Args, Clone)]
pub struct SettingsArgs {
    /// Also list the layer each field was taken from
    #[arg(long)]
    pub provenance: bool,
}

pub fn cmd_settings(args: SettingsArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let loaded = ctx.load_settings()?;
    let mut settings = serde_json::to_value(&loaded.settings)?;
    if let Some(secret) = settings.pointer_mut("/sign/secret") {
        if secret.as_str().map(|value| !value.is_empty()).unwrap_or(false) {
            *secret = Value::String("<redacted>".into());
        }
    }
    let options = SyncOptions::from(&loaded.settings);

    match output {
        OutputFormat::Human => {
            println!("Config file: {}", ctx.config_path().display());
            println!(
                "Settings file: {}",
                ctx.config()
                    .settings_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "<none>".into())
            );
            println!(
                "Server: {}",
                if loaded.settings.server_name.is_empty() {
                    "<unset>"
                } else {
                    loaded.settings.server_name.as_str()
                }
            );
            println!(
                "Sync → poll={}ms jitter<={}ms restart_backoff={}..{}ms initial_timeout={}",
                options.poll_interval.as_millis(),
                options.start_jitter.as_millis(),
                options.restart_backoff.as_millis(),
                options.restart_backoff_max.as_millis(),
                options
                    .initial_fetch_timeout
                    .map(|limit| format!("{}ms", limit.as_millis()))
                    .unwrap_or_else(|| "none".into())
            );
            println!("Sign → {:?}", loaded.settings.sign);
            if args.provenance {
                println!();
                for (field, source) in &loaded.provenance {
                    println!("  {field:<32} {}", source_label(*source));
                }
            }
        }
        OutputFormat::Json => {
            let mut payload = json!({ "settings": settings });
            if args.provenance {
                payload["provenance"] = serde_json::to_value(&loaded.provenance)?;
            }
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }
    Ok(())
}

fn source_label(source: SettingsSource) -> &'static str {
    match source {
        SettingsSource::Builtin => "builtin",
        SettingsSource::File => "file",
        SettingsSource::Env => "env",
    }
}
