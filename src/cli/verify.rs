use anyhow::{bail, Result};
use clap::Args;
use serde_json::json;
use trafficguard_core_types::now_millis;
use trafficguard_interceptor::{sign, SignCheck};

use super::context::CliContext;
use super::output::OutputFormat;
use super::sign::resolve_sign_config;

#[derive(Args, Clone)]
pub struct VerifyArgs {
    /// Header value, `<unix_ms>.<hex signature>`
    pub value: String,

    /// Signing secret; defaults to the configured one
    #[arg(long)]
    pub secret: Option<String>,

    /// Replay window half-width in seconds
    #[arg(long)]
    pub max_drift_secs: Option<i64>,

    /// Evaluate as if the current time were this Unix millisecond timestamp
    #[arg(long, value_name = "MS")]
    pub now_ms: Option<i64>,
}

pub fn cmd_verify(args: VerifyArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let config = resolve_sign_config(ctx, args.secret, None, args.max_drift_secs)?;
    let now_ms = args.now_ms.unwrap_or_else(now_millis);
    let result = sign::check(args.value.trim(), &config, now_ms);

    match output {
        OutputFormat::Human => println!("{}", describe(result)),
        OutputFormat::Json => {
            let drift_ms = match result {
                SignCheck::Expired { drift_ms } => Some(drift_ms),
                _ => None,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "result": result.as_str(),
                    "trusted": result.is_trusted(),
                    "drift_ms": drift_ms,
                }))?
            );
        }
    }

    if !result.is_trusted() {
        bail!("signature rejected: {}", result.as_str());
    }
    Ok(())
}

fn describe(result: SignCheck) -> String {
    match result {
        SignCheck::Disabled => "disabled (signing is off, every request is trusted)".to_string(),
        SignCheck::Expired { drift_ms } => format!("expired (drift {drift_ms} ms)"),
        other => other.as_str().to_string(),
    }
}
