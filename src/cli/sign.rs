use anyhow::{bail, Result};
use clap::Args;
use serde_json::json;
use trafficguard_core_types::{now_millis, REQUEST_TIME_HEADER};
use trafficguard_interceptor::sign;
use trafficguard_policy_center::SignConfig;

use super::context::CliContext;
use super::output::OutputFormat;

#[derive(Args, Clone)]
pub struct SignArgs {
    /// Signing secret; defaults to the configured one
    #[arg(long)]
    pub secret: Option<String>,

    /// Hex characters of the signature to emit
    #[arg(long)]
    pub length: Option<i64>,

    /// Sign this Unix millisecond timestamp instead of the current time
    #[arg(long, value_name = "MS")]
    pub timestamp_ms: Option<i64>,
}

/// Configured signing policy with command-line overrides applied.
///
/// An explicit secret also turns signing on, so a header can be produced or checked
/// before the policy is enabled for the service.
pub(crate) fn resolve_sign_config(
    ctx: &CliContext,
    secret: Option<String>,
    length: Option<i64>,
    max_drift_secs: Option<i64>,
) -> Result<SignConfig> {
    let mut config = ctx.settings()?.sign;
    if let Some(secret) = secret {
        config.secret = secret;
        config.enabled = true;
    }
    if let Some(length) = length {
        config.signature_length = length;
    }
    if let Some(drift) = max_drift_secs {
        config.max_time_drift_secs = drift;
    }
    Ok(config.normalized())
}

pub fn cmd_sign(args: SignArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let config = resolve_sign_config(ctx, args.secret, args.length, None)?;
    if config.secret.is_empty() {
        bail!("no signing secret configured; pass --secret or set sign.secret");
    }

    let timestamp_ms = args.timestamp_ms.unwrap_or_else(now_millis);
    let length = usize::try_from(config.signature_length).unwrap_or_default();
    let value = sign::sign(&config.secret, length, timestamp_ms);
    match output {
        OutputFormat::Human => println!("{value}"),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "header": REQUEST_TIME_HEADER,
                "value": value,
                "timestamp_ms": timestamp_ms,
            }))?
        ),
    }
    Ok(())
}
