use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::json;
use tokio::fs;
use trafficguard_interceptor::{lint_policy, LintSeverity, RuleScope};
use trafficguard_policy_center::decode_document;

use super::output::OutputFormat;

#[derive(Args, Clone)]
pub struct LintArgs {
    /// Policy document (JSON) as stored under `traffic_interception_key_<server>`
    pub file: PathBuf,

    /// Exit with an error when any warning is reported
    #[arg(long)]
    pub deny_warnings: bool,
}

pub async fn cmd_lint_policy(args: LintArgs, output: OutputFormat) -> Result<()> {
    let raw = fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let config = decode_document(&raw)
        .with_context(|| format!("failed to decode {}", args.file.display()))?;
    let issues = lint_policy(&config);

    match output {
        OutputFormat::Human => {
            println!(
                "{}: switch={} radio={} sub_rules={}",
                args.file.display(),
                config.switch,
                config.radio,
                config.sub_rules.len()
            );
            if issues.is_empty() {
                println!("no issues found");
            }
            for issue in &issues {
                let scope = match issue.scope {
                    RuleScope::Global => "global".to_string(),
                    RuleScope::SubRule(index) => format!("sub_rules[{index}]"),
                };
                let severity = match issue.severity {
                    LintSeverity::Warning => "warning",
                    LintSeverity::Info => "info",
                };
                println!("{severity}: {scope}: {}", issue.message);
            }
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "file": args.file.display().to_string(),
                "policy": config,
                "issues": issues,
            }))?
        ),
    }

    let warnings = issues
        .iter()
        .filter(|issue| issue.severity == LintSeverity::Warning)
        .count();
    if args.deny_warnings && warnings > 0 {
        bail!("{warnings} warning(s) reported");
    }
    Ok(())
}
