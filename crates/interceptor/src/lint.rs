use serde::Serialize;
use trafficguard_policy_center::InterceptConfig;

use crate::rules::{Radio, RuleKind, RuleScope};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LintSeverity {
    Warning,
    Info,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LintIssue {
    pub scope: RuleScope,
    pub severity: LintSeverity,
    pub message: String,
}

/// Reports policy entries that will silently never match or never block.
///
/// Linting never rejects a document: everything reported here is still loaded and
/// evaluated with fail-open semantics.
pub fn lint_policy(config: &InterceptConfig) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    if !config.switch {
        issues.push(LintIssue {
            scope: RuleScope::Global,
            severity: LintSeverity::Info,
            message: "switch is off; no request will be evaluated".into(),
        });
    }
    lint_radio(&mut issues, RuleScope::Global, config.radio);

    for (index, rule) in config.sub_rules.iter().enumerate() {
        let scope = RuleScope::SubRule(index);
        match RuleKind::parse(&rule.rule) {
            RuleKind::Unknown(literal) => issues.push(LintIssue {
                scope,
                severity: LintSeverity::Warning,
                message: format!("unknown rule {literal:?}; it never matches"),
            }),
            RuleKind::Any => {}
            _ if rule.value.split(',').all(str::is_empty) => issues.push(LintIssue {
                scope,
                severity: LintSeverity::Warning,
                message: format!("rule {:?} has an empty value list; it never matches", rule.rule),
            }),
            _ if rule
                .value
                .split(',')
                .any(|item| item.len() != item.trim().len()) =>
            {
                issues.push(LintIssue {
                    scope,
                    severity: LintSeverity::Info,
                    message: format!(
                        "rule {:?} has entries with surrounding whitespace; they match verbatim",
                        rule.rule
                    ),
                })
            }
            _ => {}
        }
        lint_radio(&mut issues, scope, rule.radio);
    }
    issues
}

fn lint_radio(issues: &mut Vec<LintIssue>, scope: RuleScope, raw: i32) {
    match Radio::from_raw(raw) {
        Radio::OutOfRange(value) => issues.push(LintIssue {
            scope,
            severity: LintSeverity::Warning,
            message: format!("radio {value} is outside -1..=100; it never blocks"),
        }),
        Radio::Notify => issues.push(LintIssue {
            scope,
            severity: LintSeverity::Info,
            message: "radio 0 is notify-only".into(),
        }),
        _ => {}
    }
}
