use rand::Rng;
use serde::Serialize;
use tracing::debug;
use trafficguard_core_types::RequestAttributes;
use trafficguard_policy_center::{InterceptConfig, SubRuleConfig};

/// Block probability of a rule, as configured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Radio {
    /// `-1`: never blocks.
    Never,
    /// `0`: never blocks, reported to the alert sink.
    Notify,
    /// `1..=100`: blocks with this percent probability.
    Percent(u8),
    OutOfRange(i32),
}

impl Radio {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            -1 => Radio::Never,
            0 => Radio::Notify,
            1..=100 => Radio::Percent(raw as u8),
            other => Radio::OutOfRange(other),
        }
    }

    /// Draws once for `Percent`; every other radio allows without drawing.
    pub fn draw<R: Rng + ?Sized>(self, rng: &mut R) -> bool {
        match self {
            Radio::Percent(percent) => rng.gen_range(0..100u8) < percent,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleKind {
    Any,
    Path,
    Referer,
    UserAgent,
    Uid,
    Unknown(String),
}

impl RuleKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "*" => RuleKind::Any,
            "path" => RuleKind::Path,
            "referer" => RuleKind::Referer,
            "ua" => RuleKind::UserAgent,
            "uid" => RuleKind::Uid,
            other => RuleKind::Unknown(other.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    Global,
    SubRule(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleVerdict {
    pub scope: RuleScope,
    pub radio: Radio,
    pub blocked: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NoPolicy,
    SwitchOff,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Decision {
    pub blocked: bool,
    pub verdicts: Vec<RuleVerdict>,
    /// Evaluated rules whose radio is `0`.
    pub notify: Vec<RuleScope>,
    pub skipped: Option<SkipReason>,
}

impl Decision {
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Default::default()
        }
    }

    fn evaluate<R: Rng + ?Sized>(&mut self, scope: RuleScope, radio: Radio, rng: &mut R) {
        if let Radio::OutOfRange(raw) = radio {
            debug!(?scope, radio = raw, "ignoring out-of-range radio");
        }
        if radio == Radio::Notify {
            self.notify.push(scope);
        }
        let blocked = radio.draw(rng);
        self.blocked |= blocked;
        self.verdicts.push(RuleVerdict {
            scope,
            radio,
            blocked,
        });
    }
}

/// Matches `rule` against the request; `value` is a comma separated list.
///
/// Entries are compared verbatim, surrounding whitespace included. Empty entries are
/// skipped so that a trailing comma cannot match an absent attribute.
pub fn match_rule(rule: &SubRuleConfig, attrs: &RequestAttributes) -> bool {
    let mut candidates = rule
        .value
        .split(',')
        .filter(|candidate| !candidate.is_empty());
    match RuleKind::parse(&rule.rule) {
        RuleKind::Any => true,
        RuleKind::Path => candidates.any(|candidate| candidate == attrs.path),
        RuleKind::Referer => candidates.any(|candidate| attrs.referer.contains(candidate)),
        RuleKind::UserAgent => candidates.any(|candidate| candidate == attrs.user_agent),
        RuleKind::Uid => candidates.any(|candidate| candidate == attrs.user_id),
        RuleKind::Unknown(_) => false,
    }
}

pub fn decide(config: Option<&InterceptConfig>, attrs: &RequestAttributes) -> Decision {
    decide_with(config, attrs, &mut rand::thread_rng())
}

/// Evaluates the global radio, then every matching sub-rule in order.
///
/// All matching rules draw; the request is blocked if any draw blocks.
pub fn decide_with<R: Rng + ?Sized>(
    config: Option<&InterceptConfig>,
    attrs: &RequestAttributes,
    rng: &mut R,
) -> Decision {
    let Some(config) = config else {
        return Decision::skipped(SkipReason::NoPolicy);
    };
    if !config.switch {
        return Decision::skipped(SkipReason::SwitchOff);
    }

    let mut decision = Decision::default();
    decision.evaluate(RuleScope::Global, Radio::from_raw(config.radio), rng);
    for (index, rule) in config.sub_rules.iter().enumerate() {
        if match_rule(rule, attrs) {
            decision.evaluate(RuleScope::SubRule(index), Radio::from_raw(rule.radio), rng);
        }
    }
    decision
}
