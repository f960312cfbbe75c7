use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::defaults::{
    DEFAULT_POLL_INTERVAL, DEFAULT_RESTART_BACKOFF, DEFAULT_RESTART_BACKOFF_MAX,
    DEFAULT_START_JITTER,
};
use crate::errors::PolicyError;
use crate::model::SignConfig;
use crate::sync::SyncOptions;

const ENV_PREFIX: &str = "TRAFFIC_GUARD__";
const ENV_JSON: &str = "TRAFFIC_GUARD_OVERRIDE_JSON";

/// Process-level settings of the guard: who we are, how we poll and how we sign.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GuardSettings {
    pub server_name: String,
    pub poll_interval_ms: u64,
    pub jitter_max_ms: u64,
    pub restart_backoff_ms: u64,
    pub restart_backoff_max_ms: u64,
    pub initial_fetch_timeout_ms: Option<u64>,
    pub sign: SignConfig,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            server_name: String::new(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            jitter_max_ms: DEFAULT_START_JITTER.as_millis() as u64,
            restart_backoff_ms: DEFAULT_RESTART_BACKOFF.as_millis() as u64,
            restart_backoff_max_ms: DEFAULT_RESTART_BACKOFF_MAX.as_millis() as u64,
            initial_fetch_timeout_ms: None,
            sign: SignConfig::default(),
        }
    }
}

impl From<&GuardSettings> for SyncOptions {
    fn from(settings: &GuardSettings) -> Self {
        let restart_backoff = Duration::from_millis(settings.restart_backoff_ms.max(1));
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
            start_jitter: Duration::from_millis(settings.jitter_max_ms),
            restart_backoff,
            restart_backoff_max: Duration::from_millis(settings.restart_backoff_max_ms)
                .max(restart_backoff),
            initial_fetch_timeout: settings.initial_fetch_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsSource {
    Builtin,
    File,
    Env,
}

#[derive(Clone, Debug)]
pub struct LoadedSettings {
    pub settings: GuardSettings,
    /// Dotted field path to the layer that set it last.
    pub provenance: BTreeMap<String, SettingsSource>,
}

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
        }
    }
}

pub fn load_settings(path: Option<&Path>) -> Result<GuardSettings, PolicyError> {
    let options = LoadOptions {
        paths: path.map(|p| vec![p.to_path_buf()]).unwrap_or_default(),
        include_env: true,
    };
    load_settings_with_options(&options).map(|loaded| loaded.settings)
}

pub fn load_settings_with_options(options: &LoadOptions) -> Result<LoadedSettings, PolicyError> {
    let mut tree = to_json(&GuardSettings::default())?;
    let mut provenance = BTreeMap::new();
    for overlay in flatten_value(tree.clone(), None, SettingsSource::Builtin) {
        provenance.insert(overlay.path, SettingsSource::Builtin);
    }

    let mut overlays = Vec::new();
    for path in &options.paths {
        if path.exists() {
            overlays.extend(overlays_from_file(path)?);
        }
    }
    if options.include_env {
        overlays.extend(overlays_from_env()?);
    }

    for overlay in overlays {
        apply_overlay(&mut tree, &overlay);
        provenance.insert(overlay.path, overlay.source);
    }

    let mut settings: GuardSettings = serde_json::from_value(tree)
        .map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
    settings.sign = settings.sign.normalized();
    Ok(LoadedSettings {
        settings,
        provenance,
    })
}

struct SettingsOverlay {
    path: String,
    value: Value,
    /// Unparsed env text, used when the target field is a string.
    raw: Option<String>,
    source: SettingsSource,
}

fn to_json(settings: &GuardSettings) -> Result<Value, PolicyError> {
    serde_json::to_value(settings).map_err(|err| PolicyError::Invalid(format!("{}", err)))
}

fn apply_overlay(tree: &mut Value, overlay: &SettingsOverlay) {
    let segments: Vec<&str> = overlay.path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut cursor = tree;
    for segment in parents {
        let Some(map) = ensure_object(cursor) else {
            return;
        };
        cursor = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let Some(map) = ensure_object(cursor) else {
        return;
    };
    let value = match (&overlay.raw, map.get(*last)) {
        (Some(raw), Some(Value::String(_))) => Value::String(raw.clone()),
        _ => overlay.value.clone(),
    };
    map.insert(last.to_string(), value);
}

fn ensure_object(value: &mut Value) -> Option<&mut Map<String, Value>> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    value.as_object_mut()
}

fn overlays_from_file(path: &Path) -> Result<Vec<SettingsOverlay>, PolicyError> {
    let content = fs::read_to_string(path).map_err(|err| PolicyError::Io(format!("{}", err)))?;
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
    let json_value =
        serde_json::to_value(yaml_value).map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
    Ok(flatten_value(json_value, None, SettingsSource::File))
}

fn overlays_from_env() -> Result<Vec<SettingsOverlay>, PolicyError> {
    let mut overlays = Vec::new();
    for (key, raw) in env::vars() {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let path = stripped
                .split("__")
                .filter(|segment| !segment.is_empty())
                .map(|segment| segment.to_ascii_lowercase())
                .collect::<Vec<_>>()
                .join(".");
            if path.is_empty() {
                continue;
            }
            overlays.push(SettingsOverlay {
                path,
                value: parse_env_value(&raw),
                raw: Some(raw),
                source: SettingsSource::Env,
            });
        }
    }
    // env::vars order is unspecified; make later layers deterministic.
    overlays.sort_by(|a, b| a.path.cmp(&b.path));

    if let Ok(raw_json) = env::var(ENV_JSON) {
        if !raw_json.trim().is_empty() {
            let json_value: Value = serde_json::from_str(&raw_json)
                .map_err(|err| PolicyError::Invalid(format!("{}: {}", ENV_JSON, err)))?;
            overlays.extend(flatten_value(json_value, None, SettingsSource::Env));
        }
    }

    Ok(overlays)
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return Value::Bool(boolean);
    }
    Value::String(raw.to_string())
}

fn flatten_value(
    value: Value,
    prefix: Option<String>,
    source: SettingsSource,
) -> Vec<SettingsOverlay> {
    match value {
        Value::Object(map) => {
            let mut result = Vec::new();
            for (key, value) in map {
                let key_segment = key.trim().to_ascii_lowercase();
                let next_prefix = match &prefix {
                    Some(prefix) if !prefix.is_empty() => format!("{}.{}", prefix, key_segment),
                    _ => key_segment,
                };
                result.extend(flatten_value(value, Some(next_prefix), source));
            }
            result
        }
        other => match prefix {
            Some(path) => vec![SettingsOverlay {
                path,
                value: other,
                raw: None,
                source,
            }],
            None => Vec::new(),
        },
    }
}
