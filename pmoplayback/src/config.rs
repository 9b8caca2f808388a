//! Playback session configuration.
//!
//! The configuration is built in layers:
//! 1. the embedded default `pmoplayback.yaml`,
//! 2. an optional external YAML file merged on top of it,
//! 3. environment overrides named `PMOPLAYBACK_CONFIG__PLAYBACK__<KEY>`.
//!
//! ```no_run
//! use pmoplayback::PlaybackConfig;
//!
//! let config = PlaybackConfig::load(Some("config.yaml".as_ref()))?;
//! println!("progress every {:?}", config.progress_interval());
//! # Ok::<(), pmoplayback::PlaybackError>(())
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::bookmarks::DEFAULT_PIN_KEY_PREFIX;
use crate::errors::{PlaybackError, Result};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmoplayback.yaml");

const ENV_PREFIX: &str = "PMOPLAYBACK_CONFIG__";
const SECTION: &str = "playback";

const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1000;
const DEFAULT_SKIP_INTERVAL_SECS: f64 = 15.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Cadence of the periodic progress observer, in milliseconds.
    pub progress_interval_ms: u64,
    /// Default step of the skip commands, in seconds.
    pub skip_interval_secs: f64,
    /// Prefix of the bookmark storage keys.
    pub pin_key_prefix: String,
    /// Discard asynchronous completions issued for a previous session.
    pub discard_stale_completions: bool,
    /// Location of the SQLite bookmark database, if any.
    pub bookmarks_db: Option<PathBuf>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            skip_interval_secs: DEFAULT_SKIP_INTERVAL_SECS,
            pin_key_prefix: DEFAULT_PIN_KEY_PREFIX.to_string(),
            discard_stale_completions: true,
            bookmarks_db: None,
        }
    }
}

impl PlaybackConfig {
    /// Loads the configuration from the default layers, the optional file at
    /// `path` and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let external = match path {
            Some(path) => match fs::read_to_string(path) {
                Ok(data) => {
                    info!(config_file=%path.display(), "Loaded playback config file");
                    Some(data)
                }
                Err(_) => {
                    info!(config_file=%path.display(), "Config file not found, using embedded defaults");
                    None
                }
            },
            None => None,
        };

        let mut config = Self::from_layers(external.as_deref(), env::vars())?;

        // Chemin relatif : le résoudre par rapport au fichier de configuration
        if let (Some(db), Some(dir)) = (config.bookmarks_db.as_ref(), path.and_then(Path::parent)) {
            if db.is_relative() {
                config.bookmarks_db = Some(dir.join(db));
            }
        }

        Ok(config)
    }

    /// Parses a YAML document on top of the embedded defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::from_layers(Some(yaml), std::iter::empty())
    }

    /// Builds the configuration from an optional YAML document and a set of
    /// `(name, value)` environment-style overrides.
    pub fn from_layers<I>(yaml: Option<&str>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)
            .map_err(|e| PlaybackError::Config(format!("embedded defaults: {}", e)))?;

        if let Some(yaml) = yaml {
            let external: Value = serde_yaml::from_str(yaml)
                .map_err(|e| PlaybackError::Config(format!("invalid YAML: {}", e)))?;
            merge_yaml(&mut value, &lower_keys(external));
        }

        apply_overrides(&mut value, vars);

        let section = value
            .get(SECTION)
            .cloned()
            .unwrap_or(Value::Mapping(Mapping::new()));
        let config: PlaybackConfig = serde_yaml::from_value(section)
            .map_err(|e| PlaybackError::Config(format!("invalid playback section: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.progress_interval_ms == 0 {
            return Err(PlaybackError::Config(
                "progress_interval_ms must be greater than 0".to_string(),
            ));
        }
        if !self.skip_interval_secs.is_finite() || self.skip_interval_secs < 0.0 {
            return Err(PlaybackError::Config(format!(
                "skip_interval_secs must be a positive number, got {}",
                self.skip_interval_secs
            )));
        }
        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

fn apply_overrides<I>(config: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let path: Vec<String> = stripped.split("__").map(str::to_lowercase).collect();
            set_value(config, &path, convert_env_value(&value));
        }
    }
}

fn set_value(data: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *data = value;
        return;
    };
    if let Value::Mapping(map) = data {
        let entry = map
            .entry(Value::String(head.clone()))
            .or_insert(Value::Mapping(Mapping::new()));
        set_value(entry, rest, value);
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn lower_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| match k {
                    Value::String(s) => (Value::String(s.to_lowercase()), lower_keys(v)),
                    other => (other, lower_keys(v)),
                })
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys).collect()),
        _ => value,
    }
}

fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        // pour les scalaires ou séquences, on remplace
        (d, e) => *d = e.clone(),
    }
}
