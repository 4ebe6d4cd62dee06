//! Configuration management for Marcador

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::location::{DriftPolicy, GeneratorOptions};

/// Invalid configuration values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub generator: GeneratorOptions,
    pub store: StoreConfig,
}

/// How the renderer lays out chapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingMode {
    /// Continuous vertical scrolling
    #[default]
    Scrolled,
    /// Column-based pages
    Paginated,
}

impl FromStr for ReadingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scrolled" | "scroll" => Ok(ReadingMode::Scrolled),
            "paginated" | "pages" => Ok(ReadingMode::Paginated),
            other => Err(format!("unknown reading mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Quiet period after the last scroll event before a commit
    pub debounce_ms: u64,
    /// Autosave period
    pub save_interval_ms: u64,
    pub auto_save: bool,
    /// Scroll distance (px) from the last save that triggers a new save
    pub position_threshold: f64,
    pub track_selection: bool,
    pub drift_policy: DriftPolicy,
    pub reading_mode: ReadingMode,
}

impl TrackerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_millis(self.save_interval_ms)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            debounce_ms: 150,
            save_interval_ms: 5000,
            auto_save: true,
            position_threshold: 100.0,
            track_selection: false,
            drift_policy: DriftPolicy::Soft,
            reading_mode: ReadingMode::Scrolled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory used by the file-backed store
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            dir: PathBuf::from("./positions"),
        }
    }
}

impl Config {
    /// Load configuration from `MARCADOR_*` environment variables
    ///
    /// Unset variables fall back to defaults; malformed ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let strict = parse_var(&lookup, "MARCADOR_STRICT_VALIDATION", false)?;

        Ok(Config {
            tracker: TrackerConfig {
                debounce_ms: parse_var(&lookup, "MARCADOR_DEBOUNCE_MS", defaults.tracker.debounce_ms)?,
                save_interval_ms: parse_var(
                    &lookup,
                    "MARCADOR_SAVE_INTERVAL_MS",
                    defaults.tracker.save_interval_ms,
                )?,
                auto_save: parse_var(&lookup, "MARCADOR_AUTO_SAVE", defaults.tracker.auto_save)?,
                position_threshold: parse_var(
                    &lookup,
                    "MARCADOR_POSITION_THRESHOLD",
                    defaults.tracker.position_threshold,
                )?,
                track_selection: parse_var(
                    &lookup,
                    "MARCADOR_TRACK_SELECTION",
                    defaults.tracker.track_selection,
                )?,
                drift_policy: if strict {
                    DriftPolicy::Strict
                } else {
                    DriftPolicy::Soft
                },
                reading_mode: parse_var(
                    &lookup,
                    "MARCADOR_READING_MODE",
                    defaults.tracker.reading_mode,
                )?,
            },
            generator: GeneratorOptions {
                context_length: parse_var(
                    &lookup,
                    "MARCADOR_CONTEXT_LENGTH",
                    defaults.generator.context_length,
                )?,
                scroll_tolerance: parse_var(
                    &lookup,
                    "MARCADOR_SCROLL_TOLERANCE",
                    defaults.generator.scroll_tolerance,
                )?,
                fingerprint: parse_var(&lookup, "MARCADOR_FINGERPRINT", defaults.generator.fingerprint)?,
                capture_debug: defaults.generator.capture_debug,
            },
            store: StoreConfig {
                dir: lookup("MARCADOR_STORE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.store.dir),
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
