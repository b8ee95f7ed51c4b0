//! Configuration loading and parsing.
//!
//! Parses `backscroll.toml` (or an override path provided by the binary).
//! Every field is optional; absent sections and fields take their defaults.
//! Values outside sane bounds are clamped once at load time and each clamp is
//! logged on target `config`. The raw parsed file is retained alongside the
//! clamped values so the difference stays inspectable.
//!
//! Unknown fields are ignored (TOML deserialization tolerance) to allow
//! forward evolution without immediate warnings. A file that fails to parse
//! falls back to defaults with a warning.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};
use tracing::{info, warn};

const MIN_FLUSH_PERIOD_MS: u64 = 1;
const MIN_BLINK_PERIOD_MS: u64 = 50;
const MAX_LAYOUT_UNITS: u16 = 16;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct IngestConfig {
    /// Flush cadence for queued lines.
    pub flush_period_ms: u64,
    /// Delay before the first flush.
    pub initial_delay_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            flush_period_ms: 50,
            initial_delay_ms: 100,
        }
    }
}

impl IngestConfig {
    pub fn flush_period(&self) -> Duration {
        Duration::from_millis(self.flush_period_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ScrollConfig {
    /// Distance from the bottom still treated as "at bottom" for autoscroll.
    pub autoscroll_threshold: i64,
    /// Lines scrolled per wheel notch.
    pub wheel_step: u16,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            autoscroll_threshold: 5,
            wheel_step: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct InputConfig {
    pub prompt: String,
    pub blink_period_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            prompt: ">>> ".to_string(),
            blink_period_ms: 500,
        }
    }
}

impl InputConfig {
    pub fn blink_period(&self) -> Duration {
        Duration::from_millis(self.blink_period_ms)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BufferConfig {
    /// Capacity hint for the committed line store.
    pub initial_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 100_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ViewConfig {
    /// Left text inset.
    pub inset: u16,
    /// Show the line number gutter.
    pub gutter: bool,
    /// Extra gutter width beyond the widest label.
    pub gutter_margin: u16,
    /// Gap between labels and the gutter's right edge.
    pub gutter_padding: u16,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            inset: 1,
            gutter: true,
            gutter_margin: 2,
            gutter_padding: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub path: Option<PathBuf>,
    pub file: ConfigFile, // parsed (or default) data, unclamped
    pub effective: ConfigFile, // clamped
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("backscroll.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("backscroll").join("backscroll.toml");
    }
    PathBuf::from("backscroll.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default().finish());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => Ok(Config {
            raw: Some(content),
            path: Some(path),
            file,
            effective: ConfigFile::default(),
        }
        .finish()),
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
            Ok(Config::default().finish())
        }
    }
}

impl Config {
    fn finish(mut self) -> Self {
        self.effective = self.file.clone();
        self.apply_clamps();
        self
    }

    fn apply_clamps(&mut self) {
        let eff = &mut self.effective;
        clamp_min(
            &mut eff.ingest.flush_period_ms,
            MIN_FLUSH_PERIOD_MS,
            "ingest.flush_period_ms",
        );
        clamp_min(
            &mut eff.input.blink_period_ms,
            MIN_BLINK_PERIOD_MS,
            "input.blink_period_ms",
        );
        clamp_max(&mut eff.view.inset, MAX_LAYOUT_UNITS, "view.inset");
        clamp_max(
            &mut eff.view.gutter_margin,
            MAX_LAYOUT_UNITS,
            "view.gutter_margin",
        );
        clamp_max(
            &mut eff.view.gutter_padding,
            MAX_LAYOUT_UNITS,
            "view.gutter_padding",
        );
        if eff.scroll.autoscroll_threshold < 0 {
            info!(target: "config", field = "scroll.autoscroll_threshold", raw = eff.scroll.autoscroll_threshold, clamped = 0, "config_value_clamped");
            eff.scroll.autoscroll_threshold = 0;
        }
        if eff.scroll.wheel_step == 0 {
            info!(target: "config", field = "scroll.wheel_step", raw = 0, clamped = 1, "config_value_clamped");
            eff.scroll.wheel_step = 1;
        }
    }
}

fn clamp_min<T: Copy + Ord + Into<u64>>(value: &mut T, min: T, field: &'static str) {
    if *value < min {
        let (raw, clamped): (u64, u64) = ((*value).into(), min.into());
        info!(target: "config", field, raw, clamped, "config_value_clamped");
        *value = min;
    }
}

fn clamp_max<T: Copy + Ord + Into<u64>>(value: &mut T, max: T, field: &'static str) {
    if *value > max {
        let (raw, clamped): (u64, u64) = ((*value).into(), max.into());
        info!(target: "config", field, raw, clamped, "config_value_clamped");
        *value = max;
    }
}
