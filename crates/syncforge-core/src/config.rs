//! Application configuration.
//!
//! The top-level [`Config`] is deserialized from TOML. Every section
//! defaults sensibly so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Locations searched when no explicit config path is given.
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./syncforge.toml",
    "~/.config/syncforge/config.toml",
    "/etc/syncforge/config.toml",
];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub scripts: ScriptsConfig,
    pub scratch: ScratchConfig,
    pub timeouts: TimeoutsConfig,
    pub identify: IdentifyConfig,
    pub worker: WorkerConfig,
    /// File this config was loaded from, forwarded to spawned workers.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load from `custom_path` when given, otherwise from the first default
    /// location that exists, otherwise return defaults.
    ///
    /// An explicit path that cannot be read or parsed is an error; default
    /// locations are only used when present.
    pub fn load_or_default(custom_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = custom_path {
            return Self::load(path);
        }

        for path_str in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path_str);
            let path = Path::new(expanded.as_ref());
            if path.exists() {
                tracing::debug!("Loading config from {}", path.display());
                return Self::load(path);
            }
        }

        tracing::debug!("No config file found; using defaults");
        Ok(Self::default())
    }

    /// Return non-fatal warnings about the configuration.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, path) in [
            ("ffmpeg_path", &self.tools.ffmpeg_path),
            ("ffprobe_path", &self.tools.ffprobe_path),
            ("python_path", &self.tools.python_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "tools.{name} does not exist: {}; falling back to PATH",
                        p.display()
                    ));
                }
            }
        }

        for (name, path) in [
            ("align_script", &self.scripts.align_script),
            ("overlay_script", &self.scripts.overlay_script),
        ] {
            if !path.exists() {
                warnings.push(format!("scripts.{name} does not exist: {}", path.display()));
            }
        }

        if self.identify.reference_marker.trim().is_empty() {
            warnings.push("identify.reference_marker is empty; every input will match".into());
        }

        if let Some(program) = &self.worker.program {
            if !program.exists() {
                warnings.push(format!("worker.program does not exist: {}", program.display()));
            }
        }

        for (name, secs) in self.timeouts.entries() {
            if secs == 0 {
                warnings.push(format!("timeouts.{name} is 0; every invocation will time out"));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// ToolsConfig
// ---------------------------------------------------------------------------

/// Optional explicit paths to external tools. `None` means search `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub python_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// ScriptsConfig
// ---------------------------------------------------------------------------

/// The external analysis scripts invoked through the Python interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Offline audio alignment script.
    pub align_script: PathBuf,
    /// Alignment mode argument.
    pub align_mode: String,
    /// Caption rendering script.
    pub overlay_script: PathBuf,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            align_script: PathBuf::from("scripts/audio_sync_advanced.py"),
            align_mode: "multi_checkpoint".into(),
            overlay_script: PathBuf::from("scripts/add_text_to_video.py"),
        }
    }
}

// ---------------------------------------------------------------------------
// ScratchConfig
// ---------------------------------------------------------------------------

/// Root directory under which each run gets its own subdirectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    pub dir: PathBuf,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("syncforge"),
        }
    }
}

// ---------------------------------------------------------------------------
// TimeoutsConfig
// ---------------------------------------------------------------------------

/// Wall-clock budgets, in seconds, for each external operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub probe: u64,
    pub align_extract: u64,
    pub align: u64,
    pub crop: u64,
    pub trim: u64,
    pub extract_audio: u64,
    pub frame_grab: u64,
    pub color: u64,
    pub frame_rate: u64,
    pub loudness: u64,
    pub overlay: u64,
    pub merge: u64,
    pub final_encode: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            probe: 30,
            align_extract: 60,
            align: 600,
            crop: 300,
            trim: 300,
            extract_audio: 120,
            frame_grab: 30,
            color: 300,
            frame_rate: 300,
            loudness: 300,
            overlay: 600,
            merge: 180,
            final_encode: 600,
        }
    }
}

impl TimeoutsConfig {
    /// Convert a field value to a [`Duration`].
    pub fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    fn entries(&self) -> [(&'static str, u64); 13] {
        [
            ("probe", self.probe),
            ("align_extract", self.align_extract),
            ("align", self.align),
            ("crop", self.crop),
            ("trim", self.trim),
            ("extract_audio", self.extract_audio),
            ("frame_grab", self.frame_grab),
            ("color", self.color),
            ("frame_rate", self.frame_rate),
            ("loudness", self.loudness),
            ("overlay", self.overlay),
            ("merge", self.merge),
            ("final_encode", self.final_encode),
        ]
    }
}

// ---------------------------------------------------------------------------
// IdentifyConfig
// ---------------------------------------------------------------------------

/// Filename convention used to tell the reference-audio source apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyConfig {
    /// Substring whose presence in a file name marks the reference source.
    pub reference_marker: String,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            reference_marker: "ScreenRecording".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkerConfig
// ---------------------------------------------------------------------------

/// How the controller launches worker processes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker executable. Defaults to the running binary.
    pub program: Option<PathBuf>,
    /// Arguments placed before the generated worker arguments.
    pub args: Vec<String>,
}
