//! Pipeline request model shared by the controller, the worker protocol and
//! the stage sequencer.
//!
//! All wire-facing types serialize in camelCase. A [`PipelineRequest`] is
//! immutable once accepted; [`PipelineRequest::validate`] runs on the
//! controller side before any worker is spawned.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// The raw inputs of one run, in caller order. Roles are assigned by the
/// identify stage, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInputs {
    pub source_a: PathBuf,
    pub source_b: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<PathBuf>,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub title: String,
}

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

/// Tuning parameters for alignment, audio and colour stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineParams {
    /// Offsets within this many milliseconds are logged as already in sync.
    pub tolerance_ms: u32,
    /// Integrated loudness target in LUFS.
    #[serde(rename = "targetLUFS")]
    pub target_lufs: f64,
    /// Extra gain applied after normalization.
    pub audio_gain_db: f64,
    /// True-peak ceiling for the loudness normalizer.
    pub limiter_threshold_db: f64,
    pub white_balance: f64,
    pub saturation: f64,
    pub contrast: f64,
    pub frame_rate_conversion_enabled: bool,
    pub text_options: TextOptions,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            tolerance_ms: 50,
            target_lufs: -14.0,
            audio_gain_db: 0.0,
            limiter_threshold_db: -1.0,
            white_balance: 0.5,
            saturation: 0.5,
            contrast: 0.5,
            frame_rate_conversion_enabled: true,
            text_options: TextOptions::default(),
        }
    }
}

/// Caption content and styling handed to the overlay script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
    pub font_family: String,
    pub font_weight: String,
    pub text_color: String,
    pub bg_color: String,
    pub bg_opacity: f64,
    pub padding: u32,
    pub position_x: String,
    pub position_y: f64,
    pub max_bg_width_ratio: f64,
    pub max_bg_height_ratio: f64,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            custom_text: None,
            font_family: "msgothic".into(),
            font_weight: "normal".into(),
            text_color: "black".into(),
            bg_color: "white".into(),
            bg_opacity: 1.0,
            padding: 30,
            position_x: "center".into(),
            position_y: 0.25,
            max_bg_width_ratio: 0.9,
            max_bg_height_ratio: 0.3,
        }
    }
}

// ---------------------------------------------------------------------------
// Output options
// ---------------------------------------------------------------------------

/// Target encoding for the final artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputOptions {
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub bitrate_spec: String,
    pub preset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_settings: Option<CropSettings>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            output_path: PathBuf::new(),
            width: 1080,
            height: 1920,
            fps: 60,
            codec: "libx264".into(),
            bitrate_spec: "8M".into(),
            preset: "medium".into(),
            crop_settings: None,
        }
    }
}

/// Crop region and time window in source pixel/second coordinates.
///
/// `width == 0 || height == 0` means no spatial crop. A missing start or end
/// time means no temporal crop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropSettings {
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
}

impl CropSettings {
    /// Whether a spatial region is selected.
    pub fn has_region(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// The temporal window as `(start, duration)` seconds, if one is selected.
    pub fn time_window(&self) -> Option<(f64, f64)> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) if end > start && start >= 0.0 => Some((start, end - start)),
            _ => None,
        }
    }

    /// Whether the crop stage has any work to do.
    pub fn is_active(&self) -> bool {
        self.has_region() || self.time_window().is_some()
    }
}

// ---------------------------------------------------------------------------
// PipelineRequest
// ---------------------------------------------------------------------------

/// Everything one pipeline run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRequest {
    pub inputs: PipelineInputs,
    #[serde(default)]
    pub params: PipelineParams,
    #[serde(default)]
    pub output_options: OutputOptions,
}

impl PipelineRequest {
    /// Build the request for one batch item from the shared parameters.
    ///
    /// The item's text options and output path replace the shared ones; the
    /// crop settings captured for the batch are attached to every item.
    pub fn for_batch_item(
        item: &BatchItem,
        common_params: &PipelineParams,
        output_options: &OutputOptions,
        crop: Option<CropSettings>,
    ) -> Self {
        let mut params = common_params.clone();
        if let Some(text) = &item.text_options {
            params.text_options = text.clone();
        }

        let mut output_options = output_options.clone();
        output_options.output_path = item.output_path.clone();
        if output_options.crop_settings.is_none() {
            output_options.crop_settings = crop;
        }

        Self {
            inputs: item.inputs.clone(),
            params,
            output_options,
        }
    }

    /// Caption burned in by the overlay stage: the trimmed custom text when
    /// present, otherwise `"{artist}'s {title}"`.
    pub fn caption(&self) -> String {
        match self
            .params
            .text_options
            .custom_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            Some(text) => text.to_string(),
            None => format!("{}'s {}", self.inputs.artist, self.inputs.title),
        }
    }

    /// Check preconditions that must hold before a worker is spawned.
    ///
    /// Returns the first violation as [`Error::Validation`].
    pub fn validate(&self) -> Result<()> {
        let inputs = &self.inputs;
        require_file("sourceA", &inputs.source_a)?;
        require_file("sourceB", &inputs.source_b)?;
        if inputs.source_a == inputs.source_b {
            return Err(Error::Validation(
                "sourceA and sourceB must be different files".into(),
            ));
        }
        if let Some(image) = &inputs.reference_image {
            require_file("referenceImage", image)?;
        }

        let has_custom = self
            .params
            .text_options
            .custom_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if !has_custom && (inputs.artist.trim().is_empty() || inputs.title.trim().is_empty()) {
            return Err(Error::Validation(
                "artist and title are required when no custom text is given".into(),
            ));
        }

        let params = &self.params;
        if !params.target_lufs.is_finite() || !(-70.0..=0.0).contains(&params.target_lufs) {
            return Err(Error::Validation(format!(
                "targetLUFS must be between -70 and 0, got {}",
                params.target_lufs
            )));
        }
        if !params.limiter_threshold_db.is_finite() || params.limiter_threshold_db > 0.0 {
            return Err(Error::Validation(format!(
                "limiterThresholdDb must be at most 0, got {}",
                params.limiter_threshold_db
            )));
        }
        if !params.audio_gain_db.is_finite() {
            return Err(Error::Validation("audioGainDb must be a finite number".into()));
        }
        for (name, value) in [
            ("whiteBalance", params.white_balance),
            ("saturation", params.saturation),
            ("contrast", params.contrast),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Validation(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }

        let out = &self.output_options;
        if out.output_path.as_os_str().is_empty() {
            return Err(Error::Validation("outputPath is required".into()));
        }
        if out.output_path == inputs.source_a || out.output_path == inputs.source_b {
            return Err(Error::Validation(
                "outputPath must not overwrite an input".into(),
            ));
        }
        if out.width == 0 || out.height == 0 || out.fps == 0 {
            return Err(Error::Validation(format!(
                "output dimensions and fps must be non-zero, got {}x{}@{}",
                out.width, out.height, out.fps
            )));
        }
        if out.codec.trim().is_empty() || out.bitrate_spec.trim().is_empty() {
            return Err(Error::Validation("codec and bitrateSpec are required".into()));
        }

        Ok(())
    }
}

fn require_file(name: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::Validation(format!("{name} is required")));
    }
    if !path.is_file() {
        return Err(Error::Validation(format!(
            "{name} does not exist: {}",
            path.display()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Batch and outcome types
// ---------------------------------------------------------------------------

/// One set of inputs in a batch, sharing the batch's common parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub inputs: PipelineInputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_options: Option<TextOptions>,
    pub output_path: PathBuf,
}

/// Result of one batch item, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl BatchItemResult {
    pub fn succeeded(output_path: PathBuf) -> Self {
        Self {
            success: true,
            output_path: Some(output_path),
            error: None,
            stack: None,
        }
    }

    /// Failed item carrying the error message verbatim and its diagnostic.
    pub fn failed(error: &Error) -> Self {
        Self {
            success: false,
            output_path: None,
            error: Some(error.to_string()),
            stack: Some(error.diagnostic()),
        }
    }
}

/// Overall result of a batch: successful when at least one item succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub success: bool,
    pub results: Vec<BatchItemResult>,
}

impl BatchOutcome {
    pub fn from_results(results: Vec<BatchItemResult>) -> Self {
        Self {
            success: results.iter().any(|r| r.success),
            results,
        }
    }

    /// Number of items that produced an output.
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }
}

/// Result of a single `processVideo` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl From<Result<PathBuf>> for ProcessOutcome {
    fn from(result: Result<PathBuf>) -> Self {
        match result {
            Ok(path) => Self {
                success: true,
                output_path: Some(path),
                error: None,
                stack: None,
            },
            Err(e) => Self {
                success: false,
                output_path: None,
                error: Some(e.to_string()),
                stack: Some(e.diagnostic()),
            },
        }
    }
}
