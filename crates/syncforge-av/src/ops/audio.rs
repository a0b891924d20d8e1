//! Audio operations: alignment extracts, reference-audio extraction and
//! two-pass loudness normalization.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use syncforge_core::{Error, Result};

use super::{secs, AAC_ARGS};
use crate::command::ToolCommand;

/// Loudness range target passed to `loudnorm`.
const LOUDNESS_RANGE: f64 = 11.0;

/// Build the extraction of a mono 22.05 kHz PCM WAV for the alignment script.
pub fn alignment_wav_command(ffmpeg: &Path, input: &Path, output: &Path, timeout: Duration) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.arg("-y").arg("-i").path_arg(input);
    cmd.args(["-vn", "-acodec", "pcm_s16le", "-ar", "22050", "-ac", "1"]);
    cmd.path_arg(output).expect_output(output).timeout(timeout);
    cmd
}

pub async fn extract_alignment_wav(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    timeout: Duration,
) -> Result<()> {
    alignment_wav_command(ffmpeg, input, output, timeout)
        .execute()
        .await?;
    Ok(())
}

/// Build the extraction of `duration` seconds of audio from `start`.
pub fn extract_segment_command(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    start: f64,
    duration: f64,
    timeout: Duration,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.arg("-y");
    if start > 0.0 {
        cmd.args(["-ss".to_string(), secs(start)]);
    }
    cmd.arg("-i").path_arg(input);
    cmd.args(["-t".to_string(), secs(duration)]);
    cmd.arg("-vn");
    cmd.args(AAC_ARGS);
    cmd.args(["-avoid_negative_ts", "make_zero"]);
    cmd.path_arg(output).expect_output(output).timeout(timeout);
    cmd
}

pub async fn extract_segment(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    start: f64,
    duration: f64,
    timeout: Duration,
) -> Result<()> {
    tracing::info!("extract audio of {} from {start:.3}s for {duration:.3}s", input.display());
    extract_segment_command(ffmpeg, input, output, start, duration, timeout)
        .execute()
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Loudness
// ---------------------------------------------------------------------------

/// Targets for the loudness pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessTarget {
    /// Integrated loudness in LUFS.
    pub integrated: f64,
    /// True-peak ceiling in dBTP.
    pub true_peak: f64,
    /// Extra gain applied after normalization, in dB.
    pub gain_db: f64,
}

/// First-pass measurement reported by `loudnorm`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessMeasurement {
    pub input_i: f64,
    pub input_tp: f64,
    pub input_lra: f64,
    pub input_thresh: f64,
    pub target_offset: f64,
}

impl LoudnessMeasurement {
    /// Silent input reports `-inf`; such a measurement cannot seed pass two.
    pub fn is_usable(&self) -> bool {
        [self.input_i, self.input_tp, self.input_lra, self.input_thresh, self.target_offset]
            .iter()
            .all(|v| v.is_finite())
    }
}

#[derive(Debug, Deserialize)]
struct LoudnormJson {
    input_i: String,
    input_tp: String,
    input_lra: String,
    input_thresh: String,
    #[serde(default)]
    target_offset: Option<String>,
}

fn loudnorm_base(target: &LoudnessTarget) -> String {
    format!(
        "loudnorm=I={}:TP={}:LRA={}",
        target.integrated, target.true_peak, LOUDNESS_RANGE
    )
}

pub fn measure_loudness_command(
    ffmpeg: &Path,
    input: &Path,
    target: &LoudnessTarget,
    timeout: Duration,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.args(["-hide_banner", "-nostats", "-i"]);
    cmd.path_arg(input);
    cmd.args([
        "-af".to_string(),
        format!("{}:print_format=json", loudnorm_base(target)),
    ]);
    cmd.args(["-f", "null", "-"]);
    cmd.timeout(timeout);
    cmd
}

/// Extract the `loudnorm` JSON block from ffmpeg's stderr.
///
/// The block is the last `{ ... }` in the stream; everything else is
/// ffmpeg's normal log output.
pub fn parse_loudnorm_output(stderr: &str) -> Result<LoudnessMeasurement> {
    let start = stderr.rfind('{');
    let end = stderr.rfind('}');
    let block = match (start, end) {
        (Some(s), Some(e)) if s < e => &stderr[s..=e],
        _ => {
            return Err(Error::tool(
                "ffmpeg",
                format!("loudnorm produced no measurement: {}", stderr.trim()),
            ))
        }
    };

    let raw: LoudnormJson = serde_json::from_str(block)
        .map_err(|e| Error::tool("ffmpeg", format!("unreadable loudnorm measurement: {e}")))?;

    let num = |name: &str, value: &str| -> Result<f64> {
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::tool("ffmpeg", format!("loudnorm {name} is not a number: {value}")))
    };

    Ok(LoudnessMeasurement {
        input_i: num("input_i", &raw.input_i)?,
        input_tp: num("input_tp", &raw.input_tp)?,
        input_lra: num("input_lra", &raw.input_lra)?,
        input_thresh: num("input_thresh", &raw.input_thresh)?,
        target_offset: match raw.target_offset.as_deref() {
            Some(v) => num("target_offset", v)?,
            None => 0.0,
        },
    })
}

pub async fn measure_loudness(
    ffmpeg: &Path,
    input: &Path,
    target: &LoudnessTarget,
    timeout: Duration,
) -> Result<LoudnessMeasurement> {
    let output = measure_loudness_command(ffmpeg, input, target, timeout)
        .execute()
        .await?;
    let measurement = parse_loudnorm_output(&output.stderr)?;
    tracing::debug!(?measurement, "loudness measured");
    Ok(measurement)
}

/// Build the second pass. Falls back to single-pass `loudnorm` when the
/// measurement is not usable.
pub fn normalize_loudness_command(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    target: &LoudnessTarget,
    measured: &LoudnessMeasurement,
    timeout: Duration,
) -> ToolCommand {
    let loudnorm = if measured.is_usable() {
        format!(
            "{}:measured_I={}:measured_LRA={}:measured_TP={}:measured_thresh={}:offset={}:linear=true:print_format=summary",
            loudnorm_base(target),
            measured.input_i,
            measured.input_lra,
            measured.input_tp,
            measured.input_thresh,
            measured.target_offset
        )
    } else {
        format!("{}:print_format=summary", loudnorm_base(target))
    };
    let filter = format!("{loudnorm},volume={}dB", target.gain_db);

    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.arg("-y").arg("-i").path_arg(input);
    cmd.args(["-af".to_string(), filter]);
    cmd.args(AAC_ARGS);
    cmd.path_arg(output).expect_output(output).timeout(timeout);
    cmd
}

/// Measure then normalize `input` into `output`.
pub async fn normalize_loudness(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    target: &LoudnessTarget,
    timeout: Duration,
) -> Result<LoudnessMeasurement> {
    let measured = measure_loudness(ffmpeg, input, target, timeout).await?;
    if !measured.is_usable() {
        tracing::warn!("Loudness measurement not usable (silent input?); using single-pass normalization");
    }
    tracing::info!(
        "normalize loudness {:.1} LUFS -> {} LUFS, gain {} dB",
        measured.input_i,
        target.integrated,
        target.gain_db
    );
    normalize_loudness_command(ffmpeg, input, output, target, &measured, timeout)
        .execute()
        .await?;
    Ok(measured)
}
