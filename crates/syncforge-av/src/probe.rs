//! ffprobe-backed media inspection.
//!
//! Runs `ffprobe -v quiet -print_format json -show_format -show_streams` and
//! extracts the few facts the pipeline needs: duration, whether an audio
//! stream exists, and the video geometry.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use syncforge_core::{Error, Result};

use crate::command::ToolCommand;

/// Facts about one media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaProbe {
    /// Container duration in seconds.
    pub duration: f64,
    pub has_audio: bool,
    pub has_video: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Video frame rate, if reported.
    pub frame_rate: Option<f64>,
}

/// Probe `path` with the ffprobe binary at `ffprobe`.
pub async fn probe(ffprobe: &Path, path: &Path, timeout: Duration) -> Result<MediaProbe> {
    let mut cmd = ToolCommand::new(ffprobe.to_path_buf());
    cmd.args([
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ]);
    cmd.path_arg(path);
    cmd.timeout(timeout);

    let output = cmd.execute().await?;
    parse_probe_json(&output.stdout)
        .map_err(|e| Error::Probe(format!("{}: {e}", path.display())))
}

/// Interpret ffprobe's JSON output.
pub fn parse_probe_json(json: &str) -> Result<MediaProbe> {
    let ff: FfprobeOutput =
        serde_json::from_str(json).map_err(|e| Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let video = ff
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = ff
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    // Container duration first, then the longest stream duration.
    let duration = ff
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            ff.streams
                .iter()
                .filter_map(|s| s.duration.as_deref()?.parse::<f64>().ok())
                .reduce(f64::max)
        })
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| Error::Probe("no usable duration in ffprobe output".into()))?;

    Ok(MediaProbe {
        duration,
        has_audio,
        has_video: video.is_some(),
        width: video.and_then(|v| v.width),
        height: video.and_then(|v| v.height),
        frame_rate: video
            .and_then(|v| v.r_frame_rate.as_deref())
            .and_then(parse_rational),
    })
}

/// Parse an ffprobe rational such as `"30000/1001"`.
fn parse_rational(s: &str) -> Option<f64> {
    let (num, den) = match s.split_once('/') {
        Some((n, d)) => (n.parse::<f64>().ok()?, d.parse::<f64>().ok()?),
        None => (s.parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}
