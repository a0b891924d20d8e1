//! Video-track operations: crop, trim, frame-rate normalization and single
//! frame extraction.

use std::path::Path;
use std::time::Duration;

use syncforge_core::{CropSettings, Result};

use super::{secs, AAC_ARGS};
use crate::command::ToolCommand;

/// Build the crop invocation.
///
/// The temporal window is applied as an input seek before the spatial
/// filter so both happen in one encode pass.
pub fn crop_command(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    crop: &CropSettings,
    timeout: Duration,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.arg("-y");
    if let Some((start, duration)) = crop.time_window() {
        cmd.args(["-ss".to_string(), secs(start), "-t".to_string(), secs(duration)]);
    }
    cmd.arg("-i").path_arg(input);
    if crop.has_region() {
        cmd.args([
            "-vf".to_string(),
            format!("crop={}:{}:{}:{}", crop.width, crop.height, crop.x, crop.y),
        ]);
    }
    cmd.args(["-c:v", "libx264", "-preset", "medium", "-crf", "18", "-c:a", "copy"]);
    cmd.path_arg(output).expect_output(output).timeout(timeout);
    cmd
}

/// Produce a cropped copy of `input`.
pub async fn crop(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    settings: &CropSettings,
    timeout: Duration,
) -> Result<()> {
    tracing::info!(
        region = settings.has_region(),
        window = ?settings.time_window(),
        "crop {}",
        input.display()
    );
    crop_command(ffmpeg, input, output, settings, timeout)
        .execute()
        .await?;
    Ok(())
}

/// Build the trim invocation: re-encode `duration` seconds from `start`.
pub fn trim_command(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    start: f64,
    duration: f64,
    timeout: Duration,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.args(["-y".to_string(), "-ss".to_string(), secs(start)]);
    cmd.arg("-i").path_arg(input);
    cmd.args(["-t".to_string(), secs(duration)]);
    cmd.args(["-c:v", "libx264", "-preset", "ultrafast", "-crf", "18"]);
    cmd.args(AAC_ARGS);
    cmd.args(["-af", "aresample=async=1", "-avoid_negative_ts", "make_zero"]);
    cmd.path_arg(output).expect_output(output).timeout(timeout);
    cmd
}

pub async fn trim(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    start: f64,
    duration: f64,
    timeout: Duration,
) -> Result<()> {
    tracing::info!("trim {} from {start:.3}s for {duration:.3}s", input.display());
    trim_command(ffmpeg, input, output, start, duration, timeout)
        .execute()
        .await?;
    Ok(())
}

/// Build the frame-rate step: constant-rate resampling to `fps` by frame
/// duplication when enabled, a stream copy otherwise.
pub fn frame_rate_command(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    fps: u32,
    enabled: bool,
    timeout: Duration,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.arg("-y").arg("-i").path_arg(input);
    if enabled {
        cmd.args(["-r".to_string(), fps.to_string()]);
        cmd.args(["-fps_mode", "cfr"]);
        cmd.args(["-c:v", "libx264", "-preset", "medium", "-crf", "18", "-c:a", "copy"]);
    } else {
        cmd.args(["-c", "copy"]);
    }
    cmd.path_arg(output).expect_output(output).timeout(timeout);
    cmd
}

pub async fn normalize_frame_rate(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    fps: u32,
    enabled: bool,
    timeout: Duration,
) -> Result<()> {
    if enabled {
        tracing::info!("resample {} to {fps} fps", input.display());
    } else {
        tracing::info!("frame-rate conversion disabled; copying streams");
    }
    frame_rate_command(ffmpeg, input, output, fps, enabled, timeout)
        .execute()
        .await?;
    Ok(())
}

/// Build the single-frame grab at `at` seconds.
pub fn grab_frame_command(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    at: f64,
    timeout: Duration,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.args(["-y".to_string(), "-ss".to_string(), secs(at)]);
    cmd.arg("-i").path_arg(input);
    cmd.args(["-frames:v", "1", "-q:v", "2"]);
    cmd.path_arg(output).expect_output(output).timeout(timeout);
    cmd
}

pub async fn grab_frame(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    at: f64,
    timeout: Duration,
) -> Result<()> {
    grab_frame_command(ffmpeg, input, output, at, timeout)
        .execute()
        .await?;
    Ok(())
}
