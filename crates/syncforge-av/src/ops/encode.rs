//! Muxing and the final delivery encode.

use std::path::Path;
use std::time::Duration;

use syncforge_core::{OutputOptions, Result};

use super::AAC_ARGS;
use crate::command::ToolCommand;

/// Build the mux of a video-only source with a separate audio track.
///
/// Output is cut to the shorter stream; upstream trimming already equalizes
/// durations, so this only absorbs sub-frame rounding.
pub fn merge_command(
    ffmpeg: &Path,
    video: &Path,
    audio: &Path,
    output: &Path,
    timeout: Duration,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.arg("-y").arg("-i").path_arg(video).arg("-i").path_arg(audio);
    cmd.args(["-c:v", "copy"]);
    cmd.args(AAC_ARGS);
    cmd.args(["-map", "0:v:0", "-map", "1:a:0"]);
    cmd.args(["-shortest", "-fflags", "+shortest", "-max_interleave_delta", "0"]);
    cmd.args(["-avoid_negative_ts", "make_zero"]);
    cmd.path_arg(output).expect_output(output).timeout(timeout);
    cmd
}

pub async fn merge(
    ffmpeg: &Path,
    video: &Path,
    audio: &Path,
    output: &Path,
    timeout: Duration,
) -> Result<()> {
    tracing::info!("merge {} + {}", video.display(), audio.display());
    merge_command(ffmpeg, video, audio, output, timeout)
        .execute()
        .await?;
    Ok(())
}

/// Scale-to-fit, pad to the exact frame and resample to the target rate.
pub fn delivery_filter(width: u32, height: u32, fps: u32) -> String {
    format!(
        "scale={width}:{height}:force_original_aspect_ratio=decrease,\
         pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,fps={fps}"
    )
}

pub fn final_encode_command(
    ffmpeg: &Path,
    input: &Path,
    options: &OutputOptions,
    timeout: Duration,
) -> ToolCommand {
    let output = options.output_path.as_path();
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.arg("-y").arg("-i").path_arg(input);
    cmd.args([
        "-vf".to_string(),
        delivery_filter(options.width, options.height, options.fps),
    ]);
    cmd.args([
        "-c:v".to_string(),
        options.codec.clone(),
        "-b:v".to_string(),
        options.bitrate_spec.clone(),
        "-preset".to_string(),
        options.preset.clone(),
    ]);
    cmd.args(["-pix_fmt", "yuv420p", "-movflags", "+faststart"]);
    cmd.args(AAC_ARGS);
    cmd.path_arg(output).expect_output(output).timeout(timeout);
    cmd
}

/// Encode `input` into the caller's declared output.
pub async fn final_encode(
    ffmpeg: &Path,
    input: &Path,
    options: &OutputOptions,
    timeout: Duration,
) -> Result<()> {
    if let Some(parent) = options.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    tracing::info!(
        "final encode {}x{}@{} {} {} -> {}",
        options.width,
        options.height,
        options.fps,
        options.codec,
        options.bitrate_spec,
        options.output_path.display()
    );
    final_encode_command(ffmpeg, input, options, timeout)
        .execute()
        .await?;
    Ok(())
}
