//! Colour matching of the subject video toward a reference still.
//!
//! Per-channel statistics of the reference image and of one frame of the
//! video are compared; the differences, scaled by user coefficients, become
//! an ffmpeg `eq` filter chain.

use std::path::Path;
use std::time::Duration;

use syncforge_core::{Error, Result};

use super::video::grab_frame;
use crate::command::ToolCommand;

/// Normalized white-balance shift below which no gamma correction is applied.
const SHIFT_THRESHOLD: f64 = 0.01;

/// Mean and standard deviation of each RGB channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub mean: [f64; 3],
    pub std: [f64; 3],
}

impl ChannelStats {
    /// Compute statistics over raw RGB8 pixel data.
    pub fn from_rgb(pixels: &[u8]) -> Option<Self> {
        let count = pixels.len() / 3;
        if count == 0 {
            return None;
        }

        let mut sum = [0f64; 3];
        for px in pixels.chunks_exact(3) {
            for c in 0..3 {
                sum[c] += f64::from(px[c]);
            }
        }
        let n = count as f64;
        let mean = sum.map(|s| s / n);

        let mut var = [0f64; 3];
        for px in pixels.chunks_exact(3) {
            for c in 0..3 {
                let d = f64::from(px[c]) - mean[c];
                var[c] += d * d;
            }
        }
        let std = var.map(|v| (v / n).sqrt());

        Some(Self { mean, std })
    }

    /// Load an image file and compute its statistics.
    pub fn from_image(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .map_err(|e| Error::tool("image", format!("failed to read {}: {e}", path.display())))?
            .to_rgb8();
        Self::from_rgb(img.as_raw())
            .ok_or_else(|| Error::tool("image", format!("{} has no pixels", path.display())))
    }

    fn avg_std(&self) -> f64 {
        self.std.iter().sum::<f64>() / 3.0
    }
}

/// User coefficients in `[0, 1]`; 0 leaves the video unchanged on that axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCoefficients {
    pub white_balance: f64,
    pub saturation: f64,
    pub contrast: f64,
}

/// Adjustment derived from the two sets of statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAdjustment {
    /// Per-channel mean shift in 0..255 units.
    pub white_balance: [f64; 3],
    pub saturation: f64,
    pub contrast: f64,
}

impl ColorAdjustment {
    pub fn derive(reference: &ChannelStats, video: &ChannelStats, k: &ColorCoefficients) -> Self {
        let white_balance =
            [0, 1, 2].map(|c| (reference.mean[c] - video.mean[c]) * k.white_balance);
        let saturation = 1.0 + (ratio(reference.std[0], video.std[0]) - 1.0) * k.saturation;
        let contrast = 1.0 + (ratio(reference.avg_std(), video.avg_std()) - 1.0) * k.contrast;
        Self {
            white_balance,
            saturation,
            contrast,
        }
    }

    /// Render the `eq` filter chain.
    pub fn filter(&self) -> String {
        let shifts = self.white_balance.map(|s| s / 255.0);
        let mut filters = Vec::with_capacity(3);

        if shifts.iter().any(|s| s.abs() > SHIFT_THRESHOLD) {
            let [r, g, b] = shifts.map(|s| (1.0 / (1.0 + s)).clamp(0.1, 10.0));
            filters.push(format!("eq=gamma_r={r:.4}:gamma_g={g:.4}:gamma_b={b:.4}"));
        }
        filters.push(format!("eq=saturation={:.4}", self.saturation.clamp(0.0, 3.0)));
        filters.push(format!("eq=contrast={:.4}", self.contrast.clamp(-2.0, 2.0)));

        filters.join(",")
    }
}

/// Ratio that degrades to 1 (no change) for flat images.
fn ratio(num: f64, den: f64) -> f64 {
    if den.abs() < f64::EPSILON {
        1.0
    } else {
        num / den
    }
}

pub fn apply_filter_command(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    filter: &str,
    timeout: Duration,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.arg("-y").arg("-i").path_arg(input);
    cmd.args(["-vf", filter]);
    cmd.args(["-c:v", "libx264", "-preset", "medium", "-crf", "18", "-c:a", "copy"]);
    cmd.path_arg(output).expect_output(output).timeout(timeout);
    cmd
}

/// Paths and budgets for one colour-match run.
#[derive(Debug, Clone, Copy)]
pub struct ColorMatchJob<'a> {
    pub input: &'a Path,
    pub reference: &'a Path,
    /// Scratch location of the sampled frame; removed afterwards.
    pub frame: &'a Path,
    pub output: &'a Path,
    /// Position of the sampled frame, in seconds.
    pub sample_at: f64,
    pub frame_timeout: Duration,
    pub encode_timeout: Duration,
}

/// Sample a frame, derive the adjustment and encode the corrected video.
pub async fn color_match(
    ffmpeg: &Path,
    job: &ColorMatchJob<'_>,
    coefficients: &ColorCoefficients,
) -> Result<ColorAdjustment> {
    grab_frame(ffmpeg, job.input, job.frame, job.sample_at, job.frame_timeout).await?;

    let stats = ChannelStats::from_image(job.reference)
        .and_then(|reference| Ok((reference, ChannelStats::from_image(job.frame)?)));
    if let Err(e) = std::fs::remove_file(job.frame) {
        tracing::warn!("Failed to remove {}: {e}", job.frame.display());
    }
    let (reference, video) = stats?;

    let adjustment = ColorAdjustment::derive(&reference, &video, coefficients);
    let filter = adjustment.filter();
    tracing::info!(%filter, "colour match toward {}", job.reference.display());

    apply_filter_command(ffmpeg, job.input, job.output, &filter, job.encode_timeout)
        .execute()
        .await?;
    Ok(adjustment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(r: u8, g: u8, b: u8, n: usize) -> Vec<u8> {
        std::iter::repeat([r, g, b]).take(n).flatten().collect()
    }

    #[test]
    fn stats_of_uniform_image() {
        let stats = ChannelStats::from_rgb(&flat(10, 20, 30, 16)).unwrap();
        assert_eq!(stats.mean, [10.0, 20.0, 30.0]);
        assert_eq!(stats.std, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn stats_of_two_level_image() {
        let mut px = flat(0, 0, 0, 2);
        px.extend(flat(100, 100, 100, 2));
        let stats = ChannelStats::from_rgb(&px).unwrap();
        assert_eq!(stats.mean, [50.0; 3]);
        assert_eq!(stats.std, [50.0; 3]);
    }

    #[test]
    fn empty_pixels_have_no_stats() {
        assert!(ChannelStats::from_rgb(&[]).is_none());
    }

    #[test]
    fn identical_stats_give_neutral_filter() {
        let s = ChannelStats { mean: [120.0; 3], std: [40.0; 3] };
        let k = ColorCoefficients { white_balance: 0.5, saturation: 0.5, contrast: 0.5 };
        let adj = ColorAdjustment::derive(&s, &s, &k);
        assert_eq!(adj.filter(), "eq=saturation=1.0000,eq=contrast=1.0000");
    }

    #[test]
    fn warm_reference_adds_gamma_correction() {
        let reference = ChannelStats { mean: [180.0, 120.0, 100.0], std: [60.0, 40.0, 40.0] };
        let video = ChannelStats { mean: [120.0, 120.0, 120.0], std: [40.0, 40.0, 40.0] };
        let k = ColorCoefficients { white_balance: 0.5, saturation: 0.5, contrast: 0.5 };
        let adj = ColorAdjustment::derive(&reference, &video, &k);

        assert_eq!(adj.white_balance, [30.0, 0.0, -10.0]);
        assert_eq!(adj.saturation, 1.25);
        let filter = adj.filter();
        assert!(filter.starts_with("eq=gamma_r=0.8947:gamma_g=1.0000:gamma_b=1.0408"), "{filter}");
        assert!(filter.contains("eq=saturation=1.2500"));
    }

    #[test]
    fn extreme_values_are_clamped() {
        let adj = ColorAdjustment {
            white_balance: [-254.0, 0.0, 0.0],
            saturation: 9.0,
            contrast: -5.0,
        };
        let filter = adj.filter();
        assert!(filter.contains("gamma_r=10.0000"));
        assert!(filter.contains("saturation=3.0000"));
        assert!(filter.contains("contrast=-2.0000"));
    }

    #[test]
    fn flat_video_does_not_divide_by_zero() {
        let reference = ChannelStats { mean: [100.0; 3], std: [30.0; 3] };
        let video = ChannelStats { mean: [100.0; 3], std: [0.0; 3] };
        let k = ColorCoefficients { white_balance: 1.0, saturation: 1.0, contrast: 1.0 };
        let adj = ColorAdjustment::derive(&reference, &video, &k);
        assert_eq!(adj.saturation, 1.0);
        assert_eq!(adj.contrast, 1.0);
    }

    #[test]
    fn reads_stats_from_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([200, 100, 50]))
            .save(&path)
            .unwrap();
        let stats = ChannelStats::from_image(&path).unwrap();
        assert_eq!(stats.mean, [200.0, 100.0, 50.0]);
    }
}
