//! The media-operation seam used by the sequencer.
//!
//! [`MediaOps`] lists every external operation a run performs.
//! [`ToolMedia`] implements it with ffmpeg/ffprobe and the Python scripts;
//! tests substitute a recording fake.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use syncforge_av::ops::audio::LoudnessTarget;
use syncforge_av::ops::color::{ColorCoefficients, ColorMatchJob};
use syncforge_av::ops::{align, audio, color, encode, overlay, video};
use syncforge_av::{AlignmentResult, MediaProbe, ToolRegistry};
use syncforge_core::config::{ScriptsConfig, TimeoutsConfig};
use syncforge_core::{Config, CropSettings, OutputOptions, Result, TextOptions};

/// Every external operation the pipeline needs. Each call returns only after
/// the operation's process has exited and its declared output exists.
#[async_trait]
pub trait MediaOps: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaProbe>;

    async fn crop(&self, input: &Path, output: &Path, settings: &CropSettings) -> Result<()>;

    async fn extract_alignment_wav(&self, input: &Path, output: &Path) -> Result<()>;

    async fn align(&self, wav_a: &Path, wav_b: &Path, duration: f64) -> Result<AlignmentResult>;

    async fn trim(&self, input: &Path, output: &Path, start: f64, duration: f64) -> Result<()>;

    async fn extract_audio(&self, input: &Path, output: &Path, start: f64, duration: f64) -> Result<()>;

    async fn color_match(
        &self,
        job: &ColorMatchJob<'_>,
        coefficients: &ColorCoefficients,
    ) -> Result<()>;

    async fn normalize_frame_rate(&self, input: &Path, output: &Path, fps: u32, enabled: bool) -> Result<()>;

    async fn normalize_loudness(&self, input: &Path, output: &Path, target: &LoudnessTarget) -> Result<()>;

    async fn overlay(&self, input: &Path, output: &Path, text: &str, options: &TextOptions) -> Result<()>;

    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;

    async fn final_encode(&self, input: &Path, options: &OutputOptions) -> Result<()>;

    /// Frame-grab and encode budgets for colour matching.
    fn color_timeouts(&self) -> (Duration, Duration) {
        let t = TimeoutsConfig::default();
        (TimeoutsConfig::secs(t.frame_grab), TimeoutsConfig::secs(t.color))
    }
}

/// [`MediaOps`] backed by the real external tools.
#[derive(Debug, Clone)]
pub struct ToolMedia {
    tools: ToolRegistry,
    scripts: ScriptsConfig,
    timeouts: TimeoutsConfig,
}

impl ToolMedia {
    pub fn new(tools: ToolRegistry, scripts: ScriptsConfig, timeouts: TimeoutsConfig) -> Self {
        Self {
            tools,
            scripts,
            timeouts,
        }
    }

    /// Discover tools and take scripts and budgets from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ToolRegistry::discover(&config.tools),
            config.scripts.clone(),
            config.timeouts.clone(),
        )
    }

    fn ffmpeg(&self) -> Result<&Path> {
        self.tools.require("ffmpeg")
    }

    fn python(&self) -> Result<&Path> {
        self.tools.require("python")
    }
}

fn t(secs: u64) -> Duration {
    TimeoutsConfig::secs(secs)
}

#[async_trait]
impl MediaOps for ToolMedia {
    async fn probe(&self, path: &Path) -> Result<MediaProbe> {
        let ffprobe = self.tools.require("ffprobe")?;
        syncforge_av::probe::probe(ffprobe, path, t(self.timeouts.probe)).await
    }

    async fn crop(&self, input: &Path, output: &Path, settings: &CropSettings) -> Result<()> {
        video::crop(self.ffmpeg()?, input, output, settings, t(self.timeouts.crop)).await
    }

    async fn extract_alignment_wav(&self, input: &Path, output: &Path) -> Result<()> {
        audio::extract_alignment_wav(self.ffmpeg()?, input, output, t(self.timeouts.align_extract)).await
    }

    async fn align(&self, wav_a: &Path, wav_b: &Path, duration: f64) -> Result<AlignmentResult> {
        align::align(
            self.python()?,
            &self.scripts.align_script,
            wav_a,
            wav_b,
            duration,
            &self.scripts.align_mode,
            t(self.timeouts.align),
        )
        .await
    }

    async fn trim(&self, input: &Path, output: &Path, start: f64, duration: f64) -> Result<()> {
        video::trim(self.ffmpeg()?, input, output, start, duration, t(self.timeouts.trim)).await
    }

    async fn extract_audio(&self, input: &Path, output: &Path, start: f64, duration: f64) -> Result<()> {
        audio::extract_segment(
            self.ffmpeg()?,
            input,
            output,
            start,
            duration,
            t(self.timeouts.extract_audio),
        )
        .await
    }

    async fn color_match(
        &self,
        job: &ColorMatchJob<'_>,
        coefficients: &ColorCoefficients,
    ) -> Result<()> {
        color::color_match(self.ffmpeg()?, job, coefficients).await?;
        Ok(())
    }

    async fn normalize_frame_rate(&self, input: &Path, output: &Path, fps: u32, enabled: bool) -> Result<()> {
        video::normalize_frame_rate(self.ffmpeg()?, input, output, fps, enabled, t(self.timeouts.frame_rate))
            .await
    }

    async fn normalize_loudness(&self, input: &Path, output: &Path, target: &LoudnessTarget) -> Result<()> {
        audio::normalize_loudness(self.ffmpeg()?, input, output, target, t(self.timeouts.loudness)).await?;
        Ok(())
    }

    async fn overlay(&self, input: &Path, output: &Path, text: &str, options: &TextOptions) -> Result<()> {
        overlay::overlay_text(
            self.python()?,
            &self.scripts.overlay_script,
            input,
            output,
            text,
            options,
            t(self.timeouts.overlay),
        )
        .await
    }

    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        encode::merge(self.ffmpeg()?, video, audio, output, t(self.timeouts.merge)).await
    }

    async fn final_encode(&self, input: &Path, options: &OutputOptions) -> Result<()> {
        encode::final_encode(self.ffmpeg()?, input, options, t(self.timeouts.final_encode)).await
    }

    fn color_timeouts(&self) -> (Duration, Duration) {
        (t(self.timeouts.frame_grab), t(self.timeouts.color))
    }
}
