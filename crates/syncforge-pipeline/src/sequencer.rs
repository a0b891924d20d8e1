//! The stage sequencer: runs the ten stages of one pipeline request in
//! order, threading each stage's artifact into the next.
//!
//! Every stage emits a `progress = 0` event before it runs and a
//! `progress = 100` event after it succeeds, including optional stages that
//! are skipped. The first failure emits a single `stage = -1` event and
//! aborts the run; nothing is retried. The run's scratch directory is
//! cleaned up on both outcomes, the declared output excepted.

use std::path::{Path, PathBuf};

use syncforge_av::ops::audio::LoudnessTarget;
use syncforge_av::ops::color::{ColorCoefficients, ColorMatchJob};
use syncforge_av::{AlignmentResult, Artifact, MediaProbe, RunScratch};
use syncforge_core::{Error, PipelineRequest, Result};

use crate::context::ProgressSender;
use crate::identify::{identify_sources, SourceRoles};
use crate::media::MediaOps;
use crate::planner::{confidence_warning, TrimPlan};
use crate::stage::Stage;

/// Latest position of the frame sampled for colour matching, in seconds.
const COLOR_SAMPLE_AT: f64 = 1.0;

/// Runs pipeline requests against a [`MediaOps`] implementation.
pub struct StageSequencer<M> {
    media: M,
    reference_marker: String,
}

/// What alignment learned about the two sources.
struct Aligned {
    alignment: AlignmentResult,
    probe_a: MediaProbe,
    probe_b: MediaProbe,
}

impl<M: MediaOps> StageSequencer<M> {
    pub fn new(media: M, reference_marker: impl Into<String>) -> Self {
        Self {
            media,
            reference_marker: reference_marker.into(),
        }
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    /// Run all stages of `request` inside `scratch`, returning the final
    /// output path.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure unchanged. A terminal `stage = -1`
    /// event carrying the error message has already been sent when this
    /// returns `Err`.
    pub async fn run(
        &self,
        request: &PipelineRequest,
        scratch: &RunScratch,
        progress: &ProgressSender,
    ) -> Result<PathBuf> {
        let output = request.output_options.output_path.clone();
        tracing::info!(run = %scratch.run_id(), "starting pipeline -> {}", output.display());

        let result = self.run_stages(request, scratch, progress).await;

        match &result {
            Ok(path) => tracing::info!(run = %scratch.run_id(), "pipeline complete: {}", path.display()),
            Err(e) => {
                tracing::error!(run = %scratch.run_id(), kind = e.kind(), "pipeline failed: {e}");
                progress.run_failed(e.to_string());
            }
        }

        scratch.cleanup(&output);
        result
    }

    async fn run_stages(
        &self,
        request: &PipelineRequest,
        scratch: &RunScratch,
        progress: &ProgressSender,
    ) -> Result<PathBuf> {
        let params = &request.params;
        let out = &request.output_options;

        // 1. Identify
        progress.stage_started(Stage::Identify);
        let roles = identify_sources(&request.inputs, &self.reference_marker)?;
        tracing::info!("source A: {}, source B: {}", roles.a.display(), roles.b.display());
        progress.stage_finished(Stage::Identify, false, None);

        // 2. Crop (optional)
        progress.stage_started(Stage::Crop);
        let crop = out.crop_settings.filter(|c| c.is_active());
        let source_a = match crop {
            Some(settings) => {
                let cropped = scratch.path(Artifact::CroppedA);
                self.media.crop(&roles.a, &cropped, &settings).await?;
                cropped
            }
            None => roles.a.clone(),
        };
        progress.stage_finished(Stage::Crop, crop.is_none(), None);

        // 3. Align
        progress.stage_started(Stage::Align);
        let aligned = self.align(&source_a, &roles, scratch).await?;
        let offset_ms = aligned.alignment.offset_seconds * 1000.0;
        if offset_ms.abs() <= f64::from(params.tolerance_ms) {
            tracing::info!("Sources already in sync ({offset_ms:.1} ms, tolerance {} ms)", params.tolerance_ms);
        } else {
            tracing::info!(
                confidence = aligned.alignment.confidence,
                "Offset {offset_ms:.1} ms ({})",
                aligned.alignment.quality
            );
        }
        progress.stage_finished(Stage::Align, false, confidence_warning(&aligned.alignment));

        // 4. Plan & trim A
        progress.stage_started(Stage::Trim);
        let plan = TrimPlan::compute(
            aligned.probe_a.duration,
            aligned.probe_b.duration,
            &aligned.alignment,
        )
        .ensure_positive()?;
        tracing::info!(
            start_a = plan.start_a,
            start_b = plan.start_b,
            duration = plan.final_duration,
            "trim plan"
        );
        let trimmed = scratch.path(Artifact::TrimmedA);
        self.media
            .trim(&source_a, &trimmed, plan.start_a, plan.final_duration)
            .await?;
        progress.stage_finished(Stage::Trim, false, None);

        // 5. Extract audio B
        progress.stage_started(Stage::ExtractAudio);
        let audio_b = scratch.path(Artifact::AudioB);
        self.media
            .extract_audio(&roles.b, &audio_b, plan.start_b, plan.final_duration)
            .await?;
        progress.stage_finished(Stage::ExtractAudio, false, None);

        // 6. Colour correct (optional)
        progress.stage_started(Stage::ColorCorrect);
        let graded = match &request.inputs.reference_image {
            Some(reference) => {
                let corrected = scratch.path(Artifact::ColorCorrected);
                let frame = scratch.path(Artifact::Frame);
                let (frame_timeout, encode_timeout) = self.media.color_timeouts();
                let job = ColorMatchJob {
                    input: &trimmed,
                    reference,
                    frame: &frame,
                    output: &corrected,
                    sample_at: COLOR_SAMPLE_AT.min(plan.final_duration / 2.0),
                    frame_timeout,
                    encode_timeout,
                };
                let coefficients = ColorCoefficients {
                    white_balance: params.white_balance,
                    saturation: params.saturation,
                    contrast: params.contrast,
                };
                self.media.color_match(&job, &coefficients).await?;
                corrected
            }
            None => trimmed,
        };
        progress.stage_finished(
            Stage::ColorCorrect,
            request.inputs.reference_image.is_none(),
            None,
        );

        // 7. Frame rate
        progress.stage_started(Stage::FrameRate);
        let resampled = scratch.path(Artifact::FrameRateNormalized);
        self.media
            .normalize_frame_rate(&graded, &resampled, out.fps, params.frame_rate_conversion_enabled)
            .await?;
        progress.stage_finished(Stage::FrameRate, false, None);

        // 8. Loudness
        progress.stage_started(Stage::Loudness);
        let normalized = scratch.path(Artifact::NormalizedAudio);
        let target = LoudnessTarget {
            integrated: params.target_lufs,
            true_peak: params.limiter_threshold_db,
            gain_db: params.audio_gain_db,
        };
        self.media
            .normalize_loudness(&audio_b, &normalized, &target)
            .await?;
        progress.stage_finished(Stage::Loudness, false, None);

        // 9. Overlay
        progress.stage_started(Stage::Overlay);
        let captioned = scratch.path(Artifact::TextOverlay);
        self.media
            .overlay(&resampled, &captioned, &request.caption(), &params.text_options)
            .await?;
        progress.stage_finished(Stage::Overlay, false, None);

        // 10. Merge & final encode
        progress.stage_started(Stage::Encode);
        let merged = scratch.path(Artifact::Merged);
        self.media.merge(&captioned, &normalized, &merged).await?;
        self.media.final_encode(&merged, out).await?;
        if !out.output_path.exists() {
            return Err(Error::artifact_missing("ffmpeg", &out.output_path));
        }
        progress.stage_finished(Stage::Encode, false, None);

        Ok(out.output_path.clone())
    }

    async fn align(&self, source_a: &Path, roles: &SourceRoles, scratch: &RunScratch) -> Result<Aligned> {
        let probe_a = self.media.probe(source_a).await?;
        if !probe_a.has_audio {
            return Err(Error::missing_audio("A", source_a));
        }
        let probe_b = self.media.probe(&roles.b).await?;
        if !probe_b.has_audio {
            return Err(Error::missing_audio("B", &roles.b));
        }

        let wav_a = scratch.path(Artifact::AlignAudioA);
        let wav_b = scratch.path(Artifact::AlignAudioB);
        let result = async {
            self.media.extract_alignment_wav(source_a, &wav_a).await?;
            self.media.extract_alignment_wav(&roles.b, &wav_b).await?;
            self.media
                .align(&wav_a, &wav_b, probe_a.duration.min(probe_b.duration))
                .await
        }
        .await;
        scratch.discard(Artifact::AlignAudioA);
        scratch.discard(Artifact::AlignAudioB);

        Ok(Aligned {
            alignment: result?,
            probe_a,
            probe_b,
        })
    }
}
