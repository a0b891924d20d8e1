//! Scratch storage for intermediate artifacts.
//!
//! A [`ScratchDir`] is the controller's shared scratch root, created lazily.
//! Each run gets its own [`RunScratch`] subdirectory named after its
//! [`RunId`], inside which intermediates have fixed, stage-wise names.
//! Cleanup is best-effort: failures are logged and never escalated.

use std::fmt;
use std::path::{Path, PathBuf};

use syncforge_core::{Result, RunId};

/// Well-known intermediate files of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    CroppedA,
    AlignAudioA,
    AlignAudioB,
    TrimmedA,
    AudioB,
    Frame,
    ColorCorrected,
    FrameRateNormalized,
    NormalizedAudio,
    TextOverlay,
    Merged,
}

impl Artifact {
    pub const ALL: [Artifact; 11] = [
        Artifact::CroppedA,
        Artifact::AlignAudioA,
        Artifact::AlignAudioB,
        Artifact::TrimmedA,
        Artifact::AudioB,
        Artifact::Frame,
        Artifact::ColorCorrected,
        Artifact::FrameRateNormalized,
        Artifact::NormalizedAudio,
        Artifact::TextOverlay,
        Artifact::Merged,
    ];

    /// File name inside the run directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Artifact::CroppedA => "cropped_A.mp4",
            Artifact::AlignAudioA => "audioA.wav",
            Artifact::AlignAudioB => "audioB.wav",
            Artifact::TrimmedA => "trimmed_A.mp4",
            Artifact::AudioB => "audio_B.aac",
            Artifact::Frame => "frame.jpg",
            Artifact::ColorCorrected => "color_corrected.mp4",
            Artifact::FrameRateNormalized => "fps60.mp4",
            Artifact::NormalizedAudio => "normalized_audio.aac",
            Artifact::TextOverlay => "text_overlay.mp4",
            Artifact::Merged => "merged.mp4",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

// ---------------------------------------------------------------------------
// ScratchDir
// ---------------------------------------------------------------------------

/// The controller's scratch root.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Record the root without touching the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root if needed. Safe to call repeatedly.
    pub fn ensure(&self) -> Result<&Path> {
        std::fs::create_dir_all(&self.root)?;
        Ok(&self.root)
    }

    /// Path of the subdirectory belonging to `run_id`, without creating it.
    pub fn run_path(&self, run_id: RunId) -> PathBuf {
        self.root.join(run_id.to_string())
    }

    /// Create (idempotently) and return the scratch area for one run.
    pub fn run(&self, run_id: RunId) -> Result<RunScratch> {
        self.ensure()?;
        let dir = self.run_path(run_id);
        std::fs::create_dir_all(&dir)?;
        Ok(RunScratch { run_id, dir })
    }

    /// Remove a run's subdirectory and everything in it, best-effort.
    ///
    /// The controller calls this after a worker has exited, which also
    /// covers workers that were killed before their own cleanup ran.
    pub fn remove_run(&self, run_id: RunId) {
        let dir = self.run_path(run_id);
        if !dir.exists() {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            tracing::warn!("Failed to remove run scratch {}: {e}", dir.display());
        }
    }
}

// ---------------------------------------------------------------------------
// RunScratch
// ---------------------------------------------------------------------------

/// One run's isolated scratch subdirectory.
#[derive(Debug, Clone)]
pub struct RunScratch {
    run_id: RunId,
    dir: PathBuf,
}

impl RunScratch {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a well-known artifact in this run.
    pub fn path(&self, artifact: Artifact) -> PathBuf {
        self.dir.join(artifact.file_name())
    }

    /// Delete one artifact, best-effort.
    pub fn discard(&self, artifact: Artifact) {
        remove_file_logged(&self.path(artifact));
    }

    /// Delete every known intermediate and then the run directory.
    ///
    /// `keep` is the run's declared final output; it is never deleted even
    /// if it was placed inside the scratch area.
    pub fn cleanup(&self, keep: &Path) {
        for artifact in Artifact::ALL {
            let path = self.path(artifact);
            if path == keep {
                continue;
            }
            remove_file_logged(&path);
        }

        if keep.starts_with(&self.dir) {
            tracing::debug!("Keeping scratch dir {}: holds final output", self.dir.display());
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove scratch dir {}: {e}", self.dir.display());
            }
        }
    }
}

fn remove_file_logged(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::trace!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {e}", path.display()),
    }
}
