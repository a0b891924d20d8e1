//! # syncforge-pipeline
//!
//! The ten-stage run: source identification, optional crop, audio
//! alignment, trim planning, audio extraction, optional colour matching,
//! frame-rate and loudness normalization, caption overlay and the final
//! merge/encode.
//!
//! [`StageSequencer`] drives the stages against any [`MediaOps`]
//! implementation and reports through a [`ProgressSender`]. [`ToolMedia`]
//! is the production implementation backed by ffmpeg and the Python scripts.

pub mod context;
pub mod identify;
pub mod media;
pub mod planner;
pub mod sequencer;
pub mod stage;

pub use context::ProgressSender;
pub use identify::{identify_sources, SourceRoles};
pub use media::{MediaOps, ToolMedia};
pub use planner::{confidence_warning, TrimPlan};
pub use sequencer::StageSequencer;
pub use stage::Stage;
