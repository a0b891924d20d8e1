//! # syncforge-core
//!
//! Shared types for the syncforge workspace: the unified [`Error`], the
//! TOML [`Config`](config::Config), the pipeline request model, progress
//! events with their broadcast [`EventBus`](events::EventBus), typed run ids
//! and the shared crop-settings slot.

pub mod config;
pub mod crop;
pub mod error;
pub mod events;
pub mod ids;
pub mod request;

pub use config::Config;
pub use crop::CropSlot;
pub use error::{Error, Result};
pub use events::{EventBus, ProgressEvent, FAILED_STAGE};
pub use ids::RunId;
pub use request::{
    BatchItem, BatchItemResult, BatchOutcome, CropSettings, OutputOptions, PipelineInputs,
    PipelineParams, PipelineRequest, ProcessOutcome, TextOptions,
};
