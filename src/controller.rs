//! Controller-facing API.
//!
//! The [`Controller`] is what a front end talks to: it validates requests,
//! hands each run to a fresh worker process, republishes progress on an
//! [`EventBus`] and answers file-picker requests through a [`FilePicker`].

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use syncforge_core::events::Event;
use syncforge_core::{
    BatchItem, BatchOutcome, Config, CropSlot, EventBus, OutputOptions, PipelineInputs,
    PipelineParams, PipelineRequest, ProcessOutcome, Result,
};
use syncforge_worker::{BatchCoordinator, WorkerClient};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// File pickers
// ---------------------------------------------------------------------------

/// A named group of file extensions offered by a picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

impl FileFilter {
    pub fn new(name: impl Into<String>, extensions: &[&str]) -> Self {
        Self {
            name: name.into(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Filter for the video inputs.
    pub fn videos() -> Self {
        Self::new("Videos", &["mp4", "mov", "mkv", "avi", "webm"])
    }

    /// Filter for colour reference images.
    pub fn images() -> Self {
        Self::new("Images", &["jpg", "jpeg", "png", "bmp"])
    }

    /// Whether `path` has one of this filter's extensions.
    pub fn matches(&self, path: &std::path::Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
    }
}

/// Source of user-chosen paths. `None` means the user cancelled.
pub trait FilePicker: Send + Sync {
    fn select_file(&self, filters: &[FileFilter]) -> Option<PathBuf>;

    fn select_save_path(&self) -> Option<PathBuf>;
}

/// Picker for headless use: every request is cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPicker;

impl FilePicker for NoPicker {
    fn select_file(&self, _filters: &[FileFilter]) -> Option<PathBuf> {
        None
    }

    fn select_save_path(&self) -> Option<PathBuf> {
        None
    }
}

/// Picker that answers from paths given up front, in order.
///
/// Files that do not match the requested filters are skipped over.
#[derive(Debug, Default)]
pub struct PresetPicker {
    files: Mutex<VecDeque<PathBuf>>,
    save_path: Option<PathBuf>,
}

impl PresetPicker {
    pub fn new(files: impl IntoIterator<Item = PathBuf>, save_path: Option<PathBuf>) -> Self {
        Self {
            files: Mutex::new(files.into_iter().collect()),
            save_path,
        }
    }
}

impl FilePicker for PresetPicker {
    fn select_file(&self, filters: &[FileFilter]) -> Option<PathBuf> {
        let mut files = self.files.lock();
        let position = files
            .iter()
            .position(|f| filters.is_empty() || filters.iter().any(|filter| filter.matches(f)))?;
        files.remove(position)
    }

    fn select_save_path(&self) -> Option<PathBuf> {
        self.save_path.clone()
    }
}

// ---------------------------------------------------------------------------
// Batch file
// ---------------------------------------------------------------------------

/// On-disk shape of a batch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub items: Vec<BatchItem>,
    #[serde(default)]
    pub params: PipelineParams,
    #[serde(default)]
    pub output_options: OutputOptions,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct Controller {
    client: WorkerClient,
    events: Arc<EventBus>,
    crop: CropSlot,
    picker: Box<dyn FilePicker>,
}

impl Controller {
    pub fn new(client: WorkerClient, picker: Box<dyn FilePicker>) -> Self {
        Self {
            client,
            events: Arc::new(EventBus::default()),
            crop: CropSlot::new(),
            picker,
        }
    }

    /// Controller spawning workers as described by `config`.
    pub fn from_config(config: &Config, picker: Box<dyn FilePicker>) -> Result<Self> {
        Ok(Self::new(WorkerClient::from_config(config)?, picker))
    }

    pub fn select_file(&self, filters: &[FileFilter]) -> Option<PathBuf> {
        self.picker.select_file(filters)
    }

    pub fn select_save_path(&self) -> Option<PathBuf> {
        self.picker.select_save_path()
    }

    /// Receive every progress event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// The shared crop settings, read once at the start of each run.
    pub fn crop_slot(&self) -> &CropSlot {
        &self.crop
    }

    /// Run one pipeline in a fresh worker.
    ///
    /// A crop given in `output_options` wins over the crop slot. Invalid
    /// requests fail without spawning anything.
    pub async fn process_video(
        &self,
        inputs: PipelineInputs,
        params: PipelineParams,
        mut output_options: OutputOptions,
    ) -> ProcessOutcome {
        if output_options.crop_settings.is_none() {
            output_options.crop_settings = self.crop.get();
        }
        let request = PipelineRequest {
            inputs,
            params,
            output_options,
        };

        let result = match request.validate() {
            Ok(()) => {
                let events = Arc::clone(&self.events);
                self.client
                    .run(&request, move |event| events.publish(event))
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            tracing::error!(kind = e.kind(), "processVideo failed: {e}");
        }
        ProcessOutcome::from(result)
    }

    /// Run a batch, one worker per item, sharing `common_params`.
    pub async fn process_video_batch(
        &self,
        items: &[BatchItem],
        common_params: &PipelineParams,
        output_options: &OutputOptions,
    ) -> BatchOutcome {
        let coordinator = BatchCoordinator::new(self.client.clone());
        let events = Arc::clone(&self.events);
        coordinator
            .run(
                items,
                common_params,
                output_options,
                self.crop.get(),
                move |event| events.publish(event),
            )
            .await
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("client", &self.client)
            .field("crop", &self.crop)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn no_picker_always_cancels() {
        assert_eq!(NoPicker.select_file(&[FileFilter::videos()]), None);
        assert_eq!(NoPicker.select_save_path(), None);
    }

    #[test]
    fn preset_picker_honours_filters() {
        let picker = PresetPicker::new(
            [PathBuf::from("/v/ref.PNG"), PathBuf::from("/v/a.mov")],
            Some(PathBuf::from("/out/final.mp4")),
        );
        assert_eq!(
            picker.select_file(&[FileFilter::videos()]),
            Some(PathBuf::from("/v/a.mov"))
        );
        assert_eq!(
            picker.select_file(&[FileFilter::videos()]),
            None
        );
        assert_eq!(
            picker.select_file(&[FileFilter::images()]),
            Some(PathBuf::from("/v/ref.PNG"))
        );
        assert_eq!(picker.select_save_path(), Some(PathBuf::from("/out/final.mp4")));
    }

    #[test]
    fn filter_matching_ignores_case() {
        assert!(FileFilter::videos().matches(Path::new("clip.MP4")));
        assert!(!FileFilter::videos().matches(Path::new("clip")));
    }

    #[test]
    fn batch_request_defaults() {
        let batch: BatchRequest = serde_json::from_str(
            r#"{"items":[{"inputs":{"sourceA":"a.mov","sourceB":"b.mp4"},"outputPath":"o.mp4"}]}"#,
        )
        .unwrap();
        assert_eq!(batch.items.len(), 1);
        assert_eq!(batch.params, PipelineParams::default());
        assert_eq!(batch.output_options.fps, 60);
    }
}
