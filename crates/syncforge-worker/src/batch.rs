//! Sequential batch execution with per-item isolation.

use syncforge_core::{
    BatchItem, BatchItemResult, BatchOutcome, CropSettings, OutputOptions, PipelineParams,
    PipelineRequest, ProgressEvent,
};

use crate::client::WorkerClient;

/// Runs batch items one after another, each in its own worker.
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    client: WorkerClient,
}

impl BatchCoordinator {
    pub fn new(client: WorkerClient) -> Self {
        Self { client }
    }

    /// Run every item in input order.
    ///
    /// A failing item is recorded and the batch moves on; the outcome is
    /// successful when at least one item succeeded. Progress events are
    /// tagged with the item's index and the batch size.
    pub async fn run<F>(
        &self,
        items: &[BatchItem],
        common_params: &PipelineParams,
        output_options: &OutputOptions,
        crop: Option<CropSettings>,
        mut on_progress: F,
    ) -> BatchOutcome
    where
        F: FnMut(ProgressEvent) + Send,
    {
        let count = items.len();
        let mut results = Vec::with_capacity(count);

        for (index, item) in items.iter().enumerate() {
            let request = PipelineRequest::for_batch_item(item, common_params, output_options, crop);
            tracing::info!(
                "Batch item {}/{count}: {}",
                index + 1,
                request.output_options.output_path.display()
            );

            let outcome = match request.validate() {
                Ok(()) => {
                    self.client
                        .run(&request, |event| on_progress(event.with_batch(index, count)))
                        .await
                }
                Err(e) => Err(e),
            };

            results.push(match outcome {
                Ok(path) => BatchItemResult::succeeded(path),
                Err(e) => {
                    tracing::warn!(kind = e.kind(), "Batch item {} failed: {e}", index + 1);
                    BatchItemResult::failed(&e)
                }
            });
        }

        let outcome = BatchOutcome::from_results(results);
        tracing::info!(
            "Batch finished: {}/{count} succeeded",
            outcome.success_count()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{script_client, FAKE_WORKER};
    use std::path::Path;
    use syncforge_core::PipelineInputs;

    fn item(dir: &Path, output: &str) -> BatchItem {
        let a = dir.join("IMG_1.MOV");
        let b = dir.join("ScreenRecording_1.MP4");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();
        BatchItem {
            inputs: PipelineInputs {
                source_a: a,
                source_b: b,
                reference_image: None,
                artist: "Artist".into(),
                title: "Song".into(),
            },
            text_options: None,
            output_path: dir.join(output),
        }
    }

    #[tokio::test]
    async fn middle_failure_does_not_stop_the_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let coordinator = BatchCoordinator::new(script_client(tmp.path(), FAKE_WORKER));
        let items = vec![
            item(tmp.path(), "one.mp4"),
            item(tmp.path(), "FAILME.mp4"),
            item(tmp.path(), "three.mp4"),
        ];
        let mut events = Vec::new();

        let outcome = coordinator
            .run(
                &items,
                &PipelineParams::default(),
                &OutputOptions::default(),
                None,
                |e| events.push(e),
            )
            .await;

        assert!(outcome.success);
        let flags: Vec<bool> = outcome.results.iter().map(|r| r.success).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert_eq!(outcome.results[1].error.as_deref(), Some("boom"));
        assert_eq!(outcome.results[2].output_path.as_deref(), Some(tmp.path().join("three.mp4").as_path()));

        assert!(events.iter().all(|e| e.batch_item_count == Some(3)));
        let indices: Vec<usize> = events.iter().filter_map(|e| e.batch_item_index).collect();
        assert!(indices.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(indices.first(), Some(&0));
        assert_eq!(indices.last(), Some(&2));
    }

    #[tokio::test]
    async fn invalid_items_fail_without_spawning() {
        let tmp = tempfile::tempdir().unwrap();
        let coordinator = BatchCoordinator::new(script_client(tmp.path(), "exit 9\n"));
        let mut bad = item(tmp.path(), "out.mp4");
        bad.inputs.source_a = tmp.path().join("missing.mov");

        let outcome = coordinator
            .run(
                &[bad],
                &PipelineParams::default(),
                &OutputOptions::default(),
                None,
                |_| {},
            )
            .await;

        assert!(!outcome.success);
        assert!(outcome.results[0].error.as_deref().unwrap().starts_with("Validation error"));
    }
}
