//! Progress reporting handle shared by the sequencer and its callers.

use syncforge_core::ProgressEvent;

use crate::stage::Stage;

/// Sender for reporting stage progress.
///
/// Wraps a callback that receives every [`ProgressEvent`] in emission order.
pub struct ProgressSender {
    callback: Box<dyn Fn(ProgressEvent) + Send + Sync>,
}

impl ProgressSender {
    pub fn new(callback: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a sender that discards all events.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_| {}),
        }
    }

    pub fn send(&self, event: ProgressEvent) {
        tracing::debug!(
            stage = event.stage,
            progress = event.progress,
            "{}",
            event.message
        );
        (self.callback)(event);
    }

    pub fn stage_started(&self, stage: Stage) {
        tracing::info!("[{stage}] {}", stage.start_message());
        self.send(ProgressEvent::started(stage.ordinal(), stage.start_message()));
    }

    pub fn stage_finished(&self, stage: Stage, skipped: bool, warning: Option<String>) {
        let mut event = ProgressEvent::finished(stage.ordinal(), stage.done_message(skipped));
        if let Some(warning) = warning {
            tracing::warn!("[{stage}] {warning}");
            event = event.with_warning(warning);
        }
        self.send(event);
    }

    pub fn run_failed(&self, message: impl Into<String>) {
        self.send(ProgressEvent::failed(message));
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn forwards_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sender = ProgressSender::new(move |e| sink.lock().push((e.stage, e.progress)));

        sender.stage_started(Stage::Crop);
        sender.stage_finished(Stage::Crop, true, None);
        sender.run_failed("boom");

        assert_eq!(*seen.lock(), vec![(2, 0), (2, 100), (-1, 0)]);
    }

    #[test]
    fn warning_is_attached_to_finish_event() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let sender = ProgressSender::new(move |e| *sink.lock() = Some(e));

        sender.stage_finished(Stage::Align, false, Some("low confidence".into()));
        let event = seen.lock().clone().unwrap();
        assert_eq!(event.warning.as_deref(), Some("low confidence"));
        assert_eq!(event.message, "Finished align");
    }
}
