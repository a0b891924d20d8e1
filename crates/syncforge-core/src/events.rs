//! Progress events and their broadcast bus.
//!
//! [`ProgressEvent`] is the point-in-time notification emitted around every
//! pipeline stage. [`EventBus`] wraps a `tokio::sync::broadcast` channel with
//! a bounded ring buffer of recent events so late subscribers can render the
//! latest state.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Stage number carried by the single terminal event of a failed run.
pub const FAILED_STAGE: i32 = -1;

/// Number of stages in one pipeline run.
pub const STAGE_COUNT: i32 = 10;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

/// Notification emitted before and after each stage, or once on failure.
///
/// `progress` is `0` before a stage and `100` after it. The failure event has
/// `stage == FAILED_STAGE` and `progress == 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub stage: i32,
    pub progress: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_item_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_item_count: Option<usize>,
}

impl ProgressEvent {
    /// Event emitted before a stage starts.
    pub fn started(stage: i32, message: impl Into<String>) -> Self {
        Self::new(stage, 0, message)
    }

    /// Event emitted after a stage completes.
    pub fn finished(stage: i32, message: impl Into<String>) -> Self {
        Self::new(stage, 100, message)
    }

    /// Terminal event of a failed run.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(FAILED_STAGE, 0, message)
    }

    pub fn new(stage: i32, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress,
            message: message.into(),
            warning: None,
            batch_item_index: None,
            batch_item_count: None,
        }
    }

    /// Attach a non-fatal warning for the UI to surface.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    /// Annotate the event with its position in a batch.
    pub fn with_batch(mut self, index: usize, count: usize) -> Self {
        self.batch_item_index = Some(index);
        self.batch_item_count = Some(count);
        self
    }

    pub fn is_failure(&self) -> bool {
        self.stage == FAILED_STAGE
    }

    /// Percentage of the current run that is complete, in `[0, 100]`.
    ///
    /// Each of the ten stages contributes an equal tenth.
    pub fn run_percent(&self) -> f64 {
        if self.is_failure() {
            return 0.0;
        }
        let stage = self.stage.clamp(1, STAGE_COUNT) - 1;
        (f64::from(stage) / f64::from(STAGE_COUNT)) * 100.0
            + f64::from(self.progress.min(100)) / f64::from(STAGE_COUNT)
    }

    /// Blended percentage across a batch:
    /// `(index / count) * 100 + run_percent / count`.
    ///
    /// Events outside a batch report their run percentage.
    pub fn overall_percent(&self) -> f64 {
        match (self.batch_item_index, self.batch_item_count) {
            (Some(index), Some(count)) if count > 0 => {
                let count = count as f64;
                (index as f64 / count) * 100.0 + self.run_percent() / count
            }
            _ => self.run_percent(),
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped progress event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub progress: ProgressEvent,
}

impl Event {
    pub fn new(progress: ProgressEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            progress,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus whose broadcast channel buffers `capacity`
    /// events per lagging subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn publish(&self, progress: ProgressEvent) {
        let event = Event::new(progress);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }

    /// The most recent event, which is what a latest-wins consumer renders.
    pub fn latest(&self) -> Option<Event> {
        self.recent.read().front().cloned()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
