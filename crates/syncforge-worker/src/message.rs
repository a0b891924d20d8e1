//! Messages exchanged between the controller and a worker process.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use syncforge_core::{Error, PipelineRequest, ProgressEvent};

/// One protocol frame, internally tagged by `type`.
///
/// ```json
/// {"type":"ready"}
/// {"type":"start","payload":{...}}
/// {"type":"progress","stage":3,"progress":100,"message":"Finished align"}
/// {"type":"complete","outputPath":"/out/final.mp4"}
/// {"type":"error","error":"...","stack":"..."}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum WorkerMessage {
    /// Worker is initialised and waiting for `start`.
    Ready,
    /// Controller hands over the request. Sent once, after `ready`.
    Start { payload: PipelineRequest },
    Progress {
        stage: i32,
        progress: u8,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    /// Run succeeded; terminal.
    Complete { output_path: PathBuf },
    /// Run failed; terminal.
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
}

impl WorkerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerMessage::Ready => "ready",
            WorkerMessage::Start { .. } => "start",
            WorkerMessage::Progress { .. } => "progress",
            WorkerMessage::Complete { .. } => "complete",
            WorkerMessage::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerMessage::Complete { .. } | WorkerMessage::Error { .. })
    }

    /// The `error` frame reporting `err`. The stack carries the error kind
    /// and its debug rendering.
    pub fn failure(err: &Error) -> Self {
        WorkerMessage::Error {
            error: err.to_string(),
            stack: Some(err.diagnostic()),
        }
    }

    /// Convert a `progress` frame back into an event.
    pub fn into_progress_event(self) -> Option<ProgressEvent> {
        match self {
            WorkerMessage::Progress {
                stage,
                progress,
                message,
                warning,
            } => {
                let event = ProgressEvent::new(stage, progress, message);
                Some(match warning {
                    Some(w) => event.with_warning(w),
                    None => event,
                })
            }
            _ => None,
        }
    }
}

impl From<ProgressEvent> for WorkerMessage {
    fn from(event: ProgressEvent) -> Self {
        WorkerMessage::Progress {
            stage: event.stage,
            progress: event.progress,
            message: event.message,
            warning: event.warning,
        }
    }
}
