//! Worker side of the protocol.
//!
//! A worker is a fresh process that serves exactly one request: it announces
//! `ready`, waits for `start`, runs the stage sequencer while forwarding
//! every progress event, and finishes with `complete` or `error`. Stdout
//! carries protocol frames only.

use std::path::PathBuf;

use futures::{SinkExt, StreamExt};
use syncforge_av::ScratchDir;
use syncforge_core::{Config, Error, PipelineRequest, Result, RunId};
use syncforge_pipeline::{MediaOps, ProgressSender, StageSequencer, ToolMedia};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::codec::MessageCodec;
use crate::message::WorkerMessage;

/// Serve one request over `input`/`output` with the real media tools.
///
/// Returns the run's outcome after the terminal frame has been written.
/// Callers map `Ok` to exit status 0 and `Err` to 1.
pub async fn serve<R, W>(input: R, output: W, config: &Config, run_id: RunId) -> Result<PathBuf>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let sequencer = StageSequencer::new(
        ToolMedia::from_config(config),
        config.identify.reference_marker.clone(),
    );
    let scratch = ScratchDir::new(&config.scratch.dir);
    serve_with(input, output, &sequencer, &scratch, run_id).await
}

/// [`serve`] with an explicit sequencer and scratch root.
pub async fn serve_with<R, W, M>(
    input: R,
    output: W,
    sequencer: &StageSequencer<M>,
    scratch: &ScratchDir,
    run_id: RunId,
) -> Result<PathBuf>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    M: MediaOps,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let (written, outcome) = tokio::join!(
        write_frames(output, rx),
        drive(input, tx, sequencer, scratch, run_id)
    );
    written?;
    outcome
}

async fn write_frames<W>(output: W, mut rx: mpsc::UnboundedReceiver<WorkerMessage>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(output, MessageCodec::new());
    while let Some(message) = rx.recv().await {
        sink.send(message).await?;
    }
    SinkExt::<WorkerMessage>::close(&mut sink).await
}

async fn drive<R, M>(
    input: R,
    tx: mpsc::UnboundedSender<WorkerMessage>,
    sequencer: &StageSequencer<M>,
    scratch: &ScratchDir,
    run_id: RunId,
) -> Result<PathBuf>
where
    R: AsyncRead + Unpin,
    M: MediaOps,
{
    let emit = |message: WorkerMessage| {
        if tx.send(message).is_err() {
            tracing::warn!("Protocol writer closed; dropping frame");
        }
    };

    emit(WorkerMessage::Ready);
    tracing::debug!(run = %run_id, "worker ready");

    let result = async {
        let request = wait_for_start(input).await?;
        let run = scratch.run(run_id)?;
        let progress_tx = tx.clone();
        let progress = ProgressSender::new(move |event| {
            let _ = progress_tx.send(WorkerMessage::from(event));
        });
        sequencer.run(&request, &run, &progress).await
    }
    .await;

    match &result {
        Ok(path) => emit(WorkerMessage::Complete {
            output_path: path.clone(),
        }),
        Err(e) => emit(WorkerMessage::failure(e)),
    }
    result
}

async fn wait_for_start<R>(input: R) -> Result<PipelineRequest>
where
    R: AsyncRead + Unpin,
{
    let mut frames = FramedRead::new(input, MessageCodec::new());
    while let Some(frame) = frames.next().await {
        match frame? {
            WorkerMessage::Start { payload } => return Ok(payload),
            other => tracing::warn!("Ignoring '{}' message while waiting for start", other.kind()),
        }
    }
    Err(Error::Protocol(
        "controller closed the channel before sending start".into(),
    ))
}
