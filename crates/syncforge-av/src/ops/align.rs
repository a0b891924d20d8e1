//! Invocation of the offline audio-alignment script and parsing of its
//! marker-delimited result block.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use syncforge_core::{Error, Result};

use crate::command::ToolCommand;

/// Line that precedes the machine-readable result on the script's stdout.
pub const JSON_MARKER: &str = "=== JSON OUTPUT ===";

/// Below this confidence a result is applied but flagged to the user.
pub const LOW_CONFIDENCE: f64 = 0.5;

/// Result of the alignment operation.
///
/// `offset_seconds > 0` means source A lags source B.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentResult {
    #[serde(rename = "offset")]
    pub offset_seconds: f64,
    pub confidence: f64,
    #[serde(default)]
    pub quality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
}

/// One of the positions the script measured the offset at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub position_name: String,
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub quality: String,
}

impl AlignmentResult {
    pub fn is_low_confidence(&self) -> bool {
        self.confidence < LOW_CONFIDENCE
    }
}

/// Extract the result that follows [`JSON_MARKER`] in `stdout`.
///
/// Free-form logging before the marker, and anything after the JSON object,
/// is ignored.
pub fn parse_alignment_output(stdout: &str) -> Result<AlignmentResult> {
    let Some(marker) = stdout.rfind(JSON_MARKER) else {
        return Err(Error::tool(
            "align",
            format!("no '{JSON_MARKER}' block in output:\n{}", stdout.trim()),
        ));
    };
    let after = stdout[marker + JSON_MARKER.len()..].trim_start();

    let mut stream = serde_json::Deserializer::from_str(after).into_iter::<AlignmentResult>();
    let result = match stream.next() {
        Some(Ok(result)) => result,
        Some(Err(e)) => {
            return Err(Error::tool(
                "align",
                format!("invalid result after marker: {e}\n{}", after.trim()),
            ))
        }
        None => return Err(Error::tool("align", "empty result after marker")),
    };

    if !result.offset_seconds.is_finite() || !(0.0..=1.0).contains(&result.confidence) {
        return Err(Error::tool(
            "align",
            format!(
                "result out of range: offset={} confidence={}",
                result.offset_seconds, result.confidence
            ),
        ));
    }
    Ok(result)
}

/// Build `python <script> <audioA> <audioB> <duration> <mode>`.
pub fn alignment_command(
    python: &Path,
    script: &Path,
    audio_a: &Path,
    audio_b: &Path,
    duration: f64,
    mode: &str,
    timeout: Duration,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(python.to_path_buf());
    cmd.path_arg(script).path_arg(audio_a).path_arg(audio_b);
    cmd.arg(duration.to_string()).arg(mode);
    cmd.env("PYTHONIOENCODING", "utf-8");
    cmd.timeout(timeout);
    cmd
}

/// Run the alignment script and parse its result.
pub async fn align(
    python: &Path,
    script: &Path,
    audio_a: &Path,
    audio_b: &Path,
    duration: f64,
    mode: &str,
    timeout: Duration,
) -> Result<AlignmentResult> {
    tracing::info!("align {} against {} over {duration:.2}s ({mode})", audio_a.display(), audio_b.display());
    let output = alignment_command(python, script, audio_a, audio_b, duration, mode, timeout)
        .execute()
        .await?;
    if !output.stderr.trim().is_empty() {
        tracing::debug!(target: "align", "{}", output.stderr.trim());
    }
    let result = parse_alignment_output(&output.stdout)?;
    tracing::info!(
        offset = result.offset_seconds,
        confidence = result.confidence,
        quality = %result.quality,
        checkpoints = result.checkpoints.len(),
        "alignment complete"
    );
    Ok(result)
}
