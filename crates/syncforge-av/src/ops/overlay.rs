//! Caption burn-in through the external text-rendering script.
//!
//! The caption and its styling are base64-encoded so that arbitrary text
//! (quotes, newlines, non-ASCII) survives process-argument handling.

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use syncforge_core::{Error, Result, TextOptions};

use crate::command::ToolCommand;

/// Base64 of the UTF-8 caption.
pub fn encode_text(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Base64 of the styling options as camelCase JSON, without the caption.
pub fn encode_options(options: &TextOptions) -> Result<String> {
    let styling = TextOptions {
        custom_text: None,
        ..options.clone()
    };
    let json = serde_json::to_string(&styling)
        .map_err(|e| Error::Internal(format!("failed to encode text options: {e}")))?;
    Ok(STANDARD.encode(json.as_bytes()))
}

/// Build `python -X utf8 <script> <input> <output> <text64> <options64>`.
pub fn overlay_command(
    python: &Path,
    script: &Path,
    input: &Path,
    output: &Path,
    text: &str,
    options: &TextOptions,
    timeout: Duration,
) -> Result<ToolCommand> {
    let mut cmd = ToolCommand::new(python.to_path_buf());
    cmd.args(["-X", "utf8"]);
    cmd.path_arg(script).path_arg(input).path_arg(output);
    cmd.arg(encode_text(text)).arg(encode_options(options)?);
    cmd.env("PYTHONIOENCODING", "utf-8");
    cmd.expect_output(output).timeout(timeout);
    Ok(cmd)
}

pub async fn overlay_text(
    python: &Path,
    script: &Path,
    input: &Path,
    output: &Path,
    text: &str,
    options: &TextOptions,
    timeout: Duration,
) -> Result<()> {
    tracing::info!("overlay caption {text:?} on {}", input.display());
    overlay_command(python, script, input, output, text, options, timeout)?
        .execute()
        .await?;
    Ok(())
}
