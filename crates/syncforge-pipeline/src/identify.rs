//! Role assignment for the two raw inputs.

use std::path::{Path, PathBuf};

use syncforge_core::{Error, PipelineInputs, Result};

/// The inputs after role assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoles {
    /// Subject recording whose video is kept.
    pub a: PathBuf,
    /// Reference recording whose audio is kept.
    pub b: PathBuf,
}

fn is_reference(path: &Path, marker: &str) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().contains(marker))
        .unwrap_or(false)
}

/// Classify the inputs: the one whose file name contains `marker` is B.
///
/// Fails with [`Error::Identification`] when neither or both match.
pub fn identify_sources(inputs: &PipelineInputs, marker: &str) -> Result<SourceRoles> {
    let first = &inputs.source_a;
    let second = &inputs.source_b;

    match (is_reference(first, marker), is_reference(second, marker)) {
        (false, true) => Ok(SourceRoles {
            a: first.clone(),
            b: second.clone(),
        }),
        (true, false) => Ok(SourceRoles {
            a: second.clone(),
            b: first.clone(),
        }),
        (true, true) => Err(Error::Identification(format!(
            "both inputs contain '{marker}' in their file name; cannot tell which one is the reference recording"
        ))),
        (false, false) => Err(Error::Identification(format!(
            "neither input contains '{marker}' in its file name; cannot find the reference recording"
        ))),
    }
}
