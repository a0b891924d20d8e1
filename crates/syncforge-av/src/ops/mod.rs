//! One function per external media operation.
//!
//! Each operation has a `*_command` builder that only assembles the
//! argument vector (so argv can be tested without ffmpeg installed) and an
//! async runner that executes it and verifies the declared output.

pub mod align;
pub mod audio;
pub mod color;
pub mod encode;
pub mod overlay;
pub mod video;

/// AAC settings shared by every stage that writes audio.
pub(crate) const AAC_ARGS: [&str; 6] = ["-c:a", "aac", "-b:a", "320k", "-ar", "48000"];

/// Format seconds for ffmpeg time options.
pub(crate) fn secs(value: f64) -> String {
    format!("{value:.3}")
}
