//! # syncforge-av
//!
//! Media operations and scratch storage for the syncforge pipeline.
//!
//! - **Tool discovery** ([`ToolRegistry`]): ffmpeg, ffprobe and the Python
//!   interpreter that runs the analysis scripts.
//! - **Command execution** ([`ToolCommand`]): argv-only invocation with a
//!   per-call timeout and declared-output verification.
//! - **Scratch storage** ([`ScratchDir`], [`RunScratch`]): one isolated
//!   subdirectory per run with fixed artifact names and best-effort cleanup.
//! - **Probing** ([`probe`]): duration and stream layout via ffprobe.
//! - **Operations** ([`ops`]): crop, trim, alignment, audio extraction,
//!   loudness, colour matching, caption overlay, merge and final encode.

pub mod command;
pub mod ops;
pub mod probe;
pub mod scratch;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use ops::align::{AlignmentResult, Checkpoint};
pub use probe::MediaProbe;
pub use scratch::{Artifact, RunScratch, ScratchDir};
pub use tools::{ToolInfo, ToolRegistry};
