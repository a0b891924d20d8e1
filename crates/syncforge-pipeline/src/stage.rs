//! The ten fixed pipeline stages.

use std::fmt;

/// One ordinal step of the pipeline. Ordinals run 1..=10 in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Identify = 1,
    Crop = 2,
    Align = 3,
    Trim = 4,
    ExtractAudio = 5,
    ColorCorrect = 6,
    FrameRate = 7,
    Loudness = 8,
    Overlay = 9,
    Encode = 10,
}

impl Stage {
    pub const ALL: [Stage; 10] = [
        Stage::Identify,
        Stage::Crop,
        Stage::Align,
        Stage::Trim,
        Stage::ExtractAudio,
        Stage::ColorCorrect,
        Stage::FrameRate,
        Stage::Loudness,
        Stage::Overlay,
        Stage::Encode,
    ];

    pub fn ordinal(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Identify => "identify",
            Stage::Crop => "crop",
            Stage::Align => "align",
            Stage::Trim => "trim",
            Stage::ExtractAudio => "extract-audio",
            Stage::ColorCorrect => "color-correct",
            Stage::FrameRate => "frame-rate",
            Stage::Loudness => "loudness",
            Stage::Overlay => "overlay",
            Stage::Encode => "encode",
        }
    }

    /// Only crop and colour correction may be skipped.
    pub fn is_optional(self) -> bool {
        matches!(self, Stage::Crop | Stage::ColorCorrect)
    }

    /// Message carried by the stage's `progress = 0` event.
    pub fn start_message(self) -> &'static str {
        match self {
            Stage::Identify => "Identifying source videos",
            Stage::Crop => "Cropping source A",
            Stage::Align => "Aligning audio tracks",
            Stage::Trim => "Trimming source A",
            Stage::ExtractAudio => "Extracting reference audio",
            Stage::ColorCorrect => "Matching colour to reference image",
            Stage::FrameRate => "Normalizing frame rate",
            Stage::Loudness => "Normalizing loudness",
            Stage::Overlay => "Rendering caption",
            Stage::Encode => "Merging and encoding final video",
        }
    }

    /// Message carried by the stage's `progress = 100` event.
    pub fn done_message(self, skipped: bool) -> String {
        if skipped {
            format!("Skipped {}", self.name())
        } else {
            format!("Finished {}", self.name())
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.ordinal(), Stage::ALL.len(), self.name())
    }
}
