//! Shared test harness for integration tests.
//!
//! Provides [`Harness`], a temporary workspace with two recordings on disk
//! and a config whose worker is a `/bin/sh` script speaking the protocol.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use syncforge_core::{BatchItem, Config, OutputOptions, PipelineInputs};
use tempfile::TempDir;

/// A scripted worker: noise on stdout and stderr, `ready`, then after
/// `start` two progress events and `complete` for the requested output
/// path. Outputs whose path contains `FAILME` get through identify and a
/// skipped crop, then fail alignment with an `error` frame.
/// Each raw start frame is appended to `start_frames.log` next to the script.
pub const FAKE_WORKER: &str = r#"
echo "fake worker booting" >&2
echo "some unrelated stdout noise"
echo '{"type":"ready"}'
read -r line
printf '%s\n' "$line" >> "$(dirname "$0")/start_frames.log"
out=$(printf '%s\n' "$line" | sed -n 's/.*"outputPath":"\([^"]*\)".*/\1/p')
echo '{"type":"progress","stage":1,"progress":0,"message":"Identifying sources"}'
case "$out" in
  *FAILME*)
    echo '{"type":"progress","stage":1,"progress":100,"message":"Finished identify"}'
    echo '{"type":"progress","stage":2,"progress":0,"message":"Cropping"}'
    echo '{"type":"progress","stage":2,"progress":100,"message":"Skipped crop"}'
    echo '{"type":"progress","stage":3,"progress":0,"message":"Aligning audio"}'
    echo '{"type":"progress","stage":-1,"progress":0,"message":"Tool error [ffmpeg]: boom"}'
    echo '{"type":"error","error":"Tool error [ffmpeg]: boom","stack":"ExternalToolError: alignment extract failed"}'
    exit 1
    ;;
esac
printf '{"type":"progress","stage":1,'
printf '"progress":100,"message":"Finished identify"}\n'
: > "$out"
echo "{\"type\":\"complete\",\"outputPath\":\"$out\"}"
"#;

pub struct Harness {
    pub dir: TempDir,
    pub config: Config,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_worker(FAKE_WORKER)
    }

    pub fn with_worker(script: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IMG_0001.MOV"), b"a").unwrap();
        std::fs::write(dir.path().join("ScreenRecording_0001.MP4"), b"b").unwrap();

        let worker = dir.path().join("worker.sh");
        std::fs::write(&worker, script).unwrap();

        let mut config = Config::default();
        config.worker.program = Some(PathBuf::from("/bin/sh"));
        config.worker.args = vec![worker.display().to_string()];
        config.scratch.dir = dir.path().join("scratch");

        Self { dir, config }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn inputs(&self) -> PipelineInputs {
        PipelineInputs {
            source_a: self.path().join("IMG_0001.MOV"),
            source_b: self.path().join("ScreenRecording_0001.MP4"),
            reference_image: None,
            artist: "Artist".into(),
            title: "Song".into(),
        }
    }

    pub fn output_options(&self, name: &str) -> OutputOptions {
        OutputOptions {
            output_path: self.path().join(name),
            ..OutputOptions::default()
        }
    }

    pub fn item(&self, output: &str) -> BatchItem {
        BatchItem {
            inputs: self.inputs(),
            text_options: None,
            output_path: self.path().join(output),
        }
    }

    /// Start frames received by the scripted worker, in order.
    pub fn start_frames(&self) -> Vec<serde_json::Value> {
        std::fs::read_to_string(self.path().join("start_frames.log"))
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    /// Scratch run directories left behind.
    pub fn leftover_runs(&self) -> usize {
        std::fs::read_dir(&self.config.scratch.dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Write the config as TOML and return its path.
    pub fn write_config(&self) -> PathBuf {
        let path = self.path().join("syncforge.toml");
        std::fs::write(&path, toml_config(&self.config)).unwrap();
        path
    }
}

fn toml_config(config: &Config) -> String {
    format!(
        "[scratch]\ndir = {:?}\n\n[worker]\nprogram = {:?}\nargs = {:?}\n",
        config.scratch.dir.display().to_string(),
        config.worker.program.as_ref().unwrap().display().to_string(),
        config.worker.args,
    )
}
