//! Benchmarks for tool output parsing
//!
//! Tests parsing of ffprobe JSON, the alignment script's stdout and the
//! loudnorm measurement block printed by ffmpeg.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use syncforge_av::ops::align::parse_alignment_output;
use syncforge_av::ops::audio::parse_loudnorm_output;
use syncforge_av::probe::parse_probe_json;

/// Sample ffprobe JSON output for a phone recording
const FFPROBE_PHONE: &str = r#"{
    "streams": [
        {
            "index": 0,
            "codec_type": "video",
            "codec_name": "hevc",
            "width": 1080,
            "height": 1920,
            "r_frame_rate": "30000/1001",
            "duration": "184.216667"
        },
        {
            "index": 1,
            "codec_type": "audio",
            "codec_name": "aac",
            "channels": 2,
            "sample_rate": "48000",
            "duration": "184.213333"
        },
        {
            "index": 2,
            "codec_type": "data",
            "codec_name": "none"
        }
    ],
    "format": {
        "filename": "/videos/IMG_0420.MOV",
        "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
        "duration": "184.216667",
        "size": "402653184"
    }
}"#;

/// Alignment script stdout: progress chatter, then the marker and result.
fn alignment_stdout() -> String {
    let mut out = String::new();
    for i in 0..200 {
        out.push_str(&format!("checkpoint {i}: correlating window...\n"));
    }
    out.push_str("=== JSON OUTPUT ===\n");
    out.push_str(
        r#"{"offset": 2.345, "confidence": 0.91, "quality": "excellent", "method": "multi_checkpoint",
            "checkpoints": [
              {"position_name": "start", "offset": 2.344, "confidence": 0.93, "quality": "excellent"},
              {"position_name": "middle", "offset": 2.346, "confidence": 0.90, "quality": "excellent"},
              {"position_name": "end", "offset": 2.345, "confidence": 0.89, "quality": "good"}
            ]}"#,
    );
    out
}

const LOUDNORM_STDERR: &str = r#"
[Parsed_loudnorm_0 @ 0x55d0c8e3a2c0]
{
	"input_i" : "-23.54",
	"input_tp" : "-4.12",
	"input_lra" : "6.30",
	"input_thresh" : "-33.80",
	"output_i" : "-14.02",
	"output_tp" : "-1.00",
	"output_lra" : "5.10",
	"output_thresh" : "-24.21",
	"normalization_type" : "dynamic",
	"target_offset" : "0.02"
}
"#;

fn bench_parsing(c: &mut Criterion) {
    let alignment = alignment_stdout();

    c.bench_function("parse_ffprobe_phone", |b| {
        b.iter(|| parse_probe_json(black_box(FFPROBE_PHONE)).unwrap())
    });
    c.bench_function("parse_alignment_output", |b| {
        b.iter(|| parse_alignment_output(black_box(&alignment)).unwrap())
    });
    c.bench_function("parse_loudnorm_output", |b| {
        b.iter(|| parse_loudnorm_output(black_box(LOUDNORM_STDERR)).unwrap())
    });
}

criterion_group!(benches, bench_parsing);
criterion_main!(benches);
