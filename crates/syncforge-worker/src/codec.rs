//! Newline-delimited JSON framing for [`WorkerMessage`]s.
//!
//! Each frame is one UTF-8 JSON object followed by `\n`. Partial lines stay
//! buffered until their newline arrives. Anything that is not a protocol
//! message is logged and skipped so a noisy child cannot break the stream:
//! blank lines and non-JSON text at debug, JSON objects that do not match a
//! [`WorkerMessage`] at warn.

use bytes::{BufMut, BytesMut};
use serde_json::Value;
use syncforge_core::{Error, Result};
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::message::WorkerMessage;

/// Longest accepted line. Longer lines are discarded up to their newline.
pub const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

#[derive(Debug)]
pub struct MessageCodec {
    lines: LinesCodec,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        }
    }

    fn next_message(
        &mut self,
        src: &mut BytesMut,
        eof: bool,
    ) -> Result<Option<WorkerMessage>> {
        loop {
            let line = if eof {
                self.lines.decode_eof(src)
            } else {
                self.lines.decode(src)
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None),
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    tracing::warn!("Discarding protocol line longer than {MAX_LINE_LENGTH} bytes");
                    continue;
                }
                Err(LinesCodecError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                    tracing::debug!("Skipping non UTF-8 line");
                    continue;
                }
                Err(LinesCodecError::Io(e)) => return Err(e.into()),
            };
            if let Some(message) = parse_line(&line) {
                return Ok(Some(message));
            }
        }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Interpret one line, returning `None` for anything that is not a message.
pub fn parse_line(line: &str) -> Option<WorkerMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let value = match serde_json::from_str::<Value>(line) {
        Ok(value @ Value::Object(_)) => value,
        _ => {
            tracing::debug!("Skipping non-protocol line: {line}");
            return None;
        }
    };

    match serde_json::from_value::<WorkerMessage>(value) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!("Skipping invalid protocol message ({e}): {line}");
            None
        }
    }
}

impl Decoder for MessageCodec {
    type Item = WorkerMessage;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<WorkerMessage>> {
        self.next_message(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<WorkerMessage>> {
        self.next_message(src, true)
    }
}

impl Encoder<WorkerMessage> for MessageCodec {
    type Error = Error;

    fn encode(&mut self, item: WorkerMessage, dst: &mut BytesMut) -> Result<()> {
        <Self as Encoder<&WorkerMessage>>::encode(self, &item, dst)
    }
}

impl Encoder<&WorkerMessage> for MessageCodec {
    type Error = Error;

    fn encode(&mut self, item: &WorkerMessage, dst: &mut BytesMut) -> Result<()> {
        let json = serde_json::to_vec(item)
            .map_err(|e| Error::Protocol(format!("cannot encode {} message: {e}", item.kind())))?;
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn decode_all(codec: &mut MessageCodec, buf: &mut BytesMut) -> Vec<WorkerMessage> {
        let mut out = Vec::new();
        while let Some(msg) = codec.decode(buf).unwrap() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn encodes_one_object_per_line() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(WorkerMessage::Ready, &mut buf).unwrap();
        codec
            .encode(
                &WorkerMessage::Complete {
                    output_path: PathBuf::from("/out/a.mp4"),
                },
                &mut buf,
            )
            .unwrap();
        assert_eq!(
            &buf[..],
            b"{\"type\":\"ready\"}\n{\"type\":\"complete\",\"outputPath\":\"/out/a.mp4\"}\n"
        );
    }

    #[test]
    fn partial_lines_wait_for_their_newline() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::from(&b"{\"type\":\"pro"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"gress\",\"stage\":2,\"progress\":0,\"message\":\"Cropping\"}\n{\"type\":");
        let msgs = decode_all(&mut codec, &mut buf);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].kind(), "progress");

        buf.extend_from_slice(b"\"ready\"}\n");
        assert_eq!(decode_all(&mut codec, &mut buf), vec![WorkerMessage::Ready]);
    }

    #[test]
    fn split_writes_byte_by_byte() {
        let wire = b"{\"type\":\"ready\"}\n{\"type\":\"error\",\"error\":\"boom\"}\n";
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        let mut msgs = Vec::new();
        for byte in wire {
            buf.put_u8(*byte);
            msgs.extend(decode_all(&mut codec, &mut buf));
        }
        assert_eq!(
            msgs,
            vec![
                WorkerMessage::Ready,
                WorkerMessage::Error {
                    error: "boom".into(),
                    stack: None
                }
            ]
        );
    }

    #[test]
    fn noise_lines_are_skipped() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::from(
            &b"\n   \nffmpeg version 6.1\n[1,2,3]\n\"text\"\n{\"type\":\"bogus\"}\n{\"type\":\"progress\"}\n{\"type\":\"ready\"}\r\n"[..],
        );
        assert_eq!(decode_all(&mut codec, &mut buf), vec![WorkerMessage::Ready]);
        assert!(buf.is_empty());
    }

    #[test]
    fn invalid_utf8_is_skipped() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::from(&b"\xff\xfe garbage\n{\"type\":\"ready\"}\n"[..]);
        assert_eq!(decode_all(&mut codec, &mut buf), vec![WorkerMessage::Ready]);
    }

    #[test]
    fn trailing_line_without_newline_is_read_at_eof() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::from(&b"{\"type\":\"complete\",\"outputPath\":\"/o.mp4\"}"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        let msg = codec.decode_eof(&mut buf).unwrap();
        assert_eq!(
            msg,
            Some(WorkerMessage::Complete {
                output_path: PathBuf::from("/o.mp4")
            })
        );
    }
}
