// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! NDJSON frame encoding and line-buffered decoding.
//!
//! One frame per line. A frame may arrive split across transport chunks,
//! so the decoder buffers until a newline completes the line; a frame is
//! interpreted only when complete.

use crate::frame::Frame;

/// Encodes a frame as one NDJSON line, newline included.
pub fn encode_frame(frame: &Frame) -> String {
    let mut line = serde_json::to_string(frame).expect("frames serialize infallibly");
    line.push('\n');
    line
}

/// Reassembles frames from transport chunks.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every frame completed by it, in order.
    ///
    /// Lines that fail to parse are skipped. An incomplete trailing line
    /// stays buffered for the next chunk.
    pub fn push(&mut self, chunk: &str) -> Vec<Frame> {
        self.buffer.push_str(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Ok(frame) = serde_json::from_str::<Frame>(line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// True when a partial line is still buffered.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// Concatenates the text deltas of a frame sequence.
///
/// This must yield exactly the persisted assistant text.
pub fn strip_frames(frames: &[Frame]) -> String {
    frames
        .iter()
        .filter_map(|f| match f {
            Frame::Text { delta } => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_terminates_with_newline() {
        let line = encode_frame(&Frame::text("hi"));
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn decode_whole_lines() {
        let mut decoder = FrameDecoder::new();
        let chunk = format!(
            "{}{}",
            encode_frame(&Frame::text("Hello ")),
            encode_frame(&Frame::text("world"))
        );
        let frames = decoder.push(&chunk);
        assert_eq!(frames.len(), 2);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn decode_across_chunk_boundaries() {
        let mut decoder = FrameDecoder::new();
        let line = encode_frame(&Frame::activity("searching", Some("reel trends".into())));
        let (a, b) = line.split_at(line.len() / 2);

        assert!(decoder.push(a).is_empty());
        assert!(decoder.has_partial());

        let frames = decoder.push(b);
        assert_eq!(frames.len(), 1);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn decode_skips_malformed_lines() {
        let mut decoder = FrameDecoder::new();
        let chunk = format!("not json\n{}", encode_frame(&Frame::text("ok")));
        let frames = decoder.push(&chunk);
        assert_eq!(frames, vec![Frame::text("ok")]);
    }

    #[test]
    fn strip_frames_recovers_exact_text() {
        let frames = vec![
            Frame::SearchMetadata {
                performed: false,
                query: None,
                citations: vec![],
            },
            Frame::text("Three reel ideas"),
            Frame::activity_cleared(),
            Frame::text(" for your bakery:"),
            Frame::MessageId {
                id: "m1".into(),
                correlation_key: None,
            },
        ];
        assert_eq!(strip_frames(&frames), "Three reel ideas for your bakery:");
    }

    #[test]
    fn encode_decode_strip_equivalence() {
        let frames = vec![
            Frame::activity("thinking", None),
            Frame::text("Start "),
            Frame::text("middle "),
            Frame::ProfileUpdated {
                updated_fields: vec![],
                completeness: 0.0,
                capped_fields: vec![],
            },
            Frame::text("end."),
        ];

        // Feed re-chunked bytes through the decoder.
        let encoded: String = frames.iter().map(encode_frame).collect();
        let mut decoder = FrameDecoder::new();
        let mut decoded = Vec::new();
        for chunk in encoded.as_bytes().chunks(7) {
            decoded.extend(decoder.push(std::str::from_utf8(chunk).unwrap()));
        }

        assert_eq!(decoded, frames);
        assert_eq!(strip_frames(&decoded), "Start middle end.");
    }
}
