// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Framed stream multiplexing for the Crevio assistant pipeline.
//!
//! One ordered NDJSON byte stream carries visible reply text and four
//! control event categories (activity, search metadata, message id,
//! profile updated). Frames are atomic: the decoder interprets a frame
//! only once its line is complete, regardless of transport chunking.

pub mod codec;
pub mod frame;
pub mod sink;

pub use codec::{encode_frame, strip_frames, FrameDecoder};
pub use frame::{CappedNotice, Frame};
pub use sink::{turn_channel, TurnSink};
