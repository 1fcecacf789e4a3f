// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn sink: the write side of a turn's outbound stream.
//!
//! Frames are encoded eagerly and handed to a bounded channel whose read
//! side becomes the HTTP response body, one chunk per frame, so each frame
//! is flushed as soon as the transport accepts it. A dropped receiver means
//! the client disconnected; writes report that instead of erroring so the
//! turn can wind down cleanly.

use tokio::sync::mpsc;
use tracing::debug;

use crate::codec::encode_frame;
use crate::frame::Frame;

/// Frames buffered before backpressure applies.
const SINK_DEPTH: usize = 256;

/// Creates a connected sink/receiver pair for one turn.
pub fn turn_channel() -> (TurnSink, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(SINK_DEPTH);
    (TurnSink { tx }, rx)
}

/// Write side of a turn's outbound frame stream.
#[derive(Clone)]
pub struct TurnSink {
    tx: mpsc::Sender<String>,
}

impl TurnSink {
    /// Sends one frame. Returns `false` when the client has disconnected.
    pub async fn send(&self, frame: Frame) -> bool {
        match self.tx.send(encode_frame(&frame)).await {
            Ok(()) => true,
            Err(_) => {
                debug!("client disconnected, frame dropped");
                false
            }
        }
    }

    /// True when the client has disconnected.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
