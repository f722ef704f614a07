//! The batcher and backpressure channel.
//!
//! Bridges the synchronous [`crate::assembler::AssemblerState`] to an async
//! consumer: completed placemarks are handed over in batches over a bounded
//! `tokio::sync::mpsc` channel, and the parser suspends after each non-final
//! batch until the consumer acknowledges it over a matching `oneshot`. This
//! is the same send-then-await-ack shape `meridian-stream`'s channel
//! machinery uses for its own pub/sub fan-out, adapted here to a single
//! producer/single consumer rendezvous instead of a broadcast.

use std::collections::VecDeque;
use std::fmt;

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::{KmlStreamError, Result};
use crate::geometry::Placemark;

/// Correlation token for one parse run. Unforgeable by construction (backed
/// by a random v4 UUID), so a consumer holding handles from more than one
/// parse — or a stale handle from a finished one — can tell messages apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(Uuid);

impl StreamId {
    /// Mints a fresh, random stream id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A message sent from the parser task to the consumer.
#[derive(Debug)]
pub enum ParseMessage {
    /// A batch of completed placemarks, in document order.
    Batch {
        /// The parse run this batch belongs to.
        stream_id: StreamId,
        /// The placemarks, in document order.
        placemarks: Vec<Placemark>,
        /// Acknowledgment sender. `None` only for the terminal flush sent
        /// alongside `Done`, where there is nothing left to unblock.
        ack: Option<oneshot::Sender<()>>,
    },
    /// Terminal success: no more messages will follow for this `stream_id`.
    Done {
        /// The parse run that finished.
        stream_id: StreamId,
    },
    /// Terminal failure: no more messages will follow for this `stream_id`.
    Error {
        /// The parse run that failed.
        stream_id: StreamId,
        /// A rendered description of the failure.
        message: String,
    },
}

/// Drives the flush side of the backpressure protocol for one parse run.
///
/// Owned by the parser task; never cloned or shared, since only one task
/// ever flushes a given `stream_id`.
pub struct Batcher {
    stream_id: StreamId,
    batch_size: usize,
    tx: mpsc::Sender<ParseMessage>,
}

impl Batcher {
    /// Creates a batcher for `stream_id`, sending on `tx`, flushing whenever
    /// the pending queue exceeds `batch_size`.
    pub fn new(stream_id: StreamId, batch_size: usize, tx: mpsc::Sender<ParseMessage>) -> Self {
        Self {
            stream_id,
            batch_size,
            tx,
        }
    }

    /// The stream id this batcher tags every message with.
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Flushes `emit` if it has grown past `batch_size`, then awaits the
    /// consumer's ack before returning. A no-op if the queue hasn't crossed
    /// the threshold.
    ///
    /// A dropped ack oneshot (the consumer went away mid-batch) is treated
    /// the same as a received ack: the parser keeps going on a best-effort
    /// basis rather than hanging. A closed mpsc sender (the consumer dropped
    /// its handle entirely) surfaces as [`KmlStreamError::ConsumerGone`],
    /// which ends the parser task.
    pub async fn maybe_flush(&self, emit: &mut VecDeque<Placemark>) -> Result<()> {
        if emit.len() <= self.batch_size {
            return Ok(());
        }
        let placemarks: Vec<Placemark> = emit.drain(..).collect();
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(ParseMessage::Batch {
                stream_id: self.stream_id,
                placemarks,
                ack: Some(ack_tx),
            })
            .await
            .map_err(|_| KmlStreamError::ConsumerGone)?;
        // A dropped sender resolves this to Err; either way, proceed.
        let _ = ack_rx.await;
        Ok(())
    }

    /// Sends whatever remains in `emit` (possibly nothing) as a final batch
    /// with no ack, immediately followed by `Done`. Called exactly once, at
    /// `end_document`.
    pub async fn final_flush(&self, emit: &mut VecDeque<Placemark>) -> Result<()> {
        let placemarks: Vec<Placemark> = emit.drain(..).collect();
        self.tx
            .send(ParseMessage::Batch {
                stream_id: self.stream_id,
                placemarks,
                ack: None,
            })
            .await
            .map_err(|_| KmlStreamError::ConsumerGone)?;
        self.tx
            .send(ParseMessage::Done {
                stream_id: self.stream_id,
            })
            .await
            .map_err(|_| KmlStreamError::ConsumerGone)?;
        Ok(())
    }

    /// Sends a terminal `Error` message describing `err`. Best-effort: if
    /// the consumer is already gone there is nothing more to do.
    pub async fn send_error(&self, err: &KmlStreamError) {
        let _ = self
            .tx
            .send(ParseMessage::Error {
                stream_id: self.stream_id,
                message: err.to_string(),
            })
            .await;
    }
}
