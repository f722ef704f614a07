//! Public API: `events()`, `stream()`, `ParseHandle`, and the `ParserConfig`
//! builder.
//!
//! These are thin, concrete wrappers around the assembler, tokenizer, and
//! batcher — simple because the core absorbs the complexity. Grounded on
//! `meridian-stream`'s `lib.rs`, which exposes the same "spawn a task, hand
//! back a receiving handle" shape for its channel manager.

use std::collections::VecDeque;

use futures::Stream;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

use crate::assembler::AssemblerState;
use crate::batch::{Batcher, ParseMessage, StreamId};
use crate::error::{KmlStreamError, Result};
use crate::geometry::Placemark;
use crate::tokenizer::{Tokenizer, XmlEvent};

/// Tuning knobs for a parse run. No files, no environment variables — a
/// plain typed builder, consistent with this crate not persisting
/// configuration anywhere.
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    chunk_size: usize,
    batch_size: usize,
}

impl ParserConfig {
    /// Starts from the defaults (`chunk_size = 4096`, `batch_size = 64`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the byte size of the `BufReader` wrapped around the input.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the placemark count threshold that triggers a flush.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            batch_size: 64,
        }
    }
}

/// A handle to a running parse. Wraps the receiving half of the message
/// channel; dropping it closes the channel and ends the parser task on its
/// next send attempt.
pub struct ParseHandle {
    rx: mpsc::Receiver<ParseMessage>,
    stream_id: StreamId,
}

impl ParseHandle {
    /// The id tagging every message from this parse run.
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Receives the next message, or `None` once the channel has closed
    /// (always preceded by a `Done` or `Error` message under normal
    /// operation).
    pub async fn recv(&mut self) -> Option<ParseMessage> {
        self.rx.recv().await
    }

    /// Acknowledges a batch, unblocking the parser task if it is waiting on
    /// this specific oneshot. A named method so call sites read as
    /// "acknowledge this batch" rather than a bare channel send.
    pub fn ack(&self, ack: oneshot::Sender<()>) {
        let _ = ack.send(());
    }
}

/// Spawns a parser task over `byte_stream` and returns a handle to its
/// message channel. The task runs until the document ends, a fatal error
/// occurs, or the consumer drops the handle.
pub fn events(byte_stream: impl AsyncRead + Unpin + Send + 'static, config: ParserConfig) -> ParseHandle {
    let stream_id = StreamId::new();
    let (tx, rx) = mpsc::channel(1);
    let batcher = Batcher::new(stream_id, config.batch_size, tx);

    tokio::spawn(run_parser(byte_stream, config.chunk_size, batcher));

    ParseHandle { rx, stream_id }
}

/// Returns a lazy, `futures::Stream` of placemarks in document order.
///
/// Internally drives [`events`] and acknowledges each batch only after all
/// of its placemarks have been yielded to the caller, so the parser never
/// races ahead of an idle consumer.
pub fn stream(
    byte_stream: impl AsyncRead + Unpin + Send + 'static,
    config: ParserConfig,
) -> impl Stream<Item = Result<Placemark>> {
    let handle = events(byte_stream, config);

    futures::stream::unfold(StreamState::new(handle), |mut state| async move {
        loop {
            if let Some(placemark) = state.pending.pop_front() {
                if state.pending.is_empty() {
                    if let Some(ack) = state.pending_ack.take() {
                        state.handle.ack(ack);
                    }
                }
                return Some((Ok(placemark), state));
            }

            if state.done {
                return None;
            }

            match state.handle.recv().await {
                Some(ParseMessage::Batch { placemarks, ack, .. }) => {
                    state.pending = placemarks.into();
                    state.pending_ack = ack;
                    // An empty batch (possible on the final flush) needs
                    // another round through the loop rather than a yield.
                }
                Some(ParseMessage::Done { .. }) => {
                    state.done = true;
                }
                Some(ParseMessage::Error { message, .. }) => {
                    state.done = true;
                    return Some((Err(KmlStreamError::Remote(message)), state));
                }
                None => {
                    state.done = true;
                }
            }
        }
    })
}

struct StreamState {
    handle: ParseHandle,
    pending: VecDeque<Placemark>,
    pending_ack: Option<oneshot::Sender<()>>,
    done: bool,
}

impl StreamState {
    fn new(handle: ParseHandle) -> Self {
        Self {
            handle,
            pending: VecDeque::new(),
            pending_ack: None,
            done: false,
        }
    }
}

#[instrument(skip(byte_stream, batcher), fields(stream_id = %batcher.stream_id()))]
async fn run_parser(byte_stream: impl AsyncRead + Unpin + Send + 'static, chunk_size: usize, batcher: Batcher) {
    let mut tokenizer = Tokenizer::new(byte_stream, chunk_size);
    let mut state = AssemblerState::new();

    if let Err(err) = drive(&mut tokenizer, &mut state, &batcher).await {
        debug!(error = %err, "parse run ended with a fatal error");
        batcher.send_error(&err).await;
        return;
    }

    if let Err(err) = batcher.final_flush(&mut state.emit).await {
        debug!(error = %err, "final flush failed; consumer is gone");
    }
}

async fn drive(tokenizer: &mut Tokenizer<impl AsyncRead + Unpin>, state: &mut AssemblerState, batcher: &Batcher) -> Result<()> {
    loop {
        match tokenizer.next_event().await? {
            XmlEvent::Start { name, attrs } => state.on_start_element(&name, attrs)?,
            XmlEvent::Text(text) => state.on_characters(&text),
            XmlEvent::End { name } => {
                state.on_end_element(&name)?;
                batcher.maybe_flush(&mut state.emit).await?;
            }
            XmlEvent::Eof => {
                state.on_end_document()?;
                return Ok(());
            }
        }
    }
}
