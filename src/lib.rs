//! # kmlstream
//!
//! A streaming, backpressured placemark assembler for large KML documents.
//!
//! This crate turns a byte stream of KML into a lazy, in-order sequence of
//! [`Placemark`]s without holding the whole document in memory. It recognizes
//! a focused subset of the KML grammar — `Placemark`, `Point`, `LineString`,
//! `Polygon` (with holes), `MultiGeometry` (nested), `name`, `description`,
//! `TimeSpan`, and `ExtendedData` — and folds it incrementally as a SAX-style
//! event stream arrives, so memory use tracks document nesting depth and the
//! consumer's batch size, not document length.
//!
//! - **Streaming**: driven by `quick-xml`'s async tokenizer over any
//!   `tokio::io::AsyncRead`; no requirement to buffer the whole document.
//! - **Backpressured**: the parser task and the consumer rendezvous on a
//!   bounded channel plus a per-batch acknowledgment, so a slow consumer
//!   throttles the parser rather than letting it race ahead.
//! - **Tolerant of malformed coordinates**: a `coordinates` fragment that
//!   doesn't parse is logged and dropped; the placemark it belongs to is
//!   still emitted with whatever geometry it did manage to assemble.
//! - **Not a validator**: documents outside the recognized grammar either
//!   fold into the nearest enclosing structure or raise a fatal error; this
//!   crate does not check a document against the KML schema.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use kmlstream::{stream, ParserConfig};
//!
//! # async fn run(file: tokio::fs::File) -> kmlstream::Result<()> {
//! let config = ParserConfig::new().with_batch_size(128);
//! let mut placemarks = Box::pin(stream(file, config));
//!
//! while let Some(placemark) = placemarks.next().await {
//!     let placemark = placemark?;
//!     println!("{:?}: {} geometries", placemark.attrs.get("name"), placemark.geoms.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! For direct control over batching and acknowledgment (for example, to
//! process a batch concurrently before acking it), use [`events`] instead of
//! [`stream`] and drive the returned [`ParseHandle`] by hand.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Public API: `events()`, `stream()`, `ParseHandle`, `ParserConfig`.
pub mod api;
/// The placemark assembler state machine.
pub mod assembler;
/// Batcher and backpressure channel.
pub mod batch;
/// The open-element context stack.
pub mod context;
/// KML coordinate-string parsing.
pub mod coords;
/// Error types.
pub mod error;
/// The geometry and placemark data model.
pub mod geometry;
/// Path-dispatched handler tables.
pub mod handlers;
/// Async XML tokenizer adapter.
pub mod tokenizer;

pub use api::{events, stream, ParseHandle, ParserConfig};
pub use batch::{ParseMessage, StreamId};
pub use error::{KmlStreamError, Result};
pub use geometry::{BoundaryKind, Geometry, Line, Placemark, Point};
