//! Error types for the KML placemark streaming pipeline.

use thiserror::Error;

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, KmlStreamError>;

/// Errors that can occur while assembling placemarks from a KML event stream.
#[derive(Error, Debug)]
pub enum KmlStreamError {
    /// A `coordinates` text fragment did not split into 2 or 3 comma-separated,
    /// finite floating point tokens. Recovered locally by the handler that
    /// raised it; surfaced here only for tests and the `tracing::warn!` side
    /// channel, never as a terminal `Error` message.
    #[error("invalid point coordinates: {0:?}")]
    InvalidPoint(String),

    /// A `parse_line` call short-circuited on the first malformed point.
    /// Carries the offending point's own error. Recovered locally, same as
    /// `InvalidPoint`.
    #[error("invalid line coordinates: {0}")]
    InvalidLine(Box<KmlStreamError>),

    /// A geometry was popped off the geometry stack into a parent that does
    /// not accept it (e.g. a bare `Line` folding into a `MultiGeometry` slot
    /// that turned out to hold something else). Indicates the document falls
    /// outside the recognized KML subset. Fatal.
    #[error("unexpected geometry fold at {path}")]
    UnexpectedFold {
        /// The element path at which the fold was attempted, innermost first.
        path: String,
    },

    /// A `Placemark` was opened while another `Placemark` was already open.
    /// Fatal.
    #[error("nested Placemark element is not supported")]
    NestedPlacemark,

    /// `end_document` arrived while `status == Kml`, i.e. the `</kml>` close
    /// tag was never seen. Fatal.
    #[error("document ended while still inside <kml>")]
    UnexpectedEndOfDocument,

    /// The underlying XML tokenizer reported a lexing error.
    #[error("XML tokenizer error: {0}")]
    Tokenizer(#[from] quick_xml::Error),

    /// A chunk of input was not valid UTF-8.
    #[error("invalid UTF-8 in element text: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// The consumer side of the message channel has been dropped. Used
    /// internally to end the parser task early; never surfaced to a
    /// consumer, since there is no longer one to surface it to.
    #[error("consumer is gone")]
    ConsumerGone,

    /// A fatal error that occurred on the parser task, rendered to a string
    /// before crossing the channel boundary into the consumer's task. Used
    /// only by [`crate::api::stream`], which has no other way to carry the
    /// original error variant across a `ParseMessage::Error`.
    #[error("{0}")]
    Remote(String),
}

impl KmlStreamError {
    /// True for errors that are recovered locally by the handler that raised
    /// them and never propagate into a terminal `Error` message.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KmlStreamError::InvalidPoint(_) | KmlStreamError::InvalidLine(_)
        )
    }
}
