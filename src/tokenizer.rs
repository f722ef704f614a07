//! Adapter from `quick_xml`'s async tokenizer to a small, crate-owned event
//! enum.
//!
//! The assembler is written against [`XmlEvent`], not against
//! `quick_xml::events::Event` directly, so the SAX-correctness boundary this
//! crate assumes (the tokenizer gets well-formedness right; this crate only
//! has to get KML structure right) stays honest: swapping the underlying
//! tokenizer only touches this one file. Grounded on `meridian-io`'s
//! `KmlReader`, which drives the same `quick_xml::events::Event` match loop
//! synchronously; this is that loop's async, owned-event counterpart.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Reader;
use tokio::io::{AsyncRead, BufReader};

use crate::error::{KmlStreamError, Result};

/// One tokenized XML event, already decoded to owned `String`s and with
/// namespace prefixes dropped (this crate matches on local names only).
#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent {
    /// An element start tag, with attributes in document order.
    Start {
        /// The element's local name.
        name: String,
        /// The element's attributes, in document order.
        attrs: Vec<(String, String)>,
    },
    /// An element end tag.
    End {
        /// The element's local name.
        name: String,
    },
    /// A run of character data. Whitespace-only runs between tags are
    /// dropped upstream; every `Text` here carries content a handler might
    /// care about.
    Text(String),
    /// End of input.
    Eof,
}

fn local_name_str(bytes: &[u8]) -> Result<String> {
    Ok(std::str::from_utf8(bytes)?.to_string())
}

fn decode_start(e: &BytesStart<'_>) -> Result<(String, Vec<(String, String)>)> {
    let name = local_name_str(e.local_name().as_ref())?;
    let attrs = e
        .attributes()
        .flatten()
        .filter_map(|attr| {
            let key = local_name_str(attr.key.local_name().as_ref()).ok()?;
            let value = attr.unescape_value().ok()?.into_owned();
            Some((key, value))
        })
        .collect();
    Ok((name, attrs))
}

fn decode_end(e: &BytesEnd<'_>) -> Result<String> {
    local_name_str(e.local_name().as_ref())
}

/// Wraps a `quick_xml` async reader over `R`, producing [`XmlEvent`]s.
///
/// Self-closing tags (`<Point/>`) are expanded into a `Start` immediately
/// followed by an `End` on the next call, so the assembler never needs to
/// know the difference between `<a></a>` and `<a/>`.
pub struct Tokenizer<R> {
    reader: Reader<BufReader<R>>,
    buf: Vec<u8>,
    pending_end: Option<String>,
}

impl<R> Tokenizer<R>
where
    R: AsyncRead + Unpin,
{
    /// Wraps `inner` in a `BufReader` of `chunk_size` bytes and prepares a
    /// tokenizer over it.
    pub fn new(inner: R, chunk_size: usize) -> Self {
        let buffered = BufReader::with_capacity(chunk_size.max(1), inner);
        let mut reader = Reader::from_reader(buffered);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            pending_end: None,
        }
    }

    /// Reads the next event, or `Eof` once input is exhausted. Comments,
    /// processing instructions, and the XML declaration are consumed
    /// silently; `Eof` is returned exactly once and every call after that
    /// returns it again.
    pub async fn next_event(&mut self) -> Result<XmlEvent> {
        if let Some(name) = self.pending_end.take() {
            return Ok(XmlEvent::End { name });
        }

        loop {
            self.buf.clear();
            match self.reader.read_event_into_async(&mut self.buf).await {
                Ok(Event::Start(e)) => {
                    let (name, attrs) = decode_start(&e)?;
                    return Ok(XmlEvent::Start { name, attrs });
                }
                Ok(Event::Empty(e)) => {
                    let (name, attrs) = decode_start(&e)?;
                    self.pending_end = Some(name.clone());
                    return Ok(XmlEvent::Start { name, attrs });
                }
                Ok(Event::End(e)) => {
                    let name = decode_end(&e)?;
                    return Ok(XmlEvent::End { name });
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(KmlStreamError::Tokenizer)?.into_owned();
                    if text.is_empty() {
                        continue;
                    }
                    return Ok(XmlEvent::Text(text));
                }
                Ok(Event::CData(e)) => {
                    let text = std::str::from_utf8(e.as_ref())?.to_string();
                    if text.is_empty() {
                        continue;
                    }
                    return Ok(XmlEvent::Text(text));
                }
                Ok(Event::Eof) => return Ok(XmlEvent::Eof),
                Ok(_) => continue, // comments, PIs, doctype, declaration
                Err(err) => return Err(KmlStreamError::Tokenizer(err)),
            }
        }
    }
}
