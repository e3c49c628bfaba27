use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, trace, warn};

use ebml_streaming_specification::{ElementDefinition, ElementType};

use crate::config::ParserConfig;
use crate::element::{EbmlSize, Element, ElementKind, ElementStatus};
use crate::errors::parser::{FeedError, ParseFault};
use crate::errors::tool::ToolError;
use crate::events::{ParseEvent, Payload, TraceEvent, TraceKind};
use crate::registry::SchemaRegistry;
use crate::tools;
use crate::tree::OpenDocument;

///
/// Where a [`StreamParser`] stands between calls.
///
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParserPhase {

    ///
    /// Everything received so far has been consumed.
    ///
    Idle,

    ///
    /// A pass is running.
    ///
    Reading,

    ///
    /// The last pass stopped in the middle of an element and kept the unread tail.
    ///
    AwaitingMoreData,
}

///
/// Work left over from an element whose bytes haven't all arrived.
///
#[derive(Clone, Debug)]
enum Pending {

    ///
    /// The last attached element is waiting for `length` data bytes.
    ///
    Value { definition: Arc<ElementDefinition>, length: usize, deferred: bool },

    ///
    /// The data of an element we aren't going to keep still has `remaining` bytes to go.
    ///
    Skip { tag: u64, remaining: u64 },
}

///
/// A cloneable handle for queueing chunks from other threads.
///
/// Feeders never parse anything themselves: chunks are picked up by the owning parser on its next [`StreamParser::process_queued`] (or [`StreamParser::feed`]) call, in the order they were queued.
///
#[derive(Clone, Debug)]
pub struct Feeder {
    sender: Sender<Vec<u8>>,
}

impl Feeder {
    pub fn feed(&self, chunk: &[u8]) -> Result<(), FeedError> {
        self.feed_owned(chunk.to_vec())
    }

    pub fn feed_owned(&self, chunk: Vec<u8>) -> Result<(), FeedError> {
        self.sender.send(chunk).map_err(|_| FeedError::ParserDropped)
    }
}

///
/// An incremental parser for EBML streams.
///
/// Bytes can be delivered in chunks of any size - a chunk boundary may fall in the middle of a tag id, a size or a value.  Whatever can't be read yet is kept and the parser picks up at the same byte once more data arrives.  Structure that has already been built is never thrown away because of a short read.
///
/// Every call returns the events produced while handling it, in decision order:
///
///  * [`ParseEvent::PayloadReady`] whenever a payload element (by default `SimpleBlock`) has been fully read,
///  * [`ParseEvent::DocumentReady`] when a document ends (a new EBML header arrives or the parser is [flushed](Self::flush)),
///  * [`ParseEvent::DocumentSnapshot`] when a call leaves the parser idle with a document still open (can be disabled in the [`ParserConfig`]),
///  * [`ParseEvent::Trace`] for every structural decision, if enabled in the [`ParserConfig`].
///
/// Corrupted data never stops the parser: faults are reported as trace events (and logged) and parsing carries on.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use ebml_streaming::{ParseEvent, SchemaRegistry, StreamParser};
///
/// let mut parser = StreamParser::new(Arc::new(SchemaRegistry::builtin_only()));
///
/// // An EBML header containing EBMLVersion = 1, split over two chunks
/// let stream = [0x1A, 0x45, 0xDF, 0xA3, 0x84, 0x42, 0x86, 0x81, 0x01];
/// assert!(parser.feed(&stream[..6]).iter().all(|e| !matches!(e, ParseEvent::DocumentReady(_))));
/// parser.feed(&stream[6..]);
///
/// let events = parser.flush();
/// let document = events.iter().find_map(ParseEvent::as_document).unwrap();
/// assert_eq!(Ok(1), document.header_fields().ebml_version());
/// ```
///
#[derive(Debug)]
pub struct StreamParser {
    registry: Arc<SchemaRegistry>,
    config: ParserConfig,
    sender: Sender<Vec<u8>>,
    queue: Receiver<Vec<u8>>,

    buffer: Vec<u8>,
    buffer_offset: u64,
    position: usize,
    pending: Option<Pending>,
    document: Option<OpenDocument>,
    phase: ParserPhase,
    events: Vec<ParseEvent>,
}

impl StreamParser {

    ///
    /// Returns a parser using the default [`ParserConfig`].
    ///
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        StreamParser::with_config(registry, ParserConfig::default())
    }

    pub fn with_config(registry: Arc<SchemaRegistry>, config: ParserConfig) -> Self {
        let (sender, queue) = unbounded();
        StreamParser {
            registry,
            buffer: Vec::with_capacity(config.initial_capacity),
            config,
            sender,
            queue,
            buffer_offset: 0,
            position: 0,
            pending: None,
            document: None,
            phase: ParserPhase::Idle,
            events: Vec::new(),
        }
    }

    ///
    /// Returns a handle that can queue chunks for this parser from any thread.
    ///
    pub fn feeder(&self) -> Feeder {
        Feeder { sender: self.sender.clone() }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn phase(&self) -> ParserPhase {
        self.phase
    }

    ///
    /// Absolute offset (counted from the first byte ever fed) of the next byte the parser will read.
    ///
    pub fn stream_offset(&self) -> u64 {
        self.buffer_offset + self.position as u64
    }

    ///
    /// Number of received bytes that haven't been consumed yet.
    ///
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() - self.position
    }

    pub fn has_open_document(&self) -> bool {
        self.document.is_some()
    }

    ///
    /// Appends `chunk` to the stream (after anything queued through a [`Feeder`]) and parses as much as possible.
    ///
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ParseEvent> {
        self.drain_queue();
        self.append(chunk);
        self.pass(false);
        std::mem::take(&mut self.events)
    }

    ///
    /// Parses chunks queued through [`Feeder`]s.
    ///
    /// Does nothing (and returns no events) when no chunk has been queued since the last call.
    ///
    pub fn process_queued(&mut self) -> Vec<ParseEvent> {
        if self.drain_queue() {
            self.pass(false);
        }
        std::mem::take(&mut self.events)
    }

    ///
    /// Declares the end of the stream.
    ///
    /// Parses everything still queued, then closes the open document and reports it as [`ParseEvent::DocumentReady`].  A trailing element that never completed is left as it is (an incomplete value stays [`ElementStatus::Incomplete`]) and any unread bytes are discarded.  The parser is idle afterwards and can keep going with a new stream.
    ///
    pub fn flush(&mut self) -> Vec<ParseEvent> {
        self.pass(true);

        let offset = self.stream_offset();
        let tail = self.buffered_len();
        if tail > 0 {
            self.trace(offset, TraceKind::Fault(ParseFault::DiscardedTail { offset, length: tail }));
        }
        self.buffer_offset = offset + tail as u64;
        self.buffer.clear();
        self.position = 0;
        self.pending = None;

        self.close_document(self.stream_offset());
        self.phase = ParserPhase::Idle;
        std::mem::take(&mut self.events)
    }

    fn append(&mut self, chunk: &[u8]) {
        let offset = self.buffer_offset + self.buffer.len() as u64;
        self.buffer.extend_from_slice(chunk);
        self.trace(offset, TraceKind::ChunkQueued { length: chunk.len() });
    }

    fn drain_queue(&mut self) -> bool {
        let mut received = false;
        while let Ok(chunk) = self.queue.try_recv() {
            self.append(&chunk);
            received = true;
        }
        received
    }

    fn pass(&mut self, flushing: bool) {
        self.phase = ParserPhase::Reading;
        self.drain_queue();

        let start = self.stream_offset();
        debug!("Parse pass starting at offset {} with {} bytes buffered", start, self.buffered_len());
        self.trace(start, TraceKind::PassStarted { buffered: self.buffered_len() });

        loop {
            while self.step() {}
            if !self.drain_queue() {
                break;
            }
        }
        self.compact();

        let idle = self.pending.is_none() && self.buffer.is_empty();
        self.phase = if idle { ParserPhase::Idle } else { ParserPhase::AwaitingMoreData };

        if idle && !flushing && self.config.emit_snapshots {
            if let Some(document) = &self.document {
                self.events.push(ParseEvent::DocumentSnapshot(document.snapshot()));
            }
        }

        let consumed = self.stream_offset() - start;
        debug!("Parse pass consumed {} bytes, {} bytes left over ({:?})", consumed, self.buffer.len(), self.phase);
        self.trace(self.stream_offset(), TraceKind::PassFinished { consumed, buffered: self.buffer.len() });
    }

    fn compact(&mut self) {
        if self.position > 0 {
            self.buffer.drain(..self.position);
            self.buffer_offset += self.position as u64;
            self.position = 0;
        }
    }

    fn trace(&mut self, offset: u64, kind: TraceKind) {
        let event = TraceEvent { offset, kind };
        match &event.kind {
            TraceKind::Fault(_) => warn!("{}", event),
            _ => trace!("{}", event),
        }
        if self.config.emit_traces {
            self.events.push(ParseEvent::Trace(event));
        }
    }

    ///
    /// Makes one unit of progress.  Returns `false` when nothing more can be done with the buffered bytes.
    ///
    fn step(&mut self) -> bool {
        match self.pending.take() {
            Some(Pending::Value { definition, length, deferred }) => self.complete_value(definition, length, deferred),
            Some(Pending::Skip { tag, remaining }) => self.continue_skip(tag, remaining),
            None => self.read_element(),
        }
    }

    fn read_element(&mut self) -> bool {
        let header_offset = self.stream_offset();

        let (tag, tag_length) = match tools::read_tag_id(&self.buffer[self.position..]) {
            Ok(Some(read)) => read,
            Ok(None) => return false,
            Err(source) => return self.resync(header_offset, source),
        };
        let (size, size_length) = match tools::read_size(&self.buffer[self.position + tag_length..]) {
            Ok(Some(read)) => read,
            Ok(None) => return false,
            Err(source) => return self.resync(header_offset, source),
        };
        self.position += tag_length + size_length;
        let start_offset = self.stream_offset();

        let definition = match self.registry.lookup(tag) {
            Some(definition) => definition,
            None => {
                self.trace(header_offset, TraceKind::Fault(ParseFault::UnknownTag { tag, offset: header_offset, size: size.value() }));
                self.skip(tag, size);
                return true;
            }
        };

        if definition.element_type == ElementType::Header {
            self.open_document(tag, size, header_offset, start_offset);
            return true;
        }

        let registry = &self.registry;
        let (closed, depth) = match self.document.as_mut() {
            Some(document) => {
                let closed = document.end_unknown_sized(&definition, |tag| registry.lookup(tag));
                (closed, document.depth())
            },
            None => {
                self.trace(header_offset, TraceKind::Fault(ParseFault::OutsideDocument { tag, offset: header_offset }));
                self.skip(tag, size);
                return true;
            }
        };
        self.trace_closed(header_offset, closed);
        self.trace(header_offset, TraceKind::ElementDecoded { tag, size: size.value(), depth });

        let mut element = Element::new(tag, ElementKind::empty(definition.element_type));
        element.size = size;
        element.header_offset = header_offset;
        element.start_offset = start_offset;

        if definition.element_type.is_master() {
            let closed = match self.document.as_mut() {
                Some(document) => document.open_master(element, start_offset),
                None => Vec::new(),
            };
            self.trace_closed(start_offset, closed);
            return true;
        }

        match size {
            EbmlSize::Unknown => {
                element.status = ElementStatus::Malformed;
                self.trace(header_offset, TraceKind::Fault(ParseFault::UnknownSizedValue { tag, offset: header_offset }));
                let closed = match self.document.as_mut() {
                    Some(document) => document.add_child(element, start_offset),
                    None => Vec::new(),
                };
                self.trace_closed(start_offset, closed);
            },
            EbmlSize::Known(length) => {
                let length = usize::try_from(length).unwrap_or(usize::MAX);
                if let Some(document) = self.document.as_mut() {
                    document.attach(element);
                }
                let deferred = self.buffered_len() < length;
                if deferred {
                    let missing = (length - self.buffered_len()) as u64;
                    self.trace(start_offset, TraceKind::ValueDeferred { tag, missing });
                }
                self.pending = Some(Pending::Value { definition, length, deferred });
            },
        }
        true
    }

    ///
    /// Fills in the value of the element attached last, once all of its bytes are buffered.
    ///
    fn complete_value(&mut self, definition: Arc<ElementDefinition>, length: usize, deferred: bool) -> bool {
        if self.buffered_len() < length {
            self.pending = Some(Pending::Value { definition, length, deferred });
            return false;
        }

        let tag = definition.tag;
        let offset = self.stream_offset();
        let range = self.position..self.position + length;
        self.position += length;

        match decode_value(&definition, &self.buffer[range.clone()]) {
            Ok(kind) => {
                if let Some(element) = self.document.as_mut().and_then(|document| document.last_attached_mut()) {
                    element.kind = kind;
                    element.status = ElementStatus::Complete;
                }
                if deferred {
                    self.trace(offset, TraceKind::ValueCompleted { tag });
                }
                if self.config.is_payload_tag(tag) {
                    let data = self.buffer[range].to_vec();
                    self.events.push(ParseEvent::PayloadReady(Payload { tag, offset, data }));
                }
            },
            Err(source) => {
                if let Some(element) = self.document.as_mut().and_then(|document| document.last_attached_mut()) {
                    element.status = ElementStatus::Malformed;
                }
                self.trace(offset, TraceKind::Fault(ParseFault::Materialization { tag, offset, source }));
            },
        }

        self.close_ended();
        true
    }

    ///
    /// Drops the data of an element we aren't keeping.  With an unknown size only the header is dropped, and that may already be the end of an open master.
    ///
    fn skip(&mut self, tag: u64, size: EbmlSize) {
        match size {
            EbmlSize::Known(remaining) => self.pending = Some(Pending::Skip { tag, remaining }),
            EbmlSize::Unknown => self.close_ended(),
        }
    }

    fn continue_skip(&mut self, tag: u64, remaining: u64) -> bool {
        let skipped = remaining.min(self.buffered_len() as u64);
        self.position += skipped as usize;
        let remaining = remaining - skipped;

        if skipped > 0 || remaining == 0 {
            self.trace(self.stream_offset(), TraceKind::UnknownTagSkipped { tag, remaining });
        }
        if remaining > 0 {
            self.pending = Some(Pending::Skip { tag, remaining });
            return false;
        }

        self.close_ended();
        true
    }

    ///
    /// Drops the first byte of an unreadable element header so the next pass can look for a valid one.
    ///
    fn resync(&mut self, offset: u64, source: ToolError) -> bool {
        self.trace(offset, TraceKind::Fault(ParseFault::CorruptHeader { offset, source }));
        self.position += 1;
        self.close_ended();
        true
    }

    fn open_document(&mut self, tag: u64, size: EbmlSize, header_offset: u64, start_offset: u64) {
        self.close_document(header_offset);

        let mut header = Element::new(tag, ElementKind::Header(Vec::new()));
        header.size = size;
        header.header_offset = header_offset;
        header.start_offset = start_offset;
        self.trace(header_offset, TraceKind::DocumentOpened);

        let mut document = OpenDocument::new(header);
        let closed = document.close_ended(start_offset);
        self.document = Some(document);
        self.trace_closed(start_offset, closed);
    }

    fn close_document(&mut self, offset: u64) {
        if let Some(document) = self.document.take() {
            let document = document.finish();
            self.trace(offset, TraceKind::DocumentClosed { elements: document.body.len() });
            self.events.push(ParseEvent::DocumentReady(document));
        }
    }

    fn close_ended(&mut self) {
        let cursor = self.stream_offset();
        if let Some(document) = self.document.as_mut() {
            let closed = document.close_ended(cursor);
            self.trace_closed(cursor, closed);
        }
    }

    fn trace_closed(&mut self, offset: u64, closed: Vec<u64>) {
        for tag in closed {
            self.trace(offset, TraceKind::MasterClosed { tag });
        }
    }
}

///
/// Decodes the data bytes of a leaf element according to its definition.
///
/// An empty value takes the definition's default when it declares one.
///
fn decode_value(definition: &ElementDefinition, data: &[u8]) -> Result<ElementKind, ToolError> {
    if data.is_empty() {
        if let Some(default_value) = &definition.default_value {
            match parse_default(definition.element_type, default_value) {
                Ok(kind) => return Ok(kind),
                Err(err) => warn!("{} for {}; using the empty value", err, definition.name),
            }
        }
    }

    Ok(match definition.element_type {
        ElementType::UnsignedInteger => ElementKind::UnsignedInteger(Some(tools::arr_to_u64(data)?)),
        ElementType::SignedInteger => ElementKind::SignedInteger(Some(tools::arr_to_i64(data)?)),
        ElementType::String => ElementKind::String(Some(tools::arr_to_ascii(data))),
        ElementType::Utf8 => ElementKind::Utf8(Some(tools::arr_to_utf8(data)?)),
        ElementType::Binary => ElementKind::Binary(Some(data.to_vec())),
        ElementType::Float => ElementKind::Float(Some(tools::arr_to_f64(data)?)),
        ElementType::Date => ElementKind::Date(Some(tools::arr_to_date(data)?)),
        ElementType::Header | ElementType::Master => ElementKind::empty(definition.element_type),
    })
}

fn parse_default(element_type: ElementType, value: &str) -> Result<ElementKind, ToolError> {
    let mismatch = || ToolError::DefaultValueMismatch { value: value.to_string(), expected: element_type.schema_name() };
    let trimmed = value.trim();

    Ok(match element_type {
        ElementType::UnsignedInteger => ElementKind::UnsignedInteger(Some(trimmed.parse().map_err(|_| mismatch())?)),
        ElementType::SignedInteger => ElementKind::SignedInteger(Some(trimmed.parse().map_err(|_| mismatch())?)),
        ElementType::Float => ElementKind::Float(Some(trimmed.parse().map_err(|_| mismatch())?)),
        ElementType::Date => ElementKind::Date(Some(trimmed.parse().map_err(|_| mismatch())?)),
        ElementType::String => ElementKind::String(Some(value.to_string())),
        ElementType::Utf8 => ElementKind::Utf8(Some(value.to_string())),
        ElementType::Binary | ElementType::Header | ElementType::Master => return Err(mismatch()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebml_streaming_specification::header_spec;

    fn parser() -> StreamParser {
        StreamParser::new(Arc::new(SchemaRegistry::builtin_only()))
    }

    #[test]
    fn offsets_advance_with_consumed_bytes() {
        let mut parser = parser();
        parser.feed(&[0x1A, 0x45, 0xDF, 0xA3, 0x84, 0x42]);
        assert_eq!(5, parser.stream_offset());
        assert_eq!(1, parser.buffered_len());
        assert_eq!(ParserPhase::AwaitingMoreData, parser.phase());

        parser.feed(&[0x86, 0x81, 0x01]);
        assert_eq!(9, parser.stream_offset());
        assert_eq!(0, parser.buffered_len());
        assert_eq!(ParserPhase::Idle, parser.phase());
    }

    #[test]
    fn pending_value_keeps_phase_awaiting() {
        let mut parser = parser();
        parser.feed(&[0x1A, 0x45, 0xDF, 0xA3, 0x85, 0x42, 0x86, 0x82, 0x01]);
        assert_eq!(ParserPhase::AwaitingMoreData, parser.phase());
        assert_eq!(1, parser.buffered_len());
        assert!(parser.has_open_document());

        parser.feed(&[0x00]);
        assert_eq!(ParserPhase::Idle, parser.phase());
        assert_eq!(10, parser.stream_offset());
    }

    #[test]
    fn empty_values_take_defaults() {
        let definition = ElementDefinition::new(header_spec::EBML_MAX_ID_LENGTH, "EBMLMaxIDLength", r"\EBML\EBMLMaxIDLength", ElementType::UnsignedInteger)
            .with_default("4");
        assert_eq!(Ok(ElementKind::UnsignedInteger(Some(4))), decode_value(&definition, &[]));
        assert_eq!(Ok(ElementKind::UnsignedInteger(Some(8))), decode_value(&definition, &[0x08]));
    }

    #[test]
    fn unreadable_default_falls_back_to_empty_value() {
        let definition = ElementDefinition::new(0x4489, "Duration", r"\Segment\Info\Duration", ElementType::Float)
            .with_default("0x1p+0");
        assert_eq!(Ok(ElementKind::Float(Some(0.0))), decode_value(&definition, &[]));
    }

    #[test]
    fn bad_widths_are_errors() {
        let definition = ElementDefinition::new(0x4489, "Duration", r"\Segment\Info\Duration", ElementType::Float);
        assert!(matches!(decode_value(&definition, &[0, 0, 0]), Err(ToolError::ReadF64Mismatch(_))));
    }

    #[test]
    fn feeder_fails_once_parser_is_gone() {
        let parser = parser();
        let feeder = parser.feeder();
        assert_eq!(Ok(()), feeder.feed(&[0xEC, 0x80]));
        drop(parser);
        assert_eq!(Err(FeedError::ParserDropped), feeder.feed(&[0xEC, 0x80]));
    }
}
