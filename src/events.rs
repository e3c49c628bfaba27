//!
//! Events returned by the parser, in the order the corresponding decisions were made.
//!

use std::fmt;

use crate::element::Document;
use crate::errors::parser::ParseFault;

///
/// The bytes of a fully read payload element (by default `SimpleBlock`).
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    pub tag: u64,

    ///
    /// Absolute stream offset of the payload's first data byte.
    ///
    pub offset: u64,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParseEvent {

    ///
    /// A structural decision.  Only returned when [`ParserConfig::emit_traces`](crate::ParserConfig::emit_traces) is set.
    ///
    Trace(TraceEvent),

    PayloadReady(Payload),

    ///
    /// A document has ended, either because a new EBML header started or because the parser was flushed.  Each document is reported this way exactly once.
    ///
    DocumentReady(Document),

    ///
    /// The document as it stands at the end of a pass, with still-open masters shown closed.  Later events may report the same document again with more content.
    ///
    DocumentSnapshot(Document),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceEvent {

    ///
    /// Absolute stream offset the decision relates to.
    ///
    pub offset: u64,
    pub kind: TraceKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TraceKind {
    ChunkQueued { length: usize },
    PassStarted { buffered: usize },
    ElementDecoded { tag: u64, size: Option<u64>, depth: usize },
    DocumentOpened,
    DocumentClosed { elements: usize },
    MasterClosed { tag: u64 },
    ValueDeferred { tag: u64, missing: u64 },
    ValueCompleted { tag: u64 },
    UnknownTagSkipped { tag: u64, remaining: u64 },
    Fault(ParseFault),
    PassFinished { consumed: u64, buffered: usize },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}: ", self.offset)?;
        match &self.kind {
            TraceKind::ChunkQueued { length } => write!(f, "queued {length} bytes"),
            TraceKind::PassStarted { buffered } => write!(f, "pass started with {buffered} buffered bytes"),
            TraceKind::ElementDecoded { tag, size: Some(size), depth } => write!(f, "element 0x{tag:X} ({size} bytes) at depth {depth}"),
            TraceKind::ElementDecoded { tag, size: None, depth } => write!(f, "element 0x{tag:X} (unknown size) at depth {depth}"),
            TraceKind::DocumentOpened => write!(f, "document opened"),
            TraceKind::DocumentClosed { elements } => write!(f, "document closed with {elements} top level elements"),
            TraceKind::MasterClosed { tag } => write!(f, "master 0x{tag:X} closed"),
            TraceKind::ValueDeferred { tag, missing } => write!(f, "value of 0x{tag:X} waiting for {missing} more bytes"),
            TraceKind::ValueCompleted { tag } => write!(f, "value of 0x{tag:X} completed"),
            TraceKind::UnknownTagSkipped { tag, remaining } => write!(f, "skipping unknown tag 0x{tag:X}, {remaining} bytes left"),
            TraceKind::Fault(fault) => write!(f, "{fault}"),
            TraceKind::PassFinished { consumed, buffered } => write!(f, "pass finished, consumed {consumed} bytes, {buffered} left"),
        }
    }
}

impl ParseEvent {
    pub fn as_payload(&self) -> Option<&Payload> {
        match self {
            ParseEvent::PayloadReady(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            ParseEvent::DocumentReady(document) => Some(document),
            _ => None,
        }
    }

    pub fn is_trace(&self) -> bool {
        matches!(self, ParseEvent::Trace(_))
    }
}
