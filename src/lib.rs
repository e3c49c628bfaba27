//! This crate provides an incremental parser for [EBML][EBML] streams.  Its primary goal is to turn bytes into typed element trees as soon as they arrive, without ever needing the whole file in memory.
//!
//! [EBML][EBML] stands for Extensible Binary Meta-Language and is somewhat of a
//! binary version of XML. It's used for container formats like [WebM][webm] or
//! [MKV][mkv].
//!
//! # Streaming
//! The [`StreamParser`] accepts chunks of any size, e.g. the fragments produced by a live recorder.  A chunk boundary may fall anywhere - inside a tag id, a size or a value - and parsing resumes at the exact byte where it stopped once the next chunk is fed.  Masters written with the "unknown" size ([RFC8794][rfc8794] section 6.2), as live recorders do for `Segment` and `Cluster`, are supported: they end when an element arrives that the schema places outside of them.
//!
//! Results are returned as [`ParseEvent`]s: payload blocks (`SimpleBlock` by default) as soon as their bytes are complete, and [`Document`]s (one EBML header plus the elements that follow it) once they end.
//!
//! # Schemas
//! The parser only needs to know the type of each tag.  The EBML header elements are built in; everything else comes from a [`SchemaSource`](ebml_streaming_specification::SchemaSource) - usually an `EBMLSchema` XML document loaded through [`schema::XmlSchema`] - wrapped in a [`SchemaRegistry`].  Tags the schema doesn't describe are skipped.
//!
//! ```
//! use std::sync::Arc;
//! use ebml_streaming::{ParseEvent, SchemaRegistry, StreamParser};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SchemaRegistry::from_xml(r#"
//!     <EBMLSchema docType="webm" version="4">
//!         <element name="Segment" path="\Segment" id="0x18538067" type="master"/>
//!         <element name="Cluster" path="\Segment\Cluster" id="0x1F43B675" type="master"/>
//!     </EBMLSchema>"#)?;
//! let mut parser = StreamParser::new(Arc::new(registry));
//!
//! for chunk in [&[0x1A, 0x45, 0xDF, 0xA3, 0x80, 0x18, 0x53][..], &[0x80, 0x67, 0x85, 0xA3, 0x83, 0x81][..], &[0x00, 0x00][..]] {
//!     for event in parser.feed(chunk) {
//!         if let ParseEvent::PayloadReady(payload) = event {
//!             assert_eq!(vec![0x81, 0x00, 0x00], payload.data);
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [EBML]: http://ebml.sourceforge.net/
//! [webm]: https://www.webmproject.org/
//! [mkv]: http://www.matroska.org/technical/specs/index.html
//! [rfc8794]: https://datatracker.ietf.org/doc/rfc8794/
//!

mod config;
mod element;
mod element_writer;
mod events;
mod parser;
mod registry;
mod tree;
pub mod errors;
pub mod schema;
pub mod tools;

#[cfg(feature = "futures")]
pub mod nonblocking;

pub use self::config::ParserConfig;
pub use self::element::{Document, EbmlSize, Element, ElementKind, ElementStatus, HeaderFields};
pub use self::element_writer::ElementWriter;
pub use self::events::{ParseEvent, Payload, TraceEvent, TraceKind};
pub use self::parser::{Feeder, ParserPhase, StreamParser};
pub use self::registry::SchemaRegistry;

pub use ebml_streaming_specification as specification;
