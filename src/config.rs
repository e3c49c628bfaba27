use std::collections::HashSet;

use ebml_streaming_specification::header_spec;

///
/// Options controlling what a [`StreamParser`](crate::StreamParser) reports.
///
/// ```
/// use ebml_streaming::ParserConfig;
///
/// let config = ParserConfig::default()
///     .with_payload_tag(0xA1)
///     .emit_traces(true);
///
/// assert!(config.is_payload_tag(0xA3));
/// assert!(config.is_payload_tag(0xA1));
/// ```
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParserConfig {

    ///
    /// Binary elements whose bytes are reported through [`ParseEvent::PayloadReady`](crate::ParseEvent::PayloadReady) as soon as they are complete.  Defaults to `SimpleBlock` (`0xA3`).
    ///
    pub payload_tags: HashSet<u64>,

    ///
    /// Whether structural decisions are returned as [`ParseEvent::Trace`](crate::ParseEvent::Trace) events.  They are always logged through the `log` facade at `trace` level regardless.
    ///
    pub emit_traces: bool,

    ///
    /// Whether a pass that ends cleanly with a document still open reports a best effort [`ParseEvent::DocumentSnapshot`](crate::ParseEvent::DocumentSnapshot).
    ///
    pub emit_snapshots: bool,

    pub initial_capacity: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            payload_tags: HashSet::from([header_spec::SIMPLE_BLOCK]),
            emit_traces: false,
            emit_snapshots: true,
            initial_capacity: 64 * 1024,
        }
    }
}

impl ParserConfig {
    pub fn with_payload_tag(mut self, tag: u64) -> Self {
        self.payload_tags.insert(tag);
        self
    }

    ///
    /// Replaces the set of payload tags.  An empty set disables payload events entirely.
    ///
    pub fn with_payload_tags<I: IntoIterator<Item = u64>>(mut self, tags: I) -> Self {
        self.payload_tags = tags.into_iter().collect();
        self
    }

    pub fn emit_traces(mut self, enabled: bool) -> Self {
        self.emit_traces = enabled;
        self
    }

    pub fn emit_snapshots(mut self, enabled: bool) -> Self {
        self.emit_snapshots = enabled;
        self
    }

    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn is_payload_tag(&self, tag: u64) -> bool {
        self.payload_tags.contains(&tag)
    }
}
