//!
//! Contains the types produced by the parser: [`Element`] trees grouped into [`Document`]s.
//!

use ebml_streaming_specification::header_spec;
use ebml_streaming_specification::ElementType;

use crate::errors::document::HeaderError;

///
/// The declared size of an element.
///
/// Live streams commonly write master elements (`Segment`, `Cluster`) with the reserved "unknown" size because the amount of data isn't known when the header goes out.
///
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EbmlSize {
    Known(u64),
    Unknown,
}

impl EbmlSize {

    ///
    /// Interprets a decoded size vint.  `size` must already have its marker stripped.
    ///
    pub fn new(size: u64, vint_length: usize) -> Self {
        if (1..=8).contains(&vint_length) && size == (1u64 << (7 * vint_length)) - 1 {
            EbmlSize::Unknown
        } else {
            EbmlSize::Known(size)
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, EbmlSize::Known(_))
    }

    pub fn value(&self) -> Option<u64> {
        match self {
            EbmlSize::Known(size) => Some(*size),
            EbmlSize::Unknown => None,
        }
    }
}

///
/// Whether an element's value has been read.
///
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ElementStatus {

    ///
    /// The value (or, for masters, the element header) has been fully read.
    ///
    Complete,

    ///
    /// The element header was read but its value hasn't arrived yet.  It will be filled in by a later feed.
    ///
    Incomplete,

    ///
    /// The value bytes were read but couldn't be interpreted as the element's type (e.g. a float of 3 bytes, or invalid UTF-8).
    ///
    Malformed,
}

///
/// The typed content of an element.
///
/// Leaf variants carry `None` while the element is [`ElementStatus::Incomplete`] or [`ElementStatus::Malformed`].  Dates are kept as signed nanoseconds since 2001-01-01T00:00:00 UTC; see [`crate::tools::date_to_chrono`] (feature `chrono`) for a conversion.
///
#[derive(Clone, Debug, PartialEq)]
pub enum ElementKind {
    Header(Vec<Element>),
    Master(Vec<Element>),
    UnsignedInteger(Option<u64>),
    SignedInteger(Option<i64>),
    String(Option<String>),
    Utf8(Option<String>),
    Binary(Option<Vec<u8>>),
    Float(Option<f64>),
    Date(Option<i64>),
}

impl ElementKind {

    ///
    /// Returns a value-less kind for the given type.  Masters start out without children.
    ///
    pub fn empty(element_type: ElementType) -> Self {
        match element_type {
            ElementType::Header => ElementKind::Header(Vec::new()),
            ElementType::Master => ElementKind::Master(Vec::new()),
            ElementType::UnsignedInteger => ElementKind::UnsignedInteger(None),
            ElementType::SignedInteger => ElementKind::SignedInteger(None),
            ElementType::String => ElementKind::String(None),
            ElementType::Utf8 => ElementKind::Utf8(None),
            ElementType::Binary => ElementKind::Binary(None),
            ElementType::Float => ElementKind::Float(None),
            ElementType::Date => ElementKind::Date(None),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            ElementKind::Header(_) => ElementType::Header,
            ElementKind::Master(_) => ElementType::Master,
            ElementKind::UnsignedInteger(_) => ElementType::UnsignedInteger,
            ElementKind::SignedInteger(_) => ElementType::SignedInteger,
            ElementKind::String(_) => ElementType::String,
            ElementKind::Utf8(_) => ElementType::Utf8,
            ElementKind::Binary(_) => ElementType::Binary,
            ElementKind::Float(_) => ElementType::Float,
            ElementKind::Date(_) => ElementType::Date,
        }
    }

    ///
    /// Whether a value is present.  Masters always report `true`.
    ///
    pub fn has_value(&self) -> bool {
        match self {
            ElementKind::Header(_) | ElementKind::Master(_) => true,
            ElementKind::UnsignedInteger(val) => val.is_some(),
            ElementKind::SignedInteger(val) => val.is_some(),
            ElementKind::String(val) | ElementKind::Utf8(val) => val.is_some(),
            ElementKind::Binary(val) => val.is_some(),
            ElementKind::Float(val) => val.is_some(),
            ElementKind::Date(val) => val.is_some(),
        }
    }
}

///
/// A single EBML element.
///
/// Elements built by the parser record where they were found: `header_offset` is the absolute stream offset of the tag id, `start_offset` the offset of the first data byte.  Elements built by hand (for writing) use zero offsets and a zero size; the [`ElementWriter`](crate::ElementWriter) recomputes sizes and only looks at `size` to honour [`EbmlSize::Unknown`] on masters.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub tag: u64,
    pub size: EbmlSize,
    pub header_offset: u64,
    pub start_offset: u64,
    pub status: ElementStatus,
    pub kind: ElementKind,
}

impl Element {
    pub fn new(tag: u64, kind: ElementKind) -> Self {
        let status = if kind.has_value() { ElementStatus::Complete } else { ElementStatus::Incomplete };
        Element {
            tag,
            size: EbmlSize::Known(0),
            header_offset: 0,
            start_offset: 0,
            status,
            kind,
        }
    }

    pub fn header(children: Vec<Element>) -> Self {
        Element::new(header_spec::EBML, ElementKind::Header(children))
    }

    pub fn master(tag: u64, children: Vec<Element>) -> Self {
        Element::new(tag, ElementKind::Master(children))
    }

    pub fn unsigned(tag: u64, value: u64) -> Self {
        Element::new(tag, ElementKind::UnsignedInteger(Some(value)))
    }

    pub fn signed(tag: u64, value: i64) -> Self {
        Element::new(tag, ElementKind::SignedInteger(Some(value)))
    }

    pub fn string(tag: u64, value: &str) -> Self {
        Element::new(tag, ElementKind::String(Some(value.to_string())))
    }

    pub fn utf8(tag: u64, value: &str) -> Self {
        Element::new(tag, ElementKind::Utf8(Some(value.to_string())))
    }

    pub fn binary(tag: u64, value: &[u8]) -> Self {
        Element::new(tag, ElementKind::Binary(Some(value.to_vec())))
    }

    pub fn float(tag: u64, value: f64) -> Self {
        Element::new(tag, ElementKind::Float(Some(value)))
    }

    pub fn date(tag: u64, nanos: i64) -> Self {
        Element::new(tag, ElementKind::Date(Some(nanos)))
    }

    ///
    /// Marks the element as having an unknown size.  Only meaningful for masters; the writer emits the reserved unknown-size marker for them.
    ///
    pub fn with_unknown_size(mut self) -> Self {
        self.size = EbmlSize::Unknown;
        self
    }

    pub fn element_type(&self) -> ElementType {
        self.kind.element_type()
    }

    pub fn is_master(&self) -> bool {
        self.element_type().is_master()
    }

    pub fn is_complete(&self) -> bool {
        self.status == ElementStatus::Complete
    }

    pub fn declared_length(&self) -> Option<u64> {
        self.size.value()
    }

    ///
    /// The offset just past the element's data, if its size is known.
    ///
    pub fn end_offset(&self) -> Option<u64> {
        self.size.value().map(|len| self.start_offset.saturating_add(len))
    }

    pub fn children(&self) -> &[Element] {
        match &self.kind {
            ElementKind::Header(children) | ElementKind::Master(children) => children,
            _ => &[],
        }
    }

    ///
    /// Returns the first direct child with the given tag.
    ///
    pub fn find(&self, tag: u64) -> Option<&Element> {
        self.children().iter().find(|c| c.tag == tag)
    }

    pub fn find_all(&self, tag: u64) -> impl Iterator<Item = &Element> {
        self.children().iter().filter(move |c| c.tag == tag)
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        match self.kind {
            ElementKind::UnsignedInteger(val) => val,
            _ => None,
        }
    }

    pub fn as_signed(&self) -> Option<i64> {
        match self.kind {
            ElementKind::SignedInteger(val) => val,
            _ => None,
        }
    }

    ///
    /// Returns the value of a `string` or `utf-8` element.
    ///
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::String(val) | ElementKind::Utf8(val) => val.as_deref(),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match &self.kind {
            ElementKind::Binary(val) => val.as_deref(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.kind {
            ElementKind::Float(val) => val,
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<i64> {
        match self.kind {
            ElementKind::Date(val) => val,
            _ => None,
        }
    }
}

///
/// One EBML header plus every top level element that followed it, up to the next header or the end of the stream.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub header: Element,
    pub body: Vec<Element>,
}

impl Document {
    pub fn new(header: Element) -> Self {
        Document {
            header,
            body: Vec::new(),
        }
    }

    ///
    /// Typed access to the required header fields.
    ///
    pub fn header_fields(&self) -> HeaderFields<'_> {
        HeaderFields { header: &self.header }
    }

    ///
    /// Returns the first top level element with the given tag.
    ///
    pub fn find(&self, tag: u64) -> Option<&Element> {
        self.body.iter().find(|e| e.tag == tag)
    }

    ///
    /// Depth-first iteration over every element of the body (not the header).
    ///
    pub fn walk(&self) -> impl Iterator<Item = &Element> {
        let mut stack: Vec<&Element> = self.body.iter().rev().collect();
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children().iter().rev());
            Some(next)
        })
    }
}

///
/// Read-only view over an EBML header exposing its fields by name.
///
/// Every required field must occur exactly once.  Absence, duplication or a value that couldn't be read is reported as a [`HeaderError`] rather than papered over with a default.
///
#[derive(Copy, Clone, Debug)]
pub struct HeaderFields<'a> {
    header: &'a Element,
}

impl<'a> HeaderFields<'a> {

    ///
    /// Returns the single child with `tag`, failing if it is missing or repeated.
    ///
    pub fn required(&self, tag: u64, name: &'static str) -> Result<&'a Element, HeaderError> {
        match self.optional(tag, name)? {
            Some(element) => Ok(element),
            None => Err(HeaderError::Missing { tag, name }),
        }
    }

    ///
    /// Returns the child with `tag` if present, failing if it is repeated.
    ///
    pub fn optional(&self, tag: u64, name: &'static str) -> Result<Option<&'a Element>, HeaderError> {
        let mut found = self.header.find_all(tag);
        let first = found.next();
        let extra = found.count();
        if extra > 0 {
            return Err(HeaderError::Duplicate { tag, name, count: extra + 1 });
        }
        Ok(first)
    }

    fn unsigned(&self, tag: u64, name: &'static str) -> Result<u64, HeaderError> {
        self.required(tag, name)?.as_unsigned().ok_or(HeaderError::Unreadable { tag, name })
    }

    pub fn ebml_version(&self) -> Result<u64, HeaderError> {
        self.unsigned(header_spec::EBML_VERSION, "EBMLVersion")
    }

    pub fn ebml_read_version(&self) -> Result<u64, HeaderError> {
        self.unsigned(header_spec::EBML_READ_VERSION, "EBMLReadVersion")
    }

    pub fn ebml_max_id_length(&self) -> Result<u64, HeaderError> {
        self.unsigned(header_spec::EBML_MAX_ID_LENGTH, "EBMLMaxIDLength")
    }

    pub fn ebml_max_size_length(&self) -> Result<u64, HeaderError> {
        self.unsigned(header_spec::EBML_MAX_SIZE_LENGTH, "EBMLMaxSizeLength")
    }

    pub fn doc_type(&self) -> Result<&'a str, HeaderError> {
        let (tag, name) = (header_spec::DOC_TYPE, "DocType");
        self.required(tag, name)?.as_str().ok_or(HeaderError::Unreadable { tag, name })
    }

    pub fn doc_type_version(&self) -> Result<u64, HeaderError> {
        self.unsigned(header_spec::DOC_TYPE_VERSION, "DocTypeVersion")
    }

    pub fn doc_type_read_version(&self) -> Result<u64, HeaderError> {
        self.unsigned(header_spec::DOC_TYPE_READ_VERSION, "DocTypeReadVersion")
    }

    pub fn doc_type_extension(&self) -> Result<Option<&'a Element>, HeaderError> {
        self.optional(header_spec::DOC_TYPE_EXTENSION, "DocTypeExtension")
    }
}
