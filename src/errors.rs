pub mod tool {
    use std::string::FromUtf8Error;

    #[derive(thiserror::Error, Debug, Clone, PartialEq)]
    pub enum ToolError {
        #[error("Unrepresentable Vint size encountered.")]
        ReadVintOverflow,

        #[error("Value too large to be written as a vint: {0}")]
        WriteVintOverflow(u64),

        #[error("Value outside the range of a signed vint: {0}")]
        WriteSignedVintOverflow(i64),

        #[error("Could not read unsigned int from array: {0:?}")]
        ReadU64Overflow(Vec<u8>),

        #[error("Could not read int from array: {0:?}")]
        ReadI64Overflow(Vec<u8>),

        #[error("Could not read float from array: {0:?}")]
        ReadF64Mismatch(Vec<u8>),

        #[error("Could not read date from array: {0:?}")]
        ReadDateMismatch(Vec<u8>),

        #[error("Could not read utf8 string from array")]
        FromUtf8Error(#[source] FromUtf8Error),

        #[error("Could not interpret default value '{value}' as {expected}")]
        DefaultValueMismatch { value: String, expected: &'static str },
    }
}

pub mod schema {
    use std::io;

    #[derive(thiserror::Error, Debug)]
    pub enum SchemaError {
        #[error("Provided schema is not an EBMLSchema document")]
        MissingRoot,

        #[error("XML parsing error: {0}")]
        Xml(#[from] quick_xml::Error),

        #[error("UTF-8 encoding error: {0}")]
        Utf8(#[from] std::str::Utf8Error),

        #[error("Schema element '{name}' has an invalid id '{id}'")]
        InvalidId { name: String, id: String },

        #[error("Error reading schema document")]
        Io(#[from] io::Error),
    }
}

pub mod document {

    #[derive(thiserror::Error, Debug, Clone, PartialEq)]
    pub enum HeaderError {
        #[error("Header element {name} (0x{tag:X}) is missing")]
        Missing { tag: u64, name: &'static str },

        #[error("Header element {name} (0x{tag:X}) occurs {count} times, expected once")]
        Duplicate { tag: u64, name: &'static str, count: usize },

        #[error("Header element {name} (0x{tag:X}) has no readable value")]
        Unreadable { tag: u64, name: &'static str },
    }
}

pub mod writer {
    use std::io;

    #[derive(thiserror::Error, Debug)]
    pub enum WriterError {
        #[error("Element 0x{tag:X} has no value to write")]
        MissingValue { tag: u64 },

        #[error("Problem writing data tag size. {0}")]
        TagSize(#[from] super::tool::ToolError),

        #[error("Error writing to destination.")]
        Write(#[from] io::Error),
    }
}

pub mod parser {
    use super::tool::ToolError;

    ///
    /// A problem found while reading the stream.
    ///
    /// None of these stop the parser: they are reported through trace events and logged, and parsing continues with the next element.
    ///
    #[derive(thiserror::Error, Debug, Clone, PartialEq)]
    pub enum ParseFault {
        #[error("Unknown tag id 0x{tag:X} at offset {offset}, skipping {size:?} bytes")]
        UnknownTag { tag: u64, offset: u64, size: Option<u64> },

        #[error("Corrupted element header at offset {offset}")]
        CorruptHeader { offset: u64, #[source] source: ToolError },

        #[error("Could not interpret value of tag 0x{tag:X} at offset {offset}")]
        Materialization { tag: u64, offset: u64, #[source] source: ToolError },

        #[error("Tag 0x{tag:X} at offset {offset} appeared before any EBML header")]
        OutsideDocument { tag: u64, offset: u64 },

        #[error("Value element 0x{tag:X} at offset {offset} declares an unknown size")]
        UnknownSizedValue { tag: u64, offset: u64 },

        #[error("Discarded {length} unparsed bytes at offset {offset}")]
        DiscardedTail { offset: u64, length: usize },
    }

    #[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FeedError {
        #[error("The parser this feeder belongs to has been dropped")]
        ParserDropped,
    }
}
