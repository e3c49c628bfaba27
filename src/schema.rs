//!
//! Loads element definitions from an `EBMLSchema` XML document (the format used by RFC 8794 and the Matroska project).
//!
//! Only the attributes needed for parsing are kept.  `<element>` entries are indexed by id when the document is loaded, but their type names are not resolved until a tag is actually looked up.
//!

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::warn;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use ebml_streaming_specification::{ElementDefinition, ElementType, SchemaSource};

use crate::errors::schema::SchemaError;

const ROOT: &[u8] = b"EBMLSchema";
const ELEMENT: &[u8] = b"element";

#[derive(Clone, Debug)]
struct SchemaEntry {
    name: String,
    path: String,
    type_name: String,
    default_value: Option<String>,
}

///
/// A [`SchemaSource`] backed by an `EBMLSchema` XML document.
///
/// ```
/// use ebml_streaming::schema::XmlSchema;
/// use ebml_streaming::specification::{ElementType, SchemaSource};
///
/// let schema = XmlSchema::from_str(r#"
///     <EBMLSchema xmlns="urn:ietf:rfc:8794" docType="webm" version="4">
///         <element name="Cluster" path="\Segment\Cluster" id="0x1F43B675" type="master"/>
///     </EBMLSchema>"#).unwrap();
///
/// let cluster = schema.find_by_tag(0x1F43B675).unwrap();
/// assert_eq!(ElementType::Master, cluster.element_type);
/// ```
///
#[derive(Clone, Debug, Default)]
pub struct XmlSchema {
    doc_type: Option<String>,
    entries: HashMap<u64, SchemaEntry>,
}

impl XmlSchema {

    ///
    /// Parses a schema from an in-memory document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MissingRoot`] if the document's root isn't `EBMLSchema`, or an error if the XML is malformed or an element id can't be read.
    ///
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(document: &str) -> Result<Self, SchemaError> {
        Self::from_reader(document.as_bytes())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(source: R) -> Result<Self, SchemaError> {
        let mut reader = Reader::from_reader(source);
        let mut schema = XmlSchema::default();
        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut saw_root = false;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    schema.visit(e, depth, &mut saw_root)?;
                    depth += 1;
                },
                Event::Empty(ref e) => {
                    schema.visit(e, depth, &mut saw_root)?;
                },
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !saw_root {
            return Err(SchemaError::MissingRoot);
        }
        Ok(schema)
    }

    fn visit(&mut self, e: &BytesStart, depth: usize, saw_root: &mut bool) -> Result<(), SchemaError> {
        match depth {
            0 => {
                if e.local_name().as_ref() != ROOT {
                    return Err(SchemaError::MissingRoot);
                }
                *saw_root = true;
                self.doc_type = attribute(e, "docType")?;
            },
            1 if e.local_name().as_ref() == ELEMENT => {
                let name = attribute(e, "name")?.unwrap_or_default();
                let id = attribute(e, "id")?.unwrap_or_default();
                let tag = parse_id(&id).ok_or_else(|| SchemaError::InvalidId { name: name.clone(), id: id.clone() })?;
                let entry = SchemaEntry {
                    path: attribute(e, "path")?.unwrap_or_default(),
                    type_name: attribute(e, "type")?.unwrap_or_default(),
                    default_value: attribute(e, "default")?,
                    name,
                };
                if self.entries.contains_key(&tag) {
                    warn!("Schema declares id 0x{tag:X} more than once; keeping the first declaration");
                } else {
                    self.entries.insert(tag, entry);
                }
            },
            _ => {}
        }
        Ok(())
    }

    ///
    /// The `docType` attribute of the schema root, if present.
    ///
    pub fn doc_type(&self) -> Option<&str> {
        self.doc_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SchemaSource for XmlSchema {
    fn find_by_tag(&self, tag: u64) -> Option<ElementDefinition> {
        let entry = self.entries.get(&tag)?;
        let element_type = match ElementType::from_schema_name(&entry.type_name) {
            Some(element_type) => element_type,
            None => {
                warn!("Schema element '{}' (0x{:X}) has unsupported type '{}'", entry.name, tag, entry.type_name);
                return None;
            }
        };

        let definition = ElementDefinition::new(tag, &entry.name, &entry.path, element_type);
        Some(match &entry.default_value {
            Some(default_value) => definition.with_default(default_value),
            None => definition,
        })
    }
}

fn attribute(e: &BytesStart, name: &str) -> Result<Option<String>, SchemaError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| SchemaError::Xml(quick_xml::Error::from(err)))?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(std::str::from_utf8(&attr.value)?.to_string()));
        }
    }
    Ok(None)
}

///
/// Schema ids are usually hex (`0x1A45DFA3`) but plain decimal is accepted too.
///
fn parse_id(id: &str) -> Option<u64> {
    let id = id.trim();
    let tag = match id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => id.parse().ok(),
    };
    tag.filter(|tag| *tag != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<EBMLSchema xmlns="urn:ietf:rfc:8794" docType="webm" version="4">
  <element name="Segment" path="\Segment" id="0x18538067" type="master" unknownsizeallowed="1">
    <documentation lang="en" purpose="definition">The Root Element.</documentation>
  </element>
  <element name="Timestamp" path="\Segment\Cluster\Timestamp" id="231" type="uinteger"/>
  <element name="TimestampScale" path="\Segment\Info\TimestampScale" id="0x2AD7B1" type="uinteger" default="1000000"/>
  <element name="Odd" path="\Segment\Odd" id="0x4000" type="complex"/>
</EBMLSchema>"#;

    #[test]
    fn reads_elements() {
        let schema = XmlSchema::from_str(SCHEMA).unwrap();
        assert_eq!(4, schema.len());
        assert_eq!(Some("webm"), schema.doc_type());

        let segment = schema.find_by_tag(0x18538067).unwrap();
        assert_eq!("Segment", segment.name);
        assert_eq!(ElementType::Master, segment.element_type);
        assert!(segment.element_path().is_root());
    }

    #[test]
    fn decimal_ids() {
        let schema = XmlSchema::from_str(SCHEMA).unwrap();
        let timestamp = schema.find_by_tag(0xE7).unwrap();
        assert_eq!("Timestamp", timestamp.name);
        assert!(schema.find_by_tag(231 + 1).is_none());
    }

    #[test]
    fn default_values_kept() {
        let schema = XmlSchema::from_str(SCHEMA).unwrap();
        let scale = schema.find_by_tag(0x2AD7B1).unwrap();
        assert_eq!(Some("1000000".to_string()), scale.default_value);
    }

    #[test]
    fn unsupported_type_is_a_miss() {
        let schema = XmlSchema::from_str(SCHEMA).unwrap();
        assert!(schema.find_by_tag(0x4000).is_none());
    }

    #[test]
    fn wrong_root() {
        let result = XmlSchema::from_str(r#"<Schema><element name="A" id="0x81" type="uinteger"/></Schema>"#);
        assert!(matches!(result, Err(SchemaError::MissingRoot)));
    }

    #[test]
    fn empty_document() {
        assert!(matches!(XmlSchema::from_str(""), Err(SchemaError::MissingRoot)));
    }

    #[test]
    fn bad_id() {
        let result = XmlSchema::from_str(r#"<EBMLSchema><element name="A" path="\A" id="0xZZ" type="uinteger"/></EBMLSchema>"#);
        match result {
            Err(SchemaError::InvalidId { name, id }) => {
                assert_eq!("A", name);
                assert_eq!("0xZZ", id);
            },
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn nested_elements_ignored() {
        let schema = XmlSchema::from_str(r#"<EBMLSchema>
            <element name="A" path="\A" id="0x81" type="master">
                <extension><element name="Inner" id="0x82" type="uinteger"/></extension>
            </element>
        </EBMLSchema>"#).unwrap();
        assert_eq!(1, schema.len());
        assert!(schema.find_by_tag(0x82).is_none());
    }
}
