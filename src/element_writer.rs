use std::io::Write;

use super::element::{Document, EbmlSize, Element, ElementKind};
use super::errors::writer::WriterError;
use super::tools::{self, Vint};

///
/// Serializes [`Element`] trees to EBML.  Writes to a destination that implements [`std::io::Write`].
///
/// No schema is needed: every element carries its tag id and a typed value, which is all that is required to encode it.  Sizes are computed from the data actually written (the `size` recorded on a parsed element is ignored), except that masters marked [`EbmlSize::Unknown`] are written with the reserved unknown-size marker and no closing boundary, the way live recorders emit `Segment` and `Cluster`.
///
/// Integers are written in their shortest form and floats always use 8 bytes.
///
/// ## Example
///
/// ```
/// use ebml_streaming::{Element, ElementWriter};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut dest = Vec::new();
/// let mut writer = ElementWriter::new(&mut dest);
/// writer.write(&Element::header(vec![Element::unsigned(0x4286, 1)]))?;
/// assert_eq!(vec![0x1A, 0x45, 0xDF, 0xA3, 0x84, 0x42, 0x86, 0x81, 0x01], dest);
/// # Ok(())
/// # }
/// ```
///
pub struct ElementWriter<W: Write>
{
    dest: W,
    open_tags: Vec<(u64, usize)>,
    working_buffer: Vec<u8>,
}

impl<W: Write> ElementWriter<W>
{
    pub fn new(dest: W) -> Self {
        ElementWriter {
            dest,
            open_tags: Vec::new(),
            working_buffer: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.dest
    }

    fn start_tag(&mut self, id: u64) {
        self.open_tags.push((id, self.working_buffer.len()));
    }

    fn end_tag(&mut self) -> Result<(), WriterError> {
        if let Some((id, start)) = self.open_tags.pop() {
            self.finalize_tag(id, self.working_buffer.len() - start)?;
        }
        Ok(())
    }

    fn write_data_tag(&mut self, id: u64, data: &[u8]) -> Result<(), WriterError> {
        self.working_buffer.extend_from_slice(data);
        self.finalize_tag(id, data.len())
    }

    fn finalize_tag(&mut self, id: u64, size: usize) -> Result<(), WriterError> {
        let size_vint = (size as u64).as_vint()?;

        let index = self.working_buffer.len() - size;
        self.working_buffer.splice(index..index, tools::tag_id_bytes(id).into_iter().chain(size_vint));

        self.flush_completed()
    }

    fn flush_completed(&mut self) -> Result<(), WriterError> {
        if self.open_tags.is_empty() {
            self.dest.write_all(&self.working_buffer)?;
            self.working_buffer.clear();
            self.dest.flush()?;
        }
        Ok(())
    }

    ///
    /// Writes an element and, for masters, all of its children.
    ///
    /// # Errors
    ///
    /// Fails with [`WriterError::MissingValue`] if a leaf in the tree has no value (an incomplete or malformed element from a parser), or if writing to the destination fails.
    ///
    pub fn write(&mut self, element: &Element) -> Result<(), WriterError> {
        let tag = element.tag;
        match &element.kind {
            ElementKind::Header(children) | ElementKind::Master(children) => {
                if element.size == EbmlSize::Unknown {
                    self.start_unknown_sized(tag)?;
                    for child in children {
                        self.write(child)?;
                    }
                } else {
                    self.start_tag(tag);
                    for child in children {
                        self.write(child)?;
                    }
                    self.end_tag()?;
                }
                Ok(())
            },
            ElementKind::UnsignedInteger(Some(val)) => self.write_data_tag(tag, &tools::u64_to_arr(*val)),
            ElementKind::SignedInteger(Some(val)) => self.write_data_tag(tag, &tools::i64_to_arr(*val)),
            ElementKind::String(Some(val)) | ElementKind::Utf8(Some(val)) => self.write_data_tag(tag, val.as_bytes()),
            ElementKind::Binary(Some(val)) => self.write_data_tag(tag, val),
            ElementKind::Float(Some(val)) => self.write_data_tag(tag, &val.to_be_bytes()),
            ElementKind::Date(Some(val)) => self.write_data_tag(tag, &val.to_be_bytes()),
            _ => Err(WriterError::MissingValue { tag }),
        }
    }

    ///
    /// Writes the header of a document followed by its body.
    ///
    pub fn write_document(&mut self, document: &Document) -> Result<(), WriterError> {
        self.write(&document.header)?;
        for element in &document.body {
            self.write(element)?;
        }
        Ok(())
    }

    ///
    /// Writes `data` as the value of `tag`, without interpreting it.
    ///
    pub fn write_raw(&mut self, tag: u64, data: &[u8]) -> Result<(), WriterError> {
        self.write_data_tag(tag, data)
    }

    ///
    /// Writes the header of a master with unknown size.  Everything written afterwards is, structurally, inside of it until an element appears that the schema places elsewhere.
    ///
    pub fn start_unknown_sized(&mut self, tag: u64) -> Result<(), WriterError> {
        self.working_buffer.extend(tools::tag_id_bytes(tag));
        self.working_buffer.extend_from_slice(&tools::UNKNOWN_SIZE);
        self.flush_completed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(element: &Element) -> Vec<u8> {
        let mut dest = Vec::new();
        ElementWriter::new(&mut dest).write(element).expect("Error writing element");
        dest
    }

    #[test]
    fn write_ebml_tag() {
        let mut dest = Vec::new();
        let mut writer = ElementWriter::new(&mut dest);
        writer.write_raw(0x1a45dfa3, &[]).expect("Error writing tag");

        let zero_size = 0u64.as_vint().expect("Error converting [0] to vint")[0];
        assert_eq!(vec![0x1a, 0x45, 0xdf, 0xa3, zero_size], dest);
    }

    #[test]
    fn nested_sizes() {
        let cluster = Element::master(0x1F43B675, vec![
            Element::unsigned(0xE7, 0x0102),
            Element::master(0xA0, vec![Element::binary(0xA1, &[9, 9, 9])]),
        ]);
        assert_eq!(vec![
            0x1F, 0x43, 0xB6, 0x75, 0x8B,
                0xE7, 0x82, 0x01, 0x02,
                0xA0, 0x85,
                    0xA1, 0x83, 9, 9, 9,
        ], written(&cluster));
    }

    #[test]
    fn unknown_sized_master() {
        let segment = Element::master(0x18538067, vec![Element::signed(0xFB, -2)]).with_unknown_size();
        assert_eq!(vec![
            0x18, 0x53, 0x80, 0x67, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
            0xFB, 0x81, 0xFE,
        ], written(&segment));
    }

    #[test]
    fn floats_use_eight_bytes() {
        let bytes = written(&Element::float(0x4489, 1.5));
        assert_eq!(vec![0x44, 0x89, 0x88], bytes[..3].to_vec());
        assert_eq!(1.5f64.to_be_bytes().to_vec(), bytes[3..].to_vec());
    }

    #[test]
    fn missing_values_rejected() {
        let mut dest = Vec::new();
        let mut writer = ElementWriter::new(&mut dest);
        let incomplete = Element::new(0xE7, ElementKind::UnsignedInteger(None));
        assert!(matches!(writer.write(&incomplete), Err(WriterError::MissingValue { tag: 0xE7 })));
    }
}
