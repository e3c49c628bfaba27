use super::{ElementDefinition, ElementType};

pub const EBML: u64 = 0x1A45DFA3;
pub const EBML_VERSION: u64 = 0x4286;
pub const EBML_READ_VERSION: u64 = 0x42F7;
pub const EBML_MAX_ID_LENGTH: u64 = 0x42F2;
pub const EBML_MAX_SIZE_LENGTH: u64 = 0x42F3;
pub const DOC_TYPE: u64 = 0x4282;
pub const DOC_TYPE_VERSION: u64 = 0x4287;
pub const DOC_TYPE_READ_VERSION: u64 = 0x4285;
pub const DOC_TYPE_EXTENSION: u64 = 0x4281;
pub const DOC_TYPE_EXTENSION_NAME: u64 = 0x4283;
pub const DOC_TYPE_EXTENSION_VERSION: u64 = 0x4284;

pub const VOID: u64 = 0xEC;
pub const CRC_32: u64 = 0xBF;

///
/// The Matroska/WebM tag carrying an opaque compressed audio (or video) packet.
///
pub const SIMPLE_BLOCK: u64 = 0xA3;

///
/// Returns the definitions every registry is seeded with.
///
/// This covers the EBML header (RFC 8794 section 11.2), the two EBML global elements and the `SimpleBlock` payload tag so that payload extraction works even when the supplied schema omits it.
///
pub fn builtin_definitions() -> Vec<ElementDefinition> {
    vec![
        ElementDefinition::new(EBML, "EBML", r"\EBML", ElementType::Header),
        ElementDefinition::new(EBML_VERSION, "EBMLVersion", r"\EBML\EBMLVersion", ElementType::UnsignedInteger).with_default("1"),
        ElementDefinition::new(EBML_READ_VERSION, "EBMLReadVersion", r"\EBML\EBMLReadVersion", ElementType::UnsignedInteger).with_default("1"),
        ElementDefinition::new(EBML_MAX_ID_LENGTH, "EBMLMaxIDLength", r"\EBML\EBMLMaxIDLength", ElementType::UnsignedInteger).with_default("4"),
        ElementDefinition::new(EBML_MAX_SIZE_LENGTH, "EBMLMaxSizeLength", r"\EBML\EBMLMaxSizeLength", ElementType::UnsignedInteger).with_default("8"),
        ElementDefinition::new(DOC_TYPE, "DocType", r"\EBML\DocType", ElementType::String),
        ElementDefinition::new(DOC_TYPE_VERSION, "DocTypeVersion", r"\EBML\DocTypeVersion", ElementType::UnsignedInteger).with_default("1"),
        ElementDefinition::new(DOC_TYPE_READ_VERSION, "DocTypeReadVersion", r"\EBML\DocTypeReadVersion", ElementType::UnsignedInteger).with_default("1"),
        ElementDefinition::new(DOC_TYPE_EXTENSION, "DocTypeExtension", r"\EBML\DocTypeExtension", ElementType::Master),
        ElementDefinition::new(DOC_TYPE_EXTENSION_NAME, "DocTypeExtensionName", r"\EBML\DocTypeExtension\DocTypeExtensionName", ElementType::String),
        ElementDefinition::new(DOC_TYPE_EXTENSION_VERSION, "DocTypeExtensionVersion", r"\EBML\DocTypeExtension\DocTypeExtensionVersion", ElementType::UnsignedInteger),
        ElementDefinition::new(VOID, "Void", r"\(-\)Void", ElementType::Binary),
        ElementDefinition::new(CRC_32, "CRC-32", r"\(1-\)CRC-32", ElementType::Binary),
        ElementDefinition::new(SIMPLE_BLOCK, "SimpleBlock", r"\Segment\Cluster\SimpleBlock", ElementType::Binary),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_the_only_header_type() {
        let defs = builtin_definitions();
        let headers: Vec<_> = defs.iter().filter(|d| d.element_type == ElementType::Header).collect();
        assert_eq!(1, headers.len());
        assert_eq!(EBML, headers[0].tag);
    }

    #[test]
    fn header_children_sit_below_ebml() {
        let defs = builtin_definitions();
        let ebml = defs.iter().find(|d| d.tag == EBML).unwrap();
        for def in defs.iter().filter(|d| d.path.starts_with(r"\EBML\")) {
            assert!(ebml.may_contain(def), "{} should be a child of EBML", def.name);
        }
    }

    #[test]
    fn tags_are_unique() {
        let defs = builtin_definitions();
        let mut tags: Vec<u64> = defs.iter().map(|d| d.tag).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(defs.len(), tags.len());
    }
}
