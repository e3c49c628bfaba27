use std::collections::HashMap;

use super::{ElementDefinition, SchemaSource};

///
/// A schema kept entirely in memory.
///
/// Handy for tests and for applications that only care about a handful of tags and don't want to ship a full schema document.
///
/// ```
/// use ebml_streaming_specification::{ElementDefinition, ElementType, SchemaSource};
/// use ebml_streaming_specification::inline_spec::InlineSchema;
///
/// let schema = InlineSchema::new()
///     .with(ElementDefinition::new(0x18538067, "Segment", r"\Segment", ElementType::Master));
/// assert_eq!("Segment", schema.find_by_tag(0x18538067).unwrap().name);
/// assert!(schema.find_by_tag(0x1F43B675).is_none());
/// ```
///
#[derive(Clone, Debug, Default)]
pub struct InlineSchema {
    definitions: HashMap<u64, ElementDefinition>,
}

impl InlineSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, definition: ElementDefinition) -> Self {
        self.insert(definition);
        self
    }

    ///
    /// Adds a definition, replacing any previous one with the same tag.
    ///
    pub fn insert(&mut self, definition: ElementDefinition) {
        self.definitions.insert(definition.tag, definition);
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl FromIterator<ElementDefinition> for InlineSchema {
    fn from_iter<I: IntoIterator<Item = ElementDefinition>>(iter: I) -> Self {
        let mut schema = InlineSchema::new();
        for definition in iter {
            schema.insert(definition);
        }
        schema
    }
}

impl SchemaSource for InlineSchema {
    fn find_by_tag(&self, tag: u64) -> Option<ElementDefinition> {
        self.definitions.get(&tag).cloned()
    }
}
