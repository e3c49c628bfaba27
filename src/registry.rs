use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use log::trace;

use ebml_streaming_specification::{header_spec, ElementDefinition, SchemaSource};

use crate::errors::schema::SchemaError;
use crate::schema::XmlSchema;

///
/// Resolves tag ids to element definitions for the parser.
///
/// Lookups check the built-in EBML header table first and fall back to the supplied [`SchemaSource`].  Every result is memoized for the lifetime of the registry, misses included, so a slow source is consulted at most once per tag.
///
/// The cache sits behind a read/write lock: a registry can be wrapped in an [`Arc`] and shared between several parsers (or threads).
///
pub struct SchemaRegistry {
    builtin: HashMap<u64, Arc<ElementDefinition>>,
    source: Option<Box<dyn SchemaSource + Send + Sync>>,
    cache: RwLock<HashMap<u64, Option<Arc<ElementDefinition>>>>,
}

impl SchemaRegistry {

    ///
    /// Creates a registry backed by `source`.
    ///
    pub fn new<S>(source: S) -> Self
        where S: SchemaSource + Send + Sync + 'static
    {
        SchemaRegistry {
            builtin: builtin_table(),
            source: Some(Box::new(source)),
            cache: RwLock::new(HashMap::new()),
        }
    }

    ///
    /// Creates a registry that only knows the EBML header, the global `Void`/`CRC-32` elements and `SimpleBlock`.
    ///
    pub fn builtin_only() -> Self {
        SchemaRegistry {
            builtin: builtin_table(),
            source: None,
            cache: RwLock::new(HashMap::new()),
        }
    }

    ///
    /// Creates a registry from an `EBMLSchema` XML document.
    ///
    /// # Errors
    ///
    /// Fails if the document can't be parsed; see [`XmlSchema::from_str`].
    ///
    pub fn from_xml(document: &str) -> Result<Self, SchemaError> {
        Ok(Self::new(XmlSchema::from_str(document)?))
    }

    pub fn from_xml_path<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        Ok(Self::new(XmlSchema::from_path(path)?))
    }

    ///
    /// Returns the definition for `tag`, or `None` if neither the built-in table nor the schema describe it.
    ///
    pub fn lookup(&self, tag: u64) -> Option<Arc<ElementDefinition>> {
        if let Some(definition) = self.builtin.get(&tag) {
            return Some(definition.clone());
        }

        if let Some(cached) = self.cache.read().unwrap_or_else(PoisonError::into_inner).get(&tag) {
            return cached.clone();
        }

        let resolved = self.source.as_ref().and_then(|source| source.find_by_tag(tag)).map(Arc::new);
        match &resolved {
            Some(definition) => trace!("Resolved tag 0x{:X} as {} ({})", tag, definition.name, definition.element_type),
            None => trace!("Tag 0x{:X} is not described by the schema", tag),
        }

        // Another reader may have resolved the tag in the meantime; keep whichever landed first
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(tag)
            .or_insert(resolved)
            .clone()
    }

    ///
    /// Number of schema lookups memoized so far (built-in tags aren't counted).
    ///
    pub fn cached_len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin_only()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("builtin", &self.builtin.len())
            .field("has_source", &self.source.is_some())
            .field("cached", &self.cached_len())
            .finish()
    }
}

fn builtin_table() -> HashMap<u64, Arc<ElementDefinition>> {
    header_spec::builtin_definitions()
        .into_iter()
        .map(|definition| (definition.tag, Arc::new(definition)))
        .collect()
}
