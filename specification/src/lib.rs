//! This crate provides the schema vocabulary used by the ebml-streaming parser.
//!
//! A schema describes which tags exist, what type of data each tag carries and where in the element hierarchy it may appear.  The parser only ships with the EBML header definitions (see [`header_spec`]); everything else is resolved through a [`SchemaSource`].
//!

use std::fmt;
use std::sync::Arc;

///
/// Contains the built-in EBML header definitions that every parser is seeded with.
///
pub mod header_spec;

///
/// Contains an in-memory schema, mostly useful for tests or for consumers that build their dictionary in code.
///
pub mod inline_spec;

///
/// Different data types defined in the EBML specification.
///
/// `Header` is not part of any schema document: it is reserved for the EBML root element, which opens a new document in the stream.
///
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum ElementType {
    Header,
    Master,
    UnsignedInteger,
    SignedInteger,
    String,
    Utf8,
    Binary,
    Float,
    Date,
}

impl ElementType {

    ///
    /// Resolves a type name as written in an `EBMLSchema` document (`uinteger`, `utf-8`, ...).
    ///
    /// Returns `None` for names that are not part of the EBML type vocabulary.
    ///
    pub fn from_schema_name(name: &str) -> Option<Self> {
        match name {
            "master" => Some(ElementType::Master),
            "uinteger" => Some(ElementType::UnsignedInteger),
            "integer" => Some(ElementType::SignedInteger),
            "string" => Some(ElementType::String),
            "utf-8" => Some(ElementType::Utf8),
            "binary" => Some(ElementType::Binary),
            "float" => Some(ElementType::Float),
            "date" => Some(ElementType::Date),
            _ => None,
        }
    }

    pub fn schema_name(&self) -> &'static str {
        match self {
            ElementType::Header => "header",
            ElementType::Master => "master",
            ElementType::UnsignedInteger => "uinteger",
            ElementType::SignedInteger => "integer",
            ElementType::String => "string",
            ElementType::Utf8 => "utf-8",
            ElementType::Binary => "binary",
            ElementType::Float => "float",
            ElementType::Date => "date",
        }
    }

    ///
    /// Whether elements of this type contain other elements rather than a value.
    ///
    pub fn is_master(&self) -> bool {
        matches!(self, ElementType::Header | ElementType::Master)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema_name())
    }
}

///
/// One segment of an element path.
///
/// Paths come from the `path` attribute of an `EBMLSchema` element, e.g. `\Segment\Cluster\SimpleBlock`.  Global elements such as `Void` use a placeholder segment (`\(-\)Void`) that allows them to appear at any depth within the given bounds.
///
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum PathPart {
    Name(String),
    Global { min: Option<u64>, max: Option<u64> },
}

///
/// A parsed element path.
///
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct ElementPath {
    parts: Vec<PathPart>,
}

impl ElementPath {

    ///
    /// Parses the textual path syntax used by `EBMLSchema` documents.
    ///
    /// The recursive marker (`+`) in front of a name is dropped, since the parser doesn't restrict recursion depth.  Malformed global bounds are treated as unbounded.
    ///
    pub fn parse(path: &str) -> Self {
        let mut parts = Vec::new();
        let mut rest = path.trim();

        while !rest.is_empty() {
            rest = rest.trim_start_matches('\\');
            if rest.is_empty() {
                break;
            }

            if let Some(global) = rest.strip_prefix('(') {
                // Global placeholder: `(min-max\)` where the closing paren is escaped with a backslash
                let end = global.find(')').unwrap_or(global.len());
                let bounds = global[..end].trim_end_matches('\\');
                let (min, max) = match bounds.split_once('-') {
                    Some((min, max)) => (min.trim().parse().ok(), max.trim().parse().ok()),
                    None => (bounds.trim().parse().ok(), None),
                };
                parts.push(PathPart::Global { min, max });
                rest = &global[(end + 1).min(global.len())..];
                continue;
            }

            let end = rest.find('\\').unwrap_or(rest.len());
            let name = rest[..end].trim_start_matches('+');
            if !name.is_empty() {
                parts.push(PathPart::Name(name.to_string()));
            }
            rest = &rest[end..];
        }

        ElementPath { parts }
    }

    pub fn parts(&self) -> &[PathPart] {
        &self.parts
    }

    ///
    /// Names of every ancestor listed in the path (the final segment is the element itself).
    ///
    pub fn ancestor_names(&self) -> impl Iterator<Item = &str> {
        let len = self.parts.len().saturating_sub(1);
        self.parts[..len].iter().filter_map(|p| match p {
            PathPart::Name(name) => Some(name.as_str()),
            PathPart::Global { .. } => None,
        })
    }

    ///
    /// Whether the path contains a global placeholder, allowing the element under any parent.
    ///
    pub fn is_global(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, PathPart::Global { .. }))
    }

    ///
    /// Whether the path describes a top level element (e.g. `\Segment` or `\EBML`).
    ///
    pub fn is_root(&self) -> bool {
        self.parts.len() == 1 && matches!(self.parts[0], PathPart::Name(_))
    }

    pub fn depth(&self) -> usize {
        self.parts.len()
    }
}

///
/// Immutable description of a single tag.
///
#[derive(Clone, PartialEq, Debug)]
pub struct ElementDefinition {
    pub tag: u64,
    pub name: String,
    pub path: String,
    pub element_type: ElementType,
    pub default_value: Option<String>,
    parsed_path: ElementPath,
}

impl ElementDefinition {
    pub fn new(tag: u64, name: &str, path: &str, element_type: ElementType) -> Self {
        ElementDefinition {
            tag,
            name: name.trim().to_string(),
            path: path.to_string(),
            element_type,
            default_value: None,
            parsed_path: ElementPath::parse(path),
        }
    }

    pub fn with_default(mut self, default_value: &str) -> Self {
        self.default_value = Some(default_value.to_string());
        self
    }

    pub fn element_path(&self) -> &ElementPath {
        &self.parsed_path
    }

    ///
    /// Returns whether an element described by `other` may legally sit somewhere below an element described by `self`.
    ///
    /// Global elements are allowed anywhere.  Otherwise `self` has to be listed as one of `other`'s ancestors.
    ///
    pub fn may_contain(&self, other: &ElementDefinition) -> bool {
        let path = other.element_path();
        path.is_global() || path.ancestor_names().any(|name| name == self.name)
    }
}

///
/// A source of element definitions.
///
/// Implementors must return `None` for any tag they don't describe.  Lookups may be slow (e.g. a linear scan of a schema document) - callers are expected to memoize the result, which is what the parser's registry does.
///
pub trait SchemaSource {
    fn find_by_tag(&self, tag: u64) -> Option<ElementDefinition>;
}

impl<S: SchemaSource + ?Sized> SchemaSource for Box<S> {
    fn find_by_tag(&self, tag: u64) -> Option<ElementDefinition> {
        (**self).find_by_tag(tag)
    }
}

impl<S: SchemaSource + ?Sized> SchemaSource for Arc<S> {
    fn find_by_tag(&self, tag: u64) -> Option<ElementDefinition> {
        (**self).find_by_tag(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_path() {
        let path = ElementPath::parse(r"\Segment\Cluster\SimpleBlock");
        assert_eq!(3, path.depth());
        assert_eq!(vec!["Segment", "Cluster"], path.ancestor_names().collect::<Vec<_>>());
        assert!(!path.is_global());
        assert!(!path.is_root());
    }

    #[test]
    fn parse_global_path() {
        let path = ElementPath::parse(r"\(-\)Void");
        assert_eq!(&[PathPart::Global { min: None, max: None }, PathPart::Name("Void".to_string())], path.parts());
        assert!(path.is_global());

        let path = ElementPath::parse(r"\(1-\)CRC-32");
        assert_eq!(PathPart::Global { min: Some(1), max: None }, path.parts()[0]);
    }

    #[test]
    fn parse_recursive_path() {
        let path = ElementPath::parse(r"\Segment\Tags\Tag\+SimpleTag");
        assert_eq!(Some(&PathPart::Name("SimpleTag".to_string())), path.parts().last());
    }

    #[test]
    fn root_path() {
        assert!(ElementPath::parse(r"\Segment").is_root());
        assert!(ElementPath::parse(r"\EBML").is_root());
    }

    #[test]
    fn containment() {
        let cluster = ElementDefinition::new(0x1F43B675, "Cluster", r"\Segment\Cluster", ElementType::Master);
        let block = ElementDefinition::new(0xA3, "SimpleBlock", r"\Segment\Cluster\SimpleBlock", ElementType::Binary);
        let void = ElementDefinition::new(0xEC, "Void", r"\(-\)Void", ElementType::Binary);
        let info = ElementDefinition::new(0x1549A966, "Info", r"\Segment\Info", ElementType::Master);

        assert!(cluster.may_contain(&block));
        assert!(cluster.may_contain(&void));
        assert!(!cluster.may_contain(&info));
        assert!(!cluster.may_contain(&cluster));
    }

    #[test]
    fn schema_type_names() {
        assert_eq!(Some(ElementType::Utf8), ElementType::from_schema_name("utf-8"));
        assert_eq!(Some(ElementType::UnsignedInteger), ElementType::from_schema_name("uinteger"));
        assert_eq!(None, ElementType::from_schema_name("header"));
        assert!(ElementType::Header.is_master());
        assert!(!ElementType::Binary.is_master());
    }
}
