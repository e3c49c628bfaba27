use std::sync::Arc;

use ebml_streaming_specification::ElementDefinition;

use crate::element::{Document, Element, ElementKind};

///
/// The document currently being assembled by the parser.
///
/// Masters that are still receiving children are kept in `open` (outermost first) rather than inside their parent; each entry's parent is the entry before it, or the header/body when it is the first one.  When a master closes it is moved into its parent, so the finished tree is owned strictly top-down.
///
#[derive(Clone, Debug)]
pub(crate) struct OpenDocument {
    header: Element,
    header_open: bool,
    body: Vec<Element>,
    open: Vec<Element>,
}

impl OpenDocument {
    pub fn new(header: Element) -> Self {
        OpenDocument {
            header,
            header_open: true,
            body: Vec::new(),
            open: Vec::new(),
        }
    }

    fn target(&mut self) -> &mut Vec<Element> {
        if let Some(master) = self.open.last_mut() {
            if let ElementKind::Master(children) | ElementKind::Header(children) = &mut master.kind {
                return children;
            }
        }
        if self.header_open {
            if let ElementKind::Header(children) = &mut self.header.kind {
                return children;
            }
        }
        &mut self.body
    }

    ///
    /// Tag of the innermost open master, if any.  The header counts while it is still open.
    ///
    pub fn open_master_tag(&self) -> Option<u64> {
        match self.open.last() {
            Some(master) => Some(master.tag),
            None if self.header_open => Some(self.header.tag),
            None => None,
        }
    }

    pub fn depth(&self) -> usize {
        self.open.len() + usize::from(self.header_open)
    }

    ///
    /// Attaches `child` to the innermost open master (or the body), then closes every ancestor that ends at or before `cursor`.
    ///
    /// Returns the tags of the closed masters, innermost first.
    ///
    pub fn add_child(&mut self, child: Element, cursor: u64) -> Vec<u64> {
        self.attach(child);
        self.close_ended(cursor)
    }

    ///
    /// Attaches `child` without running the closing walk.  Used for values whose bytes haven't been read yet: the element has to stay reachable through [`Self::last_attached_mut`] until they are.
    ///
    pub fn attach(&mut self, child: Element) {
        self.target().push(child);
    }

    ///
    /// Makes `master` the innermost open master.  A master with nothing left to read (zero length) closes straight away.
    ///
    pub fn open_master(&mut self, master: Element, cursor: u64) -> Vec<u64> {
        self.open.push(master);
        self.close_ended(cursor)
    }

    ///
    /// Walks outward from the innermost open master closing every one whose known end is at or before `cursor`.  Stops at the first master that isn't finished.
    ///
    /// A master with an unknown size only closes here when one of its known-sized ancestors has ended.
    ///
    pub fn close_ended(&mut self, cursor: u64) -> Vec<u64> {
        let mut closed = Vec::new();
        while self.innermost_ended(cursor) {
            match self.close_innermost() {
                Some(tag) => closed.push(tag),
                None => break,
            }
        }
        closed
    }

    fn innermost_ended(&self, cursor: u64) -> bool {
        let innermost = match self.open.last() {
            Some(master) => master,
            None if self.header_open => &self.header,
            None => return false,
        };
        match innermost.end_offset() {
            Some(end) => end <= cursor,
            None => self.ancestor_ended(cursor),
        }
    }

    fn ancestor_ended(&self, cursor: u64) -> bool {
        if self.open.is_empty() {
            return false;
        }
        self.open[..self.open.len() - 1]
            .iter()
            .chain(self.header_open.then_some(&self.header))
            .filter_map(Element::end_offset)
            .any(|end| end <= cursor)
    }

    fn close_innermost(&mut self) -> Option<u64> {
        match self.open.pop() {
            Some(master) => {
                let tag = master.tag;
                self.target().push(master);
                Some(tag)
            },
            None if self.header_open => {
                self.header_open = false;
                Some(self.header.tag)
            },
            None => None,
        }
    }

    ///
    /// Closes unknown-sized masters that cannot contain an element described by `incoming`.
    ///
    /// Unknown-sized masters have no end offset of their own.  Unless a known-sized ancestor ends first, they end once an element shows up that, according to its schema path, has to live outside of them: a sibling, an element of an ancestor level or a root element.
    ///
    pub fn end_unknown_sized<F>(&mut self, incoming: &ElementDefinition, lookup: F) -> Vec<u64>
        where F: Fn(u64) -> Option<Arc<ElementDefinition>>
    {
        let mut closed = Vec::new();
        loop {
            let innermost = match self.open.last() {
                Some(master) => master,
                None if self.header_open => &self.header,
                None => break,
            };
            if innermost.size.is_known() {
                break;
            }
            let ends = lookup(innermost.tag).map_or(false, |definition| !definition.may_contain(incoming));
            if !ends {
                break;
            }
            match self.close_innermost() {
                Some(tag) => closed.push(tag),
                None => break,
            }
        }
        closed
    }

    ///
    /// The most recently attached element at the current level.  This is where an incomplete value lives until its bytes arrive.
    ///
    pub fn last_attached_mut(&mut self) -> Option<&mut Element> {
        self.target().last_mut()
    }

    ///
    /// Returns a copy of the document as it stands, with every open master closed.
    ///
    pub fn snapshot(&self) -> Document {
        self.clone().finish()
    }

    pub fn finish(mut self) -> Document {
        while self.close_innermost().is_some() {}
        Document {
            header: self.header,
            body: self.body,
        }
    }
}
