//! Lossless XML tree for structural edits of archive parts.
//!
//! A part is parsed into an arena of nodes whose elements hold their children
//! as index lists. Every event is kept verbatim (declaration, whitespace,
//! comments, entity references, raw attribute bytes), so serializing an
//! untouched tree reproduces the input. The only mutation is subtree removal,
//! done by dropping indices from child lists; there are no parent links.
//!
//! Element lookups compare local names only: `p:sp`, `sp` and `x:sp` all match `"sp"`.

use std::collections::HashSet;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};

/// Index of a node inside an [`XmlPart`].
pub type NodeId = usize;

#[derive(Debug, Clone)]
enum Node {
    Element {
        start: BytesStart<'static>,
        // `None` for self-closing elements.
        end: Option<BytesEnd<'static>>,
        children: Vec<NodeId>,
    },
    Other(Event<'static>),
}

/// A parsed XML document.
#[derive(Debug, Clone, Default)]
pub struct XmlPart {
    nodes: Vec<Node>,
    top: Vec<NodeId>,
}

impl XmlPart {
    /// Parse a well-formed XML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedXml`] (with an empty part name) on syntax
    /// errors, mismatched or unclosed tags, or a document without an element.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        let mut part = XmlPart::default();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| malformed(e.to_string()))?;

            match event {
                Event::Eof => break,
                Event::Start(start) => {
                    let id = part.push(
                        Node::Element {
                            start: start.into_owned(),
                            end: None,
                            children: Vec::new(),
                        },
                        stack.last().copied(),
                    );
                    stack.push(id);
                }
                Event::Empty(start) => {
                    part.push(
                        Node::Element {
                            start: start.into_owned(),
                            end: None,
                            children: Vec::new(),
                        },
                        stack.last().copied(),
                    );
                }
                Event::End(end) => {
                    let id = stack.pop().ok_or_else(|| {
                        malformed(format!(
                            "unexpected closing tag </{}>",
                            String::from_utf8_lossy(end.name().as_ref())
                        ))
                    })?;
                    if let Node::Element { start, end: slot, .. } = &mut part.nodes[id] {
                        if start.name() != end.name() {
                            return Err(malformed(format!(
                                "closing tag </{}> does not match <{}>",
                                String::from_utf8_lossy(end.name().as_ref()),
                                String::from_utf8_lossy(start.name().as_ref()),
                            )));
                        }
                        *slot = Some(end.into_owned());
                    }
                }
                other => {
                    part.push(Node::Other(other.into_owned()), stack.last().copied());
                }
            }
            buf.clear();
        }

        if let Some(&open) = stack.last() {
            return Err(malformed(format!(
                "unclosed element <{}>",
                part.qualified_name(open)
            )));
        }
        if part.root().is_none() {
            return Err(malformed("document has no root element".to_string()));
        }

        Ok(part)
    }

    /// The document element.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.top
            .iter()
            .copied()
            .find(|&id| matches!(self.nodes[id], Node::Element { .. }))
    }

    /// Whether `id` is an element with local name `local`.
    #[must_use]
    pub fn is_named(&self, id: NodeId, local: &str) -> bool {
        match &self.nodes[id] {
            Node::Element { start, .. } => start.local_name().as_ref() == local.as_bytes(),
            Node::Other(_) => false,
        }
    }

    /// Prefixed element name of `id`, or an empty string for non-elements.
    #[must_use]
    pub fn qualified_name(&self, id: NodeId) -> String {
        match &self.nodes[id] {
            Node::Element { start, .. } => String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            Node::Other(_) => String::new(),
        }
    }

    /// Child node ids of `id` (empty for non-elements).
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id] {
            Node::Element { children, .. } => children,
            Node::Other(_) => &[],
        }
    }

    /// Attribute of `id` whose local name is `local`, unescaped.
    #[must_use]
    pub fn attribute(&self, id: NodeId, local: &str) -> Option<String> {
        let Node::Element { start, .. } = &self.nodes[id] else {
            return None;
        };
        start
            .attributes()
            .flatten()
            .find(|attr| attr.key.local_name().as_ref() == local.as_bytes())
            .map(|attr| {
                let raw = String::from_utf8_lossy(&attr.value).into_owned();
                match quick_xml::escape::unescape(&raw) {
                    Ok(value) => value.into_owned(),
                    Err(_) => raw,
                }
            })
    }

    /// All elements named `local` in document order.
    #[must_use]
    pub fn find_all(&self, local: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        for &id in &self.top {
            self.collect(id, local, true, &mut found);
        }
        found
    }

    /// Elements named `local` strictly below `id`, in document order.
    #[must_use]
    pub fn find_within(&self, id: NodeId, local: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        for &child in self.children(id) {
            self.collect(child, local, true, &mut found);
        }
        found
    }

    /// Whether some element below `id` is named `local`.
    #[must_use]
    pub fn has_descendant(&self, id: NodeId, local: &str) -> bool {
        let mut found = Vec::new();
        for &child in self.children(id) {
            self.collect(child, local, false, &mut found);
            if !found.is_empty() {
                return true;
            }
        }
        false
    }

    /// Detach the subtrees rooted at `ids`. Returns how many were attached.
    pub fn remove_subtrees(&mut self, ids: &[NodeId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let doomed: HashSet<NodeId> = ids.iter().copied().collect();
        let mut removed = 0;

        let before = self.top.len();
        self.top.retain(|id| !doomed.contains(id));
        removed += before - self.top.len();

        for node in &mut self.nodes {
            if let Node::Element { children, .. } = node {
                let before = children.len();
                children.retain(|id| !doomed.contains(id));
                removed += before - children.len();
            }
        }
        removed
    }

    /// Serialized markup of the subtree rooted at `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedXml`] if writing fails.
    pub fn subtree_markup(&self, id: NodeId) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_node(&mut writer, id)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }

    /// Serialize the whole document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedXml`] if writing fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        for &id in &self.top {
            self.write_node(&mut writer, id)?;
        }
        Ok(writer.into_inner())
    }

    fn push(&mut self, node: Node, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        match parent {
            Some(p) => {
                if let Node::Element { children, .. } = &mut self.nodes[p] {
                    children.push(id);
                }
            }
            None => self.top.push(id),
        }
        id
    }

    fn collect(&self, id: NodeId, local: &str, all: bool, found: &mut Vec<NodeId>) {
        if self.is_named(id, local) {
            found.push(id);
            if !all {
                return;
            }
        }
        for &child in self.children(id) {
            self.collect(child, local, all, found);
            if !all && !found.is_empty() {
                return;
            }
        }
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId) -> Result<()> {
        match &self.nodes[id] {
            Node::Element {
                start, end: None, ..
            } => write(writer, Event::Empty(start.clone())),
            Node::Element {
                start,
                end: Some(end),
                children,
            } => {
                write(writer, Event::Start(start.clone()))?;
                for &child in children {
                    self.write_node(writer, child)?;
                }
                write(writer, Event::End(end.clone()))
            }
            Node::Other(event) => write(writer, event.clone()),
        }
    }
}

/// Parse `bytes`, apply `edit`, and serialize only if it removed something.
///
/// `edit` returns the number of subtrees it removed. `Ok(None)` means the part
/// was inspected and left as is, so callers can keep the original bytes.
///
/// # Errors
///
/// Returns [`Error::MalformedXml`] naming `part_name` if the part cannot be parsed.
pub fn edit_part<F>(part_name: &str, bytes: &[u8], edit: F) -> Result<Option<Vec<u8>>>
where
    F: FnOnce(&mut XmlPart) -> Result<usize>,
{
    let with_name = |err: Error| match err {
        Error::MalformedXml { message, .. } => Error::MalformedXml {
            part: part_name.to_string(),
            message,
        },
        other => other,
    };

    let mut part = XmlPart::parse(bytes).map_err(with_name)?;
    let removed = edit(&mut part).map_err(with_name)?;
    if removed == 0 {
        return Ok(None);
    }
    log::debug!("{part_name}: removed {removed} node(s)");
    part.to_bytes().map(Some).map_err(with_name)
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| malformed(e.to_string()))
}

fn malformed(message: String) -> Error {
    Error::MalformedXml {
        part: String::new(),
        message,
    }
}
