//! A small owned XML tree for surgical part rewrites
//!
//! Parts are parsed once into a [`Document`], transformed by functions that
//! consume a tree and return a new one, and serialized once. Attribute values
//! and text are stored in their escaped source form, so content no
//! transformation touches is written back exactly as it was read.

use crate::error::{Error, Result};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;

/// A node inside an element
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A child element
    Element(Element),
    /// Character data, kept escaped
    Text(String),
    /// A CDATA section
    CData(String),
    /// A comment
    Comment(String),
}

/// An XML element with ordered attributes and children
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

/// A parsed XML part
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    has_decl: bool,
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
}

/// Strip a namespace prefix (`p:path` -> `path`)
pub fn local_name(name: &str) -> &str {
    match name.rfind(':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

impl Document {
    /// Parse a part's bytes into a tree
    ///
    /// `part` names the part in error messages.
    pub fn parse(part: &str, data: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(data);
        let mut buf = Vec::new();

        let mut has_decl = false;
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<Element> = None;
        let mut stack: Vec<Element> = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| Error::malformed(part, e.to_string()))?;

            let node = match event {
                Event::Decl(_) => {
                    has_decl = true;
                    None
                }
                Event::Start(ref e) => {
                    stack.push(Element::from_start(part, e)?);
                    None
                }
                Event::Empty(ref e) => Some(Node::Element(Element::from_start(part, e)?)),
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::malformed(part, "unexpected closing tag"))?;
                    Some(Node::Element(element))
                }
                Event::Text(ref t) => Some(Node::Text(utf8(part, t)?.to_string())),
                Event::GeneralRef(ref r) => Some(Node::Text(format!("&{};", utf8(part, r)?))),
                Event::CData(ref c) => Some(Node::CData(utf8(part, c)?.to_string())),
                Event::Comment(ref c) => Some(Node::Comment(utf8(part, c)?.to_string())),
                Event::Eof => break,
                _ => None,
            };

            if let Some(node) = node {
                match stack.last_mut() {
                    Some(parent) => parent.push_node(node),
                    None => match node {
                        Node::Element(element) if root.is_none() => root = Some(element),
                        other if root.is_none() => prolog.push(other),
                        other => epilog.push(other),
                    },
                }
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(Error::malformed(part, "unclosed element at end of input"));
        }
        let root = root.ok_or_else(|| Error::malformed(part, "no root element"))?;

        Ok(Self {
            has_decl,
            prolog,
            root,
            epilog,
        })
    }

    /// The root element
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Replace the root element through a transformation
    pub fn map_root(mut self, f: impl FnOnce(Element) -> Element) -> Self {
        self.root = f(self.root);
        self
    }

    /// Serialize the tree back to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());

        if self.has_decl {
            writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
                .map_err(|e| Error::xml_write(format!("Failed to write XML declaration: {}", e)))?;
        }
        for node in &self.prolog {
            write_node(&mut writer, node)?;
        }
        write_element(&mut writer, &self.root)?;
        for node in &self.epilog {
            write_node(&mut writer, node)?;
        }

        Ok(writer.into_inner())
    }
}

impl Element {
    /// Create an element with no attributes or children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    fn from_start(part: &str, e: &BytesStart) -> Result<Self> {
        let name = utf8(part, e.name().as_ref())?.to_string();
        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| Error::malformed(part, err.to_string()))?;
            let key = utf8(part, attr.key.as_ref())?.to_string();
            let value = utf8(part, &attr.value)?.to_string();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            children: Vec::new(),
        })
    }

    /// Qualified element name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element name without namespace prefix
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Unescaped attribute value by qualified name
    pub fn attr(&self, key: &str) -> Option<Cow<'_, str>> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| unescape(v))
    }

    /// Unescaped attribute value by local name, ignoring any prefix
    pub fn attr_local(&self, local: &str) -> Option<Cow<'_, str>> {
        self.attrs
            .iter()
            .find(|(k, _)| !k.starts_with("xmlns") && local_name(k) == local)
            .map(|(_, v)| unescape(v))
    }

    /// All attributes as (qualified name, escaped value) pairs
    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    /// Set an attribute, keeping its position if it already exists
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Set an attribute in place
    pub fn set_attr(&mut self, key: &str, value: &str) {
        let escaped = quick_xml::escape::escape(value).into_owned();
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = escaped,
            None => self.attrs.push((key.to_string(), escaped)),
        }
    }

    /// Child nodes in document order
    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    /// Child elements in document order
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First child element with the given local name
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.children().find(|e| e.local_name() == local)
    }

    /// All descendant elements (depth-first, document order) with the given local name
    pub fn descendants<'a>(&'a self, local: &'a str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        self.collect_descendants(local, &mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, local: &str, out: &mut Vec<&'a Element>) {
        for child in self.children() {
            if child.local_name() == local {
                out.push(child);
            }
            child.collect_descendants(local, out);
        }
    }

    /// Concatenated unescaped text content of direct text children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(unescape(t).into_owned()),
                Node::CData(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    /// Append a child node
    pub fn push_node(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Append a child element
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Append escaped-on-write text
    pub fn with_text(mut self, text: &str) -> Self {
        self.children
            .push(Node::Text(quick_xml::escape::escape(text).into_owned()));
        self
    }

    /// Keep only the child elements for which `keep` returns true
    ///
    /// Whitespace directly in front of a removed element goes with it; other
    /// non-element nodes are kept.
    pub fn retain_children(mut self, mut keep: impl FnMut(&Element) -> bool) -> Self {
        let mut kept: Vec<Node> = Vec::with_capacity(self.children.len());
        for node in self.children {
            match node {
                Node::Element(e) if !keep(&e) => {
                    if matches!(kept.last(), Some(Node::Text(t)) if t.trim().is_empty()) {
                        kept.pop();
                    }
                }
                other => kept.push(other),
            }
        }
        self.children = kept;
        self
    }

    /// Append child elements, repeating the indentation of existing children
    ///
    /// Trailing whitespace before the closing tag stays last.
    pub fn with_indented_children(mut self, new: impl IntoIterator<Item = Element>) -> Self {
        let indent = self.child_indent().map(str::to_string);
        let closing = match self.children.last() {
            Some(Node::Text(t)) if t.trim().is_empty() && self.children.len() > 1 => {
                self.children.pop()
            }
            _ => None,
        };
        for child in new {
            if let Some(indent) = &indent {
                self.children.push(Node::Text(indent.clone()));
            }
            self.children.push(Node::Element(child));
        }
        self.children.extend(closing);
        self
    }

    /// Transform each direct child element
    pub fn map_children(mut self, mut f: impl FnMut(Element) -> Element) -> Self {
        self.children = self
            .children
            .into_iter()
            .map(|n| match n {
                Node::Element(e) => Node::Element(f(e)),
                other => other,
            })
            .collect();
        self
    }

    /// Transform this element and every descendant, children first
    pub fn map_tree(self, f: &mut impl FnMut(Element) -> Element) -> Element {
        let mapped = self.map_children(|child| child.map_tree(f));
        f(mapped)
    }

    /// Indentation text preceding the first child element, if any
    pub fn child_indent(&self) -> Option<&str> {
        match self.children.first() {
            Some(Node::Text(t)) if t.trim().is_empty() => Some(t.as_str()),
            _ => None,
        }
    }
}

fn unescape(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw))
}

fn utf8<'a>(part: &str, bytes: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| Error::malformed(part, e.to_string()))
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<()> {
    let event = match node {
        Node::Element(e) => return write_element(writer, e),
        Node::Text(t) => Event::Text(BytesText::from_escaped(t.as_str())),
        Node::CData(t) => Event::CData(BytesCData::new(t.as_str())),
        Node::Comment(t) => Event::Comment(BytesText::from_escaped(t.as_str())),
    };
    writer
        .write_event(event)
        .map_err(|e| Error::xml_write(format!("Failed to write node: {}", e)))
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attrs {
        start.push_attribute((key.as_bytes(), value.as_bytes()));
    }

    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| Error::xml_write(format!("Failed to write <{}>: {}", element.name, e)));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| Error::xml_write(format!("Failed to write <{}>: {}", element.name, e)))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| Error::xml_write(format!("Failed to close <{}>: {}", element.name, e)))
}
