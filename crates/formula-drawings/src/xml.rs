//! Owned, mutable XML element tree.
//!
//! `roxmltree` documents are read-only, but the drawing collection has to edit its anchor tree in
//! place (append, detach, reorder). Documents are parsed once into [`XmlElement`] values and
//! serialized back with `quick-xml`.
//!
//! Element and attribute names are stored *qualified* (`xdr:twoCellAnchor`, `r:id`) using the
//! prefixes bound in the source document, so serialization reproduces the producer's prefixes.
//! Namespace declarations are kept as ordinary `xmlns` / `xmlns:*` attributes on the element that
//! declared them.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::{Document, Node, NodeType};

use crate::error::Result;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name (`prefix:local` or `local`).
    pub name: String,
    /// Qualified attribute names and unescaped values, in document order.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

/// Strip the namespace prefix from a qualified name.
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.rsplit_once(':').map(|(prefix, _)| prefix)
    }

    /// Look up an attribute by qualified name, falling back to a local-name match.
    ///
    /// Namespace declarations never match the local-name fallback.
    pub fn attr(&self, name: &str) -> Option<&str> {
        if let Some((_, value)) = self.attrs.iter().find(|(k, _)| k == name) {
            return Some(value.as_str());
        }
        if name.contains(':') {
            return None;
        }
        self.attrs
            .iter()
            .find(|(k, _)| !is_xmlns(k) && local_name(k) == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => *existing = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|c| match c {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.local_name() == local)
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|el| el.local_name() == local)
    }

    /// Position of the first child element with the given local name within `children`.
    pub fn child_position(&self, local: &str) -> Option<usize> {
        self.children.iter().position(|c| match c {
            XmlNode::Element(el) => el.local_name() == local,
            XmlNode::Text(_) => false,
        })
    }

    /// Depth-first (document order) search below this element.
    pub fn descendant(&self, local: &str) -> Option<&XmlElement> {
        for child in self.elements() {
            if child.local_name() == local {
                return Some(child);
            }
            if let Some(found) = child.descendant(local) {
                return Some(found);
            }
        }
        None
    }

    pub fn descendant_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        for child in self.elements_mut() {
            if child.local_name() == local {
                return Some(child);
            }
            if let Some(found) = child.descendant_mut(local) {
                return Some(found);
            }
        }
        None
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.retain(|c| matches!(c, XmlNode::Element(_)));
        self.children.push(XmlNode::Text(text.into()));
    }

    /// `(prefix, uri)` pairs declared directly on this element.
    pub fn namespace_decls(&self) -> impl Iterator<Item = (Option<&str>, &str)> {
        self.attrs.iter().filter_map(|(k, v)| {
            if k == "xmlns" {
                Some((None, v.as_str()))
            } else {
                k.strip_prefix("xmlns:").map(|p| (Some(p), v.as_str()))
            }
        })
    }

    /// Declare `xmlns:{prefix}` unless the prefix is already declared here.
    pub fn declare_namespace(&mut self, prefix: &str, uri: &str) {
        let key = format!("xmlns:{prefix}");
        if !self.attrs.iter().any(|(k, _)| *k == key) {
            self.attrs.push((key, uri.to_string()));
        }
    }

    pub fn parse(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml)?;
        Ok(build_element(doc.root_element(), None))
    }

    pub fn parse_bytes(bytes: &[u8]) -> Result<Self> {
        let xml = std::str::from_utf8(bytes)?;
        Self::parse(xml.trim_start_matches('\u{feff}'))
    }

    /// Serialized child markup (text and elements), without this element's own tags.
    pub fn inner_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        for child in &self.children {
            write_node(&mut writer, child)?;
        }
        Ok(String::from_utf8(writer.into_inner()).map_err(|e| e.utf8_error())?)
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, self)?;
        Ok(String::from_utf8(writer.into_inner()).map_err(|e| e.utf8_error())?)
    }

    /// Serialize as a standalone document with an XML declaration.
    ///
    /// Namespace declarations found on descendants are hoisted onto the root when the root does
    /// not already bind the prefix differently.
    pub fn to_document_bytes(&self) -> Result<Vec<u8>> {
        let mut root = self.clone();
        let mut hoisted: Vec<(String, String)> = Vec::new();
        for child in root.elements_mut() {
            hoist_namespaces(child, self, &mut hoisted);
        }
        for (key, uri) in hoisted {
            if !root.attrs.iter().any(|(k, _)| *k == key) {
                root.attrs.push((key, uri));
            }
        }

        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        write_element(&mut writer, &root)?;
        Ok(writer.into_inner())
    }
}

fn is_xmlns(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

fn hoist_namespaces(el: &mut XmlElement, root: &XmlElement, hoisted: &mut Vec<(String, String)>) {
    el.attrs.retain(|(k, v)| {
        // Default namespace declarations stay put; moving them would rebind the root.
        if !is_xmlns(k) || k == "xmlns" {
            return true;
        }
        let bound = root
            .attrs
            .iter()
            .chain(hoisted.iter())
            .find(|(bk, _)| bk == k)
            .map(|(_, uri)| uri.clone());
        match bound {
            Some(uri) => uri != *v,
            None => {
                hoisted.push((k.clone(), v.clone()));
                false
            }
        }
    });
    for child in el.elements_mut() {
        hoist_namespaces(child, root, hoisted);
    }
}

fn build_element(node: Node<'_, '_>, parent: Option<Node<'_, '_>>) -> XmlElement {
    let mut attrs = Vec::new();
    for ns in node.namespaces() {
        if ns.uri() == XML_NS {
            continue;
        }
        let inherited = parent.is_some_and(|p| {
            p.namespaces()
                .any(|pns| pns.name() == ns.name() && pns.uri() == ns.uri())
        });
        if inherited {
            continue;
        }
        let key = match ns.name() {
            Some(prefix) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        };
        attrs.push((key, ns.uri().to_string()));
    }

    for attr in node.attributes() {
        let name = qualify(node, attr.namespace(), attr.name());
        attrs.push((name, attr.value().to_string()));
    }

    let tag = node.tag_name();
    let name = qualify(node, tag.namespace(), tag.name());

    let children = node
        .children()
        .filter_map(|child| match child.node_type() {
            NodeType::Element => Some(XmlNode::Element(build_element(child, Some(node)))),
            NodeType::Text => {
                let text = child.text().unwrap_or_default();
                if text.trim().is_empty() {
                    None
                } else {
                    Some(XmlNode::Text(text.to_string()))
                }
            }
            _ => None,
        })
        .collect();

    XmlElement {
        name,
        attrs,
        children,
    }
}

fn qualify(node: Node<'_, '_>, ns: Option<&str>, local: &str) -> String {
    let Some(ns) = ns else {
        return local.to_string();
    };
    if ns == XML_NS {
        return format!("xml:{local}");
    }
    match node.lookup_prefix(ns) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
        _ => local.to_string(),
    }
}

fn write_node<W: Write>(writer: &mut Writer<W>, node: &XmlNode) -> Result<()> {
    match node {
        XmlNode::Element(el) => write_element(writer, el),
        XmlNode::Text(text) => {
            writer.write_event(Event::Text(BytesText::new(text)))?;
            Ok(())
        }
    }
}

fn write_element<W: Write>(writer: &mut Writer<W>, el: &XmlElement) -> Result<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if el.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &el.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}
