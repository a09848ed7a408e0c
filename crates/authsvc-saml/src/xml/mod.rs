//! Namespace-aware XML tree.
//!
//! Incoming protocol messages are parsed once into an owned [`Element`]
//! tree. Signature verification, canonicalization and claim extraction all
//! operate on that same tree, so the bytes that were verified are the bytes
//! that are read.
//!
//! The reader is strict: DOCTYPE declarations, unbound
//! prefixes, multiple root elements and very deep nesting are rejected.

pub mod c14n;

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{SamlError, SamlResult};

pub use c14n::{canonicalize, C14nMethod, C14nOptions};

/// The namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Maximum element nesting accepted by the reader.
pub const MAX_DEPTH: usize = 64;

/// An attribute with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Prefix as written, if any.
    pub prefix: Option<String>,
    /// Local name.
    pub local_name: String,
    /// Namespace URI. Unprefixed attributes have none.
    pub namespace: Option<String>,
    /// Normalized, unescaped value.
    pub value: String,
}

impl Attribute {
    /// Returns the name as written in the document.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.local_name)
    }
}

/// A child node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Element node.
    Element(Element),
    /// Character data, with entities resolved.
    Text(String),
    /// Comment text.
    Comment(String),
}

/// An element with its namespace context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    prefix: Option<String>,
    local_name: String,
    namespace: Option<String>,
    attributes: Vec<Attribute>,
    /// In-scope namespace bindings; the empty key is the default namespace.
    namespaces: BTreeMap<String, String>,
    /// `xml:*` attributes in scope here, own values overriding ancestors'.
    xml_scope: Vec<Attribute>,
    children: Vec<Node>,
}

impl Element {
    /// Parses a complete document and returns its root element.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::InvalidMessage`] if the input is not well-formed
    /// or uses a construct the reader refuses.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(SamlError::InvalidMessage(
                            "document nesting too deep".to_string(),
                        ));
                    }
                    ensure_single_root(&root)?;
                    let element = Element::from_start(&start, stack.last())?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    ensure_single_root(&root)?;
                    let element = Element::from_start(&start, stack.last())?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        SamlError::InvalidMessage("unbalanced end tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(text) => {
                    let raw = utf8(&text)?;
                    let normalized = normalize_newlines(raw);
                    let value = quick_xml::escape::unescape(&normalized)
                        .map_err(|e| SamlError::InvalidMessage(format!("bad text: {e}")))?;
                    push_text(&mut stack, &value)?;
                }
                Event::CData(cdata) => {
                    let raw = cdata.into_inner();
                    push_text(&mut stack, &normalize_newlines(utf8(&raw)?))?;
                }
                Event::Comment(comment) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = normalize_newlines(utf8(&comment)?);
                        parent.children.push(Node::Comment(text));
                    }
                }
                Event::DocType(_) => {
                    return Err(SamlError::InvalidMessage(
                        "DOCTYPE declarations are not allowed".to_string(),
                    ));
                }
                Event::Decl(_) | Event::PI(_) => {}
                Event::Eof => break,
            }
        }

        if !stack.is_empty() {
            return Err(SamlError::InvalidMessage("unclosed element".to_string()));
        }
        root.ok_or_else(|| SamlError::InvalidMessage("document has no root element".to_string()))
    }

    fn from_start(start: &BytesStart<'_>, parent: Option<&Element>) -> SamlResult<Self> {
        let name = start.name();
        let qname = utf8(name.as_ref())?;
        let mut namespaces = parent.map(|p| p.namespaces.clone()).unwrap_or_default();
        let mut raw = Vec::new();

        for attr in start.attributes() {
            let attr =
                attr.map_err(|e| SamlError::InvalidMessage(format!("malformed attribute: {e}")))?;
            let key = utf8(attr.key.as_ref())?.to_string();
            let value = attribute_value(&attr.value)?;

            if key == "xmlns" {
                namespaces.insert(String::new(), value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                if value.is_empty() {
                    return Err(SamlError::InvalidMessage(format!(
                        "prefix {prefix} bound to empty namespace"
                    )));
                }
                if prefix == "xml" {
                    if value != XML_NS {
                        return Err(SamlError::InvalidMessage(
                            "xml prefix rebound".to_string(),
                        ));
                    }
                    continue;
                }
                namespaces.insert(prefix.to_string(), value);
            } else {
                raw.push((key, value));
            }
        }

        let (prefix, local_name) = split_qname(qname);
        let namespace = match prefix {
            None => namespaces.get("").filter(|ns| !ns.is_empty()).cloned(),
            Some(p) => Some(resolve_prefix(p, &namespaces)?),
        };

        let mut attributes = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            let (attr_prefix, attr_local) = split_qname(&key);
            let attr_ns = match attr_prefix {
                None => None,
                Some(p) => Some(resolve_prefix(p, &namespaces)?),
            };
            if attributes.iter().any(|a: &Attribute| {
                a.local_name == attr_local && a.namespace == attr_ns
            }) {
                return Err(SamlError::InvalidMessage(format!(
                    "duplicate attribute {key}"
                )));
            }
            attributes.push(Attribute {
                prefix: attr_prefix.map(str::to_string),
                local_name: attr_local.to_string(),
                namespace: attr_ns,
                value,
            });
        }

        let mut xml_scope: Vec<Attribute> = parent
            .map(|p| p.xml_scope.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|inherited| {
                !attributes.iter().any(|a| {
                    a.namespace.as_deref() == Some(XML_NS) && a.local_name == inherited.local_name
                })
            })
            .collect();
        xml_scope.extend(
            attributes
                .iter()
                .filter(|a| a.namespace.as_deref() == Some(XML_NS))
                .cloned(),
        );

        Ok(Self {
            prefix: prefix.map(str::to_string),
            local_name: local_name.to_string(),
            namespace,
            attributes,
            namespaces,
            xml_scope,
            children: Vec::new(),
        })
    }

    /// Returns the prefix as written.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Returns the local name.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Returns the namespace URI.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the name as written in the document.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.local_name)
    }

    /// Returns true if the element has the given namespace and local name.
    #[must_use]
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == Some(namespace)
    }

    /// Returns all attributes in document order.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Returns the value of an unqualified attribute.
    #[must_use]
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Returns the `ID` attribute.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.attribute("ID")
    }

    /// Returns the in-scope namespace bindings.
    #[must_use]
    pub fn namespaces(&self) -> &BTreeMap<String, String> {
        &self.namespaces
    }

    /// Returns the `xml:*` attributes in scope, inherited ones included.
    #[must_use]
    pub fn xml_scope(&self) -> &[Attribute] {
        &self.xml_scope
    }

    /// Returns the child nodes.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Iterates over child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Iterates over child elements with the given name.
    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.child_elements()
            .filter(move |e| e.is(namespace, local_name))
    }

    /// Returns the first child element with the given name.
    #[must_use]
    pub fn child(&self, namespace: &str, local_name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is(namespace, local_name))
    }

    /// Returns the concatenated text of the direct text children.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns this element and all descendant elements in document order.
    #[must_use]
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a Element>) {
        out.push(self);
        for child in self.child_elements() {
            child.collect_descendants(out);
        }
    }

    /// Finds the element carrying the given `ID` attribute.
    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        if self.id() == Some(id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(e) => e.find_by_id_mut(id),
            _ => None,
        })
    }

    /// Inserts an element as a child at `index`, giving it this element's
    /// namespace bindings where it does not declare its own.
    pub fn insert_child(&mut self, index: usize, mut child: Element) {
        child.inherit_namespaces(&self.namespaces);
        let index = index.min(self.children.len());
        self.children.insert(index, Node::Element(child));
    }

    pub(crate) fn inherit_namespaces(&mut self, parent: &BTreeMap<String, String>) {
        for (prefix, uri) in parent {
            self.namespaces
                .entry(prefix.clone())
                .or_insert_with(|| uri.clone());
        }
        let scope = self.namespaces.clone();
        for node in &mut self.children {
            if let Node::Element(e) = node {
                e.inherit_namespaces(&scope);
            }
        }
    }

    /// Returns the position just after the first child element with the
    /// given name, or zero if there is none.
    #[must_use]
    pub fn position_after(&self, namespace: &str, local_name: &str) -> usize {
        self.children
            .iter()
            .position(|node| matches!(node, Node::Element(e) if e.is(namespace, local_name)))
            .map_or(0, |i| i + 1)
    }
}

fn ensure_single_root(root: &Option<Element>) -> SamlResult<()> {
    if root.is_some() {
        return Err(SamlError::InvalidMessage(
            "document has more than one root element".to_string(),
        ));
    }
    Ok(())
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => *root = Some(element),
    }
}

fn push_text(stack: &mut [Element], text: &str) -> SamlResult<()> {
    let Some(parent) = stack.last_mut() else {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(SamlError::InvalidMessage(
            "text outside the root element".to_string(),
        ));
    };
    if let Some(Node::Text(existing)) = parent.children.last_mut() {
        existing.push_str(text);
    } else {
        parent.children.push(Node::Text(text.to_string()));
    }
    Ok(())
}

fn resolve_prefix(prefix: &str, namespaces: &BTreeMap<String, String>) -> SamlResult<String> {
    if prefix == "xml" {
        return Ok(XML_NS.to_string());
    }
    namespaces
        .get(prefix)
        .cloned()
        .ok_or_else(|| SamlError::InvalidMessage(format!("unbound prefix {prefix}")))
}

fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

fn qualify(prefix: Option<&str>, local_name: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local_name}"),
        None => local_name.to_string(),
    }
}

fn utf8(bytes: &[u8]) -> SamlResult<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| SamlError::InvalidMessage(format!("invalid UTF-8: {e}")))
}

fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

fn attribute_value(raw: &[u8]) -> SamlResult<String> {
    let normalized = normalize_newlines(utf8(raw)?).replace(['\t', '\n'], " ");
    quick_xml::escape::unescape(&normalized)
        .map(|v| v.into_owned())
        .map_err(|e| SamlError::InvalidMessage(format!("bad attribute value: {e}")))
}
