//! XML canonicalization.
//!
//! Produces the octets that are digested and signed for XML-DSig:
//! Canonical XML 1.0 and Exclusive XML Canonicalization 1.0, each with or
//! without comments. Input is an already parsed [`Element`] subtree, with
//! one optional element (the enveloped signature) left out.

use std::collections::{BTreeMap, BTreeSet};
use std::ptr;

use super::{Element, Node, XML_NS};

/// Canonicalization flavour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum C14nMethod {
    /// Canonical XML 1.0: every in-scope namespace is rendered.
    Inclusive,
    /// Exclusive canonicalization: only visibly used namespaces are
    /// rendered, plus the listed prefixes (`#default` for the default
    /// namespace).
    Exclusive {
        /// The `InclusiveNamespaces PrefixList`.
        inclusive_prefixes: Vec<String>,
    },
}

/// Canonicalization settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct C14nOptions {
    /// Flavour.
    pub method: C14nMethod,
    /// Keep comment nodes.
    pub with_comments: bool,
}

impl C14nOptions {
    /// Exclusive canonicalization without comments.
    #[must_use]
    pub const fn exclusive() -> Self {
        Self {
            method: C14nMethod::Exclusive {
                inclusive_prefixes: Vec::new(),
            },
            with_comments: false,
        }
    }

    /// Canonical XML 1.0 without comments.
    #[must_use]
    pub const fn inclusive() -> Self {
        Self {
            method: C14nMethod::Inclusive,
            with_comments: false,
        }
    }
}

/// Canonicalizes `element` and its descendants, leaving out `exclude`.
#[must_use]
pub fn canonicalize(element: &Element, options: &C14nOptions, exclude: Option<&Element>) -> String {
    let mut out = String::new();
    let writer = Writer { options, exclude };
    writer.element(element, &BTreeMap::new(), true, &mut out);
    out
}

struct Writer<'a> {
    options: &'a C14nOptions,
    exclude: Option<&'a Element>,
}

impl Writer<'_> {
    fn element(
        &self,
        el: &Element,
        rendered: &BTreeMap<String, String>,
        apex: bool,
        out: &mut String,
    ) {
        let decls = match &self.options.method {
            C14nMethod::Inclusive => inclusive_decls(el, rendered),
            C14nMethod::Exclusive { inclusive_prefixes } => {
                exclusive_decls(el, rendered, inclusive_prefixes)
            }
        };

        let mut scope = rendered.clone();
        for (prefix, uri) in &decls {
            scope.insert(prefix.clone(), uri.clone());
        }

        let name = el.qualified_name();
        out.push('<');
        out.push_str(&name);
        for (prefix, uri) in &decls {
            if prefix.is_empty() {
                out.push_str(" xmlns=\"");
            } else {
                out.push_str(" xmlns:");
                out.push_str(prefix);
                out.push_str("=\"");
            }
            escape_attr(uri, out);
            out.push('"');
        }

        // Canonical XML 1.0 carries ancestor xml:* attributes onto the apex
        // of a subset.
        let mut attrs: Vec<_> = if apex && self.options.method == C14nMethod::Inclusive {
            el.attributes()
                .iter()
                .filter(|a| a.namespace.as_deref() != Some(XML_NS))
                .chain(el.xml_scope())
                .collect()
        } else {
            el.attributes().iter().collect()
        };
        attrs.sort_by(|a, b| {
            let ka = (a.namespace.as_deref().unwrap_or(""), a.local_name.as_str());
            let kb = (b.namespace.as_deref().unwrap_or(""), b.local_name.as_str());
            ka.cmp(&kb)
        });
        for attr in attrs {
            out.push(' ');
            out.push_str(&attr.qualified_name());
            out.push_str("=\"");
            escape_attr(&attr.value, out);
            out.push('"');
        }
        out.push('>');

        for child in el.children() {
            match child {
                Node::Element(e) => {
                    if self.exclude.is_some_and(|x| ptr::eq(x, e)) {
                        continue;
                    }
                    self.element(e, &scope, false, out);
                }
                Node::Text(t) => escape_text(t, out),
                Node::Comment(c) => {
                    if self.options.with_comments {
                        out.push_str("<!--");
                        out.push_str(c);
                        out.push_str("-->");
                    }
                }
            }
        }

        out.push_str("</");
        out.push_str(&name);
        out.push('>');
    }
}

fn inclusive_decls(el: &Element, rendered: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut decls = BTreeMap::new();
    let parent_default = rendered.get("").filter(|u| !u.is_empty());

    for (prefix, uri) in el.namespaces() {
        if prefix.is_empty() && uri.is_empty() {
            continue;
        }
        if rendered.get(prefix) != Some(uri) {
            decls.insert(prefix.clone(), uri.clone());
        }
    }

    let own_default = el.namespaces().get("").filter(|u| !u.is_empty());
    if own_default.is_none() && parent_default.is_some() {
        decls.insert(String::new(), String::new());
    }
    decls
}

fn exclusive_decls(
    el: &Element,
    rendered: &BTreeMap<String, String>,
    inclusive_prefixes: &[String],
) -> BTreeMap<String, String> {
    let mut used = BTreeSet::new();
    used.insert(el.prefix().unwrap_or("").to_string());
    for attr in el.attributes() {
        if let Some(p) = attr.prefix.as_deref() {
            if attr.namespace.as_deref() != Some(XML_NS) {
                used.insert(p.to_string());
            }
        }
    }
    for p in inclusive_prefixes {
        let key = if p == "#default" { "" } else { p.as_str() };
        if el.namespaces().contains_key(key) {
            used.insert(key.to_string());
        }
    }

    let mut decls = BTreeMap::new();
    for prefix in used {
        let uri = el.namespaces().get(&prefix).cloned().unwrap_or_default();
        let current = rendered.get(&prefix);
        if prefix.is_empty() && uri.is_empty() {
            if current.is_some_and(|u| !u.is_empty()) {
                decls.insert(prefix, uri);
            }
            continue;
        }
        if uri.is_empty() {
            continue;
        }
        if current != Some(&uri) {
            decls.insert(prefix, uri);
        }
    }
    decls
}

fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}
