/*
 * Created on Wed Jun 10 2026
 *
 * This file is a part of Skyconf
 * Skyconf is a free and open-source YANG-driven configuration management
 * engine written by Sayan Nandan ("the Author") with the vision to provide
 * safe, transactional network configuration without compromising on
 * correctness or performance.
 *
 * Copyright (c) 2026, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! XML parsing and serialization for data trees
//!
//! Parsing is handled by `quick-xml`; serialization is a small hand-rolled
//! writer since the tree shape (attributes first, optional body, element
//! children) maps directly onto tags. `operation` and `xmlns` attributes are
//! preserved through a round-trip.

use super::{NodeId, NodeKind, Tree};
use crate::util::error::{ConfResult, Error};
use quick_xml::events::Event;
use quick_xml::Reader;

fn split_qname(raw: &[u8]) -> ConfResult<(Option<String>, String)> {
    let raw = core::str::from_utf8(raw).map_err(|_| Error::malformed("non-UTF8 XML name"))?;
    match raw.split_once(':') {
        Some((prefix, local)) => Ok((Some(prefix.to_owned()), local.to_owned())),
        None => Ok((None, raw.to_owned())),
    }
}

/// Parse an XML document into a [`Tree`] rooted at its document element
pub fn parse(input: &str) -> ConfResult<Tree> {
    let mut reader = Reader::from_str(input);
    reader.trim_text(true);
    let mut tree: Option<Tree> = None;
    let mut stack: Vec<NodeId> = Vec::new();
    let mut done = false;
    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::malformed(format!("XML parse error: {e}")))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                if done {
                    return Err(Error::malformed("trailing content after document element"));
                }
                let (prefix, name) = split_qname(e.name().as_ref())?;
                let id = match tree {
                    None => {
                        let mut t = Tree::new(&name);
                        let root = t.root();
                        t.set_prefix(root, prefix);
                        tree = Some(t);
                        root
                    }
                    Some(ref mut t) => match stack.last() {
                        Some(&parent) => {
                            let id = t.new_child(parent, &name, NodeKind::Element);
                            t.set_prefix(id, prefix);
                            id
                        }
                        None => {
                            return Err(Error::malformed("multiple document elements"));
                        }
                    },
                };
                if let Some(t) = &mut tree {
                    for attr in e.attributes() {
                        let attr =
                            attr.map_err(|e| Error::malformed(format!("bad attribute: {e}")))?;
                        let (aprefix, aname) = split_qname(attr.key.as_ref())?;
                        let value = attr
                            .unescape_value()
                            .map_err(|e| Error::malformed(format!("bad attribute value: {e}")))?;
                        match aprefix {
                            Some(p) => t.set_prefixed_attr(id, &p, &aname, &value),
                            None => t.set_attr(id, &aname, &value),
                        }
                    }
                }
                if matches!(event, Event::Start(_)) {
                    stack.push(id);
                } else if stack.is_empty() {
                    done = true;
                }
            }
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|e| Error::malformed(format!("bad text: {e}")))?;
                if text.trim().is_empty() {
                    continue;
                }
                match (&mut tree, stack.last()) {
                    (Some(t), Some(&cur)) => t.set_body(cur, &text),
                    _ => return Err(Error::malformed("text outside the document element")),
                }
            }
            Event::End(_) => {
                if stack.pop().is_none() {
                    return Err(Error::malformed("unbalanced end tag"));
                }
                if stack.is_empty() {
                    done = true;
                }
            }
            Event::Eof => break,
            // declarations, comments, PIs and doctypes are ignored
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(Error::malformed("unterminated element"));
    }
    tree.ok_or_else(|| Error::malformed("empty XML document"))
}

fn escape(raw: &str, quote: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if quote => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn qname(tree: &Tree, id: NodeId) -> String {
    let n = tree.node(id);
    match n.prefix() {
        Some(p) => format!("{}:{}", p, n.name()),
        None => n.name().to_owned(),
    }
}

fn write_node(tree: &Tree, id: NodeId, out: &mut String, pretty: bool, depth: usize) {
    let indent = if pretty {
        "    ".repeat(depth)
    } else {
        String::new()
    };
    out.push_str(&indent);
    out.push('<');
    out.push_str(&qname(tree, id));
    for a in tree.attr_children(id) {
        let an = tree.node(a);
        let aname = match an.prefix() {
            Some(p) => format!("{}:{}", p, an.name()),
            None => an.name().to_owned(),
        };
        out.push(' ');
        out.push_str(&aname);
        out.push_str("=\"");
        out.push_str(&escape(an.value().unwrap_or(""), true));
        out.push('"');
    }
    let body = tree.find_body(id);
    let elems = tree.elem_children(id);
    if body.is_none() && elems.is_empty() {
        out.push_str("/>");
        if pretty {
            out.push('\n');
        }
        return;
    }
    out.push('>');
    if let Some(body) = body {
        out.push_str(&escape(body, false));
    }
    if !elems.is_empty() {
        if pretty {
            out.push('\n');
        }
        for c in elems {
            write_node(tree, c, out, pretty, depth + 1);
        }
        out.push_str(&indent);
    }
    out.push_str("</");
    out.push_str(&qname(tree, id));
    out.push('>');
    if pretty {
        out.push('\n');
    }
}

/// Serialize the subtree rooted at `id`
pub fn to_xml(tree: &Tree, id: NodeId, pretty: bool) -> String {
    let mut out = String::new();
    write_node(tree, id, &mut out, pretty, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let raw = "<config><x><y><a>1</a><b>2</b><v>hello</v></y></x></config>";
        let tree = parse(raw).unwrap();
        assert_eq!(to_xml(&tree, tree.root(), false), raw);
    }

    #[test]
    fn test_operation_attribute_is_preserved() {
        let raw = r#"<config><x><y operation="replace"><a>1</a></y></x></config>"#;
        let tree = parse(raw).unwrap();
        let x = tree.find_elem_child(tree.root(), "x").unwrap();
        let y = tree.find_elem_child(x, "y").unwrap();
        assert_eq!(tree.find_attr(y, "operation"), Some("replace"));
        assert_eq!(to_xml(&tree, tree.root(), false), raw);
    }

    #[test]
    fn test_xmlns_attributes() {
        let raw = r#"<config xmlns="urn:x" xmlns:nc="urn:nc"><a/></config>"#;
        let tree = parse(raw).unwrap();
        assert_eq!(tree.find_attr(tree.root(), "xmlns"), Some("urn:x"));
        assert_eq!(to_xml(&tree, tree.root(), false), raw);
    }

    #[test]
    fn test_escapes() {
        let raw = "<config><v>a &amp; b &lt; c</v></config>";
        let tree = parse(raw).unwrap();
        let v = tree.find_elem_child(tree.root(), "v").unwrap();
        assert_eq!(tree.find_body(v), Some("a & b < c"));
        assert_eq!(to_xml(&tree, tree.root(), false), raw);
    }

    #[test]
    fn test_bad_xml_is_malformed() {
        assert!(parse("<config><x></config>").is_err());
        assert!(parse("").is_err());
        assert!(parse("<a/><b/>").is_err());
    }

    #[test]
    fn test_pretty_print() {
        let raw = "<config><x><v>1</v></x></config>";
        let tree = parse(raw).unwrap();
        let pretty = to_xml(&tree, tree.root(), true);
        assert!(pretty.contains("\n    <x>\n"));
        // pretty output parses back to the same tree
        let again = parse(&pretty).unwrap();
        assert_eq!(to_xml(&again, again.root(), false), raw);
    }
}
