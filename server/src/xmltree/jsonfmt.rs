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

//! JSON serialization for data trees
//!
//! Containers map to objects, list/leaf-list instances collapse into arrays
//! under their shared name, and leaves map to strings. Attributes are not
//! representable in this format, which is fine for datastore files: operation
//! attributes only ever appear in modification payloads, never in stored
//! trees.

use super::{NodeId, Tree};
use crate::util::error::{ConfResult, Error};
use serde_json::{Map, Value};

fn node_to_value(tree: &Tree, id: NodeId) -> Value {
    let elems = tree.elem_children(id);
    if elems.is_empty() {
        return match tree.find_body(id) {
            Some(body) => Value::String(body.to_owned()),
            None => Value::Object(Map::new()),
        };
    }
    let mut out: Map<String, Value> = Map::new();
    for c in elems {
        let name = tree.node(c).name().to_owned();
        let value = node_to_value(tree, c);
        match out.get_mut(&name) {
            Some(Value::Array(arr)) => arr.push(value),
            Some(existing) => {
                let first = existing.take();
                out.insert(name, Value::Array(vec![first, value]));
            }
            None => {
                out.insert(name, value);
            }
        }
    }
    Value::Object(out)
}

/// Serialize the subtree rooted at `id` as a single-key JSON object
pub fn to_json(tree: &Tree, id: NodeId, pretty: bool) -> ConfResult<String> {
    let mut top = Map::new();
    top.insert(tree.node(id).name().to_owned(), node_to_value(tree, id));
    let value = Value::Object(top);
    let raw = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    raw.map_err(|e| Error::internal(format!("JSON serialization failed: {e}")))
}

fn value_into_tree(tree: &mut Tree, parent: NodeId, name: &str, value: &Value) -> ConfResult<()> {
    match value {
        Value::Array(items) => {
            for item in items {
                value_into_tree(tree, parent, name, item)?;
            }
        }
        Value::Object(entries) => {
            let elem = tree.new_element(parent, name, None);
            for (cname, cvalue) in entries {
                value_into_tree(tree, elem, cname, cvalue)?;
            }
        }
        Value::String(s) => {
            let elem = tree.new_element(parent, name, None);
            if !s.is_empty() {
                tree.set_body(elem, s);
            }
        }
        Value::Number(n) => {
            let elem = tree.new_element(parent, name, None);
            tree.set_body(elem, &n.to_string());
        }
        Value::Bool(b) => {
            let elem = tree.new_element(parent, name, None);
            tree.set_body(elem, if *b { "true" } else { "false" });
        }
        Value::Null => {
            tree.new_element(parent, name, None);
        }
    }
    Ok(())
}

/// Parse a single-key JSON object into a [`Tree`] rooted at that key
pub fn parse(input: &str) -> ConfResult<Tree> {
    let value: Value =
        serde_json::from_str(input).map_err(|e| Error::malformed(format!("bad JSON: {e}")))?;
    let top = match value {
        Value::Object(top) if top.len() == 1 => top,
        _ => {
            return Err(Error::malformed(
                "expected a JSON object with a single root key",
            ))
        }
    };
    let (name, body) = match top.into_iter().next() {
        Some(pair) => pair,
        None => return Err(Error::malformed("empty JSON document")),
    };
    let mut tree = Tree::new(&name);
    match &body {
        Value::Object(entries) => {
            for (cname, cvalue) in entries {
                let root = tree.root();
                value_into_tree(&mut tree, root, cname, cvalue)?;
            }
        }
        Value::String(s) => {
            let root = tree.root();
            if !s.is_empty() {
                tree.set_body(root, s);
            }
        }
        _ => return Err(Error::malformed("unexpected JSON root value")),
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmltree::xmlfmt;

    #[test]
    fn test_json_roundtrip() {
        let tree =
            xmlfmt::parse("<config><x><y><a>1</a><v>hello</v></y><y><a>2</a><v>bye</v></y></x></config>")
                .unwrap();
        let json = to_json(&tree, tree.root(), false).unwrap();
        assert_eq!(
            json,
            r#"{"config":{"x":{"y":[{"a":"1","v":"hello"},{"a":"2","v":"bye"}]}}}"#
        );
        let back = parse(&json).unwrap();
        assert_eq!(
            xmlfmt::to_xml(&back, back.root(), false),
            xmlfmt::to_xml(&tree, tree.root(), false)
        );
    }

    #[test]
    fn test_empty_container() {
        let tree = xmlfmt::parse("<config><x/></config>").unwrap();
        let json = to_json(&tree, tree.root(), false).unwrap();
        assert_eq!(json, r#"{"config":{"x":{}}}"#);
        let back = parse(&json).unwrap();
        assert!(back.find_elem_child(back.root(), "x").is_some());
    }

    #[test]
    fn test_bad_json_is_malformed() {
        assert!(parse("{}").is_err());
        assert!(parse("[1,2]").is_err());
        assert!(parse("{\"a\":1,\"b\":2}").is_err());
        assert!(parse("nope").is_err());
    }
}
