/*
 * Created on Wed Jul 08 2026
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

//! Post-merge validation
//!
//! Runs over the whole merged tree, not incrementally: mandatory leaves,
//! list key presence and uniqueness, leafref target existence, type
//! conformance, and `when`/`must` path conditions. A failed validation
//! leaves the candidate mutated; the client rolls back by copying `running`
//! over `candidate`.

use crate::schema::{SchemaTree, TypeDescr, YangKind};
use crate::util::error::{ConfResult, Error};
use crate::xmltree::{NodeId, Tree};
use crate::xpath;
use std::collections::HashSet;

fn check_type(tree: &Tree, id: NodeId, typ: &TypeDescr, path: &str) -> ConfResult<()> {
    let body = tree.find_body(id);
    match typ {
        TypeDescr::String => Ok(()),
        TypeDescr::Empty => match body {
            None => Ok(()),
            Some(_) => Err(Error::operation_failed(format!(
                "{}: leaf of type empty carries a value",
                path
            ))),
        },
        TypeDescr::Boolean => match body {
            Some("true") | Some("false") => Ok(()),
            other => Err(Error::operation_failed(format!(
                "{}: `{}` is not a boolean",
                path,
                other.unwrap_or("")
            ))),
        },
        TypeDescr::Int { min, max } => {
            let value: i64 = body
                .unwrap_or("")
                .parse()
                .map_err(|_| {
                    Error::operation_failed(format!(
                        "{}: `{}` is not an integer",
                        path,
                        body.unwrap_or("")
                    ))
                })?;
            if value < *min || value > *max {
                return Err(Error::operation_failed(format!(
                    "{}: {} out of range [{}, {}]",
                    path, value, min, max
                )));
            }
            Ok(())
        }
        TypeDescr::Uint { min, max } => {
            let value: u64 = body
                .unwrap_or("")
                .parse()
                .map_err(|_| {
                    Error::operation_failed(format!(
                        "{}: `{}` is not an unsigned integer",
                        path,
                        body.unwrap_or("")
                    ))
                })?;
            if value < *min || value > *max {
                return Err(Error::operation_failed(format!(
                    "{}: {} out of range [{}, {}]",
                    path, value, min, max
                )));
            }
            Ok(())
        }
        TypeDescr::Enumeration(values) => {
            let value = body.unwrap_or("");
            if values.iter().any(|v| v == value) {
                Ok(())
            } else {
                Err(Error::operation_failed(format!(
                    "{}: `{}` is not one of the enumeration values",
                    path, value
                )))
            }
        }
        TypeDescr::Leafref { path: target } => {
            let value = body.unwrap_or("");
            let from = if target.starts_with('/') {
                tree.root()
            } else {
                tree.node(id).parent().unwrap_or(tree.root())
            };
            let targets = xpath::bodies(tree, from, target)?;
            if targets.iter().any(|t| t == value) {
                Ok(())
            } else {
                Err(Error::data_missing(format!(
                    "{}: leafref target `{}` does not exist",
                    path, value
                )))
            }
        }
    }
}

fn validate_node(tree: &Tree, id: NodeId, schema: &SchemaTree) -> ConfResult<()> {
    let sid = match tree.node(id).schema() {
        Some(sid) => sid,
        // unresolved nodes were either rejected at merge time or came from a
        // trusted file; nothing to check against
        None => return Ok(()),
    };
    let y = schema.node(sid);
    let path = tree.node_path(id, schema);
    // when: the node may only exist while its condition holds
    if let Some(when) = &y.when {
        let ctx = if when.starts_with('/') {
            tree.root()
        } else {
            tree.node(id).parent().unwrap_or(tree.root())
        };
        if !xpath::eval_expr(tree, ctx, when)? {
            return Err(Error::operation_failed(format!(
                "{}: `when` condition `{}` not satisfied",
                path, when
            )));
        }
    }
    // must conditions are evaluated with the node itself as context
    for must in &y.must {
        let ctx = if must.starts_with('/') { tree.root() } else { id };
        if !xpath::eval_expr(tree, ctx, must)? {
            return Err(Error::operation_failed(format!(
                "{}: `must` condition `{}` not satisfied",
                path, must
            )));
        }
    }
    match y.kind {
        YangKind::Leaf | YangKind::LeafList => check_type(tree, id, &y.typ, &path)?,
        YangKind::List => {
            for key in schema.key_leaves(sid) {
                if tree.find_elem_child(id, key).is_none() {
                    return Err(Error::data_missing(format!(
                        "{}: missing key leaf `{}`",
                        path, key
                    )));
                }
            }
        }
        _ => {}
    }
    // mandatory leaves directly below this node
    if matches!(y.kind, YangKind::Container | YangKind::List) {
        for cid in schema.data_children(sid) {
            let cy = schema.node(cid);
            if cy.kind == YangKind::Leaf && cy.mandatory && tree.find_elem_child(id, &cy.name).is_none()
            {
                return Err(Error::data_missing(format!(
                    "{}: missing mandatory leaf `{}`",
                    path, cy.name
                )));
            }
        }
    }
    // key tuple uniqueness among list children
    let mut seen: HashSet<(String, Vec<String>)> = HashSet::new();
    for c in tree.elem_children(id) {
        if let Some(csid) = tree.node(c).schema() {
            if schema.node(csid).kind == YangKind::List {
                let tuple: Vec<String> = schema
                    .key_leaves(csid)
                    .iter()
                    .map(|k| {
                        tree.find_elem_child(c, k)
                            .and_then(|kc| tree.find_body(kc))
                            .unwrap_or("")
                            .to_owned()
                    })
                    .collect();
                if !seen.insert((tree.node(c).name().to_owned(), tuple)) {
                    return Err(Error::data_exists(format!(
                        "{}: duplicate key tuple",
                        tree.node_path(c, schema)
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Validate a merged tree against the schema
pub fn validate_tree(tree: &Tree, schema: &SchemaTree) -> ConfResult<()> {
    for id in tree.collect_elements(tree.root()) {
        if id == tree.root() {
            continue;
        }
        validate_node(tree, id, schema)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::def;
    use crate::util::error::ErrorKind;
    use crate::xmltree::xmlfmt;

    fn schema() -> SchemaTree {
        def::from_yaml(
            "\
module: example
nodes:
  - name: ifaces
    kind: container
    children:
      - name: iface
        kind: list
        keys: [name]
        children:
          - { name: name, kind: leaf }
          - { name: mtu, kind: leaf, type: { base: int, min: 64, max: 9000 } }
          - { name: enabled, kind: leaf, type: { base: boolean }, mandatory: true }
          - { name: speed, kind: leaf, type: { base: enumeration, values: [slow, fast] } }
  - name: default-iface
    kind: leaf
    type: { base: leafref, path: /ifaces/iface/name }
  - name: tuning
    kind: container
    when: /ifaces/iface
    children:
      - { name: level, kind: leaf, type: { base: uint, min: 0, max: 10 } }
",
        )
        .unwrap()
    }

    fn tree(raw: &str) -> Tree {
        let st = schema();
        let mut t = xmlfmt::parse(raw).unwrap();
        t.bind_schema(&st, true).unwrap();
        t
    }

    #[test]
    fn test_valid_tree_passes() {
        let st = schema();
        let t = tree(
            "<config><ifaces><iface><name>eth0</name><mtu>1500</mtu><enabled>true</enabled>\
             <speed>fast</speed></iface></ifaces><default-iface>eth0</default-iface>\
             <tuning><level>3</level></tuning></config>",
        );
        validate_tree(&t, &st).unwrap();
    }

    #[test]
    fn test_missing_mandatory_leaf() {
        let st = schema();
        let t = tree("<config><ifaces><iface><name>eth0</name></iface></ifaces></config>");
        let err = validate_tree(&t, &st).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataMissing);
        assert!(err.reason().contains("enabled"));
    }

    #[test]
    fn test_type_range() {
        let st = schema();
        let t = tree(
            "<config><ifaces><iface><name>eth0</name><mtu>12</mtu><enabled>true</enabled>\
             </iface></ifaces></config>",
        );
        let err = validate_tree(&t, &st).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
        assert!(err.reason().contains("out of range"));
    }

    #[test]
    fn test_bad_boolean_and_enum() {
        let st = schema();
        let t = tree(
            "<config><ifaces><iface><name>eth0</name><enabled>maybe</enabled></iface></ifaces></config>",
        );
        assert!(validate_tree(&t, &st).is_err());
        let t = tree(
            "<config><ifaces><iface><name>eth0</name><enabled>true</enabled>\
             <speed>warp</speed></iface></ifaces></config>",
        );
        assert!(validate_tree(&t, &st).is_err());
    }

    #[test]
    fn test_dangling_leafref() {
        let st = schema();
        let t = tree(
            "<config><ifaces><iface><name>eth0</name><enabled>true</enabled></iface></ifaces>\
             <default-iface>eth9</default-iface></config>",
        );
        let err = validate_tree(&t, &st).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataMissing);
        assert!(err.reason().contains("eth9"));
    }

    #[test]
    fn test_when_condition() {
        let st = schema();
        // tuning requires at least one iface
        let t = tree("<config><tuning><level>3</level></tuning></config>");
        let err = validate_tree(&t, &st).unwrap_err();
        assert!(err.reason().contains("when"));
    }

    #[test]
    fn test_duplicate_key_tuples() {
        let st = schema();
        let mut t = tree(
            "<config><ifaces><iface><name>eth0</name><enabled>true</enabled></iface></ifaces></config>",
        );
        // force a duplicate the merge engine would never produce
        let ifaces = t.find_elem_child(t.root(), "ifaces").unwrap();
        let dup = t.extract(t.find_elem_child(ifaces, "iface").unwrap());
        t.copy_into(ifaces, &dup, dup.root());
        let err = validate_tree(&t, &st).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataExists);
    }

    #[test]
    fn test_missing_list_key() {
        let st = schema();
        let mut t = tree("<config><ifaces><iface><name>eth0</name><enabled>true</enabled></iface></ifaces></config>");
        let ifaces = t.find_elem_child(t.root(), "ifaces").unwrap();
        let iface = t.find_elem_child(ifaces, "iface").unwrap();
        let name = t.find_elem_child(iface, "name").unwrap();
        t.purge(name);
        let err = validate_tree(&t, &st).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataMissing);
        assert!(err.reason().contains("key leaf"));
    }
}
