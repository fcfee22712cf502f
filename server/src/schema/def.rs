/*
 * Created on Mon Jun 01 2026
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

//! The schema definition format
//!
//! YANG syntax parsing is the front-end's job; it hands the engine a validated
//! tree serialized in this YAML layout. One document holds one or more module
//! definitions:
//!
//! ```yaml
//! module: example
//! namespace: urn:example:config
//! nodes:
//!   - name: x
//!     kind: container
//!     children:
//!       - name: y
//!         kind: list
//!         keys: [a, b]
//!         children:
//!           - { name: a, kind: leaf }
//!           - { name: b, kind: leaf }
//!           - { name: v, kind: leaf, type: { base: string } }
//! ```

use crate::schema::{SchemaNode, SchemaTree, TypeDescr, YangKind};
use crate::util::error::{ConfResult, Error};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize)]
pub struct ModuleDef {
    pub module: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
}

#[derive(Debug, Deserialize)]
pub struct NodeDef {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub presence: bool,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(rename = "type", default)]
    pub typ: Option<TypeDef>,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub must: Vec<String>,
    #[serde(default)]
    pub children: Vec<NodeDef>,
}

#[derive(Debug, Deserialize)]
pub struct TypeDef {
    pub base: String,
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub path: Option<String>,
}

fn kind_of(st: &str) -> ConfResult<YangKind> {
    Ok(match st {
        "container" => YangKind::Container,
        "list" => YangKind::List,
        "leaf" => YangKind::Leaf,
        "leaf-list" => YangKind::LeafList,
        "anyxml" => YangKind::Anyxml,
        "anydata" => YangKind::Anydata,
        "choice" => YangKind::Choice,
        "case" => YangKind::Case,
        other => {
            return Err(Error::malformed(format!(
                "Unknown schema node kind `{other}`"
            )))
        }
    })
}

fn type_of(td: &TypeDef) -> ConfResult<TypeDescr> {
    Ok(match td.base.as_str() {
        "string" => TypeDescr::String,
        "boolean" => TypeDescr::Boolean,
        "empty" => TypeDescr::Empty,
        "int" => TypeDescr::Int {
            min: td.min.unwrap_or(i64::MIN),
            max: td.max.unwrap_or(i64::MAX),
        },
        "uint" => TypeDescr::Uint {
            min: td.min.map(|v| v as u64).unwrap_or(u64::MIN),
            max: td.max.map(|v| v as u64).unwrap_or(u64::MAX),
        },
        "enumeration" => TypeDescr::Enumeration(td.values.clone()),
        "leafref" => TypeDescr::Leafref {
            path: td
                .path
                .clone()
                .ok_or_else(|| Error::malformed("leafref type without a `path`"))?,
        },
        other => {
            return Err(Error::malformed(format!("Unknown leaf type `{other}`")))
        }
    })
}

fn build_node(tree: &mut SchemaTree, parent: usize, def: &NodeDef) -> ConfResult<()> {
    let mut node = SchemaNode::new(&def.name, kind_of(&def.kind)?);
    node.keys = def.keys.clone();
    node.presence = def.presence;
    node.mandatory = def.mandatory;
    node.when = def.when.clone();
    node.must = def.must.clone();
    if let Some(td) = &def.typ {
        node.typ = type_of(td)?;
    }
    let id = tree.add_node(parent, node);
    for child in &def.children {
        build_node(tree, id, child)?;
    }
    Ok(())
}

/// Build a [`SchemaTree`] from parsed module definitions
pub fn from_defs(defs: &[ModuleDef]) -> ConfResult<SchemaTree> {
    let mut tree = SchemaTree::new();
    let root = tree.root();
    for def in defs {
        let mut module = SchemaNode::new(&def.module, YangKind::Module);
        module.namespace = def.namespace.clone();
        let module = tree.add_node(root, module);
        for node in &def.nodes {
            build_node(&mut tree, module, node)?;
        }
    }
    Ok(tree)
}

/// Parse a single-module YAML document into a [`SchemaTree`]
pub fn from_yaml(raw: &str) -> ConfResult<SchemaTree> {
    let def: ModuleDef =
        serde_yaml::from_str(raw).map_err(|e| Error::malformed(format!("bad schema: {e}")))?;
    from_defs(&[def])
}

/// Load a schema definition file
pub fn load_from_file(path: &str) -> ConfResult<SchemaTree> {
    let raw = fs::read_to_string(path)?;
    from_yaml(&raw)
}
