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

//! # The schema model
//!
//! An immutable YANG tree built once at engine startup and shared by reference
//! for the lifetime of the process. Data nodes bind to schema nodes through
//! [`SchemaId`] indices into the tree's arena, which keeps the binding weak:
//! dropping the data tree never touches the schema and vice versa.
//!
//! The YANG front-end is an external collaborator; it delivers a validated
//! tree through the definition format in [`def`].

pub mod def;

/// Index of a schema node within its [`SchemaTree`] arena
pub type SchemaId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The YANG statement kind of a schema node
pub enum YangKind {
    Module,
    Container,
    List,
    Leaf,
    LeafList,
    Anyxml,
    Anydata,
    Choice,
    Case,
}

impl YangKind {
    /// Is this a leaf-shaped node, i.e. one whose value is its entire payload?
    pub const fn is_leafy(self) -> bool {
        matches!(self, Self::Leaf | Self::LeafList)
    }
    /// Is this an opaque node that can only be modified in its entirety?
    pub const fn is_opaque(self) -> bool {
        matches!(self, Self::Anyxml | Self::Anydata)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// The type descriptor of a leaf or leaf-list
pub enum TypeDescr {
    String,
    Int { min: i64, max: i64 },
    Uint { min: u64, max: u64 },
    Boolean,
    Empty,
    Enumeration(Vec<String>),
    Leafref { path: String },
}

impl Default for TypeDescr {
    fn default() -> Self {
        Self::String
    }
}

#[derive(Debug)]
/// An immutable description of an allowed data node
pub struct SchemaNode {
    pub name: String,
    pub namespace: Option<String>,
    pub kind: YangKind,
    /// ordered key leaf names (lists only)
    pub keys: Vec<String>,
    /// presence flag (containers only)
    pub presence: bool,
    /// mandatory flag (leaves only)
    pub mandatory: bool,
    pub typ: TypeDescr,
    /// `when` conditional (path expression, evaluated relative to the parent)
    pub when: Option<String>,
    /// `must` constraints (path expressions, evaluated relative to the node)
    pub must: Vec<String>,
    parent: Option<SchemaId>,
    children: Vec<SchemaId>,
}

impl SchemaNode {
    pub fn new(name: impl ToString, kind: YangKind) -> Self {
        Self {
            name: name.to_string(),
            namespace: None,
            kind,
            keys: Vec::new(),
            presence: false,
            mandatory: false,
            typ: TypeDescr::default(),
            when: None,
            must: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }
    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = keys;
        self
    }
}

#[derive(Debug)]
/// The immutable schema tree: an arena of [`SchemaNode`]s under a synthetic
/// root, whose children are modules
pub struct SchemaTree {
    nodes: Vec<SchemaNode>,
    root: SchemaId,
}

impl SchemaTree {
    pub fn new() -> Self {
        let root = SchemaNode::new("", YangKind::Module);
        Self {
            nodes: vec![root],
            root: 0,
        }
    }
    pub const fn root(&self) -> SchemaId {
        self.root
    }
    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id]
    }
    /// Add a node under `parent`, returning its id
    pub fn add_node(&mut self, parent: SchemaId, mut node: SchemaNode) -> SchemaId {
        let id = self.nodes.len();
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }
    pub fn parent(&self, id: SchemaId) -> Option<SchemaId> {
        self.nodes[id].parent
    }
    pub fn children(&self, id: SchemaId) -> &[SchemaId] {
        &self.nodes[id].children
    }
    /// The data-node children of `id` in declaration order, looking through
    /// `choice`/`case` levels (which never appear in instance data)
    pub fn data_children(&self, id: SchemaId) -> Vec<SchemaId> {
        let mut out = Vec::new();
        self.collect_data_children(id, &mut out);
        out
    }
    fn collect_data_children(&self, id: SchemaId, out: &mut Vec<SchemaId>) {
        for &cid in &self.nodes[id].children {
            match self.nodes[cid].kind {
                YangKind::Choice | YangKind::Case => self.collect_data_children(cid, out),
                _ => out.push(cid),
            }
        }
    }
    /// Find the data-node child of `id` called `name`
    pub fn find_child(&self, id: SchemaId, name: &str) -> Option<SchemaId> {
        self.data_children(id)
            .into_iter()
            .find(|&cid| self.nodes[cid].name == name)
    }
    /// The position of `id` within its parent's data children; used as the
    /// primary component of the sibling sort order
    pub fn child_position(&self, id: SchemaId) -> usize {
        match self.nodes[id].parent {
            Some(p) => self
                .data_children(p)
                .iter()
                .position(|&cid| cid == id)
                .unwrap_or(usize::MAX),
            None => 0,
        }
    }
    /// Is `leaf_name` one of the key leaves of the list node `list`?
    pub fn is_key(&self, list: SchemaId, leaf_name: &str) -> bool {
        self.nodes[list].keys.iter().any(|k| k == leaf_name)
    }
    /// The ordered key leaf names of the list node `list`
    pub fn key_leaves(&self, list: SchemaId) -> &[String] {
        &self.nodes[list].keys
    }
    /// The module a node belongs to
    pub fn module_of(&self, id: SchemaId) -> SchemaId {
        let mut cur = id;
        while let Some(p) = self.nodes[cur].parent {
            if p == self.root {
                return cur;
            }
            cur = p;
        }
        cur
    }
    /// Resolve a top-level element name against every module in the tree
    pub fn resolve_top(&self, name: &str) -> Option<SchemaId> {
        for &module in &self.nodes[self.root].children {
            if let Some(id) = self.find_child(module, name) {
                return Some(id);
            }
        }
        None
    }
    /// Resolve the namespace a top-level node is served under
    pub fn namespace_of(&self, id: SchemaId) -> Option<&str> {
        let module = self.module_of(id);
        self.nodes[module].namespace.as_deref()
    }
}

impl Default for SchemaTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_tree() -> (SchemaTree, SchemaId, SchemaId, SchemaId) {
        let mut st = SchemaTree::new();
        let root = st.root();
        let mut module = SchemaNode::new("demo", YangKind::Module);
        module.namespace = Some("urn:demo".to_owned());
        let module = st.add_node(root, module);
        let x = st.add_node(module, SchemaNode::new("x", YangKind::Container));
        let y = st.add_node(
            x,
            SchemaNode::new("y", YangKind::List).with_keys(vec!["a".to_owned(), "b".to_owned()]),
        );
        st.add_node(y, SchemaNode::new("a", YangKind::Leaf));
        st.add_node(y, SchemaNode::new("b", YangKind::Leaf));
        st.add_node(y, SchemaNode::new("v", YangKind::Leaf));
        (st, module, x, y)
    }

    #[test]
    fn test_lookups() {
        let (st, _module, x, y) = demo_tree();
        assert_eq!(st.find_child(x, "y"), Some(y));
        assert_eq!(st.find_child(x, "z"), None);
        assert!(st.is_key(y, "a"));
        assert!(st.is_key(y, "b"));
        assert!(!st.is_key(y, "v"));
        assert_eq!(st.key_leaves(y), &["a".to_owned(), "b".to_owned()]);
        assert_eq!(st.resolve_top("x"), Some(x));
        assert_eq!(st.resolve_top("nope"), None);
        assert_eq!(st.namespace_of(y), Some("urn:demo"));
    }

    #[test]
    fn test_choice_is_transparent() {
        let mut st = SchemaTree::new();
        let module = st.add_node(st.root(), SchemaNode::new("m", YangKind::Module));
        let c = st.add_node(module, SchemaNode::new("c", YangKind::Container));
        let choice = st.add_node(c, SchemaNode::new("kind", YangKind::Choice));
        let case_a = st.add_node(choice, SchemaNode::new("a", YangKind::Case));
        let case_b = st.add_node(choice, SchemaNode::new("b", YangKind::Case));
        let la = st.add_node(case_a, SchemaNode::new("la", YangKind::Leaf));
        let lb = st.add_node(case_b, SchemaNode::new("lb", YangKind::Leaf));
        assert_eq!(st.find_child(c, "la"), Some(la));
        assert_eq!(st.find_child(c, "lb"), Some(lb));
        // declaration order flattens across cases
        assert_eq!(st.child_position(la), 0);
        assert_eq!(st.child_position(lb), 1);
    }
}
