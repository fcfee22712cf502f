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

//! # The data tree
//!
//! A mutable XML-shaped value tree bound to schema nodes. Nodes live in an
//! arena owned by the [`Tree`]; parents, children and schema bindings are
//! indices, so there is no cyclic ownership. A node id is only valid while its
//! node is alive and ids must not be retained across a purge of an ancestor.
//!
//! Sibling elements under one parent are kept in a total order: schema
//! declaration position first, then the list key tuple (or the body for
//! leaf-lists) lexicographically. `sort_children` restores the invariant after
//! a parent's children have been touched.

pub mod jsonfmt;
pub mod xmlfmt;

use crate::schema::{SchemaId, SchemaTree, YangKind};

/// Scratch flag: generic mark for sweep passes
pub const FLAG_MARK: u8 = 1 << 0;
/// Scratch flag: node was created by an `none`-op edit and may be pruned
pub const FLAG_NONE: u8 = 1 << 1;

/// Index of a node within its [`Tree`] arena
pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Attribute,
    Body,
}

#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    prefix: Option<String>,
    kind: NodeKind,
    value: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    schema: Option<SchemaId>,
    flags: u8,
    alive: bool,
}

impl Node {
    fn new(name: impl ToString, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            prefix: None,
            kind,
            value: None,
            parent: None,
            children: Vec::new(),
            schema: None,
            flags: 0,
            alive: true,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
    pub const fn schema(&self) -> Option<SchemaId> {
        self.schema
    }
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    root: NodeId,
}

impl Tree {
    /// Create a tree holding a single root element
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Node::new(root_name, NodeKind::Element)],
            free: Vec::new(),
            root: 0,
        }
    }
    pub const fn root(&self) -> NodeId {
        self.root
    }
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }
    pub fn is_alive(&self, id: NodeId) -> bool {
        id < self.nodes.len() && self.nodes[id].alive
    }
    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    // construction

    /// Create a new child node of the given kind under `parent`
    pub fn new_child(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> NodeId {
        let mut node = Node::new(name, kind);
        node.parent = Some(parent);
        let id = self.alloc(node);
        self.nodes[parent].children.push(id);
        id
    }
    pub fn new_element(&mut self, parent: NodeId, name: &str, schema: Option<SchemaId>) -> NodeId {
        let id = self.new_child(parent, name, NodeKind::Element);
        self.nodes[id].schema = schema;
        id
    }
    pub fn set_schema(&mut self, id: NodeId, schema: Option<SchemaId>) {
        self.nodes[id].schema = schema;
    }
    pub fn set_prefix(&mut self, id: NodeId, prefix: Option<String>) {
        self.nodes[id].prefix = prefix;
    }

    // bodies and attributes

    /// The body string of an element, if it has a body child with a value
    pub fn find_body(&self, elem: NodeId) -> Option<&str> {
        self.nodes[elem]
            .children
            .iter()
            .find(|&&c| self.nodes[c].kind == NodeKind::Body)
            .and_then(|&c| self.nodes[c].value.as_deref())
    }
    fn body_node(&self, elem: NodeId) -> Option<NodeId> {
        self.nodes[elem]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].kind == NodeKind::Body)
    }
    /// Set the body of an element, creating the body child if needed
    pub fn set_body(&mut self, elem: NodeId, value: &str) {
        match self.body_node(elem) {
            Some(b) => self.nodes[b].value = Some(value.to_owned()),
            None => {
                let b = self.new_child(elem, "body", NodeKind::Body);
                self.nodes[b].value = Some(value.to_owned());
            }
        }
    }
    pub fn find_attr(&self, elem: NodeId, name: &str) -> Option<&str> {
        self.nodes[elem]
            .children
            .iter()
            .find(|&&c| {
                let n = &self.nodes[c];
                n.kind == NodeKind::Attribute && n.name == name && n.prefix.is_none()
            })
            .and_then(|&c| self.nodes[c].value.as_deref())
    }
    pub fn set_attr(&mut self, elem: NodeId, name: &str, value: &str) {
        let existing = self.nodes[elem].children.iter().copied().find(|&c| {
            let n = &self.nodes[c];
            n.kind == NodeKind::Attribute && n.name == name && n.prefix.is_none()
        });
        match existing {
            Some(a) => self.nodes[a].value = Some(value.to_owned()),
            None => {
                let a = self.new_child(elem, name, NodeKind::Attribute);
                self.nodes[a].value = Some(value.to_owned());
            }
        }
    }
    pub fn set_prefixed_attr(&mut self, elem: NodeId, prefix: &str, name: &str, value: &str) {
        let a = self.new_child(elem, name, NodeKind::Attribute);
        self.nodes[a].prefix = Some(prefix.to_owned());
        self.nodes[a].value = Some(value.to_owned());
    }
    // child access

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }
    pub fn elem_children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(|&c| self.nodes[c].kind == NodeKind::Element)
            .collect()
    }
    pub fn attr_children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(|&c| self.nodes[c].kind == NodeKind::Attribute)
            .collect()
    }
    pub fn elem_child_count(&self, id: NodeId) -> usize {
        self.nodes[id]
            .children
            .iter()
            .filter(|&&c| self.nodes[c].kind == NodeKind::Element)
            .count()
    }
    /// Find the first element child with the given name
    pub fn find_elem_child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].kind == NodeKind::Element && self.nodes[c].name == name)
    }

    // detachment and freeing

    /// Unlink a node from its parent without freeing it
    pub fn detach(&mut self, id: NodeId) {
        if let Some(p) = self.nodes[id].parent {
            self.nodes[p].children.retain(|&c| c != id);
            self.nodes[id].parent = None;
        }
    }
    /// Detach a subtree and free every node in it. The root cannot be purged.
    pub fn purge(&mut self, id: NodeId) {
        if id == self.root || !self.is_alive(id) {
            return;
        }
        self.detach(id);
        self.free_rec(id);
    }
    fn free_rec(&mut self, id: NodeId) {
        let children = core::mem::take(&mut self.nodes[id].children);
        for c in children {
            self.free_rec(c);
        }
        self.nodes[id].alive = false;
        self.nodes[id].value = None;
        self.nodes[id].schema = None;
        self.nodes[id].flags = 0;
        self.free.push(id);
    }
    /// Purge every element child of `id`
    pub fn purge_children(&mut self, id: NodeId) {
        for c in self.elem_children(id) {
            self.purge(c);
        }
    }

    // subtree copies

    /// Deep-copy a subtree from another tree under `parent`, returning the new
    /// root of the copy. Schema bindings refer to the shared schema arena and
    /// are carried over as-is.
    pub fn copy_into(&mut self, parent: NodeId, src: &Tree, src_id: NodeId) -> NodeId {
        let srcn = src.node(src_id);
        let id = self.new_child(parent, &srcn.name.clone(), srcn.kind);
        self.nodes[id].prefix = srcn.prefix.clone();
        self.nodes[id].value = srcn.value.clone();
        self.nodes[id].schema = srcn.schema;
        for &c in src.children(src_id) {
            self.copy_into(id, src, c);
        }
        id
    }
    /// Clone a subtree into a standalone tree whose root is the subtree root
    pub fn extract(&self, id: NodeId) -> Tree {
        let n = self.node(id);
        let mut out = Tree::new(&n.name);
        out.nodes[out.root].prefix = n.prefix.clone();
        out.nodes[out.root].value = n.value.clone();
        out.nodes[out.root].schema = n.schema;
        for &c in self.children(id) {
            let root = out.root;
            out.copy_into(root, self, c);
        }
        out
    }

    // flags

    pub fn flag_set(&mut self, id: NodeId, flag: u8) {
        self.nodes[id].flags |= flag;
    }
    pub fn flag_reset(&mut self, id: NodeId, flag: u8) {
        self.nodes[id].flags &= !flag;
    }
    pub fn flag_is_set(&self, id: NodeId, flag: u8) -> bool {
        self.nodes[id].flags & flag != 0
    }
    /// Clear a flag on every element reachable from `from`
    pub fn flag_reset_all(&mut self, from: NodeId, flag: u8) {
        for id in self.collect_elements(from) {
            self.flag_reset(id, flag);
        }
    }

    // walkers

    /// All live elements of the subtree rooted at `from`, pre-order
    pub fn collect_elements(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if self.nodes[id].kind == NodeKind::Element {
                out.push(id);
                for &c in self.nodes[id].children.iter().rev() {
                    stack.push(c);
                }
            }
        }
        out
    }
    /// Depth-first application of `f` over every element of the subtree
    pub fn apply(&self, from: NodeId, f: &mut impl FnMut(&Tree, NodeId)) {
        for id in self.collect_elements(from) {
            f(self, id);
        }
    }
    fn subtree_all_flagged(&self, id: NodeId, flag: u8) -> bool {
        if !self.flag_is_set(id, flag) {
            return false;
        }
        self.elem_children(id)
            .into_iter()
            .all(|c| self.subtree_all_flagged(c, flag))
    }
    /// Remove every subtree (excluding the root) in which the given flag is
    /// set on the node and on all of its element descendants
    pub fn prune_flagged_sub(&mut self, flag: u8) {
        let mut victims = Vec::new();
        self.find_flagged_sub(self.root, flag, &mut victims);
        for v in victims {
            self.purge(v);
        }
    }
    fn find_flagged_sub(&self, id: NodeId, flag: u8, victims: &mut Vec<NodeId>) {
        for c in self.elem_children(id) {
            if self.subtree_all_flagged(c, flag) {
                victims.push(c);
            } else {
                self.find_flagged_sub(c, flag, victims);
            }
        }
    }
    /// Detach every node whose flag is set; if `recursive`, also purge any
    /// ancestor that becomes an empty non-presence container
    pub fn prune_flagged(&mut self, flag: u8, recursive: bool, schema: &SchemaTree) {
        let victims: Vec<NodeId> = self
            .collect_elements(self.root)
            .into_iter()
            .filter(|&id| id != self.root && self.flag_is_set(id, flag))
            .collect();
        for v in victims {
            if !self.is_alive(v) {
                // an ancestor was purged before us
                continue;
            }
            let mut parent = self.nodes[v].parent;
            self.purge(v);
            if !recursive {
                continue;
            }
            while let Some(p) = parent {
                if p == self.root || !self.is_alive(p) {
                    break;
                }
                let prunable = match self.nodes[p].schema {
                    Some(sid) => {
                        let y = schema.node(sid);
                        y.kind == YangKind::Container && !y.presence
                    }
                    None => false,
                };
                if prunable && self.elem_child_count(p) == 0 {
                    parent = self.nodes[p].parent;
                    self.purge(p);
                } else {
                    break;
                }
            }
        }
    }

    // ordering

    fn sort_key(&self, id: NodeId, schema: &SchemaTree) -> (usize, Vec<String>) {
        match self.nodes[id].schema {
            Some(sid) => {
                let pos = schema.child_position(sid);
                let tuple = match schema.node(sid).kind {
                    YangKind::List => schema
                        .key_leaves(sid)
                        .iter()
                        .map(|k| {
                            self.find_elem_child(id, k)
                                .and_then(|c| self.find_body(c))
                                .unwrap_or("")
                                .to_owned()
                        })
                        .collect(),
                    YangKind::LeafList => {
                        vec![self.find_body(id).unwrap_or("").to_owned()]
                    }
                    _ => Vec::new(),
                };
                (pos, tuple)
            }
            None => (usize::MAX, Vec::new()),
        }
    }
    /// Re-establish the sibling total order under `parent`: schema declaration
    /// position first, then key tuple (lists) or body (leaf-lists). Attribute
    /// and body children stay ahead of elements.
    pub fn sort_children(&mut self, parent: NodeId, schema: &SchemaTree) {
        let children = self.nodes[parent].children.clone();
        let (mut elems, others): (Vec<NodeId>, Vec<NodeId>) = children
            .into_iter()
            .partition(|&c| self.nodes[c].kind == NodeKind::Element);
        elems.sort_by(|&a, &b| self.sort_key(a, schema).cmp(&self.sort_key(b, schema)));
        let mut ordered = others;
        ordered.extend(elems);
        self.nodes[parent].children = ordered;
    }

    // matching

    /// Find the element child of `parent` (in this tree) corresponding to the
    /// candidate node `cand` of `modt`: same name, and for lists an equal key
    /// leaf tuple, for leaf-lists an equal body
    pub fn match_by_keys(
        &self,
        parent: NodeId,
        modt: &Tree,
        cand: NodeId,
        yc: SchemaId,
        schema: &SchemaTree,
    ) -> Option<NodeId> {
        let name = modt.node(cand).name();
        let y = schema.node(yc);
        for child in self.elem_children(parent) {
            if self.nodes[child].name != name {
                continue;
            }
            let matched = match y.kind {
                YangKind::List => schema.key_leaves(yc).iter().all(|k| {
                    let base_key = self
                        .find_elem_child(child, k)
                        .and_then(|c| self.find_body(c));
                    let cand_key = modt
                        .find_elem_child(cand, k)
                        .and_then(|c| modt.find_body(c));
                    base_key.is_some() && base_key == cand_key
                }),
                YangKind::LeafList => self.find_body(child) == modt.find_body(cand),
                _ => true,
            };
            if matched {
                return Some(child);
            }
        }
        None
    }

    /// The keyed path of a node from the root, e.g. `/x/y[a=1][b=2]/v`
    pub fn node_path(&self, id: NodeId, schema: &SchemaTree) -> String {
        let mut segments = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == self.root {
                break;
            }
            let n = &self.nodes[c];
            let mut seg = n.name.clone();
            if let Some(sid) = n.schema {
                if schema.node(sid).kind == YangKind::List {
                    for k in schema.key_leaves(sid) {
                        if let Some(v) = self.find_elem_child(c, k).and_then(|kc| self.find_body(kc))
                        {
                            seg.push_str(&format!("[{}={}]", k, v));
                        }
                    }
                }
            }
            segments.push(seg);
            cur = n.parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    /// Bind schema nodes to every element under the root. With `strict` set an
    /// element with no schema counterpart is an error; otherwise it is left
    /// unresolved.
    pub fn bind_schema(
        &mut self,
        schema: &SchemaTree,
        strict: bool,
    ) -> crate::util::error::ConfResult<()> {
        let children = self.elem_children(self.root);
        for c in children {
            self.bind_top(c, schema, strict)?;
        }
        Ok(())
    }
    fn bind_top(
        &mut self,
        id: NodeId,
        schema: &SchemaTree,
        strict: bool,
    ) -> crate::util::error::ConfResult<()> {
        let name = self.nodes[id].name.clone();
        match schema.resolve_top(&name) {
            Some(sid) => {
                self.nodes[id].schema = Some(sid);
                self.bind_below(id, sid, schema, strict)
            }
            None if strict => Err(crate::util::error::Error::unknown_element(name)),
            None => Ok(()),
        }
    }
    fn bind_below(
        &mut self,
        id: NodeId,
        sid: SchemaId,
        schema: &SchemaTree,
        strict: bool,
    ) -> crate::util::error::ConfResult<()> {
        for c in self.elem_children(id) {
            let name = self.nodes[c].name.clone();
            match schema.find_child(sid, &name) {
                Some(csid) => {
                    self.nodes[c].schema = Some(csid);
                    self.bind_below(c, csid, schema, strict)?;
                }
                None if strict => return Err(crate::util::error::Error::unknown_element(name)),
                None => {}
            }
        }
        Ok(())
    }
}
