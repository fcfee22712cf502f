/*
 * Created on Mon Jul 06 2026
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

//! # The merge engine
//!
//! Modifies a base tree in place under a modification tree and a per-subtree
//! operation. The modification tree may override the effective operation at
//! any element through an `operation` attribute; the override applies to that
//! subtree until re-overridden.
//!
//! The descent at every non-leaf node runs in two passes: the first aligns
//! each modification child with its base counterpart (by name and key tuple),
//! purging base children whose schema binding differs (choice replacement);
//! the second recurses over the aligned pairs. Every touched parent is
//! re-sorted afterwards.
//!
//! A failed merge may leave partial mutations in the base tree; the datastore
//! checkpoints the cache before merging and restores it on failure.

use crate::acl::{AclAction, WriteGate};
use crate::schema::{SchemaId, SchemaTree, YangKind};
use crate::util::error::{ConfResult, Error};
use crate::xmltree::{NodeId, Tree, FLAG_MARK, FLAG_NONE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The edit operation governing how a modification subtree alters the base
pub enum ModifyOp {
    Merge,
    Replace,
    Create,
    Delete,
    Remove,
    None,
}

impl ModifyOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Replace => "replace",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Remove => "remove",
            Self::None => "none",
        }
    }
    pub fn from_name(name: &str) -> ConfResult<Self> {
        Ok(match name {
            "merge" => Self::Merge,
            "replace" => Self::Replace,
            "create" => Self::Create,
            "delete" => Self::Delete,
            "remove" => Self::Remove,
            "none" => Self::None,
            other => return Err(Error::not_supported(format!("Unknown operation `{other}`"))),
        })
    }
    pub const fn code(self) -> u16 {
        match self {
            Self::Merge => 0,
            Self::Replace => 1,
            Self::Create => 2,
            Self::Delete => 3,
            Self::Remove => 4,
            Self::None => 5,
        }
    }
    pub const fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0 => Self::Merge,
            1 => Self::Replace,
            2 => Self::Create,
            3 => Self::Delete,
            4 => Self::Remove,
            5 => Self::None,
            _ => return None,
        })
    }
}

/// Resolve an `operation` attribute override on a modification node
fn effective_op(modt: &Tree, x1: NodeId, op: ModifyOp) -> ConfResult<ModifyOp> {
    match modt.find_attr(x1, "operation") {
        Some(attr) => ModifyOp::from_name(attr),
        None => Ok(op),
    }
}

/// Copy `xmlns` declarations from a modification node onto a newly created
/// base node
fn copy_xmlns(base: &mut Tree, x0: NodeId, modt: &Tree, x1: NodeId) {
    for a in modt.attr_children(x1) {
        let an = modt.node(a);
        let is_default_ns = an.name() == "xmlns" && an.prefix().is_none();
        let is_prefixed_ns = an.prefix() == Some("xmlns");
        if is_default_ns {
            base.set_attr(x0, "xmlns", an.value().unwrap_or(""));
        } else if is_prefixed_ns {
            base.set_prefixed_attr(x0, "xmlns", an.name(), an.value().unwrap_or(""));
        }
    }
}

/// The keyed gate path for a modification child
fn child_path(modt: &Tree, x1c: NodeId, yc: SchemaId, schema: &SchemaTree, parent: &str) -> String {
    let mut seg = modt.node(x1c).name().to_owned();
    if schema.node(yc).kind == YangKind::List {
        for k in schema.key_leaves(yc) {
            if let Some(v) = modt.find_elem_child(x1c, k).and_then(|c| modt.find_body(c)) {
                seg.push_str(&format!("[{}={}]", k, v));
            }
        }
    }
    if parent == "/" {
        format!("/{}", seg)
    } else {
        format!("{}/{}", parent, seg)
    }
}

/// Modify base node `x0` (possibly absent) under parent `x0p` with the
/// modification node `x1` bound to schema node `y`
#[allow(clippy::too_many_arguments)]
fn modify(
    base: &mut Tree,
    x0: Option<NodeId>,
    y: SchemaId,
    x0p: NodeId,
    modt: &Tree,
    x1: NodeId,
    op: ModifyOp,
    schema: &SchemaTree,
    gate: &dyn WriteGate,
    permit: bool,
    path: &str,
) -> ConfResult<()> {
    let op = effective_op(modt, x1, op)?;
    let x1name = modt.node(x1).name().to_owned();
    let ykind = schema.node(y).kind;
    if ykind.is_leafy() {
        let x1bstr = modt.find_body(x1).map(str::to_owned);
        match op {
            ModifyOp::Create | ModifyOp::None | ModifyOp::Merge | ModifyOp::Replace => {
                if op == ModifyOp::Create && x0.is_some() {
                    return Err(Error::data_exists(
                        "Data already exists; cannot create new resource",
                    ));
                }
                let (x0, created) = match x0 {
                    Some(x0) => (x0, false),
                    None => {
                        if op != ModifyOp::None && !permit {
                            gate.check(path, AclAction::Create)?;
                        }
                        let x0 = base.new_element(x0p, &x1name, Some(y));
                        copy_xmlns(base, x0, modt, x1);
                        if op == ModifyOp::None {
                            // mark for potential deletion after the merge
                            base.flag_set(x0, FLAG_NONE);
                        }
                        (x0, true)
                    }
                };
                if let Some(x1bstr) = x1bstr {
                    let differs = base.find_body(x0) != Some(x1bstr.as_str());
                    if differs {
                        if op != ModifyOp::None && !permit && !created {
                            let action = if base.find_body(x0).is_none() {
                                AclAction::Create
                            } else {
                                AclAction::Update
                            };
                            gate.check(path, action)?;
                        }
                        base.set_body(x0, &x1bstr);
                        // a leaf that received a value carries data: it is no
                        // longer a tentative addressing node
                        base.flag_reset(x0, FLAG_NONE);
                    }
                }
            }
            ModifyOp::Delete | ModifyOp::Remove => {
                if op == ModifyOp::Delete && x0.is_none() {
                    return Err(Error::data_missing(
                        "Data does not exist; cannot delete resource",
                    ));
                }
                if let Some(x0) = x0 {
                    if !permit {
                        gate.check(path, AclAction::Delete)?;
                    }
                    base.purge(x0);
                }
            }
        }
    } else {
        match op {
            ModifyOp::Create | ModifyOp::Replace | ModifyOp::Merge | ModifyOp::None => {
                let mut x0 = x0;
                let mut permit = permit;
                if matches!(op, ModifyOp::Create | ModifyOp::Replace) {
                    if op == ModifyOp::Create && x0.is_some() {
                        return Err(Error::data_exists(
                            "Data already exists; cannot create new resource",
                        ));
                    }
                    if !permit {
                        let action = if x0.is_some() {
                            AclAction::Update
                        } else {
                            AclAction::Create
                        };
                        gate.check(path, action)?;
                        permit = true;
                    }
                    if let Some(old) = x0.take() {
                        base.purge(old);
                    }
                }
                // An anyxml node is an opaque chunk of data, modified only in
                // its entirety; operation attributes on its subelements are
                // ignored (RFC 6020 7.10.3)
                if ykind.is_opaque() {
                    if op == ModifyOp::None {
                        base.sort_children(x0p, schema);
                        return Ok(());
                    }
                    if op == ModifyOp::Merge && !permit {
                        let action = if x0.is_some() {
                            AclAction::Update
                        } else {
                            AclAction::Create
                        };
                        gate.check(path, action)?;
                    }
                    if let Some(old) = x0.take() {
                        base.purge(old);
                    }
                    let fresh = base.new_element(x0p, &x1name, Some(y));
                    for &c in modt.children(x1) {
                        base.copy_into(fresh, modt, c);
                    }
                    base.sort_children(x0p, schema);
                    return Ok(());
                }
                let x0 = match x0 {
                    Some(x0) => x0,
                    None => {
                        if op == ModifyOp::Merge && !permit {
                            gate.check(path, AclAction::Create)?;
                            permit = true;
                        }
                        let fresh = base.new_element(x0p, &x1name, Some(y));
                        copy_xmlns(base, fresh, modt, x1);
                        if op == ModifyOp::None {
                            base.flag_set(fresh, FLAG_NONE);
                        }
                        fresh
                    }
                };
                // First pass: align each modification child with its base
                // counterpart without touching the base children
                let x1cs = modt.elem_children(x1);
                let mut x0vec: Vec<(Option<NodeId>, SchemaId)> = Vec::with_capacity(x1cs.len());
                for &x1c in &x1cs {
                    let x1cname = modt.node(x1c).name();
                    let yc = schema
                        .find_child(y, x1cname)
                        .ok_or_else(|| Error::unknown_element(x1cname))?;
                    let mut x0c = base.match_by_keys(x0, modt, x1c, yc, schema);
                    if let Some(found) = x0c {
                        if base.node(found).schema() != Some(yc) {
                            // a match bound to another schema node: replaced
                            // (choice/case switch)
                            base.purge(found);
                            x0c = None;
                        }
                    }
                    x0vec.push((x0c, yc));
                }
                // Second pass: recurse over the aligned pairs
                for (&x1c, (x0c, yc)) in x1cs.iter().zip(x0vec) {
                    let cpath = child_path(modt, x1c, yc, schema, path);
                    modify(base, x0c, yc, x0, modt, x1c, op, schema, gate, permit, &cpath)?;
                }
            }
            ModifyOp::Delete | ModifyOp::Remove => {
                if op == ModifyOp::Delete && x0.is_none() {
                    return Err(Error::data_missing(
                        "Data does not exist; cannot delete resource",
                    ));
                }
                if let Some(x0) = x0 {
                    if !permit {
                        gate.check(path, AclAction::Delete)?;
                    }
                    base.purge(x0);
                }
            }
        }
    }
    base.sort_children(x0p, schema);
    Ok(())
}

/// Modify the top-level base tree with the modification tree. Both roots must
/// be the literal `config` element.
pub fn modify_top(
    base: &mut Tree,
    modt: &Tree,
    schema: &SchemaTree,
    op: ModifyOp,
    gate: &dyn WriteGate,
) -> ConfResult<()> {
    if base.node(base.root()).name() != "config" {
        return Err(Error::malformed(format!(
            "Top-level symbol is {}, expected \"config\"",
            base.node(base.root()).name()
        )));
    }
    if modt.node(modt.root()).name() != "config" {
        return Err(Error::malformed(format!(
            "Top-level symbol of modification tree is {}, expected \"config\"",
            modt.node(modt.root()).name()
        )));
    }
    let op = effective_op(modt, modt.root(), op)?;
    let mut permit = gate.blanket_permit();
    let x1cs = modt.elem_children(modt.root());
    // Special case: an empty modification tree wipes or keeps the base
    // depending on the operation
    if x1cs.is_empty() {
        if base.elem_child_count(base.root()) != 0
            && matches!(op, ModifyOp::Delete | ModifyOp::Remove | ModifyOp::Replace)
        {
            if !permit {
                gate.check("/", AclAction::Delete)?;
            }
            base.purge_children(base.root());
        }
        return Ok(());
    }
    // Special case: top-level replace/delete purges the base before the
    // descent recreates it from the modification tree
    if matches!(op, ModifyOp::Replace | ModifyOp::Delete) {
        if !permit {
            gate.check("/", AclAction::Update)?;
            permit = true;
        }
        base.purge_children(base.root());
    }
    for x1c in x1cs {
        let x1cname = modt.node(x1c).name();
        let yc = schema
            .resolve_top(x1cname)
            .ok_or_else(|| Error::unknown_element(x1cname))?;
        let mut x0c = base.match_by_keys(base.root(), modt, x1c, yc, schema);
        if let Some(found) = x0c {
            if base.node(found).schema() != Some(yc) {
                base.purge(found);
                x0c = None;
            }
        }
        let root = base.root();
        let cpath = child_path(modt, x1c, yc, schema, "/");
        modify(base, x0c, yc, root, modt, x1c, op, schema, gate, permit, &cpath)?;
    }
    Ok(())
}

/// Mark empty non-presence containers for the sweep pass
fn mark_empty_nonpresence(base: &mut Tree, schema: &SchemaTree) {
    for id in base.collect_elements(base.root()) {
        if id == base.root() {
            continue;
        }
        if let Some(sid) = base.node(id).schema() {
            let y = schema.node(sid);
            if y.kind == YangKind::Container && !y.presence && base.elem_child_count(id) == 0 {
                base.flag_set(id, FLAG_MARK);
            }
        }
    }
}

/// Run a complete edit: the descent plus the post passes that remove
/// all-`none` subtrees and empty non-presence containers
pub fn apply_edit(
    base: &mut Tree,
    modt: &Tree,
    schema: &SchemaTree,
    op: ModifyOp,
    gate: &dyn WriteGate,
) -> ConfResult<()> {
    modify_top(base, modt, schema, op, gate)?;
    // remove subtrees created purely for addressing (all-none)
    base.prune_flagged_sub(FLAG_NONE);
    let root = base.root();
    base.flag_reset_all(root, FLAG_NONE);
    // sweep empty non-presence containers, cascading to emptied ancestors
    mark_empty_nonpresence(base, schema);
    base.prune_flagged(FLAG_MARK, true, schema);
    Ok(())
}

#[cfg(test)]
mod tests;
