/*
 * Created on Fri Jun 19 2026
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

//! The subtree XPath dialect
//!
//! The engine only needs the path subset used by NETCONF subtree selection:
//! `/step/step[key=value]...` with optional `[k='v']` predicates on any step,
//! a `*` name wildcard, and a trailing `=value` comparison for boolean
//! expressions (`when`/`must` conditions and notification filters). Anything
//! richer belongs to a front-end.

use crate::util::error::{ConfResult, Error};
use crate::xmltree::{NodeId, Tree};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub preds: Vec<(String, String)>,
}

fn strip_quotes(raw: &str) -> &str {
    let raw = raw.trim();
    if raw.len() >= 2
        && ((raw.starts_with('\'') && raw.ends_with('\''))
            || (raw.starts_with('"') && raw.ends_with('"')))
    {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

fn parse_step(raw: &str) -> ConfResult<Step> {
    let mut preds = Vec::new();
    let (name, rest) = match raw.find('[') {
        Some(idx) => (&raw[..idx], &raw[idx..]),
        None => (raw, ""),
    };
    if name.is_empty() {
        return Err(Error::malformed(format!("empty step in path near `{raw}`")));
    }
    let mut rest = rest;
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return Err(Error::malformed(format!("bad predicate near `{rest}`")));
        }
        let end = rest
            .find(']')
            .ok_or_else(|| Error::malformed("unterminated predicate"))?;
        let inner = &rest[1..end];
        let (k, v) = inner
            .split_once('=')
            .ok_or_else(|| Error::malformed(format!("bad predicate `{inner}`")))?;
        preds.push((k.trim().to_owned(), strip_quotes(v).to_owned()));
        rest = &rest[end + 1..];
    }
    Ok(Step {
        name: name.to_owned(),
        preds,
    })
}

/// Parse a path into its steps. `/` and the empty string parse to no steps.
pub fn parse(path: &str) -> ConfResult<Vec<Step>> {
    let path = path.trim();
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return Ok(Vec::new());
    }
    path.split('/').map(parse_step).collect()
}

fn step_matches(tree: &Tree, id: NodeId, step: &Step) -> bool {
    if step.name != "*" && tree.node(id).name() != step.name {
        return false;
    }
    step.preds.iter().all(|(k, v)| {
        tree.find_elem_child(id, k)
            .and_then(|c| tree.find_body(c))
            .map(|body| body == v)
            .unwrap_or(false)
    })
}

/// Evaluate a path from `from`, returning every matching node. The path is
/// interpreted relative to `from`'s children whether or not it has a leading
/// slash; pass the tree root for absolute paths.
pub fn eval(tree: &Tree, from: NodeId, path: &str) -> ConfResult<Vec<NodeId>> {
    let steps = parse(path)?;
    let mut current = vec![from];
    for step in &steps {
        let mut next = Vec::new();
        for &id in &current {
            for c in tree.elem_children(id) {
                if step_matches(tree, c, step) {
                    next.push(c);
                }
            }
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }
    if steps.is_empty() {
        // "/" selects the root itself
        return Ok(vec![from]);
    }
    Ok(current)
}

/// The first match of a path, if any
pub fn first(tree: &Tree, from: NodeId, path: &str) -> ConfResult<Option<NodeId>> {
    Ok(eval(tree, from, path)?.into_iter().next())
}

/// Evaluate a boolean expression: a path, optionally with a trailing
/// `=value` comparison against the matched node's body
pub fn eval_expr(tree: &Tree, from: NodeId, expr: &str) -> ConfResult<bool> {
    // split on the last '=' that is outside any predicate brackets
    let mut depth = 0usize;
    let mut split_at = None;
    for (i, ch) in expr.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => split_at = Some(i),
            _ => {}
        }
    }
    match split_at {
        Some(i) => {
            let path = &expr[..i];
            let expected = strip_quotes(&expr[i + 1..]);
            for id in eval(tree, from, path)? {
                if tree.find_body(id) == Some(expected) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        None => Ok(!eval(tree, from, expr)?.is_empty()),
    }
}

/// All body values selected by a path; used for leafref target sets
pub fn bodies(tree: &Tree, from: NodeId, path: &str) -> ConfResult<Vec<String>> {
    Ok(eval(tree, from, path)?
        .into_iter()
        .filter_map(|id| tree.find_body(id).map(str::to_owned))
        .collect())
}

/// Copy the subtrees selected by `path` (with their ancestors) into a fresh
/// tree with the same root name. `/` copies the whole tree.
pub fn filter_copy(tree: &Tree, path: &str) -> ConfResult<Tree> {
    let matches = eval(tree, tree.root(), path)?;
    if matches.contains(&tree.root()) {
        return Ok(tree.extract(tree.root()));
    }
    // include: every match with its whole subtree, plus the ancestor chain
    let mut include: HashSet<NodeId> = HashSet::new();
    let mut full: HashSet<NodeId> = HashSet::new();
    for m in &matches {
        full.insert(*m);
        let mut cur = Some(*m);
        while let Some(c) = cur {
            include.insert(c);
            cur = tree.node(c).parent();
        }
    }
    let mut out = Tree::new(tree.node(tree.root()).name());
    let out_root = out.root();
    copy_filtered(tree, tree.root(), &mut out, out_root, &include, &full);
    Ok(out)
}

fn copy_filtered(
    src: &Tree,
    src_id: NodeId,
    dst: &mut Tree,
    dst_id: NodeId,
    include: &HashSet<NodeId>,
    full: &HashSet<NodeId>,
) {
    for &c in src.children(src_id) {
        let n = src.node(c);
        if n.kind() != crate::xmltree::NodeKind::Element {
            continue;
        }
        if full.contains(&c) {
            dst.copy_into(dst_id, src, c);
        } else if include.contains(&c) {
            let copied = dst.new_element(dst_id, &n.name().to_owned(), n.schema());
            copy_filtered(src, c, dst, copied, include, full);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmltree::xmlfmt;

    fn demo() -> Tree {
        xmlfmt::parse(
            "<config><x><y><a>1</a><b>2</b><v>hello</v></y><y><a>3</a><b>4</b><v>there</v></y></x></config>",
        )
        .unwrap()
    }

    #[test]
    fn test_parse_steps() {
        let steps = parse("/x/y[a=1][b='2']/v").unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1].name, "y");
        assert_eq!(
            steps[1].preds,
            vec![("a".to_owned(), "1".to_owned()), ("b".to_owned(), "2".to_owned())]
        );
        assert!(parse("/x//y").is_err());
        assert!(parse("/x/y[a").is_err());
    }

    #[test]
    fn test_eval_with_predicates() {
        let t = demo();
        let hits = eval(&t, t.root(), "/x/y[a=1][b=2]/v").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(t.find_body(hits[0]), Some("hello"));
        assert!(eval(&t, t.root(), "/x/y[a=9]").unwrap().is_empty());
        // wildcard
        assert_eq!(eval(&t, t.root(), "/x/*").unwrap().len(), 2);
    }

    #[test]
    fn test_eval_expr() {
        let t = demo();
        assert!(eval_expr(&t, t.root(), "/x/y[a=1]/v='hello'").unwrap());
        assert!(!eval_expr(&t, t.root(), "/x/y[a=1]/v='bye'").unwrap());
        assert!(eval_expr(&t, t.root(), "/x/y").unwrap());
        assert!(!eval_expr(&t, t.root(), "/nope").unwrap());
    }

    #[test]
    fn test_filter_copy() {
        let t = demo();
        let filtered = filter_copy(&t, "/x/y[a=1]").unwrap();
        let rendered = xmlfmt::to_xml(&filtered, filtered.root(), false);
        assert_eq!(
            rendered,
            "<config><x><y><a>1</a><b>2</b><v>hello</v></y></x></config>"
        );
        // "/" gives the whole tree back
        let all = filter_copy(&t, "/").unwrap();
        assert_eq!(
            xmlfmt::to_xml(&all, all.root(), false),
            xmlfmt::to_xml(&t, t.root(), false)
        );
    }
}
