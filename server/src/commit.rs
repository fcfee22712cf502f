/*
 * Created on Thu Jul 09 2026
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

//! # The commit pipeline
//!
//! Committing replaces `running` with the content of `candidate` under a
//! transactional envelope provided by the extensions: the candidate is
//! validated, the candidate−running diff is computed as added/deleted
//! subtree sets, and the extensions run `begin` and `apply` in registration
//! order. Any failure aborts every successfully-begun extension in reverse
//! order and surfaces the error; only after `complete` does the engine copy
//! candidate over running.

use crate::extensions::{DiffEntry, ExtensionRegistry, TransactionData};
use crate::schema::{SchemaTree, YangKind};
use crate::util::error::{ConfResult, Error};
use crate::xmltree::{xmlfmt, NodeId, Tree};

fn entry_for(tree: &Tree, id: NodeId, schema: &SchemaTree) -> DiffEntry {
    DiffEntry {
        path: tree.node_path(id, schema),
        xml: xmlfmt::to_xml(tree, id, false),
    }
}

fn is_leafy(tree: &Tree, id: NodeId, schema: &SchemaTree) -> bool {
    match tree.node(id).schema() {
        Some(sid) => schema.node(sid).kind.is_leafy(),
        None => tree.elem_child_count(id) == 0 && tree.find_body(id).is_some(),
    }
}

fn counterpart(
    haystack: &Tree,
    parent: NodeId,
    needle_tree: &Tree,
    needle: NodeId,
    schema: &SchemaTree,
) -> Option<NodeId> {
    match needle_tree.node(needle).schema() {
        Some(sid) => haystack.match_by_keys(parent, needle_tree, needle, sid, schema),
        None => haystack.find_elem_child(parent, needle_tree.node(needle).name()),
    }
}

#[allow(clippy::too_many_arguments)]
fn diff_children(
    running: &Tree,
    rid: NodeId,
    candidate: &Tree,
    cid: NodeId,
    schema: &SchemaTree,
    added: &mut Vec<DiffEntry>,
    deleted: &mut Vec<DiffEntry>,
) {
    for rc in running.elem_children(rid) {
        if counterpart(candidate, cid, running, rc, schema).is_none() {
            deleted.push(entry_for(running, rc, schema));
        }
    }
    for cc in candidate.elem_children(cid) {
        match counterpart(running, rid, candidate, cc, schema) {
            None => added.push(entry_for(candidate, cc, schema)),
            Some(rc) => {
                if is_leafy(candidate, cc, schema) {
                    // a changed leaf shows up as delete + add
                    if running.find_body(rc) != candidate.find_body(cc) {
                        deleted.push(entry_for(running, rc, schema));
                        added.push(entry_for(candidate, cc, schema));
                    }
                } else {
                    diff_children(running, rc, candidate, cc, schema, added, deleted);
                }
            }
        }
    }
}

/// Compute candidate−running as {added, deleted} subtree sets
pub fn compute_diff(
    running: &Tree,
    candidate: &Tree,
    schema: &SchemaTree,
) -> (Vec<DiffEntry>, Vec<DiffEntry>) {
    let mut added = Vec::new();
    let mut deleted = Vec::new();
    diff_children(
        running,
        running.root(),
        candidate,
        candidate.root(),
        schema,
        &mut added,
        &mut deleted,
    );
    (added, deleted)
}

/// Drive the extension transaction: `begin` in registration order, `apply`
/// in registration order, `abort` in reverse for everything begun when a
/// phase fails, `complete` in registration order on success
pub fn run_transaction(registry: &ExtensionRegistry, td: &TransactionData) -> ConfResult<()> {
    let mut begun: Vec<&Box<dyn crate::extensions::Extension>> = Vec::new();
    for p in registry.iter() {
        if let Err(e) = p.begin(td) {
            for q in begun.iter().rev() {
                q.abort(td);
            }
            return Err(Error::operation_failed(format!(
                "extension '{}' begin failed: {}",
                p.name(),
                e.reason()
            )));
        }
        begun.push(p);
    }
    for p in &begun {
        if let Err(e) = p.apply(td) {
            for q in begun.iter().rev() {
                q.abort(td);
            }
            return Err(Error::operation_failed(format!(
                "extension '{}' apply failed: {}",
                p.name(),
                e.reason()
            )));
        }
    }
    for p in &begun {
        if let Err(e) = p.complete(td) {
            return Err(Error::operation_failed(format!(
                "extension '{}' complete failed: {}",
                p.name(),
                e.reason()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::Extension;
    use crate::schema::def;
    use crate::util::error::ErrorKind;
    use std::sync::{Arc, Mutex};

    fn schema() -> SchemaTree {
        def::from_yaml(
            "\
module: example
nodes:
  - name: x
    kind: container
    children:
      - name: y
        kind: list
        keys: [a]
        children:
          - { name: a, kind: leaf }
          - { name: v, kind: leaf }
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
    fn test_diff_added_and_deleted() {
        let st = schema();
        let running = tree("<config><x><y><a>1</a><v>one</v></y></x></config>");
        let candidate = tree("<config><x><y><a>2</a><v>two</v></y></x></config>");
        let (added, deleted) = compute_diff(&running, &candidate, &st);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].path, "/x/y[a=2]");
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].path, "/x/y[a=1]");
    }

    #[test]
    fn test_diff_changed_leaf() {
        let st = schema();
        let running = tree("<config><x><y><a>1</a><v>old</v></y></x></config>");
        let candidate = tree("<config><x><y><a>1</a><v>new</v></y></x></config>");
        let (added, deleted) = compute_diff(&running, &candidate, &st);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].path, "/x/y[a=1]/v");
        assert_eq!(added[0].xml, "<v>new</v>");
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].xml, "<v>old</v>");
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let st = schema();
        let running = tree("<config><x><y><a>1</a><v>one</v></y></x></config>");
        let (added, deleted) = compute_diff(&running, &running.clone(), &st);
        assert!(added.is_empty());
        assert!(deleted.is_empty());
    }

    struct Journal {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
        fail_apply: bool,
    }
    impl Journal {
        fn push(&self, what: &str) {
            self.log.lock().unwrap().push(format!("{}:{}", self.name, what));
        }
    }
    impl Extension for Journal {
        fn name(&self) -> &str {
            &self.name
        }
        fn begin(&self, _td: &TransactionData) -> ConfResult<()> {
            self.push("begin");
            Ok(())
        }
        fn apply(&self, _td: &TransactionData) -> ConfResult<()> {
            self.push("apply");
            if self.fail_apply {
                return Err(Error::operation_failed("refusing bad config"));
            }
            Ok(())
        }
        fn abort(&self, _td: &TransactionData) {
            self.push("abort");
        }
        fn complete(&self, _td: &TransactionData) -> ConfResult<()> {
            self.push("complete");
            Ok(())
        }
    }

    fn registry(log: &Arc<Mutex<Vec<String>>>, fail_second_apply: bool) -> ExtensionRegistry {
        let mut reg = ExtensionRegistry::new();
        reg.register(Box::new(Journal {
            name: "one".to_owned(),
            log: log.clone(),
            fail_apply: false,
        }));
        reg.register(Box::new(Journal {
            name: "two".to_owned(),
            log: log.clone(),
            fail_apply: fail_second_apply,
        }));
        reg
    }

    #[test]
    fn test_transaction_success_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let reg = registry(&log, false);
        run_transaction(&reg, &TransactionData::default()).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            [
                "one:begin",
                "two:begin",
                "one:apply",
                "two:apply",
                "one:complete",
                "two:complete"
            ]
        );
    }

    #[test]
    fn test_transaction_abort_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let reg = registry(&log, true);
        let err = run_transaction(&reg, &TransactionData::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
        assert!(err.reason().contains("refusing bad config"));
        assert_eq!(
            *log.lock().unwrap(),
            [
                "one:begin",
                "two:begin",
                "one:apply",
                "two:apply",
                "two:abort",
                "one:abort"
            ]
        );
    }
}
