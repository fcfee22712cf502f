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

use super::*;
use crate::acl::{InternalGate, PermitAll};
use crate::schema::def;
use crate::util::error::ErrorKind;
use crate::xmltree::xmlfmt;

fn schema() -> SchemaTree {
    def::from_yaml(
        "\
module: example
namespace: urn:example:config
nodes:
  - name: x
    kind: container
    children:
      - name: y
        kind: list
        keys: [a, b]
        children:
          - { name: a, kind: leaf }
          - { name: b, kind: leaf }
          - { name: v, kind: leaf }
          - { name: w, kind: leaf }
      - name: z
        kind: list
        keys: [a]
        children:
          - { name: a, kind: leaf }
          - { name: v, kind: leaf }
          - { name: w, kind: leaf }
  - name: a
    kind: container
    children:
      - name: b
        kind: container
        children:
          - name: c
            kind: container
            children:
              - { name: d, kind: leaf }
  - name: p
    kind: container
    presence: true
  - name: blob
    kind: anyxml
  - name: sel
    kind: container
    children:
      - name: kind
        kind: choice
        children:
          - name: one
            kind: case
            children:
              - { name: la, kind: leaf }
          - name: two
            kind: case
            children:
              - { name: lb, kind: leaf }
  - name: acl
    kind: container
    children:
      - { name: enabled, kind: leaf }
      - { name: write-default, kind: leaf }
      - name: rule
        kind: list
        keys: [user]
        children:
          - { name: user, kind: leaf }
          - { name: access, kind: leaf }
          - { name: path, kind: leaf }
",
    )
    .unwrap()
}

fn edit(base: &mut Tree, payload: &str, op: ModifyOp) -> ConfResult<()> {
    let st = schema();
    let modt = xmlfmt::parse(payload).unwrap();
    apply_edit(base, &modt, &st, op, &PermitAll)
}

fn empty_base() -> Tree {
    Tree::new("config")
}

fn render(base: &Tree) -> String {
    xmlfmt::to_xml(base, base.root(), false)
}

#[test]
fn test_create_then_create_again_fails() {
    let mut base = empty_base();
    let payload = "<config><x><y><a>1</a><b>2</b><v>hello</v></y></x></config>";
    edit(&mut base, payload, ModifyOp::Create).unwrap();
    assert_eq!(render(&base), payload);
    let err = edit(&mut base, payload, ModifyOp::Create).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataExists);
}

#[test]
fn test_merge_keeps_siblings() {
    let mut base = empty_base();
    edit(
        &mut base,
        "<config><x><z><a>1</a><v>old</v></z></x></config>",
        ModifyOp::Merge,
    )
    .unwrap();
    edit(
        &mut base,
        "<config><x><z><a>1</a><w>new</w></z></x></config>",
        ModifyOp::Merge,
    )
    .unwrap();
    assert_eq!(
        render(&base),
        "<config><x><z><a>1</a><v>old</v><w>new</w></z></x></config>"
    );
}

#[test]
fn test_embedded_replace_overrides_merge() {
    let mut base = empty_base();
    edit(
        &mut base,
        "<config><x><z><a>1</a><v>old</v></z></x></config>",
        ModifyOp::Merge,
    )
    .unwrap();
    // same list entry, replace semantics on the entry itself
    edit(
        &mut base,
        r#"<config><x><z operation="replace"><a>1</a><w>new</w></z></x></config>"#,
        ModifyOp::Merge,
    )
    .unwrap();
    assert_eq!(
        render(&base),
        "<config><x><z><a>1</a><w>new</w></z></x></config>"
    );
}

#[test]
fn test_merge_overwrites_differing_leaf() {
    let mut base = empty_base();
    edit(
        &mut base,
        "<config><x><z><a>1</a><v>old</v></z></x></config>",
        ModifyOp::Merge,
    )
    .unwrap();
    edit(
        &mut base,
        "<config><x><z><a>1</a><v>new</v></z></x></config>",
        ModifyOp::Merge,
    )
    .unwrap();
    assert_eq!(
        render(&base),
        "<config><x><z><a>1</a><v>new</v></z></x></config>"
    );
}

#[test]
fn test_delete_missing_fails_remove_does_not() {
    let mut base = empty_base();
    let err = edit(
        &mut base,
        "<config><x><z><a>1</a></z></x></config>",
        ModifyOp::Delete,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataMissing);
    // remove of the same missing subtree is a silent no-op
    edit(
        &mut base,
        "<config><x><z><a>1</a></z></x></config>",
        ModifyOp::Remove,
    )
    .unwrap();
}

#[test]
fn test_delete_existing_entry() {
    let mut base = empty_base();
    edit(
        &mut base,
        "<config><x><y><a>1</a><b>2</b><v>hello</v></y></x></config>",
        ModifyOp::Create,
    )
    .unwrap();
    edit(
        &mut base,
        r#"<config><x><y operation="delete"><a>1</a><b>2</b></y></x></config>"#,
        ModifyOp::None,
    )
    .unwrap();
    // x became an empty non-presence container and was pruned too
    assert_eq!(render(&base), "<config/>");
}

#[test]
fn test_none_addresses_without_materializing() {
    let mut base = empty_base();
    // op none with an inner leaf value: the whole path materializes because
    // the leaf carries data
    edit(
        &mut base,
        "<config><a><b><c><d>1</d></c></b></a></config>",
        ModifyOp::None,
    )
    .unwrap();
    assert_eq!(render(&base), "<config><a><b><c><d>1</d></c></b></a></config>");
    // deleting the leaf prunes the whole non-presence chain
    edit(
        &mut base,
        r#"<config><a><b><c><d operation="delete"/></c></b></a></config>"#,
        ModifyOp::None,
    )
    .unwrap();
    assert_eq!(render(&base), "<config/>");
}

#[test]
fn test_none_without_payload_leaves_base_untouched() {
    let mut base = empty_base();
    // pure addressing: every created node is tentative and pruned again
    edit(&mut base, "<config><a><b><c/></b></a></config>", ModifyOp::None).unwrap();
    assert_eq!(render(&base), "<config/>");
}

#[test]
fn test_presence_container_survives_empty() {
    let mut base = empty_base();
    edit(&mut base, "<config><p/></config>", ModifyOp::Merge).unwrap();
    assert_eq!(render(&base), "<config><p/></config>");
}

#[test]
fn test_top_level_replace_wipes() {
    let mut base = empty_base();
    edit(
        &mut base,
        "<config><x><z><a>1</a><v>old</v></z></x></config>",
        ModifyOp::Merge,
    )
    .unwrap();
    edit(
        &mut base,
        "<config><a><b><c><d>9</d></c></b></a></config>",
        ModifyOp::Replace,
    )
    .unwrap();
    assert_eq!(render(&base), "<config><a><b><c><d>9</d></c></b></a></config>");
}

#[test]
fn test_empty_mod_tree_with_remove_wipes() {
    let mut base = empty_base();
    edit(
        &mut base,
        "<config><x><z><a>1</a><v>old</v></z></x></config>",
        ModifyOp::Merge,
    )
    .unwrap();
    edit(&mut base, "<config/>", ModifyOp::Remove).unwrap();
    assert_eq!(render(&base), "<config/>");
    // with merge the empty tree is a no-op
    edit(
        &mut base,
        "<config><x><z><a>1</a><v>old</v></z></x></config>",
        ModifyOp::Merge,
    )
    .unwrap();
    edit(&mut base, "<config/>", ModifyOp::Merge).unwrap();
    assert_ne!(render(&base), "<config/>");
}

#[test]
fn test_unknown_element_is_rejected() {
    let mut base = empty_base();
    let err = edit(&mut base, "<config><nope>1</nope></config>", ModifyOp::Merge).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownElement);
}

#[test]
fn test_stale_schema_binding_is_replaced() {
    let st = schema();
    let mut base = empty_base();
    edit(
        &mut base,
        "<config><sel><la>1</la></sel></config>",
        ModifyOp::Merge,
    )
    .unwrap();
    // simulate a case switch: rebind the existing node to a different schema
    // node, the way an abandoned case leaves its members behind
    let sel = base.find_elem_child(base.root(), "sel").unwrap();
    let la = base.find_elem_child(sel, "la").unwrap();
    let stale = st.resolve_top("p");
    base.set_schema(la, stale);
    // merging la again finds a name match bound elsewhere: purge + recreate
    edit(
        &mut base,
        "<config><sel><la>2</la></sel></config>",
        ModifyOp::Merge,
    )
    .unwrap();
    let sel = base.find_elem_child(base.root(), "sel").unwrap();
    assert_eq!(base.elem_child_count(sel), 1);
    let la = base.find_elem_child(sel, "la").unwrap();
    assert_eq!(base.find_body(la), Some("2"));
    let x = st.resolve_top("sel").and_then(|s| st.find_child(s, "la"));
    assert_eq!(base.node(la).schema(), x);
}

#[test]
fn test_anyxml_is_replaced_wholesale() {
    let mut base = empty_base();
    edit(
        &mut base,
        "<config><blob><inner><deep>1</deep></inner></blob></config>",
        ModifyOp::Merge,
    )
    .unwrap();
    edit(
        &mut base,
        r#"<config><blob><other operation="delete">2</other></blob></config>"#,
        ModifyOp::Merge,
    )
    .unwrap();
    // embedded operation attributes inside an anyxml are inert data
    assert_eq!(
        render(&base),
        r#"<config><blob><other operation="delete">2</other></blob></config>"#
    );
}

#[test]
fn test_list_sorted_by_key_tuple() {
    let mut base = empty_base();
    for (a, b) in [("2", "1"), ("1", "2"), ("1", "1")] {
        edit(
            &mut base,
            &format!("<config><x><y><a>{a}</a><b>{b}</b><v>q</v></y></x></config>"),
            ModifyOp::Merge,
        )
        .unwrap();
    }
    assert_eq!(
        render(&base),
        "<config><x>\
         <y><a>1</a><b>1</b><v>q</v></y>\
         <y><a>1</a><b>2</b><v>q</v></y>\
         <y><a>2</a><b>1</b><v>q</v></y>\
         </x></config>"
    );
}

#[test]
fn test_key_tuples_stay_unique() {
    let mut base = empty_base();
    edit(
        &mut base,
        "<config><x><y><a>1</a><b>2</b><v>first</v></y></x></config>",
        ModifyOp::Merge,
    )
    .unwrap();
    // merging the same key tuple updates in place instead of duplicating
    edit(
        &mut base,
        "<config><x><y><a>1</a><b>2</b><v>second</v></y></x></config>",
        ModifyOp::Merge,
    )
    .unwrap();
    let x = base.find_elem_child(base.root(), "x").unwrap();
    assert_eq!(base.elem_child_count(x), 1);
}

#[test]
fn test_access_denied_stops_merge() {
    let st = schema();
    let mut base = xmlfmt::parse(
        "<config><acl><enabled>true</enabled><write-default>deny</write-default></acl></config>",
    )
    .unwrap();
    base.bind_schema(&st, true).unwrap();
    let modt = xmlfmt::parse("<config><x><z><a>1</a><v>q</v></z></x></config>").unwrap();
    let gate = InternalGate::from_tree(&base, "eve");
    let err = apply_edit(&mut base, &modt, &st, ModifyOp::Merge, &gate).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
}
