/*
 * Created on Wed Jul 15 2026
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

//! End-to-end scenarios against an in-process engine

use crate::config::ConfigurationSet;
use crate::engine::Engine;
use crate::extensions::{Extension, ExtensionRegistry, TransactionData};
use crate::merge::ModifyOp;
use crate::schema::{def, SchemaTree};
use crate::streams::{SessionMsg, DEFAULT_STREAM};
use crate::util::error::{ConfResult, Error, ErrorKind};
use crate::xmltree::{xmlfmt, Tree};
use crate::xpath;
use chrono::{Duration, Utc};
use std::fs;
use std::path::PathBuf;

fn scenario_schema() -> SchemaTree {
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
  - name: y
    kind: container
    children:
      - { name: bad, kind: leaf }
",
    )
    .unwrap()
}

fn tmpdir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("skyconf-e2e-{}-{}", tag, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn mk_engine(tag: &str, extensions: ExtensionRegistry) -> (Engine, PathBuf) {
    let dir = tmpdir(tag);
    let opts = ConfigurationSet {
        data_dir: dir.join("data").to_string_lossy().into_owned(),
        archive_dir: dir.join("archive").to_string_lossy().into_owned(),
        ..Default::default()
    };
    let engine = Engine::new(scenario_schema(), opts, extensions).unwrap();
    (engine, dir)
}

fn parse_view(view: &str) -> Tree {
    xmlfmt::parse(view).unwrap()
}

fn body_at(view: &str, path: &str) -> Option<String> {
    let tree = parse_view(view);
    xpath::first(&tree, tree.root(), path)
        .unwrap()
        .and_then(|id| tree.find_body(id).map(str::to_owned))
}

#[test]
fn test_e1_create_delete_roundtrip() {
    let (engine, dir) = mk_engine("e1", ExtensionRegistry::new());
    let (s1, _rx) = engine.attach_session("default");
    engine
        .edit_xml(
            s1,
            "candidate",
            ModifyOp::Create,
            "<config><x><y><a>1</a><b>2</b><v>hello</v></y></x></config>",
        )
        .unwrap();
    let view = engine.get("candidate", "/x/y[a=1][b=2]/v").unwrap();
    assert_eq!(body_at(&view, "/x/y/v"), Some("hello".to_owned()));
    engine
        .edit_path(s1, "candidate", ModifyOp::Delete, "/x/y[a=1][b=2]/v", None)
        .unwrap();
    let view = engine.get("candidate", "/x/y[a=1][b=2]/v").unwrap();
    assert_eq!(body_at(&view, "/x/y/v"), None);
    let err = engine
        .edit_path(s1, "candidate", ModifyOp::Delete, "/x/y[a=1][b=2]/v", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataMissing);
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_e2_merge_vs_replace() {
    let (engine, dir) = mk_engine("e2", ExtensionRegistry::new());
    let (s1, _rx) = engine.attach_session("default");
    let initial = "<config><x><z><a>1</a><v>old</v></z></x></config>";
    engine
        .edit_xml(s1, "candidate", ModifyOp::Merge, initial)
        .unwrap();
    engine
        .edit_xml(
            s1,
            "candidate",
            ModifyOp::Merge,
            "<config><x><z><a>1</a><w>new</w></z></x></config>",
        )
        .unwrap();
    let view = engine.get("candidate", "/").unwrap();
    assert_eq!(body_at(&view, "/x/z[a=1]/v"), Some("old".to_owned()));
    assert_eq!(body_at(&view, "/x/z[a=1]/w"), Some("new".to_owned()));
    // reset, then replace the same entry: only the new leaf survives
    engine
        .edit_xml(s1, "candidate", ModifyOp::Replace, initial)
        .unwrap();
    engine
        .edit_xml(
            s1,
            "candidate",
            ModifyOp::Merge,
            r#"<config><x><z operation="replace"><a>1</a><w>new</w></z></x></config>"#,
        )
        .unwrap();
    let view = engine.get("candidate", "/").unwrap();
    assert_eq!(body_at(&view, "/x/z[a=1]/v"), None);
    assert_eq!(body_at(&view, "/x/z[a=1]/w"), Some("new".to_owned()));
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_e3_lock_conflict() {
    let (engine, dir) = mk_engine("e3", ExtensionRegistry::new());
    let (s1, _rx1) = engine.attach_session("default");
    let (s2, _rx2) = engine.attach_session("default");
    engine.lock(s1, "candidate").unwrap();
    let payload = "<config><x><z><a>1</a><v>q</v></z></x></config>";
    let err = engine
        .edit_xml(s2, "candidate", ModifyOp::Merge, payload)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InUse);
    assert!(err.reason().contains(&s1.to_string()));
    engine.unlock(s1, "candidate").unwrap();
    engine
        .edit_xml(s2, "candidate", ModifyOp::Merge, payload)
        .unwrap();
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_kill_releases_peer_locks() {
    let (engine, dir) = mk_engine("kill", ExtensionRegistry::new());
    let (s1, mut rx1) = engine.attach_session("default");
    let (s2, _rx2) = engine.attach_session("default");
    engine.lock(s1, "candidate").unwrap();
    engine.kill_session(s1).unwrap();
    assert_eq!(rx1.try_recv().unwrap(), SessionMsg::Kill);
    engine
        .edit_xml(
            s2,
            "candidate",
            ModifyOp::Merge,
            "<config><x><z><a>1</a><v>q</v></z></x></config>",
        )
        .unwrap();
    fs::remove_dir_all(&dir).unwrap();
}

struct RejectBad;

impl Extension for RejectBad {
    fn name(&self) -> &str {
        "reject-bad"
    }
    fn apply(&self, td: &TransactionData) -> ConfResult<()> {
        let offending = td.added.iter().any(|e| e.xml.contains("<bad>1</bad>"));
        if offending {
            return Err(Error::operation_failed("bad leaf present"));
        }
        Ok(())
    }
}

#[test]
fn test_e4_commit_rollback() {
    let mut registry = ExtensionRegistry::new();
    registry.register(Box::new(RejectBad));
    let (engine, dir) = mk_engine("e4", registry);
    let (s1, _rx) = engine.attach_session("default");
    // put something valid into running first
    engine
        .edit_xml(
            s1,
            "candidate",
            ModifyOp::Merge,
            "<config><x><z><a>1</a><v>ok</v></z></x></config>",
        )
        .unwrap();
    engine.commit(s1).unwrap();
    let running_path = {
        let state = engine.shared.state.read();
        state.datastores.get("running").unwrap().file_path().to_owned()
    };
    let before = fs::read(&running_path).unwrap();
    // now stage the offending leaf and watch the transaction fail
    engine
        .edit_xml(
            s1,
            "candidate",
            ModifyOp::Merge,
            "<config><y><bad>1</bad></y></config>",
        )
        .unwrap();
    let err = engine.commit(s1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OperationFailed);
    assert!(err.reason().contains("bad leaf present"));
    // running is byte-identical to its pre-commit serialization
    let after = fs::read(&running_path).unwrap();
    assert_eq!(before, after);
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_commit_applies_and_notifies() {
    let (engine, dir) = mk_engine("commit", ExtensionRegistry::new());
    let (s1, mut rx) = engine.attach_session("default");
    engine
        .subscribe(s1, true, DEFAULT_STREAM, None, None, None)
        .unwrap();
    engine
        .edit_xml(
            s1,
            "candidate",
            ModifyOp::Merge,
            "<config><x><z><a>1</a><v>q</v></z></x></config>",
        )
        .unwrap();
    engine.commit(s1).unwrap();
    let view = engine.get("running", "/").unwrap();
    assert_eq!(body_at(&view, "/x/z[a=1]/v"), Some("q".to_owned()));
    match rx.try_recv().unwrap() {
        SessionMsg::Event(envelope) => {
            assert!(envelope.contains("<netconf-config-change>"));
            assert!(envelope.contains("<eventTime>"));
        }
        other => panic!("unexpected {:?}", other),
    }
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_e5_notification_replay() {
    let (engine, dir) = mk_engine("e5", ExtensionRegistry::new());
    engine.notify(DEFAULT_STREAM, "<event><n>a</n></event>");
    engine.notify(DEFAULT_STREAM, "<event><n>b</n></event>");
    let (s1, mut rx) = engine.attach_session("default");
    let now = Utc::now();
    let wants_replay = engine
        .subscribe(
            s1,
            true,
            DEFAULT_STREAM,
            None,
            Some(now - Duration::seconds(60)),
            Some(now + Duration::seconds(2)),
        )
        .unwrap();
    assert!(wants_replay);
    engine.run_replay(DEFAULT_STREAM, s1);
    let first = match rx.try_recv().unwrap() {
        SessionMsg::Event(e) => e,
        other => panic!("unexpected {:?}", other),
    };
    assert!(first.contains("<n>a</n>"));
    let second = match rx.try_recv().unwrap() {
        SessionMsg::Event(e) => e,
        other => panic!("unexpected {:?}", other),
    };
    assert!(second.contains("<n>b</n>"));
    // past the stop-time the sweep delivers the terminal indicator
    engine.shared.state.write().streams.timer_sweep(now + Duration::seconds(3));
    assert_eq!(
        rx.try_recv().unwrap(),
        SessionMsg::SubscriptionDone {
            stream: DEFAULT_STREAM.to_owned()
        }
    );
    assert!(rx.try_recv().is_err());
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_e6_non_presence_prune() {
    let (engine, dir) = mk_engine("e6", ExtensionRegistry::new());
    let (s1, _rx) = engine.attach_session("default");
    engine
        .edit_xml(
            s1,
            "candidate",
            ModifyOp::None,
            "<config><a><b><c><d>1</d></c></b></a></config>",
        )
        .unwrap();
    let view = engine.get("candidate", "/").unwrap();
    assert_eq!(body_at(&view, "/a/b/c/d"), Some("1".to_owned()));
    engine
        .edit_path(s1, "candidate", ModifyOp::Delete, "/a/b/c/d", None)
        .unwrap();
    assert_eq!(engine.get("candidate", "/").unwrap(), "<config/>");
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_snapshot_save_request() {
    let (engine, dir) = mk_engine("snap", ExtensionRegistry::new());
    let (s1, _rx) = engine.attach_session("default");
    engine
        .edit_xml(
            s1,
            "candidate",
            ModifyOp::Merge,
            "<config><x><z><a>1</a><v>q</v></z></x></config>",
        )
        .unwrap();
    engine.save("candidate", true, "").unwrap();
    engine.save("candidate", true, "").unwrap();
    let archive = PathBuf::from(&engine.shared.opts.archive_dir);
    assert!(archive.join("0").exists());
    assert!(archive.join("1").exists());
    let newest = fs::read_to_string(archive.join("0")).unwrap();
    assert!(newest.contains("<v>q</v>"));
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_call_builtin_streams() {
    let (engine, dir) = mk_engine("call", ExtensionRegistry::new());
    let reply = engine.call("streams", b"").unwrap();
    let xml = String::from_utf8(reply).unwrap();
    assert!(xml.contains("<name>NETCONF</name>"));
    let err = engine.call("nope", b"").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OperationFailed);
    fs::remove_dir_all(&dir).unwrap();
}

async fn read_response(stream: &mut tokio::net::TcpStream) -> crate::protocol::Response {
    use tokio::io::AsyncReadExt;
    let mut len = [0u8; 4];
    stream.read_exact(&mut len).await.unwrap();
    let mut frame = vec![0u8; u32::from_be_bytes(len) as usize];
    stream.read_exact(&mut frame).await.unwrap();
    crate::protocol::decode_response(&frame).unwrap()
}

#[tokio::test]
async fn test_wire_roundtrip() {
    use crate::protocol::{self, Request, Response};
    use tokio::io::AsyncWriteExt;
    let (engine, dir) = mk_engine("wire", ExtensionRegistry::new());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(crate::dbnet::run_with_listener(
        engine.clone(),
        listener,
        async move {
            let _ = stop_rx.await;
        },
    ));
    let mut con = tokio::net::TcpStream::connect(addr).await.unwrap();
    // edit over the wire
    con.write_all(&protocol::encode_request(&Request::XmlPut {
        db: "candidate".to_owned(),
        op: ModifyOp::Merge,
        xml: "<config><x><z><a>1</a><v>hello</v></z></x></config>".to_owned(),
    }))
    .await
    .unwrap();
    assert_eq!(read_response(&mut con).await, Response::Ok);
    // read it back
    con.write_all(&protocol::encode_request(&Request::Get {
        db: "candidate".to_owned(),
        xpath: "/x/z[a=1]/v".to_owned(),
    }))
    .await
    .unwrap();
    match read_response(&mut con).await {
        Response::Reply(bytes) => {
            assert!(String::from_utf8(bytes).unwrap().contains("<v>hello</v>"))
        }
        other => panic!("unexpected {:?}", other),
    }
    // a lock held by this session makes a second session's edit fail in-use
    con.write_all(&protocol::encode_request(&Request::Lock {
        db: "candidate".to_owned(),
    }))
    .await
    .unwrap();
    assert_eq!(read_response(&mut con).await, Response::Ok);
    let mut con2 = tokio::net::TcpStream::connect(addr).await.unwrap();
    con2.write_all(&protocol::encode_request(&Request::Change {
        db: "candidate".to_owned(),
        op: ModifyOp::Merge,
        xkey: "/x/z[a=1]/v".to_owned(),
        value: Some("bye".to_owned()),
    }))
    .await
    .unwrap();
    match read_response(&mut con2).await {
        Response::Err { kind, reason, .. } => {
            assert_eq!(kind, ErrorKind::InUse.code());
            assert!(reason.contains("locked by"));
        }
        other => panic!("unexpected {:?}", other),
    }
    drop(con);
    drop(con2);
    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_validate_request_roundtrip() {
    let (engine, dir) = mk_engine("validate", ExtensionRegistry::new());
    let (s1, _rx) = engine.attach_session("default");
    engine
        .edit_xml(
            s1,
            "candidate",
            ModifyOp::Merge,
            "<config><x><z><a>1</a><v>q</v></z></x></config>",
        )
        .unwrap();
    engine.validate_candidate().unwrap();
    fs::remove_dir_all(&dir).unwrap();
}
