/*
 * Created on Sun Jul 12 2026
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

//! # The engine core
//!
//! One [`Engine`] handle is shared by every session task. All state sits
//! behind a single lock; every request handler takes the lock, runs its
//! operation to completion and releases it before touching the socket again,
//! which is what makes datastore mutations appear atomic to all observers on
//! the single-threaded runtime.

use crate::acl::{self, PermitAll, WriteGate};
use crate::commit;
use crate::config::{AccessMode, ConfigurationSet};
use crate::datastore::DatastoreSet;
use crate::extensions::{ExtensionRegistry, TransactionData};
use crate::merge::ModifyOp;
use crate::schema::SchemaTree;
use crate::streams::{SessionMsg, StreamSet, DEFAULT_STREAM};
use crate::util::error::{ConfResult, Error};
use crate::validate;
use crate::xmltree::{xmlfmt, Tree};
use crate::xpath;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// One connected client session
pub struct ClientEntry {
    pub id: u64,
    pub user: String,
    tx: UnboundedSender<SessionMsg>,
}

/// Everything the engine owns, guarded by the state lock
pub struct State {
    pub datastores: DatastoreSet,
    pub streams: StreamSet,
    pub clients: Vec<ClientEntry>,
}

pub struct Shared {
    pub schema: SchemaTree,
    pub opts: ConfigurationSet,
    pub extensions: ExtensionRegistry,
    pub state: RwLock<State>,
    session_ctr: AtomicU64,
}

#[derive(Clone)]
pub struct Engine {
    pub shared: Arc<Shared>,
}

/// Render the module-state snippet embedded into datastore writebacks
fn modstate_snippet(schema: &SchemaTree) -> Option<String> {
    let modules = schema.children(schema.root());
    if modules.is_empty() {
        return None;
    }
    let mut out = String::from("<modules-state>");
    for &m in modules {
        let module = schema.node(m);
        out.push_str("<module>");
        out.push_str(&format!("<name>{}</name>", module.name));
        if let Some(ns) = &module.namespace {
            out.push_str(&format!("<namespace>{}</namespace>", ns));
        }
        out.push_str("</module>");
    }
    out.push_str("</modules-state>");
    Some(out)
}

impl Engine {
    /// Bring up the engine: init extensions, open datastores, seed `running`
    /// from `startup` on first boot, and register the default stream
    pub fn new(
        schema: SchemaTree,
        opts: ConfigurationSet,
        extensions: ExtensionRegistry,
    ) -> ConfResult<Self> {
        extensions.init_all()?;
        let modstate = modstate_snippet(&schema);
        let mut datastores = DatastoreSet::new(&opts, modstate)?;
        // first boot: running is seeded from startup if only startup exists
        let running_missing = !datastores.get("running")?.file_path().exists();
        let startup_present = datastores.get("startup")?.file_path().exists();
        if running_missing && startup_present {
            log::info!("Seeding running datastore from startup");
            datastores.copy(&schema, "startup", "running")?;
        }
        fs::create_dir_all(&opts.archive_dir)?;
        let mut streams = StreamSet::new(&opts.stream_url_prefix, opts.publish_enabled);
        streams.register(
            DEFAULT_STREAM,
            "default NETCONF event stream",
            true,
            opts.stream_retention_seconds,
        );
        Ok(Self {
            shared: Arc::new(Shared {
                schema,
                opts,
                extensions,
                state: RwLock::new(State {
                    datastores,
                    streams,
                    clients: Vec::new(),
                }),
                session_ctr: AtomicU64::new(0),
            }),
        })
    }

    // session lifecycle

    /// Register a session and hand back its id and notification channel
    pub fn attach_session(&self, user: &str) -> (u64, UnboundedReceiver<SessionMsg>) {
        let id = self.shared.session_ctr.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.state.write().clients.push(ClientEntry {
            id,
            user: user.to_owned(),
            tx,
        });
        log::info!("Session {} ({}) attached", id, user);
        (id, rx)
    }
    /// Remove a session, releasing its locks and subscriptions
    pub fn detach_session(&self, session: u64) {
        let mut state = self.shared.state.write();
        let before = state.clients.len();
        state.clients.retain(|c| c.id != session);
        if state.clients.len() != before {
            log::info!("Session {} detached", session);
        }
        state.datastores.release_session(session);
        state.streams.remove_session(session);
    }
    /// Cancel a peer session by id and release everything it holds
    pub fn kill_session(&self, session: u64) -> ConfResult<()> {
        let mut state = self.shared.state.write();
        state.datastores.release_session(session);
        state.streams.remove_session(session);
        if let Some(client) = state.clients.iter().find(|c| c.id == session) {
            let _ = client.tx.send(SessionMsg::Kill);
        }
        Ok(())
    }
    fn session_user(&self, state: &State, session: u64) -> String {
        state
            .clients
            .iter()
            .find(|c| c.id == session)
            .map(|c| c.user.clone())
            .unwrap_or_else(|| "default".to_owned())
    }

    // datastore operations

    /// Another session's advisory lock blocks edits on the datastore
    fn check_lock(state: &State, db: &str, session: u64) -> ConfResult<()> {
        if let Some(owner) = state.datastores.get(db)?.islocked() {
            if owner != session {
                return Err(Error::in_use(format!("lock failed: locked by {}", owner)));
            }
        }
        Ok(())
    }
    fn gate_and_write(
        &self,
        state: &mut State,
        db: &str,
        op: ModifyOp,
        modt: &Tree,
        user: &str,
    ) -> ConfResult<()> {
        let mode = self.shared.opts.access_control_mode;
        let modstate = state.datastores.modstate().map(str::to_owned);
        let ds = state.datastores.get_mut(db)?;
        let gate: Box<dyn WriteGate + '_> = match mode {
            AccessMode::None => Box::new(PermitAll),
            _ => {
                let base = ds.current_clone(&self.shared.schema)?;
                acl::gate_for(mode, &base, user, &self.shared.extensions)
            }
        };
        ds.write(
            &self.shared.schema,
            op,
            modt,
            gate.as_ref(),
            modstate.as_deref(),
        )
    }

    /// XML-payload edit
    pub fn edit_xml(&self, session: u64, db: &str, op: ModifyOp, xml: &str) -> ConfResult<()> {
        let mut state = self.shared.state.write();
        Self::check_lock(&state, db, session)?;
        let user = self.session_user(&state, session);
        let modt = xmlfmt::parse(xml)?;
        self.gate_and_write(&mut state, db, op, &modt, &user)
    }

    /// Path-addressed edit: the keyed path becomes a modification tree with
    /// the operation attribute on its last element, so the outer path is
    /// addressed without being unconditionally materialized
    pub fn edit_path(
        &self,
        session: u64,
        db: &str,
        op: ModifyOp,
        xkey: &str,
        value: Option<&str>,
    ) -> ConfResult<()> {
        let mut state = self.shared.state.write();
        Self::check_lock(&state, db, session)?;
        let user = self.session_user(&state, session);
        let modt = modtree_from_xkey(xkey, op, value)?;
        self.gate_and_write(&mut state, db, ModifyOp::None, &modt, &user)
    }

    /// Read a filtered subtree, serialized as XML
    pub fn get(&self, db: &str, xpath: &str) -> ConfResult<String> {
        let mut state = self.shared.state.write();
        let view = state
            .datastores
            .get_mut(db)?
            .read(&self.shared.schema, xpath)?;
        Ok(xmlfmt::to_xml(&view, view.root(), false))
    }

    pub fn lock(&self, session: u64, db: &str) -> ConfResult<()> {
        self.shared.state.write().datastores.get_mut(db)?.lock(session)
    }
    pub fn unlock(&self, session: u64, db: &str) -> ConfResult<()> {
        self.shared
            .state
            .write()
            .datastores
            .get_mut(db)?
            .unlock(session)
    }

    pub fn copy(&self, session: u64, src: &str, dst: &str) -> ConfResult<()> {
        let mut state = self.shared.state.write();
        Self::check_lock(&state, dst, session)?;
        state.datastores.copy(&self.shared.schema, src, dst)
    }

    /// Serialize a datastore to a file, or rotate a snapshot into the archive
    pub fn save(&self, db: &str, snapshot: bool, filename: &str) -> ConfResult<()> {
        if db != "running" && db != "candidate" {
            return Err(Error::operation_failed(format!(
                "Expected running or candidate, got {}",
                db
            )));
        }
        let mut state = self.shared.state.write();
        let schema = &self.shared.schema;
        if snapshot {
            let dir = PathBuf::from(&self.shared.opts.archive_dir);
            let count = self.shared.opts.snapshot_count;
            state.datastores.get_mut(db)?.snapshot(schema, &dir, count)
        } else {
            state
                .datastores
                .get_mut(db)?
                .save_to(schema, Path::new(filename))
        }
    }

    /// Parse a file and merge (or replace) it into a datastore
    pub fn load(&self, session: u64, db: &str, replace: bool, filename: &str) -> ConfResult<()> {
        if db != "running" && db != "candidate" {
            return Err(Error::operation_failed(format!(
                "Expected running or candidate, got {}",
                db
            )));
        }
        let mut state = self.shared.state.write();
        Self::check_lock(&state, db, session)?;
        let modstate = state.datastores.modstate().map(str::to_owned);
        state.datastores.get_mut(db)?.load_from(
            &self.shared.schema,
            Path::new(filename),
            replace,
            &PermitAll,
            modstate.as_deref(),
        )
    }

    /// Validate the candidate datastore
    pub fn validate_candidate(&self) -> ConfResult<()> {
        let mut state = self.shared.state.write();
        let tree = state
            .datastores
            .get_mut("candidate")?
            .current_clone(&self.shared.schema)?;
        validate::validate_tree(&tree, &self.shared.schema)
    }

    /// The commit pipeline: validate, diff, extension transaction, then the
    /// atomic candidate→running copy and a config-change notification
    pub fn commit(&self, _session: u64) -> ConfResult<()> {
        let mut state = self.shared.state.write();
        let schema = &self.shared.schema;
        let candidate = state.datastores.get_mut("candidate")?.current_clone(schema)?;
        validate::validate_tree(&candidate, schema)?;
        let running = state.datastores.get_mut("running")?.current_clone(schema)?;
        let (added, deleted) = commit::compute_diff(&running, &candidate, schema);
        let td = TransactionData {
            source: "candidate".to_owned(),
            target: "running".to_owned(),
            added,
            deleted,
        };
        commit::run_transaction(&self.shared.extensions, &td)?;
        state.datastores.copy(schema, "candidate", "running")?;
        state.streams.notify(
            DEFAULT_STREAM,
            "<netconf-config-change><datastore>running</datastore></netconf-config-change>",
            Utc::now(),
        );
        log::info!(
            "Committed candidate to running ({} added, {} deleted)",
            td.added.len(),
            td.deleted.len()
        );
        Ok(())
    }

    // streams

    /// Create (status) or cancel a subscription. Returns whether a replay
    /// one-shot should be scheduled.
    #[allow(clippy::too_many_arguments)]
    pub fn subscribe(
        &self,
        session: u64,
        status: bool,
        stream: &str,
        filter: Option<String>,
        starttime: Option<DateTime<Utc>>,
        stoptime: Option<DateTime<Utc>>,
    ) -> ConfResult<bool> {
        let mut state = self.shared.state.write();
        if !status {
            state.streams.unsubscribe(stream, session);
            return Ok(false);
        }
        let tx = state
            .clients
            .iter()
            .find(|c| c.id == session)
            .map(|c| c.tx.clone())
            .ok_or_else(|| Error::internal(format!("no such session: {}", session)))?;
        let wants_replay = starttime.is_some();
        state
            .streams
            .subscribe(stream, filter, starttime, stoptime, session, tx)?;
        Ok(wants_replay)
    }
    /// Walk the replay buffer for a subscription (the near-now one-shot)
    pub fn run_replay(&self, stream: &str, session: u64) {
        self.shared.state.read().streams.run_replay(stream, session);
    }
    /// Emit an event on a stream
    pub fn notify(&self, stream: &str, event: &str) {
        self.shared.state.write().streams.notify(stream, event, Utc::now());
    }
    /// The periodic subscription/replay sweep
    pub fn timer_sweep(&self) {
        self.shared.state.write().streams.timer_sweep(Utc::now());
    }

    // misc dispatch

    /// Dispatch a named RPC: the built-in `streams` tag returns stream state,
    /// everything else goes to the extension that owns the tag
    pub fn call(&self, tag: &str, payload: &[u8]) -> ConfResult<Vec<u8>> {
        if tag == "streams" {
            return Ok(self.shared.state.read().streams.state_xml(true).into_bytes());
        }
        match self.shared.extensions.call(tag, payload) {
            Some(result) => result,
            None => Err(Error::operation_failed(format!(
                "No extension serves tag `{}`",
                tag
            ))),
        }
    }

    /// Set the process-wide debug level
    pub fn debug(&self, level: u32) -> ConfResult<()> {
        let filter = match level {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        log::set_max_level(filter);
        log::info!("Debug level set to {}", level);
        Ok(())
    }

    /// Graceful shutdown: run extension exit callbacks
    pub fn shutdown(&self) {
        self.shared.extensions.exit_all();
        log::info!("Engine shut down");
    }
}

/// Build a modification tree from a keyed path: ancestors are plain
/// addressing elements (so the default `none` operation leaves them
/// tentative), predicates become key leaves, and the final element carries
/// the operation attribute and optional value
fn modtree_from_xkey(xkey: &str, op: ModifyOp, value: Option<&str>) -> ConfResult<Tree> {
    let steps = xpath::parse(xkey)?;
    if steps.is_empty() {
        return Err(Error::malformed("empty path"));
    }
    let mut tree = Tree::new("config");
    let mut cur = tree.root();
    let last = steps.len() - 1;
    for (i, step) in steps.iter().enumerate() {
        let elem = tree.new_element(cur, &step.name, None);
        for (k, v) in &step.preds {
            let key = tree.new_element(elem, k, None);
            tree.set_body(key, v);
        }
        if i == last {
            if let Some(value) = value {
                tree.set_body(elem, value);
            }
            tree.set_attr(elem, "operation", op.as_str());
        }
        cur = elem;
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modtree_from_xkey() {
        let t = modtree_from_xkey("/x/y[a=1][b=2]/v", ModifyOp::Create, Some("hello")).unwrap();
        assert_eq!(
            xmlfmt::to_xml(&t, t.root(), false),
            r#"<config><x><y><a>1</a><b>2</b><v operation="create">hello</v></y></x></config>"#
        );
        let t = modtree_from_xkey("/x/y[a=1]", ModifyOp::Delete, None).unwrap();
        assert_eq!(
            xmlfmt::to_xml(&t, t.root(), false),
            r#"<config><x><y operation="delete"><a>1</a></y></x></config>"#
        );
        assert!(modtree_from_xkey("/", ModifyOp::Merge, None).is_err());
    }
}
