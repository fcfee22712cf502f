/*
 * Created on Tue Jul 07 2026
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

//! # Datastores
//!
//! A datastore is a named configuration tree (`candidate`, `running`,
//! `startup`) with an on-disk file, an optional in-memory cache, and an
//! advisory writer lock identified by session id.
//!
//! With caching on, reads serve the cached root and writes keep the cache
//! authoritative; with caching off every read reloads from disk and every
//! write discards the tree after serializing. Persistence always goes through
//! a temp file followed by a rename, so a crash mid-write leaves the previous
//! file intact. A write may embed the engine's module-state snippet at the
//! end of the root; it is stripped again both after writing and on every
//! read so it never contaminates the in-memory tree.

pub mod snapshot;

use crate::acl::WriteGate;
use crate::config::{ConfigurationSet, DataFormat};
use crate::merge::{self, ModifyOp};
use crate::schema::SchemaTree;
use crate::util::error::{ConfResult, Error};
use crate::xmltree::{jsonfmt, xmlfmt, Tree};
use crate::xpath;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// The element name of the embedded module-revision stamp
const MODSTATE_NAME: &str = "modules-state";

#[derive(Debug)]
pub struct Datastore {
    name: String,
    path: PathBuf,
    format: DataFormat,
    cached: bool,
    pretty: bool,
    cache: Option<Tree>,
    lock_owner: Option<u64>,
}

impl Datastore {
    pub fn new(name: &str, dir: &Path, format: DataFormat, cached: bool, pretty: bool) -> Self {
        Self {
            name: name.to_owned(),
            path: dir.join(format!("{}.{}", name, format.extension())),
            format,
            cached,
            pretty,
            cache: None,
            lock_owner: None,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn file_path(&self) -> &Path {
        &self.path
    }

    fn serialize(&self, tree: &Tree) -> ConfResult<String> {
        match self.format {
            DataFormat::Xml => Ok(xmlfmt::to_xml(tree, tree.root(), self.pretty)),
            DataFormat::Json => jsonfmt::to_json(tree, tree.root(), self.pretty),
        }
    }
    fn parse_str(&self, raw: &str) -> ConfResult<Tree> {
        match self.format {
            DataFormat::Xml => xmlfmt::parse(raw),
            DataFormat::Json => jsonfmt::parse(raw),
        }
    }

    /// Load the tree from disk; a missing file yields an empty root. The
    /// module-state stamp, if present, is stripped.
    fn load_file(&self, schema: &SchemaTree) -> ConfResult<Tree> {
        let mut tree = match fs::read_to_string(&self.path) {
            Ok(raw) => self.parse_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Tree::new("config"),
            Err(e) => return Err(e.into()),
        };
        if tree.node(tree.root()).name() != "config" {
            return Err(Error::malformed(format!(
                "Top-level symbol in {} is {}, expected \"config\"",
                self.path.display(),
                tree.node(tree.root()).name()
            )));
        }
        if let Some(modstate) = tree.find_elem_child(tree.root(), MODSTATE_NAME) {
            tree.purge(modstate);
        }
        tree.bind_schema(schema, false)?;
        let root = tree.root();
        for id in tree.collect_elements(root) {
            tree.sort_children(id, schema);
        }
        Ok(tree)
    }

    /// Serialize `tree` to the datastore file through a temp file + rename
    fn persist(&self, tree: &mut Tree, modstate: Option<&str>) -> ConfResult<()> {
        let grafted = match modstate {
            Some(snippet) => {
                let stamp = xmlfmt::parse(snippet)?;
                let root = tree.root();
                Some(tree.copy_into(root, &stamp, stamp.root()))
            }
            None => None,
        };
        let raw = self.serialize(tree);
        // strip the stamp from the in-memory tree again, whatever happened
        if let Some(grafted) = grafted {
            tree.purge(grafted);
        }
        let raw = raw?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw.as_bytes())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// A full clone of the current tree (cache or disk)
    pub fn current_clone(&mut self, schema: &SchemaTree) -> ConfResult<Tree> {
        if self.cached {
            if self.cache.is_none() {
                self.cache = Some(self.load_file(schema)?);
            }
            // just filled it above
            match &self.cache {
                Some(t) => Ok(t.clone()),
                None => Err(Error::internal("datastore cache vanished")),
            }
        } else {
            self.load_file(schema)
        }
    }

    /// Read a filtered view of the datastore
    pub fn read(&mut self, schema: &SchemaTree, path: &str) -> ConfResult<Tree> {
        if self.cached {
            if self.cache.is_none() {
                self.cache = Some(self.load_file(schema)?);
            }
            match &self.cache {
                Some(t) => xpath::filter_copy(t, path),
                None => Err(Error::internal("datastore cache vanished")),
            }
        } else {
            let tree = self.load_file(schema)?;
            xpath::filter_copy(&tree, path)
        }
    }

    /// Apply a modification tree under `op`, persist, and keep the cache
    /// authoritative. On a failed merge or a failed write the cache is
    /// restored to its pre-merge state.
    pub fn write(
        &mut self,
        schema: &SchemaTree,
        op: ModifyOp,
        modt: &Tree,
        gate: &dyn WriteGate,
        modstate: Option<&str>,
    ) -> ConfResult<()> {
        let mut tree = match (self.cached, self.cache.take()) {
            (true, Some(t)) => t,
            _ => self.load_file(schema)?,
        };
        let checkpoint = if self.cached { Some(tree.clone()) } else { None };
        if let Err(e) = merge::apply_edit(&mut tree, modt, schema, op, gate) {
            self.cache = checkpoint;
            return Err(e);
        }
        if let Err(e) = self.persist(&mut tree, modstate) {
            self.cache = checkpoint;
            return Err(e);
        }
        if self.cached {
            self.cache = Some(tree);
        }
        Ok(())
    }

    /// Replace the whole tree (copy / commit target), atomically persisting it
    pub fn replace_root(&mut self, mut tree: Tree, modstate: Option<&str>) -> ConfResult<()> {
        self.persist(&mut tree, modstate)?;
        self.cache = if self.cached { Some(tree) } else { None };
        Ok(())
    }

    /// Serialize the current tree to an arbitrary file
    pub fn save_to(&mut self, schema: &SchemaTree, path: &Path) -> ConfResult<()> {
        let tree = self.current_clone(schema)?;
        fs::write(path, self.serialize(&tree)?.as_bytes())?;
        Ok(())
    }

    /// Rotate a snapshot of the current tree into the archive directory
    pub fn snapshot(&mut self, schema: &SchemaTree, dir: &Path, count: usize) -> ConfResult<()> {
        let tree = self.current_clone(schema)?;
        let payload = self.serialize(&tree)?;
        snapshot::rotate(dir, count, &payload)
    }

    /// Load a file and merge (or replace) it into the datastore
    pub fn load_from(
        &mut self,
        schema: &SchemaTree,
        path: &Path,
        replace: bool,
        gate: &dyn WriteGate,
        modstate: Option<&str>,
    ) -> ConfResult<()> {
        let raw = fs::read_to_string(path)?;
        let mut modt = self.parse_str(&raw)?;
        if modt.node(modt.root()).name() != "config" {
            return Err(Error::malformed(format!(
                "Top-level symbol in {} is {}, expected \"config\"",
                path.display(),
                modt.node(modt.root()).name()
            )));
        }
        if let Some(stamp) = modt.find_elem_child(modt.root(), MODSTATE_NAME) {
            modt.purge(stamp);
        }
        let op = if replace {
            ModifyOp::Replace
        } else {
            ModifyOp::Merge
        };
        self.write(schema, op, &modt, gate, modstate)
    }

    // locking

    /// Take the advisory writer lock for a session
    pub fn lock(&mut self, session: u64) -> ConfResult<()> {
        match self.lock_owner {
            Some(owner) if owner != session => Err(Error::in_use(format!(
                "lock failed: locked by {}",
                owner
            ))),
            _ => {
                self.lock_owner = Some(session);
                Ok(())
            }
        }
    }
    pub fn unlock(&mut self, session: u64) -> ConfResult<()> {
        match self.lock_owner {
            Some(owner) if owner != session => Err(Error::in_use(format!(
                "unlock failed: locked by {}",
                owner
            ))),
            _ => {
                self.lock_owner = None;
                Ok(())
            }
        }
    }
    /// Release the lock if `session` holds it (session teardown)
    pub fn unlock_if_owner(&mut self, session: u64) {
        if self.lock_owner == Some(session) {
            self.lock_owner = None;
        }
    }
    pub const fn islocked(&self) -> Option<u64> {
        self.lock_owner
    }
    /// Drop the cached root; the next read reloads from disk
    pub fn invalidate(&mut self) {
        self.cache = None;
    }
}

/// The named datastores owned by the engine
pub struct DatastoreSet {
    stores: HashMap<String, Datastore>,
    /// module-state snippet embedded into writebacks
    modstate: Option<String>,
}

/// The datastore names every engine carries
pub const DATASTORES: [&str; 3] = ["candidate", "running", "startup"];

impl DatastoreSet {
    pub fn new(opts: &ConfigurationSet, modstate: Option<String>) -> ConfResult<Self> {
        let dir = PathBuf::from(&opts.data_dir);
        fs::create_dir_all(&dir)?;
        let mut stores = HashMap::new();
        for name in DATASTORES {
            stores.insert(
                name.to_owned(),
                Datastore::new(
                    name,
                    &dir,
                    opts.datastore_format,
                    opts.cache_datastores,
                    opts.pretty_print,
                ),
            );
        }
        Ok(Self { stores, modstate })
    }
    pub fn modstate(&self) -> Option<&str> {
        self.modstate.as_deref()
    }
    pub fn get(&self, name: &str) -> ConfResult<&Datastore> {
        self.stores
            .get(name)
            .ok_or_else(|| Error::operation_failed(format!("No such datastore: {}", name)))
    }
    pub fn get_mut(&mut self, name: &str) -> ConfResult<&mut Datastore> {
        self.stores
            .get_mut(name)
            .ok_or_else(|| Error::operation_failed(format!("No such datastore: {}", name)))
    }
    /// Atomically copy one datastore's tree over another
    pub fn copy(&mut self, schema: &SchemaTree, src: &str, dst: &str) -> ConfResult<()> {
        let tree = self.get_mut(src)?.current_clone(schema)?;
        let modstate = self.modstate.clone();
        self.get_mut(dst)?.replace_root(tree, modstate.as_deref())
    }
    /// Release every lock a closing session holds
    pub fn release_session(&mut self, session: u64) {
        for store in self.stores.values_mut() {
            store.unlock_if_owner(session);
        }
    }
}
