/*
 * Created on Sun Jun 28 2026
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

//! # The extension registry
//!
//! Extensions are out-of-core modules that hook into the engine at init,
//! start and exit, at transaction boundaries, at the authorization gate and
//! through named RPCs. The registry is engine-scoped: it is built before the
//! engine starts and torn down at shutdown, with no process-global state.
//!
//! Transaction callbacks run in registration order; aborts run in reverse
//! order over the extensions whose `begin` succeeded.

use crate::acl::AclAction;
use crate::util::error::{ConfResult, Error};

/// The request context handed to `auth` callbacks
pub struct RequestContext<'a> {
    pub user: &'a str,
    pub path: &'a str,
    pub action: AclAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One changed subtree within a commit diff
pub struct DiffEntry {
    /// keyed path of the subtree root
    pub path: String,
    /// the serialized subtree
    pub xml: String,
}

#[derive(Debug, Clone, Default)]
/// The diff a commit hands to transaction callbacks: the subtrees added to
/// and deleted from the target datastore
pub struct TransactionData {
    pub source: String,
    pub target: String,
    pub added: Vec<DiffEntry>,
    pub deleted: Vec<DiffEntry>,
}

impl TransactionData {
    pub fn find_added(&self, path: &str) -> Option<&DiffEntry> {
        self.added.iter().find(|e| e.path == path)
    }
    pub fn find_deleted(&self, path: &str) -> Option<&DiffEntry> {
        self.deleted.iter().find(|e| e.path == path)
    }
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

/// An extension. All callbacks are optional; the defaults are no-ops that
/// never fail.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;
    /// Called once when the registry is initialized
    fn init(&self) -> ConfResult<()> {
        Ok(())
    }
    /// Called when the engine starts serving, with the process arguments
    fn start(&self, _args: &[String]) -> ConfResult<()> {
        Ok(())
    }
    /// Called at engine shutdown
    fn exit(&self) {}
    /// Authorization verdict for a write; `None` leaves the decision to the
    /// next extension (or permits if nobody claims it)
    fn auth(&self, _ctx: &RequestContext<'_>) -> Option<bool> {
        None
    }
    fn begin(&self, _td: &TransactionData) -> ConfResult<()> {
        Ok(())
    }
    fn apply(&self, _td: &TransactionData) -> ConfResult<()> {
        Ok(())
    }
    fn abort(&self, _td: &TransactionData) {}
    fn complete(&self, _td: &TransactionData) -> ConfResult<()> {
        Ok(())
    }
    /// Named RPC dispatch: return `None` if this extension does not own `tag`
    fn call(&self, _tag: &str, _payload: &[u8]) -> Option<ConfResult<Vec<u8>>> {
        None
    }
}

/// The engine-scoped list of loaded extensions
#[derive(Default)]
pub struct ExtensionRegistry {
    plugins: Vec<Box<dyn Extension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn register(&mut self, ext: Box<dyn Extension>) {
        log::info!("Loaded extension '{}'", ext.name());
        self.plugins.push(ext);
    }
    pub fn len(&self) -> usize {
        self.plugins.len()
    }
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &Box<dyn Extension>> {
        self.plugins.iter()
    }
    /// Run every `init` callback; the first failure aborts startup
    pub fn init_all(&self) -> ConfResult<()> {
        for p in &self.plugins {
            p.init().map_err(|e| {
                Error::operation_failed(format!("extension '{}' init failed: {}", p.name(), e.reason()))
            })?;
        }
        Ok(())
    }
    /// Run every `start` callback with the process arguments
    pub fn start_all(&self, args: &[String]) -> ConfResult<()> {
        for p in &self.plugins {
            p.start(args).map_err(|e| {
                Error::operation_failed(format!(
                    "extension '{}' start failed: {}",
                    p.name(),
                    e.reason()
                ))
            })?;
        }
        Ok(())
    }
    /// Run every `exit` callback (shutdown; never fails)
    pub fn exit_all(&self) {
        for p in &self.plugins {
            p.exit();
        }
    }
    /// First explicit auth verdict wins
    pub fn auth_check(&self, ctx: &RequestContext<'_>) -> Option<bool> {
        self.plugins.iter().find_map(|p| p.auth(ctx))
    }
    /// Dispatch a named RPC to the extension that owns `tag`
    pub fn call(&self, tag: &str, payload: &[u8]) -> Option<ConfResult<Vec<u8>>> {
        self.plugins.iter().find_map(|p| p.call(tag, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Probe {
        name: String,
        calls: Arc<AtomicUsize>,
    }
    impl Extension for Probe {
        fn name(&self) -> &str {
            &self.name
        }
        fn init(&self) -> ConfResult<()> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
        fn call(&self, tag: &str, payload: &[u8]) -> Option<ConfResult<Vec<u8>>> {
            (tag == self.name).then(|| Ok(payload.to_vec()))
        }
    }

    #[test]
    fn test_registry_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut reg = ExtensionRegistry::new();
        reg.register(Box::new(Probe {
            name: "alpha".to_owned(),
            calls: calls.clone(),
        }));
        reg.register(Box::new(Probe {
            name: "beta".to_owned(),
            calls: calls.clone(),
        }));
        reg.init_all().unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(reg.call("beta", b"ping").unwrap().unwrap(), b"ping");
        assert!(reg.call("gamma", b"ping").is_none());
    }
}
