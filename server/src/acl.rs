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

//! Access control for datastore writes
//!
//! The merge engine calls a [`WriteGate`] before every creation, update or
//! deletion. The gate is built once per write request from the configured
//! access-control mode:
//!
//! - `none`: every principal may write
//! - `internal`: policy lives in the `acl` subtree of the base tree itself;
//!   a matching unscoped `permit` rule grants a blanket pre-permit which
//!   skips per-node checks entirely
//! - `external`: per-node verdicts are delegated to extension `auth`
//!   callbacks; the first explicit verdict wins

use crate::config::AccessMode;
use crate::extensions::{ExtensionRegistry, RequestContext};
use crate::util::error::{ConfResult, Error};
use crate::xmltree::Tree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The action class a gate check covers
pub enum AclAction {
    Create,
    Update,
    Delete,
}

impl AclAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// The gate invoked by the merge engine before mutating a node
pub trait WriteGate {
    /// Check whether the principal may perform `action` on the node at `path`
    fn check(&self, path: &str, action: AclAction) -> ConfResult<()>;
    /// A blanket permit set by the pre-check; skips per-node calls
    fn blanket_permit(&self) -> bool {
        false
    }
}

/// The `none` mode gate
pub struct PermitAll;

impl WriteGate for PermitAll {
    fn check(&self, _path: &str, _action: AclAction) -> ConfResult<()> {
        Ok(())
    }
    fn blanket_permit(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Permit,
    Deny,
}

#[derive(Debug)]
struct AclRule {
    user: String,
    verdict: Verdict,
    /// restrict the rule to paths under this prefix; unscoped if absent
    path: Option<String>,
}

#[derive(Debug)]
/// The `internal` mode gate, read from the base tree's `acl` subtree:
///
/// ```xml
/// <acl>
///   <enabled>true</enabled>
///   <write-default>deny</write-default>
///   <rule><user>admin</user><access>permit</access></rule>
///   <rule><user>ops</user><access>permit</access><path>/x</path></rule>
/// </acl>
/// ```
pub struct InternalGate {
    user: String,
    enabled: bool,
    write_default: Verdict,
    rules: Vec<AclRule>,
    blanket: bool,
}

impl InternalGate {
    /// Build the gate for `user` from the policy embedded in `base`
    pub fn from_tree(base: &Tree, user: &str) -> Self {
        let mut gate = Self {
            user: user.to_owned(),
            enabled: false,
            write_default: Verdict::Permit,
            rules: Vec::new(),
            blanket: false,
        };
        let acl = match base.find_elem_child(base.root(), "acl") {
            Some(acl) => acl,
            None => return gate,
        };
        gate.enabled = base
            .find_elem_child(acl, "enabled")
            .and_then(|c| base.find_body(c))
            .map(|b| b == "true")
            .unwrap_or(false);
        if let Some(default) = base
            .find_elem_child(acl, "write-default")
            .and_then(|c| base.find_body(c))
        {
            if default == "deny" {
                gate.write_default = Verdict::Deny;
            }
        }
        for rule in base.elem_children(acl) {
            if base.node(rule).name() != "rule" {
                continue;
            }
            let ruser = base
                .find_elem_child(rule, "user")
                .and_then(|c| base.find_body(c));
            let access = base
                .find_elem_child(rule, "access")
                .and_then(|c| base.find_body(c));
            let path = base
                .find_elem_child(rule, "path")
                .and_then(|c| base.find_body(c))
                .map(str::to_owned);
            if let (Some(ruser), Some(access)) = (ruser, access) {
                gate.rules.push(AclRule {
                    user: ruser.to_owned(),
                    verdict: if access == "permit" {
                        Verdict::Permit
                    } else {
                        Verdict::Deny
                    },
                    path,
                });
            }
        }
        // pre-check: an unscoped permit rule for the principal is a blanket
        // permit, as is a disabled policy
        gate.blanket = !gate.enabled
            || gate.rules.iter().any(|r| {
                r.path.is_none() && r.verdict == Verdict::Permit && rule_user_matches(&r.user, user)
            });
        gate
    }
}

fn rule_user_matches(rule_user: &str, user: &str) -> bool {
    rule_user == "*" || rule_user == user
}

impl WriteGate for InternalGate {
    fn check(&self, path: &str, action: AclAction) -> ConfResult<()> {
        if self.blanket {
            return Ok(());
        }
        let verdict = self
            .rules
            .iter()
            .find(|r| {
                rule_user_matches(&r.user, &self.user)
                    && r.path
                        .as_deref()
                        .map(|prefix| path.starts_with(prefix))
                        .unwrap_or(true)
            })
            .map(|r| r.verdict)
            .unwrap_or(self.write_default);
        match verdict {
            Verdict::Permit => Ok(()),
            Verdict::Deny => Err(Error::access_denied(format!(
                "{} access to {} denied for user {}",
                action.as_str(),
                path,
                self.user
            ))),
        }
    }
    fn blanket_permit(&self) -> bool {
        self.blanket
    }
}

/// The `external` mode gate: extension `auth` callbacks decide
pub struct ExternalGate<'a> {
    registry: &'a ExtensionRegistry,
    user: String,
}

impl<'a> ExternalGate<'a> {
    pub fn new(registry: &'a ExtensionRegistry, user: &str) -> Self {
        Self {
            registry,
            user: user.to_owned(),
        }
    }
}

impl WriteGate for ExternalGate<'_> {
    fn check(&self, path: &str, action: AclAction) -> ConfResult<()> {
        let ctx = RequestContext {
            user: &self.user,
            path,
            action,
        };
        match self.registry.auth_check(&ctx) {
            Some(false) => Err(Error::access_denied(format!(
                "{} access to {} denied for user {}",
                action.as_str(),
                path,
                self.user
            ))),
            // no extension claimed the verdict: permit
            _ => Ok(()),
        }
    }
}

/// Build the gate appropriate for the configured mode. `base` is the tree
/// being written (internal mode reads its policy from it).
pub fn gate_for<'a>(
    mode: AccessMode,
    base: &Tree,
    user: &str,
    registry: &'a ExtensionRegistry,
) -> Box<dyn WriteGate + 'a> {
    match mode {
        AccessMode::None => Box::new(PermitAll),
        AccessMode::Internal => Box::new(InternalGate::from_tree(base, user)),
        AccessMode::External => Box::new(ExternalGate::new(registry, user)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmltree::xmlfmt;

    fn base_with_acl() -> Tree {
        xmlfmt::parse(
            "<config><acl><enabled>true</enabled><write-default>deny</write-default>\
             <rule><user>admin</user><access>permit</access></rule>\
             <rule><user>ops</user><access>permit</access><path>/x</path></rule>\
             </acl></config>",
        )
        .unwrap()
    }

    #[test]
    fn test_admin_gets_blanket_permit() {
        let base = base_with_acl();
        let gate = InternalGate::from_tree(&base, "admin");
        assert!(gate.blanket_permit());
        assert!(gate.check("/anything", AclAction::Delete).is_ok());
    }

    #[test]
    fn test_scoped_rule() {
        let base = base_with_acl();
        let gate = InternalGate::from_tree(&base, "ops");
        assert!(!gate.blanket_permit());
        assert!(gate.check("/x/y", AclAction::Create).is_ok());
        assert!(gate.check("/acl/rule", AclAction::Update).is_err());
    }

    #[test]
    fn test_default_deny_for_unknown_user() {
        let base = base_with_acl();
        let gate = InternalGate::from_tree(&base, "eve");
        let err = gate.check("/x", AclAction::Create).unwrap_err();
        assert_eq!(err.kind(), crate::util::error::ErrorKind::AccessDenied);
    }

    #[test]
    fn test_disabled_policy_permits() {
        let base = xmlfmt::parse("<config><acl><enabled>false</enabled></acl></config>").unwrap();
        let gate = InternalGate::from_tree(&base, "eve");
        assert!(gate.blanket_permit());
    }

    #[test]
    fn test_no_acl_subtree_permits() {
        let base = xmlfmt::parse("<config/>").unwrap();
        let gate = InternalGate::from_tree(&base, "anyone");
        assert!(gate.blanket_permit());
    }

    struct DenyDeletes;
    impl crate::extensions::Extension for DenyDeletes {
        fn name(&self) -> &str {
            "deny-deletes"
        }
        fn auth(&self, ctx: &RequestContext<'_>) -> Option<bool> {
            (ctx.action == AclAction::Delete).then_some(false)
        }
    }

    #[test]
    fn test_external_gate_consults_extensions() {
        let mut registry = ExtensionRegistry::new();
        registry.register(Box::new(DenyDeletes));
        let gate = ExternalGate::new(&registry, "ops");
        assert!(gate.check("/x", AclAction::Create).is_ok());
        // no extension claims updates: permitted by default
        assert!(gate.check("/x", AclAction::Update).is_ok());
        let err = gate.check("/x", AclAction::Delete).unwrap_err();
        assert_eq!(err.kind(), crate::util::error::ErrorKind::AccessDenied);
    }
}
