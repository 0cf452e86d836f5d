//! Effective permission computation.
//!
//! [`EffectivePermissionSet`] is the per-subject cache of resolved values.
//! It holds every name that is either explicitly overridden by an active
//! attachment or implied through the registry's child graph. Defaults are
//! not stored; the subject applies them at query time.
//!
//! # Algorithm
//!
//! ```text
//! 1. Explicit pass: attachments newest → oldest, overrides in name order.
//!    First writer of a name wins. Every explicit `true` is a depth-0 seed.
//! 2. Breadth-first expansion from the seeds, one depth level at a time.
//!    For each parent in frontier order, each child in registration order:
//!      - already resolved (explicit, or reached at this or a shallower
//!        depth) → skip
//!      - otherwise record (weight, depth); weight `true` joins the next
//!        frontier
//! ```
//!
//! Every name is recorded at most once, so expansion terminates on cyclic
//! graphs and is bounded by the number of reachable nodes. Only `true`
//! values propagate: an explicit or implied `false` never implies
//! anything.

use crate::{PermissionAttachment, PermissionRegistry};
use permit_types::{normalize, AttachmentId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One resolved permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermission {
    /// Normalized permission name.
    pub name: String,
    /// Resolved value.
    pub value: bool,
    /// `true` if an attachment sets this name explicitly.
    pub directly_set: bool,
    /// Attachment the value traces back to (the seed for implied values).
    pub attachment: AttachmentId,
    /// Node whose child link produced an implied value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Hops from the explicit seed. Zero for explicit values.
    pub depth: u32,
}

impl EffectivePermission {
    fn explicit(name: &str, value: bool, attachment: AttachmentId) -> Self {
        Self {
            name: name.to_string(),
            value,
            directly_set: true,
            attachment,
            parent: None,
            depth: 0,
        }
    }

    fn implied(
        name: &str,
        value: bool,
        attachment: AttachmentId,
        parent: &str,
        depth: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            value,
            directly_set: false,
            attachment,
            parent: Some(parent.to_string()),
            depth,
        }
    }
}

/// Resolved permissions of one subject, as of one recalculation.
///
/// # Example
///
/// ```
/// use permit_auth::{Permissible, PermissionNode};
/// use permit_runtime::{PermissibleBase, PermissionRegistry};
/// use std::sync::Arc;
///
/// let registry = Arc::new(PermissionRegistry::new());
/// registry
///     .register(PermissionNode::new("cmd.fly").with_child("cmd.fly.self", true))
///     .expect("register");
///
/// let subject = PermissibleBase::new(Arc::clone(&registry));
/// subject.add_attachment("cmd.fly", true);
///
/// let set = subject.effective_permissions();
/// let implied = set.get("cmd.fly.self").expect("implied entry");
/// assert!(implied.value);
/// assert!(!implied.directly_set);
/// assert_eq!(implied.depth, 1);
/// assert_eq!(implied.parent.as_deref(), Some("cmd.fly"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectivePermissionSet {
    entries: HashMap<String, EffectivePermission>,
    generation: u64,
}

impl EffectivePermissionSet {
    /// Computes the set for `attachments` (oldest first) against `registry`.
    #[must_use]
    pub fn compute(attachments: &[PermissionAttachment], registry: &PermissionRegistry) -> Self {
        // Read before walking: a registry change mid-walk leaves this set
        // tagged with the older generation, forcing a rebuild on next read.
        let generation = registry.generation();
        let mut entries: HashMap<String, EffectivePermission> = HashMap::new();
        let mut frontier: Vec<(String, AttachmentId)> = Vec::new();

        for attachment in attachments.iter().rev() {
            let id = attachment.id();
            attachment.with_permissions(|permissions| {
                for (name, &value) in permissions {
                    if entries.contains_key(name) {
                        continue;
                    }
                    entries.insert(name.clone(), EffectivePermission::explicit(name, value, id));
                    if value {
                        frontier.push((name.clone(), id));
                    }
                }
            });
        }

        let mut depth = 0u32;
        while !frontier.is_empty() {
            depth = depth.saturating_add(1);
            let mut next = Vec::new();

            for (parent, attachment) in &frontier {
                let Some(node) = registry.lookup(parent) else {
                    continue;
                };
                for child in node.children() {
                    if entries.contains_key(&child.name) {
                        continue;
                    }
                    entries.insert(
                        child.name.clone(),
                        EffectivePermission::implied(
                            &child.name,
                            child.value,
                            *attachment,
                            parent,
                            depth,
                        ),
                    );
                    if child.value {
                        next.push((child.name.clone(), *attachment));
                    }
                }
            }

            frontier = next;
        }

        Self {
            entries,
            generation,
        }
    }

    /// Returns the entry for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EffectivePermission> {
        self.entries.get(&normalize(name))
    }

    /// Returns the resolved value for `name`, if explicit or implied.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<bool> {
        self.get(name).map(|entry| entry.value)
    }

    /// Returns `true` if an attachment explicitly sets `name`.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some_and(|entry| entry.directly_set)
    }

    /// Iterates over all entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &EffectivePermission> {
        self.entries.values()
    }

    /// Returns all entries sorted by name.
    #[must_use]
    pub fn sorted(&self) -> Vec<&EffectivePermission> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is explicit or implied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registry generation this set was computed against.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
