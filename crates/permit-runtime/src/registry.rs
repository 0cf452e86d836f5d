//! Process-wide permission registry.
//!
//! Provides [`PermissionRegistry`], a thread-safe catalog of
//! [`PermissionNode`] definitions keyed by normalized name.
//!
//! # Generations
//!
//! Every mutation bumps a generation counter. Subjects record the
//! generation their effective set was built against and rebuild when it
//! moves, so a changed implication graph is never served from a stale
//! cache.
//!
//! # Dangling References
//!
//! A child link may name a node that is not (or no longer) registered.
//! Resolution treats it as a leaf: the implied value still applies to the
//! child name, but nothing further is implied and no default is consulted.

use glob::Pattern;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use permit_auth::{PermissionError, PermissionNode};
use permit_types::normalize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Thread-safe, in-memory permission catalog.
///
/// Reads take a shared lock; registration and removal take the exclusive
/// lock, so readers never observe a half-registered node. Nodes are stored
/// behind `Arc` and handed out as cheap clones.
///
/// # Example
///
/// ```
/// use permit_auth::{ErrorKind, PermissionDefault, PermissionNode};
/// use permit_runtime::PermissionRegistry;
///
/// let registry = PermissionRegistry::new();
/// registry
///     .register(PermissionNode::new("cmd.fly").with_child("cmd.fly.self", true))
///     .expect("first registration succeeds");
///
/// // Names are case-insensitive
/// let err = registry
///     .register(PermissionNode::new("CMD.FLY"))
///     .expect_err("duplicate is rejected");
/// assert_eq!(err.kind(), ErrorKind::DuplicateName);
///
/// // Explicit overwrite
/// registry.register_or_replace(
///     PermissionNode::new("cmd.fly").with_default(PermissionDefault::True),
/// );
/// assert_eq!(
///     registry.lookup("cmd.fly").map(|n| n.default()),
///     Some(PermissionDefault::True)
/// );
/// ```
#[derive(Debug, Default)]
pub struct PermissionRegistry {
    nodes: RwLock<HashMap<String, Arc<PermissionNode>>>,
    generation: AtomicU64,
}

impl PermissionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::DuplicateName`] if a node with the same
    /// name exists. Use [`register_or_replace`](Self::register_or_replace)
    /// to overwrite.
    pub fn register(&self, node: PermissionNode) -> Result<(), PermissionError> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(node.name()) {
            return Err(PermissionError::DuplicateName {
                name: node.name().to_string(),
            });
        }

        debug!(
            "registry: registered '{}' ({} children)",
            node.name(),
            node.children().len()
        );
        nodes.insert(node.name().to_string(), Arc::new(node));
        self.bump();
        Ok(())
    }

    /// Registers a batch of nodes, all or nothing.
    ///
    /// Every name is checked under one write lock before anything is
    /// inserted. Returns the number of nodes registered.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::DuplicateName`] for the first name that is
    /// already registered or appears twice in `nodes`. The registry is left
    /// unchanged.
    pub fn register_all(
        &self,
        nodes: impl IntoIterator<Item = PermissionNode>,
    ) -> Result<usize, PermissionError> {
        let batch: Vec<PermissionNode> = nodes.into_iter().collect();
        let mut registered = self.nodes.write();

        {
            let mut seen = HashSet::with_capacity(batch.len());
            for node in &batch {
                if registered.contains_key(node.name()) || !seen.insert(node.name()) {
                    return Err(PermissionError::DuplicateName {
                        name: node.name().to_string(),
                    });
                }
            }
        }

        let count = batch.len();
        for node in batch {
            registered.insert(node.name().to_string(), Arc::new(node));
        }
        if count > 0 {
            self.bump();
        }
        debug!("registry: registered batch of {count}");
        Ok(count)
    }

    /// Registers a node, replacing any existing node with the same name.
    ///
    /// Returns the replaced node, if any.
    pub fn register_or_replace(&self, node: PermissionNode) -> Option<Arc<PermissionNode>> {
        let mut nodes = self.nodes.write();
        debug!("registry: registered '{}' (overwrite)", node.name());
        let previous = nodes.insert(node.name().to_string(), Arc::new(node));
        self.bump();
        previous
    }

    /// Removes a node. Returns it, or `None` if it was not registered.
    ///
    /// Child links in other nodes that name it become dangling references.
    pub fn unregister(&self, name: &str) -> Option<Arc<PermissionNode>> {
        let mut nodes = self.nodes.write();
        let removed = nodes.remove(&normalize(name));
        if removed.is_some() {
            debug!("registry: unregistered '{}'", normalize(name));
            self.bump();
        }
        removed
    }

    /// Looks up a node by name. Not found is not an error.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<PermissionNode>> {
        self.nodes.read().get(&normalize(name)).cloned()
    }

    /// Returns `true` if a node with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.read().contains_key(&normalize(name))
    }

    /// Returns every node whose name starts with `prefix`, sorted by name.
    #[must_use]
    pub fn lookup_prefix(&self, prefix: &str) -> Vec<Arc<PermissionNode>> {
        let prefix = normalize(prefix);
        self.collect_sorted(|name| name.starts_with(&prefix))
    }

    /// Returns every node whose name matches a glob, sorted by name.
    ///
    /// Uses [`glob::Pattern`] syntax: `*` matches any run of characters
    /// (dots included), `?` one character, `[..]` a class. An invalid
    /// pattern matches nothing.
    ///
    /// ```
    /// use permit_auth::PermissionNode;
    /// use permit_runtime::PermissionRegistry;
    ///
    /// let registry = PermissionRegistry::new();
    /// for name in ["cmd.fly", "cmd.fly.self", "cmd.kick", "world.edit"] {
    ///     registry.register(PermissionNode::new(name)).expect("register");
    /// }
    ///
    /// let names: Vec<String> = registry
    ///     .matching("cmd.*")
    ///     .iter()
    ///     .map(|n| n.name().to_string())
    ///     .collect();
    /// assert_eq!(names, vec!["cmd.fly", "cmd.fly.self", "cmd.kick"]);
    /// ```
    #[must_use]
    pub fn matching(&self, pattern: &str) -> Vec<Arc<PermissionNode>> {
        let pattern = match Pattern::new(&normalize(pattern)) {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!("registry: invalid pattern '{pattern}': {e}");
                return Vec::new();
            }
        };
        self.collect_sorted(|name| pattern.matches(name))
    }

    /// Returns every registered name, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.nodes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the names whose default evaluates to `true` for the given
    /// operator status, sorted.
    #[must_use]
    pub fn default_permissions(&self, is_op: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .nodes
            .read()
            .values()
            .filter(|node| node.default().evaluate(is_op))
            .map(|node| node.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Returns the number of registered nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns `true` if no node is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Removes every node.
    pub fn clear(&self) {
        let mut nodes = self.nodes.write();
        if !nodes.is_empty() {
            debug!("registry: cleared {} nodes", nodes.len());
            nodes.clear();
            self.bump();
        }
    }

    /// Returns the current generation. Changes on every mutation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Called with the write lock held.
    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn collect_sorted(&self, mut keep: impl FnMut(&str) -> bool) -> Vec<Arc<PermissionNode>> {
        let mut found: Vec<Arc<PermissionNode>> = self
            .nodes
            .read()
            .iter()
            .filter(|(name, _)| keep(name.as_str()))
            .map(|(_, node)| Arc::clone(node))
            .collect();
        found.sort_by(|a, b| a.name().cmp(b.name()));
        found
    }
}

/// Returns the process-wide registry.
///
/// The registry is empty on first access and populated only by explicit
/// registration. It is never torn down. Subjects still take their registry
/// as an explicit handle, so tests can use isolated instances instead.
///
/// ```
/// use permit_runtime::global_registry;
/// use std::sync::Arc;
///
/// assert!(Arc::ptr_eq(&global_registry(), &global_registry()));
/// ```
#[must_use]
pub fn global_registry() -> Arc<PermissionRegistry> {
    static GLOBAL: OnceCell<Arc<PermissionRegistry>> = OnceCell::new();
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(PermissionRegistry::new())))
}
